use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use rusqlite::{Connection, params};
use tokio::sync::Mutex;

use crate::core::agents::PriceSample;
use crate::core::error::EngineError;

/// Append-only price history, kept in its own database file so discovery and
/// analysis share it without touching the session store.
pub struct PriceStore {
    conn: Arc<Mutex<Connection>>,
}

impl PriceStore {
    pub fn open(path: &Path) -> Result<Self, EngineError> {
        let conn = Connection::open(path).map_err(EngineError::persistence)?;
        conn.execute(
            "CREATE TABLE IF NOT EXISTS products (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL,
                price REAL NOT NULL,
                date TEXT NOT NULL,
                source TEXT NOT NULL DEFAULT '',
                url TEXT
            )",
            [],
        )
        .map_err(EngineError::persistence)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub async fn insert_sample(&self, sample: &PriceSample) -> Result<(), EngineError> {
        let conn = self.conn.lock().await;
        conn.execute(
            "INSERT INTO products (name, price, date, source, url) VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                sample.name,
                sample.price,
                sample.date.to_rfc3339(),
                sample.source,
                sample.url,
            ],
        )
        .map_err(EngineError::persistence)?;
        Ok(())
    }

    pub async fn all_samples(&self) -> Result<Vec<PriceSample>, EngineError> {
        let conn = self.conn.lock().await;
        let mut stmt = conn
            .prepare("SELECT name, price, date, source, url FROM products ORDER BY id ASC")
            .map_err(EngineError::persistence)?;
        let rows = stmt
            .query_map([], |row| {
                let date: String = row.get(2)?;
                Ok(PriceSample {
                    name: row.get(0)?,
                    price: row.get(1)?,
                    date: DateTime::parse_from_rfc3339(&date)
                        .map(|d| d.with_timezone(&Utc))
                        .unwrap_or(DateTime::<Utc>::UNIX_EPOCH),
                    source: row.get(3)?,
                    url: row.get(4)?,
                })
            })
            .map_err(EngineError::persistence)?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row.map_err(EngineError::persistence)?);
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    #[tokio::test]
    async fn samples_append_and_read_back_in_insert_order() {
        let dir = tempfile::tempdir().unwrap();
        let store = PriceStore::open(&dir.path().join("prices.db")).unwrap();

        let date = Utc.with_ymd_and_hms(2026, 8, 1, 12, 0, 0).unwrap();
        store
            .insert_sample(&PriceSample {
                name: "Widget".into(),
                price: 10.0,
                date,
                source: "example.com".into(),
                url: None,
            })
            .await
            .unwrap();
        store
            .insert_sample(&PriceSample {
                name: "Widget".into(),
                price: 8.5,
                date,
                source: "other.example".into(),
                url: Some("https://other.example/widget".into()),
            })
            .await
            .unwrap();

        let samples = store.all_samples().await.unwrap();
        assert_eq!(samples.len(), 2);
        assert_eq!(samples[0].price, 10.0);
        assert_eq!(samples[0].date, date);
        assert_eq!(samples[1].url.as_deref(), Some("https://other.example/widget"));
    }
}
