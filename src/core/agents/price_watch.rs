//! Price-drop analysis over the sample history.
//!
//! Samples are grouped per product and compared across the two most recent
//! distinct sampling dates: if the cheapest recent offer undercuts the
//! cheapest offer of the previous date, a notification line is emitted.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use super::AgentTask;
use crate::core::error::EngineError;
use crate::core::router::RouterSnapshot;
use crate::core::session::Workload;
use crate::mail::{self, DeliveryConfig};
use crate::storage::PriceStore;

/// Payload set when the comparison finds nothing.
pub const NO_DROPS_MESSAGE: &str = "No price drops detected.";

/// One observed price for a product. Append-only: discovery runs insert new
/// rows, never update existing ones.
#[derive(Debug, Clone)]
pub struct PriceSample {
    pub name: String,
    pub price: f64,
    /// Sampling timestamp, not the wall-clock of the insert.
    pub date: DateTime<Utc>,
    pub source: String,
    pub url: Option<String>,
}

/// A detected drop for one product, carrying the sample that achieved the
/// new low so its URL can be surfaced.
#[derive(Debug, Clone, PartialEq)]
pub struct PriceDrop {
    pub name: String,
    pub new_low: f64,
    pub old_low: f64,
    pub url: Option<String>,
}

impl PriceDrop {
    pub fn notification_line(&self) -> String {
        let mut line = format!(
            "Price drop for {}: ${:.2} (was ${:.2})",
            self.name, self.new_low, self.old_low
        );
        if let Some(url) = &self.url {
            line.push_str(&format!(". URL: {}", url));
        }
        line
    }
}

/// Compare each product's most recent distinct sampling date against the
/// nearest strictly-earlier one. Products with fewer than two distinct dates
/// are skipped, since no comparison is possible. Results are ordered by product
/// name.
pub fn detect_drops(samples: &[PriceSample]) -> Vec<PriceDrop> {
    let mut by_name: BTreeMap<&str, Vec<&PriceSample>> = BTreeMap::new();
    for sample in samples {
        by_name.entry(sample.name.as_str()).or_default().push(sample);
    }

    let mut drops = Vec::new();
    for (name, mut group) in by_name {
        group.sort_by_key(|s| s.date);
        let Some(latest) = group.last() else { continue };
        let recent_date = latest.date;

        let Some(cheapest_recent) = group
            .iter()
            .filter(|s| s.date == recent_date)
            .min_by(|a, b| a.price.partial_cmp(&b.price).unwrap_or(Ordering::Equal))
        else {
            continue;
        };

        // Nearest strictly-earlier distinct date; absent means a single
        // sampling period and nothing to compare against.
        let Some(previous_date) = group.iter().rev().find(|s| s.date < recent_date).map(|s| s.date)
        else {
            continue;
        };
        let old_low = group
            .iter()
            .filter(|s| s.date == previous_date)
            .map(|s| s.price)
            .fold(f64::INFINITY, f64::min);

        if cheapest_recent.price < old_low {
            drops.push(PriceDrop {
                name: name.to_string(),
                new_low: cheapest_recent.price,
                old_low,
                url: cheapest_recent.url.clone(),
            });
        }
    }
    drops
}

/// Agent shell around [`detect_drops`]: reads the full sample history, writes
/// the notification text (or the no-drops message) into the payload, and
/// mails the text when the workload carries delivery settings.
pub struct PriceWatchAgent {
    prices: Arc<PriceStore>,
}

impl PriceWatchAgent {
    pub fn new(prices: Arc<PriceStore>) -> Self {
        Self { prices }
    }
}

#[async_trait]
impl AgentTask for PriceWatchAgent {
    async fn do_work(
        &self,
        workload: &mut Workload,
        _router: &RouterSnapshot,
    ) -> Result<(), EngineError> {
        let samples = self.prices.all_samples().await?;
        let drops = detect_drops(&samples);

        if drops.is_empty() {
            workload.payload = NO_DROPS_MESSAGE.to_string();
            return Ok(());
        }

        let lines: Vec<String> = drops.iter().map(PriceDrop::notification_line).collect();
        let message = format!("Price alerts:\n{}", lines.join("\n"));

        if workload.config.trim().is_empty() {
            debug!(workload_id = %workload.id, "no delivery config on workload, skipping email");
        } else {
            match serde_json::from_str::<DeliveryConfig>(&workload.config) {
                Ok(delivery) => {
                    // Delivery failures never fail the workload.
                    if let Err(err) = mail::send_alert(&message, &delivery).await {
                        warn!(workload_id = %workload.id, error = %err, "alert email failed");
                    }
                }
                Err(err) => {
                    warn!(workload_id = %workload.id, error = %err, "malformed delivery config");
                }
            }
        }

        workload.payload = message;
        Ok(())
    }
}
