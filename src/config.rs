use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::core::pool::DEFAULT_WORKERS;

/// `drover.toml`. Every key has a default so a missing file means a working
/// local setup.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Number of pool executors.
    pub workers: usize,
    pub db_path: PathBuf,
    pub price_db_path: PathBuf,
    /// Optional graph database for the company-relationship agent.
    pub graph: Option<GraphConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GraphConfig {
    pub uri: String,
    pub username: String,
    pub password: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            workers: DEFAULT_WORKERS,
            db_path: PathBuf::from("drover.db"),
            price_db_path: PathBuf::from("prices.db"),
            graph: None,
        }
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        toml::from_str(&raw).with_context(|| format!("parsing {}", path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_yields_defaults() {
        let config = Config::load(Path::new("does-not-exist.toml")).unwrap();
        assert_eq!(config.workers, DEFAULT_WORKERS);
        assert_eq!(config.db_path, PathBuf::from("drover.db"));
        assert!(config.graph.is_none());
    }

    #[test]
    fn partial_files_fall_back_per_key() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("drover.toml");
        std::fs::write(
            &path,
            "workers = 8\n\n[graph]\nuri = \"http://localhost:7474\"\nusername = \"neo4j\"\npassword = \"secret\"\n",
        )
        .unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.workers, 8);
        assert_eq!(config.price_db_path, PathBuf::from("prices.db"));
        assert_eq!(config.graph.unwrap().username, "neo4j");
    }
}
