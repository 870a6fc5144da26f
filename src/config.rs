//! Runtime configuration shared by the CLI and the server.
use crate::catalog::StatCatalog;
use anyhow::Result;
use std::env;
use std::path::PathBuf;

const DEFAULT_DB_PATH: &str = "dino-tracker.db";
const DEFAULT_BIND_ADDR: &str = "0.0.0.0:3000";

#[derive(Clone, Debug)]
pub struct Config {
    /// SQLite database file
    pub db_path: PathBuf,
    /// Server listen address
    pub bind_addr: String,
    /// Optional JSON file overriding the special stat rules
    pub catalog_path: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from(DEFAULT_DB_PATH),
            bind_addr: DEFAULT_BIND_ADDR.to_string(),
            catalog_path: None,
        }
    }
}

impl Config {
    /// Construct configuration from environment variables.
    ///
    /// Environment variables:
    /// - `DINO_DB_PATH` - database file (default: `dino-tracker.db`)
    /// - `DINO_BIND_ADDR` - server address (default: `0.0.0.0:3000`)
    /// - `DINO_CATALOG_PATH` - special stat rules JSON (default: built-in)
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Some(path) = read_env("DINO_DB_PATH") {
            config.db_path = PathBuf::from(path);
        }
        if let Some(addr) = read_env("DINO_BIND_ADDR") {
            config.bind_addr = addr;
        }
        config.catalog_path = read_env("DINO_CATALOG_PATH").map(PathBuf::from);

        config
    }

    /// The configured catalog, or the standard one
    pub fn load_catalog(&self) -> Result<StatCatalog> {
        match &self.catalog_path {
            Some(path) => StatCatalog::from_file(path),
            None => Ok(StatCatalog::standard()),
        }
    }
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}
