//! Engine settings and the sled instance they open
use crate::error::{CustodyError, CustodyResult};
use anyhow::Context;
use chrono::TimeDelta;
use std::path::PathBuf;
use std::sync::Arc;

pub const DB_ENV: &str = "BLOOD_CUSTODY_DB";
pub const SHELF_LIFE_ENV: &str = "BLOOD_CUSTODY_SHELF_LIFE_DAYS";
pub const MAX_DONOR_NAME_ENV: &str = "BLOOD_CUSTODY_MAX_DONOR_NAME";

/// Shelf life of refrigerated red cells
pub const DEFAULT_SHELF_LIFE_DAYS: i64 = 42;
pub const DEFAULT_MAX_DONOR_NAME: usize = 128;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// `None` keeps everything in a temporary sled instance.
    pub store_path: Option<PathBuf>,
    pub shelf_life: TimeDelta,
    pub max_donor_name: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            store_path: None,
            shelf_life: TimeDelta::days(DEFAULT_SHELF_LIFE_DAYS),
            max_donor_name: DEFAULT_MAX_DONOR_NAME,
        }
    }
}

impl EngineConfig {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn with_store_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.store_path = Some(path.into());
        self
    }
    pub fn with_shelf_life(mut self, shelf_life: TimeDelta) -> Self {
        self.shelf_life = shelf_life;
        self
    }
    pub fn with_max_donor_name(mut self, max: usize) -> Self {
        self.max_donor_name = max;
        self
    }

    /// Shelf life must be positive and fit in i64 nanoseconds, the unit
    /// timestamps are stored in.
    pub fn validate(&self) -> CustodyResult<()> {
        if self.shelf_life <= TimeDelta::zero() {
            return Err(CustodyError::InvalidInput(format!(
                "shelf life must be positive, got {}",
                self.shelf_life
            )));
        }
        if self.shelf_life.num_nanoseconds().is_none() {
            return Err(CustodyError::InvalidInput(format!(
                "shelf life of {} days is out of range",
                self.shelf_life.num_days()
            )));
        }
        Ok(())
    }

    /// Defaults overridden by any of the `BLOOD_CUSTODY_*` variables that are set.
    pub fn from_env() -> anyhow::Result<Self> {
        let mut config = Self::default();

        if let Ok(path) = std::env::var(DB_ENV) {
            config.store_path = Some(PathBuf::from(path));
        }
        if let Ok(days) = std::env::var(SHELF_LIFE_ENV) {
            let days: i64 = days
                .parse()
                .with_context(|| format!("{SHELF_LIFE_ENV} must be a whole number of days"))?;
            config.shelf_life = TimeDelta::try_days(days)
                .with_context(|| format!("{SHELF_LIFE_ENV}={days} is out of range"))?;
        }
        if let Ok(max) = std::env::var(MAX_DONOR_NAME_ENV) {
            config.max_donor_name = max
                .parse()
                .with_context(|| format!("{MAX_DONOR_NAME_ENV} must be a positive integer"))?;
        }

        config
            .validate()
            .with_context(|| format!("invalid {SHELF_LIFE_ENV}"))?;
        Ok(config)
    }

    /// Opens the configured sled instance.
    pub fn open_db(&self) -> anyhow::Result<Arc<sled::Db>> {
        let db = match &self.store_path {
            Some(path) => sled::Config::new()
                .path(path)
                .open()
                .with_context(|| format!("failed to open custody store at {}", path.display()))?,
            None => sled::Config::new()
                .temporary(true)
                .open()
                .context("failed to open temporary custody store")?,
        };

        Ok(Arc::new(db))
    }
}
