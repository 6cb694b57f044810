//! Composition root: one configuration, one clock, both managers and the admin gate

use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use anyhow::{Context, Result};
use kiosk_core::{
    config::PROJECT_CONFIG_FILE, AdminGate, Clock, KioskConfig, LockerId, LockerManager,
    PrepaidCodeManager, SystemClock,
};
use serde::Serialize;

/// Everything a command needs, built once per invocation
#[derive(Debug)]
pub struct Kiosk {
    pub config: KioskConfig,
    pub lockers: LockerManager,
    pub codes: PrepaidCodeManager,
    pub admin: AdminGate,
}

/// Outcome of one periodic sweep
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TickReport {
    pub released_lockers: Vec<LockerId>,
    pub removed_codes: usize,
}

impl Kiosk {
    /// Load configuration and open both stores with the system clock
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration cannot be loaded
    pub fn open(config_path: Option<&Path>, data_dir: Option<&Path>) -> Result<Self> {
        let mut config = KioskConfig::load(config_path).context("Failed to load configuration")?;
        if let Some(dir) = data_dir {
            config.storage.data_dir = dir.to_path_buf();
        }
        Ok(Self::with_clock(config, Arc::new(SystemClock)))
    }

    /// Open both stores for an already-built configuration
    #[must_use]
    pub fn with_clock(config: KioskConfig, clock: Arc<dyn Clock>) -> Self {
        let lockers = LockerManager::open(&config, clock.clone());
        let codes = PrepaidCodeManager::open(&config, clock.clone());
        let admin = AdminGate::open(&config, clock);
        Self {
            config,
            lockers,
            codes,
            admin,
        }
    }

    /// Release timed-out sessions and drop expired codes
    pub fn tick(&mut self) -> TickReport {
        let report = TickReport {
            released_lockers: self.lockers.sweep_expired_default(),
            removed_codes: self.codes.sweep_expired(),
        };
        tracing::debug!(
            released = report.released_lockers.len(),
            removed_codes = report.removed_codes,
            "Periodic sweep finished"
        );
        report
    }
}

/// File that `config set` writes to
#[must_use]
pub fn project_config_path(explicit: Option<&Path>) -> PathBuf {
    explicit
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from(PROJECT_CONFIG_FILE))
}
