//! Operator authentication against the master code
//!
//! Failed attempts survive process restarts when the gate is opened on a
//! data directory, so a lockout holds across separate CLI invocations. A
//! lockout ends once `security.lockout_duration` has passed.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    clock::Clock,
    config::{saturating_seconds, KioskConfig, SecurityConfig},
    store::JsonFile,
};

/// Result of one login attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthOutcome {
    /// Code accepted
    Granted,
    /// Code rejected, more attempts allowed
    Denied {
        /// Failures so far
        attempts: u32,
        /// Failures allowed before lockout
        max_attempts: u32,
    },
    /// Too many failures; further attempts are refused until the lockout ends
    LockedOut,
}

/// Persisted failure counter
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdminAttempts {
    #[serde(default)]
    pub failed_attempts: u32,
    #[serde(with = "crate::timestamp::option", default)]
    pub locked_at: Option<DateTime<Utc>>,
}

/// Counts failed master-code attempts for the admin panel
pub struct AdminGate {
    master_code: String,
    max_attempts: u32,
    lockout: Duration,
    clock: Arc<dyn Clock>,
    state: AdminAttempts,
    file: Option<JsonFile<AdminAttempts>>,
}

impl std::fmt::Debug for AdminGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdminGate")
            .field("max_attempts", &self.max_attempts)
            .field("state", &self.state)
            .field("file", &self.file.as_ref().map(JsonFile::path))
            .finish_non_exhaustive()
    }
}

impl AdminGate {
    /// In-memory gate; the counter lives as long as the value
    #[must_use]
    pub fn new(security: &SecurityConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            master_code: security.master_code.clone(),
            max_attempts: security.max_attempts,
            lockout: saturating_seconds(security.lockout_duration),
            clock,
            state: AdminAttempts::default(),
            file: None,
        }
    }

    /// Gate backed by `storage.admin_file` in the data directory
    #[must_use]
    pub fn open(config: &KioskConfig, clock: Arc<dyn Clock>) -> Self {
        let file = JsonFile::new(config.admin_path());
        let state = file.load().unwrap_or_default();
        Self {
            state,
            file: Some(file),
            ..Self::new(&config.security, clock)
        }
    }

    /// Check an entered code
    pub fn authenticate(&mut self, code: &str) -> AuthOutcome {
        self.expire_lockout();

        if self.is_locked_out() {
            tracing::warn!(target: "kiosk::admin", "Admin login refused, locked out");
            return AuthOutcome::LockedOut;
        }

        if code == self.master_code {
            if self.state != AdminAttempts::default() {
                self.state = AdminAttempts::default();
                self.persist();
            }
            tracing::info!(target: "kiosk::admin", "Admin login succeeded");
            return AuthOutcome::Granted;
        }

        self.state.failed_attempts = self.state.failed_attempts.saturating_add(1);
        if self.is_locked_out() {
            self.state.locked_at = Some(self.clock.now());
        }
        self.persist();

        tracing::warn!(
            target: "kiosk::admin",
            attempts = self.state.failed_attempts,
            max_attempts = self.max_attempts,
            "Admin login failed"
        );

        if self.is_locked_out() {
            AuthOutcome::LockedOut
        } else {
            AuthOutcome::Denied {
                attempts: self.state.failed_attempts,
                max_attempts: self.max_attempts,
            }
        }
    }

    #[must_use]
    pub const fn failed_attempts(&self) -> u32 {
        self.state.failed_attempts
    }

    #[must_use]
    pub const fn is_locked_out(&self) -> bool {
        self.state.failed_attempts >= self.max_attempts
    }

    /// Clear the failure counter (logout or return to the home screen)
    pub fn reset(&mut self) {
        self.state = AdminAttempts::default();
        self.persist();
    }

    fn expire_lockout(&mut self) {
        let now = self.clock.now();
        let Some(locked_at) = self.state.locked_at else {
            // Counter at the limit with no start time: start the lockout now
            if self.is_locked_out() {
                self.state.locked_at = Some(now);
                self.persist();
            }
            return;
        };
        if now - locked_at >= self.lockout {
            tracing::info!(target: "kiosk::admin", "Admin lockout expired");
            self.reset();
        }
    }

    fn persist(&self) {
        if let Some(file) = &self.file {
            file.save_or_log(&self.state);
        }
    }
}
