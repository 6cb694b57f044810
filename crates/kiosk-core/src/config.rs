//! Kiosk configuration loading and management
//!
//! # Hierarchy
//!
//! Configuration is loaded in this order (later overrides earlier):
//! 1. Built-in defaults
//! 2. Global config: `<config dir>/kiosk/config.toml`
//! 3. Project config: `./kiosk.toml` (or an explicit path)
//! 4. Environment variables: `KIOSK_*`
//!
//! A key that is absent everywhere resolves to its default; a missing
//! config file is skipped silently.
//!
//! # Example Config
//!
//! ```toml
//! [security]
//! master_code = "4821"
//! session_timeout = 600
//!
//! [lockers]
//! count = 12
//!
//! [payment]
//! prepaid_code_length = 10
//! ussd_code = "*144#"
//!
//! [storage]
//! data_dir = "/var/lib/kiosk"
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Project config file looked up in the working directory
pub const PROJECT_CONFIG_FILE: &str = "kiosk.toml";

/// Upper bound for `security.session_timeout` and `security.lockout_duration` (one year)
pub const MAX_DURATION_SECS: u64 = 365 * 24 * 60 * 60;

/// Upper bound for `payment.prepaid_validity_days` (ten years)
pub const MAX_VALIDITY_DAYS: u32 = 3650;

// ═══════════════════════════════════════════════════════════════════════════
// CONFIGURATION STRUCTURES
// ═══════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct KioskConfig {
    pub security: SecurityConfig,
    pub lockers: LockersConfig,
    pub payment: PaymentConfig,
    pub storage: StorageConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct SecurityConfig {
    /// Override credential accepted by every locker
    pub master_code: String,
    /// Seconds after which an active session is released by the sweep
    pub session_timeout: u64,
    /// Consecutive admin login failures before lockout
    pub max_attempts: u32,
    /// Seconds an admin lockout lasts
    pub lockout_duration: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct LockersConfig {
    pub count: u32,
    pub charging_time_limit: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PaymentConfig {
    pub prepaid_code_length: usize,
    pub prepaid_validity_days: u32,
    pub ussd_code: String,
    pub qr_payment_url: String,
    pub rental_price: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct StorageConfig {
    pub data_dir: PathBuf,
    pub lockers_file: String,
    pub sessions_file: String,
    pub codes_file: String,
    pub admin_file: String,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            master_code: "9999".to_string(),
            session_timeout: 300,
            max_attempts: 3,
            lockout_duration: 300,
        }
    }
}

impl Default for LockersConfig {
    fn default() -> Self {
        Self {
            count: 8,
            charging_time_limit: 7200,
        }
    }
}

impl Default for PaymentConfig {
    fn default() -> Self {
        Self {
            prepaid_code_length: 8,
            prepaid_validity_days: 365,
            ussd_code: "*123#".to_string(),
            qr_payment_url: "https://payment.example.com".to_string(),
            rental_price: 5.0,
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            lockers_file: "lockers.json".to_string(),
            sessions_file: "sessions.json".to_string(),
            codes_file: "prepaid_codes.json".to_string(),
            admin_file: "admin.json".to_string(),
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// PARTIAL CONFIG (explicit-key merge semantics)
// ═══════════════════════════════════════════════════════════════════════════

/// Partial configuration with `Option<T>` fields.
///
/// Only keys present in a file become `Some`, so a file that sets
/// `lockers.count` alone does not reset anything else.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct PartialKioskConfig {
    pub security: Option<PartialSecurityConfig>,
    pub lockers: Option<PartialLockersConfig>,
    pub payment: Option<PartialPaymentConfig>,
    pub storage: Option<PartialStorageConfig>,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct PartialSecurityConfig {
    pub master_code: Option<String>,
    pub session_timeout: Option<u64>,
    pub max_attempts: Option<u32>,
    pub lockout_duration: Option<u64>,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct PartialLockersConfig {
    pub count: Option<u32>,
    pub charging_time_limit: Option<u64>,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct PartialPaymentConfig {
    pub prepaid_code_length: Option<usize>,
    pub prepaid_validity_days: Option<u32>,
    pub ussd_code: Option<String>,
    pub qr_payment_url: Option<String>,
    pub rental_price: Option<f64>,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct PartialStorageConfig {
    pub data_dir: Option<PathBuf>,
    pub lockers_file: Option<String>,
    pub sessions_file: Option<String>,
    pub codes_file: Option<String>,
    pub admin_file: Option<String>,
}

impl SecurityConfig {
    fn merge_partial(&mut self, partial: PartialSecurityConfig) {
        if let Some(master_code) = partial.master_code {
            self.master_code = master_code;
        }
        if let Some(session_timeout) = partial.session_timeout {
            self.session_timeout = session_timeout;
        }
        if let Some(max_attempts) = partial.max_attempts {
            self.max_attempts = max_attempts;
        }
        if let Some(lockout_duration) = partial.lockout_duration {
            self.lockout_duration = lockout_duration;
        }
    }
}

impl LockersConfig {
    #[allow(clippy::needless_pass_by_value)]
    #[allow(clippy::missing_const_for_fn)]
    fn merge_partial(&mut self, partial: PartialLockersConfig) {
        if let Some(count) = partial.count {
            self.count = count;
        }
        if let Some(charging_time_limit) = partial.charging_time_limit {
            self.charging_time_limit = charging_time_limit;
        }
    }
}

impl PaymentConfig {
    fn merge_partial(&mut self, partial: PartialPaymentConfig) {
        if let Some(prepaid_code_length) = partial.prepaid_code_length {
            self.prepaid_code_length = prepaid_code_length;
        }
        if let Some(prepaid_validity_days) = partial.prepaid_validity_days {
            self.prepaid_validity_days = prepaid_validity_days;
        }
        if let Some(ussd_code) = partial.ussd_code {
            self.ussd_code = ussd_code;
        }
        if let Some(qr_payment_url) = partial.qr_payment_url {
            self.qr_payment_url = qr_payment_url;
        }
        if let Some(rental_price) = partial.rental_price {
            self.rental_price = rental_price;
        }
    }
}

impl StorageConfig {
    fn merge_partial(&mut self, partial: PartialStorageConfig) {
        if let Some(data_dir) = partial.data_dir {
            self.data_dir = data_dir;
        }
        if let Some(lockers_file) = partial.lockers_file {
            self.lockers_file = lockers_file;
        }
        if let Some(sessions_file) = partial.sessions_file {
            self.sessions_file = sessions_file;
        }
        if let Some(codes_file) = partial.codes_file {
            self.codes_file = codes_file;
        }
        if let Some(admin_file) = partial.admin_file {
            self.admin_file = admin_file;
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// CONFIG KEY SCHEMA
// ═══════════════════════════════════════════════════════════════════════════

/// Settable configuration keys in dot-notation
const VALID_KEYS: &[&str] = &[
    "security.master_code",
    "security.session_timeout",
    "security.max_attempts",
    "security.lockout_duration",
    "lockers.count",
    "lockers.charging_time_limit",
    "payment.prepaid_code_length",
    "payment.prepaid_validity_days",
    "payment.ussd_code",
    "payment.qr_payment_url",
    "payment.rental_price",
    "storage.data_dir",
    "storage.lockers_file",
    "storage.sessions_file",
    "storage.codes_file",
    "storage.admin_file",
];

/// Validate a dotted configuration key
///
/// # Errors
///
/// Returns `Error::UnknownKey` listing the valid keys.
pub fn validate_key(key: &str) -> Result<()> {
    if VALID_KEYS.contains(&key) {
        Ok(())
    } else {
        Err(Error::UnknownKey(format!(
            "'{key}'. Valid keys: {}",
            VALID_KEYS.join(", ")
        )))
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// CONFIG METHODS
// ═══════════════════════════════════════════════════════════════════════════

impl KioskConfig {
    /// Load defaults, the global file, the project file and the environment
    ///
    /// `project` overrides the default `./kiosk.toml` lookup.
    ///
    /// # Errors
    ///
    /// Returns error if a present config file is malformed, an environment
    /// override does not parse, or the merged values fail validation.
    pub fn load(project: Option<&Path>) -> Result<Self> {
        let mut layers = Vec::new();
        if let Some(global) = global_config_path() {
            layers.push(global);
        }
        layers.push(
            project
                .map(Path::to_path_buf)
                .unwrap_or_else(|| PathBuf::from(PROJECT_CONFIG_FILE)),
        );
        Self::load_layers(&layers)
    }

    /// Merge the given files over the defaults, then apply the environment
    ///
    /// # Errors
    ///
    /// See [`KioskConfig::load`].
    pub fn load_layers(paths: &[PathBuf]) -> Result<Self> {
        let mut config = Self::default();

        for path in paths {
            if let Some(partial) = load_partial_toml_file(path)? {
                config.merge_partial(partial);
            }
        }

        config.apply_env_vars()?;
        config.validate()?;
        Ok(config)
    }

    /// Merge partial config into this one using explicit-key semantics
    pub fn merge_partial(&mut self, partial: PartialKioskConfig) {
        if let Some(security) = partial.security {
            self.security.merge_partial(security);
        }
        if let Some(lockers) = partial.lockers {
            self.lockers.merge_partial(lockers);
        }
        if let Some(payment) = partial.payment {
            self.payment.merge_partial(payment);
        }
        if let Some(storage) = partial.storage {
            self.storage.merge_partial(storage);
        }
    }

    /// Apply environment variable overrides
    ///
    /// # Errors
    ///
    /// Returns error if a numeric variable does not parse
    fn apply_env_vars(&mut self) -> Result<()> {
        if let Ok(value) = std::env::var("KIOSK_MASTER_CODE") {
            self.security.master_code = value;
        }

        if let Ok(value) = std::env::var("KIOSK_SESSION_TIMEOUT") {
            self.security.session_timeout = value.trim().parse().map_err(|e| {
                Error::InvalidConfig(format!("Invalid KIOSK_SESSION_TIMEOUT value: {e}"))
            })?;
        }

        if let Ok(value) = std::env::var("KIOSK_LOCKER_COUNT") {
            self.lockers.count = value.trim().parse().map_err(|e| {
                Error::InvalidConfig(format!("Invalid KIOSK_LOCKER_COUNT value: {e}"))
            })?;
        }

        if let Ok(value) = std::env::var("KIOSK_CODE_LENGTH") {
            self.payment.prepaid_code_length = value.trim().parse().map_err(|e| {
                Error::InvalidConfig(format!("Invalid KIOSK_CODE_LENGTH value: {e}"))
            })?;
        }

        if let Ok(value) = std::env::var("KIOSK_DATA_DIR") {
            self.storage.data_dir = PathBuf::from(value);
        }

        Ok(())
    }

    /// Validate configuration values
    ///
    /// # Errors
    ///
    /// Returns error if any value is out of range
    pub fn validate(&self) -> Result<()> {
        if self.security.master_code.is_empty() {
            return Err(Error::InvalidConfig(
                "security.master_code must not be empty".to_string(),
            ));
        }
        if self.security.session_timeout > MAX_DURATION_SECS {
            return Err(Error::InvalidConfig(format!(
                "security.session_timeout must be at most {MAX_DURATION_SECS} seconds"
            )));
        }
        if self.security.lockout_duration > MAX_DURATION_SECS {
            return Err(Error::InvalidConfig(format!(
                "security.lockout_duration must be at most {MAX_DURATION_SECS} seconds"
            )));
        }
        if self.security.max_attempts == 0 {
            return Err(Error::InvalidConfig(
                "security.max_attempts must be at least 1".to_string(),
            ));
        }
        if self.lockers.count == 0 {
            return Err(Error::InvalidConfig(
                "lockers.count must be at least 1".to_string(),
            ));
        }
        if !(1..=32).contains(&self.payment.prepaid_code_length) {
            return Err(Error::InvalidConfig(
                "payment.prepaid_code_length must be 1-32".to_string(),
            ));
        }
        if !(1..=MAX_VALIDITY_DAYS).contains(&self.payment.prepaid_validity_days) {
            return Err(Error::InvalidConfig(format!(
                "payment.prepaid_validity_days must be 1-{MAX_VALIDITY_DAYS}"
            )));
        }
        if !self.payment.rental_price.is_finite() || self.payment.rental_price < 0.0 {
            return Err(Error::InvalidConfig(
                "payment.rental_price must be a non-negative number".to_string(),
            ));
        }
        Ok(())
    }

    /// Read a value by dotted key, e.g. `security.master_code`
    #[must_use]
    pub fn get(&self, key: &str) -> Option<toml::Value> {
        let root = toml::Value::try_from(self).ok()?;
        key.split('.')
            .try_fold(&root, |node, part| node.get(part))
            .cloned()
    }

    /// Set a value by dotted key from its textual form
    ///
    /// The raw value is parsed as the type the key already holds. The
    /// config is left untouched when the key is unknown, the value does
    /// not parse, or the result fails validation.
    ///
    /// # Errors
    ///
    /// Returns `UnknownKey`, `InvalidConfig` or `Parse`.
    pub fn set(&mut self, key: &str, raw: &str) -> Result<()> {
        validate_key(key)?;

        let mut root = toml::Value::try_from(&*self)
            .map_err(|e| Error::Parse(format!("Failed to encode config: {e}")))?;

        let (section, field) = key
            .split_once('.')
            .ok_or_else(|| Error::UnknownKey(key.to_string()))?;
        let slot = root
            .get_mut(section)
            .and_then(|s| s.get_mut(field))
            .ok_or_else(|| Error::UnknownKey(key.to_string()))?;

        *slot = parse_like(slot, raw)
            .map_err(|e| Error::InvalidConfig(format!("Invalid value for {key}: {e}")))?;

        let updated: Self = root
            .try_into()
            .map_err(|e| Error::InvalidConfig(format!("Invalid value for {key}: {e}")))?;
        updated.validate()?;
        *self = updated;
        Ok(())
    }

    /// Write the full configuration as TOML
    ///
    /// # Errors
    ///
    /// Returns error if encoding fails or the file cannot be written
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| Error::Parse(format!("Failed to encode config: {e}")))?;

        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir)
                .map_err(|e| Error::Io(format!("Failed to create {}: {e}", dir.display())))?;
        }

        std::fs::write(path, content)
            .map_err(|e| Error::Io(format!("Failed to write {}: {e}", path.display())))
    }

    /// Session timeout as a duration, saturating for unvalidated values
    #[must_use]
    pub fn session_timeout(&self) -> chrono::Duration {
        saturating_seconds(self.security.session_timeout)
    }

    /// Admin lockout length as a duration, saturating for unvalidated values
    #[must_use]
    pub fn lockout_duration(&self) -> chrono::Duration {
        saturating_seconds(self.security.lockout_duration)
    }

    /// Path of the locker occupancy document
    #[must_use]
    pub fn lockers_path(&self) -> PathBuf {
        self.storage.data_dir.join(&self.storage.lockers_file)
    }

    /// Path of the active session document
    #[must_use]
    pub fn sessions_path(&self) -> PathBuf {
        self.storage.data_dir.join(&self.storage.sessions_file)
    }

    /// Path of the prepaid code document
    #[must_use]
    pub fn codes_path(&self) -> PathBuf {
        self.storage.data_dir.join(&self.storage.codes_file)
    }

    /// Path of the admin login attempt document
    #[must_use]
    pub fn admin_path(&self) -> PathBuf {
        self.storage.data_dir.join(&self.storage.admin_file)
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// HELPER FUNCTIONS
// ═══════════════════════════════════════════════════════════════════════════

/// Seconds as a duration, `Duration::MAX` when out of range
pub(crate) fn saturating_seconds(secs: u64) -> chrono::Duration {
    i64::try_from(secs)
        .ok()
        .and_then(chrono::Duration::try_seconds)
        .unwrap_or(chrono::Duration::MAX)
}

/// Get path to the global config file
pub fn global_config_path() -> Option<PathBuf> {
    directories::ProjectDirs::from("", "", "kiosk")
        .map(|dirs| dirs.config_dir().join("config.toml"))
}

/// Load a TOML file into a `PartialKioskConfig`
///
/// Returns `Ok(None)` when the file does not exist.
///
/// # Errors
///
/// Returns error if the file cannot be read or is not valid config TOML
pub fn load_partial_toml_file(path: &Path) -> Result<Option<PartialKioskConfig>> {
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => {
            return Err(Error::Io(format!(
                "Failed to read config file {}: {e}",
                path.display()
            )))
        }
    };

    toml::from_str(&content)
        .map(Some)
        .map_err(|e| Error::Parse(format!("Failed to parse config {}: {e}", path.display())))
}

/// Parse `raw` into a TOML value of the same kind as `current`
fn parse_like(current: &toml::Value, raw: &str) -> std::result::Result<toml::Value, String> {
    let raw = raw.trim();
    match current {
        toml::Value::Integer(_) => raw
            .parse::<i64>()
            .map(toml::Value::Integer)
            .map_err(|e| e.to_string()),
        toml::Value::Float(_) => raw
            .parse::<f64>()
            .map(toml::Value::Float)
            .map_err(|e| e.to_string()),
        toml::Value::Boolean(_) => raw
            .parse::<bool>()
            .map(toml::Value::Boolean)
            .map_err(|e| e.to_string()),
        toml::Value::String(_) => Ok(toml::Value::String(raw.to_string())),
        other => Err(format!("cannot set a {} value", other.type_str())),
    }
}
