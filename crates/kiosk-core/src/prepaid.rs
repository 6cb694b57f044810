//! Prepaid value codes
//!
//! Codes are single-use, time-bounded vouchers. `validate` and `consume`
//! are separate steps so the kiosk can show a code's value before
//! redeeming it; that read-then-act sequence is only sound because every
//! call happens on one thread.

use std::{collections::HashMap, sync::Arc};

use chrono::{DateTime, Duration, Utc};
use rand::{rngs::OsRng, Rng};
use serde::{Deserialize, Serialize};

use crate::{clock::Clock, config::KioskConfig, store::JsonFile, Error, Result};

/// Characters a generated code is drawn from
pub const CODE_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// A stored prepaid code
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrepaidCode {
    pub code: String,
    pub value: f64,
    #[serde(with = "crate::timestamp")]
    pub created_date: DateTime<Utc>,
    #[serde(with = "crate::timestamp")]
    pub expiry_date: DateTime<Utc>,
    #[serde(default)]
    pub is_used: bool,
    #[serde(with = "crate::timestamp::option", default)]
    pub used_date: Option<DateTime<Utc>>,
}

impl PrepaidCode {
    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.expiry_date
    }
}

/// Why a code cannot be redeemed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodeRejection {
    Unknown,
    AlreadyUsed,
    Expired,
}

impl std::fmt::Display for CodeRejection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unknown => write!(f, "unknown"),
            Self::AlreadyUsed => write!(f, "already used"),
            Self::Expired => write!(f, "expired"),
        }
    }
}

/// Admin listing row
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CodeStatus {
    pub code: String,
    pub value: f64,
    pub created_date: DateTime<Utc>,
    pub expiry_date: DateTime<Utc>,
    pub used: bool,
    pub expired: bool,
}

/// Generates, validates, consumes and expires prepaid codes
pub struct PrepaidCodeManager {
    code_length: usize,
    validity_days: u32,
    clock: Arc<dyn Clock>,
    codes: HashMap<String, PrepaidCode>,
    file: JsonFile<Vec<PrepaidCode>>,
}

impl std::fmt::Debug for PrepaidCodeManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PrepaidCodeManager")
            .field("code_length", &self.code_length)
            .field("codes", &self.codes.len())
            .field("file", &self.file.path())
            .finish_non_exhaustive()
    }
}

impl PrepaidCodeManager {
    /// Load the persisted codes
    #[must_use]
    pub fn open(config: &KioskConfig, clock: Arc<dyn Clock>) -> Self {
        let file: JsonFile<Vec<PrepaidCode>> = JsonFile::new(config.codes_path());
        let codes: HashMap<String, PrepaidCode> = file
            .load()
            .unwrap_or_default()
            .into_iter()
            .map(|c| (c.code.clone(), c))
            .collect();

        tracing::info!(target: "kiosk::prepaid", codes = codes.len(), "Prepaid codes loaded");

        Self {
            code_length: config.payment.prepaid_code_length,
            validity_days: config.payment.prepaid_validity_days,
            clock,
            codes,
            file,
        }
    }

    /// Number of codes held, used and expired included
    #[must_use]
    pub fn len(&self) -> usize {
        self.codes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.codes.is_empty()
    }

    /// Issue a new code worth `value`, valid for `validity_days`
    ///
    /// # Errors
    ///
    /// Returns `Validation` for a non-positive or non-finite value or a
    /// validity that puts the expiry past the representable date range, and
    /// `CodeSpaceExhausted` when no unused code of the configured length
    /// remains.
    pub fn generate(&mut self, value: f64, validity_days: u32) -> Result<String> {
        if !value.is_finite() || value <= 0.0 {
            return Err(Error::Validation(format!(
                "Prepaid code value must be positive, got {value}"
            )));
        }
        if self.code_space_exhausted() {
            return Err(Error::CodeSpaceExhausted {
                length: self.code_length,
            });
        }

        let now = self.clock.now();
        let expiry_date = Duration::try_days(i64::from(validity_days))
            .and_then(|validity| now.checked_add_signed(validity))
            .ok_or_else(|| {
                Error::Validation(format!(
                    "Prepaid code validity of {validity_days} days is out of range"
                ))
            })?;

        let code = loop {
            let candidate = self.draw_code();
            if !self.codes.contains_key(&candidate) {
                break candidate;
            }
        };

        let record = PrepaidCode {
            code: code.clone(),
            value,
            created_date: now,
            expiry_date,
            is_used: false,
            used_date: None,
        };
        self.codes.insert(code.clone(), record);
        self.persist();

        tracing::info!(
            target: "kiosk::prepaid",
            code = %code,
            value,
            validity_days,
            "Prepaid code generated"
        );
        Ok(code)
    }

    /// [`generate`](Self::generate) with `payment.prepaid_validity_days`
    ///
    /// # Errors
    ///
    /// See [`generate`](Self::generate).
    pub fn generate_default(&mut self, value: f64) -> Result<String> {
        self.generate(value, self.validity_days)
    }

    /// Look a code up and say why it cannot be redeemed, if it cannot
    pub fn check(&self, code: &str) -> std::result::Result<&PrepaidCode, CodeRejection> {
        let record = self.codes.get(code).ok_or(CodeRejection::Unknown)?;
        if record.is_used {
            return Err(CodeRejection::AlreadyUsed);
        }
        if record.is_expired(self.clock.now()) {
            return Err(CodeRejection::Expired);
        }
        Ok(record)
    }

    /// The code's record if it exists, is unused and has not expired
    #[must_use]
    pub fn validate(&self, code: &str) -> Option<&PrepaidCode> {
        match self.check(code) {
            Ok(record) => Some(record),
            Err(reason) => {
                tracing::warn!(
                    target: "kiosk::prepaid",
                    code = %code,
                    reason = %reason,
                    "Prepaid code rejected"
                );
                None
            }
        }
    }

    /// Redeem a valid code
    pub fn consume(&mut self, code: &str) -> bool {
        if self.validate(code).is_none() {
            return false;
        }

        let now = self.clock.now();
        if let Some(record) = self.codes.get_mut(code) {
            record.is_used = true;
            record.used_date = Some(now);
        }
        self.persist();

        tracing::info!(target: "kiosk::prepaid", code = %code, "Prepaid code consumed");
        true
    }

    /// Value of a redeemable code, `0.0` otherwise
    #[must_use]
    pub fn code_value(&self, code: &str) -> f64 {
        self.validate(code).map_or(0.0, |record| record.value)
    }

    /// Raw record lookup, without validity checks
    #[must_use]
    pub fn get(&self, code: &str) -> Option<&PrepaidCode> {
        self.codes.get(code)
    }

    /// Drop every code past its expiry, returning how many were removed
    pub fn sweep_expired(&mut self) -> usize {
        let now = self.clock.now();
        let before = self.codes.len();

        self.codes.retain(|code, record| {
            let keep = !record.is_expired(now);
            if !keep {
                tracing::info!(target: "kiosk::prepaid", code = %code, "Expired prepaid code removed");
            }
            keep
        });

        let removed = before - self.codes.len();
        if removed > 0 {
            self.persist();
        }
        removed
    }

    /// Every held code with its state, oldest first
    #[must_use]
    pub fn codes(&self) -> Vec<CodeStatus> {
        let now = self.clock.now();
        let mut rows: Vec<CodeStatus> = self
            .codes
            .values()
            .map(|record| CodeStatus {
                code: record.code.clone(),
                value: record.value,
                created_date: record.created_date,
                expiry_date: record.expiry_date,
                used: record.is_used,
                expired: record.is_expired(now),
            })
            .collect();
        rows.sort_by(|a, b| {
            a.created_date
                .cmp(&b.created_date)
                .then_with(|| a.code.cmp(&b.code))
        });
        rows
    }

    fn draw_code(&self) -> String {
        let mut rng = OsRng;
        (0..self.code_length)
            .map(|_| char::from(CODE_ALPHABET[rng.gen_range(0..CODE_ALPHABET.len())]))
            .collect()
    }

    fn code_space_exhausted(&self) -> bool {
        let Some(space) = u32::try_from(self.code_length)
            .ok()
            .and_then(|len| (CODE_ALPHABET.len() as u128).checked_pow(len))
        else {
            return false;
        };
        let held = self
            .codes
            .keys()
            .filter(|code| code.len() == self.code_length)
            .count() as u128;
        held >= space
    }

    fn persist(&self) {
        let mut records: Vec<PrepaidCode> = self.codes.values().cloned().collect();
        records.sort_by(|a, b| a.created_date.cmp(&b.created_date));
        self.file.save_or_log(&records);
    }
}
