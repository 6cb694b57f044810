//! Kiosk-core - state management for the charging locker kiosk
//!
//! This crate provides:
//! - Locker occupancy and rental session tracking
//! - Prepaid code generation, validation and consumption
//! - Layered kiosk configuration
//! - Best-effort JSON persistence for both stores

#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]
#![cfg_attr(not(test), deny(clippy::panic))]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

pub mod admin;
pub mod clock;
pub mod config;
pub mod error;
pub mod locker;
pub mod payment;
pub mod prepaid;
pub mod store;
mod timestamp;

pub use admin::{AdminAttempts, AdminGate, AuthOutcome};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::KioskConfig;
pub use error::{Error, Result};
pub use locker::{LockerId, LockerManager, LockerSession, OccupancySummary};
pub use payment::PaymentMethod;
pub use prepaid::{CodeRejection, CodeStatus, PrepaidCode, PrepaidCodeManager};
pub use store::JsonFile;
