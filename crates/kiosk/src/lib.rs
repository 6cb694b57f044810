//! Kiosk - operator console for the charging locker kiosk
//!
//! Wires the configuration, clock and both state managers together and
//! exposes them as commands, including the periodic sweep loop.

#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]
#![cfg_attr(not(test), deny(clippy::panic))]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

pub mod cli;
pub mod context;
pub mod setup;

pub use context::{Kiosk, TickReport};
