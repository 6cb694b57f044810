pub mod handlers;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use kiosk_core::PaymentMethod;

#[derive(Debug, Parser)]
#[command(name = "kiosk")]
#[command(version, about = "Locker rental and prepaid code console for the charging kiosk")]
pub struct Cli {
    /// Project config file (defaults to ./kiosk.toml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Override storage.data_dir
    #[arg(long, global = true)]
    pub data_dir: Option<PathBuf>,

    /// Print machine-readable JSON
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Show occupancy, active sessions and prepaid code counts
    Status,
    /// List every locker with its state
    Lockers,
    /// Start a rental on a free locker
    Reserve {
        /// Locker number
        id: u32,
        /// Personal access code (a 4-digit code is generated if omitted)
        #[arg(long)]
        code: Option<String>,
        /// How the rental was paid
        #[arg(long, default_value = "digicode")]
        method: PaymentMethod,
        /// Amount paid (defaults to payment.rental_price, 0 for digicode)
        #[arg(long, conflicts_with = "voucher")]
        amount: Option<f64>,
        /// Pay by redeeming a prepaid code; its value becomes the amount paid
        #[arg(long, conflicts_with = "method")]
        voucher: Option<String>,
    },
    /// Check a code against a locker
    Unlock {
        /// Locker number
        id: u32,
        /// User code or master code
        code: String,
    },
    /// End the rental on a locker
    Release {
        /// Locker number
        id: u32,
    },
    /// Show the active session on a locker
    Session {
        /// Locker number
        id: u32,
    },
    /// Inspect or redeem a prepaid code
    Code {
        #[command(subcommand)]
        action: CodeAction,
    },
    /// List every prepaid code
    Codes,
    /// External payment hand-off
    Pay {
        #[command(subcommand)]
        action: PayAction,
    },
    /// Operator actions gated by the master code
    Admin {
        /// Master code
        #[arg(long)]
        master_code: String,
        #[command(subcommand)]
        action: AdminAction,
    },
    /// Read or change configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
    /// Run one sweep of timed-out sessions and expired codes
    Tick,
    /// Run sweeps on a fixed interval until Ctrl-C
    Watch {
        /// Seconds between sweeps
        #[arg(long, default_value_t = 30, value_parser = clap::value_parser!(u64).range(1..))]
        interval: u64,
        /// Stop after this many sweeps
        #[arg(long)]
        max_ticks: Option<u64>,
    },
}

#[derive(Debug, Subcommand)]
pub enum CodeAction {
    /// Show a code's value if it can be redeemed
    Validate { code: String },
    /// Redeem a code
    Consume { code: String },
    /// Print a code's redeemable value (0 if not redeemable)
    Value { code: String },
}

#[derive(Debug, Subcommand)]
pub enum PayAction {
    /// Print the QR payment URL and its reference
    Qr {
        /// Amount to charge (defaults to payment.rental_price)
        #[arg(long)]
        amount: Option<f64>,
    },
    /// Print the USSD code to dial
    Ussd,
}

#[derive(Debug, Subcommand)]
pub enum AdminAction {
    /// Release every occupied locker
    ReleaseAll,
    /// Open a locker regardless of its session
    ForceOpen { id: u32 },
    /// Issue a new prepaid code
    Generate {
        /// Code value
        value: f64,
        /// Validity in days (defaults to payment.prepaid_validity_days)
        #[arg(long)]
        days: Option<u32>,
    },
    /// Remove expired prepaid codes
    SweepCodes,
}

#[derive(Debug, Subcommand)]
pub enum ConfigAction {
    /// Print a value by dotted key, or the whole config
    Get { key: Option<String> },
    /// Set a value by dotted key and save the project config file
    Set {
        key: String,
        value: String,
        /// Master code
        #[arg(long)]
        master_code: String,
    },
}
