//! Payment entry methods and external payment hand-off

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::{config::PaymentConfig, Error, Result};

/// How a rental was paid for or accessed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    /// Prepaid voucher code
    Prepaid,
    /// QR code handed to an external payment page
    Qr,
    /// USSD short code on the user's phone
    Ussd,
    /// Personal digicode, no payment
    Digicode,
}

impl PaymentMethod {
    /// Label stored on the session record
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Prepaid => "prepaid",
            Self::Qr => "qr",
            Self::Ussd => "ussd",
            Self::Digicode => "digicode",
        }
    }
}

impl std::fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for PaymentMethod {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "prepaid" => Ok(Self::Prepaid),
            "qr" => Ok(Self::Qr),
            "ussd" => Ok(Self::Ussd),
            "digicode" => Ok(Self::Digicode),
            _ => Err(Error::Validation(format!(
                "Invalid payment method: {s}. Must be one of: prepaid, qr, ussd, digicode"
            ))),
        }
    }
}

/// URL encoded into the payment QR code
#[must_use]
pub fn qr_payment_url(config: &PaymentConfig, amount: f64, reference: &str) -> String {
    format!("{}?amount={amount}&ref={reference}", config.qr_payment_url)
}

/// USSD string the user dials to pay
#[must_use]
pub fn ussd_code(config: &PaymentConfig) -> &str {
    &config.ussd_code
}

/// Short uppercase reference for an external payment
#[must_use]
pub fn payment_reference() -> String {
    uuid::Uuid::new_v4().simple().to_string()[..8].to_uppercase()
}
