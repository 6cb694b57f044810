use anyhow::{bail, Result};
use kiosk_core::payment::{payment_reference, qr_payment_url, ussd_code};
use serde::Serialize;

use super::print_json;
use crate::{cli::PayAction, context::Kiosk};

#[derive(Serialize)]
struct QrPayment {
    reference: String,
    amount: f64,
    url: String,
}

pub fn handle(kiosk: &Kiosk, action: PayAction, json: bool) -> Result<()> {
    let payment = &kiosk.config.payment;
    match action {
        PayAction::Qr { amount } => {
            let amount = amount.unwrap_or(payment.rental_price);
            if !amount.is_finite() || amount <= 0.0 {
                bail!("Payment amount must be positive, got {amount}");
            }
            let reference = payment_reference();
            let url = qr_payment_url(payment, amount, &reference);
            tracing::info!(reference = %reference, amount, "QR payment requested");

            if json {
                return print_json(&QrPayment {
                    reference,
                    amount,
                    url,
                });
            }
            println!("Reference: {reference}");
            println!("{url}");
        }
        PayAction::Ussd => {
            let code = ussd_code(payment);
            if json {
                return print_json(&serde_json::json!({ "ussd_code": code }));
            }
            println!("Dial {code} to pay");
        }
    }
    Ok(())
}
