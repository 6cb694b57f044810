use anyhow::{bail, Result};
use serde::Serialize;

use super::print_json;
use crate::{cli::CodeAction, context::Kiosk};

#[derive(Serialize)]
struct Redeemable<'a> {
    code: &'a str,
    value: f64,
}

pub fn handle(kiosk: &mut Kiosk, action: CodeAction, json: bool) -> Result<()> {
    match action {
        CodeAction::Validate { code } => {
            let record = match kiosk.codes.check(&code) {
                Ok(record) => record,
                Err(reason) => bail!("Prepaid code {code} is {reason}"),
            };
            let view = Redeemable {
                code: &record.code,
                value: record.value,
            };
            if json {
                return print_json(&view);
            }
            println!(
                "{} is valid for {:.2} until {}",
                view.code,
                view.value,
                record.expiry_date.to_rfc3339()
            );
        }
        CodeAction::Consume { code } => {
            let value = match kiosk.codes.check(&code) {
                Ok(record) => record.value,
                Err(reason) => bail!("Prepaid code {code} is {reason}"),
            };
            if !kiosk.codes.consume(&code) {
                bail!("Prepaid code {code} could not be redeemed");
            }
            if json {
                return print_json(&Redeemable { code: &code, value });
            }
            println!("Redeemed {code} for {value:.2}");
        }
        CodeAction::Value { code } => {
            let value = kiosk.codes.code_value(&code);
            if json {
                return print_json(&Redeemable { code: &code, value });
            }
            println!("{value:.2}");
        }
    }
    Ok(())
}

pub fn list(kiosk: &Kiosk, json: bool) -> Result<()> {
    let codes = kiosk.codes.codes();
    if json {
        return print_json(&codes);
    }

    if codes.is_empty() {
        println!("No prepaid codes on file");
        return Ok(());
    }
    for status in &codes {
        let state = if status.used {
            "used"
        } else if status.expired {
            "expired"
        } else {
            "valid"
        };
        println!(
            "{}  {:>8.2}  {:<7}  expires {}",
            status.code,
            status.value,
            state,
            status.expiry_date.format("%Y-%m-%d")
        );
    }
    Ok(())
}
