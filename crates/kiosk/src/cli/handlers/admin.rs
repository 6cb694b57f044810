use anyhow::{bail, Context, Result};
use kiosk_core::{AdminGate, AuthOutcome, LockerId};
use serde::Serialize;

use super::print_json;
use crate::{cli::AdminAction, context::Kiosk};

#[derive(Serialize)]
struct IssuedCode<'a> {
    code: &'a str,
    value: f64,
    validity_days: u32,
}

/// Refuse unless `master_code` opens the admin gate
pub fn authorize(gate: &mut AdminGate, master_code: &str) -> Result<()> {
    match gate.authenticate(master_code) {
        AuthOutcome::Granted => Ok(()),
        AuthOutcome::Denied {
            attempts,
            max_attempts,
        } => bail!("Invalid master code ({attempts}/{max_attempts} attempts)"),
        AuthOutcome::LockedOut => bail!("Admin access locked out"),
    }
}

pub fn handle(kiosk: &mut Kiosk, master_code: &str, action: AdminAction, json: bool) -> Result<()> {
    authorize(&mut kiosk.admin, master_code)?;

    match action {
        AdminAction::ReleaseAll => {
            let released = kiosk.lockers.release_all();
            if json {
                return print_json(&serde_json::json!({ "released": released }));
            }
            println!("Released {released} locker(s)");
        }
        AdminAction::ForceOpen { id } => {
            let id = LockerId::new(id);
            if !kiosk.lockers.force_open(id) {
                bail!("Locker {id} does not exist");
            }
            println!("Locker {id} opened");
        }
        AdminAction::Generate { value, days } => {
            let validity_days = days.unwrap_or(kiosk.config.payment.prepaid_validity_days);
            let code = kiosk
                .codes
                .generate(value, validity_days)
                .context("Failed to generate prepaid code")?;
            if json {
                return print_json(&IssuedCode {
                    code: &code,
                    value,
                    validity_days,
                });
            }
            println!("{code}");
        }
        AdminAction::SweepCodes => {
            let removed = kiosk.codes.sweep_expired();
            if json {
                return print_json(&serde_json::json!({ "removed": removed }));
            }
            println!("Removed {removed} expired code(s)");
        }
    }
    Ok(())
}
