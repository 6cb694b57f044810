use anyhow::{bail, Result};
use kiosk_core::{LockerId, LockerManager, LockerSession, OccupancySummary, PaymentMethod};
use serde::Serialize;

use super::print_json;
use crate::context::Kiosk;

#[derive(Serialize)]
struct StatusView<'a> {
    occupancy: OccupancySummary,
    sessions: Vec<&'a LockerSession>,
    prepaid_codes: usize,
    charging_time_limit: u64,
}

#[derive(Serialize)]
struct LockerRow {
    id: LockerId,
    available: bool,
}

#[derive(Serialize)]
struct Reservation<'a> {
    locker_id: LockerId,
    access_code: &'a str,
    payment_method: PaymentMethod,
    amount_paid: f64,
}

pub fn status(kiosk: &Kiosk, json: bool) -> Result<()> {
    let view = StatusView {
        occupancy: kiosk.lockers.occupancy(),
        sessions: kiosk.lockers.active_sessions(),
        prepaid_codes: kiosk.codes.len(),
        charging_time_limit: kiosk.config.lockers.charging_time_limit,
    };
    if json {
        return print_json(&view);
    }

    println!(
        "Lockers: {} available, {} occupied, {} total",
        view.occupancy.available, view.occupancy.occupied, view.occupancy.total
    );
    let now = chrono::Utc::now();
    for session in &view.sessions {
        println!(
            "  #{:<3} {:<9} {:>8.2}  {}s elapsed",
            session.locker_id,
            session.payment_method,
            session.amount_paid,
            session.elapsed(now).num_seconds()
        );
    }
    println!("Prepaid codes on file: {}", view.prepaid_codes);
    println!("Charging time limit: {}s", view.charging_time_limit);
    Ok(())
}

pub fn list(kiosk: &Kiosk, json: bool) -> Result<()> {
    let rows: Vec<LockerRow> = kiosk
        .lockers
        .lockers()
        .map(|(id, occupied)| LockerRow {
            id,
            available: !occupied,
        })
        .collect();
    if json {
        return print_json(&rows);
    }

    for row in &rows {
        let state = if row.available { "free" } else { "occupied" };
        println!("{:>4}  {state}", row.id);
    }
    Ok(())
}

pub fn reserve(
    kiosk: &mut Kiosk,
    id: u32,
    code: Option<String>,
    method: PaymentMethod,
    amount: Option<f64>,
    voucher: Option<String>,
    json: bool,
) -> Result<()> {
    let id = LockerId::new(id);
    if !kiosk.lockers.exists(id) {
        bail!("Locker {id} does not exist");
    }
    if !kiosk.lockers.is_available(id) {
        bail!("Locker {id} is already occupied");
    }

    let (method, amount) = match voucher {
        Some(voucher) => {
            let value = match kiosk.codes.check(&voucher) {
                Ok(record) => record.value,
                Err(reason) => bail!("Prepaid code {voucher} cannot be redeemed ({reason})"),
            };
            if !kiosk.codes.consume(&voucher) {
                bail!("Prepaid code {voucher} cannot be redeemed");
            }
            (PaymentMethod::Prepaid, value)
        }
        None => {
            let default_amount = match method {
                PaymentMethod::Digicode => 0.0,
                _ => kiosk.config.payment.rental_price,
            };
            (method, amount.unwrap_or(default_amount))
        }
    };

    let access_code = code.unwrap_or_else(LockerManager::generate_access_code);
    if !kiosk
        .lockers
        .reserve(id, &access_code, method.label(), amount)
    {
        bail!("Locker {id} could not be reserved");
    }

    let reservation = Reservation {
        locker_id: id,
        access_code: &access_code,
        payment_method: method,
        amount_paid: amount,
    };
    if json {
        return print_json(&reservation);
    }
    println!("Locker {id} reserved ({method}, {amount:.2})");
    println!("Access code: {access_code}");
    Ok(())
}

pub fn unlock(kiosk: &Kiosk, id: u32, code: &str) -> Result<()> {
    let id = LockerId::new(id);
    if !kiosk.lockers.unlock(id, code) {
        bail!("Access denied for locker {id}");
    }
    println!("Locker {id} unlocked");
    Ok(())
}

pub fn release(kiosk: &mut Kiosk, id: u32) -> Result<()> {
    let id = LockerId::new(id);
    if !kiosk.lockers.release(id) {
        bail!("Locker {id} has no active rental");
    }
    println!("Locker {id} released");
    Ok(())
}

pub fn session(kiosk: &Kiosk, id: u32, json: bool) -> Result<()> {
    let id = LockerId::new(id);
    let Some(session) = kiosk.lockers.session_info(id) else {
        bail!("No active session on locker {id}");
    };
    if json {
        return print_json(session);
    }

    println!("Locker:   {}", session.locker_id);
    println!("Started:  {}", session.start_time.to_rfc3339());
    println!("Elapsed:  {}s", session.elapsed(chrono::Utc::now()).num_seconds());
    println!("Payment:  {}", session.payment_method);
    println!("Amount:   {:.2}", session.amount_paid);
    Ok(())
}
