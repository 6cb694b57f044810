use std::time::Duration;

use anyhow::Result;
use tokio::{signal, time::MissedTickBehavior};

use super::print_json;
use crate::context::{Kiosk, TickReport};

fn report(tick: &TickReport) {
    for id in &tick.released_lockers {
        println!("Released locker {id} (session timed out)");
    }
    if tick.removed_codes > 0 {
        println!("Removed {} expired prepaid code(s)", tick.removed_codes);
    }
}

pub fn tick(kiosk: &mut Kiosk, json: bool) -> Result<()> {
    let tick = kiosk.tick();
    if json {
        return print_json(&tick);
    }
    if tick == TickReport::default() {
        println!("Nothing to sweep");
    } else {
        report(&tick);
    }
    Ok(())
}

/// Sweep every `interval_secs` until Ctrl-C or `max_ticks` sweeps
pub async fn watch(kiosk: &mut Kiosk, interval_secs: u64, max_ticks: Option<u64>) -> Result<()> {
    let mut interval = tokio::time::interval(Duration::from_secs(interval_secs));
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let shutdown = signal::ctrl_c();
    tokio::pin!(shutdown);

    tracing::info!(interval_secs, "Watching for timed-out sessions and expired codes");

    let mut ticks = 0u64;
    loop {
        tokio::select! {
            _ = interval.tick() => {
                report(&kiosk.tick());
                ticks += 1;
                if max_ticks.is_some_and(|max| ticks >= max) {
                    break;
                }
            }
            result = &mut shutdown => {
                if let Err(e) = result {
                    tracing::warn!(error = %e, "Failed to listen for Ctrl-C");
                }
                break;
            }
        }
    }

    tracing::info!(ticks, "Watch stopped");
    Ok(())
}
