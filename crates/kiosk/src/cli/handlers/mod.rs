mod admin;
mod code;
mod config;
mod locker;
mod pay;
mod sweep;

use anyhow::{Context, Result};
use serde::Serialize;

use super::{Cli, Commands};
use crate::context::Kiosk;

pub async fn dispatch(cli: Cli) -> Result<()> {
    let Cli {
        config: config_file,
        data_dir,
        json,
        command,
    } = cli;
    let config_path = config_file.as_deref();
    let data_dir = data_dir.as_deref();
    let open = || Kiosk::open(config_path, data_dir);

    match command {
        Commands::Status => locker::status(&open()?, json),
        Commands::Lockers => locker::list(&open()?, json),
        Commands::Reserve {
            id,
            code,
            method,
            amount,
            voucher,
        } => locker::reserve(&mut open()?, id, code, method, amount, voucher, json),
        Commands::Unlock { id, code } => locker::unlock(&open()?, id, &code),
        Commands::Release { id } => locker::release(&mut open()?, id),
        Commands::Session { id } => locker::session(&open()?, id, json),
        Commands::Code { action } => code::handle(&mut open()?, action, json),
        Commands::Codes => code::list(&open()?, json),
        Commands::Pay { action } => pay::handle(&open()?, action, json),
        Commands::Admin {
            master_code,
            action,
        } => admin::handle(&mut open()?, &master_code, action, json),
        // Editing works on the file layer, so the stores are never opened
        Commands::Config { action } => config::handle(action, config_path, data_dir, json),
        Commands::Tick => sweep::tick(&mut open()?, json),
        Commands::Watch {
            interval,
            max_ticks,
        } => sweep::watch(&mut open()?, interval, max_ticks).await,
    }
}

/// Print `value` as pretty JSON
fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let rendered = serde_json::to_string_pretty(value).context("Failed to render JSON output")?;
    println!("{rendered}");
    Ok(())
}
