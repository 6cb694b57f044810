use std::{path::Path, sync::Arc};

use anyhow::{Context, Result};
use kiosk_core::{
    config::{load_partial_toml_file, validate_key},
    AdminGate, KioskConfig, SystemClock,
};

use super::{admin::authorize, print_json};
use crate::{cli::ConfigAction, context::project_config_path};

pub fn handle(
    action: ConfigAction,
    config_path: Option<&Path>,
    data_dir: Option<&Path>,
    json: bool,
) -> Result<()> {
    match action {
        ConfigAction::Get { key } => get(key.as_deref(), config_path, data_dir, json),
        ConfigAction::Set {
            key,
            value,
            master_code,
        } => set(&key, &value, &master_code, config_path, data_dir),
    }
}

fn get(key: Option<&str>, config_path: Option<&Path>, data_dir: Option<&Path>, json: bool) -> Result<()> {
    let mut config = KioskConfig::load(config_path).context("Failed to load configuration")?;
    if let Some(dir) = data_dir {
        config.storage.data_dir = dir.to_path_buf();
    }

    let Some(key) = key else {
        if json {
            return print_json(&config);
        }
        print!("{}", toml::to_string_pretty(&config).context("Failed to render config")?);
        return Ok(());
    };

    validate_key(key)?;
    let value = config
        .get(key)
        .with_context(|| format!("No value for {key}"))?;
    if json {
        return print_json(&value);
    }
    match value {
        toml::Value::String(s) => println!("{s}"),
        other => println!("{other}"),
    }
    Ok(())
}

/// Change one key in the project file, leaving global and environment layers alone
fn set(
    key: &str,
    value: &str,
    master_code: &str,
    config_path: Option<&Path>,
    data_dir: Option<&Path>,
) -> Result<()> {
    let mut effective = KioskConfig::load(config_path).context("Failed to load configuration")?;
    if let Some(dir) = data_dir {
        effective.storage.data_dir = dir.to_path_buf();
    }
    authorize(
        &mut AdminGate::open(&effective, Arc::new(SystemClock)),
        master_code,
    )?;

    let path = project_config_path(config_path);
    let mut file_config = KioskConfig::default();
    if let Some(partial) = load_partial_toml_file(&path)? {
        file_config.merge_partial(partial);
    }

    file_config.set(key, value)?;
    file_config
        .save(&path)
        .with_context(|| format!("Failed to save {}", path.display()))?;

    tracing::info!(key, path = %path.display(), "Configuration updated");
    println!("Set {key} = {value}");
    Ok(())
}
