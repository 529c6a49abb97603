use std::{collections::HashMap, fs, path::Path};

use anyhow::Context;

pub const SETTINGS_FILE: &str = "billed.toml";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub api_url: String,
    pub local_storage_path: String,
    pub log_filter: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api_url: "http://localhost:5678".into(),
            local_storage_path: "./data/local_storage.json".into(),
            log_filter: "info".into(),
        }
    }
}

/// Defaults, then `billed.toml` in the working directory, then the environment.
pub fn load_settings() -> anyhow::Result<Settings> {
    let mut settings = Settings::default();
    if Path::new(SETTINGS_FILE).exists() {
        apply_file(&mut settings, Path::new(SETTINGS_FILE))?;
    }
    apply_env(&mut settings, |key| std::env::var(key).ok());
    Ok(settings)
}

fn apply_file(settings: &mut Settings, path: &Path) -> anyhow::Result<()> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed to read settings file '{}'", path.display()))?;
    let file_cfg = toml::from_str::<HashMap<String, String>>(&raw)
        .with_context(|| format!("invalid settings file '{}'", path.display()))?;

    if let Some(v) = file_cfg.get("api_url") {
        settings.api_url = v.clone();
    }
    if let Some(v) = file_cfg.get("local_storage_path") {
        settings.local_storage_path = v.clone();
    }
    if let Some(v) = file_cfg.get("log_filter") {
        settings.log_filter = v.clone();
    }
    Ok(())
}

fn apply_env(settings: &mut Settings, var: impl Fn(&str) -> Option<String>) {
    if let Some(v) = var("BILLED_API_URL") {
        settings.api_url = v;
    }
    if let Some(v) = var("APP__API_URL") {
        settings.api_url = v;
    }

    if let Some(v) = var("BILLED_LOCAL_STORAGE") {
        settings.local_storage_path = v;
    }
    if let Some(v) = var("APP__LOCAL_STORAGE_PATH") {
        settings.local_storage_path = v;
    }

    if let Some(v) = var("RUST_LOG") {
        settings.log_filter = v;
    }
    if let Some(v) = var("APP__LOG_FILTER") {
        settings.log_filter = v;
    }
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
