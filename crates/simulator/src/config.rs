use std::{collections::HashMap, fs};

use serde::Deserialize;

pub const SETTINGS_FILE: &str = "simulator.toml";

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Settings {
    pub bind_addr: String,
    pub database_url: String,
    pub workspace: String,
    pub incubator_service_id: String,
    pub robotic_arm_service_id: String,
    pub microscope_1_service_id: String,
    pub microscope_2_service_id: String,
    pub temperature_c: f64,
    pub co2_percent: f64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:9527".into(),
            database_url: "sqlite://./data/simulator.db".into(),
            workspace: "reef-imaging".into(),
            incubator_service_id: "incubator-control".into(),
            robotic_arm_service_id: "robotic-arm-control".into(),
            microscope_1_service_id: "microscope-control-squid-1".into(),
            microscope_2_service_id: "microscope-control-squid-2".into(),
            temperature_c: 37.0,
            co2_percent: 5.0,
        }
    }
}

pub fn load_settings() -> Settings {
    let file = fs::read_to_string(SETTINGS_FILE).ok();
    settings_from_sources(file.as_deref(), |key| std::env::var(key).ok())
}

/// Defaults, then `simulator.toml` keys, then `APP__*` environment variables.
pub fn settings_from_sources<F>(file: Option<&str>, env: F) -> Settings
where
    F: Fn(&str) -> Option<String>,
{
    let mut settings = Settings::default();

    let file_cfg = file
        .and_then(|raw| toml::from_str::<HashMap<String, toml::Value>>(raw).ok())
        .unwrap_or_default();
    let lookup = |key: &str| -> Option<String> {
        let env_key = format!("APP__{}", key.to_ascii_uppercase());
        env(&env_key).or_else(|| file_cfg.get(key).map(toml_to_string))
    };

    if let Some(v) = lookup("bind_addr").or_else(|| env("SIMULATOR_BIND")) {
        settings.bind_addr = v;
    }
    if let Some(v) = lookup("database_url").or_else(|| env("DATABASE_URL")) {
        settings.database_url = v;
    }
    if let Some(v) = lookup("workspace") {
        settings.workspace = v;
    }
    if let Some(v) = lookup("incubator_service_id") {
        settings.incubator_service_id = v;
    }
    if let Some(v) = lookup("robotic_arm_service_id") {
        settings.robotic_arm_service_id = v;
    }
    if let Some(v) = lookup("microscope_1_service_id") {
        settings.microscope_1_service_id = v;
    }
    if let Some(v) = lookup("microscope_2_service_id") {
        settings.microscope_2_service_id = v;
    }
    if let Some(parsed) = lookup("temperature_c").and_then(|v| v.parse::<f64>().ok()) {
        settings.temperature_c = parsed;
    }
    if let Some(parsed) = lookup("co2_percent").and_then(|v| v.parse::<f64>().ok()) {
        settings.co2_percent = parsed;
    }

    settings
}

fn toml_to_string(value: &toml::Value) -> String {
    match value {
        toml::Value::String(raw) => raw.clone(),
        other => other.to_string(),
    }
}

/// Accepts bare file paths and `sqlite:` paths alongside full SQLite URLs.
pub fn normalize_database_url(raw_database_url: &str) -> String {
    let raw_database_url = raw_database_url.trim();

    if raw_database_url.is_empty() {
        return Settings::default().database_url;
    }

    if raw_database_url.starts_with("sqlite::memory:")
        || raw_database_url.starts_with("sqlite://")
        || raw_database_url.contains("://")
    {
        return raw_database_url.to_string();
    }

    if let Some(path) = raw_database_url.strip_prefix("sqlite:") {
        let path = path.replace('\\', "/");
        return format!("sqlite://{path}");
    }

    format!("sqlite://{}", raw_database_url.replace('\\', "/"))
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
