use std::{collections::HashMap, path::Path, time::Duration};

use anyhow::{Context, Result};
use config::{Config, Environment, File, FileFormat};
use serde::Deserialize;

pub const DEFAULT_SETTINGS_FILE: &str = "console.toml";

/// Connection and polling settings. Sources, lowest precedence first:
/// built-in defaults, `console.toml`, `APP__*` environment variables.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ConsoleSettings {
    pub server_url: String,
    pub workspace: String,
    pub token: Option<String>,
    pub incubator_service_id: String,
    pub robotic_arm_service_id: String,
    pub microscope_1_service_id: String,
    pub microscope_2_service_id: String,
    pub refresh_interval_secs: u64,
    pub request_timeout_secs: u64,
    pub batched_listing: bool,
}

impl ConsoleSettings {
    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

pub fn load_settings(file: Option<&Path>) -> Result<ConsoleSettings> {
    build_settings(file, None)
}

/// `env` replaces the process environment when given.
pub fn build_settings(
    file: Option<&Path>,
    env: Option<HashMap<String, String>>,
) -> Result<ConsoleSettings> {
    let file_source = match file {
        Some(path) => File::from(path).format(FileFormat::Toml).required(true),
        None => File::new(DEFAULT_SETTINGS_FILE, FileFormat::Toml).required(false),
    };

    Config::builder()
        .set_default("server_url", "http://127.0.0.1:9527")?
        .set_default("workspace", "reef-imaging")?
        .set_default("incubator_service_id", "incubator-control")?
        .set_default("robotic_arm_service_id", "robotic-arm-control")?
        .set_default("microscope_1_service_id", "microscope-control-squid-1")?
        .set_default("microscope_2_service_id", "microscope-control-squid-2")?
        .set_default("refresh_interval_secs", 10)?
        .set_default("request_timeout_secs", 300)?
        .set_default("batched_listing", true)?
        .add_source(file_source)
        .add_source(
            Environment::with_prefix("APP")
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true)
                .source(env),
        )
        .build()
        .context("failed to load console settings")?
        .try_deserialize()
        .context("invalid console settings")
}

#[cfg(test)]
#[path = "tests/settings_tests.rs"]
mod tests;
