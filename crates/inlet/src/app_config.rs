//! 🔧 App Configuration — TOML and env vars in, one `AppConfig` out.
//!
//! 🏗️ Powered by Figment. Layers, lowest priority first:
//! 1. `INLET_*` environment variables (`__` separates nesting: `INLET_INPUT__SOURCE`)
//! 2. an optional TOML file
//! 3. whatever the caller hands in as [`ConfigOverrides`] (the CLI flags, usually)
//!
//! 📡 "Config not found: We looked everywhere. Under the couch. Behind the fridge." 🦆

use std::path::Path;

use anyhow::Context;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::Deserialize;
use tracing::info;

use crate::common::SourceKind;
use crate::resolver::InputConfig;

const ENV_PREFIX: &str = "INLET_";

/// 📦 One struct to hold them all: where the documents come from, where they go.
#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub input: InputConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

/// 🚰 Where the NDJSON goes and how much of it.
#[derive(Debug, Deserialize, Clone)]
pub struct OutputConfig {
    /// `None` = stdout.
    #[serde(default)]
    pub file_name: Option<String>,
    /// Stop after this many records. `None` drains the source.
    #[serde(default)]
    pub limit: Option<u64>,
    /// 📊 Spinner on stderr while draining.
    #[serde(default = "default_progress")]
    pub progress: bool,
}

fn default_progress() -> bool {
    true
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            file_name: None,
            limit: None,
            progress: default_progress(),
        }
    }
}

/// 🎛️ Highest-priority values, layered over env and file. `None` leaves the lower layers alone.
#[derive(Debug, Default, Clone)]
pub struct ConfigOverrides {
    pub source: Option<String>,
    pub source_type: Option<SourceKind>,
    pub content_field: Option<String>,
    pub output_file: Option<String>,
    pub limit: Option<u64>,
}

impl ConfigOverrides {
    fn apply(&self, figment: Figment) -> Figment {
        let mut figment = figment;
        if let Some(source) = &self.source {
            figment = figment.merge(Serialized::default("input.source", source));
        }
        if let Some(source_type) = &self.source_type {
            figment = figment.merge(Serialized::default("input.source_type", source_type));
        }
        if let Some(content_field) = &self.content_field {
            figment = figment.merge(Serialized::default("input.content_field", content_field));
        }
        if let Some(output_file) = &self.output_file {
            figment = figment.merge(Serialized::default("output.file_name", output_file));
        }
        if let Some(limit) = self.limit {
            figment = figment.merge(Serialized::default("output.limit", limit));
        }
        figment
    }
}

/// 🚀 Env vars plus an optional TOML file. Shorthand for [`load_config_with`] and no overrides.
pub fn load_config(config_file_name: Option<&Path>) -> anyhow::Result<AppConfig> {
    load_config_with(config_file_name, &ConfigOverrides::default())
}

/// 🚀 The full stack: env, then file (if any), then overrides. Later layers win.
///
/// - `config_file_name` is `None` → env vars and overrides only. No default file is assumed.
/// - `config_file_name` is `Some` → the file must parse; a missing file just contributes nothing.
pub fn load_config_with(
    config_file_name: Option<&Path>,
    overrides: &ConfigOverrides,
) -> anyhow::Result<AppConfig> {
    info!(
        "🔧 Loading configuration: {:#?}",
        config_file_name.unwrap_or(Path::new(""))
    );

    let config = Figment::new().merge(Env::prefixed(ENV_PREFIX).split("__"));
    let config = match config_file_name {
        Some(file_name) => config.merge(Toml::file(file_name)),
        None => config,
    };
    let config = overrides.apply(config);

    let context_msg = match config_file_name {
        Some(path) => format!(
            "💀 Failed to parse configuration from file '{}' and environment variables ({ENV_PREFIX}*). \
             The file exists in our hearts, but maybe not on disk. Is `input.source` set anywhere?",
            path.display()
        ),
        None => format!(
            "💀 Failed to parse configuration from environment variables ({ENV_PREFIX}*). \
             No file was provided. At the very least we need a source to read."
        ),
    };

    config.extract().context(context_msg)
}
