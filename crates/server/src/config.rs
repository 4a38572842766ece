use std::path::{Path, PathBuf};

use anyhow::Context;
use config::{Config, Environment, File, FileFormat};
use list_core::{
    list::derive_hash, ControllerConfig, List, DEFAULT_CLIENT_BUFFER, DEFAULT_QUEUE_CAPACITY,
};
use serde::Deserialize;
use shared::domain::{AutoMode, Item, ItemHash};

use crate::netsrv::{ServerOptions, DEFAULT_MAX_LINE_BYTES};

pub const DEFAULT_CONFIG_FILE: &str = "listd.toml";
const ENV_PREFIX: &str = "APP";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub bind_addr: String,
    pub log_filter: String,
    pub auto_mode: AutoMode,
    pub queue_capacity: usize,
    pub client_buffer: usize,
    pub max_line_bytes: usize,
    pub items: Vec<ItemSettings>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ItemSettings {
    pub payload: String,
    #[serde(default)]
    pub hash: Option<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:1350".into(),
            log_filter: "info".into(),
            auto_mode: AutoMode::Off,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            client_buffer: DEFAULT_CLIENT_BUFFER,
            max_line_bytes: DEFAULT_MAX_LINE_BYTES,
            items: Vec::new(),
        }
    }
}

impl Settings {
    pub fn controller_config(&self) -> ControllerConfig {
        ControllerConfig {
            queue_capacity: self.queue_capacity,
            client_buffer: self.client_buffer,
        }
    }

    pub fn server_options(&self) -> ServerOptions {
        ServerOptions {
            max_line_bytes: self.max_line_bytes,
            ..ServerOptions::default()
        }
    }

    /// Builds the initial list, deriving hashes for items configured
    /// without one.
    pub fn build_list(&self) -> List {
        let items = self
            .items
            .iter()
            .enumerate()
            .map(|(position, item)| Item {
                hash: item
                    .hash
                    .as_deref()
                    .map(ItemHash::new)
                    .unwrap_or_else(|| derive_hash(position, &item.payload)),
                payload: item.payload.clone(),
            })
            .collect();
        List::new(items, self.auto_mode)
    }
}

/// Loads settings from defaults, then the config file, then `APP__*`
/// environment variables.
///
/// Without an explicit `path`, a missing `listd.toml` is not an error.
pub fn load_settings(path: Option<&Path>) -> anyhow::Result<Settings> {
    load_settings_with_env(path, Environment::with_prefix(ENV_PREFIX))
}

fn load_settings_with_env(path: Option<&Path>, env: Environment) -> anyhow::Result<Settings> {
    let (file, required) = match path {
        Some(path) => (path.to_path_buf(), true),
        None => (PathBuf::from(DEFAULT_CONFIG_FILE), false),
    };
    let file_name = file.to_string_lossy().into_owned();

    let raw = Config::builder()
        .add_source(File::new(&file_name, FileFormat::Toml).required(required))
        .add_source(
            env.prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        )
        .build()
        .with_context(|| format!("failed to read configuration from '{file_name}'"))?;

    raw.try_deserialize::<Settings>()
        .with_context(|| format!("invalid configuration in '{file_name}' or environment"))
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
