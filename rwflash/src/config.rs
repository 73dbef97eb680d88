use anyhow::{Context, Result};
use rwflash_lib::connection::DEFAULT_BAUDRATE;
use rwflash_lib::runner::DEFAULT_PROGRAMMER;
use rwflash_lib::{DEFAULT_BLOB_DIR, DEFAULT_OUTPUT_DIR, Interface};
use serde::{Deserialize, Serialize};

/// Built-in defaults for every optional setting.
pub struct Defaults;

impl Defaults {
    pub const PROGRAMMER: &'static str = DEFAULT_PROGRAMMER;
    pub const BAUD: u32 = DEFAULT_BAUDRATE;
    pub const BLOB_DIR: &'static str = DEFAULT_BLOB_DIR;
    pub const OUTPUT_DIR: &'static str = DEFAULT_OUTPUT_DIR;
}

/// Root of the JSON tool config file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RwFlashConfig {
    pub device: Option<String>,
    /// Flash size class to initialize with, e.g. `8M`.
    pub flash_size: Option<String>,
    pub interface: Option<Interface>,
    pub port: Option<String>,
    #[serde(default = "default_baud")]
    pub baud: u32,
    #[serde(default = "default_programmer")]
    pub programmer: String,
    pub device_config: Option<String>,
    #[serde(default = "default_blob_dir")]
    pub blob_dir: String,
    #[serde(default = "default_output_dir")]
    pub output_dir: String,
    #[serde(default)]
    pub debug: bool,
    #[serde(default)]
    pub quiet: bool,
}

fn default_baud() -> u32 {
    Defaults::BAUD
}
fn default_programmer() -> String {
    Defaults::PROGRAMMER.to_string()
}
fn default_blob_dir() -> String {
    Defaults::BLOB_DIR.to_string()
}
fn default_output_dir() -> String {
    Defaults::OUTPUT_DIR.to_string()
}

impl RwFlashConfig {
    /// Loads the config from a JSON file.
    pub fn from_file(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path))?;
        serde_json::from_str(&content).with_context(|| format!("Invalid config file {}", path))
    }

    pub fn with_defaults() -> Self {
        Self {
            device: None,
            flash_size: None,
            interface: None,
            port: None,
            baud: Defaults::BAUD,
            programmer: Defaults::PROGRAMMER.to_string(),
            device_config: None,
            blob_dir: Defaults::BLOB_DIR.to_string(),
            output_dir: Defaults::OUTPUT_DIR.to_string(),
            debug: false,
            quiet: false,
        }
    }
}
