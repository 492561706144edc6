use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::certificate_authority::{LEAF_VALIDITY_DAYS_DEFAULT, ROOT_VALIDITY_DAYS_DEFAULT};
use crate::handshake::HandshakeConfig;
use crate::key_pair::RSA_KEY_SIZE_DEFAULT;
use crate::key_transport::TransportPadding;
use crate::symmetric_channel::PaddingMode;

const DEFAULT_CONFIG_PATH: &str = "config.toml";

#[derive(Debug, Deserialize, Clone, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub root_ca: RootCAConfig,
    #[serde(default)]
    pub leaf: LeafConfig,
    #[serde(default)]
    pub handshake: HandshakeSettings,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub exports: ExportsConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct RootCAConfig {
    #[serde(default = "default_root_ca_cn")]
    pub common_name: String,
    #[serde(default = "default_root_ca_org")]
    pub organization: String,
    #[serde(default = "default_root_ca_validity")]
    pub validity_days: u32,
    #[serde(default = "default_key_bits")]
    pub key_bits: u32,
}

impl Default for RootCAConfig {
    fn default() -> Self {
        Self {
            common_name: default_root_ca_cn(),
            organization: default_root_ca_org(),
            validity_days: default_root_ca_validity(),
            key_bits: default_key_bits(),
        }
    }
}

fn default_root_ca_cn() -> String {
    "PKI Handshake Root CA".to_string()
}

fn default_root_ca_org() -> String {
    "PKI Handshake".to_string()
}

fn default_root_ca_validity() -> u32 {
    ROOT_VALIDITY_DAYS_DEFAULT
}

fn default_key_bits() -> u32 {
    RSA_KEY_SIZE_DEFAULT
}

#[derive(Debug, Deserialize, Clone)]
pub struct LeafConfig {
    #[serde(default = "default_leaf_validity")]
    pub validity_days: u32,
    #[serde(default = "default_key_bits")]
    pub key_bits: u32,
}

impl Default for LeafConfig {
    fn default() -> Self {
        Self {
            validity_days: default_leaf_validity(),
            key_bits: default_key_bits(),
        }
    }
}

fn default_leaf_validity() -> u32 {
    LEAF_VALIDITY_DAYS_DEFAULT
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct HandshakeSettings {
    #[serde(default)]
    pub client_auth: bool,
    #[serde(default)]
    pub transport_padding: TransportPadding,
    #[serde(default)]
    pub record_padding: PaddingMode,
}

impl HandshakeSettings {
    pub fn to_handshake_config(&self) -> HandshakeConfig {
        HandshakeConfig {
            client_auth: self.client_auth.into(),
            transport_padding: self.transport_padding,
            record_padding: self.record_padding,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct ExportsConfig {
    #[serde(default = "default_export_dir")]
    pub directory: PathBuf,
}

impl Default for ExportsConfig {
    fn default() -> Self {
        Self {
            directory: default_export_dir(),
        }
    }
}

fn default_export_dir() -> PathBuf {
    PathBuf::from("exports")
}

impl AppConfig {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let config_str = fs::read_to_string(path)
            .context(format!("Failed to read config file: {}", path.display()))?;

        let config: AppConfig =
            toml::from_str(&config_str).context("Failed to parse config file")?;

        Ok(config)
    }

    /// Load `config.toml` from the working directory, falling back to defaults when absent
    pub fn load() -> Result<Self> {
        if Path::new(DEFAULT_CONFIG_PATH).exists() {
            Self::from_file(DEFAULT_CONFIG_PATH)
        } else {
            Ok(Self::default())
        }
    }
}
