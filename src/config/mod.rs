//! # Configuration Management
//!
//! Settings for node certificate initialization. Sources, lowest precedence
//! first: built-in defaults, an optional YAML file, `AUTOTLS_*` environment
//! variables, then command-line flags applied by the caller.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::certs::AddressConfig;
use crate::errors::{AutoTlsError, Result};

/// Certificate initialization configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct TlsInitConfig {
    /// Directory holding every CA and host certificate
    pub certs_dir: PathBuf,

    /// Listen and advertise addresses used for subject alternative names
    #[validate(nested)]
    pub addresses: AddressConfig,
}

impl Default for TlsInitConfig {
    fn default() -> Self {
        Self { certs_dir: PathBuf::from("certs"), addresses: AddressConfig::default() }
    }
}

impl TlsInitConfig {
    /// Read a YAML configuration file. Missing keys take their defaults.
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            AutoTlsError::config_with_source(
                format!("Failed to read config file {}", path.display()),
                Box::new(e),
            )
        })?;
        serde_yaml::from_str(&contents).map_err(|e| {
            AutoTlsError::config_with_source(
                format!("Failed to parse config file {}", path.display()),
                Box::new(e),
            )
        })
    }

    /// Create configuration from environment variables
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        config.apply_env()?;
        Ok(config)
    }

    /// Defaults, then `file` if given, then the environment. Validated.
    pub fn load(file: Option<&Path>) -> Result<Self> {
        let mut config = match file {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env()?;
        config.validate()?;
        Ok(config)
    }

    pub fn apply_env(&mut self) -> Result<()> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    /// Override fields from `AUTOTLS_*` variables resolved through `lookup`.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(dir) = lookup("AUTOTLS_CERTS_DIR") {
            self.certs_dir = PathBuf::from(dir);
        }

        let addresses = &mut self.addresses;
        if let Some(addr) = lookup("AUTOTLS_LISTEN_ADDR") {
            addresses.listen_addr = addr;
        }
        if let Some(addr) = lookup("AUTOTLS_ADVERTISE_ADDR") {
            addresses.advertise_addr = Some(addr);
        }
        if let Some(addr) = lookup("AUTOTLS_SQL_ADDR") {
            addresses.sql_addr = Some(addr);
        }
        if let Some(addr) = lookup("AUTOTLS_SQL_ADVERTISE_ADDR") {
            addresses.sql_advertise_addr = Some(addr);
        }
        if let Some(addr) = lookup("AUTOTLS_HTTP_ADDR") {
            addresses.http_addr = addr;
        }
        if let Some(addr) = lookup("AUTOTLS_HTTP_ADVERTISE_ADDR") {
            addresses.http_advertise_addr = Some(addr);
        }
        if let Some(split) = lookup("AUTOTLS_SPLIT_LISTEN_SQL") {
            addresses.split_listen_sql = parse_bool("AUTOTLS_SPLIT_LISTEN_SQL", &split)?;
        }
        Ok(())
    }

    /// Validate the entire configuration
    pub fn validate(&self) -> Result<()> {
        Validate::validate(self).map_err(AutoTlsError::from)?;

        if self.certs_dir.as_os_str().is_empty() {
            return Err(AutoTlsError::config("certs_dir must not be empty"));
        }
        Ok(())
    }
}

fn parse_bool(key: &str, value: &str) -> Result<bool> {
    match value.trim().to_lowercase().as_str() {
        "true" | "1" | "yes" => Ok(true),
        "false" | "0" | "no" => Ok(false),
        other => Err(AutoTlsError::config(format!("{key}: expected a boolean, got {other:?}"))),
    }
}
