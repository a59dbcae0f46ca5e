//! Runtime configuration of the conversion module.

use crate::message::ModuleIdentity;
use alloy_primitives::{Address, Bytes};
use ev_wrap_common::{module_address, WrappedTokenTemplate, DEFAULT_GAS_CAP};
use eyre::WrapErr;
use serde::Deserialize;
use std::{env, path::Path, str::FromStr};
use thiserror::Error;

/// Environment variable overriding the module sender address.
pub const ENV_MODULE_ADDRESS: &str = "EV_WRAP_MODULE_ADDR";
/// Environment variable overriding the gas limit of module messages.
pub const ENV_GAS_CAP: &str = "EV_WRAP_GAS_CAP";
/// Environment variable toggling auto-deployment of token contracts.
pub const ENV_AUTO_DEPLOY: &str = "EV_WRAP_AUTO_DEPLOY";
/// Environment variable holding the hex creation bytecode of the token contract.
pub const ENV_TOKEN_BYTECODE: &str = "EV_WRAP_TOKEN_BYTECODE";

/// Settings of the conversion module.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct WrapConfig {
    /// Sender of module-issued VM messages.
    pub module_address: Address,
    /// Gas limit of module-issued VM messages.
    pub gas_cap: u64,
    /// Chain-wide switch for deploying token contracts on first use.
    pub enable_auto_deployment: bool,
    /// Creation bytecode of the wrapped-token contract.
    pub token_bytecode: Bytes,
}

impl Default for WrapConfig {
    fn default() -> Self {
        Self {
            module_address: module_address(),
            gas_cap: DEFAULT_GAS_CAP,
            enable_auto_deployment: true,
            token_bytecode: Bytes::new(),
        }
    }
}

impl WrapConfig {
    /// Module identity derived from [`Self::module_address`].
    pub const fn identity(&self) -> ModuleIdentity {
        ModuleIdentity::new(self.module_address)
    }

    /// Token template built from [`Self::token_bytecode`].
    pub fn template(&self) -> WrappedTokenTemplate {
        WrappedTokenTemplate::new(self.token_bytecode.clone())
    }

    /// Parses a JSON document; missing fields take their defaults.
    pub fn from_json(raw: &str) -> Result<Self, ConfigError> {
        serde_json::from_str(raw).map_err(|err| ConfigError::Json(err.to_string()))
    }

    /// Reads a JSON configuration file.
    pub fn from_file(path: impl AsRef<Path>) -> eyre::Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .wrap_err_with(|| format!("failed to read {}", path.display()))?;
        Self::from_json(&raw).wrap_err_with(|| format!("invalid config in {}", path.display()))
    }

    /// Loads the configuration from `EV_WRAP_*` environment variables.
    ///
    /// Only the token bytecode is required; everything else falls back to the
    /// defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| env::var(var).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(raw) = optional(&lookup, ENV_MODULE_ADDRESS)? {
            config.module_address = Address::from_str(&raw)
                .map_err(|err| ConfigError::InvalidAddress(err.to_string()))?;
        }
        if let Some(raw) = optional(&lookup, ENV_GAS_CAP)? {
            config.gas_cap = raw.parse().map_err(|_| ConfigError::InvalidValue {
                var: ENV_GAS_CAP.into(),
                value: raw,
            })?;
        }
        if let Some(raw) = optional(&lookup, ENV_AUTO_DEPLOY)? {
            config.enable_auto_deployment = parse_bool(&raw).ok_or(ConfigError::InvalidValue {
                var: ENV_AUTO_DEPLOY.into(),
                value: raw,
            })?;
        }

        let bytecode = optional(&lookup, ENV_TOKEN_BYTECODE)?.ok_or(ConfigError::MissingEnv {
            var: ENV_TOKEN_BYTECODE.into(),
        })?;
        config.token_bytecode = WrappedTokenTemplate::from_hex(&bytecode)
            .map_err(|err| ConfigError::InvalidBytecode(err.to_string()))?
            .creation_code()
            .clone();

        Ok(config)
    }
}

/// Errors that can occur while building a [`WrapConfig`].
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// A required environment variable was not set.
    #[error("environment variable {var} is not set")]
    MissingEnv {
        /// Name of the missing variable.
        var: String,
    },
    /// An environment variable was set to whitespace.
    #[error("environment variable {var} is empty")]
    EmptyEnv {
        /// Name of the empty variable.
        var: String,
    },
    /// The module address could not be parsed.
    #[error("invalid module address: {0}")]
    InvalidAddress(String),
    /// A numeric or boolean setting could not be parsed.
    #[error("invalid value {value:?} for {var}")]
    InvalidValue {
        /// Name of the variable.
        var: String,
        /// Offending value.
        value: String,
    },
    /// The token bytecode is not valid hex.
    #[error("invalid token bytecode: {0}")]
    InvalidBytecode(String),
    /// The JSON document could not be decoded.
    #[error("invalid config json: {0}")]
    Json(String),
}

fn optional(
    lookup: &impl Fn(&str) -> Option<String>,
    var: &str,
) -> Result<Option<String>, ConfigError> {
    match lookup(var) {
        None => Ok(None),
        Some(raw) if raw.trim().is_empty() => Err(ConfigError::EmptyEnv { var: var.into() }),
        Some(raw) => Ok(Some(raw.trim().to_owned())),
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" => Some(true),
        "0" | "false" | "no" => Some(false),
        _ => None,
    }
}
