//! # Native coin / token contract conversion
//!
//! Lets accounts move a native denomination into a module-owned token
//! contract and back. Each conversion couples a ledger transfer with a
//! `mint_by_native`/`burn_by_native` call on the token contract, and both
//! happen inside one journaled scope of the host.
//!
//! ## Components
//!
//! | Module | Role |
//! |--------|------|
//! | [`registry`] | denom → contract bindings (`external` beats `auto`) |
//! | [`invoke`] | module-signed VM messages, feature flags, coinbase |
//! | [`deploy`] | token deployment and address derivation |
//! | [`convert`] | the conversion state machine and batch variants |
//! | [`genesis`] | registry import/export |
//!
//! The host plugs in through the traits in [`host`]: [`host::BankKeeper`] for
//! the ledger, [`host::EvmBackend`] for the VM, [`host::KeyValueStore`] for
//! durable state and [`host::Journaled`] for nested rollback.
//!
//! ```ignore
//! use ev_wrap::{TokenBridge, WrapConfig};
//! use ev_wrap_common::Coin;
//!
//! let bridge = TokenBridge::new(&WrapConfig::from_env()?);
//! let coin = Coin::new(denom, 100);
//! let contract = bridge.convert_native_to_token(&mut host, sender, &coin, true)?;
//! bridge.convert_token_to_native(&mut host, contract, sender, &coin)?;
//! ```

pub mod config;
pub mod convert;
pub mod deploy;
pub mod error;
pub mod genesis;
pub mod host;
pub mod invoke;
pub mod message;
pub mod registry;

#[cfg(test)]
mod test_utils;

pub use config::{ConfigError, WrapConfig};
pub use convert::{ConversionRequest, ConversionStage, Direction, TokenBridge};
pub use deploy::TokenDeployer;
pub use error::{CallFailure, RevertOutput, WrapError, WrapResult};
pub use genesis::{export_genesis, init_genesis, GenesisState, TokenMapping};
pub use host::{
    BankKeeper, ChainConfig, Checkpoint, EvmBackend, EvmFeatureFlags, EvmOperation, HostError,
    Journaled, KeyValueStore, Transaction, VmError, WrapHost,
};
pub use invoke::ModuleCaller;
pub use message::{ExecutionEnv, ExecutionOutcome, ModuleIdentity, NonceCheck, VmMessage, VmResult};
pub use registry::{BindingKind, ContractBindings, ContractRegistry};
