//! ABI of the module-owned wrapped-token contract and typed call builders.
//!
//! The module never packs calldata dynamically: every message it sends to a
//! token contract is produced by one of the builders below.

use alloy_primitives::{Address, Bytes, U256};
use alloy_sol_types::{sol, SolCall, SolConstructor};

sol! {
    /// Token contract deployed by the module for each auto-wrapped denomination.
    contract ModuleERC20 {
        constructor(string denom, uint8 decimals);

        /// Credits `amount` wrapped tokens to `addr`. Only callable by the module.
        function mint_by_native(address addr, uint256 amount) external;

        /// Debits `amount` wrapped tokens from `addr`. Only callable by the module.
        function burn_by_native(address addr, uint256 amount) external;
    }
}

/// Creation bytecode of the wrapped-token contract.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WrappedTokenTemplate {
    creation_code: Bytes,
}

impl WrappedTokenTemplate {
    /// Creates a template from raw creation bytecode.
    pub fn new(creation_code: impl Into<Bytes>) -> Self {
        Self {
            creation_code: creation_code.into(),
        }
    }

    /// Parses hex-encoded creation bytecode, with or without a `0x` prefix.
    pub fn from_hex(code: &str) -> Result<Self, hex::FromHexError> {
        let trimmed = code.trim();
        let raw = trimmed.strip_prefix("0x").unwrap_or(trimmed);
        hex::decode(raw).map(Self::new)
    }

    /// Returns the creation bytecode without constructor arguments.
    pub const fn creation_code(&self) -> &Bytes {
        &self.creation_code
    }

    /// Returns the deployment payload: creation bytecode followed by the
    /// ABI-encoded `(denom, decimals)` constructor arguments.
    pub fn build_constructor(&self, denom: &str, decimals: u8) -> Bytes {
        let args = ModuleERC20::constructorCall {
            denom: denom.to_owned(),
            decimals,
        }
        .abi_encode();
        let mut data = Vec::with_capacity(self.creation_code.len() + args.len());
        data.extend_from_slice(&self.creation_code);
        data.extend_from_slice(&args);
        data.into()
    }
}

/// Calldata for `mint_by_native(addr, amount)`.
pub fn build_mint_call(addr: Address, amount: U256) -> Bytes {
    ModuleERC20::mint_by_nativeCall { addr, amount }
        .abi_encode()
        .into()
}

/// Calldata for `burn_by_native(addr, amount)`.
pub fn build_burn_call(addr: Address, amount: U256) -> Bytes {
    ModuleERC20::burn_by_nativeCall { addr, amount }
        .abi_encode()
        .into()
}

/// Extracts a human readable reason from revert output, if it is a standard
/// `Error(string)`/`Panic(uint256)` payload or plain UTF-8.
pub fn decode_revert(data: &[u8]) -> Option<String> {
    alloy_sol_types::decode_revert_reason(data)
}
