//! Protocol constants shared by the conversion module.

use alloy_primitives::{keccak256, Address};
use std::sync::OnceLock;

/// Name of the conversion module; seeds the module address and the store namespace.
pub const MODULE_NAME: &str = "ev-wrap";

/// Gas limit attached to every module-issued VM message.
pub const DEFAULT_GAS_CAP: u64 = 25_000_000;

/// Decimals passed to auto-deployed token constructors; wrapped balances mirror
/// the raw integer amount.
pub const AUTO_TOKEN_DECIMALS: u8 = 0;

/// Prefix of every key the module writes to the host store.
pub const STORE_NAMESPACE: &[u8] = b"wrap/";

/// Returns the protocol-reserved address used as sender for module-issued VM calls.
///
/// Derived as the low 20 bytes of `keccak256(MODULE_NAME)`.
pub fn module_address() -> Address {
    static ADDR: OnceLock<Address> = OnceLock::new();
    *ADDR.get_or_init(|| Address::from_slice(&keccak256(MODULE_NAME.as_bytes())[12..]))
}
