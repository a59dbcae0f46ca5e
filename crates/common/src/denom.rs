//! Native denominations and the allow-list deciding which of them may be wrapped.

use alloy_primitives::U256;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Prefix of IBC voucher denominations (`ibc/<sha256 of the trace path>`).
pub const IBC_DENOM_PREFIX: &str = "ibc/";

/// Prefix of denominations minted by the Ethereum bridge (`gravity0x<erc20 address>`).
pub const GRAVITY_DENOM_PREFIX: &str = "gravity0x";

/// An amount of a single native denomination.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Coin {
    /// Native denomination.
    pub denom: String,
    /// Integer amount in the denomination's base unit.
    pub amount: U256,
}

impl Coin {
    /// Creates a coin from a denomination and a `u64` amount.
    ///
    /// Amounts wider than 64 bits are built with the struct literal.
    pub fn new(denom: impl Into<String>, amount: u64) -> Self {
        Self {
            denom: denom.into(),
            amount: U256::from(amount),
        }
    }
}

impl fmt::Display for Coin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.amount, self.denom)
    }
}

/// Decides whether a native denomination may be represented by a token contract.
pub trait DenomFilter {
    /// Returns true if `denom` may be converted to and from a token contract.
    fn is_wrappable(&self, denom: &str) -> bool;
}

impl<F> DenomFilter for F
where
    F: Fn(&str) -> bool,
{
    fn is_wrappable(&self, denom: &str) -> bool {
        self(denom)
    }
}

/// Accepts the denominations that originate outside the chain: IBC vouchers and
/// assets bridged from Ethereum.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SourceDenomFilter;

impl SourceDenomFilter {
    /// Returns true for `ibc/` followed by a hex-encoded 32-byte hash.
    pub fn is_ibc_denom(denom: &str) -> bool {
        denom
            .strip_prefix(IBC_DENOM_PREFIX)
            .is_some_and(|hash| is_hex_of_len(hash, 32))
    }

    /// Returns true for `gravity0x` followed by a hex-encoded 20-byte address.
    pub fn is_gravity_denom(denom: &str) -> bool {
        denom
            .strip_prefix(GRAVITY_DENOM_PREFIX)
            .is_some_and(|addr| is_hex_of_len(addr, 20))
    }
}

impl DenomFilter for SourceDenomFilter {
    fn is_wrappable(&self, denom: &str) -> bool {
        Self::is_ibc_denom(denom) || Self::is_gravity_denom(denom)
    }
}

fn is_hex_of_len(s: &str, len: usize) -> bool {
    s.len() == len * 2 && hex::decode(s).is_ok()
}
