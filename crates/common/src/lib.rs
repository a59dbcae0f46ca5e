//! Common constants, denomination rules and the wrapped-token ABI for ev-wrap.

pub mod constants;
pub mod contract;
pub mod denom;

pub use constants::*;
pub use contract::{decode_revert, ModuleERC20, WrappedTokenTemplate};
pub use denom::{Coin, DenomFilter, SourceDenomFilter};
