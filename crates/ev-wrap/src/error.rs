//! Error types of the conversion module.

use crate::host::{EvmOperation, HostError, VmError};
use alloy_primitives::{Address, Bytes};
use ev_wrap_common::decode_revert;
use std::fmt;
use thiserror::Error;

/// Convenience alias for results returned by the conversion module.
pub type WrapResult<T> = Result<T, WrapError>;

/// Revert output of a failed VM message, kept verbatim for diagnostics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RevertOutput(pub Bytes);

impl RevertOutput {
    /// Raw return bytes.
    pub const fn data(&self) -> &Bytes {
        &self.0
    }

    /// Decoded revert reason, if the payload is a standard one.
    pub fn reason(&self) -> Option<String> {
        decode_revert(&self.0)
    }
}

impl fmt::Display for RevertOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.reason() {
            Some(reason) => f.write_str(&reason),
            None => write!(f, "0x{}", hex::encode(&self.0)),
        }
    }
}

/// Why a mint or burn call did not go through.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CallFailure {
    /// The VM executed the call and it reverted.
    #[error("execution reverted: {0}")]
    Reverted(RevertOutput),
    /// The call could not be executed.
    #[error(transparent)]
    Invocation(Box<WrapError>),
}

/// Errors aborting a conversion. Every variant is terminal for the request.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum WrapError {
    /// The denomination is not allowed to be wrapped.
    #[error("denom {denom} is not supported for wrapping")]
    UnsupportedDenom {
        /// Rejected denomination.
        denom: String,
    },
    /// Governance disabled the kind of VM message the step needs.
    #[error("{0} is disabled")]
    FeatureDisabled(EvmOperation),
    /// The current block has no known fee recipient.
    #[error("failed to obtain coinbase address")]
    CoinbaseUnavailable,
    /// No contract is bound to the denomination and auto-deployment is off.
    #[error("no contract found for denom {denom}")]
    NoContractForDenom {
        /// Unbound denomination.
        denom: String,
    },
    /// The supplied contract is neither the external nor the auto binding of the denom.
    #[error("contract {contract} is not mapped to denom {denom}")]
    ContractNotMappedToDenom {
        /// Supplied contract.
        contract: Address,
        /// Denomination it was supposed to represent.
        denom: String,
    },
    /// The token contract could not be created.
    #[error("contract deploy failed for denom {denom}: {output}")]
    DeployFailed {
        /// Denomination being deployed.
        denom: String,
        /// Creation revert output.
        output: RevertOutput,
    },
    /// The contract already represents another denomination.
    #[error("contract {contract} is bound to {bound}, cannot bind it to {denom}")]
    ContractBoundElsewhere {
        /// Contract being bound.
        contract: Address,
        /// Denomination it currently represents.
        bound: String,
        /// Denomination it was about to be bound to.
        denom: String,
    },
    /// The ledger rejected the native transfer.
    #[error("transfer from {from} to {to} failed: {source}")]
    TransferFailed {
        /// Debited account.
        from: Address,
        /// Credited account.
        to: Address,
        /// Ledger error.
        #[source]
        source: HostError,
    },
    /// `mint_by_native` failed.
    #[error("mint on {contract} failed: {cause}")]
    MintFailed {
        /// Token contract.
        contract: Address,
        /// Underlying failure.
        #[source]
        cause: CallFailure,
    },
    /// `burn_by_native` failed.
    #[error("burn on {contract} failed: {cause}")]
    BurnFailed {
        /// Token contract.
        contract: Address,
        /// Underlying failure.
        #[source]
        cause: CallFailure,
    },
    /// The VM framework faulted while executing a module message.
    #[error("evm execution error: {0}")]
    ExecutionError(#[from] VmError),
    /// A registry entry in the store does not decode.
    #[error("corrupt registry entry under key 0x{}", hex::encode(.key))]
    CorruptRegistryEntry {
        /// Store key of the entry.
        key: Vec<u8>,
    },
}

impl WrapError {
    /// Raw VM return bytes of a reverted deploy, mint or burn, if any.
    pub fn revert_data(&self) -> Option<&Bytes> {
        match self {
            Self::DeployFailed { output, .. } => Some(output.data()),
            Self::MintFailed { cause, .. } | Self::BurnFailed { cause, .. } => match cause {
                CallFailure::Reverted(output) => Some(output.data()),
                CallFailure::Invocation(inner) => inner.revert_data(),
            },
            _ => None,
        }
    }
}
