//! VM messages issued by the module and their normalized results.

use crate::host::ChainConfig;
use alloy_primitives::{Address, Bytes, U256};
use ev_wrap_common::module_address;

/// The account the module signs its VM messages as.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModuleIdentity {
    address: Address,
}

impl ModuleIdentity {
    /// Uses `address` as the module sender.
    pub const fn new(address: Address) -> Self {
        Self { address }
    }

    /// Sender address of module messages.
    pub const fn address(&self) -> Address {
        self.address
    }
}

impl Default for ModuleIdentity {
    fn default() -> Self {
        Self::new(module_address())
    }
}

/// Whether the VM validates the sender nonce of a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NonceCheck {
    /// Regular transaction semantics.
    Enforce,
    /// Trusted system message: no signature and no nonce validation.
    Bypass,
}

/// A transaction-like message executed by the VM on behalf of the module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VmMessage {
    /// Sender.
    pub from: Address,
    /// Target contract; `None` creates a contract from `data`.
    pub to: Option<Address>,
    /// Sender nonce at the time the message was built.
    pub nonce: u64,
    /// Native value attached to the message.
    pub value: U256,
    /// Gas limit.
    pub gas_limit: u64,
    /// Gas price; module messages are free.
    pub gas_price: U256,
    /// Calldata or creation code.
    pub data: Bytes,
    /// EIP-2930 access list entries. Always empty for module messages.
    pub access_list: Vec<(Address, Vec<U256>)>,
    /// Nonce validation mode.
    pub nonce_check: NonceCheck,
}

impl VmMessage {
    /// Builds a module-originated message.
    ///
    /// Callers pass the nonce validation mode explicitly.
    pub fn system(
        identity: ModuleIdentity,
        nonce: u64,
        to: Option<Address>,
        data: Bytes,
        value: U256,
        gas_limit: u64,
        nonce_check: NonceCheck,
    ) -> Self {
        Self {
            from: identity.address(),
            to,
            nonce,
            value,
            gas_limit,
            gas_price: U256::ZERO,
            data,
            access_list: Vec::new(),
            nonce_check,
        }
    }

    /// Returns true if the message deploys a contract.
    pub const fn is_create(&self) -> bool {
        self.to.is_none()
    }

    /// Returns true if the VM must validate the sender nonce.
    pub const fn check_nonce(&self) -> bool {
        matches!(self.nonce_check, NonceCheck::Enforce)
    }
}

/// Block-level context a message executes in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecutionEnv {
    /// Chain configuration.
    pub chain: ChainConfig,
    /// Fee recipient of the current block.
    pub coinbase: Address,
}

/// Raw outcome of [`crate::host::EvmBackend::apply_message`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecutionOutcome {
    /// Return data, or revert data when `failed` is set.
    pub return_data: Bytes,
    /// Whether execution reverted or halted.
    pub failed: bool,
    /// Address reported by the VM for a successful creation.
    pub created_address: Option<Address>,
    /// Gas consumed.
    pub gas_used: u64,
}

/// Normalized result of a module message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VmResult {
    /// Return data, or revert data when `failed` is set.
    pub return_data: Bytes,
    /// Whether execution reverted or halted.
    pub failed: bool,
    /// Address reported by the VM for a successful creation.
    pub created_address: Option<Address>,
    /// Sender nonce consumed by the message.
    pub nonce: u64,
    /// Gas consumed.
    pub gas_used: u64,
}

impl VmResult {
    pub(crate) fn from_outcome(outcome: ExecutionOutcome, nonce: u64) -> Self {
        Self {
            return_data: outcome.return_data,
            failed: outcome.failed,
            created_address: outcome.created_address,
            nonce,
            gas_used: outcome.gas_used,
        }
    }
}
