//! Collaborator interfaces the conversion module consumes from its host chain.
//!
//! The host owns the ledger, the VM state and the durable store. All three are
//! journaled together so that a [`Transaction`] can discard every effect of a
//! failed conversion at once.

use crate::message::{ExecutionEnv, ExecutionOutcome, VmMessage};
use alloy_primitives::{Address, U256};
use ev_wrap_common::Coin;
use std::{
    fmt,
    ops::{Deref, DerefMut},
};
use thiserror::Error;

/// Ledger-side failures reported by [`BankKeeper::send_coin`].
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum HostError {
    /// The source account holds less than the requested amount.
    #[error("insufficient funds: {account} has {available}{denom}, needs {required}{denom}")]
    InsufficientFunds {
        /// Account that was debited.
        account: Address,
        /// Denomination being moved.
        denom: String,
        /// Balance before the transfer.
        available: U256,
        /// Requested amount.
        required: U256,
    },
    /// Any other ledger fault.
    #[error("ledger error: {0}")]
    Other(String),
}

/// A fault of the execution framework itself, as opposed to a reverted message.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{0}")]
pub struct VmError(pub String);

/// Moves native balances between ledger accounts.
pub trait BankKeeper {
    /// Transfers `coin` from `from` to `to`.
    fn send_coin(&mut self, from: Address, to: Address, coin: &Coin) -> Result<(), HostError>;
}

/// Kind of VM message, as gated by governance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvmOperation {
    /// Contract creation (`to` is absent).
    Create,
    /// Call into an existing contract.
    Call,
}

impl fmt::Display for EvmOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Create => f.write_str("contract creation"),
            Self::Call => f.write_str("contract call"),
        }
    }
}

/// Governance kill-switches for the VM.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EvmFeatureFlags {
    /// Whether contract creation is allowed.
    pub create_enabled: bool,
    /// Whether calls into contracts are allowed.
    pub call_enabled: bool,
}

impl EvmFeatureFlags {
    /// Returns true if `op` is currently allowed.
    pub const fn allows(&self, op: EvmOperation) -> bool {
        match op {
            EvmOperation::Create => self.create_enabled,
            EvmOperation::Call => self.call_enabled,
        }
    }
}

impl Default for EvmFeatureFlags {
    fn default() -> Self {
        Self {
            create_enabled: true,
            call_enabled: true,
        }
    }
}

/// Chain parameters the VM needs to execute a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ChainConfig {
    /// EIP-155 chain id.
    pub chain_id: u64,
}

/// Access to the host's virtual machine.
pub trait EvmBackend {
    /// Current nonce of `address`.
    fn nonce(&self, address: Address) -> u64;

    /// Governance feature flags in effect for the current block.
    fn feature_flags(&self) -> EvmFeatureFlags;

    /// Chain configuration in effect for the current block.
    fn chain_config(&self) -> ChainConfig;

    /// Fee recipient of the current block, if the proposer is known.
    fn coinbase(&self) -> Option<Address>;

    /// Executes `message`. A reverted message is reported through
    /// [`ExecutionOutcome::failed`]; `Err` is reserved for framework faults.
    ///
    /// The backend advances the sender nonce.
    fn apply_message(
        &mut self,
        message: &VmMessage,
        env: &ExecutionEnv,
    ) -> Result<ExecutionOutcome, VmError>;

    /// Flushes execution-local caches so later messages observe earlier writes.
    fn commit_cached_state(&mut self);
}

/// The host's durable key-value store.
pub trait KeyValueStore {
    /// Reads the value stored under `key`.
    fn get(&self, key: &[u8]) -> Option<Vec<u8>>;

    /// Writes `value` under `key`.
    fn set(&mut self, key: &[u8], value: &[u8]);

    /// Removes `key`.
    fn delete(&mut self, key: &[u8]);

    /// All entries whose key starts with `prefix`, in ascending key order.
    fn prefix_entries(&self, prefix: &[u8]) -> Vec<(Vec<u8>, Vec<u8>)>;
}

/// Position in the host's state journal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Checkpoint(usize);

impl Checkpoint {
    /// Wraps a journal position.
    pub const fn new(index: usize) -> Self {
        Self(index)
    }

    /// Journal position of this checkpoint.
    pub const fn index(&self) -> usize {
        self.0
    }
}

/// Nested checkpoints over all host state (ledger, VM and store).
pub trait Journaled {
    /// Opens a nested scope.
    fn checkpoint(&mut self) -> Checkpoint;

    /// Folds the scope opened at `checkpoint` into its parent.
    fn checkpoint_commit(&mut self, checkpoint: Checkpoint);

    /// Discards every change made since `checkpoint`.
    fn checkpoint_revert(&mut self, checkpoint: Checkpoint);
}

/// Everything the conversion module needs from its host.
pub trait WrapHost: BankKeeper + EvmBackend + KeyValueStore + Journaled {}

impl<T> WrapHost for T where T: BankKeeper + EvmBackend + KeyValueStore + Journaled + ?Sized {}

/// A scoped view of the host whose changes are discarded unless committed.
///
/// Dropping the handle without calling [`Transaction::commit`] reverts the
/// scope. Handles nest: a transaction can be opened on another transaction.
#[derive(Debug)]
pub struct Transaction<'a, H: Journaled + ?Sized> {
    host: &'a mut H,
    checkpoint: Option<Checkpoint>,
}

impl<'a, H: Journaled + ?Sized> Transaction<'a, H> {
    /// Opens a new scope on `host`.
    pub fn begin(host: &'a mut H) -> Self {
        let checkpoint = host.checkpoint();
        Self {
            host,
            checkpoint: Some(checkpoint),
        }
    }

    /// Runs `f` in a new scope, committing on `Ok` and reverting on `Err`.
    pub fn scoped<T, E>(
        host: &'a mut H,
        f: impl FnOnce(&mut Self) -> Result<T, E>,
    ) -> Result<T, E> {
        let mut tx = Self::begin(host);
        let value = f(&mut tx)?;
        tx.commit();
        Ok(value)
    }

    /// Keeps the scope's changes.
    pub fn commit(mut self) {
        if let Some(checkpoint) = self.checkpoint.take() {
            self.host.checkpoint_commit(checkpoint);
        }
    }
}

impl<H: Journaled + ?Sized> Drop for Transaction<'_, H> {
    fn drop(&mut self) {
        if let Some(checkpoint) = self.checkpoint.take() {
            tracing::debug!(target: "ev_wrap", index = checkpoint.index(), "reverting scope");
            self.host.checkpoint_revert(checkpoint);
        }
    }
}

impl<H: Journaled + ?Sized> Deref for Transaction<'_, H> {
    type Target = H;

    fn deref(&self) -> &H {
        self.host
    }
}

impl<H: Journaled + ?Sized> DerefMut for Transaction<'_, H> {
    fn deref_mut(&mut self) -> &mut H {
        self.host
    }
}

impl KeyValueStore for std::collections::BTreeMap<Vec<u8>, Vec<u8>> {
    fn get(&self, key: &[u8]) -> Option<Vec<u8>> {
        std::collections::BTreeMap::get(self, key).cloned()
    }

    fn set(&mut self, key: &[u8], value: &[u8]) {
        self.insert(key.to_vec(), value.to_vec());
    }

    fn delete(&mut self, key: &[u8]) {
        self.remove(key);
    }

    fn prefix_entries(&self, prefix: &[u8]) -> Vec<(Vec<u8>, Vec<u8>)> {
        self.range(prefix.to_vec()..)
            .take_while(|(key, _)| key.starts_with(prefix))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect()
    }
}
