//! Executes module-originated messages on the host VM.

use crate::{
    error::{CallFailure, RevertOutput, WrapError, WrapResult},
    host::{EvmBackend, EvmOperation},
    message::{ExecutionEnv, ModuleIdentity, NonceCheck, VmMessage, VmResult},
};
use alloy_primitives::{Address, Bytes, U256};
use tracing::{debug, trace};

/// Issues VM messages as the module account.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModuleCaller {
    identity: ModuleIdentity,
    gas_cap: u64,
}

impl ModuleCaller {
    /// Creates a caller sending as `identity` with a fixed gas limit.
    pub const fn new(identity: ModuleIdentity, gas_cap: u64) -> Self {
        Self { identity, gas_cap }
    }

    /// Sender identity of issued messages.
    pub const fn identity(&self) -> ModuleIdentity {
        self.identity
    }

    /// Executes `data` against `to`, or creates a contract when `to` is `None`.
    ///
    /// Checks the governance feature flags and the block coinbase before
    /// executing, and flushes the VM's cached state afterwards. A reverted
    /// message is returned as `Ok` with [`VmResult::failed`] set.
    pub fn invoke<H: EvmBackend + ?Sized>(
        &self,
        host: &mut H,
        to: Option<Address>,
        data: Bytes,
        value: U256,
    ) -> WrapResult<VmResult> {
        let sender = self.identity.address();
        let nonce = host.nonce(sender);
        let message = VmMessage::system(
            self.identity,
            nonce,
            to,
            data,
            value,
            self.gas_cap,
            NonceCheck::Bypass,
        );

        let op = if message.is_create() {
            EvmOperation::Create
        } else {
            EvmOperation::Call
        };
        if !host.feature_flags().allows(op) {
            debug!(target: "ev_wrap", %op, "evm operation disabled by governance");
            return Err(WrapError::FeatureDisabled(op));
        }

        let coinbase = host.coinbase().ok_or(WrapError::CoinbaseUnavailable)?;
        let env = ExecutionEnv {
            chain: host.chain_config(),
            coinbase,
        };

        trace!(
            target: "ev_wrap",
            ?to,
            nonce,
            calldata_len = message.data.len(),
            "applying module message"
        );
        let outcome = host.apply_message(&message, &env)?;
        host.commit_cached_state();

        debug!(
            target: "ev_wrap",
            ?to,
            nonce,
            failed = outcome.failed,
            gas_used = outcome.gas_used,
            "module message applied"
        );
        Ok(VmResult::from_outcome(outcome, nonce))
    }

    /// Calls `contract` and returns its output, treating a revert as failure.
    pub fn call_contract<H: EvmBackend + ?Sized>(
        &self,
        host: &mut H,
        contract: Address,
        data: Bytes,
    ) -> Result<Bytes, CallFailure> {
        let result = self
            .invoke(host, Some(contract), data, U256::ZERO)
            .map_err(|err| CallFailure::Invocation(Box::new(err)))?;
        if result.failed {
            return Err(CallFailure::Reverted(RevertOutput(result.return_data)));
        }
        Ok(result.return_data)
    }
}
