//! Deployment of module-owned token contracts.

use crate::{
    error::{RevertOutput, WrapError, WrapResult},
    host::EvmBackend,
    invoke::ModuleCaller,
};
use alloy_primitives::{Address, U256};
use ev_wrap_common::{WrappedTokenTemplate, AUTO_TOKEN_DECIMALS};
use tracing::{info, warn};

/// Deploys a [`WrappedTokenTemplate`] instance per denomination.
#[derive(Debug, Clone)]
pub struct TokenDeployer {
    caller: ModuleCaller,
    template: WrappedTokenTemplate,
}

impl TokenDeployer {
    /// Creates a deployer issuing creation messages through `caller`.
    pub const fn new(caller: ModuleCaller, template: WrappedTokenTemplate) -> Self {
        Self { caller, template }
    }

    /// Deploys a token contract for `denom` and returns its address.
    ///
    /// The address is derived from the module address and the nonce consumed
    /// by the creation message, not taken from the VM's report. Registering
    /// it is left to the caller.
    pub fn deploy<H: EvmBackend + ?Sized>(&self, host: &mut H, denom: &str) -> WrapResult<Address> {
        let data = self.template.build_constructor(denom, AUTO_TOKEN_DECIMALS);
        let result = self.caller.invoke(host, None, data, U256::ZERO)?;
        if result.failed {
            return Err(WrapError::DeployFailed {
                denom: denom.to_owned(),
                output: RevertOutput(result.return_data),
            });
        }

        let contract = self.caller.identity().address().create(result.nonce);
        if let Some(reported) = result.created_address.filter(|reported| *reported != contract) {
            warn!(
                target: "ev_wrap",
                denom,
                ?reported,
                derived = ?contract,
                "vm reported a different creation address"
            );
        }

        info!(target: "ev_wrap", denom, ?contract, nonce = result.nonce, "deployed token contract");
        Ok(contract)
    }
}
