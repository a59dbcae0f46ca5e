//! Import and export of the contract registry at chain genesis.

use crate::{
    error::{WrapError, WrapResult},
    host::{Journaled, KeyValueStore, Transaction},
    registry::{BindingKind, ContractRegistry},
};
use alloy_primitives::Address;
use ev_wrap_common::DenomFilter;
use serde::{Deserialize, Serialize};
use tracing::info;

/// One denom-to-contract binding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenMapping {
    /// Native denomination.
    pub denom: String,
    /// Token contract.
    pub contract: Address,
}

/// Registry contents at genesis.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenesisState {
    /// Externally registered contracts.
    #[serde(default)]
    pub external_contracts: Vec<TokenMapping>,
    /// Auto-deployed contracts.
    #[serde(default)]
    pub auto_contracts: Vec<TokenMapping>,
}

impl GenesisState {
    /// Checks every denom against `filter`.
    pub fn validate(&self, filter: &impl DenomFilter) -> WrapResult<()> {
        let unsupported = self
            .external_contracts
            .iter()
            .chain(&self.auto_contracts)
            .find(|mapping| !filter.is_wrappable(&mapping.denom));
        match unsupported {
            Some(mapping) => Err(WrapError::UnsupportedDenom {
                denom: mapping.denom.clone(),
            }),
            None => Ok(()),
        }
    }
}

/// Writes `state` into the registry. Nothing is written if any entry is invalid.
pub fn init_genesis<H>(
    host: &mut H,
    filter: &impl DenomFilter,
    state: &GenesisState,
) -> WrapResult<()>
where
    H: KeyValueStore + Journaled + ?Sized,
{
    state.validate(filter)?;
    Transaction::scoped(host, |tx| {
        for mapping in &state.external_contracts {
            tx.record_external(&mapping.denom, mapping.contract)?;
        }
        for mapping in &state.auto_contracts {
            tx.record_auto(&mapping.denom, mapping.contract)?;
        }
        Ok::<(), WrapError>(())
    })?;
    info!(
        target: "ev_wrap",
        external = state.external_contracts.len(),
        auto = state.auto_contracts.len(),
        "initialized token mappings"
    );
    Ok(())
}

/// Reads the registry back, ordered by denom.
pub fn export_genesis<S: KeyValueStore + ?Sized>(store: &S) -> WrapResult<GenesisState> {
    let mappings = |kind| -> WrapResult<Vec<TokenMapping>> {
        Ok(store
            .bindings_of_kind(kind)?
            .into_iter()
            .map(|(denom, contract)| TokenMapping { denom, contract })
            .collect())
    };
    Ok(GenesisState {
        external_contracts: mappings(BindingKind::External)?,
        auto_contracts: mappings(BindingKind::Auto)?,
    })
}
