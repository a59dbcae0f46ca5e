//! Durable mapping from native denominations to the token contracts representing them.
//!
//! Each denom has at most one `external` binding (registered by governance)
//! and at most one `auto` binding (recorded after auto-deployment). Lookups
//! prefer the external one. A reverse index maps contracts back to denoms.
//!
//! ## Storage Layout
//!
//! | Key | Value |
//! |-----|-------|
//! | `wrap/ 0x01 denom` | external contract (20 bytes) |
//! | `wrap/ 0x02 denom` | auto contract (20 bytes) |
//! | `wrap/ 0x03 contract` | denom (UTF-8) |

use crate::{
    error::{WrapError, WrapResult},
    host::KeyValueStore,
};
use alloy_primitives::Address;
use ev_wrap_common::STORE_NAMESPACE;
use std::fmt;

const PREFIX_EXTERNAL: u8 = 0x01;
const PREFIX_AUTO: u8 = 0x02;
const PREFIX_CONTRACT_TO_DENOM: u8 = 0x03;

/// Origin of a denom-to-contract binding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BindingKind {
    /// Registered by an authority outside the module.
    External,
    /// Deployed by the module on first use.
    Auto,
}

impl BindingKind {
    const fn prefix(self) -> u8 {
        match self {
            Self::External => PREFIX_EXTERNAL,
            Self::Auto => PREFIX_AUTO,
        }
    }
}

impl fmt::Display for BindingKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::External => f.write_str("external"),
            Self::Auto => f.write_str("auto"),
        }
    }
}

/// Both binding slots of a denom.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ContractBindings {
    /// Externally registered contract.
    pub external: Option<Address>,
    /// Auto-deployed contract.
    pub auto: Option<Address>,
}

impl ContractBindings {
    /// The binding conversions use: external first, then auto.
    pub fn resolve(&self) -> Option<(Address, BindingKind)> {
        self.external
            .map(|addr| (addr, BindingKind::External))
            .or_else(|| self.auto.map(|addr| (addr, BindingKind::Auto)))
    }

    /// Contract in the slot of `kind`.
    pub const fn get(&self, kind: BindingKind) -> Option<Address> {
        match kind {
            BindingKind::External => self.external,
            BindingKind::Auto => self.auto,
        }
    }

    /// Returns true if `contract` occupies either slot.
    pub fn contains(&self, contract: Address) -> bool {
        self.external == Some(contract) || self.auto == Some(contract)
    }
}

fn namespaced(prefix: u8, tail: &[u8]) -> Vec<u8> {
    let mut key = Vec::with_capacity(STORE_NAMESPACE.len() + 1 + tail.len());
    key.extend_from_slice(STORE_NAMESPACE);
    key.push(prefix);
    key.extend_from_slice(tail);
    key
}

fn binding_key(kind: BindingKind, denom: &str) -> Vec<u8> {
    namespaced(kind.prefix(), denom.as_bytes())
}

fn reverse_key(contract: Address) -> Vec<u8> {
    namespaced(PREFIX_CONTRACT_TO_DENOM, contract.as_slice())
}

fn decode_address(key: &[u8], raw: &[u8]) -> WrapResult<Address> {
    if raw.len() != 20 {
        return Err(WrapError::CorruptRegistryEntry { key: key.to_vec() });
    }
    Ok(Address::from_slice(raw))
}

/// Registry operations, available on every [`KeyValueStore`].
pub trait ContractRegistry: KeyValueStore {
    /// Contract bound to `denom` with the given `kind`.
    fn binding(&self, denom: &str, kind: BindingKind) -> WrapResult<Option<Address>> {
        let key = binding_key(kind, denom);
        self.get(&key)
            .map(|raw| decode_address(&key, &raw))
            .transpose()
    }

    /// Both binding slots of `denom`.
    fn bindings(&self, denom: &str) -> WrapResult<ContractBindings> {
        Ok(ContractBindings {
            external: self.binding(denom, BindingKind::External)?,
            auto: self.binding(denom, BindingKind::Auto)?,
        })
    }

    /// The contract conversions should use for `denom`, external first.
    fn resolve(&self, denom: &str) -> WrapResult<Option<(Address, BindingKind)>> {
        Ok(self.bindings(denom)?.resolve())
    }

    /// Returns true if `contract` is the external or the auto binding of `denom`.
    fn resolve_explicit(&self, denom: &str, contract: Address) -> WrapResult<bool> {
        Ok(self.bindings(denom)?.contains(contract))
    }

    /// Denom represented by `contract`, if any.
    fn denom_of(&self, contract: Address) -> WrapResult<Option<String>> {
        let key = reverse_key(contract);
        self.get(&key)
            .map(|raw| {
                String::from_utf8(raw)
                    .map_err(|_| WrapError::CorruptRegistryEntry { key: key.clone() })
            })
            .transpose()
    }

    /// Records the auto-deployed contract of `denom`, returning the previous
    /// auto binding.
    ///
    /// An existing auto binding is overwritten. Deploying only when no contract
    /// is bound is up to the caller.
    fn record_auto(&mut self, denom: &str, contract: Address) -> WrapResult<Option<Address>> {
        bind(self, BindingKind::Auto, denom, contract)
    }

    /// Binds `contract` as the external contract of `denom`, returning the
    /// previous external binding.
    fn record_external(&mut self, denom: &str, contract: Address) -> WrapResult<Option<Address>> {
        bind(self, BindingKind::External, denom, contract)
    }

    /// All `(denom, contract)` pairs of one kind, ordered by denom bytes.
    fn bindings_of_kind(&self, kind: BindingKind) -> WrapResult<Vec<(String, Address)>> {
        let prefix = namespaced(kind.prefix(), &[]);
        self.prefix_entries(&prefix)
            .into_iter()
            .map(|(key, raw)| -> WrapResult<(String, Address)> {
                let denom = String::from_utf8(key[prefix.len()..].to_vec())
                    .map_err(|_| WrapError::CorruptRegistryEntry { key: key.clone() })?;
                Ok((denom, decode_address(&key, &raw)?))
            })
            .collect()
    }
}

impl<S: KeyValueStore + ?Sized> ContractRegistry for S {}

/// Writes one binding slot and keeps the reverse index in step.
///
/// A contract represents at most one denom. The replaced contract loses its
/// reverse entry unless the other slot of the same denom still holds it.
fn bind<S: ContractRegistry + ?Sized>(
    store: &mut S,
    kind: BindingKind,
    denom: &str,
    contract: Address,
) -> WrapResult<Option<Address>> {
    if let Some(bound) = store.denom_of(contract)?.filter(|bound| bound != denom) {
        return Err(WrapError::ContractBoundElsewhere {
            contract,
            bound,
            denom: denom.to_owned(),
        });
    }

    let current = store.bindings(denom)?;
    let other = match kind {
        BindingKind::External => BindingKind::Auto,
        BindingKind::Auto => BindingKind::External,
    };
    let previous = current.get(kind);
    if let Some(old) = previous.filter(|old| *old != contract) {
        if current.get(other) != Some(old) {
            store.delete(&reverse_key(old));
        }
    }

    store.set(&binding_key(kind, denom), contract.as_slice());
    store.set(&reverse_key(contract), denom.as_bytes());
    Ok(previous)
}
