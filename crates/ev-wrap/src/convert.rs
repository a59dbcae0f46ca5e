//! Conversion between native coins and their token contract representation.
//!
//! A conversion moves the native coin on the ledger and mints or burns the
//! matching token amount through the VM. Both effects, plus any contract
//! deployment and registry write the request triggers, live in one
//! [`Transaction`] scope: either all of them land or none do.
//!
//! ```text
//! Start -> DenomValidated -> ContractResolved -> LedgerTransferred -> ContractCallInvoked -> Done
//!   \__________________________ any failure: Aborted (scope reverted) _________________/
//! ```

use crate::{
    config::WrapConfig,
    deploy::TokenDeployer,
    error::{WrapError, WrapResult},
    host::{KeyValueStore, Transaction, WrapHost},
    invoke::ModuleCaller,
    registry::{BindingKind, ContractRegistry},
};
use alloy_primitives::Address;
use ev_wrap_common::{
    contract::{build_burn_call, build_mint_call},
    Coin, DenomFilter, SourceDenomFilter,
};
use std::fmt;
use tracing::{debug, info, instrument, warn};

/// Which way a conversion goes, with the accounts involved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Native coin of `sender` becomes tokens of `sender`.
    NativeToToken {
        /// Owner of the native coin and recipient of the tokens.
        sender: Address,
        /// Whether a missing contract may be deployed on the fly.
        auto_deploy: bool,
    },
    /// Tokens of `receiver` on `contract` become native coin of `receiver`.
    TokenToNative {
        /// Token contract, which must be bound to the coin's denom.
        contract: Address,
        /// Owner of the tokens and recipient of the native coin.
        receiver: Address,
    },
}

/// One conversion to execute. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversionRequest {
    /// Direction and accounts.
    pub direction: Direction,
    /// Denomination and amount.
    pub coin: Coin,
}

impl ConversionRequest {
    /// Native to token conversion request.
    pub const fn native_to_token(sender: Address, coin: Coin, auto_deploy: bool) -> Self {
        Self {
            direction: Direction::NativeToToken {
                sender,
                auto_deploy,
            },
            coin,
        }
    }

    /// Token to native conversion request.
    pub const fn token_to_native(contract: Address, receiver: Address, coin: Coin) -> Self {
        Self {
            direction: Direction::TokenToNative { contract, receiver },
            coin,
        }
    }
}

/// Progress of a conversion, used for logging aborted requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ConversionStage {
    /// Nothing checked yet.
    Start,
    /// The denom passed the allow-list.
    DenomValidated,
    /// A contract was found, validated or deployed.
    ContractResolved,
    /// The native coin moved on the ledger.
    LedgerTransferred,
    /// Mint or burn succeeded.
    ContractCallInvoked,
    /// The scope was committed.
    Done,
}

impl fmt::Display for ConversionStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Converts native coins to module tokens and back.
#[derive(Debug, Clone)]
pub struct TokenBridge<F = SourceDenomFilter> {
    caller: ModuleCaller,
    deployer: TokenDeployer,
    filter: F,
    enable_auto_deployment: bool,
}

impl TokenBridge<SourceDenomFilter> {
    /// Creates a bridge accepting IBC and Ethereum-bridged denoms.
    pub fn new(config: &WrapConfig) -> Self {
        Self::with_filter(config, SourceDenomFilter)
    }
}

impl<F: DenomFilter> TokenBridge<F> {
    /// Creates a bridge with a custom denom allow-list.
    pub fn with_filter(config: &WrapConfig, filter: F) -> Self {
        let caller = ModuleCaller::new(config.identity(), config.gas_cap);
        Self {
            caller,
            deployer: TokenDeployer::new(caller, config.template()),
            filter,
            enable_auto_deployment: config.enable_auto_deployment,
        }
    }

    /// The denom allow-list in use.
    pub const fn filter(&self) -> &F {
        &self.filter
    }

    /// Moves `coin` from `sender` to its token contract and mints the same
    /// amount of tokens to `sender`. Returns the contract used.
    #[instrument(target = "ev_wrap", skip_all, fields(
        sender = %sender,
        denom = %coin.denom,
        amount = %coin.amount,
        auto_deploy = auto_deploy,
    ))]
    pub fn convert_native_to_token<H: WrapHost + ?Sized>(
        &self,
        host: &mut H,
        sender: Address,
        coin: &Coin,
        auto_deploy: bool,
    ) -> WrapResult<Address> {
        self.execute(
            host,
            &ConversionRequest::native_to_token(sender, coin.clone(), auto_deploy),
        )
    }

    /// Moves `coin` from `contract`'s ledger account to `receiver` and burns
    /// the same amount of tokens from `receiver`.
    #[instrument(target = "ev_wrap", skip_all, fields(
        contract = %contract,
        receiver = %receiver,
        denom = %coin.denom,
        amount = %coin.amount,
    ))]
    pub fn convert_token_to_native<H: WrapHost + ?Sized>(
        &self,
        host: &mut H,
        contract: Address,
        receiver: Address,
        coin: &Coin,
    ) -> WrapResult<()> {
        self.execute(
            host,
            &ConversionRequest::token_to_native(contract, receiver, coin.clone()),
        )
        .map(drop)
    }

    /// Converts every coin in order; the first failure discards the whole batch.
    #[instrument(target = "ev_wrap", skip_all, fields(sender = %sender, coins = coins.len()))]
    pub fn convert_coins_to_tokens<H: WrapHost + ?Sized>(
        &self,
        host: &mut H,
        sender: Address,
        coins: &[Coin],
        auto_deploy: bool,
    ) -> WrapResult<Vec<Address>> {
        Transaction::scoped(host, |tx| {
            coins
                .iter()
                .map(|coin| {
                    let request =
                        ConversionRequest::native_to_token(sender, coin.clone(), auto_deploy);
                    self.execute(&mut **tx, &request)
                })
                .collect()
        })
    }

    /// Converts tokens of `contract` back for every coin in order; the first
    /// failure discards the whole batch.
    #[instrument(target = "ev_wrap", skip_all, fields(
        contract = %contract,
        receiver = %receiver,
        coins = coins.len(),
    ))]
    pub fn convert_tokens_to_coins<H: WrapHost + ?Sized>(
        &self,
        host: &mut H,
        contract: Address,
        receiver: Address,
        coins: &[Coin],
    ) -> WrapResult<()> {
        Transaction::scoped(host, |tx| {
            for coin in coins {
                let request = ConversionRequest::token_to_native(contract, receiver, coin.clone());
                self.execute(&mut **tx, &request)?;
            }
            Ok(())
        })
    }

    /// Runs one request in its own scope and returns the token contract involved.
    pub fn execute<H: WrapHost + ?Sized>(
        &self,
        host: &mut H,
        request: &ConversionRequest,
    ) -> WrapResult<Address> {
        let mut stage = ConversionStage::Start;
        let result = Transaction::scoped(host, |tx| self.apply(&mut **tx, request, &mut stage));

        match &result {
            Ok(contract) => {
                advance(&mut stage, ConversionStage::Done);
                info!(target: "ev_wrap", coin = %request.coin, ?contract, "conversion committed");
            }
            Err(err) => {
                warn!(
                    target: "ev_wrap",
                    coin = %request.coin,
                    %stage,
                    error = %err,
                    "conversion aborted"
                );
            }
        }
        result
    }

    /// Binds `contract` as the external token of `denom`, returning the
    /// previous external binding.
    pub fn register_external_contract<H: WrapHost + ?Sized>(
        &self,
        host: &mut H,
        denom: &str,
        contract: Address,
    ) -> WrapResult<Option<Address>> {
        self.ensure_wrappable(denom)?;
        let previous = Transaction::scoped(host, |tx| tx.record_external(denom, contract))?;
        info!(target: "ev_wrap", denom, ?contract, ?previous, "registered external contract");
        Ok(previous)
    }

    /// The contract conversions of `denom` currently use, external first.
    pub fn contract_for_denom<S: KeyValueStore + ?Sized>(
        &self,
        store: &S,
        denom: &str,
    ) -> WrapResult<Option<Address>> {
        Ok(store.resolve(denom)?.map(|(contract, _)| contract))
    }

    /// The denom represented by `contract`.
    pub fn denom_for_contract<S: KeyValueStore + ?Sized>(
        &self,
        store: &S,
        contract: Address,
    ) -> WrapResult<Option<String>> {
        store.denom_of(contract)
    }

    fn ensure_wrappable(&self, denom: &str) -> WrapResult<()> {
        if self.filter.is_wrappable(denom) {
            Ok(())
        } else {
            Err(WrapError::UnsupportedDenom {
                denom: denom.to_owned(),
            })
        }
    }

    fn apply<H: WrapHost + ?Sized>(
        &self,
        host: &mut H,
        request: &ConversionRequest,
        stage: &mut ConversionStage,
    ) -> WrapResult<Address> {
        let coin = &request.coin;
        self.ensure_wrappable(&coin.denom)?;
        advance(stage, ConversionStage::DenomValidated);

        match request.direction {
            Direction::NativeToToken {
                sender,
                auto_deploy,
            } => {
                let contract = self.resolve_or_deploy(host, &coin.denom, auto_deploy)?;
                advance(stage, ConversionStage::ContractResolved);

                host.send_coin(sender, contract, coin)
                    .map_err(|source| WrapError::TransferFailed {
                        from: sender,
                        to: contract,
                        source,
                    })?;
                advance(stage, ConversionStage::LedgerTransferred);

                self.caller
                    .call_contract(host, contract, build_mint_call(sender, coin.amount))
                    .map_err(|cause| WrapError::MintFailed { contract, cause })?;
                advance(stage, ConversionStage::ContractCallInvoked);
                Ok(contract)
            }
            Direction::TokenToNative { contract, receiver } => {
                if !host.resolve_explicit(&coin.denom, contract)? {
                    return Err(WrapError::ContractNotMappedToDenom {
                        contract,
                        denom: coin.denom.clone(),
                    });
                }
                advance(stage, ConversionStage::ContractResolved);

                host.send_coin(contract, receiver, coin)
                    .map_err(|source| WrapError::TransferFailed {
                        from: contract,
                        to: receiver,
                        source,
                    })?;
                advance(stage, ConversionStage::LedgerTransferred);

                self.caller
                    .call_contract(host, contract, build_burn_call(receiver, coin.amount))
                    .map_err(|cause| WrapError::BurnFailed { contract, cause })?;
                advance(stage, ConversionStage::ContractCallInvoked);
                Ok(contract)
            }
        }
    }

    fn resolve_or_deploy<H: WrapHost + ?Sized>(
        &self,
        host: &mut H,
        denom: &str,
        auto_deploy: bool,
    ) -> WrapResult<Address> {
        if let Some((contract, kind)) = host.resolve(denom)? {
            debug!(target: "ev_wrap", denom, ?contract, %kind, "resolved token contract");
            return Ok(contract);
        }
        if !(auto_deploy && self.enable_auto_deployment) {
            return Err(WrapError::NoContractForDenom {
                denom: denom.to_owned(),
            });
        }

        let contract = self.deployer.deploy(host, denom)?;
        host.record_auto(denom, contract)?;
        debug!(
            target: "ev_wrap",
            denom,
            ?contract,
            kind = %BindingKind::Auto,
            "recorded token contract"
        );
        Ok(contract)
    }
}

fn advance(stage: &mut ConversionStage, next: ConversionStage) {
    debug!(target: "ev_wrap", from = %stage, to = %next, "conversion stage");
    *stage = next;
}
