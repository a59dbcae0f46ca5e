//! In-memory host and tracing helpers for tests.

use crate::{
    host::{
        BankKeeper, ChainConfig, Checkpoint, EvmBackend, EvmFeatureFlags, HostError, Journaled,
        KeyValueStore, VmError,
    },
    message::{ExecutionEnv, ExecutionOutcome, VmMessage},
};
use alloy_primitives::{address, Address, Bytes, U256};
use alloy_sol_types::{sol_data, Revert, SolError, SolInterface, SolType};
use ev_wrap_common::{Coin, ModuleERC20, WrappedTokenTemplate};
use std::{
    collections::{BTreeMap, HashMap},
    sync::{Arc, Mutex},
};
use tracing::{
    field::{Field, Visit},
    span::{Attributes, Id, Record},
    subscriber::set_default,
    Subscriber,
};
use tracing_subscriber::{
    layer::{Context, SubscriberExt},
    registry::LookupSpan,
    Layer,
};

/// Fee recipient the host reports unless a test overrides it.
pub(crate) const TEST_COINBASE: Address = address!("0x00000000000000000000000000000000000c0ffe");

/// ABI shape of the token constructor arguments.
type ConstructorArgs = (sol_data::String, sol_data::Uint<8>);

/// Gas the scripted VM charges per message.
const GAS_PER_MESSAGE: u64 = 21_000;

/// State of a token contract deployed into the scripted VM.
#[derive(Debug, Clone)]
struct MockToken {
    owner: Address,
    denom: String,
    balances: HashMap<Address, U256>,
}

/// Undo record for one state write.
#[derive(Debug)]
enum JournalEntry {
    Balance {
        key: (Address, String),
        prev: Option<U256>,
    },
    Nonce {
        address: Address,
        prev: Option<u64>,
    },
    Store {
        key: Vec<u8>,
        prev: Option<Vec<u8>>,
    },
    Token {
        address: Address,
        prev: Option<MockToken>,
    },
}

/// A journaled host whose VM only understands the wrapped-token template.
///
/// Knobs allow tests to disable features, drop the coinbase, make every token
/// call revert, or make the VM fault outright.
#[derive(Debug)]
pub(crate) struct MemoryHost {
    balances: HashMap<(Address, String), U256>,
    nonces: HashMap<Address, u64>,
    store: BTreeMap<Vec<u8>, Vec<u8>>,
    tokens: HashMap<Address, MockToken>,
    journal: Vec<JournalEntry>,
    depth: usize,
    flags: EvmFeatureFlags,
    chain: ChainConfig,
    coinbase: Option<Address>,
    template: WrappedTokenTemplate,
    call_revert: Option<String>,
    deploy_revert: Option<String>,
    fault: Option<String>,
    messages: Vec<VmMessage>,
    cache_commits: usize,
}

impl MemoryHost {
    pub(crate) fn new() -> Self {
        Self {
            balances: HashMap::new(),
            nonces: HashMap::new(),
            store: BTreeMap::new(),
            tokens: HashMap::new(),
            journal: Vec::new(),
            depth: 0,
            flags: EvmFeatureFlags::default(),
            chain: ChainConfig { chain_id: 1234 },
            coinbase: Some(TEST_COINBASE),
            template: WrappedTokenTemplate::new(vec![0x60, 0x80, 0x60, 0x40, 0x52]),
            call_revert: None,
            deploy_revert: None,
            fault: None,
            messages: Vec::new(),
            cache_commits: 0,
        }
    }

    /// Token template the scripted VM accepts as creation code.
    pub(crate) fn template(&self) -> WrappedTokenTemplate {
        self.template.clone()
    }

    pub(crate) fn fund(&mut self, account: Address, denom: &str, amount: u64) {
        self.balances
            .insert((account, denom.to_owned()), U256::from(amount));
    }

    pub(crate) fn balance(&self, account: Address, denom: &str) -> U256 {
        self.balances
            .get(&(account, denom.to_owned()))
            .copied()
            .unwrap_or_default()
    }

    pub(crate) fn wrapped_balance(&self, contract: Address, holder: Address) -> U256 {
        self.tokens
            .get(&contract)
            .and_then(|token| token.balances.get(&holder).copied())
            .unwrap_or_default()
    }

    pub(crate) fn token_denom(&self, contract: Address) -> Option<&str> {
        self.tokens.get(&contract).map(|token| token.denom.as_str())
    }

    pub(crate) fn deployed_tokens(&self) -> usize {
        self.tokens.len()
    }

    pub(crate) fn set_feature_flags(&mut self, flags: EvmFeatureFlags) {
        self.flags = flags;
    }

    pub(crate) fn set_coinbase(&mut self, coinbase: Option<Address>) {
        self.coinbase = coinbase;
    }

    pub(crate) fn fail_execution(&mut self, reason: &str) {
        self.fault = Some(reason.to_owned());
    }

    pub(crate) fn revert_token_calls(&mut self, reason: &str) {
        self.call_revert = Some(reason.to_owned());
    }

    pub(crate) fn revert_deployments(&mut self, reason: &str) {
        self.deploy_revert = Some(reason.to_owned());
    }

    pub(crate) fn messages_applied(&self) -> usize {
        self.messages.len()
    }

    pub(crate) fn last_message(&self) -> Option<&VmMessage> {
        self.messages.last()
    }

    pub(crate) fn cache_commits(&self) -> usize {
        self.cache_commits
    }

    pub(crate) fn open_scopes(&self) -> usize {
        self.depth
    }

    fn write_balance(&mut self, account: Address, denom: &str, value: U256) {
        let key = (account, denom.to_owned());
        let prev = self.balances.insert(key.clone(), value);
        self.journal.push(JournalEntry::Balance { key, prev });
    }

    fn write_nonce(&mut self, address: Address, value: u64) {
        let prev = self.nonces.insert(address, value);
        self.journal.push(JournalEntry::Nonce { address, prev });
    }

    fn write_token(&mut self, address: Address, token: MockToken) {
        let prev = self.tokens.insert(address, token);
        self.journal.push(JournalEntry::Token { address, prev });
    }

    fn undo(&mut self, entry: JournalEntry) {
        match entry {
            JournalEntry::Balance { key, prev } => restore(&mut self.balances, key, prev),
            JournalEntry::Nonce { address, prev } => restore(&mut self.nonces, address, prev),
            JournalEntry::Store { key, prev } => match prev {
                Some(value) => {
                    self.store.insert(key, value);
                }
                None => {
                    self.store.remove(&key);
                }
            },
            JournalEntry::Token { address, prev } => restore(&mut self.tokens, address, prev),
        }
    }

    fn execute_create(&mut self, message: &VmMessage) -> ExecutionOutcome {
        if let Some(reason) = self.deploy_revert.clone() {
            return reverted(&reason);
        }
        let code = self.template.creation_code().clone();
        let Some(args) = message.data.strip_prefix(&code[..]) else {
            return reverted("unknown creation code");
        };
        let Ok((denom, _decimals)) = ConstructorArgs::abi_decode_params(args) else {
            return reverted("invalid constructor arguments");
        };

        let address = message.from.create(message.nonce);
        self.write_token(
            address,
            MockToken {
                owner: message.from,
                denom,
                balances: HashMap::new(),
            },
        );
        ExecutionOutcome {
            return_data: Bytes::new(),
            failed: false,
            created_address: Some(address),
            gas_used: GAS_PER_MESSAGE,
        }
    }

    fn execute_call(&mut self, message: &VmMessage, contract: Address) -> ExecutionOutcome {
        let Some(mut token) = self.tokens.get(&contract).cloned() else {
            return reverted("no contract at address");
        };
        if let Some(reason) = self.call_revert.clone() {
            return reverted(&reason);
        }
        if message.from != token.owner {
            return reverted("caller is not the module");
        }

        match ModuleERC20::ModuleERC20Calls::abi_decode(&message.data) {
            Ok(ModuleERC20::ModuleERC20Calls::mint_by_native(call)) => {
                let balance = token.balances.entry(call.addr).or_default();
                let Some(next) = balance.checked_add(call.amount) else {
                    return reverted("mint overflow");
                };
                *balance = next;
            }
            Ok(ModuleERC20::ModuleERC20Calls::burn_by_native(call)) => {
                let balance = token.balances.entry(call.addr).or_default();
                let Some(next) = balance.checked_sub(call.amount) else {
                    return reverted("burn amount exceeds balance");
                };
                *balance = next;
            }
            Err(_) => return reverted("unknown selector"),
        }

        self.write_token(contract, token);
        ExecutionOutcome {
            return_data: Bytes::new(),
            failed: false,
            created_address: None,
            gas_used: GAS_PER_MESSAGE,
        }
    }
}

fn restore<K, V>(map: &mut HashMap<K, V>, key: K, prev: Option<V>)
where
    K: std::hash::Hash + Eq,
{
    match prev {
        Some(value) => {
            map.insert(key, value);
        }
        None => {
            map.remove(&key);
        }
    }
}

fn reverted(reason: &str) -> ExecutionOutcome {
    ExecutionOutcome {
        return_data: Revert {
            reason: reason.to_owned(),
        }
        .abi_encode()
        .into(),
        failed: true,
        created_address: None,
        gas_used: GAS_PER_MESSAGE,
    }
}

impl BankKeeper for MemoryHost {
    fn send_coin(&mut self, from: Address, to: Address, coin: &Coin) -> Result<(), HostError> {
        let available = self.balance(from, &coin.denom);
        let Some(remaining) = available.checked_sub(coin.amount) else {
            return Err(HostError::InsufficientFunds {
                account: from,
                denom: coin.denom.clone(),
                available,
                required: coin.amount,
            });
        };
        self.write_balance(from, &coin.denom, remaining);
        let credited = self
            .balance(to, &coin.denom)
            .checked_add(coin.amount)
            .ok_or_else(|| HostError::Other("balance overflow".to_owned()))?;
        self.write_balance(to, &coin.denom, credited);
        Ok(())
    }
}

impl EvmBackend for MemoryHost {
    fn nonce(&self, address: Address) -> u64 {
        self.nonces.get(&address).copied().unwrap_or_default()
    }

    fn feature_flags(&self) -> EvmFeatureFlags {
        self.flags
    }

    fn chain_config(&self) -> ChainConfig {
        self.chain
    }

    fn coinbase(&self) -> Option<Address> {
        self.coinbase
    }

    fn apply_message(
        &mut self,
        message: &VmMessage,
        env: &ExecutionEnv,
    ) -> Result<ExecutionOutcome, VmError> {
        if let Some(reason) = &self.fault {
            return Err(VmError(reason.clone()));
        }
        assert_eq!(env.chain, self.chain, "message executed with foreign chain config");
        self.messages.push(message.clone());

        let next = self.nonce(message.from) + 1;
        self.write_nonce(message.from, next);

        Ok(match message.to {
            None => self.execute_create(message),
            Some(contract) => self.execute_call(message, contract),
        })
    }

    fn commit_cached_state(&mut self) {
        self.cache_commits += 1;
    }
}

impl KeyValueStore for MemoryHost {
    fn get(&self, key: &[u8]) -> Option<Vec<u8>> {
        self.store.get(key).cloned()
    }

    fn set(&mut self, key: &[u8], value: &[u8]) {
        let prev = self.store.insert(key.to_vec(), value.to_vec());
        self.journal.push(JournalEntry::Store {
            key: key.to_vec(),
            prev,
        });
    }

    fn delete(&mut self, key: &[u8]) {
        if let Some(prev) = self.store.remove(key) {
            self.journal.push(JournalEntry::Store {
                key: key.to_vec(),
                prev: Some(prev),
            });
        }
    }

    fn prefix_entries(&self, prefix: &[u8]) -> Vec<(Vec<u8>, Vec<u8>)> {
        self.store.prefix_entries(prefix)
    }
}

impl Journaled for MemoryHost {
    fn checkpoint(&mut self) -> Checkpoint {
        self.depth += 1;
        Checkpoint::new(self.journal.len())
    }

    fn checkpoint_commit(&mut self, _checkpoint: Checkpoint) {
        self.depth -= 1;
        if self.depth == 0 {
            self.journal.clear();
        }
    }

    fn checkpoint_revert(&mut self, checkpoint: Checkpoint) {
        while self.journal.len() > checkpoint.index() {
            if let Some(entry) = self.journal.pop() {
                self.undo(entry);
            }
        }
        self.depth -= 1;
    }
}

/// A span opened under the `ev_wrap` target, with every field value it received.
#[derive(Debug, Clone)]
pub(crate) struct SpanRecord {
    id: u64,
    pub(crate) name: &'static str,
    fields: BTreeMap<&'static str, String>,
}

impl SpanRecord {
    pub(crate) fn has_field(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    pub(crate) fn field(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }
}

/// Writes visited values into a span's field map; later records overwrite.
struct FieldWriter<'a>(&'a mut BTreeMap<&'static str, String>);

impl Visit for FieldWriter<'_> {
    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        self.0.insert(field.name(), format!("{value:?}"));
    }

    fn record_str(&mut self, field: &Field, value: &str) {
        self.0.insert(field.name(), value.to_owned());
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        self.0.insert(field.name(), value.to_string());
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        self.0.insert(field.name(), value.to_string());
    }
}

/// Layer capturing the module's spans so tests can assert on their fields.
#[derive(Debug, Clone, Default)]
pub(crate) struct SpanCollector {
    spans: Arc<Mutex<Vec<SpanRecord>>>,
}

impl SpanCollector {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// First captured span called `name`.
    pub(crate) fn find_span(&self, name: &str) -> Option<SpanRecord> {
        self.spans
            .lock()
            .unwrap()
            .iter()
            .find(|span| span.name == name)
            .cloned()
    }

    /// Installs the collector as the thread-local subscriber until the guard drops.
    pub(crate) fn as_default(&self) -> tracing::subscriber::DefaultGuard {
        set_default(tracing_subscriber::registry().with(self.clone()))
    }
}

impl<S> Layer<S> for SpanCollector
where
    S: Subscriber + for<'lookup> LookupSpan<'lookup>,
{
    fn on_new_span(&self, attrs: &Attributes<'_>, id: &Id, _ctx: Context<'_, S>) {
        if attrs.metadata().target() != "ev_wrap" {
            return;
        }
        let mut fields = BTreeMap::new();
        attrs.record(&mut FieldWriter(&mut fields));
        self.spans.lock().unwrap().push(SpanRecord {
            id: id.into_u64(),
            name: attrs.metadata().name(),
            fields,
        });
    }

    fn on_record(&self, id: &Id, values: &Record<'_>, _ctx: Context<'_, S>) {
        let mut spans = self.spans.lock().unwrap();
        if let Some(span) = spans.iter_mut().rev().find(|span| span.id == id.into_u64()) {
            values.record(&mut FieldWriter(&mut span.fields));
        }
    }
}
