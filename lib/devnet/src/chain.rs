//! Account model and transaction execution.

use std::{
    collections::HashMap,
    fmt,
    sync::{Arc, Mutex, PoisonError, RwLock},
    time::Duration,
};

use alloy_primitives::{hex, keccak256, Address, Bytes, B256, U256};
use alloy_sol_types::SolError;
use tracing::{debug, trace};

use crate::proxy::{
    Erc1967Proxy, ProxyAdmin, TransparentUpgradeableProxy, ERC1967_PROXY_CODE,
    PROXY_ADMIN_CODE, TRANSPARENT_PROXY_CODE,
};

/// Block timestamp the chain starts at: 1st January 2025 `00:00:00`.
const GENESIS_TIMESTAMP: u64 = 1_735_689_600;

/// Nested calls deeper than this revert.
const MAX_CALL_DEPTH: usize = 64;

/// Output of a [`Program`] invocation.
pub type ProgramResult = Result<Vec<u8>, Revert>;

/// Executable logic bound to some bytecode.
///
/// A program never owns state. Everything it persists goes through the
/// [`Context`] it is handed, which points at the storage of the account the
/// code runs *for* (the proxy, when delegated).
pub trait Program: Send + Sync + 'static {
    /// Runs once, when an account carrying this program's code is created.
    ///
    /// # Errors
    ///
    /// A [`Revert`] aborts the creation and discards every write.
    fn construct(
        &self,
        ctx: &mut Context<'_>,
        args: &[u8],
    ) -> Result<(), Revert> {
        let _ = (ctx, args);
        Ok(())
    }

    /// Handles a message call with ABI-encoded `input`.
    ///
    /// # Errors
    ///
    /// A [`Revert`] discards every write made during the call.
    fn call(&self, ctx: &mut Context<'_>, input: &[u8]) -> ProgramResult;
}

/// ABI-encoded revert data.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Revert(Bytes);

impl Revert {
    /// Wraps raw revert data.
    pub fn new(data: impl Into<Bytes>) -> Self {
        Self(data.into())
    }

    /// Reverts with a Solidity `Error(string)` reason.
    pub fn message(reason: impl Into<String>) -> Self {
        let revert = alloy_sol_types::Revert { reason: reason.into() };
        Self(revert.abi_encode().into())
    }

    /// Reverts because `input` could not be decoded.
    pub fn malformed(err: &alloy_sol_types::Error) -> Self {
        Self::message(format!("malformed input: {err}"))
    }

    /// Raw revert data.
    #[must_use]
    pub fn data(&self) -> &Bytes {
        &self.0
    }

    /// Consumes the revert, returning the raw data.
    #[must_use]
    pub fn into_data(self) -> Bytes {
        self.0
    }

    /// Whether this revert carries the error `E`.
    #[must_use]
    pub fn is<E: SolError>(&self) -> bool {
        self.0.get(..4) == Some(E::SELECTOR.as_slice())
    }

    /// Decodes the revert as error `E`, if it is one.
    #[must_use]
    pub fn decode<E: SolError>(&self) -> Option<E> {
        E::abi_decode(&self.0).ok()
    }
}

impl<E: SolError> From<E> for Revert {
    fn from(err: E) -> Self {
        Self(err.abi_encode().into())
    }
}

impl fmt::Display for Revert {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(&self.0))
    }
}

/// A top-level transaction failed.
#[derive(Debug, thiserror::Error)]
pub enum DevnetError {
    /// Bytecode that no installed program answers to.
    #[error("no program installed for bytecode with hash {0}")]
    UnknownBytecode(B256),
    /// Execution reverted; all writes were discarded.
    #[error("execution reverted: {0}")]
    Reverted(Revert),
}

#[derive(Clone, Default)]
struct Account {
    nonce: u64,
    code: Bytes,
    storage: HashMap<U256, U256>,
}

#[derive(Clone)]
struct World {
    accounts: HashMap<Address, Account>,
    timestamp: u64,
}

impl Default for World {
    fn default() -> Self {
        Self { accounts: HashMap::new(), timestamp: GENESIS_TIMESTAMP }
    }
}

type Programs = HashMap<B256, Arc<dyn Program>>;

/// Execution environment of a single call frame.
pub struct Context<'a> {
    world: &'a mut World,
    programs: &'a Programs,
    sender: Address,
    address: Address,
    code_address: Address,
    depth: usize,
}

impl<'a> Context<'a> {
    fn new(
        world: &'a mut World,
        programs: &'a Programs,
        sender: Address,
        address: Address,
    ) -> Self {
        Self {
            world,
            programs,
            sender,
            address,
            code_address: address,
            depth: 0,
        }
    }

    /// The account that made this call.
    #[must_use]
    pub fn sender(&self) -> Address {
        self.sender
    }

    /// The account whose storage this frame reads and writes.
    #[must_use]
    pub fn address(&self) -> Address {
        self.address
    }

    /// The account whose code is running.
    ///
    /// Differs from [`Context::address`] inside a delegate call.
    #[must_use]
    pub fn code_address(&self) -> Address {
        self.code_address
    }

    /// Whether the running code executes on behalf of another account.
    #[must_use]
    pub fn is_delegated(&self) -> bool {
        self.address != self.code_address
    }

    /// Current block timestamp.
    #[must_use]
    pub fn timestamp(&self) -> u64 {
        self.world.timestamp
    }

    /// Whether `account` carries code.
    #[must_use]
    pub fn has_code(&self, account: Address) -> bool {
        self.world
            .accounts
            .get(&account)
            .is_some_and(|account| !account.code.is_empty())
    }

    /// Reads `slot` of the current storage.
    #[must_use]
    pub fn sload(&self, slot: U256) -> U256 {
        self.world
            .accounts
            .get(&self.address)
            .and_then(|account| account.storage.get(&slot).copied())
            .unwrap_or_default()
    }

    /// Writes `value` to `slot` of the current storage.
    pub fn sstore(&mut self, slot: U256, value: U256) {
        let storage =
            &mut self.world.accounts.entry(self.address).or_default().storage;
        if value.is_zero() {
            storage.remove(&slot);
        } else {
            storage.insert(slot, value);
        }
    }

    /// Calls `to` with this frame's account as the sender.
    ///
    /// # Errors
    ///
    /// Bubbles up the callee's [`Revert`]. Writes made by the callee are
    /// discarded in that case; writes made by this frame are kept.
    pub fn call(&mut self, to: Address, input: &[u8]) -> ProgramResult {
        let sender = self.address;
        self.run(sender, to, to, input)
    }

    /// Runs the code of `implementation` against this frame's storage,
    /// preserving the original sender.
    ///
    /// # Errors
    ///
    /// Bubbles up the implementation's [`Revert`].
    pub fn delegate(
        &mut self,
        implementation: Address,
        input: &[u8],
    ) -> ProgramResult {
        let (sender, address) = (self.sender, self.address);
        self.run(sender, address, implementation, input)
    }

    fn program_at(&self, code_address: Address) -> Option<Arc<dyn Program>> {
        let code = &self.world.accounts.get(&code_address)?.code;
        if code.is_empty() {
            return None;
        }
        self.programs.get(&keccak256(code)).cloned()
    }

    fn run(
        &mut self,
        sender: Address,
        address: Address,
        code_address: Address,
        input: &[u8],
    ) -> ProgramResult {
        if self.depth >= MAX_CALL_DEPTH {
            return Err(Revert::message("call depth exceeded"));
        }
        let Some(program) = self.program_at(code_address) else {
            return Ok(Vec::new());
        };

        trace!(%sender, %address, %code_address, "entering frame");
        let checkpoint = self.world.clone();
        let mut frame = Context {
            world: &mut *self.world,
            programs: self.programs,
            sender,
            address,
            code_address,
            depth: self.depth + 1,
        };
        let result = program.call(&mut frame, input);
        if result.is_err() {
            *self.world = checkpoint;
        }
        result
    }
}

/// In-memory chain.
///
/// Every top-level operation is atomic: it runs against a copy of the world
/// and the copy replaces the world only when the operation succeeds.
pub struct Devnet {
    programs: RwLock<Programs>,
    world: Mutex<World>,
    latency: Mutex<Duration>,
}

impl Default for Devnet {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Devnet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let world = self.world.lock().unwrap_or_else(PoisonError::into_inner);
        f.debug_struct("Devnet")
            .field("accounts", &world.accounts.len())
            .field("timestamp", &world.timestamp)
            .finish_non_exhaustive()
    }
}

impl Devnet {
    /// Creates an empty chain with the built-in proxy programs installed.
    #[must_use]
    pub fn new() -> Self {
        let devnet = Self {
            programs: RwLock::new(HashMap::new()),
            world: Mutex::new(World::default()),
            latency: Mutex::new(Duration::ZERO),
        };
        devnet.register(ERC1967_PROXY_CODE, Arc::new(Erc1967Proxy));
        devnet.register(
            TRANSPARENT_PROXY_CODE,
            Arc::new(TransparentUpgradeableProxy),
        );
        devnet.register(PROXY_ADMIN_CODE, Arc::new(ProxyAdmin));
        devnet
    }

    /// Installs `program` and returns the bytecode that deploys it.
    ///
    /// The bytecode is derived from `name`, so installing under a name
    /// that is already taken replaces the previous program.
    pub fn install<P: Program>(&self, name: &str, program: P) -> Bytes {
        let code = Bytes::from(format!("devnet:{name}").into_bytes());
        self.register(&code, Arc::new(program));
        code
    }

    fn register(&self, code: &[u8], program: Arc<dyn Program>) {
        self.programs
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(keccak256(code), program);
    }

    /// Creates an account carrying `bytecode` and runs its constructor with
    /// `args`.
    ///
    /// The address derives from `from` and its nonce, which is consumed even
    /// when the constructor reverts.
    ///
    /// # Errors
    ///
    /// * [`DevnetError::UnknownBytecode`] - No program answers to `bytecode`.
    /// * [`DevnetError::Reverted`] - The constructor reverted.
    pub fn deploy(
        &self,
        from: Address,
        bytecode: &[u8],
        args: &[u8],
    ) -> Result<Address, DevnetError> {
        let code_hash = keccak256(bytecode);
        let programs =
            self.programs.read().unwrap_or_else(PoisonError::into_inner);
        let program = programs
            .get(&code_hash)
            .cloned()
            .ok_or(DevnetError::UnknownBytecode(code_hash))?;

        let mut world =
            self.world.lock().unwrap_or_else(PoisonError::into_inner);
        let deployer = world.accounts.entry(from).or_default();
        let address = from.create(deployer.nonce);
        deployer.nonce += 1;

        let mut working = world.clone();
        working.accounts.entry(address).or_default().code =
            Bytes::copy_from_slice(bytecode);
        let mut ctx = Context::new(&mut working, &programs, from, address);
        if let Err(revert) = program.construct(&mut ctx, args) {
            debug!(%from, %address, %revert, "constructor reverted");
            return Err(DevnetError::Reverted(revert));
        }

        *world = working;
        debug!(%from, %address, "deployed contract");
        Ok(address)
    }

    /// Executes a read-only call; writes are discarded.
    ///
    /// # Errors
    ///
    /// * [`DevnetError::Reverted`] - The call reverted.
    pub fn call(
        &self,
        from: Address,
        to: Address,
        input: &[u8],
    ) -> Result<Bytes, DevnetError> {
        self.transact(false, from, to, input)
    }

    /// Executes a state-mutating call.
    ///
    /// # Errors
    ///
    /// * [`DevnetError::Reverted`] - The call reverted; nothing was written.
    pub fn send(
        &self,
        from: Address,
        to: Address,
        input: &[u8],
    ) -> Result<Bytes, DevnetError> {
        self.transact(true, from, to, input)
    }

    fn transact(
        &self,
        commit: bool,
        from: Address,
        to: Address,
        input: &[u8],
    ) -> Result<Bytes, DevnetError> {
        let programs =
            self.programs.read().unwrap_or_else(PoisonError::into_inner);
        let mut world =
            self.world.lock().unwrap_or_else(PoisonError::into_inner);
        if commit {
            world.accounts.entry(from).or_default().nonce += 1;
        }

        let mut working = world.clone();
        let mut ctx = Context::new(&mut working, &programs, from, to);
        let output = match ctx.program_at(to) {
            Some(program) => program.call(&mut ctx, input),
            None => Ok(Vec::new()),
        }
        .map_err(DevnetError::Reverted)?;

        if commit {
            *world = working;
        }
        Ok(output.into())
    }

    /// Code stored at `account`; empty for externally owned accounts.
    #[must_use]
    pub fn code_at(&self, account: Address) -> Bytes {
        let world = self.world.lock().unwrap_or_else(PoisonError::into_inner);
        world
            .accounts
            .get(&account)
            .map(|account| account.code.clone())
            .unwrap_or_default()
    }

    /// Raw storage word of `account` at `slot`.
    #[must_use]
    pub fn storage_at(&self, account: Address, slot: U256) -> U256 {
        let world = self.world.lock().unwrap_or_else(PoisonError::into_inner);
        world
            .accounts
            .get(&account)
            .and_then(|account| account.storage.get(&slot).copied())
            .unwrap_or_default()
    }

    /// Number of transactions sent by `account`.
    #[must_use]
    pub fn nonce(&self, account: Address) -> u64 {
        let world = self.world.lock().unwrap_or_else(PoisonError::into_inner);
        world.accounts.get(&account).map_or(0, |account| account.nonce)
    }

    /// Current block timestamp.
    #[must_use]
    pub fn timestamp(&self) -> u64 {
        self.world.lock().unwrap_or_else(PoisonError::into_inner).timestamp
    }

    /// Moves the block timestamp to `timestamp`.
    pub fn set_timestamp(&self, timestamp: u64) {
        self.world.lock().unwrap_or_else(PoisonError::into_inner).timestamp =
            timestamp;
    }

    /// Simulated round-trip time that asynchronous front-ends wait before
    /// every operation.
    #[must_use]
    pub fn latency(&self) -> Duration {
        *self.latency.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Sets the simulated round-trip time.
    pub fn set_latency(&self, latency: Duration) {
        *self.latency.lock().unwrap_or_else(PoisonError::into_inner) = latency;
    }
}
