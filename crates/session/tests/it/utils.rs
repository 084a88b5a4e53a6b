//! Deterministic doubles of the wallet, the contract and the notification sink.

use alloy_primitives::{Address, TxHash, U256, address, utils::parse_ether};
use async_trait::async_trait;
use bluecarbon_session::{
    AccountsListener, ContractConnector, ContractProxy, ListenerId, Notification,
    NotificationSink, Receipt, SessionConfig, SessionError, SessionManager, SessionState,
    SignerHandle, TransactionHandle, Variant, WalletProvider,
};
use parking_lot::Mutex;
use std::{
    collections::{BTreeMap, VecDeque},
    sync::{
        Arc,
        atomic::{AtomicU64, AtomicUsize, Ordering},
    },
    time::Duration,
};
use tokio::sync::{Semaphore, oneshot, watch};

pub const CONTRACT: Address = address!("0x5D7cbB409E56B378c346E819350C6c9B8F494319");
pub const ALICE: Address = address!("0xABCDEF0123456789ABCDEF0123456789ABCDEF01");
pub const BOB: Address = address!("0xB0B0B0B0B0B0B0B0B0B0B0B0B0B0B0B0B0B0B0B0");
pub const SEPOLIA: u64 = 11155111;

pub type Manager = SessionManager<FakeWallet, FakeConnector>;

pub fn unit_price() -> U256 {
    parse_ether("0.01").unwrap()
}

pub fn configured() -> SessionConfig {
    SessionConfig::new(Some(CONTRACT), unit_price()).with_chain_id(SEPOLIA)
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FakeSigner(pub Address);

impl SignerHandle for FakeSigner {
    fn address(&self) -> Address {
        self.0
    }
}

pub struct FakeWallet {
    pub accounts: Mutex<Vec<Address>>,
    pub request_error: Mutex<Option<SessionError>>,
    pub chain_id: Mutex<u64>,
    /// Gates handed out to the next `signer()` calls, in order.
    signer_gates: Mutex<VecDeque<oneshot::Receiver<Address>>>,
    listeners: Mutex<BTreeMap<ListenerId, AccountsListener>>,
    next_listener: AtomicU64,
    pub request_calls: AtomicUsize,
    pub signer_calls: AtomicUsize,
}

impl FakeWallet {
    pub fn new(accounts: Vec<Address>) -> Self {
        Self {
            accounts: Mutex::new(accounts),
            request_error: Mutex::new(None),
            chain_id: Mutex::new(SEPOLIA),
            signer_gates: Mutex::new(VecDeque::new()),
            listeners: Mutex::new(BTreeMap::new()),
            next_listener: AtomicU64::new(1),
            request_calls: AtomicUsize::new(0),
            signer_calls: AtomicUsize::new(0),
        }
    }

    pub fn select(&self, account: Address) {
        *self.accounts.lock() = vec![account];
    }

    pub fn fail_requests(&self, err: Option<SessionError>) {
        *self.request_error.lock() = err;
    }

    /// Makes the next `signer()` call hang until the returned sender resolves it.
    pub fn gate_signer(&self) -> oneshot::Sender<Address> {
        let (tx, rx) = oneshot::channel();
        self.signer_gates.lock().push_back(rx);
        tx
    }

    /// Delivers `accountsChanged` to every registered listener.
    pub fn emit(&self, accounts: Vec<Address>) -> usize {
        let listeners = self.listeners.lock();
        listeners.values().filter(|listener| listener.send(accounts.clone()).is_ok()).count()
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.lock().len()
    }

    pub fn requests(&self) -> usize {
        self.request_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl WalletProvider for FakeWallet {
    type Signer = FakeSigner;

    async fn request_accounts(&self) -> Result<Vec<Address>, SessionError> {
        self.request_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(err) = self.request_error.lock().clone() {
            return Err(err);
        }
        Ok(self.accounts.lock().clone())
    }

    async fn signer(&self) -> Result<FakeSigner, SessionError> {
        self.signer_calls.fetch_add(1, Ordering::SeqCst);
        let gate = self.signer_gates.lock().pop_front();
        if let Some(gate) = gate {
            let address = gate.await.map_err(|_| SessionError::UserRejected)?;
            return Ok(FakeSigner(address));
        }
        let accounts = self.accounts.lock().clone();
        accounts.first().copied().map(FakeSigner).ok_or(SessionError::NoAccounts)
    }

    async fn chain_id(&self) -> Result<u64, SessionError> {
        Ok(*self.chain_id.lock())
    }

    fn subscribe_accounts(&self, listener: AccountsListener) -> ListenerId {
        let id = ListenerId(self.next_listener.fetch_add(1, Ordering::SeqCst));
        self.listeners.lock().insert(id, listener);
        id
    }

    fn unsubscribe_accounts(&self, id: ListenerId) {
        self.listeners.lock().remove(&id);
    }
}

/// On-chain state shared by every contract binding of a test.
pub struct FakeChain {
    pub owner: Mutex<Address>,
    pub balance: Mutex<U256>,
    pub read_error: Mutex<Option<SessionError>>,
    pub send_error: Mutex<Option<SessionError>>,
    pub wait_error: Mutex<Option<SessionError>>,
    /// When set, confirmations wait for a permit.
    pub confirmations: Mutex<Option<Arc<Semaphore>>>,
    /// `(contract, signer)` of every binding.
    pub bindings: Mutex<Vec<(Address, Address)>>,
    /// `(project_id, amount, value)` of every purchase sent.
    pub purchases: Mutex<Vec<(U256, U256, U256)>>,
    pub balance_calls: AtomicUsize,
    pub owner_calls: AtomicUsize,
    pub withdraw_calls: AtomicUsize,
    pub purchase_calls: AtomicUsize,
    next_tx: AtomicU64,
}

impl FakeChain {
    pub fn new(owner: Address, balance: U256) -> Self {
        Self {
            owner: Mutex::new(owner),
            balance: Mutex::new(balance),
            read_error: Mutex::new(None),
            send_error: Mutex::new(None),
            wait_error: Mutex::new(None),
            confirmations: Mutex::new(None),
            bindings: Mutex::new(Vec::new()),
            purchases: Mutex::new(Vec::new()),
            balance_calls: AtomicUsize::new(0),
            owner_calls: AtomicUsize::new(0),
            withdraw_calls: AtomicUsize::new(0),
            purchase_calls: AtomicUsize::new(0),
            next_tx: AtomicU64::new(1),
        }
    }

    /// Holds every confirmation until permits are added to the returned semaphore.
    pub fn hold_confirmations(&self) -> Arc<Semaphore> {
        let gate = Arc::new(Semaphore::new(0));
        *self.confirmations.lock() = Some(gate.clone());
        gate
    }

    pub fn writes(&self) -> usize {
        self.withdraw_calls.load(Ordering::SeqCst) + self.purchase_calls.load(Ordering::SeqCst)
    }

    fn next_hash(&self) -> TxHash {
        TxHash::with_last_byte(self.next_tx.fetch_add(1, Ordering::SeqCst) as u8)
    }
}

pub struct FakeConnector {
    pub chain: Arc<FakeChain>,
}

impl ContractConnector<FakeSigner> for FakeConnector {
    type Contract = FakeContract;

    fn connect(&self, address: Address, signer: &FakeSigner) -> FakeContract {
        self.chain.bindings.lock().push((address, signer.0));
        FakeContract { chain: self.chain.clone() }
    }
}

pub struct FakeContract {
    chain: Arc<FakeChain>,
}

#[async_trait]
impl ContractProxy for FakeContract {
    type Transaction = FakeTransaction;

    async fn balance(&self) -> Result<U256, SessionError> {
        self.chain.balance_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(err) = self.chain.read_error.lock().clone() {
            return Err(err);
        }
        Ok(*self.chain.balance.lock())
    }

    async fn owner(&self) -> Result<Address, SessionError> {
        self.chain.owner_calls.fetch_add(1, Ordering::SeqCst);
        Ok(*self.chain.owner.lock())
    }

    async fn withdraw(&self) -> Result<FakeTransaction, SessionError> {
        self.chain.withdraw_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(err) = self.chain.send_error.lock().clone() {
            return Err(err);
        }
        Ok(FakeTransaction {
            chain: self.chain.clone(),
            hash: self.chain.next_hash(),
            effect: Effect::Withdraw,
        })
    }

    async fn purchase_credits(
        &self,
        project_id: U256,
        amount: U256,
        value: U256,
    ) -> Result<FakeTransaction, SessionError> {
        self.chain.purchase_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(err) = self.chain.send_error.lock().clone() {
            return Err(err);
        }
        self.chain.purchases.lock().push((project_id, amount, value));
        Ok(FakeTransaction {
            chain: self.chain.clone(),
            hash: self.chain.next_hash(),
            effect: Effect::Deposit(value),
        })
    }
}

enum Effect {
    Withdraw,
    Deposit(U256),
}

pub struct FakeTransaction {
    chain: Arc<FakeChain>,
    hash: TxHash,
    effect: Effect,
}

#[async_trait]
impl TransactionHandle for FakeTransaction {
    fn tx_hash(&self) -> TxHash {
        self.hash
    }

    async fn wait(self) -> Result<Receipt, SessionError> {
        let gate = self.chain.confirmations.lock().clone();
        if let Some(gate) = gate {
            gate.acquire().await.expect("confirmation gate closed").forget();
        }
        if let Some(err) = self.chain.wait_error.lock().clone() {
            return Err(err);
        }
        let mut balance = self.chain.balance.lock();
        match self.effect {
            Effect::Withdraw => *balance = U256::ZERO,
            Effect::Deposit(value) => *balance += value,
        }
        Ok(Receipt { tx_hash: self.hash, block_number: Some(1), gas_used: 21_000 })
    }
}

#[derive(Default)]
pub struct RecordingSink {
    notifications: Mutex<Vec<Notification>>,
}

impl RecordingSink {
    pub fn all(&self) -> Vec<Notification> {
        self.notifications.lock().clone()
    }

    /// Returns and forgets everything recorded so far.
    pub fn take(&self) -> Vec<Notification> {
        std::mem::take(&mut *self.notifications.lock())
    }

    pub fn titles(&self) -> Vec<String> {
        self.notifications.lock().iter().map(|n| n.title.clone()).collect()
    }

    pub fn destructive(&self) -> Vec<Notification> {
        let notifications = self.notifications.lock();
        notifications.iter().filter(|n| n.variant == Variant::Destructive).cloned().collect()
    }
}

impl NotificationSink for RecordingSink {
    fn notify(&self, notification: Notification) {
        self.notifications.lock().push(notification);
    }
}

pub struct Harness {
    pub wallet: Arc<FakeWallet>,
    pub chain: Arc<FakeChain>,
    pub sink: Arc<RecordingSink>,
    pub manager: Arc<Manager>,
}

impl Harness {
    /// Alice's wallet, a contract owned by Alice holding 1.5 ether.
    pub fn new() -> Self {
        Self::with(configured(), ALICE, ALICE, parse_ether("1.5").unwrap())
    }

    pub fn with(config: SessionConfig, account: Address, owner: Address, balance: U256) -> Self {
        crate::init_tracing();
        let wallet = Arc::new(FakeWallet::new(vec![account]));
        let chain = Arc::new(FakeChain::new(owner, balance));
        let sink = Arc::new(RecordingSink::default());
        let manager = Arc::new(SessionManager::new(
            config,
            wallet.clone(),
            FakeConnector { chain: chain.clone() },
            sink.clone(),
        ));
        Self { wallet, chain, sink, manager }
    }

    /// Connects and forgets the connection notifications.
    pub async fn connected() -> Self {
        let harness = Self::new();
        harness.manager.connect().await.unwrap();
        harness.sink.take();
        harness
    }

    pub fn state(&self) -> SessionState {
        self.manager.state()
    }
}

/// Waits until the published state satisfies `f`.
pub async fn wait_for(
    rx: &mut watch::Receiver<SessionState>,
    f: impl FnMut(&SessionState) -> bool,
) -> SessionState {
    tokio::time::timeout(Duration::from_secs(5), rx.wait_for(f))
        .await
        .expect("timed out waiting for session state")
        .expect("session manager dropped")
        .clone()
}

/// Polls `f` until it holds, yielding to other tasks in between.
pub async fn wait_until(mut f: impl FnMut() -> bool) {
    let poll = async {
        while !f() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    };
    tokio::time::timeout(Duration::from_secs(5), poll).await.expect("condition never held");
}

