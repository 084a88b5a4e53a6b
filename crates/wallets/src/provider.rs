//! [`WalletProvider`] over a JSON-RPC endpoint.

use crate::error::rpc_error;
use alloy_network::EthereumWallet;
use alloy_primitives::Address;
use alloy_provider::{DynProvider, Provider, ProviderBuilder};
use alloy_signer_local::PrivateKeySigner;
use alloy_transport::RpcError;
use async_trait::async_trait;
use bluecarbon_session::{
    AccountsListener, ListenerId, SessionError, SignerHandle, WalletProvider,
};
use parking_lot::Mutex;
use std::{
    collections::BTreeMap,
    fmt,
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
    time::Duration,
};
use tokio::task::JoinHandle;

/// JSON-RPC error code of a method the endpoint does not implement.
const METHOD_NOT_FOUND: i64 = -32601;

/// Default interval between two polls of the account list.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(4);

/// Provider able to send transactions on behalf of one account.
#[derive(Clone)]
pub struct RpcSigner {
    address: Address,
    provider: DynProvider,
}

impl RpcSigner {
    pub fn provider(&self) -> &DynProvider {
        &self.provider
    }
}

impl SignerHandle for RpcSigner {
    fn address(&self) -> Address {
        self.address
    }
}

impl fmt::Debug for RpcSigner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RpcSigner").field("address", &self.address).finish_non_exhaustive()
    }
}

/// State shared with the account watcher task.
struct Shared {
    provider: DynProvider,
    listeners: Mutex<BTreeMap<ListenerId, AccountsListener>>,
    /// The account watcher. Locked before `listeners`.
    watcher: Mutex<Option<JoinHandle<()>>>,
}

impl Shared {
    /// Sends `accounts` to every listener, dropping the ones whose receiver is gone.
    fn broadcast(&self, accounts: &[Address]) {
        let mut listeners = self.listeners.lock();
        listeners.retain(|id, listener| {
            let open = listener.send(accounts.to_vec()).is_ok();
            if !open {
                trace!(%id, "dropping closed accounts listener");
            }
            open
        });
        debug!(?accounts, listeners = listeners.len(), "accountsChanged");
    }

    /// Drops listeners whose receiver is gone and returns how many are left.
    fn prune(&self) -> usize {
        let mut listeners = self.listeners.lock();
        listeners.retain(|_, listener| !listener.is_closed());
        listeners.len()
    }
}

/// Wallet backed by a JSON-RPC node.
///
/// With a local signer the wallet exposes exactly that account and signs transactions itself.
/// Otherwise it uses the node's unlocked accounts, and account changes are detected by polling.
pub struct RpcWallet {
    rpc_url: String,
    local: Option<PrivateKeySigner>,
    shared: Arc<Shared>,
    poll_interval: Duration,
    next_listener: AtomicU64,
}

impl RpcWallet {
    /// Creates a wallet talking to `rpc_url`.
    pub async fn new(
        rpc_url: impl Into<String>,
        local: Option<PrivateKeySigner>,
    ) -> Result<Self, SessionError> {
        let rpc_url = rpc_url.into();
        let provider = ProviderBuilder::new().connect(&rpc_url).await.map_err(rpc_error)?.erased();
        Ok(Self {
            rpc_url,
            local,
            shared: Arc::new(Shared {
                provider,
                listeners: Mutex::default(),
                watcher: Mutex::default(),
            }),
            poll_interval: DEFAULT_POLL_INTERVAL,
            next_listener: AtomicU64::new(0),
        })
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    pub fn rpc_url(&self) -> &str {
        &self.rpc_url
    }

    /// Read-only provider of the endpoint.
    pub fn provider(&self) -> &DynProvider {
        &self.shared.provider
    }

    pub fn local_signer(&self) -> Option<&PrivateKeySigner> {
        self.local.as_ref()
    }

    /// Whether the account watcher task is running.
    pub fn is_watching(&self) -> bool {
        self.shared.watcher.lock().as_ref().is_some_and(|task| !task.is_finished())
    }

    pub fn listener_count(&self) -> usize {
        self.shared.listeners.lock().len()
    }

    /// Starts polling the node's accounts, unless already running.
    ///
    /// A local signer's account never changes, so nothing is polled then.
    fn ensure_watcher(&self) {
        if self.local.is_some() {
            return;
        }
        let mut watcher = self.shared.watcher.lock();
        if watcher.as_ref().is_some_and(|task| !task.is_finished()) {
            return;
        }

        let shared = Arc::downgrade(&self.shared);
        let poll_interval = self.poll_interval;
        *watcher = Some(tokio::spawn(async move {
            let mut interval = tokio::time::interval(poll_interval);
            let mut last: Option<Vec<Address>> = None;
            loop {
                interval.tick().await;
                let Some(shared) = shared.upgrade() else { break };
                {
                    // a listener subscribing after this point starts a new watcher
                    let mut watcher = shared.watcher.lock();
                    if shared.prune() == 0 {
                        *watcher = None;
                        debug!("no accounts listener left, stopping account watcher");
                        break;
                    }
                }
                match shared.provider.get_accounts().await {
                    Ok(accounts) => {
                        if last.as_ref().is_some_and(|last| *last != accounts) {
                            shared.broadcast(&accounts);
                        }
                        last = Some(accounts);
                    }
                    Err(err) => trace!(%err, "failed to poll accounts"),
                }
            }
        }));
        debug!(interval = ?poll_interval, "started account watcher");
    }

    fn stop_watcher(&self) {
        if let Some(task) = self.shared.watcher.lock().take() {
            task.abort();
            debug!("stopped account watcher");
        }
    }
}

#[async_trait]
impl WalletProvider for RpcWallet {
    type Signer = RpcSigner;

    async fn request_accounts(&self) -> Result<Vec<Address>, SessionError> {
        if let Some(signer) = &self.local {
            return Ok(vec![signer.address()]);
        }

        let provider = &self.shared.provider;
        let params: Vec<serde_json::Value> = Vec::new();
        match provider.raw_request::<_, Vec<Address>>("eth_requestAccounts".into(), params).await {
            Ok(accounts) => Ok(accounts),
            Err(RpcError::ErrorResp(payload)) if payload.code == METHOD_NOT_FOUND => {
                debug!("eth_requestAccounts unsupported, falling back to eth_accounts");
                provider.get_accounts().await.map_err(rpc_error)
            }
            Err(err) => Err(rpc_error(err)),
        }
    }

    async fn signer(&self) -> Result<RpcSigner, SessionError> {
        match &self.local {
            Some(signer) => {
                let provider = ProviderBuilder::new()
                    .wallet(EthereumWallet::from(signer.clone()))
                    .connect(&self.rpc_url)
                    .await
                    .map_err(rpc_error)?
                    .erased();
                Ok(RpcSigner { address: signer.address(), provider })
            }
            None => {
                let accounts = self.shared.provider.get_accounts().await.map_err(rpc_error)?;
                let address = accounts.first().copied().ok_or(SessionError::NoAccounts)?;
                Ok(RpcSigner { address, provider: self.shared.provider.clone() })
            }
        }
    }

    async fn chain_id(&self) -> Result<u64, SessionError> {
        self.shared.provider.get_chain_id().await.map_err(rpc_error)
    }

    fn subscribe_accounts(&self, listener: AccountsListener) -> ListenerId {
        let id = ListenerId(self.next_listener.fetch_add(1, Ordering::Relaxed));
        self.shared.listeners.lock().insert(id, listener);
        self.ensure_watcher();
        id
    }

    fn unsubscribe_accounts(&self, id: ListenerId) {
        let remaining = {
            let mut listeners = self.shared.listeners.lock();
            listeners.remove(&id);
            listeners.len()
        };
        if remaining == 0 {
            self.stop_watcher();
        }
    }
}

impl Drop for RpcWallet {
    fn drop(&mut self) {
        self.stop_watcher();
    }
}
