use crate::{
    GENERIC_CALL_FAILURE, Notification, NotificationSink, SessionError,
    error::short_address,
    provider::{
        ContractConnector, ContractProxy, ListenerId, Receipt, SignerHandle, TransactionHandle,
        WalletProvider,
    },
    state::{
        ActionKey, ActionStatus, ConnectionStatus, ContractSnapshot, OwnershipStatus, Session,
        SessionState,
    },
};
use alloy_primitives::{Address, U256, utils::format_ether};
use bluecarbon_config::{Config, CreditPriceError};
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::{
    sync::{mpsc, watch},
    task::JoinHandle,
};

/// Settings the session manager needs from the application configuration.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SessionConfig {
    /// The deployed contract. Every action fails with [`SessionError::SetupRequired`] while unset.
    pub contract_address: Option<Address>,
    /// Chain the wallet has to be connected to, if enforced.
    pub chain_id: Option<u64>,
    /// Price of one credit in wei.
    pub unit_price: U256,
}

impl SessionConfig {
    pub fn new(contract_address: Option<Address>, unit_price: U256) -> Self {
        Self { contract_address, chain_id: None, unit_price }
    }

    pub fn with_chain_id(mut self, chain_id: u64) -> Self {
        self.chain_id = Some(chain_id);
        self
    }

    /// Wei attached to a purchase of `amount` credits, `None` on overflow.
    pub fn purchase_value(&self, amount: u64) -> Option<U256> {
        self.unit_price.checked_mul(U256::from(amount))
    }
}

impl TryFrom<&Config> for SessionConfig {
    type Error = CreditPriceError;

    fn try_from(config: &Config) -> Result<Self, Self::Error> {
        Ok(Self {
            contract_address: config.contract_address(),
            chain_id: config.chain_id,
            unit_price: config.unit_price()?,
        })
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum ConnectMode {
    /// Requested by the user: confirms success with a notification.
    Interactive,
    /// Triggered by an account change.
    Silent,
}

struct Inner<P> {
    /// Bumped by every connection attempt and every disconnect. Work started under an older
    /// epoch must not touch the state.
    epoch: u64,
    contract: Option<Arc<P>>,
}

struct Listener {
    id: ListenerId,
    task: JoinHandle<()>,
}

/// Drives the wallet connection and the contract interactions of one UI surface.
///
/// State is published through a [`watch`] channel, see [`SessionManager::subscribe`]. No lock is
/// held across an `.await`, so reads, refreshes and submissions of different actions interleave
/// freely.
pub struct SessionManager<W, C>
where
    W: WalletProvider,
    C: ContractConnector<W::Signer>,
{
    config: SessionConfig,
    wallet: Arc<W>,
    connector: C,
    sink: Arc<dyn NotificationSink>,
    inner: Mutex<Inner<C::Contract>>,
    state: watch::Sender<SessionState>,
    listener: Mutex<Option<Listener>>,
}

impl<W, C> SessionManager<W, C>
where
    W: WalletProvider,
    C: ContractConnector<W::Signer>,
{
    pub fn new(
        config: SessionConfig,
        wallet: Arc<W>,
        connector: C,
        sink: Arc<dyn NotificationSink>,
    ) -> Self {
        let (state, _) = watch::channel(SessionState::default());
        Self {
            config,
            wallet,
            connector,
            sink,
            inner: Mutex::new(Inner { epoch: 0, contract: None }),
            state,
            listener: Mutex::new(None),
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn wallet(&self) -> &Arc<W> {
        &self.wallet
    }

    /// A copy of the current state.
    pub fn state(&self) -> SessionState {
        self.state.borrow().clone()
    }

    /// Subscribes to state changes.
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    /// Registers the `accountsChanged` listener with the wallet.
    ///
    /// Calling this while already active keeps the existing listener. The listener is removed by
    /// [`SessionManager::deactivate`] or when the manager is dropped.
    pub fn activate(self: &Arc<Self>) -> ListenerId {
        let mut listener = self.listener.lock();
        if let Some(listener) = listener.as_ref() {
            return listener.id;
        }

        let (tx, mut rx) = mpsc::unbounded_channel();
        let id = self.wallet.subscribe_accounts(tx);
        let this = Arc::downgrade(self);
        let task = tokio::spawn(async move {
            while let Some(accounts) = rx.recv().await {
                let Some(manager) = this.upgrade() else { break };
                manager.dispatch_accounts_changed(accounts);
            }
        });
        debug!(%id, "registered accountsChanged listener");
        *listener = Some(Listener { id, task });
        id
    }

    /// Removes the `accountsChanged` listener, if registered.
    pub fn deactivate(&self) {
        if let Some(Listener { id, task }) = self.listener.lock().take() {
            self.wallet.unsubscribe_accounts(id);
            task.abort();
            debug!(%id, "removed accountsChanged listener");
        }
    }

    pub fn is_active(&self) -> bool {
        self.listener.lock().is_some()
    }

    /// Connects the wallet on the user's request.
    ///
    /// On success the session holds the wallet's address, the contract is bound to its signer
    /// and the contract data has been refreshed.
    pub async fn connect(&self) -> Result<Address, SessionError> {
        let (contract, epoch) = self.start_connect(ConnectMode::Interactive)?;
        self.complete_connect(contract, epoch, ConnectMode::Interactive).await
    }

    /// Clears the session, the cached contract data and the contract binding.
    ///
    /// Any connection attempt still in flight is superseded.
    pub fn disconnect(&self) {
        let mut inner = self.inner.lock();
        inner.epoch += 1;
        inner.contract = None;
        self.state.send_modify(SessionState::reset_session);
        debug!(epoch = inner.epoch, "wallet disconnected");
    }

    /// Reacts to an `accountsChanged` notification.
    ///
    /// An empty list disconnects. Otherwise the full connection flow is re-run so the signer and
    /// the contract data follow the new account.
    pub async fn handle_accounts_changed(
        &self,
        accounts: Vec<Address>,
    ) -> Result<Option<Address>, SessionError> {
        if accounts.is_empty() {
            self.disconnect();
            return Ok(None);
        }
        let (contract, epoch) = self.start_connect(ConnectMode::Silent)?;
        self.complete_connect(contract, epoch, ConnectMode::Silent).await.map(Some)
    }

    /// Same as [`SessionManager::handle_accounts_changed`], but the connection flow runs on its
    /// own task. The epoch is taken before returning, so notifications take effect in the order
    /// they were received even if their connection attempts resolve out of order.
    fn dispatch_accounts_changed(self: Arc<Self>, accounts: Vec<Address>) {
        trace!(?accounts, "accountsChanged");
        if accounts.is_empty() {
            self.disconnect();
            return;
        }
        let Ok((contract, epoch)) = self.start_connect(ConnectMode::Silent) else { return };
        tokio::spawn(async move {
            let _ = self.complete_connect(contract, epoch, ConnectMode::Silent).await;
        });
    }

    /// Reads the contract balance and owner, and recomputes the ownership of the session account.
    ///
    /// Failures are reported and leave the session untouched.
    pub async fn refresh(&self) -> Result<ContractSnapshot, SessionError> {
        let epoch = self.inner.lock().epoch;
        self.refresh_epoch(epoch).await
    }

    /// Withdraws the contract balance to the owner's wallet.
    pub async fn withdraw(&self) -> Result<Receipt, SessionError> {
        self.ensure_configured()?;

        let contract = {
            let inner = self.inner.lock();
            let state = self.state.borrow();
            inner.contract.clone().filter(|_| state.is_connected() && state.is_owner())
        };
        let Some(contract) = contract else {
            return Err(self.fail("Action Not Allowed", SessionError::NotOwner));
        };

        let key = ActionKey::WITHDRAW;
        self.begin_action(key)?;

        let result = async {
            let tx = contract.withdraw().await?;
            debug!(tx_hash = %tx.tx_hash(), "withdrawal sent");
            self.notify(Notification::info(
                "Withdrawal Sent",
                "Waiting for blockchain confirmation...",
            ));
            tx.wait().await
        }
        .await;

        let success = Notification::success(
            "Withdrawal Successful!",
            "Funds have been transferred to your wallet.",
        );
        self.settle(
            key,
            result,
            success,
            "Withdrawal Failed",
            "An error occurred during withdrawal.",
        )
        .await
    }

    /// Buys `amount` credits of `project_id`, paying `amount × unit price` wei.
    pub async fn purchase(&self, project_id: u64, amount: i64) -> Result<Receipt, SessionError> {
        self.ensure_configured()?;

        let Some((amount, value)) = u64::try_from(amount)
            .ok()
            .filter(|amount| *amount > 0)
            .and_then(|amount| Some((amount, self.config.purchase_value(amount)?)))
        else {
            return Err(self.fail("Invalid Amount", SessionError::InvalidAmount));
        };

        let contract = {
            let inner = self.inner.lock();
            let state = self.state.borrow();
            inner.contract.clone().filter(|_| state.is_connected())
        };
        let Some(contract) = contract else {
            return Err(self.fail("Wallet Not Connected", SessionError::WalletNotConnected));
        };

        let key = ActionKey::purchase(project_id);
        self.begin_action(key)?;

        let result = async {
            let tx = contract
                .purchase_credits(U256::from(project_id), U256::from(amount), value)
                .await?;
            debug!(tx_hash = %tx.tx_hash(), project_id, amount, %value, "purchase sent");
            self.notify(Notification::info(
                "Purchase Submitted",
                "Waiting for blockchain confirmation...",
            ));
            tx.wait().await
        }
        .await;

        let success = Notification::success(
            "Purchase Successful!",
            format!(
                "You purchased {amount} credits from project #{project_id} for {} ETH.",
                format_ether(value)
            ),
        );
        self.settle(key, result, success, "Purchase Failed", "An error occurred during purchase.")
            .await
    }

    fn start_connect(&self, mode: ConnectMode) -> Result<(Address, u64), SessionError> {
        let Some(contract_address) = self.config.contract_address else {
            return Err(match mode {
                ConnectMode::Interactive => {
                    self.fail("Setup Required", SessionError::SetupRequired)
                }
                ConnectMode::Silent => {
                    warn!("ignoring account change, contract address is not configured");
                    SessionError::SetupRequired
                }
            });
        };

        let mut inner = self.inner.lock();
        inner.epoch += 1;
        self.state.send_modify(|state| {
            state.connection = ConnectionStatus::Connecting;
            state.ownership = OwnershipStatus::default();
            state.refreshing = false;
        });
        debug!(epoch = inner.epoch, ?mode, "connecting wallet");
        Ok((contract_address, inner.epoch))
    }

    async fn complete_connect(
        &self,
        contract_address: Address,
        epoch: u64,
        mode: ConnectMode,
    ) -> Result<Address, SessionError> {
        let err = match self.establish(contract_address, epoch).await {
            Ok(address) => {
                // refresh failures are reported on their own and do not fail the connection
                let _ = self.refresh_epoch(epoch).await;
                if !self.is_current(epoch) {
                    return Err(SessionError::Superseded);
                }
                if mode == ConnectMode::Interactive {
                    self.notify(Notification::success(
                        "Wallet Connected",
                        format!("Address: {}", short_address(&address)),
                    ));
                }
                return Ok(address);
            }
            Err(err) => err,
        };

        let current = {
            let mut inner = self.inner.lock();
            let current = inner.epoch == epoch;
            if current {
                inner.contract = None;
                self.state.send_modify(SessionState::reset_session);
            }
            current
        };
        if !current {
            debug!(epoch, %err, "connection attempt superseded");
            return Err(SessionError::Superseded);
        }

        warn!(epoch, %err, "wallet connection failed");
        let title = match err {
            SessionError::ProviderNotFound => "Wallet Not Found",
            SessionError::WrongNetwork { .. } => "Wrong Network",
            _ => "Connection Failed",
        };
        Err(self.fail_with(title, err, "Could not connect to the wallet."))
    }

    async fn establish(
        &self,
        contract_address: Address,
        epoch: u64,
    ) -> Result<Address, SessionError> {
        let accounts = self.wallet.request_accounts().await?;
        if accounts.is_empty() {
            return Err(SessionError::NoAccounts);
        }
        let signer = self.wallet.signer().await?;
        let address = signer.address();

        if let Some(expected) = self.config.chain_id {
            let actual = self.wallet.chain_id().await?;
            if actual != expected {
                return Err(SessionError::wrong_network(expected, actual));
            }
        }

        if !self.is_current(epoch) {
            return Err(SessionError::Superseded);
        }
        let contract = Arc::new(self.connector.connect(contract_address, &signer));
        {
            let mut inner = self.inner.lock();
            if inner.epoch != epoch {
                return Err(SessionError::Superseded);
            }
            inner.contract = Some(contract);
            self.state.send_modify(|state| {
                state.connection = ConnectionStatus::Connected;
                state.session = Session { address: Some(address) };
                state.ownership = OwnershipStatus::default();
                state.snapshot = ContractSnapshot::default();
            });
        }
        debug!(epoch, %address, "wallet connected");
        Ok(address)
    }

    async fn refresh_epoch(&self, epoch: u64) -> Result<ContractSnapshot, SessionError> {
        let (contract, address) = {
            let inner = self.inner.lock();
            if inner.epoch != epoch {
                return Err(SessionError::Superseded);
            }
            (inner.contract.clone(), self.state.borrow().address())
        };
        let (Some(contract), Some(address)) = (contract, address) else {
            return Err(self.fail("Wallet Not Connected", SessionError::WalletNotConnected));
        };

        self.state.send_modify(|state| state.refreshing = true);
        let result = async {
            let balance = contract.balance().await?;
            let owner = contract.owner().await?;
            Ok::<_, SessionError>(ContractSnapshot { balance, owner: Some(owner) })
        }
        .await;

        let result = {
            let inner = self.inner.lock();
            if inner.epoch != epoch {
                trace!(epoch, "discarding contract data of a superseded session");
                return Err(SessionError::Superseded);
            }
            self.state.send_modify(|state| {
                state.refreshing = false;
                if let Ok(snapshot) = &result {
                    state.snapshot = *snapshot;
                    state.ownership = OwnershipStatus::evaluate(Some(address), snapshot.owner);
                }
            });
            result
        };

        match result {
            Ok(snapshot) => {
                trace!(
                    balance = %snapshot.balance,
                    owner = ?snapshot.owner,
                    "contract data refreshed"
                );
                Ok(snapshot)
            }
            Err(err) => Err(self.fail_with(
                "Contract Error",
                err,
                "Could not fetch data from the smart contract.",
            )),
        }
    }

    /// Reports the outcome of a submitted action, refreshing the contract data on success before
    /// the action leaves `Pending`.
    async fn settle(
        &self,
        key: ActionKey,
        result: Result<Receipt, SessionError>,
        success: Notification,
        failure_title: &str,
        fallback: &str,
    ) -> Result<Receipt, SessionError> {
        match result {
            Ok(receipt) => {
                debug!(?key, tx_hash = %receipt.tx_hash, "action confirmed");
                self.notify(success);
                // nothing to refresh once the wallet went away
                let epoch = {
                    let inner = self.inner.lock();
                    let connected = inner.contract.is_some() && self.state.borrow().is_connected();
                    connected.then_some(inner.epoch)
                };
                if let Some(epoch) = epoch {
                    // refresh failures are reported on their own
                    let _ = self.refresh_epoch(epoch).await;
                }
                self.state.send_modify(|state| state.finish_action(key, ActionStatus::Success));
                Ok(receipt)
            }
            Err(err) => {
                warn!(?key, %err, "action failed");
                self.state.send_modify(|state| state.finish_action(key, ActionStatus::Failed));
                Err(self.fail_with(failure_title, err, fallback))
            }
        }
    }

    fn ensure_configured(&self) -> Result<Address, SessionError> {
        self.config
            .contract_address
            .ok_or_else(|| self.fail("Setup Required", SessionError::SetupRequired))
    }

    fn begin_action(&self, key: ActionKey) -> Result<(), SessionError> {
        if self.state.send_if_modified(|state| state.begin_action(key)) {
            Ok(())
        } else {
            debug!(?key, "action already pending, ignoring trigger");
            Err(SessionError::ActionPending(key.kind.label()))
        }
    }

    fn is_current(&self, epoch: u64) -> bool {
        self.inner.lock().epoch == epoch
    }

    fn fail(&self, title: &str, err: SessionError) -> SessionError {
        self.fail_with(title, err, GENERIC_CALL_FAILURE)
    }

    fn fail_with(&self, title: &str, err: SessionError, fallback: &str) -> SessionError {
        if err.is_reportable() {
            self.notify(Notification::destructive(title, err.describe(fallback)));
        }
        err
    }

    fn notify(&self, notification: Notification) {
        debug!(
            variant = %notification.variant,
            title = %notification.title,
            description = %notification.description,
            "notification"
        );
        self.sink.notify(notification);
    }
}

impl<W, C> Drop for SessionManager<W, C>
where
    W: WalletProvider,
    C: ContractConnector<W::Signer>,
{
    fn drop(&mut self) {
        self.deactivate();
    }
}
