//! Boundaries consumed by the session manager: the wallet provider and the contract proxy.

use crate::SessionError;
use alloy_primitives::{Address, TxHash, U256};
use async_trait::async_trait;
use std::fmt;
use tokio::sync::mpsc;

/// Sending half handed to a wallet provider for `accountsChanged` notifications.
pub type AccountsListener = mpsc::UnboundedSender<Vec<Address>>;

/// Identifies a registered `accountsChanged` listener.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(pub u64);

impl fmt::Display for ListenerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "listener#{}", self.0)
    }
}

/// A capability bound to one wallet account, able to authorize transactions.
pub trait SignerHandle: Send + Sync + 'static {
    fn address(&self) -> Address;
}

/// Wallet holding the user's keys, approving account access and transactions.
#[async_trait]
pub trait WalletProvider: Send + Sync + 'static {
    type Signer: SignerHandle;

    /// Asks the wallet for account access, prompting the user if needed.
    async fn request_accounts(&self) -> Result<Vec<Address>, SessionError>;

    /// Returns a signer for the currently selected account.
    async fn signer(&self) -> Result<Self::Signer, SessionError>;

    /// Returns the chain the wallet is currently connected to.
    async fn chain_id(&self) -> Result<u64, SessionError>;

    /// Registers a listener for account changes.
    fn subscribe_accounts(&self, listener: AccountsListener) -> ListenerId;

    /// Removes a listener registered with [`WalletProvider::subscribe_accounts`].
    fn unsubscribe_accounts(&self, id: ListenerId);
}

/// Binds a deployed contract address to a signer.
pub trait ContractConnector<S>: Send + Sync + 'static {
    type Contract: ContractProxy;

    fn connect(&self, address: Address, signer: &S) -> Self::Contract;
}

/// Typed client of the deployed BlueCarbon contract.
#[async_trait]
pub trait ContractProxy: Send + Sync + 'static {
    type Transaction: TransactionHandle;

    /// Native-currency balance held by the contract, in wei.
    async fn balance(&self) -> Result<U256, SessionError>;

    /// The contract's administrative owner.
    async fn owner(&self) -> Result<Address, SessionError>;

    /// Sends `withdraw()`.
    async fn withdraw(&self) -> Result<Self::Transaction, SessionError>;

    /// Sends `purchaseCredits(projectId, amount)` with `value` wei attached.
    async fn purchase_credits(
        &self,
        project_id: U256,
        amount: U256,
        value: U256,
    ) -> Result<Self::Transaction, SessionError>;
}

/// A submitted state-changing call.
#[async_trait]
pub trait TransactionHandle: Send + 'static {
    fn tx_hash(&self) -> TxHash;

    /// Resolves once the transaction is confirmed, failing if it reverted.
    async fn wait(self) -> Result<Receipt, SessionError>;
}

/// Confirmation of a transaction.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Receipt {
    pub tx_hash: TxHash,
    pub block_number: Option<u64>,
    pub gas_used: u64,
}
