//! # bluecarbon-session
//!
//! Manages the connection between a wallet and the deployed BlueCarbon registry contract.
//!
//! The [`SessionManager`] owns the connection lifecycle
//! (`Disconnected → Connecting → Connected`), derives whether the connected account owns the
//! contract, refreshes the contract balance, and submits `withdraw` and `purchaseCredits`
//! transactions. Every failure is caught at the action boundary, reported once through a
//! [`NotificationSink`], and returned as a [`SessionError`].
//!
//! The wallet and the contract are consumed through the [`WalletProvider`],
//! [`ContractConnector`] and [`ContractProxy`] traits, so any backend (a JSON-RPC node, a
//! browser bridge, a test double) can drive the same state machine.

#[macro_use]
extern crate tracing;

mod error;
pub use error::{CallError, GENERIC_CALL_FAILURE, SessionError, short_address};

mod manager;
pub use manager::{SessionConfig, SessionManager};

pub mod notify;
pub use notify::{Notification, NotificationSink, Variant};

mod provider;
pub use provider::{
    AccountsListener, ContractConnector, ContractProxy, ListenerId, Receipt, SignerHandle,
    TransactionHandle, WalletProvider,
};

pub mod state;
pub use state::{
    ActionKey, ActionKind, ActionStatus, ConnectionStatus, ContractSnapshot, OwnershipStatus,
    PendingAction, Session, SessionState,
};
