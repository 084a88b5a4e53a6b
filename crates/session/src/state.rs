//! Observable session state.

use alloy_primitives::{Address, U256, utils::format_ether};
use std::{collections::BTreeMap, fmt};

/// Connection lifecycle of the session.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ConnectionStatus {
    #[default]
    Disconnected,
    Connecting,
    Connected,
}

/// The current wallet connection.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Session {
    pub address: Option<Address>,
}

impl Session {
    pub fn is_connected(&self) -> bool {
        self.address.is_some()
    }
}

/// Whether the session account owns the contract.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct OwnershipStatus {
    pub is_owner: bool,
}

impl OwnershipStatus {
    /// Compares the session account with the contract owner.
    ///
    /// Addresses are compared as bytes, so the hex letter case they were parsed from is irrelevant.
    pub fn evaluate(session: Option<Address>, owner: Option<Address>) -> Self {
        let is_owner = matches!((session, owner), (Some(s), Some(o)) if s == o);
        Self { is_owner }
    }
}

/// Cached read-only view of on-chain state.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ContractSnapshot {
    /// Native balance of the contract, in wei.
    pub balance: U256,
    /// Last read value of `owner()`.
    pub owner: Option<Address>,
}

impl ContractSnapshot {
    /// The balance as a decimal ether string.
    pub fn balance_ether(&self) -> String {
        format_ether(self.balance)
    }

    /// The balance in ether, truncated to six decimals.
    pub fn display_balance(&self) -> String {
        let full = self.balance_ether();
        match full.split_once('.') {
            Some((int, frac)) => {
                let frac: String = frac.chars().chain(std::iter::repeat('0')).take(6).collect();
                format!("{int}.{frac}")
            }
            None => format!("{full}.000000"),
        }
    }
}

/// A state-changing action.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ActionKind {
    Withdraw,
    Purchase,
}

impl ActionKind {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Withdraw => "Withdrawal",
            Self::Purchase => "Purchase",
        }
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Identifies an action slot: one kind, optionally scoped to a project.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ActionKey {
    pub kind: ActionKind,
    pub target: Option<u64>,
}

impl ActionKey {
    pub const WITHDRAW: Self = Self { kind: ActionKind::Withdraw, target: None };

    pub fn purchase(project_id: u64) -> Self {
        Self { kind: ActionKind::Purchase, target: Some(project_id) }
    }
}

/// Progress of an action.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ActionStatus {
    #[default]
    Idle,
    Pending,
    Success,
    Failed,
}

impl ActionStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Pending)
    }
}

/// An action slot together with its status.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PendingAction {
    pub kind: ActionKind,
    pub target: Option<u64>,
    pub status: ActionStatus,
}

/// Everything a presentation layer renders, published on every change.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SessionState {
    pub connection: ConnectionStatus,
    pub session: Session,
    pub ownership: OwnershipStatus,
    pub snapshot: ContractSnapshot,
    /// Whether a read-path refresh is in flight.
    pub refreshing: bool,
    pub(crate) actions: BTreeMap<ActionKey, ActionStatus>,
}

impl SessionState {
    pub fn is_connected(&self) -> bool {
        self.connection == ConnectionStatus::Connected && self.session.is_connected()
    }

    pub fn address(&self) -> Option<Address> {
        self.session.address
    }

    pub fn is_owner(&self) -> bool {
        self.ownership.is_owner
    }

    pub fn balance(&self) -> U256 {
        self.snapshot.balance
    }

    /// Returns the action slot for `key`, `Idle` if it was never triggered.
    pub fn action(&self, key: ActionKey) -> PendingAction {
        let status = self.actions.get(&key).copied().unwrap_or_default();
        PendingAction { kind: key.kind, target: key.target, status }
    }

    /// All action slots that were triggered at least once.
    pub fn actions(&self) -> impl Iterator<Item = PendingAction> + '_ {
        self.actions.iter().map(|(key, status)| PendingAction {
            kind: key.kind,
            target: key.target,
            status: *status,
        })
    }

    pub fn is_pending(&self, key: ActionKey) -> bool {
        !self.action(key).status.is_terminal()
    }

    /// Whether any write-path action is in flight.
    pub fn is_submitting(&self) -> bool {
        self.actions.values().any(|status| !status.is_terminal())
    }

    /// Whether the withdraw control should be enabled. There is nothing to withdraw from an
    /// empty contract.
    pub fn can_withdraw(&self) -> bool {
        self.is_connected()
            && self.is_owner()
            && !self.balance().is_zero()
            && !self.is_pending(ActionKey::WITHDRAW)
    }

    /// Whether the purchase control of `project_id` should be enabled.
    pub fn can_purchase(&self, project_id: u64) -> bool {
        self.is_connected() && !self.is_pending(ActionKey::purchase(project_id))
    }

    /// Clears everything tied to the connected account.
    pub(crate) fn reset_session(&mut self) {
        self.connection = ConnectionStatus::Disconnected;
        self.session = Session::default();
        self.ownership = OwnershipStatus::default();
        self.snapshot = ContractSnapshot::default();
        self.refreshing = false;
    }

    /// Tries to move `key` into `Pending`. Returns `false` if it already is.
    pub(crate) fn begin_action(&mut self, key: ActionKey) -> bool {
        let status = self.actions.entry(key).or_default();
        if !status.is_terminal() {
            return false;
        }
        *status = ActionStatus::Pending;
        true
    }

    pub(crate) fn finish_action(&mut self, key: ActionKey, status: ActionStatus) {
        self.actions.insert(key, status);
    }
}
