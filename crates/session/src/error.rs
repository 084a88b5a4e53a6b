use alloy_primitives::Address;

/// Fallback description used when a contract call fails without any message.
pub const GENERIC_CALL_FAILURE: &str = "An unexpected error occurred.";

/// The single failure shape shared by the session manager and every boundary it consumes.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    /// The target contract address has not been configured.
    #[error("The smart contract address has not been configured.")]
    SetupRequired,
    /// No wallet provider could be reached.
    #[error("No wallet provider was detected. Please install or enable a wallet.")]
    ProviderNotFound,
    /// The user declined the connection or transaction prompt.
    #[error("The request was rejected in the wallet.")]
    UserRejected,
    /// The wallet granted access but exposed no account.
    #[error("The wallet did not expose any account.")]
    NoAccounts,
    /// The wallet is connected to a different chain than the configured one.
    #[error("Wrong network: expected chain {expected}, wallet is on chain {actual}.")]
    WrongNetwork { expected: u64, actual: u64 },
    /// A withdrawal was attempted by an account that does not own the contract.
    #[error("You must be the contract owner to withdraw.")]
    NotOwner,
    /// A write action was attempted without a connected signer.
    #[error("Please connect your wallet to proceed.")]
    WalletNotConnected,
    /// A purchase was attempted with a non-positive or overflowing amount.
    #[error("Please enter a positive number of credits to purchase.")]
    InvalidAmount,
    /// The same action is already in flight for the same target.
    #[error("{0} is already pending.")]
    ActionPending(&'static str),
    /// A later connection attempt or disconnect replaced this one.
    #[error("superseded by a newer connection attempt")]
    Superseded,
    /// A contract read, write, or confirmation failed.
    #[error("{}", .0.describe(GENERIC_CALL_FAILURE))]
    Contract(CallError),
}

impl SessionError {
    /// Creates a contract error carrying a decoded revert reason.
    pub fn reverted(reason: impl Into<String>) -> Self {
        Self::Contract(CallError { reason: Some(reason.into()), message: None })
    }

    /// Creates a contract error carrying only a generic call message.
    pub fn call(message: impl Into<String>) -> Self {
        Self::Contract(CallError { reason: None, message: Some(message.into()) })
    }

    /// Returns the human readable description, using `fallback` for contract failures that carry
    /// no message at all.
    pub fn describe(&self, fallback: &str) -> String {
        match self {
            Self::Contract(err) => err.describe(fallback).to_string(),
            other => other.to_string(),
        }
    }

    /// Whether this failure is reported to the user.
    ///
    /// Re-triggering a pending action and losing a connection race are no-ops.
    pub fn is_reportable(&self) -> bool {
        !matches!(self, Self::ActionPending(_) | Self::Superseded)
    }

    pub(crate) fn wrong_network(expected: u64, actual: u64) -> Self {
        Self::WrongNetwork { expected, actual }
    }
}

/// Details of a failed contract call.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CallError {
    /// The structured revert reason, if the node returned decodable revert data.
    pub reason: Option<String>,
    /// The generic error message of the failed call.
    pub message: Option<String>,
}

impl CallError {
    /// Revert reason, then call message, then `fallback`.
    pub fn describe<'a>(&'a self, fallback: &'a str) -> &'a str {
        self.reason
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .or_else(|| self.message.as_deref().filter(|s| !s.trim().is_empty()))
            .unwrap_or(fallback)
    }
}

/// Returns `0x1234...abcd` for the checksummed address.
pub fn short_address(address: &Address) -> String {
    let checksummed = address.to_checksum(None);
    format!("{}...{}", &checksummed[..6], &checksummed[checksummed.len() - 4..])
}
