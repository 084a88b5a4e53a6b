use alloy_json_rpc::ErrorPayload;
use alloy_primitives::hex::FromHexError;
use alloy_provider::PendingTransactionError;
use alloy_signer::k256::ecdsa;
use alloy_signer_local::LocalSignerError;
use alloy_sol_types::decode_revert_reason;
use alloy_transport::{RpcError, TransportError, TransportErrorKind};
use bluecarbon_session::{CallError, SessionError};

/// EIP-1193 error code of a request the user rejected in the wallet.
pub const USER_REJECTED_CODE: i64 = 4001;

#[derive(Debug, thiserror::Error)]
pub enum PrivateKeyError {
    #[error("Failed to create wallet from private key. Private key is invalid hex: {0}")]
    InvalidHex(#[from] FromHexError),
    #[error(
        "Failed to create wallet from private key. Invalid private key. But env var {0} exists. Is the `$` anchor missing?"
    )]
    ExistsAsEnvVar(String),
}

#[derive(Debug, thiserror::Error)]
pub enum WalletSignerError {
    #[error(transparent)]
    Local(#[from] LocalSignerError),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    InvalidHex(#[from] FromHexError),
    #[error(transparent)]
    Ecdsa(#[from] ecdsa::Error),
}

/// Converts a failed JSON-RPC request into a [`SessionError`].
///
/// Unreachable endpoints are reported as a missing wallet, code `4001` as a rejection, and error
/// responses carrying revert data keep the decoded revert reason.
pub fn rpc_error(err: TransportError) -> SessionError {
    match err {
        RpcError::Transport(TransportErrorKind::Custom(err)) => {
            debug!(%err, "wallet endpoint unreachable");
            SessionError::ProviderNotFound
        }
        RpcError::Transport(TransportErrorKind::BackendGone) => SessionError::ProviderNotFound,
        RpcError::ErrorResp(payload) => payload_error(&payload),
        err => SessionError::call(err.to_string()),
    }
}

fn payload_error(payload: &ErrorPayload) -> SessionError {
    if payload.code == USER_REJECTED_CODE {
        return SessionError::UserRejected;
    }
    let reason = payload.as_revert_data().and_then(|data| decode_revert_reason(&data));
    SessionError::Contract(CallError { reason, message: Some(payload.message.to_string()) })
}

/// Converts a failed contract call into a [`SessionError`].
pub fn contract_error(err: alloy_contract::Error) -> SessionError {
    match err {
        alloy_contract::Error::TransportError(err) => rpc_error(err),
        err => SessionError::call(err.to_string()),
    }
}

/// Converts a failure while waiting for a receipt into a [`SessionError`].
pub fn pending_error(err: PendingTransactionError) -> SessionError {
    match err {
        PendingTransactionError::TransportError(err) => rpc_error(err),
        err => SessionError::call(err.to_string()),
    }
}
