//! # bluecarbon-wallets
//!
//! JSON-RPC implementations of the wallet and contract boundaries of `bluecarbon-session`.

#[macro_use]
extern crate tracing;

pub mod contract;
pub use contract::{AlloyConnector, AlloyContract, AlloyTransaction, BlueCarbon};

pub mod error;
pub use error::{PrivateKeyError, WalletSignerError};

pub mod opts;
pub use opts::WalletOpts;

pub mod provider;
pub use provider::{RpcSigner, RpcWallet};

pub mod utils;
