use crate::utils;
use alloy_signer_local::PrivateKeySigner;
use clap::Parser;
use eyre::Result;
use serde::Serialize;

/// Options selecting the account that signs registry transactions.
///
/// The account can come from:
/// 1. Private Key (cleartext in CLI)
/// 2. Private Key (interactively via secure prompt)
/// 3. Mnemonic (phrase or file path)
///
/// Without any of them the node's unlocked accounts are used.
#[derive(Clone, Debug, Default, Serialize, Parser)]
#[command(next_help_heading = "Wallet options", about = None, long_about = None)]
pub struct WalletOpts {
    /// Open an interactive prompt to enter your private key.
    #[arg(long, short)]
    pub interactive: bool,

    /// Use the provided private key.
    #[arg(long, value_name = "RAW_PRIVATE_KEY", env = "BLUECARBON_PRIVATE_KEY")]
    pub private_key: Option<String>,

    /// Use the mnemonic phrase or mnemonic file at the specified path.
    #[arg(long, alias = "mnemonic-path")]
    pub mnemonic: Option<String>,

    /// Use a BIP39 passphrase for the mnemonic.
    #[arg(long, value_name = "PASSPHRASE")]
    pub mnemonic_passphrase: Option<String>,

    /// Use the private key from the given mnemonic index.
    #[arg(long, default_value_t = 0, value_name = "INDEX")]
    pub mnemonic_index: u32,
}

impl WalletOpts {
    /// Returns the local signer selected by the options, `None` if the node's accounts are used.
    pub fn signer(&self) -> Result<Option<PrivateKeySigner>> {
        if self.interactive {
            let private_key = rpassword::prompt_password("Enter private key: ")?;
            return utils::create_private_key_signer(&private_key).map(Some);
        }
        if let Some(private_key) = &self.private_key {
            trace!("using private key");
            return utils::create_private_key_signer(private_key).map(Some);
        }
        if let Some(mnemonic) = &self.mnemonic {
            trace!(index = self.mnemonic_index, "using mnemonic");
            return utils::create_mnemonic_signer(
                mnemonic,
                self.mnemonic_passphrase.as_deref(),
                self.mnemonic_index,
            )
            .map(Some);
        }
        Ok(None)
    }
}
