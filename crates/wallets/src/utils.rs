use crate::error::{PrivateKeyError, WalletSignerError};
use alloy_primitives::{B256, hex::FromHex};
use alloy_signer_local::{MnemonicBuilder, PrivateKeySigner, coins_bip39::English};
use eyre::Result;
use std::{fs, path::Path};

fn ensure_pk_not_env(pk: &str) -> Result<()> {
    if !pk.starts_with("0x") && std::env::var(pk).is_ok() {
        return Err(PrivateKeyError::ExistsAsEnvVar(pk.to_string()).into());
    }
    Ok(())
}

/// Validates and sanitizes user inputs, returning a local signer.
pub fn create_private_key_signer(private_key_str: &str) -> Result<PrivateKeySigner> {
    let private_key_str = private_key_str.trim();
    let Ok(private_key) = B256::from_hex(private_key_str) else {
        ensure_pk_not_env(private_key_str)?;
        eyre::bail!("Failed to decode private key")
    };
    match PrivateKeySigner::from_bytes(&private_key) {
        Ok(pk) => Ok(pk),
        Err(err) => {
            ensure_pk_not_env(private_key_str)?;
            Err(WalletSignerError::from(err).into())
        }
    }
}

/// Creates a local signer from the given mnemonic parameters.
///
/// Mnemonic can be either a file path or a mnemonic phrase.
pub fn create_mnemonic_signer(
    mnemonic: &str,
    passphrase: Option<&str>,
    index: u32,
) -> Result<PrivateKeySigner> {
    let mnemonic = if Path::new(mnemonic).is_file() {
        fs::read_to_string(mnemonic).map_err(WalletSignerError::from)?
    } else {
        mnemonic.to_owned()
    };
    let mnemonic = mnemonic.split_whitespace().collect::<Vec<_>>().join(" ");

    let mut builder = MnemonicBuilder::<English>::default()
        .phrase(mnemonic)
        .index(index)
        .map_err(WalletSignerError::from)?;
    if let Some(passphrase) = passphrase {
        builder = builder.password(passphrase);
    }
    Ok(builder.build().map_err(WalletSignerError::from)?)
}
