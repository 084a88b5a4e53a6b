//! # bluecarbon-config
//!
//! Configuration of the BlueCarbon registry client.

#[macro_use]
extern crate tracing;

use alloy_primitives::{Address, U256, utils::parse_ether};
use figment::{
    Error, Figment, Metadata, Profile, Provider,
    providers::{Env, Format, Serialized, Toml},
    value::{Dict, Map},
};
use serde::{Deserialize, Deserializer, Serialize, de::Error as _};
use std::path::{Path, PathBuf};

mod error;
pub use error::{ConfigSourceError, CreditPriceError, ExtractConfigError};

// reexport so callers can merge their own providers
pub use figment;

/// Chain id of the Sepolia test network the registry contract is deployed to.
pub const SEPOLIA_CHAIN_ID: u64 = 11155111;

/// BlueCarbon client configuration.
///
/// `Config` is a Figment [`Provider`]; see [`Config::figment()`] for the order in which sources
/// are merged.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// The selected profile. Set from the extracting figment, never from a source.
    #[serde(skip)]
    pub profile: Profile,
    /// Address of the deployed BlueCarbon contract. Wallet actions are refused while unset.
    pub contract_address: Option<Address>,
    /// Chain the wallet must be connected to. `0`, `""` or `"none"` disable the network check.
    #[serde(deserialize_with = "deserialize_chain_id")]
    pub chain_id: Option<u64>,
    /// JSON-RPC endpoint used by the terminal client.
    pub eth_rpc_url: String,
    /// Price of one credit, in ether.
    #[serde(deserialize_with = "deserialize_price")]
    pub credit_price: String,
    /// Confirmations to wait for after a state-changing call.
    pub confirmations: u64,
    /// Seconds between two polls of the wallet's account list.
    pub accounts_poll_interval: u64,
}

impl Config {
    /// The default profile: "default"
    pub const DEFAULT_PROFILE: Profile = Profile::const_new("default");

    /// File name of config toml file
    pub const FILE_NAME: &'static str = "bluecarbon.toml";

    /// Default JSON-RPC endpoint
    pub const LOCAL_RPC_URL: &'static str = "http://127.0.0.1:8545";

    /// Returns the current `Config`.
    ///
    /// See [`figment`](Self::figment) for more details.
    pub fn load() -> Result<Self, ExtractConfigError> {
        Self::try_from(Self::figment())
    }

    /// Returns the current `Config`, reading the toml file from `root`.
    pub fn load_with_root(root: impl AsRef<Path>) -> Result<Self, ExtractConfigError> {
        Self::try_from(Self::figment_with_root(root.as_ref()))
    }

    /// Attempts to extract a `Config` from `provider`.
    ///
    /// # Example
    ///
    /// ```rust
    /// use bluecarbon_config::{Config, figment::providers::{Format, Toml}};
    ///
    /// // Use the default `Figment`, but allow values from `other.toml` to supersede its values.
    /// let figment = Config::figment().merge(Toml::file("other.toml").nested());
    ///
    /// let config = Config::try_from(figment);
    /// ```
    pub fn try_from<T: Provider>(provider: T) -> Result<Self, ExtractConfigError> {
        trace!("load config with provider: {:?}", provider.metadata());
        let figment = Figment::from(provider);
        let mut config = figment.extract::<Self>().map_err(ExtractConfigError::new)?;
        config.profile = figment.profile().clone();
        Ok(config)
    }

    /// Returns the default figment
    ///
    /// The default figment reads from the following sources, in ascending
    /// priority order:
    ///
    ///   1. [`Config::default()`]
    ///   2. `bluecarbon.toml` _or_ filename in `BLUECARBON_CONFIG` environment variable
    ///   3. `BLUECARBON_` prefixed environment variables
    ///
    /// The profile selected is the value set in the `BLUECARBON_PROFILE`
    /// environment variable. If it is not set, it defaults to `default`.
    pub fn figment() -> Figment {
        Self::figment_with_root(Path::new("."))
    }

    /// Returns the default figment, resolving the toml file relative to `root`.
    pub fn figment_with_root(root: &Path) -> Figment {
        let toml = root.join(Env::var_or("BLUECARBON_CONFIG", Self::FILE_NAME));
        Figment::from(Self::default())
            .merge(Toml::file(toml).nested())
            .merge(Env::prefixed("BLUECARBON_").ignore(&["PROFILE", "CONFIG"]).global())
            .select(Profile::from_env_or("BLUECARBON_PROFILE", Self::DEFAULT_PROFILE))
    }

    /// Returns the path of the toml file that [`Config::figment`] reads.
    pub fn config_path(root: &Path) -> PathBuf {
        root.join(Env::var_or("BLUECARBON_CONFIG", Self::FILE_NAME))
    }

    /// The configured contract address.
    ///
    /// The zero address is treated as unset, like a placeholder left in a config file.
    pub fn contract_address(&self) -> Option<Address> {
        self.contract_address.filter(|addr| !addr.is_zero())
    }

    /// Whether a contract address is configured.
    pub fn is_configured(&self) -> bool {
        self.contract_address().is_some()
    }

    /// Price of one credit in wei.
    pub fn unit_price(&self) -> Result<U256, CreditPriceError> {
        parse_ether(self.credit_price.trim())
            .map_err(|source| CreditPriceError { price: self.credit_price.clone(), source })
    }

    /// Sets the contract address.
    pub fn with_contract_address(mut self, address: Address) -> Self {
        self.contract_address = Some(address);
        self
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            profile: Self::DEFAULT_PROFILE,
            contract_address: None,
            chain_id: Some(SEPOLIA_CHAIN_ID),
            eth_rpc_url: Self::LOCAL_RPC_URL.to_string(),
            credit_price: "0.01".to_string(),
            confirmations: 1,
            accounts_poll_interval: 4,
        }
    }
}

impl Provider for Config {
    fn metadata(&self) -> Metadata {
        Metadata::named("BlueCarbon Config")
    }

    fn data(&self) -> Result<Map<Profile, Dict>, Error> {
        Serialized::defaults(self).data()
    }

    fn profile(&self) -> Option<Profile> {
        Some(self.profile.clone())
    }
}

/// Accepts the credit price either as a string or as a bare number, as env vars are parsed.
fn deserialize_price<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Price {
        Str(String),
        Int(u64),
        Float(f64),
    }

    Ok(match Price::deserialize(deserializer)? {
        Price::Str(s) => s,
        Price::Int(n) => n.to_string(),
        Price::Float(f) => f.to_string(),
    })
}

/// Deserializes an optional chain id, mapping `0`, `""` and `"none"` to `None`.
fn deserialize_chain_id<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Val {
        Number(u64),
        String(String),
    }

    Ok(match Option::<Val>::deserialize(deserializer)? {
        None | Some(Val::Number(0)) => None,
        Some(Val::Number(id)) => Some(id),
        Some(Val::String(s)) => {
            let s = s.trim();
            if s.is_empty() || s.eq_ignore_ascii_case("none") {
                None
            } else {
                match s.parse::<u64>().map_err(D::Error::custom)? {
                    0 => None,
                    id => Some(id),
                }
            }
        }
    })
}
