use alloy_primitives::Address;
use bluecarbon_config::{
    Config,
    figment::{
        self, Metadata, Profile, Provider,
        value::{Dict, Map, Value},
    },
};
use bluecarbon_wallets::WalletOpts;
use clap::{Parser, Subcommand};
use eyre::Result;

/// Interact with the BlueCarbon credit registry.
#[derive(Debug, Parser)]
#[command(name = "bluecarbon", version)]
pub struct BlueCarbon {
    #[command(flatten)]
    pub config: ConfigOpts,

    #[command(flatten)]
    pub wallet: WalletOpts,

    #[command(subcommand)]
    pub cmd: BlueCarbonSubcommand,
}

#[derive(Debug, Subcommand)]
pub enum BlueCarbonSubcommand {
    /// Connect the wallet and show the session, the contract balance and the owner role.
    #[command(visible_alias = "s")]
    Status,

    /// Withdraw the contract balance to the owner's wallet.
    #[command(visible_alias = "w")]
    Withdraw,

    /// Purchase credits of a verified project.
    #[command(visible_alias = "p")]
    Purchase {
        /// The project to buy credits from.
        project_id: u64,

        /// The number of credits.
        #[arg(allow_negative_numbers = true)]
        amount: i64,
    },

    /// Follow account changes of the wallet and print every session update, until Ctrl-C.
    Watch,
}

/// Configuration overrides given on the command line.
#[derive(Clone, Debug, Default, Parser)]
#[command(next_help_heading = "Registry options")]
pub struct ConfigOpts {
    /// The RPC endpoint.
    #[arg(short, long = "rpc-url", env = "ETH_RPC_URL", value_name = "URL")]
    pub rpc_url: Option<String>,

    /// Address of the deployed registry contract.
    #[arg(long, value_name = "ADDRESS")]
    pub contract: Option<Address>,

    /// Chain the wallet must be connected to, `0` disables the network check.
    #[arg(long, value_name = "CHAIN_ID")]
    pub chain: Option<u64>,

    /// Number of confirmations to wait for.
    #[arg(long)]
    pub confirmations: Option<u64>,
}

impl ConfigOpts {
    /// Loads the [`Config`] with these options merged on top.
    pub fn load_config(&self) -> Result<Config> {
        Ok(Config::try_from(Config::figment().merge(self))?)
    }
}

impl Provider for ConfigOpts {
    fn metadata(&self) -> Metadata {
        Metadata::named("command line arguments")
    }

    fn data(&self) -> Result<Map<Profile, Dict>, figment::Error> {
        let mut dict = Dict::new();
        if let Some(rpc_url) = &self.rpc_url {
            dict.insert("eth_rpc_url".to_string(), Value::from(rpc_url.clone()));
        }
        if let Some(contract) = self.contract {
            dict.insert("contract_address".to_string(), Value::from(contract.to_string()));
        }
        if let Some(chain) = self.chain {
            dict.insert("chain_id".to_string(), Value::from(chain));
        }
        if let Some(confirmations) = self.confirmations {
            dict.insert("confirmations".to_string(), Value::from(confirmations));
        }
        Ok(Map::from([(Profile::Global, dict)]))
    }
}
