//! Subcommand implementations.

use crate::sink::TerminalSink;
use bluecarbon_config::Config;
use bluecarbon_session::{
    ConnectionStatus, SessionConfig, SessionManager, SessionState, short_address,
};
use bluecarbon_wallets::{AlloyConnector, RpcWallet, WalletOpts};
use eyre::Result;
use std::{io::Write, sync::Arc, time::Duration};
use tokio::signal::ctrl_c;
use yansi::Paint;

/// The session manager driven by the terminal client.
pub type Manager = SessionManager<RpcWallet, AlloyConnector>;

/// Builds a session manager from the configuration and wallet options.
pub async fn manager(config: &Config, wallet: &WalletOpts) -> Result<Arc<Manager>> {
    let session = SessionConfig::try_from(config)?;
    let signer = wallet.signer()?;
    let poll_interval = Duration::from_secs(config.accounts_poll_interval.max(1));
    let wallet = RpcWallet::new(config.eth_rpc_url.as_str(), signer)
        .await?
        .with_poll_interval(poll_interval);
    Ok(Arc::new(SessionManager::new(
        session,
        Arc::new(wallet),
        AlloyConnector::new(config.confirmations),
        Arc::new(TerminalSink),
    )))
}

pub async fn status(manager: &Manager) -> Result<()> {
    manager.connect().await?;
    print_state(&manager.state())
}

pub async fn withdraw(manager: &Manager) -> Result<()> {
    manager.connect().await?;
    let receipt = manager.withdraw().await?;
    debug!(?receipt, "withdrawal confirmed");
    print_state(&manager.state())
}

pub async fn purchase(manager: &Manager, project_id: u64, amount: i64) -> Result<()> {
    manager.connect().await?;
    let receipt = manager.purchase(project_id, amount).await?;
    debug!(?receipt, "purchase confirmed");
    print_state(&manager.state())
}

/// Prints the session on every change until Ctrl-C.
pub async fn watch(manager: Arc<Manager>) -> Result<()> {
    manager.activate();
    // failures were reported, account changes may still connect later
    let _ = manager.connect().await;

    let mut rx = manager.subscribe();
    let mut last = rx.borrow_and_update().clone();
    print_state(&last)?;
    loop {
        tokio::select! {
            changed = rx.changed() => {
                if changed.is_err() {
                    break;
                }
                let state = rx.borrow_and_update().clone();
                // only the settled states are interesting
                if state.connection != ConnectionStatus::Connecting
                    && !state.refreshing
                    && state != last
                {
                    print_state(&state)?;
                    last = state;
                }
            },
            _ = ctrl_c() => {
                break;
            },
        }
    }
    manager.deactivate();
    Ok(())
}

/// Prints a summary of the session to stdout.
pub fn print_state(state: &SessionState) -> Result<()> {
    let mut out = anstream::stdout();
    match state.address() {
        Some(address) if state.is_connected() => {
            writeln!(out, "{} {address}", "Account:".bold())?;
            writeln!(out, "{} {} ETH", "Balance:".bold(), state.snapshot.display_balance())?;
            if let Some(owner) = state.snapshot.owner {
                writeln!(out, "{} {}", "Owner:".bold(), short_address(&owner))?;
            }
            let role = if state.is_owner() { "owner".green() } else { "buyer".cyan() };
            writeln!(out, "{} {role}", "Role:".bold())?;
        }
        _ => writeln!(out, "{}", "Disconnected".yellow())?,
    }
    Ok(())
}
