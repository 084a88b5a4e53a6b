use crate::{
    cmd, handler,
    opts::{BlueCarbon, BlueCarbonSubcommand},
    utils,
};
use clap::Parser;
use eyre::Result;

/// Run the `bluecarbon` command-line interface.
pub fn run() -> Result<()> {
    setup()?;

    let args = BlueCarbon::parse();
    tokio::runtime::Builder::new_multi_thread().enable_all().build()?.block_on(run_command(args))
}

/// Setup the global logger and other utilities.
pub fn setup() -> Result<()> {
    handler::install();
    utils::load_dotenv();
    utils::subscriber();
    utils::enable_paint();

    Ok(())
}

/// Run the subcommand.
pub async fn run_command(args: BlueCarbon) -> Result<()> {
    let config = args.config.load_config()?;
    trace!(?config, "loaded config");
    let manager = cmd::manager(&config, &args.wallet).await?;

    match args.cmd {
        BlueCarbonSubcommand::Status => cmd::status(&manager).await,
        BlueCarbonSubcommand::Withdraw => cmd::withdraw(&manager).await,
        BlueCarbonSubcommand::Purchase { project_id, amount } => {
            cmd::purchase(&manager, project_id, amount).await
        }
        BlueCarbonSubcommand::Watch => cmd::watch(manager).await,
    }
}
