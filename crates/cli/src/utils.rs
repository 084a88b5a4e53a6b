use std::path::Path;

/// Initializes the global tracing subscriber, filtered by `RUST_LOG`.
pub fn subscriber() {
    let _ = tracing_subscriber::FmtSubscriber::builder()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .try_init();
}

/// Loads a `.env` file from the current directory, if present.
///
/// Variables already set in the environment take precedence.
pub fn load_dotenv() {
    let path = Path::new(".env");
    if path.is_file()
        && let Err(err) = dotenvy::from_path(path)
    {
        debug!(%err, "failed to load .env");
    }
}

/// Disables colours unless stdout is a terminal and `NO_COLOR` is unset.
pub fn enable_paint() {
    yansi::whenever(yansi::Condition::TTY_AND_COLOR);
}
