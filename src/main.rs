//! Avataran daemon entry point

use avataran::{App, AppConfig, Result};
use std::env;

/// Parse config path from command line arguments.
///
/// Supports:
/// - `avataran <path>` (positional)
/// - `avataran --config <path>` (flag-based)
/// - `avataran -c <path>` (short flag)
///
/// Defaults to `avataran.toml` if not specified.
fn parse_config_path() -> String {
    let args: Vec<String> = env::args().collect();

    for i in 1..args.len() {
        if (args[i] == "--config" || args[i] == "-c") && i + 1 < args.len() {
            return args[i + 1].clone();
        }
    }

    if args.len() > 1 && !args[1].starts_with('-') {
        return args[1].clone();
    }

    "avataran.toml".to_string()
}

fn main() -> Result<()> {
    let config_path = parse_config_path();

    // Config before logger: the log level lives in the config file
    let config = match AppConfig::from_file(&config_path) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load configuration from {}: {}", config_path, e);
            return Err(e);
        }
    };

    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(config.logging.level.clone()),
    )
    .init();

    log::info!("Avataran v{} starting...", env!("CARGO_PKG_VERSION"));
    log::info!("Using config: {}", config_path);

    let mut app = App::new(config)?;
    app.install_signal_handler()?;
    app.run()
}
