use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use switchback::cli::{Cli, Commands, GlobalArgs};
use switchback::commands::{
    AppContext, handle_backup, handle_config, handle_credential, handle_history, handle_remote,
    handle_show, handle_switch, handle_sync,
};
use switchback::{Config, Result};

/// Environment variable holding a tracing filter, checked before `RUST_LOG`.
const LOG_ENV: &str = "SWITCHBACK_LOG";

fn init_tracing(global: &GlobalArgs) {
    let filter = if global.verbose {
        EnvFilter::new("switchback=debug")
    } else if global.quiet {
        EnvFilter::new("warn")
    } else {
        EnvFilter::try_from_env(LOG_ENV)
            .or_else(|_| EnvFilter::try_from_default_env())
            .unwrap_or_else(|_| EnvFilter::new("switchback=info"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

/// Dispatch a command. `Ok(false)` means the command ran but reported
/// failures (a backup run with failed switches).
fn run(cli: Cli) -> Result<bool> {
    let (config, config_path) = Config::load(cli.global.config.as_deref())?;
    let ctx = AppContext::new(config, config_path).quiet(cli.global.quiet);

    match cli.command {
        Commands::Backup {
            switch,
            sync,
            login,
        } => return handle_backup(&ctx, switch, sync, login),
        Commands::Sync { message } => handle_sync(&ctx, message)?,
        Commands::Remote { command } => handle_remote(&ctx, command)?,
        Commands::History {
            address,
            limit,
            verbose,
        } => handle_history(&ctx, &address, limit, verbose)?,
        Commands::Show { address } => handle_show(&ctx, &address)?,
        Commands::Switch { command } => handle_switch(&ctx, command)?,
        Commands::Credential { command } => handle_credential(&ctx, command)?,
        Commands::Config { command } => handle_config(&ctx, command)?,
    }
    Ok(true)
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(&cli.global);

    match run(cli) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}
