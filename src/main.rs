//! getrun - resolve a Maven artifact and run it on the JVM
//!
//! CLI entry point: parse, load config, run, map the outcome to an exit code.

use console::style;
use getrun::cli::{Cli, Invocation, USAGE};
use getrun::config::{Config, ConfigManager};
use getrun::error::{GetrunError, GetrunResult};
use std::process::ExitCode;
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = match Cli::read(std::env::args_os()) {
        Invocation::Run(cli) => cli,
        Invocation::Info(e) => e.exit(),
        Invocation::Invalid(_) => {
            let usage = GetrunError::Usage;
            println!("{}", usage);
            println!("{}", USAGE);
            return ExitCode::from(usage.exit_code());
        }
    };

    match run(cli).await {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            report(&e);
            ExitCode::from(e.exit_code())
        }
    }
}

async fn run(cli: Cli) -> GetrunResult<u8> {
    let config_manager = if let Some(ref path) = cli.config {
        ConfigManager::with_path(path.clone())
    } else {
        ConfigManager::new()
    };
    let config = config_manager.load().await?;

    init_logging(cli.verbose, &config);
    debug!("Using config {}", config_manager.path().display());

    getrun::cli::commands::run(&cli, &config).await
}

/// 0 = warn, 1 = info, 2+ = debug; `RUST_LOG` wins when set
fn init_logging(verbose: u8, config: &Config) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| match verbose {
        0 => EnvFilter::new("getrun=warn"),
        1 => EnvFilter::new("getrun=info"),
        _ => EnvFilter::new("getrun=debug"),
    });

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false);

    if config.general.log_format == "json" {
        builder.json().init();
    } else {
        builder.without_time().init();
    }
}

fn report(e: &GetrunError) {
    for problem in e.problems() {
        eprintln!("  {} {}", style("-").red(), problem);
    }
    eprintln!("{} {}", style("Error:").red().bold(), e);
    if let Some(hint) = e.hint() {
        eprintln!("{} {}", style("Hint:").yellow(), hint);
    }
}
