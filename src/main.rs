//! netres - declarative network resource reconciliation
//!
//! This is the main entry point for the netres CLI.

mod cli;
mod config;

use anyhow::Result;
use cli::commands::CommandContext;
use cli::{Cli, Commands};
use config::{Config, LoggingConfig};
use netres::modules::ModuleError;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Application version information
const VERSION: &str = env!("CARGO_PKG_VERSION");

fn main() {
    let cli = Cli::parse_args();

    let config = Config::load(cli.config.as_ref());
    init_logging(
        cli.verbosity(),
        config.as_ref().map(|c| &c.logging).unwrap_or(&LoggingConfig::default()),
    );

    let config = config.unwrap_or_else(|e| {
        eprintln!("Warning: Failed to load config: {:#}", e);
        Config::default()
    });

    if cli.verbosity() >= 2 {
        eprintln!("netres v{}", VERSION);
    }

    let ctx = CommandContext::new(&cli, config);
    let exit_code = match run(&cli, &ctx) {
        Ok(code) => code,
        Err(e) => {
            ctx.output.error(&format!("{:#}", e));
            exit_code_of(&e)
        }
    };

    std::process::exit(exit_code);
}

fn run(cli: &Cli, ctx: &CommandContext) -> Result<i32> {
    match &cli.command {
        Commands::List(args) => args.execute(ctx),
        Commands::Parse(args) => args.execute(ctx),
        Commands::Render(args) => args.execute(ctx),
        Commands::Reconcile(args) => args.execute(ctx),
    }
}

/// Map a failure to the process exit status.
fn exit_code_of(error: &anyhow::Error) -> i32 {
    if let Some(e) = error.downcast_ref::<ModuleError>() {
        return e.exit_code();
    }
    if let Some(e) = error.downcast_ref::<netres::Error>() {
        return e.exit_code();
    }
    1
}

/// Initialize logging based on verbosity level
fn init_logging(verbosity: u8, logging: &LoggingConfig) {
    let filter = match verbosity {
        0 => logging.level.as_str(),
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    // stdout is reserved for command output
    if logging.is_json() {
        tracing_subscriber::registry()
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .with(env_filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_target(verbosity >= 3)
                    .with_writer(std::io::stderr),
            )
            .with(env_filter)
            .init();
    }
}
