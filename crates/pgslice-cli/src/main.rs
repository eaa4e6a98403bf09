mod commands;
mod config;
mod errors;
mod logging;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};

use commands::DumpArgs;
use config::{AppConfig, ConfigOverrides};
use errors::CliResult;

#[derive(Parser, Debug)]
#[command(
    name = "pgslice",
    version,
    about = "Extract a record and everything it references as re-runnable SQL"
)]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,
    #[command(subcommand)]
    command: Command,
}

#[derive(Args, Debug)]
struct GlobalArgs {
    #[arg(long, global = true)]
    host: Option<String>,
    #[arg(long, global = true)]
    port: Option<u16>,
    #[arg(long, global = true)]
    user: Option<String>,
    #[arg(long, global = true)]
    database: Option<String>,
    #[arg(long, global = true)]
    schema: Option<String>,
    /// TOML file with default settings.
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,
    /// DEBUG, INFO, WARNING or ERROR; logging is off when unset.
    #[arg(long, global = true)]
    log_level: Option<String>,
    /// Log JSON lines instead of text.
    #[arg(long, global = true, default_value_t = false)]
    log_json: bool,
}

impl GlobalArgs {
    fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            host: self.host.clone(),
            port: self.port,
            user: self.user.clone(),
            database: self.database.clone(),
            schema: self.schema.clone(),
            log_level: self.log_level.clone(),
        }
    }
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Write a record and its dependencies as SQL.
    Dump(DumpArgs),
    /// List the tables of the schema.
    Tables,
    /// Show columns, keys and foreign keys of a table.
    Describe {
        table: String,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    tokio::select! {
        result = run(cli) => match result {
            Ok(()) => ExitCode::SUCCESS,
            Err(err) => {
                tracing::error!(error = %err, "command failed");
                eprintln!("Error: {err}");
                ExitCode::FAILURE
            }
        },
        _ = tokio::signal::ctrl_c() => {
            eprintln!("\nInterrupted");
            ExitCode::from(130)
        }
    }
}

async fn run(cli: Cli) -> CliResult<()> {
    let config = AppConfig::load(cli.global.config.as_deref(), &cli.global.overrides())?;
    logging::init_logging(config.log_level.as_deref(), cli.global.log_json)?;

    match &cli.command {
        Command::Dump(args) => commands::dump(&config, args).await,
        Command::Tables => commands::tables(&config).await,
        Command::Describe { table } => commands::describe(&config, table).await,
    }
}
