use anyhow::Result;
use clap::{Parser, Subcommand};
use colored::*;
use std::path::PathBuf;

mod commands;
mod utils;

use commands::check::{self, CheckArgs};
use commands::{defaults, user, validate};
use utils::env_paths::{self, EnvPaths};
use utils::logging;

/// Exit code for a check that was evaluated and denied.
const EXIT_DENIED: i32 = 2;

/// authzctl - Query and validate RBAC/ABAC access rules
#[derive(Parser)]
#[command(name = "authzctl")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Seed document with permissions, roles, policies and assignments
    #[arg(long, global = true, env = "AUTHZ_SEED_PATH")]
    seed: Option<PathBuf>,

    /// Directory for daily log files
    #[arg(long, global = true, env = "AUTHZ_LOG_DIR")]
    log_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Decide whether a user may perform an action (exit 0 allow, 2 deny)
    Check(CheckArgs),

    /// List the permissions a user holds through their roles
    Permissions {
        user: String,

        /// Output format (json, yaml, text)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// List the roles assigned to a user
    Roles {
        user: String,

        /// Output format (json, yaml, text)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Report policies whose conditions cannot be decoded (exit 1 if any)
    Validate {
        /// Output format (json, text)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Print the built-in permission catalog and roles
    Defaults {
        /// Output format (json, yaml, text)
        #[arg(short, long, default_value = "yaml")]
        format: String,
    },
}

#[tokio::main]
async fn main() {
    // .env must be loaded before parsing so clap sees its values
    env_paths::load_dotenv();
    let cli = Cli::parse();

    let code = match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("{} {:#}", "Error:".red().bold(), e);
            1
        }
    };
    std::process::exit(code);
}

async fn run(cli: Cli) -> Result<i32> {
    let paths = EnvPaths::resolve(cli.seed, cli.log_dir)?;
    // Held until run returns so the file writer flushes
    let _guard = logging::init_logging(paths.log_dir.as_deref(), cli.verbose)?;

    let code = match cli.command {
        Commands::Check(args) => {
            if check::execute(&paths, args).await? {
                0
            } else {
                EXIT_DENIED
            }
        }
        Commands::Permissions { user, format } => {
            user::permissions(&paths, user, format).await?;
            0
        }
        Commands::Roles { user, format } => {
            user::roles(&paths, user, format).await?;
            0
        }
        Commands::Validate { format } => {
            if validate::execute(&paths, format).await? {
                0
            } else {
                1
            }
        }
        Commands::Defaults { format } => {
            defaults::execute(format)?;
            0
        }
    };

    Ok(code)
}
