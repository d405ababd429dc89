use std::process::ExitCode;

use chrono::Duration;
use clap::Parser;
use tracing_subscriber::EnvFilter;
use tripwire::{ThrottleConfig, Tripwire, TripwireBuilder, sqlite::SqliteAttemptRepository};

/// Administer the tripwire login throttle
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Database connection string
    #[arg(long, env = "TRIPWIRE_DATABASE_URL", default_value = "sqlite://tripwire.db")]
    db_url: String,

    /// Consecutive failed attempts that lock an identity
    #[arg(long, env = "TRIPWIRE_MAX_FAILED_ATTEMPTS", default_value_t = 5)]
    max_failed_attempts: u32,

    /// Lockout length in minutes
    #[arg(long, env = "TRIPWIRE_LOCKOUT_MINUTES", default_value_t = 15)]
    lockout_minutes: u32,

    /// Command to execute
    #[command(subcommand)]
    command: Commands,
}

/// Available CLI commands
#[derive(clap::Subcommand)]
enum Commands {
    /// Run database migrations
    Migrate,
    /// Show the lockout status of an email or `device:<id>`
    Status { identity: String },
    /// Clear the failure history of an email or `device:<id>`
    Unlock { identity: String },
    /// Delete attempt records older than the lockout period
    Purge,
    /// Print version information
    Version,
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    match &cli.command {
        Commands::Migrate => {
            println!("Running migrations...");
            connect(&cli).await?;
            println!("Migrations applied");
        }
        Commands::Status { identity } => {
            let status = connect(&cli).await?.status(identity).await?;
            println!("{}", serde_json::to_string_pretty(&status)?);
        }
        Commands::Unlock { identity } => {
            if connect(&cli).await?.unlock(identity).await? {
                println!("Unlocked {identity}");
            } else {
                println!("{identity} was not locked");
            }
        }
        Commands::Purge => {
            let count = connect(&cli).await?.purge_stale().await?;
            println!("Purged {count} stale attempt record(s)");
        }
        Commands::Version => {
            println!("Tripwire v{}", env!("CARGO_PKG_VERSION"));
        }
    }

    Ok(())
}

async fn connect(
    cli: &Cli,
) -> Result<Tripwire<SqliteAttemptRepository>, Box<dyn std::error::Error>> {
    let config = ThrottleConfig {
        max_failed_attempts: cli.max_failed_attempts,
        lockout_period: Duration::minutes(i64::from(cli.lockout_minutes)),
        ..Default::default()
    };

    let tripwire = TripwireBuilder::new()
        .with_sqlite(&cli.db_url)
        .await?
        .with_throttle_config(config)
        .apply_migrations(true)
        .build()
        .await?;

    Ok(tripwire)
}
