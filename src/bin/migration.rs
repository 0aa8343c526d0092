use clap::{Parser, Subcommand};
use sea_orm::{ConnectOptions, Database};
use sea_orm_migration::MigratorTrait;
use std::time::Duration;
use tracing::info;

use psi_api::migrator::Migrator;

#[derive(Debug, Parser)]
#[command(name = "migration", about = "Manage the psi-api database schema")]
struct Cli {
    /// Database URL; falls back to DATABASE_URL
    #[arg(long, env = "DATABASE_URL", default_value = "sqlite::memory:")]
    database_url: String,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Apply pending migrations (default)
    Up {
        #[arg(short, long)]
        steps: Option<u32>,
    },
    /// Roll back applied migrations, one step unless told otherwise
    Down {
        #[arg(short, long, default_value_t = 1)]
        steps: u32,
    },
    /// Show applied and pending migrations
    Status,
    /// Drop every table and reapply all migrations
    Fresh,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    let cli = Cli::parse();
    info!("Connecting to database: {}", cli.database_url);

    let mut options = ConnectOptions::new(cli.database_url.clone());
    options
        .max_connections(5)
        .min_connections(1)
        .connect_timeout(Duration::from_secs(10))
        .acquire_timeout(Duration::from_secs(10))
        .idle_timeout(Duration::from_secs(300))
        .sqlx_logging(true);

    let db = Database::connect(options).await?;

    match cli.command.unwrap_or(Command::Up { steps: None }) {
        Command::Up { steps } => {
            Migrator::up(&db, steps).await?;
            info!("Migration completed successfully");
        }
        Command::Down { steps } => {
            Migrator::down(&db, Some(steps)).await?;
            info!(steps, "Rolled back migrations");
        }
        Command::Status => Migrator::status(&db).await?,
        Command::Fresh => {
            Migrator::fresh(&db).await?;
            info!("Schema recreated");
        }
    }

    Ok(())
}
