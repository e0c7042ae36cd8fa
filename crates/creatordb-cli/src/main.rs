mod db;
mod harvest;

use clap::{Parser, Subcommand};
use creatordb_core::Platform;
use tracing_subscriber::EnvFilter;

use crate::db::DbCommands;
use crate::harvest::AccountSource;

#[derive(Debug, Parser)]
#[command(name = "creatordb-cli")]
#[command(about = "creatordb command line interface")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Harvest a single account
    Harvest {
        /// Platform the account lives on; inferred from a profile URL when omitted
        #[arg(long)]
        platform: Option<Platform>,

        /// Handle, profile URL, or `YouTube` channel id
        target: String,

        /// Only refresh the profile, skip content pages
        #[arg(long)]
        no_content: bool,

        /// Continue from the stored pagination cursor
        #[arg(long)]
        resume: bool,

        /// Harvest into an in-memory store instead of the database
        #[arg(long)]
        dry_run: bool,

        /// Print the full response envelope as JSON
        #[arg(long)]
        json: bool,
    },
    /// Harvest every configured account, a few at a time
    HarvestAll {
        /// Harvest accounts already in the database instead of the accounts file
        #[arg(long, conflicts_with = "dry_run")]
        from_db: bool,

        /// With `--from-db`, only accounts not synced for this many hours
        #[arg(long, default_value = "24")]
        stale_hours: i64,

        /// With `--from-db`, the most accounts to harvest in one run
        #[arg(long, default_value = "100")]
        limit: i64,

        /// Continue each account from its stored pagination cursor
        #[arg(long)]
        resume: bool,

        /// Harvest into an in-memory store instead of the database
        #[arg(long)]
        dry_run: bool,
    },
    /// Database maintenance
    Db {
        #[command(subcommand)]
        command: DbCommands,
    },
}

fn init_tracing(default_level: &str) -> anyhow::Result<()> {
    let env_filter =
        EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(default_level))?;
    tracing_subscriber::fmt().with_env_filter(env_filter).init();
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let log_level = std::env::var("CREATORDB_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());
    init_tracing(&log_level)?;

    let cli = Cli::parse();
    let Some(command) = cli.command else {
        println!("no command given; run `creatordb-cli --help` for usage");
        return Ok(());
    };

    match command {
        Commands::Harvest {
            platform,
            target,
            no_content,
            resume,
            dry_run,
            json,
        } => {
            let request = harvest::build_request(platform, &target, !no_content, resume);
            let options = harvest::OutputOptions { json };
            if dry_run {
                let settings = creatordb_core::load_harvester_settings()?;
                harvest::run_harvest_dry(settings, &request, options).await
            } else {
                let config = creatordb_core::load_app_config()?;
                let pool = connect(&config).await?;
                harvest::run_harvest(pool, &config, &request, options).await
            }
        }
        Commands::HarvestAll {
            from_db,
            stale_hours,
            limit,
            resume,
            dry_run,
        } => {
            if dry_run {
                let settings = creatordb_core::load_harvester_settings()?;
                let config_path = std::env::var("CREATORDB_ACCOUNTS_PATH")
                    .unwrap_or_else(|_| "./config/accounts.yaml".to_string());
                let requests = harvest::requests_from_file(std::path::Path::new(&config_path), resume)?;
                return harvest::run_harvest_all_dry(settings, requests).await;
            }

            let config = creatordb_core::load_app_config()?;
            let pool = connect(&config).await?;
            let source = if from_db {
                AccountSource::Stale { stale_hours, limit }
            } else {
                AccountSource::File(config.accounts_path.clone())
            };
            harvest::run_harvest_all(pool, &config, source, resume).await
        }
        Commands::Db { command } => {
            let config = creatordb_core::load_app_config()?;
            let pool = connect(&config).await?;
            match command {
                DbCommands::Migrate => db::run_db_migrate(&pool).await,
                DbCommands::Ping => db::run_db_ping(&pool).await,
            }
        }
    }
}

async fn connect(config: &creatordb_core::AppConfig) -> anyhow::Result<sqlx::PgPool> {
    let pool_config = creatordb_db::PoolConfig::from_app_config(config);
    let pool = creatordb_db::connect_pool(&config.database_url, pool_config).await?;
    Ok(pool)
}

#[cfg(test)]
mod tests;
