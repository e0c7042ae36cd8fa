//! Database maintenance commands.

use clap::Subcommand;

/// Sub-commands available under `db`.
#[derive(Debug, Subcommand)]
pub enum DbCommands {
    /// Apply pending migrations
    Migrate,
    /// Check that the database answers
    Ping,
}

/// Apply pending migrations and report how many ran.
///
/// # Errors
///
/// Returns an error if a migration fails.
pub(crate) async fn run_db_migrate(pool: &sqlx::PgPool) -> anyhow::Result<()> {
    let applied = creatordb_db::run_migrations(pool).await?;
    println!("migrations applied: {applied}");
    Ok(())
}

/// # Errors
///
/// Returns an error if the database does not answer `SELECT 1`.
pub(crate) async fn run_db_ping(pool: &sqlx::PgPool) -> anyhow::Result<()> {
    creatordb_db::health_check(pool).await?;
    println!("database ok");
    Ok(())
}
