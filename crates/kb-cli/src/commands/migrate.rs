//! Migrate command - applies the knowledge schema without starting the server.

use anyhow::{Context, Result};
use colored::Colorize;

use kb_core::db::{create_pool, run_migrations};

/// Connects to `database_url` and applies pending migrations.
pub async fn run_migrate(database_url: &str) -> Result<()> {
    println!("{} Migrating {}", "[migrate]".cyan(), database_url);

    let pool = create_pool(database_url)
        .await
        .context("Failed to create database connection pool")?;

    run_migrations(&pool)
        .await
        .context("Failed to run database migrations")?;
    pool.close().await;

    println!("  {} Migrations complete ({})", "✓".green(), pool.db_type());
    Ok(())
}
