//! Serve command - starts the API server.

use anyhow::{Context, Result};
use colored::Colorize;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;
use tracing::warn;

use kb_api::{ApiServer, ApiServerConfig, AppState};
use kb_core::db::{create_pool, run_migrations};
use kb_core::ImageStore;

use crate::config::AppConfig;

/// Effective server settings: file values with CLI overrides applied.
#[derive(Debug, Clone)]
pub struct ServeConfig {
    pub port: u16,
    pub host: String,
    pub database_url: String,
    pub images_root: PathBuf,
    pub public_base_url: String,
    pub enable_openapi: bool,
    pub timeout_secs: u64,
}

impl From<&AppConfig> for ServeConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            port: config.server.port,
            host: config.server.host.clone(),
            database_url: config.database.url.clone(),
            images_root: config.images.root.clone(),
            public_base_url: config.images.public_base_url.clone(),
            enable_openapi: config.server.enable_openapi,
            timeout_secs: config.server.request_timeout_secs,
        }
    }
}

impl ServeConfig {
    fn bind_address(&self) -> Result<SocketAddr> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .context("Invalid bind address")
    }
}

/// Runs the API server.
pub async fn run_server(config: ServeConfig) -> Result<()> {
    println!("{} Starting Knowledge Warden API Server...", "[server]".cyan());

    let bind_address = config.bind_address()?;

    println!("  {} Database: {}", "→".green(), config.database_url);
    let db_pool = create_pool(&config.database_url)
        .await
        .context("Failed to create database connection pool")?;

    println!("  {} Running migrations...", "→".green());
    run_migrations(&db_pool)
        .await
        .context("Failed to run database migrations")?;
    println!("  {} Migrations complete", "✓".green());

    tokio::fs::create_dir_all(&config.images_root)
        .await
        .with_context(|| {
            format!(
                "Failed to create image folder {}",
                config.images_root.display()
            )
        })?;
    let images = ImageStore::new(&config.images_root, &config.public_base_url);

    let mut state = AppState::new(db_pool, images);
    match kb_observability::install_prometheus_recorder() {
        Ok(handle) => state = state.with_prometheus_handle(handle),
        Err(e) => warn!(error = %e, "Prometheus recorder unavailable, /metrics disabled"),
    }

    let server_config = ApiServerConfig {
        bind_address,
        request_timeout: Duration::from_secs(config.timeout_secs),
        enable_openapi: config.enable_openapi,
        shutdown_timeout: Duration::from_secs(30),
    };

    println!();
    println!("{}", "Knowledge Warden API Server".bold());
    println!("{}", "═".repeat(40));
    println!("  {} http://{}", "Address:".cyan(), bind_address);
    println!("  {} {}", "Database:".cyan(), config.database_url);
    println!("  {} {}", "Images:".cyan(), config.images_root.display());

    if config.enable_openapi {
        println!(
            "  {} http://{}/api-docs/openapi.json",
            "OpenAPI:".cyan(),
            bind_address
        );
    }

    println!();
    println!("{}", "Endpoints:".bold());
    println!("  GET  /health                     - Health check");
    println!("  POST /api/knowledge              - Create record");
    println!("  PUT  /api/knowledge/:id          - Replace record");
    println!("  GET  /api/knowledge/search       - Combined search");
    println!("  POST /api/knowledge/batchEdit    - Batch type edit");
    println!("  POST /api/images                 - Upload image");
    println!("  GET  /metrics                    - Prometheus metrics");
    println!();
    println!("Press {} to stop", "Ctrl+C".yellow());
    println!();

    let server = ApiServer::new(state, server_config);
    server.run().await.context("Server error")?;

    println!();
    println!("{} Server stopped", "[server]".cyan());

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_app_config() {
        let mut app = AppConfig::default();
        app.server.port = 9001;
        app.images.root = PathBuf::from("/srv/images");

        let config = ServeConfig::from(&app);
        assert_eq!(config.port, 9001);
        assert_eq!(config.images_root, PathBuf::from("/srv/images"));
        assert_eq!(config.bind_address().unwrap().port(), 9001);
    }

    #[test]
    fn test_invalid_host() {
        let mut config = ServeConfig::from(&AppConfig::default());
        config.host = "not a host".to_string();
        assert!(config.bind_address().is_err());
    }
}
