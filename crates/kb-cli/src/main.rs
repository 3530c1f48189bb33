//! Knowledge Warden CLI
//!
//! Command-line interface for the Knowledge Warden security knowledge base.

use anyhow::Result;
use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::PathBuf;

mod commands;
mod config;
mod validator;

use commands::{run_migrate, run_server, ServeConfig};
use config::AppConfig;
use kb_observability::LoggingConfig;
use validator::ConfigValidator;

#[derive(Parser)]
#[command(name = "knowledge-warden")]
#[command(version)]
#[command(about = "Security knowledge base with ATT&CK-tagged search", long_about = None)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Output format (text, json)
    #[arg(long, default_value = "text")]
    format: OutputFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
enum OutputFormat {
    Text,
    Json,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(OutputFormat::Text),
            "json" => Ok(OutputFormat::Json),
            _ => Err(format!("Invalid output format: {}", s)),
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Start the API server
    Serve {
        /// Port to listen on
        #[arg(short, long)]
        port: Option<u16>,

        /// Host to bind to
        #[arg(long)]
        host: Option<String>,

        /// Database URL (sqlite: or postgres://)
        #[arg(short, long)]
        database: Option<String>,

        /// Image storage folder
        #[arg(long, value_name = "DIR")]
        images: Option<PathBuf>,

        /// Do not serve the OpenAPI document
        #[arg(long)]
        no_openapi: bool,

        /// Validate configuration and exit without starting the server
        #[arg(long)]
        validate_only: bool,
    },

    /// Apply database migrations
    Migrate {
        /// Database URL (defaults to the configured one)
        #[arg(short, long)]
        database: Option<String>,
    },

    /// Validate configuration
    Validate {
        /// Configuration file to validate
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// Show current configuration
    Config {
        /// Show the database password (redacted by default)
        #[arg(long)]
        show_secrets: bool,

        /// Write the effective configuration to the config path
        #[arg(long)]
        write: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config_path = cli.config.clone().unwrap_or_else(default_config_path);
    let config = AppConfig::load(&config_path).unwrap_or_else(|_| {
        if cli.verbose {
            eprintln!("Using default configuration (no config file found)");
        }
        AppConfig::default()
    });

    let mut logging = LoggingConfig::from_level_name(
        &config.logging.level,
        config.logging.json_format || cli.format == OutputFormat::Json,
    );
    if cli.verbose {
        logging.level = tracing::Level::DEBUG;
    }
    kb_observability::init_logging_with_config(logging);

    match cli.command {
        Commands::Serve {
            port,
            host,
            database,
            images,
            no_openapi,
            validate_only,
        } => {
            let mut serve_config = ServeConfig::from(&config);
            if let Some(port) = port {
                serve_config.port = port;
            }
            if let Some(host) = host {
                serve_config.host = host;
            }
            if let Some(database) = database {
                serve_config.database_url = database;
            }
            if let Some(images) = images {
                serve_config.images_root = images;
            }
            if no_openapi {
                serve_config.enable_openapi = false;
            }
            cmd_serve(serve_config, config, validate_only).await
        }
        Commands::Migrate { database } => {
            run_migrate(&database.unwrap_or(config.database.url)).await
        }
        Commands::Validate { config: cfg_path } => {
            cmd_validate(cfg_path.unwrap_or(config_path)).await
        }
        Commands::Config {
            show_secrets,
            write,
        } => cmd_config(config, &config_path, show_secrets, write, cli.format).await,
    }
}

fn default_config_path() -> PathBuf {
    if let Some(dirs) = directories::ProjectDirs::from("com", "knowledge-warden", "knowledge-warden")
    {
        dirs.config_dir().join("config.yaml")
    } else {
        PathBuf::from("config/default.yaml")
    }
}

async fn cmd_serve(
    serve_config: ServeConfig,
    app_config: AppConfig,
    validate_only: bool,
) -> Result<()> {
    println!("{}", "Validating configuration...".cyan());

    let validation_result = ConfigValidator::validate(&app_config);
    validation_result.print();

    if validation_result.has_errors() {
        println!();
        println!(
            "{}",
            "Fix the configuration errors above before starting the server."
                .red()
                .bold()
        );
        std::process::exit(1);
    }

    if validate_only {
        println!();
        println!(
            "{}",
            "Configuration is valid. Server can be started."
                .green()
                .bold()
        );
        return Ok(());
    }

    println!();
    run_server(serve_config).await
}

async fn cmd_validate(config_path: PathBuf) -> Result<()> {
    println!(
        "Validating configuration: {}",
        config_path.display().to_string().cyan()
    );

    let config = match AppConfig::load(&config_path) {
        Ok(config) => config,
        Err(e) => {
            println!("{}: {}", "Configuration file error".red().bold(), e);
            std::process::exit(1);
        }
    };

    let validation_result = ConfigValidator::validate(&config);
    validation_result.print();

    println!();
    println!("{}", "Configuration Summary".bold());
    println!("─────────────────────");
    println!("  Listen: {}:{}", config.server.host, config.server.port);
    println!("  Database: {}", config.redact_secrets().database.url);
    println!("  Images: {}", config.images.root.display());

    if validation_result.has_errors() {
        println!();
        println!(
            "{}",
            "Configuration validation failed. Fix the errors above."
                .red()
                .bold()
        );
        std::process::exit(1);
    } else if validation_result.has_warnings() {
        println!();
        println!(
            "{}",
            "Configuration is valid with warnings. Review the warnings above."
                .yellow()
                .bold()
        );
    } else {
        println!();
        println!("{}", "Configuration is valid.".green().bold());
    }

    Ok(())
}

async fn cmd_config(
    config: AppConfig,
    config_path: &std::path::Path,
    show_secrets: bool,
    write: bool,
    format: OutputFormat,
) -> Result<()> {
    if write {
        config.save(config_path)?;
        println!(
            "{} {}",
            "Configuration written to".green(),
            config_path.display()
        );
    }

    let display_config = if show_secrets {
        config
    } else {
        config.redact_secrets()
    };

    if format == OutputFormat::Json {
        println!("{}", serde_json::to_string_pretty(&display_config)?);
    } else {
        println!("{}", "Current Configuration".bold());
        println!("─────────────────────────");
        print!("{}", serde_yaml::to_string(&display_config)?);
    }

    Ok(())
}
