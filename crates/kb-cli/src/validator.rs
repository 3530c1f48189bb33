//! Startup validation of the loaded configuration.

use colored::Colorize;

use crate::config::AppConfig;

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Result of configuration validation.
#[derive(Debug, Default)]
pub struct ValidationResult {
    /// Critical errors that prevent startup.
    pub errors: Vec<String>,
    /// Warnings that should be addressed but don't prevent startup.
    pub warnings: Vec<String>,
}

impl ValidationResult {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_error(&mut self, message: impl Into<String>) {
        self.errors.push(message.into());
    }

    pub fn add_warning(&mut self, message: impl Into<String>) {
        self.warnings.push(message.into());
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }

    /// Prints the validation result to the console.
    pub fn print(&self) {
        if !self.warnings.is_empty() {
            println!();
            println!("{}", "Configuration Warnings:".yellow().bold());
            for warning in &self.warnings {
                println!("  {} {}", "⚠".yellow(), warning);
            }
        }

        if !self.errors.is_empty() {
            println!();
            println!("{}", "Configuration Errors:".red().bold());
            for error in &self.errors {
                println!("  {} {}", "✗".red(), error);
            }
        }

        if self.errors.is_empty() && self.warnings.is_empty() {
            println!("  {} Configuration OK", "✓".green());
        }
    }
}

/// Validates application configuration before startup.
pub struct ConfigValidator;

impl ConfigValidator {
    pub fn validate(config: &AppConfig) -> ValidationResult {
        let mut result = ValidationResult::new();

        Self::validate_server(config, &mut result);
        Self::validate_database_url(config, &mut result);
        Self::validate_images(config, &mut result);
        Self::validate_logging(config, &mut result);

        result
    }

    fn validate_server(config: &AppConfig, result: &mut ValidationResult) {
        if config.server.port == 0 {
            result.add_error("server.port must be non-zero");
        }
        if config.server.request_timeout_secs == 0 {
            result.add_error("server.request_timeout_secs must be at least 1");
        }
    }

    fn validate_database_url(config: &AppConfig, result: &mut ValidationResult) {
        let url = &config.database.url;

        if !url.starts_with("sqlite:")
            && !url.starts_with("postgres://")
            && !url.starts_with("postgresql://")
        {
            result.add_error(format!(
                "Invalid database URL '{}'. Must start with sqlite: or postgres://",
                url
            ));
        }

        if url.contains(":memory:") || url.contains("mode=memory") {
            result.add_warning("In-memory database: records are lost on shutdown");
        }
    }

    fn validate_images(config: &AppConfig, result: &mut ValidationResult) {
        let base = &config.images.public_base_url;
        if !base.starts_with("http://") && !base.starts_with("https://") {
            result.add_error(format!(
                "images.public_base_url '{}' must be an http(s) URL",
                base
            ));
        }

        let root = &config.images.root;
        if root.exists() && !root.is_dir() {
            result.add_error(format!(
                "images.root '{}' exists but is not a directory",
                root.display()
            ));
        } else if !root.exists() {
            result.add_warning(format!(
                "images.root '{}' does not exist and will be created",
                root.display()
            ));
        }
    }

    fn validate_logging(config: &AppConfig, result: &mut ValidationResult) {
        if !LOG_LEVELS.contains(&config.logging.level.to_lowercase().as_str()) {
            result.add_warning(format!(
                "Unknown logging.level '{}', falling back to info",
                config.logging.level
            ));
        }
    }
}
