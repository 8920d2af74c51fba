//! Environment variable validation and configuration module for the API starter
//!
//! This module provides centralized validation of every environment variable
//! read by the starter. Per-environment application settings live in the INI
//! file loaded by [`crate::config`]; the variables here decide where that file
//! is, how the server binds and where logs go.
//!
//! # Supported Environment Variables
//!
//! ## Server Configuration
//! - `STARTER_HOST`: Server bind address (default: "0.0.0.0")
//! - `STARTER_PORT`: Server port, overrides `SERVICE_PORT` from the INI file (optional)
//!
//! ## Application Configuration
//! - `STARTER_CONFIG_FILE`: Path of the INI file (default: "config/config.ini")
//! - `APP_ENV`: Active INI environment, overrides `[ENV] ENV` (optional)
//!
//! ## Logging Configuration
//! - `STARTER_LOG_DIR`: Directory for log files (default: "logs")
//! - `STARTER_LOG_LEVEL`: Filter directives for framework logs, falls back to `RUST_LOG`
//!   (default: "api_starter=info,tower_http=info")
//! - `SERVICE_NAME`: Service column of every log line (default: "api-starter")
//!
//! ## Worker Configuration
//! - `WEB_CONCURRENCY`: Number of worker processes sharing the log files (default: "1")
//! - `STARTER_WORKERS`: Same, starter-specific spelling (default: "1")
//!
//! # Usage
//!
//! ```rust,ignore
//! use api_starter::env::{validate_environment, get_config};
//!
//! // Validate all environment variables at startup
//! if let Err(errors) = validate_environment() {
//!     for error in errors {
//!         eprintln!("{}: {}", error.variable, error.message);
//!     }
//!     std::process::exit(1);
//! }
//!
//! let config = get_config();
//! println!("Config file: {}", config.config_file.display());
//! ```

use crate::logging::bridge::DEFAULT_FILTER;
use crate::logging::registry::{DEFAULT_LOG_DIR, DEFAULT_SERVICE_NAME, LoggingSettings};
use std::env;
use std::net::IpAddr;
use std::path::PathBuf;
use std::str::FromStr;
use tracing::{info, warn};

/// Environment validation errors
#[derive(Debug, Clone)]
pub struct EnvValidationError {
    pub variable: String,
    pub message: String,
    pub severity: ErrorSeverity,
}

/// Severity level for environment validation errors
#[derive(Debug, Clone, PartialEq)]
pub enum ErrorSeverity {
    /// Critical errors that prevent application startup
    Critical,
    /// Warnings about invalid optional values or suboptimal configurations
    Warning,
    /// Informational messages about default values being used
    Info,
}

/// Validated configuration derived from environment variables
#[derive(Debug, Clone)]
pub struct EnvConfig {
    // Server
    pub host: IpAddr,
    pub port: Option<u16>,

    // Application config
    pub config_file: PathBuf,
    pub app_env: Option<String>,

    // Logging
    pub log_filter: String,
    pub service_name: String,
    pub logging: LoggingSettings,

    // Workers
    pub web_concurrency: u32,
    pub workers: u32,
}

/// Validate all environment variables of the running process
pub fn validate_environment() -> Result<EnvConfig, Vec<EnvValidationError>> {
    validate_with(|key| env::var(key).ok())
}

/// Validate environment variables read through `lookup`
pub fn validate_with<F>(lookup: F) -> Result<EnvConfig, Vec<EnvValidationError>>
where
    F: Fn(&str) -> Option<String>,
{
    let mut errors = Vec::new();
    let mut warnings = Vec::new();

    // Server configuration
    let host_str = lookup("STARTER_HOST").unwrap_or_else(|| {
        warnings.push(EnvValidationError {
            variable: "STARTER_HOST".to_string(),
            message: "Using default host '0.0.0.0'".to_string(),
            severity: ErrorSeverity::Info,
        });
        "0.0.0.0".to_string()
    });

    let host = match IpAddr::from_str(&host_str) {
        Ok(host) => host,
        Err(_) => {
            errors.push(EnvValidationError {
                variable: "STARTER_HOST".to_string(),
                message: format!("Invalid IP address: {}", host_str),
                severity: ErrorSeverity::Critical,
            });
            IpAddr::from([0, 0, 0, 0])
        }
    };

    let port = match lookup("STARTER_PORT") {
        Some(port_str) => match port_str.parse::<u16>() {
            Ok(port) => {
                if port < 1024 && port != 0 {
                    warnings.push(EnvValidationError {
                        variable: "STARTER_PORT".to_string(),
                        message: format!(
                            "Using privileged port {}, may require root privileges",
                            port
                        ),
                        severity: ErrorSeverity::Warning,
                    });
                }
                Some(port)
            }
            Err(_) => {
                errors.push(EnvValidationError {
                    variable: "STARTER_PORT".to_string(),
                    message: format!("Invalid port number: {}", port_str),
                    severity: ErrorSeverity::Critical,
                });
                None
            }
        },
        None => {
            warnings.push(EnvValidationError {
                variable: "STARTER_PORT".to_string(),
                message: "Not set, using SERVICE_PORT from the config file".to_string(),
                severity: ErrorSeverity::Info,
            });
            None
        }
    };

    // Application configuration
    let config_file = PathBuf::from(lookup("STARTER_CONFIG_FILE").unwrap_or_else(|| {
        warnings.push(EnvValidationError {
            variable: "STARTER_CONFIG_FILE".to_string(),
            message: format!(
                "Using default config file '{}'",
                crate::config::DEFAULT_CONFIG_FILE
            ),
            severity: ErrorSeverity::Info,
        });
        crate::config::DEFAULT_CONFIG_FILE.to_string()
    }));

    if !config_file.is_file() {
        warnings.push(EnvValidationError {
            variable: "STARTER_CONFIG_FILE".to_string(),
            message: format!("Config file '{}' does not exist", config_file.display()),
            severity: ErrorSeverity::Warning,
        });
    }

    let app_env = lookup("APP_ENV").filter(|v| !v.trim().is_empty());

    // Logging configuration
    let log_filter = resolve_log_filter(&lookup).unwrap_or_else(|| {
        warnings.push(EnvValidationError {
            variable: "RUST_LOG/STARTER_LOG_LEVEL".to_string(),
            message: format!("Using default log level '{}'", DEFAULT_FILTER),
            severity: ErrorSeverity::Info,
        });
        DEFAULT_FILTER.to_string()
    });

    if lookup("STARTER_LOG_DIR").is_none() {
        warnings.push(EnvValidationError {
            variable: "STARTER_LOG_DIR".to_string(),
            message: format!("Using default log directory '{}'", DEFAULT_LOG_DIR),
            severity: ErrorSeverity::Info,
        });
    }

    let service_name = lookup("SERVICE_NAME")
        .filter(|v| !v.trim().is_empty())
        .unwrap_or_else(|| {
            warnings.push(EnvValidationError {
                variable: "SERVICE_NAME".to_string(),
                message: format!("Using default service name '{}'", DEFAULT_SERVICE_NAME),
                severity: ErrorSeverity::Info,
            });
            DEFAULT_SERVICE_NAME.to_string()
        });

    // Worker configuration
    let web_concurrency = parse_env_var_with_default(&lookup, "WEB_CONCURRENCY", 1, &mut warnings);
    let workers = parse_env_var_with_default(&lookup, "STARTER_WORKERS", 1, &mut warnings);

    let logging = LoggingSettings::from_lookup(&lookup);

    if logging.is_multiprocess_environment() && !crate::logging::MULTIPROCESS_SINK_AVAILABLE {
        warnings.push(EnvValidationError {
            variable: "WEB_CONCURRENCY/STARTER_WORKERS".to_string(),
            message: "Several workers configured but process-safe log rotation is not \
                      available in this build, log files may interleave"
                .to_string(),
            severity: ErrorSeverity::Warning,
        });
    }

    // Add all warnings to errors for reporting
    errors.extend(warnings);

    // Check if we have any critical errors
    let has_critical_errors = errors.iter().any(|e| e.severity == ErrorSeverity::Critical);

    if has_critical_errors {
        return Err(errors);
    }

    // Log non-critical issues
    for error in &errors {
        match error.severity {
            ErrorSeverity::Warning => warn!("{}: {}", error.variable, error.message),
            ErrorSeverity::Info => info!("{}: {}", error.variable, error.message),
            ErrorSeverity::Critical => {} // Already handled above
        }
    }

    Ok(EnvConfig {
        host,
        port,
        config_file,
        app_env,
        log_filter,
        service_name,
        logging,
        web_concurrency,
        workers,
    })
}

/// Filter directives from `STARTER_LOG_LEVEL`, then `RUST_LOG`, then the default
pub fn log_filter() -> String {
    resolve_log_filter(&|key: &str| env::var(key).ok())
        .unwrap_or_else(|| DEFAULT_FILTER.to_string())
}

/// Get the validated configuration, exiting if validation fails
pub fn get_config() -> EnvConfig {
    match validate_environment() {
        Ok(config) => config,
        Err(errors) => {
            eprintln!("Environment validation failed:");
            for error in errors {
                match error.severity {
                    ErrorSeverity::Critical => {
                        eprintln!("CRITICAL - {}: {}", error.variable, error.message)
                    }
                    ErrorSeverity::Warning => {
                        eprintln!("WARNING - {}: {}", error.variable, error.message)
                    }
                    ErrorSeverity::Info => {
                        eprintln!("INFO - {}: {}", error.variable, error.message)
                    }
                }
            }
            std::process::exit(1);
        }
    }
}

/// Print environment validation results in a user-friendly format
pub fn print_validation_results(result: &Result<EnvConfig, Vec<EnvValidationError>>) {
    match result {
        Ok(config) => {
            println!("Environment validation successful");
            println!("Configuration:");
            match config.port {
                Some(port) => println!("  Server: {}:{}", config.host, port),
                None => println!("  Server: {} (port from config file)", config.host),
            }
            println!("  Config File: {}", config.config_file.display());
            if let Some(ref app_env) = config.app_env {
                println!("  App Environment: {}", app_env.to_uppercase());
            }
            println!("  Service Name: {}", config.service_name);
            println!("  Log Directory: {}", config.logging.log_dir.display());
            println!("  Log Level: {}", config.logging.min_level);
            println!("  Log Filter: {}", config.log_filter);
            println!(
                "  Workers: {} (process-safe rotation: {})",
                config.web_concurrency.max(config.workers),
                config.logging.is_multiprocess_environment()
                    && crate::logging::MULTIPROCESS_SINK_AVAILABLE
            );
        }
        Err(errors) => {
            let critical_count = errors
                .iter()
                .filter(|e| e.severity == ErrorSeverity::Critical)
                .count();
            let warning_count = errors
                .iter()
                .filter(|e| e.severity == ErrorSeverity::Warning)
                .count();
            let info_count = errors
                .iter()
                .filter(|e| e.severity == ErrorSeverity::Info)
                .count();

            if critical_count > 0 {
                eprintln!(
                    "Environment validation failed with {} critical error(s), {} warning(s), {} info message(s):",
                    critical_count, warning_count, info_count
                );
            } else {
                println!(
                    "Environment validation completed with {} warning(s), {} info message(s):",
                    warning_count, info_count
                );
            }

            for error in errors {
                let prefix = match error.severity {
                    ErrorSeverity::Critical => "❌ CRITICAL",
                    ErrorSeverity::Warning => "⚠️  WARNING",
                    ErrorSeverity::Info => "ℹ️  INFO",
                };
                println!("  {} - {}: {}", prefix, error.variable, error.message);
            }
        }
    }
}

/// Generate example environment configuration file
pub fn generate_env_example() -> String {
    format!(
        r#"# API Starter Environment Configuration
# Copy this file to .env and customize the values for your deployment

# =============================================================================
# Server Configuration
# =============================================================================

# Server bind address
# Default: 0.0.0.0 (bind to all interfaces)
# Examples:
#   STARTER_HOST=0.0.0.0    # All interfaces
#   STARTER_HOST=127.0.0.1  # Localhost only
STARTER_HOST=0.0.0.0

# Server port
# Default: SERVICE_PORT of the active environment in the config file
# Note: Ports below 1024 may require root privileges
# STARTER_PORT=8080

# =============================================================================
# Application Configuration
# =============================================================================

# INI file with one section per environment
# Default: {config_file}
STARTER_CONFIG_FILE={config_file}

# Active environment, overrides [ENV] ENV in the config file
# Examples:
#   APP_ENV=DEMO
#   APP_ENV=PROD
# APP_ENV=DEMO

# =============================================================================
# Logging Configuration
# =============================================================================

# Directory for app.log, app_error.log and their rotated backups
# Default: {log_dir}
STARTER_LOG_DIR={log_dir}

# Filter for framework and crate logs
# Default: {filter}
# Examples:
#   RUST_LOG=debug                                 # Everything at debug level
#   STARTER_LOG_LEVEL=api_starter=debug,tower_http=info
#   STARTER_LOG_LEVEL=debug                        # Also lowers the logger level
RUST_LOG={filter}

# Service column of every log line
# Default: {service}
SERVICE_NAME={service}

# =============================================================================
# Worker Configuration
# =============================================================================

# Worker processes sharing the log directory. With more than one worker, log
# files rotate by size (10 MiB, 30 backups) under an advisory file lock.
# Default: 1
WEB_CONCURRENCY=1
# STARTER_WORKERS=1
"#,
        config_file = crate::config::DEFAULT_CONFIG_FILE,
        log_dir = DEFAULT_LOG_DIR,
        filter = DEFAULT_FILTER,
        service = DEFAULT_SERVICE_NAME,
    )
}

/// Filter directives from `STARTER_LOG_LEVEL` or `RUST_LOG`, if either is set
fn resolve_log_filter<F>(lookup: &F) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    lookup("STARTER_LOG_LEVEL")
        .or_else(|| lookup("RUST_LOG"))
        .filter(|v| !v.trim().is_empty())
}

/// Helper function to parse environment variable with default value
fn parse_env_var_with_default<F, T>(
    lookup: &F,
    var_name: &str,
    default: T,
    warnings: &mut Vec<EnvValidationError>,
) -> T
where
    F: Fn(&str) -> Option<String>,
    T: FromStr + Clone + std::fmt::Display,
    T::Err: std::fmt::Display,
{
    match lookup(var_name) {
        Some(value_str) => match value_str.trim().parse::<T>() {
            Ok(value) => value,
            Err(e) => {
                warnings.push(EnvValidationError {
                    variable: var_name.to_string(),
                    message: format!(
                        "Invalid value '{}': {}. Using default: {}",
                        value_str, e, default
                    ),
                    severity: ErrorSeverity::Warning,
                });
                default
            }
        },
        None => {
            warnings.push(EnvValidationError {
                variable: var_name.to_string(),
                message: format!("Using default value: {}", default),
                severity: ErrorSeverity::Info,
            });
            default
        }
    }
}
