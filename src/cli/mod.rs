//! # CLI Module
//!
//! Command-line interface of the API starter.
//!
//! ## Commands
//!
//! ### Server Operations
//! - `start`: Validate the environment, set up logging and serve HTTP
//!
//! ### Configuration
//! - `config show`: Print the active environment's settings (password masked)
//! - `config envs`: List the environments defined in the config file
//! - `env-example`: Print a commented `.env` template
//! - `validate-env`: Validate environment variables and print the findings
//!
//! ## Usage Example
//!
//! ```bash
//! # Show the PROD settings
//! APP_ENV=prod api-starter config show
//!
//! # Start the server with four workers sharing the log files
//! WEB_CONCURRENCY=4 api-starter start
//! ```

use crate::config::{ConfigManager, ENV_SECTION};
use crate::env;
use crate::logging::LoggerRegistry;
use crate::logging::bridge::init_tracing;
use crate::server::start_server;
use clap::{Parser, Subcommand};
use std::process::ExitCode;
use std::sync::Arc;

///////////////////////////////////////////////////////////////////////////////
//****                        Private Structs                            ****//
///////////////////////////////////////////////////////////////////////////////

#[derive(Parser)]
#[command(name = "api-starter")]
#[command(about = "Web API starter with structured logging")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

///////////////////////////////////////////////////////////////////////////////
//****                         Private Types                             ****//
///////////////////////////////////////////////////////////////////////////////

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP server
    #[command(name = "start")]
    Start,
    /// Inspect the INI application config
    #[command(name = "config")]
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
    /// Print an example .env file
    #[command(name = "env-example")]
    EnvExample,
    /// Validate environment variables
    #[command(name = "validate-env")]
    ValidateEnv,
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Show the active environment's settings
    #[command(name = "show")]
    Show,
    /// List every environment and its service port
    #[command(name = "envs")]
    Envs,
}

///////////////////////////////////////////////////////////////////////////////
//****                       Public Functions                            ****//
///////////////////////////////////////////////////////////////////////////////

pub async fn parse_cli_commands() -> ExitCode {
    let cli = Cli::parse();

    match cli.command {
        Commands::Start => start().await,
        Commands::Config { action } => match action {
            ConfigAction::Show => show_config(),
            ConfigAction::Envs => list_environments(),
        },
        Commands::EnvExample => {
            print!("{}", env::generate_env_example());
            ExitCode::SUCCESS
        }
        Commands::ValidateEnv => {
            let result = env::validate_environment();
            env::print_validation_results(&result);
            if result.is_ok() {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            }
        }
    }
}

///////////////////////////////////////////////////////////////////////////////
//****                       Private Functions                           ****//
///////////////////////////////////////////////////////////////////////////////

async fn start() -> ExitCode {
    let registry = Arc::new(LoggerRegistry::from_env());
    let app_log = match registry.get_logger(Some("app"), None) {
        Ok(log) => log,
        Err(e) => {
            eprintln!("Failed to set up logging: {}", e);
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = init_tracing(&env::log_filter(), app_log.clone()) {
        eprintln!("Failed to install tracing bridge: {}", e);
    }

    let env_config = env::get_config();
    let manager =
        match ConfigManager::load_with_env(&env_config.config_file, env_config.app_env.clone()) {
            Ok(manager) => manager,
            Err(e) => {
                app_log.critical(format!("Failed to load configuration: {}", e));
                return ExitCode::FAILURE;
            }
        };
    let app_config = match manager.app_config() {
        Ok(config) => config,
        Err(e) => {
            app_log.critical(format!("Failed to load configuration: {}", e));
            return ExitCode::FAILURE;
        }
    };
    app_log.info(format!(
        "Configuration initialized for environment {}",
        app_config.environment
    ));

    match start_server(registry, &env_config, &app_config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            app_log.critical(format!("Server stopped: {}", e));
            ExitCode::FAILURE
        }
    }
}

fn show_config() -> ExitCode {
    let config = ConfigManager::from_env().and_then(|manager| {
        let config = manager.app_config()?;
        Ok((manager, config))
    });

    match config {
        Ok((manager, config)) => {
            println!("Config file:      {}", manager.path().display());
            println!("{}", config);
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("❌ Failed to load configuration: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn list_environments() -> ExitCode {
    match ConfigManager::from_env() {
        Ok(manager) => {
            let current = manager.current_env();
            println!("Available environments ({} active):", current);
            for (name, port) in manager.environments() {
                let marker = if name == current { "*" } else { " " };
                println!(
                    "  {} {:<12} port {}",
                    marker,
                    name,
                    port.as_deref().unwrap_or("not configured")
                );
            }
            if manager.sections().get(ENV_SECTION).is_none() {
                println!("  (no [{}] section, defaulting when APP_ENV is unset)", ENV_SECTION);
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("❌ Failed to load configuration: {}", e);
            ExitCode::FAILURE
        }
    }
}
