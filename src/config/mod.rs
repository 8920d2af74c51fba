//! # Application Configuration
//!
//! Loads per-environment settings from an INI file. Each environment has its
//! own section; an `[ENV]` section names the active one:
//!
//! ```ini
//! [ENV]
//! ENV = DEMO
//!
//! [DEMO]
//! SERVICE_PORT = 8080
//! PREFIX = app
//! ```
//!
//! ## Active environment
//!
//! 1. `APP_ENV`, upper-cased
//! 2. `[ENV] ENV`, upper-cased
//! 3. `DEMO`
//!
//! Section and key names are case-insensitive.

use std::collections::BTreeMap;
use std::env;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use thiserror::Error;

pub const DEFAULT_CONFIG_FILE: &str = "config/config.ini";
pub const DEFAULT_ENVIRONMENT: &str = "DEMO";
pub const ENV_SECTION: &str = "ENV";

pub type ConfigResult<T> = Result<T, ConfigError>;

/// Section name -> key -> raw value, with names upper-cased
pub type Sections = BTreeMap<String, BTreeMap<String, String>>;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("configuration file not found: {0}")]
    NotFound(PathBuf),

    #[error("failed to read configuration: {0}")]
    Load(#[from] ::config::ConfigError),

    #[error("no [{0}] section in configuration file")]
    MissingEnvironment(String),

    #[error("invalid value for {key} in [{section}]: '{value}'")]
    InvalidValue {
        section: String,
        key: String,
        value: String,
    },
}

///////////////////////////////////////////////////////////////////////////////
//****                         Public Structs                            ****//
///////////////////////////////////////////////////////////////////////////////

/// Settings of the active environment
#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    pub environment: String,

    // Service
    pub service_port: u16,
    pub prefix: String,
    pub inner_url: Option<String>,
    pub default_timeout: u64,

    // Database
    pub host: Option<String>,
    pub port: Option<u16>,
    pub user: Option<String>,
    pub password: Option<String>,
    pub name: Option<String>,

    // Service discovery
    pub server_addresses: Option<String>,
    pub namespace: Option<String>,

    // Search
    pub elasticsearch_host: Option<String>,
    pub elasticsearch_port: Option<u16>,
}

impl fmt::Display for AppConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn show<T: fmt::Display>(value: &Option<T>) -> String {
            value
                .as_ref()
                .map(|v| v.to_string())
                .unwrap_or_else(|| "-".to_string())
        }

        writeln!(f, "Environment:      {}", self.environment)?;
        writeln!(f, "Service port:     {}", self.service_port)?;
        writeln!(f, "Prefix:           {}", self.prefix)?;
        writeln!(f, "Inner URL:        {}", show(&self.inner_url))?;
        writeln!(f, "Default timeout:  {}s", self.default_timeout)?;
        writeln!(
            f,
            "Database:         {}@{}:{}/{}",
            show(&self.user),
            show(&self.host),
            show(&self.port),
            show(&self.name)
        )?;
        writeln!(
            f,
            "Database password: {}",
            if self.password.is_some() { "********" } else { "-" }
        )?;
        writeln!(
            f,
            "Discovery:        {} (namespace: {})",
            show(&self.server_addresses),
            show(&self.namespace)
        )?;
        write!(
            f,
            "Elasticsearch:    {}:{}",
            show(&self.elasticsearch_host),
            show(&self.elasticsearch_port)
        )
    }
}

/// Reads the INI file and resolves the active environment
#[derive(Debug, Clone)]
pub struct ConfigManager {
    path: PathBuf,
    env_override: Option<String>,
    sections: Sections,
}

impl ConfigManager {
    /// Load `path`, taking the environment override from `APP_ENV`
    pub fn load(path: impl Into<PathBuf>) -> ConfigResult<Self> {
        let env_override = env::var("APP_ENV").ok();
        Self::load_with_env(path, env_override)
    }

    /// Load the file named by `STARTER_CONFIG_FILE`, or the default path
    pub fn from_env() -> ConfigResult<Self> {
        let path =
            env::var("STARTER_CONFIG_FILE").unwrap_or_else(|_| DEFAULT_CONFIG_FILE.to_string());
        Self::load(path)
    }

    pub fn load_with_env(
        path: impl Into<PathBuf>,
        env_override: Option<String>,
    ) -> ConfigResult<Self> {
        let path = path.into();
        let sections = read_sections(&path)?;
        Ok(Self {
            path,
            env_override: env_override.filter(|v| !v.trim().is_empty()),
            sections,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Re-read the file; the environment override is kept
    pub fn reload(&mut self) -> ConfigResult<()> {
        self.sections = read_sections(&self.path)?;
        Ok(())
    }

    pub fn current_env(&self) -> String {
        if let Some(env) = &self.env_override {
            return env.trim().to_uppercase();
        }
        self.value(ENV_SECTION, ENV_SECTION)
            .filter(|v| !v.trim().is_empty())
            .map(|v| v.trim().to_uppercase())
            .unwrap_or_else(|| DEFAULT_ENVIRONMENT.to_string())
    }

    /// Raw value lookup, case-insensitive on both names
    pub fn value(&self, section: &str, key: &str) -> Option<&str> {
        self.sections
            .get(&section.to_uppercase())
            .and_then(|s| s.get(&key.to_uppercase()))
            .map(String::as_str)
    }

    /// Every section with its raw values
    pub fn sections(&self) -> &Sections {
        &self.sections
    }

    /// Environment sections and their configured service port
    pub fn environments(&self) -> Vec<(String, Option<String>)> {
        self.sections
            .iter()
            .filter(|(name, _)| name.as_str() != ENV_SECTION)
            .map(|(name, values)| (name.clone(), values.get("SERVICE_PORT").cloned()))
            .collect()
    }

    /// Build the settings of the active environment
    pub fn app_config(&self) -> ConfigResult<AppConfig> {
        let environment = self.current_env();
        let section = self
            .sections
            .get(&environment)
            .ok_or_else(|| ConfigError::MissingEnvironment(environment.clone()))?;
        let reader = SectionReader {
            name: &environment,
            values: section,
        };

        Ok(AppConfig {
            service_port: reader.parse("SERVICE_PORT")?.unwrap_or(8080),
            prefix: reader.text("PREFIX").unwrap_or_else(|| "app".to_string()),
            inner_url: reader.text("INNER_URL"),
            default_timeout: reader.parse("DEFAULT_TIMEOUT")?.unwrap_or(10),
            host: reader.text("HOST"),
            port: reader.parse("PORT")?,
            user: reader.text("USER"),
            password: reader.text("PASSWORD"),
            name: reader.text("NAME"),
            server_addresses: reader.text("SERVER_ADDRESSES"),
            namespace: reader.text("NAMESPACE"),
            elasticsearch_host: reader.text("ELASTICSEARCH_HOST"),
            elasticsearch_port: reader.parse("ELASTICSEARCH_PORT")?,
            environment,
        })
    }
}

///////////////////////////////////////////////////////////////////////////////
//****                       Private Functions                           ****//
///////////////////////////////////////////////////////////////////////////////

struct SectionReader<'a> {
    name: &'a str,
    values: &'a BTreeMap<String, String>,
}

impl SectionReader<'_> {
    /// Non-empty value for `key`
    fn text(&self, key: &str) -> Option<String> {
        self.values
            .get(key)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
            .map(str::to_string)
    }

    fn parse<T: FromStr>(&self, key: &str) -> ConfigResult<Option<T>> {
        match self.text(key) {
            Some(raw) => raw.parse::<T>().map(Some).map_err(|_| ConfigError::InvalidValue {
                section: self.name.to_string(),
                key: key.to_string(),
                value: raw,
            }),
            None => Ok(None),
        }
    }
}

fn read_sections(path: &Path) -> ConfigResult<Sections> {
    if !path.is_file() {
        return Err(ConfigError::NotFound(path.to_path_buf()));
    }

    let raw: BTreeMap<String, BTreeMap<String, String>> = ::config::Config::builder()
        .add_source(::config::File::from(path).format(::config::FileFormat::Ini))
        .build()?
        .try_deserialize()?;

    let mut sections = Sections::new();
    for (name, values) in raw {
        let section = sections.entry(name.to_uppercase()).or_default();
        for (key, value) in values {
            section.insert(key.to_uppercase(), value);
        }
    }
    Ok(sections)
}

///////////////////////////////////////////////////////////////////////////////
//****                              Tests                                ****//
///////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::{TempDir, tempdir};

    const SAMPLE: &str = "\
[ENV]
ENV = prod

[DEMO]
SERVICE_PORT = 8080
PREFIX = demo

[PROD]
SERVICE_PORT = 9090
HOST = db.internal
PORT = 5432
USER = starter
PASSWORD = s3cret
NAME = starter
ELASTICSEARCH_HOST = search.internal
ELASTICSEARCH_PORT = 9200
default_timeout = 30
";

    fn write_config(contents: &str) -> (TempDir, PathBuf) {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.ini");
        fs::write(&path, contents).unwrap();
        (dir, path)
    }

    #[test]
    fn test_env_section_selects_environment() {
        let (_dir, path) = write_config(SAMPLE);
        let manager = ConfigManager::load_with_env(&path, None).unwrap();
        assert_eq!(manager.current_env(), "PROD");

        let config = manager.app_config().unwrap();
        assert_eq!(config.environment, "PROD");
        assert_eq!(config.service_port, 9090);
        assert_eq!(config.port, Some(5432));
        assert_eq!(config.elasticsearch_port, Some(9200));
        assert_eq!(config.default_timeout, 30);
        assert_eq!(config.prefix, "app");
        assert_eq!(config.inner_url, None);
    }

    #[test]
    fn test_override_wins_and_is_upper_cased() {
        let (_dir, path) = write_config(SAMPLE);
        let manager = ConfigManager::load_with_env(&path, Some("demo".to_string())).unwrap();
        let config = manager.app_config().unwrap();
        assert_eq!(config.environment, "DEMO");
        assert_eq!(config.service_port, 8080);
        assert_eq!(config.prefix, "demo");
        assert_eq!(config.host, None);
    }

    #[test]
    fn test_default_environment() {
        let (_dir, path) = write_config("[DEMO]\nSERVICE_PORT = 7000\n");
        let manager = ConfigManager::load_with_env(&path, None).unwrap();
        assert_eq!(manager.current_env(), DEFAULT_ENVIRONMENT);
        assert_eq!(manager.app_config().unwrap().service_port, 7000);
    }

    #[test]
    fn test_missing_file() {
        let dir = tempdir().unwrap();
        let result = ConfigManager::load_with_env(dir.path().join("absent.ini"), None);
        assert!(matches!(result, Err(ConfigError::NotFound(_))));
    }

    #[test]
    fn test_missing_environment_section() {
        let (_dir, path) = write_config(SAMPLE);
        let manager = ConfigManager::load_with_env(&path, Some("staging".to_string())).unwrap();
        match manager.app_config() {
            Err(ConfigError::MissingEnvironment(env)) => assert_eq!(env, "STAGING"),
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_invalid_port_value() {
        let (_dir, path) = write_config("[DEMO]\nSERVICE_PORT = eighty\n");
        let manager = ConfigManager::load_with_env(&path, None).unwrap();
        match manager.app_config() {
            Err(ConfigError::InvalidValue { key, value, .. }) => {
                assert_eq!(key, "SERVICE_PORT");
                assert_eq!(value, "eighty");
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_environments_and_lookup() {
        let (_dir, path) = write_config(SAMPLE);
        let manager = ConfigManager::load_with_env(&path, None).unwrap();
        assert_eq!(
            manager.environments(),
            vec![
                ("DEMO".to_string(), Some("8080".to_string())),
                ("PROD".to_string(), Some("9090".to_string())),
            ]
        );
        assert_eq!(manager.value("prod", "host"), Some("db.internal"));
        assert_eq!(manager.value("prod", "missing"), None);
    }

    #[test]
    fn test_reload_picks_up_changes() {
        let (_dir, path) = write_config("[DEMO]\nSERVICE_PORT = 8000\n");
        let mut manager = ConfigManager::load_with_env(&path, None).unwrap();
        fs::write(&path, "[DEMO]\nSERVICE_PORT = 8001\n").unwrap();
        manager.reload().unwrap();
        assert_eq!(manager.app_config().unwrap().service_port, 8001);
    }

    #[test]
    fn test_display_masks_password() {
        let (_dir, path) = write_config(SAMPLE);
        let manager = ConfigManager::load_with_env(&path, None).unwrap();
        let shown = manager.app_config().unwrap().to_string();
        assert!(shown.contains("********"));
        assert!(!shown.contains("s3cret"));
    }
}
