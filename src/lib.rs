//! # API Starter
//!
//! A web API starter built around a structured logging subsystem: content
//! sanitization, fixed-width line formatting, per-module loggers and rotating
//! console/file/error-file destinations.
//!
//! ## Modules
//!
//! - [`logging`]: sanitizer, formatter, registry, sinks and rotation
//! - [`config`]: per-environment INI application config
//! - [`env`]: environment variable validation
//! - [`server`]: axum router and graceful shutdown
//! - [`cli`]: command-line entry points

pub mod banner;
pub mod cli;
pub mod config;
pub mod env;
pub mod logging;
pub mod server;
