//! Shared utilities for the market brief workspace
//!
//! This crate provides common functionality used across the workspace,
//! including logging setup and environment-driven configuration helpers.

pub mod config;
pub mod logging;

pub use config::{ConfigError, env_list, env_or, env_parse};
pub use logging::{LogFormat, init_tracing, init_tracing_with};
