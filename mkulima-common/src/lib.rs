//! Mkulima Common - Shared types, utilities, and configuration for the
//! MkulimaMkononi gateway.
//!
//! This crate provides:
//! - Configuration types and loading (JSON file, `.env`, environment)
//! - The unified error taxonomy used by providers and flow handlers
//! - Logging setup and structured logging helpers
//! - Small string utilities shared by the USSD and SMS paths

#![warn(clippy::all)]
#![allow(clippy::pedantic)]

pub mod config;
pub mod error;
pub mod logging;
pub mod util;

pub use config::{
    AiConfig, Config, FeatureStatus, HttpConfig, ObservabilityConfig, ServerConfig,
    SessionConfig, SmsConfig, StoreLocatorConfig, WeatherConfig,
};
pub use error::{Error, Result};

/// Re-export commonly used types for convenience
pub mod prelude {
    pub use crate::config::Config;
    pub use crate::error::{Error, Result};
    pub use crate::logging::init_logging;
}
