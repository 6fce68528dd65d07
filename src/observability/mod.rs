//! # Observability Infrastructure
//!
//! Structured logging for the certificate tooling.

pub mod logging;

pub use logging::{init_logging, log_config_info};
