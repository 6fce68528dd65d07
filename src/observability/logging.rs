//! # Structured Logging
//!
//! Subscriber setup for the `autotls` binary. The library only emits
//! `tracing` events; installing a subscriber is left to the caller.

use tracing_subscriber::{EnvFilter, FmtSubscriber};

use crate::config::TlsInitConfig;

/// Install a global fmt subscriber filtered by `RUST_LOG`, falling back to
/// `debug` when `verbose` is set and `info` otherwise.
///
/// A subscriber installed earlier (for instance by a test harness) is left
/// in place.
pub fn init_logging(verbose: bool, json: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let result = if json {
        tracing::subscriber::set_global_default(
            FmtSubscriber::builder().with_env_filter(filter).json().finish(),
        )
    } else {
        tracing::subscriber::set_global_default(
            FmtSubscriber::builder().with_env_filter(filter).with_target(false).finish(),
        )
    };
    if result.is_err() {
        // Subscriber already set elsewhere; ignore.
    }
}

/// Log configuration at startup
pub fn log_config_info(config: &TlsInitConfig) {
    let addresses = &config.addresses;
    tracing::info!(
        certs_dir = %config.certs_dir.display(),
        listen_addr = %addresses.listen_addr,
        advertise_addr = ?addresses.advertise_addr,
        split_listen_sql = addresses.split_listen_sql,
        sql_addr = ?addresses.sql_addr,
        http_addr = %addresses.http_addr,
        http_advertise_addr = ?addresses.http_advertise_addr,
        "certificate initialization configuration"
    );
}
