//! # autotls
//!
//! Automatic TLS provisioning for a cluster node. On first start the node
//! creates one CA and one host certificate for each of its five trust
//! domains; later it can rotate the host certificates in place, and a
//! joining node can be seeded with an existing member's CAs so that the
//! whole cluster shares a trust root.
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use autotls::certs::{
//!     AddressConfig, CertificateBundle, CertsLocator, FsCredentialStore, RcgenCaProvider,
//!     TlsContext,
//! };
//!
//! fn main() -> autotls::Result<()> {
//!     let store = FsCredentialStore;
//!     let ctx = TlsContext::new("certs", &store, &RcgenCaProvider, &CertsLocator);
//!     CertificateBundle::default().bootstrap(&ctx, &AddressConfig::default())
//! }
//! ```

pub mod certs;
pub mod cli;
pub mod config;
pub mod errors;
pub mod observability;

// Re-export commonly used types and traits
pub use certs::{CertificateBundle, Slot, TlsContext};
pub use config::TlsInitConfig;
pub use errors::{AutoTlsError, Error, ErrorKind, Result};

/// Application version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name from Cargo.toml
pub const APP_NAME: &str = env!("CARGO_PKG_NAME");
