//! # Error Handling
//!
//! Error types for certificate bootstrap, transfer and rotation, defined with
//! `thiserror`.
//!
//! Collaborator failures are reported with their own enums ([`StoreError`],
//! [`ProviderError`]) and annotated with the slot and operation in progress
//! when they cross into [`AutoTlsError`].

pub mod tls;
pub mod types;

pub use tls::{ProviderError, StoreError};
pub use types::{AutoTlsError, ErrorKind, Operation};

/// Custom result type for autotls operations
pub type Result<T> = std::result::Result<T, AutoTlsError>;

/// Crate-wide error alias.
pub type Error = AutoTlsError;
