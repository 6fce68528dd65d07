//! # Error Types
//!
//! The crate error and the classification callers match on.

use std::fmt;
use std::path::PathBuf;

use super::tls::{ProviderError, StoreError};
use crate::certs::Slot;

/// Step of a certificate workflow an error was raised from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    CheckInitialized,
    LoadHostPair,
    LoadCa,
    CreateCa,
    IssueHostCert,
    WriteCaOnly,
    RotateHostCert,
    Inspect,
}

impl Operation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CheckInitialized => "check initialized",
            Self::LoadHostPair => "load host pair",
            Self::LoadCa => "load CA",
            Self::CreateCa => "create CA",
            Self::IssueHostCert => "issue host certificate",
            Self::WriteCaOnly => "write CA",
            Self::RotateHostCert => "rotate host certificate",
            Self::Inspect => "inspect",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Coarse classification of an [`AutoTlsError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    AlreadyExists,
    Io,
    PermissionDenied,
    InconsistentPair,
    InvalidAddress,
    AlreadyInitialized,
    Crypto,
    CaNotLoaded,
    Config,
    Transfer,
}

/// Main error type for certificate workflows
#[derive(thiserror::Error, Debug)]
pub enum AutoTlsError {
    /// The node already holds an inter-node certificate; bootstrapping again
    /// could silently change its cluster identity.
    #[error("node already initialized: inter-node certificate present at {path}")]
    AlreadyInitialized { path: PathBuf },

    /// A write-once path was already occupied.
    #[error("{slot} {operation}: file already exists at {path}")]
    AlreadyExists {
        slot: Slot,
        operation: Operation,
        path: PathBuf,
    },

    #[error("{slot} {operation}: permission denied on {path}")]
    PermissionDenied {
        slot: Slot,
        operation: Operation,
        path: PathBuf,
    },

    #[error("{slot} {operation}: {source}")]
    Io {
        slot: Slot,
        operation: Operation,
        #[source]
        source: StoreError,
    },

    /// A certificate without its key, or a key without its certificate.
    /// Requires operator intervention.
    #[error("{slot} {operation}: found {present} but not a readable {missing}")]
    InconsistentPair {
        slot: Slot,
        operation: Operation,
        present: PathBuf,
        missing: PathBuf,
        #[source]
        source: Option<StoreError>,
    },

    /// Failure creating or preparing the certificates directory.
    #[error("failed to prepare certificates directory: {source}")]
    CertsDirectory {
        #[source]
        source: StoreError,
    },

    #[error("invalid address {address:?}: {reason}")]
    InvalidAddress { address: String, reason: String },

    #[error("{slot} {operation}: {source}")]
    Crypto {
        slot: Slot,
        operation: Operation,
        #[source]
        source: ProviderError,
    },

    #[error("{slot} {operation}: no CA loaded to sign with")]
    CaNotLoaded { slot: Slot, operation: Operation },

    /// Configuration errors
    #[error("Configuration error: {message}")]
    Config {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("malformed transfer payload: {0}")]
    Transfer(String),
}

impl AutoTlsError {
    /// Annotate a credential store failure with the slot and operation.
    pub fn store(slot: Slot, operation: Operation, source: StoreError) -> Self {
        match source {
            StoreError::AlreadyExists { path } => Self::AlreadyExists { slot, operation, path },
            StoreError::PermissionDenied { path } => Self::PermissionDenied { slot, operation, path },
            source => Self::Io { slot, operation, source },
        }
    }

    /// Annotate a provider failure with the slot and operation.
    pub fn crypto(slot: Slot, operation: Operation, source: ProviderError) -> Self {
        Self::Crypto { slot, operation, source }
    }

    pub fn invalid_address<A: Into<String>, R: Into<String>>(address: A, reason: R) -> Self {
        Self::InvalidAddress { address: address.into(), reason: reason.into() }
    }

    /// Create a new configuration error
    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Config { message: message.into(), source: None }
    }

    /// Create a configuration error with source
    pub fn config_with_source<S: Into<String>>(
        message: S,
        source: Box<dyn std::error::Error + Send + Sync>,
    ) -> Self {
        Self::Config { message: message.into(), source: Some(source) }
    }

    pub fn transfer<S: Into<String>>(message: S) -> Self {
        Self::Transfer(message.into())
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::AlreadyInitialized { .. } => ErrorKind::AlreadyInitialized,
            Self::AlreadyExists { .. } => ErrorKind::AlreadyExists,
            Self::PermissionDenied { .. } => ErrorKind::PermissionDenied,
            Self::Io { source, .. } | Self::CertsDirectory { source } => match source {
                StoreError::NotFound { .. } => ErrorKind::NotFound,
                StoreError::AlreadyExists { .. } => ErrorKind::AlreadyExists,
                StoreError::PermissionDenied { .. } => ErrorKind::PermissionDenied,
                StoreError::Io { .. } => ErrorKind::Io,
            },
            Self::InconsistentPair { .. } => ErrorKind::InconsistentPair,
            Self::InvalidAddress { .. } => ErrorKind::InvalidAddress,
            Self::Crypto { .. } => ErrorKind::Crypto,
            Self::CaNotLoaded { .. } => ErrorKind::CaNotLoaded,
            Self::Config { .. } => ErrorKind::Config,
            Self::Transfer(_) => ErrorKind::Transfer,
        }
    }

    /// Slot the failing operation was working on, if any.
    pub fn slot(&self) -> Option<Slot> {
        match self {
            Self::AlreadyExists { slot, .. }
            | Self::PermissionDenied { slot, .. }
            | Self::Io { slot, .. }
            | Self::InconsistentPair { slot, .. }
            | Self::Crypto { slot, .. }
            | Self::CaNotLoaded { slot, .. } => Some(*slot),
            Self::AlreadyInitialized { .. } => Some(Slot::InterNode),
            _ => None,
        }
    }

    pub fn operation(&self) -> Option<Operation> {
        match self {
            Self::AlreadyExists { operation, .. }
            | Self::PermissionDenied { operation, .. }
            | Self::Io { operation, .. }
            | Self::InconsistentPair { operation, .. }
            | Self::Crypto { operation, .. }
            | Self::CaNotLoaded { operation, .. } => Some(*operation),
            Self::AlreadyInitialized { .. } => Some(Operation::CheckInitialized),
            _ => None,
        }
    }
}

impl From<validator::ValidationErrors> for AutoTlsError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let message = errors.to_string();
        Self::config_with_source(format!("Validation failed: {}", message), Box::new(errors))
    }
}
