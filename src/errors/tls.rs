use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

/// Failures surfaced by a credential store while reading or writing PEM files.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Nothing is stored at the path. Expected on the create branch of the
    /// load-or-create cascade.
    #[error("no file at {path}")]
    NotFound { path: PathBuf },

    /// A write-once store was attempted over an existing file.
    #[error("refusing to overwrite existing file at {path}")]
    AlreadyExists { path: PathBuf },

    /// The store denied access to the path.
    #[error("permission denied on {path}")]
    PermissionDenied { path: PathBuf },

    /// Any other read or write failure.
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl StoreError {
    /// Classify an I/O error raised while accessing `path`.
    pub fn from_io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        let path = path.into();
        match source.kind() {
            io::ErrorKind::NotFound => Self::NotFound { path },
            io::ErrorKind::AlreadyExists => Self::AlreadyExists { path },
            io::ErrorKind::PermissionDenied => Self::PermissionDenied { path },
            _ => Self::Io { path, source },
        }
    }

    pub fn path(&self) -> &Path {
        match self {
            Self::NotFound { path }
            | Self::AlreadyExists { path }
            | Self::PermissionDenied { path }
            | Self::Io { path, .. } => path,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

/// Failures surfaced by a CA provider while generating, signing or parsing
/// certificate material.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("key generation failed: {0}")]
    KeyGeneration(String),

    #[error("certificate signing failed: {0}")]
    Signing(String),

    #[error("invalid PEM data: {0}")]
    InvalidPem(String),

    #[error("PEM data does not contain any certificates")]
    EmptyChain,

    /// The issuing certificate is not marked as a certificate authority.
    #[error("certificate {subject:?} is not a CA certificate")]
    NotCa { subject: String },

    #[error("invalid subject alternative name {name:?}: {reason}")]
    InvalidHostname { name: String, reason: String },
}

impl From<rcgen::Error> for ProviderError {
    fn from(error: rcgen::Error) -> Self {
        Self::Signing(error.to_string())
    }
}
