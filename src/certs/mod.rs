//! # Node certificates
//!
//! Provisions the five trust domains of a node. Each [`Slot`] owns a CA and a
//! host certificate/key pair stored as PEM in the certs directory.
//!
//! - [`CertificateBundle::bootstrap`] loads or creates everything on first
//!   start.
//! - [`CertificateBundle::collect_local_bundle`] and
//!   [`CertificateBundle::receive_bundle`] copy CAs to a joining node.
//! - [`CertificateBundle::rotate`] re-issues host certificates in place.

pub mod addresses;
pub mod bundle;
pub mod locator;
pub mod provider;
pub mod service;
pub mod slot;
pub mod store;
pub mod transfer;

pub use addresses::{extract_hostnames, AddressConfig, HostSets};
pub use bundle::{CertificateBundle, SlotStatus, TlsContext};
pub use locator::{CertsLocator, PathResolver, SlotPaths};
pub use provider::{CaProvider, CertificateInfo, PemPair, RcgenCaProvider};
pub use service::{LoadOutcome, ServiceCertificateBundle, SlotHandle};
pub use slot::{
    HostIdentity, HostnamePolicy, ServiceConfig, Slot, CA_COMMON_NAME, DEFAULT_CA_LIFETIME,
    DEFAULT_CERT_LIFETIME, NODE_USER,
};
pub use store::{CredentialStore, FileMode, FsCredentialStore, MemoryCredentialStore, WritePolicy};
pub use transfer::{CaTransferPayload, TransferredCa};
