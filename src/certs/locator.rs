//! Canonical file locations of each slot's material inside the certs
//! directory.

use std::path::{Path, PathBuf};

use super::slot::Slot;

/// The four files of one slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlotPaths {
    pub ca_cert: PathBuf,
    pub ca_key: PathBuf,
    pub host_cert: PathBuf,
    pub host_key: PathBuf,
}

/// Maps a certs directory and a slot to file paths.
pub trait PathResolver {
    fn resolve(&self, certs_dir: &Path, slot: Slot) -> SlotPaths;
}

/// Fixed file naming used by the node's TLS stack.
#[derive(Debug, Clone, Copy, Default)]
pub struct CertsLocator;

impl CertsLocator {
    /// `(CA base name, host base name)` of a slot; `.crt` and `.key` are
    /// appended.
    fn base_names(slot: Slot) -> (&'static str, &'static str) {
        match slot {
            Slot::InterNode => ("ca", "node"),
            Slot::UserAuth => ("ca-client", "client.node"),
            Slot::SqlService => ("ca-sql-service", "sql-service"),
            Slot::RpcService => ("ca-rpc-service", "rpc-service"),
            Slot::AdminUiService => ("ca-ui", "ui"),
        }
    }
}

impl PathResolver for CertsLocator {
    fn resolve(&self, certs_dir: &Path, slot: Slot) -> SlotPaths {
        let (ca, host) = Self::base_names(slot);
        SlotPaths {
            ca_cert: certs_dir.join(format!("{ca}.crt")),
            ca_key: certs_dir.join(format!("{ca}.key")),
            host_cert: certs_dir.join(format!("{host}.crt")),
            host_key: certs_dir.join(format!("{host}.key")),
        }
    }
}
