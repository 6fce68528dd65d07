//! Node-level certificate workflows over the five service slots:
//! bootstrap, join from a received CA bundle, CA collection and rotation.

use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{info, warn};

use super::addresses::{AddressConfig, HostSets};
use super::locator::PathResolver;
use super::provider::{CaProvider, CertificateInfo};
use super::service::{LoadOutcome, ServiceCertificateBundle, SlotHandle};
use super::slot::Slot;
use super::store::CredentialStore;
use crate::errors::{AutoTlsError, Operation, Result};

/// The certs directory and the collaborators used to reach it.
pub struct TlsContext<'a> {
    certs_dir: PathBuf,
    store: &'a dyn CredentialStore,
    provider: &'a dyn CaProvider,
    resolver: &'a dyn PathResolver,
}

impl<'a> TlsContext<'a> {
    pub fn new(
        certs_dir: impl Into<PathBuf>,
        store: &'a dyn CredentialStore,
        provider: &'a dyn CaProvider,
        resolver: &'a dyn PathResolver,
    ) -> Self {
        Self { certs_dir: certs_dir.into(), store, provider, resolver }
    }

    pub fn certs_dir(&self) -> &Path {
        &self.certs_dir
    }

    pub fn slot(&self, slot: Slot) -> SlotHandle<'a> {
        SlotHandle {
            slot,
            paths: self.resolver.resolve(&self.certs_dir, slot),
            store: self.store,
            provider: self.provider,
        }
    }

    fn ensure_certs_dir(&self) -> Result<()> {
        self.store
            .ensure_dir(&self.certs_dir)
            .map_err(|source| AutoTlsError::CertsDirectory { source })
    }
}

/// Certificates of all five slots. Constructed fresh for each workflow.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CertificateBundle {
    slots: [ServiceCertificateBundle; 5],
}

impl CertificateBundle {
    pub fn get(&self, slot: Slot) -> &ServiceCertificateBundle {
        &self.slots[slot.index()]
    }

    pub fn get_mut(&mut self, slot: Slot) -> &mut ServiceCertificateBundle {
        &mut self.slots[slot.index()]
    }

    pub fn iter(&self) -> impl Iterator<Item = (Slot, &ServiceCertificateBundle)> {
        Slot::ALL.into_iter().map(move |slot| (slot, self.get(slot)))
    }

    /// Refuse to initialize a node that already has an inter-node host
    /// certificate. Shared by [`bootstrap`](Self::bootstrap) and
    /// [`receive_bundle`](Self::receive_bundle).
    pub fn ensure_uninitialized(ctx: &TlsContext<'_>) -> Result<()> {
        let handle = ctx.slot(Slot::InterNode);
        let operation = Operation::CheckInitialized;
        let paths = &handle.paths;

        if !handle.exists(&paths.host_cert, operation)? {
            return Ok(());
        }
        if handle.exists(&paths.host_key, operation)? {
            return Err(AutoTlsError::AlreadyInitialized { path: paths.host_cert.clone() });
        }
        Err(AutoTlsError::InconsistentPair {
            slot: Slot::InterNode,
            operation,
            present: paths.host_cert.clone(),
            missing: paths.host_key.clone(),
            source: None,
        })
    }

    /// Load or create every slot's CA and host pair, in slot order.
    ///
    /// Fails without writing anything if the node is already initialized or
    /// an address is malformed. The first failing slot aborts the call;
    /// slots before it stay on disk.
    pub fn bootstrap(&mut self, ctx: &TlsContext<'_>, addresses: &AddressConfig) -> Result<()> {
        Self::ensure_uninitialized(ctx)?;
        let hosts = addresses.host_sets()?;

        info!(certs_dir = %ctx.certs_dir().display(), "initializing node certificates");
        ctx.ensure_certs_dir()?;
        self.initialize_slots(ctx, &hosts)?;
        info!("node certificates ready");
        Ok(())
    }

    fn initialize_slots(&mut self, ctx: &TlsContext<'_>, hosts: &HostSets) -> Result<()> {
        for slot in Slot::ALL {
            let config = slot.config();
            let identity = config.identity(hosts)?;
            self.get_mut(slot).load_or_create(&ctx.slot(slot), &config, &identity)?;
        }
        Ok(())
    }

    /// Join a cluster with the CA material held by `self`.
    ///
    /// Writes each supplied CA without overwriting, then bootstraps so host
    /// certificates are issued locally by those CAs. No node-specific key
    /// ever travels between nodes.
    pub fn receive_bundle(&mut self, ctx: &TlsContext<'_>, addresses: &AddressConfig) -> Result<()> {
        Self::ensure_uninitialized(ctx)?;
        addresses.host_sets()?;

        for (slot, service) in self.iter() {
            service.check_ca_writable(&ctx.slot(slot))?;
        }

        ctx.ensure_certs_dir()?;
        for (slot, service) in self.iter() {
            service.write_ca_only(&ctx.slot(slot))?;
        }

        info!("received CAs written; issuing host certificates");
        self.bootstrap(ctx, addresses)
    }

    /// Read whichever CA halves exist on disk. Missing CAs are left empty;
    /// nothing is generated and host material is never read.
    pub fn collect_local_bundle(ctx: &TlsContext<'_>) -> Result<Self> {
        let mut bundle = Self::default();
        for slot in Slot::ALL {
            let outcome = bundle.get_mut(slot).load_ca_if_exists(&ctx.slot(slot))?;
            if outcome == LoadOutcome::Absent {
                warn!(service = slot.config().label, "CA not found; slot left empty");
            }
        }
        Ok(bundle)
    }

    /// Replace the host pair of every slot that has a CA. Returns the slots
    /// that were rotated.
    ///
    /// Stops at the first failure; slots rotated before it keep their new
    /// material, and a rerun rotates everything again.
    pub fn rotate(ctx: &TlsContext<'_>, addresses: &AddressConfig) -> Result<Vec<Slot>> {
        let mut bundle = Self::collect_local_bundle(ctx)?;
        let hosts = addresses.host_sets()?;

        let mut rotated = Vec::new();
        for slot in Slot::ALL {
            let service = bundle.get_mut(slot);
            let config = slot.config();
            if !service.has_ca() {
                info!(service = config.label, "no CA found; skipping rotation");
                continue;
            }
            let identity = config.identity(&hosts)?;
            service.rotate_host_cert(&ctx.slot(slot), config.leaf_lifetime, &identity)?;
            rotated.push(slot);
        }
        Ok(rotated)
    }

    /// Report which files exist for every slot, with the host certificate's
    /// subject and validity when present. A host certificate that does not
    /// parse is reported without details.
    pub fn status(ctx: &TlsContext<'_>) -> Result<Vec<SlotStatus>> {
        let operation = Operation::Inspect;
        let mut report = Vec::with_capacity(Slot::ALL.len());

        for slot in Slot::ALL {
            let handle = ctx.slot(slot);
            let paths = &handle.paths;
            let host_cert = handle.exists(&paths.host_cert, operation)?;

            let host_certificate = if host_cert {
                let pem = handle
                    .store
                    .load(&paths.host_cert)
                    .map_err(|e| AutoTlsError::store(slot, operation, e))?;
                match handle.provider.parse_certificates(&pem) {
                    Ok(chain) => chain.into_iter().next(),
                    Err(error) => {
                        warn!(
                            service = slot.config().label,
                            %error,
                            "host certificate cannot be parsed"
                        );
                        None
                    }
                }
            } else {
                None
            };

            report.push(SlotStatus {
                slot,
                ca_cert: handle.exists(&paths.ca_cert, operation)?,
                ca_key: handle.exists(&paths.ca_key, operation)?,
                host_cert,
                host_key: handle.exists(&paths.host_key, operation)?,
                host_certificate,
            });
        }
        Ok(report)
    }
}

/// Presence of a slot's files on disk.
#[derive(Debug, Clone, Serialize)]
pub struct SlotStatus {
    pub slot: Slot,
    pub ca_cert: bool,
    pub ca_key: bool,
    pub host_cert: bool,
    pub host_key: bool,
    pub host_certificate: Option<CertificateInfo>,
}

impl SlotStatus {
    pub fn is_provisioned(&self) -> bool {
        self.ca_cert && self.ca_key && self.host_cert && self.host_key
    }
}
