//! One trust domain's CA and host material, and the load-or-create cascade
//! that provisions it.

use std::fmt;
use std::path::Path;

use time::Duration;
use tracing::{debug, info, info_span};

use super::locator::SlotPaths;
use super::provider::CaProvider;
use super::slot::{HostIdentity, ServiceConfig, Slot, CA_COMMON_NAME};
use super::store::{CredentialStore, FileMode, WritePolicy};
use crate::errors::{AutoTlsError, Operation, Result, StoreError};

/// Everything a slot operation reads and writes through.
pub struct SlotHandle<'a> {
    pub slot: Slot,
    pub paths: SlotPaths,
    pub store: &'a dyn CredentialStore,
    pub provider: &'a dyn CaProvider,
}

impl SlotHandle<'_> {
    fn write(
        &self,
        path: &Path,
        contents: &[u8],
        mode: FileMode,
        policy: WritePolicy,
        operation: Operation,
    ) -> Result<()> {
        self.store
            .store(path, contents, mode, policy)
            .map_err(|e| AutoTlsError::store(self.slot, operation, e))
    }

    pub(crate) fn exists(&self, path: &Path, operation: Operation) -> Result<bool> {
        self.store.exists(path).map_err(|e| AutoTlsError::store(self.slot, operation, e))
    }

    fn inconsistent(
        &self,
        operation: Operation,
        present: &Path,
        missing: &Path,
        source: Option<StoreError>,
    ) -> AutoTlsError {
        AutoTlsError::InconsistentPair {
            slot: self.slot,
            operation,
            present: present.to_path_buf(),
            missing: missing.to_path_buf(),
            source,
        }
    }

    /// Load a cert/key pair. A missing certificate is `None` unless its key
    /// is lying around on its own.
    fn load_pair(
        &self,
        cert_path: &Path,
        key_path: &Path,
        operation: Operation,
    ) -> Result<Option<(Vec<u8>, Vec<u8>)>> {
        let cert = match self.store.load(cert_path) {
            Ok(cert) => cert,
            Err(e) if e.is_not_found() => {
                if self.exists(key_path, operation)? {
                    return Err(self.inconsistent(operation, key_path, cert_path, None));
                }
                return Ok(None);
            }
            Err(e) => return Err(AutoTlsError::store(self.slot, operation, e)),
        };

        debug!(path = %key_path.display(), "found; loading key");
        match self.store.load(key_path) {
            Ok(key) => Ok(Some((cert, key))),
            Err(e) => Err(self.inconsistent(operation, cert_path, key_path, Some(e))),
        }
    }
}

/// Result of a best-effort load.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    Loaded,
    Absent,
}

/// PEM material of one slot. Any field may be empty until loaded or created.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct ServiceCertificateBundle {
    pub ca_certificate: Option<Vec<u8>>,
    pub ca_key: Option<Vec<u8>>,
    pub host_certificate: Option<Vec<u8>>,
    pub host_key: Option<Vec<u8>>,
}

impl fmt::Debug for ServiceCertificateBundle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let presence = |field: &Option<Vec<u8>>| if field.is_some() { "present" } else { "absent" };
        f.debug_struct("ServiceCertificateBundle")
            .field("ca_certificate", &presence(&self.ca_certificate))
            .field("ca_key", &presence(&self.ca_key))
            .field("host_certificate", &presence(&self.host_certificate))
            .field("host_key", &presence(&self.host_key))
            .finish()
    }
}

impl ServiceCertificateBundle {
    /// Bundle carrying only CA material, as received from a cluster member.
    pub fn with_ca(ca_certificate: Vec<u8>, ca_key: Vec<u8>) -> Self {
        Self { ca_certificate: Some(ca_certificate), ca_key: Some(ca_key), ..Self::default() }
    }

    pub fn has_ca(&self) -> bool {
        self.ca_certificate.is_some() && self.ca_key.is_some()
    }

    pub fn is_provisioned(&self) -> bool {
        self.has_ca() && self.host_certificate.is_some() && self.host_key.is_some()
    }

    /// Load the host certificate and key.
    ///
    /// A missing certificate is reported as [`LoadOutcome::Absent`]. A
    /// certificate whose key cannot be read, or a key without its
    /// certificate, is an `InconsistentPair` and is never repaired.
    pub fn load_host_pair(&mut self, handle: &SlotHandle<'_>) -> Result<LoadOutcome> {
        let paths = &handle.paths;
        info!(path = %paths.host_cert.display(), "attempting to load service cert");
        match handle.load_pair(&paths.host_cert, &paths.host_key, Operation::LoadHostPair)? {
            Some((cert, key)) => {
                self.host_certificate = Some(cert);
                self.host_key = Some(key);
                Ok(LoadOutcome::Loaded)
            }
            None => Ok(LoadOutcome::Absent),
        }
    }

    /// Load the CA certificate and key if present. Any failure other than a
    /// clean not-found on the certificate is fatal.
    pub fn load_ca_if_exists(&mut self, handle: &SlotHandle<'_>) -> Result<LoadOutcome> {
        let paths = &handle.paths;
        info!(path = %paths.ca_cert.display(), "attempting to load CA cert");
        match handle.load_pair(&paths.ca_cert, &paths.ca_key, Operation::LoadCa)? {
            Some((cert, key)) => {
                self.ca_certificate = Some(cert);
                self.ca_key = Some(key);
                Ok(LoadOutcome::Loaded)
            }
            None => Ok(LoadOutcome::Absent),
        }
    }

    /// Generate a new self-signed CA and persist it. Never overwrites.
    pub fn create_ca(
        &mut self,
        handle: &SlotHandle<'_>,
        lifetime: Duration,
        common_name: &str,
    ) -> Result<()> {
        let _span = info_span!("auto_create_ca").entered();
        let operation = Operation::CreateCa;

        let pair = handle
            .provider
            .create_ca(lifetime, common_name)
            .map_err(|e| AutoTlsError::crypto(handle.slot, operation, e))?;

        info!(path = %handle.paths.ca_cert.display(), "writing CA cert");
        handle.write(
            &handle.paths.ca_cert,
            &pair.cert,
            FileMode::Certificate,
            WritePolicy::CreateNew,
            operation,
        )?;

        info!(path = %handle.paths.ca_key.display(), "writing CA key");
        handle.write(
            &handle.paths.ca_key,
            &pair.key,
            FileMode::PrivateKey,
            WritePolicy::CreateNew,
            operation,
        )?;

        self.ca_certificate = Some(pair.cert);
        self.ca_key = Some(pair.key);
        Ok(())
    }

    /// Sign a new host pair with the loaded CA and persist it under `policy`.
    pub fn issue_host_cert(
        &mut self,
        handle: &SlotHandle<'_>,
        lifetime: Duration,
        identity: &HostIdentity,
        policy: WritePolicy,
        operation: Operation,
    ) -> Result<()> {
        let slot = handle.slot;
        let (Some(ca_cert), Some(ca_key)) = (&self.ca_certificate, &self.ca_key) else {
            return Err(AutoTlsError::CaNotLoaded { slot, operation });
        };

        let chain = handle
            .provider
            .parse_certificates(ca_cert)
            .map_err(|e| AutoTlsError::crypto(slot, operation, e))?;
        if let Some(issuer) = chain.first() {
            if !issuer.is_ca {
                return Err(AutoTlsError::crypto(
                    slot,
                    operation,
                    crate::errors::ProviderError::NotCa { subject: issuer.subject.clone() },
                ));
            }
            debug!(issuer = %issuer.subject, not_after = %issuer.not_after, "signing with CA");
        }

        let pair = handle
            .provider
            .create_leaf_cert(
                lifetime,
                &identity.common_name,
                &identity.hostnames,
                ca_cert,
                ca_key,
                identity.dual_use,
            )
            .map_err(|e| AutoTlsError::crypto(slot, operation, e))?;

        info!(path = %handle.paths.host_cert.display(), "writing service cert");
        handle.write(&handle.paths.host_cert, &pair.cert, FileMode::Certificate, policy, operation)?;

        info!(path = %handle.paths.host_key.display(), "writing service key");
        handle.write(&handle.paths.host_key, &pair.key, FileMode::PrivateKey, policy, operation)?;

        self.host_certificate = Some(pair.cert);
        self.host_key = Some(pair.key);
        Ok(())
    }

    /// Load the host pair or provision it:
    ///
    /// 1. host cert and key present: done, nothing written;
    /// 2. otherwise load the CA, creating one if it does not exist;
    /// 3. issue a host pair for `identity` signed by that CA.
    pub fn load_or_create(
        &mut self,
        handle: &SlotHandle<'_>,
        config: &ServiceConfig,
        identity: &HostIdentity,
    ) -> Result<()> {
        let _span = info_span!("service_certs", service = config.label).entered();

        if self.load_host_pair(handle)? == LoadOutcome::Loaded {
            info!("service cert is ready");
            return Ok(());
        }
        info!("not found; will attempt auto-creation");

        if self.load_ca_if_exists(handle)? == LoadOutcome::Absent {
            info!("CA cert does not exist, auto-creating");
            self.create_ca(handle, config.ca_lifetime, CA_COMMON_NAME)?;
        }

        self.issue_host_cert(
            handle,
            config.leaf_lifetime,
            identity,
            WritePolicy::CreateNew,
            Operation::IssueHostCert,
        )
    }

    /// Fail with `AlreadyExists` if either CA target is occupied.
    pub fn ensure_ca_targets_free(&self, handle: &SlotHandle<'_>) -> Result<()> {
        for path in [&handle.paths.ca_cert, &handle.paths.ca_key] {
            if handle.exists(path, Operation::WriteCaOnly)? {
                return Err(AutoTlsError::AlreadyExists {
                    slot: handle.slot,
                    operation: Operation::WriteCaOnly,
                    path: path.clone(),
                });
            }
        }
        Ok(())
    }

    /// The supplied CA pair, `None` if no CA was supplied. Half a CA is an
    /// `InconsistentPair`.
    fn supplied_ca(&self, handle: &SlotHandle<'_>) -> Result<Option<(&[u8], &[u8])>> {
        let operation = Operation::WriteCaOnly;
        let paths = &handle.paths;
        match (&self.ca_certificate, &self.ca_key) {
            (None, None) => Ok(None),
            (Some(cert), Some(key)) => Ok(Some((cert.as_slice(), key.as_slice()))),
            (Some(_), None) => {
                Err(handle.inconsistent(operation, &paths.ca_cert, &paths.ca_key, None))
            }
            (None, Some(_)) => {
                Err(handle.inconsistent(operation, &paths.ca_key, &paths.ca_cert, None))
            }
        }
    }

    /// Check that [`write_ca_only`](Self::write_ca_only) would succeed
    /// without writing anything.
    pub fn check_ca_writable(&self, handle: &SlotHandle<'_>) -> Result<()> {
        if self.supplied_ca(handle)?.is_some() {
            self.ensure_ca_targets_free(handle)?;
        }
        Ok(())
    }

    /// Persist only the CA half, never overwriting. A bundle without CA
    /// material writes nothing.
    pub fn write_ca_only(&self, handle: &SlotHandle<'_>) -> Result<()> {
        let operation = Operation::WriteCaOnly;
        let paths = &handle.paths;
        let Some((cert, key)) = self.supplied_ca(handle)? else {
            debug!(slot = %handle.slot, "no CA supplied; leaving slot to local creation");
            return Ok(());
        };

        self.ensure_ca_targets_free(handle)?;

        info!(path = %paths.ca_cert.display(), "writing received CA cert");
        handle.write(&paths.ca_cert, cert, FileMode::Certificate, WritePolicy::CreateNew, operation)?;
        info!(path = %paths.ca_key.display(), "writing received CA key");
        handle.write(&paths.ca_key, key, FileMode::PrivateKey, WritePolicy::CreateNew, operation)
    }

    /// Replace the host pair with a freshly signed one. The CA is untouched;
    /// both host files must already exist.
    pub fn rotate_host_cert(
        &mut self,
        handle: &SlotHandle<'_>,
        lifetime: Duration,
        identity: &HostIdentity,
    ) -> Result<()> {
        let _span = info_span!("service_certs", service = handle.slot.config().label).entered();
        let operation = Operation::RotateHostCert;

        if !self.has_ca() {
            return Err(AutoTlsError::CaNotLoaded { slot: handle.slot, operation });
        }
        for path in [&handle.paths.host_cert, &handle.paths.host_key] {
            if !handle.exists(path, operation)? {
                return Err(AutoTlsError::store(
                    handle.slot,
                    operation,
                    StoreError::NotFound { path: path.clone() },
                ));
            }
        }

        info!("rotating service cert");
        self.issue_host_cert(handle, lifetime, identity, WritePolicy::Replace, operation)
    }
}
