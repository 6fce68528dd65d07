use std::collections::BTreeMap;
use std::fs;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::path::PathBuf;

use anyhow::{anyhow, Context};
use autotls::certs::{
    AddressConfig, CertificateBundle, CertsLocator, FsCredentialStore, PathResolver,
    RcgenCaProvider, Slot, SlotPaths, TlsContext,
};
use tempfile::TempDir;
use x509_parser::extensions::GeneralName;
use x509_parser::pem::parse_x509_pem;

/// A node's certs directory inside a throwaway temp dir. The directory
/// itself is not created until a workflow needs it.
pub struct TestNode {
    _temp_dir: TempDir,
    pub certs_dir: PathBuf,
}

impl TestNode {
    pub fn new() -> anyhow::Result<Self> {
        let temp_dir = TempDir::new().context("create temp dir")?;
        let certs_dir = temp_dir.path().join("node").join("certs");
        Ok(Self { _temp_dir: temp_dir, certs_dir })
    }

    pub fn ctx(&self) -> TlsContext<'static> {
        TlsContext::new(&self.certs_dir, &FsCredentialStore, &RcgenCaProvider, &CertsLocator)
    }

    pub fn paths(&self, slot: Slot) -> SlotPaths {
        CertsLocator.resolve(&self.certs_dir, slot)
    }

    pub fn bootstrap(&self, addresses: &AddressConfig) -> autotls::Result<CertificateBundle> {
        let mut bundle = CertificateBundle::default();
        bundle.bootstrap(&self.ctx(), addresses)?;
        Ok(bundle)
    }

    pub fn read(&self, name: &str) -> anyhow::Result<Vec<u8>> {
        let path = self.certs_dir.join(name);
        fs::read(&path).with_context(|| format!("read {}", path.display()))
    }

    pub fn write(&self, name: &str, contents: &[u8]) -> anyhow::Result<()> {
        fs::create_dir_all(&self.certs_dir)?;
        fs::write(self.certs_dir.join(name), contents)?;
        Ok(())
    }

    /// Every file in the certs directory with its contents. Empty if the
    /// directory does not exist.
    pub fn snapshot(&self) -> anyhow::Result<BTreeMap<String, Vec<u8>>> {
        let mut files = BTreeMap::new();
        if !self.certs_dir.exists() {
            return Ok(files);
        }
        for entry in fs::read_dir(&self.certs_dir)? {
            let entry = entry?;
            if entry.file_type()?.is_file() {
                let name = entry.file_name().to_string_lossy().into_owned();
                files.insert(name, fs::read(entry.path())?);
            }
        }
        Ok(files)
    }
}

/// Addresses of a node reachable by IP and DNS name, with a separate UI name.
pub fn cluster_addresses() -> AddressConfig {
    AddressConfig {
        listen_addr: "10.0.0.1:26257".into(),
        advertise_addr: Some("node1.example.com:26257".into()),
        http_addr: "ui.example.com:8080".into(),
        ..AddressConfig::default()
    }
}

/// Owned view of the certificate fields the tests assert on.
#[derive(Debug)]
pub struct ParsedCert {
    pub common_name: String,
    pub organization: String,
    pub is_ca: bool,
    pub lifetime_secs: i64,
    pub dns_names: Vec<String>,
    pub ip_addresses: Vec<IpAddr>,
    pub server_auth: bool,
    pub client_auth: bool,
}

pub fn parse_cert(pem: &[u8]) -> anyhow::Result<ParsedCert> {
    let (_, pem) = parse_x509_pem(pem).map_err(|e| anyhow!("PEM: {e:?}"))?;
    let cert = pem.parse_x509().map_err(|e| anyhow!("X.509: {e:?}"))?;

    let first = |values: Vec<&str>| values.first().map(|s| s.to_string()).unwrap_or_default();
    let common_name =
        first(cert.subject().iter_common_name().filter_map(|cn| cn.as_str().ok()).collect());
    let organization =
        first(cert.subject().iter_organization().filter_map(|o| o.as_str().ok()).collect());

    let mut dns_names = Vec::new();
    let mut ip_addresses = Vec::new();
    if let Some(san) = cert.subject_alternative_name().map_err(|e| anyhow!("SAN: {e:?}"))? {
        for name in &san.value.general_names {
            match name {
                GeneralName::DNSName(dns) => dns_names.push(dns.to_string()),
                GeneralName::IPAddress(bytes) => ip_addresses.push(ip_from_bytes(bytes)?),
                _ => {}
            }
        }
    }

    let (server_auth, client_auth) = cert
        .extended_key_usage()
        .map_err(|e| anyhow!("EKU: {e:?}"))?
        .map(|eku| (eku.value.server_auth, eku.value.client_auth))
        .unwrap_or((false, false));

    let validity = cert.validity();
    Ok(ParsedCert {
        common_name,
        organization,
        is_ca: cert.is_ca(),
        lifetime_secs: validity.not_after.timestamp() - validity.not_before.timestamp(),
        dns_names,
        ip_addresses,
        server_auth,
        client_auth,
    })
}

fn ip_from_bytes(bytes: &[u8]) -> anyhow::Result<IpAddr> {
    match bytes.len() {
        4 => {
            let octets: [u8; 4] = bytes.try_into()?;
            Ok(IpAddr::V4(Ipv4Addr::from(octets)))
        }
        16 => {
            let octets: [u8; 16] = bytes.try_into()?;
            Ok(IpAddr::V6(Ipv6Addr::from(octets)))
        }
        n => Err(anyhow!("unexpected IP SAN length {n}")),
    }
}

/// Fails unless `leaf_pem` carries a valid signature by the key of `ca_pem`.
pub fn verify_signed_by(leaf_pem: &[u8], ca_pem: &[u8]) -> anyhow::Result<()> {
    let (_, leaf_pem) = parse_x509_pem(leaf_pem).map_err(|e| anyhow!("leaf PEM: {e:?}"))?;
    let (_, ca_pem) = parse_x509_pem(ca_pem).map_err(|e| anyhow!("CA PEM: {e:?}"))?;
    let leaf = leaf_pem.parse_x509().map_err(|e| anyhow!("leaf: {e:?}"))?;
    let ca = ca_pem.parse_x509().map_err(|e| anyhow!("CA: {e:?}"))?;

    anyhow::ensure!(
        leaf.issuer().to_string() == ca.subject().to_string(),
        "issuer does not match CA subject"
    );
    leaf.verify_signature(Some(ca.public_key()))
        .map_err(|e| anyhow!("signature verification failed: {e:?}"))
}

pub const DAY_SECS: i64 = 24 * 60 * 60;
