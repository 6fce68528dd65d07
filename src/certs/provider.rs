//! Certificate authority primitives: CA and leaf generation, PEM chain
//! parsing.

use std::fmt;
use std::net::IpAddr;

use chrono::{DateTime, Utc};
use rcgen::{
    BasicConstraints, CertificateParams, DnType, ExtendedKeyUsagePurpose, IsCa, KeyPair,
    KeyUsagePurpose, SanType, PKCS_ECDSA_P256_SHA256,
};
use serde::Serialize;
use time::{Duration, OffsetDateTime};
use x509_parser::certificate::X509Certificate;
use x509_parser::pem::Pem;

use crate::errors::ProviderError;

/// Organization placed in the subject of every generated certificate.
pub const ORGANIZATION: &str = "Cluster";

/// A PEM certificate and its PEM private key.
#[derive(Clone, PartialEq, Eq)]
pub struct PemPair {
    pub cert: Vec<u8>,
    pub key: Vec<u8>,
}

impl fmt::Debug for PemPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PemPair")
            .field("cert", &String::from_utf8_lossy(&self.cert))
            .field("key", &"[REDACTED]")
            .finish()
    }
}

/// Summary of a parsed X.509 certificate.
#[derive(Debug, Clone, Serialize)]
pub struct CertificateInfo {
    pub subject: String,
    pub issuer: String,
    pub not_before: DateTime<Utc>,
    pub not_after: DateTime<Utc>,
    pub is_ca: bool,
    #[serde(skip)]
    pub der: Vec<u8>,
}

impl CertificateInfo {
    fn from_x509(cert: &X509Certificate<'_>, der: &[u8]) -> Result<Self, ProviderError> {
        let timestamp = |seconds: i64| {
            DateTime::from_timestamp(seconds, 0).ok_or_else(|| {
                ProviderError::InvalidPem(format!("validity timestamp {seconds} out of range"))
            })
        };
        let validity = cert.validity();

        Ok(Self {
            subject: cert.subject().to_string(),
            issuer: cert.issuer().to_string(),
            not_before: timestamp(validity.not_before.timestamp())?,
            not_after: timestamp(validity.not_after.timestamp())?,
            is_ca: cert
                .basic_constraints()
                .ok()
                .flatten()
                .map(|constraints| constraints.value.ca)
                .unwrap_or(false),
            der: der.to_vec(),
        })
    }
}

/// Generates and parses certificate material.
pub trait CaProvider {
    /// Generate a self-signed CA valid for `lifetime` from now.
    fn create_ca(&self, lifetime: Duration, common_name: &str) -> Result<PemPair, ProviderError>;

    /// Generate a leaf certificate signed by the given CA.
    ///
    /// `sans` that parse as IP addresses become IP SANs, everything else a DNS
    /// SAN. A `dual_use` leaf is valid for client authentication as well as
    /// server authentication.
    #[allow(clippy::too_many_arguments)]
    fn create_leaf_cert(
        &self,
        lifetime: Duration,
        common_name: &str,
        sans: &[String],
        issuer_cert_pem: &[u8],
        issuer_key_pem: &[u8],
        dual_use: bool,
    ) -> Result<PemPair, ProviderError>;

    /// Parse every `CERTIFICATE` block in `pem`, in order.
    fn parse_certificates(&self, pem: &[u8]) -> Result<Vec<CertificateInfo>, ProviderError>;
}

/// ECDSA P-256 provider backed by `rcgen` and `x509-parser`.
#[derive(Debug, Clone, Copy, Default)]
pub struct RcgenCaProvider;

impl RcgenCaProvider {
    fn generate_key() -> Result<KeyPair, ProviderError> {
        KeyPair::generate_for(&PKCS_ECDSA_P256_SHA256)
            .map_err(|e| ProviderError::KeyGeneration(e.to_string()))
    }

    fn base_params(lifetime: Duration, common_name: &str) -> CertificateParams {
        let mut params = CertificateParams::default();
        params.distinguished_name.push(DnType::OrganizationName, ORGANIZATION);
        params.distinguished_name.push(DnType::CommonName, common_name);

        // Whole seconds, so the encoded window is exactly `lifetime`.
        let now = OffsetDateTime::now_utc();
        let now = now.replace_nanosecond(0).unwrap_or(now);
        params.not_before = now;
        params.not_after = now + lifetime;
        params
    }

    fn subject_alt_name(name: &str) -> Result<SanType, ProviderError> {
        if let Ok(ip) = name.parse::<IpAddr>() {
            return Ok(SanType::IpAddress(ip));
        }
        let dns = name.to_string().try_into().map_err(|e: rcgen::Error| {
            ProviderError::InvalidHostname { name: name.to_string(), reason: e.to_string() }
        })?;
        Ok(SanType::DnsName(dns))
    }
}

fn pem_str<'a>(pem: &'a [u8], what: &str) -> Result<&'a str, ProviderError> {
    std::str::from_utf8(pem).map_err(|e| ProviderError::InvalidPem(format!("{what}: {e}")))
}

impl CaProvider for RcgenCaProvider {
    fn create_ca(&self, lifetime: Duration, common_name: &str) -> Result<PemPair, ProviderError> {
        let key = Self::generate_key()?;

        let mut params = Self::base_params(lifetime, common_name);
        params.is_ca = IsCa::Ca(BasicConstraints::Unconstrained);
        params.key_usages = vec![
            KeyUsagePurpose::KeyCertSign,
            KeyUsagePurpose::CrlSign,
            KeyUsagePurpose::DigitalSignature,
        ];

        let cert = params.self_signed(&key)?;
        Ok(PemPair { cert: cert.pem().into_bytes(), key: key.serialize_pem().into_bytes() })
    }

    fn create_leaf_cert(
        &self,
        lifetime: Duration,
        common_name: &str,
        sans: &[String],
        issuer_cert_pem: &[u8],
        issuer_key_pem: &[u8],
        dual_use: bool,
    ) -> Result<PemPair, ProviderError> {
        let issuer_key = KeyPair::from_pem(pem_str(issuer_key_pem, "CA key")?)
            .map_err(|e| ProviderError::InvalidPem(format!("CA key: {e}")))?;
        let issuer = CertificateParams::from_ca_cert_pem(pem_str(issuer_cert_pem, "CA certificate")?)
            .map_err(|e| ProviderError::InvalidPem(format!("CA certificate: {e}")))?
            .self_signed(&issuer_key)?;

        let key = Self::generate_key()?;
        let mut params = Self::base_params(lifetime, common_name);
        params.subject_alt_names =
            sans.iter().map(|name| Self::subject_alt_name(name)).collect::<Result<_, _>>()?;
        params.is_ca = IsCa::ExplicitNoCa;
        params.key_usages =
            vec![KeyUsagePurpose::DigitalSignature, KeyUsagePurpose::KeyEncipherment];
        params.extended_key_usages = if dual_use {
            vec![ExtendedKeyUsagePurpose::ServerAuth, ExtendedKeyUsagePurpose::ClientAuth]
        } else {
            vec![ExtendedKeyUsagePurpose::ServerAuth]
        };
        params.use_authority_key_identifier_extension = true;

        let cert = params.signed_by(&key, &issuer, &issuer_key)?;
        Ok(PemPair { cert: cert.pem().into_bytes(), key: key.serialize_pem().into_bytes() })
    }

    fn parse_certificates(&self, pem: &[u8]) -> Result<Vec<CertificateInfo>, ProviderError> {
        let mut certificates = Vec::new();
        for block in Pem::iter_from_buffer(pem) {
            let block = block.map_err(|e| ProviderError::InvalidPem(e.to_string()))?;
            if block.label != "CERTIFICATE" {
                continue;
            }
            let cert = block.parse_x509().map_err(|e| ProviderError::InvalidPem(e.to_string()))?;
            certificates.push(CertificateInfo::from_x509(&cert, &block.contents)?);
        }

        if certificates.is_empty() {
            return Err(ProviderError::EmptyChain);
        }
        Ok(certificates)
    }
}
