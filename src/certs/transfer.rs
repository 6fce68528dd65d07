//! Wire form of the CA material a cluster member hands to a joining node.
//!
//! Only CA halves travel. Host certificates and keys are node-specific and
//! are always issued locally by the receiver.

use std::collections::BTreeMap;

use base64::{engine::general_purpose::STANDARD, Engine};
use serde::{Deserialize, Serialize};

use super::bundle::CertificateBundle;
use super::slot::Slot;
use crate::errors::{AutoTlsError, Result};

pub const TRANSFER_VERSION: u32 = 1;

/// One slot's CA, base64 encoded PEM. Missing halves are `null`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferredCa {
    pub ca_cert: Option<String>,
    pub ca_key: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaTransferPayload {
    pub version: u32,
    #[serde(default)]
    pub cas: BTreeMap<Slot, TransferredCa>,
}

impl From<&CertificateBundle> for CaTransferPayload {
    fn from(bundle: &CertificateBundle) -> Self {
        let cas = bundle
            .iter()
            .map(|(slot, service)| {
                let ca = TransferredCa {
                    ca_cert: service.ca_certificate.as_deref().map(|pem| STANDARD.encode(pem)),
                    ca_key: service.ca_key.as_deref().map(|pem| STANDARD.encode(pem)),
                };
                (slot, ca)
            })
            .collect();
        Self { version: TRANSFER_VERSION, cas }
    }
}

impl CaTransferPayload {
    /// Decode into a bundle holding CA material only. Slots missing from
    /// the payload stay empty and get a locally created CA on receive.
    pub fn into_bundle(self) -> Result<CertificateBundle> {
        if self.version != TRANSFER_VERSION {
            return Err(AutoTlsError::transfer(format!(
                "unsupported payload version {} (expected {TRANSFER_VERSION})",
                self.version
            )));
        }

        let mut bundle = CertificateBundle::default();
        for (slot, ca) in self.cas {
            let service = bundle.get_mut(slot);
            service.ca_certificate = decode(slot, "ca_cert", ca.ca_cert)?;
            service.ca_key = decode(slot, "ca_key", ca.ca_key)?;
        }
        Ok(bundle)
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| AutoTlsError::transfer(format!("failed to encode payload: {e}")))
    }

    pub fn from_json(input: &str) -> Result<Self> {
        serde_json::from_str(input)
            .map_err(|e| AutoTlsError::transfer(format!("failed to decode payload: {e}")))
    }
}

fn decode(slot: Slot, field: &str, value: Option<String>) -> Result<Option<Vec<u8>>> {
    value
        .map(|encoded| {
            STANDARD.decode(encoded.trim()).map_err(|e| {
                AutoTlsError::transfer(format!("{slot} {field} is not valid base64: {e}"))
            })
        })
        .transpose()
}
