//! The five fixed service identities of a node and their static issuance
//! settings.

use std::fmt;

use serde::{Deserialize, Serialize};
use time::Duration;

use super::addresses::HostSets;
use crate::errors::{AutoTlsError, Result};

/// CA validity. 366-day years so leap years never leave a certificate just
/// short of the intended span.
pub const DEFAULT_CA_LIFETIME: Duration = Duration::days(10 * 366);

/// Leaf certificate validity.
pub const DEFAULT_CERT_LIFETIME: Duration = Duration::days(5 * 366);

/// Common name of every auto-generated CA.
pub const CA_COMMON_NAME: &str = "Cluster CA";

/// Identity the node presents to its peers and as a client.
pub const NODE_USER: &str = "node";

/// One trust domain of the node. Each slot has its own CA and leaf pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Slot {
    InterNode,
    UserAuth,
    SqlService,
    RpcService,
    AdminUiService,
}

impl Slot {
    /// Processing order of every workflow.
    pub const ALL: [Slot; 5] = [
        Slot::InterNode,
        Slot::UserAuth,
        Slot::SqlService,
        Slot::RpcService,
        Slot::AdminUiService,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::InterNode => "inter-node",
            Self::UserAuth => "user-auth",
            Self::SqlService => "sql-service",
            Self::RpcService => "rpc-service",
            Self::AdminUiService => "admin-ui-service",
        }
    }

    pub fn config(self) -> ServiceConfig {
        match self {
            Self::InterNode => ServiceConfig {
                label: "node",
                common_name: CommonNameSource::NodeUser,
                hostnames: HostnamePolicy::Rpc,
                dual_use: true,
                ..ServiceConfig::base()
            },
            Self::UserAuth => ServiceConfig {
                label: "client",
                common_name: CommonNameSource::NodeUser,
                hostnames: HostnamePolicy::None,
                dual_use: true,
                ..ServiceConfig::base()
            },
            Self::SqlService => ServiceConfig {
                label: "sql",
                common_name: CommonNameSource::NodeUser,
                hostnames: HostnamePolicy::Sql,
                dual_use: false,
                ..ServiceConfig::base()
            },
            Self::RpcService => ServiceConfig {
                label: "rpc",
                common_name: CommonNameSource::NodeUser,
                hostnames: HostnamePolicy::Rpc,
                dual_use: false,
                ..ServiceConfig::base()
            },
            Self::AdminUiService => ServiceConfig {
                label: "http",
                common_name: CommonNameSource::FirstHostname,
                hostnames: HostnamePolicy::Http,
                dual_use: false,
                ..ServiceConfig::base()
            },
        }
    }
}

impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which configured address set becomes the leaf's subject alternative names.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostnamePolicy {
    /// Pure client identity, no SANs.
    None,
    Rpc,
    Sql,
    Http,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommonNameSource {
    NodeUser,
    FirstHostname,
}

/// Static issuance settings of a slot. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceConfig {
    /// Short service name used in logs.
    pub label: &'static str,
    pub common_name: CommonNameSource,
    pub hostnames: HostnamePolicy,
    /// Leaf is valid for client authentication as well as server
    /// authentication.
    pub dual_use: bool,
    pub leaf_lifetime: Duration,
    pub ca_lifetime: Duration,
}

impl ServiceConfig {
    fn base() -> Self {
        Self {
            label: "",
            common_name: CommonNameSource::NodeUser,
            hostnames: HostnamePolicy::None,
            dual_use: false,
            leaf_lifetime: DEFAULT_CERT_LIFETIME,
            ca_lifetime: DEFAULT_CA_LIFETIME,
        }
    }

    /// Resolve the leaf identity for this slot from the node's host sets.
    pub fn identity(&self, hosts: &HostSets) -> Result<HostIdentity> {
        let hostnames = hosts.for_policy(self.hostnames).to_vec();
        let common_name = match self.common_name {
            CommonNameSource::NodeUser => NODE_USER.to_string(),
            CommonNameSource::FirstHostname => hostnames.first().cloned().ok_or_else(|| {
                AutoTlsError::invalid_address(
                    "",
                    format!("{} certificate needs at least one configured hostname", self.label),
                )
            })?,
        };

        Ok(HostIdentity { common_name, hostnames, dual_use: self.dual_use })
    }
}

/// Subject of a leaf certificate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostIdentity {
    pub common_name: String,
    pub hostnames: Vec<String>,
    pub dual_use: bool,
}
