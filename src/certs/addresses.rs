//! Hostname extraction from the node's configured listen and advertise
//! addresses. The results become certificate subject alternative names.

use serde::{Deserialize, Serialize};
use validator::Validate;

use super::slot::HostnamePolicy;
use crate::errors::{AutoTlsError, Result};

/// Listen and advertise addresses of the node, as `host:port` strings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct AddressConfig {
    /// RPC listen address
    #[validate(length(min = 1, message = "RPC listen address must not be empty"))]
    pub listen_addr: String,

    pub advertise_addr: Option<String>,

    /// Serve SQL on its own listener instead of the RPC one
    pub split_listen_sql: bool,

    pub sql_addr: Option<String>,

    pub sql_advertise_addr: Option<String>,

    /// Admin UI listen address
    #[validate(length(min = 1, message = "HTTP listen address must not be empty"))]
    pub http_addr: String,

    pub http_advertise_addr: Option<String>,
}

impl Default for AddressConfig {
    fn default() -> Self {
        Self {
            listen_addr: "localhost:26257".to_string(),
            advertise_addr: None,
            split_listen_sql: false,
            sql_addr: None,
            sql_advertise_addr: None,
            http_addr: "localhost:8080".to_string(),
            http_advertise_addr: None,
        }
    }
}

impl AddressConfig {
    /// Derive the hostname set of each listener.
    ///
    /// Empty hosts are dropped, so a wildcard listener such as
    /// `http_addr: ":8080"` needs `http_advertise_addr` to name the host;
    /// otherwise its set is empty and this fails with `InvalidAddress`.
    pub fn host_sets(&self) -> Result<HostSets> {
        let rpc = extract_hostnames(present([Some(&self.listen_addr), self.advertise_addr.as_ref()]))?;

        let sql = if self.split_listen_sql {
            let sql = extract_hostnames(present([
                self.sql_addr.as_ref(),
                self.sql_advertise_addr.as_ref(),
            ]))?;
            if sql.is_empty() {
                return Err(AutoTlsError::invalid_address(
                    self.sql_addr.clone().unwrap_or_default(),
                    "SQL is served on a separate listener but no SQL hostname is configured",
                ));
            }
            sql
        } else {
            rpc.clone()
        };

        let http = extract_hostnames(present([
            Some(&self.http_addr),
            self.http_advertise_addr.as_ref(),
        ]))?;
        if http.is_empty() {
            return Err(AutoTlsError::invalid_address(
                self.http_addr.clone(),
                "no HTTP hostname configured for the admin UI certificate",
            ));
        }

        Ok(HostSets { rpc, sql, http })
    }
}

fn present<'a, const N: usize>(addresses: [Option<&'a String>; N]) -> Vec<&'a str> {
    addresses.into_iter().flatten().map(String::as_str).collect()
}

/// Deduplicated hostnames per listener, in configuration order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HostSets {
    pub rpc: Vec<String>,
    pub sql: Vec<String>,
    pub http: Vec<String>,
}

impl HostSets {
    pub fn for_policy(&self, policy: HostnamePolicy) -> &[String] {
        match policy {
            HostnamePolicy::None => &[],
            HostnamePolicy::Rpc => &self.rpc,
            HostnamePolicy::Sql => &self.sql,
            HostnamePolicy::Http => &self.http,
        }
    }
}

/// Strip ports from `host:port` addresses, keeping the first occurrence of
/// each hostname.
///
/// Empty hosts (`:26257`, listen on every interface) name nothing a peer can
/// dial and are dropped.
pub fn extract_hostnames<I, S>(addresses: I) -> Result<Vec<String>>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut hostnames: Vec<String> = Vec::new();
    for address in addresses {
        let address = address.as_ref();
        let host = split_host(address)
            .map_err(|reason| AutoTlsError::invalid_address(address, reason))?;
        if host.is_empty() || hostnames.iter().any(|known| known == host) {
            continue;
        }
        hostnames.push(host.to_string());
    }
    Ok(hostnames)
}

/// Host part of `host`, `host:port`, `[v6]` or `[v6]:port`.
fn split_host(address: &str) -> std::result::Result<&str, String> {
    if address.is_empty() {
        return Err("address is empty".to_string());
    }

    let (host, port) = if let Some(rest) = address.strip_prefix('[') {
        let (host, after) = rest.split_once(']').ok_or("missing ']' in address")?;
        let port = match after {
            "" => None,
            _ => Some(after.strip_prefix(':').ok_or("unexpected characters after ']'")?),
        };
        (host, port)
    } else {
        match address.rsplit_once(':') {
            Some((host, _)) if host.contains(':') => {
                return Err("IPv6 addresses must be enclosed in brackets".to_string())
            }
            Some((host, port)) => (host, Some(port)),
            None => (address, None),
        }
    };

    if host.contains(['[', ']']) {
        return Err("unexpected bracket in host".to_string());
    }
    if let Some(port) = port.filter(|port| !port.is_empty()) {
        port.parse::<u16>().map_err(|_| format!("invalid port {port:?}"))?;
    }

    Ok(host)
}
