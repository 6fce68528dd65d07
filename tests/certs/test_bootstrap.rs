use std::collections::HashSet;
use std::fs;
use std::net::IpAddr;

use autotls::certs::{extract_hostnames, AddressConfig, Slot, CA_COMMON_NAME, NODE_USER};
use autotls::errors::{ErrorKind, Operation};

use super::support::{cluster_addresses, parse_cert, verify_signed_by, TestNode, DAY_SECS};

#[test]
fn bootstrap_provisions_every_slot() -> anyhow::Result<()> {
    let node = TestNode::new()?;
    let bundle = node.bootstrap(&cluster_addresses())?;

    let mut ca_certs = HashSet::new();
    for slot in Slot::ALL {
        let service = bundle.get(slot);
        assert!(service.is_provisioned(), "{slot} not provisioned");

        let paths = node.paths(slot);
        let ca_pem = fs::read(&paths.ca_cert)?;
        let leaf_pem = fs::read(&paths.host_cert)?;
        assert_eq!(service.ca_certificate.as_deref(), Some(ca_pem.as_slice()));
        assert_eq!(service.host_certificate.as_deref(), Some(leaf_pem.as_slice()));
        assert!(paths.ca_key.exists());
        assert!(paths.host_key.exists());

        let ca = parse_cert(&ca_pem)?;
        assert!(ca.is_ca);
        assert_eq!(ca.common_name, CA_COMMON_NAME);
        assert_eq!(ca.organization, "Cluster");
        assert_eq!(ca.lifetime_secs, 10 * 366 * DAY_SECS);

        let leaf = parse_cert(&leaf_pem)?;
        assert!(!leaf.is_ca);
        assert_eq!(leaf.lifetime_secs, 5 * 366 * DAY_SECS);
        verify_signed_by(&leaf_pem, &ca_pem)?;

        assert!(ca_certs.insert(ca_pem), "{slot} shares a CA with another slot");
    }

    assert_eq!(node.snapshot()?.len(), 20);
    Ok(())
}

#[test]
fn leaf_identities_follow_slot_configuration() -> anyhow::Result<()> {
    let node = TestNode::new()?;
    node.bootstrap(&cluster_addresses())?;
    let ip: IpAddr = "10.0.0.1".parse()?;

    let inter_node = parse_cert(&node.read("node.crt")?)?;
    assert_eq!(inter_node.common_name, NODE_USER);
    assert_eq!(inter_node.ip_addresses, vec![ip]);
    assert_eq!(inter_node.dns_names, vec!["node1.example.com"]);
    assert!(inter_node.server_auth && inter_node.client_auth);

    let client = parse_cert(&node.read("client.node.crt")?)?;
    assert_eq!(client.common_name, NODE_USER);
    assert!(client.ip_addresses.is_empty() && client.dns_names.is_empty());
    assert!(client.client_auth);

    // Without a split SQL listener the SQL certificate covers the RPC hosts.
    let sql = parse_cert(&node.read("sql-service.crt")?)?;
    assert_eq!(sql.ip_addresses, vec![ip]);
    assert_eq!(sql.dns_names, vec!["node1.example.com"]);
    assert!(sql.server_auth && !sql.client_auth);

    let rpc = parse_cert(&node.read("rpc-service.crt")?)?;
    assert_eq!(rpc.common_name, NODE_USER);
    assert!(!rpc.client_auth);

    let ui = parse_cert(&node.read("ui.crt")?)?;
    assert_eq!(ui.common_name, "ui.example.com");
    assert_eq!(ui.dns_names, vec!["ui.example.com"]);
    assert!(!ui.client_auth);
    Ok(())
}

#[test]
fn split_sql_listener_gets_its_own_names() -> anyhow::Result<()> {
    let node = TestNode::new()?;
    let addresses = AddressConfig {
        split_listen_sql: true,
        sql_addr: Some("0.0.0.0:26258".into()),
        sql_advertise_addr: Some("sql.example.com:26258".into()),
        ..cluster_addresses()
    };
    node.bootstrap(&addresses)?;

    let sql = parse_cert(&node.read("sql-service.crt")?)?;
    assert_eq!(sql.ip_addresses, vec!["0.0.0.0".parse::<IpAddr>()?]);
    assert_eq!(sql.dns_names, vec!["sql.example.com"]);
    Ok(())
}

#[test]
fn second_bootstrap_is_refused_without_writes() -> anyhow::Result<()> {
    let node = TestNode::new()?;
    node.bootstrap(&cluster_addresses())?;
    let before = node.snapshot()?;

    let err = node.bootstrap(&cluster_addresses()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::AlreadyInitialized);
    assert_eq!(err.operation(), Some(Operation::CheckInitialized));
    assert_eq!(node.snapshot()?, before);
    Ok(())
}

#[test]
fn orphan_inter_node_cert_is_inconsistent() -> anyhow::Result<()> {
    let node = TestNode::new()?;
    node.write("node.crt", b"-----BEGIN CERTIFICATE-----\n")?;

    let err = node.bootstrap(&cluster_addresses()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InconsistentPair);
    assert_eq!(err.slot(), Some(Slot::InterNode));
    assert_eq!(node.snapshot()?.keys().collect::<Vec<_>>(), vec!["node.crt"]);
    Ok(())
}

#[test]
fn orphan_key_in_later_slot_stops_the_cascade() -> anyhow::Result<()> {
    let node = TestNode::new()?;
    node.write("sql-service.key", b"stray key")?;

    let err = node.bootstrap(&cluster_addresses()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InconsistentPair);
    assert_eq!(err.slot(), Some(Slot::SqlService));
    assert_eq!(err.operation(), Some(Operation::LoadHostPair));

    // Slots before the failure stay materialized; later ones are untouched.
    assert!(node.paths(Slot::InterNode).host_key.exists());
    assert!(node.paths(Slot::UserAuth).host_cert.exists());
    assert!(!node.paths(Slot::SqlService).ca_cert.exists());
    assert!(!node.paths(Slot::RpcService).ca_cert.exists());
    assert!(!node.paths(Slot::AdminUiService).ca_cert.exists());
    Ok(())
}

#[test]
fn missing_host_pair_is_reissued_from_existing_ca() -> anyhow::Result<()> {
    let node = TestNode::new()?;
    node.bootstrap(&cluster_addresses())?;
    let before = node.snapshot()?;

    let paths = node.paths(Slot::InterNode);
    fs::remove_file(&paths.host_cert)?;
    fs::remove_file(&paths.host_key)?;
    node.bootstrap(&cluster_addresses())?;

    let after = node.snapshot()?;
    assert_eq!(after["ca.crt"], before["ca.crt"]);
    assert_eq!(after["ca.key"], before["ca.key"]);
    assert_ne!(after["node.crt"], before["node.crt"]);
    verify_signed_by(&after["node.crt"], &after["ca.crt"])?;

    for name in ["client.node.crt", "sql-service.key", "rpc-service.crt", "ui.crt", "ca-ui.key"] {
        assert_eq!(after[name], before[name], "{name} changed");
    }
    Ok(())
}

#[test]
fn malformed_address_fails_before_touching_disk() -> anyhow::Result<()> {
    let node = TestNode::new()?;
    let addresses =
        AddressConfig { advertise_addr: Some("[::1".into()), ..cluster_addresses() };

    let err = node.bootstrap(&addresses).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidAddress);
    assert!(!node.certs_dir.exists());
    Ok(())
}

#[test]
fn hostnames_are_deduplicated_in_order() -> anyhow::Result<()> {
    let hosts = extract_hostnames(["10.0.0.1:26257", "10.0.0.1:26258", "10.0.0.2:8080"])?;
    assert_eq!(hosts, vec!["10.0.0.1", "10.0.0.2"]);
    Ok(())
}
