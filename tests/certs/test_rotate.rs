use std::fs;

use autotls::certs::{AddressConfig, CertificateBundle, Slot};
use autotls::errors::{ErrorKind, Operation};

use super::support::{cluster_addresses, parse_cert, verify_signed_by, TestNode, DAY_SECS};

#[test]
fn rotation_replaces_leaves_and_keeps_cas() -> anyhow::Result<()> {
    let node = TestNode::new()?;
    node.bootstrap(&cluster_addresses())?;
    let before = node.snapshot()?;

    let rotated = CertificateBundle::rotate(&node.ctx(), &cluster_addresses())?;
    assert_eq!(rotated, Slot::ALL.to_vec());

    let after = node.snapshot()?;
    assert_eq!(after.len(), before.len());
    for slot in Slot::ALL {
        let paths = node.paths(slot);
        let name = |path: &std::path::Path| {
            path.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default()
        };
        let (ca_cert, ca_key) = (name(&paths.ca_cert), name(&paths.ca_key));
        let (host_cert, host_key) = (name(&paths.host_cert), name(&paths.host_key));

        assert_eq!(after[&ca_cert], before[&ca_cert], "{slot} CA cert changed");
        assert_eq!(after[&ca_key], before[&ca_key], "{slot} CA key changed");
        assert_ne!(after[&host_cert], before[&host_cert], "{slot} leaf not rotated");
        assert_ne!(after[&host_key], before[&host_key], "{slot} key not rotated");

        verify_signed_by(&after[&host_cert], &after[&ca_cert])?;
        assert_eq!(parse_cert(&after[&host_cert])?.lifetime_secs, 5 * 366 * DAY_SECS);
    }
    Ok(())
}

#[test]
fn rotation_skips_slots_without_a_ca() -> anyhow::Result<()> {
    let node = TestNode::new()?;
    node.bootstrap(&cluster_addresses())?;
    let ui = node.paths(Slot::AdminUiService);
    fs::remove_file(&ui.ca_cert)?;
    fs::remove_file(&ui.ca_key)?;
    let ui_leaf = fs::read(&ui.host_cert)?;

    let rotated = CertificateBundle::rotate(&node.ctx(), &cluster_addresses())?;
    assert_eq!(
        rotated,
        vec![Slot::InterNode, Slot::UserAuth, Slot::SqlService, Slot::RpcService]
    );
    assert_eq!(fs::read(&ui.host_cert)?, ui_leaf);
    assert!(!ui.ca_cert.exists());
    Ok(())
}

#[test]
fn rotation_of_an_empty_directory_does_nothing() -> anyhow::Result<()> {
    let node = TestNode::new()?;

    let rotated = CertificateBundle::rotate(&node.ctx(), &cluster_addresses())?;
    assert!(rotated.is_empty());
    assert!(!node.certs_dir.exists());
    Ok(())
}

#[test]
fn rotation_picks_up_new_addresses() -> anyhow::Result<()> {
    let node = TestNode::new()?;
    node.bootstrap(&cluster_addresses())?;

    let moved = AddressConfig {
        advertise_addr: Some("node1.new-dc.example.com:26257".into()),
        ..cluster_addresses()
    };
    CertificateBundle::rotate(&node.ctx(), &moved)?;

    let leaf = parse_cert(&node.read("node.crt")?)?;
    assert_eq!(leaf.dns_names, vec!["node1.new-dc.example.com"]);
    Ok(())
}

#[test]
fn rotation_stops_at_the_first_failing_slot() -> anyhow::Result<()> {
    let node = TestNode::new()?;
    node.bootstrap(&cluster_addresses())?;
    let sql = node.paths(Slot::SqlService);
    fs::remove_file(&sql.host_key)?;
    let before = node.snapshot()?;

    let err = CertificateBundle::rotate(&node.ctx(), &cluster_addresses()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
    assert_eq!(err.slot(), Some(Slot::SqlService));
    assert_eq!(err.operation(), Some(Operation::RotateHostCert));
    assert!(!sql.host_key.exists());

    let after = node.snapshot()?;
    let leaf_files = |slot: Slot| {
        let paths = node.paths(slot);
        [paths.host_cert, paths.host_key].map(|path| {
            path.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default()
        })
    };
    // Slots ahead of the failure keep their new leaves.
    for slot in [Slot::InterNode, Slot::UserAuth] {
        for file in leaf_files(slot) {
            assert_ne!(after[&file], before[&file], "{file} not rotated");
        }
    }
    for slot in [Slot::SqlService, Slot::RpcService, Slot::AdminUiService] {
        for file in leaf_files(slot).iter().filter(|file| before.contains_key(*file)) {
            assert_eq!(after[file], before[file], "{file} changed");
        }
    }
    assert_eq!(after.len(), before.len());
    Ok(())
}

#[test]
fn orphan_ca_key_blocks_rotation() -> anyhow::Result<()> {
    let node = TestNode::new()?;
    node.bootstrap(&cluster_addresses())?;
    let before = node.snapshot()?;
    fs::remove_file(node.paths(Slot::InterNode).ca_cert)?;

    let err = CertificateBundle::rotate(&node.ctx(), &cluster_addresses()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InconsistentPair);
    assert_eq!(err.operation(), Some(Operation::LoadCa));

    // Collection fails before any slot is rotated.
    let after = node.snapshot()?;
    assert_eq!(after["node.crt"], before["node.crt"]);
    assert_eq!(after["ui.crt"], before["ui.crt"]);
    Ok(())
}
