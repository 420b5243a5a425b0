// SPDX-License-Identifier: MIT

//! Downlink path: VMW batches fanned out to TPN, MD and KBA.

mod common;

use common::*;
use mia_router::config::{ConfigChange, DropRule};
use mia_router::drop_policy::DropAlgorithm;

#[tokio::test]
async fn batch_splits_into_sub_packets_toward_tpn() {
    let h = start(|_| {}).await;

    // Teach the TPN endpoint its peer address with one uplink datagram.
    h.tpn_peer
        .send_to(&fixed_itm(2, 9, 3), h.addrs.tpn)
        .await
        .unwrap();
    settle().await;

    let a = fixed_sub(2, 10);
    let b = fixed_sub(4, 11);
    let batch = batch_of(&[&a, &b]);
    h.driver.send_to(&batch, h.addrs.vmw).await.unwrap();

    let first = recv(&h.tpn_peer).await.expect("first sub-packet");
    let second = recv(&h.tpn_peer).await.expect("second sub-packet");
    assert_eq!(first, a);
    assert_eq!(second, b);

    expect_quiet(&h.kba_dest).await;
    assert_eq!(h.stats.snapshot().mpls_packets_converted, 1);
    assert_eq!(h.stats.snapshot().invalid_mpls_packets_discarded, 0);
}

#[tokio::test]
async fn hpl_destination_passes_whole_batch_to_kba() {
    let h = start(|_| {}).await;
    h.tpn_peer
        .send_to(&fixed_itm(2, 9, 3), h.addrs.tpn)
        .await
        .unwrap();
    settle().await;

    let a = fixed_sub(2, 10);
    let b = fixed_sub(2, HPL_NODE);
    let batch = batch_of(&[&a, &b]);
    h.driver.send_to(&batch, h.addrs.vmw).await.unwrap();

    let routed = recv(&h.tpn_peer).await.expect("non-HPL sub-packet");
    assert_eq!(routed, a);
    expect_quiet(&h.tpn_peer).await;

    let passed = recv(&h.kba_dest).await.expect("whole batch at KBA");
    assert_eq!(passed, batch);
    assert_eq!(h.stats.snapshot().mpls_packets_converted, 1);
}

#[tokio::test]
async fn mission_data_for_bypass_node_goes_to_md() {
    let h = start(|_| {}).await;

    let sub = fixed_sub(0, BYPASS_NODE);
    let batch = batch_of(&[&sub]);
    h.driver.send_to(&batch, h.addrs.vmw).await.unwrap();

    // The ITM arrives at MD without its MPLS label, undelayed (default 0).
    let itm = recv(&h.md_dest).await.expect("ITM at MD");
    assert_eq!(itm, sub[4..].to_vec());
}

#[tokio::test]
async fn invalid_batch_is_counted_and_loop_survives() {
    let h = start(|_| {}).await;
    h.tpn_peer
        .send_to(&fixed_itm(2, 9, 3), h.addrs.tpn)
        .await
        .unwrap();
    settle().await;

    let sub = fixed_sub(2, 10);
    let mut bad = batch_of(&[&sub]);
    let wrong = (bad.len() as u32 + 7).to_be_bytes();
    bad[4..8].copy_from_slice(&wrong);
    h.driver.send_to(&bad, h.addrs.vmw).await.unwrap();
    settle().await;

    let snap = h.stats.snapshot();
    assert_eq!(snap.invalid_mpls_packets_discarded, 1);
    assert_eq!(snap.mpls_packets_converted, 0);
    expect_quiet(&h.tpn_peer).await;

    // The read loop keeps going: a valid batch still routes.
    let good = batch_of(&[&sub]);
    h.driver.send_to(&good, h.addrs.vmw).await.unwrap();
    assert_eq!(recv(&h.tpn_peer).await.expect("sub after bad batch"), sub);
    assert_eq!(h.stats.snapshot().mpls_packets_converted, 1);
}

#[tokio::test]
async fn to_sim_policy_drops_configured_packets() {
    let h = start(|_| {}).await;
    h.tpn_peer
        .send_to(&fixed_itm(2, 9, 3), h.addrs.tpn)
        .await
        .unwrap();
    settle().await;

    h.handle.apply_config(ConfigChange {
        to_sim_drop: Some(DropRule {
            payload_type: 2,
            algorithm: DropAlgorithm::EveryN,
            interval: 2,
        }),
        ..Default::default()
    });
    settle().await;

    let a = fixed_sub(2, 10);
    let b = fixed_sub(2, 11);
    let batch = batch_of(&[&a, &b]);
    h.driver.send_to(&batch, h.addrs.vmw).await.unwrap();

    // Every 2nd type-2 packet is dropped before it reaches any queue.
    assert_eq!(recv(&h.tpn_peer).await.expect("surviving packet"), a);
    expect_quiet(&h.tpn_peer).await;
}
