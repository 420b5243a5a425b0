// SPDX-License-Identifier: MIT

//! Uplink path: ground peers batched toward VMW, paced by SOKF.

mod common;

use common::*;
use mia_wire::ite::{write_ite_header, IteKind};
use mia_wire::itm::{ItmFields, ItmHeader};
use mia_wire::limits::{
    ITM_HEADER_SIZE, LENGTH_PREFIX_SIZE, MPLS_HEADER_SIZE, VMW_OUTER_HEADER_SIZE,
};
use mia_wire::mpls::{qos, MplsHeader};
use mia_wire::sokf::SokfMessage;

fn batch_sub_count(batch: &[u8]) -> u16 {
    u16::from_be_bytes([batch[VMW_OUTER_HEADER_SIZE], batch[VMW_OUTER_HEADER_SIZE + 1]])
}

fn first_sub(batch: &[u8]) -> &[u8] {
    let start = VMW_OUTER_HEADER_SIZE + LENGTH_PREFIX_SIZE;
    let len = u16::from_be_bytes([batch[start], batch[start + 1]]) as usize;
    &batch[start + LENGTH_PREFIX_SIZE..start + LENGTH_PREFIX_SIZE + len]
}

#[tokio::test]
async fn route_delay_holds_packet_for_three_frames() {
    let h = start(|cfg| {
        cfg.route_delays = vec![mia_router::config::RouteDelay {
            sv_node: 2,
            sim_node: 1,
            delay: 3,
        }];
    })
    .await;

    // Mission-data ITM from MD at frame 0, route (1, 2) delayed 3 frames.
    h.driver
        .send_to(&fixed_itm(0, 2, 0), h.addrs.mission_data)
        .await
        .unwrap();
    settle().await;

    for offset in 1..=2u32 {
        h.driver
            .send_to(&SokfMessage::encode(offset), h.addrs.sokf)
            .await
            .unwrap();
        settle().await;
        expect_quiet(&h.dp_dest).await;
    }

    h.driver
        .send_to(&SokfMessage::encode(3), h.addrs.sokf)
        .await
        .unwrap();
    let batch = recv(&h.dp_dest).await.expect("DP batch on the third frame");
    assert_eq!(batch_sub_count(&batch), 1);
    // Fixed mission-data loses its last payload byte on the uplink.
    assert_eq!(first_sub(&batch).len(), MPLS_HEADER_SIZE + ITM_HEADER_SIZE + 42);

    h.driver
        .send_to(&SokfMessage::encode(4), h.addrs.sokf)
        .await
        .unwrap();
    settle().await;
    expect_quiet(&h.dp_dest).await;
    expect_quiet(&h.cp_dest).await;
}

#[tokio::test]
async fn tpn_vitm_is_wrapped_and_batched_to_control_plane() {
    let h = start(|_| {}).await;

    // Pre-wrapped VITM carrying ITE-Control, straight from the TPN peer.
    let payload_len = 8;
    let mut packet = vec![0u8; MPLS_HEADER_SIZE + ITM_HEADER_SIZE + payload_len];
    packet[..MPLS_HEADER_SIZE].copy_from_slice(&MplsHeader::fake_impls(qos::OAM).encode());
    ItmFields {
        payload_type_bits: 2,
        vitm: true,
        dst_node: 2,
        ..Default::default()
    }
    .write(&mut packet[MPLS_HEADER_SIZE..]);
    write_ite_header(
        &mut packet[MPLS_HEADER_SIZE + ITM_HEADER_SIZE..],
        IteKind::Control,
        1,
    );

    h.tpn_peer.send_to(&packet, h.addrs.tpn).await.unwrap();
    settle().await;

    // Default delay is 0: the packet sits in the open timeslot until SOKF.
    expect_quiet(&h.cp_dest).await;
    h.driver
        .send_to(&SokfMessage::encode(1), h.addrs.sokf)
        .await
        .unwrap();

    let batch = recv(&h.cp_dest).await.expect("CP batch after SOKF");
    assert_eq!(batch_sub_count(&batch), 1);
    assert_eq!(first_sub(&batch), packet.as_slice());
    expect_quiet(&h.dp_dest).await;
}

#[tokio::test]
async fn md_uplink_rejects_non_mission_payload_types() {
    let h = start(|_| {}).await;

    h.driver
        .send_to(&fixed_itm(2, 2, 0), h.addrs.mission_data)
        .await
        .unwrap();
    settle().await;
    h.driver
        .send_to(&SokfMessage::encode(1), h.addrs.sokf)
        .await
        .unwrap();
    settle().await;
    expect_quiet(&h.cp_dest).await;
    expect_quiet(&h.dp_dest).await;
}

#[tokio::test]
async fn md_uplink_carries_header_destination_and_clip() {
    let h = start(|_| {}).await;

    h.driver
        .send_to(&fixed_itm(1, 7, 0), h.addrs.mission_data)
        .await
        .unwrap();
    settle().await;
    h.driver
        .send_to(&SokfMessage::encode(1), h.addrs.sokf)
        .await
        .unwrap();

    let batch = recv(&h.dp_dest).await.expect("DP batch");
    let sub = first_sub(&batch);
    let itm = ItmHeader::parse(&sub[MPLS_HEADER_SIZE..]).unwrap();
    assert_eq!(itm.dst_node(), 7);
    // Fixed ITM QOS mirrors the payload type.
    assert_eq!(MplsHeader::decode(sub).unwrap().qos, 1);
}

#[tokio::test]
async fn kba_passthrough_goes_straight_to_control_plane() {
    let h = start(|_| {}).await;

    let blob = vec![0xA5u8; 64];
    h.driver.send_to(&blob, h.addrs.kba).await.unwrap();
    let out = recv(&h.cp_dest).await.expect("passthrough at CP");
    assert_eq!(out, blob);
}

#[tokio::test]
async fn disabled_cp_destination_drops_passthrough_silently() {
    let mut h = start(|cfg| {
        cfg.cp_vmw_dest = "0.0.0.0:0".parse().unwrap();
    })
    .await;

    h.driver.send_to(&[0x11u8; 32], h.addrs.kba).await.unwrap();
    settle().await;
    assert!(h.faults.try_recv().is_err(), "silent drop must not fault");
    expect_quiet(&h.dp_dest).await;
}
