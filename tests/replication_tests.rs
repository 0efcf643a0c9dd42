#![allow(missing_docs)]
#![allow(clippy::float_cmp)]

use std::sync::Arc;

use swarm::error::{ReplicationError, SwarmError};
use swarm::simulation::params::SwarmConfig;
use swarm::simulation::replication::{
    FRAME_MAGIC, HEADER_LEN, LoopbackTransport, RECORD_LEN, Replica, Snapshot,
    SnapshotPublisher, SyncOutcome, Transport,
};
use swarm::simulation::swarm::Swarm;

fn create_test_config() -> SwarmConfig {
    SwarmConfig {
        agent_count: 80,
        rng_seed: Some(21),
        ..SwarmConfig::color_swarm()
    }
}

#[test]
fn test_frame_layout() {
    assert_eq!(HEADER_LEN, 24);
    assert_eq!(RECORD_LEN, 24);

    let swarm = Swarm::new(create_test_config()).unwrap();
    let frame = swarm.snapshot().encode();

    assert_eq!(frame.len(), HEADER_LEN + 80 * RECORD_LEN);
    assert_eq!(u32::from_le_bytes(frame[0..4].try_into().unwrap()), FRAME_MAGIC);
    assert_eq!(u32::from_le_bytes(frame[4..8].try_into().unwrap()), 80);
}

#[test]
fn test_decoded_snapshot_matches_capture() {
    let mut swarm = Swarm::new(create_test_config()).unwrap();
    swarm.run(3, 1.0 / 60.0).unwrap();

    let captured = swarm.snapshot();
    let decoded = Snapshot::decode(&captured.encode()).unwrap();

    assert_eq!(decoded.tick, 3);
    assert_eq!(decoded.point_size, captured.point_size);
    assert_eq!(decoded.positions, captured.positions);
    assert_eq!(decoded.colors, captured.colors);
    for (decoded_hue, hue) in decoded.hues.iter().zip(captured.hues.iter()) {
        let distance = (decoded_hue - hue).abs();
        assert!(distance.min(1.0 - distance) < 1e-4);
    }
}

#[test]
fn test_late_replica_receives_full_state() {
    let transport = Arc::new(LoopbackTransport::new());
    let mut swarm = Swarm::new(create_test_config())
        .unwrap()
        .with_publisher(transport.clone())
        .unwrap();

    swarm.run(100, 1.0 / 60.0).unwrap();

    let mut replica = Replica::new(transport).with_expected_agents(80);
    assert!(replica.current().is_none());
    assert_eq!(replica.sync(), SyncOutcome::Updated(100));

    let snapshot = replica.current().unwrap();
    assert_eq!(snapshot.agent_count(), 80);
    assert!(snapshot.is_finite());
    assert!(snapshot.hues.iter().all(|hue| (0.0..1.0).contains(hue)));

    assert_eq!(replica.sync(), SyncOutcome::Unchanged);
}

#[test]
fn test_replica_skips_to_latest() {
    let transport = Arc::new(LoopbackTransport::new());
    let mut swarm = Swarm::new(create_test_config())
        .unwrap()
        .with_publisher(transport.clone())
        .unwrap();
    let mut replica = Replica::new(transport);

    assert_eq!(replica.sync(), SyncOutcome::Updated(0));
    swarm.run(5, 1.0 / 60.0).unwrap();
    assert_eq!(replica.sync(), SyncOutcome::Updated(5));
    assert_eq!(replica.current().unwrap().position(0), swarm.snapshot().position(0));
}

#[test]
fn test_corrupt_frame_keeps_previous_snapshot() {
    let transport = Arc::new(LoopbackTransport::new());
    let mut swarm = Swarm::new(create_test_config())
        .unwrap()
        .with_publisher(transport.clone())
        .unwrap();
    swarm.step(1.0 / 60.0).unwrap();

    let mut replica = Replica::new(transport.clone());
    assert_eq!(replica.sync(), SyncOutcome::Updated(1));

    let mut frame = swarm.snapshot().encode();
    frame[0] ^= 0xFF;
    transport.send(frame).unwrap();
    assert_eq!(replica.sync(), SyncOutcome::Rejected);

    let truncated = swarm.snapshot().encode()[..HEADER_LEN + 5].to_vec();
    transport.send(truncated).unwrap();
    assert_eq!(replica.sync(), SyncOutcome::Rejected);

    let mut non_finite = swarm.snapshot().encode();
    non_finite[HEADER_LEN..HEADER_LEN + 4].copy_from_slice(&f32::NAN.to_le_bytes());
    transport.send(non_finite).unwrap();
    assert_eq!(replica.sync(), SyncOutcome::Rejected);

    assert_eq!(replica.current().unwrap().tick, 1);
    assert_eq!(replica.rejected_frames(), 3);
}

#[test]
fn test_decode_reports_corruption() {
    assert!(matches!(
        Snapshot::decode(&[0_u8; 10]),
        Err(ReplicationError::CorruptFrame(_))
    ));

    let swarm = Swarm::new(create_test_config()).unwrap();
    let mut frame = swarm.snapshot().encode();
    frame.extend_from_slice(&[0_u8; 3]);
    assert!(matches!(
        Snapshot::decode(&frame),
        Err(ReplicationError::CorruptFrame(_))
    ));
}

#[test]
fn test_replica_rejects_stale_and_mismatched_frames() {
    let transport = Arc::new(LoopbackTransport::new());
    let mut swarm = Swarm::new(create_test_config())
        .unwrap()
        .with_publisher(transport.clone())
        .unwrap();
    let old_frame = swarm.snapshot().encode();
    swarm.run(4, 1.0 / 60.0).unwrap();

    let mut replica = Replica::new(transport.clone()).with_expected_agents(80);
    assert_eq!(replica.sync(), SyncOutcome::Updated(4));

    transport.send(old_frame).unwrap();
    assert_eq!(replica.sync(), SyncOutcome::Rejected);

    let other = Swarm::new(SwarmConfig {
        agent_count: 10,
        ..create_test_config()
    })
    .unwrap();
    let mut snapshot = other.snapshot();
    snapshot.tick = 50;
    transport.send(snapshot.encode()).unwrap();
    assert_eq!(replica.sync(), SyncOutcome::Rejected);
    assert_eq!(replica.current().unwrap().tick, 4);
}

#[test]
fn test_publisher_requires_advancing_ticks() {
    let transport: Arc<dyn Transport> = Arc::new(LoopbackTransport::new());
    let mut publisher = SnapshotPublisher::new(transport).unwrap();
    let swarm = Swarm::new(create_test_config()).unwrap();
    let snapshot = swarm.snapshot();

    publisher.publish(&snapshot).unwrap();
    assert!(matches!(
        publisher.publish(&snapshot),
        Err(ReplicationError::StaleTick { tick: 0, last: 0 })
    ));
    assert_eq!(publisher.published(), 1);
    assert_eq!(publisher.last_tick(), Some(0));
}

#[test]
fn test_closed_channel_is_fatal() {
    let transport = Arc::new(LoopbackTransport::new());
    transport.close();
    let result = Swarm::new(create_test_config())
        .unwrap()
        .with_publisher(transport);
    assert!(matches!(
        result,
        Err(SwarmError::Replication(ReplicationError::ChannelUnavailable))
    ));

    let transport = Arc::new(LoopbackTransport::new());
    let mut swarm = Swarm::new(create_test_config())
        .unwrap()
        .with_publisher(transport.clone())
        .unwrap();
    swarm.step(1.0 / 60.0).unwrap();
    transport.close();
    assert!(matches!(
        swarm.step(1.0 / 60.0),
        Err(SwarmError::Replication(ReplicationError::ChannelUnavailable))
    ));
}

#[test]
fn test_snapshot_json_dump() {
    let swarm = Swarm::new(create_test_config()).unwrap();
    let snapshot = swarm.snapshot();

    let json = serde_json::to_string(&snapshot).unwrap();
    let restored: Snapshot = serde_json::from_str(&json).unwrap();
    assert_eq!(restored, snapshot);
}
