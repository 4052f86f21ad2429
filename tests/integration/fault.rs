//! Network faults the device link actually produces: reordering,
//! duplication, loss, corruption and stray traffic on the port.

use std::collections::HashMap;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

use crate::*;
use rxstream_core::wire::{tag, CHUNK_MAGIC, CHUNK_VERSION};
use rxstream_core::SensorKind;

fn limits() -> ReassemblyConfig {
    ReassemblyConfig {
        entry_timeout_ms: 200,
        sweep_interval_ms: 50,
        ..ReassemblyConfig::default()
    }
}

#[tokio::test]
async fn test_shuffled_chunks_reassemble() {
    let mut lo = Loopback::new(limits()).await.unwrap();
    let mut rng = StdRng::seed_from_u64(0x5eed);

    let frame = seal(tag::DEPTH, &body(20_000, 3));
    let mut chunks = make_chunks(100, &frame, DEVICE_CHUNK);
    chunks.shuffle(&mut rng);
    lo.send_all(&chunks).await.unwrap();

    let received = lo.next_frame().await.unwrap();
    assert_eq!(received.frame_id, 100);
    assert!(received.crc_ok);
    assert_eq!(&received.data[..], &frame[..]);
}

#[tokio::test]
async fn test_interleaved_duplicated_frames() {
    let mut lo = Loopback::new(limits()).await.unwrap();
    let mut rng = StdRng::seed_from_u64(7);

    let frames: HashMap<u32, Vec<u8>> = [
        (10, seal(tag::DEPTH, &body(6_000, 1))),
        (11, seal(tag::RGB, &body(4_500, 2))),
        (12, seal(tag::IMU, &body(300, 3))),
    ]
    .into_iter()
    .collect();

    let mut datagrams = Vec::new();
    for (id, frame) in &frames {
        for chunk in make_chunks(*id, frame, 1000) {
            if rng.gen_bool(0.5) {
                datagrams.push(chunk.clone());
            }
            datagrams.push(chunk);
        }
    }
    datagrams.shuffle(&mut rng);
    lo.send_all(&datagrams).await.unwrap();

    // A duplicate landing after its frame completed opens a fresh entry
    // under the same id; it can only ever rebuild identical bytes.
    let mut received: HashMap<u32, Frame> = HashMap::new();
    while received.len() < frames.len() {
        let frame = lo.next_frame().await.unwrap();
        assert!(frame.crc_ok, "frame {} failed CRC", frame.frame_id);
        assert_eq!(&frame.data[..], &frames[&frame.frame_id][..]);
        received.insert(frame.frame_id, frame);
    }

    assert_eq!(received[&10].sensor(), SensorKind::Depth);
    assert_eq!(received[&11].sensor(), SensorKind::Rgb);
    assert_eq!(received[&12].sensor(), SensorKind::Imu);
    assert_eq!(lo.receiver.stats().crc_failures, 0);
}

#[tokio::test]
async fn test_reused_frame_ids_across_sensors() {
    let mut lo = Loopback::new(limits()).await.unwrap();

    // Depth and IMU keep separate counters that advance together; every RGB
    // frame is sent as frame 0.
    for n in 0..10u32 {
        let depth = seal(tag::DEPTH, &body(3_000, n as u8));
        let imu = seal(tag::IMU, &body(90, n as u8));
        let rgb = seal(tag::RGB, &body(5_000, n as u8));

        lo.send_all(make_chunks(n, &depth, DEVICE_CHUNK)).await.unwrap();
        lo.send_all(make_chunks(n, &imu, DEVICE_CHUNK)).await.unwrap();
        lo.send_all(make_chunks(0, &rgb, DEVICE_CHUNK)).await.unwrap();

        for (id, kind, expected) in [
            (n, SensorKind::Depth, &depth),
            (n, SensorKind::Imu, &imu),
            (0, SensorKind::Rgb, &rgb),
        ] {
            let frame = lo.next_frame().await.unwrap();
            assert_eq!(frame.frame_id, id, "round {n}");
            assert_eq!(frame.sensor(), kind, "round {n}");
            assert!(frame.crc_ok, "round {n}");
            assert_eq!(&frame.data[..], &expected[..]);
        }
    }

    let stats = lo.receiver.stats();
    assert_eq!(stats.frames_completed, 30);
    assert_eq!(stats.late_chunks, 0);
    assert!(lo.receiver.table().is_empty());
}

#[tokio::test]
async fn test_corrupted_frame_flagged() {
    let mut lo = Loopback::new(limits()).await.unwrap();

    let frame = seal(tag::RGB, &body(3_000, 9));
    let mut chunks = make_chunks(5, &frame, DEVICE_CHUNK);
    let last = chunks[1].len() - 1;
    chunks[1][last] ^= 0x01;
    lo.send_all(&chunks).await.unwrap();

    let received = lo.next_frame().await.unwrap();
    assert!(received.valid);
    assert!(!received.crc_ok);
    assert_eq!(received.data.len(), frame.len());
    assert_ne!(received.declared_crc(), None);
    assert_eq!(lo.receiver.stats().crc_failures, 1);
}

#[tokio::test]
async fn test_stray_datagrams_ignored() {
    let mut lo = Loopback::new(ReassemblyConfig {
        max_datagram_bytes: 2048,
        ..limits()
    })
    .await
    .unwrap();

    // Too short for a header.
    lo.send(b"abc").await.unwrap();

    // Wrong magic.
    let mut bad_magic = make_chunks(1, b"whatever", 64).remove(0);
    bad_magic[0] = !bad_magic[0];
    lo.send(&bad_magic).await.unwrap();

    // Wrong version.
    let mut bad_version = make_chunks(1, b"whatever", 64).remove(0);
    bad_version[2] = CHUNK_VERSION + 1;
    lo.send(&bad_version).await.unwrap();

    // chunk_index == total_chunks.
    let mut bad_index = Vec::new();
    bad_index.extend_from_slice(&CHUNK_MAGIC.to_le_bytes());
    bad_index.push(CHUNK_VERSION);
    bad_index.extend_from_slice(&1u32.to_le_bytes());
    bad_index.extend_from_slice(&2u16.to_le_bytes());
    bad_index.extend_from_slice(&2u16.to_le_bytes());
    bad_index.extend_from_slice(b"payload");
    lo.send(&bad_index).await.unwrap();

    // Over the datagram ceiling.
    lo.send(&vec![0u8; 3000]).await.unwrap();

    let frame = seal(tag::IMU, &body(100, 4));
    lo.send_all(make_chunks(2, &frame, DEVICE_CHUNK)).await.unwrap();

    let received = lo.next_frame().await.unwrap();
    assert_eq!(received.frame_id, 2);
    assert!(received.crc_ok);

    let malformed = &lo.receiver.stats().malformed;
    assert_eq!(malformed.too_short, 1);
    assert_eq!(malformed.bad_magic, 1);
    assert_eq!(malformed.bad_version, 1);
    assert_eq!(malformed.bad_index, 1);
    assert_eq!(malformed.too_long, 1);
    assert_eq!(malformed.total(), 5);
}

#[tokio::test]
async fn test_lost_chunk_expires() {
    let mut lo = Loopback::new(limits()).await.unwrap();

    let frame = seal(tag::DEPTH, &body(5_000, 5));
    let mut chunks = make_chunks(77, &frame, DEVICE_CHUNK);
    chunks.remove(2);
    lo.send_all(&chunks).await.unwrap();

    assert!(lo.stays_quiet(Duration::from_millis(600)).await);
    assert!(!lo.receiver.table().contains(77));
    assert_eq!(lo.receiver.stats().expired, 1);

    // The link recovers; later frames still arrive.
    let next = seal(tag::DEPTH, &body(5_000, 6));
    lo.send_all(make_chunks(78, &next, DEVICE_CHUNK)).await.unwrap();
    let received = lo.next_frame().await.unwrap();
    assert_eq!(received.frame_id, 78);
    assert!(received.crc_ok);
}

#[tokio::test]
async fn test_oversized_frame_dropped() {
    let mut lo = Loopback::new(ReassemblyConfig {
        max_frame_bytes: 4096,
        ..limits()
    })
    .await
    .unwrap();

    let huge = seal(tag::RGB, &body(8_000, 8));
    lo.send_all(make_chunks(1, &huge, DEVICE_CHUNK)).await.unwrap();

    let small = seal(tag::IMU, &body(200, 8));
    lo.send_all(make_chunks(2, &small, DEVICE_CHUNK)).await.unwrap();

    let received = lo.next_frame().await.unwrap();
    assert_eq!(received.frame_id, 2, "oversized frame must never be emitted");
    assert!(received.crc_ok);

    let stats = lo.receiver.stats();
    assert_eq!(stats.dropped_oversized, 1);
    assert!(stats.late_chunks >= 1);
    assert!(!lo.receiver.table().contains(1));
}
