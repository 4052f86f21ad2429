use crate::*;
use rxstream_core::wire::tag;
use rxstream_core::SensorKind;

#[tokio::test]
async fn test_single_datagram_frame() {
    let mut lo = Loopback::new(ReassemblyConfig::default()).await.unwrap();

    let frame = seal(tag::IMU, &body(64, 1));
    lo.send_all(make_chunks(1, &frame, DEVICE_CHUNK)).await.unwrap();

    let received = lo.next_frame().await.unwrap();
    assert!(received.valid);
    assert!(received.crc_ok);
    assert_eq!(received.frame_id, 1);
    assert_eq!(received.sensor(), SensorKind::Imu);
    assert_eq!(&received.data[..], &frame[..]);
    assert_eq!(received.body(), &body(64, 1)[..]);
}

#[tokio::test]
async fn test_multi_chunk_depth_frame() {
    let mut lo = Loopback::new(ReassemblyConfig::default()).await.unwrap();

    let frame = seal(tag::DEPTH, &body(10_000, 7));
    let chunks = make_chunks(42, &frame, DEVICE_CHUNK);
    assert_eq!(chunks.len(), 8);
    lo.send_all(&chunks).await.unwrap();

    let received = lo.next_frame().await.unwrap();
    assert!(received.crc_ok);
    assert_eq!(received.sensor(), SensorKind::Depth);
    assert_eq!(received.data.len(), frame.len());
    assert_eq!(&received.data[..], &frame[..]);
    assert!(lo.receiver.table().is_empty());
}

#[tokio::test]
async fn test_consecutive_frames_in_order() {
    let mut lo = Loopback::new(ReassemblyConfig::default()).await.unwrap();

    let frames: Vec<Vec<u8>> = (0..5u8)
        .map(|i| seal(tag::RGB, &body(3_000, i)))
        .collect();
    for (id, frame) in frames.iter().enumerate() {
        lo.send_all(make_chunks(id as u32, frame, DEVICE_CHUNK))
            .await
            .unwrap();
    }

    for (id, frame) in frames.iter().enumerate() {
        let received = lo.next_frame().await.unwrap();
        assert_eq!(received.frame_id, id as u32);
        assert!(received.crc_ok);
        assert_eq!(&received.data[..], &frame[..]);
    }
    assert_eq!(lo.receiver.stats().frames_completed, 5);
}

#[tokio::test]
async fn test_frame_id_wraparound() {
    let mut lo = Loopback::new(ReassemblyConfig::default()).await.unwrap();

    for id in [u32::MAX, 0] {
        let frame = seal(tag::IMU, &body(2_000, id as u8));
        lo.send_all(make_chunks(id, &frame, 512)).await.unwrap();
        let received = lo.next_frame().await.unwrap();
        assert_eq!(received.frame_id, id);
        assert!(received.crc_ok);
    }
}
