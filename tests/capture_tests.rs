// Capture-stage tests: fixed-window framing, 16-bit conversion, wire frame
// format, and the bounded-queue drop policy.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use tokio::sync::mpsc;
use voxnote::audio::capture::{encode_frame, pcm16_from_f32};
use voxnote::audio::{resample_nearest, CaptureStage};
use voxnote::live::client::FrameSender;
use voxnote::live::messages::ClientMessage;

#[test]
fn test_pcm16_conversion_rounds_and_clamps() {
    let samples = [0.0f32, 0.5, -0.5, 1.0, -1.0, 2.0, -2.0];
    let pcm = pcm16_from_f32(&samples);

    assert_eq!(pcm[0], 0);
    assert_eq!(pcm[1], 16_384);
    assert_eq!(pcm[2], -16_384);
    assert_eq!(pcm[3], i16::MAX, "full-scale positive clamps to i16::MAX");
    assert_eq!(pcm[4], i16::MIN);
    assert_eq!(pcm[5], i16::MAX);
    assert_eq!(pcm[6], i16::MIN);
}

#[test]
fn test_encoded_frame_carries_pcm_mime_type() {
    let frame = encode_frame(&[0.0f32; 100], 16_000);

    assert_eq!(frame.mime_type, "audio/pcm;rate=16000");
    let bytes = BASE64.decode(&frame.data).unwrap();
    assert_eq!(bytes.len(), 200, "two little-endian bytes per sample");
}

#[tokio::test]
async fn test_stage_emits_one_frame_per_window() {
    let (tx, mut rx) = mpsc::channel(8);
    let sender = FrameSender::new(tx);
    let mut stage = CaptureStage::new(4096, 16_000);

    // Not enough for a window yet.
    assert_eq!(stage.push(&vec![0.1f32; 4000], &sender), 0);
    assert_eq!(stage.pending_len(), 4000);

    // Crosses one window boundary; remainder stays pending.
    assert_eq!(stage.push(&vec![0.1f32; 196], &sender), 1);
    assert_eq!(stage.pending_len(), 100);
    assert_eq!(stage.frames_sent(), 1);

    let message = rx.try_recv().expect("one frame submitted");
    match message {
        ClientMessage::RealtimeInput { frame } => {
            let bytes = BASE64.decode(&frame.data).unwrap();
            assert_eq!(bytes.len(), 4096 * 2);
        }
        other => panic!("unexpected outbound message: {other:?}"),
    }
    assert!(rx.try_recv().is_err(), "exactly one frame for one window");
}

#[tokio::test]
async fn test_large_batch_emits_multiple_frames() {
    let (tx, mut rx) = mpsc::channel(8);
    let sender = FrameSender::new(tx);
    let mut stage = CaptureStage::new(1024, 16_000);

    assert_eq!(stage.push(&vec![0.0f32; 1024 * 3 + 7], &sender), 3);

    let mut received = 0;
    while rx.try_recv().is_ok() {
        received += 1;
    }
    assert_eq!(received, 3);
    assert_eq!(stage.pending_len(), 7);
}

#[tokio::test]
async fn test_full_queue_drops_newest_frames() {
    // Capacity of one: the second and third windows have nowhere to go and
    // must be dropped rather than block the capture loop.
    let (tx, mut rx) = mpsc::channel(1);
    let sender = FrameSender::new(tx);
    let mut stage = CaptureStage::new(512, 16_000);

    stage.push(&vec![0.0f32; 512 * 3], &sender);

    assert_eq!(stage.frames_sent(), 3);
    assert_eq!(sender.dropped_frames(), 2);
    assert!(rx.try_recv().is_ok());
    assert!(rx.try_recv().is_err());
}

#[test]
fn test_resample_nearest_ratios() {
    let samples: Vec<f32> = (0..48).map(|i| i as f32).collect();

    let down = resample_nearest(&samples, 48_000, 16_000);
    assert_eq!(down.len(), 16);
    assert_eq!(down[0], 0.0);
    assert_eq!(down[1], 3.0);

    let same = resample_nearest(&samples, 16_000, 16_000);
    assert_eq!(same, samples);

    let up = resample_nearest(&[0.0, 1.0], 12_000, 24_000);
    assert_eq!(up.len(), 4);
}
