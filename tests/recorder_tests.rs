// Reply-recording tests: the WAV file must be readable after finalize and
// carry the session's sample rate.

use voxnote::audio::SessionRecorder;

#[test]
fn test_finalized_recording_reads_back() {
    let dir = tempfile::tempdir().unwrap();
    let mut recorder = SessionRecorder::create(dir.path(), "voice-test", 24_000).unwrap();

    let pcm: Vec<i16> = (0..1000).map(|i| (i % 100) as i16).collect();
    recorder.write(&pcm).unwrap();
    recorder.write(&pcm).unwrap();
    assert_eq!(recorder.samples_written(), 2000);

    let path = recorder.finalize().unwrap();
    assert!(path.ends_with("voice-test-replies.wav"));

    let reader = hound::WavReader::open(&path).unwrap();
    let spec = reader.spec();
    assert_eq!(spec.sample_rate, 24_000);
    assert_eq!(spec.channels, 1);
    assert_eq!(spec.bits_per_sample, 16);
    assert_eq!(reader.len(), 2000);
}

#[test]
fn test_drop_without_finalize_still_produces_valid_wav() {
    let dir = tempfile::tempdir().unwrap();
    let path = {
        let mut recorder = SessionRecorder::create(dir.path(), "voice-drop", 24_000).unwrap();
        recorder.write(&[1i16, 2, 3, 4]).unwrap();
        recorder.path().to_path_buf()
    };

    let reader = hound::WavReader::open(&path).unwrap();
    assert_eq!(reader.len(), 4);
}
