// Controller lifecycle tests that need no audio devices or network: the
// teardown path must be a safe no-op on an idle controller.

use anyhow::Result;
use std::sync::Arc;
use voxnote::config::Config;
use voxnote::live::{SessionController, SessionState};
use voxnote::notes::NoteSink;

struct NullNoteSink;

#[async_trait::async_trait]
impl NoteSink for NullNoteSink {
    async fn create_note(&self, _: Option<String>, _: Option<String>) -> Result<String> {
        Ok("discarded".to_string())
    }
}

fn idle_controller() -> SessionController {
    SessionController::new(Config::default(), Arc::new(NullNoteSink) as Arc<dyn NoteSink>)
}

#[tokio::test]
async fn test_stop_without_session_is_a_no_op() {
    let controller = idle_controller();

    assert_eq!(controller.state().await, SessionState::Idle);
    controller.stop().await.expect("stop on idle must succeed");
    assert_eq!(controller.state().await, SessionState::Idle);
}

#[tokio::test]
async fn test_stop_is_idempotent() {
    let controller = idle_controller();

    controller.stop().await.unwrap();
    controller.stop().await.unwrap();
    controller.stop().await.unwrap();

    assert_eq!(controller.state().await, SessionState::Idle);
}

#[tokio::test]
async fn test_fresh_controller_has_empty_transcript() {
    let controller = idle_controller();
    assert!(controller.transcript_snapshot().await.is_empty());
}

#[test]
fn test_config_defaults() {
    let config = Config::default();

    assert_eq!(config.audio.capture_sample_rate, 16_000);
    assert_eq!(config.audio.playback_sample_rate, 24_000);
    assert_eq!(config.audio.frame_window, 4096);
    assert!((config.audio.priming_delay_secs - 2.0).abs() < f64::EPSILON);
    assert!(!config.audio.record_replies);
    assert_eq!(config.live.api_key_env, "VOXNOTE_API_KEY");
    assert_eq!(config.live.context_char_cap, 8_000);
    assert_eq!(config.notes.drafts_path, "notes/drafts");
}
