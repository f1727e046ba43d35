use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Who produced a transcript fragment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Speaker {
    User,
    Model,
}

/// One finalized or in-progress entry in the conversation log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptEntry {
    pub speaker: Speaker,
    pub text: String,
    /// When this entry was opened
    pub started_at: DateTime<Utc>,
}

/// Merges streaming partial transcription fragments into stable per-turn log
/// entries for each speaker.
///
/// Implemented as a reducer over `(last_speaker, accumulator)` rather than a
/// rescan of the log: a delta for the speaker who owns the newest entry
/// replaces that entry's text in place (live "typing" updates); anything else
/// opens a fresh entry. A turn-complete marker resets both accumulators so
/// the next utterance from either speaker starts a new entry.
#[derive(Debug, Default)]
pub struct TranscriptAggregator {
    user_text: String,
    model_text: String,
    last_speaker: Option<Speaker>,
    log: Vec<TranscriptEntry>,
}

impl TranscriptAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply a partial-transcription delta for `speaker`.
    pub fn apply_delta(&mut self, speaker: Speaker, delta: &str) {
        let accumulator = match speaker {
            Speaker::User => &mut self.user_text,
            Speaker::Model => &mut self.model_text,
        };
        accumulator.push_str(delta);
        let text = accumulator.clone();

        if self.last_speaker == Some(speaker) {
            if let Some(entry) = self.log.last_mut() {
                entry.text = text;
                return;
            }
        }

        self.log.push(TranscriptEntry {
            speaker,
            text,
            started_at: Utc::now(),
        });
        self.last_speaker = Some(speaker);
    }

    /// The current turn finished: reset the working accumulators.
    ///
    /// The log itself is retained; only the reducer state is cleared.
    pub fn complete_turn(&mut self) {
        self.user_text.clear();
        self.model_text.clear();
        self.last_speaker = None;
    }

    /// Ordered `{speaker, text}` log for display collaborators.
    pub fn entries(&self) -> &[TranscriptEntry] {
        &self.log
    }

    pub fn len(&self) -> usize {
        self.log.len()
    }

    pub fn is_empty(&self) -> bool {
        self.log.is_empty()
    }
}
