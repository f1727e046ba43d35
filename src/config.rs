use anyhow::Result;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub live: LiveConfig,
    pub audio: AudioConfig,
    pub notes: NotesConfig,
}

/// Remote live-session settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LiveConfig {
    /// WebSocket endpoint of the live model service
    pub endpoint: String,

    /// Environment variable holding the API key (never the key itself)
    pub api_key_env: String,

    /// Output voice identity requested from the model
    pub voice: String,

    /// Maximum number of characters of notes context included in the
    /// system instructions
    pub context_char_cap: usize,
}

impl Default for LiveConfig {
    fn default() -> Self {
        Self {
            endpoint: "wss://localhost:8443/v1/live".to_string(),
            api_key_env: "VOXNOTE_API_KEY".to_string(),
            voice: "aria".to_string(),
            context_char_cap: 8_000,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    /// Microphone sample rate sent to the model (16kHz PCM)
    pub capture_sample_rate: u32,

    /// Sample rate of synthesized audio received from the model (24kHz PCM)
    pub playback_sample_rate: u32,

    /// Capture framing window in samples; one outbound frame per window
    pub frame_window: usize,

    /// Delay added before the first chunk of a reply to absorb network jitter
    pub priming_delay_secs: f64,

    /// Preferred input device name (default device when unset)
    pub input_device: Option<String>,

    /// Save the model's synthesized replies to a WAV file per session
    pub record_replies: bool,

    /// Directory for reply recordings
    pub recordings_path: String,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            capture_sample_rate: 16_000,
            playback_sample_rate: 24_000,
            frame_window: 4096,
            priming_delay_secs: 2.0,
            input_device: None,
            record_replies: false,
            recordings_path: "recordings".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct NotesConfig {
    /// Directory where note drafts created during a conversation land
    pub drafts_path: String,
}

impl Default for NotesConfig {
    fn default() -> Self {
        Self {
            drafts_path: "notes/drafts".to_string(),
        }
    }
}

impl Config {
    pub fn load(path: &str) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(path))
            .build()?;

        Ok(settings.try_deserialize()?)
    }
}
