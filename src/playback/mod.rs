pub mod clock;
pub mod device;
pub mod scheduler;

pub use clock::{OutputClock, SampleClock};
pub use device::{PlaybackSink, SpeakerSink};
pub use scheduler::{decode_pcm16, DecodeError, PlaybackScheduler, ScheduledChunk};
