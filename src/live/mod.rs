pub mod client;
pub mod controller;
pub mod messages;

pub use client::{FrameSender, InboundEvent, LiveClient};
pub use controller::{SessionController, SessionError, SessionState};
pub use messages::{
    ClientMessage, RealtimeFrame, ServerEvent, SessionSetup, ToolDeclaration,
};
