//! OSC MIDI Companion
//!
//! Receives control messages from a remote app over OSC, translates them to
//! MIDI and writes them to a local output port. The companion announces its
//! address on the LAN so the remote can find it.

pub mod cli;
pub mod config;
pub mod discovery;
pub mod error;
pub mod message;
pub mod midi;
pub mod output;
pub mod paths;
pub mod platform;
pub mod rate_limiter;
pub mod server;
pub mod session;
pub mod translator;
