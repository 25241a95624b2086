// crates/mediaplay-core/src/lib.rs
//
// Types shared between mediaplay-engine and mediaplay-ui: configuration,
// the error taxonomy, tuning constants, and the plain-data messages that
// cross the engine/UI channel boundary. No ffmpeg, no egui in this crate.

pub mod config;
pub mod constants;
pub mod error;
pub mod messages;
pub mod stats;

pub use config::{Config, StartByBytes, SyncType};
pub use error::{PlayerError, Result};
