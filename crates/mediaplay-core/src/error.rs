// crates/mediaplay-core/src/error.rs
//
// Error taxonomy for the playback engine. Only the kinds that can
// legitimately propagate out of a call are `Error` variants; the others
// (Transient, EndOfStream, Stale, DecodeError, SyncViolation) are control-flow
// states handled inline by the decoder/presenter loops and never bubble up
// as a `Result::Err` — see `mediaplay_engine::decoder::DecodeOutcome`.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum PlayerError {
    /// Malformed URL, missing required argument, unrecognized option.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Input container could not be opened, codec not found, codec open failed.
    #[error("failed to open media: {0}")]
    OpenFailure(String),

    /// Audio/video parameters changed and rebuilding the scaler/resampler failed.
    #[error("configuration change failed: {0}")]
    ConfigurationChange(String),

    /// Mutex/condvar creation, OOM, window/device creation, catastrophic state.
    #[error("fatal: {0}")]
    Fatal(String),
}

pub type Result<T> = std::result::Result<T, PlayerError>;
