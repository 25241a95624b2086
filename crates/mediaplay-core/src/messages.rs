// crates/mediaplay-core/src/messages.rs
//
// Types that cross the channel between mediaplay-engine and mediaplay-ui.
// No ffmpeg, no egui — just plain data, keeping the engine <-> UI contract
// free of either side's library types.

use crate::stats::PlaybackStats;

/// A decoded video frame ready for texture upload. Pixel data is RGBA8,
/// already scaled/converted by the engine's `VideoScaler`.
pub struct VideoFrame {
    pub width: u32,
    pub height: u32,
    pub data: Vec<u8>,
    pub pts: f64,
    pub serial: i64,
}

/// Messages pushed from engine threads to the UI thread. Video frames
/// themselves are not one of these: `PlayerSession::tick_video` returns the
/// due frame directly to its caller, since presentation is driven by the
/// caller's own refresh-timer tick rather than an async push.
pub enum EngineEvent {
    /// Periodic stats for the console status line, emitted every
    /// `STATUS_LINE_INTERVAL_SECS`.
    Stats(PlaybackStats),
    /// Fatal error — UI should unwind and exit nonzero.
    Fatal(String),
    /// End of stream reached and no loop/autoexit policy kept playback going.
    Eof,
}

/// Control commands accepted by `PlayerSession` from the UI/input thread.
#[derive(Clone, Debug)]
pub enum ControlCommand {
    TogglePause,
    ToggleMute,
    /// `sign` is +1 or -1; volume moves by at least one unit.
    AdjustVolume { sign: i32 },
    /// Relative seek, seconds.
    SeekRelative { seconds: f64 },
    /// Seek to an absolute fraction [0,1] of total duration or file size.
    SeekFraction { fraction: f64 },
    Step,
    CycleAudioStream,
    CycleVideoStream,
    CycleSubtitleStream,
    Quit,
}
