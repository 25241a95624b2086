// crates/mediaplay-core/src/config.rs
//
// Immutable playback configuration, built once by `clap` and handed into the
// player session by value.
//
// Deliberately does not cover the full ffplay CLI surface (format/codec
// enumeration, -report, -h topics, license banner) — those are out-of-scope
// external collaborators.

use clap::{Parser, ValueEnum};

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum SyncType {
    Audio,
    Video,
    #[value(name = "ext")]
    External,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum StartByBytes {
    #[value(name = "-1")]
    Auto,
    #[value(name = "0")]
    No,
    #[value(name = "1")]
    Yes,
}

#[derive(Parser, Clone, Debug)]
#[command(name = "mediaplay", about = "Concurrent A/V playback engine")]
pub struct Config {
    /// Media file path or URL.
    pub input: String,

    /// Disable audio.
    #[arg(long = "an")]
    pub audio_disable: bool,
    /// Disable video.
    #[arg(long = "vn")]
    pub video_disable: bool,
    /// Disable subtitles.
    #[arg(long = "sn")]
    pub subtitle_disable: bool,

    /// Select an explicit audio stream specifier.
    #[arg(long = "ast")]
    pub wanted_stream_audio: Option<String>,
    /// Select an explicit video stream specifier.
    #[arg(long = "vst")]
    pub wanted_stream_video: Option<String>,
    /// Select an explicit subtitle stream specifier.
    #[arg(long = "sst")]
    pub wanted_stream_subtitle: Option<String>,

    /// Seek to this position (seconds) before playback starts.
    #[arg(long = "ss", default_value_t = 0.0)]
    pub start_time: f64,
    /// Stop after this many seconds of playback.
    #[arg(long)]
    pub duration: Option<f64>,

    /// Seek by bytes instead of time.
    #[arg(long = "bytes", value_enum, default_value = "-1")]
    pub seek_by_bytes: StartByBytes,
    /// Seconds moved per arrow-key press.
    #[arg(long = "seek-interval", default_value_t = crate::constants::SEEK_INTERVAL_DEFAULT)]
    pub seek_interval: f64,

    /// Master clock selection.
    #[arg(long, value_enum, default_value = "audio")]
    pub sync: SyncType,

    /// Initial volume, 0..100.
    #[arg(long, default_value_t = 100)]
    pub volume: i32,

    /// Exit automatically at end of stream.
    #[arg(long)]
    pub autoexit: bool,
    /// Number of times to loop playback (0 = infinite).
    #[arg(long, default_value_t = 1)]
    pub loop_count: i32,
    /// Drop late video frames to catch up with the master clock.
    #[arg(long)]
    pub framedrop: bool,
    /// Do not limit input buffer size (useful for realtime streams).
    #[arg(long)]
    pub infbuf: bool,

    /// Degrade video decoding (1/2/3 = half/quarter/eighth resolution).
    #[arg(long, default_value_t = 0)]
    pub lowres: i32,
    /// Non-spec-compliant optimizations for speed.
    #[arg(long)]
    pub fast: bool,
    /// Generate missing PTS if necessary.
    #[arg(long)]
    pub genpts: bool,

    /// Run without creating a window — still decodes, plays audio, emits
    /// console stats. Used by integration tests and headless deployments.
    #[arg(long)]
    pub nodisp: bool,
    /// Start in fullscreen.
    #[arg(long)]
    pub fullscreen: bool,
    /// Window title override.
    #[arg(long)]
    pub window_title: Option<String>,

    /// `tracing_subscriber::EnvFilter` directive, e.g. "info" or "mediaplay_engine=debug".
    #[arg(long, default_value = "info")]
    pub loglevel: String,
}

impl Config {
    pub fn max_frame_duration(&self) -> f64 {
        // Real ffplay keys this off whether the input format's start_time is
        // known/continuous; we approximate via genpts since both signal a
        // container whose timestamps are not to be trusted at face value.
        if self.genpts {
            crate::constants::MAX_FRAME_DURATION_DISCONTINUOUS
        } else {
            crate::constants::MAX_FRAME_DURATION_CONTINUOUS
        }
    }
}
