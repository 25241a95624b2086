// crates/mediaplay-core/src/constants.rs
//
// Tuning constants for the playback pipeline, transcribed where possible
// from player-sdl.c — the ffplay derivative this crate's behavior is
// grounded on.

/// Minimum SDL audio buffer size, in samples. (player-sdl.c SDL_AUDIO_MIN_BUFFER_SIZE)
pub const AUDIO_MIN_BUFFER_SIZE: u32 = 512;

/// Aggregate packet-queue byte size above which the demuxer throttles.
pub const MAX_QUEUE_SIZE: u64 = 15 * 1024 * 1024;

/// "Enough packets" per-stream threshold.
pub const MIN_FRAMES: i32 = 25;
pub const MIN_QUEUE_DURATION_SECS: f64 = 1.0;

/// Ring-buffer frame queue capacities.
pub const VIDEO_PICTURE_QUEUE_SIZE: usize = 3;
pub const SUBPICTURE_QUEUE_SIZE: usize = 16;
pub const SAMPLE_QUEUE_SIZE: usize = 9;
pub const FRAME_QUEUE_SIZE: usize = {
    // max of the three, mirrors the original's shared static slot-array capacity.
    let a = VIDEO_PICTURE_QUEUE_SIZE;
    let b = SUBPICTURE_QUEUE_SIZE;
    let c = SAMPLE_QUEUE_SIZE;
    let ab = if a > b { a } else { b };
    if ab > c { ab } else { c }
};

/// Max frame duration, seconds, for timestamp-discontinuous containers.
pub const MAX_FRAME_DURATION_DISCONTINUOUS: f64 = 10.0;
/// Max frame duration, seconds, otherwise.
pub const MAX_FRAME_DURATION_CONTINUOUS: f64 = 3600.0;

/// A/V sync thresholds (player-sdl.c).
pub const AV_SYNC_THRESHOLD_MIN: f64 = 0.04;
pub const AV_SYNC_THRESHOLD_MAX: f64 = 0.1;
pub const AV_SYNC_FRAMEDUP_THRESHOLD: f64 = 0.1;
/// Any A/V gap (or clock obsolescence gap) larger than this is treated as an
/// unrecoverable desync and the averaging accumulators are reset.
pub const AV_NOSYNC_THRESHOLD: f64 = 10.0;

/// Audio sync constants.
pub const AUDIO_DIFF_AVG_NB: u32 = 20;
pub const SAMPLE_CORRECTION_PERCENT_MAX: f64 = 10.0;

/// External clock speed control.
pub const EXTERNAL_CLOCK_MIN_FRAMES: i32 = 2;
pub const EXTERNAL_CLOCK_MAX_FRAMES: i32 = 10;
pub const EXTERNAL_CLOCK_SPEED_MIN: f64 = 0.900;
pub const EXTERNAL_CLOCK_SPEED_MAX: f64 = 1.010;
pub const EXTERNAL_CLOCK_SPEED_STEP: f64 = 0.001;

/// Refresh / polling timeouts (all 10ms).
pub const REFRESH_RATE_SECS: f64 = 0.01;
pub const DEMUX_THROTTLE_WAIT_SECS: f64 = 0.01;
pub const EOF_BACKOFF_SECS: f64 = 0.01;
pub const CURSOR_HIDE_SECS: f64 = 1.0;

/// Volume step, in dB, applied on each `9`/`0` keypress (logarithmic domain).
pub const VOLUME_STEP_DB: f64 = 0.75;
pub const VOLUME_MAX: i32 = 100;

/// Default/step seek intervals, seconds.
pub const SEEK_INTERVAL_DEFAULT: f64 = 10.0;
pub const SEEK_INTERVAL_UP_DOWN: f64 = 60.0;
pub const SEEK_INTERVAL_PAGE: f64 = 600.0;

/// Console status line cadence.
pub const STATUS_LINE_INTERVAL_SECS: f64 = 0.5;
