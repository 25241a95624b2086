// crates/mediaplay-core/src/stats.rs
//
// Numbers the console status line needs each half-second tick:
//   %7.2f %s:%7.3f fd=%4d aq=%5dKB vq=%5dKB sq=%5dB f=%Ld/%Ld
//
// Plain data, no ffmpeg/egui types, so it can cross the engine->ui channel.

#[derive(Clone, Copy, Debug, Default)]
pub struct PlaybackStats {
    /// Master clock value, seconds.
    pub master_clock: f64,
    /// Sync-type tag to print: "A-V", "M-V", "M-A", or "   ".
    pub sync_tag: SyncTag,
    /// master_clock - (the other clock), seconds; NaN if unavailable.
    pub av_diff: f64,
    /// frame_drops_early + frame_drops_late so far.
    pub frame_drops: u64,
    /// Audio packet queue size, bytes.
    pub audio_queue_bytes: u64,
    /// Video packet queue size, bytes.
    pub video_queue_bytes: u64,
    /// Subtitle packet queue size, bytes.
    pub subtitle_queue_bytes: u64,
    /// guess_correct_pts-equivalent counters.
    pub faulty_dts: i64,
    pub faulty_pts: i64,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SyncTag {
    #[default]
    Blank,
    AudioMasterVideoSlave,
    MasterVideo,
    MasterAudio,
}

impl SyncTag {
    pub fn as_str(self) -> &'static str {
        match self {
            SyncTag::Blank => "   ",
            SyncTag::AudioMasterVideoSlave => "A-V",
            SyncTag::MasterVideo => "M-V",
            SyncTag::MasterAudio => "M-A",
        }
    }
}

impl std::fmt::Display for PlaybackStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{:7.2} {}:{:7.3} fd={:4} aq={:5}KB vq={:5}KB sq={:5}B f={}/{} \r",
            self.master_clock,
            self.sync_tag.as_str(),
            self.av_diff,
            self.frame_drops,
            self.audio_queue_bytes / 1024,
            self.video_queue_bytes / 1024,
            self.subtitle_queue_bytes,
            self.faulty_dts,
            self.faulty_pts,
        )
    }
}
