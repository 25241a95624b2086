// crates/mediaplay-engine/src/frame.rs
//
// Decoded output units held in a FrameQueue. Every frame carries
// pts/duration/pos/serial regardless of payload kind.

use ffmpeg_the_third::format::Pixel;

pub struct VideoPayload {
    pub data: Vec<u8>, // RGBA8, already scaled by VideoScaler
    pub width: u32,
    pub height: u32,
    pub format: Pixel,
    pub sample_aspect_ratio: f64,
    pub flip_vertical: bool,
}

pub struct AudioPayload {
    pub samples: Vec<f32>, // interleaved, already resampled to target format
    pub sample_rate: u32,
    pub channels: u16,
    pub nb_samples: usize,
}

pub struct SubtitlePayload {
    pub regions: Vec<Vec<u8>>, // opaque bitmap regions, blending is out of scope
    pub start_display_ms: i64,
    pub end_display_ms: i64,
    pub width: u32,
    pub height: u32,
}

pub enum FramePayload {
    Video(VideoPayload),
    Audio(AudioPayload),
    Subtitle(SubtitlePayload),
}

/// One decoded unit plus the bookkeeping fields common to all frame kinds:
/// presentation time in seconds, estimated duration in seconds, source byte
/// offset, and a serial.
pub struct Frame {
    pub payload: FramePayload,
    pub pts: f64,
    pub duration: f64,
    pub pos: i64,
    pub serial: i64,
}

impl Frame {
    pub fn as_video(&self) -> Option<&VideoPayload> {
        match &self.payload {
            FramePayload::Video(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_subtitle(&self) -> Option<&SubtitlePayload> {
        match &self.payload {
            FramePayload::Subtitle(s) => Some(s),
            _ => None,
        }
    }
}
