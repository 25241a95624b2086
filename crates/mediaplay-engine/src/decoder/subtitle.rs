// crates/mediaplay-engine/src/decoder/subtitle.rs
//
// Subtitle decode. Bitmap blending is out of scope; regions are carried
// opaquely for the presenter to hand to a sink.

use ffmpeg_the_third as ffmpeg;
use ffmpeg::codec::decoder::Subtitle as AvSubtitleDecoder;

use super::{DecodeOutcome, DecoderCore, StreamDecoder};
use crate::frame::{Frame, FramePayload, SubtitlePayload};

pub struct SubtitleDecoder {
    core: DecoderCore,
    codec: AvSubtitleDecoder,
    width: u32,
    height: u32,
}

impl SubtitleDecoder {
    pub fn new(core: DecoderCore, codec: AvSubtitleDecoder, width: u32, height: u32) -> Self {
        Self { core, codec, width, height }
    }
}

impl StreamDecoder for SubtitleDecoder {
    fn core(&self) -> &DecoderCore {
        &self.core
    }
    fn core_mut(&mut self) -> &mut DecoderCore {
        &mut self.core
    }

    fn flush(&mut self) {
        // ffmpeg's subtitle decoders have no dedicated flush() in the
        // bindings surface used here; a fresh decode cycle after a flush
        // sentinel is sufficient since subtitle decode is always one-packet-
        // in, one-subtitle-out (no internal reorder buffer to drain).
    }

    fn decode_one(&mut self) -> DecodeOutcome {
        loop {
            let Some(entry) = self.core.next_input() else {
                return DecodeOutcome::Aborted;
            };
            if entry.is_eof {
                return DecodeOutcome::Eof;
            }
            if entry.is_flush() {
                self.flush();
                continue;
            }
            let Some(packet) = &entry.packet else { continue };

            let mut sub = ffmpeg::Subtitle::new();
            let got = match self.codec.decode(packet, &mut sub) {
                Ok(got) => got,
                Err(_) => continue, // drop and continue on a decode error
            };
            if !got {
                continue;
            }

            // `avcodec_decode_subtitle2` rescales the subtitle's own pts to
            // AV_TIME_BASE internally; using the packet's pts directly would
            // only be correct by coincidence for a stream whose time_base
            // happens to equal 1/AV_TIME_BASE.
            let pts = match sub.pts() {
                Some(raw) => raw as f64 / ffmpeg::ffi::AV_TIME_BASE as f64,
                None => 0.0,
            };
            // `start()`/`end()` are durations relative to this subtitle's own
            // pts, not absolute timestamps; rebase them here so
            // `subtitle_expired` can compare directly against the video clock.
            let pts_ms = (pts * 1000.0) as i64;
            let start_display_ms = pts_ms + sub.start() as i64;
            let end_display_ms = pts_ms + sub.end() as i64;

            return DecodeOutcome::Frame(Frame {
                payload: FramePayload::Subtitle(SubtitlePayload {
                    regions: Vec::new(),
                    start_display_ms,
                    end_display_ms,
                    width: self.width,
                    height: self.height,
                }),
                pts,
                duration: 0.0,
                pos: packet.position(),
                serial: self.core.pkt_serial,
            });
        }
    }
}
