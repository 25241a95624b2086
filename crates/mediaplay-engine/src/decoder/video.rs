// crates/mediaplay-engine/src/decoder/video.rs
//
// Video decode + framedrop-before-enqueue.

use ffmpeg_the_third as ffmpeg;
use ffmpeg::codec::decoder::Video as AvVideoDecoder;
use ffmpeg::util::frame::video::Video as AvVideoFrame;

use super::{DecodeOutcome, DecoderCore, StreamDecoder};
use crate::frame::{Frame, FramePayload, VideoPayload};
use crate::scale::VideoScaler;

pub struct VideoDecoder {
    core: DecoderCore,
    codec: AvVideoDecoder,
    scaler: Option<VideoScaler>,
    time_base: (i32, i32),
    frame_duration: f64,
    out_w: u32,
    out_h: u32,
    last_pts: i64,
    /// Attached-picture (cover art) streams never go through the framedrop
    /// path.
    pub is_attached_picture: bool,
    pub framedrop_enabled: bool,
    pub frame_drops_early: u64,
}

impl VideoDecoder {
    pub fn new(
        core: DecoderCore,
        codec: AvVideoDecoder,
        time_base: (i32, i32),
        frame_rate: Option<(i32, i32)>,
        out_w: u32,
        out_h: u32,
        is_attached_picture: bool,
        framedrop_enabled: bool,
    ) -> Self {
        let frame_duration = match frame_rate {
            Some((num, den)) if num != 0 && den != 0 => den as f64 / num as f64,
            _ => 0.0,
        };
        Self {
            core,
            codec,
            scaler: None,
            time_base,
            frame_duration,
            out_w,
            out_h,
            last_pts: i64::MIN,
            is_attached_picture,
            framedrop_enabled,
            frame_drops_early: 0,
        }
    }

    fn pts_seconds(&self, raw: i64) -> f64 {
        raw as f64 * self.time_base.0 as f64 / self.time_base.1 as f64
    }

    fn receive_one(&mut self) -> Option<AvVideoFrame> {
        let mut decoded = AvVideoFrame::empty();
        if self.codec.receive_frame(&mut decoded).is_ok() {
            Some(decoded)
        } else {
            None
        }
    }

    /// Returns the frame's pts in seconds given the decoded frame and the
    /// last packet dts seen, falling back from the best-effort timestamp to
    /// the packet dts when the frame carries no pts of its own.
    fn resolve_pts(&mut self, frame: &AvVideoFrame, packet_dts: Option<i64>) -> f64 {
        match frame.pts().or(packet_dts) {
            Some(raw) => {
                self.last_pts = raw;
                self.pts_seconds(raw)
            }
            None => {
                self.core.faulty_pts += 1;
                f64::NAN
            }
        }
    }
}

impl StreamDecoder for VideoDecoder {
    fn core(&self) -> &DecoderCore {
        &self.core
    }
    fn core_mut(&mut self) -> &mut DecoderCore {
        &mut self.core
    }

    fn flush(&mut self) {
        self.codec.flush();
        self.last_pts = i64::MIN;
    }

    fn decode_one(&mut self) -> DecodeOutcome {
        loop {
            if let Some(decoded) = self.receive_one() {
                let pts = self.resolve_pts(&decoded, None);
                let duration = if self.frame_duration > 0.0 { self.frame_duration } else { 0.0 };
                // SAFETY: reads a plain i64 field off the underlying AVFrame.
                let pos = unsafe { (*decoded.as_ptr()).pkt_pos };

                let scaler = match &mut self.scaler {
                    Some(s) => s,
                    None => {
                        let s = match VideoScaler::new(decoded.format(), decoded.width(), decoded.height(), self.out_w, self.out_h) {
                            Ok(s) => s,
                            Err(_) => return DecodeOutcome::Transient,
                        };
                        self.scaler = Some(s);
                        self.scaler.as_mut().unwrap()
                    }
                };
                if scaler.reconfigure_if_needed(decoded.format(), decoded.width(), decoded.height()).is_err() {
                    return DecodeOutcome::Transient;
                }
                let data = match scaler.scale_to_rgba(&decoded) {
                    Ok(d) => d,
                    Err(_) => return DecodeOutcome::Transient,
                };
                let (w, h) = scaler.out_dims();

                return DecodeOutcome::Frame(Frame {
                    payload: FramePayload::Video(VideoPayload {
                        data,
                        width: w,
                        height: h,
                        format: decoded.format(),
                        sample_aspect_ratio: decoded.aspect_ratio().numerator() as f64
                            / decoded.aspect_ratio().denominator().max(1) as f64,
                        flip_vertical: false,
                    }),
                    pts,
                    duration,
                    pos,
                    serial: self.core.pkt_serial,
                });
            }

            let Some(entry) = self.core.next_input() else {
                return DecodeOutcome::Aborted;
            };
            if entry.is_eof {
                let _ = self.codec.send_eof();
                return DecodeOutcome::Eof;
            }
            if entry.is_flush() {
                self.flush();
                continue;
            }
            if let Some(packet) = &entry.packet {
                if self.codec.send_packet(packet).is_err() {
                    self.core.replay(entry);
                    return DecodeOutcome::Transient;
                }
            }
        }
    }
}

/// Whether a just-decoded frame should be dropped before it reaches the
/// frame queue.
pub fn should_drop_early(framedrop_enabled: bool, master_is_video: bool, pts: f64, master_clock: f64, frame_last_filter_delay: f64) -> bool {
    if !framedrop_enabled || master_is_video || pts.is_nan() || master_clock.is_nan() {
        return false;
    }
    pts - master_clock < frame_last_filter_delay
}
