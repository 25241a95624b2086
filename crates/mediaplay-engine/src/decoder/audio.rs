// crates/mediaplay-engine/src/decoder/audio.rs
//
// Audio decode + resample-on-reconfigure.

use ffmpeg_the_third as ffmpeg;
use ffmpeg::codec::decoder::Audio as AvAudioDecoder;
use ffmpeg::util::frame::audio::Audio as AvAudioFrame;

use super::{DecodeOutcome, DecoderCore, StreamDecoder};
use crate::frame::{AudioPayload, Frame, FramePayload};
use crate::resample::{AudioParams, AudioResampler};

pub struct AudioDecoder {
    core: DecoderCore,
    codec: AvAudioDecoder,
    resampler: Option<AudioResampler>,
    target: AudioParams,
    last_src: Option<AudioParams>,
    last_serial_at_reconfigure: i64,
}

/// A decoded-but-not-yet-resampled frame, or the reason none is available.
/// Splitting decode from resample lets the caller (the audio presenter) learn
/// the frame's real `nb_samples` before it has to decide a `synchronize_audio`
/// stretch/shrink target — the two can't be done in one call, since the
/// wanted sample count depends on the very frame being decoded.
pub(crate) enum RawDecode {
    Frame(AvAudioFrame),
    Transient,
    Eof,
    Aborted,
}

impl AudioDecoder {
    pub fn new(core: DecoderCore, codec: AvAudioDecoder, target: AudioParams) -> Self {
        Self {
            core,
            codec,
            resampler: None,
            target,
            last_src: None,
            last_serial_at_reconfigure: -1,
        }
    }

    fn receive_one(&mut self) -> Option<AvAudioFrame> {
        let mut decoded = AvAudioFrame::empty();
        if self.codec.receive_frame(&mut decoded).is_ok() {
            Some(decoded)
        } else {
            None
        }
    }

    /// Pumps packets into the codec until a frame comes out, without
    /// resampling it yet.
    pub(crate) fn decode_raw_frame(&mut self) -> RawDecode {
        loop {
            if let Some(decoded) = self.receive_one() {
                return RawDecode::Frame(decoded);
            }

            let Some(entry) = self.core.next_input() else {
                return RawDecode::Aborted;
            };
            if entry.is_eof {
                let _ = self.codec.send_eof();
                return RawDecode::Eof;
            }
            if entry.is_flush() {
                self.flush();
                continue;
            }
            if let Some(packet) = &entry.packet {
                if self.codec.send_packet(packet).is_err() {
                    self.core.replay(entry);
                    return RawDecode::Transient;
                }
            }
        }
    }

    /// Reconfigures the resampler if the source format changed, then
    /// resamples `decoded` to exactly `wanted_nb_samples` output samples —
    /// the stretch/shrink compensation `synchronize_audio` already baked
    /// into that count.
    pub(crate) fn resample_frame(&mut self, decoded: AvAudioFrame, wanted_nb_samples: usize) -> DecodeOutcome {
        let src = AudioParams {
            format: decoded.format(),
            channel_layout: decoded.channel_layout(),
            rate: decoded.rate(),
        };
        let reconfigure = self.last_src != Some(src) || self.last_serial_at_reconfigure != self.core.pkt_serial;
        if reconfigure {
            match &mut self.resampler {
                Some(r) => {
                    if r.reconfigure_if_needed(src).is_err() {
                        return DecodeOutcome::Transient;
                    }
                }
                None => match AudioResampler::new(src, self.target) {
                    Ok(r) => self.resampler = Some(r),
                    Err(_) => return DecodeOutcome::Transient,
                },
            }
            self.last_src = Some(src);
            self.last_serial_at_reconfigure = self.core.pkt_serial;
        }

        let nb_samples = decoded.samples();
        let tb = (1i32, src.rate as i32);
        let pts = match decoded.pts() {
            Some(raw) => raw as f64 * tb.0 as f64 / tb.1 as f64,
            None => f64::NAN,
        };
        let duration = nb_samples as f64 / src.rate as f64;
        let pos = unsafe { (*decoded.as_ptr()).pkt_pos };

        let resampler = self.resampler.as_mut().unwrap();
        let (samples, drained) = match resampler.resample(&decoded, wanted_nb_samples) {
            Ok(v) => v,
            Err(_) => return DecodeOutcome::Transient,
        };
        if drained {
            // §9 warning condition, not a decode error: rebuild and
            // continue, the next frame will repopulate the buffer.
            let _ = resampler.reset();
        }

        let channels = self.target.channel_layout.channels() as u16;
        DecodeOutcome::Frame(Frame {
            payload: FramePayload::Audio(AudioPayload {
                nb_samples: samples.len() / channels.max(1) as usize,
                samples,
                sample_rate: self.target.rate,
                channels,
            }),
            pts,
            duration,
            pos,
            serial: self.core.pkt_serial,
        })
    }

    /// `wanted_nb_samples` comes from `synchronize_audio`; the audio
    /// presenter recomputes it per-pull using the decoded frame's own
    /// sample count and calls `decode_raw_frame`/`resample_frame` directly
    /// rather than this convenience wrapper. `None` means "no stretch/shrink
    /// compensation requested" (used by the plain `decode_one` trait path).
    pub fn decode_and_resample(&mut self, wanted_nb_samples: Option<usize>) -> DecodeOutcome {
        match self.decode_raw_frame() {
            RawDecode::Frame(decoded) => {
                let nb_samples = decoded.samples();
                self.resample_frame(decoded, wanted_nb_samples.unwrap_or(nb_samples))
            }
            RawDecode::Transient => DecodeOutcome::Transient,
            RawDecode::Eof => DecodeOutcome::Eof,
            RawDecode::Aborted => DecodeOutcome::Aborted,
        }
    }
}

impl StreamDecoder for AudioDecoder {
    fn core(&self) -> &DecoderCore {
        &self.core
    }
    fn core_mut(&mut self) -> &mut DecoderCore {
        &mut self.core
    }

    fn flush(&mut self) {
        self.codec.flush();
    }

    /// Audio's `decode_one` always requests a 1:1 sample count; the audio
    /// presenter calls `decode_raw_frame`/`resample_frame` directly when it
    /// needs stretch/shrink compensation.
    fn decode_one(&mut self) -> DecodeOutcome {
        self.decode_and_resample(None)
    }
}
