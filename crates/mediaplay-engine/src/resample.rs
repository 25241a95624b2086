// crates/mediaplay-engine/src/resample.rs
//
// Audio "filter graph" contract: resample/reformat decoder output to the
// device's target format, and stretch/shrink the sample count requested by
// `synchronize_audio`. Like `scale.rs`, this satisfies the
// rebuild-on-reconfiguration contract directly over
// `ffmpeg_the_third::software::resampling` rather than a real avfilter graph.

use ffmpeg_the_third::format::sample::Sample;
use ffmpeg_the_third::software::resampling::context::Context as SwrContext;
use ffmpeg_the_third::util::channel_layout::ChannelLayout;
use ffmpeg_the_third::util::frame::audio::Audio as AvAudioFrame;
use mediaplay_core::{PlayerError, Result};

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct AudioParams {
    pub format: Sample,
    pub channel_layout: ChannelLayout,
    pub rate: u32,
}

pub struct AudioResampler {
    ctx: SwrContext,
    src: AudioParams,
    dst: AudioParams,
}

impl AudioResampler {
    pub fn new(src: AudioParams, dst: AudioParams) -> Result<Self> {
        let ctx = SwrContext::get(src.format, src.channel_layout, src.rate, dst.format, dst.channel_layout, dst.rate)
            .map_err(|e| PlayerError::ConfigurationChange(format!("resampler init: {e}")))?;
        Ok(Self { ctx, src, dst })
    }

    pub fn reconfigure_if_needed(&mut self, src: AudioParams) -> Result<()> {
        if src == self.src {
            return Ok(());
        }
        let ctx = SwrContext::get(src.format, src.channel_layout, src.rate, self.dst.format, self.dst.channel_layout, self.dst.rate)
            .map_err(|e| PlayerError::ConfigurationChange(format!("resampler rebuild: {e}")))?;
        self.ctx = ctx;
        self.src = src;
        Ok(())
    }

    /// Resamples `frame`, asking the resampler to compress/stretch its
    /// output to `wanted_nb_samples` frames when that differs from the
    /// frame's natural sample count.
    ///
    /// Returns interleaved `f32` samples. If the resampler reports its
    /// internal buffer was entirely drained (a sign that the requested
    /// compensation can't be satisfied going forward), the caller should
    /// treat that as a warning condition and call `reset` before the next
    /// frame, not as a decode error.
    pub fn resample(&mut self, frame: &AvAudioFrame, wanted_nb_samples: usize) -> Result<(Vec<f32>, bool)> {
        let nb_samples = frame.samples();
        if wanted_nb_samples != nb_samples {
            let compensation_delta = (wanted_nb_samples as i64 - nb_samples as i64) as i32;
            // Spread the requested compensation over the next second of audio.
            let _ = self.ctx.set_compensation(compensation_delta, self.dst.rate as i32);
        }

        let mut out = AvAudioFrame::empty();
        self.ctx
            .run(frame, &mut out)
            .map_err(|e| PlayerError::ConfigurationChange(format!("resample: {e}")))?;

        let channels = self.dst.channel_layout.channels() as usize;
        let produced = out.samples();
        let raw = out.data(0);
        let want = produced * channels;
        let floats: &[f32] = bytemuck::cast_slice(&raw[..want * std::mem::size_of::<f32>()]);
        let buffer_drained = produced == 0 && nb_samples > 0;
        Ok((floats.to_vec(), buffer_drained))
    }

    /// Rebuilds the resampler from scratch — the §9 recovery path for the
    /// "output buffer entirely consumed" warning condition.
    pub fn reset(&mut self) -> Result<()> {
        let ctx = SwrContext::get(self.src.format, self.src.channel_layout, self.src.rate, self.dst.format, self.dst.channel_layout, self.dst.rate)
            .map_err(|e| PlayerError::ConfigurationChange(format!("resampler reset: {e}")))?;
        self.ctx = ctx;
        Ok(())
    }
}
