// crates/mediaplay-engine/src/scale.rs
//
// Video "filter graph" contract: convert decoder output to RGBA8 at a fixed
// output size, rebuilding the scaler whenever the input format/size changes.
// The internal wiring of a real avfilter graph is out of scope; this wraps
// SwsContext directly instead.

use ffmpeg_the_third::format::Pixel;
use ffmpeg_the_third::software::scaling::{context::Context as SwsContext, flag::Flags};
use ffmpeg_the_third::util::frame::video::Video as AvVideoFrame;
use mediaplay_core::{PlayerError, Result};

pub struct VideoScaler {
    ctx: SwsContext,
    in_format: Pixel,
    in_w: u32,
    in_h: u32,
    out_w: u32,
    out_h: u32,
}

impl VideoScaler {
    pub fn new(in_format: Pixel, in_w: u32, in_h: u32, out_w: u32, out_h: u32) -> Result<Self> {
        let ctx = SwsContext::get(in_format, in_w, in_h, Pixel::RGBA, out_w, out_h, Flags::BILINEAR)
            .map_err(|e| PlayerError::ConfigurationChange(format!("scaler init: {e}")))?;
        Ok(Self { ctx, in_format, in_w, in_h, out_w, out_h })
    }

    /// Rebuilds the underlying scaler only if the input format/size actually
    /// changed, matching video_thread's "rebuild only on change" behavior.
    pub fn reconfigure_if_needed(&mut self, in_format: Pixel, in_w: u32, in_h: u32) -> Result<()> {
        if in_format == self.in_format && in_w == self.in_w && in_h == self.in_h {
            return Ok(());
        }
        let ctx = SwsContext::get(in_format, in_w, in_h, Pixel::RGBA, self.out_w, self.out_h, Flags::BILINEAR)
            .map_err(|e| PlayerError::ConfigurationChange(format!("scaler rebuild: {e}")))?;
        self.ctx = ctx;
        self.in_format = in_format;
        self.in_w = in_w;
        self.in_h = in_h;
        Ok(())
    }

    /// Scales `frame` into packed RGBA8 rows (stride padding stripped).
    pub fn scale_to_rgba(&mut self, frame: &AvVideoFrame) -> Result<Vec<u8>> {
        let mut out = AvVideoFrame::empty();
        self.ctx
            .run(frame, &mut out)
            .map_err(|e| PlayerError::ConfigurationChange(format!("scale: {e}")))?;
        let stride = out.stride(0);
        let raw = out.data(0);
        let row_bytes = self.out_w as usize * 4;
        let data: Vec<u8> = (0..self.out_h as usize)
            .flat_map(|row| &raw[row * stride..row * stride + row_bytes])
            .copied()
            .collect();
        Ok(data)
    }

    pub fn out_dims(&self) -> (u32, u32) {
        (self.out_w, self.out_h)
    }
}
