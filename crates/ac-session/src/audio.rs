//! Audio post-processing
//!
//! End-of-frame (and mid-frame) sound pass: rewind reversal, recorder
//! taps, fast-forward resampling or discard, volume scaling and mono
//! folding. Operates in place on the portion of the sound buffer past
//! the already-mixed watermark.

use ac_module::EmulateSpec;
use ac_record::WavRecord;
use tracing::warn;

use crate::resampler::FfResampler;

/// Rolloff passed to the resampler when the speed multiplier changes
const FF_ROLLOFF: f64 = 0.9965;

/// Per-frame inputs the audio pass needs from the session
pub struct AudioCtx<'a> {
    pub wav: &'a mut Option<WavRecord>,
    /// An AV recorder is attached and wants a full-quality tap
    pub av_attached: bool,
    pub soundchan: usize,
    pub force_mono: bool,
    pub ff_discard: bool,
}

pub struct AudioPost {
    resampler: FfResampler,
    last_multiplier: f64,
    /// Unscaled copy of this frame's samples for the AV recorder, only
    /// filled when scaling would mangle them
    pub pristine: Vec<i16>,
    /// Volume actually applied this frame
    pub volume_eff: f64,
    /// Speed multiplier actually applied this frame
    pub multiplier_eff: f64,
}

impl AudioPost {
    pub fn new() -> Self {
        Self {
            resampler: FfResampler::new(),
            last_multiplier: 1.0,
            pristine: Vec::new(),
            volume_eff: 1.0,
            multiplier_eff: 1.0,
        }
    }

    /// Called once per frame before the module runs.
    pub fn begin_frame(&mut self) {
        self.volume_eff = 1.0;
        self.multiplier_eff = 1.0;
        self.pristine.clear();
    }

    /// Called when the sound format (rate) changes.
    pub fn sound_format_changed(&mut self, rate: f64) {
        self.resampler.set_buffer_size(((rate as usize) / 2) * 2);
        self.resampler.clear();
    }

    pub fn process(&mut self, spec: &mut EmulateSpec, ctx: &mut AudioCtx<'_>) {
        if spec.sound_volume != 1.0 {
            self.volume_eff = spec.sound_volume;
        }
        if spec.sound_multiplier != 1.0 {
            self.multiplier_eff = spec.sound_multiplier;
        }

        if !spec.sound_enabled() || spec.sound_frames <= spec.sound_frames_alms {
            return;
        }

        let chan = ctx.soundchan;
        let alms = spec.sound_frames_alms;
        let mut frames = spec.sound_frames - alms;
        let start = alms * chan;

        if ctx.av_attached && (self.volume_eff != 1.0 || self.multiplier_eff != 1.0) {
            self.pristine
                .extend_from_slice(&spec.sound_buf[start..start + frames * chan]);
        }

        if spec.need_sound_reverse {
            reverse_frames(&mut spec.sound_buf[start..start + frames * chan], chan);
        }

        if let Some(wav) = ctx.wav.as_mut() {
            if let Err(e) = wav.write_sound(&spec.sound_buf[start..start + frames * chan], frames)
            {
                warn!("sound log write failed, detaching: {e}");
                *ctx.wav = None;
            }
        }

        if self.multiplier_eff != 1.0 {
            if ctx.ff_discard {
                // Cheap fast-forward: keep every Nth frame. Only kicks
                // in once a full stride is available.
                if frames as f64 >= self.multiplier_eff {
                    frames = decimate_frames(
                        &mut spec.sound_buf[start..],
                        frames,
                        chan,
                        self.multiplier_eff,
                    );
                }
            } else {
                if self.multiplier_eff != self.last_multiplier {
                    self.resampler.set_time_ratio(self.multiplier_eff, FF_ROLLOFF);
                    self.last_multiplier = self.multiplier_eff;
                }
                let room = spec.sound_max_frames - alms;
                if chan == 2 {
                    self.resampler.write(&spec.sound_buf[start..], frames);
                    frames = self.resampler.read(&mut spec.sound_buf[start..], room);
                } else {
                    // Resampler wants stereo; widen, run, narrow
                    let mut wide = Vec::with_capacity(frames * 2);
                    for &s in &spec.sound_buf[start..start + frames] {
                        wide.push(s);
                        wide.push(s);
                    }
                    self.resampler.write(&wide, frames);
                    frames = self.resampler.read_mono(&mut spec.sound_buf[start..], room);
                }
                if self.resampler.overflowed() {
                    warn!("fast-forward resampler overflow, dropping buffered sound");
                    self.resampler.clear();
                }
            }
        }

        if self.volume_eff != 1.0 {
            scale_volume(
                &mut spec.sound_buf[start..start + frames * chan],
                self.volume_eff,
            );
        }

        if ctx.force_mono && chan == 2 {
            for i in 0..frames {
                let l = spec.sound_buf[start + i * 2] as i32;
                let r = spec.sound_buf[start + i * 2 + 1] as i32;
                let mixed = ((l + r) >> 1) as i16;
                spec.sound_buf[start + i * 2] = mixed;
                spec.sound_buf[start + i * 2 + 1] = mixed;
            }
        }

        spec.sound_frames = alms + frames;
    }
}

impl Default for AudioPost {
    fn default() -> Self {
        Self::new()
    }
}

/// Reverses sample frames in place, keeping channels interleaved.
fn reverse_frames(buf: &mut [i16], chan: usize) {
    let frames = buf.len() / chan;
    for i in 0..frames / 2 {
        let j = frames - 1 - i;
        for ch in 0..chan {
            buf.swap(i * chan + ch, j * chan + ch);
        }
    }
}

/// Keeps every `multiplier`th frame, compacting toward the front.
/// Returns the new frame count.
fn decimate_frames(buf: &mut [i16], frames: usize, chan: usize, multiplier: f64) -> usize {
    let mut out = 0usize;
    let mut pos = 0.0f64;
    while (pos as usize) < frames {
        let src = pos as usize;
        for ch in 0..chan {
            buf[out * chan + ch] = buf[src * chan + ch];
        }
        out += 1;
        pos += multiplier;
    }
    out
}

fn scale_volume(buf: &mut [i16], volume: f64) {
    if volume < 1.0 {
        let factor = (volume * 16384.0) as i32;
        for s in buf.iter_mut() {
            *s = ((*s as i32 * factor) >> 14) as i16;
        }
    } else {
        let factor = (volume * 256.0) as i32;
        for s in buf.iter_mut() {
            let v = (((*s as i32 * factor) >> 8) + 32768).clamp(0, 65535) - 32768;
            *s = v as i16;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ac_module::{PixelFormat, Surface};

    fn spec_with_sound(samples: &[i16]) -> EmulateSpec {
        let mut spec = EmulateSpec::new(Surface::new(8, 8, PixelFormat::xrgb8888()));
        spec.enable_sound(48000.0, 4096, 2);
        spec.sound_buf[..samples.len()].copy_from_slice(samples);
        spec.sound_frames = samples.len() / 2;
        spec
    }

    fn ctx<'a>(wav: &'a mut Option<WavRecord>) -> AudioCtx<'a> {
        AudioCtx {
            wav,
            av_attached: false,
            soundchan: 2,
            force_mono: false,
            ff_discard: false,
        }
    }

    #[test]
    fn test_half_volume() {
        let mut spec = spec_with_sound(&[1000, -1000, 200, -200]);
        spec.sound_volume = 0.5;
        let mut wav = None;
        let mut post = AudioPost::new();
        post.begin_frame();
        post.process(&mut spec, &mut ctx(&mut wav));
        assert_eq!(&spec.sound_buf[..4], &[500, -500, 100, -100]);
    }

    #[test]
    fn test_boost_clamps_extremes() {
        let mut spec = spec_with_sound(&[32767, -32768, 100, -100]);
        spec.sound_volume = 2.0;
        let mut wav = None;
        let mut post = AudioPost::new();
        post.begin_frame();
        post.process(&mut spec, &mut ctx(&mut wav));
        assert_eq!(spec.sound_buf[0], 32767);
        assert_eq!(spec.sound_buf[1], -32768);
        assert_eq!(spec.sound_buf[2], 200);
        assert_eq!(spec.sound_buf[3], -200);
    }

    #[test]
    fn test_force_mono_floors() {
        let mut spec = spec_with_sound(&[-3, 0, 5, 2]);
        let mut wav = None;
        let mut post = AudioPost::new();
        post.begin_frame();
        let mut c = ctx(&mut wav);
        c.force_mono = true;
        post.process(&mut spec, &mut c);
        // (-3 + 0) >> 1 floors to -2, (5 + 2) >> 1 floors to 3; the
        // mix lands in BOTH interleaved slots of each frame
        assert_eq!(&spec.sound_buf[..4], &[-2, -2, 3, 3]);
        assert_eq!(spec.sound_frames, 2);
    }

    #[test]
    fn test_reverse_respects_watermark() {
        let mut spec = spec_with_sound(&[1, 10, 2, 20, 3, 30, 4, 40]);
        spec.sound_frames_alms = 1;
        spec.need_sound_reverse = true;
        let mut wav = None;
        let mut post = AudioPost::new();
        post.begin_frame();
        post.process(&mut spec, &mut ctx(&mut wav));
        // Frame 0 untouched, frames 1..4 reversed
        assert_eq!(&spec.sound_buf[..8], &[1, 10, 4, 40, 3, 30, 2, 20]);
    }

    #[test]
    fn test_discard_mode_halves() {
        let mut spec = spec_with_sound(&[0, 0, 1, 1, 2, 2, 3, 3]);
        spec.sound_multiplier = 2.0;
        let mut wav = None;
        let mut post = AudioPost::new();
        post.begin_frame();
        let mut c = ctx(&mut wav);
        c.ff_discard = true;
        post.process(&mut spec, &mut c);
        assert_eq!(spec.sound_frames, 2);
        assert_eq!(&spec.sound_buf[..4], &[0, 0, 2, 2]);
    }

    #[test]
    fn test_discard_skipped_below_stride() {
        let mut spec = spec_with_sound(&[7, 7]);
        spec.sound_multiplier = 4.0;
        let mut wav = None;
        let mut post = AudioPost::new();
        post.begin_frame();
        let mut c = ctx(&mut wav);
        c.ff_discard = true;
        post.process(&mut spec, &mut c);
        assert_eq!(spec.sound_frames, 1);
        assert_eq!(&spec.sound_buf[..2], &[7, 7]);
    }

    #[test]
    fn test_pristine_tap_only_when_scaling() {
        let mut wav = None;
        let mut post = AudioPost::new();

        let mut spec = spec_with_sound(&[9, 9]);
        post.begin_frame();
        let mut c = ctx(&mut wav);
        c.av_attached = true;
        post.process(&mut spec, &mut c);
        assert!(post.pristine.is_empty());

        let mut spec = spec_with_sound(&[9, 9]);
        spec.sound_volume = 0.5;
        post.begin_frame();
        let mut c = ctx(&mut wav);
        c.av_attached = true;
        post.process(&mut spec, &mut c);
        assert_eq!(post.pristine, vec![9, 9]);
        assert_eq!(&spec.sound_buf[..2], &[4, 4]);
    }

    #[test]
    fn test_pristine_taken_before_reversal() {
        let mut wav = None;
        let mut post = AudioPost::new();
        post.begin_frame();

        let mut spec = spec_with_sound(&[1, 10, 2, 20, 3, 30]);
        spec.sound_volume = 0.5;
        spec.need_sound_reverse = true;
        let mut c = ctx(&mut wav);
        c.av_attached = true;
        post.process(&mut spec, &mut c);

        // Recorder tap keeps forward time order
        assert_eq!(post.pristine, vec![1, 10, 2, 20, 3, 30]);
        // Playback path is reversed, then scaled
        assert_eq!(&spec.sound_buf[..6], &[1, 15, 1, 10, 0, 5]);
    }

    #[test]
    fn test_caller_values_override_effective() {
        let mut wav = None;
        let mut post = AudioPost::new();
        post.begin_frame();
        post.volume_eff = 0.25; // recorder pin
        let mut spec = spec_with_sound(&[1000, 1000]);
        spec.sound_volume = 0.5;
        post.process(&mut spec, &mut ctx(&mut wav));
        // Caller-set volume wins over the pinned value
        assert_eq!(&spec.sound_buf[..2], &[500, 500]);
    }
}
