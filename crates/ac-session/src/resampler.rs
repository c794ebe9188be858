//! Fast-forward resampler
//!
//! Converts the per-frame sound output to a different playback rate
//! when the speed multiplier is not 1.0. Works on interleaved stereo
//! i16 frames and uses 4-point Catmull-Rom interpolation.

use std::collections::VecDeque;

/// How many input frames advance per output frame. 1.0 is passthrough.
const DEFAULT_RATIO: f64 = 1.0;

pub struct FfResampler {
    /// Interleaved stereo input pending consumption
    input: Vec<i16>,
    /// Interleaved stereo output ready to read
    output: VecDeque<i16>,
    /// Output capacity in frames; writes past it are dropped
    max_frames: usize,
    position: f64,
    ratio: f64,
    rolloff: f64,
    /// Low-pass state per channel, active when downsampling
    lp: [f32; 2],
    overflowed: bool,
}

impl FfResampler {
    pub fn new() -> Self {
        Self {
            input: Vec::new(),
            output: VecDeque::new(),
            max_frames: 0,
            position: 0.0,
            ratio: DEFAULT_RATIO,
            rolloff: 1.0,
            lp: [0.0; 2],
            overflowed: false,
        }
    }

    /// Sets the input-frames-per-output-frame ratio. `rolloff` scales
    /// the low-pass cutoff used when decimating, below 1.0 to leave
    /// transition-band headroom.
    pub fn set_time_ratio(&mut self, ratio: f64, rolloff: f64) {
        self.ratio = ratio.max(0.01);
        self.rolloff = rolloff.clamp(0.1, 1.0);
    }

    pub fn time_ratio(&self) -> f64 {
        self.ratio
    }

    /// Sets the output capacity in frames.
    pub fn set_buffer_size(&mut self, frames: usize) {
        self.max_frames = frames;
        while self.output.len() > frames * 2 {
            self.output.pop_front();
        }
    }

    /// Output frames ready to read.
    pub fn avail(&self) -> usize {
        self.output.len() / 2
    }

    /// True if a write since the last clear dropped frames.
    pub fn overflowed(&self) -> bool {
        self.overflowed
    }

    /// Feeds `frames` interleaved stereo frames and resamples as much
    /// as possible into the output buffer.
    pub fn write(&mut self, samples: &[i16], frames: usize) {
        self.input.extend_from_slice(&samples[..frames * 2]);
        let in_frames = self.input.len() / 2;

        // Need one frame of lookahead on each side for the cubic taps
        while self.position + self.ratio + 2.0 < in_frames as f64 {
            let (l, r) = self.interpolate(self.position);
            let (l, r) = if self.ratio > 1.0 {
                self.lowpass(l, r)
            } else {
                (l, r)
            };
            if self.max_frames == 0 || self.output.len() / 2 < self.max_frames {
                self.output.push_back(clamp16(l));
                self.output.push_back(clamp16(r));
            } else {
                self.overflowed = true;
            }
            self.position += self.ratio;
        }

        let consumed = self.position.floor() as usize;
        if consumed > 1 {
            // Keep one frame behind the cursor for the y0 tap
            let drop = consumed - 1;
            self.input.drain(..drop * 2);
            self.position -= drop as f64;
        }
    }

    /// Reads up to `frames` stereo frames into `dst`, returning the
    /// count actually read.
    pub fn read(&mut self, dst: &mut [i16], frames: usize) -> usize {
        let n = frames.min(self.avail());
        for s in dst.iter_mut().take(n * 2) {
            // avail() bounds n, pop cannot fail here
            *s = self.output.pop_front().unwrap_or(0);
        }
        n
    }

    /// Like read but keeps only the left channel.
    pub fn read_mono(&mut self, dst: &mut [i16], frames: usize) -> usize {
        let n = frames.min(self.avail());
        for s in dst.iter_mut().take(n) {
            *s = self.output.pop_front().unwrap_or(0);
            self.output.pop_front();
        }
        n
    }

    pub fn clear(&mut self) {
        self.input.clear();
        self.output.clear();
        self.position = 0.0;
        self.lp = [0.0; 2];
        self.overflowed = false;
    }

    fn interpolate(&self, pos: f64) -> (f32, f32) {
        let idx = pos.floor() as usize;
        let frac = (pos - idx as f64) as f32;
        let frames = self.input.len() / 2;

        let mut out = [0.0f32; 2];
        for (ch, o) in out.iter_mut().enumerate() {
            let idx0 = idx.saturating_sub(1);
            let idx2 = (idx + 1).min(frames - 1);
            let idx3 = (idx + 2).min(frames - 1);

            let y0 = self.input[idx0 * 2 + ch] as f32;
            let y1 = self.input[idx * 2 + ch] as f32;
            let y2 = self.input[idx2 * 2 + ch] as f32;
            let y3 = self.input[idx3 * 2 + ch] as f32;

            // Catmull-Rom
            let a = -0.5 * y0 + 1.5 * y1 - 1.5 * y2 + 0.5 * y3;
            let b = y0 - 2.5 * y1 + 2.0 * y2 - 0.5 * y3;
            let c = -0.5 * y0 + 0.5 * y2;
            let d = y1;

            *o = ((a * frac + b) * frac + c) * frac + d;
        }
        (out[0], out[1])
    }

    fn lowpass(&mut self, l: f32, r: f32) -> (f32, f32) {
        // One-pole smoothing with cutoff scaled by rolloff
        let alpha = (self.rolloff / self.ratio).clamp(0.05, 1.0) as f32;
        self.lp[0] += (l - self.lp[0]) * alpha;
        self.lp[1] += (r - self.lp[1]) * alpha;
        (self.lp[0], self.lp[1])
    }
}

impl Default for FfResampler {
    fn default() -> Self {
        Self::new()
    }
}

fn clamp16(v: f32) -> i16 {
    v.round().clamp(i16::MIN as f32, i16::MAX as f32) as i16
}
