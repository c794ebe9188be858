//! Per-frame exchange structure between the pipeline and a module
//!
//! One `EmulateSpec` is built by the driver and threaded mutably
//! through every pipeline stage. The `*_alms` fields are the
//! already-mixed watermarks: sample/cycle counts emitted by a
//! mid-frame sync that the end-of-frame pass must not process again.

use crate::video::{DisplayRect, PixelFormat, Surface};

#[derive(Debug)]
pub struct EmulateSpec {
    /// Target pixel surface
    pub surface: Surface,
    /// Sub-region of the surface drawn this frame; written by the
    /// module, reset by the pipeline before each frame
    pub display_rect: DisplayRect,
    /// Per-scanline widths for variable-width output; empty when the
    /// module draws constant-width frames
    pub line_widths: Vec<i32>,

    /// Skip rendering this frame (frameskip); the pipeline clears it
    /// when a recorder or temporal blur needs every frame
    pub skip: bool,

    /// Interleaved signed 16-bit output samples; capacity is
    /// `sound_max_frames` frames
    pub sound_buf: Vec<i16>,
    /// Output rate in Hz; zero disables sound entirely
    pub sound_rate: f64,
    /// Buffer capacity in sample frames
    pub sound_max_frames: usize,
    /// Sample frames written so far this call
    pub sound_frames: usize,
    /// Already-mixed watermark in sample frames
    pub sound_frames_alms: usize,

    /// Caller-requested volume; 1.0 is unity
    pub sound_volume: f64,
    /// Fast-forward speed multiplier; 1.0 is realtime
    pub sound_multiplier: f64,

    /// Caller requests a rewind step this frame
    pub need_rewind: bool,
    /// Set by the rewind buffer: this frame's audio must be played in
    /// reverse
    pub need_sound_reverse: bool,

    /// Master clock cycles consumed, cumulative and monotonic
    pub master_cycles: u64,
    /// Already-mixed watermark in master cycles
    pub master_cycles_alms: u64,

    pub interlace_on: bool,
    /// Field parity when interlaced: 0 = even, 1 = odd
    pub interlace_field: u32,

    /// Pixel format differs from the previous frame
    pub video_format_changed: bool,
    /// Sound rate differs from the previous frame
    pub sound_format_changed: bool,
}

impl EmulateSpec {
    pub fn new(surface: Surface) -> Self {
        Self {
            surface,
            display_rect: DisplayRect::default(),
            line_widths: Vec::new(),
            skip: false,
            sound_buf: Vec::new(),
            sound_rate: 0.0,
            sound_max_frames: 0,
            sound_frames: 0,
            sound_frames_alms: 0,
            sound_volume: 1.0,
            sound_multiplier: 1.0,
            need_rewind: false,
            need_sound_reverse: false,
            master_cycles: 0,
            master_cycles_alms: 0,
            interlace_on: false,
            interlace_field: 0,
            video_format_changed: false,
            sound_format_changed: false,
        }
    }

    /// Enable sound output at `rate` Hz with room for `max_frames`
    /// sample frames of `channels` channels.
    pub fn enable_sound(&mut self, rate: f64, max_frames: usize, channels: usize) {
        self.sound_rate = rate;
        self.sound_max_frames = max_frames;
        self.sound_buf = vec![0; max_frames * channels];
    }

    pub fn sound_enabled(&self) -> bool {
        self.sound_rate != 0.0
    }

    pub fn format(&self) -> PixelFormat {
        self.surface.format
    }
}
