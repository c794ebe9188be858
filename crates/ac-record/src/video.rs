//! Audio/video recording sink
//!
//! A simple chunked container: an `ACAV` header describing the stream,
//! then one `FRAM` chunk per emulated frame carrying the display
//! rectangle, the (optionally RLE-compressed) pixel rows, and the
//! frame's interleaved sound. Recordings are written at full quality;
//! the pipeline guarantees no skipped frames and undistorted audio
//! reach this sink.

use ac_core::RecordError;
use ac_module::{DisplayRect, ModuleInfo, Surface};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

/// Video codec for recorded frames
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum VideoCodec {
    #[default]
    Raw,
    /// Run-length encoded 32-bit pixels
    Rle,
}

impl VideoCodec {
    pub fn from_setting(name: &str) -> Self {
        match name {
            "rle" => VideoCodec::Rle,
            _ => VideoCodec::Raw,
        }
    }
}

/// Recording stream parameters, derived from the active module
#[derive(Debug, Clone)]
pub struct VideoSpec {
    pub sound_rate: f64,
    pub sound_channels: u8,
    pub width: u32,
    pub height: u32,
    pub codec: VideoCodec,
    pub master_clock: u64,
    /// Horizontal aspect correction relative to the recorded width
    pub aspect_x_adjust: f64,
    /// Vertical aspect correction relative to the recorded height
    pub aspect_y_adjust: f64,
}

impl VideoSpec {
    /// Build a spec from a module descriptor. Recording dimensions
    /// start from the module's LCM dimensions and are doubled while
    /// under the given thresholds, with the aspect adjust factors
    /// derived from the nominal dimensions.
    pub fn for_module(
        info: &ModuleInfo,
        sound_rate: f64,
        codec: VideoCodec,
        w_double_threshold: u32,
        h_double_threshold: u32,
    ) -> Self {
        let mut width = info.lcm_width;
        let mut height = info.lcm_height;

        if width < w_double_threshold {
            width *= 2;
        }
        if height < h_double_threshold {
            height *= 2;
        }

        Self {
            sound_rate,
            sound_channels: info.sound_channels,
            width,
            height,
            codec,
            master_clock: info.master_clock,
            aspect_x_adjust: (info.nominal_width as f64 * 2.0) / width as f64,
            aspect_y_adjust: (info.nominal_height as f64 * 2.0) / height as f64,
        }
    }
}

pub struct AvRecord {
    out: BufWriter<File>,
    spec: VideoSpec,
    frames_written: u64,
}

impl AvRecord {
    pub fn new(path: &Path, spec: VideoSpec) -> Result<Self, RecordError> {
        let mut out = BufWriter::new(File::create(path)?);

        out.write_all(b"ACAV")?;
        out.write_all(&1u32.to_le_bytes())?;
        out.write_all(&spec.width.to_le_bytes())?;
        out.write_all(&spec.height.to_le_bytes())?;
        out.write_all(&(spec.sound_rate as u32).to_le_bytes())?;
        out.write_all(&(spec.sound_channels as u32).to_le_bytes())?;
        out.write_all(&(spec.codec as u32).to_le_bytes())?;
        out.write_all(&spec.master_clock.to_le_bytes())?;

        Ok(Self {
            out,
            spec,
            frames_written: 0,
        })
    }

    pub fn spec(&self) -> &VideoSpec {
        &self.spec
    }

    pub fn frames_written(&self) -> u64 {
        self.frames_written
    }

    /// Write one frame: the drawn sub-rectangle of `surface` (honoring
    /// per-line widths when present) plus `sound_frames` interleaved
    /// sample frames and the frame's master-cycle count.
    pub fn write_frame(
        &mut self,
        surface: &Surface,
        rect: DisplayRect,
        line_widths: &[i32],
        sound: &[i16],
        sound_frames: usize,
        master_cycles: u64,
    ) -> Result<(), RecordError> {
        self.out.write_all(b"FRAM")?;
        self.out.write_all(&master_cycles.to_le_bytes())?;
        self.out.write_all(&rect.x.to_le_bytes())?;
        self.out.write_all(&rect.y.to_le_bytes())?;
        self.out.write_all(&rect.w.to_le_bytes())?;
        self.out.write_all(&rect.h.to_le_bytes())?;

        for row in 0..rect.h.max(0) {
            let y = (rect.y + row) as u32;
            let w = line_widths
                .get((rect.y + row) as usize)
                .copied()
                .filter(|&lw| lw > 0)
                .unwrap_or(rect.w) as usize;
            let line = &surface.line(y)[rect.x as usize..rect.x as usize + w];

            self.out.write_all(&(w as u32).to_le_bytes())?;
            match self.spec.codec {
                VideoCodec::Raw => {
                    for &px in line {
                        self.out.write_all(&px.to_le_bytes())?;
                    }
                }
                VideoCodec::Rle => write_rle_line(&mut self.out, line)?,
            }
        }

        let count = sound_frames * self.spec.sound_channels as usize;
        self.out.write_all(&(sound_frames as u32).to_le_bytes())?;
        for &s in &sound[..count.min(sound.len())] {
            self.out.write_all(&s.to_le_bytes())?;
        }

        self.frames_written += 1;
        Ok(())
    }

    pub fn finish(&mut self) -> Result<(), RecordError> {
        self.out.flush()?;
        Ok(())
    }
}

fn write_rle_line(out: &mut impl Write, line: &[u32]) -> Result<(), RecordError> {
    let mut i = 0;
    while i < line.len() {
        let px = line[i];
        let mut run = 1usize;
        while i + run < line.len() && line[i + run] == px && run < u16::MAX as usize {
            run += 1;
        }
        out.write_all(&(run as u16).to_le_bytes())?;
        out.write_all(&px.to_le_bytes())?;
        i += run;
    }
    Ok(())
}
