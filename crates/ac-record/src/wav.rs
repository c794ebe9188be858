//! WAV waveform recording sink
//!
//! 16-bit PCM little-endian. The RIFF and data chunk sizes are
//! back-patched when recording finishes.

use ac_core::RecordError;
use std::fs::File;
use std::io::{Seek, SeekFrom, Write};
use std::path::Path;

pub struct WavRecord {
    file: File,
    channels: u16,
    data_bytes: u64,
    finalized: bool,
}

impl WavRecord {
    pub fn new(path: &Path, sound_rate: f64, channels: u16) -> Result<Self, RecordError> {
        let mut file = File::create(path)?;
        let rate = sound_rate as u32;
        let block_align = channels * 2;

        file.write_all(b"RIFF")?;
        file.write_all(&0u32.to_le_bytes())?; // patched in finish()
        file.write_all(b"WAVE")?;
        file.write_all(b"fmt ")?;
        file.write_all(&16u32.to_le_bytes())?;
        file.write_all(&1u16.to_le_bytes())?; // PCM
        file.write_all(&channels.to_le_bytes())?;
        file.write_all(&rate.to_le_bytes())?;
        file.write_all(&(rate * block_align as u32).to_le_bytes())?;
        file.write_all(&block_align.to_le_bytes())?;
        file.write_all(&16u16.to_le_bytes())?;
        file.write_all(b"data")?;
        file.write_all(&0u32.to_le_bytes())?; // patched in finish()

        Ok(Self {
            file,
            channels,
            data_bytes: 0,
            finalized: false,
        })
    }

    /// Append `frames` interleaved sample frames.
    pub fn write_sound(&mut self, samples: &[i16], frames: usize) -> Result<(), RecordError> {
        if self.finalized {
            return Err(RecordError::Finalized);
        }

        let count = frames * self.channels as usize;
        debug_assert!(count <= samples.len());
        let mut bytes = Vec::with_capacity(count * 2);
        for &s in &samples[..count] {
            bytes.extend_from_slice(&s.to_le_bytes());
        }

        self.file.write_all(&bytes)?;
        self.data_bytes += bytes.len() as u64;
        Ok(())
    }

    /// Patch chunk sizes and flush. Idempotent.
    pub fn finish(&mut self) -> Result<(), RecordError> {
        if self.finalized {
            return Ok(());
        }
        self.finalized = true;

        let data = self.data_bytes.min(u32::MAX as u64) as u32;
        self.file.seek(SeekFrom::Start(4))?;
        self.file.write_all(&(36 + data).to_le_bytes())?;
        self.file.seek(SeekFrom::Start(40))?;
        self.file.write_all(&data.to_le_bytes())?;
        self.file.flush()?;
        Ok(())
    }
}

impl Drop for WavRecord {
    fn drop(&mut self) {
        if let Err(e) = self.finish() {
            tracing::warn!(error = %e, "failed to finalize WAV recording");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wav_header_and_data() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.wav");

        let mut rec = WavRecord::new(&path, 48000.0, 2).unwrap();
        rec.write_sound(&[100, -100, 200, -200], 2).unwrap();
        rec.finish().unwrap();

        let bytes = std::fs::read(&path).unwrap();
        assert_eq!(&bytes[0..4], b"RIFF");
        assert_eq!(&bytes[8..12], b"WAVE");
        // data chunk size = 4 samples * 2 bytes
        assert_eq!(u32::from_le_bytes(bytes[40..44].try_into().unwrap()), 8);
        assert_eq!(bytes.len(), 44 + 8);
        // first sample, LE
        assert_eq!(i16::from_le_bytes(bytes[44..46].try_into().unwrap()), 100);
    }

    #[test]
    fn test_write_after_finish_fails() {
        let dir = tempfile::tempdir().unwrap();
        let mut rec = WavRecord::new(&dir.path().join("out.wav"), 44100.0, 1).unwrap();
        rec.finish().unwrap();
        assert!(matches!(
            rec.write_sound(&[0], 1),
            Err(RecordError::Finalized)
        ));
    }
}
