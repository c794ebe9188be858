//! Disc image interfaces
//!
//! Actual CD image parsing (cue/toc/ccd, physical drives) lives behind
//! the `DiscOpener` seam; this layer only consumes the table of
//! contents and raw sectors. The layout fingerprint hashes the ordered
//! TOC of every disc in a set and serves as an advisory content
//! identity during module matching.

use ac_core::{MediaError, Result};
use sha1::{Digest, Sha1};
use std::path::Path;
use std::sync::Arc;

/// Raw audio sector payload size in bytes
pub const SECTOR_SIZE: usize = 2352;

/// Lead-out pseudo-track index
pub const LEADOUT_TRACK: usize = 100;

/// One track in a table of contents
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TocTrack {
    /// Starting sector
    pub lba: i32,
    /// Data track (true) or audio track (false)
    pub data: bool,
}

/// Table of contents for one disc
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Toc {
    pub first_track: u8,
    pub last_track: u8,
    /// Indexed by track number; index 100 is the lead-out
    pub tracks: [TocTrack; 101],
}

impl Default for Toc {
    fn default() -> Self {
        Self {
            first_track: 0,
            last_track: 0,
            tracks: [TocTrack::default(); 101],
        }
    }
}

impl Toc {
    pub fn leadout(&self) -> TocTrack {
        self.tracks[LEADOUT_TRACK]
    }

    /// Track containing `lba`, if any
    pub fn track_at(&self, lba: i32) -> Option<u8> {
        (self.first_track..=self.last_track)
            .rev()
            .find(|&t| lba >= self.tracks[t as usize].lba)
    }
}

/// A mounted disc image or physical disc
pub trait DiscInterface: std::fmt::Debug {
    fn read_toc(&self) -> Toc;

    /// Read one raw 2352-byte sector.
    fn read_sector(&self, lba: i32, buf: &mut [u8; SECTOR_SIZE]) -> Result<()>;
}

/// Seam for disc image parsing and physical device access
pub trait DiscOpener {
    fn open(&self, path: &Path, is_device: bool, memcache: bool)
        -> Result<Arc<dyn DiscInterface>>;
}

/// Default opener: recognizes nothing. Drivers supply a real opener
/// for the image formats they link in.
#[derive(Debug, Default)]
pub struct NullDiscOpener;

impl DiscOpener for NullDiscOpener {
    fn open(
        &self,
        path: &Path,
        _is_device: bool,
        _memcache: bool,
    ) -> Result<Arc<dyn DiscInterface>> {
        Err(MediaError::UnsupportedDisc(path.display().to_string()).into())
    }
}

/// A disc held entirely in memory. Used for memory-cached images and
/// as the backing for synthesized disc sets in tests.
#[derive(Debug)]
pub struct MemoryDisc {
    toc: Toc,
    sectors: Vec<u8>,
}

impl MemoryDisc {
    /// Build a disc from a TOC and the raw sector stream starting at
    /// LBA 0. The stream may be shorter than the lead-out; reads past
    /// its end return zero-filled sectors.
    pub fn new(toc: Toc, sectors: Vec<u8>) -> Self {
        Self { toc, sectors }
    }

    /// Single-audio-track disc of `sector_count` sectors.
    pub fn audio(sector_count: i32, sectors: Vec<u8>) -> Self {
        let mut toc = Toc {
            first_track: 1,
            last_track: 1,
            tracks: [TocTrack::default(); 101],
        };
        toc.tracks[1] = TocTrack { lba: 0, data: false };
        toc.tracks[LEADOUT_TRACK] = TocTrack {
            lba: sector_count,
            data: false,
        };
        Self::new(toc, sectors)
    }
}

impl DiscInterface for MemoryDisc {
    fn read_toc(&self) -> Toc {
        self.toc.clone()
    }

    fn read_sector(&self, lba: i32, buf: &mut [u8; SECTOR_SIZE]) -> Result<()> {
        if lba < 0 || lba >= self.toc.leadout().lba {
            return Err(MediaError::SectorOutOfRange { lba }.into());
        }

        let start = lba as usize * SECTOR_SIZE;
        buf.fill(0);
        if start < self.sectors.len() {
            let end = (start + SECTOR_SIZE).min(self.sectors.len());
            buf[..end - start].copy_from_slice(&self.sectors[start..end]);
        }
        Ok(())
    }
}

/// Hash the ordered TOC layout of a disc set: first/last track number,
/// lead-out sector, then each track's starting sector and data flag,
/// all as little-endian u32 words. Modules may override this identity
/// with their own database lookup.
pub fn layout_fingerprint(discs: &[Arc<dyn DiscInterface>]) -> [u8; 20] {
    let mut hasher = Sha1::new();

    for disc in discs {
        let toc = disc.read_toc();

        hasher.update((toc.first_track as u32).to_le_bytes());
        hasher.update((toc.last_track as u32).to_le_bytes());
        hasher.update((toc.leadout().lba as u32).to_le_bytes());

        for track in toc.first_track..=toc.last_track {
            let t = toc.tracks[track as usize];
            hasher.update((t.lba as u32).to_le_bytes());
            hasher.update((t.data as u32).to_le_bytes());
        }
    }

    hasher.finalize().into()
}
