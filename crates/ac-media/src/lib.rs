//! Media interfaces for the anycore emulator runtime
//!
//! Game file containers, IPS patching, M3U playlist expansion, and the
//! disc-image seam with its TOC layout fingerprint.

pub mod disc;
pub mod file;
pub mod ips;
pub mod playlist;

pub use disc::{
    layout_fingerprint, DiscInterface, DiscOpener, MemoryDisc, NullDiscOpener, Toc, TocTrack,
    LEADOUT_TRACK, SECTOR_SIZE,
};
pub use file::GameFile;
pub use playlist::{is_disc_path, is_playlist, read_playlist};
