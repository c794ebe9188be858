//! System module contract
//!
//! Each supported console implements [`Module`]; the descriptor
//! metadata lives in [`ModuleInfo`]. Exactly one module instance is
//! active at a time, owned by the session.

use crate::espec::EmulateSpec;
use crate::state::StateMem;
use ac_core::{Result, StateError};
use ac_media::{DiscInterface, GameFile};
use bitflags::bitflags;
use std::sync::Arc;

bitflags! {
    /// Capability flags for a module
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct ModuleCaps: u32 {
        /// Supports plain-file loading
        const FILE_LOAD = 1 << 0;
        /// Supports CD/disc loading
        const CD_LOAD = 1 << 1;
        /// Supports cheat read patches
        const CHEATS = 1 << 2;
    }
}

/// Broad kind of content a module runs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GameType {
    Cartridge,
    Disk,
    CdRom,
    Arcade,
    /// Pure media player: no cheats, no rewind
    Player,
}

/// Simple commands forwarded to the active module
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimpleCommand {
    Power,
    Reset,
    InsertCoin,
    ToggleDip(u8),
    SelectDisk,
    InsertDisk,
    InsertSpecificDisk(u8),
    EjectDisk,
}

/// One supported file extension with a human-readable description
#[derive(Debug, Clone, Copy)]
pub struct FileExtension {
    pub extension: &'static str,
    pub description: &'static str,
}

/// Immutable per-console descriptor, fixed at registration
#[derive(Debug, Clone)]
pub struct ModuleInfo {
    pub shortname: &'static str,
    pub fullname: &'static str,
    pub extensions: &'static [FileExtension],
    /// Tie-break order for format sniffing; higher sniffs first
    pub priority: i32,
    pub caps: ModuleCaps,
    pub game_type: GameType,
    pub nominal_width: u32,
    pub nominal_height: u32,
    /// Least-common-multiple display dimensions across all video modes
    pub lcm_width: u32,
    pub lcm_height: u32,
    pub sound_channels: u8,
    pub master_clock: u64,
}

impl ModuleInfo {
    pub fn claims_extension(&self, ext: &str) -> bool {
        self.extensions
            .iter()
            .any(|e| e.extension.eq_ignore_ascii_case(ext))
    }
}

/// Host callback handed to `emulate` so a module can flush partial
/// output mid-frame (low-latency drivers).
pub trait FrameHost {
    fn mid_sync(&mut self, spec: &mut EmulateSpec);
}

/// A `FrameHost` that ignores mid-frame syncs
#[derive(Debug, Default)]
pub struct NullFrameHost;

impl FrameHost for NullFrameHost {
    fn mid_sync(&mut self, _spec: &mut EmulateSpec) {}
}

/// The per-console emulation contract.
///
/// Operations a module doesn't support keep their default bodies;
/// the session consults [`ModuleInfo::caps`] before calling the
/// loaders, so the default `Err` paths only trip on caller misuse.
pub trait Module {
    /// Load a plain game file. The module may inspect and keep any of
    /// the file's data; on `Err` the session fully unwinds.
    fn load(&mut self, name: &str, file: &mut GameFile) -> Result<()> {
        let _ = (name, file);
        Err(ac_core::LoadError::UnrecognizedFormat.into())
    }

    /// Load from an opened disc set. `layout_hash` is the advisory
    /// TOC fingerprint; the module may override it with its own
    /// database identity.
    fn load_cd(&mut self, discs: &[Arc<dyn DiscInterface>], layout_hash: &[u8; 20]) -> Result<()> {
        let _ = (discs, layout_hash);
        Err(ac_core::LoadError::UnrecognizedFormat.into())
    }

    /// Format sniff for plain files
    fn test_magic(&self, name: &str, file: &GameFile) -> bool {
        let _ = (name, file);
        false
    }

    /// Format sniff for disc sets
    fn test_magic_cd(&self, discs: &[Arc<dyn DiscInterface>]) -> bool {
        let _ = discs;
        false
    }

    /// Release per-game resources. Called exactly once per successful
    /// load.
    fn close_game(&mut self);

    /// Run one frame. This is the only place console-specific
    /// emulation executes.
    fn emulate(&mut self, spec: &mut EmulateSpec, host: &mut dyn FrameHost);

    /// Display name chosen by the module during load, if any
    fn game_name(&self) -> Option<String> {
        None
    }

    fn set_input(&mut self, port: usize, device: &str, data: &[u8]);

    fn set_layer_enable_mask(&mut self, mask: u64) {
        let _ = mask;
    }

    fn do_simple_command(&mut self, cmd: SimpleCommand);

    /// Serialize or restore module state. Must be idempotent in
    /// size-only mode.
    fn state_action(&mut self, sm: &mut StateMem, load: bool) -> std::result::Result<(), StateError>;

    fn install_read_patch(&mut self, addr: u32, value: u8, compare: Option<u8>) {
        let _ = (addr, value, compare);
    }

    fn remove_read_patches(&mut self) {}
}
