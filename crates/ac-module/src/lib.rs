//! System module contract for the anycore emulator runtime
//!
//! This crate defines what a console module is (the [`Module`] trait
//! and its [`ModuleInfo`] descriptor), the registry that holds them,
//! the per-frame [`EmulateSpec`] exchange structure, and the
//! save-state serializer.

pub mod espec;
pub mod module;
pub mod registry;
pub mod state;
pub mod video;

pub use espec::EmulateSpec;
pub use module::{
    FileExtension, FrameHost, GameType, Module, ModuleCaps, ModuleInfo, NullFrameHost,
    SimpleCommand,
};
pub use registry::{ModuleEntry, Registry};
pub use state::StateMem;
pub use video::{DisplayRect, PixelFormat, Surface};
