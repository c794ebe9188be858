//! Core infrastructure for the anycore emulator runtime
//!
//! This crate provides the shared error taxonomy and the dotted-key
//! settings provider used by every other crate in the workspace.

pub mod error;
pub mod settings;

pub use error::{CoreError, LoadError, MediaError, RecordError, Result, StateError};
pub use settings::{SettingDef, Settings};
