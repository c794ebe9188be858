//! Session lifecycle and frame pipeline for the anycore emulator
//! runtime
//!
//! This crate ties a registered console module to everything that
//! runs around it per frame: the input cache, rewind history, audio
//! post-processing, deinterlacing, temporal blur, recorder taps and
//! the movie/netplay seams.

pub mod audio;
pub mod cheats;
pub mod deinterlace;
pub mod movie;
pub mod netplay;
pub mod pipeline;
pub mod ports;
pub mod resampler;
pub mod rewind;
pub mod session;
pub mod state;
pub mod tblur;

pub use cheats::{Cheat, CheatTable};
pub use movie::{MemoryMovie, MovieLog};
pub use netplay::{LoopbackNetplay, Netplay};
pub use ports::{Port, PortCache, MAX_PORTS};
pub use rewind::RewindBuffer;
pub use session::{game_name_from_path, Session};
