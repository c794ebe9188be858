//! Recording sinks for the anycore emulator runtime
//!
//! The session owns at most one waveform sink and one A/V sink at a
//! time; write failures are reported to the session, which detaches
//! the sink and keeps emulating.

pub mod video;
pub mod wav;

pub use video::{AvRecord, VideoCodec, VideoSpec};
pub use wav::WavRecord;
