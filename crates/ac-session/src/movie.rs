//! Movie log collaborator
//!
//! Movie recording/playback lives outside this layer; the session only
//! needs to know whether a movie is playing (suppress local commands,
//! refuse rewind), and where to append input and commands while
//! recording.

use ac_module::SimpleCommand;

pub trait MovieLog {
    fn is_playing(&self) -> bool;
    fn is_recording(&self) -> bool;

    /// Append one port's raw input for the current frame.
    fn append_input(&mut self, port: usize, data: &[u8]);

    /// Append a simple command issued during recording.
    fn append_command(&mut self, cmd: SimpleCommand);

    /// Stop recording/playback (session close).
    fn stop(&mut self);
}

/// In-memory movie log used by tests and the headless driver
#[derive(Debug, Default)]
pub struct MemoryMovie {
    pub playing: bool,
    pub recording: bool,
    pub inputs: Vec<(usize, Vec<u8>)>,
    pub commands: Vec<SimpleCommand>,
}

impl MovieLog for MemoryMovie {
    fn is_playing(&self) -> bool {
        self.playing
    }

    fn is_recording(&self) -> bool {
        self.recording
    }

    fn append_input(&mut self, port: usize, data: &[u8]) {
        self.inputs.push((port, data.to_vec()));
    }

    fn append_command(&mut self, cmd: SimpleCommand) {
        self.commands.push(cmd);
    }

    fn stop(&mut self) {
        self.playing = false;
        self.recording = false;
    }
}
