//! Netplay collaborator
//!
//! Transport and peer synchronization live outside this layer. During
//! a netplay session the pipeline exchanges the per-port input cache
//! with peers before each frame, and simple commands are sent to peers
//! instead of being applied locally; they run only once echoed back.

use crate::ports::PortCache;
use ac_module::SimpleCommand;

pub trait Netplay {
    /// Exchange per-port input with peers. The cache is updated in
    /// place with the merged inputs for this frame.
    fn update(&mut self, ports: &mut PortCache);

    /// Queue a command for the peers; it must not be applied locally
    /// until it comes back from [`Netplay::poll_command`].
    fn send_command(&mut self, cmd: SimpleCommand);

    /// Next echoed command ready to apply locally, if any.
    fn poll_command(&mut self) -> Option<SimpleCommand>;

    /// Tear the connection down (session close).
    fn stop(&mut self);
}

/// Loopback netplay used by tests: commands echo back on the next
/// frame and input passes through unchanged.
#[derive(Debug, Default)]
pub struct LoopbackNetplay {
    queue: Vec<SimpleCommand>,
    pub updates: usize,
    pub stopped: bool,
}

impl Netplay for LoopbackNetplay {
    fn update(&mut self, _ports: &mut PortCache) {
        self.updates += 1;
    }

    fn send_command(&mut self, cmd: SimpleCommand) {
        self.queue.push(cmd);
    }

    fn poll_command(&mut self) -> Option<SimpleCommand> {
        if self.queue.is_empty() {
            None
        } else {
            Some(self.queue.remove(0))
        }
    }

    fn stop(&mut self) {
        self.stopped = true;
    }
}
