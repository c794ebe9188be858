//! Rewind snapshot buffer
//!
//! Keeps a bounded ring of serialized save states, one per frame.
//! When a rewind is honored, the most recent snapshot is restored and
//! the caller is told to play the freshly generated audio in reverse,
//! matching the backwards-moving video.

use ac_core::StateError;
use ac_module::StateMem;
use std::collections::VecDeque;

pub struct RewindBuffer {
    states: VecDeque<Vec<u8>>,
    max_states: usize,
}

impl RewindBuffer {
    /// `max_states` of zero disables rewind entirely.
    pub fn new(max_states: usize) -> Self {
        Self {
            states: VecDeque::new(),
            max_states,
        }
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    /// Advance one frame. `state_io` serializes (load = false) or
    /// restores (load = true) the full session state.
    ///
    /// Returns whether this frame's audio must be reversed, i.e.
    /// whether a rewind step actually happened.
    pub fn run(
        &mut self,
        rewind_requested: bool,
        state_io: &mut dyn FnMut(&mut StateMem, bool) -> Result<(), StateError>,
    ) -> bool {
        if self.max_states == 0 {
            return false;
        }

        if rewind_requested {
            if let Some(prev) = self.states.pop_back() {
                let mut sm = StateMem::from_bytes(prev);
                match state_io(&mut sm, true) {
                    Ok(()) => return true,
                    Err(e) => {
                        tracing::warn!(error = %e, "rewind restore failed; dropping history");
                        self.states.clear();
                        return false;
                    }
                }
            }
            return false;
        }

        let mut sm = StateMem::new();
        match state_io(&mut sm, false) {
            Ok(()) => {
                self.states.push_back(sm.into_bytes());
                while self.states.len() > self.max_states {
                    self.states.pop_front();
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "rewind snapshot failed");
            }
        }
        false
    }

    pub fn clear(&mut self) {
        self.states.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn counter_io(value: std::rc::Rc<std::cell::Cell<u32>>) -> impl FnMut(&mut StateMem, bool) -> Result<(), StateError> {
        move |sm, load| {
            if load {
                let fields = sm.read_section(b"cntr")?;
                value.set(u32::from_le_bytes(fields[0].1.try_into().unwrap()));
            } else {
                sm.write_section(b"cntr", &[("V", &value.get().to_le_bytes())]);
            }
            Ok(())
        }
    }

    #[test]
    fn test_rewind_restores_previous_frame() {
        use std::cell::Cell;
        use std::rc::Rc;

        let value = Rc::new(Cell::new(0));
        let mut io = counter_io(value.clone());
        let mut buf = RewindBuffer::new(10);

        for v in 0..5 {
            value.set(v);
            assert!(!buf.run(false, &mut io));
        }

        value.set(99);
        assert!(buf.run(true, &mut io)); // audio must reverse
        assert_eq!(value.get(), 4);
        assert!(buf.run(true, &mut io));
        assert_eq!(value.get(), 3);
    }

    #[test]
    fn test_rewind_with_no_history() {
        let mut buf = RewindBuffer::new(10);
        assert!(!buf.run(true, &mut |_, _| Ok(())));
    }

    #[test]
    fn test_bounded_history() {
        let mut buf = RewindBuffer::new(3);
        for _ in 0..10 {
            buf.run(false, &mut |sm, _| {
                sm.write_section(b"none", &[]);
                Ok(())
            });
        }
        assert_eq!(buf.len(), 3);
    }

    #[test]
    fn test_disabled_buffer() {
        let mut buf = RewindBuffer::new(0);
        assert!(!buf.run(false, &mut |_, _| Ok(())));
        assert!(!buf.run(true, &mut |_, _| Ok(())));
        assert!(buf.is_empty());
    }
}
