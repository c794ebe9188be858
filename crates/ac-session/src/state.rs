//! Raw input state glue
//!
//! The one save-state section the session layer itself owns: up to 16
//! named fields holding each bound port's raw input bytes, used by the
//! rewind buffer so input snaps back along with module state.

use crate::ports::{PortCache, MAX_PORTS};
use ac_core::StateError;
use ac_module::StateMem;

/// Section tag contributed by this layer
pub const RAW_INPUT_TAG: &[u8; 4] = b"rinp";

const FIELD_NAMES: [&str; MAX_PORTS] = [
    "RI00", "RI01", "RI02", "RI03", "RI04", "RI05", "RI06", "RI07", "RI08", "RI09", "RI0a",
    "RI0b", "RI0c", "RI0d", "RI0e", "RI0f",
];

/// Capture (save) or restore (load) the raw per-port input cache.
/// Only bound ports contribute fields; on load, data is written back
/// through existing bindings and unbound ports stay empty.
pub fn raw_input_state_action(
    ports: &mut PortCache,
    sm: &mut StateMem,
    load: bool,
) -> Result<(), StateError> {
    if load {
        let fields = sm.read_section(RAW_INPUT_TAG)?;
        for (name, data) in fields {
            if let Some(port) = FIELD_NAMES.iter().position(|&n| n == name) {
                ports.overwrite_data(port, data);
            }
        }
    } else {
        let mut fields: Vec<(&str, &[u8])> = Vec::with_capacity(MAX_PORTS);
        for (i, _dev, data) in ports.iter_bound() {
            fields.push((FIELD_NAMES[i], data));
        }
        sm.write_section(RAW_INPUT_TAG, &fields);
    }

    Ok(())
}
