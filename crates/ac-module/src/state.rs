//! Save-state serialization
//!
//! States are a flat sequence of sections, each keyed by a 4-character
//! tag and holding named variable-length fields. The session layer
//! contributes exactly one section (`"rinp"`); everything else is
//! written by the active module and opaque here.
//!
//! Wire layout per section: tag (4 bytes), u32 LE payload length,
//! then per field: u8 name length, name bytes, u32 LE data length,
//! data bytes.

use ac_core::StateError;

/// Serialization buffer for save states
#[derive(Debug, Default)]
pub struct StateMem {
    data: Vec<u8>,
    /// When set, writes only tally sizes without copying
    size_only: bool,
    tally: usize,
}

impl StateMem {
    /// Buffer for saving
    pub fn new() -> Self {
        Self::default()
    }

    /// Size-computation pass: sections are measured, nothing is
    /// copied. Writing the same sections twice must tally the same.
    pub fn size_only() -> Self {
        Self {
            data: Vec::new(),
            size_only: true,
            tally: 0,
        }
    }

    /// Buffer for loading previously serialized data
    pub fn from_bytes(data: Vec<u8>) -> Self {
        Self {
            data,
            size_only: false,
            tally: 0,
        }
    }

    pub fn is_size_only(&self) -> bool {
        self.size_only
    }

    /// Serialized size: actual bytes, or the tally in size-only mode
    pub fn len(&self) -> usize {
        if self.size_only {
            self.tally
        } else {
            self.data.len()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.data
    }

    /// Append one section. Fields with empty names are not allowed;
    /// zero-length data is.
    pub fn write_section(&mut self, tag: &[u8; 4], fields: &[(&str, &[u8])]) {
        let payload_len: usize = fields
            .iter()
            .map(|(name, data)| 1 + name.len() + 4 + data.len())
            .sum();

        if self.size_only {
            self.tally += 4 + 4 + payload_len;
            return;
        }

        self.data.extend_from_slice(tag);
        self.data.extend_from_slice(&(payload_len as u32).to_le_bytes());
        for (name, data) in fields {
            debug_assert!(!name.is_empty() && name.len() <= u8::MAX as usize);
            self.data.push(name.len() as u8);
            self.data.extend_from_slice(name.as_bytes());
            self.data.extend_from_slice(&(data.len() as u32).to_le_bytes());
            self.data.extend_from_slice(data);
        }
    }

    /// Locate a section by tag and parse its fields.
    pub fn read_section(&self, tag: &[u8; 4]) -> Result<Vec<(String, &[u8])>, StateError> {
        let mut pos = 0;
        while pos + 8 <= self.data.len() {
            let sect_tag = &self.data[pos..pos + 4];
            let payload_len = u32::from_le_bytes(
                self.data[pos + 4..pos + 8].try_into().unwrap_or_default(),
            ) as usize;
            pos += 8;

            if pos + payload_len > self.data.len() {
                return Err(StateError::Truncated);
            }

            if sect_tag == tag {
                return parse_fields(&self.data[pos..pos + payload_len]);
            }
            pos += payload_len;
        }

        Err(StateError::MissingSection(
            String::from_utf8_lossy(tag).into_owned(),
        ))
    }
}

fn parse_fields(mut payload: &[u8]) -> Result<Vec<(String, &[u8])>, StateError> {
    let mut out = Vec::new();

    while !payload.is_empty() {
        let name_len = payload[0] as usize;
        payload = &payload[1..];
        if payload.len() < name_len + 4 {
            return Err(StateError::Truncated);
        }

        let name = String::from_utf8_lossy(&payload[..name_len]).into_owned();
        payload = &payload[name_len..];

        let data_len =
            u32::from_le_bytes(payload[..4].try_into().unwrap_or_default()) as usize;
        payload = &payload[4..];
        if payload.len() < data_len {
            return Err(StateError::Truncated);
        }

        out.push((name, &payload[..data_len]));
        payload = &payload[data_len..];
    }

    Ok(out)
}
