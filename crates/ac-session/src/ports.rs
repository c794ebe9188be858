//! Per-port input buffer cache
//!
//! The session caches the device-type tag and latest raw input bytes
//! for each of 16 ports so they can be replayed into movie logs,
//! exchanged over netplay, and captured by the rewind serializer.
//! Cleared entirely on session close.

/// Number of input port slots
pub const MAX_PORTS: usize = 16;

/// One cached port binding
#[derive(Debug, Clone, Default)]
pub struct Port {
    /// Device-type tag, e.g. "gamepad"
    pub device: Option<String>,
    /// Latest raw input bytes for the port
    pub data: Option<Vec<u8>>,
}

impl Port {
    pub fn is_bound(&self) -> bool {
        self.data.is_some()
    }
}

/// The 16-slot cache
#[derive(Debug, Default)]
pub struct PortCache {
    ports: [Port; MAX_PORTS],
}

impl PortCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the binding for `port`. The previous device tag and
    /// buffer are released.
    pub fn set(&mut self, port: usize, device: &str, data: &[u8]) {
        self.ports[port] = Port {
            device: Some(device.to_string()),
            data: Some(data.to_vec()),
        };
    }

    /// Overwrite the raw bytes of an already-bound port (rewind
    /// restore). Unbound ports are left untouched.
    pub fn overwrite_data(&mut self, port: usize, data: &[u8]) {
        if let Some(buf) = self.ports[port].data.as_mut() {
            buf.clear();
            buf.extend_from_slice(data);
        }
    }

    pub fn get(&self, port: usize) -> &Port {
        &self.ports[port]
    }

    pub fn clear(&mut self) {
        for port in &mut self.ports {
            *port = Port::default();
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, &Port)> {
        self.ports.iter().enumerate()
    }

    /// Bound ports only
    pub fn iter_bound(&self) -> impl Iterator<Item = (usize, &str, &[u8])> {
        self.ports.iter().enumerate().filter_map(|(i, p)| {
            match (&p.device, &p.data) {
                (Some(dev), Some(data)) => Some((i, dev.as_str(), data.as_slice())),
                _ => None,
            }
        })
    }
}
