//! Cheat table
//!
//! Simple address/value patch list loaded from a per-game text file
//! next to the settings base directory. Lines have the form
//! `ADDR VALUE [COMPARE] description`, hex fields, `#` comments.

use std::fs;
use std::io::Write as _;
use std::path::{Path, PathBuf};

use ac_core::{CoreError, Result};
use ac_module::Module;
use tracing::{info, warn};

#[derive(Debug, Clone, PartialEq)]
pub struct Cheat {
    pub addr: u32,
    pub value: u8,
    pub compare: Option<u8>,
    pub name: String,
    pub enabled: bool,
}

#[derive(Debug, Default)]
pub struct CheatTable {
    path: Option<PathBuf>,
    cheats: Vec<Cheat>,
    dirty: bool,
}

impl CheatTable {
    /// Loads `<base>/<game>.cht` if present. A missing file yields an
    /// empty table.
    pub fn load(base: &Path, game: &str) -> Result<Self> {
        let path = base.join(format!("{game}.cht"));
        let text = match fs::read_to_string(&path) {
            Ok(t) => t,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(Self {
                    path: Some(path),
                    ..Self::default()
                });
            }
            Err(e) => return Err(CoreError::Io(e)),
        };

        let mut cheats = Vec::new();
        for (lineno, line) in text.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            match parse_line(line) {
                Some(c) => cheats.push(c),
                None => warn!("{}:{}: unparseable cheat line", path.display(), lineno + 1),
            }
        }
        info!(count = cheats.len(), "loaded cheats from {}", path.display());
        Ok(Self {
            path: Some(path),
            cheats,
            dirty: false,
        })
    }

    pub fn add(&mut self, cheat: Cheat) {
        self.cheats.push(cheat);
        self.dirty = true;
    }

    pub fn set_enabled(&mut self, index: usize, enabled: bool) {
        if let Some(c) = self.cheats.get_mut(index) {
            if c.enabled != enabled {
                c.enabled = enabled;
                self.dirty = true;
            }
        }
    }

    pub fn cheats(&self) -> &[Cheat] {
        &self.cheats
    }

    /// Reinstalls all enabled patches on the module.
    pub fn install(&self, module: &mut dyn Module) {
        module.remove_read_patches();
        for c in self.cheats.iter().filter(|c| c.enabled) {
            module.install_read_patch(c.addr, c.value, c.compare);
        }
    }

    /// Writes the table back out if it changed since load.
    pub fn flush(&mut self) -> Result<()> {
        if !self.dirty {
            return Ok(());
        }
        let Some(path) = &self.path else {
            return Ok(());
        };
        let mut out = Vec::new();
        for c in &self.cheats {
            let prefix = if c.enabled { "" } else { "# disabled: " };
            match c.compare {
                Some(cmp) => {
                    writeln!(out, "{prefix}{:08X} {:02X} {:02X} {}", c.addr, c.value, cmp, c.name)
                }
                None => writeln!(out, "{prefix}{:08X} {:02X} {}", c.addr, c.value, c.name),
            }
            .map_err(|e| CoreError::Io(std::io::Error::other(e)))?;
        }
        fs::write(path, &out).map_err(CoreError::Io)?;
        self.dirty = false;
        Ok(())
    }
}

fn parse_line(line: &str) -> Option<Cheat> {
    let (line, enabled) = match line.strip_prefix("# disabled: ") {
        Some(rest) => (rest, false),
        None => (line, true),
    };
    let mut parts = line.split_whitespace();
    let addr = u32::from_str_radix(parts.next()?, 16).ok()?;
    let value = u8::from_str_radix(parts.next()?, 16).ok()?;
    let rest: Vec<&str> = parts.collect();

    // A two-hex-digit third field is a compare byte, anything else
    // starts the description.
    let (compare, name_start) = match rest.first() {
        Some(tok) if tok.len() == 2 => match u8::from_str_radix(tok, 16) {
            Ok(cmp) => (Some(cmp), 1),
            Err(_) => (None, 0),
        },
        _ => (None, 0),
    };
    let name = rest[name_start..].join(" ");
    Some(Cheat {
        addr,
        value,
        compare,
        name,
        enabled,
    })
}
