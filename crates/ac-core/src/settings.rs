//! Dotted-key settings provider
//!
//! Settings are flat string values keyed by dotted names such as
//! `"nes.enable"` or `"cd.image_memcache"`. Values come from a TOML
//! file (nested tables are flattened into dotted keys) merged over
//! registered defaults. Loading a per-module override file merges on
//! top of whatever is already present.

use crate::error::{CoreError, Result};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// A registered setting with its default value
#[derive(Debug, Clone)]
pub struct SettingDef {
    pub name: &'static str,
    pub description: &'static str,
    pub default_value: &'static str,
}

/// Flat dotted-key settings store
#[derive(Debug, Default)]
pub struct Settings {
    defaults: HashMap<String, String>,
    values: HashMap<String, String>,
    base_dir: PathBuf,
}

impl Settings {
    pub fn new() -> Self {
        Self {
            defaults: HashMap::new(),
            values: HashMap::new(),
            base_dir: default_base_dir(),
        }
    }

    pub fn with_base_dir<P: Into<PathBuf>>(base_dir: P) -> Self {
        Self {
            defaults: HashMap::new(),
            values: HashMap::new(),
            base_dir: base_dir.into(),
        }
    }

    /// Base directory for override files, cheat files, and the like
    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Register a batch of setting definitions. Later registrations of
    /// the same name replace the default.
    pub fn merge_defaults(&mut self, defs: &[SettingDef]) {
        for def in defs {
            self.defaults
                .insert(def.name.to_string(), def.default_value.to_string());
        }
    }

    /// Register a single dynamically-built default (used for
    /// per-module keys like `"<shortname>.enable"`).
    pub fn define_default(&mut self, name: &str, default_value: &str) {
        self.defaults
            .entry(name.to_string())
            .or_insert_with(|| default_value.to_string());
    }

    pub fn set(&mut self, name: &str, value: &str) {
        self.values.insert(name.to_string(), value.to_string());
    }

    fn raw(&self, name: &str) -> Option<&str> {
        self.values
            .get(name)
            .or_else(|| self.defaults.get(name))
            .map(|s| s.as_str())
    }

    pub fn get_bool(&self, name: &str) -> bool {
        match self.raw(name) {
            Some("1") | Some("true") | Some("yes") => true,
            Some(_) => false,
            None => {
                tracing::warn!(setting = name, "read of unregistered setting");
                false
            }
        }
    }

    pub fn get_u64(&self, name: &str) -> u64 {
        self.raw(name)
            .and_then(|v| v.parse().ok())
            .unwrap_or_default()
    }

    pub fn get_f64(&self, name: &str) -> f64 {
        self.raw(name)
            .and_then(|v| v.parse().ok())
            .unwrap_or_default()
    }

    pub fn get_str(&self, name: &str) -> String {
        self.raw(name).unwrap_or_default().to_string()
    }

    /// Load a TOML settings file, merging its flattened keys over the
    /// current values. A missing file is not an error (returns false);
    /// a malformed file is.
    pub fn load_file(&mut self, path: &Path) -> Result<bool> {
        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(false),
            Err(e) => return Err(e.into()),
        };

        let table: toml::Table = content
            .parse()
            .map_err(|e| CoreError::Settings(format!("{}: {}", path.display(), e)))?;

        let mut flat = HashMap::new();
        flatten_table(&table, "", &mut flat);
        for (k, v) in flat {
            self.values.insert(k, v);
        }

        tracing::info!(path = %path.display(), "loaded settings");
        Ok(true)
    }

    /// Load the per-module override file `<base>/<shortname>.cfg`,
    /// merging over current values. Missing file is a no-op.
    pub fn load_module_overrides(&mut self, shortname: &str) -> Result<bool> {
        let path = self.base_dir.join(format!("{}.cfg", shortname));
        self.load_file(&path)
    }
}

fn flatten_table(table: &toml::Table, prefix: &str, out: &mut HashMap<String, String>) {
    for (key, value) in table {
        let name = if prefix.is_empty() {
            key.clone()
        } else {
            format!("{}.{}", prefix, key)
        };

        match value {
            toml::Value::Table(t) => flatten_table(t, &name, out),
            toml::Value::String(s) => {
                out.insert(name, s.clone());
            }
            toml::Value::Boolean(b) => {
                out.insert(name, if *b { "1" } else { "0" }.to_string());
            }
            other => {
                out.insert(name, other.to_string());
            }
        }
    }
}

fn default_base_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("anycore")
}
