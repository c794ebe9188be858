//! Opened game file container
//!
//! A `GameFile` holds the raw bytes of an opened game image along with
//! the path components modules use for magic testing. A sibling IPS
//! patch, when present, is applied before any module sees the data.

use crate::ips;
use ac_core::{LoadError, MediaError, Result};
use std::path::{Path, PathBuf};

/// An opened game file, fully read into memory
#[derive(Debug)]
pub struct GameFile {
    path: PathBuf,
    /// Lowercased extension without the dot, if any
    ext: Option<String>,
    data: Vec<u8>,
}

impl GameFile {
    /// Open and read the file at `path`.
    pub fn open(path: &Path) -> Result<Self> {
        let data = std::fs::read(path).map_err(|e| LoadError::Open {
            path: path.display().to_string(),
            source: e,
        })?;

        Ok(Self::from_bytes(path, data))
    }

    /// Build a game file from bytes already in memory (tests, archive
    /// extraction).
    pub fn from_bytes(path: &Path, data: Vec<u8>) -> Self {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase());

        Self {
            path: path.to_path_buf(),
            ext,
            data,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Lowercased extension without the leading dot
    pub fn ext(&self) -> Option<&str> {
        self.ext.as_deref()
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn size(&self) -> usize {
        self.data.len()
    }

    /// Apply the sibling patch file (`<path>.ips`) if one exists.
    /// A missing patch file is a skip, not an error; a malformed one
    /// is a hard load failure.
    pub fn apply_sibling_patch(&mut self) -> Result<bool> {
        let mut patch_path = self.path.clone().into_os_string();
        patch_path.push(".ips");
        let patch_path = PathBuf::from(patch_path);

        let patch = match std::fs::read(&patch_path) {
            Ok(p) => p,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(false),
            Err(e) => return Err(MediaError::Io(e).into()),
        };

        tracing::info!(path = %patch_path.display(), "applying IPS patch");
        ips::apply(&patch, &mut self.data)?;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extension_lowercased() {
        let gf = GameFile::from_bytes(Path::new("Game.NES"), vec![1, 2, 3]);
        assert_eq!(gf.ext(), Some("nes"));
        assert_eq!(gf.size(), 3);
    }

    #[test]
    fn test_no_extension() {
        let gf = GameFile::from_bytes(Path::new("game"), vec![]);
        assert_eq!(gf.ext(), None);
    }

    #[test]
    fn test_open_missing_file() {
        let err = GameFile::open(Path::new("/nonexistent/game.nes")).unwrap_err();
        assert!(matches!(
            err,
            ac_core::CoreError::Load(LoadError::Open { .. })
        ));
    }

    #[test]
    fn test_missing_patch_is_skip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("game.bin");
        std::fs::write(&path, [0u8; 8]).unwrap();

        let mut gf = GameFile::open(&path).unwrap();
        assert!(!gf.apply_sibling_patch().unwrap());
        assert_eq!(gf.data(), &[0u8; 8]);
    }

    #[test]
    fn test_sibling_patch_applied() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("game.bin");
        std::fs::write(&path, [0u8; 8]).unwrap();

        // PATCH, one record at offset 2 with bytes AA BB, EOF
        let mut patch = b"PATCH".to_vec();
        patch.extend_from_slice(&[0, 0, 2, 0, 2, 0xAA, 0xBB]);
        patch.extend_from_slice(b"EOF");
        std::fs::write(dir.path().join("game.bin.ips"), &patch).unwrap();

        let mut gf = GameFile::open(&path).unwrap();
        assert!(gf.apply_sibling_patch().unwrap());
        assert_eq!(gf.data(), &[0, 0, 0xAA, 0xBB, 0, 0, 0, 0]);
    }
}
