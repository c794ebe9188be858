//! M3U playlist expansion
//!
//! Playlists may nest other playlists. Self-references fail fast, as
//! does nesting past the depth ceiling; both would otherwise recurse
//! without bound.

use ac_core::{MediaError, Result};
use std::path::{Path, PathBuf};

/// Maximum playlist nesting depth
const MAX_DEPTH: usize = 99;

/// Expand an M3U playlist into the ordered list of image paths it
/// references, recursing into nested playlists.
pub fn read_playlist(path: &Path) -> Result<Vec<PathBuf>> {
    let mut out = Vec::new();
    read_inner(path, 0, &mut out)?;
    Ok(out)
}

fn read_inner(path: &Path, depth: usize, out: &mut Vec<PathBuf>) -> Result<()> {
    let content = std::fs::read_to_string(path).map_err(MediaError::Io)?;
    let dir = path.parent().unwrap_or_else(|| Path::new(""));

    for line in content.lines() {
        let line = line.trim_end();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let entry = resolve_entry(dir, line);

        if is_playlist(&entry) {
            if same_file(&entry, path) {
                return Err(
                    MediaError::PlaylistSelfReference(entry.display().to_string()).into(),
                );
            }
            if depth == MAX_DEPTH {
                return Err(MediaError::PlaylistTooDeep(entry.display().to_string()).into());
            }
            read_inner(&entry, depth + 1, out)?;
        } else {
            out.push(entry);
        }
    }

    Ok(())
}

/// True if the path has a playlist extension.
pub fn is_playlist(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|e| e.to_str()),
        Some(e) if e.eq_ignore_ascii_case("m3u")
    )
}

/// True if the path names a disc image or playlist that the disc
/// loading path handles (rather than plain-file loading).
pub fn is_disc_path(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|e| e.to_str()),
        Some(e) if ["cue", "toc", "ccd", "m3u"]
            .iter()
            .any(|d| e.eq_ignore_ascii_case(d))
    )
}

/// Path equality after normalization, so `./a.m3u` and `a.m3u` refer
/// to the same playlist. Falls back to lexical comparison when either
/// path cannot be resolved.
fn same_file(a: &Path, b: &Path) -> bool {
    if a == b {
        return true;
    }
    match (a.canonicalize(), b.canonicalize()) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

fn resolve_entry(dir: &Path, line: &str) -> PathBuf {
    let p = Path::new(line);
    if p.is_absolute() {
        p.to_path_buf()
    } else {
        dir.join(p)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simple_playlist() {
        let dir = tempfile::tempdir().unwrap();
        let m3u = dir.path().join("set.m3u");
        std::fs::write(&m3u, "# comment\ndisc1.cue\ndisc2.cue\n").unwrap();

        let list = read_playlist(&m3u).unwrap();
        assert_eq!(
            list,
            vec![dir.path().join("disc1.cue"), dir.path().join("disc2.cue")]
        );
    }

    #[test]
    fn test_nested_playlist() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("outer.m3u"), "inner.m3u\nextra.cue\n").unwrap();
        std::fs::write(dir.path().join("inner.m3u"), "disc1.cue\n").unwrap();

        let list = read_playlist(&dir.path().join("outer.m3u")).unwrap();
        assert_eq!(
            list,
            vec![dir.path().join("disc1.cue"), dir.path().join("extra.cue")]
        );
    }

    #[test]
    fn test_self_reference_fails() {
        let dir = tempfile::tempdir().unwrap();
        let m3u = dir.path().join("loop.m3u");
        std::fs::write(&m3u, "loop.m3u\n").unwrap();

        let err = read_playlist(&m3u).unwrap_err();
        assert!(matches!(
            err,
            ac_core::CoreError::Media(MediaError::PlaylistSelfReference(_))
        ));
    }

    #[test]
    fn test_self_reference_via_relative_path() {
        let dir = tempfile::tempdir().unwrap();
        let m3u = dir.path().join("loop.m3u");
        std::fs::write(&m3u, "./loop.m3u\n").unwrap();

        let err = read_playlist(&m3u).unwrap_err();
        assert!(matches!(
            err,
            ac_core::CoreError::Media(MediaError::PlaylistSelfReference(_))
        ));
    }

    #[test]
    fn test_mutual_recursion_hits_depth_ceiling() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.m3u"), "b.m3u\n").unwrap();
        std::fs::write(dir.path().join("b.m3u"), "a.m3u\n").unwrap();

        let err = read_playlist(&dir.path().join("a.m3u")).unwrap_err();
        assert!(matches!(
            err,
            ac_core::CoreError::Media(MediaError::PlaylistTooDeep(_))
        ));
    }

    #[test]
    fn test_disc_path_detection() {
        assert!(is_disc_path(Path::new("game.CUE")));
        assert!(is_disc_path(Path::new("game.m3u")));
        assert!(!is_disc_path(Path::new("game.nes")));
    }
}
