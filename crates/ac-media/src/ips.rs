//! IPS patch application
//!
//! Classic IPS: "PATCH" magic, then records of 3-byte offset, 2-byte
//! size, and either `size` literal bytes or (size == 0) an RLE record
//! of 2-byte run length plus one fill byte, terminated by "EOF".

use ac_core::{MediaError, Result};

/// Apply an IPS patch to `target`, growing it as needed.
pub fn apply(patch: &[u8], target: &mut Vec<u8>) -> Result<()> {
    if patch.len() < 8 || &patch[0..5] != b"PATCH" {
        return Err(MediaError::BadPatch("missing PATCH header".to_string()).into());
    }

    let mut pos = 5;
    loop {
        if pos + 3 > patch.len() {
            return Err(MediaError::BadPatch("truncated record header".to_string()).into());
        }
        if &patch[pos..pos + 3] == b"EOF" {
            return Ok(());
        }

        let offset =
            ((patch[pos] as usize) << 16) | ((patch[pos + 1] as usize) << 8) | patch[pos + 2] as usize;
        pos += 3;

        if pos + 2 > patch.len() {
            return Err(MediaError::BadPatch("truncated record size".to_string()).into());
        }
        let size = ((patch[pos] as usize) << 8) | patch[pos + 1] as usize;
        pos += 2;

        if size == 0 {
            // RLE record
            if pos + 3 > patch.len() {
                return Err(MediaError::BadPatch("truncated RLE record".to_string()).into());
            }
            let run = ((patch[pos] as usize) << 8) | patch[pos + 1] as usize;
            let fill = patch[pos + 2];
            pos += 3;

            if target.len() < offset + run {
                target.resize(offset + run, 0);
            }
            target[offset..offset + run].fill(fill);
        } else {
            if pos + size > patch.len() {
                return Err(MediaError::BadPatch("truncated data record".to_string()).into());
            }
            if target.len() < offset + size {
                target.resize(offset + size, 0);
            }
            target[offset..offset + size].copy_from_slice(&patch[pos..pos + size]);
            pos += size;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn patch(records: &[u8]) -> Vec<u8> {
        let mut p = b"PATCH".to_vec();
        p.extend_from_slice(records);
        p.extend_from_slice(b"EOF");
        p
    }

    #[test]
    fn test_literal_record() {
        let mut data = vec![0u8; 4];
        apply(&patch(&[0, 0, 1, 0, 2, 0x12, 0x34]), &mut data).unwrap();
        assert_eq!(data, [0, 0x12, 0x34, 0]);
    }

    #[test]
    fn test_rle_record() {
        let mut data = vec![0u8; 8];
        apply(&patch(&[0, 0, 2, 0, 0, 0, 4, 0xFF]), &mut data).unwrap();
        assert_eq!(data, [0, 0, 0xFF, 0xFF, 0xFF, 0xFF, 0, 0]);
    }

    #[test]
    fn test_grows_target() {
        let mut data = vec![0u8; 2];
        apply(&patch(&[0, 0, 4, 0, 1, 0xAB]), &mut data).unwrap();
        assert_eq!(data, [0, 0, 0, 0, 0xAB]);
    }

    #[test]
    fn test_bad_magic() {
        let mut data = vec![0u8; 2];
        assert!(apply(b"NOTIPSEOF", &mut data).is_err());
    }

    #[test]
    fn test_truncated_patch() {
        let mut data = vec![0u8; 2];
        let mut p = b"PATCH".to_vec();
        p.extend_from_slice(&[0, 0, 1, 0, 5, 1, 2]); // claims 5 bytes, has 2
        assert!(apply(&p, &mut data).is_err());
    }
}
