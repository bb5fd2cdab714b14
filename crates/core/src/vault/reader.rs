//! File reading with an encoding fallback chain.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ReadError {
    #[error("file not found: {0}")]
    NotFound(PathBuf),

    #[error("access denied reading {path}: {source}")]
    AccessDenied {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("no supported encoding could decode {0}")]
    Undecodable(PathBuf),
}

/// Read a file's raw bytes and decode them with the fallback chain.
///
/// Returns both the raw bytes (for fingerprinting) and the decoded text,
/// so callers hash exactly the bytes that were parsed.
pub fn read_decoded(path: &Path) -> Result<(Vec<u8>, String), ReadError> {
    let bytes = std::fs::read(path).map_err(|e| match e.kind() {
        ErrorKind::NotFound => ReadError::NotFound(path.to_path_buf()),
        ErrorKind::PermissionDenied => {
            ReadError::AccessDenied { path: path.to_path_buf(), source: e }
        }
        _ => ReadError::Io { path: path.to_path_buf(), source: e },
    })?;

    match decode(&bytes) {
        Some(text) => Ok((bytes, text)),
        None => Err(ReadError::Undecodable(path.to_path_buf())),
    }
}

/// Decode bytes through the ordered encoding chain: UTF-8, UTF-16
/// (BOM-signalled, either byte order), then Latin-1. The first encoding
/// that decodes cleanly wins.
///
/// Latin-1 maps every byte to a character, so it is constrained to
/// text-like input: bytes carrying control characters other than
/// tab/newline/carriage-return/form-feed fail the whole chain.
pub fn decode(bytes: &[u8]) -> Option<String> {
    if let Ok(text) = std::str::from_utf8(bytes) {
        return Some(text.trim_start_matches('\u{feff}').to_string());
    }

    if let Some(text) = decode_utf16(bytes) {
        return Some(text);
    }

    decode_latin1(bytes)
}

fn decode_utf16(bytes: &[u8]) -> Option<String> {
    let (le, payload) = match bytes {
        [0xff, 0xfe, rest @ ..] => (true, rest),
        [0xfe, 0xff, rest @ ..] => (false, rest),
        _ => return None,
    };

    if payload.len() % 2 != 0 {
        return None;
    }

    let units: Vec<u16> = payload
        .chunks_exact(2)
        .map(|pair| {
            if le {
                u16::from_le_bytes([pair[0], pair[1]])
            } else {
                u16::from_be_bytes([pair[0], pair[1]])
            }
        })
        .collect();

    String::from_utf16(&units).ok()
}

fn decode_latin1(bytes: &[u8]) -> Option<String> {
    if bytes.iter().any(|&b| b < 0x20 && !matches!(b, b'\t' | b'\n' | b'\r' | 0x0c)) {
        return None;
    }
    Some(bytes.iter().map(|&b| b as char).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn utf8_passes_through() {
        assert_eq!(decode("héllo".as_bytes()), Some("héllo".to_string()));
    }

    #[test]
    fn utf8_bom_is_stripped() {
        let mut bytes = vec![0xef, 0xbb, 0xbf];
        bytes.extend_from_slice(b"# Title");
        assert_eq!(decode(&bytes), Some("# Title".to_string()));
    }

    #[test]
    fn utf16_le_with_bom() {
        let mut bytes = vec![0xff, 0xfe];
        for unit in "héllo".encode_utf16() {
            bytes.extend_from_slice(&unit.to_le_bytes());
        }
        assert_eq!(decode(&bytes), Some("héllo".to_string()));
    }

    #[test]
    fn utf16_be_with_bom() {
        let mut bytes = vec![0xfe, 0xff];
        for unit in "héllo".encode_utf16() {
            bytes.extend_from_slice(&unit.to_be_bytes());
        }
        assert_eq!(decode(&bytes), Some("héllo".to_string()));
    }

    #[test]
    fn latin1_fallback() {
        // "café" in Latin-1: 0xe9 is not valid UTF-8 on its own
        let bytes = [b'c', b'a', b'f', 0xe9];
        assert_eq!(decode(&bytes), Some("café".to_string()));
    }

    #[test]
    fn binary_content_fails_the_chain() {
        let bytes = [0x00, 0x01, 0x02, 0xff, 0xfa];
        assert_eq!(decode(&bytes), None);
    }

    #[test]
    fn missing_file_is_distinguishable() {
        let result = read_decoded(Path::new("/nonexistent/file.md"));
        assert!(matches!(result, Err(ReadError::NotFound(_))));
    }

    #[test]
    fn read_returns_raw_bytes_and_text() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("note.md");
        fs::write(&path, "# Hi").unwrap();

        let (bytes, text) = read_decoded(&path).unwrap();
        assert_eq!(bytes, b"# Hi");
        assert_eq!(text, "# Hi");
    }
}
