//! Content fingerprinting for change detection.

use std::fs::File;
use std::io::{Read, Result};
use std::path::Path;

use sha2::{Digest, Sha256};

const CHUNK_SIZE: usize = 64 * 1024;

/// Compute the SHA-256 fingerprint of a file's exact byte content,
/// streaming in fixed-size chunks so large files are never held in
/// memory at once. Returns the lowercase hex digest.
///
/// Read failures propagate to the caller; there is no fallback
/// fingerprint for unreadable files.
pub fn fingerprint_file(path: &Path) -> Result<String> {
    let mut file = File::open(path)?;
    let mut hasher = Sha256::new();
    let mut buf = vec![0u8; CHUNK_SIZE];

    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }

    Ok(hex_lower(&hasher.finalize()))
}

/// Fingerprint an in-memory byte slice. Produces the same digest as
/// [`fingerprint_file`] over identical content.
pub fn fingerprint_bytes(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex_lower(&hasher.finalize())
}

fn hex_lower(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        out.push_str(&format!("{b:02x}"));
    }
    out
}
