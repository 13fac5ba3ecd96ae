//! Pure protocol logic: header parsing, ack derivation, path containment.
//!
//! Everything here is synchronous and stream-free so it can be unit tested
//! without sockets; net.rs layers the async I/O on top.

use anyhow::{anyhow, bail, Result};
use std::path::{Component, Path, PathBuf};

use crate::error::ProtocolError;
use crate::protocol::{ACK_ECHO_OFFSET, HEADER_LEN, HELLO_HEADER_PREFIX, LEN_OFFSET, SERVER_OPCODE};

/// Extract the payload length from a frame header (big-endian u16 in the
/// last 2 bytes).
pub fn payload_len(header: &[u8; HEADER_LEN]) -> usize {
    u16::from_be_bytes([header[LEN_OFFSET], header[LEN_OFFSET + 1]]) as usize
}

/// Build the server hello header: 6 fixed bytes followed by the payload
/// length big-endian.
pub fn build_hello_header(payload_len: u16) -> [u8; HEADER_LEN] {
    let mut header = [0u8; HEADER_LEN];
    header[..LEN_OFFSET].copy_from_slice(&HELLO_HEADER_PREFIX);
    header[LEN_OFFSET..].copy_from_slice(&payload_len.to_be_bytes());
    header
}

/// Derive the 8-byte ack header for a received frame.
///
/// Byte 0 becomes the server opcode and byte 4 echoes the original byte 0;
/// every other byte is carried through verbatim - including the length
/// field, which therefore still describes the acknowledged frame's payload,
/// not the ack's own (always empty) one. The real client expects exactly
/// this layout, so the inherited length must not be recomputed.
pub fn make_ack(received: &[u8]) -> Result<[u8; HEADER_LEN], ProtocolError> {
    let header: [u8; HEADER_LEN] = received
        .try_into()
        .map_err(|_| ProtocolError::InvalidFrame(received.len()))?;
    let mut ack = header;
    ack[0] = SERVER_OPCODE;
    ack[ACK_ECHO_OFFSET] = header[0];
    Ok(ack)
}

/// Normalize a client-declared file name to be safely under the destination
/// root. This prevents path traversal by:
/// 1. Rejecting absolute paths, parent directory components, and root/prefix components
/// 2. Rejecting NUL bytes in the name
/// 3. On Windows, rejecting ':' in path components (ADS defense)
/// 4. Canonicalizing the final path to resolve symlinks
/// 5. Ensuring the result is under the root
pub fn normalize_under_root(root: &Path, p: &Path) -> Result<PathBuf> {
    use Component::{CurDir, Normal, ParentDir, Prefix, RootDir};

    // Reject paths containing NUL
    let path_str = p.to_string_lossy();
    if path_str.contains('\0') {
        bail!("path contains NUL byte");
    }

    // Build safe relative path
    let mut safe = PathBuf::new();
    for component in p.components() {
        match component {
            CurDir => {} // Skip "."
            Normal(s) => {
                // On Windows, reject components with ':' (ADS defense)
                #[cfg(windows)]
                if s.to_string_lossy().contains(':') {
                    bail!("path component contains colon (potential ADS attack)");
                }
                safe.push(s);
            }
            ParentDir | RootDir | Prefix(_) => {
                bail!("path contains disallowed component: {:?}", component);
            }
        }
    }
    if safe.as_os_str().is_empty() {
        bail!("empty file name");
    }

    // Join with root
    let joined = root.join(&safe);

    // For existing paths, canonicalize to resolve symlinks
    // For new files, canonicalize parent then append filename
    let final_path = if joined.exists() {
        joined
            .canonicalize()
            .map_err(|e| anyhow!("failed to canonicalize {:?}: {}", joined, e))?
    } else if let Some(parent) = joined.parent() {
        if parent.exists() {
            let canonical_parent = parent
                .canonicalize()
                .map_err(|e| anyhow!("failed to canonicalize parent {:?}: {}", parent, e))?;
            if let Some(filename) = joined.file_name() {
                canonical_parent.join(filename)
            } else {
                canonical_parent
            }
        } else {
            joined
        }
    } else {
        joined
    };

    // Ensure final path is under root
    if !final_path.starts_with(root) {
        bail!("path {:?} escapes root {:?}", p, root);
    }

    Ok(final_path)
}

/// Create directory with parent creation
pub fn ensure_dir_exists(path: &Path) -> Result<()> {
    if !path.exists() {
        std::fs::create_dir_all(path)?;
    }
    Ok(())
}

/// Create parent directory if needed
pub fn ensure_parent_exists(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        ensure_dir_exists(parent)?;
    }
    Ok(())
}
