//! Kind-prefixed value encoding shared by the WAL and the SSTables.
//!
//! Every value stored on disk is "encoded": the first byte carries the
//! operation kind, the rest is the user payload. Tombstones (deletes)
//! carry an empty payload. The same byte layout flows unchanged from the
//! write path through the WAL, the memtable, and into SSTables, so a
//! record never needs re-encoding as it migrates down the tree.

/// Operation kind, stored as the first byte of every encoded value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpKind {
    /// A live key-value pair.
    Set,
    /// A tombstone shadowing any older value for the key.
    Delete,
}

impl OpKind {
    /// The on-disk byte for this kind.
    #[must_use]
    pub fn as_byte(self) -> u8 {
        match self {
            OpKind::Set => 0x00,
            OpKind::Delete => 0x01,
        }
    }

    /// Decodes a kind byte. Unknown bytes are treated as `Set` so that a
    /// future kind degrades to "present" rather than silently deleting.
    #[must_use]
    pub fn from_byte(b: u8) -> OpKind {
        match b {
            0x01 => OpKind::Delete,
            _ => OpKind::Set,
        }
    }
}

/// Encodes a user payload with its operation kind.
///
/// For `Delete` the payload is ignored and the encoding is the single
/// kind byte.
#[must_use]
pub fn encode(kind: OpKind, payload: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(1 + payload.len());
    out.push(kind.as_byte());
    if kind == OpKind::Set {
        out.extend_from_slice(payload);
    }
    out
}

/// Returns `true` if the encoded value is a tombstone.
#[must_use]
pub fn is_tombstone(encoded: &[u8]) -> bool {
    encoded.first().map(|&b| OpKind::from_byte(b)) == Some(OpKind::Delete)
}

/// The user payload of an encoded value (empty for tombstones).
#[must_use]
pub fn payload(encoded: &[u8]) -> &[u8] {
    if encoded.is_empty() || is_tombstone(encoded) {
        &[]
    } else {
        &encoded[1..]
    }
}
