//! Content-addressed chunk identity.
//!
//! The identity hash gates writes: a chunk whose stored hash equals the
//! freshly computed one is skipped entirely (no embedding call, no row
//! update). It must therefore be collision resistant, so SHA-256 is used.
//!
//! Every field is written with a length prefix, so moving bytes from one
//! field into a neighbouring one always changes the digest.

use sha2::{Digest, Sha256};

use crate::models::{ChunkKey, Slot};

/// Compute the hex SHA-256 identity hash of a chunk.
///
/// # Example
///
/// ```rust
/// use ragkit_core::hash::identity_hash;
/// use ragkit_core::models::Slot;
///
/// let h = identity_hash("team/topic", Slot::Staging, "https://x/a", 0, "hello");
/// assert_eq!(h.len(), 64);
/// assert_ne!(h, identity_hash("team/topic", Slot::Prod, "https://x/a", 0, "hello"));
/// ```
pub fn identity_hash(
    namespace: &str,
    slot: Slot,
    source_id: &str,
    chunk_no: i64,
    content: &str,
) -> String {
    let mut hasher = Sha256::new();
    write_field(&mut hasher, namespace.as_bytes());
    write_field(&mut hasher, slot.as_str().as_bytes());
    write_field(&mut hasher, source_id.as_bytes());
    write_field(&mut hasher, &chunk_no.to_le_bytes());
    write_field(&mut hasher, content.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// [`identity_hash`] for an already-built key.
pub fn key_hash(key: &ChunkKey, content: &str) -> String {
    identity_hash(
        &key.namespace,
        key.slot,
        &key.source_id,
        key.chunk_no,
        content,
    )
}

fn write_field(hasher: &mut Sha256, bytes: &[u8]) {
    hasher.update((bytes.len() as u64).to_le_bytes());
    hasher.update(bytes);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> String {
        identity_hash("n", Slot::Staging, "src", 1, "content")
    }

    #[test]
    fn test_deterministic() {
        assert_eq!(base(), base());
        assert!(base().chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_every_field_matters() {
        let b = base();
        assert_ne!(b, identity_hash("m", Slot::Staging, "src", 1, "content"));
        assert_ne!(b, identity_hash("n", Slot::Prod, "src", 1, "content"));
        assert_ne!(b, identity_hash("n", Slot::Staging, "srd", 1, "content"));
        assert_ne!(b, identity_hash("n", Slot::Staging, "src", 2, "content"));
        assert_ne!(b, identity_hash("n", Slot::Staging, "src", 1, "content."));
    }

    #[test]
    fn test_field_boundaries() {
        let a = identity_hash("ab", Slot::Staging, "c", 0, "x");
        let b = identity_hash("a", Slot::Staging, "bc", 0, "x");
        assert_ne!(a, b);
    }

    #[test]
    fn test_key_hash_matches() {
        let key = ChunkKey {
            namespace: "n".into(),
            slot: Slot::Staging,
            source_id: "src".into(),
            chunk_no: 1,
        };
        assert_eq!(key_hash(&key, "content"), base());
    }
}
