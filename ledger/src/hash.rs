//! # Hashing Utilities
//!
//! BLAKE3 is the only hash function in the ledger. It derives addresses,
//! storage slots and the world state root.

/// Compute the BLAKE3 hash of the input data.
///
/// # Example
///
/// ```
/// use simplesafe_ledger::hash::blake3_hash;
///
/// let hash = blake3_hash(b"simplesafe");
/// assert_eq!(hash.len(), 32);
/// ```
pub fn blake3_hash(data: &[u8]) -> [u8; 32] {
    *blake3::hash(data).as_bytes()
}

/// Hash the concatenation of several byte strings without allocating the
/// concatenation. Callers are responsible for making the parts unambiguous
/// (fixed-width fields or a leading domain tag).
pub fn blake3_parts(parts: &[&[u8]]) -> [u8; 32] {
    let mut hasher = blake3::Hasher::new();
    for part in parts {
        hasher.update(part);
    }
    *hasher.finalize().as_bytes()
}

/// Build a binary Merkle root over the given leaves.
///
/// Odd nodes are paired with themselves. An empty leaf set yields
/// `[0u8; 32]`, so an empty world has a recognizable root.
pub fn merkle_root(mut level: Vec<[u8; 32]>) -> [u8; 32] {
    if level.is_empty() {
        return [0u8; 32];
    }

    while level.len() > 1 {
        let mut next = Vec::with_capacity((level.len() + 1) / 2);
        for chunk in level.chunks(2) {
            let right = chunk.get(1).unwrap_or(&chunk[0]);
            next.push(blake3_parts(&[&chunk[0], right]));
        }
        level = next;
    }

    level[0]
}
