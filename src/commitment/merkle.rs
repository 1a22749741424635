//! Order-sensitive Merkle root over opaque blobs.
//!
//! Leaves are keccak-256 of each blob; parents are keccak-256 of the
//! concatenated child hashes. Layers with an odd node count duplicate the
//! trailing node before pairing, which is the shape the escrow contract
//! recomputes on-chain. Reordering, substituting or dropping any blob
//! changes the root.

use alloy::primitives::{keccak256, B256};
use thiserror::Error;

/// Failure to build a commitment from the given input.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CommitmentError {
    /// Input that no commitment can be computed over.
    #[error("invalid commitment input: {0}")]
    InvalidInput(&'static str),
}

/// Compute the Merkle root over `blobs` in the order given.
///
/// A single blob yields its leaf hash. An empty slice is an error: an empty
/// commitment would bind to nothing.
pub fn merkle_root<B: AsRef<[u8]>>(blobs: &[B]) -> Result<B256, CommitmentError> {
    if blobs.is_empty() {
        return Err(CommitmentError::InvalidInput("empty blob list"));
    }

    let mut layer: Vec<B256> = blobs.iter().map(|b| keccak256(b.as_ref())).collect();
    while layer.len() > 1 {
        if layer.len() % 2 == 1 {
            if let Some(&last) = layer.last() {
                layer.push(last);
            }
        }
        let mut next = Vec::with_capacity(layer.len() / 2);
        for pair in layer.chunks(2) {
            next.push(hash_pair(pair[0], pair[1]));
        }
        layer = next;
    }
    Ok(layer[0])
}

fn hash_pair(left: B256, right: B256) -> B256 {
    let mut combined = [0u8; 64];
    combined[..32].copy_from_slice(left.as_slice());
    combined[32..].copy_from_slice(right.as_slice());
    keccak256(combined)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_input_is_rejected() {
        let blobs: Vec<Vec<u8>> = vec![];
        assert_eq!(
            merkle_root(&blobs),
            Err(CommitmentError::InvalidInput("empty blob list"))
        );
    }

    #[test]
    fn single_blob_root_is_its_leaf_hash() {
        let root = merkle_root(&[b"only".to_vec()]).unwrap();
        assert_eq!(root, keccak256(b"only"));
    }

    #[test]
    fn root_is_deterministic() {
        let blobs = vec![b"a".to_vec(), b"b".to_vec(), b"c".to_vec()];
        assert_eq!(merkle_root(&blobs).unwrap(), merkle_root(&blobs).unwrap());
    }

    #[test]
    fn root_is_order_sensitive() {
        let forward = merkle_root(&[b"a".to_vec(), b"b".to_vec()]).unwrap();
        let reversed = merkle_root(&[b"b".to_vec(), b"a".to_vec()]).unwrap();
        assert_ne!(forward, reversed);
    }

    #[test]
    fn substituted_blob_changes_root() {
        let original = merkle_root(&[b"a".to_vec(), b"b".to_vec(), b"c".to_vec()]).unwrap();
        let tampered = merkle_root(&[b"a".to_vec(), b"x".to_vec(), b"c".to_vec()]).unwrap();
        assert_ne!(original, tampered);
    }

    #[test]
    fn odd_layers_duplicate_the_trailing_node() {
        let blobs = vec![b"a".to_vec(), b"b".to_vec(), b"c".to_vec()];
        let leaf = |b: &[u8]| keccak256(b);
        let left = hash_pair(leaf(b"a"), leaf(b"b"));
        let right = hash_pair(leaf(b"c"), leaf(b"c"));
        let expected = hash_pair(left, right);
        assert_eq!(merkle_root(&blobs).unwrap(), expected);
    }

    #[test]
    fn two_blobs_hash_as_one_pair() {
        let blobs = vec![b"left".to_vec(), b"right".to_vec()];
        let expected = hash_pair(keccak256(b"left"), keccak256(b"right"));
        assert_eq!(merkle_root(&blobs).unwrap(), expected);
    }
}
