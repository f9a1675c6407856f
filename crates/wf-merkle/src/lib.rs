// SPDX-License-Identifier: MIT OR Apache-2.0
#![deny(unsafe_code)]
#![warn(missing_docs)]
//! Append-only Merkle accumulator over a sequence of leaf hashes.
//!
//! The accumulator hashes leaves as they are appended, keeps the full leaf
//! sequence, and recomputes internal levels on demand. The root after `n`
//! appends is a pure function of the ordered sequence of leaf bytes — it
//! does not depend on wall-clock time or thread scheduling (§4.C). Odd-sized
//! levels duplicate their last node before pairing, matching the reference
//! policy.

use sha2::{Digest, Sha256};

/// Hex-encoded SHA-256 digest of `bytes`.
#[must_use]
pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

fn hash_pair(left: &str, right: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(left.as_bytes());
    hasher.update(right.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Which side of its sibling a node sits on, recorded in an authentication
/// path so [`MerkleAccumulator::verify`] knows hash order at each level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    /// The sibling is the left operand; the path node is the right operand.
    Left,
    /// The sibling is the right operand; the path node is the left operand.
    Right,
}

/// One step of an authentication path: a sibling hash and which side it
/// occupies relative to the node being proven.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProofStep {
    /// The sibling's hash at this level.
    pub sibling: String,
    /// The sibling's side relative to the node whose membership is proven.
    pub side: Side,
}

/// Errors raised while building or querying the accumulator.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum MerkleError {
    /// `proofAt` was called with an index past the current leaf count.
    #[error("leaf index {index} out of range (have {len} leaves)")]
    IndexOutOfRange {
        /// Requested index.
        index: usize,
        /// Number of leaves currently appended.
        len: usize,
    },
}

/// An append-only accumulator over SHA-256 leaf hashes.
///
/// Maintains the full leaf sequence and every internal level, rebuilt after
/// each append. This is not the cheapest possible implementation (an
/// incremental accumulator could avoid the O(n) rebuild) but it is the
/// simplest one whose observable contract — `root()` and `proof_at()`
/// reflect the full current leaf set — is trivially correct, which matters
/// more than throughput for a reference engine.
#[derive(Debug, Clone, Default)]
pub struct MerkleAccumulator {
    leaves: Vec<String>,
    levels: Vec<Vec<String>>,
}

impl MerkleAccumulator {
    /// Construct an empty accumulator.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Hash `bytes`, append the resulting leaf hash, rebuild the tree, and
    /// return the new leaf's hash.
    pub fn append(&mut self, bytes: &[u8]) -> String {
        let leaf = sha256_hex(bytes);
        self.leaves.push(leaf.clone());
        self.rebuild();
        leaf
    }

    /// Append an already-computed leaf hash directly, without re-hashing.
    /// Used when the caller (e.g. the receipt store) has already hashed the
    /// canonical bytes and wants to avoid hashing twice.
    pub fn append_leaf_hash(&mut self, leaf_hash: impl Into<String>) -> String {
        let leaf = leaf_hash.into();
        self.leaves.push(leaf.clone());
        self.rebuild();
        leaf
    }

    fn rebuild(&mut self) {
        let mut levels = vec![self.leaves.clone()];
        while levels.last().is_some_and(|level| level.len() > 1) {
            let current = levels.last().expect("checked non-empty above");
            let mut next = Vec::with_capacity(current.len().div_ceil(2));
            let mut i = 0;
            while i < current.len() {
                let left = &current[i];
                let right = if i + 1 < current.len() {
                    &current[i + 1]
                } else {
                    left
                };
                next.push(hash_pair(left, right));
                i += 2;
            }
            levels.push(next);
        }
        self.levels = levels;
    }

    /// Number of leaves appended so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.leaves.len()
    }

    /// Whether no leaves have been appended.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.leaves.is_empty()
    }

    /// The leaf sequence, in append order.
    #[must_use]
    pub fn leaves(&self) -> &[String] {
        &self.leaves
    }

    /// The current root, or `None` if no leaves have been appended.
    #[must_use]
    pub fn root(&self) -> Option<String> {
        self.levels.last().and_then(|top| top.first()).cloned()
    }

    /// The authentication path for the leaf at `index`: a sequence of
    /// (sibling hash, side) pairs from the leaf up to (but not including)
    /// the root.
    ///
    /// # Errors
    ///
    /// Returns [`MerkleError::IndexOutOfRange`] if `index >= self.len()`.
    pub fn proof_at(&self, index: usize) -> Result<Vec<ProofStep>, MerkleError> {
        if index >= self.leaves.len() {
            return Err(MerkleError::IndexOutOfRange {
                index,
                len: self.leaves.len(),
            });
        }
        let mut path = Vec::new();
        let mut pos = index;
        for level in &self.levels[..self.levels.len().saturating_sub(1)] {
            let sibling_pos = if pos % 2 == 0 { pos + 1 } else { pos - 1 };
            let sibling = if sibling_pos < level.len() {
                level[sibling_pos].clone()
            } else {
                level[pos].clone()
            };
            let side = if pos % 2 == 0 { Side::Right } else { Side::Left };
            path.push(ProofStep { sibling, side });
            pos /= 2;
        }
        Ok(path)
    }

    /// Recompute a root from `leaf_hash` and an authentication path, and
    /// compare it against `root`.
    #[must_use]
    pub fn verify(leaf_hash: &str, proof: &[ProofStep], root: &str) -> bool {
        let mut current = leaf_hash.to_string();
        for step in proof {
            current = match step.side {
                Side::Left => hash_pair(&step.sibling, &current),
                Side::Right => hash_pair(&current, &step.sibling),
            };
        }
        current == root
    }
}
