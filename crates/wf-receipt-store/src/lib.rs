// SPDX-License-Identifier: MIT OR Apache-2.0
#![deny(unsafe_code)]
#![warn(missing_docs)]
//! Ordered, run-scoped receipt append log (§4.D).
//!
//! Wraps a [`wf_merkle::MerkleAccumulator`]: on append, a receipt is
//! canonicalized with `merkle_proof` elided, hashed into the accumulator,
//! and the resulting leaf hash is written back into the stored receipt's
//! `merkle_proof` field — the store's copy, not the caller's. Lookups are
//! by step id or by run-order index; `verify` recomputes a stored receipt's
//! leaf hash and checks it against the accumulator's authentication path
//! and current root.

use std::collections::HashMap;

use wf_core::Receipt;
use wf_error::{ErrorInfo, ErrorKind};
use wf_merkle::{MerkleAccumulator, ProofStep};

/// Errors raised while appending to or querying a [`ReceiptStore`].
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// A receipt for this step id was already appended in this run.
    #[error("step `{step_id}` already has a receipt in this run")]
    DuplicateStepId {
        /// The offending step id.
        step_id: String,
    },
    /// Canonicalizing the receipt for hashing failed.
    #[error("failed to canonicalize receipt: {0}")]
    Canonicalize(#[from] wf_core::CoreError),
}

/// Append-only, run-scoped store of receipts, indexed by step id and by
/// run-order position, backed by a [`MerkleAccumulator`].
#[derive(Debug, Default)]
pub struct ReceiptStore {
    accumulator: MerkleAccumulator,
    receipts: Vec<Receipt>,
    index_by_step: HashMap<String, usize>,
}

impl ReceiptStore {
    /// Construct an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a receipt: canonicalize with `merkle_proof` elided, hash into
    /// the accumulator, write the leaf hash back into the stored copy, and
    /// index it under `step_id`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::DuplicateStepId`] if a receipt for this step
    /// was already appended this run, or [`StoreError::Canonicalize`] if
    /// the receipt cannot be serialized.
    pub fn append(&mut self, mut receipt: Receipt) -> Result<&Receipt, StoreError> {
        if self.index_by_step.contains_key(&receipt.step_id) {
            return Err(StoreError::DuplicateStepId {
                step_id: receipt.step_id,
            });
        }
        receipt.merkle_proof = None;
        let leaf_bytes = receipt.canonical_leaf_bytes()?;
        let leaf_hash = self.accumulator.append(&leaf_bytes);
        receipt.merkle_proof = Some(leaf_hash);

        let index = self.receipts.len();
        self.index_by_step.insert(receipt.step_id.clone(), index);
        self.receipts.push(receipt);
        tracing::debug!(step_id = %self.receipts[index].step_id, index, "receipt appended");
        Ok(&self.receipts[index])
    }

    /// Look up a receipt by step id.
    #[must_use]
    pub fn get(&self, step_id: &str) -> Option<&Receipt> {
        self.index_by_step.get(step_id).map(|&i| &self.receipts[i])
    }

    /// All receipts, in append (run) order.
    #[must_use]
    pub fn all(&self) -> &[Receipt] {
        &self.receipts
    }

    /// Number of receipts appended so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.receipts.len()
    }

    /// Whether no receipts have been appended.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.receipts.is_empty()
    }

    /// The current Merkle root, or `None` if empty.
    #[must_use]
    pub fn root(&self) -> Option<String> {
        self.accumulator.root()
    }

    /// The authentication path for the receipt appended at `step_id`.
    ///
    /// # Errors
    ///
    /// Returns an [`ErrorKind::InvalidReceipt`]-classified error if
    /// `step_id` has no receipt in this store.
    pub fn proof_for(&self, step_id: &str) -> Result<Vec<ProofStep>, ErrorInfo> {
        let index = self.index_by_step.get(step_id).copied().ok_or_else(|| {
            ErrorInfo::new(
                ErrorKind::InvalidReceipt,
                format!("no receipt for step `{step_id}` in this store"),
            )
        })?;
        self.accumulator.proof_at(index).map_err(|e| {
            ErrorInfo::new(ErrorKind::InvalidReceipt, e.to_string())
                .with_context("step_id", step_id)
        })
    }

    /// Verify that the stored receipt for `step_id` is included in the
    /// current root: recompute its leaf hash from canonical bytes (with
    /// `merkle_proof` elided) and check the authentication path.
    ///
    /// # Errors
    ///
    /// Returns an error if there is no receipt for `step_id`, the receipt
    /// cannot be canonicalized, or the current root is unavailable.
    pub fn verify(&self, step_id: &str) -> Result<bool, ErrorInfo> {
        let receipt = self.get(step_id).ok_or_else(|| {
            ErrorInfo::new(
                ErrorKind::InvalidReceipt,
                format!("no receipt for step `{step_id}` in this store"),
            )
        })?;
        let Some(root) = self.root() else {
            return Ok(false);
        };
        let leaf_hash = receipt
            .leaf_hash()
            .map_err(|e| ErrorInfo::new(ErrorKind::InvalidReceipt, e.to_string()))?;
        let proof = self.proof_for(step_id)?;
        Ok(MerkleAccumulator::verify(&leaf_hash, &proof, &root))
    }
}
