//! Deterministic obligation identifiers.
//!
//! Every onboarding run re-detects obligations from scratch. Deriving the id
//! from the semantic identity of an obligation lets reruns overwrite the
//! previous record instead of duplicating it.

use sha2::{Digest, Sha256};

use super::obligations_constants::{OBLIGATION_ID_BYTES, OBLIGATION_ID_PREFIX};
use super::obligations_model::ObligationCategory;
use crate::banking::UserId;

/// Computes `oblg_` + hex of the first 10 bytes of SHA-256(`user|merchant_key|category`).
pub fn compute_obligation_id(
    user_id: UserId,
    merchant_key: &str,
    category: ObligationCategory,
) -> String {
    let mut hasher = Sha256::new();
    hasher.update(user_id.0.to_string().as_bytes());
    hasher.update(b"|");
    hasher.update(merchant_key.as_bytes());
    hasher.update(b"|");
    hasher.update(category.as_str().as_bytes());

    let digest = hasher.finalize();
    format!(
        "{}{}",
        OBLIGATION_ID_PREFIX,
        hex::encode(&digest[..OBLIGATION_ID_BYTES])
    )
}
