//! Content digests for anchor records.

use blake2::digest::consts::U32;
use blake2::{Blake2b, Digest};
use lumina_types::PolicyDecision;

type Blake2b256 = Blake2b<U32>;

/// Blake2b-256 over a decision's immutable core: id, policy, outcome,
/// reason, context and creation time.
///
/// Anchoring metadata and the execution stamp are excluded, so the digest
/// is stable across retries and after execution.
pub fn decision_digest(decision: &PolicyDecision) -> Result<[u8; 32], serde_json::Error> {
    let context = serde_json::to_vec(&decision.context)?;
    let mut hasher = Blake2b256::new();
    for part in [
        decision.id.as_str().as_bytes(),
        decision.policy.as_bytes(),
        decision.decision.to_string().as_bytes(),
        decision.reason.as_bytes(),
        context.as_slice(),
        &decision.created_at.as_secs().to_le_bytes()[..],
    ] {
        // Length-prefix each part so adjacent fields cannot run together.
        hasher.update((part.len() as u64).to_le_bytes());
        hasher.update(part);
    }
    let mut output = [0u8; 32];
    output.copy_from_slice(&hasher.finalize());
    Ok(output)
}

/// Anchor id derived from the digest: `anc_` plus the first 16 bytes in hex.
pub fn anchor_id(digest: &[u8; 32]) -> String {
    format!("anc_{}", hex::encode(&digest[..16]))
}
