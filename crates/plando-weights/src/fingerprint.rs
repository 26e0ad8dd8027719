use sha2::{Digest, Sha256};

use crate::errors::Result;
use crate::model::WeightTable;

/// Stable fingerprint of an effective weight table.
///
/// Recorded in plando metadata so a rolled file can be traced back to the
/// exact weights that produced it.
pub fn fingerprint_table(table: &WeightTable) -> Result<String> {
    let encoded = serde_json::to_vec(table)?;
    let mut hasher = Sha256::new();
    hasher.update(&encoded);
    let digest = hasher.finalize();
    Ok(format!("sha256:{}", hex::encode(digest)))
}
