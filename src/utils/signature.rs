// src/utils/signature.rs - Fingerprints of the fields a pair was scored on
use sha2::{Digest, Sha256};

use crate::matching::normalize::{normalize_name, normalize_plot_id};
use crate::models::core::{Parcel, TextRecord};

/// Hashes the normalized matching fields of both records. Two scorings of
/// the same pair share a signature exactly when none of those fields changed.
pub fn pair_signature(parcel: &Parcel, record: &TextRecord) -> String {
    let mut hasher = Sha256::new();
    for part in signature_parts(parcel, record) {
        hasher.update(part.as_bytes());
        // Field separator so ("ab", "c") and ("a", "bc") differ.
        hasher.update([0x1f]);
    }
    hex::encode(hasher.finalize())
}

fn signature_parts(parcel: &Parcel, record: &TextRecord) -> Vec<String> {
    let opt_name = |v: &Option<String>| v.as_deref().map(normalize_name).unwrap_or_default();
    let opt_plot = |v: &Option<String>| v.as_deref().map(normalize_plot_id).unwrap_or_default();
    let area = |v: Option<f64>| v.map(|a| format!("{:.4}", a)).unwrap_or_default();

    vec![
        parcel.id.clone(),
        normalize_name(&parcel.owner_name),
        opt_name(&parcel.father_name),
        opt_plot(&parcel.plot_id),
        area(parcel.area()),
        record.id.clone(),
        normalize_name(&record.owner_name),
        opt_name(&record.father_name),
        opt_plot(&record.plot_id),
        area(record.area_sqm()),
    ]
}
