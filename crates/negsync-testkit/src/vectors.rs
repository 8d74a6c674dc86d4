//! Golden wire vectors for cross-implementation verification.
//!
//! Every Negentropy v1 implementation using SHA-256 fingerprints must
//! produce these exact bytes.

use negsync_core::{Accumulator, ItemId, Sha256Hasher};
use negsync_store::StorageVector;
use negsync_sync::{Negentropy, DEFAULT_FRAME_SIZE_LIMIT};

use crate::fixtures::storage_from_pairs;

/// Expected fingerprint of an id set.
#[derive(Debug, Clone)]
pub struct FingerprintVector {
    pub name: &'static str,
    pub ids: Vec<[u8; 32]>,
    /// Expected 16-byte fingerprint (hex).
    pub expected: &'static str,
}

/// Expected initial frame for a storage.
#[derive(Debug, Clone)]
pub struct FrameVector {
    pub name: &'static str,
    pub description: &'static str,
    /// `(timestamp, id byte)` items; each id is the byte repeated 32 times.
    pub items: Vec<(u64, u8)>,
    /// Expected output of `initiate()` (hex).
    pub expected: &'static str,
}

pub fn fingerprint_vectors() -> Vec<FingerprintVector> {
    vec![
        FingerprintVector {
            name: "empty",
            ids: vec![],
            expected: "7f9c9e31ac8256ca2f258583df262dbc",
        },
        FingerprintVector {
            name: "single",
            ids: vec![[0x01; 32]],
            expected: "ce041765675ad4d93378e20bd3a7d0d9",
        },
        FingerprintVector {
            name: "carry_through_every_byte",
            ids: vec![[0xff; 32], [0x01; 32]],
            expected: "a45b81d5bd8f90ade27ed6ec281d7f3e",
        },
    ]
}

pub fn frame_vectors() -> Vec<FrameVector> {
    vec![
        FrameVector {
            name: "two_items_id_list",
            description: "Small sets are sent as one id list up to infinity",
            items: vec![(100, 0x01), (200, 0x02)],
            expected: concat!(
                "61", "00", "00", "02", "02",
                "0101010101010101010101010101010101010101010101010101010101010101",
                "0202020202020202020202020202020202020202020202020202020202020202",
            ),
        },
        FrameVector {
            name: "forty_items_sixteen_buckets",
            description: "40 items split 3,3,3,3,3,3,3,3,2,2,2,2,2,2,2,2 with timestamp-only bounds",
            items: (0..40u8).map(|n| (1000 + n as u64, n)).collect(),
            expected: concat!(
                "61",
                "876c0001c2055e4b533b897450a2f7abc14a3688",
                "040001686aedff2f9c4403c95df663a2e7f94d",
                "0400017851008de1c1111147a0cffd5542d5ee",
                "04000121c47e3389dd7e42ed5f9990ec987897",
                "040001be94a05e5a683c00bbb00ac3bb4435dc",
                "0400014b715d057b6f72486a252102172853b1",
                "0400011bc69c0b9fe040f11e814ecf7dded6d4",
                "0400017c8f9535a9d6cd73ebc6ccc0bb2a05d4",
                "030001ea0b199ccb75b2bf4ad341fb9fc51123",
                "030001a1f81d851b2aeb0e73172e413a6ab574",
                "030001b3e3858268b6e16cf19cad87464bb795",
                "0300011fcfbdb995ca766a5be2bbd528e9ee3d",
                "030001e6b58a8f002f65b65fd1d4bcb4c0fefa",
                "0300011241fc13047494506c3fe92e987bb00f",
                "03000116d326ae01c53db89e5ecd79d96aa042",
                "0000013ce0890e0e3b24cb6629495268f05299",
            ),
        },
    ]
}

/// Compute the fingerprint for a vector (hex).
pub fn compute_fingerprint(vector: &FingerprintVector) -> String {
    let mut acc = Accumulator::new();
    for id in &vector.ids {
        acc.add(&ItemId(*id));
    }
    acc.finish(vector.ids.len() as u64, &Sha256Hasher).to_hex()
}

/// Compute the initial frame for a vector (hex).
pub fn compute_frame(vector: &FrameVector) -> String {
    let storage: StorageVector = storage_from_pairs(&vector.items);
    let mut engine = match Negentropy::new(&storage, DEFAULT_FRAME_SIZE_LIMIT) {
        Ok(engine) => engine,
        Err(err) => return format!("error: {err}"),
    };
    match engine.initiate() {
        Ok(frame) => hex::encode(frame),
        Err(err) => format!("error: {err}"),
    }
}

/// Verify all golden vectors.
///
/// Returns `(name, matches, computed hex)` per vector.
pub fn verify_all_vectors() -> Vec<(String, bool, String)> {
    let fingerprints = fingerprint_vectors().into_iter().map(|v| {
        let hex = compute_fingerprint(&v);
        (v.name.to_string(), hex == v.expected, hex)
    });
    let frames = frame_vectors().into_iter().map(|v| {
        let hex = compute_frame(&v);
        (v.name.to_string(), hex == v.expected, hex)
    });
    fingerprints.chain(frames).collect()
}
