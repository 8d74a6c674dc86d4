//! Range fingerprints.
//!
//! A fingerprint summarises every id in a range: the ids are summed modulo
//! 2^256 (little-endian), the element count is appended as a varint, and the
//! result is hashed and truncated to 16 bytes. Summation makes the value
//! independent of iteration order.

use std::fmt;

use sha2::{Digest, Sha256};

use crate::codec::encode_varint;
use crate::types::{ItemId, ID_SIZE};

/// Size in bytes of a range fingerprint.
pub const FINGERPRINT_SIZE: usize = 16;

/// A 16-byte range fingerprint.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Fingerprint(pub [u8; FINGERPRINT_SIZE]);

impl Fingerprint {
    pub const fn from_bytes(bytes: [u8; FINGERPRINT_SIZE]) -> Self {
        Self(bytes)
    }

    pub const fn as_bytes(&self) -> &[u8; FINGERPRINT_SIZE] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Debug for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Fp({})", self.to_hex())
    }
}

impl AsRef<[u8]> for Fingerprint {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

/// Hash function used to finalise fingerprints.
///
/// Both peers must use the same hasher or every range will mismatch.
pub trait RangeHasher: Send + Sync {
    /// Digest `input` into 32 bytes.
    fn digest(&self, input: &[u8]) -> [u8; 32];
}

/// SHA-256, as used by deployed Negentropy peers.
#[derive(Debug, Clone, Copy, Default)]
pub struct Sha256Hasher;

impl RangeHasher for Sha256Hasher {
    fn digest(&self, input: &[u8]) -> [u8; 32] {
        let mut hasher = Sha256::new();
        hasher.update(input);
        hasher.finalize().into()
    }
}

/// BLAKE3, for deployments that control both ends.
#[derive(Debug, Clone, Copy, Default)]
pub struct Blake3Hasher;

impl RangeHasher for Blake3Hasher {
    fn digest(&self, input: &[u8]) -> [u8; 32] {
        *blake3::hash(input).as_bytes()
    }
}

/// Running modular sum of item ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Accumulator {
    buf: [u8; ID_SIZE],
}

impl Accumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an id modulo 2^256, treating both as little-endian integers.
    pub fn add(&mut self, id: &ItemId) {
        let mut carry = 0u16;
        for (acc, byte) in self.buf.iter_mut().zip(id.0.iter()) {
            let sum = *acc as u16 + *byte as u16 + carry;
            *acc = sum as u8;
            carry = sum >> 8;
        }
    }

    pub fn as_bytes(&self) -> &[u8; ID_SIZE] {
        &self.buf
    }

    /// Finalise into a fingerprint for a range of `count` items.
    pub fn finish(&self, count: u64, hasher: &dyn RangeHasher) -> Fingerprint {
        let mut input = Vec::with_capacity(ID_SIZE + 10);
        input.extend_from_slice(&self.buf);
        encode_varint(count, &mut input);

        let digest = hasher.digest(&input);
        let mut out = [0u8; FINGERPRINT_SIZE];
        out.copy_from_slice(&digest[..FINGERPRINT_SIZE]);
        Fingerprint(out)
    }
}
