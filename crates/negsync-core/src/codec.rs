//! Frame codec.
//!
//! A frame is `[version] ([bound][mode][payload])*`.
//!
//! - Varints are big-endian base-128: every byte but the last has its high
//!   bit set.
//! - Bound timestamps are delta-encoded against the previous bound in the
//!   same frame. `0` encodes infinity; any other timestamp encodes as
//!   `delta + 1`.
//! - A bound's id prefix follows as a varint length and raw bytes.

use crate::error::{CodecError, Result};
use crate::fingerprint::{Fingerprint, FINGERPRINT_SIZE};
use crate::types::{Bound, ItemId, ID_SIZE, TIMESTAMP_INFINITY};

/// The protocol version this implementation speaks (Negentropy v1).
pub const PROTOCOL_VERSION: u8 = 0x61;

/// Version bytes reserved for this protocol family.
pub const PROTOCOL_VERSION_RANGE: std::ops::RangeInclusive<u8> = 0x60..=0x6f;

/// How a frame entry describes its range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Mode {
    /// The range needs no further work.
    Skip = 0,
    /// A fingerprint of the range follows.
    Fingerprint = 1,
    /// The full id list of the range follows.
    IdList = 2,
}

impl TryFrom<u64> for Mode {
    type Error = CodecError;

    fn try_from(value: u64) -> Result<Self> {
        match value {
            0 => Ok(Mode::Skip),
            1 => Ok(Mode::Fingerprint),
            2 => Ok(Mode::IdList),
            other => Err(CodecError::UnknownMode(other)),
        }
    }
}

/// Append `n` as a big-endian base-128 varint.
pub fn encode_varint(n: u64, buf: &mut Vec<u8>) {
    if n == 0 {
        buf.push(0);
        return;
    }

    let mut groups = [0u8; 10];
    let mut len = 0;
    let mut rest = n;
    while rest != 0 {
        groups[len] = (rest & 0x7f) as u8;
        rest >>= 7;
        len += 1;
    }

    for i in (0..len).rev() {
        let more = if i == 0 { 0 } else { 0x80 };
        buf.push(groups[i] | more);
    }
}

/// Decode a varint from the front of `input`, advancing it.
pub fn decode_varint(input: &mut &[u8]) -> Result<u64> {
    let mut value: u64 = 0;
    loop {
        let (&byte, rest) = input.split_first().ok_or(CodecError::UnexpectedEof)?;
        *input = rest;

        if value > (u64::MAX >> 7) {
            return Err(CodecError::VarintOverflow);
        }
        value = (value << 7) | u64::from(byte & 0x7f);

        if byte & 0x80 == 0 {
            return Ok(value);
        }
    }
}

/// Check a frame's leading version byte.
pub fn check_version(version: u8) -> Result<()> {
    if !PROTOCOL_VERSION_RANGE.contains(&version) {
        return Err(CodecError::InvalidVersionByte(version));
    }
    if version != PROTOCOL_VERSION {
        return Err(CodecError::UnsupportedVersionRequested(version));
    }
    Ok(())
}

/// Reads entries from an incoming frame.
#[derive(Debug)]
pub struct FrameReader<'a> {
    input: &'a [u8],
    last_timestamp: u64,
}

impl<'a> FrameReader<'a> {
    /// Start reading a frame, validating its version byte.
    pub fn new(frame: &'a [u8]) -> Result<Self> {
        let (&version, rest) = frame.split_first().ok_or(CodecError::UnexpectedEof)?;
        check_version(version)?;
        Ok(Self {
            input: rest,
            last_timestamp: 0,
        })
    }

    /// Read entries without a leading version byte.
    pub fn headless(input: &'a [u8]) -> Self {
        Self {
            input,
            last_timestamp: 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.input.is_empty()
    }

    pub fn remaining(&self) -> usize {
        self.input.len()
    }

    pub fn read_varint(&mut self) -> Result<u64> {
        decode_varint(&mut self.input)
    }

    fn read_bytes(&mut self, n: usize) -> Result<&'a [u8]> {
        if self.input.len() < n {
            return Err(CodecError::UnexpectedEof);
        }
        let (head, rest) = self.input.split_at(n);
        self.input = rest;
        Ok(head)
    }

    fn read_timestamp(&mut self) -> Result<u64> {
        let encoded = self.read_varint()?;
        if encoded == 0 || self.last_timestamp == TIMESTAMP_INFINITY {
            self.last_timestamp = TIMESTAMP_INFINITY;
            return Ok(TIMESTAMP_INFINITY);
        }

        let timestamp = self
            .last_timestamp
            .checked_add(encoded - 1)
            .filter(|ts| *ts != TIMESTAMP_INFINITY)
            .ok_or(CodecError::TimestampOverflow)?;
        self.last_timestamp = timestamp;
        Ok(timestamp)
    }

    pub fn read_bound(&mut self) -> Result<Bound> {
        let timestamp = self.read_timestamp()?;
        let len = self.read_varint()?;
        let len = usize::try_from(len).map_err(|_| CodecError::BoundIdTooLong(usize::MAX))?;
        if len > ID_SIZE {
            return Err(CodecError::BoundIdTooLong(len));
        }
        let prefix = self.read_bytes(len)?;
        Bound::with_prefix(timestamp, prefix)
    }

    pub fn read_mode(&mut self) -> Result<Mode> {
        Mode::try_from(self.read_varint()?)
    }

    pub fn read_fingerprint(&mut self) -> Result<Fingerprint> {
        let bytes = self.read_bytes(FINGERPRINT_SIZE)?;
        let mut out = [0u8; FINGERPRINT_SIZE];
        out.copy_from_slice(bytes);
        Ok(Fingerprint(out))
    }

    pub fn read_id_list(&mut self) -> Result<Vec<ItemId>> {
        let count = self.read_varint()?;
        // Never trust the count for allocation beyond what the frame can hold.
        let capacity = (count as usize).min(self.input.len() / ID_SIZE);
        let mut ids = Vec::with_capacity(capacity);
        for _ in 0..count {
            ids.push(ItemId::from_slice(self.read_bytes(ID_SIZE)?)?);
        }
        Ok(ids)
    }
}

/// A position in a [`FrameWriter`] that can be restored.
#[derive(Debug, Clone, Copy)]
pub struct Checkpoint {
    len: usize,
    last_timestamp: u64,
}

/// Builds an outgoing frame.
#[derive(Debug, Clone)]
pub struct FrameWriter {
    buf: Vec<u8>,
    last_timestamp: u64,
}

impl FrameWriter {
    /// Start a frame with the protocol version byte.
    pub fn new() -> Self {
        Self {
            buf: vec![PROTOCOL_VERSION],
            last_timestamp: 0,
        }
    }

    /// Start an entry buffer with no version byte.
    pub fn headless() -> Self {
        Self {
            buf: Vec::new(),
            last_timestamp: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Whether the frame holds nothing beyond its version byte.
    pub fn has_entries(&self) -> bool {
        self.buf.len() > 1
    }

    pub fn checkpoint(&self) -> Checkpoint {
        Checkpoint {
            len: self.buf.len(),
            last_timestamp: self.last_timestamp,
        }
    }

    /// Discard everything written since `checkpoint`.
    pub fn rollback(&mut self, checkpoint: Checkpoint) {
        self.buf.truncate(checkpoint.len);
        self.last_timestamp = checkpoint.last_timestamp;
    }

    pub fn write_varint(&mut self, n: u64) {
        encode_varint(n, &mut self.buf);
    }

    /// Bounds in a frame ascend. A timestamp below the previous one encodes
    /// as the previous one and leaves the delta base unchanged, so the
    /// reader and writer never disagree on it.
    fn write_timestamp(&mut self, timestamp: u64) {
        if timestamp == TIMESTAMP_INFINITY {
            self.last_timestamp = TIMESTAMP_INFINITY;
            self.write_varint(0);
            return;
        }

        let delta = timestamp.saturating_sub(self.last_timestamp);
        self.last_timestamp = self.last_timestamp.max(timestamp);
        self.write_varint(delta + 1);
    }

    pub fn write_bound(&mut self, bound: &Bound) {
        self.write_timestamp(bound.timestamp());
        let prefix = bound.id_prefix();
        self.write_varint(prefix.len() as u64);
        self.buf.extend_from_slice(prefix);
    }

    pub fn write_mode(&mut self, mode: Mode) {
        self.write_varint(mode as u64);
    }

    pub fn write_skip(&mut self, bound: &Bound) {
        self.write_bound(bound);
        self.write_mode(Mode::Skip);
    }

    pub fn write_fingerprint(&mut self, bound: &Bound, fingerprint: &Fingerprint) {
        self.write_bound(bound);
        self.write_mode(Mode::Fingerprint);
        self.buf.extend_from_slice(fingerprint.as_bytes());
    }

    pub fn write_id_list<'i>(&mut self, bound: &Bound, ids: impl ExactSizeIterator<Item = &'i ItemId>) {
        self.write_bound(bound);
        self.write_mode(Mode::IdList);
        self.write_varint(ids.len() as u64);
        for id in ids {
            self.buf.extend_from_slice(id.as_bytes());
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }
}

impl Default for FrameWriter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn encode(n: u64) -> Vec<u8> {
        let mut buf = Vec::new();
        encode_varint(n, &mut buf);
        buf
    }

    #[test]
    fn test_varint_known_encodings() {
        assert_eq!(encode(0), vec![0x00]);
        assert_eq!(encode(127), vec![0x7f]);
        assert_eq!(encode(128), vec![0x81, 0x00]);
        assert_eq!(encode(300), vec![0x82, 0x2c]);
        assert_eq!(encode(16384), vec![0x81, 0x80, 0x00]);
    }

    #[test]
    fn test_varint_u64_max() {
        let bytes = encode(u64::MAX);
        assert_eq!(bytes.len(), 10);
        let mut input = bytes.as_slice();
        assert_eq!(decode_varint(&mut input).unwrap(), u64::MAX);
        assert!(input.is_empty());
    }

    #[test]
    fn test_varint_truncated() {
        let mut input: &[u8] = &[0x81];
        assert_eq!(decode_varint(&mut input), Err(CodecError::UnexpectedEof));
    }

    #[test]
    fn test_varint_overflow() {
        let mut input: &[u8] = &[0xff; 11];
        assert_eq!(decode_varint(&mut input), Err(CodecError::VarintOverflow));
    }

    #[test]
    fn test_version_checks() {
        assert!(check_version(PROTOCOL_VERSION).is_ok());
        assert_eq!(
            check_version(0x62),
            Err(CodecError::UnsupportedVersionRequested(0x62))
        );
        assert_eq!(check_version(0x00), Err(CodecError::InvalidVersionByte(0x00)));
        assert_eq!(check_version(0x70), Err(CodecError::InvalidVersionByte(0x70)));
    }

    #[test]
    fn test_empty_frame_is_eof() {
        assert!(matches!(FrameReader::new(&[]), Err(CodecError::UnexpectedEof)));
    }

    #[test]
    fn test_bound_delta_encoding() {
        let mut writer = FrameWriter::headless();
        writer.write_bound(&Bound::new(100));
        writer.write_bound(&Bound::new(150));
        writer.write_bound(&Bound::infinity());

        // 101, then delta 50 + 1, then infinity
        assert_eq!(writer.as_bytes(), &[0x65, 0x00, 0x33, 0x00, 0x00, 0x00]);

        let mut reader = FrameReader::headless(writer.as_bytes());
        assert_eq!(reader.read_bound().unwrap(), Bound::new(100));
        assert_eq!(reader.read_bound().unwrap(), Bound::new(150));
        assert_eq!(reader.read_bound().unwrap(), Bound::infinity());
        assert!(reader.is_empty());
    }

    #[test]
    fn test_bound_id_too_long() {
        let mut frame = vec![0x01, 33];
        frame.extend_from_slice(&[0u8; 33]);
        let mut reader = FrameReader::headless(&frame);
        assert_eq!(reader.read_bound(), Err(CodecError::BoundIdTooLong(33)));
    }

    #[test]
    fn test_unknown_mode() {
        let mut reader = FrameReader::headless(&[0x03]);
        assert_eq!(reader.read_mode(), Err(CodecError::UnknownMode(3)));
    }

    #[test]
    fn test_truncated_id_list() {
        let mut frame = vec![0x02];
        frame.extend_from_slice(&[0xaa; 32]);
        let mut reader = FrameReader::headless(&frame);
        assert_eq!(reader.read_id_list(), Err(CodecError::UnexpectedEof));
    }

    #[test]
    fn test_rollback_restores_delta_base() {
        let mut writer = FrameWriter::new();
        writer.write_skip(&Bound::new(10));
        let checkpoint = writer.checkpoint();
        writer.write_skip(&Bound::new(500));
        writer.rollback(checkpoint);
        writer.write_skip(&Bound::new(20));

        let mut reader = FrameReader::new(writer.as_bytes()).unwrap();
        assert_eq!(reader.read_bound().unwrap(), Bound::new(10));
        assert_eq!(reader.read_mode().unwrap(), Mode::Skip);
        assert_eq!(reader.read_bound().unwrap(), Bound::new(20));
        assert_eq!(reader.read_mode().unwrap(), Mode::Skip);
        assert!(reader.is_empty());
    }

    #[test]
    fn test_descending_timestamp_keeps_delta_base() {
        let mut writer = FrameWriter::headless();
        writer.write_bound(&Bound::new(4_394_917_158_282_438_400));
        writer.write_bound(&Bound::new(1_780_704_876));
        writer.write_bound(&Bound::new(14_051_826_917_207_818_091));

        let mut reader = FrameReader::headless(writer.as_bytes());
        assert_eq!(reader.read_bound().unwrap(), Bound::new(4_394_917_158_282_438_400));
        // Clamped to the previous timestamp.
        assert_eq!(reader.read_bound().unwrap(), Bound::new(4_394_917_158_282_438_400));
        assert_eq!(reader.read_bound().unwrap(), Bound::new(14_051_826_917_207_818_091));
        assert!(reader.is_empty());
    }

    fn bound_strategy() -> impl Strategy<Value = Bound> {
        prop_oneof![
            Just(Bound::infinity()),
            (0u64..(1u64 << 53), prop::collection::vec(any::<u8>(), 0..=32))
                .prop_map(|(ts, prefix)| Bound::with_prefix(ts, &prefix).unwrap()),
        ]
    }

    proptest! {
        #[test]
        fn test_varint_roundtrip(n in 0u64..=(1u64 << 53)) {
            let bytes = encode(n);
            let mut input = bytes.as_slice();
            prop_assert_eq!(decode_varint(&mut input).unwrap(), n);
            prop_assert!(input.is_empty());
        }

        #[test]
        fn test_bound_sequence_roundtrip(mut bounds in prop::collection::vec(bound_strategy(), 1..20)) {
            bounds.sort_by_key(|b| b.timestamp());

            let mut writer = FrameWriter::headless();
            for bound in &bounds {
                writer.write_bound(bound);
            }

            let mut reader = FrameReader::headless(writer.as_bytes());
            for bound in &bounds {
                prop_assert_eq!(&reader.read_bound().unwrap(), bound);
            }
            prop_assert!(reader.is_empty());
        }
    }
}
