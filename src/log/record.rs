//! Log record definitions
//!
//! Defines the structure of individual records and their on-disk frame.

use bytes::{Buf, BufMut, BytesMut};

use crate::error::{Result, StashError};

use super::{FRAME_HEADER_SIZE, MAX_RECORD_SIZE, NO_TTL};

/// Type tag written with tombstones (they carry no value)
const TOMBSTONE_TAG: u8 = 0x00;

/// Fixed part of a body: key_len (4) + tag (1) + value_len (4)
/// + created_at (8) + ttl (8) + tombstone (1)
const BODY_FIXED_SIZE: usize = 4 + 1 + 4 + 8 + 8 + 1;

/// A single immutable entry in the record log
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    /// Canonical key bytes
    pub key: Vec<u8>,

    /// Codec type tag of `value`
    pub type_tag: u8,

    /// Encoded value payload (empty for tombstones)
    pub value: Vec<u8>,

    /// Creation time (unix millis)
    pub created_at: u64,

    /// Time-to-live in millis; `None` never expires
    pub ttl_ms: Option<u64>,

    /// Logical delete marker
    pub tombstone: bool,
}

impl Record {
    /// A live value record
    pub fn put(
        key: Vec<u8>,
        type_tag: u8,
        value: Vec<u8>,
        created_at: u64,
        ttl_ms: Option<u64>,
    ) -> Self {
        Self {
            key,
            type_tag,
            value,
            created_at,
            ttl_ms,
            tombstone: false,
        }
    }

    /// A delete marker for `key`
    pub fn tombstone(key: Vec<u8>, created_at: u64) -> Self {
        Self {
            key,
            type_tag: TOMBSTONE_TAG,
            value: Vec::new(),
            created_at,
            ttl_ms: None,
            tombstone: true,
        }
    }

    /// Absolute expiry instant (unix millis), if the record has a TTL
    pub fn expires_at(&self) -> Option<u64> {
        self.ttl_ms
            .map(|ttl| crate::expiry::expires_at(self.created_at, ttl))
    }

    /// Size of the serialized frame in bytes
    pub fn frame_len(&self) -> usize {
        FRAME_HEADER_SIZE + BODY_FIXED_SIZE + self.key.len() + self.value.len()
    }

    /// Serialize to a full frame: `[body_len u32][crc32 u32][body]`
    ///
    /// Body layout (little-endian):
    /// ```text
    /// [key_len u32][key][tag u8][value_len u32][value][created_at u64][ttl u64][tombstone u8]
    /// ```
    pub fn serialize(&self) -> Result<Vec<u8>> {
        let body_len = BODY_FIXED_SIZE + self.key.len() + self.value.len();
        if body_len as u64 > MAX_RECORD_SIZE {
            return Err(StashError::unsupported(format!(
                "record of {} bytes exceeds the {} byte limit",
                body_len, MAX_RECORD_SIZE
            )));
        }

        let mut body = BytesMut::with_capacity(body_len);
        body.put_u32_le(self.key.len() as u32);
        body.put_slice(&self.key);
        body.put_u8(self.type_tag);
        body.put_u32_le(self.value.len() as u32);
        body.put_slice(&self.value);
        body.put_u64_le(self.created_at);
        body.put_u64_le(self.ttl_ms.unwrap_or(NO_TTL));
        body.put_u8(self.tombstone as u8);

        let crc = crc32fast::hash(&body);

        let mut frame = BytesMut::with_capacity(FRAME_HEADER_SIZE + body_len);
        frame.put_u32_le(body_len as u32);
        frame.put_u32_le(crc);
        frame.put_slice(&body);

        Ok(frame.to_vec())
    }

    /// Deserialize a full frame, verifying its checksum
    pub fn deserialize(frame: &[u8]) -> Result<Self> {
        if frame.len() < FRAME_HEADER_SIZE {
            return Err(StashError::CorruptRecord(format!(
                "frame of {} bytes is shorter than its header",
                frame.len()
            )));
        }

        let mut header = &frame[..FRAME_HEADER_SIZE];
        let body_len = header.get_u32_le() as usize;
        let stored_crc = header.get_u32_le();

        let body = &frame[FRAME_HEADER_SIZE..];
        if body.len() != body_len {
            return Err(StashError::CorruptRecord(format!(
                "declared body length {} but frame holds {}",
                body_len,
                body.len()
            )));
        }

        let computed_crc = crc32fast::hash(body);
        if computed_crc != stored_crc {
            return Err(StashError::CorruptRecord(format!(
                "CRC mismatch: stored {:08x}, computed {:08x}",
                stored_crc, computed_crc
            )));
        }

        Self::parse_body(body)
    }

    fn parse_body(mut body: &[u8]) -> Result<Self> {
        let key = take_sized(&mut body, "key")?;

        if body.remaining() < 1 {
            return Err(truncated("type tag"));
        }
        let type_tag = body.get_u8();

        let value = take_sized(&mut body, "value")?;

        if body.remaining() != 8 + 8 + 1 {
            return Err(StashError::CorruptRecord(format!(
                "expected 17 trailing bytes, found {}",
                body.remaining()
            )));
        }
        let created_at = body.get_u64_le();
        let ttl = body.get_u64_le();
        let tombstone = match body.get_u8() {
            0 => false,
            1 => true,
            other => {
                return Err(StashError::CorruptRecord(format!(
                    "invalid tombstone flag: {}",
                    other
                )))
            }
        };

        Ok(Self {
            key,
            type_tag,
            value,
            created_at,
            ttl_ms: (ttl != NO_TTL).then_some(ttl),
            tombstone,
        })
    }
}

/// Read a `u32` length prefix followed by that many bytes
fn take_sized(body: &mut &[u8], field: &str) -> Result<Vec<u8>> {
    if body.remaining() < 4 {
        return Err(truncated(field));
    }
    let len = body.get_u32_le() as usize;
    if body.remaining() < len {
        return Err(truncated(field));
    }
    let bytes = body[..len].to_vec();
    body.advance(len);
    Ok(bytes)
}

fn truncated(field: &str) -> StashError {
    StashError::CorruptRecord(format!("record body truncated in {}", field))
}
