//! Serialization Codec
//!
//! Converts application values to and from a self-describing byte encoding.
//!
//! ## Responsibilities
//! - Lower Rust values into [`Value`] trees ([`ToValue`] / [`FromValue`])
//! - Encode a value as `(type tag, payload bytes)` for the record log
//! - Decode a payload back into an independent [`Value`] copy
//! - Refuse objects whose type cannot be reconstructed later
//!
//! ## Payload Format
//! ```text
//! ┌──────────┬──────────────────────────────────────────────┐
//! │ Tag (1)  │ bincode(Value) - fixed-width ints, LE        │
//! │ (record) │ floats stored as raw IEEE-754 bits            │
//! └──────────┴──────────────────────────────────────────────┘
//! ```
//! The tag lives in the record header; the payload is self-describing on its
//! own, and decoding verifies the two agree.

mod persist;
mod registry;
mod value;

use bincode::Options;

pub use persist::{
    object_from_value, object_to_value, take_attr, FromValue, PersistObject, ToValue,
};
pub use registry::TypeRegistry;
pub use value::{TypeTag, Value};

use crate::error::{Result, StashError};

/// Upper bound on a single encoded payload (64 MB)
pub const MAX_PAYLOAD_SIZE: u64 = 64 * 1024 * 1024;

fn bincode_options() -> impl Options {
    bincode::DefaultOptions::new()
        .with_fixint_encoding()
        .with_little_endian()
        .with_limit(MAX_PAYLOAD_SIZE)
        .reject_trailing_bytes()
}

/// Encode a value for storage
///
/// Fails with `UnsupportedType` if the value contains an object whose type is
/// not registered, or if the encoding exceeds [`MAX_PAYLOAD_SIZE`].
pub fn encode(value: &Value, registry: &TypeRegistry) -> Result<(TypeTag, Vec<u8>)> {
    registry.check(value)?;

    let bytes = bincode_options()
        .serialize(value)
        .map_err(|e| StashError::unsupported(format!("cannot encode value: {}", e)))?;

    Ok((value.tag(), bytes))
}

/// Decode a stored payload
///
/// Fails with `CorruptRecord` on an unknown tag, a truncated or garbled
/// payload, or a payload whose shape disagrees with its tag.
pub fn decode(tag: u8, bytes: &[u8]) -> Result<Value> {
    let tag = TypeTag::from_byte(tag)?;

    let value: Value = bincode_options()
        .deserialize(bytes)
        .map_err(|e| StashError::CorruptRecord(format!("cannot decode payload: {}", e)))?;

    if value.tag() != tag {
        return Err(StashError::CorruptRecord(format!(
            "payload holds {} but record is tagged {:?}",
            value.kind(),
            tag
        )));
    }

    Ok(value)
}
