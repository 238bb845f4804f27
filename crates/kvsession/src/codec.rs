//! Payload codecs.
//!
//! The session store never looks inside a session; it hands the whole value
//! to a [`Codec`] and stores the resulting bytes. Whether a type can be
//! stored at all is decided by its `Serialize` / `Deserialize` impls at
//! compile time, and any value the format still cannot represent is
//! rejected by [`Codec::encode`] before anything reaches the cache.
//!
//! The `*_optional` and [`decode_lossy`] helpers give the "empty means
//! nothing" contract: encoding nothing yields empty bytes, and decoding
//! empty bytes yields nothing.

use std::any::type_name;

use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::error;

use crate::error::CodecError;

/// Binary encoding for opaque payloads.
pub trait Codec: Send + Sync {
    /// Encode `value` to bytes.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::NotSerializable`] if the value cannot be
    /// represented in this format.
    fn encode<T: Serialize + ?Sized>(&self, value: &T) -> Result<Vec<u8>, CodecError>;

    /// Decode bytes produced by [`Codec::encode`].
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::Corrupt`] for truncated, foreign, or mismatched
    /// input.
    fn decode<T: DeserializeOwned>(&self, bytes: &[u8]) -> Result<T, CodecError>;
}

/// JSON codec backed by `serde_json`.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl Codec for JsonCodec {
    fn encode<T: Serialize + ?Sized>(&self, value: &T) -> Result<Vec<u8>, CodecError> {
        serde_json::to_vec(value).map_err(|e| CodecError::NotSerializable {
            type_name: type_name::<T>(),
            reason: e.to_string(),
        })
    }

    fn decode<T: DeserializeOwned>(&self, bytes: &[u8]) -> Result<T, CodecError> {
        serde_json::from_slice(bytes).map_err(|e| CodecError::Corrupt {
            type_name: type_name::<T>(),
            reason: e.to_string(),
        })
    }
}

/// Encode an optional value; `None` encodes to empty bytes.
pub fn encode_optional<C, T>(codec: &C, value: Option<&T>) -> Result<Vec<u8>, CodecError>
where
    C: Codec,
    T: Serialize + ?Sized,
{
    match value {
        Some(value) => codec.encode(value),
        None => Ok(Vec::new()),
    }
}

/// Decode bytes that may be empty; empty bytes decode to `None`.
pub fn decode_optional<C, T>(codec: &C, bytes: &[u8]) -> Result<Option<T>, CodecError>
where
    C: Codec,
    T: DeserializeOwned,
{
    if bytes.is_empty() {
        return Ok(None);
    }
    codec.decode(bytes).map(Some)
}

/// Decode bytes, collapsing absence, emptiness, and corruption into `None`.
///
/// Corruption is logged. Callers cannot tell "was empty" from "was corrupt";
/// use [`decode_optional`] when the difference matters.
pub fn decode_lossy<C, T>(codec: &C, bytes: Option<&[u8]>) -> Option<T>
where
    C: Codec,
    T: DeserializeOwned,
{
    match decode_optional(codec, bytes?) {
        Ok(value) => value,
        Err(e) => {
            error!(error = %e, "Failed to deserialize");
            None
        }
    }
}
