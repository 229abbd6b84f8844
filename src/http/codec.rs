//! Strict JSON decoding.
//!
//! Input objects may only carry keys the target type declares, at any depth.
//! Decoding runs through `serde_ignored`, which reports every key the target's
//! `Deserialize` impl skips along with its path (`inner.extra`, `items.0.x`).
//! Types that deserialize through a map (`HashMap`, `Value`) accept any key.

use serde::de::DeserializeOwned;
use thiserror::Error;

/// Why a body could not be decoded.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error("unknown field `{path}`")]
    UnknownField { path: String },
}

/// Decode `bytes` into `T`, rejecting unknown fields anywhere in the input.
pub fn from_slice_strict<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, DecodeError> {
    let mut de = serde_json::Deserializer::from_slice(bytes);
    let mut unknown = None;
    let value: T = serde_ignored::deserialize(&mut de, |path| {
        unknown.get_or_insert_with(|| path.to_string());
    })?;
    de.end()?;

    match unknown {
        Some(path) => Err(DecodeError::UnknownField { path }),
        None => Ok(value),
    }
}

/// Decode `bytes` into `T`, strictly or not.
pub fn from_slice<T: DeserializeOwned>(bytes: &[u8], strict: bool) -> Result<T, DecodeError> {
    if strict {
        from_slice_strict(bytes)
    } else {
        Ok(serde_json::from_slice(bytes)?)
    }
}
