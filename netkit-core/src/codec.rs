//! Body decoding.
//!
//! This module provides the [`BodyDecoder`] trait and:
//! - [`JsonDecoder`]: decodes JSON bodies via `serde_json`
//! - [`NoContent`]: marker type for responses that carry no body
//! - [`decode_body`]: decoder entry point that honours [`NoContent`]

use std::any::{Any, TypeId};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::DecodeError;

/// Decodes a response body into a target type.
///
/// # Example
///
/// ```ignore
/// use netkit_core::{BodyDecoder, DecodeError};
/// use serde::de::DeserializeOwned;
///
/// struct TomlDecoder;
///
/// impl BodyDecoder for TomlDecoder {
///     fn decode<T: DeserializeOwned>(&self, bytes: &[u8]) -> Result<T, DecodeError> {
///         let text = std::str::from_utf8(bytes).map_err(|e| DecodeError::new(e.to_string()))?;
///         toml::from_str(text).map_err(|e| DecodeError::new(e.to_string()))
///     }
/// }
/// ```
pub trait BodyDecoder: Send + Sync + 'static {
    /// Decode `bytes` into `T`.
    fn decode<T: DeserializeOwned>(&self, bytes: &[u8]) -> Result<T, DecodeError>;
}

/// JSON body decoder.
#[derive(Clone, Copy, Debug, Default)]
pub struct JsonDecoder;

impl BodyDecoder for JsonDecoder {
    fn decode<T: DeserializeOwned>(&self, bytes: &[u8]) -> Result<T, DecodeError> {
        Ok(serde_json::from_slice(bytes)?)
    }
}

/// Marker type for calls whose response has no meaningful body.
///
/// An empty body decodes to `NoContent` without invoking the decoder, so
/// `204 No Content` and empty `200` responses do not produce spurious
/// decode errors.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoContent;

/// Decode a body, synthesizing [`NoContent`] for empty bodies.
pub fn decode_body<T, D>(decoder: &D, bytes: &[u8]) -> Result<T, DecodeError>
where
    T: DeserializeOwned + 'static,
    D: BodyDecoder + ?Sized,
{
    if bytes.is_empty() && TypeId::of::<T>() == TypeId::of::<NoContent>() {
        let empty: Box<dyn Any> = Box::new(NoContent);
        if let Ok(value) = empty.downcast::<T>() {
            return Ok(*value);
        }
    }
    decoder.decode(bytes)
}
