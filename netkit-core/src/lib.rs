//! Core types for netkit.
//!
//! This crate provides the plain data and pure logic shared by netkit
//! clients and transports. Nothing here performs I/O.
//!
//! ## Modules
//!
//! - `wire`: `WireRequest` / `WireResponse` carriers
//! - `status`: Status validation and status errors
//! - `error`: Transport and decode errors, the `NetworkError` taxonomy and the mapper
//! - `codec`: Body decoder trait and the JSON decoder

mod codec;
mod error;
mod status;
mod wire;

pub use codec::*;
pub use error::*;
pub use status::*;
pub use wire::*;

pub use bytes::Bytes;
pub use url::Url;
