//! TL binary primitives for the coil session and cache formats.
//!
//! The persisted session blob and the peer/secret-chat cache container are
//! built from a handful of TL-encoded primitives: fixed-width little-endian
//! integers, constructor-tagged booleans, length-prefixed byte strings, and
//! boxed vectors.  This crate provides exactly those, nothing more.
//!
//! | Module          | Contents                                          |
//! |-----------------|---------------------------------------------------|
//! | [`serialize`]   | [`Serializable`] and the primitive writers        |
//! | [`deserialize`] | [`Deserializable`], [`Cursor`] and the readers    |

#![deny(unsafe_code)]

pub mod deserialize;
pub mod serialize;

pub use deserialize::{Cursor, Deserializable};
pub use serialize::Serializable;
