//! Declarative binary-schema engine for offset-linked container formats.
//!
//! The compiled asset formats this workspace handles share one structural
//! pattern: fixed-layout records whose fields are byte displacements
//! (absolute, base-relative or self-relative) pointing at sub-records and
//! strings elsewhere in the same file. This crate provides the pieces for
//! losslessly decoding, re-encoding and patching such files:
//!
//! - [`Reader`] / [`Sink`] - cursor types, scoped seeks, dry-run sizing
//! - [`Layout`] - declarative little-endian scalar layouts (`"3f"`, `"II"`)
//! - [`Schema`] / [`Document`] - ordered field decoding with per-field
//!   offset bookkeeping, and two-pass address-resolving re-encode
//! - [`patch_field`] - guarded in-place edits of existing valid files

mod codec;
mod document;
mod error;
#[cfg(feature = "serde")]
mod export;
mod layout;
mod patch;
mod stream;

pub use codec::{Codec, Count, Value};
pub use document::{Document, Field, FieldSpec, Schema};
pub use error::{Error, Result};
pub use layout::{Layout, Scalar};
pub use patch::patch_field;
pub use stream::{CountingSink, Reader, Sink, VecSink};
