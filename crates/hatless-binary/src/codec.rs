//! Codec bindings and decoded value shapes.
//!
//! A [`Codec`] names how one field of a record is laid out on disk; a
//! [`Value`] is what decoding it produces. The decode/encode drivers live in
//! [`crate::document`], where field ordering and base-offset resolution are
//! handled.

use std::sync::Arc;

use crate::document::{Document, Schema};
use crate::layout::{Layout, Scalar};

/// How many entries an array field holds.
#[derive(Debug, Clone, PartialEq)]
pub enum Count {
    /// The first scalar of an earlier sibling field.
    Field(&'static str),
    /// The product of two earlier sibling fields.
    Product(&'static str, &'static str),
}

/// A field's on-disk layout.
///
/// Pointer codecs reference earlier fields of the same record by name; the
/// base address is always resolved explicitly against the owning document,
/// never captured from surrounding state.
#[derive(Debug, Clone, PartialEq)]
pub enum Codec {
    /// A fixed literal; decode fails if the bytes differ.
    Magic(Vec<u8>),
    /// A fixed-width tuple of little-endian scalars.
    Format(Layout),
    /// A fixed-width byte buffer interpreted as text, no implicit trim.
    FixedString(usize),
    /// A variable-length string ending at a zero byte.
    CString,
    /// Zero-width marker capturing the current stream position.
    Offset,
    /// Signed i32 that must equal the negation of the record's start
    /// position. A structural integrity check baked into the format.
    BasePointer,
    /// Signed i32 displacement added to the named base-offset field.
    /// Zero is the null sentinel and is never offset-adjusted.
    Relative { base: &'static str },
    /// A relative pointer whose non-null target is decoded as a
    /// null-terminated string.
    RelativeString { base: &'static str },
    /// `count` consecutive sub-records decoded at the address held by the
    /// named offset field, under a scoped seek.
    Array {
        count: Count,
        offset: &'static str,
        elem: Arc<Schema>,
    },
}

/// A decoded field value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// A validated magic literal; the bytes live in the codec.
    Magic,
    /// Scalars decoded by a [`Codec::Format`] layout.
    Scalars(Vec<Scalar>),
    /// Raw bytes of a fixed-width string field.
    FixedString(Vec<u8>),
    /// A null-terminated string (terminator not included).
    Str(String),
    /// A captured absolute stream position.
    Offset(u64),
    /// A resolved absolute address, or `None` for the zero sentinel.
    Pointer(Option<u64>),
    /// A resolved pointer-plus-string pair. `addr` and `text` are either
    /// both present or both absent.
    StringRef {
        addr: Option<u64>,
        text: Option<String>,
    },
    /// Nested sub-records decoded out of line.
    Array(Vec<Document>),
}

impl Value {
    /// First scalar as unsigned, if this is a scalar tuple.
    pub fn first_unsigned(&self) -> Option<u64> {
        match self {
            Value::Scalars(v) => v.first().and_then(Scalar::as_unsigned),
            _ => None,
        }
    }

    /// The resolved text of a string reference, if present.
    pub fn text(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            Value::StringRef { text, .. } => text.as_deref(),
            _ => None,
        }
    }
}
