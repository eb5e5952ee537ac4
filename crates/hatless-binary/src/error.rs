//! Error types for hatless-binary.

use thiserror::Error;

/// Errors raised while decoding, encoding or patching binary containers.
///
/// All of these are fatal for the file being processed: the formats are
/// produced by a known toolchain, so a mismatch means either the wrong file
/// kind or a logic error upstream, never something worth retrying.
#[derive(Debug, Error)]
pub enum Error {
    /// End of buffer reached while reading.
    #[error("unexpected end of buffer: needed {needed} bytes but only {available} available")]
    UnexpectedEof { needed: usize, available: usize },

    /// Magic literal did not match; the file is of a different kind entirely.
    #[error("magic mismatch: expected {expected:?}, got {actual:?}")]
    MagicMismatch {
        expected: Vec<u8>,
        actual: Vec<u8>,
    },

    /// A self-relative pointer did not equal the negation of its record's
    /// start position. The structure is corrupt or misunderstood.
    #[error("self-pointer mismatch at offset {offset}: stored {stored}")]
    SelfPointerMismatch { offset: u64, stored: i64 },

    /// A null-terminated string ran past the end of the buffer.
    #[error("string starting at offset {at} has no null terminator")]
    UnterminatedString { at: u64 },

    /// An in-place patch target already holds the intended bytes.
    #[error("patch target at offset {offset} (width {width}) already holds the new value")]
    RepatchGuardViolation { offset: u64, width: usize },

    /// A layout string could not be parsed.
    #[error("bad layout string {0:?}")]
    BadLayout(String),

    /// A field name referenced by a codec is not present in the document.
    #[error("unknown field '{0}'")]
    UnknownField(String),

    /// A field held a value shape its codec cannot encode, or a referenced
    /// field has the wrong kind for its role.
    #[error("field '{field}': expected {expected}")]
    TypeMismatch {
        field: String,
        expected: &'static str,
    },

    /// A scalar does not fit the width or signedness of its format code.
    #[error("scalar out of range for format code '{code}'")]
    ScalarOutOfRange { code: char },

    /// An array field has a non-zero entry count but a null target pointer.
    #[error("array '{0}' has entries but a null target pointer")]
    NullArrayOffset(String),

    /// A deferred address patch fell outside the bytes written so far.
    #[error("pending patch at {at}+{len} outside written range of {written} bytes")]
    PatchRange {
        at: usize,
        len: usize,
        written: usize,
    },

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// UTF-8 decoding error.
    #[error("UTF-8 error: {0}")]
    Utf8(#[from] std::str::Utf8Error),
}

/// Result type alias using the engine's Error type.
pub type Result<T> = std::result::Result<T, Error>;
