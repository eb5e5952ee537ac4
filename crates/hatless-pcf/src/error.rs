//! Error types for hatless-pcf.

use thiserror::Error;

/// Errors raised while working with compiled particle files.
#[derive(Debug, Error)]
pub enum Error {
    /// Engine-level decode/encode failure.
    #[error("{0}")]
    Binary(#[from] hatless_binary::Error),

    /// An element attribute points at an element index outside the file.
    #[error("element {element} references element {referenced}, but the file has {count} elements")]
    DanglingReference {
        element: usize,
        referenced: i32,
        count: usize,
    },

    /// An attribute carried a type code this decoder does not know.
    #[error("unknown attribute type code {0}")]
    UnknownAttributeType(u8),

    /// A string-dictionary index is out of bounds.
    #[error("string index {index} out of bounds (dictionary has {count} entries)")]
    StringIndexOutOfBounds { index: u16, count: usize },

    /// The root element does not have the shape a particle file must have.
    #[error("malformed root element: {0}")]
    MalformedRoot(String),

    /// No particle system definition with the given name exists.
    #[error("no particle system named '{0}'")]
    UnknownSystem(String),

    /// A particle system name resolves to more than one definition.
    #[error("particle system '{0}' is defined more than once")]
    DuplicateSystem(String),

    /// The string dictionary cannot hold another entry.
    #[error("string dictionary is full")]
    StringTableFull,

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for particle file operations.
pub type Result<T> = std::result::Result<T, Error>;
