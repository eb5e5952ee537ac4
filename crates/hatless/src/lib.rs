//! Hatless - compiled game asset inspection and rewriting library.
//!
//! This crate provides a unified interface to the Hatless library ecosystem
//! for working with compiled game asset files.
//!
//! # Crates
//!
//! - [`hatless_binary`] - Declarative binary-schema engine (decode, two-pass
//!   re-encode, guarded in-place patching)
//! - [`hatless_mdl`] - Compiled studio model (`.mdl`) handling
//! - [`hatless_pcf`] - Compiled particle definition (`.pcf`) handling
//!
//! # Example
//!
//! ```no_run
//! use hatless::prelude::*;
//!
//! // Decode a model and list its sequences
//! let data = std::fs::read("hero.mdl")?;
//! let mdl = Mdl::decode(&data)?;
//! for sequence in mdl.sequences()? {
//!     println!("{:?}", sequence.label()?);
//! }
//!
//! // Prune a particle file down to what its root reaches
//! let data = std::fs::read("hero.pcf")?;
//! let mut pcf = Pcf::decode(&data)?;
//! minimize(&mut pcf)?;
//! std::fs::write("hero.pcf", pcf.encode_to_vec()?)?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

// Re-export all sub-crates
pub use hatless_binary as binary;
pub use hatless_mdl as mdl;
pub use hatless_pcf as pcf;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use hatless_binary::{Document, Reader, Schema};
    pub use hatless_mdl::{mung_activity_strings, Mdl, Sequence};
    pub use hatless_pcf::{minimize, replace_system_attributes, Pcf};
}

/// Version information.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
