//! Compiled studio model (.mdl) support.
//!
//! Decodes the model header and its local animation and sequence tables with
//! the schemas in [`schema`], and exposes the edits the rewriting tool
//! performs on models: flattening alternate skin families back to the stock
//! one and invalidating item-granted activity-modifier strings, both as
//! guarded in-place patches.

mod error;
pub mod schema;

mod model;

pub use error::{Error, Result};
pub use model::{mung_activity_strings, Mdl, Sequence};
