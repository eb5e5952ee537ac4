//! Compiled particle definition (.pcf) support.
//!
//! Decodes the binary particle container into a [`Pcf`] (string dictionary,
//! element table, attribute blocks) and re-encodes it losslessly. On top of
//! that sit the graph operations the rewriting tool needs: pruning elements
//! unreachable from the root ([`minimize`]) and deep-copying a particle
//! system definition from one file into another ([`replace_system_attributes`]).

mod attribute;
mod error;
mod minimize;
mod pcf;

pub use attribute::{Attribute, AttributeValue};
pub use error::{Error, Result};
pub use minimize::{clear_attributes, import_attributes, minimize, replace_system_attributes};
pub use pcf::{
    Element, ElementName, Pcf, DEFINITIONS_ATTRIBUTE, MAGIC, PARTICLE_SYSTEM_TYPE, ROOT_TYPE,
};
