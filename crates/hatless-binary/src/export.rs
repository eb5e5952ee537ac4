//! Serde serialization of decoded documents.
//!
//! Mirrors the shapes the surrounding tooling expects when dumping a parsed
//! file to JSON: single-scalar fields become plain numbers, string
//! references become `[address, text]` pairs, arrays become lists of nested
//! objects.

use serde::ser::{Serialize, SerializeMap, SerializeSeq, Serializer};

use crate::codec::Value;
use crate::document::Document;
use crate::layout::Scalar;

impl Serialize for Scalar {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Scalar::Signed(v) => serializer.serialize_i64(*v),
            Scalar::Unsigned(v) => serializer.serialize_u64(*v),
            Scalar::Float(v) => serializer.serialize_f64(*v),
        }
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Value::Magic => serializer.serialize_unit(),
            Value::Scalars(v) if v.len() == 1 => v[0].serialize(serializer),
            Value::Scalars(v) => v.serialize(serializer),
            Value::FixedString(bytes) => {
                serializer.serialize_str(&String::from_utf8_lossy(bytes))
            }
            Value::Str(s) => serializer.serialize_str(s),
            Value::Offset(v) => serializer.serialize_u64(*v),
            Value::Pointer(addr) => addr.serialize(serializer),
            Value::StringRef { addr, text } => {
                let mut seq = serializer.serialize_seq(Some(2))?;
                seq.serialize_element(&addr.unwrap_or(0))?;
                seq.serialize_element(text)?;
                seq.end()
            }
            Value::Array(docs) => docs.serialize(serializer),
        }
    }
}

impl Serialize for Document {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.fields().len()))?;
        for field in self.fields() {
            map.serialize_entry(field.name, &field.value)?;
        }
        map.end()
    }
}
