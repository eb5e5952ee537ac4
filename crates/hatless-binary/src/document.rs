//! Ordered field decoding and two-pass encoding of documents.
//!
//! A [`Schema`] is an ordered list of named codec bindings. Applying it to a
//! buffer yields a [`Document`]: the same fields in the same order, each with
//! the absolute byte offset it was read from. Field order is semantically
//! significant: it fixes both the decode sequencing and which earlier fields
//! (offsets, counts) are visible to later ones.
//!
//! Encoding is the harder direction. Relative pointers are written before
//! their targets exist, so the encoder runs in two passes: pass one emits all
//! fixed-width fields, reserving zeroed placeholders for pointers and queuing
//! a pending patch for each; sub-structures (array entries first, then the
//! out-of-line strings) follow the fixed fields of their owning record; pass
//! two computes the real displacements and overwrites the placeholders.

use std::sync::Arc;

use crate::codec::{Codec, Count, Value};
use crate::layout::{Layout, Scalar};
use crate::stream::{CountingSink, Reader, Sink, VecSink};
use crate::{Error, Result};

/// A named, ordered codec binding.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldSpec {
    pub name: &'static str,
    pub codec: Codec,
}

impl FieldSpec {
    /// Create a field spec.
    pub fn new(name: &'static str, codec: Codec) -> Self {
        Self { name, codec }
    }
}

/// An ordered list of field specs describing one record layout.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Schema {
    fields: Vec<FieldSpec>,
}

impl Schema {
    /// Create an empty schema.
    pub fn new() -> Self {
        Self::default()
    }

    /// The field specs in declaration order.
    pub fn fields(&self) -> &[FieldSpec] {
        &self.fields
    }

    /// Append a magic-literal field.
    pub fn magic(&mut self, name: &'static str, literal: &[u8]) {
        self.push(name, Codec::Magic(literal.to_vec()));
    }

    /// Append a fixed-width scalar tuple field described by a layout string.
    pub fn format(&mut self, name: &'static str, spec: &str) -> Result<()> {
        let layout = Layout::parse(spec)?;
        self.push(name, Codec::Format(layout));
        Ok(())
    }

    /// Append a fixed-width string field.
    pub fn fixed_string(&mut self, name: &'static str, len: usize) {
        self.push(name, Codec::FixedString(len));
    }

    /// Append a null-terminated string field.
    pub fn cstring(&mut self, name: &'static str) {
        self.push(name, Codec::CString);
    }

    /// Append a zero-width position marker.
    pub fn offset(&mut self, name: &'static str) {
        self.push(name, Codec::Offset);
    }

    /// Append a self-relative integrity pointer.
    pub fn base_pointer(&mut self, name: &'static str) {
        self.push(name, Codec::BasePointer);
    }

    /// Append a base-relative pointer resolved against `base`.
    pub fn relative(&mut self, name: &'static str, base: &'static str) {
        self.push(name, Codec::Relative { base });
    }

    /// Append a base-relative pointer whose target is a string.
    pub fn relative_string(&mut self, name: &'static str, base: &'static str) {
        self.push(name, Codec::RelativeString { base });
    }

    /// Append an out-of-line array of sub-records.
    pub fn array(&mut self, name: &'static str, count: Count, offset: &'static str, elem: Schema) {
        self.push(
            name,
            Codec::Array {
                count,
                offset,
                elem: Arc::new(elem),
            },
        );
    }

    fn push(&mut self, name: &'static str, codec: Codec) {
        self.fields.push(FieldSpec::new(name, codec));
    }

    /// Decode a document from the start of a buffer.
    pub fn decode(&self, data: &[u8]) -> Result<Document> {
        self.decode_at(data, 0)
    }

    /// Decode a document starting at an absolute position.
    pub fn decode_at(&self, data: &[u8], position: usize) -> Result<Document> {
        let mut reader = Reader::new_at(data, position);
        self.decode_from(&mut reader)
    }

    /// Decode a document at the reader's current position.
    pub fn decode_from(&self, reader: &mut Reader<'_>) -> Result<Document> {
        let mut doc = Document::new(reader.position() as u64);
        for spec in &self.fields {
            doc.decode_field(reader, spec)?;
        }
        Ok(doc)
    }
}

/// One decoded field: its name, the offset its bytes start at, the codec it
/// was decoded with, and the decoded value.
#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    pub name: &'static str,
    pub offset: u64,
    pub codec: Codec,
    pub value: Value,
}

/// An ordered mapping of field name to offset and decoded value.
///
/// Insertion order matches on-disk encounter order. Offsets are absolute
/// positions within the source buffer, or, after an encode, within the
/// destination buffer that was built. A document is consumed exactly once by
/// either a full re-encode or an in-place patch; it is not reused afterward.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    start: u64,
    fields: Vec<Field>,
}

/// A queued placeholder overwrite, consumed at the end of the owning
/// document's encode.
#[derive(Debug)]
struct Pending {
    field_index: usize,
    at: usize,
    base: &'static str,
    target: Option<u64>,
}

impl Document {
    /// Create an empty document starting at the given absolute position.
    pub fn new(start: u64) -> Self {
        Self {
            start,
            fields: Vec::new(),
        }
    }

    /// The record's absolute start position.
    pub fn start(&self) -> u64 {
        self.start
    }

    /// The fields in on-disk encounter order.
    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    /// Look up a field by name.
    pub fn get(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Look up a field mutably by name.
    pub fn get_mut(&mut self, name: &str) -> Option<&mut Field> {
        self.fields.iter_mut().find(|f| f.name == name)
    }

    fn require(&self, name: &str) -> Result<&Field> {
        self.get(name)
            .ok_or_else(|| Error::UnknownField(name.to_owned()))
    }

    fn index_of(&self, name: &str) -> Result<usize> {
        self.fields
            .iter()
            .position(|f| f.name == name)
            .ok_or_else(|| Error::UnknownField(name.to_owned()))
    }

    /// First scalar of a field as an unsigned integer.
    pub fn unsigned(&self, name: &str) -> Result<u64> {
        let field = self.require(name)?;
        scalar_index(&field.value).ok_or_else(|| Error::TypeMismatch {
            field: name.to_owned(),
            expected: "non-negative scalar",
        })
    }

    /// All scalars of a format field.
    pub fn scalars(&self, name: &str) -> Result<&[Scalar]> {
        match &self.require(name)?.value {
            Value::Scalars(v) => Ok(v),
            _ => Err(Error::TypeMismatch {
                field: name.to_owned(),
                expected: "scalar tuple",
            }),
        }
    }

    /// Replace the scalars of a format field. Width checks happen at encode.
    pub fn set_scalars(&mut self, name: &str, values: Vec<Scalar>) -> Result<()> {
        let field = self
            .get_mut(name)
            .ok_or_else(|| Error::UnknownField(name.to_owned()))?;
        match &mut field.value {
            Value::Scalars(v) => {
                *v = values;
                Ok(())
            }
            _ => Err(Error::TypeMismatch {
                field: name.to_owned(),
                expected: "scalar tuple",
            }),
        }
    }

    /// The resolved text of a string or string-reference field.
    pub fn text(&self, name: &str) -> Result<&str> {
        self.require(name)?
            .value
            .text()
            .ok_or_else(|| Error::TypeMismatch {
                field: name.to_owned(),
                expected: "present string",
            })
    }

    /// The `(address, text)` pair of a string-reference field.
    pub fn string_ref(&self, name: &str) -> Result<(Option<u64>, Option<&str>)> {
        match &self.require(name)?.value {
            Value::StringRef { addr, text } => Ok((*addr, text.as_deref())),
            _ => Err(Error::TypeMismatch {
                field: name.to_owned(),
                expected: "string reference",
            }),
        }
    }

    /// The sub-records of an array field.
    pub fn array(&self, name: &str) -> Result<&[Document]> {
        match &self.require(name)?.value {
            Value::Array(docs) => Ok(docs),
            _ => Err(Error::TypeMismatch {
                field: name.to_owned(),
                expected: "array",
            }),
        }
    }

    /// Mutable access to the sub-records of an array field.
    pub fn array_mut(&mut self, name: &str) -> Result<&mut Vec<Document>> {
        let field = self
            .get_mut(name)
            .ok_or_else(|| Error::UnknownField(name.to_owned()))?;
        match &mut field.value {
            Value::Array(docs) => Ok(docs),
            _ => Err(Error::TypeMismatch {
                field: name.to_owned(),
                expected: "array",
            }),
        }
    }

    fn base_offset(&self, name: &str) -> Result<u64> {
        match &self.require(name)?.value {
            Value::Offset(v) => Ok(*v),
            _ => Err(Error::TypeMismatch {
                field: name.to_owned(),
                expected: "offset marker",
            }),
        }
    }

    fn count_value(&self, count: &Count) -> Result<usize> {
        let value = match count {
            Count::Field(name) => self.unsigned(name)?,
            Count::Product(a, b) => self.unsigned(a)?.saturating_mul(self.unsigned(b)?),
        };
        Ok(value as usize)
    }

    fn array_target(&self, offset_name: &str, array_name: &str) -> Result<u64> {
        let field = self.require(offset_name)?;
        match &field.value {
            Value::Pointer(Some(addr)) => Ok(*addr),
            Value::Pointer(None) => Err(Error::NullArrayOffset(array_name.to_owned())),
            Value::Offset(v) => Ok(*v),
            other => scalar_index(other).ok_or_else(|| Error::TypeMismatch {
                field: offset_name.to_owned(),
                expected: "pointer or scalar offset",
            }),
        }
    }

    /// Decode one more field at the reader's current position.
    ///
    /// This is the step [`Schema::decode_from`] loops over; it is public so
    /// format crates can append fields whose spec only becomes known after
    /// earlier fields have been decoded.
    pub fn decode_field(&mut self, reader: &mut Reader<'_>, spec: &FieldSpec) -> Result<()> {
        let at = reader.position() as u64;
        let value = match &spec.codec {
            Codec::Magic(literal) => {
                let actual = reader.read_bytes(literal.len())?;
                if actual != &literal[..] {
                    return Err(Error::MagicMismatch {
                        expected: literal.clone(),
                        actual: actual.to_vec(),
                    });
                }
                Value::Magic
            }
            Codec::Format(layout) => Value::Scalars(layout.decode(reader)?),
            Codec::FixedString(len) => Value::FixedString(reader.read_bytes(*len)?.to_vec()),
            Codec::CString => Value::Str(reader.read_cstring()?.to_owned()),
            Codec::Offset => Value::Offset(at),
            Codec::BasePointer => {
                let stored = reader.read_i32()? as i64;
                if stored != -(self.start as i64) {
                    return Err(Error::SelfPointerMismatch {
                        offset: self.start,
                        stored,
                    });
                }
                Value::Scalars(vec![Scalar::Signed(stored)])
            }
            Codec::Relative { base } => {
                let delta = reader.read_i32()? as i64;
                if delta == 0 {
                    Value::Pointer(None)
                } else {
                    let base_addr = self.base_offset(base)?;
                    Value::Pointer(Some((base_addr as i64 + delta) as u64))
                }
            }
            Codec::RelativeString { base } => {
                let delta = reader.read_i32()? as i64;
                if delta == 0 {
                    Value::StringRef {
                        addr: None,
                        text: None,
                    }
                } else {
                    let addr = (self.base_offset(base)? as i64 + delta) as u64;
                    let text =
                        reader.scoped(addr as usize, |r| r.read_cstring().map(str::to_owned))?;
                    Value::StringRef {
                        addr: Some(addr),
                        text: Some(text),
                    }
                }
            }
            Codec::Array {
                count,
                offset,
                elem,
            } => {
                let n = self.count_value(count)?;
                if n == 0 {
                    Value::Array(Vec::new())
                } else {
                    let target = self.array_target(offset, spec.name)?;
                    reader.scoped(target as usize, |r| {
                        let mut docs = Vec::with_capacity(n);
                        for _ in 0..n {
                            docs.push(elem.decode_from(r)?);
                        }
                        Ok(Value::Array(docs))
                    })?
                }
            }
        };
        self.fields.push(Field {
            name: spec.name,
            offset: at,
            codec: spec.codec.clone(),
            value,
        });
        Ok(())
    }

    /// Re-encode the document into a sink, recomputing every address.
    ///
    /// Field offsets and pointer addresses are updated in place to describe
    /// the destination buffer, so after this call `decode(encode(doc))`
    /// equals `doc` field for field.
    pub fn encode<S: Sink>(&mut self, sink: &mut S) -> Result<()> {
        let mut pendings = self.encode_fixed(sink)?;
        self.encode_subs(sink, &mut pendings)?;
        self.flush_pendings(sink, pendings)
    }

    /// Re-encode into a fresh buffer.
    pub fn encode_to_vec(&mut self) -> Result<Vec<u8>> {
        let mut sink = VecSink::new();
        self.encode(&mut sink)?;
        Ok(sink.into_bytes())
    }

    /// Dry-run encode: the final size, with no bytes materialized.
    pub fn encoded_size(&mut self) -> Result<usize> {
        let mut sink = CountingSink::new();
        self.encode(&mut sink)?;
        Ok(sink.position())
    }

    /// Pass one: fixed-width fields in declared order, placeholders for
    /// pointers, pendings queued.
    fn encode_fixed<S: Sink>(&mut self, sink: &mut S) -> Result<Vec<Pending>> {
        self.start = sink.position() as u64;
        let mut pendings = Vec::new();

        for i in 0..self.fields.len() {
            let at = sink.position() as u64;
            let start = self.start;
            let field = &mut self.fields[i];
            field.offset = at;
            match (&field.codec, &mut field.value) {
                (Codec::Magic(literal), Value::Magic) => sink.write(literal)?,
                (Codec::Format(layout), Value::Scalars(values)) => layout
                    .encode(values, sink)
                    .map_err(|e| name_error(e, field.name))?,
                (Codec::FixedString(len), Value::FixedString(bytes)) => {
                    if bytes.len() != *len {
                        return Err(Error::TypeMismatch {
                            field: field.name.to_owned(),
                            expected: "fixed string of declared width",
                        });
                    }
                    sink.write(bytes)?;
                }
                (Codec::CString, Value::Str(s)) => {
                    sink.write(s.as_bytes())?;
                    sink.write(&[0])?;
                }
                (Codec::Offset, value @ Value::Offset(_)) => {
                    *value = Value::Offset(at);
                }
                (Codec::BasePointer, Value::Scalars(values)) => {
                    let stored = -(start as i64);
                    let narrow =
                        i32::try_from(stored).map_err(|_| Error::ScalarOutOfRange { code: 'i' })?;
                    *values = vec![Scalar::Signed(stored)];
                    sink.write(&narrow.to_le_bytes())?;
                }
                (Codec::Relative { base }, Value::Pointer(addr)) => {
                    sink.write(&[0u8; 4])?;
                    pendings.push(Pending {
                        field_index: i,
                        at: at as usize,
                        base,
                        target: *addr,
                    });
                }
                (Codec::RelativeString { base }, Value::StringRef { addr, .. }) => {
                    sink.write(&[0u8; 4])?;
                    pendings.push(Pending {
                        field_index: i,
                        at: at as usize,
                        base,
                        target: *addr,
                    });
                }
                (Codec::Array { .. }, Value::Array(_)) => {}
                _ => {
                    return Err(Error::TypeMismatch {
                        field: field.name.to_owned(),
                        expected: "value shape matching codec",
                    })
                }
            }
        }
        Ok(pendings)
    }

    /// Sub-structure phase: array entries (all fixed parts first, preserving
    /// the entry stride) and out-of-line strings, in declaration order.
    fn encode_subs<S: Sink>(&mut self, sink: &mut S, pendings: &mut Vec<Pending>) -> Result<()> {
        for i in 0..self.fields.len() {
            match self.fields[i].codec.clone() {
                Codec::RelativeString { .. } => {
                    let text = match &self.fields[i].value {
                        Value::StringRef { text, .. } => text.clone(),
                        _ => None,
                    };
                    if let Some(text) = text {
                        let new_addr = sink.position() as u64;
                        sink.write(text.as_bytes())?;
                        sink.write(&[0])?;
                        if let Value::StringRef { addr, .. } = &mut self.fields[i].value {
                            *addr = Some(new_addr);
                        }
                        if let Some(p) = pendings.iter_mut().find(|p| p.field_index == i) {
                            p.target = Some(new_addr);
                        }
                    }
                }
                Codec::Array { offset, .. } => {
                    let mut docs =
                        match std::mem::replace(&mut self.fields[i].value, Value::Array(Vec::new()))
                        {
                            Value::Array(docs) => docs,
                            _ => {
                                return Err(Error::TypeMismatch {
                                    field: self.fields[i].name.to_owned(),
                                    expected: "array",
                                })
                            }
                        };
                    if !docs.is_empty() {
                        let new_start = sink.position() as u64;
                        let mut child_pendings = Vec::with_capacity(docs.len());
                        for doc in &mut docs {
                            child_pendings.push(doc.encode_fixed(sink)?);
                        }
                        for (doc, mut cp) in docs.iter_mut().zip(child_pendings) {
                            doc.encode_subs(sink, &mut cp)?;
                            doc.flush_pendings(sink, cp)?;
                        }
                        self.retarget_offset_field(sink, pendings, offset, new_start)?;
                    }
                    self.fields[i].value = Value::Array(docs);
                }
                _ => {}
            }
        }
        Ok(())
    }

    /// Rewrite the field an array was addressed through so it points at the
    /// array's new position.
    fn retarget_offset_field<S: Sink>(
        &mut self,
        sink: &mut S,
        pendings: &mut [Pending],
        name: &'static str,
        new_start: u64,
    ) -> Result<()> {
        let idx = self.index_of(name)?;
        let field = &mut self.fields[idx];
        match (&field.codec, &mut field.value) {
            (Codec::Format(layout), Value::Scalars(values)) => {
                if layout.count() != 1 {
                    return Err(Error::TypeMismatch {
                        field: name.to_owned(),
                        expected: "single-scalar offset field",
                    });
                }
                values[0] = match values[0] {
                    Scalar::Signed(_) => Scalar::Signed(new_start as i64),
                    Scalar::Unsigned(_) => Scalar::Unsigned(new_start),
                    Scalar::Float(_) => {
                        return Err(Error::TypeMismatch {
                            field: name.to_owned(),
                            expected: "integer offset field",
                        })
                    }
                };
                let mut patch = VecSink::new();
                layout.encode(values, &mut patch)?;
                sink.patch_at(field.offset as usize, patch.bytes())?;
            }
            (Codec::Relative { .. }, Value::Pointer(addr)) => {
                *addr = Some(new_start);
                if let Some(p) = pendings.iter_mut().find(|p| p.field_index == idx) {
                    p.target = Some(new_start);
                }
            }
            _ => {
                return Err(Error::TypeMismatch {
                    field: name.to_owned(),
                    expected: "format or relative offset field",
                })
            }
        }
        Ok(())
    }

    /// Pass two: compute real displacements and overwrite the placeholders.
    fn flush_pendings<S: Sink>(&self, sink: &mut S, pendings: Vec<Pending>) -> Result<()> {
        for pending in pendings {
            let delta = match pending.target {
                None => 0i64,
                Some(addr) => addr as i64 - self.base_offset(pending.base)? as i64,
            };
            let delta = i32::try_from(delta).map_err(|_| Error::ScalarOutOfRange { code: 'i' })?;
            sink.patch_at(pending.at, &delta.to_le_bytes())?;
        }
        Ok(())
    }
}

fn scalar_index(value: &Value) -> Option<u64> {
    match value {
        Value::Scalars(v) => match v.first()? {
            Scalar::Unsigned(n) => Some(*n),
            Scalar::Signed(n) if *n >= 0 => Some(*n as u64),
            _ => None,
        },
        _ => None,
    }
}

fn name_error(err: Error, name: &str) -> Error {
    match err {
        Error::TypeMismatch { field, expected } if field.is_empty() => Error::TypeMismatch {
            field: name.to_owned(),
            expected,
        },
        other => other,
    }
}
