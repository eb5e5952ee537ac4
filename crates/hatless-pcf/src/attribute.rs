//! Attribute payloads of the binary particle container.
//!
//! Every attribute is a `(name index, type code, payload)` triple. The type
//! codes 1 through 14 are the scalar kinds; adding 14 turns a scalar code
//! into its array form, whose payload is a u32 count followed by that many
//! scalar payloads.
//!
//! Element references are stored as i32 indices into the file's element
//! table. Negative indices are null references; they are preserved verbatim
//! and never followed.

use hatless_binary::{Reader, Sink};

use crate::{Error, Result};

const ARRAY_BIAS: u8 = 14;

/// One named attribute of an element.
#[derive(Debug, Clone, PartialEq)]
pub struct Attribute {
    /// Index into the file's string dictionary.
    pub name_index: u16,
    pub value: AttributeValue,
}

/// A decoded attribute payload.
///
/// Floats are kept as raw f32 so re-encoding is bit-exact; times are kept in
/// their stored tick representation for the same reason.
#[derive(Debug, Clone, PartialEq)]
pub enum AttributeValue {
    Element(i32),
    Integer(i32),
    Float(f32),
    Bool(bool),
    String(String),
    Binary(Vec<u8>),
    Time(i32),
    Color([u8; 4]),
    Vector2([f32; 2]),
    Vector3([f32; 3]),
    Vector4([f32; 4]),
    QAngle([f32; 3]),
    Quaternion([f32; 4]),
    Matrix([f32; 16]),
    ElementArray(Vec<i32>),
    IntegerArray(Vec<i32>),
    FloatArray(Vec<f32>),
    BoolArray(Vec<bool>),
    StringArray(Vec<String>),
    BinaryArray(Vec<Vec<u8>>),
    TimeArray(Vec<i32>),
    ColorArray(Vec<[u8; 4]>),
    Vector2Array(Vec<[f32; 2]>),
    Vector3Array(Vec<[f32; 3]>),
    Vector4Array(Vec<[f32; 4]>),
    QAngleArray(Vec<[f32; 3]>),
    QuaternionArray(Vec<[f32; 4]>),
    MatrixArray(Vec<[f32; 16]>),
}

impl AttributeValue {
    /// The on-disk type code for this payload.
    pub fn type_code(&self) -> u8 {
        match self {
            AttributeValue::Element(_) => 1,
            AttributeValue::Integer(_) => 2,
            AttributeValue::Float(_) => 3,
            AttributeValue::Bool(_) => 4,
            AttributeValue::String(_) => 5,
            AttributeValue::Binary(_) => 6,
            AttributeValue::Time(_) => 7,
            AttributeValue::Color(_) => 8,
            AttributeValue::Vector2(_) => 9,
            AttributeValue::Vector3(_) => 10,
            AttributeValue::Vector4(_) => 11,
            AttributeValue::QAngle(_) => 12,
            AttributeValue::Quaternion(_) => 13,
            AttributeValue::Matrix(_) => 14,
            AttributeValue::ElementArray(_) => 1 + ARRAY_BIAS,
            AttributeValue::IntegerArray(_) => 2 + ARRAY_BIAS,
            AttributeValue::FloatArray(_) => 3 + ARRAY_BIAS,
            AttributeValue::BoolArray(_) => 4 + ARRAY_BIAS,
            AttributeValue::StringArray(_) => 5 + ARRAY_BIAS,
            AttributeValue::BinaryArray(_) => 6 + ARRAY_BIAS,
            AttributeValue::TimeArray(_) => 7 + ARRAY_BIAS,
            AttributeValue::ColorArray(_) => 8 + ARRAY_BIAS,
            AttributeValue::Vector2Array(_) => 9 + ARRAY_BIAS,
            AttributeValue::Vector3Array(_) => 10 + ARRAY_BIAS,
            AttributeValue::Vector4Array(_) => 11 + ARRAY_BIAS,
            AttributeValue::QAngleArray(_) => 12 + ARRAY_BIAS,
            AttributeValue::QuaternionArray(_) => 13 + ARRAY_BIAS,
            AttributeValue::MatrixArray(_) => 14 + ARRAY_BIAS,
        }
    }

    /// The element indices this payload references, if any.
    pub fn element_refs(&self) -> &[i32] {
        match self {
            AttributeValue::Element(idx) => std::slice::from_ref(idx),
            AttributeValue::ElementArray(idxs) => idxs,
            _ => &[],
        }
    }

    /// Mutable access to the referenced element indices.
    pub fn element_refs_mut(&mut self) -> &mut [i32] {
        match self {
            AttributeValue::Element(idx) => std::slice::from_mut(idx),
            AttributeValue::ElementArray(idxs) => idxs,
            _ => &mut [],
        }
    }

    /// Decode a payload of the given type code.
    pub fn decode(reader: &mut Reader<'_>, code: u8) -> Result<Self> {
        Ok(match code {
            1 => AttributeValue::Element(reader.read_i32()?),
            2 => AttributeValue::Integer(reader.read_i32()?),
            3 => AttributeValue::Float(reader.read_f32()?),
            4 => AttributeValue::Bool(reader.read_u8()? != 0),
            5 => AttributeValue::String(reader.read_cstring()?.to_owned()),
            6 => AttributeValue::Binary(read_blob(reader)?),
            7 => AttributeValue::Time(reader.read_i32()?),
            8 => AttributeValue::Color(read_color(reader)?),
            9 => AttributeValue::Vector2(read_floats(reader)?),
            10 => AttributeValue::Vector3(read_floats(reader)?),
            11 => AttributeValue::Vector4(read_floats(reader)?),
            12 => AttributeValue::QAngle(read_floats(reader)?),
            13 => AttributeValue::Quaternion(read_floats(reader)?),
            14 => AttributeValue::Matrix(read_floats(reader)?),
            15 => AttributeValue::ElementArray(read_array(reader, |r| Ok(r.read_i32()?))?),
            16 => AttributeValue::IntegerArray(read_array(reader, |r| Ok(r.read_i32()?))?),
            17 => AttributeValue::FloatArray(read_array(reader, |r| Ok(r.read_f32()?))?),
            18 => AttributeValue::BoolArray(read_array(reader, |r| Ok(r.read_u8()? != 0))?),
            19 => AttributeValue::StringArray(read_array(reader, |r| {
                Ok(r.read_cstring()?.to_owned())
            })?),
            20 => AttributeValue::BinaryArray(read_array(reader, read_blob)?),
            21 => AttributeValue::TimeArray(read_array(reader, |r| Ok(r.read_i32()?))?),
            22 => AttributeValue::ColorArray(read_array(reader, read_color)?),
            23 => AttributeValue::Vector2Array(read_array(reader, read_floats)?),
            24 => AttributeValue::Vector3Array(read_array(reader, read_floats)?),
            25 => AttributeValue::Vector4Array(read_array(reader, read_floats)?),
            26 => AttributeValue::QAngleArray(read_array(reader, read_floats)?),
            27 => AttributeValue::QuaternionArray(read_array(reader, read_floats)?),
            28 => AttributeValue::MatrixArray(read_array(reader, read_floats)?),
            other => return Err(Error::UnknownAttributeType(other)),
        })
    }

    /// Encode the payload. The type code byte is written by the caller.
    pub fn encode<S: Sink>(&self, sink: &mut S) -> Result<()> {
        match self {
            AttributeValue::Element(v)
            | AttributeValue::Integer(v)
            | AttributeValue::Time(v) => sink.write(&v.to_le_bytes())?,
            AttributeValue::Float(v) => sink.write(&v.to_le_bytes())?,
            AttributeValue::Bool(v) => sink.write(&[*v as u8])?,
            AttributeValue::String(s) => write_cstring(sink, s)?,
            AttributeValue::Binary(b) => write_blob(sink, b)?,
            AttributeValue::Color(c) => sink.write(c)?,
            AttributeValue::Vector2(v) => write_floats(sink, v)?,
            AttributeValue::Vector3(v) | AttributeValue::QAngle(v) => write_floats(sink, v)?,
            AttributeValue::Vector4(v) | AttributeValue::Quaternion(v) => write_floats(sink, v)?,
            AttributeValue::Matrix(v) => write_floats(sink, v)?,
            AttributeValue::ElementArray(v)
            | AttributeValue::IntegerArray(v)
            | AttributeValue::TimeArray(v) => {
                write_array(sink, v, |s, x| Ok(s.write(&x.to_le_bytes())?))?
            }
            AttributeValue::FloatArray(v) => {
                write_array(sink, v, |s, x| Ok(s.write(&x.to_le_bytes())?))?
            }
            AttributeValue::BoolArray(v) => {
                write_array(sink, v, |s, x| Ok(s.write(&[*x as u8])?))?
            }
            AttributeValue::StringArray(v) => write_array(sink, v, |s, x| write_cstring(s, x))?,
            AttributeValue::BinaryArray(v) => write_array(sink, v, |s, x| write_blob(s, x))?,
            AttributeValue::ColorArray(v) => write_array(sink, v, |s, x| Ok(s.write(x)?))?,
            AttributeValue::Vector2Array(v) => write_array(sink, v, |s, x| write_floats(s, x))?,
            AttributeValue::Vector3Array(v) | AttributeValue::QAngleArray(v) => {
                write_array(sink, v, |s, x| write_floats(s, x))?
            }
            AttributeValue::Vector4Array(v) | AttributeValue::QuaternionArray(v) => {
                write_array(sink, v, |s, x| write_floats(s, x))?
            }
            AttributeValue::MatrixArray(v) => write_array(sink, v, |s, x| write_floats(s, x))?,
        }
        Ok(())
    }
}

fn read_color(reader: &mut Reader<'_>) -> Result<[u8; 4]> {
    let b = reader.read_bytes(4)?;
    Ok([b[0], b[1], b[2], b[3]])
}

fn read_floats<const N: usize>(reader: &mut Reader<'_>) -> Result<[f32; N]> {
    let mut out = [0f32; N];
    for slot in &mut out {
        *slot = reader.read_f32()?;
    }
    Ok(out)
}

fn read_blob(reader: &mut Reader<'_>) -> Result<Vec<u8>> {
    let len = reader.read_u32()? as usize;
    Ok(reader.read_bytes(len)?.to_vec())
}

fn read_array<T>(
    reader: &mut Reader<'_>,
    mut elem: impl FnMut(&mut Reader<'_>) -> Result<T>,
) -> Result<Vec<T>> {
    let count = reader.read_u32()? as usize;
    let mut out = Vec::with_capacity(count.min(4096));
    for _ in 0..count {
        out.push(elem(reader)?);
    }
    Ok(out)
}

fn write_cstring<S: Sink>(sink: &mut S, s: &str) -> Result<()> {
    sink.write(s.as_bytes())?;
    sink.write(&[0])?;
    Ok(())
}

fn write_blob<S: Sink>(sink: &mut S, blob: &[u8]) -> Result<()> {
    sink.write(&(blob.len() as u32).to_le_bytes())?;
    sink.write(blob)?;
    Ok(())
}

fn write_floats<S: Sink>(sink: &mut S, values: &[f32]) -> Result<()> {
    for v in values {
        sink.write(&v.to_le_bytes())?;
    }
    Ok(())
}

fn write_array<S: Sink, T>(
    sink: &mut S,
    values: &[T],
    mut elem: impl FnMut(&mut S, &T) -> Result<()>,
) -> Result<()> {
    sink.write(&(values.len() as u32).to_le_bytes())?;
    for v in values {
        elem(sink, v)?;
    }
    Ok(())
}
