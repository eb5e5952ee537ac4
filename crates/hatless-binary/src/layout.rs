//! Declarative little-endian scalar layouts.
//!
//! A [`Layout`] is parsed from a compact format string in the style the
//! original toolchain used to describe fixed-width records: an optional
//! decimal repeat count followed by a type code, concatenated. `"3f"` is
//! three f32s, `"II"` two u32s, `"h"` a single i16.
//!
//! Supported codes: `b`/`B` (i8/u8), `h`/`H` (i16/u16), `i`/`I` (i32/u32),
//! `q`/`Q` (i64/u64), `f` (f32), `d` (f64). Everything is little-endian.

use crate::stream::{Reader, Sink};
use crate::{Error, Result};

/// A decoded numeric scalar.
///
/// Width and signedness live in the [`Layout`], not the value; f32s are held
/// as f64 (the conversion is exact, so round trips stay bit-identical).
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Scalar {
    Signed(i64),
    Unsigned(u64),
    Float(f64),
}

impl Scalar {
    /// The value as u64, if it is an unsigned scalar.
    pub fn as_unsigned(&self) -> Option<u64> {
        match self {
            Scalar::Unsigned(v) => Some(*v),
            _ => None,
        }
    }

    /// The value as i64, if it is a signed scalar.
    pub fn as_signed(&self) -> Option<i64> {
        match self {
            Scalar::Signed(v) => Some(*v),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Code {
    I8,
    U8,
    I16,
    U16,
    I32,
    U32,
    I64,
    U64,
    F32,
    F64,
}

impl Code {
    fn from_char(c: char) -> Option<Self> {
        Some(match c {
            'b' => Code::I8,
            'B' => Code::U8,
            'h' => Code::I16,
            'H' => Code::U16,
            'i' => Code::I32,
            'I' => Code::U32,
            'q' => Code::I64,
            'Q' => Code::U64,
            'f' => Code::F32,
            'd' => Code::F64,
            _ => return None,
        })
    }

    const fn width(self) -> usize {
        match self {
            Code::I8 | Code::U8 => 1,
            Code::I16 | Code::U16 => 2,
            Code::I32 | Code::U32 | Code::F32 => 4,
            Code::I64 | Code::U64 | Code::F64 => 8,
        }
    }

    const fn as_char(self) -> char {
        match self {
            Code::I8 => 'b',
            Code::U8 => 'B',
            Code::I16 => 'h',
            Code::U16 => 'H',
            Code::I32 => 'i',
            Code::U32 => 'I',
            Code::I64 => 'q',
            Code::U64 => 'Q',
            Code::F32 => 'f',
            Code::F64 => 'd',
        }
    }
}

/// A fixed-width sequence of scalar codes with a statically known byte width.
#[derive(Debug, Clone, PartialEq)]
pub struct Layout {
    codes: Vec<Code>,
    width: usize,
}

impl Layout {
    /// Parse a layout from a format string.
    pub fn parse(spec: &str) -> Result<Self> {
        let mut codes = Vec::new();
        let mut count: usize = 0;
        let mut have_count = false;

        for c in spec.chars() {
            if let Some(d) = c.to_digit(10) {
                count = count
                    .checked_mul(10)
                    .and_then(|n| n.checked_add(d as usize))
                    .ok_or_else(|| Error::BadLayout(spec.to_owned()))?;
                have_count = true;
            } else if let Some(code) = Code::from_char(c) {
                let repeat = if have_count { count } else { 1 };
                if repeat == 0 {
                    return Err(Error::BadLayout(spec.to_owned()));
                }
                codes.extend(std::iter::repeat(code).take(repeat));
                count = 0;
                have_count = false;
            } else {
                return Err(Error::BadLayout(spec.to_owned()));
            }
        }
        if have_count || codes.is_empty() {
            return Err(Error::BadLayout(spec.to_owned()));
        }

        let width = codes.iter().map(|c| c.width()).sum();
        Ok(Self { codes, width })
    }

    /// Total encoded width in bytes.
    #[inline]
    pub fn width(&self) -> usize {
        self.width
    }

    /// Number of scalars in the layout.
    #[inline]
    pub fn count(&self) -> usize {
        self.codes.len()
    }

    /// Decode the scalar sequence from the reader.
    pub fn decode(&self, reader: &mut Reader<'_>) -> Result<Vec<Scalar>> {
        let mut values = Vec::with_capacity(self.codes.len());
        for code in &self.codes {
            values.push(match code {
                Code::I8 => Scalar::Signed(reader.read_i8()? as i64),
                Code::U8 => Scalar::Unsigned(reader.read_u8()? as u64),
                Code::I16 => Scalar::Signed(reader.read_i16()? as i64),
                Code::U16 => Scalar::Unsigned(reader.read_u16()? as u64),
                Code::I32 => Scalar::Signed(reader.read_i32()? as i64),
                Code::U32 => Scalar::Unsigned(reader.read_u32()? as u64),
                Code::I64 => Scalar::Signed(reader.read_i64()?),
                Code::U64 => Scalar::Unsigned(reader.read_u64()?),
                Code::F32 => Scalar::Float(reader.read_f32()? as f64),
                Code::F64 => Scalar::Float(reader.read_f64()?),
            });
        }
        Ok(values)
    }

    /// Encode a scalar sequence previously decoded (or built) for this layout.
    pub fn encode<S: Sink>(&self, values: &[Scalar], sink: &mut S) -> Result<()> {
        if values.len() != self.codes.len() {
            return Err(Error::TypeMismatch {
                field: String::new(),
                expected: "scalar count matching layout",
            });
        }
        for (code, value) in self.codes.iter().zip(values) {
            let range_err = || Error::ScalarOutOfRange {
                code: code.as_char(),
            };
            match (code, value) {
                (Code::I8, Scalar::Signed(v)) => {
                    let v = i8::try_from(*v).map_err(|_| range_err())?;
                    sink.write(&v.to_le_bytes())?;
                }
                (Code::U8, Scalar::Unsigned(v)) => {
                    let v = u8::try_from(*v).map_err(|_| range_err())?;
                    sink.write(&v.to_le_bytes())?;
                }
                (Code::I16, Scalar::Signed(v)) => {
                    let v = i16::try_from(*v).map_err(|_| range_err())?;
                    sink.write(&v.to_le_bytes())?;
                }
                (Code::U16, Scalar::Unsigned(v)) => {
                    let v = u16::try_from(*v).map_err(|_| range_err())?;
                    sink.write(&v.to_le_bytes())?;
                }
                (Code::I32, Scalar::Signed(v)) => {
                    let v = i32::try_from(*v).map_err(|_| range_err())?;
                    sink.write(&v.to_le_bytes())?;
                }
                (Code::U32, Scalar::Unsigned(v)) => {
                    let v = u32::try_from(*v).map_err(|_| range_err())?;
                    sink.write(&v.to_le_bytes())?;
                }
                (Code::I64, Scalar::Signed(v)) => sink.write(&v.to_le_bytes())?,
                (Code::U64, Scalar::Unsigned(v)) => sink.write(&v.to_le_bytes())?,
                (Code::F32, Scalar::Float(v)) => sink.write(&(*v as f32).to_le_bytes())?,
                (Code::F64, Scalar::Float(v)) => sink.write(&v.to_le_bytes())?,
                _ => {
                    return Err(Error::TypeMismatch {
                        field: String::new(),
                        expected: "scalar kind matching layout code",
                    })
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stream::VecSink;

    #[test]
    fn test_parse_widths() {
        assert_eq!(Layout::parse("I").unwrap().width(), 4);
        assert_eq!(Layout::parse("3f").unwrap().width(), 12);
        assert_eq!(Layout::parse("II").unwrap().width(), 8);
        assert_eq!(Layout::parse("6I").unwrap().width(), 24);
        assert_eq!(Layout::parse("h").unwrap().width(), 2);
        assert_eq!(Layout::parse("2Ih").unwrap().width(), 10);
        assert_eq!(Layout::parse("16f").unwrap().count(), 16);
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(Layout::parse("").is_err());
        assert!(Layout::parse("3").is_err());
        assert!(Layout::parse("x").is_err());
        assert!(Layout::parse("0I").is_err());
    }

    #[test]
    fn test_roundtrip_scalars() {
        let layout = Layout::parse("iIfh").unwrap();
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&(-7i32).to_le_bytes());
        bytes.extend_from_slice(&0xDEAD_BEEFu32.to_le_bytes());
        bytes.extend_from_slice(&1.5f32.to_le_bytes());
        bytes.extend_from_slice(&(-2i16).to_le_bytes());

        let mut reader = Reader::new(&bytes);
        let values = layout.decode(&mut reader).unwrap();
        assert_eq!(
            values,
            vec![
                Scalar::Signed(-7),
                Scalar::Unsigned(0xDEAD_BEEF),
                Scalar::Float(1.5),
                Scalar::Signed(-2),
            ]
        );

        let mut sink = VecSink::new();
        layout.encode(&values, &mut sink).unwrap();
        assert_eq!(sink.into_bytes(), bytes);
    }

    #[test]
    fn test_f32_bit_exact() {
        // A value with no short decimal form must survive the f64 detour.
        let raw = 0x3E99_999Au32; // ~0.3f32
        let layout = Layout::parse("f").unwrap();
        let bytes = raw.to_le_bytes();

        let mut reader = Reader::new(&bytes);
        let values = layout.decode(&mut reader).unwrap();

        let mut sink = VecSink::new();
        layout.encode(&values, &mut sink).unwrap();
        assert_eq!(sink.into_bytes(), bytes);
    }

    #[test]
    fn test_encode_range_check() {
        let layout = Layout::parse("B").unwrap();
        let mut sink = VecSink::new();
        let err = layout.encode(&[Scalar::Unsigned(300)], &mut sink);
        assert!(matches!(err, Err(Error::ScalarOutOfRange { code: 'B' })));
    }
}
