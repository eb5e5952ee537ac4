//! Decoded model files and the edits performed on them.

use std::collections::{BTreeSet, HashSet};
use std::io::{Read, Seek, Write};
use std::sync::Arc;

use hatless_binary::{patch_field, Codec, Count, Document, FieldSpec, Reader, Schema, VecSink};

use crate::schema;
use crate::Result;

/// A decoded compiled model.
///
/// Wraps the engine [`Document`] with accessors for the parts the rewriting
/// tool works on: the sequence table with its activity-modifier strings, and
/// the skin table.
#[derive(Debug, Clone, PartialEq)]
pub struct Mdl {
    doc: Document,
}

impl Mdl {
    /// Decode a model from raw file bytes.
    pub fn decode(data: &[u8]) -> Result<Self> {
        let mut reader = Reader::new(data);
        let mut doc = schema::mdl()?.decode_from(&mut reader)?;

        // The skin table's row width is numskinref u16s, so its spec can
        // only be built once the header is decoded.
        let refs = doc.unsigned("numskinref")?;
        let mut row = Schema::new();
        let (layout, count) = if refs == 0 {
            // No skin references means no table, whatever the family count
            // claims; the product count forces an empty array.
            ("H".to_owned(), Count::Product("numskinref", "numskinfamilies"))
        } else {
            (format!("{}H", refs), Count::Field("numskinfamilies"))
        };
        row.format("refs", &layout)?;
        let spec = FieldSpec::new(
            "skin",
            Codec::Array {
                count,
                offset: "skinindex",
                elem: Arc::new(row),
            },
        );
        doc.decode_field(&mut reader, &spec)?;

        Ok(Self { doc })
    }

    /// The underlying document.
    pub fn document(&self) -> &Document {
        &self.doc
    }

    /// Mutable access to the underlying document.
    pub fn document_mut(&mut self) -> &mut Document {
        &mut self.doc
    }

    /// The model's internal name, trimmed at the first null.
    pub fn name(&self) -> Result<String> {
        let field = self
            .doc
            .get("name")
            .ok_or_else(|| hatless_binary::Error::UnknownField("name".to_owned()))?;
        match &field.value {
            hatless_binary::Value::FixedString(bytes) => {
                let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
                Ok(String::from_utf8_lossy(&bytes[..end]).into_owned())
            }
            _ => Err(hatless_binary::Error::TypeMismatch {
                field: "name".to_owned(),
                expected: "fixed string",
            }
            .into()),
        }
    }

    /// Number of skin families declared in the header.
    pub fn num_skin_families(&self) -> Result<u64> {
        Ok(self.doc.unsigned("numskinfamilies")?)
    }

    /// The sequence table.
    pub fn sequences(&self) -> Result<Vec<Sequence<'_>>> {
        Ok(self
            .doc
            .array("localsequence")?
            .iter()
            .map(|doc| Sequence { doc })
            .collect())
    }

    /// The skin table as rows of texture references, one row per family.
    pub fn skin_families(&self) -> Result<Vec<Vec<u16>>> {
        let mut rows = Vec::new();
        for row in self.doc.array("skin")? {
            let refs = row
                .scalars("refs")?
                .iter()
                .map(|s| s.as_unsigned().unwrap_or(0) as u16)
                .collect();
            rows.push(refs);
        }
        Ok(rows)
    }

    /// Overwrite every alternate skin family with family 0.
    ///
    /// Returns whether any row actually changed.
    pub fn flatten_skin_families(&mut self) -> Result<bool> {
        let rows = self.doc.array_mut("skin")?;
        let Some((first, rest)) = rows.split_first_mut() else {
            return Ok(false);
        };
        let master = first.scalars("refs")?.to_vec();
        let mut changed = false;
        for row in rest {
            if row.scalars("refs")? != master.as_slice() {
                row.set_scalars("refs", master.clone())?;
                changed = true;
            }
        }
        Ok(changed)
    }

    /// Re-encode the skin table rows exactly as they would sit on disk.
    pub fn skin_table_bytes(&self) -> Result<Vec<u8>> {
        let mut sink = VecSink::new();
        for row in self.doc.array("skin")? {
            let field = row
                .get("refs")
                .ok_or_else(|| hatless_binary::Error::UnknownField("refs".to_owned()))?;
            match &field.codec {
                Codec::Format(layout) => layout.encode(row.scalars("refs")?, &mut sink)?,
                _ => {
                    return Err(hatless_binary::Error::TypeMismatch {
                        field: "refs".to_owned(),
                        expected: "format field",
                    }
                    .into())
                }
            }
        }
        Ok(sink.into_bytes())
    }

    /// Patch the skin table in an already-valid file at its recorded offset.
    ///
    /// Fails with a repatch guard violation if the table on disk already
    /// matches, so calling this without a prior mutation is an error.
    pub fn patch_skin_table<S: Read + Write + Seek>(&self, stream: &mut S) -> Result<()> {
        let offset = self.doc.unsigned("skinindex")?;
        let bytes = self.skin_table_bytes()?;
        patch_field(stream, offset, &bytes)?;
        Ok(())
    }

    /// Absolute offsets of activity-modifier strings matching `activities`,
    /// skipping sequences whose activity name is in `ignored`.
    ///
    /// These are the strings the rewriting tool invalidates so that
    /// item-granted animation variants never trigger.
    pub fn activity_string_offsets(
        &self,
        activities: &HashSet<String>,
        ignored: &[&str],
    ) -> Result<BTreeSet<u64>> {
        let mut offsets = BTreeSet::new();
        for sequence in self.sequences()? {
            if let Some(activity) = sequence.activity_name()? {
                if ignored.contains(&activity) {
                    continue;
                }
            }
            for (offset, text) in sequence.modifiers()? {
                if activities.contains(text) {
                    offsets.insert(offset);
                }
            }
        }
        Ok(offsets)
    }
}

/// Invalidate activity-modifier strings in place by overwriting their first
/// byte with `X`.
///
/// The repatch guard makes a second pass over the same file fatal instead of
/// silently re-writing it.
pub fn mung_activity_strings<S: Read + Write + Seek>(
    stream: &mut S,
    offsets: &BTreeSet<u64>,
) -> Result<()> {
    for &offset in offsets {
        patch_field(stream, offset, b"X")?;
    }
    Ok(())
}

/// One local sequence of a decoded model.
#[derive(Debug, Clone, Copy)]
pub struct Sequence<'a> {
    doc: &'a Document,
}

impl<'a> Sequence<'a> {
    /// The underlying record.
    pub fn document(&self) -> &'a Document {
        self.doc
    }

    /// The sequence label, if present.
    pub fn label(&self) -> Result<Option<&'a str>> {
        Ok(self.doc.string_ref("labelindex")?.1)
    }

    /// The activity name, if present.
    pub fn activity_name(&self) -> Result<Option<&'a str>> {
        Ok(self.doc.string_ref("activitynameindex")?.1)
    }

    /// Activity modifiers as `(string offset, text)` pairs.
    pub fn modifiers(&self) -> Result<Vec<(u64, &'a str)>> {
        let mut out = Vec::new();
        for modifier in self.doc.array("activitymodifier")? {
            if let (Some(offset), Some(text)) = modifier.string_ref("szindex")? {
                out.push((offset, text));
            }
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::OpenOptions;

    fn put_u32(buf: &mut [u8], at: usize, v: u32) {
        buf[at..at + 4].copy_from_slice(&v.to_le_bytes());
    }

    fn put_i32(buf: &mut [u8], at: usize, v: i32) {
        buf[at..at + 4].copy_from_slice(&v.to_le_bytes());
    }

    fn put_u16(buf: &mut [u8], at: usize, v: u16) {
        buf[at..at + 2].copy_from_slice(&v.to_le_bytes());
    }

    fn put_str(buf: &mut [u8], at: usize, s: &str) {
        buf[at..at + s.len()].copy_from_slice(s.as_bytes());
        buf[at + s.len()] = 0;
    }

    /// A minimal model: one sequence with one activity modifier, two skin
    /// families of two references each.
    fn sample_model() -> Vec<u8> {
        let mut buf = vec![0u8; 512];
        buf[..4].copy_from_slice(b"IDST");
        put_u32(&mut buf, 4, 48); // version
        put_str(&mut buf, 12, "hero.mdl");

        put_u32(&mut buf, 188, 1); // numlocalsequence
        put_u32(&mut buf, 192, 260); // localsequenceoffset
        put_u32(&mut buf, 220, 2); // numskinref
        put_u32(&mut buf, 224, 2); // numskinfamilies
        put_u32(&mut buf, 228, 504); // skinindex

        // sequence record at 260
        put_i32(&mut buf, 260, -260); // baseptr
        put_i32(&mut buf, 264, 212); // labelindex -> 472
        put_i32(&mut buf, 268, 217); // activitynameindex -> 477
        put_i32(&mut buf, 444, 232); // activitymodifierindex -> 492
        put_u32(&mut buf, 448, 1); // numactivitymodifiers
        put_str(&mut buf, 472, "idle");
        put_str(&mut buf, 477, "ACT_DOTA_IDLE");

        // activity modifier record at 492
        put_i32(&mut buf, 492, 4); // szindex -> 496
        put_str(&mut buf, 496, "haircut");

        // skin table at 504
        put_u16(&mut buf, 504, 1);
        put_u16(&mut buf, 506, 2);
        put_u16(&mut buf, 508, 3);
        put_u16(&mut buf, 510, 4);
        buf
    }

    #[test]
    fn test_decode_sequences() {
        let mdl = Mdl::decode(&sample_model()).unwrap();
        assert_eq!(mdl.name().unwrap(), "hero.mdl");

        let sequences = mdl.sequences().unwrap();
        assert_eq!(sequences.len(), 1);
        assert_eq!(sequences[0].label().unwrap(), Some("idle"));
        assert_eq!(sequences[0].activity_name().unwrap(), Some("ACT_DOTA_IDLE"));
        assert_eq!(sequences[0].modifiers().unwrap(), vec![(496, "haircut")]);
    }

    #[test]
    fn test_wrong_magic_is_fatal() {
        let mut buf = sample_model();
        buf[..4].copy_from_slice(b"IDSQ");
        assert!(matches!(
            Mdl::decode(&buf),
            Err(crate::Error::Binary(
                hatless_binary::Error::MagicMismatch { .. }
            ))
        ));
    }

    #[test]
    fn test_activity_string_offsets() {
        let mdl = Mdl::decode(&sample_model()).unwrap();
        let mut activities = HashSet::new();
        activities.insert("haircut".to_owned());

        let offsets = mdl.activity_string_offsets(&activities, &[]).unwrap();
        assert_eq!(offsets.into_iter().collect::<Vec<_>>(), vec![496]);

        let offsets = mdl
            .activity_string_offsets(&activities, &["ACT_DOTA_IDLE"])
            .unwrap();
        assert!(offsets.is_empty());
    }

    #[test]
    fn test_mung_and_repatch_guard() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hero.mdl");
        std::fs::write(&path, sample_model()).unwrap();

        let mdl = Mdl::decode(&std::fs::read(&path).unwrap()).unwrap();
        let mut activities = HashSet::new();
        activities.insert("haircut".to_owned());
        let offsets = mdl.activity_string_offsets(&activities, &[]).unwrap();

        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(&path)
            .unwrap();
        mung_activity_strings(&mut file, &offsets).unwrap();
        drop(file);

        let bytes = std::fs::read(&path).unwrap();
        assert_eq!(bytes[496], b'X');
        assert_eq!(&bytes[497..504], b"aircut\0");

        // A second pass must trip the guard, not silently rewrite.
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(&path)
            .unwrap();
        assert!(matches!(
            mung_activity_strings(&mut file, &offsets),
            Err(crate::Error::Binary(
                hatless_binary::Error::RepatchGuardViolation { .. }
            ))
        ));
    }

    #[test]
    fn test_flatten_and_patch_skin_table() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("courier.mdl");
        std::fs::write(&path, sample_model()).unwrap();

        let mut mdl = Mdl::decode(&std::fs::read(&path).unwrap()).unwrap();
        assert_eq!(mdl.num_skin_families().unwrap(), 2);
        assert_eq!(mdl.skin_families().unwrap(), vec![vec![1, 2], vec![3, 4]]);

        assert!(mdl.flatten_skin_families().unwrap());
        assert_eq!(mdl.skin_families().unwrap(), vec![vec![1, 2], vec![1, 2]]);
        // Flattening again is a no-op.
        assert!(!mdl.flatten_skin_families().unwrap());

        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(&path)
            .unwrap();
        mdl.patch_skin_table(&mut file).unwrap();
        drop(file);

        let bytes = std::fs::read(&path).unwrap();
        assert_eq!(&bytes[504..512], &[1, 0, 2, 0, 1, 0, 2, 0]);

        // The table on disk now matches: repatching is fatal.
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(&path)
            .unwrap();
        assert!(matches!(
            mdl.patch_skin_table(&mut file),
            Err(crate::Error::Binary(
                hatless_binary::Error::RepatchGuardViolation { .. }
            ))
        ));
    }

    #[test]
    fn test_model_round_trip() {
        let mut mdl = Mdl::decode(&sample_model()).unwrap();
        let encoded = mdl.document_mut().encode_to_vec().unwrap();
        let again = Mdl::decode(&encoded).unwrap();
        assert_eq!(again, mdl);
        assert_eq!(again.sequences().unwrap()[0].label().unwrap(), Some("idle"));
        assert_eq!(again.skin_families().unwrap(), vec![vec![1, 2], vec![3, 4]]);
    }
}
