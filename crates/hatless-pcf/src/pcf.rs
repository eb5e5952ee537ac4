//! The compiled particle container: string dictionary, element table,
//! attribute blocks.
//!
//! The file is fully sequential, no pointers, so decode and encode are a
//! single pass each. Layout after the magic line: a u16-counted dictionary of
//! null-terminated strings, a u32 element count, one header per element
//! (dictionary index of the type name, inline element name, 16-byte
//! signature), then one attribute block per element in the same order.

use hatless_binary::{CountingSink, Reader, Sink, VecSink};

use crate::attribute::{Attribute, AttributeValue};
use crate::{Error, Result};

/// The magic line at the start of every compiled particle file.
pub const MAGIC: &[u8] = b"<!-- dmx encoding binary 2 format pcf 1 -->\n\0";

/// Element type of the root element.
pub const ROOT_TYPE: &str = "DmElement";

/// Element type of a particle system definition.
pub const PARTICLE_SYSTEM_TYPE: &str = "DmeParticleSystemDefinition";

/// Name of the root attribute listing the file's particle systems.
pub const DEFINITIONS_ATTRIBUTE: &str = "particleSystemDefinitions";

/// One element of the file: a typed, named node with attributes.
#[derive(Debug, Clone, PartialEq)]
pub struct Element {
    /// Dictionary index of the element's type name.
    pub type_index: u16,
    pub name: String,
    /// Opaque 16-byte identity; preserved, never interpreted.
    pub signature: [u8; 16],
    pub attributes: Vec<Attribute>,
}

/// A name listed by the headers-only decode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElementName {
    pub type_name: String,
    pub name: String,
}

/// A decoded compiled particle file.
#[derive(Debug, Clone, PartialEq)]
pub struct Pcf {
    strings: Vec<String>,
    elements: Vec<Element>,
}

impl Pcf {
    /// Decode a particle file from raw bytes.
    pub fn decode(data: &[u8]) -> Result<Self> {
        let mut reader = Reader::new(data);
        let strings = decode_dictionary(&mut reader)?;
        let mut elements = decode_headers(&mut reader, strings.len())?;

        for element in &mut elements {
            let count = reader.read_u32()? as usize;
            let mut attributes = Vec::with_capacity(count.min(4096));
            for _ in 0..count {
                let name_index = reader.read_u16()?;
                check_string_index(name_index, strings.len())?;
                let code = reader.read_u8()?;
                let value = AttributeValue::decode(&mut reader, code)?;
                attributes.push(Attribute { name_index, value });
            }
            element.attributes = attributes;
        }

        Ok(Self { strings, elements })
    }

    /// Decode only the element headers, skipping every attribute block.
    ///
    /// Listing the systems in a file is by far the most common operation and
    /// the attribute blocks are the bulk of the bytes, so this stops reading
    /// as soon as the headers end.
    pub fn decode_names(data: &[u8]) -> Result<Vec<ElementName>> {
        let mut reader = Reader::new(data);
        let strings = decode_dictionary(&mut reader)?;
        let headers = decode_headers(&mut reader, strings.len())?;
        headers
            .into_iter()
            .map(|e| {
                Ok(ElementName {
                    type_name: strings[e.type_index as usize].clone(),
                    name: e.name,
                })
            })
            .collect()
    }

    /// Names of the particle system definitions in a file, headers-only.
    pub fn particle_system_names(data: &[u8]) -> Result<Vec<String>> {
        Ok(Self::decode_names(data)?
            .into_iter()
            .filter(|e| e.type_name == PARTICLE_SYSTEM_TYPE)
            .map(|e| e.name)
            .collect())
    }

    /// The string dictionary.
    pub fn strings(&self) -> &[String] {
        &self.strings
    }

    /// The element table.
    pub fn elements(&self) -> &[Element] {
        &self.elements
    }

    /// Mutable access to the element table.
    pub fn elements_mut(&mut self) -> &mut Vec<Element> {
        &mut self.elements
    }

    /// Look up a dictionary string.
    pub fn string(&self, index: u16) -> Result<&str> {
        check_string_index(index, self.strings.len())?;
        Ok(&self.strings[index as usize])
    }

    /// The type name of an element.
    pub fn type_name(&self, element: &Element) -> Result<&str> {
        self.string(element.type_index)
    }

    /// Dictionary index of `text`, adding it if absent.
    pub fn intern(&mut self, text: &str) -> Result<u16> {
        if let Some(found) = self.strings.iter().position(|s| s == text) {
            return Ok(found as u16);
        }
        // Reject at u16::MAX entries: one more push would make the u16
        // count field in encode wrap to 0.
        if self.strings.len() >= u16::MAX as usize {
            return Err(Error::StringTableFull);
        }
        let index = self.strings.len() as u16;
        self.strings.push(text.to_owned());
        Ok(index)
    }

    /// Element indices listed by the root's definitions attribute.
    ///
    /// Validates the root shape on the way: element 0 must be a `DmElement`
    /// carrying exactly one attribute, named `particleSystemDefinitions`, of
    /// element-array type.
    pub fn definition_indices(&self) -> Result<&[i32]> {
        let root = self
            .elements
            .first()
            .ok_or_else(|| Error::MalformedRoot("file has no elements".to_owned()))?;
        if self.type_name(root)? != ROOT_TYPE {
            return Err(Error::MalformedRoot(format!(
                "element 0 has type '{}', expected '{ROOT_TYPE}'",
                self.type_name(root)?
            )));
        }
        let [attribute] = root.attributes.as_slice() else {
            return Err(Error::MalformedRoot(format!(
                "root has {} attributes, expected exactly 1",
                root.attributes.len()
            )));
        };
        if self.string(attribute.name_index)? != DEFINITIONS_ATTRIBUTE {
            return Err(Error::MalformedRoot(format!(
                "root attribute is '{}', expected '{DEFINITIONS_ATTRIBUTE}'",
                self.string(attribute.name_index)?
            )));
        }
        match &attribute.value {
            AttributeValue::ElementArray(indices) => Ok(indices),
            _ => Err(Error::MalformedRoot(
                "definitions attribute is not an element array".to_owned(),
            )),
        }
    }

    /// Index of the particle system definition named `name`.
    ///
    /// Exactly one match is required; zero or several is an error.
    pub fn find_system(&self, name: &str) -> Result<usize> {
        let mut found = None;
        for (i, element) in self.elements.iter().enumerate() {
            if element.name == name && self.type_name(element)? == PARTICLE_SYSTEM_TYPE {
                if found.is_some() {
                    return Err(Error::DuplicateSystem(name.to_owned()));
                }
                found = Some(i);
            }
        }
        found.ok_or_else(|| Error::UnknownSystem(name.to_owned()))
    }

    /// Encode the file into a sink.
    pub fn encode<S: Sink>(&self, sink: &mut S) -> Result<()> {
        sink.write(MAGIC)?;
        sink.write(&(self.strings.len() as u16).to_le_bytes())?;
        for s in &self.strings {
            sink.write(s.as_bytes())?;
            sink.write(&[0])?;
        }
        sink.write(&(self.elements.len() as u32).to_le_bytes())?;
        for element in &self.elements {
            sink.write(&element.type_index.to_le_bytes())?;
            sink.write(element.name.as_bytes())?;
            sink.write(&[0])?;
            sink.write(&element.signature)?;
        }
        for element in &self.elements {
            sink.write(&(element.attributes.len() as u32).to_le_bytes())?;
            for attribute in &element.attributes {
                sink.write(&attribute.name_index.to_le_bytes())?;
                sink.write(&[attribute.value.type_code()])?;
                attribute.value.encode(sink)?;
            }
        }
        Ok(())
    }

    /// Encode into a fresh buffer.
    pub fn encode_to_vec(&self) -> Result<Vec<u8>> {
        let mut sink = VecSink::new();
        self.encode(&mut sink)?;
        Ok(sink.into_bytes())
    }

    /// Dry-run encode: the final size, with no bytes materialized.
    pub fn encoded_size(&self) -> Result<usize> {
        let mut sink = CountingSink::new();
        self.encode(&mut sink)?;
        Ok(sink.position())
    }
}

fn decode_dictionary(reader: &mut Reader<'_>) -> Result<Vec<String>> {
    let magic = reader.read_bytes(MAGIC.len())?;
    if magic != MAGIC {
        return Err(Error::Binary(hatless_binary::Error::MagicMismatch {
            expected: MAGIC.to_vec(),
            actual: magic.to_vec(),
        }));
    }
    let count = reader.read_u16()? as usize;
    let mut strings = Vec::with_capacity(count);
    for _ in 0..count {
        strings.push(reader.read_cstring()?.to_owned());
    }
    Ok(strings)
}

fn decode_headers(reader: &mut Reader<'_>, dictionary_len: usize) -> Result<Vec<Element>> {
    let count = reader.read_u32()? as usize;
    let mut elements = Vec::with_capacity(count.min(65536));
    for _ in 0..count {
        let type_index = reader.read_u16()?;
        check_string_index(type_index, dictionary_len)?;
        let name = reader.read_cstring()?.to_owned();
        let raw = reader.read_bytes(16)?;
        let mut signature = [0u8; 16];
        signature.copy_from_slice(raw);
        elements.push(Element {
            type_index,
            name,
            signature,
            attributes: Vec::new(),
        });
    }
    Ok(elements)
}

fn check_string_index(index: u16, count: usize) -> Result<()> {
    if (index as usize) < count {
        Ok(())
    } else {
        Err(Error::StringIndexOutOfBounds { index, count })
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// A file with a root, two particle systems (the second referencing a
    /// child operator element) and one unreachable orphan.
    pub(crate) fn sample_pcf() -> Pcf {
        let mut pcf = Pcf {
            strings: Vec::new(),
            elements: Vec::new(),
        };
        let t_root = pcf.intern(ROOT_TYPE).unwrap();
        let t_system = pcf.intern(PARTICLE_SYSTEM_TYPE).unwrap();
        let t_operator = pcf.intern("DmeParticleOperator").unwrap();
        let a_defs = pcf.intern(DEFINITIONS_ATTRIBUTE).unwrap();
        let a_children = pcf.intern("operators").unwrap();
        let a_rate = pcf.intern("emission rate").unwrap();

        pcf.elements.push(Element {
            type_index: t_root,
            name: "untitled".to_owned(),
            signature: [0xAA; 16],
            attributes: vec![Attribute {
                name_index: a_defs,
                value: AttributeValue::ElementArray(vec![1, 2]),
            }],
        });
        pcf.elements.push(Element {
            type_index: t_system,
            name: "rain_storm".to_owned(),
            signature: [0x01; 16],
            attributes: vec![Attribute {
                name_index: a_rate,
                value: AttributeValue::Float(120.0),
            }],
        });
        pcf.elements.push(Element {
            type_index: t_system,
            name: "rain_splash".to_owned(),
            signature: [0x02; 16],
            attributes: vec![Attribute {
                name_index: a_children,
                value: AttributeValue::ElementArray(vec![3, -1]),
            }],
        });
        pcf.elements.push(Element {
            type_index: t_operator,
            name: "emitter".to_owned(),
            signature: [0x03; 16],
            attributes: vec![Attribute {
                name_index: a_rate,
                value: AttributeValue::Float(12.5),
            }],
        });
        // Orphan: nothing references it.
        pcf.elements.push(Element {
            type_index: t_operator,
            name: "stale".to_owned(),
            signature: [0x04; 16],
            attributes: Vec::new(),
        });
        pcf
    }

    #[test]
    fn test_encode_decode_round_trip() {
        let pcf = sample_pcf();
        let bytes = pcf.encode_to_vec().unwrap();
        assert_eq!(pcf.encoded_size().unwrap(), bytes.len());

        let again = Pcf::decode(&bytes).unwrap();
        assert_eq!(again, pcf);

        // Re-encoding the decode is byte-identical.
        assert_eq!(again.encode_to_vec().unwrap(), bytes);
    }

    #[test]
    fn test_wrong_magic_is_fatal() {
        let mut bytes = sample_pcf().encode_to_vec().unwrap();
        bytes[5] = b'X';
        assert!(matches!(
            Pcf::decode(&bytes),
            Err(Error::Binary(
                hatless_binary::Error::MagicMismatch { .. }
            ))
        ));
    }

    #[test]
    fn test_decode_names_skips_attributes() {
        let full = sample_pcf().encode_to_vec().unwrap();
        let names = Pcf::decode_names(&full).unwrap();
        assert_eq!(names.len(), 5);
        assert_eq!(names[1].type_name, PARTICLE_SYSTEM_TYPE);
        assert_eq!(names[1].name, "rain_storm");

        assert_eq!(
            Pcf::particle_system_names(&full).unwrap(),
            vec!["rain_storm", "rain_splash"]
        );

        // Truncating the file right after the headers still works.
        let pcf = Pcf::decode(&full).unwrap();
        let mut header_len = MAGIC.len() + 2;
        for s in pcf.strings() {
            header_len += s.len() + 1;
        }
        header_len += 4;
        for e in pcf.elements() {
            header_len += 2 + e.name.len() + 1 + 16;
        }
        assert!(Pcf::decode_names(&full[..header_len]).is_ok());
    }

    #[test]
    fn test_definition_indices_validates_root() {
        let pcf = sample_pcf();
        assert_eq!(pcf.definition_indices().unwrap(), &[1, 2]);

        let mut wrong_type = pcf.clone();
        wrong_type.elements_mut()[0].type_index = 2;
        assert!(matches!(
            wrong_type.definition_indices(),
            Err(Error::MalformedRoot(_))
        ));

        let mut extra_attr = pcf.clone();
        let attr = extra_attr.elements()[0].attributes[0].clone();
        extra_attr.elements_mut()[0].attributes.push(attr);
        assert!(matches!(
            extra_attr.definition_indices(),
            Err(Error::MalformedRoot(_))
        ));
    }

    #[test]
    fn test_find_system() {
        let mut pcf = sample_pcf();
        assert_eq!(pcf.find_system("rain_splash").unwrap(), 2);
        assert!(matches!(
            pcf.find_system("rain_missing"),
            Err(Error::UnknownSystem(_))
        ));

        let dupe = pcf.elements()[1].clone();
        pcf.elements_mut().push(dupe);
        assert!(matches!(
            pcf.find_system("rain_storm"),
            Err(Error::DuplicateSystem(_))
        ));
    }

    #[test]
    fn test_intern_rejects_full_dictionary() {
        let mut pcf = Pcf {
            strings: (0..u16::MAX).map(|i| format!("s{i}")).collect(),
            elements: Vec::new(),
        };
        assert_eq!(pcf.strings().len(), u16::MAX as usize);

        // The count field is a u16; another entry would wrap it to 0.
        assert!(matches!(
            pcf.intern("one_too_many"),
            Err(Error::StringTableFull)
        ));
        assert_eq!(pcf.strings().len(), u16::MAX as usize);

        // Existing entries still resolve without growing the table.
        assert_eq!(pcf.intern("s42").unwrap(), 42);
        assert_eq!(pcf.strings().len(), u16::MAX as usize);
    }

    #[test]
    fn test_intern_reuses_existing() {
        let mut pcf = sample_pcf();
        let before = pcf.strings().len();
        let idx = pcf.intern(PARTICLE_SYSTEM_TYPE).unwrap();
        assert_eq!(idx, 1);
        assert_eq!(pcf.strings().len(), before);

        let fresh = pcf.intern("material").unwrap();
        assert_eq!(fresh as usize, before);
    }
}
