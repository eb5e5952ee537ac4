//! Graph surgery on particle files: pruning unreachable elements and
//! importing definitions across files.
//!
//! Elements form a directed graph rooted at element 0. Editing the root's
//! definitions list or swapping a system's attributes routinely strands
//! whole subtrees; [`minimize`] walks the graph from the root and drops
//! everything unreachable, keeping the survivors in their original order so
//! untouched files re-encode byte-identically.
//!
//! [`import_attributes`] copies a definition's attribute block from one file
//! into another. Element references in the copied attributes point into the
//! donor's element table, so every referenced donor element is recursively
//! imported into the host and the indices rewritten to the host's table; a
//! memo map keeps shared children shared and makes reference cycles
//! terminate.

use std::collections::HashMap;
use std::collections::VecDeque;

use crate::attribute::{Attribute, AttributeValue};
use crate::pcf::{Element, Pcf};
use crate::{Error, Result};

/// Drop every element unreachable from element 0 and renumber references.
///
/// Surviving elements keep their relative order. Negative references are
/// null and stay as they are. Returns whether anything was dropped.
pub fn minimize(pcf: &mut Pcf) -> Result<bool> {
    let count = pcf.elements().len();
    if count == 0 {
        return Ok(false);
    }

    let mut reachable = vec![false; count];
    reachable[0] = true;
    let mut queue = VecDeque::from([0usize]);
    while let Some(current) = queue.pop_front() {
        for attribute in &pcf.elements()[current].attributes {
            for &referenced in attribute.value.element_refs() {
                if referenced < 0 {
                    continue;
                }
                let index = referenced as usize;
                if index >= count {
                    return Err(Error::DanglingReference {
                        element: current,
                        referenced,
                        count,
                    });
                }
                if !reachable[index] {
                    reachable[index] = true;
                    queue.push_back(index);
                }
            }
        }
    }

    if reachable.iter().all(|&r| r) {
        return Ok(false);
    }

    let mut remap = vec![0i32; count];
    let mut next = 0i32;
    for (old, keep) in reachable.iter().enumerate() {
        if *keep {
            remap[old] = next;
            next += 1;
        }
    }

    let mut keep = reachable.iter().copied();
    pcf.elements_mut().retain(|_| keep.next().unwrap_or(false));
    for element in pcf.elements_mut() {
        for attribute in &mut element.attributes {
            for referenced in attribute.value.element_refs_mut() {
                if *referenced >= 0 {
                    *referenced = remap[*referenced as usize];
                }
            }
        }
    }
    Ok(true)
}

/// Strip every attribute from an element, leaving an inert shell.
pub fn clear_attributes(pcf: &mut Pcf, index: usize) {
    if let Some(element) = pcf.elements_mut().get_mut(index) {
        element.attributes.clear();
    }
}

/// Replace the attributes of the host system named `name` with those of the
/// donor's system of the same name.
pub fn replace_system_attributes(host: &mut Pcf, donor: &Pcf, name: &str) -> Result<()> {
    let host_index = host.find_system(name)?;
    let donor_index = donor.find_system(name)?;
    import_attributes(host, donor, host_index, donor_index)
}

/// Replace `host_index`'s attributes with a deep import of `donor_index`'s.
///
/// Referenced donor elements are appended to the host's element table with
/// their strings interned into the host dictionary; references are rewritten
/// to the new indices. The donor element itself maps to `host_index`, so a
/// self-referencing definition stays self-referencing.
pub fn import_attributes(
    host: &mut Pcf,
    donor: &Pcf,
    host_index: usize,
    donor_index: usize,
) -> Result<()> {
    let mut memo = HashMap::new();
    memo.insert(donor_index as i32, host_index as i32);
    let attributes = import_attribute_block(host, donor, donor_index, &mut memo)?;
    host.elements_mut()[host_index].attributes = attributes;
    Ok(())
}

fn import_element(
    host: &mut Pcf,
    donor: &Pcf,
    referenced: i32,
    memo: &mut HashMap<i32, i32>,
) -> Result<i32> {
    if referenced < 0 {
        return Ok(referenced);
    }
    if let Some(&mapped) = memo.get(&referenced) {
        return Ok(mapped);
    }
    let donor_element =
        donor
            .elements()
            .get(referenced as usize)
            .ok_or(Error::DanglingReference {
                element: referenced as usize,
                referenced,
                count: donor.elements().len(),
            })?;

    let type_index = host.intern(donor.type_name(donor_element)?)?;
    let host_index = host.elements().len() as i32;
    // Map before descending so cycles resolve to this index.
    memo.insert(referenced, host_index);
    host.elements_mut().push(Element {
        type_index,
        name: donor_element.name.clone(),
        signature: donor_element.signature,
        attributes: Vec::new(),
    });
    let attributes = import_attribute_block(host, donor, referenced as usize, memo)?;
    host.elements_mut()[host_index as usize].attributes = attributes;
    Ok(host_index)
}

fn import_attribute_block(
    host: &mut Pcf,
    donor: &Pcf,
    donor_index: usize,
    memo: &mut HashMap<i32, i32>,
) -> Result<Vec<Attribute>> {
    let source = donor.elements()[donor_index].attributes.clone();
    let mut imported = Vec::with_capacity(source.len());
    for attribute in &source {
        let name_index = host.intern(donor.string(attribute.name_index)?)?;
        let value = match &attribute.value {
            AttributeValue::Element(referenced) => {
                AttributeValue::Element(import_element(host, donor, *referenced, memo)?)
            }
            AttributeValue::ElementArray(referenced) => {
                let mut rewritten = Vec::with_capacity(referenced.len());
                for &r in referenced {
                    rewritten.push(import_element(host, donor, r, memo)?);
                }
                AttributeValue::ElementArray(rewritten)
            }
            other => other.clone(),
        };
        imported.push(Attribute { name_index, value });
    }
    Ok(imported)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pcf::tests::sample_pcf;

    #[test]
    fn test_minimize_drops_orphan_and_remaps() {
        let mut pcf = sample_pcf();
        assert_eq!(pcf.elements().len(), 5);

        assert!(minimize(&mut pcf).unwrap());
        assert_eq!(pcf.elements().len(), 4);
        assert!(pcf.elements().iter().all(|e| e.name != "stale"));

        // Indices before the orphan are untouched, the graph still decodes.
        assert_eq!(pcf.definition_indices().unwrap(), &[1, 2]);
        assert_eq!(
            pcf.elements()[2].attributes[0].value,
            AttributeValue::ElementArray(vec![3, -1])
        );

        // Second pass finds nothing to drop.
        assert!(!minimize(&mut pcf).unwrap());
    }

    #[test]
    fn test_minimize_after_dropping_a_definition() {
        let mut pcf = sample_pcf();
        // Remove rain_splash from the root list; its operator subtree
        // becomes garbage too.
        pcf.elements_mut()[0].attributes[0].value = AttributeValue::ElementArray(vec![1]);

        assert!(minimize(&mut pcf).unwrap());
        assert_eq!(pcf.elements().len(), 2);
        assert_eq!(pcf.elements()[1].name, "rain_storm");
        assert_eq!(pcf.definition_indices().unwrap(), &[1]);
    }

    #[test]
    fn test_minimize_rejects_dangling_reference() {
        let mut pcf = sample_pcf();
        pcf.elements_mut()[0].attributes[0].value = AttributeValue::ElementArray(vec![1, 99]);
        assert!(matches!(
            minimize(&mut pcf),
            Err(Error::DanglingReference {
                element: 0,
                referenced: 99,
                ..
            })
        ));
    }

    #[test]
    fn test_replace_system_attributes_imports_subtree() {
        let donor = sample_pcf();
        let mut host = sample_pcf();
        // The host's rain_splash lost its operators.
        clear_attributes(&mut host, 2);
        assert!(host.elements()[2].attributes.is_empty());

        replace_system_attributes(&mut host, &donor, "rain_splash").unwrap();

        // The operator child was appended and the reference rewritten.
        assert_eq!(host.elements().len(), 6);
        let imported = &host.elements()[5];
        assert_eq!(imported.name, "emitter");
        assert_eq!(
            host.elements()[2].attributes[0].value,
            AttributeValue::ElementArray(vec![5, -1])
        );
        assert_eq!(
            host.string(host.elements()[2].attributes[0].name_index)
                .unwrap(),
            "operators"
        );

        // Minimizing afterwards converges on a fully reachable file.
        minimize(&mut host).unwrap();
        assert!(!minimize(&mut host).unwrap());
    }

    #[test]
    fn test_import_interns_missing_strings() {
        let mut donor = sample_pcf();
        let lifetime = donor.intern("lifetime").unwrap();
        donor.elements_mut()[1].attributes.push(Attribute {
            name_index: lifetime,
            value: AttributeValue::Float(4.0),
        });

        let mut host = sample_pcf();
        let before = host.strings().len();
        assert!(!host.strings().contains(&"lifetime".to_owned()));

        replace_system_attributes(&mut host, &donor, "rain_storm").unwrap();
        assert_eq!(host.strings().len(), before + 1);
        let copied = &host.elements()[1].attributes;
        assert_eq!(copied.len(), 2);
        assert_eq!(host.string(copied[0].name_index).unwrap(), "emission rate");
        assert_eq!(host.string(copied[1].name_index).unwrap(), "lifetime");
        assert_eq!(copied[1].value, AttributeValue::Float(4.0));
    }

    #[test]
    fn test_import_handles_reference_cycles() {
        let mut donor = sample_pcf();
        // Make the emitter point back at its owning system.
        let cycle_name = donor.intern("owner").unwrap();
        donor.elements_mut()[3].attributes.push(Attribute {
            name_index: cycle_name,
            value: AttributeValue::Element(2),
        });

        let mut host = sample_pcf();
        clear_attributes(&mut host, 2);
        replace_system_attributes(&mut host, &donor, "rain_splash").unwrap();

        // The cycle resolves back to the host's own definition, not to a
        // second imported copy.
        let imported = &host.elements()[5];
        let back = imported
            .attributes
            .iter()
            .find(|a| host.string(a.name_index).unwrap() == "owner")
            .unwrap();
        assert_eq!(back.value, AttributeValue::Element(2));
        assert_eq!(host.elements().len(), 6);
    }

    #[test]
    fn test_clear_attributes_then_minimize_round_trip() {
        let mut pcf = sample_pcf();
        clear_attributes(&mut pcf, 2);
        minimize(&mut pcf).unwrap();

        let bytes = pcf.encode_to_vec().unwrap();
        let again = crate::Pcf::decode(&bytes).unwrap();
        assert_eq!(again, pcf);
    }
}
