//! Field schemas for the compiled studio model container.
//!
//! The header is a fixed-layout record of counts and absolute offsets; the
//! local animation and local sequence tables hang off it. Within each table
//! record every index field is a displacement from the record's own start,
//! which the record captures as a zero-width offset marker and guards with a
//! self-relative pointer.
//!
//! The header is only mapped up to `localnodenameindex`: fields past that
//! point shift between compiler versions and nothing here needs them.

use hatless_binary::{Count, Result, Schema};

/// The magic at the start of every compiled model.
pub const MAGIC: &[u8; 4] = b"IDST";

/// Schema for the file header and its animation/sequence tables.
///
/// The skin table is not part of this schema; its row layout depends on
/// `numskinref`, so [`crate::Mdl::decode`] appends it once the header has
/// been decoded.
pub fn mdl() -> Result<Schema> {
    let mut s = Schema::new();
    s.magic("magic", MAGIC);
    s.format("version", "I")?;
    s.format("checksum", "I")?;
    s.fixed_string("name", 64);
    s.format("datalength", "I")?;

    s.format("eyepos", "3f")?;
    s.format("illum", "3f")?;
    s.format("hull_min", "3f")?;
    s.format("hull_max", "3f")?;
    s.format("view_bbmin", "3f")?;
    s.format("view_bbmax", "3f")?;

    s.format("flags", "I")?;

    s.format("bone", "II")?;
    s.format("bonecontroller", "II")?;
    s.format("hitbox", "II")?;

    s.format("numlocalanim", "I")?;
    s.format("localanimoffset", "I")?;
    s.format("numlocalsequence", "I")?;
    s.format("localsequenceoffset", "I")?;

    s.format("texture", "II")?;
    s.format("cdtexture", "II")?;
    s.format("unknown", "II")?;

    s.format("numskinref", "I")?;
    s.format("numskinfamilies", "I")?;
    s.format("skinindex", "I")?;

    s.format("bodypart", "II")?;
    s.format("localattachment", "II")?;

    s.format("numlocalnodes", "I")?;
    s.format("localnodeindex", "I")?;
    s.format("localnodenameindex", "I")?;

    s.array(
        "localanim",
        Count::Field("numlocalanim"),
        "localanimoffset",
        local_anim()?,
    );
    s.array(
        "localsequence",
        Count::Field("numlocalsequence"),
        "localsequenceoffset",
        local_sequence()?,
    );
    Ok(s)
}

/// Schema for one local animation descriptor.
pub fn local_anim() -> Result<Schema> {
    let mut s = Schema::new();
    s.offset("base");
    s.base_pointer("baseptr");
    s.relative_string("nameindex", "base");
    s.format("fps", "f")?;
    s.format("flags", "I")?;
    s.format("numframes", "I")?;
    s.format("nummovements", "I")?;
    s.relative("movementindex", "base");
    s.format("unused", "6I")?;
    s.format("animblock", "i")?;
    s.relative("animindex", "base");
    s.format("numikrules", "I")?;
    s.relative("ikruleindex", "base");
    s.relative("animblockikruleindex", "base");
    s.format("numlocalhierarchy", "I")?;
    s.relative("localhierarchyindex", "base");
    s.relative("sectionindex", "base");
    s.format("sectionframes", "I")?;
    s.format("zeroframespan", "h")?;
    s.format("zeroframecount", "h")?;
    s.relative("zeroframeindex", "base");
    s.format("zeroframestalltime", "f")?;
    Ok(s)
}

/// Schema for one local sequence descriptor, including its out-of-line
/// activity-modifier table.
pub fn local_sequence() -> Result<Schema> {
    let mut s = Schema::new();
    s.offset("base");
    s.base_pointer("baseptr");
    s.relative_string("labelindex", "base");
    s.relative_string("activitynameindex", "base");
    s.format("flags", "I")?;
    s.format("activity", "i")?;
    s.format("actweight", "I")?;
    s.format("numevents", "I")?;
    s.relative("eventindex", "base");
    s.format("bbmin", "3f")?;
    s.format("bbmax", "3f")?;
    s.format("numblends", "I")?;
    s.relative("animindex", "base");
    s.relative("movementindex", "base");
    s.format("groupsize", "2I")?;
    s.format("paramindex", "2i")?;
    s.format("paramstart", "2f")?;
    s.format("paramend", "2f")?;
    s.format("paremparent", "I")?;
    s.format("fadeintime", "f")?;
    s.format("fadeouttime", "f")?;
    s.format("localentrynode", "I")?;
    s.format("localexitnode", "I")?;
    s.format("nodeflags", "I")?;
    s.format("entryphase", "f")?;
    s.format("exitphase", "f")?;
    s.format("lastframe", "f")?;
    s.format("nextseg", "I")?;
    s.format("pose", "I")?;
    s.format("numikrules", "I")?;
    s.format("numautolayers", "I")?;
    s.relative("autolayerindex", "base");
    s.relative("weightlistindex", "base");
    s.relative("posekeyindex", "base");
    s.format("numiklocks", "I")?;
    s.format("iklockindex", "I")?;
    s.relative("keyvalueindex", "base");
    s.format("keyvaluesize", "I")?;
    s.relative("cycleposeindex", "base");
    s.relative("activitymodifierindex", "base");
    s.format("numactivitymodifiers", "I")?;
    s.format("unused", "5I")?;

    s.array(
        "activitymodifier",
        Count::Field("numactivitymodifiers"),
        "activitymodifierindex",
        activity_modifier(),
    );
    Ok(s)
}

/// Schema for one activity-modifier record: a single string reference.
pub fn activity_modifier() -> Schema {
    let mut s = Schema::new();
    s.offset("base");
    s.relative_string("szindex", "base");
    s
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_field_counts() {
        assert_eq!(mdl().unwrap().fields().len(), 32);
        assert_eq!(local_anim().unwrap().fields().len(), 22);
        // 42 fixed fields plus the modifier array.
        assert_eq!(local_sequence().unwrap().fields().len(), 43);
    }
}
