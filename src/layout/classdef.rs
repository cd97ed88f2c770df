use crate::layout::common::records;
use crate::layout::coverage::validate_spans;
use lazy_static::lazy_static;
use otspec::schema::{context_array, glyph_id, record, uint16, Field, Record, Schema};
use otspec::types::*;
use otspec::{DeserializationError, Deserialize, ReaderContext};
use std::collections::{BTreeMap, BTreeSet};

pub fn class_range_record_schema() -> Schema {
    Schema::new("ClassRangeRecord")
        .field("StartGlyphID", glyph_id())
        .field("EndGlyphID", glyph_id())
        .field("Class", uint16())
}

pub fn classdef_schema() -> Schema {
    Schema::multi_format("ClassDef", "ClassFormat")
        .format(
            1,
            vec![
                Field::new("StartGlyphID", glyph_id()),
                Field::new("GlyphCount", uint16()),
                Field::new("ClassValueArray", context_array(uint16(), "GlyphCount")),
            ],
        )
        .format(
            2,
            vec![
                Field::new("ClassRangeCount", uint16()),
                Field::new(
                    "ClassRangeRecord",
                    context_array(record(class_range_record_schema()), "ClassRangeCount"),
                ),
            ],
        )
}

lazy_static! {
    static ref CLASSDEF: Schema = classdef_schema();
}

#[derive(Debug, PartialEq, Eq, Clone)]
/// A class definition table.
///
/// Class definitions, used to define glyph contexts in the GSUB and GPOS tables,
/// map a glyph ID to a glyph class integer.
pub struct ClassDef {
    /// The format the table was stored in.
    pub format: uint16,
    /// Glyphs with a nonzero class. Every other glyph is in class 0.
    pub classes: BTreeMap<GlyphID, uint16>,
}

impl ClassDef {
    /// The class of a glyph.
    pub fn get(&self, glyph: GlyphID) -> uint16 {
        self.classes.get(&glyph).copied().unwrap_or(0)
    }

    /// Get a set of glyph IDs corresponding to the given class
    pub fn get_glyphs(&self, class_id: uint16, max_glyph_id: GlyphID) -> BTreeSet<GlyphID> {
        if class_id == 0 {
            return (0..=max_glyph_id)
                .filter(|g| !self.classes.contains_key(g))
                .collect();
        }
        self.classes
            .iter()
            .filter(|(_, &v)| v == class_id)
            .map(|(&k, _)| k)
            .collect()
    }

    /// The highest class number used.
    pub fn max_class(&self) -> uint16 {
        self.classes.values().copied().max().unwrap_or(0)
    }
}

impl TryFrom<&Record> for ClassDef {
    type Error = DeserializationError;

    fn try_from(rec: &Record) -> Result<Self, Self::Error> {
        let format = rec.uint16("ClassFormat")?;
        let mut classes = BTreeMap::new();
        match format {
            1 => {
                let start = rec.glyph_id("StartGlyphID")?;
                let values = rec.uint16_array("ClassValueArray")?;
                if start as usize + values.len() > 0x10000 {
                    return Err(DeserializationError::MalformedRanges {
                        table: "ClassDef",
                        offset: rec.start(),
                        reason: format!(
                            "{} classes starting at glyph {} run past glyph 65535",
                            values.len(),
                            start
                        ),
                    });
                }
                for (ix, class) in values.into_iter().enumerate() {
                    if class != 0 {
                        classes.insert(start + ix as uint16, class);
                    }
                }
            }
            2 => {
                let ranges = records(rec, "ClassRangeRecord")?
                    .into_iter()
                    .map(|r| {
                        Ok((
                            r.glyph_id("StartGlyphID")?,
                            r.glyph_id("EndGlyphID")?,
                            r.uint16("Class")?,
                        ))
                    })
                    .collect::<Result<Vec<_>, DeserializationError>>()?;
                let spans: Vec<_> = ranges.iter().map(|&(s, e, _)| (s, e)).collect();
                validate_spans("ClassDef", rec.start(), &spans)?;
                for (start, end, class) in ranges {
                    if class != 0 {
                        classes.extend((start..=end).map(|g| (g, class)));
                    }
                }
            }
            _ => {
                return Err(DeserializationError::UnsupportedFormat {
                    table: "ClassDef",
                    field: "ClassFormat",
                    format,
                    offset: rec.start(),
                })
            }
        }
        Ok(ClassDef { format, classes })
    }
}

impl Deserialize for ClassDef {
    fn from_bytes(c: &mut ReaderContext<'_>) -> Result<Self, DeserializationError> {
        ClassDef::try_from(&CLASSDEF.decode(c)?)
    }
}
