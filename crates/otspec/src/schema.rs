//! Declarative table layouts.
//!
//! A [`Schema`] is an ordered list of named fields, each with a
//! [`FieldDecoder`]. Decoding a schema produces a [`Record`] whose fields
//! appear in the order they were read. Later fields may refer to earlier ones
//! by name, for array counts and for conditional fields, and a schema built
//! with [`Schema::multi_format`] picks the rest of its layout from a leading
//! format number.
//!
//! Schemas are plain values, so a table which shares a tail of fields with
//! another is built by extending one list with the other:
//!
//! ```
//! use otspec::schema::*;
//!
//! let lang_sys = Schema::new("LangSys")
//!     .field("LookupOrder", offset())
//!     .field("ReqFeatureIndex", uint16())
//!     .field("FeatureCount", uint16())
//!     .field("FeatureIndex", context_array(uint16(), "FeatureCount"));
//! let script = Schema::new("Script")
//!     .field("DefaultLangSys", indirect(lang_sys.clone()))
//!     .extend(tag_offset_list(lang_sys));
//! assert_eq!(script.fields().len(), 3);
//! ```
use crate::offsets::Offset16;
use crate::packed::{Packed, PackedLayout};
use crate::types::{uint16, Fixed, GlyphID};
use crate::{DeserializationError, Deserializer, ReaderContext, Tag};
use std::collections::BTreeMap;

/// Fixed-width values which can be read straight off the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scalar {
    Uint16,
    Fixed,
    Tag,
    GlyphId,
    /// A displacement which is kept, not followed.
    Offset16,
    /// As `Offset16`, but zero is stored as [`Value::Absent`].
    OptionalOffset16,
}

impl Scalar {
    /// Width on the wire, in bytes.
    pub fn size(self) -> usize {
        match self {
            Scalar::Fixed | Scalar::Tag => 4,
            _ => 2,
        }
    }

    fn decode(self, c: &mut ReaderContext<'_>) -> Result<Value, DeserializationError> {
        Ok(match self {
            Scalar::Uint16 => Value::Uint16(c.de()?),
            Scalar::Fixed => Value::Fixed(c.de()?),
            Scalar::Tag => Value::Tag(c.de()?),
            Scalar::GlyphId => Value::GlyphId(c.de()?),
            Scalar::Offset16 => Value::Offset(c.de()?),
            Scalar::OptionalOffset16 => {
                let off: uint16 = c.de()?;
                if off == 0 {
                    Value::Absent
                } else {
                    Value::Offset(off)
                }
            }
        })
    }
}

/// How to read one field.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldDecoder {
    Scalar(Scalar),
    Packed(PackedLayout),
    /// `count` elements, where `count` names an earlier `uint16` field.
    ContextArray {
        element: Box<FieldDecoder>,
        count: &'static str,
    },
    /// A record stored inline. Offsets inside it are relative to the
    /// enclosing table.
    Record(Schema),
    /// A 16-bit offset, followed at once, to a table with its own base.
    Indirect(Schema),
    /// A tag followed by a 16-bit offset to a table, as found in tag lists.
    TagOffset(Schema),
    /// Read `decoder` only if the flag `flag` of the packed field `flags` is
    /// set; otherwise the field is [`Value::Absent`].
    When {
        flags: &'static str,
        flag: &'static str,
        decoder: Box<FieldDecoder>,
    },
}

impl FieldDecoder {
    /// The number of bytes this field occupies in its own record, if that
    /// does not depend on the data.
    pub fn fixed_size(&self) -> Option<usize> {
        match self {
            FieldDecoder::Scalar(s) => Some(s.size()),
            FieldDecoder::Packed(_) | FieldDecoder::Indirect(_) => Some(2),
            FieldDecoder::TagOffset(_) => Some(6),
            FieldDecoder::Record(schema) => schema.fixed_size(),
            FieldDecoder::ContextArray { .. } | FieldDecoder::When { .. } => None,
        }
    }
}

pub fn uint16() -> FieldDecoder {
    FieldDecoder::Scalar(Scalar::Uint16)
}

pub fn fixed() -> FieldDecoder {
    FieldDecoder::Scalar(Scalar::Fixed)
}

pub fn tag() -> FieldDecoder {
    FieldDecoder::Scalar(Scalar::Tag)
}

pub fn glyph_id() -> FieldDecoder {
    FieldDecoder::Scalar(Scalar::GlyphId)
}

pub fn offset() -> FieldDecoder {
    FieldDecoder::Scalar(Scalar::Offset16)
}

pub fn optional_offset() -> FieldDecoder {
    FieldDecoder::Scalar(Scalar::OptionalOffset16)
}

pub fn packed(layout: PackedLayout) -> FieldDecoder {
    FieldDecoder::Packed(layout)
}

pub fn context_array(element: FieldDecoder, count: &'static str) -> FieldDecoder {
    FieldDecoder::ContextArray {
        element: Box::new(element),
        count,
    }
}

pub fn record(schema: Schema) -> FieldDecoder {
    FieldDecoder::Record(schema)
}

pub fn indirect(schema: Schema) -> FieldDecoder {
    FieldDecoder::Indirect(schema)
}

pub fn tag_offset(schema: Schema) -> FieldDecoder {
    FieldDecoder::TagOffset(schema)
}

pub fn when(flags: &'static str, flag: &'static str, decoder: FieldDecoder) -> FieldDecoder {
    FieldDecoder::When {
        flags,
        flag,
        decoder: Box::new(decoder),
    }
}

/// The fields of a tag list: a count, then that many (tag, offset) records
/// each resolved to an `element` relative to the list's table.
pub fn tag_offset_list(element: Schema) -> Vec<Field> {
    vec![
        Field::new("Count", uint16()),
        Field::new("Record", context_array(tag_offset(element), "Count")),
    ]
}

#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    pub name: &'static str,
    pub decoder: FieldDecoder,
}

impl Field {
    pub fn new(name: &'static str, decoder: FieldDecoder) -> Self {
        Field { name, decoder }
    }
}

#[derive(Debug, Clone, PartialEq)]
struct Formats {
    discriminator: &'static str,
    variants: BTreeMap<uint16, Vec<Field>>,
}

/// The layout of one table or record.
#[derive(Debug, Clone, PartialEq)]
pub struct Schema {
    name: &'static str,
    fields: Vec<Field>,
    formats: Option<Formats>,
}

impl Schema {
    pub fn new(name: &'static str) -> Self {
        Schema {
            name,
            fields: vec![],
            formats: None,
        }
    }

    /// A table starting with a `uint16` format number, named `discriminator`,
    /// which selects one of the field lists added with [`Schema::format`].
    pub fn multi_format(name: &'static str, discriminator: &'static str) -> Self {
        let mut schema = Schema::new(name).field(discriminator, uint16());
        schema.formats = Some(Formats {
            discriminator,
            variants: BTreeMap::new(),
        });
        schema
    }

    pub fn field(mut self, name: &'static str, decoder: FieldDecoder) -> Self {
        self.fields.push(Field::new(name, decoder));
        self
    }

    /// Append a list of fields, e.g. a tail shared with other tables.
    pub fn extend(mut self, fields: impl IntoIterator<Item = Field>) -> Self {
        self.fields.extend(fields);
        self
    }

    /// Register the fields which follow the common ones when the format
    /// number is `format`. Only meaningful on a [`Schema::multi_format`]
    /// schema; on any other, decoding reports a `SchemaError`.
    pub fn format(mut self, format: uint16, fields: Vec<Field>) -> Self {
        self.formats
            .get_or_insert_with(|| Formats {
                discriminator: "",
                variants: BTreeMap::new(),
            })
            .variants
            .insert(format, fields);
        self
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// The fields common to every format.
    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    /// The extra fields read for `format`, if it is registered.
    pub fn format_fields(&self, format: uint16) -> Option<&[Field]> {
        self.formats
            .as_ref()
            .and_then(|f| f.variants.get(&format))
            .map(|v| v.as_slice())
    }

    /// The size of the record's own fields, if it does not depend on the
    /// data. Tables reached through offsets do not count.
    pub fn fixed_size(&self) -> Option<usize> {
        if self.formats.is_some() {
            return None;
        }
        self.fields.iter().map(|f| f.decoder.fixed_size()).sum()
    }

    /// Decode a table starting at the current position. Offsets within it are
    /// relative to that position.
    pub fn decode(&self, c: &mut ReaderContext<'_>) -> Result<Record, DeserializationError> {
        c.table(self.name, |c| self.decode_body(c))
    }

    /// Decode a record embedded in the table currently being read.
    pub fn decode_embedded(
        &self,
        c: &mut ReaderContext<'_>,
    ) -> Result<Record, DeserializationError> {
        c.embedded(self.name, |c| self.decode_body(c))
    }

    fn decode_body(&self, c: &mut ReaderContext<'_>) -> Result<Record, DeserializationError> {
        let mut record = Record {
            table: self.name,
            base: c.top_of_table(),
            start: c.ptr,
            end: c.ptr,
            fields: Vec::with_capacity(self.fields.len()),
        };
        decode_fields(&self.fields, c, &mut record)?;
        if let Some(formats) = &self.formats {
            let format = match record.get(formats.discriminator) {
                Some(Value::Uint16(format)) => *format,
                _ => {
                    return Err(schema_error(
                        self.name,
                        formats.discriminator,
                        formats.discriminator,
                    ))
                }
            };
            let variant = formats.variants.get(&format).ok_or(
                DeserializationError::UnsupportedFormat {
                    table: self.name,
                    field: formats.discriminator,
                    format,
                    offset: record.start,
                },
            )?;
            decode_fields(variant, c, &mut record)?;
        }
        record.end = c.ptr;
        Ok(record)
    }
}

fn schema_error(
    table: &'static str,
    field: &'static str,
    referenced: &'static str,
) -> DeserializationError {
    DeserializationError::SchemaError {
        table,
        field,
        referenced,
    }
}

fn decode_fields(
    fields: &[Field],
    c: &mut ReaderContext<'_>,
    record: &mut Record,
) -> Result<(), DeserializationError> {
    for field in fields {
        c.set_field(field.name);
        let value = decode_value(&field.decoder, field.name, c, record)?;
        record.fields.push((field.name, value));
    }
    Ok(())
}

fn decode_value(
    decoder: &FieldDecoder,
    name: &'static str,
    c: &mut ReaderContext<'_>,
    record: &Record,
) -> Result<Value, DeserializationError> {
    match decoder {
        FieldDecoder::Scalar(s) => s.decode(c),
        FieldDecoder::Packed(layout) => Ok(Value::Packed(layout.decode(c)?)),
        FieldDecoder::ContextArray { element, count } => {
            let n = match record.get(count) {
                Some(Value::Uint16(n)) => *n,
                _ => return Err(schema_error(record.table, name, *count)),
            };
            let mut items = Vec::with_capacity(n as usize);
            for _ in 0..n {
                items.push(decode_value(element, name, c, record)?);
            }
            Ok(Value::Array(items))
        }
        FieldDecoder::Record(schema) => Ok(Value::Record(schema.decode_embedded(c)?)),
        FieldDecoder::Indirect(schema) => {
            let base = c.top_of_table();
            let off = Offset16::read(c)?.resolve_with(c, schema.name, base, |c| schema.decode(c))?;
            Ok(Value::Indirect(off))
        }
        FieldDecoder::TagOffset(schema) => {
            let tag: Tag = c.de()?;
            let base = c.top_of_table();
            let off = Offset16::read(c)?.resolve_with(c, schema.name, base, |c| schema.decode(c))?;
            Ok(Value::TagOffset(tag, off))
        }
        FieldDecoder::When {
            flags,
            flag,
            decoder,
        } => {
            let set = match record.get(flags) {
                Some(Value::Packed(p)) => p.flag(flag),
                _ => None,
            }
            .ok_or_else(|| schema_error(record.table, name, *flags))?;
            if set {
                decode_value(decoder, name, c, record)
            } else {
                Ok(Value::Absent)
            }
        }
    }
}

/// A decoded field.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Uint16(uint16),
    Fixed(Fixed),
    Tag(Tag),
    GlyphId(GlyphID),
    Offset(uint16),
    Packed(Packed),
    Array(Vec<Value>),
    Record(Record),
    Indirect(Offset16<Record>),
    TagOffset(Tag, Offset16<Record>),
    /// An optional field which is not there.
    Absent,
}

impl Value {
    /// Any 16-bit number: plain integers, glyph ids and raw offsets.
    pub fn as_uint16(&self) -> Option<uint16> {
        match self {
            Value::Uint16(v) | Value::GlyphId(v) | Value::Offset(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_record(&self) -> Option<&Record> {
        match self {
            Value::Record(r) => Some(r),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Value::Array(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_tag_offset(&self) -> Option<(Tag, &Offset16<Record>)> {
        match self {
            Value::TagOffset(tag, off) => Some((*tag, off)),
            _ => None,
        }
    }

    pub fn is_absent(&self) -> bool {
        matches!(self, Value::Absent)
    }
}

/// The fields of one decoded table or record, in the order they were read.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    table: &'static str,
    base: usize,
    start: usize,
    end: usize,
    fields: Vec<(&'static str, Value)>,
}

impl Record {
    /// The name of the schema this record was decoded with.
    pub fn table(&self) -> &'static str {
        self.table
    }

    /// The absolute position offsets in this record are measured from. For a
    /// table that is where it starts; for an embedded record it is the start
    /// of the enclosing table.
    pub fn base(&self) -> usize {
        self.base
    }

    /// The absolute position of the first byte of this record.
    pub fn start(&self) -> usize {
        self.start
    }

    /// The number of bytes taken by this record's own fields.
    pub fn byte_len(&self) -> usize {
        self.end - self.start
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.iter().find(|(n, _)| *n == name).map(|(_, v)| v)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &Value)> {
        self.fields.iter().map(|(n, v)| (*n, v))
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.fields.iter().map(|(n, _)| *n).collect()
    }

    fn missing(&self, name: &'static str) -> DeserializationError {
        schema_error(self.table, name, name)
    }

    pub fn uint16(&self, name: &'static str) -> Result<uint16, DeserializationError> {
        match self.get(name) {
            Some(Value::Uint16(v)) => Ok(*v),
            _ => Err(self.missing(name)),
        }
    }

    pub fn glyph_id(&self, name: &'static str) -> Result<GlyphID, DeserializationError> {
        match self.get(name) {
            Some(Value::GlyphId(v)) => Ok(*v),
            _ => Err(self.missing(name)),
        }
    }

    pub fn fixed(&self, name: &'static str) -> Result<Fixed, DeserializationError> {
        match self.get(name) {
            Some(Value::Fixed(v)) => Ok(*v),
            _ => Err(self.missing(name)),
        }
    }

    pub fn tag(&self, name: &'static str) -> Result<Tag, DeserializationError> {
        match self.get(name) {
            Some(Value::Tag(v)) => Ok(*v),
            _ => Err(self.missing(name)),
        }
    }

    /// A raw, unfollowed displacement.
    pub fn offset(&self, name: &'static str) -> Result<uint16, DeserializationError> {
        match self.get(name) {
            Some(Value::Offset(v)) => Ok(*v),
            _ => Err(self.missing(name)),
        }
    }

    /// A displacement read with [`optional_offset`].
    pub fn optional_offset(
        &self,
        name: &'static str,
    ) -> Result<Option<uint16>, DeserializationError> {
        match self.get(name) {
            Some(Value::Offset(v)) => Ok(Some(*v)),
            Some(Value::Absent) => Ok(None),
            _ => Err(self.missing(name)),
        }
    }

    /// A conditional `uint16` field read with [`when`].
    pub fn optional_uint16(
        &self,
        name: &'static str,
    ) -> Result<Option<uint16>, DeserializationError> {
        match self.get(name) {
            Some(Value::Uint16(v)) => Ok(Some(*v)),
            Some(Value::Absent) => Ok(None),
            _ => Err(self.missing(name)),
        }
    }

    pub fn packed(&self, name: &'static str) -> Result<&Packed, DeserializationError> {
        match self.get(name) {
            Some(Value::Packed(v)) => Ok(v),
            _ => Err(self.missing(name)),
        }
    }

    pub fn array(&self, name: &'static str) -> Result<&[Value], DeserializationError> {
        match self.get(name) {
            Some(Value::Array(v)) => Ok(v),
            _ => Err(self.missing(name)),
        }
    }

    /// An array of 16-bit numbers (integers, glyph ids or raw offsets).
    pub fn uint16_array(&self, name: &'static str) -> Result<Vec<uint16>, DeserializationError> {
        self.array(name)?
            .iter()
            .map(|v| v.as_uint16().ok_or_else(|| self.missing(name)))
            .collect()
    }

    pub fn indirect(&self, name: &'static str) -> Result<&Offset16<Record>, DeserializationError> {
        match self.get(name) {
            Some(Value::Indirect(v)) => Ok(v),
            _ => Err(self.missing(name)),
        }
    }
}
