//! Lookup subtables kept in outline.
//!
//! The decoders here read a subtable's format number and, where the format
//! puts one there, the coverage table that follows it. Everything else is
//! left in the font; [`RawSubtable::offset`] says where to find it.
use crate::layout::coverage::Coverage;
use crate::layout::lookup::LookupTypeRegistry;
use otspec::offsets::Offset16;
use otspec::types::*;
use otspec::{DeserializationError, Deserializer, ReaderContext};

/// The outline of one lookup subtable.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct RawSubtable {
    /// Absolute position of the subtable in the source.
    pub offset: usize,
    pub format: uint16,
    pub coverage: Option<Coverage>,
}

fn read(
    c: &mut ReaderContext<'_>,
    covered_formats: &[uint16],
) -> Result<RawSubtable, DeserializationError> {
    c.table("Subtable", |c| {
        let offset = c.ptr;
        c.set_field("Format");
        let format: uint16 = c.de()?;
        let coverage = if covered_formats.contains(&format) {
            c.set_field("Coverage");
            let coverage: Offset16<Coverage> = c.de()?;
            coverage.into_link()
        } else {
            None
        };
        Ok(RawSubtable {
            offset,
            format,
            coverage,
        })
    })
}

/// Subtables whose formats 1 and 2 both start with a coverage offset:
/// single substitution and adjustment, pair adjustment, and the two
/// contextual lookups.
pub fn formats_1_and_2(c: &mut ReaderContext<'_>) -> Result<RawSubtable, DeserializationError> {
    read(c, &[1, 2])
}

/// Subtables with a single format starting with a coverage offset.
pub fn format_1(c: &mut ReaderContext<'_>) -> Result<RawSubtable, DeserializationError> {
    read(c, &[1])
}

/// Extension subtables, which have no coverage of their own.
pub fn extension(c: &mut ReaderContext<'_>) -> Result<RawSubtable, DeserializationError> {
    read(c, &[])
}

/// Outline decoders for the `GSUB` lookup types 1 to 8.
pub fn gsub_registry() -> LookupTypeRegistry<RawSubtable> {
    LookupTypeRegistry::new()
        .register(1, formats_1_and_2) // single
        .register(2, format_1) // multiple
        .register(3, format_1) // alternate
        .register(4, format_1) // ligature
        .register(5, formats_1_and_2) // context
        .register(6, formats_1_and_2) // chained context
        .register(7, extension)
        .register(8, format_1) // reverse chained single
}

/// Outline decoders for the `GPOS` lookup types 1 to 9.
pub fn gpos_registry() -> LookupTypeRegistry<RawSubtable> {
    LookupTypeRegistry::new()
        .register(1, formats_1_and_2) // single adjustment
        .register(2, formats_1_and_2) // pair adjustment
        .register(3, format_1) // cursive
        .register(4, format_1) // mark to base
        .register(5, format_1) // mark to ligature
        .register(6, format_1) // mark to mark
        .register(7, formats_1_and_2) // context
        .register(8, formats_1_and_2) // chained context
        .register(9, extension)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_registries() {
        assert_eq!(
            gsub_registry().lookup_types().collect::<Vec<_>>(),
            (1..=8).collect::<Vec<uint16>>()
        );
        assert_eq!(
            gpos_registry().lookup_types().collect::<Vec<_>>(),
            (1..=9).collect::<Vec<uint16>>()
        );
    }

    #[test]
    fn test_single_subst_outline() {
        let data = [
            0xff, 0xff, // not ours
            0x00, 0x01, // format
            0x00, 0x06, // coverage, from the subtable
            0x00, 0x01, // deltaGlyphID
            0x00, 0x01, 0x00, 0x01, 0x00, 0x05, // coverage [5]
        ];
        let mut rc = ReaderContext::at(&data, 2);
        let subtable = formats_1_and_2(&mut rc).unwrap();
        assert_eq!(
            subtable,
            RawSubtable {
                offset: 2,
                format: 1,
                coverage: Some(Coverage::Glyphs(vec![5])),
            }
        );
    }

    #[test]
    fn test_context_format_3_has_no_coverage_field() {
        let data = [
            0x00, 0x03, // format
            0x00, 0x02, // glyphCount
            0x00, 0x00, // seqLookupCount
        ];
        let subtable = formats_1_and_2(&mut ReaderContext::new(&data)).unwrap();
        assert_eq!(subtable.format, 3);
        assert_eq!(subtable.coverage, None);
    }

    #[test]
    fn test_null_coverage() {
        let data = [0x00, 0x01, 0x00, 0x00];
        let subtable = format_1(&mut ReaderContext::new(&data)).unwrap();
        assert_eq!(subtable.coverage, None);
    }

    #[test]
    fn test_broken_coverage() {
        let data = [0x00, 0x01, 0x00, 0x04, 0x00, 0x07];
        assert_eq!(
            format_1(&mut ReaderContext::new(&data)).unwrap_err(),
            DeserializationError::UnsupportedFormat {
                table: "Coverage",
                field: "CoverageFormat",
                format: 7,
                offset: 4,
            }
        );
    }
}
