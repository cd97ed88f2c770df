use crate::layout::common::records;
use itertools::Itertools;
use lazy_static::lazy_static;
use otspec::schema::{context_array, glyph_id, record, uint16, Field, Record, Schema};
use otspec::types::*;
use otspec::{DeserializationError, Deserialize, ReaderContext};

pub fn range_record_schema() -> Schema {
    Schema::new("RangeRecord")
        .field("StartGlyphID", glyph_id())
        .field("EndGlyphID", glyph_id())
        .field("StartCoverageIndex", uint16())
}

pub fn coverage_schema() -> Schema {
    Schema::multi_format("Coverage", "CoverageFormat")
        .format(
            1,
            vec![
                Field::new("GlyphCount", uint16()),
                Field::new("GlyphArray", context_array(glyph_id(), "GlyphCount")),
            ],
        )
        .format(
            2,
            vec![
                Field::new("RangeCount", uint16()),
                Field::new(
                    "RangeRecord",
                    context_array(record(range_record_schema()), "RangeCount"),
                ),
            ],
        )
}

lazy_static! {
    static ref COVERAGE: Schema = coverage_schema();
}

/// A run of consecutive glyphs with consecutive coverage indices.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct RangeRecord {
    pub start_glyph_id: GlyphID,
    pub end_glyph_id: GlyphID,
    /// Coverage index of `start_glyph_id`.
    pub start_coverage_index: uint16,
}

impl RangeRecord {
    fn contains(&self, glyph: GlyphID) -> bool {
        (self.start_glyph_id..=self.end_glyph_id).contains(&glyph)
    }
}

#[derive(Debug, PartialEq, Eq, Clone)]
/// A coverage table.
///
/// OpenType lookups store information about which glyphs are affected by the
/// lookup, as a way to optimize the shaper's operation. Each covered glyph
/// also has a coverage index, used to find its data in the subtable.
pub enum Coverage {
    /// An explicit list of glyphs. A glyph's coverage index is its position
    /// in the list.
    Glyphs(Vec<GlyphID>),
    /// Ascending, non-overlapping glyph ranges.
    Ranges(Vec<RangeRecord>),
}

impl Default for Coverage {
    fn default() -> Self {
        Coverage::Glyphs(vec![])
    }
}

/// Check that glyph ranges are well-formed, ascending and disjoint.
pub(crate) fn validate_spans(
    table: &'static str,
    offset: usize,
    spans: &[(GlyphID, GlyphID)],
) -> Result<(), DeserializationError> {
    let malformed = |reason: String| DeserializationError::MalformedRanges {
        table,
        offset,
        reason,
    };
    if let Some((start, end)) = spans.iter().find(|(start, end)| start > end) {
        return Err(malformed(format!(
            "range {}..={} ends before it starts",
            start, end
        )));
    }
    for ((a_start, a_end), (b_start, b_end)) in spans.iter().tuple_windows() {
        if b_start <= a_end {
            return Err(malformed(format!(
                "range {}..={} overlaps or precedes range {}..={}",
                b_start, b_end, a_start, a_end
            )));
        }
    }
    Ok(())
}

fn validate_ranges(ranges: &[RangeRecord], offset: usize) -> Result<(), DeserializationError> {
    let spans: Vec<_> = ranges
        .iter()
        .map(|r| (r.start_glyph_id, r.end_glyph_id))
        .collect();
    validate_spans("Coverage", offset, &spans)?;
    if let Some(r) = ranges.iter().find(|r| {
        r.start_coverage_index as u32 + (r.end_glyph_id - r.start_glyph_id) as u32 > 0xFFFF
    }) {
        return Err(DeserializationError::MalformedRanges {
            table: "Coverage",
            offset,
            reason: format!(
                "range {}..={} starting at index {} runs past coverage index 65535",
                r.start_glyph_id, r.end_glyph_id, r.start_coverage_index
            ),
        });
    }
    Ok(())
}

impl TryFrom<&Record> for Coverage {
    type Error = DeserializationError;

    fn try_from(rec: &Record) -> Result<Self, Self::Error> {
        match rec.uint16("CoverageFormat")? {
            1 => Ok(Coverage::Glyphs(rec.uint16_array("GlyphArray")?)),
            2 => {
                let ranges = records(rec, "RangeRecord")?
                    .into_iter()
                    .map(|r| {
                        Ok(RangeRecord {
                            start_glyph_id: r.glyph_id("StartGlyphID")?,
                            end_glyph_id: r.glyph_id("EndGlyphID")?,
                            start_coverage_index: r.uint16("StartCoverageIndex")?,
                        })
                    })
                    .collect::<Result<Vec<_>, DeserializationError>>()?;
                validate_ranges(&ranges, rec.start())?;
                Ok(Coverage::Ranges(ranges))
            }
            format => Err(DeserializationError::UnsupportedFormat {
                table: "Coverage",
                field: "CoverageFormat",
                format,
                offset: rec.start(),
            }),
        }
    }
}

impl Deserialize for Coverage {
    fn from_bytes(c: &mut ReaderContext<'_>) -> Result<Self, DeserializationError> {
        Coverage::try_from(&COVERAGE.decode(c)?)
    }
}

impl Coverage {
    pub fn format(&self) -> uint16 {
        match self {
            Coverage::Glyphs(_) => 1,
            Coverage::Ranges(_) => 2,
        }
    }

    /// The coverage index of a glyph, or `None` if it is not covered.
    pub fn index_of(&self, glyph: GlyphID) -> Option<uint16> {
        match self {
            Coverage::Glyphs(glyphs) => glyphs
                .iter()
                .position(|&g| g == glyph)
                .map(|ix| ix as uint16),
            Coverage::Ranges(ranges) => {
                let ix = ranges
                    .binary_search_by(|r| {
                        if r.end_glyph_id < glyph {
                            std::cmp::Ordering::Less
                        } else if r.start_glyph_id > glyph {
                            std::cmp::Ordering::Greater
                        } else {
                            std::cmp::Ordering::Equal
                        }
                    })
                    .ok()?;
                let r = &ranges[ix];
                debug_assert!(r.contains(glyph));
                Some(r.start_coverage_index + (glyph - r.start_glyph_id))
            }
        }
    }

    pub fn contains(&self, glyph: GlyphID) -> bool {
        self.index_of(glyph).is_some()
    }

    /// Covered glyphs with their coverage indices, in table order.
    pub fn iter(&self) -> Box<dyn Iterator<Item = (GlyphID, uint16)> + '_> {
        match self {
            Coverage::Glyphs(glyphs) => Box::new(
                glyphs
                    .iter()
                    .enumerate()
                    .map(|(ix, &g)| (g, ix as uint16)),
            ),
            Coverage::Ranges(ranges) => Box::new(ranges.iter().flat_map(|r| {
                (r.start_glyph_id..=r.end_glyph_id)
                    .map(move |g| (g, r.start_coverage_index + (g - r.start_glyph_id)))
            })),
        }
    }

    /// The covered glyphs, in table order.
    pub fn glyphs(&self) -> Vec<GlyphID> {
        self.iter().map(|(g, _)| g).collect()
    }

    /// The number of glyph entries in the table.
    pub fn len(&self) -> usize {
        match self {
            Coverage::Glyphs(glyphs) => glyphs.len(),
            Coverage::Ranges(ranges) => ranges
                .iter()
                .map(|r| (r.end_glyph_id - r.start_glyph_id) as usize + 1)
                .sum(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use otspec::de::from_bytes;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_cov1_deser() {
        let binary_coverage = vec![
            0x00, 0x01, 0x00, 0x06, 0x00, 0x25, 0x00, 0x64, 0x00, 0xfc, 0x01, 0x53, 0x02, 0xda,
            0x03, 0x02,
        ];
        let deserialized: Coverage = from_bytes(&binary_coverage).unwrap();
        assert_eq!(
            deserialized,
            Coverage::Glyphs(vec![37, 100, 252, 339, 730, 770])
        );
        for (ix, g) in [37, 100, 252, 339, 730, 770].iter().enumerate() {
            assert_eq!(deserialized.index_of(*g), Some(ix as uint16));
        }
        assert!(!deserialized.contains(38));
        assert_eq!(deserialized.len(), 6);
    }

    #[test]
    fn test_cov1_keeps_given_order() {
        let binary_coverage = vec![0x00, 0x01, 0x00, 0x03, 0x00, 0x09, 0x00, 0x02, 0x00, 0x09];
        let deserialized: Coverage = from_bytes(&binary_coverage).unwrap();
        assert_eq!(deserialized.glyphs(), vec![9, 2, 9]);
        assert_eq!(deserialized.index_of(2), Some(1));
        // a repeated glyph keeps its first index
        assert_eq!(deserialized.index_of(9), Some(0));
    }

    #[test]
    fn test_cov2_deser() {
        let binary_coverage = vec![
            0x00, 0x02, 0x00, 0x02, 0x00, 0x05, 0x00, 0x08, 0x00, 0x00, 0x00, 0x0a, 0x00, 0x0e,
            0x00, 0x04,
        ];
        let deserialized: Coverage = from_bytes(&binary_coverage).unwrap();
        assert_eq!(deserialized.glyphs(), vec![5, 6, 7, 8, 10, 11, 12, 13, 14]);
        assert_eq!(deserialized.len(), 9);
        for (ix, g) in deserialized.glyphs().into_iter().enumerate() {
            assert_eq!(deserialized.index_of(g), Some(ix as uint16));
        }
        assert_eq!(deserialized.index_of(9), None);
        assert_eq!(deserialized.index_of(4), None);
        assert_eq!(deserialized.index_of(15), None);
    }

    #[test]
    fn test_cov2_start_index() {
        let binary_coverage = vec![
            0x00, 0x02, 0x00, 0x01, // format 2, one range
            0x00, 0x14, 0x00, 0x16, 0x00, 0x64, // 20..=22 from index 100
        ];
        let deserialized: Coverage = from_bytes(&binary_coverage).unwrap();
        let pairs: Vec<_> = deserialized.iter().collect();
        assert_eq!(pairs, vec![(20, 100), (21, 101), (22, 102)]);
    }

    #[test]
    fn test_cov2_rejects_bad_ranges() {
        let overlapping = vec![
            0x00, 0x02, 0x00, 0x02, // format 2, two ranges
            0x00, 0x05, 0x00, 0x08, 0x00, 0x00, // 5..=8
            0x00, 0x08, 0x00, 0x0a, 0x00, 0x04, // 8..=10
        ];
        let descending = vec![
            0x00, 0x02, 0x00, 0x02, // format 2, two ranges
            0x00, 0x0a, 0x00, 0x0b, 0x00, 0x00, // 10..=11
            0x00, 0x01, 0x00, 0x02, 0x00, 0x02, // 1..=2
        ];
        let backwards = vec![
            0x00, 0x02, 0x00, 0x01, // format 2, one range
            0x00, 0x08, 0x00, 0x05, 0x00, 0x00, // 8..=5
        ];
        let overflowing = vec![
            0x00, 0x02, 0x00, 0x01, // format 2, one range
            0x00, 0x00, 0x00, 0x02, 0xff, 0xff, // 0..=2 from index 65535
        ];
        for binary in [overlapping, descending, backwards, overflowing] {
            assert!(matches!(
                from_bytes::<Coverage>(&binary),
                Err(DeserializationError::MalformedRanges {
                    table: "Coverage",
                    offset: 0,
                    ..
                })
            ));
        }
    }

    #[test]
    fn test_unknown_format() {
        let binary_coverage = vec![0x00, 0x03, 0x00, 0x00];
        assert_eq!(
            from_bytes::<Coverage>(&binary_coverage).unwrap_err(),
            DeserializationError::UnsupportedFormat {
                table: "Coverage",
                field: "CoverageFormat",
                format: 3,
                offset: 0,
            }
        );
    }

    #[test]
    fn test_empty() {
        let deserialized: Coverage = from_bytes(&[0x00, 0x02, 0x00, 0x00]).unwrap();
        assert!(deserialized.is_empty());
        assert_eq!(deserialized.index_of(0), None);
    }
}
