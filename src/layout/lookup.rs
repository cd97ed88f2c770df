use crate::layout::common::follow_required;
use bitflags::bitflags;
use lazy_static::lazy_static;
use otspec::packed::PackedLayout;
use otspec::schema::{context_array, offset, packed, uint16, when, Schema};
use otspec::types::*;
use otspec::{DeserializationError, ReaderContext};
use std::collections::BTreeMap;
use std::fmt::Debug;

bitflags! {
    /// Lookup qualifiers
    pub struct LookupFlags: u16 {
        /// Position the last glyph of a cursive positioning sequence on the baseline
        const RIGHT_TO_LEFT = 0x0001;
        /// Skip over base glyphs
        const IGNORE_BASE_GLYPHS = 0x0002;
        /// Skip over ligatures
        const IGNORE_LIGATURES = 0x0004;
        /// Skip over all combining marks
        const IGNORE_MARKS = 0x0008;
        /// Indicates that the lookup table structure is followed by a MarkFilteringSet field
        const USE_MARK_FILTERING_SET = 0x0010;
        /// Mask off the high bits to reveal a mark class defined in the GDEF table
        const MARK_ATTACHMENT_TYPE_MASK = 0xFF00;
    }
}

impl Default for LookupFlags {
    fn default() -> Self {
        LookupFlags::empty()
    }
}

impl LookupFlags {
    /// The mark attachment class in the high byte. Zero means marks are
    /// not filtered by class.
    pub fn mark_attachment_type(self) -> u8 {
        ((self & LookupFlags::MARK_ATTACHMENT_TYPE_MASK).bits() >> 8) as u8
    }

    /// The sub-fields of the packed `lookupFlag` word.
    pub fn layout() -> PackedLayout {
        PackedLayout::new("LookupFlag")
            .flag("RightToLeft", LookupFlags::RIGHT_TO_LEFT.bits())
            .flag("IgnoreBaseGlyphs", LookupFlags::IGNORE_BASE_GLYPHS.bits())
            .flag("IgnoreLigatures", LookupFlags::IGNORE_LIGATURES.bits())
            .flag("IgnoreMarks", LookupFlags::IGNORE_MARKS.bits())
            .flag(
                "UseMarkFilteringSet",
                LookupFlags::USE_MARK_FILTERING_SET.bits(),
            )
            .number(
                "MarkAttachmentType",
                LookupFlags::MARK_ATTACHMENT_TYPE_MASK.bits(),
            )
    }
}

/// The mark filtering set is only present when the flag asks for it.
pub fn lookup_schema() -> Schema {
    Schema::new("Lookup")
        .field("LookupType", uint16())
        .field("LookupFlag", packed(LookupFlags::layout()))
        .field("SubTableCount", uint16())
        .field("SubtableOffsets", context_array(offset(), "SubTableCount"))
        .field(
            "MarkFilteringSet",
            when("LookupFlag", "UseMarkFilteringSet", uint16()),
        )
}

pub fn lookup_list_schema() -> Schema {
    Schema::new("LookupList")
        .field("LookupCount", uint16())
        .field("Lookups", context_array(offset(), "LookupCount"))
}

lazy_static! {
    static ref LOOKUP: Schema = lookup_schema();
    static ref LOOKUP_LIST: Schema = lookup_list_schema();
}

/// Decodes one lookup subtable, starting at the current position.
///
/// The decoder runs inside a `Subtable` table frame, so offsets it reads
/// with [`otspec::offsets::Offset16`] are measured from the subtable's start.
pub type SubtableDecoder<S> = fn(&mut ReaderContext<'_>) -> Result<S, DeserializationError>;

/// Maps lookup types to the decoders for their subtables.
///
/// What a subtable contains depends on both the lookup type and the table
/// family (type 1 is a single substitution in `GSUB` but a single adjustment
/// in `GPOS`), so the registry is supplied by whoever parses the table.
pub struct LookupTypeRegistry<S> {
    decoders: BTreeMap<uint16, SubtableDecoder<S>>,
}

impl<S> LookupTypeRegistry<S> {
    pub fn new() -> Self {
        LookupTypeRegistry {
            decoders: BTreeMap::new(),
        }
    }

    pub fn register(mut self, lookup_type: uint16, decoder: SubtableDecoder<S>) -> Self {
        self.insert(lookup_type, decoder);
        self
    }

    /// Add a decoder, returning the one it replaces.
    pub fn insert(
        &mut self,
        lookup_type: uint16,
        decoder: SubtableDecoder<S>,
    ) -> Option<SubtableDecoder<S>> {
        self.decoders.insert(lookup_type, decoder)
    }

    pub fn get(&self, lookup_type: uint16) -> Option<SubtableDecoder<S>> {
        self.decoders.get(&lookup_type).copied()
    }

    pub fn lookup_types(&self) -> impl Iterator<Item = uint16> + '_ {
        self.decoders.keys().copied()
    }
}

impl<S> Default for LookupTypeRegistry<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S> Clone for LookupTypeRegistry<S> {
    fn clone(&self) -> Self {
        LookupTypeRegistry {
            decoders: self.decoders.clone(),
        }
    }
}

impl<S> Debug for LookupTypeRegistry<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_set().entries(self.decoders.keys()).finish()
    }
}

/// A lookup: a type, some flags, and subtables of that type.
#[derive(Debug, PartialEq, Clone)]
pub struct Lookup<S> {
    pub lookup_type: uint16,
    pub flags: LookupFlags,
    /// Index into the GDEF mark glyph sets, present only when the flags
    /// include `USE_MARK_FILTERING_SET`.
    pub mark_filtering_set: Option<uint16>,
    pub subtables: Vec<S>,
}

impl<S> Lookup<S> {
    /// Decode a lookup at the current position, handing each subtable to the
    /// decoder registered for its lookup type.
    pub fn from_bytes(
        c: &mut ReaderContext<'_>,
        registry: &LookupTypeRegistry<S>,
    ) -> Result<Self, DeserializationError> {
        c.table("Lookup", |c| {
            let rec = LOOKUP.decode(c)?;
            let base = rec.start();
            let lookup_type = rec.uint16("LookupType")?;
            let decoder =
                registry
                    .get(lookup_type)
                    .ok_or(DeserializationError::UnknownLookupType {
                        table: "Lookup",
                        field: "LookupType",
                        lookup_type,
                        offset: base,
                    })?;
            let bits = rec.packed("LookupFlag")?.bits();
            let flags = LookupFlags::from_bits_truncate(bits);
            if flags.bits() != bits {
                log::warn!(
                    "Lookup at {}: reserved flag bits {:#06x} set, ignoring them",
                    base,
                    bits & !flags.bits()
                );
            }
            let mark_filtering_set = rec.optional_uint16("MarkFilteringSet")?;
            c.set_field("SubtableOffsets");
            let mut subtables = vec![];
            for off in rec.uint16_array("SubtableOffsets")? {
                subtables.push(follow_required(c, "Subtable", base, off, |c| {
                    c.table("Subtable", decoder)
                })?);
            }
            Ok(Lookup {
                lookup_type,
                flags,
                mark_filtering_set,
                subtables,
            })
        })
    }
}

/// The lookup list, in the order feature tables index it.
#[derive(Debug, PartialEq, Clone)]
pub struct LookupList<S> {
    pub lookups: Vec<Lookup<S>>,
}

impl<S> Default for LookupList<S> {
    fn default() -> Self {
        LookupList { lookups: vec![] }
    }
}

impl<S> LookupList<S> {
    pub fn from_bytes(
        c: &mut ReaderContext<'_>,
        registry: &LookupTypeRegistry<S>,
    ) -> Result<Self, DeserializationError> {
        c.table("LookupList", |c| {
            let rec = LOOKUP_LIST.decode(c)?;
            let base = rec.start();
            let offsets = rec.uint16_array("Lookups")?;
            log::debug!("Lookup list at {} with {} lookups", base, offsets.len());
            c.set_field("Lookups");
            let mut lookups = Vec::with_capacity(offsets.len());
            for off in offsets {
                lookups.push(follow_required(c, "Lookup", base, off, |c| {
                    Lookup::from_bytes(c, registry)
                })?);
            }
            Ok(LookupList { lookups })
        })
    }

    pub fn get(&self, index: usize) -> Option<&Lookup<S>> {
        self.lookups.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Lookup<S>> {
        self.lookups.iter()
    }

    pub fn len(&self) -> usize {
        self.lookups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lookups.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::coverage::Coverage;
    use otspec::offsets::Offset16;
    use otspec::{Deserializer, OffsetProblem};
    use pretty_assertions::assert_eq;

    fn word(c: &mut ReaderContext<'_>) -> Result<u16, DeserializationError> {
        c.de()
    }

    fn registry() -> LookupTypeRegistry<u16> {
        LookupTypeRegistry::new().register(1, word).register(4, word)
    }

    #[test]
    fn test_mark_filtering_set_follows_flag() {
        for flags in 0..32_u16 {
            let mfs = flags & 0x0010 != 0;
            let mut data = vec![0x00, 0x01]; // lookupType
            data.extend(flags.to_be_bytes());
            data.extend([0x00, 0x01]); // subTableCount
            let subtable_at: u16 = if mfs { 10 } else { 8 };
            data.extend(subtable_at.to_be_bytes());
            if mfs {
                data.extend([0x00, 0x03]); // markFilteringSet
            }
            data.extend([0xbe, 0xef]);
            let mut rc = ReaderContext::new(&data);
            let lookup = Lookup::from_bytes(&mut rc, &registry()).unwrap();
            assert_eq!(lookup.mark_filtering_set.is_some(), mfs, "flags {:#x}", flags);
            if mfs {
                assert_eq!(lookup.mark_filtering_set, Some(3));
            }
            assert_eq!(lookup.flags.bits(), flags);
            assert_eq!(lookup.subtables, vec![0xbeef]);
            assert_eq!(rc.ptr, subtable_at as usize);
        }
    }

    #[test]
    fn test_flag_subfields() {
        let data = [0x00, 0x04, 0x03, 0x09, 0x00, 0x00];
        let lookup = Lookup::from_bytes(&mut ReaderContext::new(&data), &registry()).unwrap();
        assert_eq!(
            lookup.flags,
            LookupFlags::RIGHT_TO_LEFT | LookupFlags::IGNORE_MARKS | LookupFlags::from_bits_truncate(0x0300)
        );
        assert_eq!(lookup.flags.mark_attachment_type(), 3);
        assert_eq!(lookup.lookup_type, 4);
        assert!(lookup.subtables.is_empty());

        let packed = LookupFlags::layout()
            .decode(&mut ReaderContext::new(&[0x03, 0x09]))
            .unwrap();
        assert_eq!(packed.flag("RightToLeft"), Some(true));
        assert_eq!(packed.flag("IgnoreBaseGlyphs"), Some(false));
        assert_eq!(packed.flag("IgnoreMarks"), Some(true));
        assert_eq!(packed.number("MarkAttachmentType"), Some(3));
    }

    #[test]
    fn test_unknown_lookup_type() {
        let data = [0x00, 0x09, 0x00, 0x00, 0x00, 0x00];
        let mut rc = ReaderContext::at(&data, 0);
        assert_eq!(
            Lookup::from_bytes(&mut rc, &registry()).unwrap_err(),
            DeserializationError::UnknownLookupType {
                table: "Lookup",
                field: "LookupType",
                lookup_type: 9,
                offset: 0,
            }
        );
    }

    #[test]
    fn test_null_subtable() {
        let data = [0x00, 0x01, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00];
        assert_eq!(
            Lookup::from_bytes(&mut ReaderContext::new(&data), &registry()).unwrap_err(),
            DeserializationError::MalformedOffset {
                table: "Lookup",
                field: "SubtableOffsets",
                base: 0,
                displacement: 0,
                target: 0,
                problem: OffsetProblem::Null,
            }
        );
    }

    #[test]
    fn test_subtable_out_of_bounds() {
        let data = [0x00, 0x01, 0x00, 0x00, 0x00, 0x01, 0x00, 0x20];
        assert!(matches!(
            Lookup::from_bytes(&mut ReaderContext::new(&data), &registry()),
            Err(DeserializationError::MalformedOffset {
                target: 0x20,
                problem: OffsetProblem::OutOfBounds { len: 8 },
                ..
            })
        ));
    }

    #[test]
    fn test_lookup_list_shared_subtable() {
        let data = [
            0x00, 0x02, // lookupCount
            0x00, 0x06, 0x00, 0x0e, // lookupOffsets
            0x00, 0x01, 0x00, 0x00, 0x00, 0x01, 0x00, 0x10, // Lookup at 6 -> 22
            0x00, 0x04, 0x00, 0x08, 0x00, 0x01, 0x00, 0x08, // Lookup at 14 -> 22
            0x12, 0x34, // subtable at 22
        ];
        let list = LookupList::from_bytes(&mut ReaderContext::new(&data), &registry()).unwrap();
        assert_eq!(list.len(), 2);
        assert_eq!(list.get(0).unwrap().subtables, vec![0x1234]);
        let second = list.get(1).unwrap();
        assert_eq!(second.lookup_type, 4);
        assert_eq!(second.flags, LookupFlags::IGNORE_MARKS);
        assert_eq!(second.subtables, vec![0x1234]);
        assert!(list.get(2).is_none());
    }

    #[derive(Debug)]
    #[allow(dead_code)]
    struct Jump(Box<Lookup<Jump>>);

    // An extension-style subtable pointing at a lookup by absolute position.
    fn jump(c: &mut ReaderContext<'_>) -> Result<Jump, DeserializationError> {
        let target: u16 = c.de()?;
        let registry = LookupTypeRegistry::new().register(1, jump);
        c.follow("Lookup", 0, target, |c| Lookup::from_bytes(c, &registry))
            .map(|l| Jump(Box::new(l)))
    }

    #[test]
    fn test_looping_subtables_are_rejected() {
        let data = [
            0x00, 0x01, 0x00, 0x00, 0x00, 0x01, 0x00, 0x08, // Lookup -> 8
            0x00, 0x00, // jump back to the lookup
        ];
        let registry = LookupTypeRegistry::new().register(1, jump);
        let err = Lookup::from_bytes(&mut ReaderContext::new(&data), &registry).unwrap_err();
        assert!(matches!(
            err,
            DeserializationError::MalformedOffset {
                target: 8,
                problem: OffsetProblem::Cycle,
                ..
            }
        ));
    }

    // A single substitution whose coverage offset counts from the subtable.
    fn single(c: &mut ReaderContext<'_>) -> Result<(u16, Option<Coverage>), DeserializationError> {
        let format: u16 = c.de()?;
        let coverage: Offset16<Coverage> = c.de()?;
        Ok((format, coverage.into_link()))
    }

    #[test]
    fn test_subtable_offsets_are_relative_to_the_subtable() {
        let data = [
            0x00, 0x01, 0x00, 0x00, 0x00, 0x01, 0x00, 0x08, // Lookup -> 8
            0x00, 0x01, 0x00, 0x04, // subtable: format 1, coverage at +4
            0x00, 0x01, 0x00, 0x01, 0x00, 0x05, // coverage [5] at 12
        ];
        let registry = LookupTypeRegistry::new().register(1, single);
        let lookup = Lookup::from_bytes(&mut ReaderContext::new(&data), &registry).unwrap();
        assert_eq!(
            lookup.subtables,
            vec![(1, Some(Coverage::Glyphs(vec![5])))]
        );
    }

    #[test]
    fn test_registry() {
        let mut registry = registry();
        assert_eq!(registry.lookup_types().collect::<Vec<_>>(), vec![1, 4]);
        assert!(registry.get(2).is_none());
        assert!(registry.insert(4, word).is_some());
        assert_eq!(format!("{:?}", registry), "{1, 4}");
    }
}
