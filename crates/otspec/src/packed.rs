//! Bit-packed flag words.
//!
//! A [`PackedLayout`] names the sub-fields of a 16-bit word by mask. Decoding
//! reads the word once; the sub-fields are computed from it on demand.
use crate::types::uint16;
use crate::{DeserializationError, Deserializer, ReaderContext};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubFieldKind {
    /// True if any bit under the mask is set.
    Flag,
    /// The masked bits, shifted down to bit zero.
    Number,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubField {
    pub name: &'static str,
    pub mask: uint16,
    pub kind: SubFieldKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubFieldValue {
    Flag(bool),
    Number(uint16),
}

impl SubField {
    fn extract(&self, bits: uint16) -> SubFieldValue {
        let masked = bits & self.mask;
        match self.kind {
            SubFieldKind::Flag => SubFieldValue::Flag(masked != 0),
            SubFieldKind::Number => SubFieldValue::Number(
                masked
                    .checked_shr(self.mask.trailing_zeros())
                    .unwrap_or(0),
            ),
        }
    }
}

/// The named sub-fields of a packed word.
///
/// The sub-field list is shared between a layout and every word decoded
/// with it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackedLayout {
    name: &'static str,
    fields: Arc<Vec<SubField>>,
}

impl PackedLayout {
    pub fn new(name: &'static str) -> Self {
        PackedLayout {
            name,
            fields: Arc::new(vec![]),
        }
    }

    pub fn flag(mut self, name: &'static str, mask: uint16) -> Self {
        Arc::make_mut(&mut self.fields).push(SubField {
            name,
            mask,
            kind: SubFieldKind::Flag,
        });
        self
    }

    pub fn number(mut self, name: &'static str, mask: uint16) -> Self {
        Arc::make_mut(&mut self.fields).push(SubField {
            name,
            mask,
            kind: SubFieldKind::Number,
        });
        self
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn fields(&self) -> &[SubField] {
        &self.fields
    }

    /// Read one word. Once the word is read nothing else can fail.
    pub fn decode(&self, c: &mut ReaderContext<'_>) -> Result<Packed, DeserializationError> {
        let bits: uint16 = c.de()?;
        Ok(Packed {
            bits,
            layout: self.clone(),
        })
    }
}

/// A decoded packed word.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packed {
    bits: uint16,
    layout: PackedLayout,
}

impl Packed {
    pub fn bits(&self) -> uint16 {
        self.bits
    }

    pub fn get(&self, name: &str) -> Option<SubFieldValue> {
        self.layout
            .fields
            .iter()
            .find(|f| f.name == name)
            .map(|f| f.extract(self.bits))
    }

    /// The value of a flag sub-field. `None` if the layout has no such flag.
    pub fn flag(&self, name: &str) -> Option<bool> {
        match self.get(name)? {
            SubFieldValue::Flag(b) => Some(b),
            SubFieldValue::Number(_) => None,
        }
    }

    /// The value of a numeric sub-field. `None` if the layout has no such field.
    pub fn number(&self, name: &str) -> Option<uint16> {
        match self.get(name)? {
            SubFieldValue::Number(n) => Some(n),
            SubFieldValue::Flag(_) => None,
        }
    }

    /// All sub-fields in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = (&'static str, SubFieldValue)> + '_ {
        self.layout
            .fields
            .iter()
            .map(move |f| (f.name, f.extract(self.bits)))
    }
}
