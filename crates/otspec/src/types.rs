use crate::DeserializationError;
use crate::Deserialize;
use crate::Deserializer;
use crate::ReaderContext;

pub type uint16 = u16;
pub type uint32 = u32;
pub type int16 = i16;
pub type GlyphID = u16;

/// A 32-bit signed fixed-point number (16.16), as used for table versions.
///
/// The raw bits are kept so that versions such as `0x00010001` compare
/// exactly.
#[derive(Shrinkwrap, Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Fixed(pub i32);

impl Fixed {
    pub fn to_f32(self) -> f32 {
        self.0 as f32 / 65536.0
    }

    /// The value split into its integer and fractional halves, which is how
    /// table versions are usually quoted (`1.0` is `(1, 0)`).
    pub fn major_minor(self) -> (uint16, uint16) {
        let bits = self.0 as u32;
        ((bits >> 16) as uint16, (bits & 0xffff) as uint16)
    }
}

impl Deserialize for Fixed {
    fn from_bytes(c: &mut ReaderContext<'_>) -> Result<Self, DeserializationError> {
        let packed: i32 = c.de()?;
        Ok(Fixed(packed))
    }
}

impl From<i32> for Fixed {
    fn from(bits: i32) -> Self {
        Self(bits)
    }
}

impl From<Fixed> for f32 {
    fn from(num: Fixed) -> Self {
        num.to_f32()
    }
}

impl std::fmt::Display for Fixed {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let (major, minor) = self.major_minor();
        write!(f, "{}.{:04x}", major, minor)
    }
}
