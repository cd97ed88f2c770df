use crate::types::uint16;
use crate::DeserializationError;
use crate::Deserialize;
use crate::Deserializer;
use crate::ReaderContext;

/// Represents an offset within a table to another subtable.
///
/// An offset starts life [`Offset16::Unresolved`], holding only the
/// displacement read from the font. Resolving it against the base of the
/// table which declared it decodes the subtable there. A displacement of zero
/// means there is no subtable at all (e.g. `Script.defaultLangSysOffset`),
/// which is not the same thing as an empty one.
#[derive(Clone, PartialEq)]
pub enum Offset16<T> {
    Absent,
    Unresolved(uint16),
    Resolved { offset: uint16, link: T },
}

impl<T> Offset16<T> {
    /// Read a displacement without following it.
    pub fn read(c: &mut ReaderContext<'_>) -> Result<Self, DeserializationError> {
        let off: uint16 = c.de()?;
        Ok(if off == 0 {
            Offset16::Absent
        } else {
            Offset16::Unresolved(off)
        })
    }

    /// Decode the subtable `base + displacement` using `f`.
    ///
    /// Absent and already-resolved offsets are returned unchanged.
    pub fn resolve_with<'a, F>(
        self,
        c: &mut ReaderContext<'a>,
        table: &'static str,
        base: usize,
        f: F,
    ) -> Result<Self, DeserializationError>
    where
        F: FnOnce(&mut ReaderContext<'a>) -> Result<T, DeserializationError>,
    {
        match self {
            Offset16::Unresolved(offset) => {
                let link = c.follow(table, base, offset, f)?;
                Ok(Offset16::Resolved { offset, link })
            }
            other => Ok(other),
        }
    }

    /// Returns the byte offset from the base of this subtable, if there is one.
    pub fn offset_value(&self) -> Option<uint16> {
        match self {
            Offset16::Absent => None,
            Offset16::Unresolved(offset) | Offset16::Resolved { offset, .. } => Some(*offset),
        }
    }

    /// The subtable referred to by this offset, if it has been resolved.
    pub fn link(&self) -> Option<&T> {
        match self {
            Offset16::Resolved { link, .. } => Some(link),
            _ => None,
        }
    }

    pub fn into_link(self) -> Option<T> {
        match self {
            Offset16::Resolved { link, .. } => Some(link),
            _ => None,
        }
    }

    pub fn is_absent(&self) -> bool {
        matches!(self, Offset16::Absent)
    }

    pub fn map<U, F: FnOnce(T) -> U>(self, f: F) -> Offset16<U> {
        match self {
            Offset16::Absent => Offset16::Absent,
            Offset16::Unresolved(offset) => Offset16::Unresolved(offset),
            Offset16::Resolved { offset, link } => Offset16::Resolved {
                offset,
                link: f(link),
            },
        }
    }
}

impl<T: Deserialize> Offset16<T> {
    /// Decode the subtable `base + displacement` as a `T`.
    pub fn resolve(
        self,
        c: &mut ReaderContext<'_>,
        base: usize,
    ) -> Result<Self, DeserializationError> {
        self.resolve_with(c, std::any::type_name::<T>(), base, T::from_bytes)
    }
}

/// Reading an `Offset16<T>` as a field resolves it immediately against the
/// table currently being decoded.
impl<T: Deserialize> Deserialize for Offset16<T> {
    fn from_bytes(c: &mut ReaderContext<'_>) -> Result<Self, DeserializationError> {
        let base = c.top_of_table();
        Offset16::read(c)?.resolve(c, base)
    }
}

impl<T: std::fmt::Debug> std::fmt::Debug for Offset16<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Offset16::Absent => f.write_str("<Null>"),
            Offset16::Unresolved(off) => write!(f, "<Obj@{:} unresolved>", off),
            Offset16::Resolved { offset, link } => write!(f, "<Obj@{:} {:?}>", offset, link),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[derive(Debug, Clone, PartialEq)]
    struct One {
        thing: uint16,
        off: Offset16<Two>,
        other: uint16,
    }

    #[derive(Debug, Clone, PartialEq)]
    struct Two {
        test1: uint16,
        deep: Offset16<Three>,
        test2: uint16,
    }

    #[derive(Debug, Clone, PartialEq)]
    struct Three {
        blah: uint16,
    }

    impl Deserialize for One {
        fn from_bytes(c: &mut ReaderContext<'_>) -> Result<Self, DeserializationError> {
            c.table("One", |c| {
                Ok(One {
                    thing: c.de()?,
                    off: c.de()?,
                    other: c.de()?,
                })
            })
        }
    }

    impl Deserialize for Two {
        fn from_bytes(c: &mut ReaderContext<'_>) -> Result<Self, DeserializationError> {
            c.table("Two", |c| {
                Ok(Two {
                    test1: c.de()?,
                    deep: c.de()?,
                    test2: c.de()?,
                })
            })
        }
    }

    impl Deserialize for Three {
        fn from_bytes(c: &mut ReaderContext<'_>) -> Result<Self, DeserializationError> {
            Ok(Three { blah: c.de()? })
        }
    }

    #[test]
    fn test_de_off16() {
        let bytes = vec![
            0x00, 0x01, // thing
            0x00, 0x08, // off
            0x00, 0x02, // other
            0xff, 0xff, // filler
            0x00, 0x0a, // test1
            0x00, 0x06, // deep
            0x00, 0x0b, // test2
            0x00, 0xaa,
        ];
        let one: One = crate::de::from_bytes(&bytes).unwrap();
        assert_eq!(one.other, 0x02);
        assert_eq!(one.thing, 0x01);
        assert_eq!(one.off.link().unwrap().test1, 0x0a);
        assert_eq!(
            one.off,
            Offset16::Resolved {
                offset: 8,
                link: Two {
                    test1: 0x0a,
                    deep: Offset16::Resolved {
                        offset: 6,
                        link: Three { blah: 0xaa }
                    },
                    test2: 0x0b
                }
            }
        );
    }

    #[test]
    fn test_null_offset_is_absent() {
        let bytes = vec![
            0x00, 0x01, // thing
            0x00, 0x00, // off
            0x00, 0x02, // other
        ];
        let one: One = crate::de::from_bytes(&bytes).unwrap();
        assert!(one.off.is_absent());
        assert_eq!(one.off.offset_value(), None);
        assert_eq!(one.other, 0x02);
    }

    #[test]
    fn test_unresolved_until_asked() {
        let bytes = [0x00, 0x04, 0xff, 0xff, 0x00, 0xaa];
        let mut rc = ReaderContext::new(&bytes);
        let off: Offset16<Three> = Offset16::read(&mut rc).unwrap();
        assert_eq!(off, Offset16::Unresolved(4));
        assert_eq!(off.link(), None);
        let resolved = off.resolve(&mut rc, 0).unwrap();
        assert_eq!(resolved.offset_value(), Some(4));
        assert_eq!(resolved.into_link(), Some(Three { blah: 0xaa }));
        assert_eq!(rc.ptr, 2);
    }
}
