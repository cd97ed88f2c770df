//! Decoder for the structure shared by the OpenType `GSUB` and `GPOS` tables.
//!
//! [`parse`] reads a Layout table (scripts, language systems, features and
//! lookups) from a byte slice. What a lookup's subtables contain depends on
//! the table family, so the caller hands in a
//! [`LookupTypeRegistry`](layout::lookup::LookupTypeRegistry) mapping each
//! lookup type to a subtable decoder. [`layout::raw`] has registries which
//! keep only the outline of each subtable.
//!
//! ```
//! use otlayout::layout::raw::gsub_registry;
//!
//! let gsub = [
//!     0x00, 0x01, 0x00, 0x00, // version 1.0
//!     0x00, 0x00, 0x00, 0x00, 0x00, 0x00, // no script, feature or lookup lists
//! ];
//! let table = otlayout::parse(&gsub, 0, &gsub_registry()).unwrap();
//! assert_eq!(table.version.major_minor(), (1, 0));
//! assert!(table.script_list.is_none());
//! ```
#[macro_use]
extern crate shrinkwraprs;

/// OpenType Layout tables
pub mod layout;

pub use crate::layout::table::{parse, LayoutTable};
pub use otspec::{DeserializationError, OffsetProblem, Tag};
