/// Tables for selecting features by script and language
pub mod common;
/// Glyph class definitions
pub mod classdef;
/// Coverage tables
pub mod coverage;
/// Lookups and the lookup list
pub mod lookup;
/// Opaque lookup subtables and the stock registries
pub mod raw;
/// The Layout table itself
pub mod table;
