use otspec::schema::{
    context_array, indirect, offset, optional_offset, tag_offset_list, uint16, Record, Schema,
};
use otspec::types::uint16;
use lazy_static::lazy_static;
use otspec::{DeserializationError, Deserialize, OffsetProblem, ReaderContext, Tag};

/// Value of `requiredFeatureIndex` meaning there is no required feature.
pub const NO_REQUIRED_FEATURE: uint16 = 0xFFFF;

pub fn lang_sys_schema() -> Schema {
    Schema::new("LangSys")
        .field("LookupOrder", offset())
        .field("ReqFeatureIndex", uint16())
        .field("FeatureCount", uint16())
        .field("FeatureIndex", context_array(uint16(), "FeatureCount"))
}

/// A Script table is a tag list of language systems with a default language
/// system in front of it.
pub fn script_schema() -> Schema {
    Schema::new("Script")
        .field("DefaultLangSys", indirect(lang_sys_schema()))
        .extend(tag_offset_list(lang_sys_schema()))
}

pub fn script_list_schema() -> Schema {
    Schema::new("ScriptList").extend(tag_offset_list(script_schema()))
}

pub fn feature_schema() -> Schema {
    Schema::new("Feature")
        .field("FeatureParams", optional_offset())
        .field("LookupCount", uint16())
        .field("LookupListIndex", context_array(uint16(), "LookupCount"))
}

pub fn feature_list_schema() -> Schema {
    Schema::new("FeatureList").extend(tag_offset_list(feature_schema()))
}

lazy_static! {
    static ref LANG_SYS: Schema = lang_sys_schema();
    static ref SCRIPT: Schema = script_schema();
    static ref SCRIPT_LIST: Schema = script_list_schema();
    static ref FEATURE: Schema = feature_schema();
    static ref FEATURE_LIST: Schema = feature_list_schema();
}

/// The error for a zero offset in `field` where a table is required.
pub(crate) fn null_offset(rec: &Record, field: &'static str) -> DeserializationError {
    DeserializationError::MalformedOffset {
        table: rec.table(),
        field,
        base: rec.base(),
        displacement: 0,
        target: rec.base(),
        problem: OffsetProblem::Null,
    }
}

/// Follow an offset which must point somewhere.
pub(crate) fn follow_required<'a, T, F>(
    c: &mut ReaderContext<'a>,
    table: &'static str,
    base: usize,
    displacement: uint16,
    f: F,
) -> Result<T, DeserializationError>
where
    F: FnOnce(&mut ReaderContext<'a>) -> Result<T, DeserializationError>,
{
    if displacement == 0 {
        return Err(c.offset_error(base, displacement, OffsetProblem::Null));
    }
    c.follow(table, base, displacement, f)
}

/// The embedded records in the array field `name`.
pub(crate) fn records<'r>(
    rec: &'r Record,
    name: &'static str,
) -> Result<Vec<&'r Record>, DeserializationError> {
    rec.array(name)?
        .iter()
        .map(|v| {
            v.as_record().ok_or(DeserializationError::SchemaError {
                table: rec.table(),
                field: name,
                referenced: name,
            })
        })
        .collect()
}

/// An ordered list of tagged tables, as found in script, language system and
/// feature lists.
///
/// Tags are kept in the order they appear in the font. They are not required
/// to be unique; [`TagOffsetList::get`] returns the first match.
#[derive(Debug, PartialEq, Clone)]
pub struct TagOffsetList<T> {
    records: Vec<(Tag, T)>,
}

impl<T> Default for TagOffsetList<T> {
    fn default() -> Self {
        TagOffsetList { records: vec![] }
    }
}

impl<T> TagOffsetList<T> {
    /// Convert the resolved `Record` array of a tag list.
    pub(crate) fn from_record<F>(rec: &Record, convert: F) -> Result<Self, DeserializationError>
    where
        F: Fn(&Record) -> Result<T, DeserializationError>,
    {
        let mut records = vec![];
        for value in rec.array("Record")? {
            let (tag, off) = value
                .as_tag_offset()
                .ok_or_else(|| null_offset(rec, "Record"))?;
            let link = off.link().ok_or_else(|| null_offset(rec, "Record"))?;
            records.push((tag, convert(link)?));
        }
        Ok(TagOffsetList { records })
    }

    /// The first entry with the given tag.
    pub fn get<Q: ?Sized>(&self, tag: &Q) -> Option<&T>
    where
        Tag: PartialEq<Q>,
    {
        self.records.iter().find(|(t, _)| t == tag).map(|(_, v)| v)
    }

    /// Every entry with the given tag, in list order.
    pub fn get_all<'a, Q: ?Sized>(&'a self, tag: &'a Q) -> impl Iterator<Item = &'a T> + 'a
    where
        Tag: PartialEq<Q>,
    {
        self.records
            .iter()
            .filter(move |(t, _)| t == tag)
            .map(|(_, v)| v)
    }

    /// The entry at a position in the list. Feature indices refer to
    /// features this way.
    pub fn by_index(&self, index: usize) -> Option<(Tag, &T)> {
        self.records.get(index).map(|(t, v)| (*t, v))
    }

    pub fn iter(&self) -> impl Iterator<Item = (Tag, &T)> {
        self.records.iter().map(|(t, v)| (*t, v))
    }

    pub fn tags(&self) -> Vec<Tag> {
        self.records.iter().map(|(t, _)| *t).collect()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// A LangSys table, selecting which features should be applied in the
/// current script/language combination.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct LangSys {
    /// Reserved; should be null.
    pub lookup_order: uint16,
    /// Index of a feature which must always be processed, or
    /// [`NO_REQUIRED_FEATURE`].
    pub required_feature_index: uint16,
    /// Indices into the feature list.
    pub feature_indices: Vec<uint16>,
}

impl LangSys {
    pub fn required_feature(&self) -> Option<uint16> {
        if self.required_feature_index == NO_REQUIRED_FEATURE {
            None
        } else {
            Some(self.required_feature_index)
        }
    }
}

impl TryFrom<&Record> for LangSys {
    type Error = DeserializationError;

    fn try_from(rec: &Record) -> Result<Self, Self::Error> {
        let lookup_order = rec.offset("LookupOrder")?;
        if lookup_order != 0 {
            log::warn!(
                "LangSys at {}: reserved lookupOrder is {}, ignoring it",
                rec.start(),
                lookup_order
            );
        }
        Ok(LangSys {
            lookup_order,
            required_feature_index: rec.uint16("ReqFeatureIndex")?,
            feature_indices: rec.uint16_array("FeatureIndex")?,
        })
    }
}

impl Deserialize for LangSys {
    fn from_bytes(c: &mut ReaderContext<'_>) -> Result<Self, DeserializationError> {
        LangSys::try_from(&LANG_SYS.decode(c)?)
    }
}

/// A Script table, containing information about language systems for a
/// certain script.
#[derive(Debug, PartialEq, Clone, Default)]
pub struct Script {
    /// The language system used when no specific language is selected, if
    /// the font has one.
    pub default_lang_sys: Option<LangSys>,
    /// Language systems keyed by language tag.
    pub lang_systems: TagOffsetList<LangSys>,
}

impl Script {
    pub fn lang_sys<Q: ?Sized>(&self, tag: &Q) -> Option<&LangSys>
    where
        Tag: PartialEq<Q>,
    {
        self.lang_systems.get(tag)
    }

    /// The language system for `tag`, falling back to the default one.
    pub fn lang_sys_or_default<Q: ?Sized>(&self, tag: &Q) -> Option<&LangSys>
    where
        Tag: PartialEq<Q>,
    {
        self.lang_sys(tag).or(self.default_lang_sys.as_ref())
    }
}

impl TryFrom<&Record> for Script {
    type Error = DeserializationError;

    fn try_from(rec: &Record) -> Result<Self, Self::Error> {
        Ok(Script {
            default_lang_sys: rec
                .indirect("DefaultLangSys")?
                .link()
                .map(LangSys::try_from)
                .transpose()?,
            lang_systems: TagOffsetList::from_record(rec, |r| LangSys::try_from(r))?,
        })
    }
}

impl Deserialize for Script {
    fn from_bytes(c: &mut ReaderContext<'_>) -> Result<Self, DeserializationError> {
        Script::try_from(&SCRIPT.decode(c)?)
    }
}

/// A script list, mapping script tags to `Script` tables.
#[derive(Shrinkwrap, Debug, PartialEq, Clone, Default)]
pub struct ScriptList(pub TagOffsetList<Script>);

impl TryFrom<&Record> for ScriptList {
    type Error = DeserializationError;

    fn try_from(rec: &Record) -> Result<Self, Self::Error> {
        Ok(ScriptList(TagOffsetList::from_record(rec, |r| Script::try_from(r))?))
    }
}

impl Deserialize for ScriptList {
    fn from_bytes(c: &mut ReaderContext<'_>) -> Result<Self, DeserializationError> {
        ScriptList::try_from(&SCRIPT_LIST.decode(c)?)
    }
}

/// A Feature table: the lookups making up one feature.
#[derive(Debug, PartialEq, Eq, Clone, Default)]
pub struct Feature {
    /// Offset to the feature parameter block, which is left undecoded.
    pub feature_params: Option<uint16>,
    /// Indices into the lookup list, in application order.
    pub lookup_list_indices: Vec<uint16>,
}

impl TryFrom<&Record> for Feature {
    type Error = DeserializationError;

    fn try_from(rec: &Record) -> Result<Self, Self::Error> {
        Ok(Feature {
            feature_params: rec.optional_offset("FeatureParams")?,
            lookup_list_indices: rec.uint16_array("LookupListIndex")?,
        })
    }
}

impl Deserialize for Feature {
    fn from_bytes(c: &mut ReaderContext<'_>) -> Result<Self, DeserializationError> {
        Feature::try_from(&FEATURE.decode(c)?)
    }
}

/// A feature list, mapping feature tags to `Feature` tables.
#[derive(Shrinkwrap, Debug, PartialEq, Clone, Default)]
pub struct FeatureList(pub TagOffsetList<Feature>);

impl TryFrom<&Record> for FeatureList {
    type Error = DeserializationError;

    fn try_from(rec: &Record) -> Result<Self, Self::Error> {
        Ok(FeatureList(TagOffsetList::from_record(rec, |r| {
            Feature::try_from(r)
        })?))
    }
}

impl Deserialize for FeatureList {
    fn from_bytes(c: &mut ReaderContext<'_>) -> Result<Self, DeserializationError> {
        FeatureList::try_from(&FEATURE_LIST.decode(c)?)
    }
}
