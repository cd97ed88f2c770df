use crate::layout::common::{
    feature_list_schema, script_list_schema, Feature, FeatureList, LangSys, Script, ScriptList,
};
use crate::layout::lookup::{Lookup, LookupList, LookupTypeRegistry};
use lazy_static::lazy_static;
use otspec::schema::{fixed, indirect, offset, Schema};
use otspec::types::*;
use otspec::{DeserializationError, ReaderContext, Tag};

/// The header shared by `GSUB` and `GPOS`.
///
/// The lookup list is kept as a plain offset here because its subtables can
/// only be decoded with a lookup-type registry.
pub fn layout_schema() -> Schema {
    Schema::new("Layout")
        .field("Version", fixed())
        .field("ScriptList", indirect(script_list_schema()))
        .field("FeatureList", indirect(feature_list_schema()))
        .field("LookupList", offset())
}

lazy_static! {
    static ref LAYOUT: Schema = layout_schema();
}

/// A decoded `GSUB` or `GPOS` table.
///
/// `S` is whatever the registry passed to [`parse`] makes of a lookup
/// subtable.
#[derive(Debug, PartialEq, Clone)]
pub struct LayoutTable<S> {
    pub version: Fixed,
    /// `None` if the table has no script list.
    pub script_list: Option<ScriptList>,
    /// `None` if the table has no feature list.
    pub feature_list: Option<FeatureList>,
    /// `None` if the table has no lookup list.
    pub lookup_list: Option<LookupList<S>>,
}

/// Decode the Layout table starting at `offset` in `source`, using
/// `registry` to decode lookup subtables.
pub fn parse<S>(
    source: &[u8],
    offset: usize,
    registry: &LookupTypeRegistry<S>,
) -> Result<LayoutTable<S>, DeserializationError> {
    let mut c = ReaderContext::at(source, offset);
    LayoutTable::from_bytes(&mut c, registry)
}

impl<S> LayoutTable<S> {
    pub fn from_bytes(
        c: &mut ReaderContext<'_>,
        registry: &LookupTypeRegistry<S>,
    ) -> Result<Self, DeserializationError> {
        c.table("Layout", |c| {
            let rec = LAYOUT.decode(c)?;
            let version = rec.fixed("Version")?;
            log::debug!("Layout table version {} at {}", version, rec.start());
            let script_list = rec
                .indirect("ScriptList")?
                .link()
                .map(ScriptList::try_from)
                .transpose()?;
            let feature_list = rec
                .indirect("FeatureList")?
                .link()
                .map(FeatureList::try_from)
                .transpose()?;
            let lookup_list = match rec.offset("LookupList")? {
                0 => None,
                off => {
                    c.set_field("LookupList");
                    Some(c.follow("LookupList", rec.base(), off, |c| {
                        LookupList::from_bytes(c, registry)
                    })?)
                }
            };
            Ok(LayoutTable {
                version,
                script_list,
                feature_list,
                lookup_list,
            })
        })
    }

    /// The first script with the given tag.
    pub fn script<Q: ?Sized>(&self, tag: &Q) -> Option<&Script>
    where
        Tag: PartialEq<Q>,
    {
        self.script_list.as_ref()?.get(tag)
    }

    /// The first feature with the given tag.
    pub fn feature<Q: ?Sized>(&self, tag: &Q) -> Option<&Feature>
    where
        Tag: PartialEq<Q>,
    {
        self.feature_list.as_ref()?.get(tag)
    }

    pub fn lookup(&self, index: usize) -> Option<&Lookup<S>> {
        self.lookup_list.as_ref()?.get(index)
    }

    fn lang_sys(&self, script: Tag, language: Option<Tag>) -> Option<&LangSys> {
        let script = self.script(&script)?;
        match language {
            Some(language) => script.lang_sys_or_default(&language),
            None => script.default_lang_sys.as_ref(),
        }
    }

    /// The features which apply to a script and language, required
    /// feature first. Without a language, or for a language the script does
    /// not list, the script's default language system is used.
    pub fn features_for(&self, script: Tag, language: Option<Tag>) -> Vec<(Tag, &Feature)> {
        let (lang_sys, features) = match (self.lang_sys(script, language), &self.feature_list) {
            (Some(lang_sys), Some(features)) => (lang_sys, features),
            _ => return vec![],
        };
        lang_sys
            .required_feature()
            .into_iter()
            .chain(lang_sys.feature_indices.iter().copied())
            .filter_map(|ix| {
                let feature = features.by_index(ix as usize);
                if feature.is_none() {
                    log::warn!(
                        "{}/{}: feature index {} is out of range",
                        script,
                        language.unwrap_or(Tag::new(b"dflt")),
                        ix
                    );
                }
                feature
            })
            .collect()
    }

    /// The lookups of the first feature with the given tag, in the order the
    /// feature lists them.
    pub fn lookups_for_feature<Q: ?Sized>(&self, tag: &Q) -> Vec<&Lookup<S>>
    where
        Tag: PartialEq<Q>,
    {
        let feature = match self.feature(tag) {
            Some(feature) => feature,
            None => return vec![],
        };
        feature
            .lookup_list_indices
            .iter()
            .filter_map(|&ix| self.lookup(ix as usize))
            .collect()
    }
}
