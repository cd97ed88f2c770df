use clap::{App, Arg};
use otlayout::layout::common::LangSys;
use otlayout::layout::lookup::LookupTypeRegistry;
use otlayout::layout::raw::{gpos_registry, gsub_registry, RawSubtable};
use otlayout::LayoutTable;
use std::fs::File;
use std::io::{self, Read, Write};

pub fn read_args(name: &str, description: &str) -> clap::ArgMatches<'static> {
    App::new(name)
        .about(description)
        .arg(
            Arg::with_name("INPUT")
                .help("Sets the input file to use")
                .required(false),
        )
        .arg(
            Arg::with_name("offset")
                .long("offset")
                .short("o")
                .takes_value(true)
                .default_value("0")
                .help("Byte offset of the table within the input"),
        )
        .arg(
            Arg::with_name("family")
                .long("family")
                .short("f")
                .takes_value(true)
                .possible_values(&["gsub", "gpos"])
                .default_value("gsub")
                .help("Whether to read lookups as GSUB or GPOS lookups"),
        )
        .get_matches()
}

/// Read the whole input file, or standard input if none was given.
pub fn read_input(matches: &clap::ArgMatches) -> io::Result<Vec<u8>> {
    let mut data = vec![];
    if let Some(filename) = matches.value_of("INPUT") {
        File::open(filename)?.read_to_end(&mut data)?;
    } else {
        io::stdin().read_to_end(&mut data)?;
    }
    Ok(data)
}

pub fn registry(matches: &clap::ArgMatches) -> LookupTypeRegistry<RawSubtable> {
    match matches.value_of("family") {
        Some("gpos") => gpos_registry(),
        _ => gsub_registry(),
    }
}

fn dump_lang_sys(out: &mut impl Write, name: &str, lang_sys: &LangSys) -> io::Result<()> {
    write!(out, "  {}:", name)?;
    if let Some(required) = lang_sys.required_feature() {
        write!(out, " required {};", required)?;
    }
    writeln!(out, " features {:?}", lang_sys.feature_indices)
}

/// Print a human-readable summary of a Layout table.
pub fn dump(table: &LayoutTable<RawSubtable>, out: &mut impl Write) -> io::Result<()> {
    writeln!(out, "version {}", table.version)?;
    if let Some(scripts) = &table.script_list {
        for (tag, script) in scripts.iter() {
            writeln!(out, "script {}", tag)?;
            if let Some(dflt) = &script.default_lang_sys {
                dump_lang_sys(out, "default", dflt)?;
            }
            for (lang, lang_sys) in script.lang_systems.iter() {
                dump_lang_sys(out, &lang.to_string(), lang_sys)?;
            }
        }
    }
    if let Some(features) = &table.feature_list {
        for (ix, (tag, feature)) in features.iter().enumerate() {
            write!(out, "feature {} {}: lookups {:?}", ix, tag, feature.lookup_list_indices)?;
            if let Some(params) = feature.feature_params {
                write!(out, "; params at +{}", params)?;
            }
            writeln!(out)?;
        }
    }
    if let Some(lookups) = &table.lookup_list {
        for (ix, lookup) in lookups.iter().enumerate() {
            write!(
                out,
                "lookup {}: type {}, flags {:?}",
                ix, lookup.lookup_type, lookup.flags
            )?;
            if let Some(set) = lookup.mark_filtering_set {
                write!(out, ", mark filtering set {}", set)?;
            }
            writeln!(out)?;
            for subtable in &lookup.subtables {
                write!(out, "  format {} at {}", subtable.format, subtable.offset)?;
                if let Some(coverage) = &subtable.coverage {
                    write!(out, ", {} glyphs covered", coverage.len())?;
                }
                writeln!(out)?;
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_dump() {
        #[rustfmt::skip]
        let data = vec![
            0x00, 0x01, 0x00, 0x00, // version 1.0
            0x00, 0x0a, 0x00, 0x1c, 0x00, 0x2a,
            0x00, 0x01, 0x6c, 0x61, 0x74, 0x6e, 0x00, 0x08, // 'latn' -> 18
            0x00, 0x04, 0x00, 0x00, // Script
            0x00, 0x00, 0xff, 0xff, 0x00, 0x00, // LangSys
            0x00, 0x01, 0x6c, 0x69, 0x67, 0x61, 0x00, 0x08, // 'liga' -> 36
            0x00, 0x00, 0x00, 0x01, 0x00, 0x00, // Feature
            0x00, 0x01, 0x00, 0x04, // LookupList
            0x00, 0x04, 0x00, 0x10, 0x00, 0x01, 0x00, 0x0a, 0x00, 0x02, // Lookup
            0x00, 0x01, 0x00, 0x04, // LigatureSubst at 56
            0x00, 0x02, 0x00, 0x01, 0x00, 0x0a, 0x00, 0x0c, 0x00, 0x00, // Coverage
        ];
        let table = otlayout::parse(&data, 0, &gsub_registry()).unwrap();
        let mut out = vec![];
        dump(&table, &mut out).unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "version 1.0000\n\
             script latn\n  default: features []\n\
             feature 0 liga: lookups [0]\n\
             lookup 0: type 4, flags USE_MARK_FILTERING_SET, mark filtering set 2\n\
             \x20 format 1 at 56, 3 glyphs covered\n"
        );
    }
}
