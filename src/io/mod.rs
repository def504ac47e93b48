//! Reading and writing trees in the supported file formats.
//!
//! Only the first tree of a file is used. Paths ending in `.gz` are
//! transparently gunzipped on read and gzip-compressed on write.

use crate::error::{MapperError, Result};
use crate::tree::PhyloTree;
use clap::ValueEnum;
use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use itertools::Itertools;
use std::fmt;
use std::fs::{self, File};
use std::io::{BufWriter, Read, Write};
use std::path::Path;
use tempfile::NamedTempFile;

pub mod newick;
pub mod nexml;
pub mod nexus;
pub mod phyloxml;
mod xml;

/// Supported tree file formats.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, ValueEnum)]
pub enum TreeFormat {
    Newick,
    Nexus,
    #[value(name = "phyloxml")]
    PhyloXml,
    #[value(name = "nexml")]
    NeXml,
}

impl fmt::Display for TreeFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TreeFormat::Newick => "newick",
            TreeFormat::Nexus => "nexus",
            TreeFormat::PhyloXml => "phyloxml",
            TreeFormat::NeXml => "nexml",
        };
        f.write_str(name)
    }
}

/// How branch lengths are rendered on output.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum BranchLengthStyle {
    /// C `%e` style: `1.000000e-01`.
    #[default]
    Scientific,
    /// Shortest round-trip decimal: `0.1`.
    Plain,
}

impl BranchLengthStyle {
    pub fn format(&self, length: f64) -> String {
        match self {
            BranchLengthStyle::Scientific => format_scientific(length),
            BranchLengthStyle::Plain => format!("{length}"),
        }
    }
}

/// Render like C's `%e`: six fractional digits, signed two-digit exponent.
fn format_scientific(value: f64) -> String {
    let raw = format!("{value:.6e}");
    match raw.split_once('e') {
        Some((mantissa, exponent)) => match exponent.parse::<i32>() {
            Ok(exp) => {
                let sign = if exp < 0 { '-' } else { '+' };
                format!("{mantissa}e{sign}{:02}", exp.abs())
            }
            Err(_) => raw,
        },
        // inf / NaN have no exponent
        None => raw,
    }
}

/// Parse tree text in `format`.
///
/// Taxon names must be unique: a name seen twice (unnamed terminals count
/// as `""`) would make two different splits look alike.
pub fn parse_tree(content: &str, format: TreeFormat) -> Result<PhyloTree> {
    let tree = match format {
        TreeFormat::Newick => newick::parse(content),
        TreeFormat::Nexus => nexus::parse(content),
        TreeFormat::PhyloXml => phyloxml::parse(content),
        TreeFormat::NeXml => nexml::parse(content),
    }?;
    if let Some(name) = tree.leaf_names().into_iter().duplicates().next() {
        return Err(MapperError::parse(format, format!("taxon '{name}' appears more than once")));
    }
    Ok(tree)
}

/// Serialize `tree` in `format`.
pub fn format_tree(tree: &PhyloTree, format: TreeFormat, style: BranchLengthStyle) -> String {
    match format {
        TreeFormat::Newick => newick::write(tree, style) + "\n",
        TreeFormat::Nexus => nexus::write(tree, style),
        TreeFormat::PhyloXml => phyloxml::write(tree, style),
        TreeFormat::NeXml => nexml::write(tree, style),
    }
}

fn is_gzip(path: &Path) -> bool {
    path.to_string_lossy().ends_with(".gz")
}

/// Read the first tree stored in `path`.
///
/// # Errors
/// `MapperError::Io` if the file cannot be read, `MapperError::Parse` if its
/// content is not valid `format`.
pub fn read_tree<P: AsRef<Path>>(path: P, format: TreeFormat) -> Result<PhyloTree> {
    let p = path.as_ref();
    let content = if is_gzip(p) {
        let file = File::open(p).map_err(|e| MapperError::io(p, e))?;
        let mut text = String::new();
        GzDecoder::new(file)
            .read_to_string(&mut text)
            .map_err(|e| MapperError::io(p, e))?;
        text
    } else {
        fs::read_to_string(p).map_err(|e| MapperError::io(p, e))?
    };
    parse_tree(&content, format)
}

/// Write `tree` to `path`, gzip-compressed if the path ends with `.gz`.
///
/// The text goes to a temporary file in the target's directory, which is
/// renamed over `path` only once everything is written. A failure leaves
/// any existing `path` as it was.
pub fn write_tree<P: AsRef<Path>>(
    tree: &PhyloTree,
    path: P,
    format: TreeFormat,
    style: BranchLengthStyle,
) -> Result<()> {
    let p = path.as_ref();
    let text = format_tree(tree, format, style);
    let io_err = |e| MapperError::io(p, e);

    let dir = match p.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let tmp = NamedTempFile::new_in(dir).map_err(io_err)?;
    write_bytes(tmp.as_file(), text.as_bytes(), is_gzip(p)).map_err(io_err)?;
    tmp.persist(p).map_err(|e| MapperError::io(p, e.error))?;
    Ok(())
}

fn write_bytes(file: &File, bytes: &[u8], gzip: bool) -> std::io::Result<()> {
    if gzip {
        let mut enc = GzEncoder::new(BufWriter::new(file), Compression::default());
        enc.write_all(bytes)?;
        enc.finish()?.flush()?;
    } else {
        let mut out = BufWriter::new(file);
        out.write_all(bytes)?;
        out.flush()?;
    }
    file.sync_all()
}

/// Quote a label for Newick/Nexus output when it contains reserved characters.
pub(crate) fn quote_label(label: &str) -> String {
    let needs_quotes = label
        .chars()
        .any(|c| c.is_whitespace() || "()[]:;,'".contains(c));
    if needs_quotes {
        format!("'{}'", label.replace('\'', "''"))
    } else {
        label.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_scientific_matches_c() {
        assert_eq!(format_scientific(0.1), "1.000000e-01");
        assert_eq!(format_scientific(0.0), "0.000000e+00");
        assert_eq!(format_scientific(123.456), "1.234560e+02");
        assert_eq!(format_scientific(1.5e-120), "1.500000e-120");
    }

    #[test]
    fn test_plain_style() {
        assert_eq!(BranchLengthStyle::Plain.format(0.25), "0.25");
        assert_eq!(BranchLengthStyle::Scientific.format(0.25), "2.500000e-01");
    }

    #[test]
    fn test_format_names_round_trip_through_clap() {
        for format in TreeFormat::value_variants() {
            let parsed = TreeFormat::from_str(&format.to_string(), false).unwrap();
            assert_eq!(parsed, *format);
        }
        assert!(TreeFormat::from_str("fasta", false).is_err());
    }

    #[test]
    fn test_quote_label() {
        assert_eq!(quote_label("Homo_sapiens"), "Homo_sapiens");
        assert_eq!(quote_label("90/0.99"), "90/0.99");
        assert_eq!(quote_label("Homo sapiens"), "'Homo sapiens'");
        assert_eq!(quote_label("O'Brien"), "'O''Brien'");
    }

    #[test]
    fn test_duplicate_taxa_are_rejected() {
        let err = parse_tree("((A,B),(A,C));", TreeFormat::Newick).unwrap_err();
        assert_eq!(err.to_string(), "could not parse newick tree: taxon 'A' appears more than once");
        // 'A B' and AB are different taxa
        assert!(parse_tree("(('A B',AB),C);", TreeFormat::Newick).is_ok());
        assert!(parse_tree("((:1,A),(:2,C));", TreeFormat::Newick).is_err());
    }

    #[test]
    fn test_failed_write_leaves_nothing_behind() {
        let dir = tempfile::tempdir().unwrap();
        let tree = parse_tree("((A,B),C);", TreeFormat::Newick).unwrap();

        // renaming a file over a directory fails after the text is written
        let target = dir.path().join("out.nwk");
        fs::create_dir(&target).unwrap();
        let err = write_tree(&tree, &target, TreeFormat::Newick, BranchLengthStyle::Plain).unwrap_err();
        assert!(matches!(err, MapperError::Io { .. }));
        assert!(target.is_dir());
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn test_write_replaces_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("out.nwk");
        fs::write(&target, "old content that is longer than the new tree").unwrap();

        let tree = parse_tree("((A,B),C);", TreeFormat::Newick).unwrap();
        write_tree(&tree, &target, TreeFormat::Newick, BranchLengthStyle::Plain).unwrap();
        assert_eq!(fs::read_to_string(&target).unwrap(), "((A,B),C);\n");
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn test_read_missing_file_is_io_error() {
        let err = read_tree("/definitely/not/here.nwk", TreeFormat::Newick).unwrap_err();
        assert!(matches!(err, MapperError::Io { .. }));
    }
}
