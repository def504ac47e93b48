//! PhyloXML: nested `<clade>` elements inside the first `<phylogeny>`.
//!
//! ```text
//! <phyloxml>
//!   <phylogeny rooted="true">
//!     <clade>
//!       <clade>
//!         <confidence type="bootstrap">90</confidence>
//!         <clade><name>A</name><branch_length>0.1</branch_length></clade>
//!         ...
//! ```
//! Only `<name>`, `<confidence>` and `<branch_length>` (element or
//! attribute) directly under a `<clade>` are read.

use super::xml::{attribute, escape, parse_number, xml_error};
use super::{BranchLengthStyle, TreeFormat};
use crate::error::{MapperError, Result};
use crate::support::Confidence;
use crate::tree::{Clade, CladeId, PhyloTree, clean_label};
use quick_xml::Reader;
use quick_xml::events::Event;

const FORMAT: TreeFormat = TreeFormat::PhyloXml;

#[derive(Debug, Clone, Copy, PartialEq)]
enum Field {
    Name,
    Confidence,
    BranchLength,
}

/// Parse the first phylogeny of a PhyloXML document.
pub fn parse(content: &str) -> Result<PhyloTree> {
    let mut reader = Reader::from_str(content);
    reader.config_mut().trim_text(true);

    let mut tree: Option<PhyloTree> = None;
    // open <clade> elements, innermost last
    let mut clades: Vec<CladeId> = Vec::new();
    // local names of all open elements
    let mut path: Vec<Vec<u8>> = Vec::new();
    let mut field: Option<Field> = None;
    let mut in_phylogeny = false;

    loop {
        match reader.read_event().map_err(|e| xml_error(FORMAT, e))? {
            Event::Start(e) => {
                let name = e.local_name().as_ref().to_vec();
                let parent_is_clade = path.last().is_some_and(|p| p == b"clade");
                match name.as_slice() {
                    b"phylogeny" if tree.is_none() => in_phylogeny = true,
                    b"clade" if in_phylogeny => {
                        let mut clade = Clade::default();
                        if let Some(len) = attribute(FORMAT, &e, b"branch_length")? {
                            clade.branch_length = Some(parse_number(FORMAT, "branch length", &len)?);
                        }
                        clades.push(open_clade(&mut tree, &clades, clade)?);
                    }
                    b"name" if in_phylogeny && parent_is_clade => field = Some(Field::Name),
                    b"confidence" if in_phylogeny && parent_is_clade => field = Some(Field::Confidence),
                    b"branch_length" if in_phylogeny && parent_is_clade => field = Some(Field::BranchLength),
                    _ => {}
                }
                path.push(name);
            }
            Event::Empty(e) => {
                if in_phylogeny && e.local_name().as_ref() == b"clade" {
                    let mut clade = Clade::default();
                    if let Some(len) = attribute(FORMAT, &e, b"branch_length")? {
                        clade.branch_length = Some(parse_number(FORMAT, "branch length", &len)?);
                    }
                    open_clade(&mut tree, &clades, clade)?;
                }
            }
            Event::Text(e) => {
                let (Some(f), Some(&id), Some(tree)) = (field, clades.last(), tree.as_mut()) else {
                    continue;
                };
                let text = e.unescape().map_err(|err| xml_error(FORMAT, err))?;
                let clade = tree.clade_mut(id);
                match f {
                    Field::Name => clade.name = Some(clean_label(&text)).filter(|n| !n.is_empty()),
                    Field::Confidence => {
                        // several <confidence> elements: keep the first
                        if clade.confidence.is_none() {
                            clade.confidence = Confidence::parse(&text);
                        }
                    }
                    Field::BranchLength => {
                        clade.branch_length = Some(parse_number(FORMAT, "branch length", &text)?)
                    }
                }
            }
            Event::End(e) => {
                field = None;
                path.pop();
                match e.local_name().as_ref() {
                    b"clade" if in_phylogeny => {
                        clades.pop();
                    }
                    b"phylogeny" if in_phylogeny => break,
                    _ => {}
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    tree.ok_or_else(|| MapperError::parse(FORMAT, "no <phylogeny> with a <clade> found"))
}

/// Add `clade` under the innermost open clade, or make it the root.
fn open_clade(tree: &mut Option<PhyloTree>, open: &[CladeId], clade: Clade) -> Result<CladeId> {
    match (tree.as_mut(), open.last()) {
        (Some(t), Some(&parent)) => Ok(t.add_child(parent, clade)?),
        (None, _) => {
            let t = PhyloTree::with_root(clade);
            let root = t.root();
            *tree = Some(t);
            Ok(root)
        }
        (Some(_), None) => Err(MapperError::parse(FORMAT, "more than one root <clade> in <phylogeny>")),
    }
}

/// Serialize `tree` as a PhyloXML document with one phylogeny.
pub fn write(tree: &PhyloTree, style: BranchLengthStyle) -> String {
    let mut out = String::from("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
    out.push_str(
        "<phyloxml xmlns:xsi=\"http://www.w3.org/2001/XMLSchema-instance\" \
         xsi:schemaLocation=\"http://www.phyloxml.org http://www.phyloxml.org/1.10/phyloxml.xsd\" \
         xmlns=\"http://www.phyloxml.org\">\n",
    );
    out.push_str("  <phylogeny rooted=\"true\">\n");
    write_clade(tree, tree.root(), style, 2, &mut out);
    out.push_str("  </phylogeny>\n");
    out.push_str("</phyloxml>\n");
    out
}

fn write_clade(tree: &PhyloTree, id: CladeId, style: BranchLengthStyle, depth: usize, out: &mut String) {
    let clade = tree.clade(id);
    let pad = "  ".repeat(depth);

    out.push_str(&format!("{pad}<clade>\n"));
    if let Some(name) = &clade.name {
        out.push_str(&format!("{pad}  <name>{}</name>\n", escape(name)));
    }
    if let Some(length) = clade.branch_length {
        out.push_str(&format!("{pad}  <branch_length>{}</branch_length>\n", style.format(length)));
    }
    if let Some(conf) = clade.confidence {
        let kind = match conf {
            Confidence::Integer(_) => "bootstrap",
            Confidence::Real(_) => "probability",
        };
        out.push_str(&format!("{pad}  <confidence type=\"{kind}\">{conf}</confidence>\n"));
    }
    for &child in &clade.children {
        write_clade(tree, child, style, depth + 1, out);
    }
    out.push_str(&format!("{pad}</clade>\n"));
}

#[cfg(test)]
mod tests {
    use super::*;

    const DOC: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<phyloxml xmlns="http://www.phyloxml.org">
  <phylogeny rooted="true">
    <name>example</name>
    <clade>
      <clade branch_length="0.2">
        <confidence type="bootstrap">90</confidence>
        <clade>
          <name>A</name>
          <branch_length>0.1</branch_length>
          <taxonomy><scientific_name>Not a clade name</scientific_name></taxonomy>
        </clade>
        <clade><name>B</name></clade>
      </clade>
      <clade>
        <name>C &amp; D</name>
        <confidence type="bootstrap">85</confidence>
        <confidence type="probability">0.5</confidence>
        <clade><name>C</name></clade>
        <clade><name>D</name></clade>
      </clade>
    </clade>
  </phylogeny>
  <phylogeny><clade><name>ignored</name></clade></phylogeny>
</phyloxml>"#;

    #[test]
    fn test_parse_document() {
        let tree = parse(DOC).unwrap();
        assert_eq!(tree.leaf_names(), vec!["A", "B", "C", "D"]);

        let internals = tree.nonterminals();
        assert_eq!(internals.len(), 3);
        // <name> of the phylogeny is not the root clade's name
        assert_eq!(tree.clade(internals[0]).name, None);

        let ab = tree.clade(internals[1]);
        assert_eq!(ab.confidence, Some(Confidence::Integer(90)));
        assert_eq!(ab.branch_length, Some(0.2));

        let cd = tree.clade(internals[2]);
        assert_eq!(cd.name.as_deref(), Some("C & D"));
        assert_eq!(cd.confidence, Some(Confidence::Integer(85)));

        let a = tree.terminals()[0];
        assert_eq!(tree.clade(a).branch_length, Some(0.1));
    }

    #[test]
    fn test_parse_errors() {
        assert!(matches!(parse("<phyloxml></phyloxml>"), Err(MapperError::Parse { .. })));
        assert!(parse("<phyloxml><phylogeny><clade></phylogeny>").is_err());
        assert!(
            parse("<phyloxml><phylogeny><clade><branch_length>x</branch_length></clade></phylogeny></phyloxml>")
                .is_err()
        );
    }

    #[test]
    fn test_write_then_parse() {
        let mut tree = parse(DOC).unwrap();
        let ab = tree.nonterminals()[1];
        tree.clade_mut(ab).confidence = None;
        tree.clade_mut(ab).name = Some("90/0.99".to_string());

        let text = write(&tree, BranchLengthStyle::Scientific);
        assert!(text.contains("<name>90/0.99</name>"));
        assert!(text.contains("<branch_length>2.000000e-01</branch_length>"));
        assert!(text.contains("<name>C &amp; D</name>"));

        let back = parse(&text).unwrap();
        assert_eq!(back.leaf_names(), tree.leaf_names());
        assert_eq!(back.clade(back.nonterminals()[1]).name.as_deref(), Some("90/0.99"));
        assert_eq!(back.clade(back.nonterminals()[2]).confidence, Some(Confidence::Integer(85)));
    }
}
