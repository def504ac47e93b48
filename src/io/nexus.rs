//! NEXUS files: the first `TREE` of the `TREES` block, with `TRANSLATE` support.
//!
//! # Structure
//! ```text
//! #NEXUS
//! BEGIN TREES;
//!     TRANSLATE
//!         1 'Homo sapiens',
//!         2 Pan;
//!     TREE tree1 = [&R] ((1,2)90,3);
//! END;
//! ```
//! Statements are split on `;` outside comments and quotes, so a block may
//! span any number of lines (or sit on a single one).

use super::{BranchLengthStyle, TreeFormat, newick, quote_label};
use crate::error::{MapperError, Result};
use crate::tree::{PhyloTree, clean_label};
use itertools::Itertools;
use std::collections::HashMap;

/// Split `text` into `;`-terminated statements, ignoring `;` inside
/// `[...]` comments and quoted labels. The trailing fragment (if any) is kept.
fn split_statements(text: &str) -> Vec<&str> {
    let mut statements = Vec::new();
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut start = 0;

    for (i, ch) in text.char_indices() {
        if let Some(q) = quote {
            if ch == q {
                quote = None;
            }
            continue;
        }
        match ch {
            '\'' | '"' if depth == 0 => quote = Some(ch),
            '[' => depth += 1,
            ']' if depth > 0 => depth -= 1,
            ';' if depth == 0 => {
                statements.push(text[start..i].trim());
                start = i + 1;
            }
            _ => {}
        }
    }
    let rest = text[start..].trim();
    if !rest.is_empty() {
        statements.push(rest);
    }
    statements
}

/// Case-insensitive check that `statement` starts with the keyword `word`.
fn starts_with_keyword(statement: &str, word: &str) -> bool {
    let upper = statement.to_ascii_uppercase();
    upper.starts_with(word)
        && upper[word.len()..]
            .chars()
            .next()
            .is_none_or(|c| c.is_whitespace())
}

/// Statements of the `BEGIN TREES; ... END;` block.
fn trees_block(content: &str) -> Option<Vec<&str>> {
    let statements = split_statements(content);
    let begin = statements.iter().position(|s| {
        let upper = s.to_ascii_uppercase();
        // the header shares a statement with the first BEGIN
        let mut words = upper.split_whitespace().skip_while(|w| *w == "#NEXUS");
        words.next() == Some("BEGIN") && words.next() == Some("TREES")
    })?;

    Some(
        statements[begin + 1..]
            .iter()
            .take_while(|s| !starts_with_keyword(s, "END") && !starts_with_keyword(s, "ENDBLOCK"))
            .copied()
            .collect(),
    )
}

// STRUCTURE:
// TRANSLATE
//     1 '1959.M.CD.59.ZR59',
//     2 '1960.DRC60A'
fn parse_translate(statement: &str) -> HashMap<String, String> {
    statement["TRANSLATE".len()..]
        .split(',')
        .filter_map(|entry| {
            let entry = entry.trim();
            let (id, label) = entry.split_once(char::is_whitespace)?;
            Some((id.to_string(), clean_label(label)))
        })
        .collect()
}

/// Body of a `TREE name = newick` statement, terminated with `;` again.
fn tree_body(statement: &str) -> Option<String> {
    let (_, body) = statement.split_once('=')?;
    Some(format!("{};", body.trim()))
}

fn rename_leaves(tree: &mut PhyloTree, translate: &HashMap<String, String>) {
    for id in tree.terminals() {
        let clade = tree.clade_mut(id);
        if let Some(label) = clade.name.as_ref().and_then(|n| translate.get(n)) {
            clade.name = Some(label.clone());
        }
    }
}

/// Parse the first tree of a NEXUS document.
pub fn parse(content: &str) -> Result<PhyloTree> {
    if !content.trim_start().to_ascii_uppercase().starts_with("#NEXUS") {
        return Err(MapperError::parse(TreeFormat::Nexus, "missing #NEXUS header"));
    }
    let block = trees_block(content)
        .ok_or_else(|| MapperError::parse(TreeFormat::Nexus, "no TREES block"))?;

    let translate = block
        .iter()
        .find(|s| starts_with_keyword(s, "TRANSLATE"))
        .map(|s| parse_translate(s))
        .unwrap_or_default();

    let body = block
        .iter()
        .filter(|s| starts_with_keyword(s, "TREE") || starts_with_keyword(s, "UTREE"))
        .find_map(|s| tree_body(s))
        .ok_or_else(|| MapperError::parse(TreeFormat::Nexus, "no TREE statement"))?;

    let mut tree = newick::parse(&body).map_err(|e| match e {
        MapperError::Parse { message, .. } => MapperError::parse(TreeFormat::Nexus, message),
        other => other,
    })?;
    rename_leaves(&mut tree, &translate);
    Ok(tree)
}

/// Serialize `tree` as a NEXUS document with a TAXA and a TREES block.
pub fn write(tree: &PhyloTree, style: BranchLengthStyle) -> String {
    let taxa = tree.leaf_names();
    let labels = taxa.iter().map(|t| quote_label(t)).join(" ");

    let mut out = String::from("#NEXUS\n");
    out.push_str("BEGIN TAXA;\n");
    out.push_str(&format!("\tDIMENSIONS NTAX={};\n", taxa.len()));
    out.push_str(&format!("\tTAXLABELS {labels};\n"));
    out.push_str("END;\n");
    out.push_str("BEGIN TREES;\n");
    out.push_str(&format!("\tTREE tree1 = {}\n", newick::write(tree, style)));
    out.push_str("END;\n");
    out
}
