//! Newick reading (through `phylotree`) and writing.

use super::{BranchLengthStyle, TreeFormat, quote_label};
use crate::error::{MapperError, Result};
use crate::tree::{CladeId, PhyloTree};
use itertools::Itertools;
use phylotree::tree::Tree as PhyloTreeRaw;

/// Strip `[...]` comments from a Newick string.
///
/// BEAST and MrBayes write annotations like `:[&rate=0.123]2.45`; `phylotree`
/// would read the length after such a comment as part of the next name, so
/// comments are removed up front. Brackets inside quoted labels are kept.
pub(crate) fn strip_comments(newick: &str) -> String {
    let mut result = String::with_capacity(newick.len());
    let mut depth = 0usize;
    let mut quote: Option<char> = None;

    for ch in newick.chars() {
        match (quote, ch) {
            (Some(q), c) if c == q && depth == 0 => {
                quote = None;
                result.push(c);
            }
            (None, '\'' | '"') if depth == 0 => {
                quote = Some(ch);
                result.push(ch);
            }
            (None, '[') => depth += 1,
            (None, ']') if depth > 0 => depth -= 1,
            _ if depth == 0 => result.push(ch),
            _ => {}
        }
    }

    result
}

/// Opens the placeholder standing in for a quoted label.
pub(crate) const QUOTE_START: char = '\u{E000}';
/// Closes the placeholder standing in for a quoted label.
pub(crate) const QUOTE_END: char = '\u{E001}';

/// Replace every quoted label with a placeholder `QUOTE_START n QUOTE_END`.
///
/// `phylotree` knows nothing about single quotes and drops the whitespace
/// inside double quotes, so quoted text never reaches it. The returned list
/// holds each label as written, quotes included; `''` inside single quotes
/// stays escaped.
fn protect_quotes(newick: &str) -> Result<(String, Vec<String>)> {
    if newick.contains([QUOTE_START, QUOTE_END]) {
        return Err(MapperError::parse(TreeFormat::Newick, "unsupported private-use character"));
    }

    let mut out = String::with_capacity(newick.len());
    let mut quoted = Vec::new();
    let mut chars = newick.chars().peekable();
    while let Some(ch) = chars.next() {
        if ch != '\'' && ch != '"' {
            out.push(ch);
            continue;
        }
        let mut label = String::from(ch);
        let mut closed = false;
        while let Some(c) = chars.next() {
            label.push(c);
            if c == ch {
                if ch == '\'' && chars.peek() == Some(&'\'') {
                    // escaped quote
                    label.push('\'');
                    chars.next();
                    continue;
                }
                closed = true;
                break;
            }
        }
        if !closed {
            return Err(MapperError::parse(TreeFormat::Newick, format!("unterminated quoted label {label}")));
        }
        out.push(QUOTE_START);
        out.push_str(&quoted.len().to_string());
        out.push(QUOTE_END);
        quoted.push(label);
    }
    Ok((out, quoted))
}

/// Reject shapes the third-party parser would misread instead of failing on.
///
/// Runs on text whose quoted labels are already placeholders. Rejected:
/// - a tree that does not start with `(`,
/// - text after the root's closing parenthesis that opens new siblings,
/// - empty children (`()`, `(A,,B)`),
/// - a second `:` on one node,
/// - whitespace inside an unquoted label or length,
/// - unquoted text glued to a quoted label.
fn check_shape(newick: &str) -> Result<()> {
    let fail = |message: String| Err(MapperError::parse(TreeFormat::Newick, message));
    if !newick.starts_with('(') {
        return fail("tree must start with '('".to_string());
    }

    let mut depth = 0i64;
    let mut closed = false;
    let mut in_placeholder = false;
    // state of the node being read
    let mut empty_child = false;
    let mut colon = false;
    // state of the current name or length field
    let mut field_len = 0usize;
    let mut gap = false;
    let mut quoted_field = false;

    for ch in newick.chars() {
        if in_placeholder {
            in_placeholder = ch != QUOTE_END;
            continue;
        }
        match ch {
            ';' if depth != 0 => return fail("unbalanced parentheses".to_string()),
            ';' => return Ok(()),
            '(' | ')' | ',' if closed => {
                return fail(format!("unexpected '{ch}' after the root clade"));
            }
            '(' | ')' | ',' | ':' => {
                match ch {
                    '(' if field_len > 0 => return fail("label before '('".to_string()),
                    ')' | ',' if empty_child => return fail(format!("empty child before '{ch}'")),
                    ':' if colon => return fail("more than one ':' on a node".to_string()),
                    _ => {}
                }
                match ch {
                    '(' => depth += 1,
                    ')' => {
                        depth -= 1;
                        closed = depth == 0;
                    }
                    _ => {}
                }
                empty_child = matches!(ch, '(' | ',');
                colon = ch == ':';
                field_len = 0;
                gap = false;
                quoted_field = false;
            }
            c if c.is_whitespace() => gap = field_len > 0,
            QUOTE_START => {
                if field_len > 0 {
                    return fail("text next to a quoted label".to_string());
                }
                in_placeholder = true;
                quoted_field = true;
                field_len += 1;
                empty_child = false;
            }
            _ => {
                if quoted_field {
                    return fail("text next to a quoted label".to_string());
                }
                if gap {
                    return fail("whitespace inside a label or branch length".to_string());
                }
                field_len += 1;
                empty_child = false;
            }
        }
    }
    fail("missing ';' at the end of the tree".to_string())
}

/// Parse the first tree of a Newick string.
pub fn parse(content: &str) -> Result<PhyloTree> {
    let newick = strip_comments(content);
    let newick = newick.trim();
    if newick.is_empty() {
        return Err(MapperError::parse(TreeFormat::Newick, "no tree found"));
    }
    let (protected, quoted) = protect_quotes(newick)?;
    check_shape(&protected)?;
    // whitespace is only left between tokens now
    let compact: String = protected.chars().filter(|c| !c.is_whitespace()).collect();

    let raw = PhyloTreeRaw::from_newick(&compact)
        .map_err(|e| MapperError::parse(TreeFormat::Newick, e.to_string()))?;
    Ok(PhyloTree::from_phylotree_quoted(&raw, &quoted)?)
}

/// Serialize `tree` as a single Newick line terminated by `;`.
pub fn write(tree: &PhyloTree, style: BranchLengthStyle) -> String {
    write_clade(tree, tree.root(), style) + ";"
}

fn write_clade(tree: &PhyloTree, id: CladeId, style: BranchLengthStyle) -> String {
    let clade = tree.clade(id);
    let mut out = String::new();

    if !clade.is_terminal() {
        let children = clade
            .children
            .iter()
            .map(|&child| write_clade(tree, child, style))
            .join(",");
        out.push('(');
        out.push_str(&children);
        out.push(')');
    }

    if let Some(name) = &clade.name {
        out.push_str(&quote_label(name));
    } else if let Some(conf) = clade.confidence {
        out.push_str(&conf.to_string());
    }

    if let Some(length) = clade.branch_length {
        out.push(':');
        out.push_str(&style.format(length));
    }
    out
}
