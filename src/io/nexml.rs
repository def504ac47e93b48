//! NeXML: a flat list of `<node>`s and `<edge>`s per `<tree>`.
//!
//! Nodes take their name from their own `label`, falling back to the label
//! of the `<otu>` they reference. Numeric labels on internal nodes are read
//! as support values, the same way as in Newick.

use super::xml::{attribute, escape, parse_number, xml_error};
use super::{BranchLengthStyle, TreeFormat};
use crate::error::{MapperError, Result};
use crate::tree::{Clade, CladeId, PhyloTree};
use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};
use std::collections::{HashMap, HashSet};

const FORMAT: TreeFormat = TreeFormat::NeXml;

#[derive(Debug, Default)]
struct RawNode {
    id: String,
    label: Option<String>,
    otu: Option<String>,
    root: bool,
}

#[derive(Debug)]
struct RawEdge {
    source: String,
    target: String,
    length: Option<f64>,
}

/// Everything read from the first `<tree>` element.
#[derive(Debug, Default)]
struct RawTree {
    nodes: Vec<RawNode>,
    edges: Vec<RawEdge>,
    root_length: Option<f64>,
}

fn required(element: &BytesStart<'_>, name: &[u8], what: &str) -> Result<String> {
    attribute(FORMAT, element, name)?
        .ok_or_else(|| MapperError::parse(FORMAT, format!("<{what}> without '{}'", String::from_utf8_lossy(name))))
}

fn length(element: &BytesStart<'_>) -> Result<Option<f64>> {
    attribute(FORMAT, element, b"length")?
        .map(|l| parse_number(FORMAT, "edge length", &l))
        .transpose()
}

/// Parse the first tree of a NeXML document.
pub fn parse(content: &str) -> Result<PhyloTree> {
    let mut reader = Reader::from_str(content);
    reader.config_mut().trim_text(true);

    let mut otus: HashMap<String, String> = HashMap::new();
    let mut raw = RawTree::default();
    let mut in_tree = false;
    let mut seen_tree = false;

    loop {
        let (element, is_empty) = match reader.read_event().map_err(|e| xml_error(FORMAT, e))? {
            Event::Start(e) => (e, false),
            Event::Empty(e) => (e, true),
            Event::End(e) => {
                if in_tree && e.local_name().as_ref() == b"tree" {
                    break;
                }
                continue;
            }
            Event::Eof => break,
            _ => continue,
        };

        match element.local_name().as_ref() {
            b"otu" => {
                let id = required(&element, b"id", "otu")?;
                if let Some(label) = attribute(FORMAT, &element, b"label")? {
                    otus.insert(id, label);
                }
            }
            b"tree" if !seen_tree => {
                seen_tree = true;
                // <tree/> has no nodes; leave it to the empty-tree check below
                in_tree = !is_empty;
            }
            b"node" if in_tree => raw.nodes.push(RawNode {
                id: required(&element, b"id", "node")?,
                label: attribute(FORMAT, &element, b"label")?,
                otu: attribute(FORMAT, &element, b"otu")?,
                root: attribute(FORMAT, &element, b"root")?.is_some_and(|r| r.trim() == "true"),
            }),
            b"edge" if in_tree => raw.edges.push(RawEdge {
                source: required(&element, b"source", "edge")?,
                target: required(&element, b"target", "edge")?,
                length: length(&element)?,
            }),
            b"rootedge" if in_tree => raw.root_length = length(&element)?,
            _ => {}
        }
    }

    if raw.nodes.is_empty() {
        return Err(MapperError::parse(FORMAT, "no <tree> with nodes found"));
    }
    build(raw, &otus)
}

/// Assemble the parsed nodes and edges into a rooted tree, children in edge order.
fn build(raw: RawTree, otus: &HashMap<String, String>) -> Result<PhyloTree> {
    let nodes: HashMap<&str, &RawNode> = raw.nodes.iter().map(|n| (n.id.as_str(), n)).collect();
    let mut children: HashMap<&str, Vec<(&str, Option<f64>)>> = HashMap::new();
    let mut targets: HashSet<&str> = HashSet::new();
    for edge in &raw.edges {
        for end in [&edge.source, &edge.target] {
            if !nodes.contains_key(end.as_str()) {
                return Err(MapperError::parse(FORMAT, format!("edge refers to unknown node '{end}'")));
            }
        }
        if !targets.insert(edge.target.as_str()) {
            return Err(MapperError::parse(FORMAT, format!("node '{}' has more than one parent", edge.target)));
        }
        children
            .entry(edge.source.as_str())
            .or_default()
            .push((edge.target.as_str(), edge.length));
    }

    let root = raw
        .nodes
        .iter()
        .find(|n| n.root)
        .or_else(|| raw.nodes.iter().find(|n| !targets.contains(n.id.as_str())))
        .ok_or_else(|| MapperError::parse(FORMAT, "no root node"))?;

    let make_clade = |node: &RawNode, length: Option<f64>| {
        let terminal = !children.contains_key(node.id.as_str());
        let label = node
            .label
            .as_deref()
            .or_else(|| node.otu.as_ref().and_then(|o| otus.get(o)).map(String::as_str));
        Clade::from_label(label, terminal, length)
    };

    let mut tree = PhyloTree::with_root(make_clade(root, raw.root_length));
    let mut visited: HashSet<&str> = HashSet::from([root.id.as_str()]);
    let mut stack: Vec<(&str, CladeId)> = vec![(root.id.as_str(), tree.root())];

    while let Some((id, parent)) = stack.pop() {
        let Some(kids) = children.get(id) else {
            continue;
        };
        // attach in edge order, then descend depth-first
        let mut attached = Vec::with_capacity(kids.len());
        for &(child, length) in kids {
            if !visited.insert(child) {
                return Err(MapperError::parse(FORMAT, format!("cycle through node '{child}'")));
            }
            let clade_id = tree.add_child(parent, make_clade(nodes[child], length))?;
            attached.push((child, clade_id));
        }
        stack.extend(attached.into_iter().rev());
    }

    if visited.len() != raw.nodes.len() {
        return Err(MapperError::parse(FORMAT, "nodes not connected to the root"));
    }
    Ok(tree)
}

/// Serialize `tree` as a NeXML document with one `FloatTree`.
pub fn write(tree: &PhyloTree, style: BranchLengthStyle) -> String {
    let order = tree.preorder();

    let mut out = String::from("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
    out.push_str(
        "<nex:nexml xmlns:nex=\"http://www.nexml.org/2009\" xmlns=\"http://www.nexml.org/2009\" \
         xmlns:xsi=\"http://www.w3.org/2001/XMLSchema-instance\" version=\"0.9\">\n",
    );

    out.push_str("  <otus id=\"tax1\">\n");
    for &id in order.iter().filter(|&&id| tree.is_terminal(id)) {
        let label = tree.clade(id).name.as_deref().unwrap_or_default();
        out.push_str(&format!("    <otu id=\"t{id}\" label=\"{}\"/>\n", escape(label)));
    }
    out.push_str("  </otus>\n");

    out.push_str("  <trees id=\"Trees1\" otus=\"tax1\">\n");
    out.push_str("    <tree id=\"tree1\" xsi:type=\"nex:FloatTree\">\n");
    for &id in &order {
        let clade = tree.clade(id);
        let mut attrs = format!("id=\"n{id}\"");
        let label = clade.name.clone().or_else(|| clade.confidence.map(|c| c.to_string()));
        if let Some(label) = label {
            attrs.push_str(&format!(" label=\"{}\"", escape(&label)));
        }
        if clade.is_terminal() {
            attrs.push_str(&format!(" otu=\"t{id}\""));
        }
        if id == tree.root() {
            attrs.push_str(" root=\"true\"");
        }
        out.push_str(&format!("      <node {attrs}/>\n"));
    }
    if let Some(length) = tree.clade(tree.root()).branch_length {
        out.push_str(&format!(
            "      <rootedge id=\"e{}\" target=\"n{}\" length=\"{}\"/>\n",
            tree.root(),
            tree.root(),
            style.format(length)
        ));
    }
    for &id in &order {
        let Some(parent) = tree.parent(id) else {
            continue;
        };
        let mut attrs = format!("id=\"e{id}\" source=\"n{parent}\" target=\"n{id}\"");
        if let Some(length) = tree.clade(id).branch_length {
            attrs.push_str(&format!(" length=\"{}\"", style.format(length)));
        }
        out.push_str(&format!("      <edge {attrs}/>\n"));
    }
    out.push_str("    </tree>\n");
    out.push_str("  </trees>\n");
    out.push_str("</nex:nexml>\n");
    out
}
