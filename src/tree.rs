//! Owned tree adapter used by the matching and relabelling code.
//!
//! # Overview
//! Every reader (Newick via `phylotree`, Nexus, PhyloXML, NeXML) produces a
//! [`PhyloTree`]: an arena of [`Clade`]s addressed by [`CladeId`]. Each clade
//! knows its parent, its children (in file order), an optional name, an
//! optional support value and an optional branch length.
//!
//! Parent links are filled in exactly once, top-down, when a clade is
//! attached with [`PhyloTree::add_child`].
//!
//! ```text
//!          root            clade 0
//!         /    \
//!      (A,B)   (C,D)       clades 1 and 4
//!      /  \     /  \
//!     A    B   C    D      clades 2, 3, 5, 6
//! ```

use crate::io::newick::{QUOTE_END, QUOTE_START};
use crate::support::Confidence;
use phylotree::tree::{Tree as PhyloTreeRaw, TreeError};

pub type CladeId = usize;

/// A single node of a [`PhyloTree`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Clade {
    /// Taxon name on terminals, free-text label on internal nodes.
    pub name: Option<String>,
    /// Support value (bootstrap or posterior probability).
    pub confidence: Option<Confidence>,
    /// Length of the branch leading to this clade.
    pub branch_length: Option<f64>,
    pub children: Vec<CladeId>,
    pub parent: Option<CladeId>,
}

impl Clade {
    pub fn named(name: impl Into<String>) -> Self {
        Clade { name: Some(name.into()), ..Default::default() }
    }

    #[inline]
    pub fn is_terminal(&self) -> bool {
        self.children.is_empty()
    }

    /// Build a clade from a raw node label as found in a tree file.
    ///
    /// Labels are trimmed (whitespace and surrounding quotes). On internal
    /// nodes a numeric label is a support value; everything else is a name.
    pub(crate) fn from_label(label: Option<&str>, terminal: bool, branch_length: Option<f64>) -> Clade {
        let label = label.map(clean_label).filter(|l| !l.is_empty());
        let mut clade = Clade { branch_length, ..Default::default() };
        match label {
            Some(text) if !terminal => match Confidence::parse(&text) {
                Some(conf) => clade.confidence = Some(conf),
                None => clade.name = Some(text),
            },
            other => clade.name = other,
        }
        clade
    }
}

/// A rooted tree owning all of its clades.
#[derive(Debug, Clone)]
pub struct PhyloTree {
    clades: Vec<Clade>,
    root: CladeId,
}

impl PhyloTree {
    /// Start a tree from its root clade. Any parent/children on `root` are discarded.
    pub fn with_root(mut root: Clade) -> Self {
        root.parent = None;
        root.children.clear();
        PhyloTree { clades: vec![root], root: 0 }
    }

    /// Attach `clade` as the last child of `parent` and return its id.
    ///
    /// # Errors
    /// Returns `TreeError::NodeNotFound` if `parent` is not in the tree.
    pub fn add_child(&mut self, parent: CladeId, mut clade: Clade) -> Result<CladeId, TreeError> {
        if parent >= self.clades.len() {
            return Err(TreeError::NodeNotFound(parent));
        }
        let id = self.clades.len();
        clade.parent = Some(parent);
        clade.children.clear();
        self.clades.push(clade);
        self.clades[parent].children.push(id);
        Ok(id)
    }

    #[inline]
    pub fn root(&self) -> CladeId {
        self.root
    }

    /// Panics if `id` was not produced by this tree.
    #[inline]
    pub fn clade(&self, id: CladeId) -> &Clade {
        &self.clades[id]
    }

    #[inline]
    pub fn clade_mut(&mut self, id: CladeId) -> &mut Clade {
        &mut self.clades[id]
    }

    #[inline]
    pub fn parent(&self, id: CladeId) -> Option<CladeId> {
        self.clades[id].parent
    }

    #[inline]
    pub fn is_terminal(&self, id: CladeId) -> bool {
        self.clades[id].is_terminal()
    }

    pub fn len(&self) -> usize {
        self.clades.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clades.is_empty()
    }

    /// Depth-first preorder from the root, children visited in stored order.
    pub fn preorder(&self) -> Vec<CladeId> {
        self.preorder_from(self.root)
    }

    fn preorder_from(&self, start: CladeId) -> Vec<CladeId> {
        let mut order = Vec::with_capacity(self.clades.len());
        let mut stack = vec![start];
        while let Some(id) = stack.pop() {
            order.push(id);
            stack.extend(self.clades[id].children.iter().rev());
        }
        order
    }

    /// Internal clades in preorder.
    pub fn nonterminals(&self) -> Vec<CladeId> {
        self.preorder().into_iter().filter(|&id| !self.is_terminal(id)).collect()
    }

    /// Terminal clades in preorder.
    pub fn terminals(&self) -> Vec<CladeId> {
        self.preorder().into_iter().filter(|&id| self.is_terminal(id)).collect()
    }

    /// Names of all terminals, unnamed ones as `""`.
    pub fn leaf_names(&self) -> Vec<String> {
        self.subtree_leaf_names(self.root)
    }

    /// Names of the terminals descending from `id` (itself, if terminal).
    pub fn subtree_leaf_names(&self, id: CladeId) -> Vec<String> {
        self.preorder_from(id)
            .into_iter()
            .filter(|&c| self.is_terminal(c))
            .map(|c| self.clades[c].name.clone().unwrap_or_default())
            .collect()
    }

    /// Convert a tree parsed by `phylotree`.
    ///
    /// Labels are trimmed (whitespace and surrounding quotes). Internal labels
    /// that look numeric become confidences; everything else stays a name.
    ///
    /// # Errors
    /// Returns `TreeError` if the tree has no root or references missing nodes.
    pub fn from_phylotree(raw: &PhyloTreeRaw) -> Result<Self, TreeError> {
        Self::from_phylotree_quoted(raw, &[])
    }

    /// Like [`from_phylotree`](Self::from_phylotree), with node names that are
    /// quoted-label placeholders swapped back for `quoted[n]`.
    pub(crate) fn from_phylotree_quoted(raw: &PhyloTreeRaw, quoted: &[String]) -> Result<Self, TreeError> {
        let label = |name: Option<&String>| -> Option<String> {
            let name = name?;
            Some(placeholder_label(name, quoted).unwrap_or(name.as_str()).to_string())
        };

        let raw_root = raw.get_root()?;
        let root_node = raw.get(&raw_root)?;
        let mut tree = PhyloTree::with_root(Clade::from_label(
            label(root_node.name.as_ref()).as_deref(),
            root_node.children.is_empty(),
            root_node.parent_edge,
        ));

        // (raw node, parent in the new arena)
        let mut stack: Vec<(usize, CladeId)> = root_node
            .children
            .iter()
            .rev()
            .map(|&child| (child, tree.root))
            .collect();

        while let Some((raw_id, parent)) = stack.pop() {
            let node = raw.get(&raw_id)?;
            let clade = Clade::from_label(
                label(node.name.as_ref()).as_deref(),
                node.children.is_empty(),
                node.parent_edge,
            );
            let id = tree.add_child(parent, clade)?;
            stack.extend(node.children.iter().rev().map(|&child| (child, id)));
        }

        Ok(tree)
    }
}

/// `quoted[n]` when `name` is exactly the placeholder for label `n`.
fn placeholder_label<'a>(name: &str, quoted: &'a [String]) -> Option<&'a str> {
    let n: usize = name
        .strip_prefix(QUOTE_START)?
        .strip_suffix(QUOTE_END)?
        .parse()
        .ok()?;
    quoted.get(n).map(String::as_str)
}

/// Trim whitespace and one pair of surrounding quotes (`''` inside single
/// quotes is an escaped quote).
pub(crate) fn clean_label(label: &str) -> String {
    let label = label.trim();
    if let Some(inner) = label.strip_prefix('\'').and_then(|rest| rest.strip_suffix('\'')) {
        return inner.replace("''", "'");
    }
    if let Some(inner) = label.strip_prefix('"').and_then(|rest| rest.strip_suffix('"')) {
        return inner.to_string();
    }
    label.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(newick: &str) -> PhyloTree {
        crate::io::newick::parse(newick).unwrap()
    }

    /// ```text
    ///          root
    ///         /    \
    ///     90 /      \ 85
    ///       / \    / \
    ///      A   B  C   D
    /// ```
    #[test]
    fn test_labels_become_confidence_on_internal_nodes() {
        let tree = parse("((A,B)90,(C,D)0.85);");
        let internals = tree.nonterminals();
        assert_eq!(internals.len(), 3);

        let root = tree.clade(internals[0]);
        assert_eq!(root.confidence, None);
        assert_eq!(root.name, None);

        assert_eq!(tree.clade(internals[1]).confidence, Some(Confidence::Integer(90)));
        assert_eq!(tree.clade(internals[2]).confidence, Some(Confidence::Real(0.85)));
    }

    #[test]
    fn test_text_labels_stay_names() {
        let tree = parse("((A,B)Apes,(C,D)'Old World');");
        let names: Vec<_> = tree
            .nonterminals()
            .into_iter()
            .filter_map(|id| tree.clade(id).name.clone())
            .collect();
        assert_eq!(names, vec!["Apes".to_string(), "Old World".to_string()]);
    }

    #[test]
    fn test_numeric_leaf_names_are_not_confidences() {
        let tree = parse("((1,2),3);");
        assert_eq!(tree.leaf_names(), vec!["1", "2", "3"]);
        assert!(tree.terminals().iter().all(|&id| tree.clade(id).confidence.is_none()));
    }

    #[test]
    fn test_parents_and_preorder() {
        let tree = parse("((A:0.1,B:0.2)X:0.3,C:0.4);");
        let order = tree.preorder();
        let names: Vec<_> = order
            .iter()
            .map(|&id| tree.clade(id).name.clone().unwrap_or_default())
            .collect();
        assert_eq!(names, vec!["", "X", "A", "B", "C"]);

        let x = order[1];
        assert_eq!(tree.parent(x), Some(tree.root()));
        assert_eq!(tree.parent(order[2]), Some(x));
        assert_eq!(tree.parent(tree.root()), None);
        assert_eq!(tree.clade(x).branch_length, Some(0.3));
    }

    #[test]
    fn test_subtree_leaf_names() {
        let tree = parse("((A,B),(C,(D,E)));");
        let internals = tree.nonterminals();
        assert_eq!(tree.subtree_leaf_names(internals[1]), vec!["A", "B"]);
        assert_eq!(tree.subtree_leaf_names(internals[2]), vec!["C", "D", "E"]);
        assert_eq!(tree.subtree_leaf_names(internals[3]), vec!["D", "E"]);
        assert_eq!(tree.leaf_names().len(), 5);
    }

    #[test]
    fn test_whitespace_around_labels_is_trimmed() {
        let tree = parse("(( A , B ) 95 , C );");
        assert_eq!(tree.leaf_names(), vec!["A", "B", "C"]);
        assert_eq!(
            tree.clade(tree.nonterminals()[1]).confidence,
            Some(Confidence::Integer(95))
        );
    }

    #[test]
    fn test_add_child_to_missing_parent() {
        let mut tree = PhyloTree::with_root(Clade::default());
        assert!(tree.add_child(7, Clade::named("A")).is_err());
        let a = tree.add_child(tree.root(), Clade::named("A")).unwrap();
        assert_eq!(tree.parent(a), Some(0));
        assert_eq!(tree.len(), 2);
    }

    #[test]
    fn test_from_phylotree_directly() {
        let raw = PhyloTreeRaw::from_newick("((A:0.1,B:0.2)95:0.3,C:0.4);").unwrap();
        let tree = PhyloTree::from_phylotree(&raw).unwrap();
        assert_eq!(tree.leaf_names(), vec!["A", "B", "C"]);
        assert_eq!(tree.clade(tree.nonterminals()[1]).confidence, Some(Confidence::Integer(95)));
    }

    #[test]
    fn test_placeholders_are_restored() {
        let quoted = vec!["'A B'".to_string(), "'90'".to_string()];
        let raw = PhyloTreeRaw::from_newick("((\u{E000}0\u{E001},AB)\u{E000}1\u{E001},C);").unwrap();
        let tree = PhyloTree::from_phylotree_quoted(&raw, &quoted).unwrap();
        assert_eq!(tree.leaf_names(), vec!["A B", "AB", "C"]);

        assert_eq!(placeholder_label("\u{E000}7\u{E001}", &quoted), None);
        assert_eq!(placeholder_label("AB", &quoted), None);
    }

    #[test]
    fn test_clean_label() {
        assert_eq!(clean_label("  'Homo sapiens' "), "Homo sapiens");
        assert_eq!(clean_label("\"x\""), "x");
        assert_eq!(clean_label("plain"), "plain");
        assert_eq!(clean_label("'O''Brien'"), "O'Brien");
    }
}
