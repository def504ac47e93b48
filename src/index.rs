//! Lookup of clades by the bipartition they induce.
//!
//! A [`TreeIndex`] is built once over the Bayesian tree and queried once per
//! internal ML node. Entries are kept in preorder.
//!
//! # Several clades, one split
//! In a rooted tree the two children of the root induce the same bipartition:
//! ```text
//!        root
//!       /    \
//!    (A,B)  (C,D)     both split {A,B} | {C,D}
//! ```
//! [`TreeIndex::find_match`] returns the first of them in preorder.
//! [`TreeIndex::find_clade_match`] additionally knows which side the querying
//! clade sits on and prefers the entry whose own leaves are that side, so
//! `(C,D)` is paired with `(C,D)`. Entries that agree on both the split and
//! the side (unary chains) are counted in [`TreeIndex::ambiguous`]; the
//! first one wins.
//!
//! # Performance
//! The ordered entry list is backed by a `HashMap` from key to entry
//! positions, so a query is O(1) on average instead of a linear scan, with
//! the same first-match-wins result.

use crate::bipartition::BipartitionKey;
use crate::support::Confidence;
use crate::tree::{CladeId, PhyloTree};
use itertools::Itertools;
use std::collections::HashMap;
use std::collections::hash_map::Entry;

/// What the index remembers about one internal clade.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexedClade {
    key: BipartitionKey,
    clade: CladeId,
    /// Sorted names of the leaves below the clade.
    inside: Vec<String>,
    confidence: Option<Confidence>,
    name: Option<String>,
}

impl IndexedClade {
    pub fn key(&self) -> &BipartitionKey {
        &self.key
    }

    /// Id of the clade in the indexed tree.
    pub fn clade(&self) -> CladeId {
        self.clade
    }

    pub fn inside(&self) -> &[String] {
        &self.inside
    }

    pub fn confidence(&self) -> Option<Confidence> {
        self.confidence
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }
}

#[derive(Debug, Clone, Default)]
pub struct TreeIndex {
    entries: Vec<IndexedClade>,
    lookup: HashMap<BipartitionKey, Vec<usize>>,
    ambiguous: usize,
}

impl TreeIndex {
    /// Index every internal clade of `tree`.
    pub fn build(tree: &PhyloTree) -> Self {
        let all_leaves = tree.leaf_names();
        let mut index = TreeIndex::default();

        for id in tree.nonterminals() {
            let inside = tree.subtree_leaf_names(id).into_iter().sorted().collect_vec();
            if inside.is_empty() {
                continue;
            }
            let key = BipartitionKey::from_leaf_sets(inside.clone(), &all_leaves);
            let clade = tree.clade(id);
            index.push(IndexedClade {
                key,
                clade: id,
                inside,
                confidence: clade.confidence,
                name: clade.name.clone(),
            });
        }

        if index.ambiguous > 0 {
            log::warn!(
                "{} clade(s) repeat the leaf set of an earlier clade; using the first match",
                index.ambiguous
            );
        }
        index
    }

    fn push(&mut self, entry: IndexedClade) {
        let position = self.entries.len();
        match self.lookup.entry(entry.key.clone()) {
            Entry::Vacant(slot) => {
                slot.insert(vec![position]);
            }
            Entry::Occupied(mut slot) => {
                let same_side = slot.get().iter().any(|&p| self.entries[p].inside == entry.inside);
                if same_side {
                    log::debug!("clade {} repeats an earlier leaf set", entry.clade);
                    self.ambiguous += 1;
                }
                slot.get_mut().push(position);
            }
        }
        self.entries.push(entry);
    }

    /// First indexed clade inducing the same split as `key`.
    pub fn find_match(&self, key: &BipartitionKey) -> Option<&IndexedClade> {
        self.lookup.get(key).and_then(|positions| positions.first()).map(|&pos| &self.entries[pos])
    }

    /// Like [`find_match`](Self::find_match), preferring the first entry whose
    /// own leaves are `inside` (sorted).
    pub fn find_clade_match(&self, key: &BipartitionKey, inside: &[String]) -> Option<&IndexedClade> {
        let positions = self.lookup.get(key)?;
        positions
            .iter()
            .map(|&pos| &self.entries[pos])
            .find(|entry| entry.inside == inside)
            .or_else(|| positions.first().map(|&pos| &self.entries[pos]))
    }

    /// All entries in traversal order.
    pub fn entries(&self) -> &[IndexedClade] {
        &self.entries
    }

    /// Number of entries repeating both the split and the leaf set of an earlier entry.
    pub fn ambiguous(&self) -> usize {
        self.ambiguous
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
