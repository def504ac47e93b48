//! Canonical, orientation-independent keys for the leaf split of a clade.
//!
//! # What is a bipartition?
//! Every internal branch divides the leaves of a tree into two groups:
//! ```text
//!      root
//!     /    \
//!   {A,B}  {C,D}  ← this branch splits {A,B} | {C,D}
//! ```
//!
//! Two trees inferred independently (ML and Bayesian) list their clades in
//! different orders and may be rooted differently, so the same branch can
//! show up as `{A,B} | {C,D}` in one tree and `{C,D} | {A,B}` in the other.
//!
//! # Canonicalization
//! A key stores both sides, each sorted by taxon name, and the pair itself
//! ordered so that the lexicographically smaller side comes first. Two keys
//! describing the same split are therefore structurally equal no matter
//! which side was computed first or in which order children were visited.
//!
//! # CRITICAL: complement against the whole tree
//! The outside of a clade is `all leaves − leaves under the clade`, computed
//! against the leaf set of the *whole* tree. Building it only from the sibling
//! subtrees of the clade gives wrong answers as soon as a node has more than
//! two children or sits deeper than the root's children.
//!
//! We use taxon NAMES, never node ids: ids are assigned during parsing and
//! differ between files, names do not.

use crate::tree::{CladeId, PhyloTree};
use itertools::Itertools;
use std::collections::HashMap;

/// The split of a tree's leaf set induced by one clade.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BipartitionKey {
    first: Vec<String>,
    second: Vec<String>,
}

impl BipartitionKey {
    /// Build a key from the two sides of a split, in any order.
    pub fn from_sides<I, J, S, T>(inside: I, outside: J) -> Self
    where
        I: IntoIterator<Item = S>,
        J: IntoIterator<Item = T>,
        S: Into<String>,
        T: Into<String>,
    {
        let inside: Vec<String> = inside.into_iter().map(Into::into).sorted().collect();
        let outside: Vec<String> = outside.into_iter().map(Into::into).sorted().collect();
        if inside <= outside {
            BipartitionKey { first: inside, second: outside }
        } else {
            BipartitionKey { first: outside, second: inside }
        }
    }

    /// Key of the split induced by `clade`.
    ///
    /// `all_leaves` must be the leaf names of the whole tree owning `clade`
    /// (see [`PhyloTree::leaf_names`]). Returns `None` when the clade has no
    /// leaf below it.
    pub fn from_clade(tree: &PhyloTree, clade: CladeId, all_leaves: &[String]) -> Option<Self> {
        let inside = tree.subtree_leaf_names(clade);
        if inside.is_empty() {
            return None;
        }
        Some(Self::from_leaf_sets(inside, all_leaves))
    }

    /// `inside` against the complement `all_leaves − inside`.
    ///
    /// Multiset difference: each name under the clade cancels one occurrence
    /// in `all_leaves`, so both sides keep their multiplicities.
    pub fn from_leaf_sets(inside: Vec<String>, all_leaves: &[String]) -> Self {
        let mut remaining: HashMap<&str, usize> = inside.iter().map(String::as_str).counts();
        let outside: Vec<String> = all_leaves
            .iter()
            .filter(|name| match remaining.get_mut(name.as_str()) {
                Some(n) if *n > 0 => {
                    *n -= 1;
                    false
                }
                _ => true,
            })
            .cloned()
            .collect();
        Self::from_sides(inside, outside)
    }

    /// The two sides, smaller (lexicographically) first.
    pub fn sides(&self) -> (&[String], &[String]) {
        (&self.first, &self.second)
    }

    /// Total number of names over both sides.
    pub fn len(&self) -> usize {
        self.first.len() + self.second.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Split equality with an identity fast path.
    #[inline]
    pub fn matches(&self, other: &BipartitionKey) -> bool {
        std::ptr::eq(self, other) || self == other
    }
}
