//! Merge Bayesian posterior probabilities into the labels of an ML tree.
//!
//! # Algorithm
//! For each internal clade of the ML tree (preorder):
//! 1. Skip it if it has neither a confidence nor a name (e.g. the root).
//! 2. Key its bipartition against the ML tree's full leaf set.
//! 3. Look the key up in the [`TreeIndex`] of the Bayesian tree, preferring
//!    the Bayesian clade on the same side of the split.
//! 4. If the ML support is below `min_bp` or the matched Bayesian support is
//!    below `min_pp`, blank the label.
//! 5. Otherwise label it `"{ml}/{bayes}"`, with `-` when no Bayesian clade
//!    (or no Bayesian value) was found.
//! 6. Clear the clade's confidence; the merged value now lives in the label.
//!
//! # Example
//! ```text
//! ML:    ((A,B)90,(C,D)85);
//! Bayes: ((A,B)0.99,(C,D)0.5);
//!
//! min_bp = 80, min_pp = 0    → (A,B)"90/0.99", (C,D)"85/0.5"
//! min_bp = 80, min_pp = 0.6  → (A,B)"90/0.99", (C,D) unlabelled
//! ```

use crate::bipartition::BipartitionKey;
use crate::index::TreeIndex;
use crate::support::Confidence;
use crate::tree::PhyloTree;
use itertools::Itertools;

/// Placeholder for the Bayesian side when nothing matched.
pub const MISSING_SUPPORT: &str = "-";

/// Minimum support a clade needs to keep a label.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Thresholds {
    /// Minimum bootstrap proportion, 0–100.
    pub min_bp: u8,
    /// Minimum posterior probability, 0–1.
    pub min_pp: f64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Thresholds { min_bp: 0, min_pp: 0.0 }
    }
}

impl Thresholds {
    fn rejects(&self, ml: Option<Confidence>, bayes: Option<Confidence>) -> bool {
        ml.is_some_and(|c| c.as_f64() < f64::from(self.min_bp))
            || bayes.is_some_and(|c| c.as_f64() < self.min_pp)
    }
}

/// Per-outcome counts over the ML tree's internal clades.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileSummary {
    /// Clades that received a merged label.
    pub annotated: usize,
    /// Clades whose split was found in the Bayesian tree.
    pub matched: usize,
    /// Clades whose split was not found in the Bayesian tree.
    pub unmatched: usize,
    /// Clades whose label was cleared by a threshold.
    pub filtered: usize,
    /// Clades left untouched (no confidence and no name).
    pub skipped: usize,
}

/// Relabel `ml` in place using supports looked up in `bayes`.
pub fn reconcile(ml: &mut PhyloTree, bayes: &TreeIndex, thresholds: &Thresholds) -> ReconcileSummary {
    let all_leaves = ml.leaf_names();
    let mut summary = ReconcileSummary::default();

    for id in ml.nonterminals() {
        let (ml_conf, ml_name) = {
            let clade = ml.clade(id);
            if clade.confidence.is_none() && clade.name.is_none() {
                summary.skipped += 1;
                continue;
            }
            (clade.confidence, clade.name.clone())
        };

        let inside = ml.subtree_leaf_names(id).into_iter().sorted().collect_vec();
        let key = BipartitionKey::from_leaf_sets(inside.clone(), &all_leaves);
        let found = bayes.find_clade_match(&key, &inside);
        if found.is_some() {
            summary.matched += 1;
        } else {
            summary.unmatched += 1;
            log::debug!("no Bayesian clade matches ML clade {id}");
        }
        let bayes_conf = found.and_then(|hit| hit.confidence());

        let clade = ml.clade_mut(id);
        if thresholds.rejects(ml_conf, bayes_conf) {
            log::debug!("clade {id} below thresholds, clearing label");
            clade.name = None;
            summary.filtered += 1;
        } else {
            clade.name = Some(merge_label(ml_conf, ml_name.as_deref(), bayes_conf));
            summary.annotated += 1;
        }
        clade.confidence = None;
    }

    summary
}

/// Index `bayes` and reconcile `ml` against it.
pub fn reconcile_trees(ml: &mut PhyloTree, bayes: &PhyloTree, thresholds: &Thresholds) -> ReconcileSummary {
    let index = TreeIndex::build(bayes);
    reconcile(ml, &index, thresholds)
}

/// `"{ml}/{bayes}"` where the ML side prefers the confidence over the name.
pub fn merge_label(ml_conf: Option<Confidence>, ml_name: Option<&str>, bayes_conf: Option<Confidence>) -> String {
    let ml_side = match (ml_conf, ml_name) {
        (Some(conf), _) => conf.to_string(),
        (None, Some(name)) => name.to_string(),
        (None, None) => String::new(),
    };
    let bayes_side = bayes_conf.map_or_else(|| MISSING_SUPPORT.to_string(), |c| c.to_string());
    format!("{ml_side}/{bayes_side}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::CladeId;

    fn parse(newick: &str) -> PhyloTree {
        crate::io::newick::parse(newick).unwrap()
    }

    /// Label of the internal clade whose leaves are exactly `leaves` (in order).
    fn label_of(tree: &PhyloTree, leaves: &[&str]) -> Option<String> {
        let id: CladeId = tree
            .nonterminals()
            .into_iter()
            .find(|&id| tree.subtree_leaf_names(id) == leaves)
            .unwrap();
        tree.clade(id).name.clone()
    }

    fn thresholds(min_bp: u8, min_pp: f64) -> Thresholds {
        Thresholds { min_bp, min_pp }
    }

    #[test]
    fn test_concrete_scenario() {
        let bayes = parse("((A,B)0.99,(C,D)0.5);");

        let mut ml = parse("((A,B)90,(C,D)85);");
        let summary = reconcile_trees(&mut ml, &bayes, &thresholds(80, 0.0));
        assert_eq!(label_of(&ml, &["A", "B"]).as_deref(), Some("90/0.99"));
        assert_eq!(label_of(&ml, &["C", "D"]).as_deref(), Some("85/0.5"));
        assert_eq!(summary.annotated, 2);
        assert_eq!(summary.skipped, 1);

        let mut ml = parse("((A,B)90,(C,D)85);");
        let summary = reconcile_trees(&mut ml, &bayes, &thresholds(80, 0.6));
        assert_eq!(label_of(&ml, &["A", "B"]).as_deref(), Some("90/0.99"));
        assert_eq!(label_of(&ml, &["C", "D"]), None);
        assert_eq!(summary.filtered, 1);
    }

    #[test]
    fn test_identical_topology_round_trip() {
        let mut ml = parse("(((A,B)100,(C,D)72)88,(E,F)95);");
        let bayes = parse("((F,E)1.0,((D,C)0.91,(B,A)0.99)0.97);");
        let summary = reconcile_trees(&mut ml, &bayes, &Thresholds::default());

        assert_eq!(label_of(&ml, &["A", "B"]).as_deref(), Some("100/0.99"));
        assert_eq!(label_of(&ml, &["C", "D"]).as_deref(), Some("72/0.91"));
        assert_eq!(label_of(&ml, &["A", "B", "C", "D"]).as_deref(), Some("88/0.97"));
        // Both root children split {E,F} | {A,B,C,D}; each gets its own side
        assert_eq!(label_of(&ml, &["E", "F"]).as_deref(), Some("95/1.0"));

        assert!(ml.nonterminals().iter().all(|&id| ml.clade(id).confidence.is_none()));
        assert_eq!(summary.unmatched, 0);
    }

    #[test]
    fn test_no_match_uses_placeholder() {
        let mut ml = parse("(((A,B)90,C)70,(D,E)80);");
        let bayes = parse("(((A,C)0.9,B)0.8,(D,E)0.7);");
        let summary = reconcile_trees(&mut ml, &bayes, &Thresholds::default());
        assert_eq!(label_of(&ml, &["A", "B"]).as_deref(), Some("90/-"));
        assert_eq!(label_of(&ml, &["D", "E"]).as_deref(), Some("80/0.7"));
        assert_eq!(summary.unmatched, 1);
    }

    #[test]
    fn test_filtering_is_independent_per_side() {
        let mut ml = parse("(((A,B)95,C)99,(D,E)99);");
        let bayes = parse("(((A,B)0.5,C)1.0,(D,E)1.0);");
        let summary = reconcile_trees(&mut ml, &bayes, &thresholds(90, 0.9));
        assert_eq!(label_of(&ml, &["A", "B"]), None);
        assert_eq!(summary.filtered, 1);

        let mut ml = parse("(((A,B)50,C)99,(D,E)99);");
        reconcile_trees(&mut ml, &bayes, &thresholds(90, 0.0));
        assert_eq!(label_of(&ml, &["A", "B"]), None);
    }

    #[test]
    fn test_untouched_nodes_stay_untouched() {
        let mut ml = parse("(((A,B),C)80,(D,E));");
        let bayes = parse("(((A,B)0.9,C)0.8,(D,E)0.7);");
        let summary = reconcile_trees(&mut ml, &bayes, &Thresholds::default());

        for leaves in [&["A", "B"][..], &["D", "E"][..]] {
            let id = ml
                .nonterminals()
                .into_iter()
                .find(|&id| ml.subtree_leaf_names(id) == leaves)
                .unwrap();
            assert_eq!(ml.clade(id).name, None);
            assert_eq!(ml.clade(id).confidence, None);
        }
        assert_eq!(label_of(&ml, &["A", "B", "C"]).as_deref(), Some("80/0.8"));
        // root, (A,B) and (D,E)
        assert_eq!(summary.skipped, 3);
    }

    #[test]
    fn test_named_ml_clade_keeps_name_as_ml_side() {
        let mut ml = parse("(((A,B)Hominini,C)80,(D,E)75);");
        let bayes = parse("(((A,B)0.95,C)0.8,(D,E)0.7);");
        reconcile_trees(&mut ml, &bayes, &thresholds(50, 0.5));
        assert_eq!(label_of(&ml, &["A", "B"]).as_deref(), Some("Hominini/0.95"));
    }

    #[test]
    fn test_unsupported_bayes_match_renders_placeholder() {
        // Split exists in the Bayesian tree but carries no value
        let mut ml = parse("(((A,B)90,C)80,(D,E)75);");
        let bayes = parse("(((A,B),C)0.8,(D,E)0.7);");
        let summary = reconcile_trees(&mut ml, &bayes, &thresholds(0, 0.9));
        assert_eq!(label_of(&ml, &["A", "B"]).as_deref(), Some("90/-"));
        assert_eq!(summary.matched, 3);
    }

    #[test]
    fn test_quoted_taxa_stay_distinct() {
        // 'A B' and AB are two taxa; merging them would move (D,E)'s value onto ('A B',C)
        let mut ml = parse("((('A B',C)90,AB)80,(D,E)70);");
        let bayes = parse("((('A B',AB)0.9,C)0.8,(D,E)0.7);");
        assert_eq!(ml.leaf_names(), vec!["A B", "C", "AB", "D", "E"]);

        let summary = reconcile_trees(&mut ml, &bayes, &Thresholds::default());
        assert_eq!(label_of(&ml, &["A B", "C"]).as_deref(), Some("90/-"));
        assert_eq!(label_of(&ml, &["A B", "C", "AB"]).as_deref(), Some("80/0.8"));
        assert_eq!(label_of(&ml, &["D", "E"]).as_deref(), Some("70/0.7"));
        assert_eq!(summary.unmatched, 1);
    }

    #[test]
    fn test_merge_label() {
        assert_eq!(merge_label(Some(Confidence::Integer(97)), None, Some(Confidence::Real(0.99))), "97/0.99");
        assert_eq!(merge_label(None, Some("clade"), None), "clade/-");
        assert_eq!(merge_label(Some(Confidence::Integer(5)), Some("ignored"), None), "5/-");
        assert_eq!(merge_label(None, None, Some(Confidence::Real(1.0))), "/1.0");
    }
}
