//! Crate root: module orchestration and public re-exports.
//!
//! Modules:
//! - `tree`: owned tree adapter (`PhyloTree`) built from any input format.
//! - `support`: bootstrap / posterior support values.
//! - `bipartition`: canonical, order-independent keys for tree splits.
//! - `index`: bipartition lookup over a Bayesian tree.
//! - `reconcile`: merging ML and Bayesian supports into node labels.
//! - `config`: validated run configuration.
//! - `io`: reading and writing Newick, NEXUS, PhyloXML and NeXML files.
//! - `error`: the crate error type.

pub mod bipartition;
pub mod config;
pub mod error;
pub mod index;
pub mod io;
pub mod reconcile;
pub mod support;
pub mod tree;

// Re-export frequently used types & functions
pub use bipartition::BipartitionKey;
pub use config::MapperConfig;
pub use error::{MapperError, Result};
pub use index::TreeIndex;
pub use io::{BranchLengthStyle, TreeFormat, read_tree, write_tree};
pub use reconcile::{ReconcileSummary, Thresholds, reconcile, reconcile_trees};
pub use support::Confidence;
pub use tree::{Clade, CladeId, PhyloTree};
