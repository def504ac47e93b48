//! Validated run configuration.

use crate::error::{MapperError, Result};
use crate::io::{BranchLengthStyle, TreeFormat};
use crate::reconcile::Thresholds;
use std::path::{Path, PathBuf};

/// Everything a run needs, checked up front so nothing is read or written
/// when an argument is bad.
#[derive(Debug, Clone, PartialEq)]
pub struct MapperConfig {
    pub ml_tree: PathBuf,
    pub bayes_tree: PathBuf,
    pub format: TreeFormat,
    pub out: PathBuf,
    pub thresholds: Thresholds,
    pub branch_lengths: BranchLengthStyle,
}

fn existing_file(path: &Path) -> Result<()> {
    if path.is_file() {
        Ok(())
    } else {
        Err(MapperError::invalid_argument(format!("file '{}' does not exist", path.display())))
    }
}

impl MapperConfig {
    /// Validate raw argument values.
    ///
    /// Checks run in order: ML tree exists, Bayesian tree exists, `min_bp`
    /// is in `[0, 100]`, `min_pp` is in `[0, 1]`. The first failure wins.
    pub fn new(
        ml_tree: impl Into<PathBuf>,
        bayes_tree: impl Into<PathBuf>,
        format: TreeFormat,
        out: impl Into<PathBuf>,
        min_bp: i64,
        min_pp: f64,
        branch_lengths: BranchLengthStyle,
    ) -> Result<Self> {
        let ml_tree = ml_tree.into();
        let bayes_tree = bayes_tree.into();
        existing_file(&ml_tree)?;
        existing_file(&bayes_tree)?;

        let min_bp = u8::try_from(min_bp)
            .ok()
            .filter(|bp| *bp <= 100)
            .ok_or_else(|| {
                MapperError::invalid_argument(format!(
                    "minimum BP value '{min_bp}' must be an integer between 0 and 100"
                ))
            })?;
        // NaN fails the range check too
        if !(0.0..=1.0).contains(&min_pp) {
            return Err(MapperError::invalid_argument(format!(
                "minimum PP value '{min_pp}' must be between 0 and 1"
            )));
        }

        Ok(MapperConfig {
            ml_tree,
            bayes_tree,
            format,
            out: out.into(),
            thresholds: Thresholds { min_bp, min_pp },
            branch_lengths,
        })
    }
}
