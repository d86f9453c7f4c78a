use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use crate::errors::ExtractError;
use crate::repo::{CommitRef, RepositoryHandle};

/// How the baseline-side file set is derived from the target's changed paths.
///
/// | Selection            | Baseline set                       |
/// |----------------------|------------------------------------|
/// | `AbsentFromBaseline` | changed(target) \ tree(baseline)   |
/// | `PresentInBaseline`  | changed(target) ∩ tree(baseline)   |
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum BaselineSelection {
    /// Paths the target changed that do not exist at the baseline.
    #[default]
    #[serde(rename = "absent")]
    AbsentFromBaseline,
    /// Paths the target changed that already exist at the baseline.
    #[serde(rename = "present")]
    PresentInBaseline,
}

impl BaselineSelection {
    fn keeps(self, present_in_baseline: bool) -> bool {
        match self {
            BaselineSelection::AbsentFromBaseline => !present_in_baseline,
            BaselineSelection::PresentInBaseline => present_in_baseline,
        }
    }
}

impl fmt::Display for BaselineSelection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BaselineSelection::AbsentFromBaseline => write!(f, "absent"),
            BaselineSelection::PresentInBaseline => write!(f, "present"),
        }
    }
}

impl FromStr for BaselineSelection {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "absent" => Ok(BaselineSelection::AbsentFromBaseline),
            "present" => Ok(BaselineSelection::PresentInBaseline),
            _ => anyhow::bail!(
                "Invalid baseline selection '{}'. Valid values: absent, present",
                s
            ),
        }
    }
}

/// The two file sets pulled for a run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeSet {
    /// Every path the target commit touched relative to its first parent.
    pub target: BTreeSet<String>,
    /// The subset of `target` selected for the baseline tree.
    pub baseline: BTreeSet<String>,
}

impl ChangeSet {
    pub fn compute<H>(
        handle: &H,
        target: &CommitRef,
        baseline: &CommitRef,
        selection: BaselineSelection,
    ) -> Result<Self, ExtractError>
    where
        H: RepositoryHandle + ?Sized,
    {
        let target_paths = handle.changed_paths(target)?;
        let baseline_paths =
            select_baseline(&target_paths, selection, |path| handle.tree_contains(baseline, path))?;
        Ok(Self {
            target: target_paths,
            baseline: baseline_paths,
        })
    }

    pub fn is_empty(&self) -> bool {
        self.target.is_empty()
    }
}

/// Filter `target_paths` by their presence at the baseline.
pub fn select_baseline<F>(
    target_paths: &BTreeSet<String>,
    selection: BaselineSelection,
    mut in_baseline: F,
) -> Result<BTreeSet<String>, ExtractError>
where
    F: FnMut(&str) -> Result<bool, ExtractError>,
{
    let mut selected = BTreeSet::new();
    for path in target_paths {
        if selection.keeps(in_baseline(path)?) {
            selected.insert(path.clone());
        }
    }
    Ok(selected)
}
