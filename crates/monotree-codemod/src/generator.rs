//! Config patching as a generator step.

use crate::locator::ObjectLocator;
use crate::patch::{apply_config_patch, ConfigPatch};
use async_trait::async_trait;
use monotree_core::Result;
use monotree_tree::{StagedTree, TreePath};
use monotree_workspace::{Generator, PostCommitTask};
use tracing::info;

/// Applies one patch to one file
pub struct ConfigPatchGenerator {
    file: TreePath,
    locator: ObjectLocator,
    patch: ConfigPatch,
}

impl ConfigPatchGenerator {
    pub fn new(file: TreePath, locator: ObjectLocator, patch: ConfigPatch) -> Self {
        Self { file, locator, patch }
    }
}

#[async_trait]
impl Generator for ConfigPatchGenerator {
    fn name(&self) -> &str {
        "patch"
    }

    async fn generate(&self, tree: &mut StagedTree) -> Result<Vec<PostCommitTask>> {
        let report = apply_config_patch(tree, &self.file, &self.locator, &self.patch)?;
        for entry in &report.outcomes {
            info!(file = %self.file, path = %entry.path, "{}", entry.outcome);
        }
        Ok(Vec::new())
    }
}
