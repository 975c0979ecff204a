//! Workspace migrations built on config patching.

pub mod vite_build_config;

use monotree_core::MonotreeError;
use serde::Serialize;

pub use vite_build_config::{update_vite_build_config, ViteBuildConfigMigration};

/// Per-project result of a migration run
#[derive(Debug, Default, Serialize)]
pub struct MigrationReport {
    /// Projects whose files were changed
    pub updated: Vec<String>,
    /// Projects that were already migrated
    pub unchanged: Vec<String>,
    /// Projects that need manual attention
    #[serde(serialize_with = "serialize_failures")]
    pub failures: Vec<(String, MonotreeError)>,
}

impl MigrationReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

fn serialize_failures<S>(failures: &[(String, MonotreeError)], serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    use serde::ser::SerializeMap;
    let mut map = serializer.serialize_map(Some(failures.len()))?;
    for (project, error) in failures {
        map.serialize_entry(project, &error.to_string())?;
    }
    map.end()
}
