//! Converting a single-root workspace into a multi-project layout.

use crate::manifest::{ProjectConfiguration, ProjectType};
use crate::registry::ProjectRegistry;
use crate::relocate::{RelocateRequest, RelocationEngine, RelocationReport};
use monotree_core::{LayoutConfig, MonotreeError, Result, ToolConfig};
use monotree_tree::StagedTree;
use tracing::info;

/// Where applications and libraries go
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayoutScheme {
    pub apps_dir: String,
    pub libs_dir: String,
}

impl LayoutScheme {
    /// An application at the root selects separate apps and libs
    /// directories. Anything else puts every project under packages.
    pub fn for_root_type(root_type: Option<ProjectType>, layout: &LayoutConfig) -> Self {
        if root_type == Some(ProjectType::Application) {
            Self {
                apps_dir: layout.apps_dir.clone(),
                libs_dir: layout.libs_dir.clone(),
            }
        } else {
            Self {
                apps_dir: layout.packages_dir.clone(),
                libs_dir: layout.packages_dir.clone(),
            }
        }
    }

    pub fn directory_for(&self, project_type: Option<ProjectType>) -> &str {
        if project_type == Some(ProjectType::Application) {
            &self.apps_dir
        } else {
            &self.libs_dir
        }
    }

    /// `<dir>/<name>` for the root project, `<dir>/<root>` for the rest.
    pub fn destination_for(&self, project: &ProjectConfiguration) -> String {
        let dir = self.directory_for(project.project_type);
        if project.root.is_root() {
            format!("{}/{}", dir, project.name)
        } else {
            format!("{}/{}", dir, project.root)
        }
    }
}

/// Outcome of a conversion
#[derive(Debug, Clone)]
pub struct MonorepoReport {
    pub scheme: LayoutScheme,
    pub relocations: Vec<RelocationReport>,
}

/// Move every project of the workspace under the layout picked from the
/// root project's type. The root project moves first.
pub fn convert_to_monorepo(tree: &mut StagedTree, config: &ToolConfig) -> Result<MonorepoReport> {
    let registry = ProjectRegistry::build(tree, config)?;
    let root_project = registry.root_project().ok_or_else(|| {
        MonotreeError::invalid_input("workspace has no project at its root to convert")
    })?;

    let scheme = LayoutScheme::for_root_type(root_project.project_type, &config.layout);
    info!(
        "Converting to monorepo: applications under '{}', libraries under '{}'",
        scheme.apps_dir, scheme.libs_dir
    );

    let mut plan = vec![plan_move(&scheme, root_project)];
    plan.extend(
        registry
            .iter()
            .filter(|project| !project.root.is_root())
            .map(|project| plan_move(&scheme, project)),
    );

    let engine = RelocationEngine::new(config);
    let mut relocations = Vec::with_capacity(plan.len());
    for request in &plan {
        relocations.push(engine.relocate(tree, request)?);
    }

    Ok(MonorepoReport { scheme, relocations })
}

fn plan_move(scheme: &LayoutScheme, project: &ProjectConfiguration) -> RelocateRequest {
    RelocateRequest::new(project.name.clone(), scheme.destination_for(project))
        .with_update_import_path(project.project_type == Some(ProjectType::Library))
}

#[cfg(test)]
mod tests {
    use super::*;
    use monotree_tree::TreePath;

    #[test]
    fn test_scheme_from_root_type() {
        let layout = LayoutConfig::default();

        let app = LayoutScheme::for_root_type(Some(ProjectType::Application), &layout);
        assert_eq!(app.directory_for(Some(ProjectType::Application)), "apps");
        assert_eq!(app.directory_for(Some(ProjectType::Library)), "libs");
        assert_eq!(app.directory_for(None), "libs");

        let lib = LayoutScheme::for_root_type(Some(ProjectType::Library), &layout);
        assert_eq!(lib.directory_for(Some(ProjectType::Application)), "packages");
        assert_eq!(lib.directory_for(Some(ProjectType::Library)), "packages");

        assert_eq!(LayoutScheme::for_root_type(None, &layout), lib);
    }

    #[test]
    fn test_destination_for() {
        let scheme = LayoutScheme::for_root_type(Some(ProjectType::Application), &LayoutConfig::default());

        let mut root = ProjectConfiguration::new("demo", TreePath::root());
        root.project_type = Some(ProjectType::Application);
        assert_eq!(scheme.destination_for(&root), "apps/demo");

        let mut lib = ProjectConfiguration::new("shared-ui", TreePath::new("shared-ui").unwrap());
        lib.project_type = Some(ProjectType::Library);
        assert_eq!(scheme.destination_for(&lib), "libs/shared-ui");
    }
}
