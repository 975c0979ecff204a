//! The file set of a single project move and the path arithmetic around it.

use crate::registry::ProjectRegistry;
use monotree_core::{Result, ToolConfig};
use monotree_tree::{StagedTree, TreePath};

/// One project leaving `old_root` for `new_root`.
///
/// A project at the workspace root does not own the whole workspace: only
/// the configured root entries move, and the roots of every other project
/// stay where they are.
#[derive(Debug, Clone)]
pub struct ProjectMove {
    pub old_name: String,
    pub new_name: String,
    pub old_root: TreePath,
    pub new_root: TreePath,
    pub old_import_path: Option<String>,
    pub new_import_path: Option<String>,
    entries: Vec<TreePath>,
    excluded: Vec<TreePath>,
    output_dir: String,
}

impl ProjectMove {
    pub fn new(
        registry: &ProjectRegistry,
        tree: &StagedTree,
        config: &ToolConfig,
        project: &str,
        new_name: &str,
        new_root: TreePath,
    ) -> Result<Self> {
        let old_root = registry.require(project)?.root.clone();

        let entries = if old_root.is_root() {
            tree.children(&old_root)?
                .into_iter()
                .filter(|child| {
                    child.file_name().is_some_and(|name| {
                        config.workspace.root_project_entries.iter().any(|entry| entry == name)
                    })
                })
                .collect()
        } else {
            vec![old_root.clone()]
        };

        let excluded = registry
            .projects_below(&old_root)
            .into_iter()
            .map(|nested| nested.root.clone())
            .collect();

        Ok(Self {
            old_name: project.to_string(),
            new_name: new_name.to_string(),
            old_root,
            new_root,
            old_import_path: None,
            new_import_path: None,
            entries,
            excluded,
            output_dir: config.workspace.output_dir.clone(),
        })
    }

    pub fn is_rename(&self) -> bool {
        self.old_name != self.new_name
    }

    /// Check whether `path` is part of the moving file set.
    pub fn contains(&self, path: &TreePath) -> bool {
        self.entries.iter().any(|entry| path.starts_with(entry))
            && !self.excluded.iter().any(|nested| path.starts_with(nested))
    }

    /// Where a moving path ends up. `None` for paths that stay.
    pub fn relocate(&self, path: &TreePath) -> Option<TreePath> {
        if !self.contains(path) {
            return None;
        }
        let rest = path.strip_prefix(&self.old_root)?;
        Some(self.new_root.join_path(&rest))
    }

    /// Every file that moves, in path order.
    pub fn files(&self, tree: &StagedTree) -> Result<Vec<TreePath>> {
        let mut files = Vec::new();
        for entry in &self.entries {
            files.extend(
                tree.walk_files(entry)?
                    .into_iter()
                    .filter(|file| self.contains(file)),
            );
        }
        Ok(files)
    }

    /// Rewrite a workspace-relative path string, such as a target option,
    /// that points into the moving file set.
    ///
    /// For a nested project the old root is replaced wherever it appears on
    /// segment boundaries, which also covers output paths like
    /// `dist/libs/ui`. For the root project, paths whose first segment is a
    /// moving entry get the new root prepended and `<output>/<name>` becomes
    /// `<output>/<new root>`.
    pub fn rewrite_path_string(&self, value: &str) -> Option<String> {
        if self.old_root.is_root() {
            self.rewrite_root_project_path(value)
        } else {
            self.rewrite_nested_path(value)
        }
    }

    fn rewrite_nested_path(&self, value: &str) -> Option<String> {
        let old: Vec<&str> = self.old_root.segments().iter().map(String::as_str).collect();
        let new = self.new_root.to_string();
        let parts: Vec<&str> = value.split('/').collect();

        let mut out: Vec<String> = Vec::with_capacity(parts.len());
        let mut changed = false;
        let mut i = 0;
        while i < parts.len() {
            if parts[i..].starts_with(&old) && !self.is_excluded_tail(&parts[i..]) {
                out.push(new.clone());
                i += old.len();
                changed = true;
            } else {
                out.push(parts[i].to_string());
                i += 1;
            }
        }

        changed.then(|| out.join("/"))
    }

    /// A match whose continuation lands inside a nested project that stays.
    fn is_excluded_tail(&self, parts: &[&str]) -> bool {
        match TreePath::new(&parts.join("/")) {
            Ok(path) => self.excluded.iter().any(|nested| path.starts_with(nested)),
            Err(_) => false,
        }
    }

    fn rewrite_root_project_path(&self, value: &str) -> Option<String> {
        let had_dot_prefix = value.starts_with("./");
        let trimmed = value.trim_start_matches("./");

        let output_prefix = format!("{}/{}", self.output_dir, self.old_name);
        if trimmed == output_prefix || trimmed.starts_with(&format!("{}/", output_prefix)) {
            let rest = &trimmed[output_prefix.len()..];
            return Some(format!("{}/{}{}", self.output_dir, self.new_root, rest));
        }

        if trimmed.is_empty() || trimmed.contains("://") {
            return None;
        }
        let path = TreePath::new(trimmed).ok()?;
        if path.is_root() || !self.contains(&path) {
            return None;
        }

        let relocated = self.new_root.join_path(&path).to_string();
        let relocated = if trimmed.ends_with('/') {
            format!("{}/", relocated)
        } else {
            relocated
        };
        Some(if had_dot_prefix {
            format!("./{}", relocated)
        } else {
            relocated
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::path::Path;
    use tempfile::TempDir;

    fn write(root: &Path, path: &str, content: &str) {
        let full = root.join(path);
        fs::create_dir_all(full.parent().unwrap()).unwrap();
        fs::write(full, content).unwrap();
    }

    fn p(path: &str) -> TreePath {
        TreePath::new(path).unwrap()
    }

    fn standalone() -> TempDir {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "project.json", r#"{ "name": "demo" }"#);
        write(dir.path(), "src/main.ts", "");
        write(dir.path(), "README.md", "");
        write(dir.path(), "package.json", "{}");
        write(dir.path(), "shared-ui/project.json", r#"{ "name": "shared-ui" }"#);
        write(dir.path(), "shared-ui/src/index.ts", "");
        dir
    }

    fn root_move(dir: &TempDir) -> ProjectMove {
        let tree = StagedTree::new(dir.path());
        let config = ToolConfig::default();
        let registry = ProjectRegistry::build(&tree, &config).unwrap();
        ProjectMove::new(&registry, &tree, &config, "demo", "demo", p("apps/demo")).unwrap()
    }

    #[test]
    fn test_root_project_moves_only_its_entries() {
        let dir = standalone();
        let mv = root_move(&dir);
        let tree = StagedTree::new(dir.path());

        let files: Vec<String> = mv.files(&tree).unwrap().iter().map(|f| f.to_string()).collect();
        assert_eq!(files, vec!["project.json", "src/main.ts"]);
        assert!(!mv.contains(&p("README.md")));
        assert!(!mv.contains(&p("shared-ui/src/index.ts")));
        assert_eq!(mv.relocate(&p("src/main.ts")), Some(p("apps/demo/src/main.ts")));
    }

    #[test]
    fn test_root_project_path_strings() {
        let dir = standalone();
        let mv = root_move(&dir);

        assert_eq!(mv.rewrite_path_string("src/main.ts").as_deref(), Some("apps/demo/src/main.ts"));
        assert_eq!(mv.rewrite_path_string("./src").as_deref(), Some("./apps/demo/src"));
        assert_eq!(mv.rewrite_path_string("dist/demo").as_deref(), Some("dist/apps/demo"));
        assert_eq!(mv.rewrite_path_string("{projectRoot}/src"), None);
        assert_eq!(mv.rewrite_path_string("production"), None);
        assert_eq!(mv.rewrite_path_string("shared-ui/src"), None);
    }

    #[test]
    fn test_nested_project_path_strings() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "libs/ui/project.json", r#"{ "name": "ui" }"#);
        write(dir.path(), "libs/ui-kit/project.json", r#"{ "name": "ui-kit" }"#);
        let tree = StagedTree::new(dir.path());
        let config = ToolConfig::default();
        let registry = ProjectRegistry::build(&tree, &config).unwrap();
        let mv = ProjectMove::new(&registry, &tree, &config, "ui", "ui", p("packages/ui")).unwrap();

        assert_eq!(mv.rewrite_path_string("libs/ui/src/**/*.ts").as_deref(), Some("packages/ui/src/**/*.ts"));
        assert_eq!(mv.rewrite_path_string("dist/libs/ui").as_deref(), Some("dist/packages/ui"));
        assert_eq!(mv.rewrite_path_string("libs/ui-kit/src"), None);
        assert_eq!(mv.relocate(&p("libs/ui-kit/src/a.ts")), None);
    }
}
