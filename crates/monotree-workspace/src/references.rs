//! Reference discovery and rewriting for project moves.
//!
//! References are collected against the tree as it is before any file
//! moves, and applied in place before the files are renamed. Each
//! reference records the file it lives in, the old and new text, and a
//! location precise enough to rewrite it without reparsing the world:
//! a byte span for source files, a JSON pointer for JSON documents.

use crate::json::{escape_pointer_token, read_json, rename_key, update_json, visit_strings};
use crate::moves::ProjectMove;
use crate::registry::ProjectRegistry;
use crate::workspace_config::{mapping_target_path, PathMappings, WorkspaceConfiguration};
use monotree_core::{MonotreeError, Result, ToolConfig};
use monotree_syntax::{as_relative_specifier, is_relative, SourceLanguage, SpecifierScanner};
use monotree_tree::{StagedTree, TreePath};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::ops::Range;
use tracing::{debug, trace, warn};

/// What a reference is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReferenceKind {
    /// A module specifier in a source file
    ImportSpecifier,
    /// A key or target of the root path mappings
    PathMappingEntry,
    /// The workspace default project
    DefaultProjectPointer,
    /// A path inside another project's target options
    TargetOptionPath,
    /// A project name listed under `implicitDependencies`
    ImplicitDependency,
    /// A `./` or `../` path inside a JSON config file
    RelativeConfigPath,
}

impl fmt::Display for ReferenceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ReferenceKind::ImportSpecifier => "import",
            ReferenceKind::PathMappingEntry => "path-mapping",
            ReferenceKind::DefaultProjectPointer => "default-project",
            ReferenceKind::TargetOptionPath => "target-option",
            ReferenceKind::ImplicitDependency => "implicit-dependency",
            ReferenceKind::RelativeConfigPath => "config-path",
        };
        write!(f, "{}", label)
    }
}

/// Where inside its file a reference sits
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReferenceLocation {
    /// Byte range of the text in a source file
    Span(Range<usize>),
    /// JSON pointer to a string value
    JsonValue(String),
    /// JSON pointer to the object holding the key `old_value`
    JsonKey(String),
}

/// A single textual occurrence that has to change when a project moves
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reference {
    pub source_file: TreePath,
    pub kind: ReferenceKind,
    pub old_value: String,
    pub new_value: String,
    pub location: ReferenceLocation,
}

impl fmt::Display for Reference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} [{}] '{}' -> '{}'",
            self.source_file, self.kind, self.old_value, self.new_value
        )
    }
}

/// Read-only view of the workspace used to find references to a project
pub struct ReferenceIndex<'a> {
    registry: &'a ProjectRegistry,
    workspace: &'a WorkspaceConfiguration,
    mappings: &'a PathMappings,
    config: &'a ToolConfig,
}

impl<'a> ReferenceIndex<'a> {
    pub fn new(
        registry: &'a ProjectRegistry,
        workspace: &'a WorkspaceConfiguration,
        mappings: &'a PathMappings,
        config: &'a ToolConfig,
    ) -> Self {
        Self {
            registry,
            workspace,
            mappings,
            config,
        }
    }

    /// The path mapping key other projects import the moving project by:
    /// the first non-wildcard key whose targets all move with it.
    pub fn import_path_of(&self, mv: &ProjectMove) -> Option<String> {
        self.mappings
            .entries()
            .filter(|(key, targets)| !key.contains('*') && !targets.is_empty())
            .find(|(_, targets)| {
                targets.iter().all(|target| {
                    mapping_target_path(target).is_ok_and(|path| self.moves_with(mv, &path))
                })
            })
            .map(|(key, _)| key.clone())
    }

    /// Every reference a move has to rewrite.
    ///
    /// Files inside the moving set always get their relative paths fixed up.
    /// With `external` set, references held by the rest of the workspace are
    /// collected too. Name pointers are collected whenever the project is
    /// renamed.
    pub fn find_references(
        &self,
        tree: &StagedTree,
        mv: &ProjectMove,
        external: bool,
    ) -> Result<Vec<Reference>> {
        let mut refs = Vec::new();

        if external {
            self.path_mapping_references(mv, &mut refs)?;
            self.target_option_references(tree, mv, &mut refs)?;
        }
        if mv.is_rename() {
            self.name_references(tree, mv, &mut refs)?;
        }

        let files = tree.walk_files_where(&TreePath::root(), |dir| {
            dir.file_name().is_none_or(|name| !self.config.is_ignored_dir(name))
        })?;
        let mut scanner = SpecifierScanner::new();

        for file in &files {
            let moving = mv.contains(file);
            if !moving && !external {
                continue;
            }
            match file.extension() {
                Some("json") => self.json_file_references(tree, file, mv, moving, &mut refs)?,
                Some(ext) if self.config.is_source_extension(ext) => {
                    self.source_file_references(tree, &mut scanner, file, mv, moving, external, &mut refs)?
                }
                _ => {}
            }
        }

        debug!(
            "Found {} reference(s) to '{}' ({} -> {})",
            refs.len(),
            mv.old_name,
            mv.old_root,
            mv.new_root
        );
        Ok(refs)
    }

    fn path_mapping_references(&self, mv: &ProjectMove, refs: &mut Vec<Reference>) -> Result<()> {
        let Some(file) = self.mappings.file() else {
            return Ok(());
        };

        for (key, targets) in self.mappings.entries() {
            let key_pointer = format!("/compilerOptions/paths/{}", escape_pointer_token(key));
            let mut owners = BTreeSet::new();

            for (i, target) in targets.iter().enumerate() {
                if let Some(star) = target.find('*') {
                    self.check_wildcard_target(file, key, &target[..star], mv)?;
                    continue;
                }

                let Ok(path) = mapping_target_path(target) else {
                    trace!("Skipping unresolvable mapping target '{}'", target);
                    continue;
                };
                if let Some(owner) = self.registry.project_for_path(&path) {
                    owners.insert(owner.name.clone());
                }
                if let Some(new_path) = self.relocate_module(mv, &path) {
                    let prefix = if target.starts_with("./") { "./" } else { "" };
                    refs.push(Reference {
                        source_file: file.clone(),
                        kind: ReferenceKind::PathMappingEntry,
                        old_value: target.clone(),
                        new_value: format!("{}{}", prefix, new_path),
                        location: ReferenceLocation::JsonValue(format!("{}/{}", key_pointer, i)),
                    });
                }
            }

            if owners.contains(&mv.old_name) && owners.len() > 1 {
                return Err(MonotreeError::ReferenceRewriteAmbiguous {
                    file: file.to_string(),
                    specifier: key.clone(),
                    candidates: owners.into_iter().collect(),
                });
            }

            if let (Some(old), Some(new)) = (&mv.old_import_path, &mv.new_import_path) {
                if !self.targets_move_with(mv, targets) {
                    continue;
                }
                let renamed = if key == old {
                    Some(new.clone())
                } else {
                    key.strip_prefix(old.as_str())
                        .filter(|rest| rest.starts_with('/'))
                        .map(|rest| format!("{}{}", new, rest))
                };
                if let Some(new_key) = renamed.filter(|new_key| new_key != key) {
                    if self.mappings.contains_key(&new_key) {
                        return Err(MonotreeError::invalid_input(format!(
                            "import path '{}' is already mapped in {}",
                            new_key, file
                        )));
                    }
                    refs.push(Reference {
                        source_file: file.clone(),
                        kind: ReferenceKind::PathMappingEntry,
                        old_value: key.clone(),
                        new_value: new_key,
                        location: ReferenceLocation::JsonKey("/compilerOptions/paths".to_string()),
                    });
                }
            }
        }
        Ok(())
    }

    /// A wildcard mapping whose directory covers the old root but not the new
    /// one cannot be rewritten without changing what it means for the other
    /// projects it covers.
    fn check_wildcard_target(
        &self,
        file: &TreePath,
        key: &str,
        prefix: &str,
        mv: &ProjectMove,
    ) -> Result<()> {
        let Ok(dir) = mapping_target_path(prefix.trim_end_matches('/')) else {
            return Ok(());
        };
        if mv.old_root.is_root() || !mv.old_root.starts_with(&dir) || mv.new_root.starts_with(&dir) {
            return Ok(());
        }

        let candidates = self
            .registry
            .iter()
            .filter(|project| !project.root.is_root() && project.root.starts_with(&dir))
            .map(|project| project.name.clone())
            .collect();
        Err(MonotreeError::ReferenceRewriteAmbiguous {
            file: file.to_string(),
            specifier: key.to_string(),
            candidates,
        })
    }

    fn target_option_references(
        &self,
        tree: &StagedTree,
        mv: &ProjectMove,
        refs: &mut Vec<Reference>,
    ) -> Result<()> {
        for project in self.registry.iter().filter(|p| p.name != mv.old_name) {
            let manifest = project.manifest_path(&self.config.workspace)?;
            let document: Value = read_json(tree, &manifest)?;
            let Some(targets) = document.get("targets") else {
                continue;
            };

            visit_strings(targets, "/targets", &mut |pointer, value| {
                if let Some(new_value) = mv.rewrite_path_string(value) {
                    refs.push(Reference {
                        source_file: manifest.clone(),
                        kind: ReferenceKind::TargetOptionPath,
                        old_value: value.to_string(),
                        new_value,
                        location: ReferenceLocation::JsonValue(pointer.to_string()),
                    });
                }
            });
        }
        Ok(())
    }

    fn name_references(
        &self,
        tree: &StagedTree,
        mv: &ProjectMove,
        refs: &mut Vec<Reference>,
    ) -> Result<()> {
        if self.workspace.default_project.as_deref() == Some(mv.old_name.as_str()) {
            refs.push(Reference {
                source_file: WorkspaceConfiguration::path(&self.config.workspace)?,
                kind: ReferenceKind::DefaultProjectPointer,
                old_value: mv.old_name.clone(),
                new_value: mv.new_name.clone(),
                location: ReferenceLocation::JsonValue("/defaultProject".to_string()),
            });
        }

        for project in self.registry.iter().filter(|p| p.name != mv.old_name) {
            let manifest = project.manifest_path(&self.config.workspace)?;
            let document: Value = read_json(tree, &manifest)?;
            let Some(deps) = document.get("implicitDependencies").and_then(Value::as_array) else {
                continue;
            };

            for (i, dep) in deps.iter().enumerate() {
                let Some(dep) = dep.as_str() else {
                    continue;
                };
                let (negation, name) = match dep.strip_prefix('!') {
                    Some(name) => ("!", name),
                    None => ("", dep),
                };
                if name == mv.old_name {
                    refs.push(Reference {
                        source_file: manifest.clone(),
                        kind: ReferenceKind::ImplicitDependency,
                        old_value: dep.to_string(),
                        new_value: format!("{}{}", negation, mv.new_name),
                        location: ReferenceLocation::JsonValue(format!("/implicitDependencies/{}", i)),
                    });
                }
            }
        }
        Ok(())
    }

    /// Relative paths in JSON files: those of moving files that point out of
    /// the moving set, and those of tsconfig files elsewhere that point in.
    fn json_file_references(
        &self,
        tree: &StagedTree,
        file: &TreePath,
        mv: &ProjectMove,
        moving: bool,
        refs: &mut Vec<Reference>,
    ) -> Result<()> {
        if !moving && !file.file_name().is_some_and(|name| name.starts_with("tsconfig")) {
            return Ok(());
        }

        let document: Value = read_json(tree, file)?;

        let is_mappings_file = self.mappings.file() == Some(file);
        visit_strings(&document, "", &mut |pointer, value| {
            if !is_relative(value) || (is_mappings_file && pointer.starts_with("/compilerOptions/paths/")) {
                return;
            }
            if let Some(new_value) = self.rewrite_relative(file, value, mv, moving) {
                refs.push(Reference {
                    source_file: file.clone(),
                    kind: ReferenceKind::RelativeConfigPath,
                    old_value: value.to_string(),
                    new_value,
                    location: ReferenceLocation::JsonValue(pointer.to_string()),
                });
            }
        });
        Ok(())
    }

    fn source_file_references(
        &self,
        tree: &StagedTree,
        scanner: &mut SpecifierScanner,
        file: &TreePath,
        mv: &ProjectMove,
        moving: bool,
        external: bool,
        refs: &mut Vec<Reference>,
    ) -> Result<()> {
        let Some(language) = file.extension().and_then(SourceLanguage::from_extension) else {
            trace!("No grammar for {}, skipping", file);
            return Ok(());
        };
        let content = match tree.read_to_string(file) {
            Ok(content) => content,
            Err(e) => {
                trace!("Skipping unreadable source {}: {}", file, e);
                return Ok(());
            }
        };

        for specifier in scanner.scan(&content, language, &file.to_string())? {
            let new_value = if specifier.is_relative() {
                self.rewrite_relative(file, &specifier.value, mv, moving)
            } else if external {
                self.rewrite_bare(&specifier.value, mv)
            } else {
                None
            };

            if let Some(new_value) = new_value {
                refs.push(Reference {
                    source_file: file.clone(),
                    kind: ReferenceKind::ImportSpecifier,
                    old_value: specifier.value,
                    new_value,
                    location: ReferenceLocation::Span(specifier.range),
                });
            }
        }
        Ok(())
    }

    /// A relative path breaks when exactly one of its two ends moves.
    fn rewrite_relative(
        &self,
        file: &TreePath,
        value: &str,
        mv: &ProjectMove,
        moving: bool,
    ) -> Option<String> {
        let dir = file.parent()?;
        let target = dir.join(value).ok()?;
        let trailing = if value.ends_with('/') && value.len() > 1 { "/" } else { "" };

        let (new_dir, new_target) = match (moving, self.moves_with(mv, &target)) {
            (false, true) => (dir, self.relocate_module(mv, &target)?),
            (true, false) => (mv.relocate(file)?.parent()?, target),
            _ => return None,
        };

        let relative = as_relative_specifier(&new_target.relative_to(&new_dir));
        let new_value = format!("{}{}", relative.trim_end_matches('/'), trailing);
        (new_value != value).then_some(new_value)
    }

    /// Package-style specifiers: the project's import path and
    /// workspace-rooted paths into a nested project.
    fn rewrite_bare(&self, value: &str, mv: &ProjectMove) -> Option<String> {
        if let (Some(old), Some(new)) = (&mv.old_import_path, &mv.new_import_path) {
            let owned_by_move = self.mappings.key_for_specifier(value).is_some_and(|key| {
                (key == old || key.strip_prefix(old.as_str()).is_some_and(|rest| rest.starts_with('/')))
                    && self.mappings.get(key).is_some_and(|targets| self.targets_move_with(mv, targets))
            });
            if old != new && owned_by_move {
                return Some(format!("{}{}", new, &value[old.len()..]));
            }
        }

        if mv.old_root.is_root() || value.starts_with('@') {
            return None;
        }
        let path = TreePath::new(value).ok()?;
        self.relocate_module(mv, &path).map(|new_path| new_path.to_string())
    }

    /// Whether every target of a mapping entry lies in the moving set. A
    /// wildcard target counts by the directory in front of its `*`.
    fn targets_move_with(&self, mv: &ProjectMove, targets: &[String]) -> bool {
        !targets.is_empty()
            && targets.iter().all(|target| {
                let fixed = target.find('*').map_or(target.as_str(), |star| &target[..star]);
                mapping_target_path(fixed.trim_end_matches('/'))
                    .is_ok_and(|path| !path.is_root() && self.moves_with(mv, &path))
            })
    }

    /// Whether a module path moves, allowing the extension to be omitted.
    fn moves_with(&self, mv: &ProjectMove, path: &TreePath) -> bool {
        mv.contains(path)
            || self.config.workspace.source_extensions.iter().any(|ext| {
                with_extension(path, ext).is_some_and(|candidate| mv.contains(&candidate))
            })
    }

    fn relocate_module(&self, mv: &ProjectMove, path: &TreePath) -> Option<TreePath> {
        if let Some(relocated) = mv.relocate(path) {
            return Some(relocated);
        }
        let name = path.file_name()?;
        self.config
            .workspace
            .source_extensions
            .iter()
            .filter_map(|ext| with_extension(path, ext))
            .find_map(|candidate| mv.relocate(&candidate))
            .and_then(|relocated| relocated.parent()?.join(name).ok())
    }
}

fn with_extension(path: &TreePath, ext: &str) -> Option<TreePath> {
    let name = path.file_name()?;
    path.parent()?.join(&format!("{}.{}", name, ext)).ok()
}

/// Apply collected references to the staged tree.
///
/// Source files are edited from the last span to the first so earlier
/// offsets stay valid. JSON files are rewritten through their parsed
/// document, values first and key renames last. Returns the number of
/// references applied.
pub fn apply_references(tree: &mut StagedTree, refs: &[Reference]) -> Result<usize> {
    let mut by_file: BTreeMap<&TreePath, Vec<&Reference>> = BTreeMap::new();
    for reference in refs {
        by_file.entry(&reference.source_file).or_default().push(reference);
    }

    let mut applied = 0;
    for (file, file_refs) in by_file {
        let (spans, json): (Vec<&Reference>, Vec<&Reference>) = file_refs
            .into_iter()
            .partition(|r| matches!(r.location, ReferenceLocation::Span(_)));

        if !spans.is_empty() {
            applied += apply_span_edits(tree, file, spans)?;
        }
        if !json.is_empty() {
            applied += apply_json_edits(tree, file, json)?;
        }
    }
    Ok(applied)
}

fn apply_span_edits(tree: &mut StagedTree, file: &TreePath, mut refs: Vec<&Reference>) -> Result<usize> {
    let mut content = tree.read_to_string(file)?;
    refs.sort_by_key(|r| match &r.location {
        ReferenceLocation::Span(range) => std::cmp::Reverse(range.start),
        _ => std::cmp::Reverse(0),
    });

    for reference in &refs {
        let ReferenceLocation::Span(range) = &reference.location else {
            continue;
        };
        if content.get(range.clone()) != Some(reference.old_value.as_str()) {
            return Err(MonotreeError::invalid_input(format!(
                "stale reference '{}' in {} at {:?}",
                reference.old_value, file, range
            )));
        }
        content.replace_range(range.clone(), &reference.new_value);
    }

    tree.write(file, content)?;
    Ok(refs.len())
}

fn apply_json_edits(tree: &mut StagedTree, file: &TreePath, refs: Vec<&Reference>) -> Result<usize> {
    let mut applied = 0;
    update_json(tree, file, |document| {
        for reference in &refs {
            if let ReferenceLocation::JsonValue(pointer) = &reference.location {
                match document.pointer_mut(pointer) {
                    Some(Value::String(value)) if *value == reference.old_value => {
                        *value = reference.new_value.clone();
                        applied += 1;
                    }
                    _ => warn!("Reference at {}{} no longer matches, skipped", file, pointer),
                }
            }
        }
        for reference in &refs {
            if let ReferenceLocation::JsonKey(pointer) = &reference.location {
                if rename_key(document, pointer, &reference.old_value, &reference.new_value) {
                    applied += 1;
                } else {
                    warn!("Key '{}' missing at {}{}, skipped", reference.old_value, file, pointer);
                }
            }
        }
        Ok(())
    })?;
    Ok(applied)
}
