//! Idempotent patching of configuration object literals.
//!
//! A [`ConfigPatch`] is a list of dotted property paths with the value each
//! should hold. Every entry is planned against the current syntax tree and
//! turned into at most one text edit, so unrelated text (comments, blank
//! lines, property order) is left exactly as it was. Paths that already
//! hold the desired value produce no edit, which makes re-running a patch
//! a no-op.

use crate::editor::{ConfigEditor, TextEdit};
use crate::imports::ensure_named_import;
use crate::locator::ObjectLocator;
use crate::style::{comma_after, detect_quote, members, ObjectStyle};
use crate::value::{property_key, render_key, render_object, PatchValue};
use monotree_core::{MonotreeError, Result};
use monotree_syntax::SourceLanguage;
use monotree_tree::{StagedTree, TreePath};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;
use tracing::{debug, info, warn};
use tree_sitter::Node;

/// What to do when a path already holds a different value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PatchMode {
    /// Recurse into objects key by key; replace anything else
    #[default]
    Merge,
    /// Leave existing values alone
    Skip,
    /// Replace the existing value wholesale
    Replace,
    /// Add the value to the array at the path unless it already holds it
    Append,
}

impl FromStr for PatchMode {
    type Err = MonotreeError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "merge" => Ok(Self::Merge),
            "skip" => Ok(Self::Skip),
            "replace" => Ok(Self::Replace),
            "append" => Ok(Self::Append),
            other => Err(MonotreeError::invalid_input(format!(
                "unknown patch mode '{}' (expected merge, skip, replace or append)",
                other
            ))),
        }
    }
}

/// Result of applying one entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PatchOutcome {
    /// Already held the desired value
    Unchanged,
    /// The property did not exist and was added
    Inserted,
    /// An existing value was changed
    Updated,
    /// An existing different value was kept
    Skipped,
    /// A non-object value sits in the middle of the path
    Unmergeable,
}

impl PatchOutcome {
    pub fn is_change(&self) -> bool {
        matches!(self, Self::Inserted | Self::Updated)
    }

    fn combine(outcomes: &[PatchOutcome]) -> Self {
        if outcomes.iter().any(PatchOutcome::is_change) {
            Self::Updated
        } else if outcomes.contains(&Self::Unmergeable) {
            Self::Unmergeable
        } else if outcomes.contains(&Self::Skipped) {
            Self::Skipped
        } else {
            Self::Unchanged
        }
    }
}

impl fmt::Display for PatchOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Unchanged => "unchanged",
            Self::Inserted => "inserted",
            Self::Updated => "updated",
            Self::Skipped => "skipped",
            Self::Unmergeable => "unmergeable",
        };
        f.write_str(s)
    }
}

/// One property path and its desired value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatchEntry {
    pub path: Vec<String>,
    pub value: PatchValue,
    pub mode: PatchMode,
}

impl PatchEntry {
    pub fn dotted_path(&self) -> String {
        self.path.join(".")
    }
}

/// A named import the patched values rely on
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamedImport {
    pub name: String,
    pub module: String,
}

/// Ordered set of property assignments for one object literal
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConfigPatch {
    entries: Vec<PatchEntry>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    imports: Vec<NamedImport>,
}

impl ConfigPatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an entry in [`PatchMode::Merge`].
    pub fn set(self, path: &str, value: PatchValue) -> Self {
        self.set_with_mode(path, value, PatchMode::Merge)
    }

    pub fn set_with_mode(mut self, path: &str, value: PatchValue, mode: PatchMode) -> Self {
        self.entries.push(PatchEntry {
            path: path.split('.').map(str::to_string).collect(),
            value,
            mode,
        });
        self
    }

    /// Add an entry in [`PatchMode::Append`].
    pub fn append(self, path: &str, value: PatchValue) -> Self {
        self.set_with_mode(path, value, PatchMode::Append)
    }

    /// Require `import { name } from 'module'` in the patched file.
    pub fn import(mut self, name: &str, module: &str) -> Self {
        self.imports.push(NamedImport {
            name: name.to_string(),
            module: module.to_string(),
        });
        self
    }

    pub fn entries(&self) -> &[PatchEntry] {
        &self.entries
    }

    pub fn imports(&self) -> &[NamedImport] {
        &self.imports
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty() && self.imports.is_empty()
    }
}

/// Outcome of one entry, keyed by its dotted path
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryOutcome {
    pub path: String,
    pub outcome: PatchOutcome,
}

/// Result of patching one file in a staged tree
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatchReport {
    pub file: TreePath,
    pub outcomes: Vec<EntryOutcome>,
    pub changed: bool,
}

/// A file, the object to patch in it, and the patch
#[derive(Debug, Clone)]
pub struct CodemodTarget {
    pub file: TreePath,
    pub locator: ObjectLocator,
    pub patch: ConfigPatch,
}

/// Per-file result of a batch run
#[derive(Debug)]
pub struct FileResult {
    pub file: TreePath,
    pub result: Result<PatchReport>,
}

/// Patch the object `locator` finds in `file` and stage the new content.
///
/// The file is only written when its content actually changes.
pub fn apply_config_patch(
    tree: &mut StagedTree,
    file: &TreePath,
    locator: &ObjectLocator,
    patch: &ConfigPatch,
) -> Result<PatchReport> {
    if !tree.is_file(file) {
        return Err(MonotreeError::not_found("File", file.to_string()));
    }
    let language = SourceLanguage::for_path(file)?;
    let source = tree.read_to_string(file)?;

    let (updated, outcomes) = patch_source(&source, language, &file.to_string(), locator, patch)?;
    let changed = updated != source;
    if changed {
        tree.write(file, updated)?;
        info!(file = %file, "Patched configuration");
    } else {
        debug!(file = %file, "Configuration already up to date");
    }

    Ok(PatchReport {
        file: file.clone(),
        outcomes,
        changed,
    })
}

/// Patch several files, collecting one result per file.
///
/// A failure on one file is logged and recorded; the remaining files are
/// still processed.
pub fn apply_config_patches(tree: &mut StagedTree, targets: &[CodemodTarget]) -> Vec<FileResult> {
    targets
        .iter()
        .map(|target| {
            let result = apply_config_patch(tree, &target.file, &target.locator, &target.patch);
            if let Err(e) = &result {
                warn!(file = %target.file, error = %e, "Could not patch file, it needs manual attention");
            }
            FileResult {
                file: target.file.clone(),
                result,
            }
        })
        .collect()
}

/// Apply `patch` to source text, returning the new text and the outcome of
/// every entry.
///
/// Imports are added after the entries, and only when some entry holds its
/// value afterwards; a patch that was skipped everywhere imports nothing.
pub fn patch_source(
    source: &str,
    language: SourceLanguage,
    origin: &str,
    locator: &ObjectLocator,
    patch: &ConfigPatch,
) -> Result<(String, Vec<EntryOutcome>)> {
    let mut editor = ConfigEditor::new(source, language, origin)?;
    locate(&editor, locator)?;

    let mut outcomes = Vec::with_capacity(patch.entries().len());
    for entry in patch.entries() {
        if entry.path.iter().any(String::is_empty) {
            return Err(MonotreeError::invalid_input(format!(
                "invalid property path '{}'",
                entry.dotted_path()
            )));
        }
        let outcome = apply_entry(&mut editor, locator, &entry.path, &entry.value, entry.mode)?;
        debug!(file = origin, path = %entry.dotted_path(), %outcome, "Applied patch entry");
        outcomes.push(EntryOutcome {
            path: entry.dotted_path(),
            outcome,
        });
    }

    let applied = patch.entries().is_empty()
        || outcomes
            .iter()
            .any(|o| !matches!(o.outcome, PatchOutcome::Skipped | PatchOutcome::Unmergeable));
    if applied {
        for import in patch.imports() {
            let outcome = ensure_named_import(&mut editor, &import.name, &import.module)?;
            debug!(file = origin, import = %import.name, %outcome, "Applied import");
            outcomes.push(EntryOutcome {
                path: format!("import {}", import.name),
                outcome,
            });
        }
    }

    Ok((editor.into_source(), outcomes))
}

enum Step {
    Done(PatchOutcome),
    Edit(TextEdit, PatchOutcome),
    MergeKeys(Vec<(String, Value)>),
}

struct Property<'t> {
    node: Node<'t>,
    /// `None` for shorthand properties
    value: Option<Node<'t>>,
}

fn locate<'e>(editor: &'e ConfigEditor, locator: &ObjectLocator) -> Result<Node<'e>> {
    locator
        .find(editor.root_node(), editor.source())
        .ok_or_else(|| MonotreeError::TargetObjectNotFound {
            path: editor.origin().to_string(),
            locator: locator.to_string(),
        })
}

fn apply_entry(
    editor: &mut ConfigEditor,
    locator: &ObjectLocator,
    path: &[String],
    value: &PatchValue,
    mode: PatchMode,
) -> Result<PatchOutcome> {
    match plan(editor, locator, path, value, mode)? {
        Step::Done(outcome) => Ok(outcome),
        Step::Edit(edit, outcome) => {
            editor.apply_edit(&edit)?;
            Ok(outcome)
        }
        Step::MergeKeys(children) => {
            let mut outcomes = Vec::with_capacity(children.len());
            for (key, child) in children {
                let mut child_path = path.to_vec();
                child_path.push(key);
                let child = PatchValue::Literal(child);
                outcomes.push(apply_entry(editor, locator, &child_path, &child, mode)?);
            }
            Ok(PatchOutcome::combine(&outcomes))
        }
    }
}

/// Decide the single edit (if any) `path = value` needs in the current tree.
fn plan(
    editor: &ConfigEditor,
    locator: &ObjectLocator,
    path: &[String],
    value: &PatchValue,
    mode: PatchMode,
) -> Result<Step> {
    let source = editor.source();
    let quote = detect_quote(editor.root_node(), source);
    let mut object = locate(editor, locator)?;

    for (depth, key) in path.iter().enumerate() {
        let style = ObjectStyle::detect(object, source, quote);
        let rest = &path[depth + 1..];

        let Some(property) = find_property(object, key, source) else {
            let edit = match mode {
                PatchMode::Append => {
                    let leaf_style = rest.iter().fold(style.clone(), |s, _| s.nested());
                    let array = PatchValue::raw(format!("[{}]", value.render(&leaf_style)));
                    insertion(object, source, &style, key, rest, &array)
                }
                _ => insertion(object, source, &style, key, rest, value),
            };
            return Ok(Step::Edit(edit, PatchOutcome::Inserted));
        };
        if rest.is_empty() {
            return Ok(leaf_step(&property, source, &style, key, value, mode));
        }
        match property.value.filter(|v| v.kind() == "object") {
            Some(nested) => object = nested,
            None => return Ok(Step::Done(PatchOutcome::Unmergeable)),
        }
    }

    Err(MonotreeError::invalid_input("empty property path"))
}

fn leaf_step(
    property: &Property<'_>,
    source: &str,
    style: &ObjectStyle,
    key: &str,
    value: &PatchValue,
    mode: PatchMode,
) -> Step {
    let Some(existing) = property.value else {
        // `{ key }` shorthand
        match mode {
            PatchMode::Skip => return Step::Done(PatchOutcome::Skipped),
            PatchMode::Append => return Step::Done(PatchOutcome::Unmergeable),
            _ => {}
        }
        let text = format!("{}: {}", render_key(key, style), value.render(style));
        return Step::Edit(TextEdit::replace(property.node.byte_range(), text), PatchOutcome::Updated);
    };

    if mode == PatchMode::Append {
        return append_step(existing, source, style.quote, value);
    }
    if value.matches(existing, source) {
        return Step::Done(PatchOutcome::Unchanged);
    }

    match mode {
        PatchMode::Skip => Step::Done(PatchOutcome::Skipped),
        PatchMode::Merge if existing.kind() == "object" && value.as_object().is_some() => {
            let children = value
                .as_object()
                .map(|map| map.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
                .unwrap_or_default();
            Step::MergeKeys(children)
        }
        PatchMode::Merge | PatchMode::Replace | PatchMode::Append => Step::Edit(
            TextEdit::replace(existing.byte_range(), value.render(style)),
            PatchOutcome::Updated,
        ),
    }
}

/// Add `value` as the last element of `array` unless an element already is it.
fn append_step(array: Node<'_>, source: &str, quote: char, value: &PatchValue) -> Step {
    if array.kind() != "array" {
        return Step::Done(PatchOutcome::Unmergeable);
    }
    let elements = members(array);
    if elements.iter().any(|element| value.same_entry(*element, source)) {
        return Step::Done(PatchOutcome::Unchanged);
    }

    let style = ObjectStyle::detect(array, source, quote);
    let element = value.render(&style);
    let edit = match elements.last() {
        Some(last) => after_last_member(*last, source, &style, &element),
        None => TextEdit::replace(array.byte_range(), format!("[{}]", element)),
    };
    Step::Edit(edit, PatchOutcome::Updated)
}

fn find_property<'t>(object: Node<'t>, key: &str, source: &str) -> Option<Property<'t>> {
    // Later duplicates win, as they do at runtime
    members(object)
        .into_iter()
        .filter_map(|member| match member.kind() {
            "pair" => {
                let name = property_key(member.child_by_field_name("key")?, source)?;
                (name == key).then(|| Property {
                    node: member,
                    value: member.child_by_field_name("value"),
                })
            }
            "shorthand_property_identifier" => {
                (&source[member.byte_range()] == key).then_some(Property {
                    node: member,
                    value: None,
                })
            }
            _ => None,
        })
        .last()
}

/// Edit adding `key` (and the missing `rest` of the path) to `object`.
fn insertion(
    object: Node<'_>,
    source: &str,
    style: &ObjectStyle,
    key: &str,
    rest: &[String],
    value: &PatchValue,
) -> TextEdit {
    let members = members(object);
    let style = if members.is_empty() {
        ObjectStyle {
            multiline: true,
            ..style.clone()
        }
    } else {
        style.clone()
    };
    let property = format!("{}: {}", render_key(key, &style), render_path(rest, value, &style));
    let terminator = if style.trailing_comma { "," } else { "" };

    let Some(last) = members.last().copied() else {
        let inner = &source[object.start_byte() + 1..object.end_byte() - 1];
        if inner.trim().is_empty() {
            let entries = [(render_key(key, &style), render_path(rest, value, &style))];
            return TextEdit::replace(object.byte_range(), render_object(&entries, &style));
        }
        // Only comments inside
        return TextEdit::insert(
            object.start_byte() + 1,
            format!("{}{}{}{}", style.newline, style.property_indent, property, terminator),
        );
    };

    after_last_member(last, source, &style, &property)
}

/// Edit adding `member` after `last`, the final member of an object or array.
fn after_last_member(last: Node<'_>, source: &str, style: &ObjectStyle, member: &str) -> TextEdit {
    let terminator = if style.trailing_comma { "," } else { "" };
    let comma = comma_after(last);
    if !style.multiline {
        return match comma {
            Some(comma) => TextEdit::insert(comma.end_byte(), format!(" {},", member)),
            None => TextEdit::insert(last.end_byte(), format!(", {}", member)),
        };
    }

    // Insert after the last member's line, keeping an end-of-line comment
    // on the line it annotates.
    let anchor_node = comma.unwrap_or(last);
    let row = anchor_node.end_position().row;
    let mut anchor = anchor_node.end_byte();
    let mut sibling = anchor_node.next_sibling();
    while let Some(node) = sibling {
        if node.kind() != "comment" || node.start_position().row != row {
            break;
        }
        anchor = node.end_byte();
        sibling = node.next_sibling();
    }

    let mut text = String::new();
    if comma.is_none() {
        text.push(',');
    }
    text.push_str(&source[last.end_byte()..anchor]);
    text.push_str(style.newline);
    text.push_str(&style.property_indent);
    text.push_str(member);
    text.push_str(terminator);
    TextEdit::replace(last.end_byte()..anchor, text)
}

/// Render `value` placed at `rest` below a new property of a `style` object.
fn render_path(rest: &[String], value: &PatchValue, style: &ObjectStyle) -> String {
    let Some((key, tail)) = rest.split_first() else {
        return value.render(style);
    };
    let nested = style.nested();
    let entries = [(render_key(key, &nested), render_path(tail, value, &nested))];
    render_object(&entries, &nested)
}
