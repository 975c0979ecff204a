//! Byte-range editing of a parsed source file.

use monotree_core::{MonotreeError, Result};
use monotree_syntax::{SourceLanguage, SourceParser};
use std::ops::Range;
use tree_sitter::{Node, Tree};

/// Replacement of one byte range of the source
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextEdit {
    pub range: Range<usize>,
    pub text: String,
}

impl TextEdit {
    pub fn insert(at: usize, text: impl Into<String>) -> Self {
        Self {
            range: at..at,
            text: text.into(),
        }
    }

    pub fn replace(range: Range<usize>, text: impl Into<String>) -> Self {
        Self {
            range,
            text: text.into(),
        }
    }
}

/// Source text kept in sync with its syntax tree
pub struct ConfigEditor {
    source: String,
    tree: Tree,
    parser: SourceParser,
    origin: String,
}

impl ConfigEditor {
    /// Parse `source`; `origin` names the file in errors.
    pub fn new(source: impl Into<String>, language: SourceLanguage, origin: impl Into<String>) -> Result<Self> {
        let source = source.into();
        let origin = origin.into();
        let mut parser = SourceParser::new(language)?;
        let tree = parser.parse(&source, &origin)?;

        Ok(Self {
            source,
            tree,
            parser,
            origin,
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn origin(&self) -> &str {
        &self.origin
    }

    pub fn root_node(&self) -> Node<'_> {
        self.tree.root_node()
    }

    /// Apply one edit and re-parse.
    ///
    /// An edit that leaves the file unparseable is rejected and the editor
    /// keeps its previous state.
    pub fn apply_edit(&mut self, edit: &TextEdit) -> Result<()> {
        let Range { start, end } = edit.range;
        if start > end
            || end > self.source.len()
            || !self.source.is_char_boundary(start)
            || !self.source.is_char_boundary(end)
        {
            return Err(MonotreeError::invalid_input(format!(
                "edit range {}..{} is outside {}",
                start, end, self.origin
            )));
        }

        let mut updated = String::with_capacity(self.source.len() + edit.text.len());
        updated.push_str(&self.source[..start]);
        updated.push_str(&edit.text);
        updated.push_str(&self.source[end..]);

        let tree = self.parser.parse(&updated, &self.origin)?;
        self.source = updated;
        self.tree = tree;
        Ok(())
    }

    pub fn into_source(self) -> String {
        self.source
    }
}
