//! Tree-sitter parsing for JavaScript and TypeScript sources.

use anyhow::Context;
use monotree_core::{MonotreeError, Result};
use monotree_tree::TreePath;
use tree_sitter::{Language, Parser, Tree};

/// Grammar used for a source file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceLanguage {
    /// `.ts`, `.mts`, `.cts`
    TypeScript,
    /// `.tsx` and every JavaScript flavour
    Tsx,
}

impl SourceLanguage {
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext {
            "ts" | "mts" | "cts" => Some(Self::TypeScript),
            "tsx" | "js" | "jsx" | "mjs" | "cjs" => Some(Self::Tsx),
            _ => None,
        }
    }

    pub fn for_path(path: &TreePath) -> Result<Self> {
        path.extension()
            .and_then(Self::from_extension)
            .ok_or_else(|| {
                MonotreeError::invalid_input(format!("{} is not a JavaScript or TypeScript file", path))
            })
    }

    pub fn language(&self) -> Language {
        match self {
            Self::TypeScript => tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into(),
            Self::Tsx => tree_sitter_typescript::LANGUAGE_TSX.into(),
        }
    }
}

/// Thin wrapper around a tree-sitter parser bound to one grammar
pub struct SourceParser {
    parser: Parser,
    language: SourceLanguage,
}

impl SourceParser {
    pub fn new(language: SourceLanguage) -> Result<Self> {
        let mut parser = Parser::new();
        parser
            .set_language(&language.language())
            .context("Failed to set parser language")?;

        Ok(Self { parser, language })
    }

    /// Parse source code, rejecting trees that contain syntax errors.
    ///
    /// `origin` only names the source in error messages.
    pub fn parse(&mut self, source: &str, origin: &str) -> Result<Tree> {
        let tree = self
            .parser
            .parse(source, None)
            .context("Failed to parse source code")?;

        if tree.root_node().has_error() {
            return Err(MonotreeError::parse(origin, first_error_location(&tree)));
        }
        Ok(tree)
    }

    pub fn language(&self) -> SourceLanguage {
        self.language
    }
}

fn first_error_location(tree: &Tree) -> String {
    let mut cursor = tree.walk();
    let mut stack = vec![tree.root_node()];
    while let Some(node) = stack.pop() {
        if node.is_error() || node.is_missing() {
            let pos = node.start_position();
            return format!("syntax error at line {}, column {}", pos.row + 1, pos.column + 1);
        }
        if node.has_error() {
            let children: Vec<_> = node.children(&mut cursor).collect();
            stack.extend(children.into_iter().rev());
        }
    }
    "syntax error".to_string()
}
