//! Module specifiers of a parsed source file.
//!
//! Only strings in module positions count: the source of `import` and
//! `export ... from` statements, `import x = require(...)`, and the first
//! argument of `require()`, dynamic `import()`, `jest.mock()` and
//! `vi.mock()`. A path-like string inside a comment or an ordinary string
//! literal is never reported, so rewriting a specifier never touches
//! anything else.

use crate::parser::{SourceLanguage, SourceParser};
use monotree_core::Result;
use std::ops::Range;
use tracing::trace;
use tree_sitter::{Node, Tree};

const MODULE_CALLS: &[&str] = &["require", "jest.mock", "vi.mock"];

/// A module specifier found in a source file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Specifier {
    /// The specifier text without quotes
    pub value: String,
    /// Byte range of the specifier text inside the file
    pub range: Range<usize>,
}

impl Specifier {
    /// `./x`, `../x`, `.` and `..`
    pub fn is_relative(&self) -> bool {
        is_relative(&self.value)
    }
}

pub fn is_relative(specifier: &str) -> bool {
    specifier == "." || specifier == ".." || specifier.starts_with("./") || specifier.starts_with("../")
}

/// Prefix a computed relative path with `./` when it does not climb.
pub fn as_relative_specifier(relative: &str) -> String {
    if relative == "." {
        "./".to_string()
    } else if relative.starts_with("../") || relative == ".." {
        relative.to_string()
    } else {
        format!("./{}", relative)
    }
}

/// Scans many files, keeping one parser per grammar.
#[derive(Default)]
pub struct SpecifierScanner {
    typescript: Option<SourceParser>,
    tsx: Option<SourceParser>,
}

impl SpecifierScanner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every module specifier of `source`, in file order.
    ///
    /// Sources that cannot name a module are not parsed at all. A source
    /// with syntax errors is a `Parse` error naming `origin`.
    pub fn scan(&mut self, source: &str, language: SourceLanguage, origin: &str) -> Result<Vec<Specifier>> {
        if !may_name_modules(source) {
            trace!("{} names no modules, not parsing", origin);
            return Ok(Vec::new());
        }
        let tree = self.parser(language)?.parse(source, origin)?;
        Ok(find_specifiers(&tree, source))
    }

    fn parser(&mut self, language: SourceLanguage) -> Result<&mut SourceParser> {
        let slot = match language {
            SourceLanguage::TypeScript => &mut self.typescript,
            SourceLanguage::Tsx => &mut self.tsx,
        };
        Ok(match slot {
            Some(parser) => parser,
            None => slot.insert(SourceParser::new(language)?),
        })
    }
}

fn may_name_modules(source: &str) -> bool {
    ["import", "from", "require", ".mock"]
        .iter()
        .any(|word| source.contains(word))
}

/// Every module specifier in an already parsed tree, in file order.
pub fn find_specifiers(tree: &Tree, source: &str) -> Vec<Specifier> {
    let mut found = Vec::new();
    let mut stack = vec![tree.root_node()];

    while let Some(node) = stack.pop() {
        if let Some(specifier) = module_string(node, source).and_then(|string| specifier_of(string, source)) {
            found.push(specifier);
        }
        let mut cursor = node.walk();
        let children: Vec<Node<'_>> = node.named_children(&mut cursor).collect();
        stack.extend(children.into_iter().rev());
    }
    found
}

/// The string node holding the module name, if `node` names a module.
fn module_string<'t>(node: Node<'t>, source: &str) -> Option<Node<'t>> {
    match node.kind() {
        "import_statement" | "export_statement" | "import_require_clause" => {
            node.child_by_field_name("source")
        }
        "call_expression" => {
            let function = node.child_by_field_name("function")?;
            let callee = function.utf8_text(source.as_bytes()).ok()?;
            if function.kind() != "import" && !MODULE_CALLS.contains(&callee) {
                return None;
            }
            let arguments = node.child_by_field_name("arguments")?;
            let mut cursor = arguments.walk();
            let first = arguments
                .named_children(&mut cursor)
                .find(|child| child.kind() != "comment");
            first.filter(|argument| argument.kind() == "string")
        }
        _ => None,
    }
}

fn specifier_of(string: Node<'_>, source: &str) -> Option<Specifier> {
    let range = string.start_byte() + 1..string.end_byte().checked_sub(1)?;
    let value = source.get(range.clone())?;
    Some(Specifier {
        value: value.to_string(),
        range,
    })
}
