//! Finding the configuration object literal inside a parsed file.

use serde::{Deserialize, Serialize};
use std::fmt;
use tree_sitter::Node;

/// Which object literal of a file a patch targets
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum ObjectLocator {
    /// `export default <expr>`
    DefaultExport { callee: Option<String> },
    /// `module.exports = <expr>`
    ModuleExports { callee: Option<String> },
    /// `const <name> = <expr>`
    Variable { name: String },
}

impl ObjectLocator {
    pub fn default_export() -> Self {
        Self::DefaultExport { callee: None }
    }

    /// The object passed to `callee(...)` in the default export.
    pub fn default_export_call(callee: impl Into<String>) -> Self {
        Self::DefaultExport {
            callee: Some(callee.into()),
        }
    }

    /// Locate the object literal node under `root`.
    pub fn find<'t>(&self, root: Node<'t>, source: &str) -> Option<Node<'t>> {
        let resolver = Resolver { root, source };
        match self {
            ObjectLocator::DefaultExport { callee } => {
                let value = resolver.default_export_value()?;
                resolver.unwrap_object(value, callee.as_deref(), 0)
            }
            ObjectLocator::ModuleExports { callee } => {
                let value = resolver.module_exports_value()?;
                resolver.unwrap_object(value, callee.as_deref(), 0)
            }
            ObjectLocator::Variable { name } => {
                let value = resolver.variable_value(name)?;
                resolver.unwrap_object(value, None, 0)
            }
        }
    }
}

impl fmt::Display for ObjectLocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ObjectLocator::DefaultExport { callee: Some(callee) } => {
                write!(f, "default export {}(...)", callee)
            }
            ObjectLocator::DefaultExport { callee: None } => write!(f, "default export"),
            ObjectLocator::ModuleExports { callee: Some(callee) } => {
                write!(f, "module.exports = {}(...)", callee)
            }
            ObjectLocator::ModuleExports { callee: None } => write!(f, "module.exports"),
            ObjectLocator::Variable { name } => write!(f, "variable '{}'", name),
        }
    }
}

/// Identifier indirections followed before giving up
const MAX_DEPTH: usize = 8;

struct Resolver<'t, 's> {
    root: Node<'t>,
    source: &'s str,
}

impl<'t> Resolver<'t, '_> {
    fn text(&self, node: Node<'t>) -> &str {
        &self.source[node.byte_range()]
    }

    fn default_export_value(&self) -> Option<Node<'t>> {
        let mut cursor = self.root.walk();
        for statement in self.root.named_children(&mut cursor) {
            if statement.kind() != "export_statement" {
                continue;
            }
            let mut inner = statement.walk();
            let is_default = statement.children(&mut inner).any(|c| c.kind() == "default");
            if !is_default {
                continue;
            }
            return statement
                .child_by_field_name("value")
                .or_else(|| statement.child_by_field_name("declaration"));
        }
        None
    }

    fn module_exports_value(&self) -> Option<Node<'t>> {
        let mut cursor = self.root.walk();
        for statement in self.root.named_children(&mut cursor) {
            if statement.kind() != "expression_statement" {
                continue;
            }
            let Some(expr) = statement.named_child(0) else {
                continue;
            };
            if expr.kind() != "assignment_expression" {
                continue;
            }
            let is_module_exports = expr
                .child_by_field_name("left")
                .is_some_and(|left| self.text(left) == "module.exports");
            if is_module_exports {
                return expr.child_by_field_name("right");
            }
        }
        None
    }

    fn variable_value(&self, name: &str) -> Option<Node<'t>> {
        let mut cursor = self.root.walk();
        for statement in self.root.named_children(&mut cursor) {
            let declaration = match statement.kind() {
                "lexical_declaration" | "variable_declaration" => statement,
                "export_statement" => match statement.child_by_field_name("declaration") {
                    Some(declaration) => declaration,
                    None => continue,
                },
                _ => continue,
            };

            let mut inner = declaration.walk();
            for declarator in declaration.named_children(&mut inner) {
                if declarator.kind() != "variable_declarator" {
                    continue;
                }
                let matches = declarator
                    .child_by_field_name("name")
                    .is_some_and(|n| self.text(n) == name);
                if matches {
                    return declarator.child_by_field_name("value");
                }
            }
        }
        None
    }

    /// Peel wrappers off an expression until an object literal shows up.
    fn unwrap_object(&self, node: Node<'t>, callee: Option<&str>, depth: usize) -> Option<Node<'t>> {
        if depth > MAX_DEPTH {
            return None;
        }
        match node.kind() {
            "object" => Some(node),
            "call_expression" => {
                let function = node.child_by_field_name("function")?;
                if let Some(expected) = callee {
                    let name = self.text(function);
                    if name != expected && !name.ends_with(&format!(".{}", expected)) {
                        return None;
                    }
                }
                let arguments = node.child_by_field_name("arguments")?;
                let first = first_named_non_comment(arguments)?;
                self.unwrap_object(first, None, depth + 1)
            }
            "parenthesized_expression" | "as_expression" | "satisfies_expression"
            | "non_null_expression" => {
                let inner = first_named_non_comment(node)?;
                self.unwrap_object(inner, callee, depth + 1)
            }
            "arrow_function" | "function_expression" | "function" => {
                let body = node.child_by_field_name("body")?;
                if body.kind() == "statement_block" {
                    let returned = returned_expression(body)?;
                    self.unwrap_object(returned, None, depth + 1)
                } else {
                    self.unwrap_object(body, None, depth + 1)
                }
            }
            "identifier" => {
                let name = self.text(node).to_string();
                let value = self.variable_value(&name)?;
                self.unwrap_object(value, callee, depth + 1)
            }
            _ => None,
        }
    }
}

fn first_named_non_comment(node: Node<'_>) -> Option<Node<'_>> {
    let mut cursor = node.walk();
    let found = node
        .named_children(&mut cursor)
        .find(|child| child.kind() != "comment");
    found
}

fn returned_expression(block: Node<'_>) -> Option<Node<'_>> {
    let mut cursor = block.walk();
    let statement = block
        .named_children(&mut cursor)
        .find(|child| child.kind() == "return_statement");
    statement.and_then(first_named_non_comment)
}
