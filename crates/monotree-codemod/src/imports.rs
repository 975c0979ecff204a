//! Named imports required by patched values.

use crate::editor::{ConfigEditor, TextEdit};
use crate::patch::PatchOutcome;
use crate::style::{detect_newline, detect_quote};
use crate::value::render_string;
use monotree_core::Result;
use tree_sitter::Node;

/// Make sure `name` is bound by an import, adding
/// `import { name } from 'module';` after the last import statement when
/// nothing binds it yet.
pub(crate) fn ensure_named_import(editor: &mut ConfigEditor, name: &str, module: &str) -> Result<PatchOutcome> {
    let Some(edit) = import_edit(editor.root_node(), editor.source(), name, module) else {
        return Ok(PatchOutcome::Unchanged);
    };
    editor.apply_edit(&edit)?;
    Ok(PatchOutcome::Inserted)
}

fn import_edit(root: Node<'_>, source: &str, name: &str, module: &str) -> Option<TextEdit> {
    let mut cursor = root.walk();
    let statements: Vec<Node<'_>> = root.named_children(&mut cursor).collect();
    let imports: Vec<Node<'_>> = statements
        .iter()
        .copied()
        .filter(|node| node.kind() == "import_statement")
        .collect();
    if imports.iter().any(|import| local_bindings(*import, source).contains(&name)) {
        return None;
    }

    let newline = detect_newline(source);
    let statement = format!(
        "import {{ {} }} from {};",
        name,
        render_string(module, detect_quote(root, source))
    );

    if let Some(last) = imports.last() {
        let anchor = trailing_comment_end(*last);
        return Some(TextEdit::insert(anchor, format!("{}{}", newline, statement)));
    }
    // Leading comments, `/// <reference>` directives included, stay first
    match statements.iter().find(|node| node.kind() != "comment") {
        Some(first) => Some(TextEdit::insert(first.start_byte(), format!("{}{}", statement, newline))),
        None => Some(TextEdit::insert(source.len(), format!("{}{}", statement, newline))),
    }
}

/// Names an import statement introduces into the module scope.
fn local_bindings<'s>(import: Node<'_>, source: &'s str) -> Vec<&'s str> {
    let mut names = Vec::new();
    let mut stack = vec![import];
    while let Some(node) = stack.pop() {
        let parent = node.parent().map(|parent| parent.kind());
        match node.kind() {
            "import_specifier" => {
                if let Some(local) = node
                    .child_by_field_name("alias")
                    .or_else(|| node.child_by_field_name("name"))
                {
                    names.push(&source[local.byte_range()]);
                }
                continue;
            }
            "identifier" if matches!(parent, Some("import_clause" | "namespace_import")) => {
                names.push(&source[node.byte_range()]);
            }
            _ => {}
        }
        let mut cursor = node.walk();
        stack.extend(node.named_children(&mut cursor));
    }
    names
}

fn trailing_comment_end(node: Node<'_>) -> usize {
    let row = node.end_position().row;
    let mut end = node.end_byte();
    let mut sibling = node.next_sibling();
    while let Some(next) = sibling {
        if next.kind() != "comment" || next.start_position().row != row {
            break;
        }
        end = next.end_byte();
        sibling = next.next_sibling();
    }
    end
}
