//! Formatting conventions observed in an existing object literal.

use tree_sitter::Node;

const DEFAULT_INDENT_UNIT: &str = "  ";

/// How properties of one object literal are laid out
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectStyle {
    /// Quote used for new string literals and quoted keys
    pub quote: char,
    /// Leading whitespace of the line the object starts on
    pub object_indent: String,
    /// Leading whitespace of each property line
    pub property_indent: String,
    /// Whether properties sit on their own lines
    pub multiline: bool,
    /// Whether the last property is followed by a comma
    pub trailing_comma: bool,
    /// Whether every existing key is a string literal
    pub quoted_keys: bool,
    /// Line break of the file, `\r\n` or `\n`
    pub newline: &'static str,
}

impl ObjectStyle {
    /// Read the style of `object`, which must be an `object` node of `source`.
    pub fn detect(object: Node<'_>, source: &str, quote: char) -> Self {
        let object_indent = line_indent(source, object.start_byte());
        let members = members(object);
        let multiline = source[object.byte_range()].contains('\n');

        let property_indent = members
            .iter()
            .find(|m| m.start_position().row != object.start_position().row)
            .map(|m| line_indent(source, m.start_byte()))
            .filter(|indent| indent.len() > object_indent.len() && indent.starts_with(&object_indent))
            .unwrap_or_else(|| format!("{}{}", object_indent, DEFAULT_INDENT_UNIT));

        let trailing_comma = members
            .last()
            .is_some_and(|last| comma_after(*last).is_some());

        let quoted_keys = !members.is_empty()
            && members.iter().all(|m| {
                m.kind() == "pair"
                    && m.child_by_field_name("key")
                        .is_some_and(|key| key.kind() == "string")
            });

        Self {
            quote,
            object_indent,
            property_indent,
            multiline,
            trailing_comma,
            quoted_keys,
            newline: detect_newline(source),
        }
    }

    /// Style of an object literal created as a property value of this one.
    pub fn nested(&self) -> Self {
        let unit = self.indent_unit().to_string();
        Self {
            object_indent: self.property_indent.clone(),
            property_indent: format!("{}{}", self.property_indent, unit),
            ..self.clone()
        }
    }

    pub fn indent_unit(&self) -> &str {
        self.property_indent
            .strip_prefix(self.object_indent.as_str())
            .filter(|unit| !unit.is_empty())
            .unwrap_or(DEFAULT_INDENT_UNIT)
    }
}

/// Quote character of the first string literal in the file, `'` when there is none.
pub fn detect_quote(root: Node<'_>, source: &str) -> char {
    let mut cursor = root.walk();
    let mut stack = vec![root];
    while let Some(node) = stack.pop() {
        if node.kind() == "string" {
            if let Some(quote) = source[node.byte_range()].chars().next() {
                return quote;
            }
        }
        let children: Vec<_> = node.named_children(&mut cursor).collect();
        stack.extend(children.into_iter().rev());
    }
    '\''
}

/// `\r\n` when the file already uses it, `\n` otherwise.
pub fn detect_newline(source: &str) -> &'static str {
    if source.contains("\r\n") {
        "\r\n"
    } else {
        "\n"
    }
}

/// Properties, spreads and methods of an object, without comments.
pub fn members(object: Node<'_>) -> Vec<Node<'_>> {
    let mut cursor = object.walk();
    let members = object
        .named_children(&mut cursor)
        .filter(|child| child.kind() != "comment")
        .collect();
    members
}

/// The `,` token following `member`, skipping comments in between.
pub fn comma_after(member: Node<'_>) -> Option<Node<'_>> {
    let mut sibling = member.next_sibling();
    while let Some(node) = sibling {
        match node.kind() {
            "comment" => sibling = node.next_sibling(),
            "," => return Some(node),
            _ => return None,
        }
    }
    None
}

pub(crate) fn line_indent(source: &str, byte: usize) -> String {
    let line_start = source[..byte].rfind('\n').map_or(0, |i| i + 1);
    source[line_start..]
        .chars()
        .take_while(|c| *c == ' ' || *c == '\t')
        .collect()
}
