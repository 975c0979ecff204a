//! Values written into configuration objects, and reading literals back.

use crate::style::{members, ObjectStyle};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value};
use tree_sitter::Node;

static IDENTIFIER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z_$][A-Za-z0-9_$]*$").expect("identifier pattern is valid"));

/// A value to place at a property path
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PatchValue {
    /// Plain data, rendered as a JavaScript literal in the file's style
    Literal(Value),
    /// Source code inserted verbatim, e.g. `resolve(__dirname, 'dist')`
    Raw(String),
    /// A call with literal arguments, e.g. `replaceFiles([...])`
    Call { callee: String, arguments: Vec<Value> },
}

impl PatchValue {
    pub fn literal(value: impl Into<Value>) -> Self {
        Self::Literal(value.into())
    }

    pub fn raw(code: impl Into<String>) -> Self {
        Self::Raw(code.into())
    }

    pub fn call(callee: impl Into<String>, arguments: Vec<Value>) -> Self {
        Self::Call {
            callee: callee.into(),
            arguments,
        }
    }

    pub fn as_object(&self) -> Option<&Map<String, Value>> {
        match self {
            Self::Literal(Value::Object(map)) => Some(map),
            _ => None,
        }
    }

    /// Whether `node` already holds this value.
    pub fn matches(&self, node: Node<'_>, source: &str) -> bool {
        match self {
            Self::Literal(expected) => literal_value(node, source).as_ref() == Some(expected),
            Self::Raw(code) => strip_whitespace(&source[node.byte_range()]) == strip_whitespace(code),
            Self::Call { callee, arguments } => {
                is_call_to(node, callee, source)
                    && node.child_by_field_name("arguments").is_some_and(|args| {
                        let found: Option<Vec<Value>> = members(args)
                            .into_iter()
                            .map(|arg| literal_value(arg, source))
                            .collect();
                        found.as_ref() == Some(arguments)
                    })
            }
        }
    }

    /// Whether `node` is the same array entry as this value. Calls are the
    /// same entry when they call the same function, whatever the arguments.
    pub fn same_entry(&self, node: Node<'_>, source: &str) -> bool {
        match self {
            Self::Call { callee, .. } => is_call_to(node, callee, source),
            _ => self.matches(node, source),
        }
    }

    /// Render as source text for a property value laid out with `style`.
    pub fn render(&self, style: &ObjectStyle) -> String {
        match self {
            Self::Literal(value) => render_value(value, style),
            Self::Raw(code) => code.clone(),
            Self::Call { callee, arguments } => {
                let arguments: Vec<String> = arguments.iter().map(|arg| render_value(arg, style)).collect();
                format!("{}({})", callee, arguments.join(", "))
            }
        }
    }
}

fn is_call_to(node: Node<'_>, callee: &str, source: &str) -> bool {
    node.kind() == "call_expression"
        && node
            .child_by_field_name("function")
            .is_some_and(|function| &source[function.byte_range()] == callee)
}

/// Render a property key, bare when it is a valid identifier.
pub fn render_key(key: &str, style: &ObjectStyle) -> String {
    if !style.quoted_keys && IDENTIFIER_RE.is_match(key) {
        key.to_string()
    } else {
        render_string(key, style.quote)
    }
}

/// Render JSON data as a JavaScript literal.
///
/// `style` describes the object the value is placed in; nested objects are
/// laid out one level deeper.
pub fn render_value(value: &Value, style: &ObjectStyle) -> String {
    match value {
        Value::Null => "null".to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::String(s) => render_string(s, style.quote),
        Value::Array(items) => {
            let items: Vec<String> = items.iter().map(|item| render_value(item, style)).collect();
            format!("[{}]", items.join(", "))
        }
        Value::Object(map) => {
            let entries: Vec<(String, String)> = map
                .iter()
                .map(|(k, v)| (render_key(k, style), render_value(v, &style.nested())))
                .collect();
            render_object(&entries, &style.nested())
        }
    }
}

/// Lay out already rendered `key: value` pairs as an object literal.
pub fn render_object(entries: &[(String, String)], style: &ObjectStyle) -> String {
    if entries.is_empty() {
        return "{}".to_string();
    }
    if !style.multiline {
        let body: Vec<String> = entries.iter().map(|(k, v)| format!("{}: {}", k, v)).collect();
        return format!("{{ {} }}", body.join(", "));
    }

    let mut out = format!("{{{}", style.newline);
    for (i, (key, value)) in entries.iter().enumerate() {
        let last = i + 1 == entries.len();
        out.push_str(&style.property_indent);
        out.push_str(key);
        out.push_str(": ");
        out.push_str(value);
        if !last || style.trailing_comma {
            out.push(',');
        }
        out.push_str(style.newline);
    }
    out.push_str(&style.object_indent);
    out.push('}');
    out
}

pub fn render_string(s: &str, quote: char) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push(quote);
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c == quote => {
                out.push('\\');
                out.push(c);
            }
            c => out.push(c),
        }
    }
    out.push(quote);
    out
}

/// Convert a literal expression to JSON data.
///
/// Returns `None` for anything that is not pure data (identifiers, calls,
/// spreads, template substitutions).
pub fn literal_value(node: Node<'_>, source: &str) -> Option<Value> {
    let text = &source[node.byte_range()];
    match node.kind() {
        "string" => Some(Value::String(unescape(strip_quotes(text)))),
        "template_string" => {
            let mut cursor = node.walk();
            let has_substitution = node
                .named_children(&mut cursor)
                .any(|child| child.kind() == "template_substitution");
            if has_substitution {
                None
            } else {
                Some(Value::String(unescape(strip_quotes(text))))
            }
        }
        "number" => parse_number(text).map(Value::Number),
        "true" => Some(Value::Bool(true)),
        "false" => Some(Value::Bool(false)),
        "null" => Some(Value::Null),
        "unary_expression" => {
            let operator = node.child_by_field_name("operator")?;
            let argument = node.child_by_field_name("argument")?;
            if &source[operator.byte_range()] != "-" || argument.kind() != "number" {
                return None;
            }
            parse_number(&format!("-{}", &source[argument.byte_range()])).map(Value::Number)
        }
        "parenthesized_expression" => {
            let inner = node.named_child(0)?;
            literal_value(inner, source)
        }
        "array" => {
            let mut cursor = node.walk();
            let children: Vec<_> = node.named_children(&mut cursor).collect();
            children
                .into_iter()
                .filter(|child| child.kind() != "comment")
                .map(|child| literal_value(child, source))
                .collect::<Option<Vec<_>>>()
                .map(Value::Array)
        }
        "object" => {
            let mut map = Map::new();
            for member in crate::style::members(node) {
                if member.kind() != "pair" {
                    return None;
                }
                let key = property_key(member.child_by_field_name("key")?, source)?;
                let value = literal_value(member.child_by_field_name("value")?, source)?;
                map.insert(key, value);
            }
            Some(Value::Object(map))
        }
        _ => None,
    }
}

/// Name of a property key node; `None` for computed keys.
pub fn property_key(key: Node<'_>, source: &str) -> Option<String> {
    let text = &source[key.byte_range()];
    match key.kind() {
        "property_identifier" | "number" => Some(text.to_string()),
        "string" => Some(unescape(strip_quotes(text))),
        _ => None,
    }
}

fn strip_quotes(text: &str) -> &str {
    if text.len() >= 2 {
        &text[1..text.len() - 1]
    } else {
        text
    }
}

fn unescape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some('t') => out.push('\t'),
            Some('0') => out.push('\0'),
            Some('u') => {
                let hex: String = chars.by_ref().take(4).collect();
                match u32::from_str_radix(&hex, 16).ok().and_then(char::from_u32) {
                    Some(decoded) => out.push(decoded),
                    None => {
                        out.push_str("\\u");
                        out.push_str(&hex);
                    }
                }
            }
            // Line continuation
            Some('\n') => {}
            Some(other) => out.push(other),
            None => out.push('\\'),
        }
    }
    out
}

fn parse_number(text: &str) -> Option<Number> {
    let cleaned = text.replace('_', "");
    if let Ok(int) = cleaned.parse::<i64>() {
        return Some(Number::from(int));
    }
    let lower = cleaned.to_ascii_lowercase();
    if let Some(hex) = lower.strip_prefix("0x") {
        return i64::from_str_radix(hex, 16).ok().map(Number::from);
    }
    cleaned.parse::<f64>().ok().and_then(Number::from_f64)
}

fn strip_whitespace(code: &str) -> String {
    code.chars().filter(|c| !c.is_whitespace()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::locator::ObjectLocator;
    use monotree_syntax::{SourceLanguage, SourceParser};
    use serde_json::json;

    fn style(multiline: bool) -> ObjectStyle {
        ObjectStyle {
            quote: '\'',
            object_indent: String::new(),
            property_indent: "  ".to_string(),
            multiline,
            trailing_comma: true,
            quoted_keys: false,
            newline: "\n",
        }
    }

    fn exported_literal(source: &str) -> Option<Value> {
        let mut parser = SourceParser::new(SourceLanguage::TypeScript).unwrap();
        let tree = parser.parse(source, "test.ts").unwrap();
        let object = ObjectLocator::default_export().find(tree.root_node(), source)?;
        literal_value(object, source)
    }

    #[test]
    fn test_literal_value_of_object() {
        let value = exported_literal(
            "export default { a: 'x\\'y', \"b\": [1, -2, 3.5], c: { d: true, e: null }, f: `t` };",
        );
        assert_eq!(
            value,
            Some(json!({ "a": "x'y", "b": [1, -2, 3.5], "c": { "d": true, "e": null }, "f": "t" }))
        );
    }

    #[test]
    fn test_non_literal_is_none() {
        assert_eq!(exported_literal("export default { a: resolve(__dirname) };"), None);
        assert_eq!(exported_literal("export default { ...base };"), None);
        assert_eq!(exported_literal("export default { a: `${x}` };"), None);
    }

    #[test]
    fn test_render_value_multiline() {
        let rendered = render_value(&json!({ "outDir": "dist", "minify": false }), &style(true));
        assert_eq!(rendered, "{\n    outDir: 'dist',\n    minify: false,\n  }");
    }

    #[test]
    fn test_render_value_single_line() {
        let rendered = render_value(&json!({ "a": [1, "b"], "c-d": 2 }), &style(false));
        assert_eq!(rendered, "{ a: [1, 'b'], 'c-d': 2 }");
    }

    #[test]
    fn test_render_string_escapes_quote() {
        assert_eq!(render_string("it's", '\''), "'it\\'s'");
        assert_eq!(render_string("it's", '"'), "\"it's\"");
    }
}
