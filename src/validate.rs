#[cfg(feature = "napi")]
use napi_derive::napi;
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

// ═══════════════════════════════════════════════════════════════════════════════
// ERROR CODES
// ═══════════════════════════════════════════════════════════════════════════════

pub const ERR_MISSING_TEMPLATE: &str = "TN-PARSE-001";
pub const ERR_INVALID_OPEN_TAG: &str = "TN-PARSE-002";
pub const ERR_INVALID_CLOSE_TAG: &str = "TN-PARSE-003";
pub const ERR_MISMATCHED_CLOSE_TAG: &str = "TN-PARSE-004";
pub const ERR_UNCLOSED_TAG: &str = "TN-PARSE-005";
pub const ERR_UNTERMINATED_COMMENT: &str = "TN-PARSE-006";
pub const ERR_DIRECTIVE_VALUE: &str = "TN-DIR-001";
pub const ERR_FOR_SYNTAX: &str = "TN-DIR-002";
pub const ERR_ORPHAN_BRANCH: &str = "TN-DIR-003";
pub const ERR_UNREADABLE_FILE: &str = "TN-IO-001";

// ═══════════════════════════════════════════════════════════════════════════════
// GUARANTEES
// ═══════════════════════════════════════════════════════════════════════════════

fn get_guarantee(code: &str) -> &'static str {
    match code {
        ERR_MISSING_TEMPLATE => "Every component renders from exactly one non-empty <template> block.",
        ERR_INVALID_OPEN_TAG | ERR_INVALID_CLOSE_TAG => {
            "Templates are only compiled from well-formed tag syntax."
        }
        ERR_MISMATCHED_CLOSE_TAG | ERR_UNCLOSED_TAG => {
            "Every opening tag is closed exactly once, by a tag of the same name."
        }
        ERR_UNTERMINATED_COMMENT => "Template comments never swallow the rest of the template.",
        ERR_DIRECTIVE_VALUE => "Directives, bindings and event handlers always carry an expression.",
        ERR_FOR_SYNTAX => "List directives always bind an item alias over a single list expression.",
        ERR_ORPHAN_BRANCH => "tn-else-if and tn-else only ever continue a tn-if chain.",
        ERR_UNREADABLE_FILE => "Every discovered component source is read before it is compiled.",
        _ => "Unknown invariant.",
    }
}

fn get_error_type(code: &str) -> &'static str {
    if code.starts_with("TN-PARSE") {
        "PARSE_ERROR"
    } else if code.starts_with("TN-DIR") {
        "DIRECTIVE_ERROR"
    } else if code.starts_with("TN-IO") {
        "IO_ERROR"
    } else {
        "COMPILER_ERROR"
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// COMPILER ERROR
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
#[cfg_attr(feature = "napi", napi(object))]
#[serde(rename_all = "camelCase")]
#[error("[{code}] {message} ({file}:{line}:{column})")]
pub struct CompilerError {
    pub code: String,
    pub error_type: String,
    pub message: String,
    pub guarantee: String,
    pub file: String,
    pub line: u32,
    pub column: u32,
    pub context: Option<String>,
    pub hints: Vec<String>,
}

impl CompilerError {
    pub fn new(code: &str, message: &str, file: &str, line: u32, column: u32) -> Self {
        Self::with_details(code, message, file, line, column, None, vec![])
    }

    pub fn with_details(
        code: &str,
        message: &str,
        file: &str,
        line: u32,
        column: u32,
        context: Option<String>,
        hints: Vec<String>,
    ) -> Self {
        CompilerError {
            code: code.to_string(),
            error_type: get_error_type(code).to_string(),
            message: message.to_string(),
            guarantee: get_guarantee(code).to_string(),
            file: file.to_string(),
            line,
            column,
            context,
            hints,
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// IR TYPES
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct SemanticTree {
    pub children: Vec<SemanticNode>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum SemanticNode {
    Element(SemanticElement),
    Text(TextNode),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SemanticElement {
    pub tag: String,
    pub is_component: bool,
    pub static_attributes: Vec<StaticAttribute>,
    pub dynamic_bindings: Vec<Binding>,
    pub event_bindings: Vec<Binding>,
    pub directives: Directives,
    pub children: Vec<SemanticNode>,
    pub line: u32,
    pub column: u32,
}

/// A literal attribute. `None` is a bare boolean attribute.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StaticAttribute {
    pub name: String,
    pub value: Option<String>,
}

/// `name` bound to a JS expression (`:name="expr"` or `@name="expr"`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Binding {
    pub name: String,
    pub expression: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct Directives {
    #[serde(rename = "if")]
    pub if_expr: Option<String>,
    #[serde(rename = "elseIf")]
    pub else_if_expr: Option<String>,
    #[serde(rename = "else")]
    pub is_else: bool,
    #[serde(rename = "for")]
    pub for_each: Option<ForDirective>,
}

impl Directives {
    pub fn is_empty(&self) -> bool {
        !self.has_conditional() && self.for_each.is_none()
    }

    pub fn has_conditional(&self) -> bool {
        self.if_expr.is_some() || self.else_if_expr.is_some() || self.is_else
    }

    pub fn clear_conditional(&mut self) {
        self.if_expr = None;
        self.else_if_expr = None;
        self.is_else = false;
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ForDirective {
    pub item_alias: String,
    pub index_alias: Option<String>,
    pub list_expression: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextNode {
    pub segments: Vec<TextSegment>,
}

impl TextNode {
    pub fn is_static(&self) -> bool {
        self.segments
            .iter()
            .all(|s| matches!(s, TextSegment::Literal(_)))
    }

    pub fn is_blank(&self) -> bool {
        self.segments.iter().all(|s| match s {
            TextSegment::Literal(text) => text.trim().is_empty(),
            TextSegment::Expression(_) => false,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "camelCase")]
pub enum TextSegment {
    Literal(String),
    Expression(String),
}

// ═══════════════════════════════════════════════════════════════════════════════
// DIRECTIVE GRAMMAR
// ═══════════════════════════════════════════════════════════════════════════════

lazy_static! {
    static ref FOR_DIRECTIVE_RE: Regex = Regex::new(
        r"^\s*([A-Za-z_$][\w$]*)(?:\s*,\s*([A-Za-z_$][\w$]*))?\s+in\s+([\s\S]+?)\s*$"
    )
    .unwrap();
}

/// Location of the element being validated, for error reporting.
#[derive(Debug, Clone, Copy)]
pub struct Site<'a> {
    pub file: &'a str,
    pub tag: &'a str,
    pub line: u32,
    pub column: u32,
}

/// The value of a directive that must carry a non-empty expression.
pub fn require_value(directive: &str, value: Option<&str>, site: Site<'_>) -> Result<String, CompilerError> {
    match value.map(str::trim) {
        Some(expr) if !expr.is_empty() => Ok(expr.to_string()),
        _ => Err(CompilerError::with_details(
            ERR_DIRECTIVE_VALUE,
            &format!("`{}` on <{}> requires a value", directive, site.tag),
            site.file,
            site.line,
            site.column,
            None,
            vec![format!("Write it as {}=\"expression\"", directive)],
        )),
    }
}

/// Parse `item in list` / `item, index in list`.
pub fn parse_for_directive(value: &str, site: Site<'_>) -> Result<ForDirective, CompilerError> {
    let caps = FOR_DIRECTIVE_RE.captures(value).ok_or_else(|| {
        CompilerError::with_details(
            ERR_FOR_SYNTAX,
            &format!("Invalid tn-for expression on <{}>: \"{}\"", site.tag, value),
            site.file,
            site.line,
            site.column,
            Some(value.to_string()),
            vec!["Expected `item in list` or `item, index in list`".to_string()],
        )
    })?;

    Ok(ForDirective {
        item_alias: caps[1].to_string(),
        index_alias: caps.get(2).map(|m| m.as_str().to_string()),
        list_expression: caps[3].to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn site() -> Site<'static> {
        Site {
            file: "List.tanni",
            tag: "li",
            line: 3,
            column: 5,
        }
    }

    #[test]
    fn test_parse_for_with_index() {
        let dir = parse_for_directive("item, index in items()", site()).expect("valid");
        assert_eq!(dir.item_alias, "item");
        assert_eq!(dir.index_alias.as_deref(), Some("index"));
        assert_eq!(dir.list_expression, "items()");
    }

    #[test]
    fn test_parse_for_keeps_whole_expression() {
        let dir = parse_for_directive("  row in props.rows.filter(r => r.visible) ", site()).expect("valid");
        assert_eq!(dir.item_alias, "row");
        assert_eq!(dir.index_alias, None);
        assert_eq!(dir.list_expression, "props.rows.filter(r => r.visible)");
    }

    #[test]
    fn test_parse_for_rejects_bad_pattern() {
        let err = parse_for_directive("items()", site()).unwrap_err();
        assert_eq!(err.code, ERR_FOR_SYNTAX);
        assert_eq!(err.error_type, "DIRECTIVE_ERROR");
        assert!(err.message.contains("items()"));
        assert_eq!((err.line, err.column), (3, 5));
    }

    #[test]
    fn test_require_value() {
        assert_eq!(require_value("tn-if", Some(" ok "), site()).as_deref(), Ok("ok"));
        let err = require_value("tn-if", Some("  "), site()).unwrap_err();
        assert_eq!(err.code, ERR_DIRECTIVE_VALUE);
        assert!(err.message.contains("tn-if"));
        assert!(require_value(":title", None, site()).is_err());
    }

    #[test]
    fn test_error_display_and_serde() {
        let err = CompilerError::new(ERR_UNCLOSED_TAG, "Unclosed tag <div>", "A.tanni", 1, 1);
        assert_eq!(err.to_string(), "[TN-PARSE-005] Unclosed tag <div> (A.tanni:1:1)");
        let json = serde_json::to_value(&err).expect("serializable");
        assert_eq!(json["errorType"], "PARSE_ERROR");
        assert!(json["guarantee"].as_str().is_some_and(|g| g.contains("closed")));
    }
}
