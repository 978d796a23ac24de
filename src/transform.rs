//! Tree Transformer
//!
//! Lowers the raw markup tree into the semantic IR: every attribute lands in
//! exactly one category, directive grammar is validated, component tags are
//! flagged and text is split into literal/expression segments.

use crate::parse::{is_component_tag, RawElement, RawNode, RawTree};
use crate::validate::{
    parse_for_directive, require_value, Binding, CompilerError, Directives, SemanticElement,
    SemanticNode, SemanticTree, Site, StaticAttribute, TextNode, TextSegment,
};

// ═══════════════════════════════════════════════════════════════════════════════
// LOWERING CONTEXT
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug)]
pub struct LoweringContext<'a> {
    pub file_path: &'a str,
}

/// Lower a parsed template into the semantic IR.
pub fn transform(tree: &RawTree, file_path: &str) -> Result<SemanticTree, CompilerError> {
    let ctx = LoweringContext { file_path };
    Ok(SemanticTree {
        children: lower_children(&tree.children, &ctx)?,
    })
}

fn lower_children(nodes: &[RawNode], ctx: &LoweringContext) -> Result<Vec<SemanticNode>, CompilerError> {
    nodes.iter().map(|node| lower_node(node, ctx)).collect()
}

fn lower_node(node: &RawNode, ctx: &LoweringContext) -> Result<SemanticNode, CompilerError> {
    match node {
        RawNode::Text(text) => Ok(SemanticNode::Text(TextNode {
            segments: split_interpolations(&text.content),
        })),
        RawNode::Element(element) => lower_element(element, ctx).map(SemanticNode::Element),
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// ATTRIBUTE CLASSIFICATION
// ═══════════════════════════════════════════════════════════════════════════════

/// Classification priority: `tn-if`, `tn-for`, `:name`, `@name`, then the
/// chain markers `tn-else-if` / `tn-else`, then everything else is static.
fn lower_element(element: &RawElement, ctx: &LoweringContext) -> Result<SemanticElement, CompilerError> {
    let site = Site {
        file: ctx.file_path,
        tag: &element.tag,
        line: element.line,
        column: element.column,
    };

    let mut directives = Directives::default();
    let mut static_attributes = Vec::new();
    let mut dynamic_bindings = Vec::new();
    let mut event_bindings = Vec::new();

    for attr in &element.attributes {
        let name = attr.name.as_str();
        let value = attr.value.as_deref();

        if name == "tn-if" {
            directives.if_expr = Some(require_value(name, value, site)?);
        } else if name == "tn-for" {
            let expr = require_value(name, value, site)?;
            directives.for_each = Some(parse_for_directive(&expr, site)?);
        } else if let Some(prop) = name.strip_prefix(':') {
            dynamic_bindings.push(Binding {
                name: prop.to_string(),
                expression: require_value(name, value, site)?,
            });
        } else if let Some(event) = name.strip_prefix('@') {
            event_bindings.push(Binding {
                name: event.to_string(),
                expression: require_value(name, value, site)?,
            });
        } else if name == "tn-else-if" {
            directives.else_if_expr = Some(require_value(name, value, site)?);
        } else if name == "tn-else" {
            directives.is_else = true;
        } else {
            static_attributes.push(StaticAttribute {
                name: name.to_string(),
                value: attr.value.clone(),
            });
        }
    }

    Ok(SemanticElement {
        tag: element.tag.clone(),
        is_component: is_component_tag(&element.tag),
        static_attributes,
        dynamic_bindings,
        event_bindings,
        directives,
        children: lower_children(&element.children, ctx)?,
        line: element.line,
        column: element.column,
    })
}

// ═══════════════════════════════════════════════════════════════════════════════
// TEXT INTERPOLATION
// ═══════════════════════════════════════════════════════════════════════════════

/// Split text on `{{ expr }}` markers. Empty or unterminated markers stay
/// literal, and adjacent literals are merged.
pub fn split_interpolations(text: &str) -> Vec<TextSegment> {
    let mut segments = Vec::new();
    let mut literal = String::new();
    let mut rest = text;

    while let Some(open) = rest.find("{{") {
        let after_open = &rest[open + 2..];
        let Some(close) = after_open.find("}}") else {
            break;
        };
        let expr = after_open[..close].trim();
        if expr.is_empty() {
            literal.push_str(&rest[..open + 2 + close + 2]);
        } else {
            literal.push_str(&rest[..open]);
            if !literal.is_empty() {
                segments.push(TextSegment::Literal(std::mem::take(&mut literal)));
            }
            segments.push(TextSegment::Expression(expr.to_string()));
        }
        rest = &after_open[close + 2..];
    }

    literal.push_str(rest);
    if !literal.is_empty() || segments.is_empty() {
        segments.push(TextSegment::Literal(literal));
    }
    segments
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse::parse;
    use crate::validate::{ERR_DIRECTIVE_VALUE, ERR_FOR_SYNTAX};

    fn lower(markup: &str) -> Result<SemanticTree, CompilerError> {
        let raw = parse(markup, "Test.tanni")?;
        transform(&raw, "Test.tanni")
    }

    fn first_element(tree: &SemanticTree) -> &SemanticElement {
        match &tree.children[0] {
            SemanticNode::Element(el) => el,
            other => panic!("expected element, got {:?}", other),
        }
    }

    #[test]
    fn test_split_interpolations() {
        assert_eq!(
            split_interpolations("{{ index }}-{{ item }}"),
            vec![
                TextSegment::Expression("index".into()),
                TextSegment::Literal("-".into()),
                TextSegment::Expression("item".into()),
            ]
        );
        assert_eq!(
            split_interpolations("plain"),
            vec![TextSegment::Literal("plain".into())]
        );
        assert_eq!(
            split_interpolations("a {{ }} b {{ open"),
            vec![TextSegment::Literal("a {{ }} b {{ open".into())]
        );
    }

    #[test]
    fn test_attribute_classification() {
        let tree = lower(r#"<button class="btn" :disabled="busy()" @click="save" tn-if="ready()">Go</button>"#)
            .expect("valid template");
        let el = first_element(&tree);
        assert!(!el.is_component);
        assert_eq!(el.static_attributes.len(), 1);
        assert_eq!(el.static_attributes[0].name, "class");
        assert_eq!(el.dynamic_bindings[0].name, "disabled");
        assert_eq!(el.dynamic_bindings[0].expression, "busy()");
        assert_eq!(el.event_bindings[0].name, "click");
        assert_eq!(el.directives.if_expr.as_deref(), Some("ready()"));
    }

    #[test]
    fn test_component_flag_and_markers() {
        let tree = lower(r#"<Counter :value="count()" /><p tn-else>no</p>"#).expect("valid template");
        assert!(first_element(&tree).is_component);
        match &tree.children[1] {
            SemanticNode::Element(el) => assert!(el.directives.is_else),
            other => panic!("expected element, got {:?}", other),
        }
    }

    #[test]
    fn test_for_directive_lowering() {
        let tree = lower(r#"<li tn-for="item, index in items()">{{ item }}</li>"#).expect("valid template");
        let dir = first_element(&tree).directives.for_each.clone().expect("for directive");
        assert_eq!(dir.item_alias, "item");
        assert_eq!(dir.index_alias.as_deref(), Some("index"));
    }

    #[test]
    fn test_directive_errors() {
        let err = lower("<p tn-if>x</p>").unwrap_err();
        assert_eq!(err.code, ERR_DIRECTIVE_VALUE);
        let err = lower(r#"<p :title="">x</p>"#).unwrap_err();
        assert_eq!(err.code, ERR_DIRECTIVE_VALUE);
        assert!(err.message.contains(":title"));
        let err = lower(r#"<p tn-for="oops">x</p>"#).unwrap_err();
        assert_eq!(err.code, ERR_FOR_SYNTAX);
        assert!(err.message.contains("oops"));
    }
}
