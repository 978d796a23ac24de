//! Codegen module for the Tanni compiler
//!
//! Walks the semantic IR and emits an ES module whose default export builds
//! the component's DOM imperatively, wiring every dynamic part through the
//! runtime's `createEffect`.

use crate::parse::ComponentSource;
use crate::script::{preprocess_script, MERGE_PROPS};
use crate::validate::{
    Binding, CompilerError, ForDirective, SemanticElement, SemanticNode, SemanticTree, TextNode,
    TextSegment, ERR_ORPHAN_BRANCH,
};
use lazy_static::lazy_static;
#[cfg(feature = "napi")]
use napi_derive::napi;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

lazy_static! {
    static ref MEMBER_PATH_RE: Regex =
        Regex::new(r"^[A-Za-z_$][\w$]*(?:\s*\.\s*[A-Za-z_$][\w$]*)*$").unwrap();
    static ref FUNCTION_EXPR_RE: Regex = Regex::new(
        r"^(?:async\s+)?(?:function\b|\([^()]*\)\s*=>|[A-Za-z_$][\w$]*\s*=>)"
    )
    .unwrap();
    static ref IDENT_RE: Regex = Regex::new(r"^[A-Za-z_$][\w$]*$").unwrap();
}

pub const DEFAULT_RUNTIME_MODULE: &str = "tanni/runtime";
pub const DEFAULT_COMPONENT_NAME: &str = "Component";
const ROOT: &str = "_root$0";
const EFFECT: &str = "_$createEffect";
const DELEGATE: &str = "_$delegateEvents";

// ═══════════════════════════════════════════════════════════════════════════════
// INPUT/OUTPUT TYPES
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "napi", napi(object))]
#[serde(rename_all = "camelCase", default)]
pub struct CompileOptions {
    /// Opaque identity of the source, used as the file in errors.
    pub id: Option<String>,
    pub runtime_module: String,
    pub component_name: String,
}

impl Default for CompileOptions {
    fn default() -> Self {
        Self {
            id: None,
            runtime_module: DEFAULT_RUNTIME_MODULE.to_string(),
            component_name: DEFAULT_COMPONENT_NAME.to_string(),
        }
    }
}

impl CompileOptions {
    pub fn file_identity(&self) -> &str {
        self.id.as_deref().unwrap_or("<anonymous>")
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "napi", napi(object))]
#[serde(rename_all = "camelCase")]
pub struct CompileResult {
    pub code: String,
    pub css: String,
}

// ═══════════════════════════════════════════════════════════════════════════════
// CODEGEN CONTEXT
// ═══════════════════════════════════════════════════════════════════════════════

/// Per-compile emission state. Never reused across compiles.
#[derive(Debug, Default)]
pub struct CodegenContext<'a> {
    file: &'a str,
    lines: Vec<String>,
    indent: usize,
    counter: usize,
    delegated_events: BTreeSet<String>,
}

impl<'a> CodegenContext<'a> {
    pub fn new(file: &'a str) -> Self {
        Self {
            file,
            ..Default::default()
        }
    }

    /// Allocate a fresh local name, unique within the module.
    fn name(&mut self, prefix: &str) -> String {
        self.counter += 1;
        format!("_{}${}", prefix, self.counter)
    }

    fn line(&mut self, text: impl AsRef<str>) {
        let text = text.as_ref();
        if text.is_empty() {
            self.lines.push(String::new());
        } else {
            self.lines.push(format!("{}{}", "  ".repeat(self.indent), text));
        }
    }

    /// Append `text` exactly as written. Script bodies go through here so
    /// multi-line strings and template literals keep their contents.
    fn verbatim(&mut self, text: &str) {
        if !text.is_empty() {
            self.lines.push(text.to_string());
        }
    }

    fn open(&mut self, text: impl AsRef<str>) {
        self.line(text);
        self.indent += 1;
    }

    fn close(&mut self, text: impl AsRef<str>) {
        self.indent = self.indent.saturating_sub(1);
        self.line(text);
    }

    pub fn delegated_events(&self) -> impl Iterator<Item = &str> {
        self.delegated_events.iter().map(String::as_str)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// MODULE GENERATION
// ═══════════════════════════════════════════════════════════════════════════════

/// Emit the component module for a lowered template plus its script and
/// styles.
pub fn generate(
    tree: &SemanticTree,
    source: &ComponentSource,
    options: &CompileOptions,
) -> Result<CompileResult, CompilerError> {
    let script = preprocess_script(&source.script_text, &source.script_language_tag);
    let mut ctx = CodegenContext::new(options.file_identity());

    for import in &script.imports {
        ctx.line(import);
    }
    ctx.line(format!(
        "import {{ createEffect as {}, delegateEvents as {}, mergeProps as {} }} from {};",
        EFFECT,
        DELEGATE,
        MERGE_PROPS,
        js_string(&options.runtime_module)
    ));
    ctx.line("");

    ctx.open(format!(
        "export default function {}(__props = {{}}) {{",
        options.component_name
    ));
    ctx.verbatim(&script.body);
    ctx.line(format!("const {} = document.createDocumentFragment();", ROOT));
    emit_children(&mut ctx, &tree.children, ROOT)?;
    ctx.line(format!("return {};", ROOT));
    ctx.close("}");

    if !ctx.delegated_events.is_empty() {
        let events: Vec<String> = ctx.delegated_events().map(js_string).collect();
        ctx.line("");
        ctx.line(format!("{}([{}]);", DELEGATE, events.join(", ")));
    }

    let mut code = ctx.lines.join("\n");
    code.push('\n');

    Ok(CompileResult {
        code,
        css: source.style_blocks.join("\n\n"),
    })
}

// ═══════════════════════════════════════════════════════════════════════════════
// NODE EMISSION
// ═══════════════════════════════════════════════════════════════════════════════

/// Emit a sibling run, collapsing `tn-if` / `tn-else-if` / `tn-else`
/// neighbours into one conditional chain.
fn emit_children(ctx: &mut CodegenContext, children: &[SemanticNode], parent: &str) -> Result<(), CompilerError> {
    let mut i = 0;
    while i < children.len() {
        match &children[i] {
            SemanticNode::Text(text) => {
                emit_text(ctx, text, parent);
                i += 1;
            }
            SemanticNode::Element(el) if el.directives.if_expr.is_some() => {
                let (chain, next) = collect_chain(children, i);
                emit_conditional(ctx, &chain, parent)?;
                i = next;
            }
            SemanticNode::Element(el) if el.directives.else_if_expr.is_some() || el.directives.is_else => {
                return Err(orphan_branch(ctx, el));
            }
            SemanticNode::Element(el) => {
                emit_directed(ctx, el, parent)?;
                i += 1;
            }
        }
    }
    Ok(())
}

/// The chain starting at `start` (a `tn-if` element) and the index just
/// past it. Blank text between branches is skipped; `tn-else` ends it.
fn collect_chain(children: &[SemanticNode], start: usize) -> (Vec<&SemanticElement>, usize) {
    let mut chain = Vec::new();
    if let SemanticNode::Element(head) = &children[start] {
        chain.push(head);
    }

    let mut next = start + 1;
    let mut cursor = start + 1;
    while cursor < children.len() {
        match &children[cursor] {
            SemanticNode::Text(text) if text.is_blank() => cursor += 1,
            SemanticNode::Element(el)
                if el.directives.if_expr.is_none()
                    && (el.directives.else_if_expr.is_some() || el.directives.is_else) =>
            {
                chain.push(el);
                cursor += 1;
                next = cursor;
                if el.directives.else_if_expr.is_none() {
                    break;
                }
            }
            _ => break,
        }
    }
    (chain, next)
}

fn orphan_branch(ctx: &CodegenContext, el: &SemanticElement) -> CompilerError {
    let directive = if el.directives.else_if_expr.is_some() {
        "tn-else-if"
    } else {
        "tn-else"
    };
    CompilerError::with_details(
        ERR_ORPHAN_BRANCH,
        &format!("`{}` on <{}> has no preceding `tn-if`", directive, el.tag),
        ctx.file,
        el.line,
        el.column,
        None,
        vec![format!("Place <{}> directly after an element with tn-if", el.tag)],
    )
}

/// An element whose conditional flags have been handled: a list if it
/// carries `tn-for`, otherwise a plain element or component.
fn emit_directed(ctx: &mut CodegenContext, el: &SemanticElement, parent: &str) -> Result<(), CompilerError> {
    match &el.directives.for_each {
        Some(for_each) => emit_list(ctx, el, for_each, parent),
        None if el.is_component => emit_component(ctx, el, parent),
        None => emit_element(ctx, el, parent),
    }
}

fn emit_text(ctx: &mut CodegenContext, text: &TextNode, parent: &str) {
    let node = ctx.name("text");
    ctx.line(format!("const {} = document.createTextNode(\"\");", node));
    ctx.line(format!("{}.appendChild({});", parent, node));

    let data = text
        .segments
        .iter()
        .map(|segment| match segment {
            TextSegment::Literal(literal) => js_string(literal),
            TextSegment::Expression(expr) => format!("String({})", expr),
        })
        .collect::<Vec<_>>()
        .join(" + ");

    if text.is_static() {
        ctx.line(format!("{}.data = {};", node, data));
    } else {
        ctx.line(format!("{}(() => {{ {}.data = {}; }});", EFFECT, node, data));
    }
}

fn emit_element(ctx: &mut CodegenContext, el: &SemanticElement, parent: &str) -> Result<(), CompilerError> {
    let node = ctx.name("el");
    ctx.line(format!("const {} = document.createElement({});", node, js_string(&el.tag)));
    ctx.line(format!("{}.appendChild({});", parent, node));

    for attr in &el.static_attributes {
        ctx.line(format!(
            "{}.setAttribute({}, {});",
            node,
            js_string(&attr.name),
            js_string(attr.value.as_deref().unwrap_or(""))
        ));
    }

    for binding in &el.dynamic_bindings {
        let value = ctx.name("v");
        let name = js_string(&binding.name);
        ctx.open(format!("{}(() => {{", EFFECT));
        ctx.line(format!("const {} = ({});", value, binding.expression));
        ctx.line(format!(
            "if ({v} == null || {v} === false) {n}.removeAttribute({a});",
            v = value,
            n = node,
            a = name
        ));
        ctx.line(format!("else {}.setAttribute({}, String({}));", node, name, value));
        ctx.close("});");
    }

    for binding in &el.event_bindings {
        let event = binding.name.to_ascii_lowercase();
        ctx.line(format!(
            "{} = {};",
            property_access(&node, &format!("$${}", event)),
            event_handler(binding)
        ));
        ctx.delegated_events.insert(event);
    }

    emit_children(ctx, &el.children, &node)
}

fn emit_component(ctx: &mut CodegenContext, el: &SemanticElement, parent: &str) -> Result<(), CompilerError> {
    let mut entries = Vec::new();
    for attr in &el.static_attributes {
        let value = match &attr.value {
            Some(value) => js_string(value),
            None => "true".to_string(),
        };
        entries.push(format!("{}: {}", js_string(&attr.name), value));
    }
    for binding in &el.dynamic_bindings {
        entries.push(format!(
            "get {}() {{ return ({}); }}",
            js_string(&binding.name),
            binding.expression
        ));
    }
    for binding in &el.event_bindings {
        entries.push(format!(
            "{}: {}",
            js_string(&handler_prop_name(&binding.name)),
            event_handler(binding)
        ));
    }

    let props = if entries.is_empty() {
        "{}".to_string()
    } else {
        format!("{{ {} }}", entries.join(", "))
    };

    let node = ctx.name("c");
    ctx.line(format!("const {} = {}({});", node, el.tag, props));
    ctx.line(format!("{}.appendChild({});", parent, node));
    emit_children(ctx, &el.children, &node)
}

// ═══════════════════════════════════════════════════════════════════════════════
// CONTROL FLOW
// ═══════════════════════════════════════════════════════════════════════════════

/// Emit the start of a control-flow block: a marker comment plus the
/// closure-local list of nodes the previous run inserted.
fn emit_anchor(ctx: &mut CodegenContext, label: &str, parent: &str) -> (String, String) {
    let anchor = ctx.name("anchor");
    let nodes = ctx.name("nodes");
    ctx.line(format!("const {} = document.createComment({});", anchor, js_string(label)));
    ctx.line(format!("{}.appendChild({});", parent, anchor));
    ctx.line(format!("let {} = [];", nodes));
    (anchor, nodes)
}

fn emit_teardown(ctx: &mut CodegenContext, nodes: &str) {
    let node = ctx.name("node");
    ctx.line(format!("for (const {} of {}) {}.remove();", node, nodes, node));
    ctx.line(format!("{} = [];", nodes));
}

fn emit_conditional(
    ctx: &mut CodegenContext,
    chain: &[&SemanticElement],
    parent: &str,
) -> Result<(), CompilerError> {
    let (anchor, nodes) = emit_anchor(ctx, "tn-if", parent);

    ctx.open(format!("{}(() => {{", EFFECT));
    emit_teardown(ctx, &nodes);
    let frag = ctx.name("frag");
    ctx.line(format!("const {} = document.createDocumentFragment();", frag));

    for (index, branch) in chain.iter().enumerate() {
        let directives = &branch.directives;
        let head = match (&directives.if_expr, &directives.else_if_expr) {
            (Some(cond), _) if index == 0 => format!("if ({}) {{", cond),
            (_, Some(cond)) => format!("}} else if ({}) {{", cond),
            _ => "} else {".to_string(),
        };
        if index == 0 {
            ctx.open(head);
        } else {
            ctx.indent = ctx.indent.saturating_sub(1);
            ctx.open(head);
        }

        let mut content = (*branch).clone();
        content.directives.clear_conditional();
        emit_directed(ctx, &content, &frag)?;
    }
    ctx.close("}");

    ctx.line(format!("{} = Array.from({}.childNodes);", nodes, frag));
    ctx.line(format!("{}.parentNode.insertBefore({}, {});", anchor, frag, anchor));
    ctx.close("});");
    Ok(())
}

fn emit_list(
    ctx: &mut CodegenContext,
    el: &SemanticElement,
    for_each: &ForDirective,
    parent: &str,
) -> Result<(), CompilerError> {
    let (anchor, nodes) = emit_anchor(ctx, "tn-for", parent);

    ctx.open(format!("{}(() => {{", EFFECT));
    emit_teardown(ctx, &nodes);
    let list = ctx.name("list");
    let index = ctx.name("i");
    ctx.line(format!("const {} = ({}) ?? [];", list, for_each.list_expression));
    ctx.open(format!(
        "for (let {i} = 0; {i} < {l}.length; {i}++) {{",
        i = index,
        l = list
    ));
    ctx.line(format!("const {} = {}[{}];", for_each.item_alias, list, index));
    if let Some(alias) = &for_each.index_alias {
        ctx.line(format!("const {} = {};", alias, index));
    }

    let frag = ctx.name("frag");
    ctx.line(format!("const {} = document.createDocumentFragment();", frag));
    let mut item = el.clone();
    item.directives.for_each = None;
    emit_directed(ctx, &item, &frag)?;
    ctx.line(format!("{}.push(...{}.childNodes);", nodes, frag));
    ctx.line(format!("{}.parentNode.insertBefore({}, {});", anchor, frag, anchor));
    ctx.close("}");
    ctx.close("});");
    Ok(())
}

// ═══════════════════════════════════════════════════════════════════════════════
// HELPERS
// ═══════════════════════════════════════════════════════════════════════════════

/// A JS string literal for `s`.
pub fn js_string(s: &str) -> String {
    serde_json::Value::String(s.to_string()).to_string()
}

fn property_access(object: &str, property: &str) -> String {
    if IDENT_RE.is_match(property) {
        format!("{}.{}", object, property)
    } else {
        format!("{}[{}]", object, js_string(property))
    }
}

/// `click` → `onClick`.
fn handler_prop_name(event: &str) -> String {
    let mut chars = event.chars();
    match chars.next() {
        Some(first) => format!("on{}{}", first.to_uppercase(), chars.as_str()),
        None => "on".to_string(),
    }
}

/// Handler references and function expressions are used as-is; any other
/// statement is wrapped so it runs on each event.
fn event_handler(binding: &Binding) -> String {
    let expr = binding.expression.trim();
    if MEMBER_PATH_RE.is_match(expr) || FUNCTION_EXPR_RE.is_match(expr) {
        expr.to_string()
    } else {
        format!("($event) => {{ {}; }}", expr.trim_end_matches(';'))
    }
}
