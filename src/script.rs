//! Script Preprocessing
//!
//! Prepares the component's `<script>` body for embedding in the generated
//! function: imports are hoisted to module scope (type-only ones dropped),
//! `interface`/`type` declarations are removed, and the `defineProps` /
//! `withDefaults` macros are rewritten into plain runtime calls.
//!
//! Statement-level work uses the oxc parser and edits the source by span.
//! Macro rewriting is textual so it also works on scripts oxc rejects.

use lazy_static::lazy_static;
use oxc_allocator::Allocator;
use oxc_ast::ast::{Declaration, ImportDeclaration, ImportDeclarationSpecifier, Statement};
use oxc_parser::Parser;
use oxc_span::{GetSpan, SourceType};
use regex::Regex;
use tracing::warn;

lazy_static! {
    /// A static import statement starting at the beginning of a line. Group 1
    /// is the `type` modifier when present.
    static ref IMPORT_LINE_RE: Regex = Regex::new(
        r#"(?m)^[ \t]*import\s+(type\s+)?(?:[^;'"]*?\bfrom\s*)?(?:"[^"]*"|'[^']*')[ \t]*;?"#
    )
    .unwrap();
}

/// Name of the props parameter of the generated component function.
pub const PROPS_PARAM: &str = "__props";
/// Local alias of the runtime's props overlay helper.
pub const MERGE_PROPS: &str = "_$mergeProps";

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProcessedScript {
    /// Import statements to place at module scope, in source order.
    pub imports: Vec<String>,
    /// Remaining statements for the component function body.
    pub body: String,
}

/// Preprocess a script body. `lang` is the `<script lang>` value.
pub fn preprocess_script(script: &str, lang: &str) -> ProcessedScript {
    let (imports, body) = strip_statements(script, lang);
    ProcessedScript {
        imports,
        body: rewrite_macros(&body).trim().to_string(),
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// STATEMENT STRIPPING
// ═══════════════════════════════════════════════════════════════════════════════

fn source_type_for(lang: &str) -> SourceType {
    let source_type = SourceType::default().with_module(true);
    match lang {
        "ts" | "typescript" => source_type.with_typescript(true),
        "tsx" => source_type.with_typescript(true).with_jsx(true),
        "jsx" => source_type.with_jsx(true),
        _ => source_type,
    }
}

/// Returns the hoisted imports and the body with imports and type
/// declarations cut out.
fn strip_statements(script: &str, lang: &str) -> (Vec<String>, String) {
    if script.trim().is_empty() {
        return (Vec::new(), String::new());
    }

    let allocator = Allocator::default();
    let ret = Parser::new(&allocator, script, source_type_for(lang)).parse();
    if ret.panicked || !ret.errors.is_empty() {
        warn!(
            errors = ret.errors.len(),
            "script could not be parsed; hoisting imports line by line"
        );
        return hoist_import_lines(script);
    }

    let mut imports = Vec::new();
    // (start, end) byte ranges to delete from the body
    let mut removals: Vec<(usize, usize)> = Vec::new();

    for stmt in &ret.program.body {
        let span = stmt.span();
        let range = (span.start as usize, span.end as usize);
        match stmt {
            Statement::ImportDeclaration(import) => {
                removals.push(range);
                if let Some(kept) = rebuild_import(script, import) {
                    imports.push(kept);
                }
            }
            Statement::TSInterfaceDeclaration(_) | Statement::TSTypeAliasDeclaration(_) => {
                removals.push(range);
            }
            Statement::ExportNamedDeclaration(export) => {
                let type_only = export.export_kind.is_type()
                    || matches!(
                        export.declaration,
                        Some(Declaration::TSInterfaceDeclaration(_))
                            | Some(Declaration::TSTypeAliasDeclaration(_))
                    );
                if type_only {
                    removals.push(range);
                }
            }
            _ => {}
        }
    }

    let mut body = String::with_capacity(script.len());
    let mut cursor = 0;
    for (start, end) in removals {
        body.push_str(&script[cursor..start]);
        cursor = end;
    }
    body.push_str(&script[cursor..]);

    (imports, body)
}

/// Fallback for scripts oxc rejects: lift line-leading import statements out
/// of the body and drop `import type` ones.
fn hoist_import_lines(script: &str) -> (Vec<String>, String) {
    let mut imports = Vec::new();
    let body = IMPORT_LINE_RE.replace_all(script, |caps: &regex::Captures| {
        let statement = caps[0].trim();
        let type_only = caps.get(1).map_or(false, |modifier| {
            !script[modifier.end()..].trim_start().starts_with("from")
        });
        if !type_only {
            let statement = statement.trim_end_matches(';');
            imports.push(format!("{};", statement));
        }
        String::new()
    });
    (imports, body.into_owned())
}

/// The import as it should appear in the output, or `None` if nothing but
/// types was imported.
fn rebuild_import(script: &str, import: &ImportDeclaration) -> Option<String> {
    let text = |start: u32, end: u32| slice(script, start, end);
    let original = text(import.span.start, import.span.end).trim_end_matches(';');

    if import.import_kind.is_type() {
        return None;
    }
    let Some(specifiers) = &import.specifiers else {
        // side-effect import
        return Some(format!("{};", original));
    };

    let has_type_specifier = specifiers.iter().any(|s| {
        matches!(s, ImportDeclarationSpecifier::ImportSpecifier(named) if named.import_kind.is_type())
    });
    if !has_type_specifier {
        return Some(format!("{};", original));
    }

    let mut default = None;
    let mut named = Vec::new();
    for specifier in specifiers {
        match specifier {
            ImportDeclarationSpecifier::ImportDefaultSpecifier(s) => {
                default = Some(text(s.span.start, s.span.end));
            }
            ImportDeclarationSpecifier::ImportNamespaceSpecifier(s) => {
                // cannot be combined with named specifiers, so never mixed
                named.push(text(s.span.start, s.span.end).to_string());
            }
            ImportDeclarationSpecifier::ImportSpecifier(s) if !s.import_kind.is_type() => {
                named.push(text(s.span.start, s.span.end).to_string());
            }
            ImportDeclarationSpecifier::ImportSpecifier(_) => {}
        }
    }

    let source = text(import.source.span.start, import.source.span.end);
    let clause = match (default, named.is_empty()) {
        (None, true) => return None,
        (Some(default), true) => default.to_string(),
        (None, false) => format!("{{ {} }}", named.join(", ")),
        (Some(default), false) => format!("{}, {{ {} }}", default, named.join(", ")),
    };
    Some(format!("import {} from {};", clause, source))
}

fn slice(script: &str, start: u32, end: u32) -> &str {
    &script[start as usize..end as usize]
}

// ═══════════════════════════════════════════════════════════════════════════════
// MACRO REWRITING
// ═══════════════════════════════════════════════════════════════════════════════

/// Rewrite `defineProps` / `withDefaults` calls. Occurrences inside strings
/// and comments are left alone.
///
/// - `defineProps()` / `defineProps<T>()` → `__props`
/// - `defineProps(D)` / `defineProps<T>(D)` → `_$mergeProps(D, __props)`
/// - `withDefaults(defineProps<T>(), D)` → `_$mergeProps(D, __props)`
pub fn rewrite_macros(script: &str) -> String {
    let bytes = script.as_bytes();
    let mut out = String::with_capacity(script.len());
    let mut i = 0;
    let mut copied = 0;

    while i < bytes.len() {
        if let Some(end) = skip_non_code(script, i) {
            i = end;
            continue;
        }

        let candidate = matches!(bytes[i], b'w' | b'd');
        let at_boundary = i == 0 || !is_ident_byte(bytes[i - 1]) && bytes[i - 1] != b'.';
        if candidate && at_boundary {
            if let Some((end, replacement)) = match_macro_call(script, i) {
                out.push_str(&script[copied..i]);
                out.push_str(&replacement);
                i = end;
                copied = end;
                continue;
            }
        }
        i += 1;
    }

    out.push_str(&script[copied..]);
    out
}

fn match_macro_call(script: &str, start: usize) -> Option<(usize, String)> {
    if let Some(after) = keyword_at(script, start, "withDefaults") {
        let open = skip_ws(script, after);
        if script.as_bytes().get(open) != Some(&b'(') {
            return None;
        }
        let close = find_balanced_end(script, open, b'(', b')')?;
        let args = split_top_level_args(&script[open + 1..close - 1]);
        let replacement = match args.get(1) {
            Some(defaults) => overlay(defaults),
            None => PROPS_PARAM.to_string(),
        };
        return Some((close, replacement));
    }

    let after = keyword_at(script, start, "defineProps")?;
    let mut cursor = skip_ws(script, after);
    if script.as_bytes().get(cursor) == Some(&b'<') {
        cursor = skip_ws(script, find_type_arguments_end(script, cursor)?);
    }
    if script.as_bytes().get(cursor) != Some(&b'(') {
        return None;
    }
    let close = find_balanced_end(script, cursor, b'(', b')')?;
    let defaults = script[cursor + 1..close - 1].trim();
    let replacement = if defaults.is_empty() {
        PROPS_PARAM.to_string()
    } else {
        overlay(defaults)
    };
    Some((close, replacement))
}

fn overlay(defaults: &str) -> String {
    format!("{}({}, {})", MERGE_PROPS, defaults.trim(), PROPS_PARAM)
}

fn keyword_at(script: &str, start: usize, keyword: &str) -> Option<usize> {
    let end = start + keyword.len();
    if !script[start..].starts_with(keyword) {
        return None;
    }
    match script.as_bytes().get(end) {
        Some(&b) if is_ident_byte(b) => None,
        _ => Some(end),
    }
}

fn is_ident_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_' || b == b'$'
}

fn skip_ws(script: &str, mut i: usize) -> usize {
    let bytes = script.as_bytes();
    while i < bytes.len() && bytes[i].is_ascii_whitespace() {
        i += 1;
    }
    i
}

/// If a string literal or comment starts at `i`, the index just past it.
fn skip_non_code(script: &str, i: usize) -> Option<usize> {
    let bytes = script.as_bytes();
    match bytes[i] {
        b'"' | b'\'' | b'`' => {
            let quote = bytes[i];
            let mut j = i + 1;
            while j < bytes.len() {
                match bytes[j] {
                    b'\\' => j += 2,
                    c if c == quote => return Some(j + 1),
                    _ => j += 1,
                }
            }
            Some(bytes.len())
        }
        b'/' if bytes.get(i + 1) == Some(&b'/') => {
            Some(script[i..].find('\n').map(|n| i + n).unwrap_or(bytes.len()))
        }
        b'/' if bytes.get(i + 1) == Some(&b'*') => {
            Some(script[i + 2..].find("*/").map(|n| i + 2 + n + 2).unwrap_or(bytes.len()))
        }
        _ => None,
    }
}

/// Find the end of a balanced `open`/`close` group starting at `start`,
/// skipping strings and comments. Returns the index after the closing byte.
pub(crate) fn find_balanced_end(script: &str, start: usize, open: u8, close: u8) -> Option<usize> {
    let bytes = script.as_bytes();
    let mut depth = 0usize;
    let mut i = start;

    while i < bytes.len() {
        if let Some(end) = skip_non_code(script, i) {
            i = end;
            continue;
        }
        let c = bytes[i];
        if c == open {
            depth += 1;
        } else if c == close {
            depth = depth.checked_sub(1)?;
            if depth == 0 {
                return Some(i + 1);
            }
        }
        i += 1;
    }

    None
}

/// End of a `<...>` type argument list. The `>` of an arrow `=>` does not
/// close a bracket.
fn find_type_arguments_end(script: &str, start: usize) -> Option<usize> {
    let bytes = script.as_bytes();
    let mut depth = 0usize;
    let mut i = start;

    while i < bytes.len() {
        if let Some(end) = skip_non_code(script, i) {
            i = end;
            continue;
        }
        match bytes[i] {
            b'<' => depth += 1,
            b'>' if i > 0 && bytes[i - 1] == b'=' => {}
            b'>' => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return Some(i + 1);
                }
            }
            _ => {}
        }
        i += 1;
    }

    None
}

/// Split call arguments on top-level commas.
fn split_top_level_args(args: &str) -> Vec<String> {
    let bytes = args.as_bytes();
    let mut parts = Vec::new();
    let mut depth = 0i32;
    let mut start = 0;
    let mut i = 0;

    while i < bytes.len() {
        if let Some(end) = skip_non_code(args, i) {
            i = end;
            continue;
        }
        match bytes[i] {
            b'(' | b'[' | b'{' | b'<' => depth += 1,
            b')' | b']' | b'}' => depth -= 1,
            b'>' if i > 0 && bytes[i - 1] != b'=' => depth -= 1,
            b',' if depth == 0 => {
                parts.push(args[start..i].trim().to_string());
                start = i + 1;
            }
            _ => {}
        }
        i += 1;
    }

    let last = args[start..].trim();
    if !last.is_empty() {
        parts.push(last.to_string());
    }
    parts
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_define_props_forms() {
        assert_eq!(rewrite_macros("const p = defineProps();"), "const p = __props;");
        assert_eq!(
            rewrite_macros("const p = defineProps<{ a: number }>();"),
            "const p = __props;"
        );
        assert_eq!(
            rewrite_macros("const p = defineProps({ a: 1 });"),
            "const p = _$mergeProps({ a: 1 }, __props);"
        );
        assert_eq!(
            rewrite_macros("const p = defineProps<{ on: () => void }>({ on: () => {} });"),
            "const p = _$mergeProps({ on: () => {} }, __props);"
        );
    }

    #[test]
    fn test_with_defaults() {
        let out =
            rewrite_macros("const p = withDefaults(defineProps<Props>(), { size: 2, tags: [1, 2] });");
        assert_eq!(out, "const p = _$mergeProps({ size: 2, tags: [1, 2] }, __props);");
        assert!(!out.contains("withDefaults"));
        assert!(!out.contains("defineProps"));
    }

    #[test]
    fn test_macros_in_strings_and_members_untouched() {
        let src = "const s = 'defineProps()'; // defineProps()\nobj.defineProps();";
        assert_eq!(rewrite_macros(src), src);
    }

    #[test]
    fn test_imports_are_hoisted_and_types_dropped() {
        let script = r#"import type { Item } from "./types";
import { ref, type Ref } from "./util";
import Default, { type Only } from "./d";
import { type A, type B } from "./ab";
import "./side.css";
interface Props { label: string }
type Size = "s" | "m";
export type { Size };
const count = 1;"#;
        let processed = preprocess_script(script, "ts");
        assert_eq!(
            processed.imports,
            vec![
                r#"import { ref } from "./util";"#.to_string(),
                r#"import Default from "./d";"#.to_string(),
                r#"import "./side.css";"#.to_string(),
            ]
        );
        assert_eq!(processed.body, "const count = 1;");
    }

    #[test]
    fn test_unparseable_script_is_kept() {
        let processed = preprocess_script("const = ;\nconst p = defineProps();", "js");
        assert!(processed.imports.is_empty());
        assert!(processed.body.contains("const p = __props;"));
    }

    #[test]
    fn test_unparseable_script_still_hoists_imports() {
        let script = r#"import { createSignal } from "@tanni/runtime";
import type { Item } from './types';
import {
  a,
  b,
} from "./ab"
import "./side.css";
import type from "./named-type";
const x = import("./lazy");
const = ;"#;
        let processed = preprocess_script(script, "ts");
        assert_eq!(
            processed.imports,
            vec![
                r#"import { createSignal } from "@tanni/runtime";"#.to_string(),
                "import {\n  a,\n  b,\n} from \"./ab\";".to_string(),
                r#"import "./side.css";"#.to_string(),
                r#"import type from "./named-type";"#.to_string(),
            ]
        );
        assert!(!processed.body.contains("import type"));
        assert!(!processed.body.contains("./types"));
        assert!(processed.body.contains(r#"const x = import("./lazy");"#));
        assert!(processed.body.starts_with("const x"));
    }

    #[test]
    fn test_non_ascii_script() {
        assert_eq!(rewrite_macros("const s = \"ü\"; // ö\nconst p = defineProps();"), "const s = \"ü\"; // ö\nconst p = __props;");
    }

    #[test]
    fn test_balanced_end_skips_strings() {
        assert_eq!(find_balanced_end("(a, ')', (b))", 0, b'(', b')'), Some(13));
        assert_eq!(find_balanced_end("(unclosed", 0, b'(', b')'), None);
    }
}
