//! Parse Module for the Tanni Compiler
//!
//! Splits a `.tanni` source into its script, template and style sections and
//! scans the template section into a raw element/text tree.
//!
//! The markup scanner is hand-rolled rather than built on an HTML5 tree
//! builder: component tags keep their casing, `:`/`@` attribute prefixes
//! survive untouched, and malformed nesting is an error instead of being
//! silently repaired.

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::ops::Range;

use crate::validate::{
    CompilerError, ERR_INVALID_CLOSE_TAG, ERR_INVALID_OPEN_TAG, ERR_MISMATCHED_CLOSE_TAG,
    ERR_MISSING_TEMPLATE, ERR_UNCLOSED_TAG, ERR_UNTERMINATED_COMMENT,
};

lazy_static! {
    static ref SCRIPT_REGEX: Regex = Regex::new(r"(?is)<script\b([^>]*)>([\s\S]*?)</script>").unwrap();
    static ref STYLE_REGEX: Regex = Regex::new(r"(?is)<style\b[^>]*>([\s\S]*?)</style>").unwrap();
    static ref TEMPLATE_OPEN_REGEX: Regex = Regex::new(r"(?i)<template\b[^>]*>").unwrap();
    static ref ATTR_REGEX: Regex =
        Regex::new(r#"(?i)([a-z0-9-]+)(?:=(?:"([^"]*)"|'([^']*)'|([^>\s]+)))?"#).unwrap();

    /// Elements that never have content. An explicit closing tag for one is
    /// ignored.
    static ref VOID_ELEMENTS: HashSet<&'static str> = [
        "area", "base", "br", "col", "embed", "hr", "img", "input", "link",
        "meta", "source", "track", "wbr",
    ]
    .into_iter()
    .collect();
}

// ═══════════════════════════════════════════════════════════════════════════════
// SECTION SPLITTING
// ═══════════════════════════════════════════════════════════════════════════════

/// The three sections of a component file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComponentSource {
    pub template_text: String,
    pub script_text: String,
    pub script_language_tag: String,
    pub style_blocks: Vec<String>,
    /// Line and column where `template_text` starts in the file.
    pub template_line: u32,
    pub template_column: u32,
}

/// Split a component file into its sections.
///
/// The first `<script>` block is the script (its `lang` defaults to `js`).
/// The template runs from the first `<template ...>` to the last
/// `</template>`, so nested `<template>` tags stay inside it. Every
/// `<style>` block is collected in document order.
pub fn split_sections(source: &str, file: &str) -> Result<ComponentSource, CompilerError> {
    let mut excluded: Vec<Range<usize>> = Vec::new();

    let mut script_text = String::new();
    let mut script_language_tag = "js".to_string();
    if let Some(caps) = SCRIPT_REGEX.captures(source) {
        let attrs = caps.get(1).map(|m| m.as_str()).unwrap_or("");
        script_text = caps.get(2).map(|m| m.as_str().trim().to_string()).unwrap_or_default();
        if let Some(lang) = script_attribute(attrs, "lang") {
            script_language_tag = lang.to_ascii_lowercase();
        }
    }
    excluded.extend(SCRIPT_REGEX.find_iter(source).map(|m| m.range()));

    let mut style_blocks = Vec::new();
    for caps in STYLE_REGEX.captures_iter(source) {
        if let Some(whole) = caps.get(0) {
            excluded.push(whole.range());
        }
        let css = caps.get(1).map(|m| m.as_str().trim()).unwrap_or("");
        if !css.is_empty() {
            style_blocks.push(css.to_string());
        }
    }

    let outside = |pos: usize| !excluded.iter().any(|r| r.contains(&pos));

    let open = TEMPLATE_OPEN_REGEX
        .find_iter(source)
        .find(|m| outside(m.start()))
        .ok_or_else(|| missing_template(file, "No <template> block found"))?;
    let close = source
        .match_indices("</template>")
        .map(|(i, _)| i)
        .filter(|&i| i >= open.end() && outside(i))
        .last()
        .ok_or_else(|| missing_template(file, "The <template> block is never closed"))?;

    let template_text = &source[open.end()..close];
    if template_text.trim().is_empty() {
        return Err(missing_template(file, "The <template> block is empty"));
    }

    let (template_line, template_column) = line_column(source, open.end());

    Ok(ComponentSource {
        template_text: template_text.to_string(),
        script_text,
        script_language_tag,
        style_blocks,
        template_line,
        template_column,
    })
}

fn script_attribute(attrs: &str, name: &str) -> Option<String> {
    ATTR_REGEX.captures_iter(attrs).find_map(|caps| {
        let attr = caps.get(1)?;
        if !attr.as_str().eq_ignore_ascii_case(name) {
            return None;
        }
        caps.get(2)
            .or_else(|| caps.get(3))
            .or_else(|| caps.get(4))
            .map(|m| m.as_str().to_string())
    })
}

fn missing_template(file: &str, message: &str) -> CompilerError {
    CompilerError::with_details(
        ERR_MISSING_TEMPLATE,
        message,
        file,
        1,
        1,
        None,
        vec!["Wrap the component markup in <template>...</template>".to_string()],
    )
}

/// 1-based line and column of a byte offset.
fn line_column(text: &str, offset: usize) -> (u32, u32) {
    let before = &text[..offset];
    let line = before.matches('\n').count() as u32 + 1;
    let line_start = before.rfind('\n').map(|i| i + 1).unwrap_or(0);
    let column = before[line_start..].chars().count() as u32 + 1;
    (line, column)
}

// ═══════════════════════════════════════════════════════════════════════════════
// RAW TREE
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct RawTree {
    pub children: Vec<RawNode>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum RawNode {
    Element(RawElement),
    Text(RawText),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawElement {
    pub tag: String,
    pub attributes: Vec<RawAttribute>,
    pub children: Vec<RawNode>,
    pub line: u32,
    pub column: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawAttribute {
    pub name: String,
    pub value: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawText {
    pub content: String,
}

/// Check if a tag name represents a component (starts with uppercase)
pub fn is_component_tag(tag_name: &str) -> bool {
    tag_name
        .chars()
        .next()
        .map(|c| c.is_uppercase())
        .unwrap_or(false)
}

fn is_void_element(tag: &str) -> bool {
    !is_component_tag(tag) && VOID_ELEMENTS.contains(tag.to_ascii_lowercase().as_str())
}

fn is_tag_name_char(c: u8) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, b'-' | b'_' | b'.' | b':')
}

// ═══════════════════════════════════════════════════════════════════════════════
// MARKUP SCANNER
// ═══════════════════════════════════════════════════════════════════════════════

/// Parse a template section that starts at line 1, column 1.
pub fn parse(section_text: &str, file: &str) -> Result<RawTree, CompilerError> {
    parse_at(section_text, file, 1, 1)
}

/// Parse a template section whose first character sits at `line:column` of
/// `file`, so reported positions point into the original file.
pub fn parse_at(section_text: &str, file: &str, line: u32, column: u32) -> Result<RawTree, CompilerError> {
    Scanner {
        src: section_text,
        bytes: section_text.as_bytes(),
        pos: 0,
        file,
        origin: (line, column),
    }
    .run()
}

struct Scanner<'a> {
    src: &'a str,
    bytes: &'a [u8],
    pos: usize,
    file: &'a str,
    origin: (u32, u32),
}

impl<'a> Scanner<'a> {
    fn run(mut self) -> Result<RawTree, CompilerError> {
        let mut root: Vec<RawNode> = Vec::new();
        let mut stack: Vec<RawElement> = Vec::new();

        while self.pos < self.bytes.len() {
            if self.starts_with("<!--") {
                self.skip_comment()?;
            } else if self.starts_with("</") {
                let start = self.pos;
                let name = self.scan_close_tag()?;
                if is_void_element(&name) {
                    continue;
                }
                let open = stack.pop().ok_or_else(|| {
                    self.error_at(
                        ERR_MISMATCHED_CLOSE_TAG,
                        &format!("Unexpected closing tag </{}> with no open element", name),
                        start,
                    )
                })?;
                if open.tag != name {
                    return Err(self.error_at(
                        ERR_MISMATCHED_CLOSE_TAG,
                        &format!(
                            "Mismatched closing tag: expected </{}> but found </{}>",
                            open.tag, name
                        ),
                        start,
                    ));
                }
                attach(&mut root, &mut stack, RawNode::Element(open));
            } else if self.bytes[self.pos] == b'<' {
                let (element, self_closing) = self.scan_open_tag()?;
                if self_closing || is_void_element(&element.tag) {
                    attach(&mut root, &mut stack, RawNode::Element(element));
                } else {
                    stack.push(element);
                }
            } else {
                let text = self.scan_text();
                if !text.trim().is_empty() {
                    attach(
                        &mut root,
                        &mut stack,
                        RawNode::Text(RawText {
                            content: text.to_string(),
                        }),
                    );
                }
            }
        }

        if let Some(unclosed) = stack.pop() {
            let (line, column) = (unclosed.line, unclosed.column);
            return Err(CompilerError::with_details(
                ERR_UNCLOSED_TAG,
                &format!("Unclosed tag <{}>", unclosed.tag),
                self.file,
                line,
                column,
                None,
                vec![format!("Add a matching </{}>", unclosed.tag)],
            ));
        }

        Ok(RawTree { children: root })
    }

    fn starts_with(&self, prefix: &str) -> bool {
        self.bytes[self.pos..].starts_with(prefix.as_bytes())
    }

    fn skip_comment(&mut self) -> Result<(), CompilerError> {
        let start = self.pos;
        match self.src[start + 4..].find("-->") {
            Some(end) => {
                self.pos = start + 4 + end + 3;
                Ok(())
            }
            None => Err(self.error_at(ERR_UNTERMINATED_COMMENT, "Unterminated comment", start)),
        }
    }

    fn scan_name(&mut self) -> &'a str {
        let start = self.pos;
        while self.pos < self.bytes.len() && is_tag_name_char(self.bytes[self.pos]) {
            self.pos += 1;
        }
        let src = self.src;
        &src[start..self.pos]
    }

    fn skip_whitespace(&mut self) {
        while self.pos < self.bytes.len() && self.bytes[self.pos].is_ascii_whitespace() {
            self.pos += 1;
        }
    }

    /// `</name>`; returns the name.
    fn scan_close_tag(&mut self) -> Result<String, CompilerError> {
        let start = self.pos;
        self.pos += 2;
        let name = self.scan_name();
        self.skip_whitespace();
        if name.is_empty() || self.bytes.get(self.pos) != Some(&b'>') {
            return Err(self.error_at(ERR_INVALID_CLOSE_TAG, "Invalid closing tag", start));
        }
        self.pos += 1;
        Ok(name.to_string())
    }

    /// `<name attrs>` or `<name attrs/>`; `>` inside quoted values does not
    /// end the tag.
    fn scan_open_tag(&mut self) -> Result<(RawElement, bool), CompilerError> {
        let start = self.pos;
        let first = self.bytes.get(start + 1).copied().unwrap_or(b' ');
        if !first.is_ascii_alphabetic() {
            return Err(self.error_at(ERR_INVALID_OPEN_TAG, "Invalid opening tag", start));
        }

        self.pos += 1;
        let tag = self.scan_name();
        let attrs_start = self.pos;

        let mut quote: Option<u8> = None;
        let mut end = None;
        while self.pos < self.bytes.len() {
            let c = self.bytes[self.pos];
            match quote {
                Some(q) if c == q => quote = None,
                Some(_) => {}
                None if c == b'"' || c == b'\'' => quote = Some(c),
                None if c == b'>' => {
                    end = Some(self.pos);
                    break;
                }
                None if c == b'<' => break,
                None => {}
            }
            self.pos += 1;
        }
        let Some(end) = end else {
            return Err(self.error_at(
                ERR_INVALID_OPEN_TAG,
                &format!("Opening tag <{}> is never terminated with '>'", tag),
                start,
            ));
        };
        self.pos = end + 1;

        let attr_text = self.src[attrs_start..end].trim_end();
        let self_closing = attr_text.ends_with('/');
        let attr_text = attr_text.strip_suffix('/').unwrap_or(attr_text);
        let (line, column) = self.position(start);

        Ok((
            RawElement {
                tag: tag.to_string(),
                attributes: tokenize_attributes(attr_text),
                children: Vec::new(),
                line,
                column,
            },
            self_closing,
        ))
    }

    /// Text up to the next `<`, skipping over `{{ ... }}` spans so a `<`
    /// inside an interpolation does not start a tag.
    fn scan_text(&mut self) -> &'a str {
        let start = self.pos;
        while self.pos < self.bytes.len() {
            if self.starts_with("{{") {
                if let Some(close) = self.src[self.pos + 2..].find("}}") {
                    self.pos += 2 + close + 2;
                    continue;
                }
            }
            if self.bytes[self.pos] == b'<' {
                break;
            }
            self.pos += 1;
        }
        let src = self.src;
        &src[start..self.pos]
    }

    fn position(&self, offset: usize) -> (u32, u32) {
        let (line, column) = line_column(self.src, offset);
        if line == 1 {
            (self.origin.0, self.origin.1 + column - 1)
        } else {
            (self.origin.0 + line - 1, column)
        }
    }

    fn error_at(&self, code: &str, message: &str, offset: usize) -> CompilerError {
        let (line, column) = self.position(offset);
        let snippet: String = self.src[offset..]
            .lines()
            .next()
            .unwrap_or("")
            .chars()
            .take(40)
            .collect();
        CompilerError::with_details(code, message, self.file, line, column, Some(snippet), vec![])
    }
}

fn attach(root: &mut Vec<RawNode>, stack: &mut [RawElement], node: RawNode) {
    match stack.last_mut() {
        Some(parent) => parent.children.push(node),
        None => root.push(node),
    }
}

/// Split attribute text into `(name, value)` pairs. Values may be bare,
/// double-quoted or single-quoted; names may start with `:` or `@`.
fn tokenize_attributes(text: &str) -> Vec<RawAttribute> {
    let bytes = text.as_bytes();
    let mut attributes = Vec::new();
    let mut i = 0;

    while i < bytes.len() {
        while i < bytes.len() && (bytes[i].is_ascii_whitespace() || bytes[i] == b'/') {
            i += 1;
        }
        let name_start = i;
        while i < bytes.len() && !bytes[i].is_ascii_whitespace() && bytes[i] != b'=' {
            i += 1;
        }
        if i == name_start {
            // A stray `=` with no name; skip it.
            i += 1;
            continue;
        }
        let name = text[name_start..i].to_string();

        let mut j = i;
        while j < bytes.len() && bytes[j].is_ascii_whitespace() {
            j += 1;
        }
        if j >= bytes.len() || bytes[j] != b'=' {
            attributes.push(RawAttribute { name, value: None });
            continue;
        }
        j += 1;
        while j < bytes.len() && bytes[j].is_ascii_whitespace() {
            j += 1;
        }

        let value = match bytes.get(j) {
            Some(&q) if q == b'"' || q == b'\'' => {
                let value_start = j + 1;
                let value_end = text[value_start..]
                    .find(q as char)
                    .map(|k| value_start + k)
                    .unwrap_or(bytes.len());
                i = (value_end + 1).min(bytes.len());
                text[value_start..value_end].to_string()
            }
            Some(_) => {
                let value_start = j;
                while j < bytes.len() && !bytes[j].is_ascii_whitespace() {
                    j += 1;
                }
                i = j;
                text[value_start..j].to_string()
            }
            None => {
                i = j;
                String::new()
            }
        };
        attributes.push(RawAttribute {
            name,
            value: Some(value),
        });
    }

    attributes
}

// ═══════════════════════════════════════════════════════════════════════════════
// TESTS
// ═══════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_component_tag() {
        assert!(is_component_tag("Button"));
        assert!(is_component_tag("HeroSection"));
        assert!(!is_component_tag("div"));
        assert!(!is_component_tag("span"));
    }

    #[test]
    fn test_tokenize_attributes() {
        let attrs = tokenize_attributes(r#"class="a b" :value='count() > 1' @click=inc disabled tn-else"#);
        let pairs: Vec<(&str, Option<&str>)> = attrs
            .iter()
            .map(|a| (a.name.as_str(), a.value.as_deref()))
            .collect();
        assert_eq!(
            pairs,
            vec![
                ("class", Some("a b")),
                (":value", Some("count() > 1")),
                ("@click", Some("inc")),
                ("disabled", None),
                ("tn-else", None),
            ]
        );
    }

    #[test]
    fn test_line_column() {
        assert_eq!(line_column("ab\ncd", 0), (1, 1));
        assert_eq!(line_column("ab\ncd", 4), (2, 2));
    }

    #[test]
    fn test_script_attribute() {
        assert_eq!(script_attribute(r#" setup lang="ts""#, "lang").as_deref(), Some("ts"));
        assert_eq!(script_attribute(" setup", "lang"), None);
    }
}
