//! Template materialization.
//!
//! Static markup is parsed once with html5ever into a detached node (or a
//! fragment when the markup has several top-level nodes) and every render
//! takes a deep clone of it.

use html5ever::parse_document;
use html5ever::tendril::TendrilSink;
use markup5ever_rcdom::{Handle, NodeData, RcDom};

use super::node::{Document, Node, NodeKind};
use super::DomError;

/// Parsed markup ready for repeated cloning.
#[derive(Debug, Clone)]
pub struct Template {
    root: Node,
}

impl Template {
    /// A fresh structural copy with no reactive wiring attached.
    pub fn instantiate(&self) -> Node {
        self.root.clone_node(true)
    }

    pub fn to_html(&self) -> String {
        self.root.to_html()
    }
}

/// Parse `html` into a reusable [`Template`] owned by `document`.
pub fn template(document: &Document, html: &str) -> Result<Template, DomError> {
    let dom = parse_document(RcDom::default(), Default::default())
        .from_utf8()
        .read_from(&mut html.as_bytes())
        .map_err(|e| DomError::Parse(e.to_string()))?;

    let mut top_level = Vec::new();
    collect_body_content(&dom.document, document, &mut top_level);
    top_level.retain(|node| !(node.kind() == NodeKind::Text && node.data().trim().is_empty()));

    let root = match top_level.len() {
        0 => return Err(DomError::EmptyTemplate),
        1 => top_level.remove(0),
        _ => {
            let fragment = document.create_document_fragment();
            for node in &top_level {
                fragment.append_child(node);
            }
            fragment
        }
    };

    Ok(Template { root })
}

/// Descend through the implied `html`/`head`/`body` wrappers and convert
/// whatever the markup actually contained.
fn collect_body_content(handle: &Handle, document: &Document, out: &mut Vec<Node>) {
    match &handle.data {
        NodeData::Document => {
            for child in handle.children.borrow().iter() {
                collect_body_content(child, document, out);
            }
        }
        NodeData::Element { name, .. } => {
            let tag = name.local.to_string();
            if tag == "html" || tag == "head" || tag == "body" {
                for child in handle.children.borrow().iter() {
                    collect_body_content(child, document, out);
                }
            } else if let Some(node) = convert(handle, document) {
                out.push(node);
            }
        }
        NodeData::Text { .. } | NodeData::Comment { .. } => {
            if let Some(node) = convert(handle, document) {
                out.push(node);
            }
        }
        _ => {}
    }
}

fn convert(handle: &Handle, document: &Document) -> Option<Node> {
    match &handle.data {
        NodeData::Text { contents } => Some(document.create_text_node(&contents.borrow())),
        NodeData::Comment { contents } => Some(document.create_comment(contents)),
        NodeData::Element { name, attrs, .. } => {
            let element = document.create_element(&name.local);
            for attr in attrs.borrow().iter() {
                element.set_attribute(&attr.name.local, &attr.value);
            }
            for child in handle.children.borrow().iter() {
                if let Some(node) = convert(child, document) {
                    element.append_child(&node);
                }
            }
            Some(element)
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_root_is_returned_directly() {
        let doc = Document::new();
        let tpl = template(&doc, "<div class=\"card\"><b>hi</b></div>").expect("valid markup");
        let node = tpl.instantiate();
        assert_eq!(node.kind(), NodeKind::Element);
        assert_eq!(node.to_html(), "<div class=\"card\"><b>hi</b></div>");
    }

    #[test]
    fn several_roots_become_a_fragment() {
        let doc = Document::new();
        let tpl = template(&doc, "<span>a</span>\n<span>b</span>").expect("valid markup");
        let node = tpl.instantiate();
        assert_eq!(node.kind(), NodeKind::Fragment);
        assert_eq!(node.child_count(), 2);
    }

    #[test]
    fn clones_are_independent() {
        let doc = Document::new();
        let tpl = template(&doc, "<p>x</p>").expect("valid markup");
        let first = tpl.instantiate();
        let second = tpl.instantiate();
        first.set_attribute("id", "one");
        assert_ne!(first, second);
        assert!(!second.has_attribute("id"));
    }

    #[test]
    fn blank_markup_is_rejected() {
        let doc = Document::new();
        assert_eq!(template(&doc, "   ").err(), Some(DomError::EmptyTemplate));
    }
}
