//! Reactive insertion.
//!
//! Content handed to [`insert`] is one of a closed set of shapes. Static
//! shapes are normalized into nodes once; an accessor is re-evaluated inside
//! an effect, and each run swaps the previously inserted nodes for the new
//! ones in front of the marker.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use tracing::warn;

use super::node::{Document, Node};
use super::value::Value;
use crate::reactive::create_effect;

/// Anything that can be inserted as element content.
#[derive(Clone)]
pub enum Insertable {
    Node(Node),
    Scalar(Value),
    List(Vec<Insertable>),
    Accessor(Rc<dyn Fn() -> Insertable>),
}

impl Insertable {
    pub fn accessor(f: impl Fn() -> Insertable + 'static) -> Self {
        Insertable::Accessor(Rc::new(f))
    }

    /// Flatten into DOM nodes. `null` and booleans vanish, lists flatten
    /// recursively and other scalars become text nodes. Accessors are
    /// evaluated in the caller's tracking scope.
    pub fn normalize(&self, document: &Document, out: &mut Vec<Node>) {
        match self {
            Insertable::Node(node) => out.push(node.clone()),
            Insertable::Scalar(value) => {
                if value.is_renderable() {
                    out.push(document.create_text_node(&value.to_js_string()));
                }
            }
            Insertable::List(items) => {
                for item in items {
                    item.normalize(document, out);
                }
            }
            Insertable::Accessor(f) => f().normalize(document, out),
        }
    }
}

impl fmt::Debug for Insertable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Insertable::Node(node) => f.debug_tuple("Node").field(node).finish(),
            Insertable::Scalar(value) => f.debug_tuple("Scalar").field(value).finish(),
            Insertable::List(items) => f.debug_tuple("List").field(items).finish(),
            Insertable::Accessor(_) => f.write_str("Accessor(..)"),
        }
    }
}

impl From<Node> for Insertable {
    fn from(node: Node) -> Self {
        Insertable::Node(node)
    }
}

impl From<Value> for Insertable {
    fn from(value: Value) -> Self {
        Insertable::Scalar(value)
    }
}

impl From<&str> for Insertable {
    fn from(value: &str) -> Self {
        Insertable::Scalar(value.into())
    }
}

impl From<String> for Insertable {
    fn from(value: String) -> Self {
        Insertable::Scalar(value.into())
    }
}

impl<T: Into<Insertable>> From<Vec<T>> for Insertable {
    fn from(items: Vec<T>) -> Self {
        Insertable::List(items.into_iter().map(Into::into).collect())
    }
}

/// Insert `value` into `parent` before `marker` (or at the end).
pub fn insert(parent: &Node, value: Insertable, marker: Option<&Node>) {
    let document = parent.owner_document().unwrap_or_default();

    match value {
        Insertable::Accessor(accessor) => {
            let parent = parent.clone();
            let marker = marker.cloned();
            let current: Rc<RefCell<Vec<Node>>> = Rc::new(RefCell::new(Vec::new()));

            create_effect(move || {
                let mut next = Vec::new();
                accessor().normalize(&document, &mut next);

                let previous = std::mem::take(&mut *current.borrow_mut());
                for node in previous.iter().filter(|node| !next.contains(node)) {
                    node.remove();
                    node.dispose();
                }
                splice(&parent, &next, marker.as_ref());
                *current.borrow_mut() = next;
            });
        }
        value => {
            let mut nodes = Vec::new();
            value.normalize(&document, &mut nodes);
            splice(&parent, &nodes, marker);
        }
    }
}

fn splice(parent: &Node, nodes: &[Node], marker: Option<&Node>) {
    for node in nodes {
        if let Err(err) = parent.insert_before(node, marker) {
            warn!(%err, "insertion marker is not a child of the parent; appending");
            parent.append_child(node);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::Signal;

    #[test]
    fn static_values_normalize_to_nodes() {
        let doc = Document::new();
        let parent = doc.create_element("div");
        let value = Insertable::List(vec![
            "a".into(),
            Value::Null.into(),
            Value::Bool(true).into(),
            Insertable::List(vec![Value::from(1).into(), "b".into()]),
        ]);
        insert(&parent, value, None);
        assert_eq!(parent.to_html(), "<div>a1b</div>");
    }

    #[test]
    fn accessor_replaces_previous_nodes_before_marker() {
        let doc = Document::new();
        let parent = doc.create_element("ul");
        let marker = doc.create_comment("end");
        parent.append_child(&marker);

        let items = Signal::new(vec!["a", "b"]);
        let source = items.clone();
        let owner = doc.clone();
        insert(
            &parent,
            Insertable::accessor(move || {
                let nodes: Vec<Insertable> = source
                    .get()
                    .into_iter()
                    .map(|item| {
                        let li = owner.create_element("li");
                        li.append_child(&owner.create_text_node(item));
                        Insertable::Node(li)
                    })
                    .collect();
                Insertable::List(nodes)
            }),
            Some(&marker),
        );
        assert_eq!(parent.to_html(), "<ul><li>a</li><li>b</li><!--end--></ul>");

        items.set(vec!["c"]);
        assert_eq!(parent.to_html(), "<ul><li>c</li><!--end--></ul>");
    }

    #[test]
    fn nodes_kept_across_runs_are_not_disposed() {
        let doc = Document::new();
        let parent = doc.create_element("div");
        let kept = doc.create_element("span");
        kept.set_handler("click", Rc::new(|_: &crate::dom::Event| {}));

        let flag = Signal::new(false);
        let (reader, node) = (flag.clone(), kept.clone());
        insert(
            &parent,
            Insertable::accessor(move || {
                if reader.get() {
                    Insertable::List(vec![Insertable::Node(node.clone()), "!".into()])
                } else {
                    Insertable::Node(node.clone())
                }
            }),
            None,
        );
        flag.set(true);
        assert_eq!(parent.to_html(), "<div><span></span>!</div>");
        assert!(kept.handler("click").is_some());
    }
}
