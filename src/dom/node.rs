//! In-process DOM
//!
//! A small reference-counted node tree with the subset of DOM behavior the
//! bridge relies on: parent/child links, attributes, reflected properties,
//! inline style, listeners with bubbling dispatch, and deep cloning.
//!
//! Children are owned strongly by their parent; the parent and owner-document
//! links are weak, so dropping a detached subtree frees it.

use std::cell::{Cell, RefCell};
use std::collections::HashSet;
use std::fmt;
use std::rc::{Rc, Weak};
use std::sync::atomic::{AtomicU64, Ordering};

use indexmap::{IndexMap, IndexSet};
use lazy_static::lazy_static;

use super::value::Value;
use super::DomError;

/// Handler invoked with the dispatched event.
pub type EventHandler = Rc<dyn Fn(&Event)>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

impl ListenerId {
    fn next() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    Document,
    Fragment,
    Element,
    Text,
    Comment,
}

lazy_static! {
    /// Properties every element exposes. Anything else only exists once it
    /// has been assigned.
    static ref ELEMENT_PROPERTIES: HashSet<&'static str> = [
        "id", "className", "title", "lang", "dir", "hidden", "tabIndex",
        "value", "checked", "selected", "disabled", "readOnly", "required",
        "placeholder", "name", "type", "href", "src", "alt", "htmlFor",
        "textContent", "innerHTML", "multiple", "autofocus", "draggable",
    ]
    .into_iter()
    .collect();

    static ref VOID_ELEMENTS: HashSet<&'static str> = [
        "area", "base", "br", "col", "embed", "hr", "img", "input", "link",
        "meta", "source", "track", "wbr",
    ]
    .into_iter()
    .collect();
}

struct Listener {
    id: ListenerId,
    event: String,
    handler: EventHandler,
}

struct NodeInner {
    kind: NodeKind,
    tag: String,
    data: RefCell<String>,
    attributes: RefCell<IndexMap<String, String>>,
    properties: RefCell<IndexMap<String, Value>>,
    style: RefCell<IndexMap<String, String>>,
    parent: RefCell<Weak<NodeInner>>,
    children: RefCell<Vec<Node>>,
    owner: RefCell<Weak<NodeInner>>,
    listeners: RefCell<Vec<Listener>>,
    /// Delegated-handler table, consulted by the document-level listener.
    handlers: RefCell<IndexMap<String, EventHandler>>,
    /// Direct listeners registered through prop spreading, by event name.
    direct: RefCell<IndexMap<String, ListenerId>>,
    /// Event names with a document-level delegation listener (documents only).
    delegated: RefCell<IndexSet<String>>,
}

impl NodeInner {
    fn new(kind: NodeKind, tag: &str, data: &str, owner: Weak<NodeInner>) -> Self {
        Self {
            kind,
            tag: tag.to_string(),
            data: RefCell::new(data.to_string()),
            attributes: RefCell::new(IndexMap::new()),
            properties: RefCell::new(IndexMap::new()),
            style: RefCell::new(IndexMap::new()),
            parent: RefCell::new(Weak::new()),
            children: RefCell::new(Vec::new()),
            owner: RefCell::new(owner),
            listeners: RefCell::new(Vec::new()),
            handlers: RefCell::new(IndexMap::new()),
            direct: RefCell::new(IndexMap::new()),
            delegated: RefCell::new(IndexSet::new()),
        }
    }
}

/// A handle to a DOM node. Clones refer to the same node.
#[derive(Clone)]
pub struct Node(Rc<NodeInner>);

impl PartialEq for Node {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl Eq for Node {}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0.kind {
            NodeKind::Element => write!(f, "<{}>", self.0.tag),
            NodeKind::Text => write!(f, "#text({:?})", self.0.data.borrow()),
            NodeKind::Comment => write!(f, "<!--{}-->", self.0.data.borrow()),
            NodeKind::Fragment => write!(f, "#fragment[{}]", self.child_count()),
            NodeKind::Document => write!(f, "#document"),
        }
    }
}

impl Node {
    fn create(kind: NodeKind, tag: &str, data: &str, owner: Weak<NodeInner>) -> Self {
        Node(Rc::new(NodeInner::new(kind, tag, data, owner)))
    }

    pub fn kind(&self) -> NodeKind {
        self.0.kind
    }

    /// Lowercased tag name for elements, empty otherwise.
    pub fn tag_name(&self) -> &str {
        &self.0.tag
    }

    pub fn is_element(&self) -> bool {
        self.0.kind == NodeKind::Element
    }

    /// Character data of a text or comment node.
    pub fn data(&self) -> String {
        self.0.data.borrow().clone()
    }

    pub fn set_data(&self, data: &str) {
        *self.0.data.borrow_mut() = data.to_string();
    }

    pub fn owner_document(&self) -> Option<Document> {
        if self.0.kind == NodeKind::Document {
            return Some(Document(self.clone()));
        }
        self.0.owner.borrow().upgrade().map(|inner| Document(Node(inner)))
    }

    // ═══════════════════════════════════════════════════════════════════════════════
    // TREE
    // ═══════════════════════════════════════════════════════════════════════════════

    pub fn parent(&self) -> Option<Node> {
        self.0.parent.borrow().upgrade().map(Node)
    }

    pub fn children(&self) -> Vec<Node> {
        self.0.children.borrow().clone()
    }

    pub fn child_count(&self) -> usize {
        self.0.children.borrow().len()
    }

    pub fn first_child(&self) -> Option<Node> {
        self.0.children.borrow().first().cloned()
    }

    /// Append `child`. A fragment is emptied into this node instead.
    pub fn append_child(&self, child: &Node) {
        for node in Self::take_insertable(child) {
            self.attach(node, None);
        }
    }

    /// Insert `child` before `reference`, or append when `reference` is None.
    pub fn insert_before(&self, child: &Node, reference: Option<&Node>) -> Result<(), DomError> {
        let Some(reference) = reference else {
            self.append_child(child);
            return Ok(());
        };
        if reference.parent().as_ref() != Some(self) {
            return Err(DomError::NotAChild);
        }
        for node in Self::take_insertable(child) {
            self.attach(node, Some(reference));
        }
        Ok(())
    }

    pub fn remove_child(&self, child: &Node) -> Result<Node, DomError> {
        let index = self
            .0
            .children
            .borrow()
            .iter()
            .position(|c| c == child)
            .ok_or(DomError::NotAChild)?;
        let removed = self.0.children.borrow_mut().remove(index);
        *removed.0.parent.borrow_mut() = Weak::new();
        Ok(removed)
    }

    /// Detach this node from its parent, if it has one.
    pub fn remove(&self) {
        if let Some(parent) = self.parent() {
            let _ = parent.remove_child(self);
        }
    }

    fn take_insertable(child: &Node) -> Vec<Node> {
        if child.0.kind == NodeKind::Fragment {
            let moved = std::mem::take(&mut *child.0.children.borrow_mut());
            for node in &moved {
                *node.0.parent.borrow_mut() = Weak::new();
            }
            moved
        } else {
            vec![child.clone()]
        }
    }

    fn attach(&self, node: Node, before: Option<&Node>) {
        node.remove();
        *node.0.parent.borrow_mut() = Rc::downgrade(&self.0);
        let mut children = self.0.children.borrow_mut();
        let index = before
            .and_then(|reference| children.iter().position(|c| c == reference))
            .unwrap_or(children.len());
        children.insert(index, node);
    }

    // ═══════════════════════════════════════════════════════════════════════════════
    // ATTRIBUTES, PROPERTIES, STYLE
    // ═══════════════════════════════════════════════════════════════════════════════

    pub fn get_attribute(&self, name: &str) -> Option<String> {
        self.0.attributes.borrow().get(name).cloned()
    }

    pub fn has_attribute(&self, name: &str) -> bool {
        self.0.attributes.borrow().contains_key(name)
    }

    pub fn set_attribute(&self, name: &str, value: &str) {
        self.0
            .attributes
            .borrow_mut()
            .insert(name.to_string(), value.to_string());
    }

    pub fn remove_attribute(&self, name: &str) {
        self.0.attributes.borrow_mut().shift_remove(name);
    }

    pub fn attribute_names(&self) -> Vec<String> {
        self.0.attributes.borrow().keys().cloned().collect()
    }

    /// True if `name` is a property of this element (`name in el`).
    pub fn has_property(&self, name: &str) -> bool {
        self.0.kind == NodeKind::Element
            && (ELEMENT_PROPERTIES.contains(name) || self.0.properties.borrow().contains_key(name))
    }

    pub fn property(&self, name: &str) -> Option<Value> {
        self.0.properties.borrow().get(name).cloned()
    }

    pub fn set_property(&self, name: &str, value: Value) {
        self.0.properties.borrow_mut().insert(name.to_string(), value);
    }

    pub fn style_property(&self, name: &str) -> Option<String> {
        self.0.style.borrow().get(name).cloned()
    }

    pub fn set_style_property(&self, name: &str, value: &str) {
        self.0
            .style
            .borrow_mut()
            .insert(name.to_string(), value.to_string());
    }

    // ═══════════════════════════════════════════════════════════════════════════════
    // EVENTS
    // ═══════════════════════════════════════════════════════════════════════════════

    pub fn add_event_listener(&self, event: &str, handler: EventHandler) -> ListenerId {
        let id = ListenerId::next();
        self.0.listeners.borrow_mut().push(Listener {
            id,
            event: event.to_string(),
            handler,
        });
        id
    }

    pub fn remove_event_listener(&self, id: ListenerId) -> bool {
        let mut listeners = self.0.listeners.borrow_mut();
        let before = listeners.len();
        listeners.retain(|l| l.id != id);
        listeners.len() != before
    }

    pub fn listener_count(&self, event: &str) -> usize {
        self.0
            .listeners
            .borrow()
            .iter()
            .filter(|l| l.event == event)
            .count()
    }

    /// Dispatch `event` at this node and bubble it up the parent chain.
    pub fn dispatch_event(&self, event: &str) -> Event {
        let event = Event::new(event, self.clone());
        let mut current = Some(self.clone());
        while let Some(node) = current {
            event.set_current_target(Some(node.clone()));
            let handlers: Vec<EventHandler> = node
                .0
                .listeners
                .borrow()
                .iter()
                .filter(|l| l.event == event.name)
                .map(|l| Rc::clone(&l.handler))
                .collect();
            for handler in handlers {
                handler(&event);
            }
            if event.is_propagation_stopped() {
                break;
            }
            current = node.parent();
        }
        event.set_current_target(None);
        event
    }

    /// Store the delegated handler for `event` on this element.
    pub fn set_handler(&self, event: &str, handler: EventHandler) {
        self.0
            .handlers
            .borrow_mut()
            .insert(event.to_string(), handler);
    }

    pub fn clear_handler(&self, event: &str) {
        self.0.handlers.borrow_mut().shift_remove(event);
    }

    pub fn handler(&self, event: &str) -> Option<EventHandler> {
        self.0.handlers.borrow().get(event).cloned()
    }

    pub(crate) fn direct_listener(&self, event: &str) -> Option<ListenerId> {
        self.0.direct.borrow().get(event).copied()
    }

    pub(crate) fn set_direct_listener(&self, event: &str, id: ListenerId) {
        self.0.direct.borrow_mut().insert(event.to_string(), id);
    }

    /// Drop every listener and delegated handler in this subtree.
    pub fn dispose(&self) {
        self.0.listeners.borrow_mut().clear();
        self.0.handlers.borrow_mut().clear();
        self.0.direct.borrow_mut().clear();
        for child in self.children() {
            child.dispose();
        }
    }

    // ═══════════════════════════════════════════════════════════════════════════════
    // CLONING & SERIALIZATION
    // ═══════════════════════════════════════════════════════════════════════════════

    /// Structural copy without listeners or handlers.
    pub fn clone_node(&self, deep: bool) -> Node {
        let inner = &self.0;
        let copy = Node::create(inner.kind, &inner.tag, &inner.data.borrow(), inner.owner.borrow().clone());
        *copy.0.attributes.borrow_mut() = inner.attributes.borrow().clone();
        *copy.0.properties.borrow_mut() = inner.properties.borrow().clone();
        *copy.0.style.borrow_mut() = inner.style.borrow().clone();
        if deep {
            for child in self.children() {
                copy.append_child(&child.clone_node(true));
            }
        }
        copy
    }

    pub fn text_content(&self) -> String {
        match self.0.kind {
            NodeKind::Text => self.data(),
            NodeKind::Comment => String::new(),
            _ => self.children().iter().map(Node::text_content).collect(),
        }
    }

    /// Serialize this node as HTML (outer HTML for elements).
    pub fn to_html(&self) -> String {
        let mut out = String::new();
        self.write_html(&mut out);
        out
    }

    fn write_html(&self, out: &mut String) {
        match self.0.kind {
            NodeKind::Text => out.push_str(&escape_text(&self.0.data.borrow())),
            NodeKind::Comment => {
                out.push_str("<!--");
                out.push_str(&self.0.data.borrow());
                out.push_str("-->");
            }
            NodeKind::Document | NodeKind::Fragment => {
                for child in self.children() {
                    child.write_html(out);
                }
            }
            NodeKind::Element => {
                out.push('<');
                out.push_str(&self.0.tag);
                for (name, value) in self.0.attributes.borrow().iter() {
                    out.push(' ');
                    out.push_str(name);
                    out.push_str("=\"");
                    out.push_str(&escape_attribute(value));
                    out.push('"');
                }
                let style = self.0.style.borrow();
                if !style.is_empty() && !self.has_attribute("style") {
                    let css: Vec<String> = style.iter().map(|(k, v)| format!("{}: {}", k, v)).collect();
                    out.push_str(" style=\"");
                    out.push_str(&escape_attribute(&css.join("; ")));
                    out.push('"');
                }
                out.push('>');
                if VOID_ELEMENTS.contains(self.0.tag.as_str()) {
                    return;
                }
                for child in self.children() {
                    child.write_html(out);
                }
                out.push_str("</");
                out.push_str(&self.0.tag);
                out.push('>');
            }
        }
    }
}

fn escape_text(text: &str) -> String {
    text.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;")
}

fn escape_attribute(value: &str) -> String {
    value.replace('&', "&amp;").replace('"', "&quot;")
}

// ═══════════════════════════════════════════════════════════════════════════════
// DOCUMENT
// ═══════════════════════════════════════════════════════════════════════════════

/// Root node and node factory. Every document starts with an empty `<body>`.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct Document(Node);

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl Document {
    pub fn new() -> Self {
        let document = Document(Node::create(NodeKind::Document, "", "", Weak::new()));
        let body = document.create_element("body");
        document.0.append_child(&body);
        document
    }

    pub fn node(&self) -> &Node {
        &self.0
    }

    pub fn body(&self) -> Option<Node> {
        self.0.children().into_iter().find(|n| n.tag_name() == "body")
    }

    fn owner(&self) -> Weak<NodeInner> {
        Rc::downgrade(&(self.0).0)
    }

    pub fn create_element(&self, tag: &str) -> Node {
        Node::create(NodeKind::Element, &tag.to_ascii_lowercase(), "", self.owner())
    }

    pub fn create_text_node(&self, data: &str) -> Node {
        Node::create(NodeKind::Text, "", data, self.owner())
    }

    pub fn create_comment(&self, data: &str) -> Node {
        Node::create(NodeKind::Comment, "", data, self.owner())
    }

    pub fn create_document_fragment(&self) -> Node {
        Node::create(NodeKind::Fragment, "", "", self.owner())
    }

    /// Record that `event` has a document-level delegation listener.
    /// Returns false if it already had one.
    pub(crate) fn mark_delegated(&self, event: &str) -> bool {
        (self.0).0.delegated.borrow_mut().insert(event.to_string())
    }

    pub fn is_delegated(&self, event: &str) -> bool {
        (self.0).0.delegated.borrow().contains(event)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// EVENT
// ═══════════════════════════════════════════════════════════════════════════════

pub struct Event {
    name: String,
    target: Node,
    current_target: RefCell<Option<Node>>,
    propagation_stopped: Cell<bool>,
    default_prevented: Cell<bool>,
}

impl Event {
    fn new(name: &str, target: Node) -> Self {
        Self {
            name: name.to_string(),
            target,
            current_target: RefCell::new(None),
            propagation_stopped: Cell::new(false),
            default_prevented: Cell::new(false),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn target(&self) -> &Node {
        &self.target
    }

    pub fn current_target(&self) -> Option<Node> {
        self.current_target.borrow().clone()
    }

    pub(crate) fn set_current_target(&self, node: Option<Node>) {
        *self.current_target.borrow_mut() = node;
    }

    pub fn stop_propagation(&self) {
        self.propagation_stopped.set(true);
    }

    pub fn is_propagation_stopped(&self) -> bool {
        self.propagation_stopped.get()
    }

    pub fn prevent_default(&self) {
        self.default_prevented.set(true);
    }

    pub fn default_prevented(&self) -> bool {
        self.default_prevented.get()
    }
}

impl fmt::Debug for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Event")
            .field("name", &self.name)
            .field("target", &self.target)
            .field("propagation_stopped", &self.is_propagation_stopped())
            .finish()
    }
}
