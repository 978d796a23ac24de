//! Property/event spreading and document-level event delegation.

use std::collections::HashSet;
use std::rc::Rc;

use lazy_static::lazy_static;
use tracing::trace;

use super::insert::{insert, Insertable};
use super::node::{Document, Event, EventHandler, Node, NodeKind};
use super::value::Value;
use super::DomError;

lazy_static! {
    /// Events that bubble reliably and are handled through one document
    /// listener per type instead of one listener per element.
    pub static ref DELEGATED_EVENTS: HashSet<&'static str> = [
        "beforeinput", "click", "dblclick", "contextmenu", "focusin", "focusout",
        "input", "keydown", "keyup", "mousedown", "mousemove", "mouseout",
        "mouseover", "mouseup", "pointerdown", "pointermove", "pointerout",
        "pointerover", "pointerup", "touchend", "touchmove", "touchstart",
    ]
    .into_iter()
    .collect();
}

/// How a spread key is applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PropKey {
    Children,
    Style,
    /// Lowercased event name.
    Event(String),
    Attribute(String),
}

/// Resolve `@name`, `on:name` and `onName` to events, everything else to
/// children, style or a plain attribute.
pub fn classify_prop_key(key: &str) -> PropKey {
    if key == "children" {
        return PropKey::Children;
    }
    if key == "style" {
        return PropKey::Style;
    }
    if let Some(name) = key.strip_prefix('@') {
        return PropKey::Event(name.to_ascii_lowercase());
    }
    if let Some(name) = key.strip_prefix("on:") {
        return PropKey::Event(name.to_ascii_lowercase());
    }
    if let Some(name) = key.strip_prefix("on") {
        if name.starts_with(|c: char| c.is_ascii_uppercase()) {
            return PropKey::Event(name.to_ascii_lowercase());
        }
    }
    PropKey::Attribute(key.to_string())
}

/// A value passed to [`spread`].
#[derive(Clone)]
pub enum PropValue {
    Value(Value),
    Style(Vec<(String, String)>),
    Children(Insertable),
    Handler(EventHandler),
}

macro_rules! prop_value_from {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for PropValue {
                fn from(value: $ty) -> Self {
                    PropValue::Value(value.into())
                }
            }
        )*
    };
}

prop_value_from!(Value, &str, String, f64, i32, bool);

/// Apply every `(key, value)` pair to `element` in order.
pub fn spread<K, I>(element: &Node, props: I) -> Result<(), DomError>
where
    K: AsRef<str>,
    I: IntoIterator<Item = (K, PropValue)>,
{
    for (key, value) in props {
        apply_prop(element, key.as_ref(), value)?;
    }
    Ok(())
}

fn apply_prop(element: &Node, key: &str, value: PropValue) -> Result<(), DomError> {
    match (classify_prop_key(key), value) {
        (PropKey::Children, PropValue::Children(content)) => insert(element, content, None),
        (PropKey::Children, PropValue::Value(value)) => insert(element, value.into(), None),
        (PropKey::Style, PropValue::Style(entries)) => {
            for (name, value) in entries {
                element.set_style_property(&name, &value);
            }
        }
        (PropKey::Style, PropValue::Value(value)) => set_attribute_or_property(element, "style", &value),
        (PropKey::Event(name), PropValue::Handler(handler)) => add_event(element, &name, handler),
        (PropKey::Event(name), PropValue::Value(Value::Null)) => remove_event(element, &name),
        (PropKey::Attribute(name), PropValue::Value(value)) => {
            set_attribute_or_property(element, &name, &value)
        }
        _ => {
            return Err(DomError::PropMismatch {
                key: key.to_string(),
            })
        }
    }
    Ok(())
}

fn set_attribute_or_property(element: &Node, name: &str, value: &Value) {
    let as_property =
        element.has_property(name) && !name.starts_with("aria-") && !name.starts_with("data-");

    if value.is_falsy() {
        element.remove_attribute(name);
        if as_property {
            element.set_property(name, Value::Str(String::new()));
        }
    } else if as_property {
        element.set_property(name, value.clone());
    } else {
        element.set_attribute(name, &value.to_js_string());
    }
}

fn add_event(element: &Node, name: &str, handler: EventHandler) {
    if DELEGATED_EVENTS.contains(name) {
        element.set_handler(name, handler);
        if let Some(document) = element.owner_document() {
            delegate_events(&document, &[name]);
        }
        return;
    }

    if let Some(previous) = element.direct_listener(name) {
        element.remove_event_listener(previous);
    }
    let id = element.add_event_listener(name, handler);
    element.set_direct_listener(name, id);
}

fn remove_event(element: &Node, name: &str) {
    if let Some(previous) = element.direct_listener(name) {
        element.remove_event_listener(previous);
    }
    element.clear_handler(name);
}

/// Install one document-level listener for each event name not seen before.
pub fn delegate_events<S: AsRef<str>>(document: &Document, names: &[S]) {
    for name in names {
        let name = name.as_ref();
        if !document.mark_delegated(name) {
            continue;
        }
        trace!(event = name, "installing delegated listener");
        let event_name = name.to_string();
        document
            .node()
            .add_event_listener(name, Rc::new(move |event: &Event| dispatch_delegated(&event_name, event)));
    }
}

/// Walk from the target up to (not including) the document, invoking each
/// node's handler for `name`.
fn dispatch_delegated(name: &str, event: &Event) {
    let mut current = Some(event.target().clone());
    while let Some(node) = current {
        if node.kind() == NodeKind::Document {
            break;
        }
        if let Some(handler) = node.handler(name) {
            event.set_current_target(Some(node.clone()));
            handler(event);
            if event.is_propagation_stopped() {
                break;
            }
        }
        current = node.parent();
    }
}
