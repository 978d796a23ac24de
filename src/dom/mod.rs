//! DOM Bridge
//!
//! The primitives generated component code calls to build and patch the
//! DOM: template cloning, reactive insertion, prop spreading and event
//! delegation, over a small in-process DOM.

mod insert;
mod node;
mod props;
mod props_view;
mod template;
mod value;

use thiserror::Error;

pub use insert::{insert, Insertable};
pub use node::{Document, Event, EventHandler, ListenerId, Node, NodeKind};
pub use props::{classify_prop_key, delegate_events, spread, PropKey, PropValue, DELEGATED_EVENTS};
pub use props_view::{merge_props, PropAccessor, Props, PropsView};
pub use template::{template, Template};
pub use value::Value;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DomError {
    #[error("template markup produced no nodes")]
    EmptyTemplate,
    #[error("failed to parse template markup: {0}")]
    Parse(String),
    #[error("reference node is not a child of this node")]
    NotAChild,
    #[error("value for prop `{key}` does not fit how that key is applied")]
    PropMismatch { key: String },
}
