//! Component props with fallback defaults.
//!
//! [`Props`] is the live record a parent hands to a component; every entry
//! is an accessor so reads stay lazy and reactive. [`PropsView`] layers a
//! defaults record underneath: lookups hit the live record first and fall
//! back to the default only for keys the parent never set.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;

use super::value::Value;

pub type PropAccessor = Rc<dyn Fn() -> Value>;

/// Shared, mutable props record. Clones see the same entries.
#[derive(Clone, Default)]
pub struct Props {
    entries: Rc<RefCell<IndexMap<String, PropAccessor>>>,
}

impl Props {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set `name` to an accessor evaluated on every read.
    pub fn set(&self, name: &str, accessor: impl Fn() -> Value + 'static) {
        self.entries
            .borrow_mut()
            .insert(name.to_string(), Rc::new(accessor));
    }

    pub fn set_value(&self, name: &str, value: impl Into<Value>) {
        let value = value.into();
        self.set(name, move || value.clone());
    }

    pub fn remove(&self, name: &str) {
        self.entries.borrow_mut().shift_remove(name);
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.borrow().contains_key(name)
    }

    /// Evaluate the accessor for `name`. Reads inside it are tracked by the
    /// current computation.
    pub fn get(&self, name: &str) -> Option<Value> {
        let accessor = self.entries.borrow().get(name).cloned();
        accessor.map(|f| f())
    }

    pub fn keys(&self) -> Vec<String> {
        self.entries.borrow().keys().cloned().collect()
    }
}

impl fmt::Debug for Props {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.keys()).finish()
    }
}

/// Read-through view over live props and defaults.
#[derive(Clone, Debug)]
pub struct PropsView {
    props: Props,
    defaults: IndexMap<String, Value>,
}

impl PropsView {
    pub fn get(&self, name: &str) -> Value {
        self.props
            .get(name)
            .or_else(|| self.defaults.get(name).cloned())
            .unwrap_or_default()
    }

    pub fn has(&self, name: &str) -> bool {
        self.props.contains(name) || self.defaults.contains_key(name)
    }

    /// Default keys first, then keys only the live record has.
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.defaults.keys().cloned().collect();
        for key in self.props.keys() {
            if !self.defaults.contains_key(&key) {
                keys.push(key);
            }
        }
        keys
    }
}

/// Overlay `props` on top of `defaults`.
pub fn merge_props<K, I>(defaults: I, props: &Props) -> PropsView
where
    K: Into<String>,
    I: IntoIterator<Item = (K, Value)>,
{
    PropsView {
        props: props.clone(),
        defaults: defaults.into_iter().map(|(k, v)| (k.into(), v)).collect(),
    }
}
