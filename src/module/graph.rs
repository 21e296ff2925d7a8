//! The resolved graph: every produced value keyed by `(type, tag)`.

use std::collections::HashMap;
use std::fmt;

use crate::module::declaration::{Inputs, Value};
use crate::module::key::Key;

/// Values produced during resolution, shared read-only with consumers.
#[derive(Default)]
pub struct Graph {
    values: HashMap<Key, Value>,
    order: Vec<String>,
}

impl Graph {
    /// Clone of the untagged value of type `T`, if one was produced.
    pub fn get<T: Clone + 'static>(&self) -> Option<T> {
        self.lookup(Key::of::<T>())
    }

    /// Clone of the value of type `T` tagged `tag`, if one was produced.
    pub fn get_named<T: Clone + 'static>(&self, tag: &'static str) -> Option<T> {
        self.lookup(Key::named::<T>(tag))
    }

    pub fn contains(&self, key: &Key) -> bool {
        self.values.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Module names in the order their constructors ran.
    pub fn construction_order(&self) -> &[String] {
        &self.order
    }

    fn lookup<T: Clone + 'static>(&self, key: Key) -> Option<T> {
        self.values.get(&key)?.downcast_ref::<T>().cloned()
    }

    pub(crate) fn insert(&mut self, key: Key, value: Value) {
        self.values.insert(key, value);
    }

    pub(crate) fn record_constructed(&mut self, module: String) {
        self.order.push(module);
    }

    /// Snapshot of the values a module declared as required.
    pub(crate) fn inputs_for(&self, module: &str, keys: &[Key]) -> Inputs {
        let values = keys
            .iter()
            .filter_map(|key| self.values.get(key).map(|value| (*key, value.clone())))
            .collect();
        Inputs::new(module, values)
    }
}

impl fmt::Debug for Graph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Graph")
            .field("keys", &self.values.keys().collect::<Vec<_>>())
            .field("order", &self.order)
            .finish()
    }
}
