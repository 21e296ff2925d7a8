//! Module declarations: inputs, outputs, ordering hints and the constructor.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use futures_util::future::{BoxFuture, FutureExt};

use crate::lifecycle::Lifecycle;
use crate::module::key::Key;
use crate::module::resolver::ResolveError;
use crate::BoxError;

/// A value stored in the resolved graph.
pub(crate) type Value = Arc<dyn Any + Send + Sync>;

type Constructor = Box<dyn FnOnce(Inputs, Lifecycle) -> BoxFuture<'static, Result<Outputs, BoxError>> + Send>;

/// A named unit of construction.
///
/// A module declares the keys it requires and provides. Its constructor runs
/// exactly once, after every required key has been produced, and may register
/// lifecycle hooks through the [`Lifecycle`] handle it receives.
///
/// Values flowing through the graph are shared handles: consumers receive a
/// clone, so provide types that are cheap to clone (`Arc`-backed handles,
/// pools, routers).
///
/// ```ignore
/// Module::new("cache", build_cache)
///     .requires::<Configuration>()
///     .provides::<Cache>()
/// ```
pub struct Module {
    name: String,
    requires: Vec<Key>,
    provides: Vec<Key>,
    before: Vec<String>,
    after: Vec<String>,
    constructor: Constructor,
}

impl Module {
    pub fn new<F, Fut>(name: impl Into<String>, constructor: F) -> Self
    where
        F: FnOnce(Inputs, Lifecycle) -> Fut + Send + 'static,
        Fut: Future<Output = Result<Outputs, BoxError>> + Send + 'static,
    {
        Self {
            name: name.into(),
            requires: Vec::new(),
            provides: Vec::new(),
            before: Vec::new(),
            after: Vec::new(),
            constructor: Box::new(move |inputs, lifecycle| constructor(inputs, lifecycle).boxed()),
        }
    }

    /// A module that provides an already-built value.
    pub fn supply<T>(name: impl Into<String>, value: T) -> Self
    where
        T: Send + Sync + 'static,
    {
        Self::new(name, move |_, _| async move { Ok::<_, BoxError>(Outputs::new().with(value)) }).provides::<T>()
    }

    /// Declare an untagged input of type `T`.
    pub fn requires<T: 'static>(mut self) -> Self {
        self.requires.push(Key::of::<T>());
        self
    }

    /// Declare an input of type `T` tagged `tag`.
    pub fn requires_named<T: 'static>(mut self, tag: &'static str) -> Self {
        self.requires.push(Key::named::<T>(tag));
        self
    }

    /// Declare an untagged output of type `T`.
    pub fn provides<T: 'static>(mut self) -> Self {
        self.provides.push(Key::of::<T>());
        self
    }

    /// Declare an output of type `T` tagged `tag`.
    pub fn provides_named<T: 'static>(mut self, tag: &'static str) -> Self {
        self.provides.push(Key::named::<T>(tag));
        self
    }

    /// Construct this module before `other`, so its hooks start earlier and stop later.
    ///
    /// Hints naming modules that are not registered are ignored.
    pub fn before(mut self, other: impl Into<String>) -> Self {
        self.before.push(other.into());
        self
    }

    /// Construct this module after `other`.
    pub fn after(mut self, other: impl Into<String>) -> Self {
        self.after.push(other.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn required(&self) -> &[Key] {
        &self.requires
    }

    pub fn provided(&self) -> &[Key] {
        &self.provides
    }

    pub(crate) fn ordered_before(&self) -> &[String] {
        &self.before
    }

    pub(crate) fn ordered_after(&self) -> &[String] {
        &self.after
    }

    pub(crate) fn into_constructor(self) -> (String, Vec<Key>, Vec<Key>, Constructor) {
        (self.name, self.requires, self.provides, self.constructor)
    }
}

impl fmt::Debug for Module {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Module")
            .field("name", &self.name)
            .field("requires", &self.requires)
            .field("provides", &self.provides)
            .field("before", &self.before)
            .field("after", &self.after)
            .finish_non_exhaustive()
    }
}

/// Resolved values for the keys a module declared as required.
pub struct Inputs {
    module: String,
    values: HashMap<Key, Value>,
}

impl Inputs {
    pub(crate) fn new(module: &str, values: HashMap<Key, Value>) -> Self {
        Self {
            module: module.to_string(),
            values,
        }
    }

    /// Clone of the untagged input of type `T`.
    pub fn get<T: Clone + 'static>(&self) -> Result<T, ResolveError> {
        self.lookup(Key::of::<T>())
    }

    /// Clone of the input of type `T` tagged `tag`.
    pub fn named<T: Clone + 'static>(&self, tag: &'static str) -> Result<T, ResolveError> {
        self.lookup(Key::named::<T>(tag))
    }

    fn lookup<T: Clone + 'static>(&self, key: Key) -> Result<T, ResolveError> {
        self.values
            .get(&key)
            .and_then(|value| value.downcast_ref::<T>())
            .cloned()
            .ok_or_else(|| ResolveError::UndeclaredInput {
                module: self.module.clone(),
                key,
            })
    }
}

impl fmt::Debug for Inputs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Inputs")
            .field("module", &self.module)
            .field("keys", &self.values.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Values produced by a module constructor.
#[derive(Default)]
pub struct Outputs {
    values: Vec<(Key, Value)>,
}

impl Outputs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an untagged output.
    pub fn with<T: Send + Sync + 'static>(mut self, value: T) -> Self {
        self.values.push((Key::of::<T>(), Arc::new(value)));
        self
    }

    /// Add an output tagged `tag`.
    pub fn with_named<T: Send + Sync + 'static>(mut self, tag: &'static str, value: T) -> Self {
        self.values.push((Key::named::<T>(tag), Arc::new(value)));
        self
    }

    pub(crate) fn into_values(self) -> Vec<(Key, Value)> {
        self.values
    }
}

impl fmt::Debug for Outputs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.values.iter().map(|(key, _)| key)).finish()
    }
}
