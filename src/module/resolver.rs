//! Dependency resolution and construction.
//!
//! # Algorithm
//! 1. Reject duplicate module names and duplicate output keys.
//! 2. Add an edge producer → consumer for every required key, plus edges for
//!    explicit `before`/`after` hints. A required key nobody provides is fatal.
//! 3. Kahn's algorithm. Among ready modules the earliest registered goes
//!    first, so independent modules keep their registration order.
//! 4. Leftover modules mean a cycle; nothing has been constructed yet.
//! 5. Run constructors in order, moving each module's hooks into the
//!    registry once it succeeds.

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap, HashSet};

use thiserror::Error;

use crate::lifecycle::{HookRegistry, Lifecycle};
use crate::module::declaration::Module;
use crate::module::graph::Graph;
use crate::module::key::Key;
use crate::BoxError;

/// Configuration errors in the module set, and constructor failures.
#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("module `{0}` is registered more than once")]
    DuplicateModule(String),

    #[error("{key} is provided by both `{first}` and `{second}`")]
    DuplicateOutput { key: Key, first: String, second: String },

    #[error("module `{module}` requires {key}, which no module provides")]
    MissingInput { module: String, key: Key },

    /// Modules that are part of, or blocked behind, a dependency cycle.
    #[error("dependency cycle among modules: {}", .modules.join(", "))]
    Cycle { modules: Vec<String> },

    #[error("module `{module}` asked for {key}, which it did not declare as required")]
    UndeclaredInput { module: String, key: Key },

    #[error("module `{module}` produced {key}, which it did not declare as provided")]
    UndeclaredOutput { module: String, key: Key },

    #[error("module `{module}` declared {key} as provided but did not produce it")]
    MissingOutput { module: String, key: Key },

    #[error("module `{module}` failed to construct: {source}")]
    Construct {
        module: String,
        #[source]
        source: BoxError,
    },
}

/// Compute the construction order as indices into `modules`.
///
/// Pure: no constructor runs.
pub fn plan(modules: &[Module]) -> Result<Vec<usize>, ResolveError> {
    let mut by_name: HashMap<&str, usize> = HashMap::new();
    for (idx, module) in modules.iter().enumerate() {
        if by_name.insert(module.name(), idx).is_some() {
            return Err(ResolveError::DuplicateModule(module.name().to_string()));
        }
    }

    let mut producers: HashMap<Key, usize> = HashMap::new();
    for (idx, module) in modules.iter().enumerate() {
        for key in module.provided() {
            if let Some(&first) = producers.get(key) {
                return Err(ResolveError::DuplicateOutput {
                    key: *key,
                    first: modules[first].name().to_string(),
                    second: module.name().to_string(),
                });
            }
            producers.insert(*key, idx);
        }
    }

    let n = modules.len();
    let mut in_degree = vec![0usize; n];
    let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); n];
    let mut edge = |from: usize, to: usize| {
        dependents[from].push(to);
        in_degree[to] += 1;
    };

    for (idx, module) in modules.iter().enumerate() {
        for key in module.required() {
            let producer = producers.get(key).ok_or_else(|| ResolveError::MissingInput {
                module: module.name().to_string(),
                key: *key,
            })?;
            edge(*producer, idx);
        }

        for other in module.ordered_before() {
            match by_name.get(other.as_str()) {
                Some(&target) => edge(idx, target),
                None => tracing::debug!(module = %module.name(), before = %other, "ignoring ordering hint for absent module"),
            }
        }
        for other in module.ordered_after() {
            match by_name.get(other.as_str()) {
                Some(&target) => edge(target, idx),
                None => tracing::debug!(module = %module.name(), after = %other, "ignoring ordering hint for absent module"),
            }
        }
    }

    let mut ready: BinaryHeap<Reverse<usize>> = in_degree
        .iter()
        .enumerate()
        .filter(|(_, degree)| **degree == 0)
        .map(|(idx, _)| Reverse(idx))
        .collect();
    let mut order = Vec::with_capacity(n);

    while let Some(Reverse(idx)) = ready.pop() {
        order.push(idx);
        for &dependent in &dependents[idx] {
            in_degree[dependent] -= 1;
            if in_degree[dependent] == 0 {
                ready.push(Reverse(dependent));
            }
        }
    }

    if order.len() != n {
        let modules = in_degree
            .iter()
            .enumerate()
            .filter(|(_, degree)| **degree > 0)
            .map(|(idx, _)| modules[idx].name().to_string())
            .collect();
        return Err(ResolveError::Cycle { modules });
    }

    Ok(order)
}

/// Module names in the order they would be constructed.
pub fn construction_order(modules: &[Module]) -> Result<Vec<&str>, ResolveError> {
    Ok(plan(modules)?.into_iter().map(|idx| modules[idx].name()).collect())
}

/// Plan, then run every constructor once, appending hooks to `registry`.
pub async fn construct(modules: Vec<Module>, registry: &mut HookRegistry) -> Result<Graph, ResolveError> {
    let order = plan(&modules)?;
    let mut slots: Vec<Option<Module>> = modules.into_iter().map(Some).collect();
    let mut graph = Graph::default();

    for idx in order {
        let Some(module) = slots[idx].take() else {
            continue;
        };
        let (name, requires, provides, constructor) = module.into_constructor();

        let inputs = graph.inputs_for(&name, &requires);
        let lifecycle = Lifecycle::for_module(&name);
        tracing::debug!(module = %name, "constructing module");

        let outputs = constructor(inputs, lifecycle.clone())
            .await
            .map_err(|source| ResolveError::Construct {
                module: name.clone(),
                source,
            })?;

        let values = outputs.into_values();
        let mut produced = HashSet::with_capacity(values.len());
        for (key, _) in &values {
            if !provides.contains(key) {
                return Err(ResolveError::UndeclaredOutput { module: name, key: *key });
            }
            if !produced.insert(*key) {
                return Err(ResolveError::DuplicateOutput {
                    key: *key,
                    first: name.clone(),
                    second: name,
                });
            }
        }
        if let Some(key) = provides.iter().find(|key| !produced.contains(*key)) {
            return Err(ResolveError::MissingOutput { module: name, key: *key });
        }

        for (key, value) in values {
            graph.insert(key, value);
        }
        registry.extend(lifecycle.drain());
        graph.record_constructed(name);
    }

    Ok(graph)
}
