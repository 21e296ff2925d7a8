//! Module composition subsystem.
//!
//! # Data Flow
//! ```text
//! Module declarations (name, requires, provides, hints, constructor)
//!     → resolver.rs (validate keys, topological order)
//!     → constructors run once, in order
//!         → Outputs inserted into graph.rs
//!         → hooks moved into the lifecycle registry
//!     → Graph (read-only, shared handles)
//! ```
//!
//! # Design Decisions
//! - Wiring is explicit data: every edge comes from a declared key or hint
//! - Keys are `(type, tag)` so several values of one type can coexist
//! - All configuration errors surface before any constructor runs

pub mod declaration;
pub mod graph;
pub mod key;
pub mod resolver;

pub use declaration::{Inputs, Module, Outputs};
pub use graph::Graph;
pub use key::Key;
pub use resolver::{construction_order, ResolveError};
