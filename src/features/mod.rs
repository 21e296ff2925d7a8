//! Feature modules registering handlers on the shared route groups.

pub mod hello;
