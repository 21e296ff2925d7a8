//! Typed, optionally tagged identifiers for module inputs and outputs.

use std::any::{type_name, TypeId};
use std::fmt;

/// Identifies a value in the resolved graph by its Rust type and an optional tag.
///
/// Tags disambiguate several values of the same type, e.g. two route groups
/// named `api-v1` and `swagger`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Key {
    type_id: TypeId,
    type_name: &'static str,
    tag: Option<&'static str>,
}

impl Key {
    /// Key for an untagged value of type `T`.
    pub fn of<T: 'static>() -> Self {
        Self {
            type_id: TypeId::of::<T>(),
            type_name: type_name::<T>(),
            tag: None,
        }
    }

    /// Key for a value of type `T` tagged with `tag`.
    pub fn named<T: 'static>(tag: &'static str) -> Self {
        Self {
            tag: Some(tag),
            ..Self::of::<T>()
        }
    }

    /// The tag, if any.
    pub fn tag(&self) -> Option<&'static str> {
        self.tag
    }

    /// Fully qualified Rust type name, for diagnostics.
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.tag {
            Some(tag) => write!(f, "{}[name = \"{}\"]", self.type_name, tag),
            None => f.write_str(self.type_name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tag_distinguishes_same_type() {
        assert_eq!(Key::of::<u32>(), Key::of::<u32>());
        assert_ne!(Key::of::<u32>(), Key::named::<u32>("a"));
        assert_ne!(Key::named::<u32>("a"), Key::named::<u32>("b"));
        assert_ne!(Key::of::<u32>(), Key::of::<u64>());
    }

    #[test]
    fn display_includes_tag() {
        assert_eq!(Key::of::<u32>().to_string(), "u32");
        assert_eq!(Key::named::<u32>("api-v1").to_string(), "u32[name = \"api-v1\"]");
    }
}
