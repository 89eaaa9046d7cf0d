use std::{
    fmt,
    sync::atomic::{AtomicU32, Ordering},
};
use utility::Atom;

/// The marker reserved for compiler-generated binding names.
///
/// Source-introduced bindings must never contain it, see [`Ident::is_well_formed_name`].
pub const RESERVED_MARKER: char = '#';

static STAMPS: AtomicU32 = AtomicU32::new(1);

/// An alpha-distinct binding token.
///
/// Two identifiers may share a display name and still denote different bindings:
/// *local* identifiers are distinguished by a process-unique stamp. An identifier
/// with stamp zero is *persistent* — it denotes an externally compiled unit and is
/// globally unique by name alone.
#[derive(Clone, Copy, Eq)]
pub struct Ident {
    name: Atom,
    stamp: u32,
}

impl Ident {
    /// Create a fresh local identifier, distinct from every other one.
    pub fn fresh(name: Atom) -> Self {
        Self {
            name,
            stamp: STAMPS.fetch_add(1, Ordering::Relaxed),
        }
    }

    /// Create the identifier of an externally compiled unit.
    pub fn persistent(name: Atom) -> Self {
        Self { name, stamp: 0 }
    }

    pub fn name(self) -> Atom {
        self.name
    }

    pub fn is_persistent(self) -> bool {
        self.stamp == 0
    }

    /// Test if a name is legal for a source-introduced binding.
    pub fn is_well_formed_name(name: &str) -> bool {
        !name.is_empty() && !name.contains(RESERVED_MARKER)
    }
}

impl PartialEq for Ident {
    fn eq(&self, other: &Self) -> bool {
        self.stamp == other.stamp && (self.stamp != 0 || self.name == other.name)
    }
}

impl std::hash::Hash for Ident {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.stamp.hash(state);

        if self.stamp == 0 {
            self.name.hash(state);
        }
    }
}

impl fmt::Display for Ident {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

impl fmt::Debug for Ident {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.name, self.stamp)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn fresh_idents_sharing_a_name_differ() {
        let name = Atom::from("x");

        assert_ne!(Ident::fresh(name), Ident::fresh(name));
    }

    #[test]
    fn persistent_idents_are_equal_by_name() {
        let name = Atom::from("Core");

        assert_eq!(Ident::persistent(name), Ident::persistent(name));
        assert_ne!(Ident::persistent(name), Ident::fresh(name));
    }

    #[test]
    fn well_formedness() {
        assert!(Ident::is_well_formed_name("map"));
        assert!(!Ident::is_well_formed_name("map#1"));
        assert!(!Ident::is_well_formed_name(""));
    }
}
