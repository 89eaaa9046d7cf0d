use crate::Ident;
use std::fmt;
use utility::Atom;

/// A resolved qualified path.
///
/// Paths are immutable and compared structurally. Structural equality is *not*
/// equality of denotation: two distinct paths may denote the same module through
/// an alias; collapsing such aliases is the business of the path normalizer.
#[derive(Clone, PartialEq, Eq, Hash)]
pub enum Path {
    /// A bare identifier.
    Ident(Ident),
    /// A projection `Path.member`.
    Dot(Box<Path>, Atom),
    /// A functor application `Path(Path)`.
    Apply(Box<Path>, Box<Path>),
}

impl Path {
    pub fn dot(self, member: Atom) -> Self {
        Self::Dot(Box::new(self), member)
    }

    pub fn apply(self, argument: Self) -> Self {
        Self::Apply(Box::new(self), Box::new(argument))
    }

    /// The leftmost identifier; for an application, the head of the functor side.
    pub fn head(&self) -> Ident {
        match self {
            Self::Ident(ident) => *ident,
            Self::Dot(prefix, _) => prefix.head(),
            Self::Apply(functor, _) => functor.head(),
        }
    }

    /// The display name of the final component.
    pub fn last(&self) -> Atom {
        match self {
            Self::Ident(ident) => ident.name(),
            Self::Dot(_, member) => *member,
            Self::Apply(functor, _) => functor.last(),
        }
    }

    /// Test if the path is rooted in a persistent unit.
    pub fn is_persistent_rooted(&self) -> bool {
        self.head().is_persistent()
    }

    pub fn contains_application(&self) -> bool {
        match self {
            Self::Ident(_) => false,
            Self::Dot(prefix, _) => prefix.contains_application(),
            Self::Apply(..) => true,
        }
    }
}

impl From<Ident> for Path {
    fn from(ident: Ident) -> Self {
        Self::Ident(ident)
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ident(ident) => write!(f, "{ident}"),
            Self::Dot(prefix, member) => write!(f, "{prefix}.{member}"),
            Self::Apply(functor, argument) => write!(f, "{functor}({argument})"),
        }
    }
}

impl fmt::Debug for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ident(ident) => write!(f, "{ident:?}"),
            Self::Dot(prefix, member) => write!(f, "{prefix:?}.{member}"),
            Self::Apply(functor, argument) => write!(f, "{functor:?}({argument:?})"),
        }
    }
}

/// An unresolved, name-based qualified reference.
///
/// This is what the surface language hands to lookups: plain names, to be
/// resolved against the current scope most-recent-first.
#[derive(Clone, PartialEq, Eq, Hash)]
pub enum NamePath {
    Name(Atom),
    Dot(Box<NamePath>, Atom),
    Apply(Box<NamePath>, Box<NamePath>),
}

impl NamePath {
    pub fn dot(self, member: Atom) -> Self {
        Self::Dot(Box::new(self), member)
    }

    pub fn apply(self, argument: Self) -> Self {
        Self::Apply(Box::new(self), Box::new(argument))
    }

    /// Parse a plain dotted reference like `A.B.c` (no applications).
    pub fn from_dotted(reference: &str) -> Self {
        let mut segments = reference.split('.');
        let mut path = Self::Name(Atom::from(segments.next().unwrap_or_default()));

        for segment in segments {
            path = path.dot(Atom::from(segment));
        }

        path
    }
}

impl From<Atom> for NamePath {
    fn from(name: Atom) -> Self {
        Self::Name(name)
    }
}

impl fmt::Display for NamePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Name(name) => write!(f, "{name}"),
            Self::Dot(prefix, member) => write!(f, "{prefix}.{member}"),
            Self::Apply(functor, argument) => write!(f, "{functor}({argument})"),
        }
    }
}

impl fmt::Debug for NamePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self}")
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn path_head_traverses_applications() {
        let make = Ident::fresh(Atom::from("Make"));
        let arg = Ident::fresh(Atom::from("Arg"));
        let path = Path::from(make).apply(arg.into()).dot(Atom::from("t"));

        assert_eq!(path.head(), make);
        assert_eq!(path.last(), Atom::from("t"));
        assert!(path.contains_application());
    }

    #[test]
    fn display_of_applied_projection() {
        let path = Path::from(Ident::persistent(Atom::from("Set")))
            .dot(Atom::from("Make"))
            .apply(Ident::persistent(Atom::from("Ord")).into());

        assert_eq!(path.to_string(), "Set.Make(Ord)");
    }

    #[test]
    fn dotted_name_path_parsing() {
        assert_eq!(
            NamePath::from_dotted("A.B.c"),
            NamePath::Name(Atom::from("A"))
                .dot(Atom::from("B"))
                .dot(Atom::from("c")),
        );
    }
}
