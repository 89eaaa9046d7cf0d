use crate::HashMap;
use index_map::{Index, IndexMap};
use std::{
    fmt,
    iter::zip,
    sync::{LazyLock, Mutex},
};

#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Atom(u32);

impl Atom {
    pub fn to_str(self) -> &'static str {
        Interner::the().lock().unwrap().get(self)
    }
}

impl From<&str> for Atom {
    fn from(value: &str) -> Self {
        Interner::the().lock().unwrap().intern_borrowed(value)
    }
}

impl From<String> for Atom {
    fn from(value: String) -> Self {
        Interner::the().lock().unwrap().intern_owned(value)
    }
}

impl Index for Atom {
    fn new(index: usize) -> Self {
        Self(index.try_into().unwrap())
    }

    fn value(self) -> usize {
        self.0 as _
    }
}

impl fmt::Debug for Atom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.to_str())
    }
}

impl fmt::Display for Atom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.to_str())
    }
}

// No Ordering impls for Atom, they would be a pitfall:
//
// * Comparison by index would be fast but highly unintuitive and in most cases not what
//   the user wants.
// * Comparison by string would be rather slow and the user should explicitly opt-in
//   via `Atom::to_str`.

struct Interner {
    atoms: HashMap<&'static str, Atom>,
    strings: IndexMap<Atom, &'static str>,
}

impl Interner {
    fn the() -> &'static Mutex<Self> {
        static SELF: LazyLock<Mutex<Interner>> = LazyLock::new(|| Mutex::new(Interner::new()));

        &SELF
    }

    fn with(values: Vec<&'static str>) -> Self {
        Self {
            atoms: zip(&values, 0..)
                .map(|(&string, atom)| (string, Atom(atom)))
                .collect(),
            strings: IndexMap::bare(values),
        }
    }

    fn intern_borrowed(&mut self, value: &str) -> Atom {
        if let Some(&atom) = self.atoms.get(value) {
            return atom;
        }

        self.insert(Box::leak(Box::from(value)))
    }

    fn intern_owned(&mut self, value: String) -> Atom {
        if let Some(&atom) = self.atoms.get(&*value) {
            return atom;
        }

        self.insert(String::leak(value))
    }

    fn insert(&mut self, value: &'static str) -> Atom {
        let atom = self.strings.insert(value);
        self.atoms.insert(value, atom);
        atom
    }

    fn get(&self, atom: Atom) -> &'static str {
        self.strings[atom]
    }
}

macro_rules! atoms {
    ($( $atom:ident / $index:literal => $string:literal ),* $(,)?) => {
        impl Atom {
            $( pub const $atom: Self = Self($index); )*
        }

        impl Interner {
            fn new() -> Self {
                Self::with(vec![
                    $( $string ),*
                ])
            }
        }
    };
}

atoms! {
    ARRAY / 0 => "array",
    BOOL / 1 => "bool",
    CHAR / 2 => "char",
    CONS / 3 => "Cons",
    EXN / 4 => "exn",
    FALSE / 5 => "False",
    FLOAT / 6 => "float",
    INT / 7 => "int",
    LIST / 8 => "list",
    NIL / 9 => "Nil",
    NONE / 10 => "None",
    OPTION / 11 => "option",
    SOME / 12 => "Some",
    STRING / 13 => "string",
    TRUE / 14 => "True",
    UNDERSCORE / 15 => "_",
    UNIT / 16 => "unit",
}
