//! The compiled-interface store.
//!
//! A compiled interface records the signature of a previously compiled unit
//! together with the units it was compiled against. Stores guarantee that
//! re-reading a filename they have already served returns an [`Interface`]
//! sharing identity with the cached one — the identity-keyed memoization in
//! the environment machinery above depends on this.

use hir::Signature;
use std::{
    cell::RefCell,
    fmt, fs,
    path::{Path, PathBuf},
    rc::Rc,
};
use utility::{Atom, HashMap};

mod codec;

pub const FILE_EXTENSION: &str = "orni";

/// The contents of a compiled interface.
pub struct Interface {
    /// The name the unit was compiled under.
    pub unit_name: Atom,
    pub signature: Rc<Signature>,
    /// The units this interface was compiled against, with the content hash
    /// observed at compile time (`None` for units only mentioned, never read).
    pub dependencies: Vec<(Atom, Option<u64>)>,
    pub flags: Flags,
    /// The content hash of this interface itself.
    pub hash: u64,
}

#[derive(Clone, Copy, Default, PartialEq, Eq)]
pub struct Flags {
    /// The unit was compiled with support for arbitrary recursive types and
    /// can only be imported by units enabling the same capability.
    pub rec_types: bool,
}

/// Failure to locate, read or write a compiled interface.
#[derive(Debug)]
pub enum StoreError {
    NotFound(PathBuf),
    Io { filename: PathBuf, message: String },
    Corrupt { filename: PathBuf, message: String },
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound(filename) => {
                write!(f, "no compiled interface at ‘{}’", filename.display())
            }
            Self::Io { filename, message } => {
                write!(f, "failed to access ‘{}’: {message}", filename.display())
            }
            Self::Corrupt { filename, message } => {
                write!(f, "corrupt interface ‘{}’: {message}", filename.display())
            }
        }
    }
}

/// A source and sink of compiled interfaces.
pub trait InterfaceStore {
    /// Find the filename serving the given unit name, if any.
    fn locate(&self, name: Atom) -> Option<PathBuf>;

    /// Read a compiled interface.
    ///
    /// Re-reading an already served filename returns an [`Interface`] sharing
    /// identity with the previously returned one.
    fn read(&self, filename: &Path) -> Result<Rc<Interface>, StoreError>;

    /// Write a compiled interface, returning its content hash.
    fn write(
        &self,
        filename: &Path,
        unit_name: Atom,
        signature: &Rc<Signature>,
        dependencies: &[(Atom, Option<u64>)],
        flags: Flags,
    ) -> Result<u64, StoreError>;
}

/// An interface store backed by the file system.
pub struct DiskStore {
    search_path: Vec<PathBuf>,
    cache: RefCell<HashMap<PathBuf, Rc<Interface>>>,
}

impl DiskStore {
    pub fn new(search_path: Vec<PathBuf>) -> Self {
        Self {
            search_path,
            cache: RefCell::default(),
        }
    }
}

impl InterfaceStore for DiskStore {
    fn locate(&self, name: Atom) -> Option<PathBuf> {
        let name = name.to_str();

        for directory in &self.search_path {
            for candidate in [name.to_owned(), name.to_lowercase()] {
                let filename = directory.join(candidate).with_extension(FILE_EXTENSION);

                if filename.exists() {
                    return Some(filename);
                }
            }
        }

        None
    }

    fn read(&self, filename: &Path) -> Result<Rc<Interface>, StoreError> {
        if let Some(interface) = self.cache.borrow().get(filename) {
            return Ok(Rc::clone(interface));
        }

        let bytes = fs::read(filename).map_err(|error| match error.kind() {
            std::io::ErrorKind::NotFound => StoreError::NotFound(filename.to_owned()),
            _ => StoreError::Io {
                filename: filename.to_owned(),
                message: error.to_string(),
            },
        })?;

        let interface = codec::decode(&bytes).map_err(|message| StoreError::Corrupt {
            filename: filename.to_owned(),
            message,
        })?;

        let interface = Rc::new(interface);
        self.cache
            .borrow_mut()
            .insert(filename.to_owned(), Rc::clone(&interface));

        Ok(interface)
    }

    fn write(
        &self,
        filename: &Path,
        unit_name: Atom,
        signature: &Rc<Signature>,
        dependencies: &[(Atom, Option<u64>)],
        flags: Flags,
    ) -> Result<u64, StoreError> {
        let bytes = codec::encode(unit_name, signature, dependencies, flags).map_err(
            |message| StoreError::Corrupt {
                filename: filename.to_owned(),
                message,
            },
        )?;
        let hash = codec::hash(&bytes);

        fs::write(filename, &bytes).map_err(|error| StoreError::Io {
            filename: filename.to_owned(),
            message: error.to_string(),
        })?;

        self.cache.borrow_mut().insert(
            filename.to_owned(),
            Rc::new(Interface {
                unit_name,
                signature: Rc::clone(signature),
                dependencies: dependencies.to_vec(),
                flags,
                hash,
            }),
        );

        Ok(hash)
    }
}

/// An in-memory interface store for tests and embedders resolving units they
/// never wrote to disk.
#[derive(Default)]
pub struct MemoryStore {
    files: RefCell<HashMap<PathBuf, Rc<Interface>>>,
    units: RefCell<HashMap<Atom, PathBuf>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl InterfaceStore for MemoryStore {
    fn locate(&self, name: Atom) -> Option<PathBuf> {
        self.units.borrow().get(&name).cloned()
    }

    fn read(&self, filename: &Path) -> Result<Rc<Interface>, StoreError> {
        self.files
            .borrow()
            .get(filename)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(filename.to_owned()))
    }

    fn write(
        &self,
        filename: &Path,
        unit_name: Atom,
        signature: &Rc<Signature>,
        dependencies: &[(Atom, Option<u64>)],
        flags: Flags,
    ) -> Result<u64, StoreError> {
        let bytes = codec::encode(unit_name, signature, dependencies, flags).map_err(
            |message| StoreError::Corrupt {
                filename: filename.to_owned(),
                message,
            },
        )?;
        let hash = codec::hash(&bytes);

        self.files.borrow_mut().insert(
            filename.to_owned(),
            Rc::new(Interface {
                unit_name,
                // The in-memory signature is shared as-is: embedders get back
                // the very object they stored.
                signature: Rc::clone(signature),
                dependencies: dependencies.to_vec(),
                flags,
                hash,
            }),
        );
        self.units
            .borrow_mut()
            .insert(unit_name, filename.to_owned());

        Ok(hash)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use hir::{Ident, ModuleType, SigItem, TypeDecl, TypeExpr, ValueDescr};

    fn sample_signature() -> Rc<Signature> {
        let t = Ident::fresh(Atom::from("t"));
        let int = TypeExpr::constr(hir::Path::Ident(t), Vec::new());

        Rc::new(vec![
            SigItem::Type(t, Rc::new(TypeDecl::abstract_(Vec::new()))),
            SigItem::Value(
                Ident::fresh(Atom::from("zero")),
                Rc::new(ValueDescr::regular(int.clone())),
            ),
            SigItem::Module(
                Ident::fresh(Atom::from("Sub")),
                Rc::new(hir::ModuleDecl::new(ModuleType::signature(vec![
                    SigItem::Value(
                        Ident::fresh(Atom::from("x")),
                        Rc::new(ValueDescr::regular(int)),
                    ),
                ]))),
            ),
        ])
    }

    #[test]
    fn memory_store_shares_identity_on_reread() {
        let store = MemoryStore::new();
        let name = Atom::from("Sample");
        let signature = sample_signature();

        store
            .write(Path::new("sample.orni"), name, &signature, &[], Flags::default())
            .unwrap();

        let filename = store.locate(name).unwrap();
        let first = store.read(&filename).unwrap();
        let second = store.read(&filename).unwrap();

        assert!(Rc::ptr_eq(&first, &second));
        assert!(Rc::ptr_eq(&first.signature, &signature));
    }

    #[test]
    fn codec_round_trip_preserves_member_names_and_kinds() {
        let signature = sample_signature();
        let bytes =
            codec::encode(Atom::from("Sample"), &signature, &[(Atom::from("Core"), Some(7))], Flags::default())
                .unwrap();
        let interface = codec::decode(&bytes).unwrap();

        assert_eq!(interface.unit_name, Atom::from("Sample"));
        assert_eq!(interface.dependencies, vec![(Atom::from("Core"), Some(7))]);

        let outline: Vec<_> = interface
            .signature
            .iter()
            .map(|item| (item.kind_name(), item.ident().name()))
            .collect();

        assert_eq!(
            outline,
            vec![
                ("type", Atom::from("t")),
                ("value", Atom::from("zero")),
                ("module", Atom::from("Sub")),
            ],
        );
    }

    #[test]
    fn equal_content_hashes_equal() {
        let signature = sample_signature();
        let encode = || {
            codec::encode(Atom::from("Sample"), &signature, &[], Flags::default()).unwrap()
        };

        assert_eq!(codec::hash(&encode()), codec::hash(&encode()));
    }
}
