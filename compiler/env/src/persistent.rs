//! The persistent structure store.
//!
//! Externally compiled units are loaded by name, memoized for the process
//! lifetime (including an explicit "known missing" marker so failed disk
//! lookups are not repeated) and consistency-checked against a process-wide
//! ledger so that inconsistent builds are detected rather than silently
//! miscompiled.

use crate::{
    EnvError, Environment, NotFound, Session,
    component::{self, ComponentCell},
};
use hir::{Ident, ModuleType, Path, Signature, Subst};
use intf::InterfaceStore;
use std::{
    cell::{Cell, OnceCell},
    path::PathBuf,
    rc::Rc,
};
use utility::Atom;

/// A loaded externally compiled unit.
pub struct PersistentEntry {
    pub name: Atom,
    pub ident: Ident,
    raw_signature: Rc<Signature>,
    mty: OnceCell<Rc<ModuleType>>,
    pub(crate) comps: Rc<ComponentCell>,
    /// The units this one was compiled against.
    pub deps: Vec<(Atom, Option<u64>)>,
    pub hash: u64,
    pub filename: PathBuf,
    pub flags: intf::Flags,
    checked: Cell<bool>,
}

impl PersistentEntry {
    /// The unit's signature as a module type, forced on first use.
    pub fn module_type(&self) -> Rc<ModuleType> {
        Rc::clone(
            self.mty
                .get_or_init(|| Rc::new(ModuleType::Signature(Rc::clone(&self.raw_signature)))),
        )
    }

    pub fn signature(&self) -> &Rc<Signature> {
        &self.raw_signature
    }

    pub fn path(&self) -> Path {
        Path::Ident(self.ident)
    }
}

/// Load the entry for a unit name, reading its compiled interface on first
/// reference.
pub(crate) fn persistent_structure(
    session: &Session,
    name: Atom,
) -> Result<Rc<PersistentEntry>, EnvError> {
    if let Some(cached) = session.persistent.borrow().get(&name) {
        return cached
            .clone()
            .ok_or(EnvError::NotFound(NotFound::Unit { name }));
    }

    // The weak dependency is recorded before the disk is consulted so the
    // dependency list stays deterministic even if the lookup fails.
    session.record_import(name, None);

    let Some(filename) = session.store().locate(name) else {
        return Err(mark_missing(session, name));
    };

    let interface = match session.store().read(&filename) {
        Ok(interface) => interface,
        Err(intf::StoreError::NotFound(_)) => return Err(mark_missing(session, name)),
        Err(error) => {
            return Err(EnvError::StoreFailure {
                name,
                message: error.to_string(),
            });
        }
    };
    session.stats.bump_interface_reads();

    if interface.unit_name != name {
        return Err(EnvError::IllegalRenaming {
            requested: name,
            found: interface.unit_name,
            filename,
        });
    }

    if interface.flags.rec_types && !session.config.rec_types {
        return Err(EnvError::NeedsRecTypes {
            unit: name,
            importer: session.current_unit(),
        });
    }

    session.record_import(name, Some(interface.hash));

    let ident = Ident::persistent(name);
    let mty = Rc::new(ModuleType::Signature(Rc::clone(&interface.signature)));
    // Persistent units are resolved independently of the requesting unit's
    // local bindings.
    let comps = component::components_of(
        session,
        &Environment::empty(),
        &Subst::identity(),
        &Path::Ident(ident),
        &mty,
    );

    let entry = Rc::new(PersistentEntry {
        name,
        ident,
        raw_signature: Rc::clone(&interface.signature),
        mty: {
            let cell = OnceCell::new();
            let _ = cell.set(mty);
            cell
        },
        comps,
        deps: interface.dependencies.clone(),
        hash: interface.hash,
        filename,
        flags: interface.flags,
        checked: Cell::new(false),
    });

    session
        .persistent
        .borrow_mut()
        .insert(name, Some(Rc::clone(&entry)));

    check_consistency(session, &entry)?;

    Ok(entry)
}

fn mark_missing(session: &Session, name: Atom) -> EnvError {
    session.persistent.borrow_mut().insert(name, None);
    EnvError::NotFound(NotFound::Unit { name })
}

/// The ground truth established by the first observer of a dependency.
pub(crate) struct ImportAuthority {
    pub(crate) hash: u64,
    pub(crate) source: PathBuf,
}

/// Verify an entry's recorded dependencies against the consistency ledger.
///
/// The first observation of a dependency establishes ground truth; later
/// disagreement is fatal, naming both conflicting sources. Memoized per entry.
pub(crate) fn check_consistency(session: &Session, entry: &PersistentEntry) -> Result<(), EnvError> {
    if entry.checked.get() {
        return Ok(());
    }

    for &(dep, hash) in &entry.deps {
        if let Some(hash) = hash {
            assert_agreement(session, dep, hash, &entry.filename)?;
        }
    }

    // The unit's own hash is an observation too: anyone who imported it
    // earlier must have seen this very interface.
    assert_agreement(session, entry.name, entry.hash, &entry.filename)?;

    entry.checked.set(true);

    Ok(())
}

fn assert_agreement(
    session: &Session,
    unit: Atom,
    hash: u64,
    source: &PathBuf,
) -> Result<(), EnvError> {
    let mut ledger = session.ledger.borrow_mut();

    match ledger.get(&unit) {
        Some(authority) if authority.hash != hash => Err(EnvError::InconsistentImport {
            unit,
            source1: authority.source.clone(),
            source2: source.clone(),
        }),
        Some(_) => Ok(()),
        None => {
            ledger.insert(
                unit,
                ImportAuthority {
                    hash,
                    source: source.clone(),
                },
            );
            drop(ledger);

            let ledger = Rc::clone(&session.ledger);
            session.undo.record(move || {
                ledger.borrow_mut().remove(&unit);
            });

            Ok(())
        }
    }
}
