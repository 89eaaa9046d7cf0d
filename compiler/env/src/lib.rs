//! The typing environment.
//!
//! An [`Environment`] is an immutable snapshot of every binding visible at a
//! program point: values, types, modules, module types, classes, class types,
//! constructors and record labels, each in its own persistent table. Adding a
//! binding returns a new environment sharing all unmodified substructure with
//! the old one; every add and open is also recorded on a summary trail which
//! is enough to diff two environments or rebuild a reduced one.
//!
//! Shared mutable state — the persistent-structure cache, the consistency
//! ledger, the component and prefix memo tables, the usage registry and the
//! undo log — lives on the process-wide [`Session`], never inside an
//! environment. Same key, same result: the caches are pure memoizations,
//! observable only as a performance effect.

use diagnostics::{Reporter, reporter::ErasedReportedError};
use hir::{
    ClassDecl, ClassTypeDecl, CtorDescr, CtorTag, ExtensionDef, Ident, LabelDescr, ModuleDecl,
    ModuleType, ModuleTypeDecl, NamePath, Path, Signature, Subst, TypeDecl, TypeExpr, ValueDescr,
};
use index_map::IndexMap;
use intf::InterfaceStore;
use span::Span;
use std::{
    cell::{Cell, RefCell},
    path::PathBuf,
    rc::Rc,
};
use utility::{Atom, HashMap};

pub use component::{Component, FunctorComps, ModuleComp, StructureComps};
pub use persistent::PersistentEntry;
pub use summary::{SummaryIdx, SummaryKind, SummaryNode};
pub use table::{Entry, Origin, Table};
pub use usage::{CtorUsage, UsageKey, UsageKind};

mod component;
mod lazy;
mod normalize;
mod persistent;
mod prefix;
mod seed;
mod summary;
mod table;
mod usage;

use component::ComponentCell;
use persistent::ImportAuthority;
use prefix::Prefixing;
use table::Entry as TableEntry;
use usage::{UndoLog, UsageRegistry};

/// A namespace of the environment.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Namespace {
    Value,
    Type,
    Module,
    ModuleType,
    Class,
    ClassType,
    Ctor,
    Label,
}

impl Namespace {
    pub const fn name(self) -> &'static str {
        match self {
            Self::Value => "value",
            Self::Type => "type",
            Self::Module => "module",
            Self::ModuleType => "module type",
            Self::Class => "class",
            Self::ClassType => "class type",
            Self::Ctor => "constructor",
            Self::Label => "record label",
        }
    }
}

/// A failed resolution: the name or path simply is not there.
///
/// Always recoverable — callers retry in lax mode or translate it into a
/// specific user diagnostic before it ever reaches the user.
#[derive(Clone, Debug)]
pub enum NotFound {
    Name {
        namespace: Namespace,
        name: Atom,
    },
    Path {
        namespace: Namespace,
        path: Path,
    },
    Member {
        path: Path,
        namespace: Namespace,
        member: Atom,
    },
    Reference {
        namespace: Namespace,
        reference: NamePath,
    },
    /// No compiled interface for this unit name.
    Unit {
        name: Atom,
    },
    /// The module type is abstract and has no members.
    Abstract {
        path: Path,
    },
}

/// Everything that can go wrong inside the environment machinery.
///
/// Internal table probes never escape raw: every public boundary converts
/// them into one of these kinds.
#[derive(Clone, Debug)]
pub enum EnvError {
    NotFound(NotFound),
    /// A compiled interface declares a different unit name than it was
    /// requested under.
    IllegalRenaming {
        requested: Atom,
        found: Atom,
        filename: PathBuf,
    },
    /// Two sources disagree on the identity of the same dependency.
    InconsistentImport {
        unit: Atom,
        source1: PathBuf,
        source2: PathBuf,
    },
    /// An imported unit requires the recursive-types capability.
    NeedsRecTypes {
        unit: Atom,
        importer: Atom,
    },
    /// Alias normalization could not reach a concrete module.
    Dangling {
        original: Path,
        furthest: Path,
    },
    /// A binding name contains the reserved internal marker.
    IllegalIdent {
        name: Atom,
    },
    NotAStructure {
        path: Path,
    },
    NotAFunctor {
        path: Path,
    },
    /// A functor argument does not match the declared parameter signature.
    InclusionMismatch {
        functor: Path,
        argument: Path,
        reason: String,
    },
    /// The interface store failed for a reason other than absence.
    StoreFailure {
        name: Atom,
        message: String,
    },
    /// Already reported elsewhere.
    Erased(ErasedReportedError),
}

impl EnvError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    /// Report this error as a diagnostic, attributing it to the given
    /// location (or the implicit top-level location if none is available).
    pub fn report(&self, session: &Session, loc: Span) -> ErasedReportedError {
        if let Self::Erased(error) = self {
            return *error;
        }

        let diagnostic = error::diagnostic(self);
        let diagnostic = if loc.is_default() {
            diagnostic
        } else {
            diagnostic.unlabeled_span(loc)
        };

        diagnostic.report(session.reporter())
    }
}

impl From<NotFound> for EnvError {
    fn from(not_found: NotFound) -> Self {
        Self::NotFound(not_found)
    }
}

impl From<ErasedReportedError> for EnvError {
    fn from(error: ErasedReportedError) -> Self {
        Self::Erased(error)
    }
}

/// Configuration supplied by the embedder.
#[derive(Clone, Copy)]
pub struct Config {
    /// Suppress required-global bookkeeping during alias normalization.
    pub transparent_modules: bool,
    /// This unit enables the recursive-types capability.
    pub rec_types: bool,
    /// Expose the unsafe string operations in the initial environment.
    pub unsafe_string: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            transparent_modules: false,
            rec_types: false,
            unsafe_string: false,
        }
    }
}

/// Capabilities injected by the surrounding type-checker.
pub struct Hooks {
    /// Decide whether a module type is included in another, invoked before a
    /// functor application is allowed to proceed. The error text names the
    /// first mismatching member.
    pub check_inclusion:
        Box<dyn Fn(&Environment, &Rc<ModuleType>, &Path, &Rc<ModuleType>) -> Result<(), String>>,
    /// Make the abstract members of a module type concrete relative to the
    /// path it was reached through.
    pub strengthen: Box<dyn Fn(&Environment, Rc<ModuleType>, &Path) -> Rc<ModuleType>>,
}

impl Default for Hooks {
    fn default() -> Self {
        Self {
            check_inclusion: Box::new(|_, _, _, _| Ok(())),
            strengthen: Box::new(|_, ty, _| ty),
        }
    }
}

/// Counters for tests and `-dtimings`-style output.
#[derive(Default)]
pub struct Stats {
    component_builds: Cell<usize>,
    interface_reads: Cell<usize>,
    prefix_cache_hits: Cell<usize>,
}

impl Stats {
    pub fn component_builds(&self) -> usize {
        self.component_builds.get()
    }

    pub fn interface_reads(&self) -> usize {
        self.interface_reads.get()
    }

    pub fn prefix_cache_hits(&self) -> usize {
        self.prefix_cache_hits.get()
    }

    pub(crate) fn bump_component_builds(&self) {
        self.component_builds.set(self.component_builds.get() + 1);
    }

    pub(crate) fn bump_interface_reads(&self) {
        self.interface_reads.set(self.interface_reads.get() + 1);
    }

    pub(crate) fn bump_prefix_cache_hits(&self) {
        self.prefix_cache_hits.set(self.prefix_cache_hits.get() + 1);
    }
}

/// The process-wide resolution state.
///
/// Environments are value snapshots; everything mutable and shared lives
/// here, keyed by stable identity and passed by reference into the
/// resolution machinery.
pub struct Session {
    store: Box<dyn InterfaceStore>,
    reporter: Reporter,
    pub config: Config,
    pub hooks: Hooks,
    current_unit: Atom,
    pub stats: Stats,

    pub(crate) persistent: RefCell<HashMap<Atom, Option<Rc<PersistentEntry>>>>,
    pub(crate) ledger: Rc<RefCell<HashMap<Atom, ImportAuthority>>>,
    imports: Rc<RefCell<HashMap<Atom, Option<u64>>>>,
    required_globals: Rc<RefCell<Vec<Ident>>>,
    pub(crate) components: RefCell<HashMap<component::CompKey, Rc<ComponentCell>>>,
    pub(crate) prefixings: RefCell<HashMap<(Path, usize), Rc<Prefixing>>>,
    pub(crate) summaries: RefCell<IndexMap<SummaryIdx, SummaryNode>>,
    reduced: RefCell<Option<(SummaryIdx, Environment)>>,
    pub(crate) usage: UsageRegistry,
    pub(crate) undo: UndoLog,
}

impl Session {
    pub fn new(
        store: Box<dyn InterfaceStore>,
        reporter: Reporter,
        config: Config,
        current_unit: Atom,
    ) -> Self {
        Self {
            store,
            reporter,
            config,
            hooks: Hooks::default(),
            current_unit,
            stats: Stats::default(),
            persistent: RefCell::default(),
            ledger: Rc::default(),
            imports: Rc::default(),
            required_globals: Rc::default(),
            components: RefCell::default(),
            prefixings: RefCell::default(),
            summaries: RefCell::default(),
            reduced: RefCell::new(None),
            usage: UsageRegistry::default(),
            undo: UndoLog::default(),
        }
    }

    pub fn test() -> Self {
        Self::new(
            Box::new(intf::MemoryStore::new()),
            Reporter::silent(),
            Config::default(),
            Atom::from("Test"),
        )
    }

    pub fn reporter(&self) -> &Reporter {
        &self.reporter
    }

    pub fn current_unit(&self) -> Atom {
        self.current_unit
    }

    pub(crate) fn store(&self) -> &dyn InterfaceStore {
        &*self.store
    }

    /// The units this compilation has come to depend on, in deterministic
    /// (name-sorted) order, ready to be written into its own interface.
    pub fn imports(&self) -> Vec<(Atom, Option<u64>)> {
        let mut imports: Vec<_> = self
            .imports
            .borrow()
            .iter()
            .map(|(&name, &hash)| (name, hash))
            .collect();
        imports.sort_by_key(|&(name, _)| name.to_str());
        imports
    }

    pub(crate) fn record_import(&self, name: Atom, hash: Option<u64>) {
        let mut imports = self.imports.borrow_mut();
        let previous = imports.get(&name).copied();

        match (previous, hash) {
            // Already pinned to a hash; a weak re-observation changes nothing.
            (Some(Some(_)), _) | (Some(None), None) => return,
            _ => {}
        }

        imports.insert(name, hash);
        drop(imports);

        let imports = Rc::clone(&self.imports);
        self.undo.record(move || {
            match previous {
                Some(previous) => imports.borrow_mut().insert(name, previous),
                None => imports.borrow_mut().remove(&name),
            };
        });
    }

    /// The persistent units the final artifact must link against.
    pub fn required_globals(&self) -> Vec<Ident> {
        self.required_globals.borrow().clone()
    }

    pub(crate) fn record_required_global(&self, ident: Ident) {
        let mut globals = self.required_globals.borrow_mut();
        if globals.contains(&ident) {
            return;
        }
        globals.push(ident);
        drop(globals);

        let globals = Rc::clone(&self.required_globals);
        self.undo.record(move || {
            globals.borrow_mut().pop();
        });
    }

    /// Write the current unit's interface, returning its content hash.
    pub fn write_interface(
        &self,
        filename: &std::path::Path,
        signature: &Rc<Signature>,
    ) -> Result<u64, EnvError> {
        self.store
            .write(
                filename,
                self.current_unit,
                signature,
                &self.imports(),
                intf::Flags {
                    rec_types: self.config.rec_types,
                },
            )
            .map_err(|error| EnvError::StoreFailure {
                name: self.current_unit,
                message: error.to_string(),
            })
    }

    /// Install a usage callback; undone if the surrounding transaction aborts.
    pub fn register_use(&self, key: UsageKey, on_use: impl Fn(UsageKind) + 'static) {
        self.usage.register(&self.undo, key, on_use);
    }

    pub fn ctor_usage(&self, key: UsageKey) -> Option<CtorUsage> {
        self.usage.ctor_usage(key)
    }

    /// Run speculative work: recorded side effects are committed on success
    /// and replayed in reverse on failure.
    pub fn transaction<T, E>(&self, body: impl FnOnce(&Self) -> Result<T, E>) -> Result<T, E> {
        self.begin_transaction();
        match body(self) {
            Ok(value) => {
                self.commit_transaction();
                Ok(value)
            }
            Err(error) => {
                self.abort_transaction();
                Err(error)
            }
        }
    }

    pub fn begin_transaction(&self) {
        self.undo.begin();
    }

    pub fn commit_transaction(&self) {
        self.undo.commit();
    }

    pub fn abort_transaction(&self) {
        self.undo.abort();
    }

    /// Clear every cache, as if nothing had ever been resolved.
    pub fn reset_caches(&self) {
        self.persistent.borrow_mut().clear();
        self.ledger.borrow_mut().clear();
        self.imports.borrow_mut().clear();
        self.required_globals.borrow_mut().clear();
        self.components.borrow_mut().clear();
        self.prefixings.borrow_mut().clear();
        *self.reduced.borrow_mut() = None;
        self.usage.clear();
    }

    /// Keep the units resolved during this toplevel session but forget the
    /// "known missing" markers, so newly appeared files are found.
    pub fn reset_missing_interfaces(&self) {
        self.persistent
            .borrow_mut()
            .retain(|_, entry| entry.is_some());
    }

    /// Load the entry for an externally compiled unit.
    pub fn persistent_structure(&self, name: Atom) -> Result<Rc<PersistentEntry>, EnvError> {
        persistent::persistent_structure(self, name)
    }

    /// Verify an entry's recorded dependencies against the consistency
    /// ledger. Memoized per entry.
    pub fn check_consistency(&self, entry: &PersistentEntry) -> Result<(), EnvError> {
        persistent::check_consistency(self, entry)
    }

    pub(crate) fn push_summary(
        &self,
        parent: Option<SummaryIdx>,
        kind: SummaryKind,
    ) -> SummaryIdx {
        self.summaries.borrow_mut().insert(SummaryNode { parent, kind })
    }

    /// Rebuild a minimal environment from a trail alone, dropping cached
    /// component data. Memoized for the last-seen summary.
    pub fn env_from_summary(&self, summary: Option<SummaryIdx>) -> Result<Environment, EnvError> {
        let Some(target) = summary else {
            return Ok(Environment::empty());
        };

        if let Some((cached, env)) = &*self.reduced.borrow() {
            if *cached == target {
                return Ok(env.clone());
            }
        }

        let mut chain = Vec::new();
        {
            let arena = self.summaries.borrow();
            let mut current = Some(target);
            while let Some(idx) = current {
                chain.push(idx);
                current = arena[idx].parent;
            }
        }
        chain.reverse();

        let mut env = Environment::empty();
        for idx in chain {
            env = env.replay_summary_node(self, idx)?;
        }

        *self.reduced.borrow_mut() = Some((target, env.clone()));

        Ok(env)
    }
}

/// Contextual flags of an environment.
#[derive(Clone, Copy, Default, PartialEq, Eq)]
pub struct EnvFlags {
    /// Checking the inside of a signature rather than a structure.
    pub in_signature: bool,
    /// Under an implicit coercion.
    pub under_coercion: bool,
}

/// Invoked when a binding introduced by an open shadows an earlier binding;
/// receives the kind name and the member name.
pub type ShadowHook = Rc<dyn Fn(&'static str, Atom)>;

pub(crate) struct ComponentSlot {
    pub(crate) cell: Rc<ComponentCell>,
}

/// An immutable snapshot of the bindings visible at a program point.
#[derive(Clone)]
pub struct Environment {
    values: Table<ValueDescr>,
    ctors: Table<CtorDescr>,
    labels: Table<LabelDescr>,
    types: Table<TypeDecl>,
    modules: Table<ModuleDecl>,
    module_types: Table<ModuleTypeDecl>,
    classes: Table<ClassDecl>,
    class_types: Table<ClassTypeDecl>,
    comps: Table<ComponentSlot>,
    summary: Option<SummaryIdx>,
    gadt_instances: Vec<(u32, Rc<RefCell<Vec<TypeExpr>>>)>,
    pub flags: EnvFlags,
}

impl Environment {
    pub fn empty() -> Self {
        Self {
            values: Table::empty(),
            ctors: Table::empty(),
            labels: Table::empty(),
            types: Table::empty(),
            modules: Table::empty(),
            module_types: Table::empty(),
            classes: Table::empty(),
            class_types: Table::empty(),
            comps: Table::empty(),
            summary: None,
            gadt_instances: Vec::new(),
            flags: EnvFlags::default(),
        }
    }

    /// The initial environment with safe string operations.
    pub fn initial_safe_string(session: &Session) -> Self {
        Self::from_seed(session, false)
    }

    /// The initial environment additionally exposing in-place string mutation.
    pub fn initial_unsafe_string(session: &Session) -> Self {
        Self::from_seed(session, true)
    }

    /// The initial environment as configured on the session.
    pub fn initial(session: &Session) -> Self {
        Self::from_seed(session, session.config.unsafe_string)
    }

    fn from_seed(session: &Session, unsafe_string: bool) -> Self {
        let mut env = Self::empty();
        for item in seed::signature(unsafe_string) {
            env = env.add_signature_item(session, item);
        }
        env
    }

    pub fn summary(&self) -> Option<SummaryIdx> {
        self.summary
    }

    /// Rebuild this environment from its trail alone.
    pub fn keep_only_summary(&self, session: &Session) -> Result<Self, EnvError> {
        session.env_from_summary(self.summary)
    }

    // ------------------------------------------------------------------
    // Additions
    // ------------------------------------------------------------------

    fn fresh_ident(name: Atom) -> Result<Ident, EnvError> {
        if !Ident::is_well_formed_name(name.to_str()) {
            return Err(EnvError::IllegalIdent { name });
        }
        Ok(Ident::fresh(name))
    }

    pub fn add_value(
        &self,
        session: &Session,
        ident: Ident,
        descr: Rc<ValueDescr>,
        loc: Option<Span>,
    ) -> Self {
        let mut env = self.raw_add_value(ident, Rc::clone(&descr), loc);
        env.summary = Some(session.push_summary(self.summary, SummaryKind::Value(ident, descr)));
        env
    }

    fn raw_add_value(&self, ident: Ident, descr: Rc<ValueDescr>, loc: Option<Span>) -> Self {
        let usage = loc.map(|loc| UsageKey::Name {
            name: ident.name(),
            loc,
        });
        let mut env = self.clone();
        env.values = self
            .values
            .add(TableEntry::definition(ident, Path::Ident(ident), descr).with_usage(usage));
        env
    }

    pub fn enter_value(
        &self,
        session: &Session,
        name: Atom,
        descr: Rc<ValueDescr>,
        loc: Option<Span>,
    ) -> Result<(Ident, Self), EnvError> {
        let ident = Self::fresh_ident(name)?;
        Ok((ident, self.add_value(session, ident, descr, loc)))
    }

    /// Add a type definition together with the constructors and labels its
    /// body derives.
    pub fn add_type(
        &self,
        session: &Session,
        ident: Ident,
        decl: Rc<TypeDecl>,
        loc: Option<Span>,
    ) -> Self {
        let mut env = self.raw_add_type(ident, Rc::clone(&decl), loc);
        env.summary = Some(session.push_summary(self.summary, SummaryKind::Type(ident, decl)));
        env
    }

    fn raw_add_type(&self, ident: Ident, decl: Rc<TypeDecl>, loc: Option<Span>) -> Self {
        let mut env = self.clone();
        let owner = Path::Ident(ident);

        let usage = loc.map(|loc| UsageKey::Name {
            name: ident.name(),
            loc,
        });
        env.types = self
            .types
            .add(TableEntry::definition(ident, owner.clone(), Rc::clone(&decl)).with_usage(usage));

        for ctor in hir::ctors_of(&owner, &decl) {
            let usage = loc.map(|loc| UsageKey::Ctor {
                ty: ident.name(),
                loc,
                name: ctor.name,
            });
            let ctor_ident = Ident::fresh(ctor.name);
            env.ctors = env
                .ctors
                .add(TableEntry::definition(ctor_ident, Path::Ident(ctor_ident), ctor).with_usage(usage));
        }

        for label in hir::labels_of(&owner, &decl) {
            let usage = loc.map(|loc| UsageKey::Name {
                name: label.name,
                loc,
            });
            let label_ident = Ident::fresh(label.name);
            env.labels = env
                .labels
                .add(TableEntry::definition(label_ident, Path::Ident(label_ident), label).with_usage(usage));
        }

        env
    }

    pub fn enter_type(
        &self,
        session: &Session,
        name: Atom,
        decl: Rc<TypeDecl>,
        loc: Option<Span>,
    ) -> Result<(Ident, Self), EnvError> {
        let ident = Self::fresh_ident(name)?;
        Ok((ident, self.add_type(session, ident, decl, loc)))
    }

    pub fn add_extension(
        &self,
        session: &Session,
        ident: Ident,
        def: Rc<ExtensionDef>,
        loc: Option<Span>,
    ) -> Self {
        let mut env = self.raw_add_extension(ident, Rc::clone(&def), loc);
        env.summary = Some(session.push_summary(self.summary, SummaryKind::Extension(ident, def)));
        env
    }

    fn raw_add_extension(&self, ident: Ident, def: Rc<ExtensionDef>, loc: Option<Span>) -> Self {
        let descr = Rc::new(CtorDescr {
            name: ident.name(),
            owner: def.owner.clone(),
            arity: def.args.len(),
            args: def.args.clone(),
            tag: CtorTag::Extension,
        });
        let usage = loc.map(|loc| UsageKey::Ctor {
            ty: def.owner.last(),
            loc,
            name: ident.name(),
        });

        let mut env = self.clone();
        env.ctors = self
            .ctors
            .add(TableEntry::definition(ident, Path::Ident(ident), descr).with_usage(usage));
        env
    }

    pub fn enter_extension(
        &self,
        session: &Session,
        name: Atom,
        def: Rc<ExtensionDef>,
        loc: Option<Span>,
    ) -> Result<(Ident, Self), EnvError> {
        let ident = Self::fresh_ident(name)?;
        Ok((ident, self.add_extension(session, ident, def, loc)))
    }

    pub fn add_module(
        &self,
        session: &Session,
        ident: Ident,
        decl: Rc<ModuleDecl>,
        loc: Option<Span>,
    ) -> Self {
        let mut env = self.raw_add_module(session, ident, Rc::clone(&decl), loc);
        env.summary = Some(session.push_summary(self.summary, SummaryKind::Module(ident, decl)));
        env
    }

    fn raw_add_module(
        &self,
        session: &Session,
        ident: Ident,
        decl: Rc<ModuleDecl>,
        loc: Option<Span>,
    ) -> Self {
        let path = Path::Ident(ident);
        let usage = loc.map(|loc| UsageKey::Name {
            name: ident.name(),
            loc,
        });

        let cell = component::components_of(session, self, &Subst::identity(), &path, &decl.ty);

        let mut env = self.clone();
        env.modules = self
            .modules
            .add(TableEntry::definition(ident, path.clone(), Rc::clone(&decl)).with_usage(usage));
        env.comps = self
            .comps
            .add(TableEntry::definition(ident, path, Rc::new(ComponentSlot { cell })));
        env
    }

    pub fn enter_module(
        &self,
        session: &Session,
        name: Atom,
        decl: Rc<ModuleDecl>,
        loc: Option<Span>,
    ) -> Result<(Ident, Self), EnvError> {
        let ident = Self::fresh_ident(name)?;
        Ok((ident, self.add_module(session, ident, decl, loc)))
    }

    pub fn add_module_type(
        &self,
        session: &Session,
        ident: Ident,
        decl: Rc<ModuleTypeDecl>,
        loc: Option<Span>,
    ) -> Self {
        let mut env = self.raw_add_module_type(ident, Rc::clone(&decl), loc);
        env.summary = Some(session.push_summary(self.summary, SummaryKind::ModuleType(ident, decl)));
        env
    }

    fn raw_add_module_type(&self, ident: Ident, decl: Rc<ModuleTypeDecl>, loc: Option<Span>) -> Self {
        let usage = loc.map(|loc| UsageKey::Name {
            name: ident.name(),
            loc,
        });
        let mut env = self.clone();
        env.module_types = self
            .module_types
            .add(TableEntry::definition(ident, Path::Ident(ident), decl).with_usage(usage));
        env
    }

    pub fn enter_module_type(
        &self,
        session: &Session,
        name: Atom,
        decl: Rc<ModuleTypeDecl>,
        loc: Option<Span>,
    ) -> Result<(Ident, Self), EnvError> {
        let ident = Self::fresh_ident(name)?;
        Ok((ident, self.add_module_type(session, ident, decl, loc)))
    }

    pub fn add_class(
        &self,
        session: &Session,
        ident: Ident,
        decl: Rc<ClassDecl>,
        loc: Option<Span>,
    ) -> Self {
        let mut env = self.raw_add_class(ident, Rc::clone(&decl), loc);
        env.summary = Some(session.push_summary(self.summary, SummaryKind::Class(ident, decl)));
        env
    }

    fn raw_add_class(&self, ident: Ident, decl: Rc<ClassDecl>, loc: Option<Span>) -> Self {
        let usage = loc.map(|loc| UsageKey::Name {
            name: ident.name(),
            loc,
        });
        let mut env = self.clone();
        env.classes = self
            .classes
            .add(TableEntry::definition(ident, Path::Ident(ident), decl).with_usage(usage));
        env
    }

    pub fn add_class_type(
        &self,
        session: &Session,
        ident: Ident,
        decl: Rc<ClassTypeDecl>,
        loc: Option<Span>,
    ) -> Self {
        let mut env = self.raw_add_class_type(ident, Rc::clone(&decl), loc);
        env.summary = Some(session.push_summary(self.summary, SummaryKind::ClassType(ident, decl)));
        env
    }

    fn raw_add_class_type(&self, ident: Ident, decl: Rc<ClassTypeDecl>, loc: Option<Span>) -> Self {
        let usage = loc.map(|loc| UsageKey::Name {
            name: ident.name(),
            loc,
        });
        let mut env = self.clone();
        env.class_types = self
            .class_types
            .add(TableEntry::definition(ident, Path::Ident(ident), decl).with_usage(usage));
        env
    }

    fn add_signature_item(&self, session: &Session, item: hir::SigItem) -> Self {
        use hir::SigItem::*;

        match item {
            Value(ident, descr) => self.add_value(session, ident, descr, None),
            Type(ident, decl) => self.add_type(session, ident, decl, None),
            Extension(ident, def) => self.add_extension(session, ident, def, None),
            Module(ident, decl) => self.add_module(session, ident, decl, None),
            ModuleType(ident, decl) => self.add_module_type(session, ident, decl, None),
            Class(ident, decl) => self.add_class(session, ident, decl, None),
            ClassType(ident, decl) => self.add_class_type(session, ident, decl, None),
        }
    }

    // ------------------------------------------------------------------
    // GADT instance scopes
    // ------------------------------------------------------------------

    /// Open a refinement scope at the given level.
    pub fn add_gadt_instance_level(&self, level: u32) -> Self {
        let mut env = self.clone();
        env.gadt_instances
            .push((level, Rc::new(RefCell::new(Vec::new()))));
        env
    }

    /// The concrete types asserted equal at the given level, if the level is open.
    pub fn gadt_instances(&self, level: u32) -> Option<Vec<TypeExpr>> {
        self.gadt_instances
            .iter()
            .rev()
            .find(|(l, _)| *l == level)
            .map(|(_, instances)| instances.borrow().clone())
    }

    /// Assert a concrete type at the given level. Undoable.
    pub fn add_gadt_instance(&self, session: &Session, level: u32, ty: TypeExpr) -> bool {
        let Some((_, instances)) = self.gadt_instances.iter().rev().find(|(l, _)| *l == level)
        else {
            return false;
        };

        if instances.borrow().contains(&ty) {
            return true;
        }

        instances.borrow_mut().push(ty);

        let instances = Rc::clone(instances);
        session.undo.record(move || {
            instances.borrow_mut().pop();
        });

        true
    }

    // ------------------------------------------------------------------
    // Exact (path-based) finds
    // ------------------------------------------------------------------

    fn touch<D>(&self, session: &Session, entry: &TableEntry<D>, kind: UsageKind) {
        if let Some(key) = entry.usage {
            session.usage.notify(&session.undo, key, kind);
        }
        if let Some(hook) = &entry.shadow_hook {
            hook();
        }
    }

    fn structure_of<'a>(
        comps: &'a Rc<Component>,
        path: &Path,
    ) -> Result<&'a StructureComps, EnvError> {
        comps
            .as_structure()
            .ok_or_else(|| EnvError::NotAStructure { path: path.clone() })
    }

    fn find_components(&self, session: &Session, path: &Path) -> Result<Rc<Component>, EnvError> {
        match path {
            Path::Ident(ident) if ident.is_persistent() => {
                if ident.name() == session.current_unit() {
                    return Err(NotFound::Path {
                        namespace: Namespace::Module,
                        path: path.clone(),
                    }
                    .into());
                }
                let entry = persistent::persistent_structure(session, ident.name())?;
                component::force(session, path, &entry.comps)
            }
            Path::Ident(ident) => {
                let slot = self.comps.find_by_identity(*ident).ok_or(NotFound::Path {
                    namespace: Namespace::Module,
                    path: path.clone(),
                })?;
                component::force(session, path, &slot.decl.cell)
            }
            Path::Dot(prefix, member) => {
                let parent = self.find_structure_components(session, prefix)?;
                let module = Self::structure_of(&parent, prefix)?
                    .modules
                    .get(member)
                    .ok_or_else(|| component::member_not_found(prefix, Namespace::Module, *member))?;
                component::force(session, path, &module.comps)
            }
            Path::Apply(functor_path, arg_path) => {
                let functor_comps = self.find_components(session, functor_path)?;
                let functor = functor_comps.as_functor().ok_or_else(|| EnvError::NotAFunctor {
                    path: (**functor_path).clone(),
                })?;
                let argument = self.find_module(session, arg_path)?;
                component::apply_functor(session, functor_path, functor, arg_path, &argument.ty)
            }
        }
    }

    pub(crate) fn find_structure_components(
        &self,
        session: &Session,
        path: &Path,
    ) -> Result<Rc<Component>, EnvError> {
        let comps = self.find_components(session, path)?;
        Self::structure_of(&comps, path)?;
        Ok(comps)
    }

    pub fn find_module(&self, session: &Session, path: &Path) -> Result<Rc<ModuleDecl>, EnvError> {
        match path {
            Path::Ident(ident) if ident.is_persistent() => {
                if ident.name() == session.current_unit() {
                    return Err(NotFound::Path {
                        namespace: Namespace::Module,
                        path: path.clone(),
                    }
                    .into());
                }
                let entry = persistent::persistent_structure(session, ident.name())?;
                Ok(Rc::new(ModuleDecl::new(entry.module_type())))
            }
            Path::Ident(ident) => self
                .modules
                .find_by_identity(*ident)
                .map(|entry| Rc::clone(&entry.decl))
                .ok_or_else(|| {
                    NotFound::Path {
                        namespace: Namespace::Module,
                        path: path.clone(),
                    }
                    .into()
                }),
            Path::Dot(prefix, member) => {
                let parent = self.find_structure_components(session, prefix)?;
                Self::structure_of(&parent, prefix)?
                    .modules
                    .get(member)
                    .map(|module| Rc::clone(&module.decl))
                    .ok_or_else(|| component::member_not_found(prefix, Namespace::Module, *member))
            }
            Path::Apply(functor_path, arg_path) => {
                let functor_comps = self.find_components(session, functor_path)?;
                let functor = functor_comps.as_functor().ok_or_else(|| EnvError::NotAFunctor {
                    path: (**functor_path).clone(),
                })?;
                // No inclusion check here: finding by an exact, already
                // resolved path trusts its construction.
                let (result_ty, _) = component::instantiated_result(functor, arg_path);
                Ok(Rc::new(ModuleDecl::new(result_ty)))
            }
        }
    }

    pub fn find_module_type_decl(
        &self,
        session: &Session,
        path: &Path,
    ) -> Result<Rc<ModuleTypeDecl>, EnvError> {
        match path {
            Path::Ident(ident) if !ident.is_persistent() => self
                .module_types
                .find_by_identity(*ident)
                .map(|entry| Rc::clone(&entry.decl))
                .ok_or_else(|| {
                    NotFound::Path {
                        namespace: Namespace::ModuleType,
                        path: path.clone(),
                    }
                    .into()
                }),
            Path::Dot(prefix, member) => {
                let parent = self.find_structure_components(session, prefix)?;
                Self::structure_of(&parent, prefix)?
                    .module_types
                    .get(member)
                    .cloned()
                    .ok_or_else(|| {
                        component::member_not_found(prefix, Namespace::ModuleType, *member)
                    })
            }
            _ => Err(NotFound::Path {
                namespace: Namespace::ModuleType,
                path: path.clone(),
            }
            .into()),
        }
    }

    pub fn find_value(&self, session: &Session, path: &Path) -> Result<Rc<ValueDescr>, EnvError> {
        match path {
            Path::Ident(ident) if !ident.is_persistent() => self
                .values
                .find_by_identity(*ident)
                .map(|entry| Rc::clone(&entry.decl))
                .ok_or_else(|| {
                    NotFound::Path {
                        namespace: Namespace::Value,
                        path: path.clone(),
                    }
                    .into()
                }),
            Path::Dot(prefix, member) => {
                let parent = self.find_structure_components(session, prefix)?;
                Self::structure_of(&parent, prefix)?
                    .values
                    .get(member)
                    .map(|(descr, _)| Rc::clone(descr))
                    .ok_or_else(|| component::member_not_found(prefix, Namespace::Value, *member))
            }
            _ => Err(NotFound::Path {
                namespace: Namespace::Value,
                path: path.clone(),
            }
            .into()),
        }
    }

    pub fn find_type(&self, session: &Session, path: &Path) -> Result<Rc<TypeDecl>, EnvError> {
        match path {
            Path::Ident(ident) if !ident.is_persistent() => self
                .types
                .find_by_identity(*ident)
                .map(|entry| Rc::clone(&entry.decl))
                .ok_or_else(|| {
                    NotFound::Path {
                        namespace: Namespace::Type,
                        path: path.clone(),
                    }
                    .into()
                }),
            Path::Dot(prefix, member) => {
                let parent = self.find_structure_components(session, prefix)?;
                Self::structure_of(&parent, prefix)?
                    .types
                    .get(member)
                    .cloned()
                    .ok_or_else(|| component::member_not_found(prefix, Namespace::Type, *member))
            }
            _ => Err(NotFound::Path {
                namespace: Namespace::Type,
                path: path.clone(),
            }
            .into()),
        }
    }

    pub fn find_class(&self, session: &Session, path: &Path) -> Result<Rc<ClassDecl>, EnvError> {
        match path {
            Path::Ident(ident) if !ident.is_persistent() => self
                .classes
                .find_by_identity(*ident)
                .map(|entry| Rc::clone(&entry.decl))
                .ok_or_else(|| {
                    NotFound::Path {
                        namespace: Namespace::Class,
                        path: path.clone(),
                    }
                    .into()
                }),
            Path::Dot(prefix, member) => {
                let parent = self.find_structure_components(session, prefix)?;
                Self::structure_of(&parent, prefix)?
                    .classes
                    .get(member)
                    .map(|(decl, _)| Rc::clone(decl))
                    .ok_or_else(|| component::member_not_found(prefix, Namespace::Class, *member))
            }
            _ => Err(NotFound::Path {
                namespace: Namespace::Class,
                path: path.clone(),
            }
            .into()),
        }
    }

    pub fn find_class_type(
        &self,
        session: &Session,
        path: &Path,
    ) -> Result<Rc<ClassTypeDecl>, EnvError> {
        match path {
            Path::Ident(ident) if !ident.is_persistent() => self
                .class_types
                .find_by_identity(*ident)
                .map(|entry| Rc::clone(&entry.decl))
                .ok_or_else(|| {
                    NotFound::Path {
                        namespace: Namespace::ClassType,
                        path: path.clone(),
                    }
                    .into()
                }),
            Path::Dot(prefix, member) => {
                let parent = self.find_structure_components(session, prefix)?;
                Self::structure_of(&parent, prefix)?
                    .class_types
                    .get(member)
                    .cloned()
                    .ok_or_else(|| {
                        component::member_not_found(prefix, Namespace::ClassType, *member)
                    })
            }
            _ => Err(NotFound::Path {
                namespace: Namespace::ClassType,
                path: path.clone(),
            }
            .into()),
        }
    }

    /// Normalize a path, expanding module aliases to their canonical targets.
    ///
    /// Under `lax`, failed lookups degrade to returning the path unresolved.
    /// Otherwise a failure is a hard error — reported as a dangling-path
    /// diagnostic right away when a location is supplied.
    pub fn normalize_path(
        &self,
        session: &Session,
        lax: bool,
        loc: Option<Span>,
        path: &Path,
    ) -> Result<Path, EnvError> {
        match normalize::normalize(session, self, path, lax) {
            Err(error @ EnvError::Dangling { .. }) => match loc {
                Some(loc) => Err(EnvError::Erased(error.report(session, loc))),
                None => Err(error),
            },
            result => result,
        }
    }

    // ------------------------------------------------------------------
    // Name-based lookups
    // ------------------------------------------------------------------

    fn lookup_components(
        &self,
        session: &Session,
        reference: &NamePath,
        loc: Span,
    ) -> Result<(Path, Rc<Component>), EnvError> {
        match reference {
            NamePath::Name(name) => {
                if let Some(entry) = self.comps.find_by_name(*name) {
                    if let Some(module_entry) = self.modules.find_by_name(*name) {
                        self.touch(session, module_entry, UsageKind::Reference);
                    }
                    let comps = component::force(session, &entry.path, &entry.decl.cell)?;
                    return Ok((entry.path.clone(), comps));
                }

                // A bare unbound module name may denote a persistent unit —
                // but never the unit currently being compiled.
                // @Question should a persistent fallback count as a use for
                // the unused-binding tracker?
                if *name != session.current_unit() {
                    let entry = persistent::persistent_structure(session, *name)?;
                    let path = entry.path();
                    let comps = component::force(session, &path, &entry.comps)?;
                    return Ok((path, comps));
                }

                Err(NotFound::Name {
                    namespace: Namespace::Module,
                    name: *name,
                }
                .into())
            }
            NamePath::Dot(prefix, member) => {
                let (prefix_path, comps) = self.lookup_components(session, prefix, loc)?;
                let module = Self::structure_of(&comps, &prefix_path)?
                    .modules
                    .get(member)
                    .ok_or_else(|| {
                        component::member_not_found(&prefix_path, Namespace::Module, *member)
                    })?;
                let path = prefix_path.dot(*member);
                let comps = component::force(session, &path, &module.comps)?;
                Ok((path, comps))
            }
            NamePath::Apply(functor_ref, arg_ref) => {
                let (functor_path, functor_comps) =
                    self.lookup_components(session, functor_ref, loc)?;
                let functor = functor_comps.as_functor().ok_or_else(|| EnvError::NotAFunctor {
                    path: functor_path.clone(),
                })?;
                let (arg_path, arg_decl) = self.look_up_module(session, arg_ref, loc)?;
                let comps =
                    component::apply_functor(session, &functor_path, functor, &arg_path, &arg_decl.ty)?;
                Ok((functor_path.apply(arg_path), comps))
            }
        }
    }

    fn lookup_structure_components(
        &self,
        session: &Session,
        reference: &NamePath,
        loc: Span,
    ) -> Result<(Path, Rc<Component>), EnvError> {
        let (path, comps) = self.lookup_components(session, reference, loc)?;
        Self::structure_of(&comps, &path)?;
        Ok((path, comps))
    }

    pub fn look_up_module(
        &self,
        session: &Session,
        reference: &NamePath,
        loc: Span,
    ) -> Result<(Path, Rc<ModuleDecl>), EnvError> {
        match reference {
            NamePath::Name(name) => {
                if let Some(entry) = self.modules.find_by_name(*name) {
                    self.touch(session, entry, UsageKind::Reference);
                    return Ok((entry.path.clone(), Rc::clone(&entry.decl)));
                }

                if *name != session.current_unit() {
                    let entry = persistent::persistent_structure(session, *name)?;
                    return Ok((entry.path(), Rc::new(ModuleDecl::new(entry.module_type()))));
                }

                Err(NotFound::Name {
                    namespace: Namespace::Module,
                    name: *name,
                }
                .into())
            }
            NamePath::Dot(prefix, member) => {
                let (prefix_path, comps) =
                    self.lookup_structure_components(session, prefix, loc)?;
                Self::structure_of(&comps, &prefix_path)?
                    .modules
                    .get(member)
                    .map(|module| (prefix_path.clone().dot(*member), Rc::clone(&module.decl)))
                    .ok_or_else(|| {
                        component::member_not_found(&prefix_path, Namespace::Module, *member)
                    })
            }
            NamePath::Apply(functor_ref, arg_ref) => {
                let (functor_path, functor_comps) =
                    self.lookup_components(session, functor_ref, loc)?;
                let functor = functor_comps.as_functor().ok_or_else(|| EnvError::NotAFunctor {
                    path: functor_path.clone(),
                })?;
                let (arg_path, arg_decl) = self.look_up_module(session, arg_ref, loc)?;

                if let Some(param_ty) = &functor.param_ty {
                    (session.hooks.check_inclusion)(self, &arg_decl.ty, &arg_path, param_ty)
                        .map_err(|reason| EnvError::InclusionMismatch {
                            functor: functor_path.clone(),
                            argument: arg_path.clone(),
                            reason,
                        })?;
                }

                let (result_ty, _) = component::instantiated_result(functor, &arg_path);
                Ok((functor_path.apply(arg_path), Rc::new(ModuleDecl::new(result_ty))))
            }
        }
    }

    pub fn look_up_value(
        &self,
        session: &Session,
        reference: &NamePath,
        loc: Span,
    ) -> Result<(Path, Rc<ValueDescr>), EnvError> {
        match reference {
            NamePath::Name(name) => {
                let entry = self.values.find_by_name(*name).ok_or(NotFound::Name {
                    namespace: Namespace::Value,
                    name: *name,
                })?;
                self.touch(session, entry, UsageKind::Reference);
                Ok((entry.path.clone(), Rc::clone(&entry.decl)))
            }
            NamePath::Dot(prefix, member) => {
                let (prefix_path, comps) =
                    self.lookup_structure_components(session, prefix, loc)?;
                Self::structure_of(&comps, &prefix_path)?
                    .values
                    .get(member)
                    .map(|(descr, _)| (prefix_path.clone().dot(*member), Rc::clone(descr)))
                    .ok_or_else(|| {
                        component::member_not_found(&prefix_path, Namespace::Value, *member)
                    })
            }
            NamePath::Apply(..) => Err(NotFound::Reference {
                namespace: Namespace::Value,
                reference: reference.clone(),
            }
            .into()),
        }
    }

    pub fn look_up_type(
        &self,
        session: &Session,
        reference: &NamePath,
        loc: Span,
    ) -> Result<(Path, Rc<TypeDecl>), EnvError> {
        match reference {
            NamePath::Name(name) => {
                let entry = self.types.find_by_name(*name).ok_or(NotFound::Name {
                    namespace: Namespace::Type,
                    name: *name,
                })?;
                self.touch(session, entry, UsageKind::Reference);
                Ok((entry.path.clone(), Rc::clone(&entry.decl)))
            }
            NamePath::Dot(prefix, member) => {
                let (prefix_path, comps) =
                    self.lookup_structure_components(session, prefix, loc)?;
                Self::structure_of(&comps, &prefix_path)?
                    .types
                    .get(member)
                    .map(|decl| (prefix_path.clone().dot(*member), Rc::clone(decl)))
                    .ok_or_else(|| {
                        component::member_not_found(&prefix_path, Namespace::Type, *member)
                    })
            }
            NamePath::Apply(..) => Err(NotFound::Reference {
                namespace: Namespace::Type,
                reference: reference.clone(),
            }
            .into()),
        }
    }

    pub fn look_up_module_type(
        &self,
        session: &Session,
        reference: &NamePath,
        loc: Span,
    ) -> Result<(Path, Rc<ModuleTypeDecl>), EnvError> {
        match reference {
            NamePath::Name(name) => {
                let entry = self.module_types.find_by_name(*name).ok_or(NotFound::Name {
                    namespace: Namespace::ModuleType,
                    name: *name,
                })?;
                self.touch(session, entry, UsageKind::Reference);
                Ok((entry.path.clone(), Rc::clone(&entry.decl)))
            }
            NamePath::Dot(prefix, member) => {
                let (prefix_path, comps) =
                    self.lookup_structure_components(session, prefix, loc)?;
                Self::structure_of(&comps, &prefix_path)?
                    .module_types
                    .get(member)
                    .map(|decl| (prefix_path.clone().dot(*member), Rc::clone(decl)))
                    .ok_or_else(|| {
                        component::member_not_found(&prefix_path, Namespace::ModuleType, *member)
                    })
            }
            NamePath::Apply(..) => Err(NotFound::Reference {
                namespace: Namespace::ModuleType,
                reference: reference.clone(),
            }
            .into()),
        }
    }

    /// Look up a constructor; the usage kind distinguishes expression,
    /// pattern and privatizing uses.
    pub fn look_up_ctor(
        &self,
        session: &Session,
        reference: &NamePath,
        loc: Span,
        kind: UsageKind,
    ) -> Result<Rc<CtorDescr>, EnvError> {
        match reference {
            NamePath::Name(name) => {
                let entry = self.ctors.find_by_name(*name).ok_or(NotFound::Name {
                    namespace: Namespace::Ctor,
                    name: *name,
                })?;
                self.touch(session, entry, kind);
                Ok(Rc::clone(&entry.decl))
            }
            NamePath::Dot(prefix, member) => {
                let (prefix_path, comps) =
                    self.lookup_structure_components(session, prefix, loc)?;
                Self::structure_of(&comps, &prefix_path)?
                    .ctors
                    .get(member)
                    .map(|(descr, _)| Rc::clone(descr))
                    .ok_or_else(|| {
                        component::member_not_found(&prefix_path, Namespace::Ctor, *member)
                    })
            }
            NamePath::Apply(..) => Err(NotFound::Reference {
                namespace: Namespace::Ctor,
                reference: reference.clone(),
            }
            .into()),
        }
    }

    /// All same-named constructors in scope, most recently bound first —
    /// the ambiguity list overload-style resolution picks from.
    pub fn look_up_all_ctors(
        &self,
        session: &Session,
        name: Atom,
        kind: UsageKind,
    ) -> Vec<Rc<CtorDescr>> {
        self.ctors
            .find_all_by_name(name)
            .into_iter()
            .map(|entry| {
                self.touch(session, &entry, kind);
                Rc::clone(&entry.decl)
            })
            .collect()
    }

    pub fn look_up_label(
        &self,
        session: &Session,
        reference: &NamePath,
        loc: Span,
    ) -> Result<Rc<LabelDescr>, EnvError> {
        match reference {
            NamePath::Name(name) => {
                let entry = self.labels.find_by_name(*name).ok_or(NotFound::Name {
                    namespace: Namespace::Label,
                    name: *name,
                })?;
                self.touch(session, entry, UsageKind::Reference);
                Ok(Rc::clone(&entry.decl))
            }
            NamePath::Dot(prefix, member) => {
                let (prefix_path, comps) =
                    self.lookup_structure_components(session, prefix, loc)?;
                Self::structure_of(&comps, &prefix_path)?
                    .labels
                    .get(member)
                    .cloned()
                    .ok_or_else(|| {
                        component::member_not_found(&prefix_path, Namespace::Label, *member)
                    })
            }
            NamePath::Apply(..) => Err(NotFound::Reference {
                namespace: Namespace::Label,
                reference: reference.clone(),
            }
            .into()),
        }
    }

    pub fn look_up_all_labels(&self, session: &Session, name: Atom) -> Vec<Rc<LabelDescr>> {
        self.labels
            .find_all_by_name(name)
            .into_iter()
            .map(|entry| {
                self.touch(session, &entry, UsageKind::Reference);
                Rc::clone(&entry.decl)
            })
            .collect()
    }

    pub fn look_up_class(
        &self,
        session: &Session,
        reference: &NamePath,
        loc: Span,
    ) -> Result<(Path, Rc<ClassDecl>), EnvError> {
        match reference {
            NamePath::Name(name) => {
                let entry = self.classes.find_by_name(*name).ok_or(NotFound::Name {
                    namespace: Namespace::Class,
                    name: *name,
                })?;
                self.touch(session, entry, UsageKind::Reference);
                Ok((entry.path.clone(), Rc::clone(&entry.decl)))
            }
            NamePath::Dot(prefix, member) => {
                let (prefix_path, comps) =
                    self.lookup_structure_components(session, prefix, loc)?;
                Self::structure_of(&comps, &prefix_path)?
                    .classes
                    .get(member)
                    .map(|(decl, _)| (prefix_path.clone().dot(*member), Rc::clone(decl)))
                    .ok_or_else(|| {
                        component::member_not_found(&prefix_path, Namespace::Class, *member)
                    })
            }
            NamePath::Apply(..) => Err(NotFound::Reference {
                namespace: Namespace::Class,
                reference: reference.clone(),
            }
            .into()),
        }
    }

    pub fn look_up_class_type(
        &self,
        session: &Session,
        reference: &NamePath,
        loc: Span,
    ) -> Result<(Path, Rc<ClassTypeDecl>), EnvError> {
        match reference {
            NamePath::Name(name) => {
                let entry = self.class_types.find_by_name(*name).ok_or(NotFound::Name {
                    namespace: Namespace::ClassType,
                    name: *name,
                })?;
                self.touch(session, entry, UsageKind::Reference);
                Ok((entry.path.clone(), Rc::clone(&entry.decl)))
            }
            NamePath::Dot(prefix, member) => {
                let (prefix_path, comps) =
                    self.lookup_structure_components(session, prefix, loc)?;
                Self::structure_of(&comps, &prefix_path)?
                    .class_types
                    .get(member)
                    .map(|decl| (prefix_path.clone().dot(*member), Rc::clone(decl)))
                    .ok_or_else(|| {
                        component::member_not_found(&prefix_path, Namespace::ClassType, *member)
                    })
            }
            NamePath::Apply(..) => Err(NotFound::Reference {
                namespace: Namespace::ClassType,
                reference: reference.clone(),
            }
            .into()),
        }
    }

    // ------------------------------------------------------------------
    // Opening
    // ------------------------------------------------------------------

    /// Pull all member tables of the structure at `path` into the current
    /// namespaces. One `Open` trail node is recorded, not one per member.
    pub fn open_signature(
        &self,
        session: &Session,
        path: &Path,
        shadow: Option<ShadowHook>,
    ) -> Result<Self, EnvError> {
        let comps = self.find_structure_components(session, path)?;

        let mut env = self.raw_open(path, &comps, shadow);
        env.summary = Some(session.push_summary(
            self.summary,
            SummaryKind::Open {
                path: path.clone(),
                expansion: RefCell::new(Some(Rc::clone(&comps))),
            },
        ));

        Ok(env)
    }

    /// Resolve a module reference and open it.
    pub fn open(
        &self,
        session: &Session,
        reference: &NamePath,
        loc: Span,
        shadow: Option<ShadowHook>,
    ) -> Result<Self, EnvError> {
        let (path, _) = self.lookup_structure_components(session, reference, loc)?;
        self.open_signature(session, &path, shadow)
    }

    fn raw_open(&self, path: &Path, comps: &Rc<Component>, shadow: Option<ShadowHook>) -> Self {
        fn hook(
            shadow: &Option<ShadowHook>,
            kind: &'static str,
            name: Atom,
        ) -> Option<Rc<dyn Fn()>> {
            shadow.as_ref().map(|shadow| {
                let shadow = Rc::clone(shadow);
                Rc::new(move || shadow(kind, name)) as Rc<dyn Fn()>
            })
        }

        let structure = comps
            .as_structure()
            .expect("opening a functor despite the structure check");
        let mut env = self.clone();

        for (&name, (descr, _)) in &structure.values {
            env.values = env.values.add_open(
                TableEntry::definition(Ident::fresh(name), path.clone().dot(name), Rc::clone(descr)),
                hook(&shadow, "value", name),
                &self.values,
            );
        }
        for (&name, (descr, _)) in &structure.ctors {
            env.ctors = env.ctors.add_open(
                TableEntry::definition(Ident::fresh(name), path.clone().dot(name), Rc::clone(descr)),
                hook(&shadow, "constructor", name),
                &self.ctors,
            );
        }
        for (&name, descr) in &structure.labels {
            env.labels = env.labels.add_open(
                TableEntry::definition(Ident::fresh(name), path.clone().dot(name), Rc::clone(descr)),
                hook(&shadow, "record label", name),
                &self.labels,
            );
        }
        for (&name, decl) in &structure.types {
            env.types = env.types.add_open(
                TableEntry::definition(Ident::fresh(name), path.clone().dot(name), Rc::clone(decl)),
                hook(&shadow, "type", name),
                &self.types,
            );
        }
        for (&name, module) in &structure.modules {
            let ident = Ident::fresh(name);
            env.modules = env.modules.add_open(
                TableEntry::definition(ident, path.clone().dot(name), Rc::clone(&module.decl)),
                hook(&shadow, "module", name),
                &self.modules,
            );
            env.comps = env.comps.add_open(
                TableEntry::definition(
                    ident,
                    path.clone().dot(name),
                    Rc::new(ComponentSlot {
                        cell: Rc::clone(&module.comps),
                    }),
                ),
                None,
                &self.comps,
            );
        }
        for (&name, decl) in &structure.module_types {
            env.module_types = env.module_types.add_open(
                TableEntry::definition(Ident::fresh(name), path.clone().dot(name), Rc::clone(decl)),
                hook(&shadow, "module type", name),
                &self.module_types,
            );
        }
        for (&name, (decl, _)) in &structure.classes {
            env.classes = env.classes.add_open(
                TableEntry::definition(Ident::fresh(name), path.clone().dot(name), Rc::clone(decl)),
                hook(&shadow, "class", name),
                &self.classes,
            );
        }
        for (&name, decl) in &structure.class_types {
            env.class_types = env.class_types.add_open(
                TableEntry::definition(Ident::fresh(name), path.clone().dot(name), Rc::clone(decl)),
                hook(&shadow, "class type", name),
                &self.class_types,
            );
        }

        env
    }

    // ------------------------------------------------------------------
    // Folds, diffing, reconstruction
    // ------------------------------------------------------------------

    /// Fold over every value binding, or over the values of one sub-module.
    pub fn fold_values<A>(
        &self,
        session: &Session,
        root: Option<&Path>,
        init: A,
        mut fold: impl FnMut(A, Atom, &Path, &Rc<ValueDescr>) -> A,
    ) -> Result<A, EnvError> {
        match root {
            None => {
                let mut acc = Some(init);
                self.values.for_each(|entry| {
                    let taken = acc.take().unwrap();
                    acc = Some(fold(taken, entry.ident.name(), &entry.path, &entry.decl));
                });
                Ok(acc.unwrap())
            }
            Some(path) => {
                let comps = self.find_structure_components(session, path)?;
                let mut acc = init;
                for (&name, (descr, _)) in &Self::structure_of(&comps, path)?.values {
                    let member_path = path.clone().dot(name);
                    acc = fold(acc, name, &member_path, descr);
                }
                Ok(acc)
            }
        }
    }

    pub fn fold_types<A>(
        &self,
        session: &Session,
        root: Option<&Path>,
        init: A,
        mut fold: impl FnMut(A, Atom, &Path, &Rc<TypeDecl>) -> A,
    ) -> Result<A, EnvError> {
        match root {
            None => {
                let mut acc = Some(init);
                self.types.for_each(|entry| {
                    let taken = acc.take().unwrap();
                    acc = Some(fold(taken, entry.ident.name(), &entry.path, &entry.decl));
                });
                Ok(acc.unwrap())
            }
            Some(path) => {
                let comps = self.find_structure_components(session, path)?;
                let mut acc = init;
                for (&name, decl) in &Self::structure_of(&comps, path)?.types {
                    let member_path = path.clone().dot(name);
                    acc = fold(acc, name, &member_path, decl);
                }
                Ok(acc)
            }
        }
    }

    pub fn fold_modules<A>(
        &self,
        session: &Session,
        root: Option<&Path>,
        init: A,
        mut fold: impl FnMut(A, Atom, &Path, &Rc<ModuleDecl>) -> A,
    ) -> Result<A, EnvError> {
        match root {
            None => {
                let mut acc = Some(init);
                self.modules.for_each(|entry| {
                    let taken = acc.take().unwrap();
                    acc = Some(fold(taken, entry.ident.name(), &entry.path, &entry.decl));
                });
                Ok(acc.unwrap())
            }
            Some(path) => {
                let comps = self.find_structure_components(session, path)?;
                let mut acc = init;
                for (&name, module) in &Self::structure_of(&comps, path)?.modules {
                    let member_path = path.clone().dot(name);
                    acc = fold(acc, name, &member_path, &module.decl);
                }
                Ok(acc)
            }
        }
    }

    pub fn fold_ctors<A>(
        &self,
        session: &Session,
        root: Option<&Path>,
        init: A,
        mut fold: impl FnMut(A, Atom, &Rc<CtorDescr>) -> A,
    ) -> Result<A, EnvError> {
        match root {
            None => {
                let mut acc = Some(init);
                self.ctors.for_each(|entry| {
                    let taken = acc.take().unwrap();
                    acc = Some(fold(taken, entry.ident.name(), &entry.decl));
                });
                Ok(acc.unwrap())
            }
            Some(path) => {
                let comps = self.find_structure_components(session, path)?;
                let mut acc = init;
                for (&name, (descr, _)) in &Self::structure_of(&comps, path)?.ctors {
                    acc = fold(acc, name, descr);
                }
                Ok(acc)
            }
        }
    }

    /// The locally introduced bindings present in `self` but not in `other`,
    /// read off the summary trails.
    // @Note when `other` is not on `self`'s trail this walks to the root and
    // lists every introduction.
    pub fn diff(&self, session: &Session, other: &Environment) -> Vec<Ident> {
        let arena = session.summaries.borrow();
        let mut introduced = Vec::new();
        let mut current = self.summary;

        while let Some(idx) = current {
            if Some(idx) == other.summary {
                break;
            }
            let node = &arena[idx];
            if let Some(ident) = node.ident() {
                introduced.push(ident);
            }
            current = node.parent;
        }

        introduced
    }

    fn replay_summary_node(&self, session: &Session, idx: SummaryIdx) -> Result<Self, EnvError> {
        enum Replay {
            Value(Ident, Rc<ValueDescr>),
            Type(Ident, Rc<TypeDecl>),
            Extension(Ident, Rc<ExtensionDef>),
            Module(Ident, Rc<ModuleDecl>),
            ModuleType(Ident, Rc<ModuleTypeDecl>),
            Class(Ident, Rc<ClassDecl>),
            ClassType(Ident, Rc<ClassTypeDecl>),
            Open(Path, Option<Rc<Component>>),
        }

        let replay = {
            let arena = session.summaries.borrow();
            match &arena[idx].kind {
                SummaryKind::Value(ident, descr) => Replay::Value(*ident, Rc::clone(descr)),
                SummaryKind::Type(ident, decl) => Replay::Type(*ident, Rc::clone(decl)),
                SummaryKind::Extension(ident, def) => Replay::Extension(*ident, Rc::clone(def)),
                SummaryKind::Module(ident, decl) => Replay::Module(*ident, Rc::clone(decl)),
                SummaryKind::ModuleType(ident, decl) => Replay::ModuleType(*ident, Rc::clone(decl)),
                SummaryKind::Class(ident, decl) => Replay::Class(*ident, Rc::clone(decl)),
                SummaryKind::ClassType(ident, decl) => Replay::ClassType(*ident, Rc::clone(decl)),
                SummaryKind::Open { path, expansion } => {
                    Replay::Open(path.clone(), expansion.borrow().clone())
                }
            }
        };

        let mut env = match replay {
            Replay::Value(ident, descr) => self.raw_add_value(ident, descr, None),
            Replay::Type(ident, decl) => self.raw_add_type(ident, decl, None),
            Replay::Extension(ident, def) => self.raw_add_extension(ident, def, None),
            Replay::Module(ident, decl) => self.raw_add_module(session, ident, decl, None),
            Replay::ModuleType(ident, decl) => self.raw_add_module_type(ident, decl, None),
            Replay::Class(ident, decl) => self.raw_add_class(ident, decl, None),
            Replay::ClassType(ident, decl) => self.raw_add_class_type(ident, decl, None),
            Replay::Open(path, expansion) => {
                let comps = match expansion {
                    Some(comps) => comps,
                    None => {
                        let comps = self.find_structure_components(session, &path)?;
                        let arena = session.summaries.borrow();
                        if let SummaryKind::Open { expansion, .. } = &arena[idx].kind {
                            *expansion.borrow_mut() = Some(Rc::clone(&comps));
                        }
                        comps
                    }
                };
                self.raw_open(&path, &comps, None)
            }
        };

        env.summary = Some(idx);
        Ok(env)
    }
}

mod error {
    //! The diagnostic renderings of [`EnvError`](super::EnvError).

    use super::{EnvError, NotFound};
    use diagnostics::{Diagnostic, ErrorCode};
    use utility::QuoteExt;

    pub(super) fn diagnostic(error: &EnvError) -> Diagnostic {
        match error {
            EnvError::NotFound(not_found) => self::not_found(not_found),
            EnvError::IllegalRenaming {
                requested,
                found,
                filename,
            } => Diagnostic::error()
                .code(ErrorCode::E004)
                .message(format!(
                    "‘{}’ declares the unit {}, not {}",
                    filename.display(),
                    found.quote(),
                    requested.quote(),
                )),
            EnvError::InconsistentImport {
                unit,
                source1,
                source2,
            } => Diagnostic::error()
                .code(ErrorCode::E005)
                .message(format!(
                    "the files ‘{}’ and ‘{}’ make inconsistent assumptions over the unit {}",
                    source1.display(),
                    source2.display(),
                    unit.quote(),
                ))
                .note("rebuilding the stale unit resolves the disagreement"),
            EnvError::NeedsRecTypes { unit, importer } => Diagnostic::error()
                .code(ErrorCode::E006)
                .message(format!(
                    "the unit {} was compiled with the recursive-types capability which {} does not enable",
                    unit.quote(),
                    importer.quote(),
                )),
            EnvError::Dangling { original, furthest } => Diagnostic::error()
                .code(ErrorCode::E007)
                .message(format!(
                    "the module path {} does not reach a concrete module",
                    original.quote()
                ))
                .note(format!("normalization got as far as {}", furthest.quote())),
            EnvError::IllegalIdent { name } => Diagnostic::error()
                .code(ErrorCode::E003)
                .message(format!("{} is not a legal binding name", name.quote()))
                .note(format!(
                    "the character ‘{}’ is reserved for compiler-generated names",
                    hir::RESERVED_MARKER,
                )),
            EnvError::NotAStructure { path } => Diagnostic::error()
                .code(ErrorCode::E002)
                .message(format!("the module {} is not a structure", path.quote())),
            EnvError::NotAFunctor { path } => Diagnostic::error()
                .code(ErrorCode::E010)
                .message(format!("the module {} is not a functor", path.quote())),
            EnvError::InclusionMismatch {
                functor,
                argument,
                reason,
            } => Diagnostic::error()
                .code(ErrorCode::E008)
                .message(format!(
                    "the module {} does not match the parameter signature of {}",
                    argument.quote(),
                    functor.quote(),
                ))
                .note(reason.clone()),
            EnvError::StoreFailure { name, message } => Diagnostic::error()
                .code(ErrorCode::E009)
                .message(format!(
                    "the compiled interface of {} could not be read",
                    name.quote()
                ))
                .note(message.clone()),
            EnvError::Erased(_) => unreachable!(),
        }
    }

    fn not_found(not_found: &NotFound) -> Diagnostic {
        match not_found {
            NotFound::Name { namespace, name } => Diagnostic::error()
                .code(ErrorCode::E001)
                .message(format!("unbound {} {}", namespace.name(), name.quote())),
            NotFound::Path { namespace, path } => Diagnostic::error()
                .code(ErrorCode::E001)
                .message(format!("unbound {} {}", namespace.name(), path.quote())),
            NotFound::Member {
                path,
                namespace,
                member,
            } => Diagnostic::error().code(ErrorCode::E001).message(format!(
                "the module {} has no {} {}",
                path.quote(),
                namespace.name(),
                member.quote(),
            )),
            NotFound::Reference {
                namespace,
                reference,
            } => Diagnostic::error().code(ErrorCode::E001).message(format!(
                "{} does not denote a {}",
                reference.quote(),
                namespace.name(),
            )),
            NotFound::Unit { name } => Diagnostic::error().code(ErrorCode::E009).message(format!(
                "no compiled interface found for the unit {}",
                name.quote()
            )),
            NotFound::Abstract { path } => Diagnostic::error()
                .code(ErrorCode::E001)
                .message(format!(
                    "the module type {} is abstract and has no members",
                    path.quote()
                )),
        }
    }
}

#[cfg(test)]
mod test;
