use super::*;
use hir::{SigItem, TypeBody};
use intf::MemoryStore;
use std::cell::Cell;

fn atom(name: &str) -> Atom {
    Atom::from(name)
}

fn ty(name: &str) -> TypeExpr {
    TypeExpr::Var(atom(name))
}

fn value(ty: TypeExpr) -> Rc<ValueDescr> {
    Rc::new(ValueDescr::regular(ty))
}

fn structure(items: Vec<SigItem>) -> Rc<ModuleDecl> {
    Rc::new(ModuleDecl::new(ModuleType::signature(items)))
}

fn alias(path: Path) -> Rc<ModuleDecl> {
    Rc::new(ModuleDecl::new(Rc::new(ModuleType::Alias(path))))
}

/// An interface store handle that can still be driven after the session took
/// ownership of its clone.
#[derive(Clone)]
struct SharedStore(Rc<MemoryStore>);

impl InterfaceStore for SharedStore {
    fn locate(&self, name: Atom) -> Option<std::path::PathBuf> {
        self.0.locate(name)
    }

    fn read(&self, filename: &std::path::Path) -> Result<Rc<intf::Interface>, intf::StoreError> {
        self.0.read(filename)
    }

    fn write(
        &self,
        filename: &std::path::Path,
        unit_name: Atom,
        signature: &Rc<Signature>,
        dependencies: &[(Atom, Option<u64>)],
        flags: intf::Flags,
    ) -> Result<u64, intf::StoreError> {
        self.0
            .write(filename, unit_name, signature, dependencies, flags)
    }
}

fn shared_session(store: &SharedStore) -> Session {
    Session::new(
        Box::new(store.clone()),
        Reporter::silent(),
        Config::default(),
        atom("Test"),
    )
}

#[test]
fn shadowing_is_additive_and_most_recent_wins() {
    let session = Session::test();
    let first_descr = value(ty("a"));
    let second_descr = value(ty("b"));

    let (first, env) = Environment::empty()
        .enter_value(&session, atom("x"), Rc::clone(&first_descr), None)
        .unwrap();
    let (_, env) = env
        .enter_value(&session, atom("x"), Rc::clone(&second_descr), None)
        .unwrap();

    let (_, by_name) = env
        .look_up_value(&session, &NamePath::Name(atom("x")), Span::default())
        .unwrap();
    assert!(Rc::ptr_eq(&by_name, &second_descr));

    // The identifier captured before the shadowing add still resolves to the
    // original declaration.
    let by_identity = env.find_value(&session, &Path::Ident(first)).unwrap();
    assert!(Rc::ptr_eq(&by_identity, &first_descr));
}

#[test]
fn adding_a_binding_never_alters_the_source_environment() {
    let session = Session::test();

    let (_, env1) = Environment::empty()
        .enter_value(&session, atom("x"), value(ty("a")), None)
        .unwrap();
    let (_, env2) = env1
        .enter_value(&session, atom("y"), value(ty("b")), None)
        .unwrap();

    assert!(
        env1.look_up_value(&session, &NamePath::Name(atom("y")), Span::default())
            .unwrap_err()
            .is_not_found()
    );
    env1.look_up_value(&session, &NamePath::Name(atom("x")), Span::default())
        .unwrap();
    env2.look_up_value(&session, &NamePath::Name(atom("y")), Span::default())
        .unwrap();
}

#[test]
fn components_are_built_once_per_module_type() {
    let session = Session::test();

    let (m, env) = Environment::empty()
        .enter_module(
            &session,
            atom("M"),
            structure(vec![SigItem::Value(
                Ident::fresh(atom("x")),
                value(ty("a")),
            )]),
            None,
        )
        .unwrap();
    let path = Path::Ident(m);

    let first = env.find_structure_components(&session, &path).unwrap();
    let builds = session.stats.component_builds();
    let second = env.find_structure_components(&session, &path).unwrap();

    assert!(Rc::ptr_eq(&first, &second));
    assert_eq!(session.stats.component_builds(), builds);
    assert_eq!(builds, 1);
}

#[test]
fn alias_chains_normalize_transitively() {
    let session = Session::test();
    let env = Environment::empty();

    let (c, env) = env
        .enter_module(&session, atom("C"), structure(Vec::new()), None)
        .unwrap();
    let (b, env) = env
        .enter_module(&session, atom("B"), alias(Path::Ident(c)), None)
        .unwrap();
    let (a, env) = env
        .enter_module(&session, atom("A"), alias(Path::Ident(b)), None)
        .unwrap();

    let normalized = env
        .normalize_path(&session, false, None, &Path::Ident(a))
        .unwrap();
    assert_eq!(normalized, Path::Ident(c));
}

#[test]
fn alias_cycles_terminate() {
    let session = Session::test();
    let a = Ident::fresh(atom("A"));
    let b = Ident::fresh(atom("B"));

    let env = Environment::empty()
        .add_module(&session, a, alias(Path::Ident(b)), None)
        .add_module(&session, b, alias(Path::Ident(a)), None);

    let strict = env.normalize_path(&session, false, None, &Path::Ident(a));
    assert!(matches!(strict, Err(EnvError::Dangling { .. })));

    // Lax mode settles for the last successfully resolved path.
    env.normalize_path(&session, true, None, &Path::Ident(a))
        .unwrap();
}

#[test]
fn disagreeing_imports_are_a_fatal_inconsistency() {
    let store = SharedStore(Rc::new(MemoryStore::new()));
    let empty = Rc::new(Vec::new());

    store
        .write(
            std::path::Path::new("x.orni"),
            atom("X"),
            &empty,
            &[(atom("Y"), Some(1))],
            intf::Flags::default(),
        )
        .unwrap();
    store
        .write(
            std::path::Path::new("z.orni"),
            atom("Z"),
            &empty,
            &[(atom("Y"), Some(2))],
            intf::Flags::default(),
        )
        .unwrap();

    let session = shared_session(&store);
    let env = Environment::empty();

    env.look_up_module(&session, &NamePath::Name(atom("X")), Span::default())
        .unwrap();

    let conflict = env
        .look_up_module(&session, &NamePath::Name(atom("Z")), Span::default())
        .unwrap_err();

    match conflict {
        EnvError::InconsistentImport {
            unit,
            source1,
            source2,
        } => {
            assert_eq!(unit, atom("Y"));
            assert_eq!(source1, std::path::PathBuf::from("x.orni"));
            assert_eq!(source2, std::path::PathBuf::from("z.orni"));
        }
        other => panic!("expected an inconsistent import, got {other:?}"),
    }
}

#[test]
fn agreeing_imports_load_silently() {
    let store = SharedStore(Rc::new(MemoryStore::new()));
    let empty = Rc::new(Vec::new());

    let y_hash = store
        .write(
            std::path::Path::new("y.orni"),
            atom("Y"),
            &empty,
            &[],
            intf::Flags::default(),
        )
        .unwrap();
    store
        .write(
            std::path::Path::new("x.orni"),
            atom("X"),
            &empty,
            &[(atom("Y"), Some(y_hash))],
            intf::Flags::default(),
        )
        .unwrap();

    let session = shared_session(&store);
    let env = Environment::empty();

    env.look_up_module(&session, &NamePath::Name(atom("X")), Span::default())
        .unwrap();
    env.look_up_module(&session, &NamePath::Name(atom("Y")), Span::default())
        .unwrap();
}

#[test]
fn functor_applications_are_cached_per_argument() {
    let session = Session::test();
    let env = Environment::empty();

    let param_sig = || {
        Rc::new(ModuleType::Signature(Rc::new(vec![SigItem::Type(
            Ident::fresh(atom("t")),
            Rc::new(TypeDecl::abstract_(Vec::new())),
        )])))
    };

    let (f, env) = env
        .enter_module(
            &session,
            atom("F"),
            Rc::new(ModuleDecl::new(Rc::new(ModuleType::Functor {
                param: Ident::fresh(atom("X")),
                param_ty: Some(param_sig()),
                result: ModuleType::signature(Vec::new()),
            }))),
            None,
        )
        .unwrap();
    let (ord1, env) = env
        .enter_module(
            &session,
            atom("Ord1"),
            structure(vec![SigItem::Type(
                Ident::fresh(atom("t")),
                Rc::new(TypeDecl::abstract_(Vec::new())),
            )]),
            None,
        )
        .unwrap();
    let (ord2, env) = env
        .enter_module(
            &session,
            atom("Ord2"),
            structure(vec![SigItem::Type(
                Ident::fresh(atom("t")),
                Rc::new(TypeDecl::abstract_(Vec::new())),
            )]),
            None,
        )
        .unwrap();

    let apply1 = Path::Ident(f).apply(Path::Ident(ord1));
    let apply2 = Path::Ident(f).apply(Path::Ident(ord2));

    let first = env.find_structure_components(&session, &apply1).unwrap();
    let again = env.find_structure_components(&session, &apply1).unwrap();
    let other = env.find_structure_components(&session, &apply2).unwrap();

    assert!(Rc::ptr_eq(&first, &again));
    assert!(!Rc::ptr_eq(&first, &other));
}

#[test]
fn rejected_functor_arguments_are_a_resolution_error() {
    let session = {
        let mut session = Session::test();
        session.hooks.check_inclusion = Box::new(|_, _, _, _| Err("missing member ‘t’".into()));
        session
    };
    let env = Environment::empty();

    let (f, env) = env
        .enter_module(
            &session,
            atom("F"),
            Rc::new(ModuleDecl::new(Rc::new(ModuleType::Functor {
                param: Ident::fresh(atom("X")),
                param_ty: Some(ModuleType::signature(Vec::new())),
                result: ModuleType::signature(Vec::new()),
            }))),
            None,
        )
        .unwrap();
    let (arg, env) = env
        .enter_module(&session, atom("Arg"), structure(Vec::new()), None)
        .unwrap();

    let result =
        env.find_structure_components(&session, &Path::Ident(f).apply(Path::Ident(arg)));
    assert!(matches!(result, Err(EnvError::InclusionMismatch { .. })));
}

#[test]
fn interfaces_round_trip_through_the_store() {
    let store = SharedStore(Rc::new(MemoryStore::new()));

    let t = Ident::fresh(atom("t"));
    let t_ty = TypeExpr::Constr(Path::Ident(t), Vec::new());
    let signature = Rc::new(vec![
        SigItem::Type(t, Rc::new(TypeDecl::abstract_(Vec::new()))),
        SigItem::Value(Ident::fresh(atom("zero")), value(t_ty.clone())),
        SigItem::Module(
            Ident::fresh(atom("Sub")),
            Rc::new(ModuleDecl::new(ModuleType::signature(vec![SigItem::Value(
                Ident::fresh(atom("x")),
                value(t_ty),
            )]))),
        ),
    ]);

    store
        .write(
            std::path::Path::new("dep.orni"),
            atom("Dep"),
            &signature,
            &[],
            intf::Flags::default(),
        )
        .unwrap();

    let session = shared_session(&store);
    let env = Environment::empty();

    let (path, _) = env
        .look_up_module(&session, &NamePath::Name(atom("Dep")), Span::default())
        .unwrap();
    let comps = env.find_structure_components(&session, &path).unwrap();
    let comps = comps.as_structure().unwrap();

    assert!(comps.types.contains_key(&atom("t")));
    assert!(comps.values.contains_key(&atom("zero")));
    assert!(comps.modules.contains_key(&atom("Sub")));

    env.look_up_value(
        &session,
        &NamePath::from_dotted("Dep.Sub.x"),
        Span::default(),
    )
    .unwrap();
}

#[test]
fn failed_unit_lookups_leave_a_deterministic_import_and_a_missing_marker() {
    let store = SharedStore(Rc::new(MemoryStore::new()));
    let session = shared_session(&store);
    let env = Environment::empty();

    let error = env
        .look_up_module(&session, &NamePath::Name(atom("Ghost")), Span::default())
        .unwrap_err();
    assert!(error.is_not_found());
    assert_eq!(session.imports(), vec![(atom("Ghost"), None)]);

    // The unit appears on disk later: the missing marker hides it until the
    // partial reset forgets missing files while keeping resolved entries.
    store
        .write(
            std::path::Path::new("ghost.orni"),
            atom("Ghost"),
            &Rc::new(Vec::new()),
            &[],
            intf::Flags::default(),
        )
        .unwrap();

    assert!(
        env.look_up_module(&session, &NamePath::Name(atom("Ghost")), Span::default())
            .unwrap_err()
            .is_not_found()
    );

    session.reset_missing_interfaces();
    env.look_up_module(&session, &NamePath::Name(atom("Ghost")), Span::default())
        .unwrap();
}

#[test]
fn importing_a_rec_types_unit_requires_the_capability() {
    let store = SharedStore(Rc::new(MemoryStore::new()));
    store
        .write(
            std::path::Path::new("cyclic.orni"),
            atom("Cyclic"),
            &Rc::new(Vec::new()),
            &[],
            intf::Flags { rec_types: true },
        )
        .unwrap();

    let session = shared_session(&store);
    let result = Environment::empty().look_up_module(
        &session,
        &NamePath::Name(atom("Cyclic")),
        Span::default(),
    );
    assert!(matches!(result, Err(EnvError::NeedsRecTypes { .. })));

    let mut session = shared_session(&store);
    session.config.rec_types = true;
    Environment::empty()
        .look_up_module(&session, &NamePath::Name(atom("Cyclic")), Span::default())
        .unwrap();
}

#[test]
fn a_renamed_interface_is_rejected() {
    struct Renaming(SharedStore);

    impl InterfaceStore for Renaming {
        fn locate(&self, _: Atom) -> Option<std::path::PathBuf> {
            // Whatever the requested unit, serve the one file we have.
            Some("other.orni".into())
        }

        fn read(
            &self,
            filename: &std::path::Path,
        ) -> Result<Rc<intf::Interface>, intf::StoreError> {
            self.0.read(filename)
        }

        fn write(
            &self,
            filename: &std::path::Path,
            unit_name: Atom,
            signature: &Rc<Signature>,
            dependencies: &[(Atom, Option<u64>)],
            flags: intf::Flags,
        ) -> Result<u64, intf::StoreError> {
            self.0.write(filename, unit_name, signature, dependencies, flags)
        }
    }

    let store = SharedStore(Rc::new(MemoryStore::new()));
    store
        .write(
            std::path::Path::new("other.orni"),
            atom("Other"),
            &Rc::new(Vec::new()),
            &[],
            intf::Flags::default(),
        )
        .unwrap();

    let session = Session::new(
        Box::new(Renaming(store)),
        Reporter::silent(),
        Config::default(),
        atom("Test"),
    );

    let result = Environment::empty().look_up_module(
        &session,
        &NamePath::Name(atom("Expected")),
        Span::default(),
    );

    match result {
        Err(EnvError::IllegalRenaming { requested, found, .. }) => {
            assert_eq!(requested, atom("Expected"));
            assert_eq!(found, atom("Other"));
        }
        other => panic!("expected an illegal renaming, got {other:?}"),
    }
}

#[test]
fn usage_callbacks_fire_on_lookup_and_roll_back_with_their_transaction() {
    let session = Session::test();
    let loc = Span::new(5, 6);
    let key = UsageKey::Name {
        name: atom("x"),
        loc,
    };

    let (_, env) = Environment::empty()
        .enter_value(&session, atom("x"), value(ty("a")), Some(loc))
        .unwrap();

    let count = Rc::new(Cell::new(0));
    let observed = Rc::clone(&count);
    session.register_use(key, move |_| observed.set(observed.get() + 1));

    env.look_up_value(&session, &NamePath::Name(atom("x")), Span::default())
        .unwrap();
    env.look_up_value(&session, &NamePath::Name(atom("x")), Span::default())
        .unwrap();
    assert!(count.get() >= 1);

    // A registration made inside an aborted transaction must never observe
    // a later use.
    let rolled_back = Rc::new(Cell::new(0));
    let loc = Span::new(9, 10);
    let key = UsageKey::Name {
        name: atom("y"),
        loc,
    };
    let (_, env) = env
        .enter_value(&session, atom("y"), value(ty("b")), Some(loc))
        .unwrap();

    session.begin_transaction();
    let observed = Rc::clone(&rolled_back);
    session.register_use(key, move |_| observed.set(observed.get() + 1));
    session.abort_transaction();

    env.look_up_value(&session, &NamePath::Name(atom("y")), Span::default())
        .unwrap();
    assert_eq!(rolled_back.get(), 0);
}

#[test]
fn opening_a_module_exposes_its_members_unqualified() {
    let session = Session::test();
    let env = Environment::initial_safe_string(&session);

    let (int_path, _) = env
        .look_up_type(&session, &NamePath::Name(atom("int")), Span::default())
        .unwrap();
    let int = TypeExpr::Constr(int_path, Vec::new());

    let (m, env) = env
        .enter_module(
            &session,
            atom("M"),
            structure(vec![SigItem::Value(
                Ident::fresh(atom("x")),
                value(int),
            )]),
            None,
        )
        .unwrap();
    let m_path = Path::Ident(m);

    let qualified = env
        .find_value(&session, &m_path.clone().dot(atom("x")))
        .unwrap();

    assert!(
        env.find_value(&session, &m_path.clone().dot(atom("y")))
            .unwrap_err()
            .is_not_found()
    );

    let env = env.open_signature(&session, &m_path, None).unwrap();
    let (bare_path, bare) = env
        .look_up_value(&session, &NamePath::Name(atom("x")), Span::default())
        .unwrap();

    assert_eq!(bare_path, m_path.dot(atom("x")));
    assert!(Rc::ptr_eq(&bare, &qualified));
}

#[test]
fn opens_report_shadowed_names_on_use() {
    let session = Session::test();

    let (_, env) = Environment::empty()
        .enter_value(&session, atom("x"), value(ty("a")), None)
        .unwrap();
    let (m, env) = env
        .enter_module(
            &session,
            atom("M"),
            structure(vec![SigItem::Value(
                Ident::fresh(atom("x")),
                value(ty("b")),
            )]),
            None,
        )
        .unwrap();

    let shadowed: Rc<Cell<Option<(&'static str, Atom)>>> = Rc::new(Cell::new(None));
    let observed = Rc::clone(&shadowed);
    let env = env
        .open_signature(
            &session,
            &Path::Ident(m),
            Some(Rc::new(move |kind, name| observed.set(Some((kind, name))))),
        )
        .unwrap();

    assert_eq!(shadowed.get(), None);

    env.look_up_value(&session, &NamePath::Name(atom("x")), Span::default())
        .unwrap();
    assert_eq!(shadowed.get(), Some(("value", atom("x"))));
}

#[test]
fn reduced_environments_rebuild_from_the_trail_alone() {
    let session = Session::test();

    let (_, env) = Environment::empty()
        .enter_value(&session, atom("x"), value(ty("a")), None)
        .unwrap();
    let (m, env) = env
        .enter_module(
            &session,
            atom("M"),
            structure(vec![SigItem::Value(
                Ident::fresh(atom("y")),
                value(ty("b")),
            )]),
            None,
        )
        .unwrap();
    let env = env.open_signature(&session, &Path::Ident(m), None).unwrap();

    let reduced = env.keep_only_summary(&session).unwrap();

    assert_eq!(reduced.summary(), env.summary());
    reduced
        .look_up_value(&session, &NamePath::Name(atom("x")), Span::default())
        .unwrap();
    reduced
        .look_up_value(&session, &NamePath::Name(atom("y")), Span::default())
        .unwrap();

    // The last-seen pair is memoized.
    let again = env.keep_only_summary(&session).unwrap();
    assert_eq!(again.summary(), reduced.summary());
}

#[test]
fn diff_lists_the_locally_introduced_bindings() {
    let session = Session::test();

    let (x, base) = Environment::empty()
        .enter_value(&session, atom("x"), value(ty("a")), None)
        .unwrap();
    let (y, env) = base
        .enter_value(&session, atom("y"), value(ty("b")), None)
        .unwrap();
    let (z, env) = env
        .enter_value(&session, atom("z"), value(ty("c")), None)
        .unwrap();

    let introduced = env.diff(&session, &base);

    assert_eq!(introduced, vec![z, y]);
    assert!(!introduced.contains(&x));
}

#[test]
fn aliases_into_other_units_record_required_globals() {
    let store = SharedStore(Rc::new(MemoryStore::new()));
    store
        .write(
            std::path::Path::new("dep.orni"),
            atom("Dep"),
            &Rc::new(Vec::new()),
            &[],
            intf::Flags::default(),
        )
        .unwrap();

    let session = shared_session(&store);
    let dep = Ident::persistent(atom("Dep"));

    let (a, env) = Environment::empty()
        .enter_module(&session, atom("A"), alias(Path::Ident(dep)), None)
        .unwrap();

    let normalized = env
        .normalize_path(&session, false, None, &Path::Ident(a))
        .unwrap();

    assert_eq!(normalized, Path::Ident(dep));
    assert_eq!(session.required_globals(), vec![dep]);

    // Lax normalization must not grow the link-time dependency list.
    session.reset_caches();
    env.normalize_path(&session, true, None, &Path::Ident(a))
        .unwrap();
    assert_eq!(session.required_globals(), Vec::new());
}

#[test]
fn reserved_marker_names_are_rejected_at_declaration() {
    let session = Session::test();

    let result = Environment::empty().enter_value(&session, atom("x#1"), value(ty("a")), None);
    assert!(matches!(result, Err(EnvError::IllegalIdent { .. })));
}

#[test]
fn constructors_of_local_types_resolve_by_name() {
    let session = Session::test();

    let (_, env) = Environment::empty()
        .enter_type(
            &session,
            atom("color"),
            Rc::new(TypeDecl::variant(
                Vec::new(),
                vec![
                    hir::CtorDef {
                        name: atom("Red"),
                        args: Vec::new(),
                    },
                    hir::CtorDef {
                        name: atom("Green"),
                        args: Vec::new(),
                    },
                ],
            )),
            None,
        )
        .unwrap();

    let red = env
        .look_up_ctor(
            &session,
            &NamePath::Name(atom("Red")),
            Span::default(),
            UsageKind::Reference,
        )
        .unwrap();
    assert_eq!(red.tag, hir::CtorTag::Regular(0));

    let all = env.look_up_all_ctors(&session, atom("Green"), UsageKind::Pattern);
    assert_eq!(all.len(), 1);
    assert_eq!(all[0].tag, hir::CtorTag::Regular(1));
}

#[test]
fn the_initial_environment_exposes_the_seed() {
    let session = Session::test();

    let safe = Environment::initial_safe_string(&session);
    safe.look_up_type(&session, &NamePath::Name(atom("int")), Span::default())
        .unwrap();
    safe.look_up_ctor(
        &session,
        &NamePath::Name(atom("Some")),
        Span::default(),
        UsageKind::Reference,
    )
    .unwrap();
    assert!(
        safe.look_up_value(&session, &NamePath::Name(atom("string_set")), Span::default())
            .unwrap_err()
            .is_not_found()
    );

    let unsafe_ = Environment::initial_unsafe_string(&session);
    unsafe_
        .look_up_value(&session, &NamePath::Name(atom("string_set")), Span::default())
        .unwrap();
}

#[test]
fn primitive_values_do_not_occupy_runtime_slots() {
    let session = Session::test();

    let items = vec![
        SigItem::Value(
            Ident::fresh(atom("length")),
            Rc::new(ValueDescr::primitive(ty("a"), atom("%length"), 1)),
        ),
        SigItem::Value(Ident::fresh(atom("first")), value(ty("b"))),
        SigItem::Type(
            Ident::fresh(atom("t")),
            Rc::new(TypeDecl::abstract_(Vec::new())),
        ),
        SigItem::Value(Ident::fresh(atom("second")), value(ty("c"))),
    ];

    let (m, env) = Environment::empty()
        .enter_module(&session, atom("M"), structure(items), None)
        .unwrap();

    let comps = env
        .find_structure_components(&session, &Path::Ident(m))
        .unwrap();
    let comps = comps.as_structure().unwrap();

    assert_eq!(comps.values[&atom("length")].1, None);
    assert_eq!(comps.values[&atom("first")].1, Some(0));
    assert_eq!(comps.values[&atom("second")].1, Some(1));
}

#[test]
fn type_members_are_variant_bodies_with_their_ctors() {
    let session = Session::test();

    let (m, env) = Environment::empty()
        .enter_module(
            &session,
            atom("M"),
            structure(vec![SigItem::Type(
                Ident::fresh(atom("t")),
                Rc::new(TypeDecl::variant(
                    Vec::new(),
                    vec![hir::CtorDef {
                        name: atom("Leaf"),
                        args: Vec::new(),
                    }],
                )),
            )]),
            None,
        )
        .unwrap();

    let leaf = env
        .look_up_ctor(
            &session,
            &NamePath::from_dotted("M.Leaf"),
            Span::default(),
            UsageKind::Reference,
        )
        .unwrap();

    // The derived constructor's owner is the member's absolute path.
    assert_eq!(leaf.owner, Path::Ident(m).dot(atom("t")));

    let decl = env
        .find_type(&session, &Path::Ident(m).dot(atom("t")))
        .unwrap();
    assert!(matches!(decl.body, TypeBody::Variant(_)));
}
