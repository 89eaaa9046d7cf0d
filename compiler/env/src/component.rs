//! Lazily expanded module components.
//!
//! A component is the expansion of a module type into either a structure
//! (per-namespace member tables with runtime positions) or a functor
//! descriptor. Expansion is deferred behind a compute-once cell and memoized
//! per module-type value, so identical signatures are never rebuilt and large
//! dependency graphs are not eagerly elaborated.

use crate::{
    EnvError, Environment, Namespace, NotFound, Session,
    lazy::ComputeOnce,
    prefix::{self, PrefixedItem},
    summary::SummaryIdx,
};
use hir::{
    ClassDecl, ClassTypeDecl, CtorDescr, CtorTag, Ident, LabelDescr, ModuleDecl, ModuleType,
    ModuleTypeDecl, Path, SigItem, Subst, TypeDecl, ValueDescr,
};
use std::{cell::RefCell, collections::HashSet, rc::Rc};
use utility::{Atom, HashMap};

pub enum Component {
    Structure(StructureComps),
    Functor(FunctorComps),
}

impl Component {
    pub fn as_structure(&self) -> Option<&StructureComps> {
        utility::obtain!(self, Self::Structure(comps) => comps)
    }

    pub fn as_functor(&self) -> Option<&FunctorComps> {
        utility::obtain!(self, Self::Functor(comps) => comps)
    }
}

/// The member tables of a structure.
///
/// Members that occupy a slot in the runtime layout carry their insertion
/// position; type-level members do not.
#[derive(Default)]
pub struct StructureComps {
    pub values: HashMap<Atom, (Rc<ValueDescr>, Option<u32>)>,
    /// Constructors derived from variant members (no position) and extension
    /// constructors (with their slot).
    pub ctors: HashMap<Atom, (Rc<CtorDescr>, Option<u32>)>,
    pub labels: HashMap<Atom, Rc<LabelDescr>>,
    pub types: HashMap<Atom, Rc<TypeDecl>>,
    pub modules: HashMap<Atom, ModuleComp>,
    pub module_types: HashMap<Atom, Rc<ModuleTypeDecl>>,
    pub classes: HashMap<Atom, (Rc<ClassDecl>, u32)>,
    pub class_types: HashMap<Atom, Rc<ClassTypeDecl>>,
}

pub struct ModuleComp {
    pub decl: Rc<ModuleDecl>,
    pub pos: u32,
    pub(crate) comps: Rc<ComponentCell>,
}

/// A functor, ready to be applied.
pub struct FunctorComps {
    pub param: Ident,
    /// `None` for a generative functor.
    pub param_ty: Option<Rc<ModuleType>>,
    /// The result module type, not yet instantiated for any argument.
    pub result: Rc<ModuleType>,
    /// The environment the result makes sense in.
    pub env: Environment,
    pub subst: Subst,
    /// Instantiated components, by concrete argument path.
    comps_cache: RefCell<HashMap<Path, Rc<ComponentCell>>>,
    /// Instantiated result module types, by concrete argument path.
    result_cache: RefCell<HashMap<Path, Rc<ModuleType>>>,
}

pub(crate) type ComponentCell = ComputeOnce<Thunk, Rc<Component>, EnvError>;

/// The captured inputs of a deferred expansion.
pub(crate) struct Thunk {
    env: Environment,
    subst: Subst,
    path: Path,
    mty: Rc<ModuleType>,
}

#[derive(PartialEq, Eq, Hash)]
pub(crate) struct CompKey {
    mty: usize,
    path: Path,
    summary: Option<SummaryIdx>,
}

/// Obtain the (possibly still unforced) component cell for a module type.
///
/// Memoized by the module-type value being built, not by name.
pub(crate) fn components_of(
    session: &Session,
    env: &Environment,
    subst: &Subst,
    path: &Path,
    mty: &Rc<ModuleType>,
) -> Rc<ComponentCell> {
    let key = CompKey {
        mty: Rc::as_ptr(mty) as usize,
        path: path.clone(),
        summary: env.summary(),
    };

    if let Some(cell) = session.components.borrow().get(&key) {
        return Rc::clone(cell);
    }

    let cell = Rc::new(ComputeOnce::new(Thunk {
        env: env.clone(),
        subst: subst.clone(),
        path: path.clone(),
        mty: Rc::clone(mty),
    }));
    session.components.borrow_mut().insert(key, Rc::clone(&cell));

    cell
}

/// Force a component cell. Re-forcing returns the cached expansion, or
/// re-surfaces the cached failure.
pub(crate) fn force(
    session: &Session,
    path: &Path,
    cell: &ComponentCell,
) -> Result<Rc<Component>, EnvError> {
    cell.force(
        |thunk| build(session, thunk),
        || EnvError::Dangling {
            original: path.clone(),
            furthest: path.clone(),
        },
    )
}

fn build(session: &Session, thunk: Thunk) -> Result<Rc<Component>, EnvError> {
    session.stats.bump_component_builds();

    let scraped = scrape(session, &thunk.env, Rc::clone(&thunk.mty), &thunk.path)?;

    match &*scraped {
        ModuleType::Signature(signature) => {
            let prefixing = prefix::prefix_signature(session, &thunk.path, &thunk.subst, signature);
            let sub = &prefixing.subst;
            let mut comps = StructureComps::default();

            for PrefixedItem { item, path, pos } in &prefixing.items {
                let name = item.ident().name();

                match item {
                    SigItem::Value(_, descr) => {
                        comps
                            .values
                            .insert(name, (Rc::new(sub.value_descr(descr)), *pos));
                    }
                    SigItem::Type(_, decl) => {
                        let decl = Rc::new(sub.type_decl(decl));

                        for ctor in hir::ctors_of(path, &decl) {
                            comps.ctors.insert(ctor.name, (ctor, None));
                        }
                        for label in hir::labels_of(path, &decl) {
                            comps.labels.insert(label.name, label);
                        }

                        comps.types.insert(name, decl);
                    }
                    SigItem::Extension(_, def) => {
                        let def = sub.extension_def(def);
                        let descr = Rc::new(CtorDescr {
                            name,
                            owner: def.owner.clone(),
                            arity: def.args.len(),
                            args: def.args,
                            tag: CtorTag::Extension,
                        });
                        comps.ctors.insert(name, (descr, *pos));
                    }
                    SigItem::Module(_, decl) => {
                        let decl = Rc::new(sub.module_decl(decl));
                        // Declare the nested expansion eagerly, expand it lazily.
                        let cell = components_of(session, &thunk.env, sub, path, &decl.ty);

                        comps.modules.insert(
                            name,
                            ModuleComp {
                                decl,
                                pos: pos.expect("module member without a position"),
                                comps: cell,
                            },
                        );
                    }
                    SigItem::ModuleType(_, decl) => {
                        comps
                            .module_types
                            .insert(name, Rc::new(sub.module_type_decl(decl)));
                    }
                    SigItem::Class(_, decl) => {
                        comps.classes.insert(
                            name,
                            (
                                Rc::new(sub.class_decl(decl)),
                                pos.expect("class member without a position"),
                            ),
                        );
                    }
                    SigItem::ClassType(_, decl) => {
                        comps
                            .class_types
                            .insert(name, Rc::new(sub.class_type_decl(decl)));
                    }
                }
            }

            Ok(Rc::new(Component::Structure(comps)))
        }
        ModuleType::Functor {
            param,
            param_ty,
            result,
        } => Ok(Rc::new(Component::Functor(FunctorComps {
            param: *param,
            param_ty: param_ty.as_ref().map(|ty| thunk.subst.module_type(ty)),
            result: Rc::clone(result),
            subst: thunk.subst.clone(),
            env: thunk.env,
            comps_cache: RefCell::default(),
            result_cache: RefCell::default(),
        }))),
        // scrape only ever returns a signature or a functor
        ModuleType::Ident(_) | ModuleType::Alias(_) => unreachable!(),
    }
}

/// Expand module-type references and aliases until a signature or functor
/// emerges.
///
/// A module type reached through a concrete path is strengthened against that
/// path so its abstract members become concrete.
pub(crate) fn scrape(
    session: &Session,
    env: &Environment,
    mty: Rc<ModuleType>,
    path: &Path,
) -> Result<Rc<ModuleType>, EnvError> {
    let mut seen: HashSet<Path> = HashSet::new();
    let mut current = mty;

    loop {
        let (target, is_module_type_ref) = match &*current {
            ModuleType::Signature(_) | ModuleType::Functor { .. } => break Ok(current),
            ModuleType::Ident(target) => (target.clone(), true),
            ModuleType::Alias(target) => (target.clone(), false),
        };

        if !seen.insert(target.clone()) {
            break Err(EnvError::Dangling {
                original: path.clone(),
                furthest: target,
            });
        }

        current = if is_module_type_ref {
            let decl = env.find_module_type_decl(session, &target)?;
            match &decl.body {
                Some(body) => Rc::clone(body),
                None => break Err(EnvError::NotFound(NotFound::Abstract { path: target })),
            }
        } else {
            let decl = env.find_module(session, &target)?;
            (session.hooks.strengthen)(env, Rc::clone(&decl.ty), &target)
        };
    }
}

/// Apply a functor to a concrete argument path.
///
/// Keyed by argument path in the functor's application cache; the inclusion
/// check runs before anything is instantiated.
pub(crate) fn apply_functor(
    session: &Session,
    functor_path: &Path,
    functor: &FunctorComps,
    arg_path: &Path,
    arg_ty: &Rc<ModuleType>,
) -> Result<Rc<Component>, EnvError> {
    let applied_path = functor_path.clone().apply(arg_path.clone());

    let cached = functor.comps_cache.borrow().get(arg_path).cloned();
    if let Some(cell) = cached {
        return force(session, &applied_path, &cell);
    }

    if let Some(param_ty) = &functor.param_ty {
        (session.hooks.check_inclusion)(&functor.env, arg_ty, arg_path, param_ty).map_err(
            |reason| EnvError::InclusionMismatch {
                functor: functor_path.clone(),
                argument: arg_path.clone(),
                reason,
            },
        )?;
    }

    let (result_ty, subst) = instantiated_result(functor, arg_path);

    let cell = Rc::new(ComputeOnce::new(Thunk {
        env: functor.env.clone(),
        subst,
        path: applied_path.clone(),
        mty: result_ty,
    }));
    functor
        .comps_cache
        .borrow_mut()
        .insert(arg_path.clone(), Rc::clone(&cell));

    force(session, &applied_path, &cell)
}

/// The functor's result module type instantiated for an argument, memoized
/// by argument path.
pub(crate) fn instantiated_result(
    functor: &FunctorComps,
    arg_path: &Path,
) -> (Rc<ModuleType>, Subst) {
    let mut subst = functor.subst.clone();
    subst.add_module(functor.param, arg_path.clone());

    let cached = functor.result_cache.borrow().get(arg_path).cloned();
    let result = match cached {
        Some(result) => result,
        None => {
            let result = subst.module_type(&functor.result);
            functor
                .result_cache
                .borrow_mut()
                .insert(arg_path.clone(), Rc::clone(&result));
            result
        }
    };

    (result, subst)
}

/// Look up a structure member namespace by name, with a uniform error.
pub(crate) fn member_not_found(path: &Path, namespace: Namespace, member: Atom) -> EnvError {
    EnvError::NotFound(NotFound::Member {
        path: path.clone(),
        namespace,
        member,
    })
}
