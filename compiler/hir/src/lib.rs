//! The typed representation of the module language.
//!
//! This crate defines the vocabulary the environment machinery operates on:
//! identifiers, qualified paths, substitutions, per-namespace declarations,
//! module types and signatures. It knows nothing about scoping or caching —
//! that lives in the `env` crate.

use joinery::JoinableIterator;
use std::{fmt, rc::Rc};
use utility::Atom;

pub use ident::{Ident, RESERVED_MARKER};
pub use path::{NamePath, Path};
pub use subst::Subst;

mod ident;
mod path;
mod subst;

/// A type expression.
///
/// Deliberately small: just enough structure for substitution to be observable
/// and for constructors and labels to be derived from type definitions.
/// Unification and inference are external to this subsystem.
#[derive(Clone, PartialEq, Eq)]
pub enum TypeExpr {
    Var(Atom),
    Arrow(Box<TypeExpr>, Box<TypeExpr>),
    Tuple(Vec<TypeExpr>),
    Constr(Path, Vec<TypeExpr>),
}

impl TypeExpr {
    pub fn constr(path: Path, arguments: Vec<TypeExpr>) -> Self {
        Self::Constr(path, arguments)
    }

    pub fn arrow(domain: TypeExpr, codomain: TypeExpr) -> Self {
        Self::Arrow(Box::new(domain), Box::new(codomain))
    }
}

impl fmt::Display for TypeExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Var(name) => write!(f, "'{name}"),
            Self::Arrow(domain, codomain) => write!(f, "{domain} -> {codomain}"),
            Self::Tuple(elements) => write!(f, "{}", elements.iter().join_with(" * ")),
            Self::Constr(path, arguments) => match &arguments[..] {
                [] => write!(f, "{path}"),
                [argument] => write!(f, "{argument} {path}"),
                arguments => write!(f, "({}) {path}", arguments.iter().join_with(", ")),
            },
        }
    }
}

impl fmt::Debug for TypeExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self}")
    }
}

/// The description of a bound value.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct ValueDescr {
    pub ty: TypeExpr,
    pub kind: ValueKind,
}

#[derive(Clone, PartialEq, Eq, Debug)]
pub enum ValueKind {
    Regular,
    /// A value implemented by the runtime rather than by compiled code.
    ///
    /// Primitive values do not occupy a slot in the runtime layout of a structure.
    Primitive { name: Atom, arity: usize },
}

impl ValueDescr {
    pub fn regular(ty: TypeExpr) -> Self {
        Self {
            ty,
            kind: ValueKind::Regular,
        }
    }

    pub fn primitive(ty: TypeExpr, name: Atom, arity: usize) -> Self {
        Self {
            ty,
            kind: ValueKind::Primitive { name, arity },
        }
    }

    pub fn is_primitive(&self) -> bool {
        matches!(self.kind, ValueKind::Primitive { .. })
    }
}

/// A type definition.
#[derive(Clone, PartialEq, Eq)]
pub struct TypeDecl {
    pub params: Vec<Atom>,
    /// The equation making the type an abbreviation, if any.
    pub manifest: Option<TypeExpr>,
    pub body: TypeBody,
}

#[derive(Clone, PartialEq, Eq)]
pub enum TypeBody {
    Abstract,
    Variant(Vec<CtorDef>),
    Record(Vec<LabelDef>),
}

impl TypeDecl {
    pub fn abstract_(params: Vec<Atom>) -> Self {
        Self {
            params,
            manifest: None,
            body: TypeBody::Abstract,
        }
    }

    pub fn abbreviation(params: Vec<Atom>, manifest: TypeExpr) -> Self {
        Self {
            params,
            manifest: Some(manifest),
            body: TypeBody::Abstract,
        }
    }

    pub fn variant(params: Vec<Atom>, ctors: Vec<CtorDef>) -> Self {
        Self {
            params,
            manifest: None,
            body: TypeBody::Variant(ctors),
        }
    }

    pub fn record(params: Vec<Atom>, labels: Vec<LabelDef>) -> Self {
        Self {
            params,
            manifest: None,
            body: TypeBody::Record(labels),
        }
    }
}

/// A constructor inside a [variant body](TypeBody::Variant).
#[derive(Clone, PartialEq, Eq)]
pub struct CtorDef {
    pub name: Atom,
    pub args: Vec<TypeExpr>,
}

/// A label inside a [record body](TypeBody::Record).
#[derive(Clone, PartialEq, Eq)]
pub struct LabelDef {
    pub name: Atom,
    pub mutable: bool,
    pub ty: TypeExpr,
}

/// An extension constructor: a constructor added to an extensible type
/// declared elsewhere (the owner path).
#[derive(Clone, PartialEq, Eq)]
pub struct ExtensionDef {
    pub owner: Path,
    pub args: Vec<TypeExpr>,
}

/// The runtime-facing description of a constructor, derived from its
/// defining type declaration.
#[derive(Clone, PartialEq, Eq)]
pub struct CtorDescr {
    pub name: Atom,
    /// The type this constructor belongs to.
    pub owner: Path,
    pub args: Vec<TypeExpr>,
    pub arity: usize,
    pub tag: CtorTag,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum CtorTag {
    /// The nth constructor of a closed variant.
    Regular(u32),
    /// A constructor of an extensible type, identified at runtime by its slot.
    Extension,
}

/// The runtime-facing description of a record label.
#[derive(Clone, PartialEq, Eq)]
pub struct LabelDescr {
    pub name: Atom,
    /// The record type this label belongs to.
    pub owner: Path,
    pub ty: TypeExpr,
    pub mutable: bool,
    /// The field offset inside the record block.
    pub pos: u32,
}

/// Derive the constructor descriptions of a type declaration.
///
/// Empty for non-variant bodies.
pub fn ctors_of(owner: &Path, decl: &TypeDecl) -> Vec<Rc<CtorDescr>> {
    let TypeBody::Variant(ctors) = &decl.body else {
        return Vec::new();
    };

    ctors
        .iter()
        .zip(0..)
        .map(|(ctor, tag)| {
            Rc::new(CtorDescr {
                name: ctor.name,
                owner: owner.clone(),
                args: ctor.args.clone(),
                arity: ctor.args.len(),
                tag: CtorTag::Regular(tag),
            })
        })
        .collect()
}

/// Derive the label descriptions of a type declaration.
///
/// Empty for non-record bodies.
pub fn labels_of(owner: &Path, decl: &TypeDecl) -> Vec<Rc<LabelDescr>> {
    let TypeBody::Record(labels) = &decl.body else {
        return Vec::new();
    };

    labels
        .iter()
        .zip(0..)
        .map(|(label, pos)| {
            Rc::new(LabelDescr {
                name: label.name,
                owner: owner.clone(),
                ty: label.ty.clone(),
                mutable: label.mutable,
                pos,
            })
        })
        .collect()
}

/// The description of a bound module.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct ModuleDecl {
    pub ty: Rc<ModuleType>,
}

impl ModuleDecl {
    pub fn new(ty: Rc<ModuleType>) -> Self {
        Self { ty }
    }

    /// The path this module is an alias of, if it is one.
    pub fn alias_of(&self) -> Option<&Path> {
        utility::obtain!(&*self.ty, ModuleType::Alias(path) => path)
    }
}

/// The description of a bound module type.
#[derive(Clone, PartialEq, Eq)]
pub struct ModuleTypeDecl {
    /// `None` for an abstract module type.
    pub body: Option<Rc<ModuleType>>,
}

/// The description of a class.
#[derive(Clone, PartialEq, Eq)]
pub struct ClassDecl {
    pub ty: TypeExpr,
}

/// The description of a class type.
#[derive(Clone, PartialEq, Eq)]
pub struct ClassTypeDecl {
    pub ty: TypeExpr,
}

/// A module type.
#[derive(PartialEq, Eq)]
pub enum ModuleType {
    /// A reference to a named module type.
    Ident(Path),
    /// A concrete list of members.
    Signature(Rc<Signature>),
    /// A functor.
    Functor {
        param: Ident,
        /// `None` for a generative functor taking `()`.
        param_ty: Option<Rc<ModuleType>>,
        result: Rc<ModuleType>,
    },
    /// Exactly the contents of another module, resolved by normalization
    /// rather than by copying.
    Alias(Path),
}

impl ModuleType {
    pub fn signature(items: Signature) -> Rc<Self> {
        Rc::new(Self::Signature(Rc::new(items)))
    }
}

impl fmt::Debug for ModuleType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ident(path) => write!(f, "{path}"),
            Self::Signature(items) => write!(f, "sig ({} members)", items.len()),
            Self::Functor { param, result, .. } => write!(f, "functor ({param}) -> {result:?}"),
            Self::Alias(path) => write!(f, "= {path}"),
        }
    }
}

/// An ordered list of member declarations describing a module's contents.
pub type Signature = Vec<SigItem>;

/// A member of a [`Signature`].
#[derive(Clone, PartialEq, Eq)]
pub enum SigItem {
    Value(Ident, Rc<ValueDescr>),
    Type(Ident, Rc<TypeDecl>),
    Extension(Ident, Rc<ExtensionDef>),
    Module(Ident, Rc<ModuleDecl>),
    ModuleType(Ident, Rc<ModuleTypeDecl>),
    Class(Ident, Rc<ClassDecl>),
    ClassType(Ident, Rc<ClassTypeDecl>),
}

impl SigItem {
    pub fn ident(&self) -> Ident {
        match self {
            Self::Value(ident, _)
            | Self::Type(ident, _)
            | Self::Extension(ident, _)
            | Self::Module(ident, _)
            | Self::ModuleType(ident, _)
            | Self::Class(ident, _)
            | Self::ClassType(ident, _) => *ident,
        }
    }

    /// The user-facing name of the member kind.
    pub const fn kind_name(&self) -> &'static str {
        match self {
            Self::Value(..) => "value",
            Self::Type(..) => "type",
            Self::Extension(..) => "extension constructor",
            Self::Module(..) => "module",
            Self::ModuleType(..) => "module type",
            Self::Class(..) => "class",
            Self::ClassType(..) => "class type",
        }
    }

    /// Test if this member occupies a slot in the runtime layout of a structure.
    ///
    /// Values (except primitives), extension constructors, modules and classes do;
    /// types, module types and class types are erased.
    pub fn occupies_slot(&self) -> bool {
        match self {
            Self::Value(_, descr) => !descr.is_primitive(),
            Self::Extension(..) | Self::Module(..) | Self::Class(..) => true,
            Self::Type(..) | Self::ModuleType(..) | Self::ClassType(..) => false,
        }
    }
}

impl fmt::Debug for SigItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.kind_name(), self.ident())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn int() -> TypeExpr {
        TypeExpr::constr(Path::Ident(Ident::fresh(Atom::INT)), Vec::new())
    }

    #[test]
    fn ctor_derivation_assigns_consecutive_tags() {
        let owner = Path::Ident(Ident::fresh(Atom::from("color")));
        let decl = TypeDecl::variant(
            Vec::new(),
            vec![
                CtorDef {
                    name: Atom::from("Red"),
                    args: Vec::new(),
                },
                CtorDef {
                    name: Atom::from("Rgb"),
                    args: vec![int(), int(), int()],
                },
            ],
        );

        let ctors = ctors_of(&owner, &decl);

        assert_eq!(ctors.len(), 2);
        assert_eq!(ctors[0].tag, CtorTag::Regular(0));
        assert_eq!(ctors[0].arity, 0);
        assert_eq!(ctors[1].tag, CtorTag::Regular(1));
        assert_eq!(ctors[1].arity, 3);
        assert_eq!(ctors[1].owner, owner);
    }

    #[test]
    fn label_derivation_assigns_field_offsets() {
        let owner = Path::Ident(Ident::fresh(Atom::from("point")));
        let decl = TypeDecl::record(
            Vec::new(),
            vec![
                LabelDef {
                    name: Atom::from("x"),
                    mutable: false,
                    ty: int(),
                },
                LabelDef {
                    name: Atom::from("y"),
                    mutable: true,
                    ty: int(),
                },
            ],
        );

        let labels = labels_of(&owner, &decl);

        assert_eq!(labels.len(), 2);
        assert_eq!(labels[0].pos, 0);
        assert_eq!(labels[1].pos, 1);
        assert!(labels[1].mutable);
    }

    #[test]
    fn type_expr_display() {
        let list = Path::Ident(Ident::persistent(Atom::LIST));

        assert_eq!(
            TypeExpr::constr(list, vec![TypeExpr::Var(Atom::from("a"))]).to_string(),
            "'a list",
        );
    }
}
