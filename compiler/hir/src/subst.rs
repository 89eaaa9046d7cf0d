use crate::{
    ClassDecl, ClassTypeDecl, CtorDef, ExtensionDef, Ident, LabelDef, ModuleDecl, ModuleType,
    ModuleTypeDecl, Path, SigItem, Signature, TypeBody, TypeDecl, TypeExpr, ValueDescr,
};
use std::rc::Rc;
use utility::HashMap;

/// A substitution of paths for identifiers.
///
/// Substitution never mutates a declaration: applying one produces fresh
/// declarations, leaving every shared original untouched.
#[derive(Clone, Default)]
pub struct Subst {
    modules: HashMap<Ident, Path>,
    types: HashMap<Ident, Path>,
    module_types: HashMap<Ident, Path>,
}

impl Subst {
    pub fn identity() -> Self {
        Self::default()
    }

    pub fn is_identity(&self) -> bool {
        self.modules.is_empty() && self.types.is_empty() && self.module_types.is_empty()
    }

    pub fn add_module(&mut self, ident: Ident, path: Path) {
        self.modules.insert(ident, path);
    }

    pub fn add_type(&mut self, ident: Ident, path: Path) {
        self.types.insert(ident, path);
    }

    pub fn add_module_type(&mut self, ident: Ident, path: Path) {
        self.module_types.insert(ident, path);
    }

    pub fn module_path(&self, path: &Path) -> Path {
        match path {
            Path::Ident(ident) => self
                .modules
                .get(ident)
                .cloned()
                .unwrap_or_else(|| path.clone()),
            Path::Dot(prefix, member) => self.module_path(prefix).dot(*member),
            Path::Apply(functor, argument) => self
                .module_path(functor)
                .apply(self.module_path(argument)),
        }
    }

    pub fn type_path(&self, path: &Path) -> Path {
        match path {
            Path::Ident(ident) => self
                .types
                .get(ident)
                .cloned()
                .unwrap_or_else(|| path.clone()),
            Path::Dot(prefix, member) => self.module_path(prefix).dot(*member),
            Path::Apply(..) => self.module_path(path),
        }
    }

    pub fn module_type_path(&self, path: &Path) -> Path {
        match path {
            Path::Ident(ident) => self
                .module_types
                .get(ident)
                .cloned()
                .unwrap_or_else(|| path.clone()),
            Path::Dot(prefix, member) => self.module_path(prefix).dot(*member),
            Path::Apply(..) => self.module_path(path),
        }
    }

    pub fn type_expr(&self, ty: &TypeExpr) -> TypeExpr {
        match ty {
            TypeExpr::Var(name) => TypeExpr::Var(*name),
            TypeExpr::Arrow(domain, codomain) => {
                TypeExpr::arrow(self.type_expr(domain), self.type_expr(codomain))
            }
            TypeExpr::Tuple(elements) => {
                TypeExpr::Tuple(elements.iter().map(|ty| self.type_expr(ty)).collect())
            }
            TypeExpr::Constr(path, arguments) => TypeExpr::Constr(
                self.type_path(path),
                arguments.iter().map(|ty| self.type_expr(ty)).collect(),
            ),
        }
    }

    pub fn value_descr(&self, descr: &ValueDescr) -> ValueDescr {
        ValueDescr {
            ty: self.type_expr(&descr.ty),
            kind: descr.kind.clone(),
        }
    }

    pub fn type_decl(&self, decl: &TypeDecl) -> TypeDecl {
        TypeDecl {
            params: decl.params.clone(),
            manifest: decl.manifest.as_ref().map(|ty| self.type_expr(ty)),
            body: match &decl.body {
                TypeBody::Abstract => TypeBody::Abstract,
                TypeBody::Variant(ctors) => TypeBody::Variant(
                    ctors
                        .iter()
                        .map(|ctor| CtorDef {
                            name: ctor.name,
                            args: ctor.args.iter().map(|ty| self.type_expr(ty)).collect(),
                        })
                        .collect(),
                ),
                TypeBody::Record(labels) => TypeBody::Record(
                    labels
                        .iter()
                        .map(|label| LabelDef {
                            name: label.name,
                            mutable: label.mutable,
                            ty: self.type_expr(&label.ty),
                        })
                        .collect(),
                ),
            },
        }
    }

    pub fn extension_def(&self, def: &ExtensionDef) -> ExtensionDef {
        ExtensionDef {
            owner: self.type_path(&def.owner),
            args: def.args.iter().map(|ty| self.type_expr(ty)).collect(),
        }
    }

    pub fn class_decl(&self, decl: &ClassDecl) -> ClassDecl {
        ClassDecl {
            ty: self.type_expr(&decl.ty),
        }
    }

    pub fn class_type_decl(&self, decl: &ClassTypeDecl) -> ClassTypeDecl {
        ClassTypeDecl {
            ty: self.type_expr(&decl.ty),
        }
    }

    pub fn module_decl(&self, decl: &ModuleDecl) -> ModuleDecl {
        ModuleDecl {
            ty: self.module_type(&decl.ty),
        }
    }

    pub fn module_type_decl(&self, decl: &ModuleTypeDecl) -> ModuleTypeDecl {
        ModuleTypeDecl {
            body: decl.body.as_ref().map(|body| self.module_type(body)),
        }
    }

    pub fn module_type(&self, ty: &Rc<ModuleType>) -> Rc<ModuleType> {
        if self.is_identity() {
            return Rc::clone(ty);
        }

        match &**ty {
            ModuleType::Ident(path) => Rc::new(ModuleType::Ident(self.module_type_path(path))),
            ModuleType::Signature(items) => {
                Rc::new(ModuleType::Signature(Rc::new(self.signature(items))))
            }
            // Formal parameters are alpha-distinct, there is no capture to avoid.
            ModuleType::Functor {
                param,
                param_ty,
                result,
            } => Rc::new(ModuleType::Functor {
                param: *param,
                param_ty: param_ty.as_ref().map(|ty| self.module_type(ty)),
                result: self.module_type(result),
            }),
            ModuleType::Alias(path) => Rc::new(ModuleType::Alias(self.module_path(path))),
        }
    }

    pub fn signature(&self, items: &Signature) -> Signature {
        items
            .iter()
            .map(|item| match item {
                SigItem::Value(ident, descr) => {
                    SigItem::Value(*ident, Rc::new(self.value_descr(descr)))
                }
                SigItem::Type(ident, decl) => SigItem::Type(*ident, Rc::new(self.type_decl(decl))),
                SigItem::Extension(ident, def) => {
                    SigItem::Extension(*ident, Rc::new(self.extension_def(def)))
                }
                SigItem::Module(ident, decl) => {
                    SigItem::Module(*ident, Rc::new(self.module_decl(decl)))
                }
                SigItem::ModuleType(ident, decl) => {
                    SigItem::ModuleType(*ident, Rc::new(self.module_type_decl(decl)))
                }
                SigItem::Class(ident, decl) => {
                    SigItem::Class(*ident, Rc::new(self.class_decl(decl)))
                }
                SigItem::ClassType(ident, decl) => {
                    SigItem::ClassType(*ident, Rc::new(self.class_type_decl(decl)))
                }
            })
            .collect()
    }

    /// The substitution equivalent to applying `self` first and `other` second.
    #[must_use]
    pub fn compose(&self, other: &Subst) -> Subst {
        let mut composed = other.clone();

        for (&ident, path) in &self.modules {
            composed.modules.insert(ident, other.module_path(path));
        }
        for (&ident, path) in &self.types {
            composed.types.insert(ident, other.type_path(path));
        }
        for (&ident, path) in &self.module_types {
            composed
                .module_types
                .insert(ident, other.module_type_path(path));
        }

        composed
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use utility::Atom;

    #[test]
    fn substitution_rewrites_type_constructor_heads() {
        let t = Ident::fresh(Atom::from("t"));
        let root = Path::Ident(Ident::persistent(Atom::from("M")));

        let mut subst = Subst::identity();
        subst.add_type(t, root.clone().dot(Atom::from("t")));

        let ty = TypeExpr::constr(Path::Ident(t), Vec::new());

        assert_eq!(subst.type_expr(&ty).to_string(), "M.t");
    }

    #[test]
    fn substitution_produces_fresh_declarations() {
        let m = Ident::fresh(Atom::from("Inner"));
        let original = Rc::new(ModuleType::Alias(Path::Ident(m)));

        let mut subst = Subst::identity();
        subst.add_module(m, Path::Ident(Ident::persistent(Atom::from("Outer"))));

        let substituted = subst.module_type(&original);

        assert!(!Rc::ptr_eq(&original, &substituted));
        assert!(matches!(&*original, ModuleType::Alias(Path::Ident(ident)) if *ident == m));
    }

    #[test]
    fn composition_applies_left_then_right() {
        let a = Ident::fresh(Atom::from("A"));
        let b = Ident::fresh(Atom::from("B"));
        let c = Path::Ident(Ident::persistent(Atom::from("C")));

        let mut first = Subst::identity();
        first.add_module(a, Path::Ident(b));
        let mut second = Subst::identity();
        second.add_module(b, c.clone());

        let composed = first.compose(&second);

        assert_eq!(composed.module_path(&Path::Ident(a)), c);
        assert_eq!(composed.module_path(&Path::Ident(b)), c);
    }
}
