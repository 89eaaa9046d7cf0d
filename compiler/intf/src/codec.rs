//! The binary encoding of compiled interfaces.
//!
//! Identifiers are numbered in order of first binding occurrence; references
//! encode the number. Decoding mints fresh identifiers, so two reads of the
//! same file yield alpha-equivalent, not identical, signatures — identity
//! sharing across reads is provided by the stores' caches, not by the codec.

use crate::{Flags, Interface};
use hir::{
    ClassDecl, ClassTypeDecl, CtorDef, ExtensionDef, Ident, LabelDef, ModuleDecl, ModuleType,
    ModuleTypeDecl, Path, SigItem, Signature, TypeBody, TypeDecl, TypeExpr, ValueDescr, ValueKind,
};
use std::hash::Hasher as _;
use std::rc::Rc;
use utility::{Atom, HashMap};

const MAGIC: &[u8; 4] = b"ORNI";
const VERSION: u16 = 1;

pub(crate) fn hash(bytes: &[u8]) -> u64 {
    let mut hasher = utility::Hasher::default();
    hasher.write(bytes);
    hasher.finish()
}

pub(crate) fn encode(
    unit_name: Atom,
    signature: &Rc<Signature>,
    dependencies: &[(Atom, Option<u64>)],
    flags: Flags,
) -> Result<Vec<u8>, String> {
    let mut encoder = Encoder::default();

    encoder.bytes.extend_from_slice(MAGIC);
    encoder.u16(VERSION);
    encoder.atom(unit_name);
    encoder.u8(flags.rec_types as u8);

    encoder.u32(dependencies.len() as u32);
    for &(name, hash) in dependencies {
        encoder.atom(name);
        match hash {
            Some(hash) => {
                encoder.u8(1);
                encoder.u64(hash);
            }
            None => encoder.u8(0),
        }
    }

    encoder.signature(signature)?;

    Ok(encoder.bytes)
}

pub(crate) fn decode(bytes: &[u8]) -> Result<Interface, String> {
    let mut decoder = Decoder {
        bytes,
        position: 0,
        idents: Vec::new(),
    };

    if decoder.take(4)? != MAGIC.as_slice() {
        return Err("not a compiled interface".into());
    }
    if decoder.u16()? != VERSION {
        return Err("unsupported interface version".into());
    }

    let unit_name = decoder.atom()?;
    let flags = Flags {
        rec_types: decoder.u8()? != 0,
    };

    let mut dependencies = Vec::new();
    for _ in 0..decoder.u32()? {
        let name = decoder.atom()?;
        let hash = match decoder.u8()? {
            0 => None,
            1 => Some(decoder.u64()?),
            tag => return Err(format!("invalid dependency-hash tag {tag}")),
        };
        dependencies.push((name, hash));
    }

    let signature = Rc::new(decoder.signature()?);

    if decoder.position != bytes.len() {
        return Err("trailing garbage".into());
    }

    Ok(Interface {
        unit_name,
        signature,
        dependencies,
        flags,
        hash: hash(bytes),
    })
}

#[derive(Default)]
struct Encoder {
    bytes: Vec<u8>,
    idents: HashMap<Ident, u32>,
}

impl Encoder {
    fn u8(&mut self, value: u8) {
        self.bytes.push(value);
    }

    fn u16(&mut self, value: u16) {
        self.bytes.extend_from_slice(&value.to_le_bytes());
    }

    fn u32(&mut self, value: u32) {
        self.bytes.extend_from_slice(&value.to_le_bytes());
    }

    fn u64(&mut self, value: u64) {
        self.bytes.extend_from_slice(&value.to_le_bytes());
    }

    fn atom(&mut self, atom: Atom) {
        let string = atom.to_str();
        self.u32(string.len() as u32);
        self.bytes.extend_from_slice(string.as_bytes());
    }

    fn bind(&mut self, ident: Ident) {
        let index = self.idents.len() as u32;
        self.idents.insert(ident, index);
        self.atom(ident.name());
    }

    fn ident(&mut self, ident: Ident) -> Result<(), String> {
        if ident.is_persistent() {
            self.u8(0);
            self.atom(ident.name());
            return Ok(());
        }

        match self.idents.get(&ident) {
            Some(&index) => {
                self.u8(1);
                self.u32(index);
                Ok(())
            }
            None => Err(format!("identifier ‘{ident:?}’ escapes the interface")),
        }
    }

    fn path(&mut self, path: &Path) -> Result<(), String> {
        match path {
            Path::Ident(ident) => {
                self.u8(0);
                self.ident(*ident)
            }
            Path::Dot(prefix, member) => {
                self.u8(1);
                self.path(prefix)?;
                self.atom(*member);
                Ok(())
            }
            Path::Apply(functor, argument) => {
                self.u8(2);
                self.path(functor)?;
                self.path(argument)
            }
        }
    }

    fn type_expr(&mut self, ty: &TypeExpr) -> Result<(), String> {
        match ty {
            TypeExpr::Var(name) => {
                self.u8(0);
                self.atom(*name);
                Ok(())
            }
            TypeExpr::Arrow(domain, codomain) => {
                self.u8(1);
                self.type_expr(domain)?;
                self.type_expr(codomain)
            }
            TypeExpr::Tuple(elements) => {
                self.u8(2);
                self.u32(elements.len() as u32);
                elements.iter().try_for_each(|ty| self.type_expr(ty))
            }
            TypeExpr::Constr(path, arguments) => {
                self.u8(3);
                self.path(path)?;
                self.u32(arguments.len() as u32);
                arguments.iter().try_for_each(|ty| self.type_expr(ty))
            }
        }
    }

    fn value_descr(&mut self, descr: &ValueDescr) -> Result<(), String> {
        self.type_expr(&descr.ty)?;
        match &descr.kind {
            ValueKind::Regular => self.u8(0),
            ValueKind::Primitive { name, arity } => {
                self.u8(1);
                self.atom(*name);
                self.u32(*arity as u32);
            }
        }
        Ok(())
    }

    fn type_decl(&mut self, decl: &TypeDecl) -> Result<(), String> {
        self.u32(decl.params.len() as u32);
        for &param in &decl.params {
            self.atom(param);
        }

        match &decl.manifest {
            Some(manifest) => {
                self.u8(1);
                self.type_expr(manifest)?;
            }
            None => self.u8(0),
        }

        match &decl.body {
            TypeBody::Abstract => self.u8(0),
            TypeBody::Variant(ctors) => {
                self.u8(1);
                self.u32(ctors.len() as u32);
                for ctor in ctors {
                    self.atom(ctor.name);
                    self.u32(ctor.args.len() as u32);
                    ctor.args.iter().try_for_each(|ty| self.type_expr(ty))?;
                }
            }
            TypeBody::Record(labels) => {
                self.u8(2);
                self.u32(labels.len() as u32);
                for label in labels {
                    self.atom(label.name);
                    self.u8(label.mutable as u8);
                    self.type_expr(&label.ty)?;
                }
            }
        }
        Ok(())
    }

    fn module_type(&mut self, ty: &ModuleType) -> Result<(), String> {
        match ty {
            ModuleType::Ident(path) => {
                self.u8(0);
                self.path(path)
            }
            ModuleType::Signature(items) => {
                self.u8(1);
                self.signature(items)
            }
            ModuleType::Functor {
                param,
                param_ty,
                result,
            } => {
                self.u8(2);
                self.bind(*param);
                match param_ty {
                    Some(param_ty) => {
                        self.u8(1);
                        self.module_type(param_ty)?;
                    }
                    None => self.u8(0),
                }
                self.module_type(result)
            }
            ModuleType::Alias(path) => {
                self.u8(3);
                self.path(path)
            }
        }
    }

    fn signature(&mut self, items: &Signature) -> Result<(), String> {
        self.u32(items.len() as u32);

        for item in items {
            match item {
                SigItem::Value(ident, descr) => {
                    self.u8(0);
                    self.bind(*ident);
                    self.value_descr(descr)?;
                }
                SigItem::Type(ident, decl) => {
                    self.u8(1);
                    self.bind(*ident);
                    self.type_decl(decl)?;
                }
                SigItem::Extension(ident, def) => {
                    self.u8(2);
                    self.bind(*ident);
                    self.path(&def.owner)?;
                    self.u32(def.args.len() as u32);
                    def.args.iter().try_for_each(|ty| self.type_expr(ty))?;
                }
                SigItem::Module(ident, decl) => {
                    self.u8(3);
                    self.bind(*ident);
                    self.module_type(&decl.ty)?;
                }
                SigItem::ModuleType(ident, decl) => {
                    self.u8(4);
                    self.bind(*ident);
                    match &decl.body {
                        Some(body) => {
                            self.u8(1);
                            self.module_type(body)?;
                        }
                        None => self.u8(0),
                    }
                }
                SigItem::Class(ident, decl) => {
                    self.u8(5);
                    self.bind(*ident);
                    self.type_expr(&decl.ty)?;
                }
                SigItem::ClassType(ident, decl) => {
                    self.u8(6);
                    self.bind(*ident);
                    self.type_expr(&decl.ty)?;
                }
            }
        }
        Ok(())
    }
}

struct Decoder<'a> {
    bytes: &'a [u8],
    position: usize,
    idents: Vec<Ident>,
}

impl Decoder<'_> {
    fn take(&mut self, count: usize) -> Result<&[u8], String> {
        let end = self.position + count;
        let slice = self
            .bytes
            .get(self.position..end)
            .ok_or_else(|| "unexpected end of interface".to_owned())?;
        self.position = end;
        Ok(slice)
    }

    fn u8(&mut self) -> Result<u8, String> {
        Ok(self.take(1)?[0])
    }

    fn u16(&mut self) -> Result<u16, String> {
        Ok(u16::from_le_bytes(self.take(2)?.try_into().unwrap()))
    }

    fn u32(&mut self) -> Result<u32, String> {
        Ok(u32::from_le_bytes(self.take(4)?.try_into().unwrap()))
    }

    fn u64(&mut self) -> Result<u64, String> {
        Ok(u64::from_le_bytes(self.take(8)?.try_into().unwrap()))
    }

    fn atom(&mut self) -> Result<Atom, String> {
        let length = self.u32()? as usize;
        let bytes = self.take(length)?;
        let string = std::str::from_utf8(bytes).map_err(|_| "malformed name".to_owned())?;
        Ok(Atom::from(string))
    }

    fn bind(&mut self) -> Result<Ident, String> {
        let ident = Ident::fresh(self.atom()?);
        self.idents.push(ident);
        Ok(ident)
    }

    fn ident(&mut self) -> Result<Ident, String> {
        match self.u8()? {
            0 => Ok(Ident::persistent(self.atom()?)),
            1 => {
                let index = self.u32()? as usize;
                self.idents
                    .get(index)
                    .copied()
                    .ok_or_else(|| format!("dangling identifier reference {index}"))
            }
            tag => Err(format!("invalid identifier tag {tag}")),
        }
    }

    fn path(&mut self) -> Result<Path, String> {
        match self.u8()? {
            0 => Ok(Path::Ident(self.ident()?)),
            1 => {
                let prefix = self.path()?;
                Ok(prefix.dot(self.atom()?))
            }
            2 => {
                let functor = self.path()?;
                Ok(functor.apply(self.path()?))
            }
            tag => Err(format!("invalid path tag {tag}")),
        }
    }

    fn type_expr(&mut self) -> Result<TypeExpr, String> {
        match self.u8()? {
            0 => Ok(TypeExpr::Var(self.atom()?)),
            1 => {
                let domain = self.type_expr()?;
                Ok(TypeExpr::arrow(domain, self.type_expr()?))
            }
            2 => {
                let count = self.u32()?;
                Ok(TypeExpr::Tuple(
                    (0..count)
                        .map(|_| self.type_expr())
                        .collect::<Result<_, _>>()?,
                ))
            }
            3 => {
                let path = self.path()?;
                let count = self.u32()?;
                Ok(TypeExpr::Constr(
                    path,
                    (0..count)
                        .map(|_| self.type_expr())
                        .collect::<Result<_, _>>()?,
                ))
            }
            tag => Err(format!("invalid type tag {tag}")),
        }
    }

    fn value_descr(&mut self) -> Result<ValueDescr, String> {
        let ty = self.type_expr()?;
        let kind = match self.u8()? {
            0 => ValueKind::Regular,
            1 => ValueKind::Primitive {
                name: self.atom()?,
                arity: self.u32()? as usize,
            },
            tag => return Err(format!("invalid value-kind tag {tag}")),
        };
        Ok(ValueDescr { ty, kind })
    }

    fn type_decl(&mut self) -> Result<TypeDecl, String> {
        let param_count = self.u32()?;
        let params = (0..param_count)
            .map(|_| self.atom())
            .collect::<Result<_, _>>()?;

        let manifest = match self.u8()? {
            0 => None,
            1 => Some(self.type_expr()?),
            tag => return Err(format!("invalid manifest tag {tag}")),
        };

        let body = match self.u8()? {
            0 => TypeBody::Abstract,
            1 => {
                let count = self.u32()?;
                TypeBody::Variant(
                    (0..count)
                        .map(|_| {
                            let name = self.atom()?;
                            let arg_count = self.u32()?;
                            let args = (0..arg_count)
                                .map(|_| self.type_expr())
                                .collect::<Result<_, _>>()?;
                            Ok(CtorDef { name, args })
                        })
                        .collect::<Result<_, String>>()?,
                )
            }
            2 => {
                let count = self.u32()?;
                TypeBody::Record(
                    (0..count)
                        .map(|_| {
                            let name = self.atom()?;
                            let mutable = self.u8()? != 0;
                            let ty = self.type_expr()?;
                            Ok(LabelDef { name, mutable, ty })
                        })
                        .collect::<Result<_, String>>()?,
                )
            }
            tag => return Err(format!("invalid type-body tag {tag}")),
        };

        Ok(TypeDecl {
            params,
            manifest,
            body,
        })
    }

    fn module_type(&mut self) -> Result<Rc<ModuleType>, String> {
        Ok(Rc::new(match self.u8()? {
            0 => ModuleType::Ident(self.path()?),
            1 => ModuleType::Signature(Rc::new(self.signature()?)),
            2 => {
                let param = self.bind()?;
                let param_ty = match self.u8()? {
                    0 => None,
                    1 => Some(self.module_type()?),
                    tag => return Err(format!("invalid functor-parameter tag {tag}")),
                };
                ModuleType::Functor {
                    param,
                    param_ty,
                    result: self.module_type()?,
                }
            }
            3 => ModuleType::Alias(self.path()?),
            tag => return Err(format!("invalid module-type tag {tag}")),
        }))
    }

    fn signature(&mut self) -> Result<Signature, String> {
        let count = self.u32()?;
        let mut items = Vec::with_capacity(count as usize);

        for _ in 0..count {
            let tag = self.u8()?;
            let ident = self.bind()?;

            items.push(match tag {
                0 => SigItem::Value(ident, Rc::new(self.value_descr()?)),
                1 => SigItem::Type(ident, Rc::new(self.type_decl()?)),
                2 => {
                    let owner = self.path()?;
                    let arg_count = self.u32()?;
                    let args = (0..arg_count)
                        .map(|_| self.type_expr())
                        .collect::<Result<_, _>>()?;
                    SigItem::Extension(ident, Rc::new(ExtensionDef { owner, args }))
                }
                3 => SigItem::Module(ident, Rc::new(ModuleDecl::new(self.module_type()?))),
                4 => {
                    let body = match self.u8()? {
                        0 => None,
                        1 => Some(self.module_type()?),
                        tag => return Err(format!("invalid module-type-body tag {tag}")),
                    };
                    SigItem::ModuleType(ident, Rc::new(ModuleTypeDecl { body }))
                }
                5 => SigItem::Class(
                    ident,
                    Rc::new(ClassDecl {
                        ty: self.type_expr()?,
                    }),
                ),
                6 => SigItem::ClassType(
                    ident,
                    Rc::new(ClassTypeDecl {
                        ty: self.type_expr()?,
                    }),
                ),
                tag => return Err(format!("invalid member tag {tag}")),
            });
        }

        Ok(items)
    }
}
