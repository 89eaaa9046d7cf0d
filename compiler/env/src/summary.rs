//! The summary trail.
//!
//! Every environment-building operation appends one node to a process-wide
//! arena; an environment only stores the index of its last node. Walking the
//! parent links recovers the exact sequence of operations that produced an
//! environment, which is enough to diff two environments or to rebuild a
//! reduced one from its trail alone.

use crate::component::Component;
use hir::{
    ClassDecl, ClassTypeDecl, ExtensionDef, Ident, ModuleDecl, ModuleTypeDecl, Path, TypeDecl,
    ValueDescr,
};
use std::{cell::RefCell, fmt, rc::Rc};

/// The index of a trail node inside the session's arena.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct SummaryIdx(u32);

impl index_map::Index for SummaryIdx {
    fn new(index: usize) -> Self {
        Self(index.try_into().unwrap())
    }

    fn value(self) -> usize {
        self.0 as _
    }
}

impl fmt::Debug for SummaryIdx {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}s", self.0)
    }
}

/// One recorded environment-building operation.
pub struct SummaryNode {
    pub parent: Option<SummaryIdx>,
    pub kind: SummaryKind,
}

pub enum SummaryKind {
    Value(Ident, Rc<ValueDescr>),
    Type(Ident, Rc<TypeDecl>),
    Extension(Ident, Rc<ExtensionDef>),
    Module(Ident, Rc<ModuleDecl>),
    ModuleType(Ident, Rc<ModuleTypeDecl>),
    Class(Ident, Rc<ClassDecl>),
    ClassType(Ident, Rc<ClassTypeDecl>),
    Open {
        path: Path,
        /// The expansion the open resolved to, memoized so that trail-only
        /// reconstruction does not resolve the path a second time.
        expansion: RefCell<Option<Rc<Component>>>,
    },
}

impl SummaryNode {
    /// The identifier this node introduced, if it introduced a single one.
    pub fn ident(&self) -> Option<Ident> {
        match &self.kind {
            SummaryKind::Value(ident, _)
            | SummaryKind::Type(ident, _)
            | SummaryKind::Extension(ident, _)
            | SummaryKind::Module(ident, _)
            | SummaryKind::ModuleType(ident, _)
            | SummaryKind::Class(ident, _)
            | SummaryKind::ClassType(ident, _) => Some(*ident),
            SummaryKind::Open { .. } => None,
        }
    }
}

impl fmt::Debug for SummaryNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            SummaryKind::Value(ident, _) => write!(f, "value {ident:?}"),
            SummaryKind::Type(ident, _) => write!(f, "type {ident:?}"),
            SummaryKind::Extension(ident, _) => write!(f, "extension {ident:?}"),
            SummaryKind::Module(ident, _) => write!(f, "module {ident:?}"),
            SummaryKind::ModuleType(ident, _) => write!(f, "module type {ident:?}"),
            SummaryKind::Class(ident, _) => write!(f, "class {ident:?}"),
            SummaryKind::ClassType(ident, _) => write!(f, "class type {ident:?}"),
            SummaryKind::Open { path, .. } => write!(f, "open {path}"),
        }
    }
}
