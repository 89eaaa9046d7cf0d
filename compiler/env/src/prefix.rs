//! The signature prefixer.
//!
//! Converts the members of a signature into absolute paths below a root and
//! collects the substitution that rewrites references between siblings into
//! those absolute paths.

use crate::Session;
use hir::{Path, SigItem, Signature, Subst};
use std::rc::Rc;

/// A signature member together with its absolute path and runtime position.
pub(crate) struct PrefixedItem {
    pub(crate) item: SigItem,
    pub(crate) path: Path,
    /// The slot this member occupies in the runtime layout, if it occupies one.
    pub(crate) pos: Option<u32>,
}

pub(crate) struct Prefixing {
    pub(crate) items: Vec<PrefixedItem>,
    /// The incoming substitution extended with one mapping per type, module
    /// and module-type member, so later siblings resolve correctly.
    pub(crate) subst: Subst,
}

/// Prefix a signature's members with a root path.
///
/// Memoized per `(root, signature identity)` — but only for the identity
/// substitution: substituted results are not safely reusable by identity,
/// so any other substitution bypasses the cache.
pub(crate) fn prefix_signature(
    session: &Session,
    root: &Path,
    subst: &Subst,
    signature: &Rc<Signature>,
) -> Rc<Prefixing> {
    if !subst.is_identity() {
        return Rc::new(compute(root, subst, signature));
    }

    let key = (root.clone(), Rc::as_ptr(signature) as usize);

    if let Some(prefixing) = session.prefixings.borrow().get(&key) {
        session.stats.bump_prefix_cache_hits();
        return Rc::clone(prefixing);
    }

    let prefixing = Rc::new(compute(root, subst, signature));
    session
        .prefixings
        .borrow_mut()
        .insert(key, Rc::clone(&prefixing));

    prefixing
}

fn compute(root: &Path, subst: &Subst, signature: &Signature) -> Prefixing {
    let mut subst = subst.clone();
    let mut items = Vec::with_capacity(signature.len());
    let mut pos = 0;

    for item in signature {
        let ident = item.ident();
        let path = root.clone().dot(ident.name());

        match item {
            SigItem::Type(..) => subst.add_type(ident, path.clone()),
            SigItem::Module(..) => subst.add_module(ident, path.clone()),
            SigItem::ModuleType(..) => subst.add_module_type(ident, path.clone()),
            SigItem::Value(..)
            | SigItem::Extension(..)
            | SigItem::Class(..)
            | SigItem::ClassType(..) => {}
        }

        let position = item.occupies_slot().then(|| {
            let position = pos;
            pos += 1;
            position
        });

        items.push(PrefixedItem {
            item: item.clone(),
            path,
            pos: position,
        });
    }

    Prefixing { items, subst }
}
