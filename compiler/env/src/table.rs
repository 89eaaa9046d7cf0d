//! Persistent per-namespace binding tables.
//!
//! Insertion never mutates a table in place: it returns a new table sharing
//! all unmodified substructure with the old one. Environments are created on
//! every binding, so this sharing is what keeps them cheap.

use crate::usage::UsageKey;
use hir::{Ident, Path};
use std::rc::Rc;
use utility::{Atom, SmallVec};

/// A binding held by a table.
pub struct Entry<D> {
    pub ident: Ident,
    pub path: Path,
    pub decl: Rc<D>,
    /// Fired through the usage registry on every successful lookup.
    pub usage: Option<UsageKey>,
    /// Invoked on lookup when the binding was introduced by an open that
    /// shadowed an earlier binding of the same name.
    pub shadow_hook: Option<Rc<dyn Fn()>>,
    pub origin: Origin,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Origin {
    /// Introduced by a definition.
    Definition,
    /// Introduced by opening a module; records whether the name was already
    /// bound before the open.
    Open { shadowed: bool },
}

impl<D> Entry<D> {
    pub fn definition(ident: Ident, path: Path, decl: Rc<D>) -> Self {
        Self {
            ident,
            path,
            decl,
            usage: None,
            shadow_hook: None,
            origin: Origin::Definition,
        }
    }

    pub fn with_usage(mut self, usage: Option<UsageKey>) -> Self {
        self.usage = usage;
        self
    }
}

/// A persistent map from identifier to binding, one per namespace.
///
/// Shadowing is additive: adding never overwrites, the most recently added
/// binding wins on lookup by name while older ones stay reachable by identity.
pub struct Table<D> {
    root: Option<Rc<Node<D>>>,
}

struct Node<D> {
    key: usize,
    /// Bindings sharing this name, most recently added first.
    bucket: Vec<Rc<Entry<D>>>,
    left: Option<Rc<Node<D>>>,
    right: Option<Rc<Node<D>>>,
}

fn key_of(name: Atom) -> usize {
    index_map::Index::value(name)
}

impl<D> Table<D> {
    pub fn empty() -> Self {
        Self { root: None }
    }

    /// Add a binding, returning the extended table.
    #[must_use]
    pub fn add(&self, entry: Entry<D>) -> Self {
        Self {
            root: Some(insert(
                self.root.as_ref(),
                key_of(entry.ident.name()),
                Rc::new(entry),
            )),
        }
    }

    /// Add a binding introduced by a scope-opening, recording whether the
    /// name was already bound in the reference table before the open.
    #[must_use]
    pub fn add_open(
        &self,
        mut entry: Entry<D>,
        shadow_hook: Option<Rc<dyn Fn()>>,
        reference: &Table<D>,
    ) -> Self {
        let shadowed = reference.find_by_name(entry.ident.name()).is_some();

        entry.origin = Origin::Open { shadowed };
        entry.shadow_hook = if shadowed { shadow_hook } else { None };

        self.add(entry)
    }

    fn node(&self, name: Atom) -> Option<&Node<D>> {
        let key = key_of(name);
        let mut current = self.root.as_deref();

        while let Some(node) = current {
            current = if key < node.key {
                node.left.as_deref()
            } else if key > node.key {
                node.right.as_deref()
            } else {
                return Some(node);
            };
        }

        None
    }

    /// Find the binding of this exact identifier, regardless of later
    /// same-name additions.
    pub fn find_by_identity(&self, ident: Ident) -> Option<&Rc<Entry<D>>> {
        self.node(ident.name())?
            .bucket
            .iter()
            .find(|entry| entry.ident == ident)
    }

    /// Find the most recently added binding of this name.
    pub fn find_by_name(&self, name: Atom) -> Option<&Rc<Entry<D>>> {
        self.node(name)?.bucket.first()
    }

    /// All bindings of this name, most recently added first.
    pub fn find_all_by_name(&self, name: Atom) -> SmallVec<Rc<Entry<D>>, 2> {
        match self.node(name) {
            Some(node) => node.bucket.iter().cloned().collect(),
            None => SmallVec::new(),
        }
    }

    /// Enumerate every binding. Buckets are visited most-recent-first.
    pub fn for_each(&self, mut observe: impl FnMut(&Rc<Entry<D>>)) {
        fn walk<D>(node: Option<&Node<D>>, observe: &mut impl FnMut(&Rc<Entry<D>>)) {
            let Some(node) = node else { return };

            walk(node.left.as_deref(), observe);
            for entry in &node.bucket {
                observe(entry);
            }
            walk(node.right.as_deref(), observe);
        }

        walk(self.root.as_deref(), &mut observe);
    }
}

fn insert<D>(node: Option<&Rc<Node<D>>>, key: usize, entry: Rc<Entry<D>>) -> Rc<Node<D>> {
    let Some(node) = node else {
        return Rc::new(Node {
            key,
            bucket: vec![entry],
            left: None,
            right: None,
        });
    };

    if key < node.key {
        Rc::new(Node {
            key: node.key,
            bucket: node.bucket.clone(),
            left: Some(insert(node.left.as_ref(), key, entry)),
            right: node.right.clone(),
        })
    } else if key > node.key {
        Rc::new(Node {
            key: node.key,
            bucket: node.bucket.clone(),
            left: node.left.clone(),
            right: Some(insert(node.right.as_ref(), key, entry)),
        })
    } else {
        let mut bucket = Vec::with_capacity(node.bucket.len() + 1);
        bucket.push(entry);
        bucket.extend(node.bucket.iter().cloned());

        Rc::new(Node {
            key: node.key,
            bucket,
            left: node.left.clone(),
            right: node.right.clone(),
        })
    }
}

impl<D> Clone for Table<D> {
    fn clone(&self) -> Self {
        Self {
            root: self.root.clone(),
        }
    }
}

impl<D> Default for Table<D> {
    fn default() -> Self {
        Self::empty()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn entry(ident: Ident, decl: u32) -> Entry<u32> {
        Entry::definition(ident, Path::Ident(ident), Rc::new(decl))
    }

    #[test]
    fn most_recently_added_binding_wins_by_name() {
        let name = Atom::from("x");
        let first = Ident::fresh(name);
        let second = Ident::fresh(name);

        let table = Table::empty().add(entry(first, 1)).add(entry(second, 2));

        assert_eq!(*table.find_by_name(name).unwrap().decl, 2);
        assert_eq!(
            table
                .find_all_by_name(name)
                .iter()
                .map(|entry| *entry.decl)
                .collect::<Vec<_>>(),
            [2, 1],
        );
    }

    #[test]
    fn shadowed_identifier_stays_reachable_by_identity() {
        let name = Atom::from("x");
        let first = Ident::fresh(name);
        let second = Ident::fresh(name);

        let table = Table::empty().add(entry(first, 1)).add(entry(second, 2));

        assert_eq!(*table.find_by_identity(first).unwrap().decl, 1);
        assert_eq!(*table.find_by_identity(second).unwrap().decl, 2);
    }

    #[test]
    fn addition_leaves_the_original_table_untouched() {
        let x = Ident::fresh(Atom::from("x"));
        let y = Ident::fresh(Atom::from("y"));

        let old = Table::empty().add(entry(x, 1));
        let new = old.add(entry(y, 2));

        assert!(old.find_by_name(Atom::from("y")).is_none());
        assert!(new.find_by_name(Atom::from("y")).is_some());
        assert_eq!(*old.find_by_name(Atom::from("x")).unwrap().decl, 1);
    }

    #[test]
    fn add_open_records_shadowing_against_the_reference_table() {
        let name = Atom::from("x");
        let reference = Table::empty().add(entry(Ident::fresh(name), 1));

        let opened = reference.add_open(entry(Ident::fresh(name), 2), None, &reference);
        let entry_ = opened.find_by_name(name).unwrap();
        assert_eq!(entry_.origin, Origin::Open { shadowed: true });

        let fresh_name = Atom::from("zz");
        let opened = reference.add_open(entry(Ident::fresh(fresh_name), 3), None, &reference);
        let entry_ = opened.find_by_name(fresh_name).unwrap();
        assert_eq!(entry_.origin, Origin::Open { shadowed: false });
    }
}
