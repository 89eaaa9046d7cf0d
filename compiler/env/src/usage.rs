//! The backtrackable usage tracker.
//!
//! Lookups notify registered callbacks so unused-binding warnings can be
//! computed without a separate pass. Registrations are undoable: speculative
//! type-checking rolls back a registration together with the binding it was
//! attached to.

use span::Span;
use std::{cell::RefCell, rc::Rc};
use utility::{Atom, HashMap};

/// The key a usage callback is registered under.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum UsageKey {
    /// A binding, identified by name and introduction site.
    Name { name: Atom, loc: Span },
    /// A single constructor of a type, for constructor-level granularity.
    Ctor { ty: Atom, loc: Span, name: Atom },
}

/// How a binding was used.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum UsageKind {
    /// Used as an expression or positive pattern.
    Reference,
    /// Used in a pattern context.
    Pattern,
    /// Used in a way that justifies treating the owning type as effectively private.
    Privatize,
}

/// The three independent usage facets of a constructor.
///
/// Each is settable at most once per transaction and individually undoable.
#[derive(Clone, Copy, Default, PartialEq, Eq, Debug)]
pub struct CtorUsage {
    pub referenced: bool,
    pub pattern: bool,
    pub privatize: bool,
}

type Callback = Rc<dyn Fn(UsageKind)>;

/// The registry of usage callbacks and constructor facets.
///
/// The maps live behind [`Rc`]s so that recorded inverse actions can reach
/// them after the borrow of the owning session has ended.
#[derive(Default)]
pub(crate) struct UsageRegistry {
    callbacks: Rc<RefCell<HashMap<UsageKey, Callback>>>,
    ctors: Rc<RefCell<HashMap<UsageKey, CtorUsage>>>,
}

impl UsageRegistry {
    /// Install a callback under a key.
    ///
    /// A later registration under the same key composes with the earlier one
    /// rather than replacing it, so stacked scopes all observe the use.
    pub(crate) fn register(
        &self,
        undo: &UndoLog,
        key: UsageKey,
        on_use: impl Fn(UsageKind) + 'static,
    ) {
        let previous = self.callbacks.borrow().get(&key).cloned();

        let composed: Callback = match previous.clone() {
            Some(previous) => Rc::new(move |kind| {
                on_use(kind);
                previous(kind);
            }),
            None => Rc::new(on_use),
        };

        self.callbacks.borrow_mut().insert(key, composed);

        let callbacks = Rc::clone(&self.callbacks);
        undo.record(move || {
            let mut callbacks = callbacks.borrow_mut();
            match previous {
                Some(previous) => callbacks.insert(key, previous),
                None => callbacks.remove(&key),
            };
        });
    }

    /// Notify a use. Unregistered keys are silently ignored.
    pub(crate) fn notify(&self, undo: &UndoLog, key: UsageKey, kind: UsageKind) {
        if let UsageKey::Ctor { .. } = key {
            self.set_facet(undo, key, kind);
        }

        let callback = self.callbacks.borrow().get(&key).cloned();
        if let Some(callback) = callback {
            callback(kind);
        }
    }

    fn set_facet(&self, undo: &UndoLog, key: UsageKey, kind: UsageKind) {
        let mut ctors = self.ctors.borrow_mut();
        let facets = ctors.entry(key).or_default();

        let facet = match kind {
            UsageKind::Reference => &mut facets.referenced,
            UsageKind::Pattern => &mut facets.pattern,
            UsageKind::Privatize => &mut facets.privatize,
        };

        if *facet {
            return;
        }
        *facet = true;
        drop(ctors);

        let ctors = Rc::clone(&self.ctors);
        undo.record(move || {
            if let Some(facets) = ctors.borrow_mut().get_mut(&key) {
                match kind {
                    UsageKind::Reference => facets.referenced = false,
                    UsageKind::Pattern => facets.pattern = false,
                    UsageKind::Privatize => facets.privatize = false,
                }
            }
        });
    }

    pub(crate) fn ctor_usage(&self, key: UsageKey) -> Option<CtorUsage> {
        self.ctors.borrow().get(&key).copied()
    }

    pub(crate) fn clear(&self) {
        self.callbacks.borrow_mut().clear();
        self.ctors.borrow_mut().clear();
    }
}

/// The ambient transaction stack.
///
/// Every mutation of shared state pushes an inverse action onto the innermost
/// open transaction. Committing drops the recorded inverses, aborting replays
/// them in reverse order of registration. Outside any transaction, mutations
/// are permanent and nothing is recorded.
#[derive(Default)]
pub(crate) struct UndoLog {
    frames: RefCell<Vec<Vec<Box<dyn FnOnce()>>>>,
}

impl UndoLog {
    pub(crate) fn record(&self, inverse: impl FnOnce() + 'static) {
        if let Some(frame) = self.frames.borrow_mut().last_mut() {
            frame.push(Box::new(inverse));
        }
    }

    pub(crate) fn begin(&self) {
        self.frames.borrow_mut().push(Vec::new());
    }

    pub(crate) fn commit(&self) {
        let frame = self.frames.borrow_mut().pop().expect("no open transaction");

        // Inverses of a committed inner transaction must survive into the
        // enclosing one: the outer abort still has to revert them.
        if let Some(outer) = self.frames.borrow_mut().last_mut() {
            outer.extend(frame);
        }
    }

    pub(crate) fn abort(&self) {
        let frame = self.frames.borrow_mut().pop().expect("no open transaction");

        for inverse in frame.into_iter().rev() {
            inverse();
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::cell::Cell;

    fn key() -> UsageKey {
        UsageKey::Name {
            name: Atom::from("x"),
            loc: Span::default(),
        }
    }

    #[test]
    fn notifications_reach_the_registered_callback() {
        let registry = UsageRegistry::default();
        let undo = UndoLog::default();
        let count = Rc::new(Cell::new(0));

        let observed = Rc::clone(&count);
        registry.register(&undo, key(), move |_| observed.set(observed.get() + 1));

        registry.notify(&undo, key(), UsageKind::Reference);
        registry.notify(&undo, key(), UsageKind::Reference);

        assert!(count.get() >= 1);
    }

    #[test]
    fn stacked_registrations_compose() {
        let registry = UsageRegistry::default();
        let undo = UndoLog::default();
        let first = Rc::new(Cell::new(false));
        let second = Rc::new(Cell::new(false));

        let observed = Rc::clone(&first);
        registry.register(&undo, key(), move |_| observed.set(true));
        let observed = Rc::clone(&second);
        registry.register(&undo, key(), move |_| observed.set(true));

        registry.notify(&undo, key(), UsageKind::Reference);

        assert!(first.get());
        assert!(second.get());
    }

    #[test]
    fn aborting_a_transaction_rolls_back_registrations() {
        let registry = UsageRegistry::default();
        let undo = UndoLog::default();
        let count = Rc::new(Cell::new(0));

        undo.begin();
        let observed = Rc::clone(&count);
        registry.register(&undo, key(), move |_| observed.set(observed.get() + 1));
        undo.abort();

        registry.notify(&undo, key(), UsageKind::Reference);

        assert_eq!(count.get(), 0);
    }

    #[test]
    fn ctor_facets_are_individually_undoable() {
        let registry = UsageRegistry::default();
        let undo = UndoLog::default();
        let key = UsageKey::Ctor {
            ty: Atom::from("t"),
            loc: Span::default(),
            name: Atom::from("C"),
        };

        registry.notify(&undo, key, UsageKind::Reference);

        undo.begin();
        registry.notify(&undo, key, UsageKind::Pattern);
        assert_eq!(
            registry.ctor_usage(key),
            Some(CtorUsage {
                referenced: true,
                pattern: true,
                privatize: false,
            }),
        );
        undo.abort();

        assert_eq!(
            registry.ctor_usage(key),
            Some(CtorUsage {
                referenced: true,
                pattern: false,
                privatize: false,
            }),
        );
    }
}
