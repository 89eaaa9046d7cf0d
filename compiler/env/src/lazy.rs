//! Compute-once cells with failure caching.

use std::cell::RefCell;

/// A memoized deferred computation.
///
/// Forcing runs the computation at most once. A failed computation is cached
/// like a success: re-forcing re-surfaces the same error instead of retrying —
/// a module that does not exist is a stable failure, not a flaky one.
pub(crate) struct ComputeOnce<I, T, E> {
    state: RefCell<State<I, T, E>>,
}

enum State<I, T, E> {
    NotStarted(I),
    /// Currently being forced; observing this means the computation reached itself.
    Running,
    Done(T),
    Failed(E),
}

impl<I, T: Clone, E: Clone> ComputeOnce<I, T, E> {
    pub(crate) fn new(inputs: I) -> Self {
        Self {
            state: RefCell::new(State::NotStarted(inputs)),
        }
    }

    pub(crate) fn force(
        &self,
        compute: impl FnOnce(I) -> Result<T, E>,
        on_cycle: impl FnOnce() -> E,
    ) -> Result<T, E> {
        {
            let mut state = self.state.borrow_mut();

            match &*state {
                State::Done(value) => return Ok(value.clone()),
                State::Failed(error) => return Err(error.clone()),
                State::Running => return Err(on_cycle()),
                State::NotStarted(_) => {}
            }

            let State::NotStarted(inputs) = std::mem::replace(&mut *state, State::Running) else {
                unreachable!();
            };
            drop(state);

            let result = compute(inputs);

            *self.state.borrow_mut() = match &result {
                Ok(value) => State::Done(value.clone()),
                Err(error) => State::Failed(error.clone()),
            };

            result
        }
    }

}

#[cfg(test)]
mod test {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn forcing_twice_computes_once() {
        let cell = ComputeOnce::<u32, u32, ()>::new(20);
        let runs = Cell::new(0);

        let mut force = || {
            cell.force(
                |input| {
                    runs.set(runs.get() + 1);
                    Ok(input + 1)
                },
                || (),
            )
        };

        assert_eq!(force(), Ok(21));
        assert_eq!(force(), Ok(21));
        assert_eq!(runs.get(), 1);
    }

    #[test]
    fn failures_are_cached_not_retried() {
        let cell = ComputeOnce::<(), u32, &str>::new(());
        let runs = Cell::new(0);

        let mut force = || {
            cell.force(
                |()| {
                    runs.set(runs.get() + 1);
                    Err("missing")
                },
                || "cycle",
            )
        };

        assert_eq!(force(), Err("missing"));
        assert_eq!(force(), Err("missing"));
        assert_eq!(runs.get(), 1);
    }
}
