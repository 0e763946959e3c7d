//! Promise chaining on top of [`Future`].
//!
//! A [`Promise`] is a future with combinators. Handlers return a
//! [`Completion`]: a plain value resolves the next link, a chained promise
//! is awaited and flattened through (to any depth), and an error rejects.
//! Rejections nobody chains onto stay stored silently until something
//! inspects the promise — that is deliberate, not a leak.

use std::cell::{Cell, RefCell};
use std::ops::Deref;
use std::rc::Rc;

use web_time::Duration;

use crate::error::FutureError;
use crate::future::Future;
use crate::scheduler::Scheduler;

/// Outcome fed to a promise, or returned from a `then`/`catch` handler.
pub enum Completion<T, E> {
    /// Settle with this value.
    Value(T),
    /// Wait for another promise and take its outcome.
    Chain(Promise<T, E>),
    /// Settle as failed with this error.
    Error(E),
}

pub struct Promise<T, E> {
    fut: Future<T, E>,
}

impl<T, E> Clone for Promise<T, E> {
    fn clone(&self) -> Self {
        Self {
            fut: self.fut.clone(),
        }
    }
}

impl<T, E> Deref for Promise<T, E> {
    type Target = Future<T, E>;

    fn deref(&self) -> &Future<T, E> {
        &self.fut
    }
}

/// Resolve-side handle given to executors.
pub struct Resolver<T, E>(Promise<T, E>);

/// Reject-side handle given to executors.
pub struct Rejector<T, E>(Promise<T, E>);

impl<T, E> Clone for Resolver<T, E> {
    fn clone(&self) -> Self {
        Self(self.0.clone())
    }
}

impl<T, E> Clone for Rejector<T, E> {
    fn clone(&self) -> Self {
        Self(self.0.clone())
    }
}

impl<T: Clone + 'static, E: Clone + 'static> Resolver<T, E> {
    pub fn resolve(&self, value: T) {
        self.0.resolve(value);
    }

    pub fn resolve_after(&self, delay: Duration, value: T) {
        self.0.resolve_after(delay, value);
    }

    pub fn chain(&self, target: &Promise<T, E>) {
        self.0.chain(target);
    }
}

impl<T: Clone + 'static, E: Clone + 'static> Rejector<T, E> {
    pub fn reject(&self, error: E) {
        self.0.reject(error);
    }

    pub fn reject_after(&self, delay: Duration, error: E) {
        self.0.reject_after(delay, error);
    }
}

impl<T: Clone + 'static, E: Clone + 'static> Promise<T, E> {
    /// A promise nothing has settled yet.
    pub fn pending() -> Self {
        Self {
            fut: Future::new(),
        }
    }

    pub fn with_scheduler(sched: &Scheduler) -> Self {
        Self {
            fut: Future::with_scheduler(sched),
        }
    }

    /// Run `executor` with the resolve/reject handles. An `Err` return
    /// rejects the promise immediately (unless the executor already settled
    /// it).
    pub fn new(
        executor: impl FnOnce(Resolver<T, E>, Rejector<T, E>) -> Result<(), E>,
    ) -> Self {
        let p = Self::pending();
        if let Err(e) = executor(Resolver(p.clone()), Rejector(p.clone())) {
            p.fut.try_set_exception(e);
        }
        p
    }

    /// Two-installer construction: the resolve and reject sides are wired up
    /// by separate callables.
    pub fn split(
        with_resolver: impl FnOnce(Resolver<T, E>) -> Result<(), E>,
        with_rejector: impl FnOnce(Rejector<T, E>) -> Result<(), E>,
    ) -> Self {
        let p = Self::pending();
        let outcome =
            with_resolver(Resolver(p.clone())).and_then(|()| with_rejector(Rejector(p.clone())));
        if let Err(e) = outcome {
            p.fut.try_set_exception(e);
        }
        p
    }

    /// An immediately-resolved promise.
    pub fn resolved(value: T) -> Self {
        let p = Self::pending();
        p.resolve(value);
        p
    }

    /// An immediately-rejected promise.
    pub fn rejected(error: E) -> Self {
        let p = Self::pending();
        p.reject(error);
        p
    }

    pub fn future(&self) -> &Future<T, E> {
        &self.fut
    }

    /// Settle with `value`. A no-op if the promise already settled.
    pub fn resolve(&self, value: T) {
        self.fut.try_set_result(value);
    }

    /// Settle with `value` after `delay`, via the scheduler.
    pub fn resolve_after(&self, delay: Duration, value: T) {
        let fut = self.fut.clone();
        self.fut.scheduler().schedule_after(delay, move || {
            fut.try_set_result(value);
        });
    }

    /// Fail with `error`. A no-op if the promise already settled.
    pub fn reject(&self, error: E) {
        self.fut.try_set_exception(error);
    }

    pub fn reject_after(&self, delay: Duration, error: E) {
        let fut = self.fut.clone();
        self.fut.scheduler().schedule_after(delay, move || {
            fut.try_set_exception(error);
        });
    }

    /// Take the outcome of `target` once it settles. Chained targets that
    /// are themselves chained collapse recursively to one final outcome;
    /// cancellation of the target cancels this promise too.
    pub fn chain(&self, target: &Promise<T, E>) {
        self.chain_impl(target, None);
    }

    /// Like [`chain`](Self::chain), but the settle is additionally delayed.
    pub fn chain_after(&self, delay: Duration, target: &Promise<T, E>) {
        self.chain_impl(target, Some(delay));
    }

    fn chain_impl(&self, target: &Promise<T, E>, delay: Option<Duration>) {
        let this = self.clone();
        target.fut.add_done_callback(move |fut| {
            if fut.is_cancelled() {
                this.fut.cancel();
                return;
            }
            match fut.result() {
                Ok(v) => match delay {
                    Some(d) => this.resolve_after(d, v),
                    None => this.resolve(v),
                },
                Err(FutureError::Failed(e)) => match delay {
                    Some(d) => this.reject_after(d, e),
                    None => this.reject(e),
                },
                // Done and not cancelled leaves only the arms above.
                Err(_) => {}
            }
        });
    }

    /// Route a [`Completion`] to resolve / chain / reject.
    pub fn settle(&self, completion: Completion<T, E>) {
        match completion {
            Completion::Value(v) => self.resolve(v),
            Completion::Chain(p) => self.chain(&p),
            Completion::Error(e) => self.reject(e),
        }
    }

    /// Returns a promise settled from `on_fulfilled`'s completion once this
    /// one fulfills. Rejections propagate unchanged; cancellation cancels
    /// the returned promise without invoking the handler.
    pub fn then<U: Clone + 'static>(
        &self,
        on_fulfilled: impl Fn(T) -> Completion<U, E> + 'static,
    ) -> Promise<U, E> {
        let out = Promise::<U, E>::with_scheduler(self.fut.scheduler());
        let link = out.clone();
        self.fut.add_done_callback(move |fut| {
            if fut.is_cancelled() {
                link.fut.cancel();
                return;
            }
            match fut.result() {
                Ok(v) => link.settle(on_fulfilled(v)),
                Err(FutureError::Failed(e)) => link.reject(e),
                Err(_) => {}
            }
        });
        out
    }

    /// Returns a promise settled from `on_rejected`'s completion if this one
    /// rejects; fulfillment passes through unchanged.
    pub fn catch(&self, on_rejected: impl Fn(E) -> Completion<T, E> + 'static) -> Promise<T, E> {
        let out = Promise::<T, E>::with_scheduler(self.fut.scheduler());
        let link = out.clone();
        self.fut.add_done_callback(move |fut| {
            if fut.is_cancelled() {
                link.fut.cancel();
                return;
            }
            match fut.result() {
                Ok(v) => link.resolve(v),
                Err(FutureError::Failed(e)) => link.settle(on_rejected(e)),
                Err(_) => {}
            }
        });
        out
    }

    /// Both handlers at once, like `then(f).catch(g)` but with `g` also
    /// seeing rejections of this promise directly.
    pub fn then_catch<U: Clone + 'static>(
        &self,
        on_fulfilled: impl Fn(T) -> Completion<U, E> + 'static,
        on_rejected: impl Fn(E) -> Completion<U, E> + 'static,
    ) -> Promise<U, E> {
        let out = Promise::<U, E>::with_scheduler(self.fut.scheduler());
        let link = out.clone();
        self.fut.add_done_callback(move |fut| {
            if fut.is_cancelled() {
                link.fut.cancel();
                return;
            }
            match fut.result() {
                Ok(v) => link.settle(on_fulfilled(v)),
                Err(FutureError::Failed(e)) => link.settle(on_rejected(e)),
                Err(_) => {}
            }
        });
        out
    }

    /// Await every input, preserving input order in the result. Plain values
    /// count as already resolved; if no input is pending the promise settles
    /// without touching the scheduler. The first rejection wins and the rest
    /// are not awaited.
    pub fn all(inputs: Vec<Completion<T, E>>) -> Promise<Vec<T>, E> {
        let out = Promise::<Vec<T>, E>::pending();
        let n = inputs.len();
        let results: Rc<RefCell<Vec<Option<T>>>> = Rc::new(RefCell::new(vec![None; n]));

        let mut waiting = Vec::new();
        for (i, input) in inputs.into_iter().enumerate() {
            match input {
                Completion::Value(v) => results.borrow_mut()[i] = Some(v),
                Completion::Error(e) => {
                    out.reject(e);
                    return out;
                }
                Completion::Chain(p) => waiting.push((i, p)),
            }
        }

        if waiting.is_empty() {
            let vals: Vec<T> = results.borrow_mut().iter_mut().filter_map(Option::take).collect();
            out.resolve(vals);
            return out;
        }

        let remaining = Rc::new(Cell::new(waiting.len()));
        for (i, p) in waiting {
            let out = out.clone();
            let results = results.clone();
            let remaining = remaining.clone();
            let rejecting = out.clone();
            p.then(move |v| {
                results.borrow_mut()[i] = Some(v.clone());
                let left = remaining.get() - 1;
                remaining.set(left);
                if left == 0 {
                    let vals: Vec<T> =
                        results.borrow_mut().iter_mut().filter_map(Option::take).collect();
                    out.resolve(vals);
                }
                Completion::Value(v)
            })
            .catch(move |e| {
                rejecting.reject(e.clone());
                Completion::Error(e)
            });
        }
        out
    }

    /// Settle with the first input to settle, scanning in order: cancelled
    /// targets are skipped, an already-settled target or a plain value wins
    /// immediately, and with no inputs the promise never settles.
    pub fn race(inputs: Vec<Completion<T, E>>) -> Promise<T, E> {
        let out = Promise::<T, E>::pending();
        let mut waiting = Vec::new();

        for input in inputs {
            match input {
                Completion::Value(v) => {
                    out.resolve(v);
                    waiting.clear();
                    break;
                }
                Completion::Error(e) => {
                    out.reject(e);
                    waiting.clear();
                    break;
                }
                Completion::Chain(p) => {
                    if p.is_cancelled() {
                        continue;
                    }
                    if p.is_done() {
                        match p.result() {
                            Ok(v) => out.resolve(v),
                            Err(FutureError::Failed(e)) => out.reject(e),
                            Err(_) => {}
                        }
                        waiting.clear();
                        break;
                    }
                    waiting.push(p);
                }
            }
        }

        for p in waiting {
            let winner = out.clone();
            let loser = out.clone();
            p.then(move |v| {
                winner.resolve(v.clone());
                Completion::Value(v)
            })
            .catch(move |e| {
                loser.reject(e.clone());
                Completion::Error(e)
            });
        }
        out
    }
}

impl<T: Clone + 'static, E: Clone + 'static> Default for Promise<T, E> {
    fn default() -> Self {
        Self::pending()
    }
}
