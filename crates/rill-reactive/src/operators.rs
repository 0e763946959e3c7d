//! Stream operators.
//!
//! An operator is itself an [`Observable`]: for every downstream subscribe
//! it takes its own subscription on the upstream node, transforms values in
//! its own `on_next`, and republishes to the downstream sid. Errors and
//! completion pass through unless the operator says otherwise, and tearing
//! down the downstream subscription releases the upstream one.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use rill_core::promise::Promise;

use crate::observable::{Observable, Observer, Subscription};

impl<T: Clone + 'static, E: Clone + 'static> Observable<T, E> {
    /// Republish each value as `f(value)`.
    pub fn map<U: Clone + 'static>(&self, f: impl Fn(T) -> U + 'static) -> Observable<U, E> {
        let f = Rc::new(f);
        self.lift(move |v| Some(Ok(f(v))))
    }

    /// Like [`map`](Self::map), but the closure may fail; an `Err` becomes
    /// the stream error for that subscriber.
    pub fn try_map<U: Clone + 'static>(
        &self,
        f: impl Fn(T) -> Result<U, E> + 'static,
    ) -> Observable<U, E> {
        let f = Rc::new(f);
        self.lift(move |v| Some(f(v)))
    }

    /// Republish only the values `pred` accepts.
    pub fn filter(&self, pred: impl Fn(&T) -> bool + 'static) -> Observable<T, E> {
        let pred = Rc::new(pred);
        self.lift(move |v| if pred(&v) { Some(Ok(v)) } else { None })
    }

    // Shared per-value plumbing for the stateless operators: `step` maps a
    // value to nothing (skip), a downstream value, or a downstream error.
    fn lift<U: Clone + 'static>(
        &self,
        step: impl Fn(T) -> Option<Result<U, E>> + 'static,
    ) -> Observable<U, E> {
        let upstream = self.clone();
        let step = Rc::new(step);
        Observable::from_hook(move |down, dsid, opts| {
            if opts.fetch {
                // Answer through the upstream's current value if it has one.
                return match upstream.fetch() {
                    Ok(v) => match step(v) {
                        Some(Ok(u)) => Some(u),
                        _ => None,
                    },
                    Err(_) => None,
                };
            }
            let weak = down.downgrade();
            let weak_err = weak.clone();
            let weak_done = weak.clone();
            let step = step.clone();
            let sub = upstream.subscribe_observer(
                Observer::new(move |v| {
                    let Some(down) = weak.upgrade() else { return };
                    match step(v) {
                        Some(Ok(u)) => down.next(u, dsid),
                        Some(Err(e)) => down.error(e, dsid),
                        None => {}
                    }
                })
                .on_error(move |e| {
                    if let Some(down) = weak_err.upgrade() {
                        down.error(e, dsid);
                    }
                })
                .on_completed(move || {
                    if let Some(down) = weak_done.upgrade() {
                        down.complete(dsid);
                    }
                }),
            );
            down.set_teardown(dsid, move || sub.unsubscribe());
            None
        })
    }

    /// Republish the first `n` values, then complete and drop the upstream
    /// subscription.
    pub fn take(&self, n: usize) -> Observable<T, E> {
        let upstream = self.clone();
        Observable::from_hook(move |down, dsid, opts| {
            if opts.fetch {
                return upstream.fetch().ok();
            }
            if n == 0 {
                down.complete(dsid);
                return None;
            }
            let seen = Rc::new(Cell::new(0usize));
            let handle: Rc<RefCell<Option<Subscription>>> = Rc::new(RefCell::new(None));

            let weak = down.downgrade();
            let weak_err = weak.clone();
            let weak_done = weak.clone();
            let handle_next = handle.clone();
            let sub = upstream.subscribe_observer(
                Observer::new(move |v| {
                    let Some(down) = weak.upgrade() else { return };
                    if seen.get() >= n {
                        return;
                    }
                    seen.set(seen.get() + 1);
                    down.next(v, dsid);
                    if seen.get() == n {
                        down.complete(dsid);
                        if let Some(sub) = handle_next.borrow_mut().take() {
                            sub.unsubscribe();
                        }
                    }
                })
                .on_error(move |e| {
                    if let Some(down) = weak_err.upgrade() {
                        down.error(e, dsid);
                    }
                })
                .on_completed(move || {
                    if let Some(down) = weak_done.upgrade() {
                        down.complete(dsid);
                    }
                }),
            );
            *handle.borrow_mut() = Some(sub);
            let handle_td = handle.clone();
            down.set_teardown(dsid, move || {
                if let Some(sub) = handle_td.borrow_mut().take() {
                    sub.unsubscribe();
                }
            });
            None
        })
    }

    /// Bridge into a promise: subscribes immediately, resolves with the
    /// first value or rejects with the first error, and discards whatever
    /// the stream emits afterwards.
    pub fn to_promise(&self) -> Promise<T, E> {
        let promise = Promise::with_scheduler(self.scheduler());
        let resolve = promise.clone();
        let reject = promise.clone();
        let _sub = self.subscribe_observer(
            Observer::new(move |v| resolve.resolve(v)).on_error(move |e| reject.reject(e)),
        );
        promise
    }
}
