//! Single-resolution async results.
//!
//! A [`Future`] is a shared handle to the eventual outcome of one async
//! operation. It starts in `Started` and makes exactly one transition, to
//! `Canceled`, `Finished`, or `Error`; after that the state never changes.
//! Whoever starts the operation keeps the handle and settles it with
//! [`Future::set_result`] / [`Future::set_exception`]; any number of readers
//! may clone the handle and inspect or register done-callbacks.
//!
//! Done-callbacks are always dispatched through the scheduler — registering
//! one on an already-settled future still delivers it on a later turn, never
//! synchronously inside the registering call.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use smallvec::SmallVec;

use crate::error::FutureError;
use crate::scheduler::{Scheduler, current_scheduler};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Status {
    Started,
    Canceled,
    Finished,
    Error,
}

/// Identifies one registered done-callback for removal.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct CallbackId(u64);

type DoneCallback<T, E> = Rc<dyn Fn(&Future<T, E>)>;

pub struct Future<T, E> {
    inner: Rc<Inner<T, E>>,
}

struct Inner<T, E> {
    status: Cell<Status>,
    result: RefCell<Option<T>>,
    error: RefCell<Option<E>>,
    callbacks: RefCell<SmallVec<[(CallbackId, DoneCallback<T, E>); 2]>>,
    next_cb: Cell<u64>,
    sched: Scheduler,
}

impl<T, E> Clone for Future<T, E> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T: Clone + 'static, E: Clone + 'static> Future<T, E> {
    /// New pending future attached to the current scheduler.
    pub fn new() -> Self {
        Self::with_scheduler(&current_scheduler())
    }

    pub fn with_scheduler(sched: &Scheduler) -> Self {
        Self {
            inner: Rc::new(Inner {
                status: Cell::new(Status::Started),
                result: RefCell::new(None),
                error: RefCell::new(None),
                callbacks: RefCell::new(SmallVec::new()),
                next_cb: Cell::new(0),
                sched: sched.clone(),
            }),
        }
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.inner.sched
    }

    pub fn status(&self) -> Status {
        self.inner.status.get()
    }

    /// Cancel the future and schedule its callbacks. Returns `false` if it
    /// was already terminal.
    pub fn cancel(&self) -> bool {
        if self.inner.status.get() != Status::Started {
            return false;
        }
        self.inner.status.set(Status::Canceled);
        self.schedule_callbacks();
        true
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.status.get() == Status::Canceled
    }

    /// Done means a result or error is available, or the future was
    /// cancelled.
    pub fn is_done(&self) -> bool {
        self.inner.status.get() != Status::Started
    }

    /// The settled value.
    ///
    /// `InvalidState` while pending, `Cancelled` after cancellation, and
    /// `Failed` carrying the stored error if the future errored.
    pub fn result(&self) -> Result<T, FutureError<E>> {
        match self.inner.status.get() {
            Status::Started => Err(FutureError::InvalidState),
            Status::Canceled => Err(FutureError::Cancelled),
            Status::Error => {
                let err = self.inner.error.borrow();
                match err.as_ref() {
                    Some(e) => Err(FutureError::Failed(e.clone())),
                    None => Err(FutureError::InvalidState),
                }
            }
            Status::Finished => {
                let res = self.inner.result.borrow();
                match res.as_ref() {
                    Some(v) => Ok(v.clone()),
                    None => Err(FutureError::InvalidState),
                }
            }
        }
    }

    /// The stored error, `Ok(None)` if the future finished cleanly.
    pub fn exception(&self) -> Result<Option<E>, FutureError<E>> {
        match self.inner.status.get() {
            Status::Started => Err(FutureError::InvalidState),
            Status::Canceled => Err(FutureError::Cancelled),
            Status::Error => Ok(self.inner.error.borrow().clone()),
            Status::Finished => Ok(None),
        }
    }

    /// Register `f` to run (with this future) once it settles. If the future
    /// is already done the callback is scheduled right away — still
    /// asynchronously.
    pub fn add_done_callback(&self, f: impl Fn(&Future<T, E>) + 'static) -> CallbackId {
        let id = CallbackId(self.inner.next_cb.get());
        self.inner.next_cb.set(id.0 + 1);
        let cb: DoneCallback<T, E> = Rc::new(f);
        if self.is_done() {
            let fut = self.clone();
            self.inner.sched.schedule(move || cb(&fut));
        } else {
            self.inner.callbacks.borrow_mut().push((id, cb));
        }
        id
    }

    /// Remove a pending done-callback. Returns whether it was still
    /// registered.
    pub fn remove_done_callback(&self, id: CallbackId) -> bool {
        let mut cbs = self.inner.callbacks.borrow_mut();
        let before = cbs.len();
        cbs.retain(|(cid, _)| *cid != id);
        cbs.len() != before
    }

    /// Mark the future finished with `result`. `InvalidState` if it is not
    /// pending anymore.
    pub fn set_result(&self, result: T) -> Result<(), FutureError<E>> {
        if self.inner.status.get() != Status::Started {
            return Err(FutureError::InvalidState);
        }
        *self.inner.result.borrow_mut() = Some(result);
        self.inner.status.set(Status::Finished);
        self.schedule_callbacks();
        Ok(())
    }

    /// Mark the future failed with `error`. `InvalidState` if it is not
    /// pending anymore.
    pub fn set_exception(&self, error: E) -> Result<(), FutureError<E>> {
        if self.inner.status.get() != Status::Started {
            return Err(FutureError::InvalidState);
        }
        *self.inner.error.borrow_mut() = Some(error);
        self.inner.status.set(Status::Error);
        self.schedule_callbacks();
        Ok(())
    }

    /// Like [`set_result`](Self::set_result) but a silent no-op when the
    /// future already settled. Returns whether the transition happened.
    pub fn try_set_result(&self, result: T) -> bool {
        match self.set_result(result) {
            Ok(()) => true,
            Err(_) => {
                log::trace!("ignored set_result on a settled future");
                false
            }
        }
    }

    /// Silent counterpart of [`set_exception`](Self::set_exception).
    pub fn try_set_exception(&self, error: E) -> bool {
        match self.set_exception(error) {
            Ok(()) => true,
            Err(_) => {
                log::trace!("ignored set_exception on a settled future");
                false
            }
        }
    }

    // Clear the pending list first so callbacks that re-register during the
    // drain end up in a fresh list, then dispatch in registration order.
    fn schedule_callbacks(&self) {
        let cbs = std::mem::take(&mut *self.inner.callbacks.borrow_mut());
        for (_, cb) in cbs {
            let fut = self.clone();
            self.inner.sched.schedule(move || cb(&fut));
        }
    }
}

impl<T: Clone + 'static, E: Clone + 'static> Default for Future<T, E> {
    fn default() -> Self {
        Self::new()
    }
}
