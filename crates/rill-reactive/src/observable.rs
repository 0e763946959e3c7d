//! Multi-subscriber push streams.
//!
//! An [`Observable`] delivers a sequence of values to each subscriber
//! independently: every `subscribe` mints a fresh subscription id (`Sid`)
//! and runs the node's production hook for it. A subscriber's stream ends
//! with exactly one `complete` or `error` for its sid; other sids on the
//! same node are unaffected.
//!
//! Delivery is always deferred through the scheduler — `next` inside a
//! mutation never reaches a subscriber synchronously. The one exception is
//! fetch mode ([`Observable::fetch`]), where a source that knows its current
//! value short-circuits and answers before returning.

use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};
use std::sync::atomic::{AtomicU64, Ordering};

use slotmap::{SlotMap, new_key_type};

use rill_core::scheduler::{Scheduler, current_scheduler};

use crate::error::FetchError;

new_key_type! {
    /// Subscription id: unique per `subscribe` call on a given node.
    pub struct Sid;
}

/// Opaque identity token for the originator of a write.
///
/// Part of the subscription contract: a subscriber registered with a `Who`
/// is skipped when a change is written under the same token, which is what
/// keeps two-way bindings from echoing each other forever. Tokens compare
/// by value and are cheap to clone.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Who(u64);

static NEXT_WHO: AtomicU64 = AtomicU64::new(1);

impl Who {
    pub fn new() -> Self {
        Self(NEXT_WHO.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for Who {
    fn default() -> Self {
        Self::new()
    }
}

/// What a production hook learns about the subscribe call it serves.
pub struct SubscribeOptions {
    pub who: Option<Who>,
    pub fetch: bool,
}

/// Subscriber callbacks plus the optional `who` identity.
pub struct Observer<T, E> {
    pub(crate) next: Rc<dyn Fn(T)>,
    pub(crate) error: Option<Rc<dyn Fn(E)>>,
    pub(crate) complete: Option<Rc<dyn Fn()>>,
    pub(crate) who: Option<Who>,
}

impl<T, E> Observer<T, E> {
    pub fn new(on_next: impl Fn(T) + 'static) -> Self {
        Self {
            next: Rc::new(on_next),
            error: None,
            complete: None,
            who: None,
        }
    }

    pub fn on_error(mut self, f: impl Fn(E) + 'static) -> Self {
        self.error = Some(Rc::new(f));
        self
    }

    pub fn on_completed(mut self, f: impl Fn() + 'static) -> Self {
        self.complete = Some(Rc::new(f));
        self
    }

    pub fn who(mut self, who: Who) -> Self {
        self.who = Some(who);
        self
    }
}

/// Production hook: runs once per subscribe with the fresh sid. Returning
/// `Some(value)` answers a fetch-mode subscribe synchronously.
type Hook<T, E> = Box<dyn Fn(&Observable<T, E>, Sid, &SubscribeOptions) -> Option<T>>;

struct Entry<T, E> {
    next: Rc<dyn Fn(T)>,
    error: Option<Rc<dyn Fn(E)>>,
    complete: Option<Rc<dyn Fn()>>,
    closing: Cell<bool>,
    teardown: RefCell<Option<Box<dyn FnOnce()>>>,
}

struct Node<T, E> {
    subs: RefCell<SlotMap<Sid, Entry<T, E>>>,
    hook: Hook<T, E>,
    sched: Scheduler,
}

pub struct Observable<T, E> {
    node: Rc<Node<T, E>>,
}

impl<T, E> Clone for Observable<T, E> {
    fn clone(&self) -> Self {
        Self {
            node: self.node.clone(),
        }
    }
}

pub struct WeakObservable<T, E>(Weak<Node<T, E>>);

impl<T, E> Clone for WeakObservable<T, E> {
    fn clone(&self) -> Self {
        Self(self.0.clone())
    }
}

impl<T, E> WeakObservable<T, E> {
    pub fn upgrade(&self) -> Option<Observable<T, E>> {
        self.0.upgrade().map(|node| Observable { node })
    }
}

/// Disposes one subscription. Disposal is explicit — dropping the handle
/// leaves the subscription alive.
pub struct Subscription {
    sid: Sid,
    cancel: Box<dyn FnOnce()>,
}

impl Subscription {
    pub fn sid(&self) -> Sid {
        self.sid
    }

    pub fn unsubscribe(self) {
        (self.cancel)();
    }
}

enum Terminal<E> {
    Completed,
    Errored(E),
}

impl<T: Clone + 'static, E: Clone + 'static> Observable<T, E> {
    /// Build a node from a production hook, attached to the current
    /// scheduler.
    pub fn from_hook(
        hook: impl Fn(&Observable<T, E>, Sid, &SubscribeOptions) -> Option<T> + 'static,
    ) -> Self {
        Self {
            node: Rc::new(Node {
                subs: RefCell::new(SlotMap::with_key()),
                hook: Box::new(hook),
                sched: current_scheduler(),
            }),
        }
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.node.sched
    }

    pub fn downgrade(&self) -> WeakObservable<T, E> {
        WeakObservable(Rc::downgrade(&self.node))
    }

    pub fn subscriber_count(&self) -> usize {
        self.node.subs.borrow().len()
    }

    pub fn subscribe(&self, on_next: impl Fn(T) + 'static) -> Subscription {
        self.subscribe_observer(Observer::new(on_next))
    }

    /// Allocate a fresh sid for `observer` and run the production hook for
    /// it.
    pub fn subscribe_observer(&self, observer: Observer<T, E>) -> Subscription {
        let who = observer.who.clone();
        let sid = self.node.subs.borrow_mut().insert(Entry {
            next: observer.next,
            error: observer.error,
            complete: observer.complete,
            closing: Cell::new(false),
            teardown: RefCell::new(None),
        });
        let opts = SubscribeOptions { who, fetch: false };
        (self.node.hook)(self, sid, &opts);

        let weak = Rc::downgrade(&self.node);
        Subscription {
            sid,
            cancel: Box::new(move || {
                if let Some(node) = weak.upgrade() {
                    Node::drop_entry(&node, sid);
                }
            }),
        }
    }

    /// Fetch-mode subscribe: ask for the current value synchronously instead
    /// of a deferred stream. Leaves no subscription behind.
    pub fn fetch(&self) -> Result<T, FetchError> {
        let sid = self.node.subs.borrow_mut().insert(Entry {
            next: Rc::new(|_| {}),
            error: None,
            complete: None,
            closing: Cell::new(false),
            teardown: RefCell::new(None),
        });
        let opts = SubscribeOptions {
            who: None,
            fetch: true,
        };
        let got = (self.node.hook)(self, sid, &opts);
        Node::drop_entry(&self.node, sid);
        got.ok_or(FetchError::Unsupported)
    }

    /// Deliver one value to the subscriber behind `sid`, on a later turn.
    /// Calls for a closed or unknown sid are dropped.
    pub fn next(&self, value: T, sid: Sid) {
        {
            let subs = self.node.subs.borrow();
            match subs.get(sid) {
                Some(entry) if !entry.closing.get() => {}
                _ => {
                    log::warn!("dropped next() for a closed or unknown subscription");
                    return;
                }
            }
        }
        let weak = Rc::downgrade(&self.node);
        self.node.sched.schedule(move || {
            let Some(node) = weak.upgrade() else { return };
            // Entry may have been unsubscribed while queued.
            let cb = node.subs.borrow().get(sid).map(|e| e.next.clone());
            if let Some(cb) = cb {
                cb(value);
            }
        });
    }

    /// End the stream for `sid` with an error. Terminal per sid.
    pub fn error(&self, error: E, sid: Sid) {
        self.terminate(sid, Terminal::Errored(error));
    }

    /// End the stream for `sid` normally. Terminal per sid.
    pub fn complete(&self, sid: Sid) {
        self.terminate(sid, Terminal::Completed);
    }

    fn terminate(&self, sid: Sid, terminal: Terminal<E>) {
        {
            let subs = self.node.subs.borrow();
            match subs.get(sid) {
                Some(entry) if !entry.closing.get() => entry.closing.set(true),
                _ => {
                    log::warn!("dropped terminal event for a closed or unknown subscription");
                    return;
                }
            }
        }
        // Values queued before this point still deliver first (FIFO); the
        // entry itself is only removed once the terminal callback has run.
        let weak = Rc::downgrade(&self.node);
        self.node.sched.schedule(move || {
            let Some(node) = weak.upgrade() else { return };
            let cbs = node
                .subs
                .borrow()
                .get(sid)
                .map(|e| (e.error.clone(), e.complete.clone()));
            let Some((on_error, on_complete)) = cbs else { return };
            match terminal {
                Terminal::Errored(e) => {
                    if let Some(f) = on_error {
                        f(e);
                    }
                }
                Terminal::Completed => {
                    if let Some(f) = on_complete {
                        f();
                    }
                }
            }
            Node::drop_entry(&node, sid);
        });
    }

    /// Attach a cleanup run when `sid` is unsubscribed or terminated.
    /// Operators use this to release their upstream subscription.
    pub fn set_teardown(&self, sid: Sid, f: impl FnOnce() + 'static) {
        if let Some(entry) = self.node.subs.borrow().get(sid) {
            *entry.teardown.borrow_mut() = Some(Box::new(f));
        }
    }

    // --- sources ---

    /// Emit every element of `items` to each subscriber, then complete.
    pub fn from_iter(items: impl IntoIterator<Item = T>) -> Self {
        let items: Rc<Vec<T>> = Rc::new(items.into_iter().collect());
        Self::from_hook(move |obs, sid, opts| {
            if opts.fetch {
                return None;
            }
            for v in items.iter() {
                obs.next(v.clone(), sid);
            }
            obs.complete(sid);
            None
        })
    }

    /// A one-value stream.
    pub fn just(value: T) -> Self {
        Self::from_iter([value])
    }

    /// A stream that errors immediately for every subscriber.
    pub fn throw(error: E) -> Self {
        Self::from_hook(move |obs, sid, opts| {
            if opts.fetch {
                return None;
            }
            obs.error(error.clone(), sid);
            None
        })
    }
}

impl<E: Clone + 'static> Observable<i64, E> {
    /// `count` values starting at `start`, stepping by `step`.
    pub fn range(start: i64, count: usize, step: i64) -> Self {
        Self::from_hook(move |obs, sid, opts| {
            if opts.fetch {
                return None;
            }
            for i in 0..count {
                obs.next(start + i as i64 * step, sid);
            }
            obs.complete(sid);
            None
        })
    }
}

impl<T, E> Node<T, E> {
    fn drop_entry(node: &Rc<Node<T, E>>, sid: Sid) {
        let entry = node.subs.borrow_mut().remove(sid);
        if let Some(entry) = entry
            && let Some(teardown) = entry.teardown.borrow_mut().take()
        {
            teardown();
        }
    }
}
