//! Macrotask scheduler.
//!
//! Every callback in the engine — future settlement, observable delivery,
//! binding notifications — goes through here. A callback is never run inside
//! the call that scheduled it; execution only ever happens in an explicit
//! [`Scheduler::turn`] (one macrotask turn) or [`Scheduler::run_until_idle`].
//!
//! Ordering guarantees:
//! - tasks with the same due time run in submission (FIFO) order,
//! - across different delays, order follows the due time,
//! - a task scheduled from inside a turn runs on a later turn.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use slotmap::{SlotMap, new_key_type};
use web_time::{Duration, Instant};

new_key_type! {
    /// Handle returned by `schedule*`, usable for best-effort cancellation.
    pub struct TaskId;
}

/// Time source for delayed tasks. Platform installs [`SystemClock`]; tests
/// drive a [`TestClock`] deterministically.
pub trait Clock {
    fn now(&self) -> Instant;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// A test clock you can advance by hand.
pub struct TestClock {
    t: Cell<Instant>,
}

impl TestClock {
    pub fn starting_now() -> Rc<Self> {
        Rc::new(Self {
            t: Cell::new(Instant::now()),
        })
    }

    pub fn advance(&self, d: Duration) {
        self.t.set(self.t.get() + d);
    }
}

impl Clock for TestClock {
    fn now(&self) -> Instant {
        self.t.get()
    }
}

struct Task {
    due: Instant,
    seq: u64,
    run: Box<dyn FnOnce()>,
}

/// Cloneable handle to a macrotask queue.
#[derive(Clone)]
pub struct Scheduler {
    inner: Rc<SchedInner>,
}

struct SchedInner {
    tasks: RefCell<SlotMap<TaskId, Task>>,
    next_seq: Cell<u64>,
    clock: Rc<dyn Clock>,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::with_clock(Rc::new(SystemClock))
    }

    pub fn with_clock(clock: Rc<dyn Clock>) -> Self {
        Self {
            inner: Rc::new(SchedInner {
                tasks: RefCell::new(SlotMap::with_key()),
                next_seq: Cell::new(0),
                clock,
            }),
        }
    }

    /// Enqueue `f` for the next turn.
    pub fn schedule(&self, f: impl FnOnce() + 'static) -> TaskId {
        self.schedule_after(Duration::ZERO, f)
    }

    /// Enqueue `f` to run no earlier than `delay` from now.
    pub fn schedule_after(&self, delay: Duration, f: impl FnOnce() + 'static) -> TaskId {
        let seq = self.inner.next_seq.get();
        self.inner.next_seq.set(seq + 1);
        self.inner.tasks.borrow_mut().insert(Task {
            due: self.inner.clock.now() + delay,
            seq,
            run: Box::new(f),
        })
    }

    /// Best-effort cancel. Returns `false` if the task already ran or the
    /// id is unknown.
    pub fn cancel(&self, id: TaskId) -> bool {
        self.inner.tasks.borrow_mut().remove(id).is_some()
    }

    pub fn has_pending(&self) -> bool {
        !self.inner.tasks.borrow().is_empty()
    }

    /// Due time of the earliest pending task, if any.
    pub fn next_due(&self) -> Option<Instant> {
        self.inner.tasks.borrow().values().map(|t| t.due).min()
    }

    /// Run one macrotask turn: every task due at entry, in (due, seq) order.
    /// Tasks scheduled while the turn runs are left for a later turn.
    /// Returns the number of tasks run.
    pub fn turn(&self) -> usize {
        let now = self.inner.clock.now();
        let mut due: Vec<(Instant, u64, TaskId)> = self
            .inner
            .tasks
            .borrow()
            .iter()
            .filter(|(_, t)| t.due <= now)
            .map(|(id, t)| (t.due, t.seq, id))
            .collect();
        due.sort_unstable_by_key(|&(due, seq, _)| (due, seq));

        let mut ran = 0;
        for (_, _, id) in due {
            // A task may cancel a sibling mid-turn, so re-check presence.
            let task = self.inner.tasks.borrow_mut().remove(id);
            if let Some(task) = task {
                (task.run)();
                ran += 1;
            }
        }
        ran
    }

    /// Pump turns until nothing more is due at the current clock reading.
    /// Returns the total number of tasks run.
    pub fn run_until_idle(&self) -> usize {
        let mut total = 0;
        loop {
            let ran = self.turn();
            if ran == 0 {
                return total;
            }
            total += ran;
        }
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

thread_local! {
    static SCHEDULERS: RefCell<Vec<Scheduler>> = const { RefCell::new(Vec::new()) };
}

/// The scheduler new futures and observables attach to. A default instance
/// is installed lazily if none was provided via [`with_scheduler`].
pub fn current_scheduler() -> Scheduler {
    SCHEDULERS.with(|st| {
        let mut st = st.borrow_mut();
        if st.is_empty() {
            st.push(Scheduler::new());
        }
        st.last().expect("scheduler stack is non-empty").clone()
    })
}

/// Run `f` with `sched` installed as the current scheduler.
pub fn with_scheduler<R>(sched: &Scheduler, f: impl FnOnce() -> R) -> R {
    // Guard pops on unwind too.
    struct Guard;
    impl Drop for Guard {
        fn drop(&mut self) {
            SCHEDULERS.with(|st| {
                st.borrow_mut().pop();
            });
        }
    }
    SCHEDULERS.with(|st| st.borrow_mut().push(sched.clone()));
    let _guard = Guard;
    f()
}

/// Enqueue on the current scheduler for the next turn.
pub fn call_soon(f: impl FnOnce() + 'static) -> TaskId {
    current_scheduler().schedule(f)
}

/// Enqueue on the current scheduler after `delay`.
pub fn call_delayed(delay: Duration, f: impl FnOnce() + 'static) -> TaskId {
    current_scheduler().schedule_after(delay, f)
}

/// Cancel a task on the current scheduler.
pub fn call_cancel(id: TaskId) -> bool {
    current_scheduler().cancel(id)
}
