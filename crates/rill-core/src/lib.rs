//! # Scheduler, Futures, and Promises
//!
//! Rill's async core runs on a single logical thread with cooperative
//! macrotask scheduling — no native async runtime underneath. There are
//! three main pieces:
//!
//! - `Scheduler`: the macrotask queue; nothing ever runs synchronously
//!   inside the call that scheduled it.
//! - `Future<T, E>`: one-shot result with a terminal state machine.
//! - `Promise<T, E>`: a future with `then`/`catch` chaining, flattening,
//!   and the `all`/`race` combinators.
//!
//! ## Scheduling
//!
//! ```rust
//! use rill_core::*;
//! use web_time::Duration;
//!
//! let sched = Scheduler::new();
//! with_scheduler(&sched, || {
//!     call_soon(|| log::info!("next turn"));
//!     call_delayed(Duration::from_millis(50), || log::info!("later"));
//! });
//! sched.run_until_idle();
//! ```
//!
//! Same-turn tasks run in submission order; delayed tasks run no earlier
//! than their due time. The embedding host drives `turn()` /
//! `run_until_idle()` from its own loop.
//!
//! ## Futures
//!
//! ```rust
//! use rill_core::*;
//!
//! let sched = Scheduler::new();
//! let fut = with_scheduler(&sched, Future::<i32, String>::new);
//! fut.add_done_callback(|f| {
//!     if let Ok(v) = f.result() {
//!         log::info!("got {v}");
//!     }
//! });
//! fut.set_result(7).unwrap();
//! sched.run_until_idle(); // callback fires here, not inside set_result
//! ```
//!
//! Exactly one of `cancel`, `set_result`, `set_exception` succeeds; every
//! later attempt fails with `InvalidState` (or no-ops via the `try_set_*`
//! forms).
//!
//! ## Promises
//!
//! Handlers return a [`Completion`]: a value resolves the next link, a
//! chained promise is awaited and flattened, an error rejects.
//!
//! ```rust
//! use rill_core::*;
//!
//! let p = Promise::<i32, String>::resolved(20);
//! let doubled = p.then(|v| Completion::Value(v * 2));
//! ```
//!
//! A rejected promise nobody chains onto is stored silently; it surfaces
//! only when inspected via `result()` / `exception()` or a later `catch`.

pub mod error;
pub mod future;
pub mod prelude;
pub mod promise;
pub mod scheduler;
pub mod tests;

pub use error::*;
pub use future::*;
pub use prelude::*;
pub use promise::*;
pub use scheduler::*;
