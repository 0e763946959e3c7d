//! # Observables and Bindings
//!
//! Rill's stream layer sits on top of `rill-core`'s scheduler and promises.
//! There are three main pieces:
//!
//! - `Observable<T, E>`: a multi-subscriber push stream; every subscriber
//!   gets its own sid and its own terminal event.
//! - Operators: `map`, `try_map`, `filter`, `take`, plus `to_promise` to
//!   bridge a stream's first emission into a promise.
//! - `Model` / `BindingSpec`: reactive attributes with echo suppression,
//!   the bridge between mutable state and the observable protocol.
//!
//! ## Streams
//!
//! ```rust
//! use rill_core::*;
//! use rill_reactive::*;
//!
//! let sched = Scheduler::new();
//! with_scheduler(&sched, || {
//!     let doubled = Observable::<i64, String>::range(0, 3, 1).map(|v| v * 2);
//!     let sub = doubled.subscribe(|v| log::info!("got {v}"));
//!     sched.run_until_idle(); // logs 0, 2, 4; delivery is never synchronous
//!     sub.unsubscribe();
//! });
//! ```
//!
//! ## Bindings
//!
//! Declare attributes with defaults, compose specs when a type extends
//! another, and subscribe to slots as ordinary observables:
//!
//! ```rust
//! use rill_core::*;
//! use rill_reactive::*;
//!
//! let sched = Scheduler::new();
//! with_scheduler(&sched, || {
//!     let spec = BindingSpec::new().bind("count", 0i32);
//!     let model = Model::new(&spec);
//!
//!     let count = model.attr("count").unwrap();
//!     let _sub = count.subscribe(|v| {
//!         if let Some(n) = v.downcast_ref::<i32>() {
//!             log::info!("count = {n}");
//!         }
//!     });
//!
//!     model.set("count", value(10i32));
//!     sched.run_until_idle();
//! });
//! ```
//!
//! Writes carry an optional [`Who`] token; subscribers registered under the
//! same token are skipped, which is what keeps two-way bindings from
//! looping. Pointed handles (`model.attr_pointed("user", "name")`) watch a
//! property of the held value instead of the value itself.

pub mod binding;
pub mod error;
pub mod observable;
pub mod operators;
pub mod prelude;
pub mod transport;

pub use binding::*;
pub use error::*;
pub use observable::*;
pub use prelude::*;
pub use transport::*;
