pub use crate::error::FutureError;
pub use crate::future::{CallbackId, Future, Status};
pub use crate::promise::{Completion, Promise, Rejector, Resolver};
pub use crate::scheduler::{
    Clock, Scheduler, SystemClock, TaskId, TestClock, call_cancel, call_delayed, call_soon,
    current_scheduler, with_scheduler,
};
pub use web_time::{Duration, Instant};
