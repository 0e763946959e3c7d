pub use crate::binding::{BindingSpec, Model, ObservableAttribute, Value, value};
pub use crate::error::FetchError;
pub use crate::observable::{
    Observable, Observer, Sid, SubscribeOptions, Subscription, WeakObservable, Who,
};
pub use crate::transport::{Transport, transport_source};
pub use rill_core::prelude::*;
