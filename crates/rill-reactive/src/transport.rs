//! Transport adapter.
//!
//! The transport collaborator (HTTP or similar) is outside this crate; all
//! it must provide is one terminal success/failure completion per request.
//! [`transport_source`] wraps it in a source: each subscribe starts one
//! request, a success becomes `next` + `complete` for that sid, a failure
//! becomes `error`. Classifying outcomes (status-code banding and the like)
//! is the collaborator's business, not ours.

use std::rc::Rc;

use crate::observable::Observable;

pub trait Transport {
    type Ok: Clone + 'static;
    type Err: Clone + 'static;

    /// Start one request and call `done` exactly once with the outcome.
    fn start(&self, done: Box<dyn FnOnce(Result<Self::Ok, Self::Err>)>);
}

/// One request per subscription, adapted into the observable protocol.
pub fn transport_source<Tp: Transport + 'static>(transport: Rc<Tp>) -> Observable<Tp::Ok, Tp::Err> {
    Observable::from_hook(move |obs, sid, opts| {
        if opts.fetch {
            return None;
        }
        let weak = obs.downgrade();
        transport.start(Box::new(move |outcome| {
            let Some(obs) = weak.upgrade() else { return };
            match outcome {
                Ok(v) => {
                    obs.next(v, sid);
                    obs.complete(sid);
                }
                Err(e) => obs.error(e, sid),
            }
        }));
        None
    })
}
