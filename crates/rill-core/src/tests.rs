#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use web_time::Duration;

    use crate::error::FutureError;
    use crate::future::Future;
    use crate::promise::{Completion, Promise};
    use crate::scheduler::{Scheduler, TestClock, call_soon, with_scheduler};

    type Fut = Future<i32, &'static str>;
    type Prom = Promise<i32, &'static str>;

    fn test_rig() -> (Scheduler, Rc<TestClock>) {
        let clock = TestClock::starting_now();
        let sched = Scheduler::with_clock(clock.clone());
        (sched, clock)
    }

    #[test]
    fn test_scheduler_fifo_same_turn() {
        let (sched, _clock) = test_rig();
        let order = Rc::new(RefCell::new(Vec::new()));
        for i in 0..3 {
            let order = order.clone();
            sched.schedule(move || order.borrow_mut().push(i));
        }
        sched.run_until_idle();
        assert_eq!(*order.borrow(), vec![0, 1, 2]);
    }

    #[test]
    fn test_scheduler_never_synchronous() {
        let (sched, _clock) = test_rig();
        let ran = Rc::new(RefCell::new(false));
        let ran2 = ran.clone();
        sched.schedule(move || *ran2.borrow_mut() = true);
        assert!(!*ran.borrow());
        sched.run_until_idle();
        assert!(*ran.borrow());
    }

    #[test]
    fn test_scheduler_delay_ordering() {
        let (sched, clock) = test_rig();
        let order = Rc::new(RefCell::new(Vec::new()));

        let o = order.clone();
        sched.schedule_after(Duration::from_millis(10), move || o.borrow_mut().push("late"));
        let o = order.clone();
        sched.schedule_after(Duration::from_millis(5), move || o.borrow_mut().push("mid"));
        let o = order.clone();
        sched.schedule(move || o.borrow_mut().push("now"));

        sched.run_until_idle();
        assert_eq!(*order.borrow(), vec!["now"]);

        clock.advance(Duration::from_millis(20));
        sched.run_until_idle();
        assert_eq!(*order.borrow(), vec!["now", "mid", "late"]);
    }

    #[test]
    fn test_scheduler_cancel() {
        let (sched, _clock) = test_rig();
        let ran = Rc::new(RefCell::new(false));
        let ran2 = ran.clone();
        let id = sched.schedule(move || *ran2.borrow_mut() = true);
        assert!(sched.cancel(id));
        assert!(!sched.cancel(id));
        sched.run_until_idle();
        assert!(!*ran.borrow());
    }

    #[test]
    fn test_task_scheduled_mid_turn_waits_a_turn() {
        let (sched, _clock) = test_rig();
        let inner_ran = Rc::new(RefCell::new(false));
        let inner2 = inner_ran.clone();
        let sched2 = sched.clone();
        sched.schedule(move || {
            let inner3 = inner2.clone();
            sched2.schedule(move || *inner3.borrow_mut() = true);
        });
        assert_eq!(sched.turn(), 1);
        assert!(!*inner_ran.borrow());
        assert_eq!(sched.turn(), 1);
        assert!(*inner_ran.borrow());
    }

    #[test]
    fn test_call_soon_uses_current_scheduler() {
        let (sched, _clock) = test_rig();
        let ran = Rc::new(RefCell::new(false));
        let ran2 = ran.clone();
        with_scheduler(&sched, || {
            call_soon(move || *ran2.borrow_mut() = true);
        });
        sched.run_until_idle();
        assert!(*ran.borrow());
    }

    #[test]
    fn test_future_single_transition() {
        let (sched, _clock) = test_rig();
        let fut = Fut::with_scheduler(&sched);
        assert!(fut.set_result(1).is_ok());
        assert_eq!(fut.set_result(2), Err(FutureError::InvalidState));
        assert_eq!(fut.set_exception("x"), Err(FutureError::InvalidState));
        assert!(!fut.cancel());
        assert!(!fut.try_set_result(3));
        assert!(!fut.try_set_exception("y"));
        assert_eq!(fut.result(), Ok(1));
    }

    #[test]
    fn test_future_cancel() {
        let (sched, _clock) = test_rig();
        let fut = Fut::with_scheduler(&sched);
        assert!(fut.cancel());
        assert!(fut.is_cancelled());
        assert!(fut.is_done());
        assert_eq!(fut.result(), Err(FutureError::Cancelled));
        assert_eq!(fut.exception(), Err(FutureError::Cancelled));
    }

    #[test]
    fn test_future_access_states() {
        let (sched, _clock) = test_rig();
        let fut = Fut::with_scheduler(&sched);
        assert_eq!(fut.result(), Err(FutureError::InvalidState));
        assert_eq!(fut.exception(), Err(FutureError::InvalidState));

        fut.set_exception("boom").unwrap();
        assert_eq!(fut.result(), Err(FutureError::Failed("boom")));
        assert_eq!(fut.exception(), Ok(Some("boom")));

        let ok = Fut::with_scheduler(&sched);
        ok.set_result(9).unwrap();
        assert_eq!(ok.exception(), Ok(None));
    }

    #[test]
    fn test_done_callback_after_settle_is_async() {
        let (sched, _clock) = test_rig();
        let fut = Fut::with_scheduler(&sched);
        fut.set_result(1).unwrap();
        sched.run_until_idle();

        let ran = Rc::new(RefCell::new(false));
        let ran2 = ran.clone();
        fut.add_done_callback(move |_| *ran2.borrow_mut() = true);
        // Never synchronously inside the registering call.
        assert!(!*ran.borrow());
        sched.run_until_idle();
        assert!(*ran.borrow());
    }

    #[test]
    fn test_done_callbacks_run_in_registration_order() {
        let (sched, _clock) = test_rig();
        let fut = Fut::with_scheduler(&sched);
        let order = Rc::new(RefCell::new(Vec::new()));
        for i in 0..3 {
            let order = order.clone();
            fut.add_done_callback(move |_| order.borrow_mut().push(i));
        }
        fut.set_result(0).unwrap();
        assert!(order.borrow().is_empty());
        sched.run_until_idle();
        assert_eq!(*order.borrow(), vec![0, 1, 2]);
    }

    #[test]
    fn test_remove_done_callback() {
        let (sched, _clock) = test_rig();
        let fut = Fut::with_scheduler(&sched);
        let ran = Rc::new(RefCell::new(false));
        let ran2 = ran.clone();
        let id = fut.add_done_callback(move |_| *ran2.borrow_mut() = true);
        assert!(fut.remove_done_callback(id));
        assert!(!fut.remove_done_callback(id));
        fut.set_result(1).unwrap();
        sched.run_until_idle();
        assert!(!*ran.borrow());
    }

    #[test]
    fn test_promise_executor() {
        let (sched, _clock) = test_rig();
        let p = with_scheduler(&sched, || {
            Prom::new(|resolve, _reject| {
                resolve.resolve(11);
                Ok(())
            })
        });
        assert_eq!(p.result(), Ok(11));
    }

    #[test]
    fn test_promise_executor_error_rejects() {
        let (sched, _clock) = test_rig();
        let p = with_scheduler(&sched, || Prom::new(|_resolve, _reject| Err("ctor")));
        assert_eq!(p.exception(), Ok(Some("ctor")));
    }

    #[test]
    fn test_then_value_and_error() {
        let (sched, _clock) = test_rig();
        with_scheduler(&sched, || {
            let doubled = Prom::resolved(21).then(|v| Completion::Value(v * 2));
            let failed: Prom = Prom::resolved(1).then(|_| Completion::Error("nope"));
            sched.run_until_idle();
            assert_eq!(doubled.result(), Ok(42));
            assert_eq!(failed.exception(), Ok(Some("nope")));
        });
    }

    #[test]
    fn test_then_chains_returned_promise() {
        let (sched, _clock) = test_rig();
        with_scheduler(&sched, || {
            let p = Prom::resolved(1).then(|v| Completion::Chain(Prom::resolved(v + 100)));
            sched.run_until_idle();
            assert_eq!(p.result(), Ok(101));
        });
    }

    #[test]
    fn test_chain_flattens_nested_pendings() {
        let (sched, _clock) = test_rig();
        with_scheduler(&sched, || {
            // outer <- mid <- resolved(5), settled bottom-up across turns.
            let outer = Prom::pending();
            let mid = Prom::pending();
            outer.chain(&mid);
            mid.chain(&Prom::resolved(5));
            sched.run_until_idle();
            assert_eq!(outer.result(), Ok(5));
        });
    }

    #[test]
    fn test_rejection_propagates_past_then() {
        let (sched, _clock) = test_rig();
        with_scheduler(&sched, || {
            let handled = Rc::new(RefCell::new(false));
            let handled2 = handled.clone();
            let p = Prom::rejected("down").then(move |v| {
                *handled2.borrow_mut() = true;
                Completion::Value(v)
            });
            sched.run_until_idle();
            assert!(!*handled.borrow());
            assert_eq!(p.exception(), Ok(Some("down")));
        });
    }

    #[test]
    fn test_catch_recovers() {
        let (sched, _clock) = test_rig();
        with_scheduler(&sched, || {
            let p = Prom::rejected("oops").catch(|_| Completion::Value(-1));
            sched.run_until_idle();
            assert_eq!(p.result(), Ok(-1));
        });
    }

    #[test]
    fn test_cancellation_propagates_through_then() {
        let (sched, _clock) = test_rig();
        with_scheduler(&sched, || {
            let handled = Rc::new(RefCell::new(false));
            let handled2 = handled.clone();
            let p = Prom::pending();
            let next = p.then(move |v| {
                *handled2.borrow_mut() = true;
                Completion::Value(v)
            });
            p.cancel();
            sched.run_until_idle();
            assert!(next.is_cancelled());
            assert!(!*handled.borrow());
        });
    }

    #[test]
    fn test_resolve_after_waits_for_due_time() {
        let (sched, clock) = test_rig();
        with_scheduler(&sched, || {
            let p = Prom::pending();
            p.resolve_after(Duration::from_millis(30), 3);
            sched.run_until_idle();
            assert!(!p.is_done());
            clock.advance(Duration::from_millis(30));
            sched.run_until_idle();
            assert_eq!(p.result(), Ok(3));
        });
    }

    #[test]
    fn test_all_preserves_input_order() {
        let (sched, clock) = test_rig();
        with_scheduler(&sched, || {
            let slow = Prom::pending();
            slow.resolve_after(Duration::from_millis(20), 1);
            let fast = Prom::resolved(3);
            let all = Prom::all(vec![
                Completion::Chain(slow),
                Completion::Value(2),
                Completion::Chain(fast),
            ]);
            sched.run_until_idle();
            assert!(!all.is_done());
            clock.advance(Duration::from_millis(20));
            sched.run_until_idle();
            assert_eq!(all.result(), Ok(vec![1, 2, 3]));
        });
    }

    #[test]
    fn test_all_rejects_on_first_rejection() {
        let (sched, _clock) = test_rig();
        with_scheduler(&sched, || {
            let never = Prom::pending();
            let all = Prom::all(vec![
                Completion::Chain(Prom::resolved(1)),
                Completion::Chain(Prom::rejected("x")),
                Completion::Chain(never),
            ]);
            sched.run_until_idle();
            assert_eq!(all.exception(), Ok(Some("x")));
        });
    }

    #[test]
    fn test_all_settles_without_scheduling_when_immediate() {
        let (sched, _clock) = test_rig();
        with_scheduler(&sched, || {
            let empty = Promise::<i32, &'static str>::all(vec![]);
            assert_eq!(empty.result(), Ok(vec![]));

            let plain = Prom::all(vec![Completion::Value(1), Completion::Value(2)]);
            // Done before any turn runs.
            assert_eq!(plain.result(), Ok(vec![1, 2]));
        });
    }

    #[test]
    fn test_race_empty_never_settles() {
        let (sched, clock) = test_rig();
        with_scheduler(&sched, || {
            let race = Prom::race(vec![]);
            clock.advance(Duration::from_millis(100));
            sched.run_until_idle();
            assert!(!race.is_done());
        });
    }

    #[test]
    fn test_race_immediate_value_wins() {
        let (sched, _clock) = test_rig();
        with_scheduler(&sched, || {
            let race = Prom::race(vec![
                Completion::Value(5),
                Completion::Chain(Prom::resolved(6)),
            ]);
            assert_eq!(race.result(), Ok(5));
        });
    }

    #[test]
    fn test_race_first_settler_wins() {
        let (sched, clock) = test_rig();
        with_scheduler(&sched, || {
            let a = Prom::pending();
            a.resolve_after(Duration::from_millis(5), 1);
            let b = Prom::pending();
            b.resolve_after(Duration::from_millis(10), 2);
            let race = Prom::race(vec![Completion::Chain(a), Completion::Chain(b)]);
            clock.advance(Duration::from_millis(6));
            sched.run_until_idle();
            assert_eq!(race.result(), Ok(1));
            clock.advance(Duration::from_millis(10));
            sched.run_until_idle();
            assert_eq!(race.result(), Ok(1));
        });
    }

    #[test]
    fn test_race_skips_cancelled_inputs() {
        let (sched, _clock) = test_rig();
        with_scheduler(&sched, || {
            let dead = Prom::pending();
            dead.cancel();
            let race = Prom::race(vec![
                Completion::Chain(dead),
                Completion::Chain(Prom::resolved(8)),
            ]);
            sched.run_until_idle();
            assert_eq!(race.result(), Ok(8));
        });
    }

    #[test]
    fn test_unhandled_rejection_stays_silent() {
        let (sched, _clock) = test_rig();
        with_scheduler(&sched, || {
            let p = Prom::rejected("ignored");
            sched.run_until_idle();
            // Nothing chained, nothing raised; surfaces only on inspection.
            assert_eq!(p.exception(), Ok(Some("ignored")));
        });
    }
}
