use std::thread;

use rill_core::*;
use rill_reactive::*;

fn main() {
    env_logger::init();

    let sched = Scheduler::new();
    with_scheduler(&sched, || {
        let spec = BindingSpec::new().bind("count", 0i32);
        let model = Model::new(&spec);

        let count = model.attr("count").expect("declared above");
        count.subscribe(|v| {
            if let Some(n) = v.downcast_ref::<i32>() {
                println!("count = {n}");
            }
        });

        Observable::<i64, String>::range(1, 4, 1)
            .map(|v| v * v)
            .subscribe(|v| log::info!("square {v}"));

        // Bump the counter from a delayed promise.
        let model2 = model.clone();
        let p = Promise::<i32, String>::pending();
        p.resolve_after(Duration::from_millis(300), 41);
        p.then(move |v| {
            model2.set("count", value(v + 1));
            Completion::Value(v)
        });
    });

    // Drive the macrotask queue until everything has settled.
    while sched.has_pending() {
        sched.run_until_idle();
        if let Some(due) = sched.next_due() {
            let now = Instant::now();
            if due > now {
                thread::sleep(due - now);
            }
        }
    }
}
