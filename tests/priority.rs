//! Scenario 3: raising a runnable thread's priority above the caller's own
//! preempts the caller immediately, rather than waiting for it to yield.

use std::sync::Arc;

use uthreads::DetachState;

#[test]
fn raising_a_runnable_threads_priority_preempts_the_caller() {
    std::thread::spawn(|| {
        let _ = env_logger::try_init();
        uthreads::init();
        // The OS thread `init` promotes is pinned at MAXPRIO for as long as
        // it's ON_CPU, and a thread can't reprioritize itself -- so "main"
        // for this scenario is a driver thread created directly at the
        // lower priority the scenario calls for, leaving room for the
        // worker below to be raised above it.
        let driver = uthreads::create(
            || {
                let order = Arc::new(std::sync::Mutex::new(Vec::new()));
                let worker_order = order.clone();
                let worker = uthreads::create(
                    move || {
                        worker_order.lock().unwrap().push("worker-ran");
                    },
                    1,
                    DetachState::Joinable,
                )
                .unwrap();

                order.lock().unwrap().push("main-before-raise");
                // 5 > the driver's own priority of 3: the worker must run
                // to completion before control returns here.
                uthreads::set_prio(worker, 5).unwrap();
                order.lock().unwrap().push("main-after-raise");

                uthreads::join(worker).unwrap();
                Arc::try_unwrap(order).unwrap().into_inner().unwrap()
            },
            3,
            DetachState::Joinable,
        )
        .unwrap();

        let seen = *uthreads::join(driver).unwrap().downcast::<Vec<&'static str>>().unwrap();
        assert_eq!(seen, vec!["main-before-raise", "worker-ran", "main-after-raise"]);
    })
    .join()
    .unwrap();
}

#[test]
fn raising_to_an_equal_or_lower_priority_does_not_preempt() {
    std::thread::spawn(|| {
        let _ = env_logger::try_init();
        uthreads::init();
        let driver = uthreads::create(
            || {
                let order = Arc::new(std::sync::Mutex::new(Vec::new()));
                let worker_order = order.clone();
                let worker = uthreads::create(
                    move || {
                        worker_order.lock().unwrap().push("worker-ran");
                    },
                    1,
                    DetachState::Joinable,
                )
                .unwrap();

                order.lock().unwrap().push("main-before-raise");
                // 4 < the driver's own priority of 5: no preemption.
                uthreads::set_prio(worker, 4).unwrap();
                order.lock().unwrap().push("main-after-raise");

                uthreads::join(worker).unwrap();
                Arc::try_unwrap(order).unwrap().into_inner().unwrap()
            },
            5,
            DetachState::Joinable,
        )
        .unwrap();

        let seen = *uthreads::join(driver).unwrap().downcast::<Vec<&'static str>>().unwrap();
        assert_eq!(seen, vec!["main-before-raise", "main-after-raise", "worker-ran"]);
    })
    .join()
    .unwrap();
}
