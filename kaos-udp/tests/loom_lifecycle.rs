//! Loom model of the endpoint reference-count protocol.
//!
//! Callers take a reference before queuing a mutation; `destroy` queues
//! without one. The reactor runs commands one at a time, each releasing a
//! reference; the one that reaches zero tears down. Checks that teardown
//! happens exactly once and nothing is applied after it.
//!
//! Run with: RUSTFLAGS="--cfg loom" cargo test --test loom_lifecycle --release

#[cfg(loom)]
mod loom_tests {
    use loom::sync::atomic::{AtomicUsize, Ordering};
    use loom::sync::{Arc, Mutex};
    use loom::thread;
    use std::collections::VecDeque;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum Cmd {
        Install,
        Destroy,
    }

    struct Endpoint {
        refs: AtomicUsize,
        queue: Mutex<VecDeque<Cmd>>,
        teardowns: AtomicUsize,
        applied_after_teardown: AtomicUsize,
    }

    impl Endpoint {
        fn new() -> Self {
            Self {
                refs: AtomicUsize::new(1),
                queue: Mutex::new(VecDeque::new()),
                teardowns: AtomicUsize::new(0),
                applied_after_teardown: AtomicUsize::new(0),
            }
        }

        fn try_acquire(&self) -> bool {
            let mut current = self.refs.load(Ordering::Acquire);
            loop {
                if current == 0 {
                    return false;
                }
                match self.refs.compare_exchange(
                    current,
                    current + 1,
                    Ordering::AcqRel,
                    Ordering::Acquire,
                ) {
                    Ok(_) => return true,
                    Err(actual) => current = actual,
                }
            }
        }

        fn set_callback(&self) {
            if self.try_acquire() {
                self.queue.lock().unwrap().push_back(Cmd::Install);
            }
        }

        fn destroy(&self) {
            self.queue.lock().unwrap().push_back(Cmd::Destroy);
        }

        /// Reactor side: run one queued command, if any.
        fn run_one(&self) -> bool {
            let Some(cmd) = self.queue.lock().unwrap().pop_front() else {
                return false;
            };
            let last = self.refs.fetch_sub(1, Ordering::AcqRel) == 1;
            if last {
                self.teardowns.fetch_add(1, Ordering::Relaxed);
            } else if cmd == Cmd::Install && self.teardowns.load(Ordering::Relaxed) > 0 {
                self.applied_after_teardown.fetch_add(1, Ordering::Relaxed);
            }
            true
        }

        fn drain(&self) {
            while self.run_one() {}
        }
    }

    /// One setter racing destroy, reactor running concurrently.
    #[test]
    fn test_set_races_destroy() {
        loom::model(|| {
            let ep = Arc::new(Endpoint::new());

            let setter = {
                let ep = ep.clone();
                thread::spawn(move || ep.set_callback())
            };
            let destroyer = {
                let ep = ep.clone();
                thread::spawn(move || ep.destroy())
            };
            let reactor = {
                let ep = ep.clone();
                thread::spawn(move || {
                    ep.run_one();
                })
            };

            setter.join().unwrap();
            destroyer.join().unwrap();
            reactor.join().unwrap();
            ep.drain();

            assert_eq!(ep.teardowns.load(Ordering::Relaxed), 1);
            assert_eq!(ep.applied_after_teardown.load(Ordering::Relaxed), 0);
            assert_eq!(ep.refs.load(Ordering::Acquire), 0);
        });
    }

    /// Two setters racing destroy; late setters must be refused.
    #[test]
    fn test_two_setters_and_destroy() {
        loom::model(|| {
            let ep = Arc::new(Endpoint::new());

            let setters: Vec<_> = (0..2)
                .map(|_| {
                    let ep = ep.clone();
                    thread::spawn(move || ep.set_callback())
                })
                .collect();
            ep.destroy();
            ep.run_one();

            for setter in setters {
                setter.join().unwrap();
            }
            ep.drain();

            assert_eq!(ep.teardowns.load(Ordering::Relaxed), 1);
            assert_eq!(ep.refs.load(Ordering::Acquire), 0);
            assert!(!ep.try_acquire());
        });
    }
}
