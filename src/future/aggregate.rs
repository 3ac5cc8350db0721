//! Aggregators: composing many futures into one.
use std::sync::{Arc, Mutex, PoisonError};

use log::trace;

use super::{Future, Resolver};
use crate::{
    error::{Error, Result},
    sync::slots::{Slots, SlotsGuard},
    task::Executor,
    trap::trap,
};

/// Drives [Executor::foreach]: one element at a time, each step a new task.
struct Foreach<I, F> {
    elements: I,
    callback: F,
    resolver: Resolver<()>,
    executor: Executor,
}

impl<I, F, R> Foreach<I, F>
where
    I: Iterator + Send + 'static,
    F: FnMut(I::Item) -> Future<R> + Send + 'static,
    R: Send + Sync + 'static,
{
    fn step(mut self) {
        let element = match trap(|| self.elements.next()) {
            Ok(Some(element)) => element,
            Ok(None) => {
                trace!("foreach finished");
                self.resolver.resolve(Ok(()));
                return;
            }
            Err(err) => {
                self.resolver.resolve(Err(err));
                return;
            }
        };

        let current = match trap(|| (self.callback)(element)) {
            Ok(current) => current,
            Err(err) => {
                self.resolver.resolve(Err(err));
                return;
            }
        };

        let watched = current.clone();

        current.on_resolve(move || {
            let executor = self.executor.clone();

            executor.execute(move || match watched.outcome() {
                Some(Ok(_)) => self.step(),
                Some(Err(err)) => self.resolver.resolve(Err(err.clone())),
                None => self.resolver.resolve(Err(Error::Abandoned)),
            });
        });
    }
}

impl Executor {
    /// Fan `futures` into `Slots`, recording each outcome with `record` as it
    /// arrives. The last input to settle resolves the returned future.
    fn gather<T, R, I, F>(&self, futures: I, record: F) -> Future<Vec<R>>
    where
        T: Send + Sync + 'static,
        R: Send + Sync + 'static,
        I: IntoIterator<Item = Future<T>>,
        F: Fn(&mut SlotsGuard<'_, R>, usize, &Result<T>) + Send + Sync + 'static,
    {
        let futures: Vec<_> = futures.into_iter().collect();

        if futures.is_empty() {
            return self.launch(|| Ok(Vec::new()));
        }

        trace!("gathering {} futures", futures.len());

        let slots = Arc::new(Slots::with_len(futures.len()));
        let record = Arc::new(record);
        let (aggregate, resolver) = Future::pending(self.clone());

        // Shared by every input; whichever settles the last slot takes it. If
        // an input's task is dropped, the last clone going away abandons the
        // aggregate.
        let resolver = Arc::new(Mutex::new(Some(resolver)));

        for (index, input) in futures.into_iter().enumerate() {
            let slots = slots.clone();
            let record = record.clone();
            let resolver = resolver.clone();
            let executor = self.clone();
            let watched = input.clone();

            input.on_resolve(move || {
                executor.execute(move || {
                    let finished = {
                        let mut guard = slots.lock();
                        let abandoned = Err(Error::Abandoned);
                        let outcome = watched.outcome().unwrap_or(&abandoned);

                        if let Err(err) = trap(|| (*record)(&mut guard, index, outcome)) {
                            guard.fail(index, err);
                        }

                        (guard.remaining() == 0).then(|| guard.take())
                    };

                    if let Some(outcome) = finished {
                        let resolver = resolver
                            .lock()
                            .unwrap_or_else(PoisonError::into_inner)
                            .take();

                        if let Some(resolver) = resolver {
                            resolver.resolve(outcome);
                        }
                    }
                });
            });
        }

        aggregate
    }

    /// Wait for all of `futures`.
    ///
    /// The value at index `i` of the result is the value of the `i`-th input,
    /// whatever order the inputs finish in. If any input fails, the aggregate
    /// fails with an [Aggregate](crate::error::Error::Aggregate) error listing
    /// every failure together with its index.
    pub fn wait<T, I>(&self, futures: I) -> Future<Vec<T>>
    where
        T: Clone + Send + Sync + 'static,
        I: IntoIterator<Item = Future<T>>,
    {
        self.gather(futures, |guard, index, outcome| match outcome {
            Ok(value) => guard.set(index, value.clone()),
            Err(err) => guard.fail(index, err.clone()),
        })
    }

    /// Wait for all of `futures` and collect every outcome, successful or
    /// not, in input order. The aggregate itself never fails.
    pub fn settle<T, I>(&self, futures: I) -> Future<Vec<Result<T>>>
    where
        T: Clone + Send + Sync + 'static,
        I: IntoIterator<Item = Future<T>>,
    {
        self.gather(futures, |guard, index, outcome| {
            guard.set(index, outcome.clone())
        })
    }

    /// Process `elements` strictly in order.
    ///
    /// `callback` is called with the first element and the future it returns
    /// is awaited before `callback` is called with the next element. The
    /// returned future resolves once every element has been processed. If a
    /// callback panics, or the future it returned fails, the remaining elements
    /// are skipped and the returned future fails with that error.
    pub fn foreach<E, I, R, F>(&self, elements: I, callback: F) -> Future<()>
    where
        I: IntoIterator<Item = E>,
        I::IntoIter: Send + 'static,
        R: Send + Sync + 'static,
        F: FnMut(E) -> Future<R> + Send + 'static,
    {
        let (outer, resolver) = Future::pending(self.clone());

        let state = Foreach {
            elements: elements.into_iter(),
            callback,
            resolver,
            executor: self.clone(),
        };

        self.execute(move || state.step());

        outer
    }
}

/// Aggregators running on the [global](Executor::global) executor.
impl<T: Clone + Send + Sync + 'static> Future<T> {
    /// See [Executor::wait].
    ///
    /// ```
    /// use futura::future::Future;
    /// use std::{thread, time::Duration};
    ///
    /// let all = Future::wait([
    ///     Future::spawn(|| { thread::sleep(Duration::from_millis(30)); "a" }),
    ///     Future::value("b"),
    /// ]);
    ///
    /// assert_eq!(all.join(), ["a", "b"]);
    /// ```
    pub fn wait<I>(futures: I) -> Future<Vec<T>>
    where
        I: IntoIterator<Item = Future<T>>,
    {
        Executor::global().wait(futures)
    }

    /// See [Executor::settle].
    pub fn settle<I>(futures: I) -> Future<Vec<Result<T>>>
    where
        I: IntoIterator<Item = Future<T>>,
    {
        Executor::global().settle(futures)
    }
}

impl<T: Send + Sync + 'static> Future<T> {
    /// See [Executor::foreach].
    ///
    /// ```
    /// use futura::future::Future;
    /// use std::sync::{Arc, Mutex};
    ///
    /// let seen = Arc::new(Mutex::new(Vec::new()));
    /// let log = seen.clone();
    ///
    /// Future::foreach(1..=3, move |n| {
    ///     let log = log.clone();
    ///     Future::spawn(move || log.lock().unwrap().push(n))
    /// })
    /// .join();
    ///
    /// assert_eq!(*seen.lock().unwrap(), [1, 2, 3]);
    /// ```
    pub fn foreach<E, I, F>(elements: I, callback: F) -> Future<()>
    where
        I: IntoIterator<Item = E>,
        I::IntoIter: Send + 'static,
        F: FnMut(E) -> Future<T> + Send + 'static,
    {
        Executor::global().foreach(elements, callback)
    }
}

#[cfg(test)]
mod tests {
    use std::{
        sync::{
            atomic::{AtomicUsize, Ordering},
            Arc, Mutex,
        },
        thread,
        time::{Duration, Instant},
    };

    use crate::{
        error::{Error, ErrorKind},
        future::{init_logging, Future},
        task::{Config, Executor},
    };

    #[test]
    fn wait_for_slowest() {
        let before = Instant::now();

        Future::wait([
            Future::void(|| thread::sleep(Duration::from_millis(100))),
            Future::void(|| thread::sleep(Duration::from_millis(200))),
            Future::void(|| thread::sleep(Duration::from_millis(300))),
        ])
        .join();

        assert!(before.elapsed() >= Duration::from_millis(300));
    }

    #[test]
    fn wait_keeps_input_order() {
        let futures: Vec<_> = (0..10u64)
            .map(|i| Future::delay(move || i, Duration::from_millis(10 * (10 - i))))
            .collect();

        assert_eq!(Future::wait(futures).join(), (0..10).collect::<Vec<_>>());
    }

    #[test]
    fn wait_aggregates_failures() {
        init_logging();

        let inputs = vec![
            Future::value(1),
            Future::spawn(|| -> i32 { panic!("second") }),
            Future::value(3),
            Future::try_spawn(|| Err(Error::custom("db", "fourth"))),
        ];

        let err = Future::wait(inputs.clone()).try_join().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Aggregate);

        let Error::Aggregate(agg) = err else {
            panic!("expected an aggregate error");
        };

        assert_eq!(agg.len(), 2);
        assert_eq!(agg.get(1).map(Error::kind), Some(ErrorKind::Panicked));
        assert_eq!(agg.get(3).map(Error::kind), Some(ErrorKind::Custom("db")));

        let mut indices: Vec<_> = agg.errors().iter().map(|(i, _)| *i).collect();
        indices.sort();
        assert_eq!(indices, [1, 3]);

        // Successful inputs still hold their values.
        assert_eq!(inputs[0].join(), 1);
        assert_eq!(inputs[2].join(), 3);
    }

    #[test]
    fn wait_empty() {
        assert!(Future::<u8>::wait([]).join().is_empty());
    }

    #[test]
    fn settle_keeps_successes() {
        let outcomes = Future::settle([
            Future::value("a"),
            Future::spawn(|| -> &'static str { panic!("b") }),
            Future::value("c"),
        ])
        .join();

        assert_eq!(outcomes.len(), 3);
        assert_eq!(outcomes[0].as_ref().unwrap(), &"a");
        assert_eq!(outcomes[1].as_ref().unwrap_err().kind(), ErrorKind::Panicked);
        assert_eq!(outcomes[2].as_ref().unwrap(), &"c");
    }

    #[test]
    fn foreach_in_order() {
        let nums = vec![1, 2, 3, 4, 5];
        let result = Arc::new(Mutex::new(Vec::new()));

        {
            let result = result.clone();
            Future::foreach(nums.clone(), move |num| {
                let result = result.clone();
                Future::spawn(move || {
                    // Later elements finish faster; order must still hold.
                    thread::sleep(Duration::from_millis(10 * (6 - num)));
                    result.lock().unwrap().push(num);
                    num
                })
            })
            .join();
        }

        assert_eq!(*result.lock().unwrap(), nums);
    }

    #[test]
    fn foreach_is_sequential() {
        let running = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        {
            let running = running.clone();
            let peak = peak.clone();
            Future::foreach(0..5, move |_| {
                let running = running.clone();
                let peak = peak.clone();
                Future::void(move || {
                    let now = running.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    thread::sleep(Duration::from_millis(20));
                    running.fetch_sub(1, Ordering::SeqCst);
                })
            })
            .join();
        }

        assert_eq!(peak.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn foreach_stops_at_first_failure() {
        let visited = Arc::new(Mutex::new(Vec::new()));

        let f = {
            let visited = visited.clone();
            Future::foreach(1..=5, move |n| {
                visited.lock().unwrap().push(n);
                Future::spawn(move || {
                    if n == 3 {
                        Error::custom("item", "bad element").raise();
                    }
                    n
                })
            })
        };

        assert_eq!(f.try_join().unwrap_err().kind(), ErrorKind::Custom("item"));
        assert_eq!(*visited.lock().unwrap(), [1, 2, 3]);
    }

    #[test]
    fn foreach_callback_panic() {
        let f = Future::<u8>::foreach([1u8], |_| panic!("no future for you"));
        assert_eq!(f.try_join().unwrap_err().kind(), ErrorKind::Panicked);
    }

    #[test]
    fn foreach_empty() {
        Future::<u8>::foreach(Vec::<u8>::new(), |n| Future::value(n)).join();
    }

    #[test]
    fn aggregators_on_single_worker() -> anyhow::Result<()> {
        let pool = Executor::new(Config::default().with_workers(1))?;

        let all = pool.wait((0..20).map(|i| pool.spawn(move || i)));
        assert_eq!(all.join(), (0..20).collect::<Vec<_>>());

        let seen = Arc::new(Mutex::new(Vec::new()));
        {
            let seen = seen.clone();
            let inner = pool.clone();
            pool.foreach(0..10, move |i| {
                let seen = seen.clone();
                inner.spawn(move || seen.lock().unwrap().push(i))
            })
            .join();
        }
        assert_eq!(*seen.lock().unwrap(), (0..10).collect::<Vec<_>>());

        pool.shutdown();

        Ok(())
    }
}
