// Copyright (C) 2022-2025 Michael Herstine <sp1ff@pobox.com>
//
// This file is part of mw-log.
//
// mw-log is free software: you can redistribute it and/or modify it under the terms of the
// GNU General Public License as published by the Free Software Foundation, either version 3 of the
// License, or (at your option) any later version.
//
// mw-log is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without even
// the implied warranty of MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the GNU General
// Public License for more details.
//
// You should have received a copy of the GNU General Public License along with mw-log.  If not,
// see <http://www.gnu.org/licenses/>.

//! Fan-out of finished records to the registered sinks.
//!
//! Each sink is registered on one of two routes:
//!
//! - _synchronous_: the producing thread calls [`Sink::deliver`] itself
//! - _asynchronous_: the producing thread pushes the record onto a [`BoundedQueue`] drained by a
//!   dedicated worker thread (one per sink, so records reach the sink in the order they were
//!   pushed)
//!
//! Routes are fixed once the router is built. [`SinkRouter::shutdown`] closes every queue, lets
//! each worker drain what remains, joins it and flushes the sinks.

use crate::{
    error::{Error, Result},
    queue::{BoundedQueue, OverflowPolicy},
    record::LogRecord,
    sink::{DeliveryGuard, Sink, SinkHealth, SinkStats},
};

use backtrace::Backtrace;
use tracing::{debug, error, warn};

use std::{
    panic::{self, AssertUnwindSafe},
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Mutex,
    },
    thread::JoinHandle,
};

enum Delivery {
    Sync,
    Async {
        queue: Arc<BoundedQueue<LogRecord>>,
        worker: Mutex<Option<JoinHandle<()>>>,
    },
}

struct Route {
    sink: Arc<dyn Sink>,
    health: Arc<SinkHealth>,
    delivery: Delivery,
}

/// Run `f` against `sink`, turning a panic into [`Error::SinkPanicked`].
fn guarded<F>(sink: &dyn Sink, f: F) -> Result<()>
where
    F: FnOnce() -> Result<()>,
{
    match panic::catch_unwind(AssertUnwindSafe(f)) {
        Ok(result) => result,
        Err(_) => {
            error!(sink = sink.name(), "sink panicked");
            Err(Error::SinkPanicked {
                sink: sink.name().to_string(),
                back: Backtrace::new(),
            })
        }
    }
}

fn deliver_one(sink: &dyn Sink, health: &SinkHealth, record: &LogRecord) {
    match guarded(sink, || sink.deliver(record)) {
        Ok(()) => health.record_delivered(),
        Err(err) => {
            health.record_failure(&err);
            warn!(sink = sink.name(), "failed to deliver a record: {}", err);
        }
    }
}

fn flush_one(sink: &dyn Sink, health: &SinkHealth) {
    if let Err(err) = guarded(sink, || sink.flush()) {
        health.record_failure(&err);
        warn!(sink = sink.name(), "failed to flush: {}", err);
    }
}

/// Closes a worker's queue however the worker exits, so producers never block on a dead consumer.
struct CloseOnExit(Arc<BoundedQueue<LogRecord>>);

impl Drop for CloseOnExit {
    fn drop(&mut self) {
        self.0.close();
    }
}

fn spawn_worker(
    sink: Arc<dyn Sink>,
    health: Arc<SinkHealth>,
    queue: Arc<BoundedQueue<LogRecord>>,
) -> Result<JoinHandle<()>> {
    std::thread::Builder::new()
        .name(format!("mw-log-{}", sink.name()))
        .spawn(move || {
            let _guard = DeliveryGuard::enter();
            let _closer = CloseOnExit(queue.clone());
            debug!(sink = sink.name(), "worker started");
            while let Some(record) = queue.pop() {
                deliver_one(sink.as_ref(), &health, &record);
            }
            flush_one(sink.as_ref(), &health);
            debug!(sink = sink.name(), "worker drained & stopped");
        })
        .map_err(Error::from)
}

/// Collects routes for a [`SinkRouter`].
#[derive(Default)]
pub struct SinkRouterBuilder {
    routes: Vec<(Arc<dyn Sink>, Option<(usize, OverflowPolicy)>)>,
}

impl SinkRouterBuilder {
    /// Deliver to `sink` on the producing thread.
    pub fn sync_sink(mut self, sink: Arc<dyn Sink>) -> Self {
        self.routes.push((sink, None));
        self
    }
    /// Deliver to `sink` from a dedicated worker fed by a queue of `capacity` records.
    pub fn async_sink(
        mut self,
        sink: Arc<dyn Sink>,
        capacity: usize,
        policy: OverflowPolicy,
    ) -> Self {
        self.routes.push((sink, Some((capacity, policy))));
        self
    }
    /// Spawn the workers.
    pub fn build(self) -> Result<SinkRouter> {
        let mut routes = Vec::with_capacity(self.routes.len());
        for (sink, queueing) in self.routes {
            let health = Arc::new(SinkHealth::default());
            let delivery = match queueing {
                None => Delivery::Sync,
                Some((capacity, policy)) => {
                    let queue = Arc::new(BoundedQueue::new(capacity, policy));
                    let worker = spawn_worker(sink.clone(), health.clone(), queue.clone())?;
                    Delivery::Async {
                        queue,
                        worker: Mutex::new(Some(worker)),
                    }
                }
            };
            routes.push(Route {
                sink,
                health,
                delivery,
            });
        }
        Ok(SinkRouter {
            routes,
            shut_down: AtomicBool::new(false),
        })
    }
}

/// Delivers each record to every registered sink.
pub struct SinkRouter {
    routes: Vec<Route>,
    shut_down: AtomicBool,
}

impl SinkRouter {
    pub fn builder() -> SinkRouterBuilder {
        SinkRouterBuilder::default()
    }

    /// A router with no sinks that discards everything handed to it
    pub(crate) fn disconnected() -> SinkRouter {
        SinkRouter {
            routes: Vec::new(),
            shut_down: AtomicBool::new(true),
        }
    }

    /// Hand `record` to every sink.
    ///
    /// Never fails & never panics; delivery problems are counted against the offending sink. Once
    /// the router has been shut down, records are silently discarded.
    pub fn deliver(&self, record: LogRecord) {
        if self.shut_down.load(Ordering::Acquire) {
            return;
        }
        for route in &self.routes {
            match &route.delivery {
                Delivery::Sync => {
                    let _guard = DeliveryGuard::enter();
                    deliver_one(route.sink.as_ref(), &route.health, &record);
                }
                Delivery::Async { queue, .. } => {
                    let outcome = queue.push(record.clone());
                    if outcome.dropped() {
                        route.health.record_dropped();
                        debug!(
                            sink = route.sink.name(),
                            "queue full; dropped a record ({:?})",
                            outcome
                        );
                    }
                }
            }
        }
    }

    /// Drain & stop every worker, then flush every sink. Idempotent.
    pub fn shutdown(&self) {
        if self.shut_down.swap(true, Ordering::AcqRel) {
            return;
        }
        for route in &self.routes {
            if let Delivery::Async { queue, .. } = &route.delivery {
                queue.close();
            }
        }
        for route in &self.routes {
            match &route.delivery {
                Delivery::Sync => flush_one(route.sink.as_ref(), &route.health),
                Delivery::Async { worker, .. } => {
                    let handle = worker
                        .lock()
                        .unwrap_or_else(|poisoned| poisoned.into_inner())
                        .take();
                    if let Some(handle) = handle {
                        if handle.join().is_err() {
                            error!(sink = route.sink.name(), "worker panicked");
                        }
                    }
                }
            }
        }
    }

    pub fn is_shut_down(&self) -> bool {
        self.shut_down.load(Ordering::Acquire)
    }

    /// Health counters for each sink, in registration order
    pub fn stats(&self) -> Vec<SinkStats> {
        self.routes
            .iter()
            .map(|route| route.health.snapshot(route.sink.name()))
            .collect()
    }

    /// Records currently waiting in a sink's queue (zero for synchronous routes)
    pub fn pending(&self, name: &str) -> usize {
        self.routes
            .iter()
            .filter(|route| route.sink.name() == name)
            .map(|route| match &route.delivery {
                Delivery::Sync => 0,
                Delivery::Async { queue, .. } => queue.len(),
            })
            .sum()
    }
}

impl Drop for SinkRouter {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
pub(crate) mod test {

    use super::*;
    use crate::{
        identifier::LoggingIdentifier,
        level::LogLevel,
        record::{LogRecordBuilder, RecordClock, RecordLimits},
    };

    use std::sync::Condvar;

    /// Keeps every record delivered to it, or fails every delivery.
    pub(crate) struct Collector {
        pub(crate) name: String,
        pub(crate) seen: Mutex<Vec<LogRecord>>,
        pub(crate) fail: bool,
    }

    impl Collector {
        pub(crate) fn new(name: &str) -> Arc<Collector> {
            Arc::new(Collector {
                name: name.to_string(),
                seen: Mutex::new(Vec::new()),
                fail: false,
            })
        }
        pub(crate) fn failing(name: &str) -> Arc<Collector> {
            Arc::new(Collector {
                name: name.to_string(),
                seen: Mutex::new(Vec::new()),
                fail: true,
            })
        }
        pub(crate) fn values(&self) -> Vec<u32> {
            self.seen
                .lock()
                .unwrap()
                .iter()
                .map(|r| match r.arguments().unwrap()[0] {
                    crate::argument::Argument::U32(x) => x,
                    ref other => panic!("unexpected {:?}", other),
                })
                .collect()
        }
    }

    impl Sink for Collector {
        fn name(&self) -> &str {
            &self.name
        }
        fn deliver(&self, record: &LogRecord) -> Result<()> {
            if self.fail {
                return Err(Error::decode("refusing"));
            }
            self.seen.lock().unwrap().push(record.clone());
            Ok(())
        }
    }

    /// Blocks every delivery until released, so a queue can be filled deterministically.
    struct Gate {
        open: Mutex<bool>,
        cond: Condvar,
        entered: Mutex<usize>,
    }

    impl Sink for Gate {
        fn name(&self) -> &str {
            "gate"
        }
        fn deliver(&self, _record: &LogRecord) -> Result<()> {
            *self.entered.lock().unwrap() += 1;
            let mut open = self.open.lock().unwrap();
            while !*open {
                open = self.cond.wait(open).unwrap();
            }
            Ok(())
        }
    }

    pub(crate) fn record(clock: &RecordClock, value: u32) -> LogRecord {
        let id = |s| LoggingIdentifier::new(s).unwrap();
        let mut b = LogRecordBuilder::new(
            clock.ecu_id(),
            id("EXA"),
            id("DFLT"),
            LogLevel::Info,
            RecordLimits::default(),
        );
        b.add_argument(value);
        b.finalize(clock)
    }

    #[test]
    fn failure_is_isolated() {
        let clock = RecordClock::new(LoggingIdentifier::new("ECU1").unwrap());
        let good = Collector::new("good");
        let bad = Collector::failing("bad");
        let router = SinkRouter::builder()
            .sync_sink(bad.clone())
            .sync_sink(good.clone())
            .build()
            .unwrap();
        router.deliver(record(&clock, 1));
        router.deliver(record(&clock, 2));
        assert_eq!(good.values(), vec![1, 2]);
        let stats = router.stats();
        assert_eq!(stats[0].name, "bad");
        assert_eq!(stats[0].failed, 2);
        assert!(!stats[0].healthy);
        assert_eq!(stats[1].delivered, 2);
        assert!(stats[1].healthy);
    }

    #[test]
    fn async_route_is_fifo_and_drains_on_shutdown() {
        let clock = RecordClock::new(LoggingIdentifier::new("ECU1").unwrap());
        let sink = Collector::new("collector");
        let router = SinkRouter::builder()
            .async_sink(sink.clone(), 4096, OverflowPolicy::Block)
            .build()
            .unwrap();
        for i in 0..1000 {
            router.deliver(record(&clock, i));
        }
        router.shutdown();
        assert_eq!(sink.values(), (0..1000).collect::<Vec<u32>>());
        // after shutdown, records vanish quietly
        router.deliver(record(&clock, 1000));
        router.shutdown();
        assert_eq!(sink.values().len(), 1000);
    }

    #[test]
    fn full_queue_drops_exactly_one() {
        let clock = RecordClock::new(LoggingIdentifier::new("ECU1").unwrap());
        let gate = Arc::new(Gate {
            open: Mutex::new(false),
            cond: Condvar::new(),
            entered: Mutex::new(0),
        });
        let router = SinkRouter::builder()
            .async_sink(gate.clone(), 2, OverflowPolicy::DropNewest)
            .build()
            .unwrap();
        // The worker takes the first record & parks in the sink...
        router.deliver(record(&clock, 0));
        while *gate.entered.lock().unwrap() == 0 {
            std::thread::yield_now();
        }
        // ...so these two fill the queue...
        router.deliver(record(&clock, 1));
        router.deliver(record(&clock, 2));
        assert_eq!(router.pending("gate"), 2);
        assert_eq!(router.stats()[0].dropped, 0);
        // ...and this one overflows it.
        router.deliver(record(&clock, 3));
        assert_eq!(router.stats()[0].dropped, 1);

        *gate.open.lock().unwrap() = true;
        gate.cond.notify_all();
        router.shutdown();
        let stats = router.stats();
        assert_eq!(stats[0].delivered, 3);
        assert_eq!(stats[0].dropped, 1);
    }

    /// Panics on every delivery & flush.
    struct Panicky;

    impl Sink for Panicky {
        fn name(&self) -> &str {
            "panicky"
        }
        fn deliver(&self, _record: &LogRecord) -> Result<()> {
            panic!("deliver");
        }
        fn flush(&self) -> Result<()> {
            panic!("flush");
        }
    }

    #[test]
    fn panicking_sync_sink_is_isolated() {
        let clock = RecordClock::new(LoggingIdentifier::new("ECU1").unwrap());
        let good = Collector::new("good");
        let router = SinkRouter::builder()
            .sync_sink(Arc::new(Panicky))
            .sync_sink(good.clone())
            .build()
            .unwrap();
        for i in 0..3 {
            router.deliver(record(&clock, i));
        }
        router.shutdown();
        assert_eq!(good.values(), vec![0, 1, 2]);
        let stats = router.stats();
        // three deliveries & the flush
        assert_eq!(stats[0].failed, 4);
        assert!(!stats[0].healthy);
        assert!(stats[0].last_error.as_deref().unwrap().contains("panicky"));
        assert_eq!(stats[1].delivered, 3);
    }

    #[test]
    fn panicking_async_sink_never_blocks_producers() {
        let clock = Arc::new(RecordClock::new(LoggingIdentifier::new("ECU1").unwrap()));
        let router = Arc::new(
            SinkRouter::builder()
                .async_sink(Arc::new(Panicky), 1, OverflowPolicy::Block)
                .build()
                .unwrap(),
        );
        let (tx, rx) = std::sync::mpsc::channel();
        let producer = {
            let router = router.clone();
            let clock = clock.clone();
            std::thread::spawn(move || {
                for i in 0..3 {
                    router.deliver(record(&clock, i));
                }
                tx.send(()).unwrap();
            })
        };
        rx.recv_timeout(std::time::Duration::from_secs(10))
            .expect("producer blocked on a dead worker");
        producer.join().unwrap();
        router.shutdown();
        let stats = router.stats();
        assert_eq!(stats[0].delivered, 0);
        assert_eq!(stats[0].failed, 4);
    }

    #[test]
    fn concurrent_producers_keep_per_thread_order() {
        const THREADS: u32 = 4;
        const PER_THREAD: u32 = 500;
        let clock = Arc::new(RecordClock::new(LoggingIdentifier::new("ECU1").unwrap()));
        let sink = Collector::new("collector");
        let router = Arc::new(
            SinkRouter::builder()
                .async_sink(sink.clone(), 16, OverflowPolicy::Block)
                .build()
                .unwrap(),
        );
        let producers: Vec<_> = (0..THREADS)
            .map(|t| {
                let router = router.clone();
                let clock = clock.clone();
                std::thread::spawn(move || {
                    for i in 0..PER_THREAD {
                        router.deliver(record(&clock, t * PER_THREAD + i));
                    }
                })
            })
            .collect();
        for producer in producers {
            producer.join().unwrap();
        }
        router.shutdown();

        let seen = sink.seen.lock().unwrap();
        assert_eq!(seen.len(), (THREADS * PER_THREAD) as usize);
        let mut sequences: Vec<u64> = seen.iter().map(|r| r.header().stamp.sequence).collect();
        sequences.sort_unstable();
        sequences.dedup();
        assert_eq!(sequences.len(), seen.len());
        drop(seen);

        let values = sink.values();
        for t in 0..THREADS {
            let mine: Vec<u32> = values
                .iter()
                .copied()
                .filter(|v| v / PER_THREAD == t)
                .collect();
            let expected: Vec<u32> = (t * PER_THREAD..(t + 1) * PER_THREAD).collect();
            assert_eq!(mine, expected);
        }
    }
}
