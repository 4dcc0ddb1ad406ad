//! `MessageBus` — the publish/subscribe scheduling core.
//!
//! # 设计背景（Why）
//! - 观测器、预测器与轨迹服务三者互不直接调用，完全通过发布/订阅解耦，这样才能
//!   让每个包装器独立被丢弃、独立被背压，而不必了解彼此的存在。
//! - 总线本身提供两种调度模式：`deferred`（单线程协作式，便于测试的确定性）与
//!   `async`（线程池，用于生产环境下的真实并发）。两者共用同一套订阅表与匹配逻辑，
//!   只有投递路径不同。
//!
//! # 执行逻辑（How）
//! - 订阅表是 `source -> Vec<Subscription>`，用 `DashMap` 承载，保证同一 `source`
//!   下的订阅顺序（插入顺序）在并发订阅/退订时依然保留。
//! - `deferred` 模式下 `publish` 只是把消息压入一个互斥锁保护的队列；真正的投递发生
//!   在 `wait_all`/`wait_for`/`wait_until` 调用时，按 FIFO 顺序在调用者线程上完成。
//! - `async` 模式下每条消息按 `source` 的哈希分发到固定数量的工作线程之一，
//!   保证同一 `source` 的消息始终在同一工作线程上顺序处理，从而满足
//!   "同一 (source, handler) 的消息按发布顺序投递" 的不变量，同时允许不同 `source`
//!   并行处理。
mod pool;

use crate::message::{Message, MessageId};
use dashmap::DashMap;
use parking_lot::Mutex;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

pub use pool::WorkerPool;

/// A subscriber callback. Implementors are identified by `Arc` pointer
/// equality for the purposes of `unsubscribe`, mirroring the original
/// source's use of an `IMessageProcessor*` as the subscriber's identity.
pub trait Handler: Send + Sync {
    fn handle(&self, message: &Message);
}

impl<F> Handler for F
where
    F: Fn(&Message) + Send + Sync,
{
    fn handle(&self, message: &Message) {
        self(message)
    }
}

#[derive(Clone)]
struct Subscription {
    id: MessageId,
    handler: Arc<dyn Handler>,
}

enum Dispatch {
    Deferred { queue: Mutex<Vec<Message>> },
    Async { pool: WorkerPool },
}

/// The bus's scheduling mode, selected at construction (`spec.md` §4.1).
pub enum BusMode {
    Deferred,
    Async { workers: usize },
}

/// The publish/subscribe message bus.
pub struct MessageBus {
    subscriptions: DashMap<Arc<str>, Vec<Subscription>>,
    dispatch: Dispatch,
    in_flight: Arc<AtomicU64>,
    quiescent: Arc<(Mutex<()>, parking_lot::Condvar)>,
}

impl MessageBus {
    pub fn new(mode: BusMode) -> Self {
        let in_flight = Arc::new(AtomicU64::new(0));
        let quiescent = Arc::new((Mutex::new(()), parking_lot::Condvar::new()));
        let dispatch = match mode {
            BusMode::Deferred => Dispatch::Deferred {
                queue: Mutex::new(Vec::new()),
            },
            BusMode::Async { workers } => Dispatch::Async {
                pool: WorkerPool::new(workers.max(1)),
            },
        };
        MessageBus {
            subscriptions: DashMap::new(),
            dispatch,
            in_flight,
            quiescent,
        }
    }

    /// A deferred-mode bus: single-threaded, cooperative, fully
    /// deterministic — the mode used by the integration tests.
    pub fn new_deferred() -> Self {
        MessageBus::new(BusMode::Deferred)
    }

    /// An async-mode bus backed by a fixed-size worker pool.
    pub fn new_async(workers: usize) -> Self {
        MessageBus::new(BusMode::Async { workers })
    }

    /// Registers `handler` to receive messages published on `source` whose
    /// id matches `id` (or every id, if `id` is [`MessageId::ALL`]).
    pub fn subscribe(&self, handler: Arc<dyn Handler>, source: impl Into<Arc<str>>, id: MessageId) {
        let source = source.into();
        self.subscriptions
            .entry(source)
            .or_default()
            .push(Subscription { id, handler });
    }

    /// Removes every subscription registered by `handler`, across all
    /// sources.
    pub fn unsubscribe(&self, handler: &Arc<dyn Handler>) {
        for mut entry in self.subscriptions.iter_mut() {
            entry.value_mut().retain(|s| !Arc::ptr_eq(&s.handler, handler));
        }
    }

    /// Removes only the subscriptions `handler` holds for `source`.
    pub fn unsubscribe_source(&self, handler: &Arc<dyn Handler>, source: &str) {
        if let Some(mut entry) = self.subscriptions.get_mut(source) {
            entry.retain(|s| !Arc::ptr_eq(&s.handler, handler));
        }
    }

    /// Publishes `message`. In deferred mode this only enqueues the
    /// message; actual delivery happens on the next `wait_all`/`wait_for`/
    /// `wait_until`. In async mode this submits delivery to the worker
    /// pool, sharded by `source` so per-`(source, handler)` order is
    /// preserved.
    pub fn publish(&self, message: Message) {
        match &self.dispatch {
            Dispatch::Deferred { queue } => {
                queue.lock().push(message);
            }
            Dispatch::Async { pool } => {
                self.dispatch_async(pool, message);
            }
        }
    }

    fn dispatch_async(&self, pool: &WorkerPool, message: Message) {
        let handlers = self.matching_handlers(&message);
        self.in_flight.fetch_add(1, Ordering::SeqCst);
        let in_flight = Arc::clone(&self.in_flight);
        let quiescent = Arc::clone(&self.quiescent);
        pool.submit(message.source(), move || {
            deliver(&message, &handlers);
            if in_flight.fetch_sub(1, Ordering::SeqCst) == 1 {
                let (lock, cvar) = &*quiescent;
                let _guard = lock.lock();
                cvar.notify_all();
            }
        });
    }

    fn matching_handlers(&self, message: &Message) -> Vec<Arc<dyn Handler>> {
        self.subscriptions
            .get(message.source())
            .map(|entry| {
                entry
                    .iter()
                    .filter(|s| message.id().matches(s.id))
                    .map(|s| Arc::clone(&s.handler))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Drains and delivers every message published before this call, on
    /// the calling thread (deferred mode) or by blocking until the worker
    /// pool's in-flight counter reaches zero (async mode).
    pub fn wait_all(&self) {
        match &self.dispatch {
            Dispatch::Deferred { queue } => {
                let pending: Vec<Message> = std::mem::take(&mut *queue.lock());
                for message in pending {
                    let handlers = self.matching_handlers(&message);
                    deliver(&message, &handlers);
                }
            }
            Dispatch::Async { pool: _ } => {
                let (lock, cvar) = &*self.quiescent;
                let mut guard = lock.lock();
                while self.in_flight.load(Ordering::SeqCst) > 0 {
                    cvar.wait(&mut guard);
                }
            }
        }
    }

    /// Like [`MessageBus::wait_all`], but always sleeps at least
    /// `duration` before returning, even if the queue drains sooner —
    /// intentional per `spec.md` §4.1, since this primitive doubles as a
    /// "settle" delay used by tests and by the reference prognoser loop.
    pub fn wait_for(&self, duration: Duration) {
        let start = Instant::now();
        self.wait_all();
        let elapsed = start.elapsed();
        if elapsed < duration {
            std::thread::sleep(duration - elapsed);
        }
    }

    /// Like [`MessageBus::wait_for`], computed against an absolute
    /// deadline instead of a duration.
    pub fn wait_until(&self, deadline: Instant) {
        let now = Instant::now();
        if deadline > now {
            self.wait_for(deadline - now);
        } else {
            self.wait_all();
        }
    }
}

fn deliver(message: &Message, handlers: &[Arc<dyn Handler>]) {
    for handler in handlers {
        let outcome = catch_unwind(AssertUnwindSafe(|| handler.handle(message)));
        if let Err(panic) = outcome {
            let reason = panic_message(&panic);
            warn!(
                source = message.source(),
                id = %message.id(),
                reason,
                "subscriber handler panicked; message delivery to this handler abandoned"
            );
        } else {
            debug!(source = message.source(), id = %message.id(), "message delivered");
        }
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> &str {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.as_str()
    } else {
        "non-string panic payload"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::Payload;
    use std::sync::atomic::AtomicUsize;

    struct CountingHandler(AtomicUsize);

    impl Handler for CountingHandler {
        fn handle(&self, _message: &Message) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn msg(id: MessageId, source: &str) -> Message {
        Message::new(id, source, 0, Payload::Scalar(1.0)).unwrap()
    }

    #[test]
    fn fan_out_matches_scenario_1() {
        let bus = MessageBus::new_deferred();
        let h1 = Arc::new(CountingHandler(AtomicUsize::new(0)));
        let h2 = Arc::new(CountingHandler(AtomicUsize::new(0)));
        let h3 = Arc::new(CountingHandler(AtomicUsize::new(0)));

        bus.subscribe(h1.clone(), "A", MessageId::TEST_INPUT_0);
        bus.subscribe(h2.clone(), "A", MessageId::ALL);
        bus.subscribe(h3.clone(), "B", MessageId::ALL);

        bus.publish(msg(MessageId::TEST_INPUT_0, "A"));
        bus.publish(msg(MessageId::TEST_INPUT_1, "A"));
        bus.publish(msg(MessageId::TEST_INPUT_0, "B"));
        bus.wait_all();

        assert_eq!(h1.0.load(Ordering::SeqCst), 1);
        assert_eq!(h2.0.load(Ordering::SeqCst), 2);
        assert_eq!(h3.0.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn unsubscribe_stops_future_delivery() {
        let bus = MessageBus::new_deferred();
        let h1 = Arc::new(CountingHandler(AtomicUsize::new(0)));
        bus.subscribe(h1.clone(), "A", MessageId::ALL);
        bus.publish(msg(MessageId::VOLTS, "A"));
        bus.wait_all();
        let handler: Arc<dyn Handler> = h1.clone();
        bus.unsubscribe(&handler);
        bus.publish(msg(MessageId::VOLTS, "A"));
        bus.wait_all();
        assert_eq!(h1.0.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn panicking_handler_does_not_block_others() {
        let bus = MessageBus::new_deferred();
        struct Panicker;
        impl Handler for Panicker {
            fn handle(&self, _message: &Message) {
                panic!("boom");
            }
        }
        let counting = Arc::new(CountingHandler(AtomicUsize::new(0)));
        bus.subscribe(Arc::new(Panicker), "A", MessageId::ALL);
        bus.subscribe(counting.clone(), "A", MessageId::ALL);
        bus.publish(msg(MessageId::VOLTS, "A"));
        bus.wait_all();
        assert_eq!(counting.0.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn wait_for_sleeps_at_least_the_requested_duration() {
        let bus = MessageBus::new_deferred();
        let start = Instant::now();
        bus.wait_for(Duration::from_millis(20));
        assert!(start.elapsed() >= Duration::from_millis(20));
    }

    #[test]
    fn async_mode_preserves_per_source_order() {
        let bus = MessageBus::new_async(4);
        let seen = Arc::new(Mutex::new(Vec::new()));
        struct Recorder(Arc<Mutex<Vec<f64>>>);
        impl Handler for Recorder {
            fn handle(&self, message: &Message) {
                self.0.lock().push(message.scalar().unwrap());
            }
        }
        let handler = Arc::new(Recorder(seen.clone()));
        bus.subscribe(handler, "A", MessageId::ALL);
        for i in 0..20 {
            bus.publish(
                Message::new(MessageId::VOLTS, "A", i, Payload::Scalar(i as f64)).unwrap(),
            );
        }
        bus.wait_all();
        let recorded = seen.lock();
        let expected: Vec<f64> = (0..20).map(|i| i as f64).collect();
        assert_eq!(*recorded, expected);
    }
}
