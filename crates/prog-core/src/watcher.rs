//! `MessageWatcher<T>` — collects N scalar ids into one aggregate vector.
//!
//! Grounded on `original_source/inc/Messages/MessageWatcher.h`: a
//! presence bitmap plus a value buffer, tagged with the *last-received*
//! message's timestamp and cleared (presence only, not values) once a
//! round completes.
use crate::bus::{Handler, MessageBus};
use crate::message::{Message, MessageId, Payload};
use crate::time::TimestampUs;
use parking_lot::Mutex;
use std::sync::Arc;

struct WatcherState {
    values: Vec<f64>,
    present: Vec<bool>,
    last_timestamp: TimestampUs,
}

/// Subscribes to `ids.len()` scalar ids on `source` and, once a scalar
/// value has been seen for every one of them since the last emission,
/// publishes a single vector message under `publish_id` tagged with the
/// timestamp of whichever message completed the round.
pub struct MessageWatcher {
    bus: Arc<MessageBus>,
    source: Arc<str>,
    publish_id: MessageId,
    ids: Vec<MessageId>,
    state: Mutex<WatcherState>,
}

impl MessageWatcher {
    /// Constructs and subscribes the watcher. Returns an `Arc` so the
    /// watcher can be handed to `MessageBus::subscribe` as its own
    /// handler (it subscribes to itself, once per id, exactly as the
    /// original source does).
    pub fn new(
        bus: Arc<MessageBus>,
        source: impl Into<Arc<str>>,
        ids: Vec<MessageId>,
        publish_id: MessageId,
    ) -> Arc<Self> {
        let source = source.into();
        let n = ids.len();
        let watcher = Arc::new(MessageWatcher {
            bus: Arc::clone(&bus),
            source: Arc::clone(&source),
            publish_id,
            ids: ids.clone(),
            state: Mutex::new(WatcherState {
                values: vec![0.0; n],
                present: vec![false; n],
                last_timestamp: 0,
            }),
        });
        for id in &ids {
            let handler: Arc<dyn Handler> = watcher.clone();
            bus.subscribe(handler, source.clone(), *id);
        }
        watcher
    }

    fn slot_of(&self, id: MessageId) -> Option<usize> {
        self.ids.iter().position(|candidate| *candidate == id)
    }
}

impl Handler for MessageWatcher {
    fn handle(&self, message: &Message) {
        let Some(slot) = self.slot_of(message.id()) else {
            return;
        };
        let Ok(value) = message.scalar() else {
            return;
        };

        let aggregate = {
            let mut state = self.state.lock();
            state.values[slot] = value;
            state.present[slot] = true;
            state.last_timestamp = message.timestamp();

            if state.present.iter().all(|&p| p) {
                let values = state.values.clone();
                let timestamp = state.last_timestamp;
                state.present.iter_mut().for_each(|p| *p = false);
                Some((values, timestamp))
            } else {
                None
            }
        };

        if let Some((values, timestamp)) = aggregate {
            if let Ok(out) = Message::new(
                self.publish_id,
                Arc::clone(&self.source),
                timestamp,
                Payload::Vector(values),
            ) {
                self.bus.publish(out);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::MessageBus;
    use std::sync::Mutex as StdMutex;

    fn scalar(id: MessageId, source: &str, ts: TimestampUs, value: f64) -> Message {
        Message::new(id, source, ts, Payload::Scalar(value)).unwrap()
    }

    #[test]
    fn emits_one_aggregate_per_completed_round() {
        let bus = Arc::new(MessageBus::new_deferred());
        let _watcher = MessageWatcher::new(
            bus.clone(),
            "test",
            vec![MessageId::TEST_INPUT_0, MessageId::TEST_INPUT_1],
            MessageId::MODEL_INPUT_VECTOR,
        );

        let captured: Arc<StdMutex<Vec<(Vec<f64>, TimestampUs)>>> =
            Arc::new(StdMutex::new(Vec::new()));
        struct Capture(Arc<StdMutex<Vec<(Vec<f64>, TimestampUs)>>>);
        impl Handler for Capture {
            fn handle(&self, message: &Message) {
                self.0
                    .lock()
                    .unwrap()
                    .push((message.vector().unwrap().to_vec(), message.timestamp()));
            }
        }
        bus.subscribe(
            Arc::new(Capture(captured.clone())),
            "test",
            MessageId::MODEL_INPUT_VECTOR,
        );

        bus.publish(scalar(MessageId::TEST_INPUT_0, "test", 100, 42.0));
        bus.wait_all();
        assert!(captured.lock().unwrap().is_empty(), "round incomplete, no emission yet");

        bus.publish(scalar(MessageId::TEST_INPUT_1, "test", 200, 97.0));
        bus.wait_all();

        let results = captured.lock().unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].0, vec![42.0, 97.0]);
        assert_eq!(results[0].1, 200);
    }

    #[test]
    fn presence_bitmap_clears_after_emission_but_values_persist() {
        let bus = Arc::new(MessageBus::new_deferred());
        let watcher = MessageWatcher::new(
            bus.clone(),
            "test",
            vec![MessageId::TEST_INPUT_0, MessageId::TEST_INPUT_1],
            MessageId::MODEL_INPUT_VECTOR,
        );
        bus.publish(scalar(MessageId::TEST_INPUT_0, "test", 1, 1.0));
        bus.publish(scalar(MessageId::TEST_INPUT_1, "test", 2, 2.0));
        bus.wait_all();
        let state = watcher.state.lock();
        assert!(state.present.iter().all(|&p| !p));
        assert_eq!(state.values, vec![1.0, 2.0]);
    }
}
