//! `AsyncPredictor` — the message-driven wrapper around a [`Predictor`].
//!
//! Grounded on `spec.md` §4.8: a single timed-mutex back-pressure point
//! around `predict`, with either batched `Prediction` publication or one
//! `ProgEvent` message per event.
use crate::bus::{Handler, MessageBus};
use crate::message::{Message, MessageId, Payload};
use crate::predictor::Predictor;
use crate::time::as_seconds;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug_span, warn};

const LOCK_TIMEOUT: Duration = Duration::from_millis(10);

/// Listens for `ModelStateEstimate` on `source`, runs the wrapped
/// predictor under a timed mutex, and publishes the result — either a
/// single batched `Prediction` message, or one `ProgEvent` message per
/// event, depending on `batch`.
pub struct AsyncPredictor {
    bus: Arc<MessageBus>,
    predictor: Mutex<Box<dyn Predictor>>,
    source: Arc<str>,
    batch: bool,
}

impl AsyncPredictor {
    pub fn new(
        bus: Arc<MessageBus>,
        predictor: Box<dyn Predictor>,
        source: impl Into<Arc<str>>,
        batch: bool,
    ) -> Arc<Self> {
        let source = source.into();
        let wrapper = Arc::new(AsyncPredictor {
            bus: bus.clone(),
            predictor: Mutex::new(predictor),
            source: source.clone(),
            batch,
        });
        let handler: Arc<dyn Handler> = wrapper.clone();
        bus.subscribe(handler, source, MessageId::MODEL_STATE_ESTIMATE);
        wrapper
    }
}

impl Handler for AsyncPredictor {
    fn handle(&self, message: &Message) {
        if message.id() != MessageId::MODEL_STATE_ESTIMATE {
            return;
        }
        let _span = debug_span!("async_predictor.on_message", source = %self.source).entered();

        let Some(predictor) = self.predictor.try_lock_for(LOCK_TIMEOUT) else {
            warn!(source = %self.source, "async predictor busy, dropping state estimate");
            return;
        };

        let state_estimate = match message.udata_vector() {
            Ok(v) => v,
            Err(err) => {
                warn!(source = %self.source, error = %err, "state estimate message had unexpected payload");
                return;
            }
        };

        let t_now = as_seconds(message.timestamp());
        match predictor.predict(t_now, state_estimate) {
            Ok(prediction) => {
                if self.batch {
                    if let Ok(out) = Message::new(
                        MessageId::PREDICTION,
                        self.source.clone(),
                        message.timestamp(),
                        Payload::Prediction(Arc::new(prediction)),
                    ) {
                        self.bus.publish(out);
                    }
                } else {
                    for event in prediction.events {
                        let id = event.id;
                        if let Ok(out) = Message::new(
                            id,
                            self.source.clone(),
                            message.timestamp(),
                            Payload::ProgEvent(Arc::new(event)),
                        ) {
                            self.bus.publish(out);
                        }
                    }
                }
            }
            Err(err) => {
                warn!(source = %self.source, error = %err, "prediction failed; state estimate dropped");
            }
        }
    }
}
