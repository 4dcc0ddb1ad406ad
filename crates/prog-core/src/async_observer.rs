//! `AsyncObserver` — the message-driven wrapper around an [`Observer`].
//!
//! Grounded on `spec.md` §4.7: two input/output [`MessageWatcher`]s
//! feeding a timed-mutex back-pressure point, a single initialize call,
//! then `step`+publish thereafter.
use crate::bus::{Handler, MessageBus};
use crate::message::{Message, MessageId, Payload};
use crate::model::SystemModel;
use crate::observer::Observer;
use crate::time::{as_seconds, TimestampUs};
use crate::watcher::MessageWatcher;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug_span, warn};

const LOCK_TIMEOUT: Duration = Duration::from_millis(10);

struct ObserverState {
    observer: Box<dyn Observer>,
    input: Option<(Vec<f64>, TimestampUs)>,
    output: Option<(Vec<f64>, TimestampUs)>,
}

/// Listens for `ModelInputVector`/`ModelOutputVector` on `source`,
/// initializes the wrapped observer exactly once, then steps it and
/// publishes `ModelStateEstimate` on every subsequent complete
/// (input, output) pair.
pub struct AsyncObserver {
    bus: Arc<MessageBus>,
    model: Arc<dyn SystemModel>,
    source: Arc<str>,
    state: Mutex<ObserverState>,
    _input_watcher: Arc<MessageWatcher>,
    _output_watcher: Arc<MessageWatcher>,
}

impl AsyncObserver {
    pub fn new(
        bus: Arc<MessageBus>,
        model: Arc<dyn SystemModel>,
        observer: Box<dyn Observer>,
        source: impl Into<Arc<str>>,
    ) -> Arc<Self> {
        let source = source.into();
        let input_watcher = MessageWatcher::new(
            bus.clone(),
            source.clone(),
            model.inputs().to_vec(),
            MessageId::MODEL_INPUT_VECTOR,
        );
        let output_watcher = MessageWatcher::new(
            bus.clone(),
            source.clone(),
            model.outputs().to_vec(),
            MessageId::MODEL_OUTPUT_VECTOR,
        );

        let wrapper = Arc::new(AsyncObserver {
            bus: bus.clone(),
            model,
            source: source.clone(),
            state: Mutex::new(ObserverState {
                observer,
                input: None,
                output: None,
            }),
            _input_watcher: input_watcher,
            _output_watcher: output_watcher,
        });

        let handler: Arc<dyn Handler> = wrapper.clone();
        bus.subscribe(handler.clone(), source.clone(), MessageId::MODEL_INPUT_VECTOR);
        bus.subscribe(handler, source, MessageId::MODEL_OUTPUT_VECTOR);
        wrapper
    }

    fn no_inputs(&self) -> bool {
        self.model.inputs().is_empty()
    }

    fn no_outputs(&self) -> bool {
        self.model.outputs().is_empty()
    }
}

impl Handler for AsyncObserver {
    fn handle(&self, message: &Message) {
        let _span = debug_span!("async_observer.on_message", source = %self.source).entered();

        let Some(mut state) = self.state.try_lock_for(LOCK_TIMEOUT) else {
            warn!(source = %self.source, "async observer busy, dropping message");
            return;
        };

        if message.id() == MessageId::MODEL_INPUT_VECTOR {
            if let Ok(vec) = message.vector() {
                state.input = Some((vec.to_vec(), message.timestamp()));
            }
        } else if message.id() == MessageId::MODEL_OUTPUT_VECTOR {
            if let Ok(vec) = message.vector() {
                state.output = Some((vec.to_vec(), message.timestamp()));
            }
        } else {
            return;
        }

        let input_ready = state.input.is_some() || self.no_inputs();
        let output_ready = state.output.is_some() || self.no_outputs();
        if !(input_ready && output_ready) {
            return;
        }

        let (u, t_u) = state.input.clone().unwrap_or((Vec::new(), message.timestamp()));
        let (z, t_z) = state.output.clone().unwrap_or((Vec::new(), message.timestamp()));
        let t = as_seconds(t_u.max(t_z));

        let result = if !state.observer.is_initialized() {
            self.model.initialize(&u, &z).and_then(|x0| {
                state.observer.initialize(t, x0, u.clone())?;
                Ok(None)
            })
        } else {
            state.observer.step(t, &u, &z).map(|_| {
                Some(state.observer.get_state_estimate())
            })
        };

        match result {
            Ok(Some(estimate)) => {
                if let Ok(out) = Message::new(
                    MessageId::MODEL_STATE_ESTIMATE,
                    self.source.clone(),
                    t_u.max(t_z),
                    Payload::UDataVector(estimate),
                ) {
                    self.bus.publish(out);
                }
            }
            Ok(None) => {}
            Err(err) => {
                warn!(source = %self.source, error = %err, "observer step failed; message dropped");
            }
        }

        state.input = None;
        state.output = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConfigMap;
    use crate::error::ProgError;
    use crate::observer::Ukf;

    struct Identity;
    impl SystemModel for Identity {
        fn state_size(&self) -> usize {
            2
        }
        fn inputs(&self) -> &[MessageId] {
            const IDS: [MessageId; 2] = [MessageId::TEST_INPUT_0, MessageId::TEST_INPUT_1];
            &IDS
        }
        fn outputs(&self) -> &[MessageId] {
            const IDS: [MessageId; 1] = [MessageId::TEST_OUTPUT_0];
            &IDS
        }
        fn events(&self) -> &[MessageId] {
            &[]
        }
        fn state_eqn(&self, _t: f64, x: &[f64], _u: &[f64], _dt: f64) -> Result<Vec<f64>, ProgError> {
            Ok(x.to_vec())
        }
        fn output_eqn(&self, _t: f64, x: &[f64]) -> Result<Vec<f64>, ProgError> {
            Ok(vec![x[0] * x[1]])
        }
        fn initialize(&self, u: &[f64], _z: &[f64]) -> Result<Vec<f64>, ProgError> {
            Ok(u.to_vec())
        }
    }

    #[test]
    fn scenario_3_first_round_initializes_without_publishing() {
        let bus = Arc::new(MessageBus::new_deferred());
        let model: Arc<dyn SystemModel> = Arc::new(Identity);
        let mut cfg = ConfigMap::new();
        cfg.set(
            "Observer.Q",
            vec!["0.01".into(), "0".into(), "0".into(), "0.01".into()],
        );
        cfg.set("Observer.R", vec!["0.1".into()]);
        let observer = Box::new(Ukf::new(model.clone(), &cfg).unwrap());

        let captured: Arc<Mutex<Vec<Message>>> = Arc::new(Mutex::new(Vec::new()));
        struct Capture(Arc<Mutex<Vec<Message>>>);
        impl Handler for Capture {
            fn handle(&self, message: &Message) {
                self.0.lock().push(message.clone());
            }
        }
        bus.subscribe(
            Arc::new(Capture(captured.clone())),
            "battery0",
            MessageId::MODEL_STATE_ESTIMATE,
        );

        let _async_observer = AsyncObserver::new(bus.clone(), model, observer, "battery0");

        bus.publish(Message::new(MessageId::TEST_INPUT_0, "battery0", 0, Payload::Scalar(1.0)).unwrap());
        bus.publish(Message::new(MessageId::TEST_INPUT_1, "battery0", 0, Payload::Scalar(2.0)).unwrap());
        bus.publish(Message::new(MessageId::TEST_OUTPUT_0, "battery0", 0, Payload::Scalar(3.0)).unwrap());
        bus.wait_all();
        assert!(captured.lock().is_empty(), "first round only initializes");

        bus.publish(Message::new(MessageId::TEST_INPUT_0, "battery0", 1_000_000, Payload::Scalar(1.0)).unwrap());
        bus.publish(Message::new(MessageId::TEST_INPUT_1, "battery0", 1_000_000, Payload::Scalar(2.0)).unwrap());
        bus.publish(Message::new(MessageId::TEST_OUTPUT_0, "battery0", 1_000_000, Payload::Scalar(3.0)).unwrap());
        bus.wait_all();

        let results = captured.lock();
        assert_eq!(results.len(), 1);
    }
}
