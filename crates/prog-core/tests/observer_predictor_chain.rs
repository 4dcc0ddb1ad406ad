//! End-to-end scenario: `ModelInputVector`/`ModelOutputVector` messages
//! drive an `AsyncObserver`, whose `ModelStateEstimate` publications in
//! turn drive an `AsyncPredictor`, producing a batched `Prediction` with
//! no component wired together directly — only the bus connects them.
use prog_core::{
    AsyncObserver, AsyncPredictor, BatteryModel, ConfigMap, Handler, LoadEstimator, Message,
    MessageBus, MessageId, MonteCarlo, Payload, PrognosticsModel, ProgError, SystemModel, UData,
    Ukf,
};
use prog_core::predictor::{default_savepoints, SavePointProvider};
use parking_lot::Mutex;
use std::sync::Arc;

struct ConstLoad(f64);

impl LoadEstimator for ConstLoad {
    fn estimate_load(&self, _t: f64) -> Result<Vec<f64>, ProgError> {
        Ok(vec![self.0])
    }
}

struct HorizonSavePoints(f64);

impl SavePointProvider for HorizonSavePoints {
    fn savepoints(&self, t_now: f64, horizon: f64) -> Vec<f64> {
        default_savepoints(horizon - t_now, 4)
    }
}

fn observer_config() -> ConfigMap {
    let mut cfg = ConfigMap::new();
    let n = 8usize;
    let mut q = vec!["0".to_string(); n * n];
    for i in 0..n {
        q[i * n + i] = "0.001".into();
    }
    cfg.set("Observer.Q", q);
    cfg.set(
        "Observer.R",
        vec!["0.01".into(), "0".into(), "0".into(), "0.25".into()],
    );
    cfg
}

fn predictor_config() -> ConfigMap {
    let mut cfg = ConfigMap::new();
    cfg.set("Predictor.SampleCount", vec!["20".into()]);
    cfg.set("Predictor.Horizon", vec!["2000".into()]);
    cfg.set("Model.ProcessNoise", vec!["0".into(); 8]);
    cfg
}

struct Capture(Arc<Mutex<Vec<Message>>>);

impl Handler for Capture {
    fn handle(&self, message: &Message) {
        self.0.lock().push(message.clone());
    }
}

#[test]
fn state_estimate_flows_from_observer_to_predictor_as_a_prediction() {
    let bus = Arc::new(MessageBus::new_deferred());
    let source: Arc<str> = "battery0".into();

    let model: Arc<BatteryModel> = Arc::new(BatteryModel::new());
    let model_as_system: Arc<dyn SystemModel> = model.clone();
    let model_as_prognostics: Arc<dyn PrognosticsModel> = model;

    let observer = Box::new(Ukf::new(model_as_system.clone(), &observer_config()).unwrap());
    let load: Arc<dyn LoadEstimator> = Arc::new(ConstLoad(10.0));
    let savepoints: Arc<dyn SavePointProvider> = Arc::new(HorizonSavePoints(0.0));
    let predictor = Box::new(
        MonteCarlo::new(model_as_prognostics, load, savepoints, &predictor_config()).unwrap(),
    );

    let predictions: Arc<Mutex<Vec<Message>>> = Arc::new(Mutex::new(Vec::new()));
    bus.subscribe(
        Arc::new(Capture(predictions.clone())),
        source.clone(),
        MessageId::PREDICTION,
    );

    let _async_observer =
        AsyncObserver::new(bus.clone(), model_as_system, observer, source.clone());
    let _async_predictor = AsyncPredictor::new(bus.clone(), predictor, source.clone(), true);

    // First round only initializes the observer; no state estimate yet.
    bus.publish(Message::new(MessageId::MODEL_INPUT_VECTOR, source.clone(), 0, Payload::Vector(vec![10.0])).unwrap());
    bus.publish(
        Message::new(MessageId::MODEL_OUTPUT_VECTOR, source.clone(), 0, Payload::Vector(vec![4.0, 292.15])).unwrap(),
    );
    bus.wait_all();
    assert!(predictions.lock().is_empty(), "observer only initializes on its first round");

    // Second round produces a state estimate, which should trigger a prediction.
    bus.publish(
        Message::new(MessageId::MODEL_INPUT_VECTOR, source.clone(), 1_000_000, Payload::Vector(vec![10.0])).unwrap(),
    );
    bus.publish(
        Message::new(MessageId::MODEL_OUTPUT_VECTOR, source.clone(), 1_000_000, Payload::Vector(vec![3.9, 293.0])).unwrap(),
    );
    bus.wait_all();

    let captured = predictions.lock();
    assert_eq!(captured.len(), 1, "one state estimate should yield exactly one prediction");
    let prediction = match captured[0].payload() {
        Payload::Prediction(p) => p.clone(),
        other => panic!("expected a Prediction payload, got {other:?}"),
    };
    assert_eq!(prediction.events.len(), 1, "BatteryModel declares one event");
    let toe_samples = match &prediction.events[0].toe {
        UData::Samples(s) => s,
        other => panic!("expected Samples time-of-event, got {other:?}"),
    };
    assert_eq!(toe_samples.len(), 20, "one time-of-event sample per Monte-Carlo draw");
}

#[test]
fn dropping_the_prognoser_components_unsubscribes_both_wrappers() {
    let bus = Arc::new(MessageBus::new_deferred());
    let source: Arc<str> = "battery1".into();

    let model: Arc<BatteryModel> = Arc::new(BatteryModel::new());
    let model_as_system: Arc<dyn SystemModel> = model.clone();
    let model_as_prognostics: Arc<dyn PrognosticsModel> = model;

    let observer = Box::new(Ukf::new(model_as_system.clone(), &observer_config()).unwrap());
    let load: Arc<dyn LoadEstimator> = Arc::new(ConstLoad(10.0));
    let savepoints: Arc<dyn SavePointProvider> = Arc::new(HorizonSavePoints(0.0));
    let predictor = Box::new(
        MonteCarlo::new(model_as_prognostics, load, savepoints, &predictor_config()).unwrap(),
    );

    let predictions: Arc<Mutex<Vec<Message>>> = Arc::new(Mutex::new(Vec::new()));
    bus.subscribe(
        Arc::new(Capture(predictions.clone())),
        source.clone(),
        MessageId::PREDICTION,
    );

    let async_observer = AsyncObserver::new(bus.clone(), model_as_system, observer, source.clone());
    let async_predictor = AsyncPredictor::new(bus.clone(), predictor, source.clone(), true);

    let observer_handler: Arc<dyn Handler> = async_observer.clone();
    let predictor_handler: Arc<dyn Handler> = async_predictor.clone();
    bus.unsubscribe(&observer_handler);
    bus.unsubscribe(&predictor_handler);
    drop(async_observer);
    drop(async_predictor);

    bus.publish(Message::new(MessageId::MODEL_INPUT_VECTOR, source.clone(), 0, Payload::Vector(vec![10.0])).unwrap());
    bus.publish(
        Message::new(MessageId::MODEL_OUTPUT_VECTOR, source.clone(), 0, Payload::Vector(vec![4.0, 292.15])).unwrap(),
    );
    bus.wait_all();
    assert!(predictions.lock().is_empty(), "unsubscribed wrappers must not react");
}
