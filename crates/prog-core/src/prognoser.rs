//! `AsyncPrognoser` and its builder — assembles C5/C7-C10 into one
//! running system wired through configuration.
//!
//! Grounded on `original_source/inc/AsyncPrognoserBuilder.h`'s surface
//! (`setLoadEstimatorName`, two `setConfigParam` overloads, `build`,
//! `reset`) and `spec.md` §4.9's construction order.
use crate::async_observer::AsyncObserver;
use crate::async_predictor::AsyncPredictor;
use crate::battery::BatteryModel;
use crate::bus::{Handler, MessageBus};
use crate::config::ConfigMap;
use crate::error::ProgError;
use crate::load::{Const, Gaussian, LoadEstimator, MovingAverage, Profile};
use crate::message::{Message, MessageId};
use crate::model::{PrognosticsModel, SystemModel};
use crate::observer::{Observer, Ukf};
use crate::predictor::{MonteCarlo, Predictor, SavePointProvider, TrajectorySavePoints};
use crate::trajectory::TrajectoryAdapter;
use std::sync::Arc;

/// The config key under which the load estimator's name is recorded.
pub const LOAD_ESTIMATOR_KEY: &str = "LoadEstimator";
/// The load estimator used when none is configured.
pub const DEFAULT_LOAD_ESTIMATOR: &str = "MovingAverage";

/// Builds an [`AsyncPrognoser`] from a [`ConfigMap`].
#[derive(Default)]
pub struct AsyncPrognoserBuilder {
    config: ConfigMap,
    load_estimator_name: Option<String>,
}

impl AsyncPrognoserBuilder {
    pub fn new() -> Self {
        AsyncPrognoserBuilder::default()
    }

    /// Builds directly from an already-populated [`ConfigMap`] (e.g. one
    /// assembled by the CLI harness from a config file plus argument
    /// overrides), replacing any configuration accumulated so far.
    pub fn with_config(&mut self, config: ConfigMap) -> &mut Self {
        self.config = config;
        self
    }

    pub fn with_load_estimator(&mut self, name: impl Into<String>) -> &mut Self {
        self.load_estimator_name = Some(name.into());
        self
    }

    pub fn with_param(&mut self, key: impl Into<String>, values: Vec<String>) -> &mut Self {
        self.config.set(key, values);
        self
    }

    /// Discards all accumulated configuration, restoring the builder to
    /// its just-constructed state.
    pub fn reset(&mut self) {
        self.config = ConfigMap::new();
        self.load_estimator_name = None;
    }

    fn build_model(&self) -> Result<Arc<BatteryModel>, ProgError> {
        match self.config.get_string("model")? {
            "Battery" => Ok(Arc::new(BatteryModel::new())),
            other => Err(ProgError::not_supported(format!("unknown model {other}"))),
        }
    }

    /// Returns the concrete model wrapped as both the [`SystemModel`] and
    /// [`PrognosticsModel`] trait objects. Both come from unsizing the
    /// same concrete `Arc<BatteryModel>` rather than converting one
    /// trait object into the other, since Arc<dyn Sub> -> Arc<dyn Super>
    /// requires trait-object upcasting this crate's MSRV predates.
    fn build_model_handles(&self) -> Result<(Arc<dyn SystemModel>, Arc<dyn PrognosticsModel>), ProgError> {
        let concrete = self.build_model()?;
        Ok((concrete.clone(), concrete))
    }

    fn build_observer(&self, model: Arc<dyn SystemModel>) -> Result<Box<dyn Observer>, ProgError> {
        match self.config.get_string("observer")? {
            "UKF" => Ok(Box::new(Ukf::new(model, &self.config)?)),
            other => Err(ProgError::not_supported(format!("unknown observer {other}"))),
        }
    }

    fn build_load_estimator(&self) -> Result<Arc<dyn LoadEstimator>, ProgError> {
        let name = self
            .load_estimator_name
            .as_deref()
            .or_else(|| self.config.get_string(LOAD_ESTIMATOR_KEY).ok())
            .unwrap_or(DEFAULT_LOAD_ESTIMATOR);
        Ok(match name {
            "Const" => Arc::new(Const::from_config(&self.config)?) as Arc<dyn LoadEstimator>,
            "Gaussian" => Arc::new(Gaussian::from_config(&self.config)?),
            "MovingAverage" => Arc::new(MovingAverage::from_config(&self.config)?),
            "Profile" => Arc::new(Profile::from_config(&self.config)?),
            other => return Err(ProgError::not_supported(format!("unknown load estimator {other}"))),
        })
    }

    fn build_predictor(
        &self,
        model: Arc<dyn PrognosticsModel>,
        load: Arc<dyn LoadEstimator>,
        trajectory: &Arc<TrajectoryAdapter>,
    ) -> Result<Box<dyn Predictor>, ProgError> {
        match self.config.get_string("predictor")? {
            "MonteCarlo" => {
                let savepoints: Arc<dyn SavePointProvider> =
                    Arc::new(TrajectorySavePoints::new(trajectory.shared()));
                Ok(Box::new(MonteCarlo::new(model, load, savepoints, &self.config)?))
            }
            other => Err(ProgError::not_supported(format!("unknown predictor {other}"))),
        }
    }

    /// Assembles an `AsyncPrognoser`: trajectory service, load estimator,
    /// model, observer, predictor, then the `AsyncObserver`/
    /// `AsyncPredictor` wrappers, in that order (`spec.md` §4.9).
    pub fn build(
        &self,
        bus: Arc<MessageBus>,
        sensor_source: impl Into<Arc<str>>,
        trajectory_source: impl Into<Arc<str>>,
    ) -> Result<AsyncPrognoser, ProgError> {
        let sensor_source = sensor_source.into();

        let trajectory = TrajectoryAdapter::new(&bus, trajectory_source);
        let load = self.build_load_estimator()?;
        let (model_as_system, model_as_prognostics) = self.build_model_handles()?;
        let observer = self.build_observer(model_as_system.clone())?;
        let predictor = self.build_predictor(model_as_prognostics, load.clone(), &trajectory)?;

        let async_observer =
            AsyncObserver::new(bus.clone(), model_as_system, observer, sensor_source.clone());
        let batch = self
            .config
            .get_string("Predictor.Batch")
            .map(|v| v == "true")
            .unwrap_or(false);
        let async_predictor = AsyncPredictor::new(bus.clone(), predictor, sensor_source.clone(), batch);

        let load_listener = if load.can_add_load() {
            Some(LoadListener::install(bus.clone(), sensor_source.clone(), load.clone()))
        } else {
            None
        };

        Ok(AsyncPrognoser {
            bus,
            trajectory,
            load,
            async_observer,
            async_predictor,
            load_listener,
        })
    }
}

struct LoadListener {
    load: Arc<dyn LoadEstimator>,
}

impl LoadListener {
    fn install(bus: Arc<MessageBus>, source: Arc<str>, load: Arc<dyn LoadEstimator>) -> Arc<Self> {
        let listener = Arc::new(LoadListener { load });
        let handler: Arc<dyn Handler> = listener.clone();
        bus.subscribe(handler, source, MessageId::MODEL_INPUT_VECTOR);
        listener
    }
}

impl Handler for LoadListener {
    fn handle(&self, message: &Message) {
        if let Ok(vector) = message.vector() {
            let _ = self.load.add_load(vector);
        }
    }
}

/// A fully assembled, running prognostics pipeline. Dropping it
/// unsubscribes and tears down every owned component in reverse
/// creation order.
pub struct AsyncPrognoser {
    bus: Arc<MessageBus>,
    trajectory: Arc<TrajectoryAdapter>,
    load: Arc<dyn LoadEstimator>,
    async_observer: Arc<AsyncObserver>,
    async_predictor: Arc<AsyncPredictor>,
    load_listener: Option<Arc<LoadListener>>,
}

impl AsyncPrognoser {
    pub fn bus(&self) -> &Arc<MessageBus> {
        &self.bus
    }

    pub fn trajectory(&self) -> &Arc<TrajectoryAdapter> {
        &self.trajectory
    }

    pub fn load(&self) -> &Arc<dyn LoadEstimator> {
        &self.load
    }
}

impl Drop for AsyncPrognoser {
    fn drop(&mut self) {
        if let Some(listener) = self.load_listener.take() {
            let handler: Arc<dyn Handler> = listener;
            self.bus.unsubscribe(&handler);
        }
        let handler: Arc<dyn Handler> = self.async_predictor.clone();
        self.bus.unsubscribe(&handler);
        let handler: Arc<dyn Handler> = self.async_observer.clone();
        self.bus.unsubscribe(&handler);
        let handler: Arc<dyn Handler> = self.trajectory.clone();
        self.bus.unsubscribe(&handler);
    }
}
