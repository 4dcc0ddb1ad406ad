//! Load estimators — supply a future input vector given a time.
//!
//! Grounded on `spec.md` §4.10 and the required-keys table in §6. Each
//! variant owns its own internal mutex (`spec.md` §5: "the implementation
//! must give load estimators their own internal mutex", since a
//! `MovingAverage` is mutated by a bus-delivered load-listener handler
//! while being read concurrently by the predictor wrapper).
use crate::config::ConfigMap;
use crate::error::ProgError;
use parking_lot::Mutex;
use rand::Rng;
use std::collections::VecDeque;

/// Produces an input vector for a future time `t`.
pub trait LoadEstimator: Send + Sync {
    fn estimate_load(&self, t: f64) -> Result<Vec<f64>, ProgError>;

    /// Feeds a freshly observed load sample, for variants that track a
    /// running estimate (`MovingAverage`). `NotSupported` otherwise.
    fn add_load(&self, _sample: &[f64]) -> Result<(), ProgError> {
        Err(ProgError::not_supported(
            "this load estimator does not accept add_load",
        ))
    }

    /// Whether the runtime should forward observed `ModelInputVector`
    /// messages into [`LoadEstimator::add_load`]. Only `MovingAverage`
    /// needs this.
    fn can_add_load(&self) -> bool {
        false
    }
}

/// A fixed input vector, constant over time.
pub struct Const {
    loading: Mutex<Vec<f64>>,
}

impl Const {
    pub fn from_config(config: &ConfigMap) -> Result<Self, ProgError> {
        let loading = config.get_double_vector("LoadEstimator.Loading")?;
        Ok(Const {
            loading: Mutex::new(loading),
        })
    }
}

impl LoadEstimator for Const {
    fn estimate_load(&self, _t: f64) -> Result<Vec<f64>, ProgError> {
        Ok(self.loading.lock().clone())
    }
}

/// A fixed mean perturbed by independent Gaussian noise on each
/// element, `N(0, StdDev_i)`.
pub struct Gaussian {
    loading: Vec<f64>,
    std_dev: Vec<f64>,
}

impl Gaussian {
    pub fn from_config(config: &ConfigMap) -> Result<Self, ProgError> {
        let loading = config.get_double_vector("LoadEstimator.Loading")?;
        let std_dev_raw = config.get_double_vector("LoadEstimator.StdDev")?;
        let std_dev = if std_dev_raw.len() == 1 {
            vec![std_dev_raw[0]; loading.len()]
        } else if std_dev_raw.len() == loading.len() {
            std_dev_raw
        } else {
            return Err(ProgError::config_missing(format!(
                "key LoadEstimator.StdDev expected 1 or {} values, found {}",
                loading.len(),
                std_dev_raw.len()
            )));
        };
        Ok(Gaussian { loading, std_dev })
    }
}

impl LoadEstimator for Gaussian {
    fn estimate_load(&self, _t: f64) -> Result<Vec<f64>, ProgError> {
        let mut rng = rand::thread_rng();
        Ok(self
            .loading
            .iter()
            .zip(self.std_dev.iter())
            .map(|(mean, std_dev)| {
                let u1: f64 = rng.gen_range(1e-12..1.0);
                let u2: f64 = rng.gen::<f64>();
                let z = (-2.0 * u1.ln()).sqrt() * (std::f64::consts::TAU * u2).cos();
                mean + std_dev * z
            })
            .collect())
    }
}

/// A running average over the last `window` observed samples, seeded
/// from `LoadEstimator.Loading`. Time-independent: `estimate_load`
/// always returns the current running average regardless of `t`.
pub struct MovingAverage {
    window: usize,
    history: Mutex<VecDeque<Vec<f64>>>,
    current: Mutex<Vec<f64>>,
}

impl MovingAverage {
    pub fn from_config(config: &ConfigMap) -> Result<Self, ProgError> {
        let seed = config.get_double_vector("LoadEstimator.Loading")?;
        let window = if config.has("LoadEstimator.Window") {
            config.get_u64("LoadEstimator.Window")? as usize
        } else {
            10
        };
        Ok(MovingAverage {
            window: window.max(1),
            history: Mutex::new(VecDeque::from(vec![seed.clone()])),
            current: Mutex::new(seed),
        })
    }
}

impl LoadEstimator for MovingAverage {
    fn estimate_load(&self, _t: f64) -> Result<Vec<f64>, ProgError> {
        Ok(self.current.lock().clone())
    }

    fn add_load(&self, sample: &[f64]) -> Result<(), ProgError> {
        let mut history = self.history.lock();
        history.push_back(sample.to_vec());
        while history.len() > self.window {
            history.pop_front();
        }
        let n = sample.len();
        let mut sums = vec![0.0; n];
        for entry in history.iter() {
            for i in 0..n {
                sums[i] += entry.get(i).copied().unwrap_or(0.0);
            }
        }
        let count = history.len() as f64;
        *self.current.lock() = sums.into_iter().map(|s| s / count).collect();
        Ok(())
    }

    fn can_add_load(&self) -> bool {
        true
    }
}

#[derive(Clone)]
struct ProfileSegment {
    duration: f64,
    loads: Vec<f64>,
}

/// A scheduled sequence of fixed-duration segments, each with its own
/// load vector. `estimate_load` records the time `t_0` of its first call,
/// then walks the schedule from `t_0`; `OutOfRange` once the schedule is
/// exhausted (per `spec.md` §4.6's "finite schedule ran out" truncation
/// case).
pub struct Profile {
    segments: Vec<ProfileSegment>,
    start: Mutex<Option<f64>>,
}

impl Profile {
    pub fn from_config(config: &ConfigMap) -> Result<Self, ProgError> {
        let count = config.get_u64("LoadEstimator.LoadingProfileLength")? as usize;
        let mut segments = Vec::with_capacity(count);
        for i in 0..count {
            let duration = config.get_double(&format!("LoadEstimator.Element[{i}].Duration"))?;
            let loads = config.get_double_vector(&format!("LoadEstimator.Element[{i}].Loads"))?;
            segments.push(ProfileSegment { duration, loads });
        }
        Ok(Profile {
            segments,
            start: Mutex::new(None),
        })
    }
}

impl LoadEstimator for Profile {
    fn estimate_load(&self, t: f64) -> Result<Vec<f64>, ProgError> {
        let t_0 = *self.start.lock().get_or_insert(t);
        let since_start = t - t_0;
        let mut elapsed = 0.0;
        for segment in &self.segments {
            if since_start < elapsed + segment.duration {
                return Ok(segment.loads.clone());
            }
            elapsed += segment.duration;
        }
        Err(ProgError::out_of_range(
            "load profile exhausted before requested time",
        ))
    }
}
