//! `Predictor` contract and a Monte-Carlo reference implementation.
//!
//! Grounded on `spec.md` §4.6 (the discrete-step sampling loop, the
//! `sqrt(variance/dt)` noise-stddev resolution recorded in `spec.md` §9)
//! and `SPEC_FULL.md` §4.6a's `SavePointProvider` composition.
use crate::config::ConfigMap;
use crate::error::ProgError;
use crate::load::LoadEstimator;
use crate::message::{Prediction, ProgEvent, UData};
use crate::model::PrognosticsModel;
use crate::observer::cholesky;
use crate::trajectory::TrajectoryService;
use parking_lot::Mutex;
use rand::Rng;
use std::sync::Arc;
use tracing::{debug_span, warn};

/// Standard-normal draw via the Box-Muller transform.
fn standard_normal(rng: &mut impl Rng) -> f64 {
    let u1: f64 = rng.gen_range(1e-12..1.0);
    let u2: f64 = rng.gen::<f64>();
    (-2.0 * u1.ln()).sqrt() * (std::f64::consts::TAU * u2).cos()
}

/// From a state estimate, simulate forward to each event's threshold.
pub trait Predictor: Send + Sync {
    fn predict(&self, t_now: f64, state_estimate: &[UData]) -> Result<Prediction, ProgError>;
}

/// Supplies the timestamps, in seconds since `t_now`, at which a sample's
/// trajectory should be captured into `ProgEvent.points`.
pub trait SavePointProvider: Send + Sync {
    fn savepoints(&self, t_now: f64, horizon: f64) -> Vec<f64>;
}

/// Savepoints sourced from a [`TrajectoryService`]'s registered
/// waypoints, converted to seconds-from-`t_now`.
pub struct TrajectorySavePoints {
    trajectory: Arc<Mutex<TrajectoryService>>,
}

impl TrajectorySavePoints {
    pub fn new(trajectory: Arc<Mutex<TrajectoryService>>) -> Self {
        TrajectorySavePoints { trajectory }
    }
}

impl SavePointProvider for TrajectorySavePoints {
    fn savepoints(&self, t_now: f64, _horizon: f64) -> Vec<f64> {
        self.trajectory
            .lock()
            .get_savepts()
            .into_iter()
            .map(|eta| crate::time::as_seconds(eta) - t_now)
            .filter(|s| *s >= 0.0)
            .collect()
    }
}

/// The trajectory-free fallback: "now" plus a logarithmic back-off of
/// `sample_count` checkpoints through `[0, horizon]`, so a prediction
/// always captures at least a handful of trajectory points even with no
/// waypoints registered.
pub fn default_savepoints(horizon: f64, sample_count: usize) -> Vec<f64> {
    if sample_count == 0 || horizon <= 0.0 {
        return vec![0.0];
    }
    let mut points = vec![0.0];
    for i in 1..=sample_count {
        let fraction = 1.0 - 2f64.powi(-(i as i32));
        points.push(fraction * horizon);
    }
    points.push(horizon);
    points
}

/// Monte-Carlo forward simulation.
pub struct MonteCarlo {
    model: Arc<dyn PrognosticsModel>,
    load: Arc<dyn LoadEstimator>,
    savepoints: Arc<dyn SavePointProvider>,
    sample_count: usize,
    horizon: f64,
    process_noise: Vec<f64>,
}

impl MonteCarlo {
    pub fn new(
        model: Arc<dyn PrognosticsModel>,
        load: Arc<dyn LoadEstimator>,
        savepoints: Arc<dyn SavePointProvider>,
        config: &ConfigMap,
    ) -> Result<Self, ProgError> {
        let sample_count = config.get_u64("Predictor.SampleCount")? as usize;
        let horizon = config.get_double("Predictor.Horizon")?;
        let process_noise = config.get_double_vector_sized("Model.ProcessNoise", model.state_size())?;
        Ok(MonteCarlo {
            model,
            load,
            savepoints,
            sample_count,
            horizon,
            process_noise,
        })
    }

    fn sample_initial_state<R: Rng>(&self, state_estimate: &[UData], rng: &mut R) -> Result<Vec<f64>, ProgError> {
        let belief = state_estimate
            .first()
            .ok_or_else(|| ProgError::size_mismatch("empty state estimate"))?;
        match belief {
            UData::MeanCovariance { mean, covariance } => {
                let n = mean.len();
                let l = cholesky(covariance, n)?;
                let standard_normal: Vec<f64> = (0..n).map(|_| standard_normal(rng)).collect();
                let mut x = mean.clone();
                for i in 0..n {
                    let mut sum = 0.0;
                    for j in 0..=i {
                        sum += l[i * n + j] * standard_normal[j];
                    }
                    x[i] += sum;
                }
                Ok(x)
            }
            UData::Samples(_) => {
                let n = self.model.state_size();
                Ok((0..n).map(|_| rng.gen::<f64>()).collect())
            }
            UData::Point(v) => Ok(vec![*v; self.model.state_size()]),
        }
    }
}

impl Predictor for MonteCarlo {
    fn predict(&self, t_now: f64, state_estimate: &[UData]) -> Result<Prediction, ProgError> {
        let _span = debug_span!("monte_carlo.predict", t_now, samples = self.sample_count).entered();
        let mut rng = rand::thread_rng();
        let events = self.model.events();
        let dt = self.model.default_time_step();
        let savepoint_offsets = self.savepoints.savepoints(t_now, self.horizon);

        let mut toe_samples: Vec<Vec<f64>> = vec![Vec::with_capacity(self.sample_count); events.len()];
        let mut event_state_samples: Vec<Vec<Vec<f64>>> =
            vec![Vec::new(); savepoint_offsets.len()];
        let mut system_state_samples: Vec<Vec<Vec<f64>>> =
            vec![Vec::new(); savepoint_offsets.len()];
        let mut system_trajectory: Vec<crate::message::Point4D> = Vec::new();

        for _ in 0..self.sample_count {
            let mut x = self.sample_initial_state(state_estimate, &mut rng)?;
            let mut fired = vec![false; events.len()];
            let mut t = t_now;
            let mut next_savepoint = 0usize;

            loop {
                if next_savepoint < savepoint_offsets.len() && t - t_now >= savepoint_offsets[next_savepoint] {
                    let event_state = self.model.event_state_eqn(t, &x)?;
                    event_state_samples[next_savepoint].push(event_state);
                    system_state_samples[next_savepoint].push(x.clone());
                    next_savepoint += 1;
                }

                let u = match self.load.estimate_load(t) {
                    Ok(u) => u,
                    Err(err) => {
                        warn!(t, error = %err, "load estimate out of range; sample truncated here");
                        break;
                    }
                };
                let n: Vec<f64> = self
                    .process_noise
                    .iter()
                    .map(|variance| {
                        let stddev = (variance / dt).sqrt();
                        standard_normal(&mut rng) * stddev
                    })
                    .collect();
                x = self.model.state_eqn_noisy(t, &x, &u, &n, dt)?;
                t += dt;

                let thresholds = self.model.threshold_eqn(t, &x)?;
                for (i, crossed) in thresholds.iter().enumerate() {
                    if *crossed && !fired[i] {
                        fired[i] = true;
                        toe_samples[i].push(t);
                    }
                }

                if fired.iter().all(|f| *f) || t - t_now >= self.horizon {
                    for i in 0..events.len() {
                        if !fired[i] {
                            toe_samples[i].push(f64::INFINITY);
                        }
                    }
                    break;
                }
            }
            system_trajectory.push(crate::message::Point4D::new(
                crate::message::Point3D::new(0.0, 0.0, 0.0),
                crate::time::from_seconds(t),
                x,
            ));
        }

        let progs = events
            .iter()
            .enumerate()
            .map(|(i, id)| {
                let toe = UData::samples(toe_samples[i].clone());
                let event_state: Vec<UData> = (0..savepoint_offsets.len())
                    .map(|s| {
                        let values: Vec<f64> = event_state_samples[s]
                            .iter()
                            .map(|v| v.get(i).copied().unwrap_or(f64::NAN))
                            .collect();
                        UData::samples(values)
                    })
                    .collect();
                let system_state: Vec<Vec<UData>> = (0..savepoint_offsets.len())
                    .map(|s| {
                        let n = self.model.state_size();
                        (0..n)
                            .map(|dim| {
                                let values: Vec<f64> = system_state_samples[s]
                                    .iter()
                                    .map(|x| x[dim])
                                    .collect();
                                UData::samples(values)
                            })
                            .collect()
                    })
                    .collect();
                ProgEvent::new(*id, event_state, system_state, toe)
            })
            .collect();

        Ok(Prediction {
            events: progs,
            system_trajectories: system_trajectory,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_savepoints_always_includes_now_and_horizon() {
        let points = default_savepoints(100.0, 4);
        assert_eq!(points.first(), Some(&0.0));
        assert_eq!(points.last(), Some(&100.0));
    }

    #[test]
    fn default_savepoints_degenerate_horizon() {
        assert_eq!(default_savepoints(0.0, 4), vec![0.0]);
    }
}
