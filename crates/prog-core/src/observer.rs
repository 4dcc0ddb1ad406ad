//! `Observer` contract and an unscented Kalman filter reference
//! implementation.
//!
//! Grounded on `spec.md` §4.5's worked-out UKF equations (sigma-point
//! generation via Cholesky, predict/update with process/observation
//! noise from config). The linear algebra is hand-rolled over row-major
//! `Vec<f64>` buffers — state/output vectors here are small (single-digit
//! to low-double-digit dimension), so a dependency on a full linear
//! algebra crate was judged not worth carrying (see `DESIGN.md`).
use crate::config::ConfigMap;
use crate::error::ProgError;
use crate::message::UData;
use crate::model::SystemModel;
use std::sync::Arc;

/// A recursive Bayesian state estimator over a [`SystemModel`].
pub trait Observer: Send + Sync {
    fn is_initialized(&self) -> bool;

    /// Seeds the belief at `x0`, time `t0`, most-recent input `u0`. A
    /// no-op (per the single-initialization invariant) if already
    /// initialized.
    fn initialize(&mut self, t0: f64, x0: Vec<f64>, u0: Vec<f64>) -> Result<(), ProgError>;

    /// Advances the belief to `t` given input `u` and observation `z`.
    fn step(&mut self, t: f64, u: &[f64], z: &[f64]) -> Result<(), ProgError>;

    /// The current belief, one `UData::MeanCovariance` entry per state
    /// element sharing the joint covariance... represented here as a
    /// single-element vector carrying the full joint mean+covariance,
    /// matching the original's "vector of UData" as one joint belief
    /// rather than n independent marginals.
    fn get_state_estimate(&self) -> Vec<UData>;

    fn get_state_mean(&self) -> Vec<f64>;
}

/// Row-major, lower-triangular Cholesky factor of `a` (`n x n`,
/// symmetric positive-(semi)definite). `NumericalFailure` if a pivot is
/// non-positive.
///
/// `pub(crate)` so the Monte-Carlo predictor can reuse it to sample from
/// a `MeanCovariance` belief without a second, independent
/// implementation drifting out of sync with this one.
pub(crate) fn cholesky(a: &[f64], n: usize) -> Result<Vec<f64>, ProgError> {
    let mut l = vec![0.0; n * n];
    for i in 0..n {
        for j in 0..=i {
            let mut sum = a[i * n + j];
            for k in 0..j {
                sum -= l[i * n + k] * l[j * n + k];
            }
            if i == j {
                if sum <= 0.0 {
                    return Err(ProgError::numerical_failure(
                        "cholesky decomposition failed: non-positive pivot",
                    ));
                }
                l[i * n + j] = sum.sqrt();
            } else {
                l[i * n + j] = sum / l[j * n + j];
            }
        }
    }
    Ok(l)
}

/// Gauss-Jordan inverse of `a` (`n x n`) with partial pivoting.
fn inverse(a: &[f64], n: usize) -> Result<Vec<f64>, ProgError> {
    let mut aug = vec![0.0; n * 2 * n];
    for i in 0..n {
        for j in 0..n {
            aug[i * 2 * n + j] = a[i * n + j];
        }
        aug[i * 2 * n + n + i] = 1.0;
    }
    for col in 0..n {
        let mut pivot_row = col;
        let mut pivot_val = aug[col * 2 * n + col].abs();
        for row in (col + 1)..n {
            let v = aug[row * 2 * n + col].abs();
            if v > pivot_val {
                pivot_val = v;
                pivot_row = row;
            }
        }
        if pivot_val < 1e-12 {
            return Err(ProgError::numerical_failure(
                "matrix inversion failed: singular to working precision",
            ));
        }
        if pivot_row != col {
            for k in 0..(2 * n) {
                aug.swap(col * 2 * n + k, pivot_row * 2 * n + k);
            }
        }
        let pivot = aug[col * 2 * n + col];
        for k in 0..(2 * n) {
            aug[col * 2 * n + k] /= pivot;
        }
        for row in 0..n {
            if row == col {
                continue;
            }
            let factor = aug[row * 2 * n + col];
            if factor == 0.0 {
                continue;
            }
            for k in 0..(2 * n) {
                aug[row * 2 * n + k] -= factor * aug[col * 2 * n + k];
            }
        }
    }
    let mut out = vec![0.0; n * n];
    for i in 0..n {
        for j in 0..n {
            out[i * n + j] = aug[i * 2 * n + n + j];
        }
    }
    Ok(out)
}

fn mat_vec(a: &[f64], x: &[f64], rows: usize, cols: usize) -> Vec<f64> {
    let mut out = vec![0.0; rows];
    for i in 0..rows {
        let mut sum = 0.0;
        for j in 0..cols {
            sum += a[i * cols + j] * x[j];
        }
        out[i] = sum;
    }
    out
}

fn mat_mul(a: &[f64], b: &[f64], rows: usize, inner: usize, cols: usize) -> Vec<f64> {
    let mut out = vec![0.0; rows * cols];
    for i in 0..rows {
        for k in 0..inner {
            let aik = a[i * inner + k];
            if aik == 0.0 {
                continue;
            }
            for j in 0..cols {
                out[i * cols + j] += aik * b[k * cols + j];
            }
        }
    }
    out
}

/// An unscented Kalman filter over a boxed [`SystemModel`].
pub struct Ukf {
    model: Arc<dyn SystemModel>,
    n: usize,
    alpha: f64,
    beta: f64,
    kappa: f64,
    q: Vec<f64>,
    r: Vec<f64>,
    mean: Vec<f64>,
    covariance: Vec<f64>,
    last_t: f64,
    initialized: bool,
}

impl Ukf {
    /// Reads `Observer.Q` (`n²` values) and `Observer.R` (`m²` values)
    /// from `config`, where `n = model.state_size()` and `m =
    /// model.outputs().len()`.
    pub fn new(model: Arc<dyn SystemModel>, config: &ConfigMap) -> Result<Self, ProgError> {
        let n = model.state_size();
        let m = model.outputs().len();
        let q = config.get_double_vector_sized("Observer.Q", n * n)?;
        let r = config.get_double_vector_sized("Observer.R", m * m)?;
        Ok(Ukf {
            model,
            n,
            alpha: 1e-3,
            beta: 2.0,
            kappa: 0.0,
            q,
            r,
            mean: vec![0.0; n],
            covariance: vec![0.0; n * n],
            last_t: 0.0,
            initialized: false,
        })
    }

    fn lambda(&self) -> f64 {
        self.alpha * self.alpha * (self.n as f64 + self.kappa) - self.n as f64
    }

    fn weights(&self) -> (f64, f64, f64) {
        let n = self.n as f64;
        let lambda = self.lambda();
        let wm0 = lambda / (n + lambda);
        let wc0 = wm0 + (1.0 - self.alpha * self.alpha + self.beta);
        let wi = 1.0 / (2.0 * (n + lambda));
        (wm0, wc0, wi)
    }

    /// Sigma points: column `0` is the mean; columns `1..=n` and
    /// `n+1..=2n` are `mean ± column_i` of the Cholesky factor of
    /// `(n+λ)·P`. Returned as `2n+1` owned row vectors.
    fn sigma_points(&self) -> Result<Vec<Vec<f64>>, ProgError> {
        let n = self.n;
        let scale = n as f64 + self.lambda();
        let scaled: Vec<f64> = self.covariance.iter().map(|v| v * scale).collect();
        let l = cholesky(&scaled, n)?;

        let mut points = Vec::with_capacity(2 * n + 1);
        points.push(self.mean.clone());
        for col in 0..n {
            let column: Vec<f64> = (0..n).map(|row| l[row * n + col]).collect();
            let plus: Vec<f64> = self
                .mean
                .iter()
                .zip(column.iter())
                .map(|(m, c)| m + c)
                .collect();
            points.push(plus);
        }
        for col in 0..n {
            let column: Vec<f64> = (0..n).map(|row| l[row * n + col]).collect();
            let minus: Vec<f64> = self
                .mean
                .iter()
                .zip(column.iter())
                .map(|(m, c)| m - c)
                .collect();
            points.push(minus);
        }
        Ok(points)
    }
}

impl Observer for Ukf {
    fn is_initialized(&self) -> bool {
        self.initialized
    }

    fn initialize(&mut self, t0: f64, x0: Vec<f64>, _u0: Vec<f64>) -> Result<(), ProgError> {
        if self.initialized {
            return Ok(());
        }
        if x0.len() != self.n {
            return Err(ProgError::size_mismatch(format!(
                "initial state has {} elements, model declares {}",
                x0.len(),
                self.n
            )));
        }
        self.mean = x0;
        self.covariance = self.q.clone();
        self.last_t = t0;
        self.initialized = true;
        Ok(())
    }

    fn step(&mut self, t: f64, u: &[f64], z: &[f64]) -> Result<(), ProgError> {
        if !self.initialized {
            return Err(ProgError::unreachable(
                "Ukf::step called before initialize",
            ));
        }
        let n = self.n;
        let m = self.model.outputs().len();
        let dt = t - self.last_t;
        let (wm0, wc0, wi) = self.weights();

        let sigma = self.sigma_points()?;
        let propagated: Vec<Vec<f64>> = sigma
            .iter()
            .map(|x| self.model.state_eqn(self.last_t, x, u, dt))
            .collect::<Result<_, _>>()?;

        let mut predicted_mean = vec![0.0; n];
        for (idx, point) in propagated.iter().enumerate() {
            let w = if idx == 0 { wm0 } else { wi };
            for i in 0..n {
                predicted_mean[i] += w * point[i];
            }
        }

        let mut predicted_cov = self.q.clone();
        for (idx, point) in propagated.iter().enumerate() {
            let w = if idx == 0 { wc0 } else { wi };
            for i in 0..n {
                for j in 0..n {
                    predicted_cov[i * n + j] +=
                        w * (point[i] - predicted_mean[i]) * (point[j] - predicted_mean[j]);
                }
            }
        }

        let observed: Vec<Vec<f64>> = propagated
            .iter()
            .map(|x| self.model.output_eqn(t, x))
            .collect::<Result<_, _>>()?;

        let mut z_hat = vec![0.0; m];
        for (idx, point) in observed.iter().enumerate() {
            let w = if idx == 0 { wm0 } else { wi };
            for i in 0..m {
                z_hat[i] += w * point[i];
            }
        }

        let mut s = self.r.clone();
        let mut cross = vec![0.0; n * m];
        for idx in 0..propagated.len() {
            let w = if idx == 0 { wc0 } else { wi };
            for i in 0..m {
                for j in 0..m {
                    s[i * m + j] += w * (observed[idx][i] - z_hat[i]) * (observed[idx][j] - z_hat[j]);
                }
            }
            for i in 0..n {
                for j in 0..m {
                    cross[i * m + j] +=
                        w * (propagated[idx][i] - predicted_mean[i]) * (observed[idx][j] - z_hat[j]);
                }
            }
        }

        let s_inv = inverse(&s, m)?;
        let k = mat_mul(&cross, &s_inv, n, m, m);

        let innovation: Vec<f64> = z.iter().zip(z_hat.iter()).map(|(zi, zhi)| zi - zhi).collect();
        let correction = mat_vec(&k, &innovation, n, m);

        let mut posterior_mean = predicted_mean.clone();
        for i in 0..n {
            posterior_mean[i] += correction[i];
        }

        let ks = mat_mul(&k, &s, n, m, m);
        let kst = mat_mul(&ks, &transpose(&k, n, m), n, m, n);
        let mut posterior_cov = predicted_cov;
        for i in 0..(n * n) {
            posterior_cov[i] -= kst[i];
        }

        self.mean = posterior_mean;
        self.covariance = posterior_cov;
        self.last_t = t;
        Ok(())
    }

    fn get_state_estimate(&self) -> Vec<UData> {
        vec![UData::mean_covariance(self.mean.clone(), self.covariance.clone())]
    }

    fn get_state_mean(&self) -> Vec<f64> {
        self.mean.clone()
    }
}

fn transpose(a: &[f64], rows: usize, cols: usize) -> Vec<f64> {
    let mut out = vec![0.0; rows * cols];
    for i in 0..rows {
        for j in 0..cols {
            out[j * rows + i] = a[i * cols + j];
        }
    }
    out
}
