//! `UData` — a value carrying its own uncertainty representation.
use crate::error::ProgError;

/// A quantity with uncertainty: a point estimate, a mean+covariance
/// Gaussian, or a bag of samples.
///
/// Mis-using an accessor for the wrong variant is a programming error
/// signaled through a `Result`, not a silent default, per `spec.md` §3's
/// invariant that "the variant determines which accessors are valid".
#[derive(Debug, Clone, PartialEq)]
pub enum UData {
    /// A single, certain value.
    Point(f64),
    /// A Gaussian belief: mean vector plus covariance (row-major, `n*n`
    /// elements for an `n`-length mean).
    MeanCovariance { mean: Vec<f64>, covariance: Vec<f64> },
    /// A finite bag of realizations, e.g. from Monte-Carlo sampling.
    Samples(Vec<f64>),
}

impl UData {
    pub fn point(value: f64) -> Self {
        UData::Point(value)
    }

    pub fn samples(values: impl Into<Vec<f64>>) -> Self {
        UData::Samples(values.into())
    }

    pub fn mean_covariance(mean: impl Into<Vec<f64>>, covariance: impl Into<Vec<f64>>) -> Self {
        UData::MeanCovariance {
            mean: mean.into(),
            covariance: covariance.into(),
        }
    }

    /// Returns the scalar value of a [`UData::Point`], or `OutOfRange` for
    /// any other variant.
    pub fn get(&self) -> Result<f64, ProgError> {
        match self {
            UData::Point(v) => Ok(*v),
            _ => Err(ProgError::out_of_range(
                "UData::get called on a non-point variant",
            )),
        }
    }

    /// Returns the sample bag of a [`UData::Samples`], or `OutOfRange` for
    /// any other variant.
    pub fn samples_ref(&self) -> Result<&[f64], ProgError> {
        match self {
            UData::Samples(s) => Ok(s),
            _ => Err(ProgError::out_of_range(
                "UData::samples_ref called on a non-samples variant",
            )),
        }
    }

    /// Returns `(mean, covariance)` of a [`UData::MeanCovariance`], or
    /// `OutOfRange` for any other variant.
    pub fn mean_covariance_ref(&self) -> Result<(&[f64], &[f64]), ProgError> {
        match self {
            UData::MeanCovariance { mean, covariance } => Ok((mean, covariance)),
            _ => Err(ProgError::out_of_range(
                "UData::mean_covariance_ref called on a non-mean-covariance variant",
            )),
        }
    }

    /// The best single-value estimate regardless of variant: the point
    /// value, the Gaussian mean's first element, or the sample mean.
    pub fn best_estimate(&self) -> f64 {
        match self {
            UData::Point(v) => *v,
            UData::MeanCovariance { mean, .. } => mean.first().copied().unwrap_or(f64::NAN),
            UData::Samples(samples) => {
                let finite: Vec<f64> = samples.iter().copied().filter(|v| v.is_finite()).collect();
                if finite.is_empty() {
                    f64::NAN
                } else {
                    finite.iter().sum::<f64>() / finite.len() as f64
                }
            }
        }
    }
}
