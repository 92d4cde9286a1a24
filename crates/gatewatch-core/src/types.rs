use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Distance below which two feature vectors are considered the same face.
pub const MATCH_THRESHOLD: f32 = 0.5;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum CoreError {
    #[error("invalid feature vector: expected {expected} dimensions, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },
    #[error("invalid feature vector: {0}")]
    InvalidVector(String),
}

/// Face feature vector (typically 128-dimensional for dlib-style encoders).
///
/// Deserializes from a plain array and goes through the same validation
/// as [`FeatureVector::new`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<f32>", into = "Vec<f32>")]
pub struct FeatureVector {
    values: Vec<f32>,
}

impl FeatureVector {
    /// Wrap raw encoder output. Rejects empty vectors and non-finite values.
    pub fn new(values: Vec<f32>) -> Result<Self, CoreError> {
        if values.is_empty() {
            return Err(CoreError::InvalidVector("vector is empty".into()));
        }
        if let Some(i) = values.iter().position(|v| !v.is_finite()) {
            return Err(CoreError::InvalidVector(format!(
                "non-finite value at index {i}"
            )));
        }
        Ok(Self { values })
    }

    pub fn values(&self) -> &[f32] {
        &self.values
    }

    pub fn dim(&self) -> usize {
        self.values.len()
    }
}

impl TryFrom<Vec<f32>> for FeatureVector {
    type Error = CoreError;

    fn try_from(values: Vec<f32>) -> Result<Self, Self::Error> {
        Self::new(values)
    }
}

impl From<FeatureVector> for Vec<f32> {
    fn from(vector: FeatureVector) -> Self {
        vector.values
    }
}

/// Strategy for measuring how far apart two feature vectors are.
///
/// Implementations must be symmetric and non-negative, and must fail on
/// vectors of different dimensionality rather than truncate.
pub trait FeatureComparator {
    fn distance(&self, a: &FeatureVector, b: &FeatureVector) -> Result<f32, CoreError>;

    /// Distance from `probe` to every reference, in reference order.
    fn distances<'a, I>(&self, references: I, probe: &FeatureVector) -> Result<Vec<f32>, CoreError>
    where
        I: IntoIterator<Item = &'a FeatureVector>,
    {
        references
            .into_iter()
            .map(|reference| self.distance(reference, probe))
            .collect()
    }
}

/// Euclidean (L2) distance, the metric face encoders are trained against.
#[derive(Debug, Clone, Copy, Default)]
pub struct EuclideanComparator;

impl FeatureComparator for EuclideanComparator {
    fn distance(&self, a: &FeatureVector, b: &FeatureVector) -> Result<f32, CoreError> {
        check_dims(a, b)?;
        Ok(a.values
            .iter()
            .zip(b.values.iter())
            .map(|(x, y)| (x - y).powi(2))
            .sum::<f32>()
            .sqrt())
    }
}

/// Fail with `DimensionMismatch` unless both vectors have the same length.
pub fn check_dims(reference: &FeatureVector, probe: &FeatureVector) -> Result<(), CoreError> {
    if reference.dim() != probe.dim() {
        return Err(CoreError::DimensionMismatch {
            expected: reference.dim(),
            actual: probe.dim(),
        });
    }
    Ok(())
}
