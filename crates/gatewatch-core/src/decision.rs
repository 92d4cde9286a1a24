//! Approved/Denied classification against the session's authorized face.

use crate::event::AccessStatus;
use crate::types::{check_dims, CoreError, FeatureComparator, FeatureVector, MATCH_THRESHOLD};

/// Holds the single authorized reference of a session.
///
/// The first face classified in a session becomes the reference and is
/// approved. Independent of the identity registry.
#[derive(Debug, Default)]
pub struct AccessDecision {
    authorized: Option<FeatureVector>,
}

impl AccessDecision {
    pub fn new() -> Self {
        Self::default()
    }

    /// Shape check against the authorized reference, without mutating state.
    pub fn validate(&self, vector: &FeatureVector) -> Result<(), CoreError> {
        match &self.authorized {
            Some(reference) => check_dims(reference, vector),
            None => Ok(()),
        }
    }

    pub fn classify<C: FeatureComparator>(
        &mut self,
        comparator: &C,
        vector: &FeatureVector,
    ) -> Result<AccessStatus, CoreError> {
        let Some(reference) = &self.authorized else {
            tracing::info!(dim = vector.dim(), "authorized reference set");
            self.authorized = Some(vector.clone());
            return Ok(AccessStatus::Approved);
        };

        let distance = comparator.distance(reference, vector)?;
        let status = if distance < MATCH_THRESHOLD {
            AccessStatus::Approved
        } else {
            AccessStatus::Denied
        };
        tracing::debug!(distance, ?status, "classified");
        Ok(status)
    }

    pub fn authorized_reference(&self) -> Option<&FeatureVector> {
        self.authorized.as_ref()
    }
}
