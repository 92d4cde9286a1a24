//! Session identity registry.
//!
//! Clusters incoming feature vectors into sequentially labelled identities
//! by nearest-neighbour match under [`MATCH_THRESHOLD`].

use crate::types::{CoreError, FeatureComparator, FeatureVector, MATCH_THRESHOLD};

const LABEL_PREFIX: &str = "Identity";

/// One clustered face. The reference vector is fixed at creation.
#[derive(Debug, Clone)]
pub struct Identity {
    pub label: String,
    pub reference: FeatureVector,
    pub occurrence_count: u32,
}

/// Outcome of resolving a vector against the registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub label: String,
    /// True iff this call created the identity.
    pub is_new: bool,
    pub occurrence_count: u32,
}

/// Grow-only set of identities for one session.
#[derive(Debug)]
pub struct IdentityRegistry {
    identities: Vec<Identity>,
    next_number: u32,
}

impl Default for IdentityRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl IdentityRegistry {
    pub fn new() -> Self {
        Self {
            identities: Vec::new(),
            next_number: 1,
        }
    }

    /// Map `vector` to an identity label, creating a new identity when no
    /// stored reference lies strictly within the threshold.
    ///
    /// All distances are computed before any mutation, so an error leaves
    /// the registry unchanged.
    pub fn resolve<C: FeatureComparator>(
        &mut self,
        comparator: &C,
        vector: &FeatureVector,
    ) -> Result<Resolution, CoreError> {
        if let Some((idx, distance)) = self.closest(comparator, vector)? {
            if distance < MATCH_THRESHOLD {
                let identity = &mut self.identities[idx];
                identity.occurrence_count += 1;
                tracing::debug!(
                    label = %identity.label,
                    distance,
                    count = identity.occurrence_count,
                    "matched known identity"
                );
                return Ok(Resolution {
                    label: identity.label.clone(),
                    is_new: false,
                    occurrence_count: identity.occurrence_count,
                });
            }
        }

        let label = format!("{LABEL_PREFIX} {}", self.next_number);
        self.next_number += 1;
        self.identities.push(Identity {
            label: label.clone(),
            reference: vector.clone(),
            occurrence_count: 1,
        });
        tracing::info!(label = %label, known = self.identities.len(), "new identity");

        Ok(Resolution {
            label,
            is_new: true,
            occurrence_count: 1,
        })
    }

    /// Closest identity within the threshold, without touching any counts.
    pub fn nearest<C: FeatureComparator>(
        &self,
        comparator: &C,
        vector: &FeatureVector,
    ) -> Result<Option<(&Identity, f32)>, CoreError> {
        Ok(self
            .closest(comparator, vector)?
            .filter(|&(_, distance)| distance < MATCH_THRESHOLD)
            .map(|(idx, distance)| (&self.identities[idx], distance)))
    }

    pub fn identities(&self) -> &[Identity] {
        &self.identities
    }

    pub fn len(&self) -> usize {
        self.identities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.identities.is_empty()
    }

    /// Index and distance of the strictly closest identity. Exact ties keep
    /// the earliest-created one, i.e. the lowest label number.
    fn closest<C: FeatureComparator>(
        &self,
        comparator: &C,
        vector: &FeatureVector,
    ) -> Result<Option<(usize, f32)>, CoreError> {
        let distances =
            comparator.distances(self.identities.iter().map(|i| &i.reference), vector)?;

        let mut best: Option<(usize, f32)> = None;
        for (i, d) in distances.into_iter().enumerate() {
            match best {
                Some((_, best_d)) if d >= best_d => {}
                _ => best = Some((i, d)),
            }
        }
        Ok(best)
    }
}
