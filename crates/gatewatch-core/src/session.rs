//! One capture session: registry, decision and recorder under a single owner.

use crate::decision::AccessDecision;
use crate::event::{AccessEvent, AccessStatus};
use crate::recorder::{EventRecorder, Recorded};
use crate::registry::{IdentityRegistry, Resolution};
use crate::types::{CoreError, FeatureComparator, FeatureVector};
use chrono::DateTime;
use chrono_tz::Tz;
use uuid::Uuid;

/// Per-observation outcome.
#[derive(Debug)]
pub struct Observation {
    pub resolution: Resolution,
    pub recorded: Recorded,
}

/// Outcome of one sampled frame.
#[derive(Debug, Default)]
pub struct TickOutcome {
    pub events: Vec<AccessEvent>,
    /// Frame-level status: the last face's decision, or `Denied` with no faces.
    pub status: Option<AccessStatus>,
    /// Faces whose vectors were rejected.
    pub rejected: usize,
    /// Events that reached the recent view but not the durable log.
    pub unpersisted: usize,
}

/// Explicitly owned session state. A new session (or [`Session::reset`])
/// starts with an empty registry, no authorized reference and an empty
/// recent view.
pub struct Session<C: FeatureComparator> {
    id: Uuid,
    comparator: C,
    registry: IdentityRegistry,
    decision: AccessDecision,
    recorder: EventRecorder,
    latest_status: Option<AccessStatus>,
}

impl<C: FeatureComparator> Session<C> {
    pub fn start(comparator: C, recorder: EventRecorder) -> Self {
        let id = Uuid::new_v4();
        tracing::info!(session = %id, "session started");
        Self {
            id,
            comparator,
            registry: IdentityRegistry::new(),
            decision: AccessDecision::new(),
            recorder,
            latest_status: None,
        }
    }

    /// Discard all identity state and begin a fresh session on the same log.
    pub fn reset(&mut self) {
        let previous = self.id;
        self.id = Uuid::new_v4();
        self.registry = IdentityRegistry::new();
        self.decision = AccessDecision::new();
        self.recorder.clear_recent();
        self.latest_status = None;
        tracing::info!(session = %self.id, %previous, "session reset");
    }

    /// Resolve, classify and record a single face.
    ///
    /// The vector is validated against both the registry and the authorized
    /// reference before either is touched, so a shape fault changes nothing.
    pub fn observe(
        &mut self,
        vector: &FeatureVector,
        at: DateTime<Tz>,
    ) -> Result<Observation, CoreError> {
        self.decision.validate(vector)?;
        let resolution = self.registry.resolve(&self.comparator, vector)?;
        let status = self.decision.classify(&self.comparator, vector)?;

        let recorded = self.recorder.record(
            &resolution.label,
            resolution.is_new,
            status,
            resolution.occurrence_count,
            at,
        );
        self.latest_status = Some(status);

        Ok(Observation {
            resolution,
            recorded,
        })
    }

    /// Process every face found in one sampled frame, in order.
    pub fn tick(&mut self, faces: &[FeatureVector], at: DateTime<Tz>) -> TickOutcome {
        let mut outcome = TickOutcome::default();
        let mut frame_status = AccessStatus::Denied;

        for face in faces {
            match self.observe(face, at) {
                Ok(obs) => {
                    frame_status = obs.recorded.event.status;
                    if !obs.recorded.persisted() {
                        outcome.unpersisted += 1;
                    }
                    outcome.events.push(obs.recorded.event);
                }
                Err(e) => {
                    tracing::warn!(session = %self.id, error = %e, "rejected face");
                    outcome.rejected += 1;
                }
            }
        }

        self.latest_status = Some(frame_status);
        outcome.status = Some(frame_status);
        outcome
    }

    /// Status of the most recent frame or observation, for signal outputs.
    pub fn latest_status(&self) -> Option<AccessStatus> {
        self.latest_status
    }

    /// Label of the identity nearest the authorized reference, if any.
    pub fn authorized_label(&self) -> Option<&str> {
        let reference = self.decision.authorized_reference()?;
        match self.registry.nearest(&self.comparator, reference) {
            Ok(found) => found.map(|(identity, _)| identity.label.as_str()),
            Err(_) => None,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn registry(&self) -> &IdentityRegistry {
        &self.registry
    }

    pub fn recorder(&self) -> &EventRecorder {
        &self.recorder
    }
}
