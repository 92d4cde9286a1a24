//! gatewatch-core — Identity registry and access-event pipeline.
//!
//! Clusters face feature vectors into stable per-session identities,
//! classifies each observation against the session's authorized face,
//! and appends every outcome to a durable CSV log.

pub mod decision;
pub mod event;
pub mod eventlog;
pub mod recorder;
pub mod registry;
pub mod sampler;
pub mod session;
pub mod types;

pub use decision::AccessDecision;
pub use event::{AccessEvent, AccessStatus};
pub use eventlog::{EventLog, EventLogError, LogRow};
pub use recorder::{EventRecorder, Recorded, RECENT_CAPACITY};
pub use registry::{Identity, IdentityRegistry, Resolution};
pub use sampler::Sampler;
pub use session::{Observation, Session, TickOutcome};
pub use types::{CoreError, EuclideanComparator, FeatureComparator, FeatureVector, MATCH_THRESHOLD};
