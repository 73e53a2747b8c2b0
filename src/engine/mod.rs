//! Reconciliation engine.
//!
//! Owns the build → diff → apply → readiness cycle for a single object.
//! Ordering across objects is the orchestrator's job.

pub mod diff;
pub mod reconciler;
pub mod state;
pub mod store;

pub use diff::DiffPolicy;
pub use reconciler::{ApplyOutcome, Readiness, Reconciled, Reconciler, Strategy, statefulset_ready};
pub use state::{ObjectEvent, ObjectPhase};
pub use store::{KubeStore, ManagedObject, ObjectStore};
