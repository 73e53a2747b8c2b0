//! Per-object reconciliation state machine.
//!
//! Every managed object walks the same path within one pass:
//!
//! ```text
//! Unbuilt → Built → Diffed → NoChange ─┬→ Satisfied
//!                          → Applied  ─┼→ Unsatisfied
//!                                      └→ Done
//! ```
//!
//! `Satisfied`/`Unsatisfied` are reached only by objects with a readiness
//! check (workloads); everything else goes straight to `Done`. A build
//! failure moves to `Failed` without touching the platform. State is not
//! carried across passes: the next pass starts over at `Unbuilt`.

use std::fmt;

use crate::controller::error::{Error, Result};

/// Phase of one managed object within a pass.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ObjectPhase {
    Unbuilt,
    Built,
    Diffed,
    NoChange,
    Applied,
    Satisfied,
    Unsatisfied,
    Done,
    Failed,
}

impl ObjectPhase {
    /// Terminal phases end the object's pass.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ObjectPhase::Satisfied | ObjectPhase::Unsatisfied | ObjectPhase::Done | ObjectPhase::Failed
        )
    }

    /// Whether the object was written this pass.
    pub fn was_applied(&self) -> bool {
        matches!(self, ObjectPhase::Applied)
    }

    /// Apply an event, failing with an internal error on an invalid transition.
    pub fn on(self, event: ObjectEvent) -> Result<ObjectPhase> {
        TRANSITIONS
            .iter()
            .find(|t| t.from == self && t.event == event)
            .map(|t| t.to)
            .ok_or_else(|| {
                Error::Internal(format!("invalid object transition: {} on {}", self, event))
            })
    }
}

impl fmt::Display for ObjectPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Events driving [`ObjectPhase`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ObjectEvent {
    /// Builder produced the desired object
    Built,
    /// Builder returned an error
    BuildFailed,
    /// Current state fetched and compared
    Compared,
    /// Patch was empty
    Unchanged,
    /// Object created or replaced
    Written,
    /// Readiness check passed
    Ready,
    /// Readiness check failed
    NotReady,
    /// Object has no readiness check
    Finished,
}

impl fmt::Display for ObjectEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

struct Transition {
    from: ObjectPhase,
    event: ObjectEvent,
    to: ObjectPhase,
}

impl Transition {
    const fn new(from: ObjectPhase, event: ObjectEvent, to: ObjectPhase) -> Self {
        Self { from, event, to }
    }
}

const TRANSITIONS: &[Transition] = &[
    Transition::new(ObjectPhase::Unbuilt, ObjectEvent::Built, ObjectPhase::Built),
    Transition::new(ObjectPhase::Unbuilt, ObjectEvent::BuildFailed, ObjectPhase::Failed),
    Transition::new(ObjectPhase::Built, ObjectEvent::Compared, ObjectPhase::Diffed),
    Transition::new(ObjectPhase::Diffed, ObjectEvent::Unchanged, ObjectPhase::NoChange),
    Transition::new(ObjectPhase::Diffed, ObjectEvent::Written, ObjectPhase::Applied),
    Transition::new(ObjectPhase::NoChange, ObjectEvent::Ready, ObjectPhase::Satisfied),
    Transition::new(ObjectPhase::NoChange, ObjectEvent::NotReady, ObjectPhase::Unsatisfied),
    Transition::new(ObjectPhase::NoChange, ObjectEvent::Finished, ObjectPhase::Done),
    Transition::new(ObjectPhase::Applied, ObjectEvent::Ready, ObjectPhase::Satisfied),
    Transition::new(ObjectPhase::Applied, ObjectEvent::NotReady, ObjectPhase::Unsatisfied),
    Transition::new(ObjectPhase::Applied, ObjectEvent::Finished, ObjectPhase::Done),
];
