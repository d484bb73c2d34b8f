// ABOUTME: Rollout state types for the type state pattern.
// ABOUTME: Each state carries the container records valid at that point of the rollout.

use crate::runtime::ContainerRecord;
use std::collections::VecDeque;

/// A freshly created, uniquely named container that has not been compared yet.
/// Available actions: `resolve()`, `activate()`
#[derive(Debug)]
pub struct Candidate {
    pub(crate) candidate: ContainerRecord,
}

/// The active generation is known; the others are stopped and queued oldest first.
/// Available actions: `rotate()`
#[derive(Debug)]
pub struct Resolved {
    pub(crate) active: ContainerRecord,
    pub(crate) queue: VecDeque<ContainerRecord>,
}

/// Excess generations are gone.
/// Available actions: `start()`
#[derive(Debug)]
pub struct Rotated {
    pub(crate) active: ContainerRecord,
}

/// The active generation is running.
/// Available actions: `finish()`
#[derive(Debug)]
pub struct Started {
    pub(crate) active: ContainerRecord,
}

impl Candidate {
    pub fn record(&self) -> &ContainerRecord {
        &self.candidate
    }
}

impl Resolved {
    pub fn active(&self) -> &ContainerRecord {
        &self.active
    }

    /// Superseded generations in removal order.
    pub fn queue(&self) -> &VecDeque<ContainerRecord> {
        &self.queue
    }
}

impl Rotated {
    pub fn active(&self) -> &ContainerRecord {
        &self.active
    }
}

impl Started {
    pub fn active(&self) -> &ContainerRecord {
        &self.active
    }
}
