//! Claim decision table.

use crate::store::{GenerationRecord, GenerationStatus};

/// What the store currently holds for a cache key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordState {
    Absent,
    Pending,
    Complete,
    Failed,
}

impl RecordState {
    pub fn of(record: Option<&GenerationRecord>) -> Self {
        match record.map(|record| record.status) {
            None => RecordState::Absent,
            Some(GenerationStatus::Pending) => RecordState::Pending,
            Some(GenerationStatus::Complete) => RecordState::Complete,
            Some(GenerationStatus::Failed) => RecordState::Failed,
        }
    }
}

/// Step the coordinator takes for one observation of the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    InsertPending,
    ClaimForRegen,
    ServeCached,
    SignalInProgress,
    SignalFailed,
}

/// A pending record is never reclaimed, even when forced. Failed records are
/// only retried when forced.
pub fn decide(state: RecordState, force: bool) -> Action {
    match (state, force) {
        (RecordState::Absent, _) => Action::InsertPending,
        (RecordState::Pending, _) => Action::SignalInProgress,
        (RecordState::Complete, false) => Action::ServeCached,
        (RecordState::Failed, false) => Action::SignalFailed,
        (RecordState::Complete, true) | (RecordState::Failed, true) => Action::ClaimForRegen,
    }
}
