//! Commit State Machine
//!
//! One value per commit attempt. Transitions are explicit method calls and
//! anything not listed below is a forbidden transition.
//!
//! ```text
//! Unlocked → Locking → Locked → Validating → BookkeepingWritten → LiveWritten
//!               │                   │  │              │               │
//!               │                   │  └──────┬───────┘               │
//!               │                   │         ▼                       │
//!               │                   │    Compensating                 │
//!               │                   │         │                       │
//!               ▼                   ▼         ▼                       ▼
//!          Released{false}   Released{false}  Released{false}   Released{true}
//! ```
//!
//! Store effects per state:
//! - Unlocked, Locking, Locked, Validating: no data document written
//! - BookkeepingWritten: history entries written, live documents untouched
//! - LiveWritten: the batch is applied
//! - Compensating: history deleted, pre-commit snapshot being restored

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitState {
    /// No lock attempted yet.
    Unlocked,

    /// Lock sentinel create in flight.
    Locking,

    /// Lock held, snapshot not yet taken.
    Locked,

    /// Snapshot fetched, versions being checked. Phase 1 runs from here.
    Validating,

    /// Phase 1 applied. Phase 2 runs from here.
    BookkeepingWritten,

    /// Phase 2 applied.
    LiveWritten,

    /// Undoing a failed phase 1 or phase 2.
    Compensating,

    /// Lock released, or never acquired.
    Released {
        /// Whether the batch is applied.
        committed: bool,
    },
}

impl Default for CommitState {
    fn default() -> Self {
        Self::new()
    }
}

impl CommitState {
    pub fn new() -> Self {
        Self::Unlocked
    }

    /// Get the state name for observability.
    pub fn state_name(&self) -> &'static str {
        match self {
            Self::Unlocked => "UNLOCKED",
            Self::Locking => "LOCKING",
            Self::Locked => "LOCKED",
            Self::Validating => "VALIDATING",
            Self::BookkeepingWritten => "BOOKKEEPING_WRITTEN",
            Self::LiveWritten => "LIVE_WRITTEN",
            Self::Compensating => "COMPENSATING",
            Self::Released { .. } => "RELEASED",
        }
    }

    /// Whether this attempt holds the index lock.
    pub fn holds_lock(&self) -> bool {
        matches!(
            self,
            Self::Locked
                | Self::Validating
                | Self::BookkeepingWritten
                | Self::LiveWritten
                | Self::Compensating
        )
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Released { .. })
    }

    // =========================================================================
    // ALLOWED TRANSITIONS
    // =========================================================================

    /// Unlocked → Locking
    pub fn begin_locking(self) -> Result<Self, CommitStateError> {
        match self {
            Self::Unlocked => Ok(Self::Locking),
            _ => Err(CommitStateError::forbidden(self, "LOCKING")),
        }
    }

    /// Locking → Locked
    pub fn lock_acquired(self) -> Result<Self, CommitStateError> {
        match self {
            Self::Locking => Ok(Self::Locked),
            _ => Err(CommitStateError::forbidden(self, "LOCKED")),
        }
    }

    /// Locked → Validating
    pub fn begin_validation(self) -> Result<Self, CommitStateError> {
        match self {
            Self::Locked => Ok(Self::Validating),
            _ => Err(CommitStateError::forbidden(self, "VALIDATING")),
        }
    }

    /// Validating → BookkeepingWritten
    pub fn bookkeeping_written(self) -> Result<Self, CommitStateError> {
        match self {
            Self::Validating => Ok(Self::BookkeepingWritten),
            _ => Err(CommitStateError::forbidden(self, "BOOKKEEPING_WRITTEN")),
        }
    }

    /// BookkeepingWritten → LiveWritten
    pub fn live_written(self) -> Result<Self, CommitStateError> {
        match self {
            Self::BookkeepingWritten => Ok(Self::LiveWritten),
            _ => Err(CommitStateError::forbidden(self, "LIVE_WRITTEN")),
        }
    }

    /// Validating | BookkeepingWritten → Compensating
    ///
    /// A phase 1 or phase 2 write failed.
    pub fn begin_compensation(self) -> Result<Self, CommitStateError> {
        match self {
            Self::Validating | Self::BookkeepingWritten => Ok(Self::Compensating),
            _ => Err(CommitStateError::forbidden(self, "COMPENSATING")),
        }
    }

    /// Any non-terminal state except Unlocked → Released
    ///
    /// Only LiveWritten releases as committed.
    pub fn release(self) -> Result<Self, CommitStateError> {
        match self {
            Self::LiveWritten => Ok(Self::Released { committed: true }),
            Self::Locking | Self::Locked | Self::Validating | Self::Compensating => {
                Ok(Self::Released { committed: false })
            }
            _ => Err(CommitStateError::forbidden(self, "RELEASED")),
        }
    }
}

impl fmt::Display for CommitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.state_name())
    }
}

/// Forbidden commit state transition
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitStateError {
    pub from: &'static str,
    pub to: &'static str,
}

impl CommitStateError {
    fn forbidden(from: CommitState, to: &'static str) -> Self {
        Self {
            from: from.state_name(),
            to,
        }
    }
}

impl fmt::Display for CommitStateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "forbidden transition: {} → {}", self.from, self.to)
    }
}

impl std::error::Error for CommitStateError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initial_state() {
        let state = CommitState::new();
        assert_eq!(state, CommitState::Unlocked);
        assert!(!state.holds_lock());
        assert!(!state.is_terminal());
    }

    #[test]
    fn test_happy_path() {
        let state = CommitState::new()
            .begin_locking()
            .and_then(CommitState::lock_acquired)
            .and_then(CommitState::begin_validation)
            .and_then(CommitState::bookkeeping_written)
            .and_then(CommitState::live_written)
            .unwrap();
        assert!(state.holds_lock());

        let released = state.release().unwrap();
        assert_eq!(released, CommitState::Released { committed: true });
        assert!(released.is_terminal());
    }

    #[test]
    fn test_lock_conflict_releases_uncommitted() {
        let state = CommitState::new().begin_locking().unwrap();
        assert!(!state.holds_lock());
        assert_eq!(
            state.release().unwrap(),
            CommitState::Released { committed: false }
        );
    }

    #[test]
    fn test_version_conflict_skips_compensation() {
        let validating = CommitState::Validating;
        assert_eq!(
            validating.release().unwrap(),
            CommitState::Released { committed: false }
        );
    }

    #[test]
    fn test_compensation_from_either_phase() {
        for state in [CommitState::Validating, CommitState::BookkeepingWritten] {
            let compensating = state.begin_compensation().unwrap();
            assert_eq!(compensating, CommitState::Compensating);
            assert_eq!(
                compensating.release().unwrap(),
                CommitState::Released { committed: false }
            );
        }
    }

    #[test]
    fn test_forbidden_transitions() {
        let err = CommitState::Unlocked.begin_validation().unwrap_err();
        assert_eq!(err.from, "UNLOCKED");
        assert_eq!(err.to, "VALIDATING");
        assert_eq!(err.to_string(), "forbidden transition: UNLOCKED → VALIDATING");

        assert!(CommitState::Locked.live_written().is_err());
        assert!(CommitState::LiveWritten.begin_compensation().is_err());
        assert!(CommitState::BookkeepingWritten.release().is_err());
        assert!(CommitState::Unlocked.release().is_err());
        assert!(CommitState::Released { committed: true }.begin_locking().is_err());
    }
}
