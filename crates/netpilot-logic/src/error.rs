//! Errors that abort a scheduler tick.

use crate::persistence::PersistError;

/// Why a tick (or a single traversal) could not complete.
///
/// None of these are fatal to the run loop: it logs the error and tries
/// again on the next tick.
#[derive(Debug)]
pub enum PilotError {
    /// `scan` reported a server that `node` does not know.
    UnknownNode(String),
    Persist(PersistError),
}

impl From<PersistError> for PilotError {
    fn from(e: PersistError) -> Self {
        PilotError::Persist(e)
    }
}

impl std::fmt::Display for PilotError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PilotError::UnknownNode(name) => write!(f, "unknown server: {}", name),
            PilotError::Persist(e) => write!(f, "state persistence failed: {}", e),
        }
    }
}

impl std::error::Error for PilotError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            PilotError::Persist(e) => Some(e),
            PilotError::UnknownNode(_) => None,
        }
    }
}
