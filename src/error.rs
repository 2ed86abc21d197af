//! Error taxonomy and cooperative cancellation.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use thiserror::Error;

use crate::profile::Modality;

/// Errors surfaced by the recommendation core.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Malformed or incomplete catalog. Fatal at startup.
    #[error("catalog error: {0}")]
    Catalog(String),

    /// A hardware subsystem could not be resolved.
    ///
    /// Non-fatal when collected into `HardwareProfile::warnings`; fatal when
    /// the GPU and RAM subsystems cannot both be resolved.
    #[error("probe failed for {field}: {cause}")]
    Probe { field: String, cause: String },

    /// Layer 1 eliminated every candidate for a modality and no cloud
    /// option exists.
    #[error("no viable candidates for {modality}")]
    NoViableCandidates { modality: Modality },

    /// The run was cancelled cooperatively. No partial state leaks.
    #[error("recommendation run cancelled")]
    Cancelled,

    /// An internal contract was breached. Indicates a bug, not bad input.
    #[error("invariant violated: {0}")]
    InvariantViolated(String),
}

impl CoreError {
    pub fn probe(field: &str, cause: impl ToString) -> Self {
        CoreError::Probe {
            field: field.to_string(),
            cause: cause.to_string(),
        }
    }

    pub fn invariant(msg: impl Into<String>) -> Self {
        CoreError::InvariantViolated(msg.into())
    }
}

/// Cancellation signal shared between the caller and a recommendation run.
///
/// Stages check the token at entry and between candidates; a cancelled run
/// aborts with [`CoreError::Cancelled`].
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    pub(crate) fn check(&self) -> Result<(), CoreError> {
        if self.is_cancelled() {
            Err(CoreError::Cancelled)
        } else {
            Ok(())
        }
    }
}
