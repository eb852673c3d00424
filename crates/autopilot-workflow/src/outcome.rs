//! The run's terminal status and the process exit code it implies (§7
//! "Propagation policy").

use autopilot_types::AutopilotError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownReason {
    /// The queue drained and every triggered handler succeeded.
    Finished,
    /// A shutdown signal arrived before the queue drained.
    Aborted,
    /// At least one handler failed; `RunReport::error` carries the first one
    /// observed.
    Failed,
}

#[derive(Debug)]
pub struct RunReport {
    pub reason: ShutdownReason,
    pub error: Option<AutopilotError>,
}

impl RunReport {
    pub fn finished() -> Self {
        Self {
            reason: ShutdownReason::Finished,
            error: None,
        }
    }

    pub fn failed(error: AutopilotError) -> Self {
        Self {
            reason: ShutdownReason::Failed,
            error: Some(error),
        }
    }

    pub fn aborted(signal: &'static str) -> Self {
        tracing::warn!(signal, "reconciliation aborted by signal");
        Self {
            reason: ShutdownReason::Aborted,
            error: None,
        }
    }

    /// A distinct non-zero code per recognized error kind (§7), `1` for a
    /// clean signal-driven abort with no underlying failure, `0` otherwise.
    pub fn exit_code(&self) -> i32 {
        match &self.error {
            Some(err) => err.exit_code(),
            None if self.reason == ShutdownReason::Aborted => 1,
            None => 0,
        }
    }
}
