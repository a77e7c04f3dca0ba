//! Step results and the final run report

use std::fmt;

use crate::config::ProvisioningConfig;

/// Outcome class of one step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepStatus {
    /// The step did its work
    Ok,
    /// Disabled by configuration or already satisfied
    Skipped,
    /// Failed, but the run continued
    FailedNonFatal,
    /// Failed and aborted the run
    FailedFatal,
}

impl StepStatus {
    /// Short label used in logs and the summary
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Ok => "ok",
            Self::Skipped => "skipped",
            Self::FailedNonFatal => "failed-nonfatal",
            Self::FailedFatal => "failed-fatal",
        }
    }
}

impl fmt::Display for StepStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of running a step
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepResult {
    /// Step name
    pub name: String,
    /// Outcome class
    pub status: StepStatus,
    /// Human-readable message
    pub message: String,
    /// Underlying error, if the step failed
    pub error: Option<String>,
    /// Tolerated sub-failures worth reporting
    pub notes: Vec<String>,
}

impl StepResult {
    /// Create a result
    pub fn new(name: impl Into<String>, status: StepStatus, message: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            status,
            message: message.into(),
            error: None,
            notes: Vec::new(),
        }
    }

    /// Attach the underlying error
    #[must_use]
    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }

    /// Attach notes
    #[must_use]
    pub fn with_notes(mut self, notes: Vec<String>) -> Self {
        self.notes = notes;
        self
    }
}

/// Whether the target account existed before the run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccountState {
    /// The account was absent and is created by this run
    Created,
    /// The account already existed
    Reused,
}

impl fmt::Display for AccountState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Created => f.write_str("created"),
            Self::Reused => f.write_str("reused"),
        }
    }
}

/// Everything a run did, in order
#[derive(Debug, Clone)]
pub struct ProvisioningReport {
    /// Effective configuration
    pub config: ProvisioningConfig,
    /// Observed account state, if the run got that far
    pub account: Option<AccountState>,
    /// Per-step results in execution order
    pub results: Vec<StepResult>,
}

impl ProvisioningReport {
    /// The step that aborted the run, if any
    pub fn fatal(&self) -> Option<&StepResult> {
        self.results
            .iter()
            .find(|r| r.status == StepStatus::FailedFatal)
    }

    /// Steps that failed without aborting
    pub fn failures(&self) -> impl Iterator<Item = &StepResult> {
        self.results
            .iter()
            .filter(|r| r.status == StepStatus::FailedNonFatal)
    }

    /// Whether the run finished without a fatal failure
    pub fn is_success(&self) -> bool {
        self.fatal().is_none()
    }

    /// Process exit code for this run
    pub fn exit_code(&self) -> u8 {
        u8::from(!self.is_success())
    }

    /// Look up a step result by name
    pub fn step(&self, name: &str) -> Option<&StepResult> {
        self.results.iter().find(|r| r.name == name)
    }
}
