//! Step sequencer
//!
//! Runs a fixed, ordered list of steps against a host. Every step is
//! attempted in order; a step that fails with [`Severity::Fatal`] stops the
//! sequence, anything else is recorded and the run continues.

use tracing::{error, info, warn};

use crate::config::ProvisioningConfig;
use crate::host::Host;
use crate::prompt::Prompt;
use crate::report::{ProvisioningReport, StepResult, StepStatus};
use crate::steps::{
    AssignPassword, DistributionCheck, ElicitCredentials, EnsureAccount, GrantSudo,
    InstallDevPackages, InstallDocker, InstallGreeting, InstallSshKey, InstallZsh, Outcome,
    PrivilegeCheck, RefreshPackages, ResolveUser, Severity, Step, StepContext, StepError,
    WireGreeting,
};

/// Observer notified around each step
pub trait Progress {
    /// A step is about to run (`index` is 1-based)
    fn started(&mut self, index: usize, total: usize, name: &str);

    /// A step has finished
    fn finished(&mut self, index: usize, total: usize, result: &StepResult);
}

/// Progress observer that ignores everything
#[derive(Debug, Clone, Copy, Default)]
pub struct NoProgress;

impl Progress for NoProgress {
    fn started(&mut self, _index: usize, _total: usize, _name: &str) {}

    fn finished(&mut self, _index: usize, _total: usize, _result: &StepResult) {}
}

/// Ordered provisioning sequence
pub struct Sequencer {
    /// Steps in execution order
    pub steps: Vec<Box<dyn Step>>,
}

impl Sequencer {
    /// Create an empty sequence
    pub fn new() -> Self {
        Self { steps: vec![] }
    }

    /// Add a step to the sequence
    pub fn add_step<S: Step + 'static>(&mut self, step: S) {
        self.steps.push(Box::new(step));
    }

    /// Add a step fluently
    #[must_use]
    pub fn with_step<S: Step + 'static>(mut self, step: S) -> Self {
        self.add_step(step);
        self
    }

    /// The standard host bootstrap sequence
    ///
    /// Order matters: the account must be known before credentials are
    /// assigned, and the package index must be fresh before any install.
    pub fn standard() -> Self {
        Self::new()
            // Preconditions
            .with_step(PrivilegeCheck)
            .with_step(DistributionCheck)
            // Account
            .with_step(ResolveUser)
            .with_step(ElicitCredentials)
            .with_step(EnsureAccount::new())
            .with_step(AssignPassword)
            .with_step(GrantSudo::new())
            .with_step(InstallSshKey)
            // Packages
            .with_step(RefreshPackages)
            .with_step(InstallDevPackages)
            .with_step(InstallGreeting)
            .with_step(InstallDocker::new())
            // Shell
            .with_step(InstallZsh::new())
            .with_step(WireGreeting)
    }

    /// Step names in execution order
    pub fn names(&self) -> Vec<&'static str> {
        self.steps.iter().map(|s| s.name()).collect()
    }

    /// Run every step and collect the report
    ///
    /// The report is produced even when a fatal step aborts the sequence;
    /// it then ends with that step.
    pub fn run(
        &self,
        config: &ProvisioningConfig,
        host: &dyn Host,
        prompt: &mut dyn Prompt,
        progress: &mut dyn Progress,
    ) -> ProvisioningReport {
        let total = self.steps.len();
        let mut ctx = StepContext::new(config, host, prompt);
        let mut results = Vec::with_capacity(total);

        info!(user = %config.user, interactive = config.interactive, "provisioning started");

        for (i, step) in self.steps.iter().enumerate() {
            let index = i + 1;
            progress.started(index, total, step.name());

            let outcome = step.run(&mut ctx);
            let result = classify(&**step, outcome).with_notes(ctx.take_notes());
            log_result(index, total, &result);
            progress.finished(index, total, &result);

            let fatal = result.status == StepStatus::FailedFatal;
            results.push(result);
            if fatal {
                error!(step = step.name(), "aborting remaining steps");
                break;
            }
        }

        ProvisioningReport {
            config: config.clone(),
            account: ctx.state.account,
            results,
        }
    }
}

impl Default for Sequencer {
    fn default() -> Self {
        Self::new()
    }
}

/// Map a step's outcome onto a result, applying its declared severity
fn classify(step: &dyn Step, outcome: Result<Outcome, StepError>) -> StepResult {
    let name = step.name();
    match outcome {
        Ok(Outcome::Done(message)) => StepResult::new(name, StepStatus::Ok, message),
        Ok(Outcome::Skipped(message)) => StepResult::new(name, StepStatus::Skipped, message),
        Ok(Outcome::Degraded(message)) => {
            StepResult::new(name, StepStatus::FailedNonFatal, message)
        }
        Err(e) => {
            let status = match step.severity() {
                Severity::Fatal => StepStatus::FailedFatal,
                Severity::Tolerated => StepStatus::FailedNonFatal,
            };
            StepResult::new(name, status, format!("{name} failed")).with_error(e.to_string())
        }
    }
}

fn log_result(index: usize, total: usize, result: &StepResult) {
    let detail = result.error.as_deref().unwrap_or(&result.message);
    match result.status {
        StepStatus::Ok | StepStatus::Skipped => {
            info!(step = %result.name, status = %result.status, "[{index}/{total}] {detail}");
        }
        StepStatus::FailedNonFatal => {
            warn!(step = %result.name, status = %result.status, "[{index}/{total}] {detail}");
        }
        StepStatus::FailedFatal => {
            error!(step = %result.name, status = %result.status, "[{index}/{total}] {detail}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standard_sequence_order() {
        let names = Sequencer::standard().names();

        assert_eq!(
            names,
            [
                "Check privileges",
                "Check distribution",
                "Resolve user",
                "Elicit credentials",
                "Create account",
                "Set password",
                "Grant sudo",
                "Install SSH key",
                "Update system",
                "Install dev packages",
                "Install greeting tool",
                "Install Docker",
                "Install zsh",
                "Wire login greeting",
            ]
        );
    }

    #[test]
    fn test_only_greeting_and_sudo_are_tolerated() {
        let sequencer = Sequencer::standard();
        let tolerated: Vec<_> = sequencer
            .steps
            .iter()
            .filter(|s| s.severity() == Severity::Tolerated)
            .map(|s| s.name())
            .collect();

        assert_eq!(tolerated, ["Grant sudo", "Install greeting tool"]);
    }
}
