//! Provisioning step definitions
//!
//! Each step implements the [`Step`] trait: it inspects the run context,
//! decides whether there is anything to do, and performs its effect through
//! the [`Host`] boundary. Steps declare their own failure [`Severity`]; the
//! sequencer never guesses it.

mod distro;
mod docker;
mod package;
mod privilege;
mod shell;
mod ssh;
mod user;

pub use distro::DistributionCheck;
pub use docker::{AptSource, InstallDocker};
pub use package::{InstallDevPackages, InstallGreeting, RefreshPackages};
pub use privilege::PrivilegeCheck;
pub use shell::{InstallZsh, WireGreeting};
pub use ssh::InstallSshKey;
pub use user::{AssignPassword, ElicitCredentials, EnsureAccount, GrantSudo, ResolveUser};

use std::collections::BTreeMap;
use std::path::PathBuf;

use thiserror::Error;

use crate::config::{ConfigError, ProvisioningConfig, Secret};
use crate::host::{CommandSpec, Host, HostError};
use crate::prompt::{Prompt, PromptError};
use crate::report::AccountState;

/// What happens to the run when a step fails
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Abort the remaining steps
    Fatal,
    /// Record the failure and continue
    Tolerated,
}

/// Successful outcome of a step
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Work was performed
    Done(String),
    /// Nothing to do: disabled or already satisfied
    Skipped(String),
    /// The main effect happened but a tolerated part of it did not
    Degraded(String),
}

/// Step failure
#[derive(Debug, Error)]
pub enum StepError {
    /// A host operation failed
    #[error(transparent)]
    Host(#[from] HostError),

    /// Asking the operator failed
    #[error(transparent)]
    Prompt(#[from] PromptError),

    /// A configuration value is unusable
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// A file template could not be rendered
    #[error("template error: {0}")]
    Template(#[from] tera::Error),

    /// A precondition of the step does not hold
    #[error("{0}")]
    Precondition(String),
}

/// State observed while the run progresses
///
/// Unlike [`ProvisioningConfig`], this depends on the host, not on flags.
#[derive(Debug, Default)]
pub struct RunState {
    /// Whether the account existed before the run
    pub account: Option<AccountState>,
    /// Password to assign
    pub password: Option<Secret>,
    /// OS identification fields
    pub os_release: BTreeMap<String, String>,
}

/// Everything a step may touch
pub struct StepContext<'a> {
    /// Effective configuration
    pub config: &'a ProvisioningConfig,
    /// Side-effect boundary
    pub host: &'a dyn Host,
    /// Operator prompts
    pub prompt: &'a mut dyn Prompt,
    /// Observed run state
    pub state: RunState,
    notes: Vec<String>,
}

impl<'a> StepContext<'a> {
    /// Create a context for a new run
    pub fn new(
        config: &'a ProvisioningConfig,
        host: &'a dyn Host,
        prompt: &'a mut dyn Prompt,
    ) -> Self {
        Self {
            config,
            host,
            prompt,
            state: RunState::default(),
            notes: Vec::new(),
        }
    }

    /// Record a tolerated sub-failure for the current step
    pub fn note(&mut self, note: impl Into<String>) {
        let note = note.into();
        tracing::warn!("{note}");
        self.notes.push(note);
    }

    /// Notes recorded since the last call
    pub fn take_notes(&mut self) -> Vec<String> {
        std::mem::take(&mut self.notes)
    }

    /// Home directory of the target user
    ///
    /// Taken from the passwd database, falling back to `/home/<user>`.
    pub fn home_dir(&self) -> Result<PathBuf, StepError> {
        let user = &self.config.user;
        let out = self
            .host
            .run(&CommandSpec::new("getent", ["passwd", user.as_str()]))?;

        let home = out
            .success()
            .then(|| out.stdout.lines().next().and_then(|l| l.split(':').nth(5)))
            .flatten()
            .filter(|h| !h.is_empty())
            .map_or_else(|| PathBuf::from("/home").join(user), PathBuf::from);
        Ok(home)
    }

    /// Give `path` to the target user
    pub fn chown(&self, path: &std::path::Path, recursive: bool) -> Result<(), StepError> {
        let owner = format!("{0}:{0}", self.config.user);
        let path = path.display().to_string();
        let mut args = Vec::with_capacity(3);
        if recursive {
            args.push("-R".to_string());
        }
        args.extend([owner, path]);
        self.host.run_checked(&CommandSpec::new("chown", args))?;
        Ok(())
    }

    /// Whether a group exists on the host
    pub fn group_exists(&self, group: &str) -> Result<bool, StepError> {
        Ok(self
            .host
            .run(&CommandSpec::new("getent", ["group", group]))?
            .success())
    }
}

/// A single provisioning step
///
/// Steps must be:
/// - **Idempotent where possible**: re-running must not duplicate effects
/// - **Self-skipping**: disabled steps return [`Outcome::Skipped`]
/// - **Explicit about failure**: [`Step::severity`] decides abort vs continue
pub trait Step {
    /// Human-readable name, unique within a sequence
    fn name(&self) -> &'static str;

    /// Consequence of an `Err` from [`Step::run`]
    fn severity(&self) -> Severity {
        Severity::Fatal
    }

    /// Perform the step
    fn run(&self, ctx: &mut StepContext<'_>) -> Result<Outcome, StepError>;
}

/// `apt-get` invocation that never waits for debconf questions
pub(crate) fn apt_get(args: impl IntoIterator<Item = impl Into<String>>) -> CommandSpec {
    CommandSpec::new("apt-get", args).with_env("DEBIAN_FRONTEND", "noninteractive")
}

/// `apt-get install -y <packages>`
pub(crate) fn apt_install<S: AsRef<str>>(packages: &[S]) -> CommandSpec {
    apt_get(
        ["install", "-y"]
            .into_iter()
            .chain(packages.iter().map(|p| p.as_ref())),
    )
}
