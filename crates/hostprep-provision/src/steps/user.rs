//! User management steps

use super::{Outcome, Severity, Step, StepContext, StepError};
use crate::config::{ConfigError, PasswordSource, Secret};
use crate::host::CommandSpec;
use crate::report::AccountState;

/// Observe whether the target account already exists
#[derive(Debug, Clone, Copy, Default)]
pub struct ResolveUser;

impl Step for ResolveUser {
    fn name(&self) -> &'static str {
        "Resolve user"
    }

    fn run(&self, ctx: &mut StepContext<'_>) -> Result<Outcome, StepError> {
        let user = &ctx.config.user;
        let exists = ctx
            .host
            .run(&CommandSpec::new("id", ["-u", user.as_str()]))?
            .success();

        let state = if exists {
            AccountState::Reused
        } else {
            AccountState::Created
        };
        ctx.state.account = Some(state);

        Ok(Outcome::Done(if exists {
            format!("{user} exists, reusing")
        } else {
            format!("{user} will be created")
        }))
    }
}

/// Ask for the account password until it is non-empty and confirmed
///
/// There is no retry limit.
#[derive(Debug, Clone, Copy, Default)]
pub struct ElicitCredentials;

impl Step for ElicitCredentials {
    fn name(&self) -> &'static str {
        "Elicit credentials"
    }

    fn run(&self, ctx: &mut StepContext<'_>) -> Result<Outcome, StepError> {
        if let PasswordSource::Environment(secret) = &ctx.config.password {
            ctx.state.password = Some(secret.clone());
            return Ok(Outcome::Skipped("password taken from environment".into()));
        }

        let user = ctx.config.user.clone();
        loop {
            let password = Secret::new(ctx.prompt.password(&format!("Password for {user}"))?);
            if password.is_empty() {
                tracing::info!("empty password rejected");
                continue;
            }
            if password.has_line_break() {
                tracing::info!("password with line break rejected");
                continue;
            }

            let confirm = ctx.prompt.password("Confirm password")?;
            if password.expose() == confirm {
                ctx.state.password = Some(password);
                return Ok(Outcome::Done("password confirmed".into()));
            }
            tracing::info!("password confirmation mismatch");
        }
    }
}

/// Create the account unless it already exists
#[derive(Debug, Clone)]
pub struct EnsureAccount {
    /// Login shell for new accounts
    pub shell: String,
}

impl EnsureAccount {
    /// Create a new account step
    pub fn new() -> Self {
        Self {
            shell: "/bin/bash".into(),
        }
    }
}

impl Default for EnsureAccount {
    fn default() -> Self {
        Self::new()
    }
}

impl Step for EnsureAccount {
    fn name(&self) -> &'static str {
        "Create account"
    }

    fn run(&self, ctx: &mut StepContext<'_>) -> Result<Outcome, StepError> {
        let user = ctx.config.user.as_str();
        if ctx.state.account == Some(AccountState::Reused) {
            return Ok(Outcome::Skipped(format!("{user} already exists")));
        }

        ctx.host.run_checked(&CommandSpec::new(
            "useradd",
            ["-m", "-s", self.shell.as_str(), user],
        ))?;
        Ok(Outcome::Done(format!("created {user}")))
    }
}

/// Set the account password, also for reused accounts
#[derive(Debug, Clone, Copy, Default)]
pub struct AssignPassword;

impl Step for AssignPassword {
    fn name(&self) -> &'static str {
        "Set password"
    }

    fn run(&self, ctx: &mut StepContext<'_>) -> Result<Outcome, StepError> {
        let user = ctx.config.user.as_str();
        let password = ctx
            .state
            .password
            .as_ref()
            .ok_or_else(|| StepError::Precondition("no password available".into()))?;
        if password.has_line_break() {
            return Err(ConfigError::InvalidPassword.into());
        }

        ctx.host.run_checked(
            &CommandSpec::new("chpasswd", Vec::<String>::new())
                .with_stdin(format!("{user}:{}\n", password.expose())),
        )?;
        Ok(Outcome::Done(format!("password set for {user}")))
    }
}

/// Add the user to the first administrative group that exists
#[derive(Debug, Clone)]
pub struct GrantSudo {
    /// Candidate groups, tried in order
    pub groups: Vec<String>,
}

impl GrantSudo {
    /// `sudo`, then `wheel`
    pub fn new() -> Self {
        Self {
            groups: vec!["sudo".into(), "wheel".into()],
        }
    }
}

impl Default for GrantSudo {
    fn default() -> Self {
        Self::new()
    }
}

impl Step for GrantSudo {
    fn name(&self) -> &'static str {
        "Grant sudo"
    }

    fn severity(&self) -> Severity {
        Severity::Tolerated
    }

    fn run(&self, ctx: &mut StepContext<'_>) -> Result<Outcome, StepError> {
        if !ctx.config.grant_sudo {
            return Ok(Outcome::Skipped("disabled by --no-sudo".into()));
        }

        let user = ctx.config.user.as_str();
        for group in &self.groups {
            if ctx.group_exists(group)? {
                ctx.host.run_checked(&CommandSpec::new(
                    "usermod",
                    ["-aG", group.as_str(), user],
                ))?;
                return Ok(Outcome::Done(format!("{user} added to {group}")));
            }
        }

        Err(StepError::Precondition(format!(
            "none of the groups {} exist",
            self.groups.join(", ")
        )))
    }
}
