//! Hostprep Provision - Host Bootstrap Step Library
//!
//! This crate provides the types and traits for running an ordered sequence
//! of idempotent provisioning steps against a Debian/Ubuntu host.
//!
//! # Architecture
//!
//! - [`ProvisioningConfig`]: immutable run configuration
//! - [`Host`] trait: the side-effect boundary every step goes through
//! - [`Prompt`] trait: blocking operator questions
//! - [`steps`] module: concrete steps (user, packages, Docker, shell, ...)
//! - [`Sequencer`]: runs the steps in order and builds a [`ProvisioningReport`]
//!
//! # Example
//!
//! ```ignore
//! use hostprep_provision::{
//!     NoProgress, NoPrompt, PasswordSource, ProvisioningConfig, Secret, Sequencer, SystemHost,
//! };
//!
//! let config = ProvisioningConfig::builder()
//!     .user("deploy")
//!     .interactive(false)
//!     .password(PasswordSource::Environment(Secret::new("s3cret")))
//!     .build()?;
//!
//! let report = Sequencer::standard().run(&config, &SystemHost::new(), &mut NoPrompt, &mut NoProgress);
//! std::process::exit(report.exit_code().into());
//! ```

pub mod config;
pub mod host;
pub mod prompt;
pub mod report;
pub mod sequencer;
pub mod steps;

pub use config::{ConfigError, PasswordSource, ProvisioningConfig, Secret};
pub use host::{CommandOutput, CommandSpec, Host, HostError, SystemHost};
pub use prompt::{NoPrompt, Prompt, PromptError};
pub use report::{AccountState, ProvisioningReport, StepResult, StepStatus};
pub use sequencer::{NoProgress, Progress, Sequencer};
pub use steps::Step;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::steps::{
        AssignPassword, EnsureAccount, GrantSudo, InstallDevPackages, StepContext, apt_install,
    };

    #[test]
    fn test_apt_install_is_noninteractive() {
        let spec = apt_install(&["vim", "git"]);

        assert_eq!(spec.to_string(), "apt-get install -y vim git");
        assert!(
            spec.env
                .contains(&("DEBIAN_FRONTEND".into(), "noninteractive".into()))
        );
    }

    #[test]
    fn test_disabled_steps_skip_without_touching_host() {
        struct Untouchable;

        impl Host for Untouchable {
            fn run(&self, spec: &CommandSpec) -> Result<CommandOutput, HostError> {
                panic!("unexpected command: {spec}");
            }
            fn read_file(&self, _: &std::path::Path) -> Result<Option<String>, HostError> {
                panic!("unexpected read");
            }
            fn write_file(
                &self,
                _: &std::path::Path,
                _: &str,
                _: Option<u32>,
            ) -> Result<(), HostError> {
                panic!("unexpected write");
            }
            fn append_file(&self, _: &std::path::Path, _: &str) -> Result<(), HostError> {
                panic!("unexpected append");
            }
            fn exists(&self, _: &std::path::Path) -> bool {
                panic!("unexpected exists");
            }
            fn is_privileged(&self) -> bool {
                true
            }
        }

        let config = ProvisioningConfig::builder()
            .grant_sudo(false)
            .install_dev(false)
            .build()
            .unwrap();
        let mut prompt = NoPrompt;
        let mut ctx = StepContext::new(&config, &Untouchable, &mut prompt);

        for step in [
            Box::new(GrantSudo::new()) as Box<dyn Step>,
            Box::new(InstallDevPackages),
        ] {
            let outcome = step.run(&mut ctx).unwrap();
            assert!(matches!(outcome, steps::Outcome::Skipped(_)));
        }
    }

    #[test]
    fn test_existing_account_is_not_recreated() {
        struct Untouchable;

        impl Host for Untouchable {
            fn run(&self, spec: &CommandSpec) -> Result<CommandOutput, HostError> {
                panic!("unexpected command: {spec}");
            }
            fn read_file(&self, _: &std::path::Path) -> Result<Option<String>, HostError> {
                Ok(None)
            }
            fn write_file(
                &self,
                _: &std::path::Path,
                _: &str,
                _: Option<u32>,
            ) -> Result<(), HostError> {
                Ok(())
            }
            fn append_file(&self, _: &std::path::Path, _: &str) -> Result<(), HostError> {
                Ok(())
            }
            fn exists(&self, _: &std::path::Path) -> bool {
                false
            }
            fn is_privileged(&self) -> bool {
                true
            }
        }

        let config = ProvisioningConfig::builder().build().unwrap();
        let mut prompt = NoPrompt;
        let mut ctx = StepContext::new(&config, &Untouchable, &mut prompt);
        ctx.state.account = Some(AccountState::Reused);

        let outcome = EnsureAccount::new().run(&mut ctx).unwrap();
        assert!(matches!(outcome, steps::Outcome::Skipped(_)));

        // Never reaches chpasswd, which would panic on this host
        ctx.state.password = Some(Secret::new("pw\nroot:owned"));
        let err = AssignPassword.run(&mut ctx).unwrap_err();
        assert!(matches!(
            err,
            steps::StepError::Config(ConfigError::InvalidPassword)
        ));
    }
}
