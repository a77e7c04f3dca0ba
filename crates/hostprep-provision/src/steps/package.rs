//! Package installation steps

use super::{Outcome, Severity, Step, StepContext, StepError, apt_get, apt_install};

/// Refresh the package index and apply all upgrades
///
/// Everything after this installs packages, so failure aborts the run.
#[derive(Debug, Clone, Copy, Default)]
pub struct RefreshPackages;

impl Step for RefreshPackages {
    fn name(&self) -> &'static str {
        "Update system"
    }

    fn run(&self, ctx: &mut StepContext<'_>) -> Result<Outcome, StepError> {
        ctx.host.run_checked(&apt_get(["update"]))?;
        ctx.host.run_checked(&apt_get(["-y", "upgrade"]))?;
        Ok(Outcome::Done("package index refreshed, upgrades applied".into()))
    }
}

/// Install the development package set
#[derive(Debug, Clone, Copy, Default)]
pub struct InstallDevPackages;

impl Step for InstallDevPackages {
    fn name(&self) -> &'static str {
        "Install dev packages"
    }

    fn run(&self, ctx: &mut StepContext<'_>) -> Result<Outcome, StepError> {
        let packages = &ctx.config.dev_packages;
        if !ctx.config.install_dev {
            return Ok(Outcome::Skipped("disabled by --no-dev".into()));
        }
        if packages.is_empty() {
            return Ok(Outcome::Skipped("no dev packages configured".into()));
        }

        ctx.host.run_checked(&apt_install(packages))?;
        Ok(Outcome::Done(format!("installed {}", packages.join(" "))))
    }
}

/// Install the login greeting tool
///
/// The greeting is cosmetic: a failed install is reported and the run goes on.
#[derive(Debug, Clone, Copy, Default)]
pub struct InstallGreeting;

impl Step for InstallGreeting {
    fn name(&self) -> &'static str {
        "Install greeting tool"
    }

    fn severity(&self) -> Severity {
        Severity::Tolerated
    }

    fn run(&self, ctx: &mut StepContext<'_>) -> Result<Outcome, StepError> {
        let tool = ctx.config.greeting.as_str();
        ctx.host.run_checked(&apt_install(&[tool]))?;
        Ok(Outcome::Done(format!("installed {tool}")))
    }
}
