//! Privilege precondition

use super::{Outcome, Step, StepContext, StepError};

/// Abort unless running as root
#[derive(Debug, Clone, Copy, Default)]
pub struct PrivilegeCheck;

impl Step for PrivilegeCheck {
    fn name(&self) -> &'static str {
        "Check privileges"
    }

    fn run(&self, ctx: &mut StepContext<'_>) -> Result<Outcome, StepError> {
        if ctx.host.is_privileged() {
            Ok(Outcome::Done("running as root".into()))
        } else {
            Err(StepError::Precondition(
                "must be run as root (try sudo)".into(),
            ))
        }
    }
}
