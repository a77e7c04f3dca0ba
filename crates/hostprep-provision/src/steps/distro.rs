//! Distribution check

use std::collections::BTreeMap;

use super::{Outcome, Step, StepContext, StepError};

/// Distribution IDs provisioned without questions
const SUPPORTED: &[&str] = &["debian", "ubuntu"];

/// Verify the host is Debian-family
///
/// Unsupported hosts are confirmed by the operator in interactive runs and
/// passed through with a note otherwise, never blocking on the terminal.
#[derive(Debug, Clone, Copy, Default)]
pub struct DistributionCheck;

impl DistributionCheck {
    /// Whether the os-release fields describe a Debian-family system
    pub fn is_supported(fields: &BTreeMap<String, String>) -> bool {
        let id = fields.get("ID").map(String::as_str).unwrap_or_default();
        let like = fields.get("ID_LIKE").map(String::as_str).unwrap_or_default();

        SUPPORTED.contains(&id) || like.split_whitespace().any(|l| l == "debian")
    }

    fn pretty_name(fields: &BTreeMap<String, String>) -> String {
        fields
            .get("PRETTY_NAME")
            .or_else(|| fields.get("ID"))
            .cloned()
            .unwrap_or_else(|| "unknown distribution".into())
    }
}

impl Step for DistributionCheck {
    fn name(&self) -> &'static str {
        "Check distribution"
    }

    fn run(&self, ctx: &mut StepContext<'_>) -> Result<Outcome, StepError> {
        let fields = ctx.host.os_release()?;
        let name = Self::pretty_name(&fields);
        let supported = Self::is_supported(&fields);
        ctx.state.os_release = fields;

        if supported {
            return Ok(Outcome::Done(name));
        }

        if !ctx.config.interactive {
            ctx.note(format!("{name} is not Debian-based; continuing"));
            return Ok(Outcome::Done(format!("{name} (unsupported)")));
        }

        let proceed = ctx
            .prompt
            .confirm(&format!("{name} is not Debian-based. Continue anyway?"), false)?;
        if proceed {
            Ok(Outcome::Done(format!("{name} (unsupported, confirmed)")))
        } else {
            Err(StepError::Precondition(format!(
                "unsupported distribution: {name}"
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::parse_os_release;

    #[test]
    fn test_debian_family_detection() {
        let ubuntu = parse_os_release("ID=ubuntu\nID_LIKE=debian\n");
        let mint = parse_os_release("ID=linuxmint\nID_LIKE=\"ubuntu debian\"\n");
        let fedora = parse_os_release("ID=fedora\n");

        assert!(DistributionCheck::is_supported(&ubuntu));
        assert!(DistributionCheck::is_supported(&mint));
        assert!(!DistributionCheck::is_supported(&fedora));
        assert!(!DistributionCheck::is_supported(&BTreeMap::new()));
    }
}
