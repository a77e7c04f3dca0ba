//! SSH key installation

use super::{Outcome, Step, StepContext, StepError};
use crate::host::CommandSpec;

/// Append an operator-supplied public key to `~/.ssh/authorized_keys`
///
/// Keys are only ever appended. The directory ends up `0700`, the file
/// `0600`, both owned by the target user.
#[derive(Debug, Clone, Copy, Default)]
pub struct InstallSshKey;

impl Step for InstallSshKey {
    fn name(&self) -> &'static str {
        "Install SSH key"
    }

    fn run(&self, ctx: &mut StepContext<'_>) -> Result<Outcome, StepError> {
        if !ctx.config.add_ssh_key {
            return Ok(Outcome::Skipped("SSH key not requested".into()));
        }

        let key = ctx
            .prompt
            .multiline("Paste the SSH public key, then an empty line")?;
        let key = key.trim();
        if key.is_empty() {
            return Ok(Outcome::Skipped("no key provided".into()));
        }

        let ssh_dir = ctx.home_dir()?.join(".ssh");
        let authorized_keys = ssh_dir.join("authorized_keys");
        let dir = ssh_dir.display().to_string();
        let file = authorized_keys.display().to_string();

        ctx.host.run_checked(&CommandSpec::new("mkdir", ["-p", dir.as_str()]))?;
        ctx.host.run_checked(&CommandSpec::new("chmod", ["700", dir.as_str()]))?;

        // Keep earlier keys intact even if the file lacks a final newline
        let existing = ctx.host.read_file(&authorized_keys)?.unwrap_or_default();
        let separator = if existing.is_empty() || existing.ends_with('\n') {
            ""
        } else {
            "\n"
        };
        ctx.host.append_file(&authorized_keys, &format!("{separator}{key}\n"))?;

        ctx.host.run_checked(&CommandSpec::new("chmod", ["600", file.as_str()]))?;
        ctx.chown(&ssh_dir, true)?;

        Ok(Outcome::Done(format!("key appended to {file}")))
    }
}
