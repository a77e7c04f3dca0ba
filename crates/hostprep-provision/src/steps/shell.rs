//! Login shell steps

use std::path::Path;

use tera::{Context, Tera};

use super::{Outcome, Step, StepContext, StepError, apt_install};
use crate::host::CommandSpec;

const ZSHRC_TEMPLATE: &str = include_str!("../../templates/zshrc.tera");

/// Install zsh, give it a starter config and make it the login shell
///
/// An existing `~/.zshrc` is never overwritten.
#[derive(Debug, Clone)]
pub struct InstallZsh {
    /// Path passed to `chsh`
    pub shell_path: String,
}

impl InstallZsh {
    /// Create a new zsh step
    pub fn new() -> Self {
        Self {
            shell_path: "/usr/bin/zsh".into(),
        }
    }

    /// Render the starter `~/.zshrc`
    pub fn default_zshrc(user: &str) -> Result<String, tera::Error> {
        let mut context = Context::new();
        context.insert("user", user);
        Tera::one_off(ZSHRC_TEMPLATE, &context, false)
    }
}

impl Default for InstallZsh {
    fn default() -> Self {
        Self::new()
    }
}

impl Step for InstallZsh {
    fn name(&self) -> &'static str {
        "Install zsh"
    }

    fn run(&self, ctx: &mut StepContext<'_>) -> Result<Outcome, StepError> {
        if !ctx.config.install_zsh {
            return Ok(Outcome::Skipped("not requested (--with-zsh)".into()));
        }

        let user = ctx.config.user.as_str();
        ctx.host.run_checked(&apt_install(&["zsh"]))?;

        let zshrc = ctx.home_dir()?.join(".zshrc");
        let config_note = if ctx.host.exists(&zshrc) {
            "kept existing .zshrc"
        } else {
            ctx.host.write_file(&zshrc, &Self::default_zshrc(user)?, Some(0o644))?;
            ctx.chown(&zshrc, false)?;
            "wrote default .zshrc"
        };

        ctx.host.run_checked(&CommandSpec::new(
            "chsh",
            ["-s", self.shell_path.as_str(), user],
        ))?;
        Ok(Outcome::Done(format!(
            "login shell for {user} set to {}, {config_note}",
            self.shell_path
        )))
    }
}

/// Run the greeting tool from the user's shell startup files
///
/// A file that already mentions the tool is left alone, so repeated runs
/// never stack snippets.
#[derive(Debug, Clone, Copy, Default)]
pub struct WireGreeting;

impl WireGreeting {
    /// Guarded snippet appended to a startup file
    pub fn snippet(tool: &str) -> String {
        format!(
            "\n# Login greeting (added by hostprep)\n\
             if command -v {tool} >/dev/null 2>&1; then\n    {tool}\nfi\n"
        )
    }

    /// Whether a startup file already runs the tool
    pub fn is_wired(content: &str, tool: &str) -> bool {
        content.contains(tool)
    }

    fn wire(ctx: &StepContext<'_>, file: &Path) -> Result<bool, StepError> {
        let tool = ctx.config.greeting.as_str();
        let content = ctx.host.read_file(file)?.unwrap_or_default();
        if Self::is_wired(&content, tool) {
            return Ok(false);
        }

        ctx.host.append_file(file, &Self::snippet(tool))?;
        ctx.chown(file, false)?;
        Ok(true)
    }
}

impl Step for WireGreeting {
    fn name(&self) -> &'static str {
        "Wire login greeting"
    }

    fn run(&self, ctx: &mut StepContext<'_>) -> Result<Outcome, StepError> {
        let home = ctx.home_dir()?;
        let mut files = vec![".bashrc"];
        if ctx.config.install_zsh {
            files.push(".zshrc");
        }

        let mut wired = Vec::new();
        for file in files {
            if Self::wire(ctx, &home.join(file))? {
                wired.push(file);
            }
        }

        if wired.is_empty() {
            Ok(Outcome::Skipped("greeting already wired".into()))
        } else {
            Ok(Outcome::Done(format!("added to {}", wired.join(", "))))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snippet_is_guarded() {
        let snippet = WireGreeting::snippet("fastfetch");

        assert!(snippet.contains("command -v fastfetch"));
        assert!(WireGreeting::is_wired(&snippet, "fastfetch"));
        assert!(!WireGreeting::is_wired("alias ll='ls -l'\n", "fastfetch"));
    }

    #[test]
    fn test_default_zshrc_mentions_user() {
        let zshrc = InstallZsh::default_zshrc("alice").unwrap();

        assert!(zshrc.contains("alice"));
        assert!(zshrc.contains("compinit"));
    }
}
