//! Configuration types for host provisioning

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

/// Username used when neither flags nor the defaults file name one
pub const DEFAULT_USER: &str = "admin";

/// Append-only run log
pub const DEFAULT_LOG_FILE: &str = "/var/log/hostprep.log";

/// Tool run on login
pub const DEFAULT_GREETING: &str = "fastfetch";

/// Environment variable holding the password in non-interactive mode
pub const PASSWORD_ENV: &str = "HOSTPREP_PASSWORD";

/// Development packages installed unless `--no-dev` is given
pub fn default_dev_packages() -> Vec<String> {
    [
        "build-essential",
        "git",
        "curl",
        "wget",
        "vim",
        "htop",
        "unzip",
        "jq",
    ]
    .into_iter()
    .map(Into::into)
    .collect()
}

/// Errors raised while resolving configuration
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// A flag outside the supported set
    #[error("unknown flag: {0}")]
    UnknownFlag(String),

    /// A recognized flag used incorrectly
    #[error("invalid arguments: {0}")]
    InvalidArgument(String),

    /// Username rejected by the `useradd` naming rules
    #[error("invalid username '{0}': use lowercase letters, digits, '_' or '-' (max 32 chars)")]
    InvalidUsername(String),

    /// Non-interactive mode without a password
    #[error("non-interactive mode requires a password in $HOSTPREP_PASSWORD")]
    MissingPassword,

    /// A password that would break the `user:password` line fed to `chpasswd`
    #[error("password must not contain line breaks")]
    InvalidPassword,

    /// The defaults file could not be read or parsed
    #[error("failed to load defaults from {path}: {reason}")]
    Defaults { path: String, reason: String },
}

/// A value that must never end up in logs
#[derive(Clone, PartialEq, Eq)]
pub struct Secret(String);

impl Secret {
    /// Wrap a secret value
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// The wrapped value
    pub fn expose(&self) -> &str {
        &self.0
    }

    /// Whether the secret is empty
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Whether the secret spans more than one line
    pub fn has_line_break(&self) -> bool {
        self.0.contains(['\n', '\r'])
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret(***)")
    }
}

/// Where the account password comes from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PasswordSource {
    /// Asked on the terminal during the run
    Prompted,
    /// Supplied through the environment
    Environment(Secret),
}

impl fmt::Display for PasswordSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Prompted => f.write_str("prompt"),
            Self::Environment(_) => write!(f, "${PASSWORD_ENV}"),
        }
    }
}

/// Configuration for one provisioning run
///
/// Built once from defaults, flags and environment; never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProvisioningConfig {
    /// Target username
    pub user: String,
    /// Add the user to the sudo (or wheel) group
    pub grant_sudo: bool,
    /// Ask for an SSH public key and install it
    pub add_ssh_key: bool,
    /// Install the development package set
    pub install_dev: bool,
    /// Install Docker Engine
    pub install_docker: bool,
    /// Install zsh and make it the login shell
    pub install_zsh: bool,
    /// Whether prompts may be shown
    pub interactive: bool,
    /// Password source
    pub password: PasswordSource,
    /// Run log path
    pub log_file: Option<PathBuf>,
    /// Packages installed by the dev step
    pub dev_packages: Vec<String>,
    /// Greeting tool package and command name
    pub greeting: String,
}

impl ProvisioningConfig {
    /// Create a new config builder
    pub fn builder() -> ProvisioningConfigBuilder {
        ProvisioningConfigBuilder::default()
    }
}

/// Builder for `ProvisioningConfig`
#[derive(Debug, Clone)]
pub struct ProvisioningConfigBuilder {
    config: ProvisioningConfig,
}

impl Default for ProvisioningConfigBuilder {
    fn default() -> Self {
        Self {
            config: ProvisioningConfig {
                user: DEFAULT_USER.into(),
                grant_sudo: true,
                add_ssh_key: true,
                install_dev: true,
                install_docker: false,
                install_zsh: false,
                interactive: true,
                password: PasswordSource::Prompted,
                log_file: Some(PathBuf::from(DEFAULT_LOG_FILE)),
                dev_packages: default_dev_packages(),
                greeting: DEFAULT_GREETING.into(),
            },
        }
    }
}

impl ProvisioningConfigBuilder {
    /// Set the target username
    pub fn user(mut self, user: impl Into<String>) -> Self {
        self.config.user = user.into();
        self
    }

    /// Grant sudo membership
    pub fn grant_sudo(mut self, grant: bool) -> Self {
        self.config.grant_sudo = grant;
        self
    }

    /// Ask for an SSH key
    pub fn add_ssh_key(mut self, add: bool) -> Self {
        self.config.add_ssh_key = add;
        self
    }

    /// Install development packages
    pub fn install_dev(mut self, install: bool) -> Self {
        self.config.install_dev = install;
        self
    }

    /// Install Docker Engine
    pub fn install_docker(mut self, install: bool) -> Self {
        self.config.install_docker = install;
        self
    }

    /// Install zsh
    pub fn install_zsh(mut self, install: bool) -> Self {
        self.config.install_zsh = install;
        self
    }

    /// Allow or forbid prompts
    pub fn interactive(mut self, interactive: bool) -> Self {
        self.config.interactive = interactive;
        self
    }

    /// Set the password source
    pub fn password(mut self, source: PasswordSource) -> Self {
        self.config.password = source;
        self
    }

    /// Set the run log path
    pub fn log_file(mut self, path: Option<PathBuf>) -> Self {
        self.config.log_file = path;
        self
    }

    /// Replace the dev package list
    pub fn dev_packages(mut self, packages: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.config.dev_packages = packages.into_iter().map(Into::into).collect();
        self
    }

    /// Set the greeting tool
    pub fn greeting(mut self, tool: impl Into<String>) -> Self {
        self.config.greeting = tool.into();
        self
    }

    /// Build the configuration
    ///
    /// Non-interactive runs never add SSH keys and must carry a non-empty
    /// password from the environment. Passwords never contain line breaks.
    pub fn build(mut self) -> Result<ProvisioningConfig, ConfigError> {
        if let PasswordSource::Environment(secret) = &self.config.password
            && secret.has_line_break()
        {
            return Err(ConfigError::InvalidPassword);
        }
        if !self.config.interactive {
            self.config.add_ssh_key = false;
            match &self.config.password {
                PasswordSource::Environment(secret) if !secret.is_empty() => {}
                _ => return Err(ConfigError::MissingPassword),
            }
        }
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_non_interactive_requires_password() {
        let err = ProvisioningConfig::builder()
            .interactive(false)
            .build()
            .unwrap_err();
        assert_eq!(err, ConfigError::MissingPassword);

        let err = ProvisioningConfig::builder()
            .interactive(false)
            .password(PasswordSource::Environment(Secret::new("")))
            .build()
            .unwrap_err();
        assert_eq!(err, ConfigError::MissingPassword);
    }

    #[test]
    fn test_password_with_line_break_is_rejected() {
        for password in ["pw\nroot:owned", "pw\r", "\nroot:owned"] {
            let err = ProvisioningConfig::builder()
                .interactive(false)
                .password(PasswordSource::Environment(Secret::new(password)))
                .build()
                .unwrap_err();
            assert_eq!(err, ConfigError::InvalidPassword);
        }

        assert!(
            ProvisioningConfig::builder()
                .interactive(false)
                .password(PasswordSource::Environment(Secret::new("a:b c")))
                .build()
                .is_ok()
        );
    }

    #[test]
    fn test_non_interactive_disables_ssh_key() {
        let config = ProvisioningConfig::builder()
            .interactive(false)
            .add_ssh_key(true)
            .password(PasswordSource::Environment(Secret::new("hunter2")))
            .build()
            .unwrap();

        assert!(!config.add_ssh_key);
    }

    #[test]
    fn test_secret_is_redacted() {
        let config = ProvisioningConfig::builder()
            .interactive(false)
            .password(PasswordSource::Environment(Secret::new("hunter2")))
            .build()
            .unwrap();

        let debug = format!("{config:?}");
        assert!(!debug.contains("hunter2"));
        assert!(debug.contains("Secret(***)"));
    }
}
