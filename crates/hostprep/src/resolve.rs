//! Configuration resolution
//!
//! Merges the optional defaults file, command-line flags and environment
//! into one immutable [`ProvisioningConfig`]. Nothing here touches the host.

use std::ffi::OsString;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use clap::Parser;
use clap::error::{ContextKind, ContextValue, ErrorKind};
use console::style;
use hostprep_provision::config::{DEFAULT_LOG_FILE, DEFAULT_USER, PASSWORD_ENV};
use hostprep_provision::{
    ConfigError, PasswordSource, Prompt, PromptError, ProvisioningConfig, Secret,
};
use regex::Regex;
use serde::Deserialize;

/// Environment variable overriding the defaults file location
pub const CONFIG_ENV: &str = "HOSTPREP_CONFIG";

/// Defaults file used when `$HOSTPREP_CONFIG` is unset
pub const DEFAULT_CONFIG_PATH: &str = "/etc/hostprep/config.toml";

/// `useradd`'s default `NAME_REGEX`
static USERNAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z_][a-z0-9_-]*[$]?$").expect("valid regex"));

const MAX_USERNAME_LEN: usize = 32;

#[derive(Parser, Debug)]
#[command(
    name = "hostprep",
    about = "Bootstrap a fresh Debian/Ubuntu host",
    disable_version_flag = true,
    args_override_self = true
)]
struct Args {
    /// Account to create or reuse
    #[arg(long, value_name = "NAME")]
    user: Option<String>,

    /// Do not add the user to the sudo group
    #[arg(long)]
    no_sudo: bool,

    /// Install Docker Engine
    #[arg(long)]
    with_docker: bool,

    /// Install zsh and make it the login shell
    #[arg(long)]
    with_zsh: bool,

    /// Skip the development packages
    #[arg(long)]
    no_dev: bool,

    /// Never prompt; the password is read from $HOSTPREP_PASSWORD
    #[arg(long)]
    non_interactive: bool,
}

/// Defaults file structure
/// Path: `$HOSTPREP_CONFIG`, else /etc/hostprep/config.toml
#[derive(Debug, Default, Deserialize)]
pub struct Defaults {
    #[serde(default)]
    pub user: UserDefaults,
    #[serde(default)]
    pub logging: LoggingDefaults,
    #[serde(default)]
    pub packages: PackageDefaults,
}

#[derive(Debug, Default, Deserialize)]
pub struct UserDefaults {
    pub name: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct LoggingDefaults {
    /// Empty string disables the log file
    pub file: Option<PathBuf>,
}

#[derive(Debug, Default, Deserialize)]
pub struct PackageDefaults {
    pub dev: Option<Vec<String>>,
    pub greeting: Option<String>,
}

/// What the command line asked for
#[derive(Debug)]
pub enum Resolution {
    /// Print usage and exit successfully
    Help(String),
    /// Provision with this configuration
    Run(ProvisioningConfig),
}

/// Location of the defaults file
pub fn defaults_path(env: impl Fn(&str) -> Option<String>) -> PathBuf {
    env(CONFIG_ENV)
        .filter(|p| !p.is_empty())
        .map_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH), PathBuf::from)
}

/// Load the defaults file; a missing file yields built-in defaults
pub fn load_defaults(path: &Path) -> Result<Defaults, ConfigError> {
    let failed = |reason: String| ConfigError::Defaults {
        path: path.display().to_string(),
        reason,
    };

    let defaults: Defaults = match fs::read_to_string(path) {
        Ok(content) => toml::from_str(&content).map_err(|e| failed(e.to_string()))?,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Defaults::default()),
        Err(e) => return Err(failed(e.to_string())),
    };

    // An empty tool name would match every startup file
    if let Some(greeting) = &defaults.packages.greeting
        && greeting.trim().is_empty()
    {
        return Err(failed("packages.greeting must not be empty".into()));
    }
    Ok(defaults)
}

/// Whether `name` is acceptable to `useradd`
pub fn is_valid_username(name: &str) -> bool {
    name.len() <= MAX_USERNAME_LEN && USERNAME_RE.is_match(name)
}

/// Resolve defaults, flags and environment into a run configuration
///
/// `argv` includes the program name. The defaults file is only loaded once
/// the flags parse and do not ask for help. Fails before anything is written
/// when a non-interactive run has no password.
pub fn resolve<I, T>(
    defaults: impl FnOnce() -> Result<Defaults, ConfigError>,
    argv: I,
    env: impl Fn(&str) -> Option<String>,
) -> Result<Resolution, ConfigError>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let args = match Args::try_parse_from(argv) {
        Ok(args) => args,
        Err(err) => return parse_failure(&err),
    };
    let defaults = defaults()?;

    let user = args
        .user
        .or_else(|| defaults.user.name.clone())
        .unwrap_or_else(|| DEFAULT_USER.to_string());
    if !is_valid_username(&user) {
        return Err(ConfigError::InvalidUsername(user));
    }

    let interactive = !args.non_interactive;
    let password = if interactive {
        PasswordSource::Prompted
    } else {
        env(PASSWORD_ENV).map_or(PasswordSource::Prompted, |p| {
            PasswordSource::Environment(Secret::new(p))
        })
    };

    let log_file = match &defaults.logging.file {
        None => Some(PathBuf::from(DEFAULT_LOG_FILE)),
        Some(p) if p.as_os_str().is_empty() => None,
        Some(p) => Some(p.clone()),
    };

    let mut builder = ProvisioningConfig::builder()
        .user(user)
        .grant_sudo(!args.no_sudo)
        .install_dev(!args.no_dev)
        .install_docker(args.with_docker)
        .install_zsh(args.with_zsh)
        .interactive(interactive)
        .password(password)
        .log_file(log_file);
    if let Some(dev) = &defaults.packages.dev {
        builder = builder.dev_packages(dev.iter().cloned());
    }
    if let Some(greeting) = &defaults.packages.greeting {
        builder = builder.greeting(greeting.clone());
    }

    builder.build().map(Resolution::Run)
}

fn parse_failure(err: &clap::Error) -> Result<Resolution, ConfigError> {
    let rendered = err.render().to_string();
    match err.kind() {
        ErrorKind::DisplayHelp => Ok(Resolution::Help(rendered)),
        ErrorKind::UnknownArgument => {
            let flag = match err.get(ContextKind::InvalidArg) {
                Some(ContextValue::String(flag)) => flag.clone(),
                _ => first_line(&rendered),
            };
            Err(ConfigError::UnknownFlag(flag))
        }
        _ => Err(ConfigError::InvalidArgument(first_line(&rendered))),
    }
}

fn first_line(rendered: &str) -> String {
    let line = rendered.lines().next().unwrap_or_default();
    line.strip_prefix("error: ").unwrap_or(line).trim().to_string()
}

/// Confirm the account settings with the operator
///
/// The username is asked again until it is valid. Non-interactive configs
/// are returned unchanged.
pub fn elicit(
    config: ProvisioningConfig,
    prompt: &mut dyn Prompt,
) -> Result<ProvisioningConfig, PromptError> {
    if !config.interactive {
        return Ok(config);
    }

    let user = loop {
        let answer = prompt.input("Username", &config.user)?;
        let answer = answer.trim();
        if is_valid_username(answer) {
            break answer.to_string();
        }
        eprintln!(
            "{} {}",
            style("!").yellow(),
            ConfigError::InvalidUsername(answer.to_string())
        );
    };

    let grant_sudo = prompt.confirm(&format!("Grant {user} sudo access?"), config.grant_sudo)?;
    let add_ssh_key = prompt.confirm("Add an SSH public key?", true)?;

    Ok(ProvisioningConfig {
        user,
        grant_sudo,
        add_ssh_key,
        ..config
    })
}
