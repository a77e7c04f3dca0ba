//! Side-effect boundary
//!
//! Every step that reads or mutates host state goes through the [`Host`]
//! trait. [`SystemHost`] talks to the real machine; tests substitute a fake
//! that records calls and keeps files in memory.

use std::collections::BTreeMap;
use std::fmt;
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::os::unix::fs::{OpenOptionsExt, PermissionsExt};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use thiserror::Error;
use tracing::{debug, trace};

/// Location of the OS identification data
pub const OS_RELEASE_PATH: &str = "/etc/os-release";

/// A command to run on the host
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    /// Program name, resolved through `PATH`
    pub program: String,
    /// Arguments
    pub args: Vec<String>,
    /// Extra environment variables on top of the inherited environment
    pub env: Vec<(String, String)>,
    /// Data fed to the command's stdin (never logged)
    pub stdin: Option<String>,
}

impl CommandSpec {
    /// Create a new command
    pub fn new(
        program: impl Into<String>,
        args: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
            env: Vec::new(),
            stdin: None,
        }
    }

    /// Add an environment variable
    #[must_use]
    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    /// Feed `input` to stdin
    #[must_use]
    pub fn with_stdin(mut self, input: impl Into<String>) -> Self {
        self.stdin = Some(input.into());
        self
    }

    /// Full command line, program included
    pub fn argv(&self) -> Vec<&str> {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect()
    }
}

impl fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.argv().join(" "))
    }
}

/// Exit code and captured output of a finished command
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// Exit code (`-1` when killed by a signal)
    pub code: i32,
    /// Captured stdout
    pub stdout: String,
    /// Captured stderr
    pub stderr: String,
}

impl CommandOutput {
    /// Whether the command exited with status 0
    pub fn success(&self) -> bool {
        self.code == 0
    }
}

/// Errors raised at the side-effect boundary
#[derive(Debug, Error)]
pub enum HostError {
    /// The command could not be started or waited on
    #[error("failed to run {command}: {source}")]
    Spawn {
        command: String,
        #[source]
        source: io::Error,
    },

    /// The command ran and exited non-zero
    #[error("{command} exited with status {code}{}", stderr_suffix(.stderr))]
    Failed {
        command: String,
        code: i32,
        stderr: String,
    },

    /// A filesystem operation failed
    #[error("failed to {action} {}: {source}", .path.display())]
    Io {
        action: &'static str,
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

fn stderr_suffix(stderr: &str) -> String {
    let stderr = stderr.trim();
    if stderr.is_empty() {
        String::new()
    } else {
        format!(": {stderr}")
    }
}

/// The narrow interface through which provisioning touches the machine
pub trait Host {
    /// Run a command to completion, capturing its output
    fn run(&self, spec: &CommandSpec) -> Result<CommandOutput, HostError>;

    /// Read a file, `None` if it does not exist
    fn read_file(&self, path: &Path) -> Result<Option<String>, HostError>;

    /// Create or replace a file. `mode` applies to the file either way.
    fn write_file(&self, path: &Path, contents: &str, mode: Option<u32>) -> Result<(), HostError>;

    /// Append to a file, creating it if needed
    fn append_file(&self, path: &Path, contents: &str) -> Result<(), HostError>;

    /// Whether a file or directory exists
    fn exists(&self, path: &Path) -> bool;

    /// Whether the effective caller is root
    fn is_privileged(&self) -> bool;

    /// OS identification fields from `/etc/os-release`
    fn os_release(&self) -> Result<BTreeMap<String, String>, HostError> {
        Ok(self
            .read_file(Path::new(OS_RELEASE_PATH))?
            .map(|content| parse_os_release(&content))
            .unwrap_or_default())
    }

    /// Run a command, turning a non-zero exit into [`HostError::Failed`]
    fn run_checked(&self, spec: &CommandSpec) -> Result<CommandOutput, HostError> {
        let output = self.run(spec)?;
        if output.success() {
            Ok(output)
        } else {
            Err(HostError::Failed {
                command: spec.to_string(),
                code: output.code,
                stderr: output.stderr,
            })
        }
    }
}

/// Parse `KEY=value` lines as found in `/etc/os-release`
///
/// Values may be wrapped in single or double quotes. Comments and malformed
/// lines are ignored.
pub fn parse_os_release(content: &str) -> BTreeMap<String, String> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter_map(|line| line.split_once('='))
        .map(|(key, value)| {
            let value = value.trim();
            let value = value
                .strip_prefix('"')
                .and_then(|v| v.strip_suffix('"'))
                .or_else(|| value.strip_prefix('\'').and_then(|v| v.strip_suffix('\'')))
                .unwrap_or(value);
            (key.trim().to_string(), value.to_string())
        })
        .collect()
}

/// The real machine
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemHost;

impl SystemHost {
    /// Create a new system host
    pub fn new() -> Self {
        Self
    }
}

impl Host for SystemHost {
    fn run(&self, spec: &CommandSpec) -> Result<CommandOutput, HostError> {
        debug!(command = %spec, "running command");

        let spawn_error = |source| HostError::Spawn {
            command: spec.to_string(),
            source,
        };

        let mut child = Command::new(&spec.program)
            .args(&spec.args)
            .envs(spec.env.iter().map(|(k, v)| (k, v)))
            .stdin(if spec.stdin.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(spawn_error)?;

        if let (Some(input), Some(mut stdin)) = (&spec.stdin, child.stdin.take()) {
            stdin.write_all(input.as_bytes()).map_err(spawn_error)?;
        }

        let output = child.wait_with_output().map_err(spawn_error)?;
        let result = CommandOutput {
            code: output.status.code().unwrap_or(-1),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        };

        debug!(command = %spec, code = result.code, "command finished");
        if !result.stdout.trim().is_empty() {
            trace!(command = %spec, stdout = %result.stdout.trim());
        }
        if !result.stderr.trim().is_empty() {
            debug!(command = %spec, stderr = %result.stderr.trim());
        }

        Ok(result)
    }

    fn read_file(&self, path: &Path) -> Result<Option<String>, HostError> {
        match fs::read_to_string(path) {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(source) => Err(HostError::Io {
                action: "read",
                path: path.to_path_buf(),
                source,
            }),
        }
    }

    fn write_file(&self, path: &Path, contents: &str, mode: Option<u32>) -> Result<(), HostError> {
        debug!(path = %path.display(), "writing file");
        let io_error = |action| {
            move |source| HostError::Io {
                action,
                path: path.to_path_buf(),
                source,
            }
        };

        let mut file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .mode(mode.unwrap_or(0o644))
            .open(path)
            .map_err(io_error("open"))?;
        file.write_all(contents.as_bytes())
            .map_err(io_error("write"))?;

        // `mode` only applies at creation; enforce it on existing files too
        if let Some(mode) = mode {
            fs::set_permissions(path, fs::Permissions::from_mode(mode))
                .map_err(io_error("set permissions on"))?;
        }
        Ok(())
    }

    fn append_file(&self, path: &Path, contents: &str) -> Result<(), HostError> {
        debug!(path = %path.display(), "appending to file");
        let io_error = |action| {
            move |source| HostError::Io {
                action,
                path: path.to_path_buf(),
                source,
            }
        };

        OpenOptions::new()
            .append(true)
            .create(true)
            .open(path)
            .map_err(io_error("open"))?
            .write_all(contents.as_bytes())
            .map_err(io_error("append to"))
    }

    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn is_privileged(&self) -> bool {
        rustix::process::geteuid().is_root()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_os_release_strips_quotes() {
        let fields = parse_os_release(
            "# comment\nNAME=\"Ubuntu\"\nID=ubuntu\nID_LIKE=debian\nVERSION_CODENAME='noble'\n\nbroken line\n",
        );

        assert_eq!(fields.get("NAME").map(String::as_str), Some("Ubuntu"));
        assert_eq!(fields.get("ID").map(String::as_str), Some("ubuntu"));
        assert_eq!(fields.get("ID_LIKE").map(String::as_str), Some("debian"));
        assert_eq!(
            fields.get("VERSION_CODENAME").map(String::as_str),
            Some("noble")
        );
        assert_eq!(fields.len(), 4);
    }

    #[test]
    fn test_command_spec_display_hides_stdin() {
        let spec = CommandSpec::new("chpasswd", Vec::<String>::new()).with_stdin("alice:secret");

        assert_eq!(spec.to_string(), "chpasswd");
        assert!(!format!("{spec}").contains("secret"));
    }

    #[test]
    fn test_system_host_runs_commands() {
        let host = SystemHost::new();

        let out = host
            .run(&CommandSpec::new("sh", ["-c", "printf hello; exit 3"]))
            .unwrap();
        assert_eq!(out.code, 3);
        assert_eq!(out.stdout, "hello");

        let err = host
            .run_checked(&CommandSpec::new("sh", ["-c", "echo boom >&2; exit 1"]))
            .unwrap_err();
        assert!(err.to_string().contains("boom"));
    }

    #[test]
    fn test_system_host_feeds_stdin() {
        let host = SystemHost::new();

        let out = host
            .run(&CommandSpec::new("cat", Vec::<String>::new()).with_stdin("piped"))
            .unwrap();
        assert!(out.success());
        assert_eq!(out.stdout, "piped");
    }

    #[test]
    fn test_system_host_file_operations() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("authorized_keys");
        let host = SystemHost::new();

        assert!(!host.exists(&path));
        assert_eq!(host.read_file(&path).unwrap(), None);

        host.append_file(&path, "first\n").unwrap();
        host.append_file(&path, "second\n").unwrap();
        assert_eq!(host.read_file(&path).unwrap().unwrap(), "first\nsecond\n");

        host.write_file(&path, "replaced\n", Some(0o600)).unwrap();
        assert_eq!(host.read_file(&path).unwrap().unwrap(), "replaced\n");
        let mode = fs::metadata(&path).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode, 0o600);
    }
}
