//! Shared fakes for sequencer tests.

use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::path::{Path, PathBuf};

use hostprep_provision::{
    CommandOutput, CommandSpec, Host, HostError, PasswordSource, Prompt, PromptError,
    ProvisioningConfig, Secret,
};

pub const UBUNTU_OS_RELEASE: &str = "NAME=\"Ubuntu\"\nPRETTY_NAME=\"Ubuntu 24.04 LTS\"\nID=ubuntu\nID_LIKE=debian\nVERSION_CODENAME=noble\nUBUNTU_CODENAME=noble\n";

/// In-memory host that records every command.
///
/// Users, groups and files live in memory; `useradd` creates users and
/// installing `docker-ce` creates the `docker` group, as on a real system.
#[allow(dead_code)]
pub struct FakeHost {
    pub privileged: bool,
    pub files: RefCell<BTreeMap<PathBuf, String>>,
    pub users: RefCell<BTreeSet<String>>,
    pub groups: RefCell<BTreeSet<String>>,
    calls: RefCell<Vec<String>>,
    /// Data fed to stdin, one entry per command that had any
    stdin: RefCell<Vec<String>>,
    /// Command lines containing any of these substrings exit with 100.
    failing: Vec<String>,
    /// Whether installing Docker creates its group.
    pub docker_creates_group: bool,
}

#[allow(dead_code)]
impl FakeHost {
    pub fn ubuntu() -> Self {
        let host = Self {
            privileged: true,
            files: RefCell::new(BTreeMap::new()),
            users: RefCell::new(BTreeSet::new()),
            groups: RefCell::new(["sudo".to_string()].into()),
            calls: RefCell::new(Vec::new()),
            stdin: RefCell::new(Vec::new()),
            failing: Vec::new(),
            docker_creates_group: true,
        };
        host.put_file("/etc/os-release", UBUNTU_OS_RELEASE);
        host
    }

    pub fn with_user(self, user: &str) -> Self {
        self.users.borrow_mut().insert(user.to_string());
        self
    }

    pub fn without_group(self, group: &str) -> Self {
        self.groups.borrow_mut().remove(group);
        self
    }

    pub fn with_group(self, group: &str) -> Self {
        self.groups.borrow_mut().insert(group.to_string());
        self
    }

    pub fn unprivileged(mut self) -> Self {
        self.privileged = false;
        self
    }

    pub fn failing_on(mut self, pattern: &str) -> Self {
        self.failing.push(pattern.to_string());
        self
    }

    pub fn put_file(&self, path: &str, content: &str) {
        self.files
            .borrow_mut()
            .insert(PathBuf::from(path), content.to_string());
    }

    pub fn file(&self, path: &str) -> Option<String> {
        self.files.borrow().get(Path::new(path)).cloned()
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.borrow().clone()
    }

    pub fn stdin(&self) -> Vec<String> {
        self.stdin.borrow().clone()
    }

    pub fn clear_calls(&self) {
        self.calls.borrow_mut().clear();
    }

    pub fn ran(&self, prefix: &str) -> bool {
        self.calls.borrow().iter().any(|c| c.starts_with(prefix))
    }

    pub fn position(&self, prefix: &str) -> Option<usize> {
        self.calls.borrow().iter().position(|c| c.starts_with(prefix))
    }
}

impl Host for FakeHost {
    fn run(&self, spec: &CommandSpec) -> Result<CommandOutput, HostError> {
        let line = spec.to_string();
        self.calls.borrow_mut().push(line.clone());
        if let Some(input) = &spec.stdin {
            self.stdin.borrow_mut().push(input.clone());
        }

        if self.failing.iter().any(|p| line.contains(p.as_str())) {
            return Ok(CommandOutput {
                code: 100,
                stdout: String::new(),
                stderr: format!("E: simulated failure of {line}"),
            });
        }

        let args: Vec<&str> = spec.args.iter().map(String::as_str).collect();
        let status = |ok: bool| CommandOutput {
            code: i32::from(!ok),
            ..CommandOutput::default()
        };

        let output = match (spec.program.as_str(), args.as_slice()) {
            ("id", ["-u", user]) => status(self.users.borrow().contains(*user)),
            ("useradd", [.., user]) => {
                self.users.borrow_mut().insert((*user).to_string());
                status(true)
            }
            ("getent", ["group", group]) => status(self.groups.borrow().contains(*group)),
            ("getent", ["passwd", user]) => {
                if self.users.borrow().contains(*user) {
                    CommandOutput {
                        stdout: format!("{user}:x:1000:1000::/home/{user}:/bin/bash\n"),
                        ..CommandOutput::default()
                    }
                } else {
                    status(false)
                }
            }
            ("dpkg", ["--print-architecture"]) => CommandOutput {
                stdout: "amd64\n".into(),
                ..CommandOutput::default()
            },
            ("apt-get", ["install", "-y", packages @ ..]) => {
                if self.docker_creates_group && packages.contains(&"docker-ce") {
                    self.groups.borrow_mut().insert("docker".into());
                }
                status(true)
            }
            _ => status(true),
        };
        Ok(output)
    }

    fn read_file(&self, path: &Path) -> Result<Option<String>, HostError> {
        Ok(self.files.borrow().get(path).cloned())
    }

    fn write_file(&self, path: &Path, contents: &str, _mode: Option<u32>) -> Result<(), HostError> {
        self.files
            .borrow_mut()
            .insert(path.to_path_buf(), contents.to_string());
        Ok(())
    }

    fn append_file(&self, path: &Path, contents: &str) -> Result<(), HostError> {
        self.files
            .borrow_mut()
            .entry(path.to_path_buf())
            .or_default()
            .push_str(contents);
        Ok(())
    }

    fn exists(&self, path: &Path) -> bool {
        self.files.borrow().contains_key(path)
    }

    fn is_privileged(&self) -> bool {
        self.privileged
    }
}

/// Canned operator answers, consumed in order.
#[derive(Debug)]
#[allow(dead_code)]
pub enum Answer {
    Input(String),
    Confirm(bool),
    Password(String),
    Multiline(String),
}

#[derive(Debug, Default)]
pub struct ScriptedPrompt {
    answers: VecDeque<Answer>,
    pub asked: Vec<String>,
}

#[allow(dead_code)]
impl ScriptedPrompt {
    pub fn new(answers: impl IntoIterator<Item = Answer>) -> Self {
        Self {
            answers: answers.into_iter().collect(),
            asked: Vec::new(),
        }
    }

    pub fn remaining(&self) -> usize {
        self.answers.len()
    }

    fn next(&mut self, message: &str) -> Answer {
        self.asked.push(message.to_string());
        self.answers
            .pop_front()
            .unwrap_or_else(|| panic!("no scripted answer for {message:?}"))
    }
}

impl Prompt for ScriptedPrompt {
    fn input(&mut self, message: &str, _default: &str) -> Result<String, PromptError> {
        match self.next(message) {
            Answer::Input(s) => Ok(s),
            other => panic!("expected input for {message:?}, got {other:?}"),
        }
    }

    fn confirm(&mut self, message: &str, _default: bool) -> Result<bool, PromptError> {
        match self.next(message) {
            Answer::Confirm(b) => Ok(b),
            other => panic!("expected confirm for {message:?}, got {other:?}"),
        }
    }

    fn password(&mut self, message: &str) -> Result<String, PromptError> {
        match self.next(message) {
            Answer::Password(s) => Ok(s),
            other => panic!("expected password for {message:?}, got {other:?}"),
        }
    }

    fn multiline(&mut self, message: &str) -> Result<String, PromptError> {
        match self.next(message) {
            Answer::Multiline(s) => Ok(s),
            other => panic!("expected multiline for {message:?}, got {other:?}"),
        }
    }
}

/// Non-interactive config for `alice` with a password from the environment.
#[allow(dead_code)]
pub fn unattended() -> hostprep_provision::config::ProvisioningConfigBuilder {
    ProvisioningConfig::builder()
        .user("alice")
        .interactive(false)
        .log_file(None)
        .password(PasswordSource::Environment(Secret::new("hunter2")))
}
