//! Container runtime installation

use std::collections::BTreeMap;
use std::path::Path;

use tera::{Context, Tera};
use tracing::debug;

use super::{Outcome, Step, StepContext, StepError, apt_get, apt_install};
use crate::host::CommandSpec;

const SOURCE_TEMPLATE: &str = include_str!("../../templates/apt-source.list.tera");

const KEYRING_DIR: &str = "/etc/apt/keyrings";

const UBUNTU_CODENAME_KEYS: &[&str] = &["UBUNTU_CODENAME", "VERSION_CODENAME"];
const DEBIAN_CODENAME_KEYS: &[&str] = &["VERSION_CODENAME"];

/// External apt repository signed by its own key
#[derive(Debug, Clone)]
pub struct AptSource {
    /// Name of the `sources.list.d` entry
    pub name: String,
    /// URL of the signing key
    pub key_url: String,
    /// Where the signing key is stored
    pub keyring_path: String,
    /// Repository base URL
    pub url: String,
    /// Repository components
    pub components: String,
}

impl AptSource {
    /// Docker's official repository for a distribution (`debian` or `ubuntu`)
    pub fn docker(distro: &str) -> Self {
        Self {
            name: "docker".into(),
            key_url: format!("https://download.docker.com/linux/{distro}/gpg"),
            keyring_path: format!("{KEYRING_DIR}/docker.asc"),
            url: format!("https://download.docker.com/linux/{distro}"),
            components: "stable".into(),
        }
    }

    /// Path of the `sources.list.d` entry
    pub fn list_path(&self) -> String {
        format!("/etc/apt/sources.list.d/{}.list", self.name)
    }

    /// Render the one-line source entry
    pub fn render(&self, arch: &str, codename: &str) -> Result<String, tera::Error> {
        let mut context = Context::new();
        context.insert("arch", arch);
        context.insert("keyring", &self.keyring_path);
        context.insert("url", &self.url);
        context.insert("codename", codename);
        context.insert("components", &self.components);
        Tera::one_off(SOURCE_TEMPLATE, &context, false)
    }
}

/// Repository flavour and release codename for a Debian-family host
///
/// Derivatives map to their upstream: anything Ubuntu-like uses the Ubuntu
/// repository and its codename.
fn repository_target(os_release: &BTreeMap<String, String>) -> Option<(&'static str, String)> {
    let id = os_release.get("ID").map(String::as_str).unwrap_or_default();
    let like = os_release
        .get("ID_LIKE")
        .map(String::as_str)
        .unwrap_or_default();

    let ubuntu = id == "ubuntu" || like.split_whitespace().any(|l| l == "ubuntu");
    let (distro, keys) = if ubuntu {
        ("ubuntu", UBUNTU_CODENAME_KEYS)
    } else {
        ("debian", DEBIAN_CODENAME_KEYS)
    };

    keys.iter()
        .find_map(|k| os_release.get(*k).filter(|v| !v.is_empty()))
        .map(|codename| (distro, codename.clone()))
}

/// Install Docker Engine from Docker's repository
#[derive(Debug, Clone)]
pub struct InstallDocker {
    /// Distribution packages that conflict with Docker Engine
    pub legacy: Vec<String>,
    /// Engine and plugin packages
    pub packages: Vec<String>,
    /// Group granting access to the daemon socket
    pub group: String,
}

impl InstallDocker {
    /// Docker Engine with the buildx and compose plugins
    pub fn new() -> Self {
        let strings = |items: &[&str]| -> Vec<String> {
            items.iter().map(|s| (*s).to_string()).collect()
        };
        Self {
            legacy: strings(&[
                "docker.io",
                "docker-doc",
                "docker-compose",
                "docker-compose-v2",
                "podman-docker",
                "containerd",
                "runc",
            ]),
            packages: strings(&[
                "docker-ce",
                "docker-ce-cli",
                "containerd.io",
                "docker-buildx-plugin",
                "docker-compose-plugin",
            ]),
            group: "docker".into(),
        }
    }

    fn remove_legacy(&self, ctx: &mut StepContext<'_>) {
        for pkg in &self.legacy {
            match ctx.host.run(&apt_get(["remove", "-y", pkg.as_str()])) {
                Ok(out) if out.success() => {}
                Ok(out) => ctx.note(format!("could not remove {pkg} (exit {})", out.code)),
                Err(e) => ctx.note(format!("could not remove {pkg}: {e}")),
            }
        }
    }

    fn ensure_keyring(ctx: &StepContext<'_>, source: &AptSource) -> Result<(), StepError> {
        if ctx.host.exists(Path::new(&source.keyring_path)) {
            debug!(keyring = %source.keyring_path, "signing key already present");
            return Ok(());
        }

        ctx.host.run_checked(&CommandSpec::new(
            "curl",
            [
                "-fsSL",
                source.key_url.as_str(),
                "-o",
                source.keyring_path.as_str(),
            ],
        ))?;
        ctx.host.run_checked(&CommandSpec::new(
            "chmod",
            ["a+r", source.keyring_path.as_str()],
        ))?;
        Ok(())
    }
}

impl Default for InstallDocker {
    fn default() -> Self {
        Self::new()
    }
}

impl Step for InstallDocker {
    fn name(&self) -> &'static str {
        "Install Docker"
    }

    fn run(&self, ctx: &mut StepContext<'_>) -> Result<Outcome, StepError> {
        if !ctx.config.install_docker {
            return Ok(Outcome::Skipped("not requested (--with-docker)".into()));
        }

        self.remove_legacy(ctx);

        ctx.host.run_checked(&apt_install(&["ca-certificates", "curl"]))?;
        ctx.host.run_checked(&CommandSpec::new(
            "install",
            ["-m", "0755", "-d", KEYRING_DIR],
        ))?;

        let (distro, codename) = repository_target(&ctx.state.os_release).ok_or_else(|| {
            StepError::Precondition("cannot determine the release codename".into())
        })?;
        let source = AptSource::docker(distro);
        Self::ensure_keyring(ctx, &source)?;

        let arch = ctx
            .host
            .run_checked(&CommandSpec::new("dpkg", ["--print-architecture"]))?
            .stdout
            .trim()
            .to_string();
        let line = source.render(&arch, &codename)?;
        ctx.host.write_file(Path::new(&source.list_path()), &line, Some(0o644))?;

        ctx.host.run_checked(&apt_get(["update"]))?;
        ctx.host.run_checked(&apt_install(&self.packages))?;
        ctx.host.run_checked(&CommandSpec::new(
            "systemctl",
            ["enable", "--now", "docker"],
        ))?;

        let user = ctx.config.user.as_str();
        if !ctx.group_exists(&self.group)? {
            tracing::warn!(group = %self.group, "group missing after Docker install");
            return Ok(Outcome::Degraded(format!(
                "Docker installed, but group {} is missing; {user} not added",
                self.group
            )));
        }

        ctx.host.run_checked(&CommandSpec::new(
            "usermod",
            ["-aG", self.group.as_str(), user],
        ))?;
        Ok(Outcome::Done(format!(
            "Docker installed for {distro} {codename}, {user} added to {}",
            self.group
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::parse_os_release;

    #[test]
    fn test_docker_source_line() {
        let line = AptSource::docker("ubuntu").render("arm64", "noble").unwrap();

        assert_eq!(
            line,
            "deb [arch=arm64 signed-by=/etc/apt/keyrings/docker.asc] \
             https://download.docker.com/linux/ubuntu noble stable\n"
        );
    }

    #[test]
    fn test_repository_target_for_derivatives() {
        let debian = parse_os_release("ID=debian\nVERSION_CODENAME=bookworm\n");
        let mint = parse_os_release(
            "ID=linuxmint\nID_LIKE=\"ubuntu debian\"\nVERSION_CODENAME=wilma\nUBUNTU_CODENAME=noble\n",
        );
        let sid = parse_os_release("ID=debian\n");

        assert_eq!(
            repository_target(&debian),
            Some(("debian", "bookworm".to_string()))
        );
        assert_eq!(
            repository_target(&mint),
            Some(("ubuntu", "noble".to_string()))
        );
        assert_eq!(repository_target(&sid), None);
    }
}
