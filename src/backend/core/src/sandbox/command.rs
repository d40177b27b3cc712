//! Container command construction.
//!
//! [`ContainerInvocation::build`] is a pure function of the runtime binary,
//! the registry domain, the plugin coordinate and its [`SandboxConfig`].
//! Map-valued settings are emitted in key order so the same config always
//! yields the same argument list. A per-run container name is attached
//! separately with [`ContainerInvocation::named`].

use std::fmt;
use std::process::Stdio;

use tokio::process::Command;

use super::SandboxConfig;
use crate::identity::PluginCoordinate;

/// `<domain>/<group>/<name>:<version>`
pub fn image_reference(registry_domain: &str, coordinate: &PluginCoordinate) -> String {
    format!(
        "{}/{}/{}:{}",
        registry_domain.trim_end_matches('/'),
        coordinate.group,
        coordinate.name,
        coordinate.version
    )
}

/// A fully-resolved container run command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerInvocation {
    program: String,
    args: Vec<String>,
    image: String,
    container: Option<String>,
}

impl ContainerInvocation {
    pub fn build(
        runtime: &str,
        registry_domain: &str,
        coordinate: &PluginCoordinate,
        sandbox: &SandboxConfig,
    ) -> Self {
        let image = image_reference(registry_domain, coordinate);

        let mut args: Vec<String> = vec!["run".into(), "--rm".into(), "-i".into()];
        args.push(format!("--network={}", sandbox.network()));
        args.push(format!("--memory={}", sandbox.memory()));
        args.push(format!("--cpus={}", sandbox.cpus()));

        if let Some(user) = sandbox.user() {
            args.push(format!("--user={user}"));
        }
        if let Some(dir) = sandbox.working_dir() {
            args.push(format!("--workdir={dir}"));
        }
        if sandbox.read_only {
            args.push("--read-only".into());
        }

        for (key, value) in &sandbox.env {
            args.push("--env".into());
            args.push(format!("{key}={value}"));
        }

        for (path, opts) in &sandbox.tmpfs {
            args.push("--tmpfs".into());
            if opts.is_empty() {
                args.push(path.clone());
            } else {
                args.push(format!("{path}:{opts}"));
            }
        }

        args.push(image.clone());

        Self {
            program: runtime.to_string(),
            args,
            image,
            container: None,
        }
    }

    /// Give the container an explicit name so it can be removed from the
    /// daemon side if the run is torn down.
    pub fn named(mut self, container: impl Into<String>) -> Self {
        let container = container.into();
        let flag = format!("--name={container}");
        match self.container.replace(container) {
            // `run --rm -i` always leads the list.
            None => self.args.insert(3, flag),
            Some(_) => {
                if let Some(arg) = self.args.iter_mut().find(|a| a.starts_with("--name=")) {
                    *arg = flag;
                }
            }
        }
        self
    }

    /// The container CLI binary (`docker`, `podman`, ...).
    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn args(&self) -> &[String] {
        &self.args
    }

    pub fn image(&self) -> &str {
        &self.image
    }

    pub fn container_name(&self) -> Option<&str> {
        self.container.as_deref()
    }

    /// A [`Command`] ready for stdio wiring. The child is killed if the
    /// handle is dropped.
    pub fn command(&self) -> Command {
        let mut command = Command::new(&self.program);
        command.args(&self.args).kill_on_drop(true);
        command
    }

    /// `<runtime> rm -f <name>` for a named invocation. Killing the CLI
    /// client does not stop the container it started.
    pub fn remove_command(&self) -> Option<Command> {
        let name = self.container.as_deref()?;
        let mut command = Command::new(&self.program);
        command
            .args(["rm", "-f", name])
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true);
        Some(command)
    }

    /// The argument list with environment values masked, for logs.
    pub fn redacted_args(&self) -> Vec<String> {
        let mut out = Vec::with_capacity(self.args.len());
        let mut after_env = false;
        for arg in &self.args {
            if after_env {
                let key = arg.split_once('=').map_or(arg.as_str(), |(k, _)| k);
                out.push(format!("{key}=***"));
            } else {
                out.push(arg.clone());
            }
            after_env = arg == "--env";
        }
        out
    }
}

/// Renders the redacted command line.
impl fmt::Display for ContainerInvocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in self.redacted_args() {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════════════════════════
