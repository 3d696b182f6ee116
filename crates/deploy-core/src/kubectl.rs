//! `kubectl` invocations.

use std::path::Path;
use std::time::Duration;

use crate::config::RunConfig;
use crate::error::Result;
use crate::process::{CommandOutput, CommandSpec, ProcessRunner};

/// Builds and runs `kubectl` commands against the configured cluster.
pub struct Kubectl<'a> {
    config: &'a RunConfig,
    runner: &'a dyn ProcessRunner,
}

impl<'a> Kubectl<'a> {
    pub fn new(config: &'a RunConfig, runner: &'a dyn ProcessRunner) -> Self {
        Self { config, runner }
    }

    /// Base command, pinned to the generated kubeconfig when one exists.
    fn command(&self) -> CommandSpec {
        let cmd = CommandSpec::new("kubectl");
        match &self.config.kubeconfig {
            Some(path) => cmd.arg("--kubeconfig").arg(path.to_string_lossy()),
            None => cmd,
        }
    }

    pub fn apply_command(&self, manifest: &Path) -> CommandSpec {
        self.command()
            .args(["apply", "-f"])
            .arg(manifest.to_string_lossy())
    }

    pub fn wait_ready_command(&self, selector: &str, timeout: Duration) -> CommandSpec {
        self.command()
            .args(["wait", "--for=condition=ready", "pod", "-l"])
            .arg(selector)
            .arg("-n")
            .arg(&self.config.namespace)
            .arg(format!("--timeout={}s", timeout.as_secs()))
    }

    pub fn delete_job_command(&self, job: &str) -> CommandSpec {
        self.command()
            .args(["delete", "job"])
            .arg(job)
            .arg("-n")
            .arg(&self.config.namespace)
            .arg("--ignore-not-found")
    }

    pub fn delete_namespace_command(&self) -> CommandSpec {
        self.command()
            .args(["delete", "namespace"])
            .arg(&self.config.namespace)
            .arg("--ignore-not-found")
    }

    pub async fn run(&self, command: &CommandSpec) -> Result<CommandOutput> {
        self.runner.run(command).await
    }
}
