//! In-memory fakes for the process and registry seams (testing only)
//!
//! `ScriptedRunner` records every command and answers from a list of rules;
//! `MemoryRegistryApi` records remote tag deletions.

use std::sync::Mutex;

use async_trait::async_trait;
use hub_client::{BasicAuth, HubError};

use crate::error::{DeployError, Result};
use crate::process::{CommandOutput, CommandSpec, ProcessRunner};
use crate::teardown::RegistryApi;

// ---------------------------------------------------------------------------
// ScriptedRunner
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
enum Reply {
    Exit { exit_code: i32, stderr: String },
    SpawnError(String),
}

#[derive(Debug, Clone)]
struct Rule {
    needle: String,
    reply: Reply,
}

/// A manifest file as it was when `kubectl apply -f` was called.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppliedManifest {
    pub name: String,
    pub content: String,
}

/// Process runner that never spawns anything.
///
/// Commands succeed unless a rule matches; the first rule whose needle is a
/// substring of the rendered command line wins.
#[derive(Debug, Default)]
pub struct ScriptedRunner {
    rules: Mutex<Vec<Rule>>,
    calls: Mutex<Vec<CommandSpec>>,
    applied: Mutex<Vec<AppliedManifest>>,
}

impl ScriptedRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Commands containing `needle` exit with `exit_code` and `stderr`.
    pub fn fail_when(self, needle: &str, exit_code: i32, stderr: &str) -> Self {
        self.rules.lock().unwrap().push(Rule {
            needle: needle.to_string(),
            reply: Reply::Exit {
                exit_code,
                stderr: stderr.to_string(),
            },
        });
        self
    }

    /// Commands containing `needle` cannot be started at all.
    pub fn error_when(self, needle: &str, reason: &str) -> Self {
        self.rules.lock().unwrap().push(Rule {
            needle: needle.to_string(),
            reply: Reply::SpawnError(reason.to_string()),
        });
        self
    }

    pub fn calls(&self) -> Vec<CommandSpec> {
        self.calls.lock().unwrap().clone()
    }

    /// Rendered command lines, in call order.
    pub fn call_lines(&self) -> Vec<String> {
        self.calls().iter().map(|c| c.to_string()).collect()
    }

    /// Number of calls whose command line contains `needle`.
    pub fn count_matching(&self, needle: &str) -> usize {
        self.call_lines().iter().filter(|l| l.contains(needle)).count()
    }

    /// Manifests passed to `kubectl apply -f`, in call order.
    pub fn applied_manifests(&self) -> Vec<AppliedManifest> {
        self.applied.lock().unwrap().clone()
    }

    fn capture_applied(&self, command: &CommandSpec) {
        if command.program != "kubectl" || !command.args.iter().any(|a| a == "apply") {
            return;
        }
        let Some(pos) = command.args.iter().position(|a| a == "-f") else {
            return;
        };
        let Some(path) = command.args.get(pos + 1) else {
            return;
        };
        let path = std::path::Path::new(path);
        if let Ok(content) = std::fs::read_to_string(path) {
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_default();
            self.applied
                .lock()
                .unwrap()
                .push(AppliedManifest { name, content });
        }
    }
}

#[async_trait]
impl ProcessRunner for ScriptedRunner {
    async fn run(&self, command: &CommandSpec) -> Result<CommandOutput> {
        self.calls.lock().unwrap().push(command.clone());
        let line = command.to_string();

        let reply = self
            .rules
            .lock()
            .unwrap()
            .iter()
            .find(|r| line.contains(&r.needle))
            .map(|r| r.reply.clone());

        match reply {
            None => {
                self.capture_applied(command);
                Ok(CommandOutput::default())
            }
            Some(Reply::Exit { exit_code, stderr }) => Ok(CommandOutput {
                exit_code,
                stdout: String::new(),
                stderr,
            }),
            Some(Reply::SpawnError(reason)) => Err(DeployError::Process {
                program: command.program.clone(),
                reason,
            }),
        }
    }
}

// ---------------------------------------------------------------------------
// MemoryRegistryApi
// ---------------------------------------------------------------------------

/// A recorded remote tag deletion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeletedTag {
    pub username: String,
    pub namespace: String,
    pub repository: String,
    pub tag: String,
}

/// Registry API that records deletions and optionally rejects them.
#[derive(Debug, Default)]
pub struct MemoryRegistryApi {
    deleted: Mutex<Vec<DeletedTag>>,
    reject_with_status: Option<u16>,
}

impl MemoryRegistryApi {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every call records the attempt, then fails with this status.
    pub fn rejecting(status: u16) -> Self {
        Self {
            deleted: Mutex::new(Vec::new()),
            reject_with_status: Some(status),
        }
    }

    pub fn deleted(&self) -> Vec<DeletedTag> {
        self.deleted.lock().unwrap().clone()
    }
}

#[async_trait]
impl RegistryApi for MemoryRegistryApi {
    async fn delete_tag(
        &self,
        auth: &BasicAuth,
        namespace: &str,
        repository: &str,
        tag: &str,
    ) -> std::result::Result<(), HubError> {
        self.deleted.lock().unwrap().push(DeletedTag {
            username: auth.username.clone(),
            namespace: namespace.to_string(),
            repository: repository.to_string(),
            tag: tag.to_string(),
        });

        match self.reject_with_status {
            None => Ok(()),
            Some(404) => Err(HubError::NotFound(format!("{}/{}:{}", namespace, repository, tag))),
            Some(status) => Err(HubError::Unauthorized {
                url: format!("memory://{}/{}/{}", namespace, repository, tag),
                status,
            }),
        }
    }
}
