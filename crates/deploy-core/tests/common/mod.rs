//! Shared fixtures: a throwaway project tree with image contexts and
//! manifest templates, plus config construction helpers.

#![allow(dead_code)]

use deploy_core::{RunConfig, Settings};
use std::collections::HashMap;
use std::path::Path;
use tempfile::TempDir;

pub const WORKLOAD_TEMPLATE: &str = "\
apiVersion: apps/v1
kind: Deployment
spec:
  template:
    spec:
      containers:
        - image: ${DOCKER_REGISTRY}/mbta-agent:${IMAGE_TAG}
";

pub const REGISTRATION_TEMPLATE: &str = "\
apiVersion: batch/v1
kind: Job
metadata:
  name: register-agents
spec:
  template:
    spec:
      containers:
        - image: ${DOCKER_REGISTRY}/mbta-registry:${IMAGE_TAG}
";

pub struct Project {
    pub dir: TempDir,
}

impl Project {
    /// Full tree: image contexts, static manifests, workloads, registration job.
    pub fn new() -> Self {
        let dir = tempfile::tempdir().expect("tempdir");
        let root = dir.path();

        for context in ["src/exchange_agent", "src/agents", "src/registry"] {
            std::fs::create_dir_all(root.join(context)).unwrap();
            std::fs::write(root.join(context).join("Dockerfile"), "FROM scratch\n").unwrap();
        }

        let k8s = root.join("k8s");
        std::fs::create_dir_all(&k8s).unwrap();
        for name in [
            "namespace.yaml",
            "configmap.yaml",
            "secrets.yaml",
            "observability.yaml",
        ] {
            std::fs::write(k8s.join(name), format!("# {}\n", name)).unwrap();
        }
        for name in [
            "registry.yaml",
            "exchange.yaml",
            "alerts.yaml",
            "planner.yaml",
            "stopfinder.yaml",
        ] {
            std::fs::write(k8s.join(name), WORKLOAD_TEMPLATE).unwrap();
        }
        std::fs::write(k8s.join("register-agents-job.yaml"), REGISTRATION_TEMPLATE).unwrap();

        Self { dir }
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    pub fn manifest(&self, name: &str) -> std::path::PathBuf {
        self.root().join("k8s").join(name)
    }

    /// Settings rooted at this project, with `pairs` layered on top.
    pub fn settings(&self, pairs: &[(&str, &str)]) -> Settings {
        let mut map: HashMap<String, String> = HashMap::new();
        map.insert(
            "DEPLOYCTL_ROOT".to_string(),
            self.root().to_string_lossy().to_string(),
        );
        for (k, v) in pairs {
            map.insert(k.to_string(), v.to_string());
        }
        Settings::from_lookup(|k| map.get(k).cloned())
    }

    pub fn config(&self, pairs: &[(&str, &str)]) -> RunConfig {
        RunConfig::resolve(self.settings(pairs)).expect("valid config")
    }
}
