//! End-to-end phase dispatch over scripted tools.

mod common;

use common::Project;
use deploy_core::fakes::{MemoryRegistryApi, ScriptedRunner};
use deploy_core::{DeployError, Orchestrator, Phase, RunConfig};
use tracing_test::traced_test;

const SINGLE_ARCH: &[(&str, &str)] = &[
    ("DOCKER_REGISTRY", "registry.test/org"),
    ("IMAGE_TAG", "v1"),
    ("USE_BUILDX", "false"),
];

#[test]
fn missing_registry_fails_before_any_phase() {
    let project = Project::new();
    let err = RunConfig::resolve(project.settings(&[("IMAGE_TAG", "v1")])).unwrap_err();

    assert!(err.is_configuration());
    assert!(err.to_string().contains("DOCKER_REGISTRY"));
}

#[tokio::test]
#[traced_test]
async fn all_runs_build_push_apply_in_order() {
    let project = Project::new();
    let config = project.config(SINGLE_ARCH);
    let runner = ScriptedRunner::new();
    let api = MemoryRegistryApi::new();

    let report = Orchestrator::new(&config, &runner, &api)
        .run(Phase::All)
        .await
        .expect("all");

    assert_eq!(report.phase, Phase::All);
    assert_eq!(report.registry, "registry.test/org:v1");
    assert!(report.build.is_some());
    assert!(report.push.is_some());
    assert!(report.apply.is_some());
    assert!(report.teardown.is_none());
    assert!(report.finished_at >= report.started_at);

    let lines = runner.call_lines();
    let last_build = lines.iter().rposition(|l| l.starts_with("docker build")).unwrap();
    let first_push = lines.iter().position(|l| l.starts_with("docker push")).unwrap();
    let last_push = lines.iter().rposition(|l| l.starts_with("docker push")).unwrap();
    let first_kubectl = lines.iter().position(|l| l.starts_with("kubectl")).unwrap();
    assert!(last_build < first_push);
    assert!(last_push < first_kubectl);

    assert!(logs_contain("deployctl.run"));
    assert!(logs_contain("phase.finished"));
}

#[tokio::test]
async fn all_stops_at_first_build_failure() {
    let project = Project::new();
    let config = project.config(SINGLE_ARCH);
    let runner = ScriptedRunner::new().fail_when("mbta-exchange", 1, "Dockerfile parse error");
    let api = MemoryRegistryApi::new();

    let err = Orchestrator::new(&config, &runner, &api)
        .run(Phase::All)
        .await
        .unwrap_err();

    assert!(matches!(err, DeployError::Build { .. }));
    assert_eq!(runner.calls().len(), 1);
    assert_eq!(runner.count_matching("kubectl"), 0);
}

#[tokio::test]
async fn all_in_multi_arch_mode_pushes_only_during_build() {
    let project = Project::new();
    let config = project.config(&[("DOCKER_REGISTRY", "myorg")]);
    let runner = ScriptedRunner::new();
    let api = MemoryRegistryApi::new();

    let report = Orchestrator::new(&config, &runner, &api)
        .run(Phase::All)
        .await
        .expect("all");

    assert!(report.build.unwrap().pushed);
    assert!(report.push.unwrap().skipped);
    assert_eq!(runner.count_matching("docker push"), 0);
}

#[tokio::test]
async fn build_phase_touches_no_cluster() {
    let project = Project::new();
    let config = project.config(SINGLE_ARCH);
    let runner = ScriptedRunner::new();
    let api = MemoryRegistryApi::new();

    let report = Orchestrator::new(&config, &runner, &api)
        .run(Phase::Build)
        .await
        .expect("build");

    assert!(report.push.is_none());
    assert!(report.apply.is_none());
    assert_eq!(runner.count_matching("kubectl"), 0);
    assert_eq!(runner.count_matching("docker push"), 0);
}

#[tokio::test]
async fn destroy_uses_explicit_credentials() {
    let project = Project::new();
    let config = project.config(&[
        ("DOCKER_REGISTRY", "myorg"),
        ("DOCKER_USERNAME", "robot"),
        ("DOCKER_PASSWORD", "s3cret"),
    ]);
    let runner = ScriptedRunner::new();
    let api = MemoryRegistryApi::new();

    let report = Orchestrator::new(&config, &runner, &api)
        .run(Phase::Destroy)
        .await
        .expect("destroy");

    assert!(report.teardown.is_some());
    assert_eq!(api.deleted().len(), 3);
    assert!(api.deleted().iter().all(|d| d.username == "robot"));
}

#[tokio::test]
async fn destroy_succeeds_when_everything_is_already_gone() {
    let project = Project::new();
    let config = project.config(&[("DOCKER_REGISTRY", "myorg")]);
    let runner = ScriptedRunner::new()
        .fail_when("docker", 1, "Error: No such image")
        .fail_when("kubectl", 1, "error: You must be logged in to the server");
    let api = MemoryRegistryApi::new();

    for _ in 0..2 {
        let report = Orchestrator::new(&config, &runner, &api)
            .run(Phase::Destroy)
            .await
            .expect("destroy never fails");
        assert!(!report.teardown.unwrap().soft_failures().is_empty());
    }
}

#[tokio::test]
async fn run_report_collects_soft_failures_across_phases() {
    let project = Project::new();
    let config = project.config(SINGLE_ARCH);
    let runner = ScriptedRunner::new()
        .fail_when("app=planner-agent", 1, "error: timed out waiting for the condition")
        .fail_when("delete job", 1, "error: connection refused");
    let api = MemoryRegistryApi::new();

    let report = Orchestrator::new(&config, &runner, &api)
        .run(Phase::Apply)
        .await
        .expect("apply");

    let steps: Vec<_> = report
        .soft_failures()
        .iter()
        .map(|o| o.step.clone())
        .collect();
    assert_eq!(steps.len(), 2);
    assert_eq!(steps[0], "readiness app=planner-agent");
    assert!(steps[1].contains("delete job register-agents"));
}

#[tokio::test]
async fn clean_run_has_no_soft_failures() {
    let project = Project::new();
    let config = project.config(SINGLE_ARCH);
    let runner = ScriptedRunner::new();
    let api = MemoryRegistryApi::new();

    let report = Orchestrator::new(&config, &runner, &api)
        .run(Phase::All)
        .await
        .expect("all");

    assert!(report.soft_failures().is_empty());
}
