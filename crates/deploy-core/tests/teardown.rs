//! Teardown is best-effort: it completes even when every cleanup step fails.

mod common;

use common::Project;
use deploy_core::fakes::{MemoryRegistryApi, ScriptedRunner};
use deploy_core::{Credentials, Provenance, RemoteCleanup, TeardownController};
use tracing_test::traced_test;

fn robot() -> Credentials {
    Credentials {
        username: "robot".to_string(),
        secret: "s3cret".to_string(),
        provenance: Provenance::ExplicitConfig,
    }
}

#[tokio::test]
async fn removes_namespace_images_and_builder() {
    let project = Project::new();
    let config = project.config(&[("DOCKER_REGISTRY", "myorg"), ("IMAGE_TAG", "v3")]);
    let runner = ScriptedRunner::new();
    let api = MemoryRegistryApi::new();

    let report = TeardownController::new(&config, &runner, &api)
        .destroy(Some(&robot()))
        .await;

    assert_eq!(
        runner.call_lines(),
        vec![
            "kubectl delete namespace mbta --ignore-not-found",
            "docker rmi -f myorg/mbta-exchange:v3",
            "docker rmi -f myorg/mbta-agent:v3",
            "docker rmi -f myorg/mbta-registry:v3",
            "docker buildx rm mbta-builder",
        ]
    );
    assert!(report.soft_failures().is_empty());

    let deleted = api.deleted();
    assert_eq!(deleted.len(), 3);
    assert!(deleted.iter().all(|d| d.username == "robot"
        && d.namespace == "myorg"
        && d.tag == "v3"));
    let repos: Vec<_> = deleted.iter().map(|d| d.repository.as_str()).collect();
    assert_eq!(repos, vec!["mbta-exchange", "mbta-agent", "mbta-registry"]);
}

#[tokio::test]
async fn destroy_twice_never_fails() {
    let project = Project::new();
    let config = project.config(&[("DOCKER_REGISTRY", "docker.io/myorg")]);
    let api = MemoryRegistryApi::new();

    let first = ScriptedRunner::new();
    TeardownController::new(&config, &first, &api)
        .destroy(Some(&robot()))
        .await;

    // Second run: images and builder are gone, remote tags return 404.
    let second = ScriptedRunner::new()
        .fail_when("docker rmi", 1, "Error: No such image: myorg/mbta-agent:latest")
        .fail_when("buildx rm", 1, "ERROR: no builder \"mbta-builder\" found");
    let gone = MemoryRegistryApi::rejecting(404);
    let report = TeardownController::new(&config, &second, &gone)
        .destroy(Some(&robot()))
        .await;

    assert!(report.namespace.result.is_ok());
    // 3 images + builder + 3 remote tags.
    assert_eq!(report.soft_failures().len(), 7);
    assert_eq!(second.calls().len(), first.calls().len());
}

#[tokio::test]
async fn unavailable_tools_are_soft_failures() {
    let project = Project::new();
    let config = project.config(&[("DOCKER_REGISTRY", "registry.test/org")]);
    let runner = ScriptedRunner::new()
        .error_when("kubectl", "No such file or directory")
        .error_when("docker", "No such file or directory");
    let api = MemoryRegistryApi::new();

    let report = TeardownController::new(&config, &runner, &api).destroy(None).await;

    assert!(!report.namespace.result.is_ok());
    assert_eq!(report.soft_failures().len(), 5);
    assert_eq!(report.remote, RemoteCleanup::NotApplicable);
}

#[tokio::test]
#[traced_test]
async fn no_credentials_warns_once_per_image() {
    let project = Project::new();
    let config = project.config(&[("DOCKER_REGISTRY", "myorg")]);
    let runner = ScriptedRunner::new();
    let api = MemoryRegistryApi::new();

    let report = TeardownController::new(&config, &runner, &api).destroy(None).await;

    match &report.remote {
        RemoteCleanup::SkippedNoCredentials { images } => assert_eq!(images.len(), 3),
        other => panic!("unexpected remote cleanup: {other:?}"),
    }
    assert!(api.deleted().is_empty());
    logs_assert(|lines: &[&str]| {
        let warnings = lines
            .iter()
            .filter(|l| l.contains("skipping remote tag deletion"))
            .count();
        if warnings == 3 {
            Ok(())
        } else {
            Err(format!("expected 3 warnings, got {}", warnings))
        }
    });
}

#[tokio::test]
async fn private_registry_makes_no_api_calls() {
    let project = Project::new();
    let config = project.config(&[("DOCKER_REGISTRY", "registry.test/org")]);
    let runner = ScriptedRunner::new();
    let api = MemoryRegistryApi::new();

    let report = TeardownController::new(&config, &runner, &api)
        .destroy(Some(&robot()))
        .await;

    assert_eq!(report.remote, RemoteCleanup::NotApplicable);
    assert!(api.deleted().is_empty());
}

#[tokio::test]
async fn rejected_remote_deletion_is_recorded_not_raised() {
    let project = Project::new();
    let config = project.config(&[("DOCKER_REGISTRY", "index.docker.io/myorg")]);
    let runner = ScriptedRunner::new();
    let api = MemoryRegistryApi::rejecting(401);

    let report = TeardownController::new(&config, &runner, &api)
        .destroy(Some(&robot()))
        .await;

    let RemoteCleanup::Attempted { outcomes } = &report.remote else {
        panic!("expected attempted remote cleanup");
    };
    assert_eq!(outcomes.len(), 3);
    assert!(outcomes.iter().all(|o| !o.result.is_ok()));
    assert_eq!(api.deleted().len(), 3);
}

#[tokio::test]
async fn bare_private_registry_host_makes_no_api_calls() {
    let project = Project::new();
    let api = MemoryRegistryApi::new();

    for registry in ["localhost:5000", "registry.test"] {
        let config = project.config(&[("DOCKER_REGISTRY", registry)]);
        let runner = ScriptedRunner::new();

        let report = TeardownController::new(&config, &runner, &api)
            .destroy(Some(&robot()))
            .await;

        assert_eq!(report.remote, RemoteCleanup::NotApplicable, "{}", registry);
    }
    assert!(api.deleted().is_empty());
}
