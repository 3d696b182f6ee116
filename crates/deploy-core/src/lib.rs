//! deploy-core: deployment lifecycle orchestration
//!
//! Builds the stack's container images, renders and applies the cluster
//! manifests with readiness gating, triggers discovery registration and
//! tears everything down again. External tools are reached through
//! [`ProcessRunner`]; the registry management API through [`RegistryApi`].

pub mod apply;
pub mod config;
pub mod credentials;
pub mod dispatch;
pub mod error;
pub mod fakes;
pub mod image;
pub mod kubectl;
pub mod obs;
pub mod process;
pub mod registration;
pub mod soft;
pub mod telemetry;
pub mod teardown;
pub mod template;

pub use apply::{ApplyReport, ClusterApplier, ReadinessCriterion};
pub use config::{BuildMode, RegistryReference, RunConfig, Settings};
pub use credentials::{decode_with_fallback, CredentialResolver, Credentials, DecodeError, Provenance};
pub use dispatch::{Orchestrator, Phase, RunReport, Step};
pub use error::{DeployError, Result};
pub use image::{BuildReport, ImageBuilder, ImageSpec, PushReport};
pub use obs::{emit_phase_finished, emit_phase_started, emit_soft_failure, run_span};
pub use process::{CommandOutput, CommandSpec, ProcessRunner, SystemRunner};
pub use registration::{RegistrationReport, RegistrationTrigger};
pub use soft::{SoftResult, StepOutcome};
pub use telemetry::init_tracing;
pub use teardown::{registry_client, RegistryApi, RemoteCleanup, TeardownController, TeardownReport};
pub use template::{ManifestSet, ManifestTemplate, RenderedManifest};
