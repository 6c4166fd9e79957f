//! Release pipeline orchestration.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use droidrelay_core::{diagnostics, obs, CancellationToken, CommandExecutor, CommandResult};
use serde::Serialize;
use tracing::{info, warn, Instrument};
use uuid::Uuid;

use crate::artifact::{locate_artifact, ArtifactInfo};
use crate::backend::{ReleaseBackend, UploadRequest};
use crate::context::ReleaseContext;
use crate::gradle::{self, TestType};
use crate::signing::{self, redact};
use crate::stage::{PipelineStage, PipelineState};
use crate::token::TokenProvider;

/// Result of one pipeline run.
#[derive(Debug, Clone, Serialize)]
pub struct PipelineReport {
    /// Fresh uuid per run.
    pub run_id: String,

    /// `Done` or `Failed(stage)`.
    pub state: PipelineState,

    /// Stages that finished successfully, in order.
    pub completed: Vec<PipelineStage>,

    /// Short summaries for the UI.
    pub visible: Vec<String>,

    /// Commands (redacted), raw logs and backend responses.
    pub hidden: Vec<String>,

    /// Instruction for the model once the upload succeeded.
    pub follow_up: Option<String>,

    /// Credential names that blocked signing.
    pub missing_credentials: Vec<String>,

    /// The artifact that was (or would have been) uploaded.
    pub artifact: Option<ArtifactInfo>,

    pub duration_ms: u64,
}

impl PipelineReport {
    fn new() -> Self {
        Self {
            run_id: Uuid::new_v4().to_string(),
            state: PipelineState::Running(PipelineStage::RunningUnitTests),
            completed: Vec::new(),
            visible: Vec::new(),
            hidden: Vec::new(),
            follow_up: None,
            missing_credentials: Vec::new(),
            artifact: None,
            duration_ms: 0,
        }
    }

    pub fn succeeded(&self) -> bool {
        self.state == PipelineState::Done
    }

    pub fn failed_stage(&self) -> Option<PipelineStage> {
        match self.state {
            PipelineState::Failed(stage) => Some(stage),
            _ => None,
        }
    }
}

/// Why a stage stopped the run.
struct StageFailure {
    visible: String,
    hidden: Option<String>,
}

impl StageFailure {
    fn new(visible: impl Into<String>) -> Self {
        Self {
            visible: visible.into(),
            hidden: None,
        }
    }

    fn with_hidden(mut self, hidden: impl Into<String>) -> Self {
        self.hidden = Some(hidden.into());
        self
    }
}

type StageResult = std::result::Result<(), StageFailure>;

/// Intermediate values handed from one stage to the next.
#[derive(Default)]
struct RunState {
    artifact: Option<PathBuf>,
    upload_path: Option<PathBuf>,
}

/// Test → build → locate → sign → token → upload → draft request.
pub struct ReleasePipeline {
    executor: Arc<dyn CommandExecutor>,
    tokens: Arc<dyn TokenProvider>,
    backend: Arc<dyn ReleaseBackend>,
    sdk_root: Option<PathBuf>,
}

impl ReleasePipeline {
    pub fn new(
        executor: Arc<dyn CommandExecutor>,
        tokens: Arc<dyn TokenProvider>,
        backend: Arc<dyn ReleaseBackend>,
        sdk_root: Option<PathBuf>,
    ) -> Self {
        Self {
            executor,
            tokens,
            backend,
            sdk_root,
        }
    }

    /// Run every stage in order, stopping at the first failure.
    ///
    /// Nothing is retried or rolled back: files written by earlier stages
    /// stay on disk.
    pub async fn run(&self, ctx: ReleaseContext, cancel: &CancellationToken) -> PipelineReport {
        let mut report = PipelineReport::new();
        let span = obs::pipeline_span(&report.run_id, &ctx.package_name);
        self.drive(ctx, &mut report, cancel).instrument(span).await;
        report
    }

    async fn drive(
        &self,
        mut ctx: ReleaseContext,
        report: &mut PipelineReport,
        cancel: &CancellationToken,
    ) {
        let start = Instant::now();
        let mut run = RunState::default();
        info!(
            module = %ctx.module_name,
            variant = %ctx.build_variant,
            artifact_type = ctx.artifact_type.extension(),
            sign = ctx.sign,
            "starting release pipeline"
        );

        while let PipelineState::Running(stage) = report.state {
            obs::emit_stage_started(stage.name());
            let stage_start = Instant::now();

            let outcome = self
                .execute(stage, &mut ctx, &mut run, report, cancel)
                .await;
            obs::emit_stage_finished(
                stage.name(),
                outcome.is_ok(),
                stage_start.elapsed().as_millis() as u64,
            );

            report.state = match outcome {
                Ok(()) => {
                    report.completed.push(stage);
                    PipelineState::after(stage)
                }
                Err(failure) => {
                    warn!(stage = stage.name(), "{} failed, stopping release", stage.label());
                    report.visible.push(failure.visible);
                    if let Some(hidden) = failure.hidden {
                        report.hidden.push(hidden);
                    }
                    PipelineState::Failed(stage)
                }
            };
        }

        report.duration_ms = start.elapsed().as_millis() as u64;
        obs::emit_pipeline_finished(&report.run_id, &report.state.name(), report.duration_ms);
    }

    async fn execute(
        &self,
        stage: PipelineStage,
        ctx: &mut ReleaseContext,
        run: &mut RunState,
        report: &mut PipelineReport,
        cancel: &CancellationToken,
    ) -> StageResult {
        match stage {
            PipelineStage::RunningUnitTests => {
                gradle::check_task_inputs(&ctx.module_name, &ctx.build_variant).map_err(|e| {
                    StageFailure::new(format!("Release not started: {e}."))
                        .with_hidden(format!("Rejected Gradle input: {e:?}"))
                })?;
                let command =
                    gradle::test_command(&ctx.module_name, &ctx.build_variant, TestType::Unit);
                let result = self.gradle(ctx, &command, cancel).await;
                report.hidden.push(log_entry(&command, &result, &[]));
                if !result.success() {
                    return Err(StageFailure::new(format!(
                        "Unit tests failed (exit code {}). Release stopped before building.\n{}",
                        result.exit_code,
                        diagnostics::explain_result(&result, true)
                    )));
                }
                report.visible.push("Unit tests passed.".to_string());
                Ok(())
            }

            PipelineStage::BuildingRelease => {
                let command = gradle::build_command(
                    &ctx.module_name,
                    &ctx.build_variant,
                    ctx.artifact_type,
                );
                let result = self.gradle(ctx, &command, cancel).await;
                report.hidden.push(log_entry(&command, &result, &[]));
                if !result.success() {
                    return Err(StageFailure::new(format!(
                        "Build failed (exit code {}).\n{}",
                        result.exit_code,
                        diagnostics::explain_result(&result, false)
                    )));
                }
                report
                    .visible
                    .push(format!("Built {} {}.", ctx.build_variant, ctx.artifact_type.extension()));
                Ok(())
            }

            PipelineStage::LocatingArtifact => {
                let outputs = ctx.outputs_dir();
                let path = locate_artifact(&outputs, ctx.artifact_type, &ctx.build_variant)
                    .map_err(|e| {
                        StageFailure::new(format!("Could not find the artifact: {e}."))
                            .with_hidden(format!("Artifact search in {}: {e:?}", outputs.display()))
                    })?;
                let info = ArtifactInfo::inspect(&path).await.map_err(|e| {
                    StageFailure::new(format!("Could not read {}: {e}.", path.display()))
                        .with_hidden(format!("Artifact read error: {e:?}"))
                })?;
                report.visible.push(format!("Found artifact {}.", info.file_name()));
                report.artifact = Some(info);
                run.upload_path = Some(path.clone());
                run.artifact = Some(path);
                Ok(())
            }

            PipelineStage::SigningArtifact => self.sign(ctx, run, report, cancel).await,

            PipelineStage::AcquiringToken => match self.tokens.acquire_access_token().await {
                Ok(token) => {
                    ctx.upload_token = Some(token.value);
                    report.visible.push("Access token acquired.".to_string());
                    Ok(())
                }
                Err(e) => Err(StageFailure::new(format!("Could not get an access token: {e}"))
                    .with_hidden(format!("Token error: {e:?}"))),
            },

            PipelineStage::Uploading => {
                let (Some(path), Some(token)) = (run.upload_path.clone(), ctx.upload_token.clone())
                else {
                    return Err(StageFailure::new("Nothing to upload."));
                };
                let request = UploadRequest {
                    package_name: ctx.package_name.clone(),
                    artifact_type: ctx.artifact_type,
                    path,
                    token,
                };
                match self.backend.upload(&request).await {
                    Ok(body) => {
                        report.hidden.push(format!("Upload response:\n{body}"));
                        report.visible.push(format!(
                            "Uploaded {} for {}.",
                            request
                                .path
                                .file_name()
                                .map(|n| n.to_string_lossy().into_owned())
                                .unwrap_or_default(),
                            ctx.package_name
                        ));
                        Ok(())
                    }
                    Err(e) => Err(StageFailure::new("Upload failed.")
                        .with_hidden(format!("Upload error: {e}"))),
                }
            }

            PipelineStage::RequestingVersionDraft => {
                let token = ctx.upload_token.clone().unwrap_or_default();
                report.follow_up = Some(version_draft_instruction(&ctx.package_name, &token));
                report
                    .visible
                    .push("Upload complete. Preparing the version draft.".to_string());
                Ok(())
            }
        }
    }

    async fn gradle(
        &self,
        ctx: &ReleaseContext,
        command: &str,
        cancel: &CancellationToken,
    ) -> CommandResult {
        self.executor
            .run(command, Some(ctx.project_path.as_path()), cancel)
            .await
    }

    async fn sign(
        &self,
        ctx: &ReleaseContext,
        run: &mut RunState,
        report: &mut PipelineReport,
        cancel: &CancellationToken,
    ) -> StageResult {
        if !ctx.sign {
            report.visible.push("Signing skipped.".to_string());
            return Ok(());
        }
        let Some(artifact) = run.artifact.clone() else {
            return Err(StageFailure::new("No artifact to sign."));
        };

        let plan = match signing::plan(
            &artifact,
            ctx.artifact_type,
            &ctx.credentials,
            self.sdk_root.as_deref(),
        ) {
            Ok(plan) => plan,
            Err(missing) => {
                let message = format!("Missing signing credentials: {}.", missing.join(", "));
                report.missing_credentials = missing;
                return Err(StageFailure::new(message));
            }
        };

        let secrets = ctx.credentials.secret_values();
        let result = self
            .executor
            .run(&plan.command, artifact.parent(), cancel)
            .await;
        report
            .hidden
            .push(log_entry(&plan.redacted, &result, &secrets));

        if !result.success() {
            let explanation = redact(&diagnostics::explain_result(&result, false), &secrets);
            return Err(StageFailure::new(format!(
                "Signing failed (exit code {}).\n{explanation}",
                result.exit_code
            )));
        }
        if !tokio::fs::try_exists(&plan.output).await.unwrap_or(false) {
            return Err(StageFailure::new(format!(
                "Signer finished but {} was not created.",
                plan.output.display()
            )));
        }

        let info = ArtifactInfo::inspect(&plan.output)
            .await
            .map_err(|e| {
                StageFailure::new(format!("Could not read signed artifact: {e}."))
                    .with_hidden(format!("Signed artifact read error: {e:?}"))
            })?;
        report.visible.push(format!("Signed {}.", info.file_name()));
        report.artifact = Some(info);
        run.upload_path = Some(plan.output);
        Ok(())
    }
}

/// Hidden-channel record of a process run with secrets masked.
fn log_entry(command: &str, result: &CommandResult, secrets: &[String]) -> String {
    redact(&format!("$ {command}\n{}", result.to_formatted_string()), secrets)
}

/// Follow-up turn asking the model to create the version draft.
pub fn version_draft_instruction(package_name: &str, token: &str) -> String {
    format!(
        "The artifact for {package_name} was uploaded successfully. \
Now call publish_version with packageName \"{package_name}\" and token \"{token}\" \
to create the version draft. Include only the version fields the user has provided; omit the rest."
    )
}
