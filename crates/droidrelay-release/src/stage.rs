//! Release pipeline stages and states.

use serde::{Deserialize, Serialize};

/// Pipeline stages, in execution order.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStage {
    /// ./gradlew test<Variant>UnitTest
    RunningUnitTests,

    /// ./gradlew assemble<Variant> | bundle<Variant>
    BuildingRelease,

    /// Walk build/outputs for the unsigned artifact.
    LocatingArtifact,

    /// apksigner or jarsigner.
    SigningArtifact,

    /// Signed key exchange against the auth endpoint.
    AcquiringToken,

    /// Multipart upload to the release backend.
    Uploading,

    /// Follow-up asking the model to create the version draft.
    RequestingVersionDraft,
}

impl PipelineStage {
    pub const ALL: [PipelineStage; 7] = [
        PipelineStage::RunningUnitTests,
        PipelineStage::BuildingRelease,
        PipelineStage::LocatingArtifact,
        PipelineStage::SigningArtifact,
        PipelineStage::AcquiringToken,
        PipelineStage::Uploading,
        PipelineStage::RequestingVersionDraft,
    ];

    /// Stable snake_case name, used in logs and reports.
    pub fn name(&self) -> &'static str {
        match self {
            PipelineStage::RunningUnitTests => "running_unit_tests",
            PipelineStage::BuildingRelease => "building_release",
            PipelineStage::LocatingArtifact => "locating_artifact",
            PipelineStage::SigningArtifact => "signing_artifact",
            PipelineStage::AcquiringToken => "acquiring_token",
            PipelineStage::Uploading => "uploading",
            PipelineStage::RequestingVersionDraft => "requesting_version_draft",
        }
    }

    /// Short description shown to the user while the stage runs.
    pub fn label(&self) -> &'static str {
        match self {
            PipelineStage::RunningUnitTests => "Running unit tests",
            PipelineStage::BuildingRelease => "Building release",
            PipelineStage::LocatingArtifact => "Locating artifact",
            PipelineStage::SigningArtifact => "Signing artifact",
            PipelineStage::AcquiringToken => "Acquiring access token",
            PipelineStage::Uploading => "Uploading artifact",
            PipelineStage::RequestingVersionDraft => "Requesting version draft",
        }
    }

    /// The stage after this one; `None` after the last.
    pub fn next(&self) -> Option<PipelineStage> {
        let index = PipelineStage::ALL.iter().position(|s| s == self)?;
        PipelineStage::ALL.get(index + 1).copied()
    }
}

impl std::fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Where a pipeline run is, or where it ended.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case", tag = "state", content = "stage")]
pub enum PipelineState {
    Running(PipelineStage),
    Failed(PipelineStage),
    Done,
}

impl PipelineState {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, PipelineState::Running(_))
    }

    pub fn name(&self) -> String {
        match self {
            PipelineState::Running(stage) => format!("running:{stage}"),
            PipelineState::Failed(stage) => format!("failed:{stage}"),
            PipelineState::Done => "done".to_string(),
        }
    }

    /// State after `stage` succeeded.
    pub fn after(stage: PipelineStage) -> PipelineState {
        stage.next().map_or(PipelineState::Done, PipelineState::Running)
    }
}
