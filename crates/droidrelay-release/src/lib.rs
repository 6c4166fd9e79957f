//! droidrelay Release Library
//!
//! Android test runs and the build, sign, upload and version-draft pipeline,
//! plus the tool handlers that expose them to the agent.

pub mod artifact;
pub mod backend;
pub mod config;
pub mod context;
pub mod error;
pub mod gradle;
pub mod pipeline;
pub mod signing;
pub mod stage;
pub mod token;
pub mod tools;

pub use artifact::{locate_artifact, ArtifactInfo};
pub use backend::{HttpReleaseBackend, ReleaseBackend, UploadRequest};
pub use config::ReleaseConfig;
pub use context::{ArtifactType, ReleaseContext, SigningCredentials};
pub use error::{ReleaseError, Result, TokenError};
pub use gradle::TestType;
pub use pipeline::{PipelineReport, ReleasePipeline};
pub use stage::{PipelineStage, PipelineState};
pub use token::{AccessToken, RsaTokenService, TokenProvider};
pub use tools::{
    register_release_tools, AccessTokenHandler, AndroidTestsHandler, PublishVersionHandler,
    ReleaseHandler,
};
