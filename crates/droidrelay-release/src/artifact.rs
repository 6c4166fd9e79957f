//! Locating and describing build outputs.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use walkdir::WalkDir;

use crate::context::ArtifactType;
use crate::error::{ReleaseError, Result};

/// File name token marking an already-signed artifact.
const SIGNED_TOKEN: &str = "signed";

/// Directory and name token of instrumentation test APKs.
const ANDROID_TEST_TOKEN: &str = "androidtest";

/// A located artifact and its content digest.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ArtifactInfo {
    pub path: PathBuf,
    pub size_bytes: u64,
    /// Hex-encoded SHA-256 of the file contents.
    pub sha256: String,
}

impl ArtifactInfo {
    pub async fn inspect(path: &Path) -> Result<Self> {
        let bytes = tokio::fs::read(path).await?;
        Ok(Self {
            path: path.to_path_buf(),
            size_bytes: bytes.len() as u64,
            sha256: hex::encode(Sha256::digest(&bytes)),
        })
    }

    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

fn name_tokens(stem: &str) -> impl Iterator<Item = String> + '_ {
    stem.split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_ascii_lowercase)
}

/// Whether a file name carries the `signed` token (`unsigned` does not count).
pub fn is_signed_name(path: &Path) -> bool {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let signed = name_tokens(&stem).any(|t| t == SIGNED_TOKEN);
    signed
}

/// Whether the file is an instrumentation test package rather than the app.
pub fn is_test_output(path: &Path) -> bool {
    let in_test_dir = path.parent().map_or(false, |dir| {
        dir.components()
            .any(|c| c.as_os_str().to_string_lossy().eq_ignore_ascii_case(ANDROID_TEST_TOKEN))
    });
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    in_test_dir || name_tokens(&stem).any(|t| t == ANDROID_TEST_TOKEN)
}

fn mentions_variant(path: &Path, variant: &str) -> bool {
    let variant: String = variant
        .chars()
        .filter(char::is_ascii_alphanumeric)
        .collect::<String>()
        .to_ascii_lowercase();
    if variant.is_empty() {
        return false;
    }
    let squashed: String = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
        .chars()
        .filter(char::is_ascii_alphanumeric)
        .collect::<String>()
        .to_ascii_lowercase();
    squashed.contains(&variant)
}

/// Unsigned app artifacts under `outputs_dir`, sorted by path.
pub fn candidates(outputs_dir: &Path, artifact_type: ArtifactType) -> Vec<PathBuf> {
    let extension = artifact_type.extension();
    let mut found: Vec<PathBuf> = WalkDir::new(outputs_dir)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| entry.into_path())
        .filter(|path| {
            path.extension()
                .map_or(false, |e| e.eq_ignore_ascii_case(extension))
        })
        .filter(|path| !is_signed_name(path))
        .filter(|path| {
            !is_test_output(path.strip_prefix(outputs_dir).unwrap_or(path.as_path()))
        })
        .collect();
    found.sort();
    found
}

/// Pick the artifact to sign and upload.
///
/// Prefers the first candidate whose name mentions `variant`; otherwise falls
/// back to the first candidate of the right type, whatever its variant.
pub fn locate_artifact(
    outputs_dir: &Path,
    artifact_type: ArtifactType,
    variant: &str,
) -> Result<PathBuf> {
    let found = candidates(outputs_dir, artifact_type);
    let chosen = found
        .iter()
        .find(|path| mentions_variant(path, variant))
        .or_else(|| found.first());

    match chosen {
        Some(path) => {
            if !mentions_variant(path, variant) {
                tracing::warn!(
                    artifact = %path.display(),
                    variant = %variant,
                    "no artifact named for the variant, using first match"
                );
            }
            Ok(path.clone())
        }
        None => Err(ReleaseError::ArtifactNotFound {
            extension: artifact_type.extension().to_string(),
            dir: outputs_dir.display().to_string(),
        }),
    }
}
