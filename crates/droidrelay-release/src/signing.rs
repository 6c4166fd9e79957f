//! Artifact signing with apksigner or jarsigner.

use std::path::{Path, PathBuf};

use droidrelay_core::shell_quote;

use crate::context::{ArtifactType, SigningCredentials};

const MASK: &str = "***";

/// Which tool a [`SigningPlan`] invokes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signer {
    ApkSigner,
    JarSigner,
}

/// A ready-to-run signing command.
#[derive(Clone, PartialEq, Eq)]
pub struct SigningPlan {
    pub signer: Signer,
    /// Full command line, including secrets. Never log this.
    pub command: String,
    /// Same command with passwords masked.
    pub redacted: String,
    pub output: PathBuf,
}

impl std::fmt::Debug for SigningPlan {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SigningPlan")
            .field("signer", &self.signer)
            .field("command", &self.redacted)
            .field("output", &self.output)
            .finish()
    }
}

/// `<dir>/<stem>-signed.<ext>` next to `input`.
pub fn signed_output_path(input: &Path) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let name = match input.extension() {
        Some(ext) => format!("{stem}-signed.{}", ext.to_string_lossy()),
        None => format!("{stem}-signed"),
    };
    input.with_file_name(name)
}

/// Newest `build-tools/<version>/apksigner` under the SDK root, by lexical
/// version directory name.
pub fn find_apksigner(sdk_root: &Path) -> Option<PathBuf> {
    let mut versions: Vec<PathBuf> = std::fs::read_dir(sdk_root.join("build-tools"))
        .ok()?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|dir| dir.join("apksigner").is_file())
        .collect();
    versions.sort();
    versions.pop().map(|dir| dir.join("apksigner"))
}

/// Build the signing command for `artifact`.
///
/// Returns the missing credential names instead when any is absent.
pub fn plan(
    artifact: &Path,
    artifact_type: ArtifactType,
    credentials: &SigningCredentials,
    sdk_root: Option<&Path>,
) -> Result<SigningPlan, Vec<String>> {
    let missing = credentials.missing();
    if !missing.is_empty() {
        return Err(missing);
    }
    let keystore = credentials.keystore_path.clone().unwrap_or_default();
    let store_pass = credentials.keystore_password.clone().unwrap_or_default();
    let alias = credentials.key_alias.clone().unwrap_or_default();
    let key_pass = credentials.key_password.clone().unwrap_or_default();

    let output = signed_output_path(artifact);
    let input = artifact.display().to_string();
    let out = output.display().to_string();

    let apksigner = match artifact_type {
        ArtifactType::Apk => sdk_root.and_then(find_apksigner),
        ArtifactType::Aab => None,
    };

    let render = |store_pass: &str, key_pass: &str| match &apksigner {
        Some(tool) => [
            shell_quote(&tool.display().to_string()),
            "sign".to_string(),
            "--ks".to_string(),
            shell_quote(&keystore),
            "--ks-pass".to_string(),
            shell_quote(&format!("pass:{store_pass}")),
            "--ks-key-alias".to_string(),
            shell_quote(&alias),
            "--key-pass".to_string(),
            shell_quote(&format!("pass:{key_pass}")),
            "--out".to_string(),
            shell_quote(&out),
            shell_quote(&input),
        ]
        .join(" "),
        None => [
            "jarsigner".to_string(),
            "-sigalg".to_string(),
            "SHA256withRSA".to_string(),
            "-digestalg".to_string(),
            "SHA-256".to_string(),
            "-keystore".to_string(),
            shell_quote(&keystore),
            "-storepass".to_string(),
            shell_quote(store_pass),
            "-keypass".to_string(),
            shell_quote(key_pass),
            "-signedjar".to_string(),
            shell_quote(&out),
            shell_quote(&input),
            shell_quote(&alias),
        ]
        .join(" "),
    };

    Ok(SigningPlan {
        signer: if apksigner.is_some() {
            Signer::ApkSigner
        } else {
            Signer::JarSigner
        },
        command: render(&store_pass, &key_pass),
        redacted: render(MASK, MASK),
        output,
    })
}

/// Replace every occurrence of each secret in `text` with a mask.
pub fn redact(text: &str, secrets: &[String]) -> String {
    secrets
        .iter()
        .filter(|s| !s.is_empty())
        .fold(text.to_string(), |acc, secret| acc.replace(secret.as_str(), MASK))
}
