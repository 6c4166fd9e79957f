//! Per-run release inputs.

use std::path::{Path, PathBuf};

use droidrelay_core::SecretProvider;
use serde::{Deserialize, Serialize};

/// Secret names consulted when a credential is not passed as an argument.
pub const KEYSTORE_PATH_SECRET: &str = "KEYSTORE_PATH";
pub const KEYSTORE_PASSWORD_SECRET: &str = "KEYSTORE_PASSWORD";
pub const KEY_ALIAS_SECRET: &str = "KEY_ALIAS";
pub const KEY_PASSWORD_SECRET: &str = "KEY_PASSWORD";

/// Packaging format of the release artifact.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactType {
    #[default]
    Apk,
    Aab,
}

impl ArtifactType {
    pub fn extension(&self) -> &'static str {
        match self {
            ArtifactType::Apk => "apk",
            ArtifactType::Aab => "aab",
        }
    }

    /// Gradle task prefix producing this artifact.
    pub fn gradle_verb(&self) -> &'static str {
        match self {
            ArtifactType::Apk => "assemble",
            ArtifactType::Aab => "bundle",
        }
    }

    /// Parse `apk`/`aab` (any case, optional leading dot).
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().trim_start_matches('.').to_ascii_lowercase().as_str() {
            "apk" => Some(ArtifactType::Apk),
            "aab" | "bundle" => Some(ArtifactType::Aab),
            _ => None,
        }
    }
}

/// Keystore credentials for signing. Passwords are never printed by `Debug`.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct SigningCredentials {
    pub keystore_path: Option<String>,
    pub keystore_password: Option<String>,
    pub key_alias: Option<String>,
    pub key_password: Option<String>,
}

impl SigningCredentials {
    /// Fill unset fields from `secrets`.
    pub fn with_fallback(mut self, secrets: &dyn SecretProvider) -> Self {
        let fill = |slot: &mut Option<String>, name: &str| {
            if slot.as_deref().map_or(true, |v| v.trim().is_empty()) {
                *slot = secrets.get_secret(name).filter(|v| !v.trim().is_empty());
            }
        };
        fill(&mut self.keystore_path, KEYSTORE_PATH_SECRET);
        fill(&mut self.keystore_password, KEYSTORE_PASSWORD_SECRET);
        fill(&mut self.key_alias, KEY_ALIAS_SECRET);
        fill(&mut self.key_password, KEY_PASSWORD_SECRET);
        self
    }

    /// Names of absent credentials, always in the order
    /// `keystorePath, keystorePassword, keyAlias, keyPassword`.
    pub fn missing(&self) -> Vec<String> {
        [
            ("keystorePath", &self.keystore_path),
            ("keystorePassword", &self.keystore_password),
            ("keyAlias", &self.key_alias),
            ("keyPassword", &self.key_password),
        ]
        .into_iter()
        .filter(|(_, value)| value.as_deref().map_or(true, |v| v.trim().is_empty()))
        .map(|(name, _)| name.to_string())
        .collect()
    }

    pub fn is_complete(&self) -> bool {
        self.missing().is_empty()
    }

    /// Every non-empty secret value, longest first, for log redaction.
    pub fn secret_values(&self) -> Vec<String> {
        let mut values: Vec<String> = [&self.keystore_password, &self.key_password]
            .into_iter()
            .flatten()
            .filter(|v| !v.is_empty())
            .cloned()
            .collect();
        values.sort_by_key(|v| std::cmp::Reverse(v.len()));
        values
    }
}

impl std::fmt::Debug for SigningCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mask = |v: &Option<String>| v.as_ref().map(|_| "***");
        f.debug_struct("SigningCredentials")
            .field("keystore_path", &self.keystore_path)
            .field("keystore_password", &mask(&self.keystore_password))
            .field("key_alias", &self.key_alias)
            .field("key_password", &mask(&self.key_password))
            .finish()
    }
}

/// Inputs of one release run. Built per invocation and dropped at the end.
#[derive(Debug, Clone)]
pub struct ReleaseContext {
    pub project_path: PathBuf,
    pub module_name: String,
    /// Capitalized variant name, e.g. `Release`.
    pub build_variant: String,
    pub artifact_type: ArtifactType,
    pub package_name: String,
    pub credentials: SigningCredentials,
    pub sign: bool,
    /// Filled by the token stage.
    pub upload_token: Option<String>,
}

impl ReleaseContext {
    pub fn new(project_path: impl Into<PathBuf>, package_name: impl Into<String>) -> Self {
        Self {
            project_path: project_path.into(),
            module_name: "app".to_string(),
            build_variant: "Release".to_string(),
            artifact_type: ArtifactType::Apk,
            package_name: package_name.into(),
            credentials: SigningCredentials::default(),
            sign: true,
            upload_token: None,
        }
    }

    pub fn with_module(mut self, module: impl Into<String>) -> Self {
        self.module_name = module.into();
        self
    }

    pub fn with_variant(mut self, variant: &str) -> Self {
        self.build_variant = capitalize_variant(variant);
        self
    }

    pub fn with_artifact_type(mut self, artifact_type: ArtifactType) -> Self {
        self.artifact_type = artifact_type;
        self
    }

    pub fn with_credentials(mut self, credentials: SigningCredentials) -> Self {
        self.credentials = credentials;
        self
    }

    pub fn with_sign(mut self, sign: bool) -> Self {
        self.sign = sign;
        self
    }

    /// `<project>/<module>/build/outputs`.
    pub fn outputs_dir(&self) -> PathBuf {
        module_dir(&self.project_path, &self.module_name)
            .join("build")
            .join("outputs")
    }
}

/// `<project>/<module>`, or the project root when the module is blank.
///
/// Nested Gradle paths map to directories: `:feature:login` is `feature/login`.
pub fn module_dir(project: &Path, module: &str) -> PathBuf {
    module
        .trim()
        .split(':')
        .filter(|part| !part.is_empty())
        .fold(project.to_path_buf(), |dir, part| dir.join(part))
}

/// `debug` → `Debug`, `freeRelease` → `FreeRelease`. Blank input stays blank.
pub fn capitalize_variant(variant: &str) -> String {
    let variant = variant.trim();
    let mut chars = variant.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
