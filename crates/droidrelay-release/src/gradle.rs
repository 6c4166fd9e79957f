//! Gradle wrapper command lines.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::context::{capitalize_variant, ArtifactType};

/// Wrapper script, relative to the project root.
pub const GRADLE_WRAPPER: &str = "./gradlew";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum TestType {
    /// JVM unit tests (`test<Variant>UnitTest`).
    #[default]
    Unit,
    /// Device tests (`connected<Variant>AndroidTest`).
    Instrumented,
}

impl TestType {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "unit" | "jvm" | "local" => Some(TestType::Unit),
            "instrumented" | "android" | "connected" | "device" => Some(TestType::Instrumented),
            _ => None,
        }
    }
}

/// A module path or variant that would not be a plain Gradle task name.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid {field} \"{value}\": use only letters, digits, '_' and '-'")]
pub struct InvalidTaskInput {
    pub field: &'static str,
    pub value: String,
}

fn is_task_word(word: &str) -> bool {
    !word.is_empty()
        && word
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

/// Module paths are `:`-separated words; blank means the root project.
pub fn check_module(module: &str) -> Result<(), InvalidTaskInput> {
    let trimmed = module.trim().trim_matches(':');
    if trimmed.is_empty() || trimmed.split(':').all(is_task_word) {
        Ok(())
    } else {
        Err(InvalidTaskInput {
            field: "moduleName",
            value: module.to_string(),
        })
    }
}

pub fn check_variant(variant: &str) -> Result<(), InvalidTaskInput> {
    let trimmed = variant.trim();
    if trimmed.is_empty() || is_task_word(trimmed) {
        Ok(())
    } else {
        Err(InvalidTaskInput {
            field: "buildVariant",
            value: variant.to_string(),
        })
    }
}

/// Both checks; every command line built here goes through `sh -c`.
pub fn check_task_inputs(module: &str, variant: &str) -> Result<(), InvalidTaskInput> {
    check_module(module)?;
    check_variant(variant)
}

/// `:module:task`, or just `task` when the module is blank.
pub fn task_path(module: &str, task: &str) -> String {
    let module = module.trim().trim_matches(':');
    if module.is_empty() {
        task.to_string()
    } else {
        format!(":{module}:{task}")
    }
}

/// Test task for a module and variant.
pub fn test_command(module: &str, variant: &str, test_type: TestType) -> String {
    let variant = capitalize_variant(variant);
    let task = match test_type {
        TestType::Unit => format!("test{variant}UnitTest"),
        TestType::Instrumented => format!("connected{variant}AndroidTest"),
    };
    format!("{GRADLE_WRAPPER} {}", task_path(module, &task))
}

/// Release build task for a module, variant and artifact type.
pub fn build_command(module: &str, variant: &str, artifact_type: ArtifactType) -> String {
    let task = format!("{}{}", artifact_type.gradle_verb(), capitalize_variant(variant));
    format!("{GRADLE_WRAPPER} {}", task_path(module, &task))
}
