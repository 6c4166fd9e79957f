//! Diagnostic classifier for process output.
//!
//! Maps exit codes to an [`Outcome`] and raw stdout/stderr to a short
//! human-readable cause/fix explanation.

use serde::{Deserialize, Serialize};

use crate::domain::CommandResult;

/// Coarse outcome of a process run, by exit-code sign.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    /// Exit code 0.
    Success,
    /// The process ran and reported failure.
    Warning,
    /// The process could not be launched.
    Fatal,
}

/// A known failure signature with its explanation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KnownIssue {
    pub pattern: &'static str,
    pub cause: &'static str,
    pub fix: &'static str,
}

/// Marker Gradle prints when a test filter matched nothing.
pub const NO_TESTS_MARKER: &str = "no tests found";

const NO_TESTS_EXPLANATION: &str = "Cause: no tests matched the requested task or filter.\n\
Suggested fix: check the module name and build variant, and that the module has tests under src/test.";

const UNKNOWN_EXPLANATION: &str =
    "Cause: unknown error.\nSuggested fix: inspect the full logs for details.";

const STDERR_FALLBACK_LINES: usize = 3;
const STDERR_FALLBACK_MAX_LEN: usize = 300;

/// Ordered signature table; the first match wins.
pub const KNOWN_ISSUES: &[KnownIssue] = &[
    KnownIssue {
        pattern: "SDK location not found",
        cause: "the Android SDK location is not configured",
        fix: "set sdk.dir in local.properties or export ANDROID_HOME",
    },
    KnownIssue {
        pattern: "GradleWrapperMain",
        cause: "the Gradle wrapper jar is missing",
        fix: "run `gradle wrapper` in the project or restore gradle/wrapper/gradle-wrapper.jar",
    },
    KnownIssue {
        pattern: "gradlew: Permission denied",
        cause: "the Gradle wrapper script is not executable",
        fix: "run `chmod +x gradlew` in the project directory",
    },
    KnownIssue {
        pattern: "Unsupported class file major version",
        cause: "the JDK version does not match the Gradle/AGP version",
        fix: "point JAVA_HOME at the JDK bundled with Android Studio (JDK 17)",
    },
    KnownIssue {
        pattern: "JAVA_HOME is set to an invalid directory",
        cause: "JAVA_HOME points to a directory without a JDK",
        fix: "fix JAVA_HOME or unset it to use the configured toolchain path",
    },
    KnownIssue {
        pattern: "Keystore was tampered with, or password was incorrect",
        cause: "the keystore password is wrong",
        fix: "check keystorePassword",
    },
    KnownIssue {
        pattern: "Cannot recover key",
        cause: "the key password is wrong",
        fix: "check keyPassword",
    },
    KnownIssue {
        pattern: "does not exist in the keystore",
        cause: "the key alias is not present in the keystore",
        fix: "check keyAlias with `keytool -list -keystore <path>`",
    },
    KnownIssue {
        pattern: "There were failing tests",
        cause: "one or more unit tests failed",
        fix: "open the test report under build/reports/tests and fix the failing tests",
    },
    KnownIssue {
        pattern: "Could not resolve",
        cause: "a dependency could not be downloaded",
        fix: "check network access and the repositories declared in settings.gradle",
    },
    KnownIssue {
        pattern: "not found in project",
        cause: "the requested Gradle task does not exist",
        fix: "check the module name and build variant spelling",
    },
    KnownIssue {
        pattern: "OutOfMemoryError",
        cause: "the Gradle daemon ran out of memory",
        fix: "raise org.gradle.jvmargs (e.g. -Xmx4g) in gradle.properties",
    },
    KnownIssue {
        pattern: "command not found",
        cause: "a required binary is not on PATH",
        fix: "install the tool or add its directory to the toolchain path",
    },
    KnownIssue {
        pattern: "No such file or directory",
        cause: "a path in the command does not exist",
        fix: "check the project path and file names",
    },
    KnownIssue {
        pattern: "Execution failed for task",
        cause: "a Gradle task failed",
        fix: "read the task error above `BUILD FAILED` in the logs",
    },
];

/// Classify a result by exit-code sign.
pub fn classify(result: &CommandResult, _is_test_run: bool) -> Outcome {
    match result.exit_code {
        0 => Outcome::Success,
        c if c > 0 => Outcome::Warning,
        _ => Outcome::Fatal,
    }
}

/// Find the first known issue whose pattern occurs in `text`.
pub fn match_known_issue(text: &str) -> Option<&'static KnownIssue> {
    KNOWN_ISSUES.iter().find(|issue| text.contains(issue.pattern))
}

/// Human-readable explanation of a failed run. Never empty.
pub fn explain(stdout: &str, stderr: &str, is_test_run: bool) -> String {
    let combined = format!("{stdout}\n{stderr}");

    if is_test_run && combined.to_ascii_lowercase().contains(NO_TESTS_MARKER) {
        return NO_TESTS_EXPLANATION.to_string();
    }

    if let Some(issue) = match_known_issue(&combined) {
        return format!("Cause: {}.\nSuggested fix: {}.", issue.cause, issue.fix);
    }

    let lines: Vec<&str> = stderr
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty() && l.len() <= STDERR_FALLBACK_MAX_LEN)
        .take(STDERR_FALLBACK_LINES)
        .collect();
    if !lines.is_empty() {
        return lines.join("\n");
    }

    UNKNOWN_EXPLANATION.to_string()
}

/// Convenience: explanation for a whole [`CommandResult`].
pub fn explain_result(result: &CommandResult, is_test_run: bool) -> String {
    explain(&result.stdout, &result.stderr, is_test_run)
}
