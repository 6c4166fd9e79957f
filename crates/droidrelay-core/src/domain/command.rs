//! Tool commands and process results.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::error::CommandError;

/// Exit code reserved for "the process could not be launched".
pub const LAUNCH_FAILURE_EXIT_CODE: i32 = -1;

const NAME_KEYS: [&str; 4] = ["name", "tool", "method", "function"];
const ARGUMENT_KEYS: [&str; 4] = ["arguments", "parameters", "params", "args"];

/// Fold an arbitrary tool name into canonical snake_case.
///
/// Hyphens, underscores and whitespace become a single `_`, a lower-to-upper
/// camelCase boundary becomes `_`, everything is lowercased. The output is a
/// fixed point: `normalize_name(normalize_name(s)) == normalize_name(s)`.
pub fn normalize_name(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len() + 4);
    let mut prev: Option<char> = None;

    for ch in raw.trim().chars() {
        if ch == '-' || ch == '_' || ch.is_whitespace() {
            if !out.is_empty() && !out.ends_with('_') {
                out.push('_');
            }
        } else if ch.is_uppercase() && !ch.to_lowercase().eq(std::iter::once(ch)) {
            let boundary = prev.is_some_and(|p| p.is_lowercase() || p.is_ascii_digit());
            if boundary && !out.ends_with('_') {
                out.push('_');
            }
            out.extend(ch.to_lowercase());
        } else {
            out.push(ch);
        }
        prev = Some(ch);
    }

    while out.ends_with('_') {
        out.pop();
    }
    out
}

/// Argument keys compare without case or separators (`projectPath` == `project_path`).
fn fold_key(key: &str) -> String {
    key.chars()
        .filter(|c| !matches!(c, '_' | '-' | ' '))
        .flat_map(char::to_lowercase)
        .collect()
}

/// A structured, routable instruction extracted from completion text.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolCommand {
    /// Canonical snake_case tool name.
    pub name: String,

    /// Raw arguments as supplied by the model.
    pub arguments: Map<String, Value>,
}

impl ToolCommand {
    /// Create a command, normalizing the name.
    pub fn new(name: &str, arguments: Map<String, Value>) -> Self {
        Self {
            name: normalize_name(name),
            arguments,
        }
    }

    /// Interpret an extracted JSON object as a tool command.
    ///
    /// Accepts `{"name": .., "arguments": {..}}` and the common variants
    /// (`method`/`parameters`, OpenAI-style `function` objects, arguments
    /// encoded as a JSON string). With no argument key, the remaining
    /// top-level fields are taken as arguments.
    pub fn from_json(object: &Map<String, Value>) -> Result<Self, CommandError> {
        if let Some(Value::Object(function)) = object.get("function") {
            if function.contains_key("name") {
                return Self::from_json(function);
            }
        }

        let (name_key, name_value) = NAME_KEYS
            .iter()
            .find_map(|k| object.get(*k).map(|v| (*k, v)))
            .ok_or(CommandError::MissingName)?;

        let name = match name_value {
            Value::String(s) if !s.trim().is_empty() => s.as_str(),
            Value::String(_) => return Err(CommandError::EmptyName),
            _ => return Err(CommandError::MissingName),
        };

        let arguments = match ARGUMENT_KEYS.iter().find_map(|k| object.get(*k)) {
            Some(value) => arguments_from_value(value)?,
            None => object
                .iter()
                .filter(|(k, _)| k.as_str() != name_key)
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        };

        Ok(Self::new(name, arguments))
    }

    /// Look up an argument, folding key spelling.
    pub fn argument(&self, key: &str) -> Option<&Value> {
        if let Some(v) = self.arguments.get(key) {
            return Some(v);
        }
        let wanted = fold_key(key);
        self.arguments
            .iter()
            .find(|(k, _)| fold_key(k) == wanted)
            .map(|(_, v)| v)
    }

    /// Whether an argument is present with a usable (non-null, non-blank) value.
    pub fn has_argument(&self, key: &str) -> bool {
        self.str_arg(key).is_some()
    }

    /// String view of a scalar argument. Blank strings and `null` read as absent.
    pub fn str_arg(&self, key: &str) -> Option<String> {
        match self.argument(key)? {
            Value::String(s) if s.trim().is_empty() => None,
            Value::String(s) => Some(s.trim().to_string()),
            Value::Number(n) => Some(n.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            Value::Null => None,
            other => Some(other.to_string()),
        }
    }

    /// Boolean argument, accepting `true`/`false` and their string forms.
    pub fn bool_arg(&self, key: &str) -> Option<bool> {
        match self.argument(key)? {
            Value::Bool(b) => Some(*b),
            Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
                "true" | "yes" | "1" => Some(true),
                "false" | "no" | "0" => Some(false),
                _ => None,
            },
            _ => None,
        }
    }
}

fn arguments_from_value(value: &Value) -> Result<Map<String, Value>, CommandError> {
    match value {
        Value::Object(map) => Ok(map.clone()),
        Value::Null => Ok(Map::new()),
        Value::String(encoded) if encoded.trim().is_empty() => Ok(Map::new()),
        Value::String(encoded) => match serde_json::from_str::<Value>(encoded) {
            Ok(Value::Object(map)) => Ok(map),
            _ => Err(CommandError::InvalidArguments {
                found: "string that is not a JSON object".to_string(),
            }),
        },
        Value::Array(_) => Err(CommandError::InvalidArguments {
            found: "array".to_string(),
        }),
        Value::Bool(_) | Value::Number(_) => Err(CommandError::InvalidArguments {
            found: "scalar".to_string(),
        }),
    }
}

/// Captured outcome of a host process.
///
/// `exit_code == 0` is success, `> 0` is a process-reported failure, and
/// [`LAUNCH_FAILURE_EXIT_CODE`] means the process never ran.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CommandResult {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl CommandResult {
    pub fn new(exit_code: i32, stdout: impl Into<String>, stderr: impl Into<String>) -> Self {
        Self {
            exit_code,
            stdout: stdout.into(),
            stderr: stderr.into(),
        }
    }

    /// Sentinel for a process that could not be launched.
    pub fn launch_failure(description: impl Into<String>) -> Self {
        Self::new(LAUNCH_FAILURE_EXIT_CODE, String::new(), description)
    }

    pub fn success(&self) -> bool {
        self.exit_code == 0
    }

    /// Whether the process actually ran (regardless of its exit status).
    pub fn launched(&self) -> bool {
        self.exit_code >= 0
    }

    /// Full markdown rendering, used for the hidden channel.
    pub fn to_formatted_string(&self) -> String {
        format!(
            "**Exit Code:** {}\n**Standard Output:**\n```\n{}\n```\n**Standard Error:**\n```\n{}\n```",
            self.exit_code,
            self.stdout.trim_end(),
            self.stderr.trim_end()
        )
    }

    /// The last `max_lines` non-blank lines of stdout, for visible summaries.
    pub fn stdout_tail(&self, max_lines: usize) -> String {
        let lines: Vec<&str> = self
            .stdout
            .lines()
            .filter(|l| !l.trim().is_empty())
            .collect();
        let start = lines.len().saturating_sub(max_lines);
        lines[start..].join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    fn object(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("test fixture must be an object"),
        }
    }

    #[test]
    fn test_normalize_separators_and_case() {
        assert_eq!(normalize_name("EXECUTE-SHELL COMMAND"), "execute_shell_command");
        assert_eq!(normalize_name("run-android-tests"), "run_android_tests");
        assert_eq!(normalize_name("  Run  Tests  "), "run_tests");
        assert_eq!(normalize_name("runAndroidTests"), "run_android_tests");
        assert_eq!(normalize_name("__publish__version__"), "publish_version");
    }

    #[test]
    fn test_normalize_is_idempotent() {
        for raw in [
            "EXECUTE-SHELL COMMAND",
            "runAndroidTests",
            "release_app",
            "Get Access-Token",
            "draft--version",
            "v2Upload",
            "",
        ] {
            let once = normalize_name(raw);
            assert_eq!(normalize_name(&once), once, "not idempotent for {raw:?}");
        }
    }

    #[test]
    fn test_caseless_capitals_are_not_boundaries() {
        // U+1D400 is uppercase but has no lowercase form.
        assert_eq!(normalize_name("A\u{1D400}"), "a\u{1D400}");
        assert_eq!(normalize_name("a\u{1D400}"), "a\u{1D400}");
    }

    fn tool_name_strategy() -> impl Strategy<Value = String> {
        prop_oneof![
            "[A-Za-z][A-Za-z0-9]{0,8}([ _-]{1,3}[A-Za-z0-9]{1,8}){0,3}",
            "[ _-]{0,2}[a-z]{1,6}([A-Z][a-z0-9]{0,6}){0,3}[ _-]{0,2}",
            "\\PC{0,24}",
        ]
    }

    proptest! {
        #[test]
        fn test_normalize_is_a_fixed_point(raw in tool_name_strategy()) {
            let once = normalize_name(&raw);
            prop_assert_eq!(normalize_name(&once), once);
        }

        #[test]
        fn test_normalized_ascii_names_are_snake_case(
            raw in "[A-Za-z0-9 _-]{0,24}",
        ) {
            let name = normalize_name(&raw);
            prop_assert!(!name.starts_with('_') && !name.ends_with('_'));
            prop_assert!(!name.contains("__"));
            prop_assert!(name
                .chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_'));
        }

        #[test]
        fn test_separator_spelling_does_not_change_name(
            words in prop::collection::vec("[a-z]{1,6}[0-9]{0,2}", 1..4),
            separator in prop_oneof![Just("_"), Just("-"), Just(" "), Just("__")],
            upper in any::<bool>(),
        ) {
            let joined = words.join(separator);
            let raw = if upper { joined.to_ascii_uppercase() } else { joined };
            prop_assert_eq!(normalize_name(&raw), words.join("_"));
        }
    }

    #[test]
    fn test_from_json_name_and_arguments() {
        let cmd = ToolCommand::from_json(&object(json!({
            "name": "EXECUTE-SHELL COMMAND",
            "arguments": {"command": "echo hi"}
        })))
        .unwrap();
        assert_eq!(cmd.name, "execute_shell_command");
        assert_eq!(cmd.str_arg("command").as_deref(), Some("echo hi"));
    }

    #[test]
    fn test_from_json_method_parameters() {
        let cmd = ToolCommand::from_json(&object(json!({
            "method": "run_android_tests",
            "parameters": {"projectPath": "/tmp/app"}
        })))
        .unwrap();
        assert_eq!(cmd.name, "run_android_tests");
        assert_eq!(cmd.str_arg("project_path").as_deref(), Some("/tmp/app"));
    }

    #[test]
    fn test_from_json_openai_function_with_string_arguments() {
        let cmd = ToolCommand::from_json(&object(json!({
            "type": "function",
            "function": {"name": "publish_version", "arguments": "{\"packageName\":\"com.app\"}"}
        })))
        .unwrap();
        assert_eq!(cmd.name, "publish_version");
        assert_eq!(cmd.str_arg("packageName").as_deref(), Some("com.app"));
    }

    #[test]
    fn test_from_json_flat_arguments() {
        let cmd =
            ToolCommand::from_json(&object(json!({"tool": "shell", "command": "ls"}))).unwrap();
        assert_eq!(cmd.name, "shell");
        assert_eq!(cmd.arguments.len(), 1);
        assert!(cmd.has_argument("command"));
    }

    #[test]
    fn test_from_json_rejects_missing_or_bad_shapes() {
        assert_eq!(
            ToolCommand::from_json(&object(json!({"answer": 42}))),
            Err(CommandError::MissingName)
        );
        assert_eq!(
            ToolCommand::from_json(&object(json!({"name": "  "}))),
            Err(CommandError::EmptyName)
        );
        assert!(matches!(
            ToolCommand::from_json(&object(json!({"name": "x", "arguments": [1, 2]}))),
            Err(CommandError::InvalidArguments { .. })
        ));
    }

    #[test]
    fn test_argument_accessors() {
        let cmd = ToolCommand::new(
            "release_app",
            object(json!({"sign": "false", "retries": 3, "blank": " ", "none": null})),
        );
        assert_eq!(cmd.bool_arg("sign"), Some(false));
        assert_eq!(cmd.str_arg("retries").as_deref(), Some("3"));
        assert!(!cmd.has_argument("blank"));
        assert!(!cmd.has_argument("none"));
        assert!(!cmd.has_argument("missing"));
    }

    #[test]
    fn test_command_result_states() {
        assert!(CommandResult::new(0, "ok", "").success());
        let failed = CommandResult::new(2, "", "boom");
        assert!(!failed.success());
        assert!(failed.launched());
        let sentinel = CommandResult::launch_failure("no such interpreter");
        assert_eq!(sentinel.exit_code, LAUNCH_FAILURE_EXIT_CODE);
        assert!(!sentinel.launched());
        assert!(sentinel.stdout.is_empty());
    }

    #[test]
    fn test_stdout_tail_skips_blank_lines() {
        let result = CommandResult::new(0, "a\n\nb\nc\n\n", "");
        assert_eq!(result.stdout_tail(2), "b\nc");
        assert_eq!(result.stdout_tail(10), "a\nb\nc");
    }
}
