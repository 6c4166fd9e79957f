//! Tool-call detection in free-form completion text.
//!
//! Three encodings are recognized, tried in order:
//! 1. the whole (trimmed) reply is a single JSON object;
//! 2. a `@tool <name>` marker line followed by `key=value` lines;
//! 3. a JSON object embedded somewhere inside narrative text.
//!
//! Extraction never fails: anything that does not parse is treated as
//! plain human text.

use serde_json::{Map, Value};

use crate::domain::{CommandError, ToolCommand};

/// Marker that opens the `key=value` encoding.
pub const TOOL_MARKER: &str = "@tool";

/// Split of a completion reply into the part meant for a person and the
/// part meant for the router.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Classification {
    /// Narrative text left once the command region is removed.
    pub human_text: Option<String>,

    /// The extracted JSON object, exactly as found.
    pub command: Option<Map<String, Value>>,
}

impl Classification {
    /// Interpret the extracted object as a [`ToolCommand`].
    ///
    /// `Ok(None)` means no command was found; `Err` means an object was
    /// found but it does not describe a tool call.
    pub fn tool_command(&self) -> Result<Option<ToolCommand>, CommandError> {
        self.command.as_ref().map(ToolCommand::from_json).transpose()
    }
}

/// Split completion `text` into human text and an optional command object.
pub fn classify(text: &str) -> Classification {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Classification::default();
    }

    if let Ok(Value::Object(map)) = serde_json::from_str::<Value>(trimmed) {
        return Classification {
            human_text: None,
            command: Some(map),
        };
    }

    if let Some(command) = parse_marker_block(trimmed) {
        return Classification {
            human_text: None,
            command: Some(command),
        };
    }

    if let Some((start, end)) = find_balanced_object(trimmed) {
        if let Ok(Value::Object(map)) = serde_json::from_str::<Value>(&trimmed[start..end]) {
            let parts: Vec<&str> = [trimmed[..start].trim(), trimmed[end..].trim()]
                .into_iter()
                .filter(|p| !p.is_empty())
                .collect();
            let human_text = (!parts.is_empty()).then(|| parts.join("\n"));
            return Classification {
                human_text,
                command: Some(map),
            };
        }
    }

    Classification {
        human_text: Some(trimmed.to_string()),
        command: None,
    }
}

/// `@tool <name>` followed by `key=value` lines.
fn parse_marker_block(text: &str) -> Option<Map<String, Value>> {
    let mut lines = text.lines();
    let header = lines.next()?.trim();
    let rest = header.strip_prefix(TOOL_MARKER)?;
    if !rest.starts_with(char::is_whitespace) {
        return None;
    }
    let name = rest.trim();
    if name.is_empty() || name.contains(char::is_whitespace) {
        return None;
    }

    let mut arguments = Map::new();
    for line in lines {
        let Some((key, value)) = line.split_once('=') else {
            continue;
        };
        let key = key.trim();
        if key.is_empty() {
            continue;
        }
        let value = strip_quotes(value.trim());
        arguments.insert(key.to_string(), Value::String(value.to_string()));
    }

    let mut command = Map::new();
    command.insert("name".to_string(), Value::String(name.to_string()));
    command.insert("arguments".to_string(), Value::Object(arguments));
    Some(command)
}

fn strip_quotes(value: &str) -> &str {
    for quote in ['"', '\''] {
        if value.len() >= 2 && value.starts_with(quote) && value.ends_with(quote) {
            return &value[1..value.len() - 1];
        }
    }
    value
}

/// Byte range `[start, end)` from the first `{` to its matching `}`.
///
/// Braces inside JSON string literals are not counted. `None` when depth
/// never returns to zero.
fn find_balanced_object(text: &str) -> Option<(usize, usize)> {
    let start = text.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, ch) in text[start..].char_indices() {
        if in_string {
            if escaped {
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == '"' {
                in_string = false;
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some((start, start + offset + ch.len_utf8()));
                }
            }
            _ => {}
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_blank_input_yields_nothing() {
        assert_eq!(classify(""), Classification::default());
        assert_eq!(classify("  \n\t "), Classification::default());
    }

    #[test]
    fn test_plain_text_has_no_command() {
        let c = classify("  Sure, the build looks fine.  ");
        assert_eq!(c.human_text.as_deref(), Some("Sure, the build looks fine."));
        assert!(c.command.is_none());
        assert_eq!(c.tool_command(), Ok(None));
    }

    #[test]
    fn test_whole_text_json_object() {
        let c = classify(r#" {"name":"EXECUTE-SHELL COMMAND","arguments":{"command":"echo hi"}} "#);
        assert!(c.human_text.is_none());
        let cmd = c.tool_command().unwrap().unwrap();
        assert_eq!(cmd.name, "execute_shell_command");
        assert_eq!(cmd.str_arg("command").as_deref(), Some("echo hi"));
    }

    #[test]
    fn test_marker_block() {
        let text = "@tool run_android_tests\nprojectPath = \"/work/app\"\nthis line is ignored\nbuildVariant=Release\n=orphan";
        let c = classify(text);
        assert!(c.human_text.is_none());
        let cmd = c.tool_command().unwrap().unwrap();
        assert_eq!(cmd.name, "run_android_tests");
        assert_eq!(cmd.str_arg("projectPath").as_deref(), Some("/work/app"));
        assert_eq!(cmd.str_arg("buildVariant").as_deref(), Some("Release"));
        assert_eq!(cmd.arguments.len(), 2);
    }

    #[test]
    fn test_marker_without_name_falls_through() {
        let c = classify("@tool\nkey=value");
        assert!(c.command.is_none());
        assert_eq!(c.human_text.as_deref(), Some("@tool\nkey=value"));
    }

    #[test]
    fn test_embedded_object_splits_human_text() {
        let text = "Running it now.\n{\"name\":\"shell\",\"arguments\":{\"command\":\"ls\"}}\nI'll report back.";
        let c = classify(text);
        assert_eq!(
            c.human_text.as_deref(),
            Some("Running it now.\nI'll report back.")
        );
        assert_eq!(
            Value::Object(c.command.unwrap()),
            json!({"name":"shell","arguments":{"command":"ls"}})
        );
    }

    #[test]
    fn test_embedded_object_excludes_json_region_exactly() {
        let objects = [
            json!({"name": "a"}),
            json!({"name": "b", "arguments": {"nested": {"deep": [1, 2, {"x": "}"}]}}}),
            json!({"text": "a { brace } and \"quote\""}),
        ];
        let frames = [
            ("Before.", "After."),
            ("   padded   ", ""),
            ("", "trailing words"),
            ("multi\nline pre", "multi\nline post"),
        ];
        for object in &objects {
            for (pre, post) in frames {
                let text = format!("{pre}{object}{post}");
                let c = classify(&text);
                let expected: Vec<&str> = [pre.trim(), post.trim()]
                    .into_iter()
                    .filter(|s| !s.is_empty())
                    .collect();
                let expected = (!expected.is_empty()).then(|| expected.join("\n"));
                assert_eq!(c.human_text, expected, "human text for {text:?}");
                assert_eq!(c.command.map(Value::Object).as_ref(), Some(object));
            }
        }
    }

    #[test]
    fn test_unbalanced_braces_never_yield_command() {
        for text in [
            "look at this { \"name\": \"shell\"",
            "{{{",
            "text } then { never closed",
            "{ \"name\": \"x\", \"s\": \"}\" ",
        ] {
            let c = classify(text);
            assert!(c.command.is_none(), "unexpected command in {text:?}");
            assert_eq!(c.human_text.as_deref(), Some(text.trim()));
        }
    }

    #[test]
    fn test_balanced_non_json_region_is_human_text() {
        let c = classify("Use a set like {a, b} here.");
        assert!(c.command.is_none());
        assert_eq!(c.human_text.as_deref(), Some("Use a set like {a, b} here."));
    }

    #[test]
    fn test_object_without_name_is_malformed() {
        let c = classify("Result: {\"answer\": 42}");
        assert!(c.command.is_some());
        assert_eq!(c.tool_command(), Err(CommandError::MissingName));
    }

    #[test]
    fn test_fenced_json_block() {
        let c = classify("```json\n{\"name\":\"get_token\"}\n```");
        assert_eq!(c.tool_command().unwrap().unwrap().name, "get_token");
        assert_eq!(c.human_text.as_deref(), Some("```json\n```"));
    }
}
