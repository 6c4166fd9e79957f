//! Structured observability hooks for turns, tool calls and pipeline runs.
//!
//! Events are emitted at `info!` level unless noted. Secret values are never
//! passed to these functions.

use tracing::info;

/// Span tagging every event of a pipeline run with its run id and package.
///
/// Attach it with [`tracing::Instrument`] so it stays valid across awaits.
///
/// # Example
///
/// ```ignore
/// use tracing::Instrument;
/// async { /* stages */ }.instrument(pipeline_span("2f1c…", "com.example.app")).await;
/// ```
pub fn pipeline_span(run_id: &str, package: &str) -> tracing::Span {
    tracing::info_span!("droidrelay.pipeline", run_id = %run_id, package = %package)
}

/// Emit event: a user turn started.
pub fn emit_turn_started(visible_len: usize, hidden_len: usize) {
    info!(event = "turn.started", visible_len, hidden_len);
}

/// Emit event: a completion reply was classified.
pub fn emit_reply_classified(has_command: bool, has_human_text: bool) {
    info!(event = "turn.classified", has_command, has_human_text);
}

/// Emit event: a tool command was routed.
///
/// `outcome` is one of `handled`, `unknown`, `missing_arguments`, `malformed`.
pub fn emit_command_routed(name: &str, outcome: &str) {
    info!(event = "command.routed", name = %name, outcome = %outcome);
}

/// Emit event: a host process exited (debug level).
pub fn emit_process_finished(exit_code: i32, duration_ms: u64) {
    tracing::debug!(event = "process.finished", exit_code, duration_ms);
}

/// Emit event: a pipeline stage started.
pub fn emit_stage_started(stage: &str) {
    info!(event = "pipeline.stage_started", stage = %stage);
}

/// Emit event: a pipeline stage finished.
pub fn emit_stage_finished(stage: &str, success: bool, duration_ms: u64) {
    info!(
        event = "pipeline.stage_finished",
        stage = %stage,
        success,
        duration_ms,
    );
}

/// Emit event: a pipeline reached a terminal state.
pub fn emit_pipeline_finished(run_id: &str, state: &str, duration_ms: u64) {
    info!(
        event = "pipeline.finished",
        run_id = %run_id,
        state = %state,
        duration_ms,
    );
}

/// Emit event: a completion round trip failed (warning level).
pub fn emit_completion_error(error: &dyn std::fmt::Display) {
    tracing::warn!(event = "turn.completion_error", error = %error);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pipeline_span_create() {
        let _guard = pipeline_span("test-run-id", "com.example.app").entered();
        emit_stage_started("running_unit_tests");
        emit_stage_finished("running_unit_tests", true, 12);
    }
}
