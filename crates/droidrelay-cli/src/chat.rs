//! Interactive terminal chat.

use anyhow::{Context, Result};
use droidrelay_core::{Agent, Message, Role};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

const PROMPT: &str = "> ";

/// Lines to print for visible messages from index `from` on.
///
/// The person's own turns are not echoed back.
pub fn render_new(messages: &[Message], from: usize) -> Vec<String> {
    messages
        .iter()
        .skip(from)
        .filter(|m| m.role != Role::VisibleUser)
        .map(|m| format!("assistant: {}", m.content))
        .collect()
}

/// Read lines from stdin until EOF, `/exit` or Ctrl-C.
pub async fn run(agent: &mut Agent) -> Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();
    let mut shown = agent.store().visible().len();

    loop {
        stdout.write_all(PROMPT.as_bytes()).await?;
        stdout.flush().await?;

        let Some(line) = lines.next_line().await.context("failed to read stdin")? else {
            break;
        };
        let line = line.trim();
        if matches!(line, "/exit" | "/quit") {
            break;
        }
        if line.is_empty() {
            continue;
        }

        let cancel = agent.cancel_token();
        tokio::select! {
            report = agent.send_message(line) => {
                tracing::debug!(round_trips = report.round_trips, commands = report.commands.len(), "turn finished");
            }
            _ = tokio::signal::ctrl_c() => {
                cancel.cancel();
                stdout.write_all(b"\nInterrupted.\n").await?;
                break;
            }
        }

        let visible = agent.store().visible();
        for text in render_new(visible, shown) {
            stdout.write_all(text.as_bytes()).await?;
            stdout.write_all(b"\n").await?;
        }
        shown = visible.len();
    }

    stdout.flush().await?;
    Ok(())
}
