//! External fetch collaborator boundary.
//!
//! Page rendering is delegated to a separate long-lived binary
//! (`courtwatch-fetcher-{name}`, discovered on PATH) speaking
//! line-delimited JSON over stdin/stdout. The protocol is
//! language-agnostic: anything that can render the booking page and
//! answer the two commands below can act as a fetcher, which keeps
//! browser automation, timeouts and backoff out of this process.

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};

use crate::page::PageModel;

/// Commands that fetchers must implement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FetchCommand {
    /// Render the booking page and report the current calendar view.
    Render,
    /// Navigate the rendered calendar one day forward.
    AdvanceDay,
}

/// Request sent to the fetcher, one JSON object per line.
#[derive(Debug, Serialize, Deserialize)]
pub struct FetchRequest {
    pub command: FetchCommand,
    #[serde(default)]
    pub params: serde_json::Value,
}

/// Response read back from the fetcher, one JSON object per line.
#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum FetchResponse<T> {
    Success { data: T },
    Error { error: String },
}

/// Handle to a running fetcher subprocess.
pub struct Fetcher {
    child: Child,
    stdin: ChildStdin,
    stdout: Lines<BufReader<ChildStdout>>,
}

impl Fetcher {
    /// Spawn `courtwatch-fetcher-{name}` from PATH. The process stays
    /// alive for the whole scan so the browser session (and the currently
    /// shown day) persists between calls.
    pub fn spawn(name: &str, headless: bool) -> Result<Self> {
        let binary_name = format!("courtwatch-fetcher-{name}");
        let binary_path = which::which(&binary_name).with_context(|| {
            format!(
                "Fetcher '{name}' not found. Install a binary named {binary_name} on PATH"
            )
        })?;

        let mut command = Command::new(&binary_path);
        if !headless {
            command.arg("--headed");
        }

        let mut child = command
            .stdin(std::process::Stdio::piped())
            .stdout(std::process::Stdio::piped())
            .stderr(std::process::Stdio::inherit()) // let fetcher errors show in the terminal
            .kill_on_drop(true)
            .spawn()
            .with_context(|| format!("Failed to spawn fetcher: {}", binary_path.display()))?;

        let stdin = child
            .stdin
            .take()
            .context("Fetcher stdin was not captured")?;
        let stdout = child
            .stdout
            .take()
            .context("Fetcher stdout was not captured")?;

        Ok(Fetcher {
            child,
            stdin,
            stdout: BufReader::new(stdout).lines(),
        })
    }

    /// Render the page at `url` and return the current calendar view. A
    /// fetcher already showing the page reports the live view without a
    /// fresh navigation, so the day selected by `advance_day` sticks.
    pub async fn render(&mut self, url: &str) -> Result<PageModel> {
        self.call(FetchCommand::Render, serde_json::json!({ "url": url }))
            .await
    }

    /// Move the rendered calendar one day forward.
    pub async fn advance_day(&mut self) -> Result<()> {
        self.call(FetchCommand::AdvanceDay, serde_json::Value::Null)
            .await
    }

    async fn call<R: DeserializeOwned>(
        &mut self,
        command: FetchCommand,
        params: serde_json::Value,
    ) -> Result<R> {
        let request = FetchRequest { command, params };
        let mut line =
            serde_json::to_string(&request).context("Failed to serialize fetcher request")?;
        line.push('\n');

        self.stdin
            .write_all(line.as_bytes())
            .await
            .context("Failed to write to fetcher stdin")?;
        self.stdin.flush().await.context("Failed to flush fetcher stdin")?;

        let response = self
            .stdout
            .next_line()
            .await
            .context("Failed to read from fetcher stdout")?
            .context("Fetcher closed its stdout")?;

        match serde_json::from_str::<FetchResponse<R>>(&response)
            .context("Failed to parse fetcher response")?
        {
            FetchResponse::Success { data } => Ok(data),
            FetchResponse::Error { error } => anyhow::bail!("Fetcher error: {error}"),
        }
    }
}

impl Drop for Fetcher {
    fn drop(&mut self) {
        // kill_on_drop finishes the job; this just asks politely first.
        let _ = self.child.start_kill();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_serializes_with_snake_case_command() {
        let request = FetchRequest {
            command: FetchCommand::AdvanceDay,
            params: serde_json::Value::Null,
        };

        let json = serde_json::to_string(&request).unwrap();
        assert_eq!(json, r#"{"command":"advance_day","params":null}"#);
    }

    #[test]
    fn test_success_response_carries_page_model() {
        let raw = r#"{"status": "success", "data": {"elements":
            [{"text": "18:00", "tag": "b"}]}}"#;

        let response: FetchResponse<PageModel> = serde_json::from_str(raw).unwrap();
        match response {
            FetchResponse::Success { data } => {
                assert_eq!(data.elements.len(), 1);
                assert_eq!(data.elements[0].text, "18:00");
            }
            FetchResponse::Error { .. } => panic!("expected success"),
        }
    }

    #[test]
    fn test_error_response_parses() {
        let raw = r#"{"status": "error", "error": "page load timed out"}"#;

        let response: FetchResponse<PageModel> = serde_json::from_str(raw).unwrap();
        assert!(matches!(response, FetchResponse::Error { error } if error.contains("timed out")));
    }
}
