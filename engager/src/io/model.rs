//! Language-model abstraction for classification and generation calls.
//!
//! The [`Model`] trait decouples decision and comment generation from the
//! concrete model backend. Every call is single-shot and stateless: no
//! conversation memory, no few-shot history across items. Tests use scripted
//! models that return predetermined outputs without spawning processes.

use std::io::Write;
use std::process::Command;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use tracing::{debug, instrument, warn};

use crate::io::process::run_command_with_timeout;

/// Parameters for one model invocation.
#[derive(Debug, Clone)]
pub struct ModelRequest {
    /// Prompt text fed to the model on stdin.
    pub prompt: String,
    /// Optional PNG snapshot for multimodal calls.
    pub image_png: Option<Vec<u8>>,
    /// Optional JSON Schema constraining the model output.
    pub output_schema: Option<&'static str>,
    /// Maximum time to wait for a response.
    pub timeout: Duration,
}

/// Abstraction over model backends. One call, one free-text response.
pub trait Model {
    fn complete(&self, request: &ModelRequest) -> Result<String>;
}

/// Model backed by a configured command.
///
/// The prompt is written to the child's stdin and the response is read from
/// its stdout. When the request carries an output schema or an image, they
/// are handed over as temp files via `--output-schema` / `--image` arguments.
pub struct CommandModel {
    command: Vec<String>,
    output_limit_bytes: usize,
}

impl CommandModel {
    pub fn new(command: Vec<String>, output_limit_bytes: usize) -> Result<Self> {
        if command.is_empty() || command[0].trim().is_empty() {
            return Err(anyhow!("model command must be a non-empty array"));
        }
        Ok(Self {
            command,
            output_limit_bytes,
        })
    }
}

impl Model for CommandModel {
    #[instrument(skip_all, fields(timeout_secs = request.timeout.as_secs(), multimodal = request.image_png.is_some()))]
    fn complete(&self, request: &ModelRequest) -> Result<String> {
        let mut cmd = Command::new(&self.command[0]);
        cmd.args(&self.command[1..]);

        // Temp files must outlive the child process.
        let schema_file = match request.output_schema {
            Some(schema) => {
                let file = write_handoff_file(schema.as_bytes(), ".schema.json")?;
                cmd.arg("--output-schema").arg(file.path());
                Some(file)
            }
            None => None,
        };
        let image_file = match &request.image_png {
            Some(bytes) => {
                let file = write_handoff_file(bytes, ".png")?;
                cmd.arg("--image").arg(file.path());
                Some(file)
            }
            None => None,
        };

        let output = run_command_with_timeout(
            cmd,
            Some(request.prompt.as_bytes()),
            request.timeout,
            self.output_limit_bytes,
        )
        .context("run model command")?;

        drop(schema_file);
        drop(image_file);

        if output.timed_out {
            warn!(timeout_secs = request.timeout.as_secs(), "model timed out");
            return Err(anyhow!("model timed out after {:?}", request.timeout));
        }
        if !output.status.success() {
            warn!(exit_code = ?output.status.code(), "model command failed");
            return Err(anyhow!(
                "model command failed with status {:?}: {}",
                output.status.code(),
                String::from_utf8_lossy(&output.stderr).trim()
            ));
        }

        let response = String::from_utf8_lossy(&output.stdout).trim().to_string();
        if response.is_empty() {
            return Err(anyhow!("model returned empty output"));
        }
        debug!(chars = response.len(), "model responded");
        Ok(response)
    }
}

fn write_handoff_file(bytes: &[u8], suffix: &str) -> Result<tempfile::NamedTempFile> {
    let mut file = tempfile::Builder::new()
        .prefix("engager")
        .suffix(suffix)
        .tempfile()
        .context("create handoff temp file")?;
    file.write_all(bytes).context("write handoff temp file")?;
    file.flush().context("flush handoff temp file")?;
    Ok(file)
}

/// Parse a model response as JSON and validate it against a one-field schema
/// (Draft 2020-12) before use.
pub fn parse_validated(raw: &str, schema: &str) -> Result<serde_json::Value> {
    let instance: serde_json::Value =
        serde_json::from_str(raw).context("parse model output as json")?;
    let schema_json: serde_json::Value =
        serde_json::from_str(schema).context("parse output schema")?;
    let compiled = jsonschema::options()
        .with_draft(jsonschema::Draft::Draft202012)
        .build(&schema_json)
        .context("compile output schema")?;
    let messages: Vec<String> = compiled
        .iter_errors(&instance)
        .map(|err| err.to_string())
        .collect();
    if !messages.is_empty() {
        return Err(anyhow!(
            "model output failed schema validation:\n- {}",
            messages.join("\n- ")
        ));
    }
    Ok(instance)
}

#[cfg(test)]
mod tests {
    use super::*;

    const TOY_SCHEMA: &str = r#"{
        "type": "object",
        "required": ["engage"],
        "properties": { "engage": { "type": "boolean" } },
        "additionalProperties": false
    }"#;

    fn request(prompt: &str) -> ModelRequest {
        ModelRequest {
            prompt: prompt.to_string(),
            image_png: None,
            output_schema: None,
            timeout: Duration::from_secs(5),
        }
    }

    #[test]
    fn command_model_echoes_stdin_response() {
        let model = CommandModel::new(vec!["cat".to_string()], 10_000).expect("model");
        let response = model.complete(&request("hello model")).expect("complete");
        assert_eq!(response, "hello model");
    }

    #[test]
    fn command_model_rejects_empty_output() {
        let model = CommandModel::new(vec!["true".to_string()], 10_000).expect("model");
        let err = model.complete(&request("prompt")).unwrap_err();
        assert!(err.to_string().contains("empty output"));
    }

    #[test]
    fn command_model_rejects_nonzero_exit() {
        let model = CommandModel::new(vec!["false".to_string()], 10_000).expect("model");
        assert!(model.complete(&request("prompt")).is_err());
    }

    #[test]
    fn command_model_requires_command() {
        assert!(CommandModel::new(Vec::new(), 10_000).is_err());
        assert!(CommandModel::new(vec!["  ".to_string()], 10_000).is_err());
    }

    #[test]
    fn parse_validated_accepts_conforming_output() {
        let value = parse_validated(r#"{"engage": true}"#, TOY_SCHEMA).expect("parse");
        assert_eq!(value["engage"], serde_json::Value::Bool(true));
    }

    #[test]
    fn parse_validated_rejects_extra_fields() {
        let err = parse_validated(r#"{"engage": true, "why": "x"}"#, TOY_SCHEMA).unwrap_err();
        assert!(err.to_string().contains("schema validation"));
    }

    #[test]
    fn parse_validated_rejects_non_json() {
        assert!(parse_validated("sure, engaging!", TOY_SCHEMA).is_err());
    }
}
