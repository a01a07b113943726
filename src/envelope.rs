use anyhow::{Context, Result};
use serde::Serialize;

/// Tool name the validator expects for shell commands
pub const ENVELOPE_TOOL_NAME: &str = "Bash";

#[derive(Debug, Serialize)]
pub struct ToolInput<'a> {
    pub command: &'a str,
}

/// Input JSON for the validator, in Claude Code's PreToolUse shape
#[derive(Debug, Serialize)]
pub struct ValidatorEnvelope<'a> {
    pub tool_name: &'static str,
    pub tool_input: ToolInput<'a>,
}

impl<'a> ValidatorEnvelope<'a> {
    pub fn new(command: &'a str) -> Self {
        Self {
            tool_name: ENVELOPE_TOOL_NAME,
            tool_input: ToolInput { command },
        }
    }

    /// Serialize to a single line of JSON
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).context("Failed to serialize validator envelope")
    }
}
