use serde::Deserialize;
use serde_json::{Map, Value};

/// A proposed tool invocation, as sent by the host right before it runs a tool
#[derive(Debug, Clone, Deserialize)]
pub struct InterceptionEvent {
    /// Host tool identifier, e.g. "bash"
    pub tool: String,
    /// Tool arguments. Only `command` is read; everything else is ignored.
    #[serde(default)]
    pub args: Map<String, Value>,
}

impl InterceptionEvent {
    pub fn new(tool: impl Into<String>, command: Option<&str>) -> Self {
        let mut args = Map::new();
        if let Some(command) = command {
            args.insert("command".to_string(), Value::String(command.to_string()));
        }
        Self {
            tool: tool.into(),
            args,
        }
    }

    /// The command string, if present, a string, and non-empty
    pub fn command(&self) -> Option<&str> {
        self.args
            .get("command")
            .and_then(Value::as_str)
            .filter(|c| !c.is_empty())
    }
}
