//! Stub validators for unit tests.

use crate::config::ValidatorCommand;
use serde_json::Value;
use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

/// Inline `sh -c` validator
pub fn sh(script: &str) -> ValidatorCommand {
    ValidatorCommand {
        program: "sh".to_string(),
        args: vec!["-c".to_string(), script.to_string()],
    }
}

/// A validator script that records its stdin and how often it ran, then
/// executes `body`.
pub struct StubValidator {
    dir: TempDir,
}

impl StubValidator {
    pub fn new(body: &str) -> Self {
        let dir = TempDir::new().unwrap();
        let script = format!(
            "cat > '{}'\necho call >> '{}'\n{}\n",
            dir.path().join("input.json").display(),
            dir.path().join("calls").display(),
            body
        );
        fs::write(dir.path().join("validator.sh"), script).unwrap();
        Self { dir }
    }

    fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    pub fn command(&self) -> ValidatorCommand {
        ValidatorCommand {
            program: "sh".to_string(),
            args: vec![self.path("validator.sh").display().to_string()],
        }
    }

    /// Exact bytes received on stdin by the last run
    pub fn raw_input(&self) -> String {
        fs::read_to_string(self.path("input.json")).unwrap_or_default()
    }

    pub fn input_json(&self) -> Value {
        serde_json::from_str(&self.raw_input()).unwrap()
    }

    pub fn calls(&self) -> usize {
        fs::read_to_string(self.path("calls"))
            .map(|s| s.lines().count())
            .unwrap_or(0)
    }
}
