use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

const CONFIG_FILENAME: &str = "config.yaml";
const DEFAULT_SHELL_TOOL: &str = "bash";
const DEFAULT_PROGRAM: &str = "python3";
const DEFAULT_SCRIPT: &str = "~/.claude/hooks/block-git-rewrites.py";
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// What to do when the validator itself fails (crash, bad exit code, timeout)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailurePolicy {
    /// Treat the failure like a denial
    #[default]
    Block,
    /// Let the command run and log a warning
    Allow,
}

/// Validator command as written in YAML
#[derive(Debug, Deserialize)]
struct ValidatorRaw {
    program: String,
    #[serde(default)]
    args: Vec<String>,
}

/// Raw configuration structure (as parsed from YAML)
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct GateConfigRaw {
    shell_tool: Option<String>,
    validator: Option<ValidatorRaw>,
    timeout_secs: Option<u64>,
    on_validator_error: Option<FailurePolicy>,
    log_file: Option<String>,
}

/// Resolved validator invocation (home directory expanded)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatorCommand {
    pub program: String,
    pub args: Vec<String>,
}

/// Resolved configuration
#[derive(Debug, Clone)]
pub struct GateConfig {
    pub shell_tool: String,
    pub validator: ValidatorCommand,
    /// `None` waits for the validator indefinitely
    pub timeout: Option<Duration>,
    pub on_validator_error: FailurePolicy,
    pub log_file: Option<PathBuf>,
}

impl Default for GateConfig {
    fn default() -> Self {
        GateConfig {
            shell_tool: DEFAULT_SHELL_TOOL.to_string(),
            validator: default_validator(),
            timeout: Some(Duration::from_secs(DEFAULT_TIMEOUT_SECS)),
            on_validator_error: FailurePolicy::Block,
            log_file: None,
        }
    }
}

fn default_validator() -> ValidatorCommand {
    ValidatorCommand {
        program: DEFAULT_PROGRAM.to_string(),
        args: vec![expand_home(DEFAULT_SCRIPT)],
    }
}

fn home_dir() -> PathBuf {
    PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".to_string()))
}

/// Expand a leading `~` or `~/` against $HOME
fn expand_home(value: &str) -> String {
    if value == "~" {
        return home_dir().to_string_lossy().to_string();
    }
    match value.strip_prefix("~/") {
        Some(rest) => home_dir().join(rest).to_string_lossy().to_string(),
        None => value.to_string(),
    }
}

/// Default config location: $XDG_CONFIG_HOME/bash-gate/config.yaml
pub fn default_config_path() -> PathBuf {
    let xdg_config = std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".config"));

    xdg_config.join("bash-gate").join(CONFIG_FILENAME)
}

fn resolve(raw: GateConfigRaw, config_path: &Path) -> Result<GateConfig> {
    let shell_tool = raw
        .shell_tool
        .unwrap_or_else(|| DEFAULT_SHELL_TOOL.to_string());
    if shell_tool.trim().is_empty() {
        bail!(
            "Invalid config at {}: 'shell_tool' must not be empty",
            config_path.display()
        );
    }

    let validator = match raw.validator {
        Some(v) => {
            if v.program.trim().is_empty() {
                bail!(
                    "Invalid config at {}: 'validator.program' must not be empty",
                    config_path.display()
                );
            }
            ValidatorCommand {
                program: expand_home(&v.program),
                args: v.args.iter().map(|a| expand_home(a)).collect(),
            }
        }
        None => default_validator(),
    };

    let timeout = match raw.timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS) {
        0 => None,
        secs => Some(Duration::from_secs(secs)),
    };

    Ok(GateConfig {
        shell_tool,
        validator,
        timeout,
        on_validator_error: raw.on_validator_error.unwrap_or_default(),
        log_file: raw.log_file.map(|p| PathBuf::from(expand_home(&p))),
    })
}

/// Loads and validates a config file.
pub fn load_config(config_path: &Path) -> Result<GateConfig> {
    let content = fs::read_to_string(config_path)
        .with_context(|| format!("Failed to read config: {}", config_path.display()))?;

    if content.trim().is_empty() {
        return resolve(GateConfigRaw::default(), config_path);
    }

    let parsed: GateConfigRaw = serde_yaml::from_str(&content)
        .with_context(|| format!("Failed to parse config: {}", config_path.display()))?;

    resolve(parsed, config_path)
}

/// Loads the config from an explicit path, or from the default location.
/// An explicit path must exist; a missing default file yields built-in defaults.
pub fn find_config(explicit: Option<&Path>) -> Result<GateConfig> {
    if let Some(path) = explicit {
        return load_config(path);
    }

    let path = default_config_path();
    if path.exists() {
        load_config(&path)
    } else {
        Ok(GateConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write_config(temp: &TempDir, content: &str) -> PathBuf {
        let config_path = temp.path().join(CONFIG_FILENAME);
        fs::write(&config_path, content).unwrap();
        config_path
    }

    #[test]
    fn test_defaults() {
        let config = GateConfig::default();
        assert_eq!(config.shell_tool, "bash");
        assert_eq!(config.validator.program, "python3");
        assert_eq!(config.validator.args.len(), 1);
        assert!(config.validator.args[0].ends_with(".claude/hooks/block-git-rewrites.py"));
        assert!(!config.validator.args[0].starts_with('~'));
        assert_eq!(config.timeout, Some(Duration::from_secs(30)));
        assert_eq!(config.on_validator_error, FailurePolicy::Block);
        assert!(config.log_file.is_none());
    }

    #[test]
    fn test_load_full_config() {
        let temp = TempDir::new().unwrap();
        let config_path = write_config(
            &temp,
            r#"
shell_tool: shell
validator:
  program: /usr/local/bin/validate
  args: ["--strict", "rules.yaml"]
timeout_secs: 5
on_validator_error: allow
log_file: /tmp/gate.log
"#,
        );

        let config = load_config(&config_path).unwrap();
        assert_eq!(config.shell_tool, "shell");
        assert_eq!(
            config.validator,
            ValidatorCommand {
                program: "/usr/local/bin/validate".to_string(),
                args: vec!["--strict".to_string(), "rules.yaml".to_string()],
            }
        );
        assert_eq!(config.timeout, Some(Duration::from_secs(5)));
        assert_eq!(config.on_validator_error, FailurePolicy::Allow);
        assert_eq!(config.log_file, Some(PathBuf::from("/tmp/gate.log")));
    }

    #[test]
    fn test_empty_file_is_defaults() {
        let temp = TempDir::new().unwrap();
        let config_path = write_config(&temp, "");

        let config = load_config(&config_path).unwrap();
        assert_eq!(config.shell_tool, "bash");
        assert_eq!(config.validator.program, "python3");
    }

    #[test]
    fn test_zero_timeout_disables() {
        let temp = TempDir::new().unwrap();
        let config_path = write_config(&temp, "timeout_secs: 0\n");

        let config = load_config(&config_path).unwrap();
        assert!(config.timeout.is_none());
    }

    #[test]
    fn test_empty_program_fails() {
        let temp = TempDir::new().unwrap();
        let config_path = write_config(&temp, "validator:\n  program: \"\"\n");

        let err = load_config(&config_path).unwrap_err();
        assert!(err.to_string().contains("validator.program"));
    }

    #[test]
    fn test_empty_shell_tool_fails() {
        let temp = TempDir::new().unwrap();
        let config_path = write_config(&temp, "shell_tool: \"  \"\n");

        assert!(load_config(&config_path).is_err());
    }

    #[test]
    fn test_unknown_policy_fails() {
        let temp = TempDir::new().unwrap();
        let config_path = write_config(&temp, "on_validator_error: maybe\n");

        assert!(load_config(&config_path).is_err());
    }

    #[test]
    fn test_unknown_field_fails() {
        let temp = TempDir::new().unwrap();
        let config_path = write_config(&temp, "shel_tool: bash\n");

        assert!(load_config(&config_path).is_err());
    }

    #[test]
    fn test_explicit_missing_path_fails() {
        let temp = TempDir::new().unwrap();
        let missing = temp.path().join("nope.yaml");

        assert!(find_config(Some(&missing)).is_err());
    }

    #[test]
    fn test_expand_home() {
        let home = home_dir();
        assert_eq!(
            expand_home("~/x/y.py"),
            home.join("x/y.py").to_string_lossy()
        );
        assert_eq!(expand_home("~"), home.to_string_lossy());
        assert_eq!(expand_home("/abs/path"), "/abs/path");
        assert_eq!(expand_home("~other/path"), "~other/path");
    }
}
