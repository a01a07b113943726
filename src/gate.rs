use crate::config::{FailurePolicy, GateConfig};
use crate::envelope::ValidatorEnvelope;
use crate::input::InterceptionEvent;
use crate::validator::{Validator, ValidatorFailure, Verdict};
use anyhow::{anyhow, Result};
use tracing::{debug, info, warn};

/// Intercepts shell commands before the host runs them and asks the
/// validator whether they may proceed.
///
/// Holds only configuration, so one gate can serve concurrent calls.
#[derive(Debug, Clone)]
pub struct Gate {
    shell_tool: String,
    validator: Validator,
    on_validator_error: FailurePolicy,
}

impl Gate {
    pub fn new(config: &GateConfig) -> Self {
        Self {
            shell_tool: config.shell_tool.clone(),
            validator: Validator::new(config.validator.clone(), config.timeout),
            on_validator_error: config.on_validator_error,
        }
    }

    /// Validate the event's command.
    /// Returns `None` when the event has nothing to validate (not a shell
    /// tool, or no command), in which case no process is spawned.
    pub fn check(&self, event: &InterceptionEvent) -> Option<Verdict> {
        if event.tool != self.shell_tool {
            debug!(tool = %event.tool, "not a shell tool, skipping");
            return None;
        }
        let Some(command) = event.command() else {
            debug!("no command, skipping");
            return None;
        };

        let input = match ValidatorEnvelope::new(command).to_json() {
            Ok(input) => input,
            Err(e) => {
                return Some(Verdict::ValidatorError(ValidatorFailure::Io(format!(
                    "{:#}",
                    e
                ))))
            }
        };

        // Commands can carry inline credentials; keep them out of info logs
        debug!(command, "validating command");
        let verdict = self.validator.run(&input);
        info!(verdict = ?verdict, "validated command");
        Some(verdict)
    }

    /// Host-facing hook: `Ok(())` lets the command run, `Err` blocks it and
    /// carries the message to show the agent.
    pub fn before_tool_execution(&self, event: &InterceptionEvent) -> Result<()> {
        match self.check(event) {
            None | Some(Verdict::Allowed) => Ok(()),
            Some(Verdict::Denied(reason)) => Err(anyhow!(reason)),
            Some(Verdict::ValidatorError(failure)) => match self.on_validator_error {
                FailurePolicy::Block => Err(anyhow!(failure.to_string())),
                FailurePolicy::Allow => {
                    warn!(error = %failure, "validator failed, allowing command");
                    Ok(())
                }
            },
        }
    }
}
