//! Gate for shell commands proposed by a coding agent.
//!
//! The host hands each tool invocation to [`Gate::before_tool_execution`].
//! Shell commands are wrapped in a Claude Code style PreToolUse envelope and
//! piped to an external validator; exit 0 allows, exit 2 denies with the
//! validator's stderr as the reason.

pub mod config;
pub mod envelope;
pub mod gate;
pub mod input;
pub mod validator;

#[cfg(test)]
mod test_support;

pub use config::{FailurePolicy, GateConfig, ValidatorCommand};
pub use envelope::ValidatorEnvelope;
pub use gate::Gate;
pub use input::InterceptionEvent;
pub use validator::{ValidatorFailure, Verdict};
