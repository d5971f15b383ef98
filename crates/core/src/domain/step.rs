use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::error::{CoreError, Result};

/// Timeout applied to a step unless the config says otherwise.
pub const DEFAULT_STEP_TIMEOUT_SECS: u64 = 30;

fn default_timeout() -> Option<u64> {
    Some(DEFAULT_STEP_TIMEOUT_SECS)
}

/// A single shell command a player runs as part of a phase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[cfg_attr(feature = "typescript", derive(ts_rs::TS))]
#[cfg_attr(feature = "typescript", ts(export))]
pub struct Step {
    /// Command line exactly as configured
    pub command: String,
    /// Start the command in the background instead of waiting for it
    #[serde(default)]
    pub spawn: bool,
    /// Seconds to wait for completion; `None` waits forever
    #[serde(default = "default_timeout")]
    pub timeout: Option<u64>,
}

impl Step {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            spawn: false,
            timeout: default_timeout(),
        }
    }

    pub fn spawned(command: impl Into<String>) -> Self {
        Self {
            spawn: true,
            ..Self::new(command)
        }
    }

    /// Rebuild a step from an already split argument vector, quoting each
    /// argument so that `args()` gives the same vector back.
    pub fn from_args<S: AsRef<str>>(args: &[S]) -> Result<Self> {
        let command = shlex::try_join(args.iter().map(|arg| AsRef::<str>::as_ref(arg)))
            .map_err(|e| CoreError::Validation(format!("cannot quote step arguments: {}", e)))?;
        Ok(Self::new(command))
    }

    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout = Some(secs);
        self
    }

    pub fn without_timeout(mut self) -> Self {
        self.timeout = None;
        self
    }

    /// Shell-style split of the command. Commands with broken quoting fall
    /// back to a plain whitespace split.
    pub fn args(&self) -> Vec<String> {
        shlex::split(&self.command).unwrap_or_else(|| {
            self.command
                .split_whitespace()
                .map(str::to_string)
                .collect()
        })
    }

    /// The program the step would invoke, if the command is not blank.
    pub fn program(&self) -> Option<String> {
        self.args().into_iter().next()
    }
}
