use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Outcome of one step, reported back from a player to the conductor.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize, ToSchema)]
#[cfg_attr(feature = "typescript", derive(ts_rs::TS))]
#[cfg_attr(feature = "typescript", ts(export))]
pub struct RetVal {
    #[serde(default)]
    pub code: i32,
    #[serde(default)]
    pub message: String,
}

impl RetVal {
    pub const OK: i32 = 0;
    pub const ERROR: i32 = 1;
    pub const BAD_CMD: i32 = 2;
    /// Sent once after the last result of a phase.
    pub const DONE: i32 = 65535;

    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn ok(message: impl Into<String>) -> Self {
        Self::new(Self::OK, message)
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::new(Self::ERROR, message)
    }

    pub fn done() -> Self {
        Self::new(Self::DONE, "phases complete")
    }

    pub fn is_ok(&self) -> bool {
        self.code == Self::OK
    }

    pub fn is_done(&self) -> bool {
        self.code == Self::DONE
    }
}
