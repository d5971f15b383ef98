//! Phases: the unit of work a conductor hands to a player.
//!
//! `Phase` is the capability a `ConductorTest` relies on. `CommandPhase` is
//! the concrete phase built from client configuration: an ordered list of
//! steps plus the address the player reports results to.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::trace;
use utoipa::ToSchema;

use super::retval::RetVal;
use super::step::Step;

/// Anything that can sit in a conductor's phase list.
pub trait Phase {
    /// Steps carried by this phase, in execution order.
    fn steps(&self) -> &[Step];

    fn step_count(&self) -> usize {
        self.steps().len()
    }
}

impl<T: Phase + ?Sized> Phase for &T {
    fn steps(&self) -> &[Step] {
        (**self).steps()
    }
}

impl<T: Phase + ?Sized> Phase for Box<T> {
    fn steps(&self) -> &[Step] {
        (**self).steps()
    }
}

impl<T: Phase + ?Sized> Phase for Arc<T> {
    fn steps(&self) -> &[Step] {
        (**self).steps()
    }
}

/// The four phases every client goes through, in canonical order.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, ToSchema)]
#[cfg_attr(feature = "typescript", derive(ts_rs::TS))]
#[cfg_attr(feature = "typescript", ts(export))]
#[serde(rename_all = "snake_case")]
pub enum PhaseKind {
    Startup,
    Run,
    Collect,
    Reset,
}

impl PhaseKind {
    pub const ALL: [PhaseKind; 4] = [Self::Startup, Self::Run, Self::Collect, Self::Reset];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Startup => "startup",
            Self::Run => "run",
            Self::Collect => "collect",
            Self::Reset => "reset",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "startup" => Some(Self::Startup),
            "run" => Some(Self::Run),
            "collect" => Some(Self::Collect),
            "reset" => Some(Self::Reset),
            _ => None,
        }
    }
}

impl std::fmt::Display for PhaseKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A phase of shell steps, together with where the player sends results.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[cfg_attr(feature = "typescript", derive(ts_rs::TS))]
#[cfg_attr(feature = "typescript", ts(export))]
pub struct CommandPhase {
    /// Host the player connects back to with results
    #[serde(rename = "resulthost")]
    pub result_host: String,
    /// Port the player connects back to with results
    #[serde(rename = "resultport")]
    pub result_port: u16,
    #[serde(default)]
    pub steps: Vec<Step>,
    /// Results recorded so far, in arrival order
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub results: Vec<RetVal>,
}

impl CommandPhase {
    pub fn new(result_host: impl Into<String>, result_port: u16) -> Self {
        Self {
            result_host: result_host.into(),
            result_port,
            steps: Vec::new(),
            results: Vec::new(),
        }
    }

    pub fn append(&mut self, step: Step) -> &mut Self {
        trace!(command = %step.command, spawn = step.spawn, "Appending step to phase");
        self.steps.push(step);
        self
    }

    pub fn record(&mut self, result: RetVal) {
        trace!(code = result.code, "Recording step result");
        self.results.push(result);
    }

    pub fn results(&self) -> &[RetVal] {
        &self.results
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

impl Phase for CommandPhase {
    fn steps(&self) -> &[Step] {
        &self.steps
    }
}
