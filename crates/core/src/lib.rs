//! Core domain for the conductor: ordered phase lists, the phases and steps
//! handed to players, their results, client configuration and the result
//! report.

pub mod config;
pub mod domain;
pub mod error;
pub mod report;

pub use config::{ClientConfig, ClientPhases, Coordinator};
pub use domain::*;
pub use error::{CoreError, Result};
pub use report::{Report, ReportFormat};
