mod phase;
mod retval;
mod step;

pub use conductor_test::ConductorTest;
pub use phase::{CommandPhase, Phase, PhaseKind};
pub use retval::RetVal;
pub use step::{Step, DEFAULT_STEP_TIMEOUT_SECS};
