//! The Worker command/state enums (§3, §4.4) and the text names the
//! Controller's `state` query reports.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The Worker's next scheduled action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Command {
    #[default]
    None,
    Start,
    Stop,
    Abort,
    Exit,
}

/// The Worker's observed operating mode, visible to clients via `state`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum RunState {
    #[default]
    Sleeping,
    Starting,
    Acquiring,
    Stopping,
    Aborting,
    Done,
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RunState::Sleeping => "SLEEPING",
            RunState::Starting => "STARTING",
            RunState::Acquiring => "ACQUIRING",
            RunState::Stopping => "STOPPING",
            RunState::Aborting => "ABORTING",
            RunState::Done => "DONE",
        };
        f.write_str(name)
    }
}

impl RunState {
    /// Whether the device is quiescent (neither exposure nor readout
    /// in progress). Equivalent to "Worker state = SLEEPING".
    #[must_use]
    pub fn is_quiescent(self) -> bool {
        matches!(self, RunState::Sleeping)
    }
}
