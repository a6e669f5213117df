//! External tool invocation
//!
//! Every stage runs its tool through the same path: resolve the binary from
//! an ordered candidate list, build a [`ToolInvocation`] (arguments, working
//! directory, environment overlay, timeout), and hand it to a
//! [`ToolRunner`]. The runner always answers with a [`ToolOutput`]; timeouts
//! and spawn failures are reported through reserved negative exit codes so
//! callers only ever branch on the exit code.

pub mod external;
pub mod mock;
pub mod runner;

pub use external::{
    ToolInvocation, ToolOutput, ToolSpec, DEFAULT_TIMEOUT, KILLED_BY_SIGNAL, SPAWN_FAILED,
    TIMED_OUT,
};
pub use mock::MockToolRunner;
pub use runner::{ProcessRunner, ToolRunner};
