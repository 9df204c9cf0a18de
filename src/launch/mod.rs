//! Launching and supervising the JVM
//!
//! - `classpath`: classpath string from the cached archives
//! - `output`: per-stream drains feeding one sink
//! - `shutdown`: signal handling and bounded child teardown
//! - `supervisor`: the process lifecycle tying these together

pub mod classpath;
pub mod output;
pub mod shutdown;
pub mod supervisor;

pub use classpath::{build_classpath, split_classpath, CLASSPATH_SEPARATOR};
pub use output::{ConsoleSink, MemorySink, OutputLine, OutputSink, StreamKind};
pub use supervisor::{LaunchSpec, ProcessSupervisor, SupervisedExit, SupervisorState};
