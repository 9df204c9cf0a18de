//! getrun - fetch a Maven artifact with its dependencies and run it
//!
//! Resolves the transitive runtime dependencies of a coordinate through a
//! repository chain into a local cache directory, then launches and
//! supervises `java -cp <cache jars> <mainClass>`.

pub mod cache;
pub mod cli;
pub mod config;
pub mod coordinate;
pub mod error;
pub mod launch;
pub mod repository;
pub mod resolve;
mod xml;

pub use error::{GetrunError, GetrunResult};
