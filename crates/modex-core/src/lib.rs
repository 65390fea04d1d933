#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::needless_pass_by_value)]
#![allow(clippy::return_self_not_must_use)]

//! Core types for modex: errors, configuration, filesystem layout, the
//! environment registry and the collaborator process runner.

pub mod config;
pub mod error;
pub mod paths;
pub mod registry;
pub mod runner;
pub mod version;

pub use config::Config;
pub use error::{Error, Result};
pub use registry::{Environment, Registry};
pub use runner::{Executor, ProcessRunner, SystemExecutor, ToolOutput};
pub use version::VERSION;
