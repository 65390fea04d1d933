#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

//! Shared utilities for modex.
//!
//! Filesystem helpers with no logging/tracing dependencies.

pub mod fs;
