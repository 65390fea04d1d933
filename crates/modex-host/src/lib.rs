#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::needless_pass_by_value)]

//! Native messaging host for the Python module explorer.
//!
//! The host reads one request frame at a time from its input, resolves it
//! (including any blocking collaborator process), writes exactly one response
//! frame, and repeats until the input is closed.
//!
//! ## Protocol
//! Communication uses length-prefixed JSON frames over stdin/stdout.
//! See `modex-proto` for message types.

pub mod dispatch;
mod session;
pub mod state;

pub use dispatch::{handle_incoming, handle_request};
pub use session::run_session;
pub use state::HostState;
