//! Session loop.

use crate::dispatch::handle_incoming;
use crate::state::HostState;
use modex_proto::{read_frame, write_frame, Incoming};
use serde_json::Value;
use std::io::{self, Read, Write};
use tracing::{debug, info};

/// Serve requests from `reader` until it is closed.
///
/// One request is fully resolved and answered before the next is read.
/// Returns `Ok(())` on a clean end of input.
///
/// # Errors
/// Returns an error on a truncated or undecodable frame, or if a response
/// cannot be written. Command failures are answered, not returned.
pub fn run_session<R: Read, W: Write>(
    reader: &mut R,
    writer: &mut W,
    state: &mut HostState,
) -> io::Result<()> {
    let mut served = 0u64;

    loop {
        let Some(message) = read_frame::<_, Value>(reader)? else {
            info!(served, "input closed, ending session");
            return Ok(());
        };

        let incoming = Incoming::from_value(message)?;
        let response = handle_incoming(&incoming, state);
        debug!(tag = %response.kind, success = response.success, "sending response");

        write_frame(writer, &response)?;
        served += 1;
    }
}
