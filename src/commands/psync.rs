//! PSYNC command implementation.
//!
//! Partial resynchronisation is not supported: whatever replication id and offset the
//! replica asks for, it gets a full resync.

use std::sync::Arc;

use crate::{
    commands::{command_error::CommandError, command_handler::CommandResult},
    resp::RespValue,
    server::RedisServer,
};

/// Handles the PSYNC command on a master.
///
/// Returns the `+FULLRESYNC <repl_id> <offset>` preamble as [`CommandResult::Sync`]; the
/// connection handler follows it with the snapshot and registers the connection as a
/// replica.
pub fn psync(
    server: Arc<RedisServer>,
    _arguments: &[String],
) -> Result<CommandResult, CommandError> {
    Ok(CommandResult::Sync(
        RespValue::SimpleString(format!(
            "FULLRESYNC {} {}",
            server.repl_id, server.repl_offset
        ))
        .encode(),
    ))
}
