//! REPLCONF command implementation for Redis replication configuration.
//!
//! On a master, replicas use REPLCONF during the handshake (`listening-port`, `capa`)
//! and afterwards to acknowledge how much of the stream they have applied (`ACK`). On
//! the replica's link from its master, REPLCONF is a GETACK probe.

use std::sync::Arc;

use tracing::debug;

use crate::{
    commands::{command_error::CommandError, command_handler::CommandResult},
    resp::RespValue,
    state::State,
};

enum ReplconfConfiguration {
    Ack(Option<u64>),
    Other,
}

impl ReplconfConfiguration {
    fn parse(arguments: &[String]) -> Self {
        match arguments {
            [subcommand, offset, ..] if subcommand.eq_ignore_ascii_case("ack") => {
                ReplconfConfiguration::Ack(offset.parse::<u64>().ok())
            }
            [subcommand] if subcommand.eq_ignore_ascii_case("ack") => {
                ReplconfConfiguration::Ack(None)
            }
            _ => ReplconfConfiguration::Other,
        }
    }
}

/// Handles REPLCONF received by a server from a client or one of its replicas.
///
/// Every subcommand is answered with `+OK` except `ACK`, which records the replica's
/// offset and is never replied to.
pub async fn replconf(
    client_address: &str,
    state: Arc<State>,
    arguments: &[String],
) -> Result<CommandResult, CommandError> {
    match ReplconfConfiguration::parse(arguments) {
        ReplconfConfiguration::Ack(Some(offset)) => {
            debug!("replica {} acknowledged offset {}", client_address, offset);
            state.replicas.record_ack(client_address, offset).await;

            Ok(CommandResult::NoResponse)
        }
        ReplconfConfiguration::Ack(None) => Ok(CommandResult::NoResponse),
        ReplconfConfiguration::Other => Ok(CommandResult::Response(
            RespValue::SimpleString("OK".to_string()).encode(),
        )),
    }
}

/// Handles REPLCONF received by a replica from its master.
///
/// Answers with `REPLCONF ACK <offset>`, the offset being the number of stream bytes
/// processed before this command.
pub fn replconf_getack(state: Arc<State>) -> Result<CommandResult, CommandError> {
    Ok(CommandResult::Response(
        RespValue::command(["REPLCONF", "ACK", &state.offset.get().to_string()]).encode(),
    ))
}
