use std::sync::Arc;

use crate::{
    commands::{command_error::CommandError, command_handler::CommandResult},
    resp::RespValue,
    server::{RedisRole, RedisServer},
    state::State,
};

/// Handles the INFO command.
///
/// Only the replication section exists, so it is returned whatever section is asked for.
pub async fn info(
    server: Arc<RedisServer>,
    state: Arc<State>,
    _arguments: &[String],
) -> Result<CommandResult, CommandError> {
    let mut replication = vec![
        "# Replication".to_string(),
        format!("role:{}", server.role.as_string()),
    ];

    match &server.role {
        RedisRole::Master => {
            let acked_offsets = state.replicas.acked_offsets().await;
            replication.push(format!("connected_slaves:{}", acked_offsets.len()));

            for (index, (address, offset)) in acked_offsets.iter().enumerate() {
                let (ip, port) = address.rsplit_once(':').unwrap_or((address.as_str(), ""));
                replication.push(format!(
                    "slave{}:ip={},port={},offset={}",
                    index, ip, port, offset
                ));
            }
        }
        RedisRole::Replica((host, port)) => {
            replication.push(format!("master_host:{}", host));
            replication.push(format!("master_port:{}", port));
            replication.push(format!("slave_repl_offset:{}", state.offset.get()));
        }
    }

    replication.push(format!("master_replid:{}", server.repl_id));
    replication.push(format!("master_repl_offset:{}", server.repl_offset));

    Ok(CommandResult::Response(
        RespValue::BulkString(replication.join("\r\n")).encode(),
    ))
}
