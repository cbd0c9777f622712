use std::sync::Arc;

use crate::{
    commands::{command_error::CommandError, command_handler::CommandResult},
    key_value_store::KeyValueStore,
    resp::RespValue,
};

/// Handles the GET command.
///
/// Retrieves the value stored under a key. If the key has expired it is removed from the
/// store and null is returned.
///
/// # Returns
///
/// * `Ok(CommandResult::Response)` - The value as a bulk string, or `$-1` if absent
/// * `Err(CommandError::WrongNumberOfArguments)` - If no key was given
pub async fn get(
    store: Arc<KeyValueStore>,
    arguments: &[String],
) -> Result<CommandResult, CommandError> {
    let Some(key) = arguments.first() else {
        return Err(CommandError::WrongNumberOfArguments("get".to_string()));
    };

    let response = match store.get(key).await {
        Some(value) => RespValue::BulkString(value),
        None => RespValue::NullBulkString,
    };

    Ok(CommandResult::Response(response.encode()))
}
