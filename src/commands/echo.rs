use crate::{
    commands::{command_error::CommandError, command_handler::CommandResult},
    resp::RespValue,
};

/// Handles the ECHO command.
///
/// Returns the first argument as a bulk string, with its original case. Extra arguments
/// are ignored.
///
/// # Examples
///
/// ```ignore
/// // ECHO "hello world"
/// let result = echo(&["hello world".to_string()]);
/// // Returns: "$11\r\nhello world\r\n"
/// ```
pub fn echo(arguments: &[String]) -> Result<CommandResult, CommandError> {
    let Some(message) = arguments.first() else {
        return Err(CommandError::WrongNumberOfArguments("echo".to_string()));
    };

    Ok(CommandResult::Response(
        RespValue::BulkString(message.clone()).encode(),
    ))
}
