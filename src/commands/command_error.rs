use thiserror::Error;

use crate::resp::RespValue;

#[derive(Error, Debug, PartialEq)]
pub enum CommandError {
    #[error("empty command")]
    EmptyCommand,
    #[error("unknown command '{0}'")]
    UnknownCommand(String),
    #[error("wrong number of arguments for '{0}' command")]
    WrongNumberOfArguments(String),
    #[error("syntax error")]
    SyntaxError,
    #[error("invalid SET command expiration")]
    InvalidSetCommandExpiration,
    #[error("invalid expire time in 'set' command")]
    InvalidExpireTime,
    #[error("PSYNC command should not be handled by replica server")]
    PsyncOnReplica,
}

impl CommandError {
    /// Errors that are dropped without a reply.
    ///
    /// A command with too few arguments is a no-op for that frame rather than a
    /// protocol error.
    pub fn is_silent(&self) -> bool {
        matches!(
            self,
            CommandError::EmptyCommand | CommandError::WrongNumberOfArguments(_)
        )
    }

    pub fn as_string(&self) -> String {
        match self {
            CommandError::InvalidSetCommandExpiration => {
                RespValue::Error("ERR value is not an integer or out of range".to_string())
                    .encode()
            }
            CommandError::PsyncOnReplica => RespValue::Error(
                "ERR PSYNC command should not be handled by replica server".to_string(),
            )
            .encode(),
            e => RespValue::Error(format!("ERR {}", e)).encode(),
        }
    }
}
