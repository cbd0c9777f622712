use std::{
    sync::Arc,
    time::{Duration, SystemTime, UNIX_EPOCH},
};

use tokio::time::Instant;

use crate::{
    commands::command_error::CommandError, key_value_store::KeyValueStore, resp::RespValue,
};

/// Latest representable expiry, in unix milliseconds.
const MAX_EXPIRE_UNIX_MILLIS: u64 = i64::MAX as u64;

#[derive(Debug, Clone, PartialEq)]
pub enum Expiration {
    /// `PX <milliseconds>`, relative to when the command is applied.
    After(Duration),
    /// `PXAT <unix milliseconds>`, an absolute wall-clock deadline.
    At(u64),
}

/// Represents the parsed arguments for the SET command
#[derive(Debug, Clone, PartialEq)]
pub struct SetArguments {
    /// The key name to store the value under
    pub key: String,
    /// The value to be stored under the given key
    pub value: String,
    /// Expiration of the key value pair, if any
    pub expiration: Option<Expiration>,
}

impl SetArguments {
    /// Parses `key value [PX milliseconds | PXAT unix-milliseconds]`.
    ///
    /// Option names are case-insensitive. `PX 0` stores the key without expiry.
    ///
    /// # Returns
    ///
    /// * `Err(CommandError::WrongNumberOfArguments)` - Fewer than 2 arguments
    /// * `Err(CommandError::SyntaxError)` - Unknown option or option without a value
    /// * `Err(CommandError::InvalidSetCommandExpiration)` - Expiration is not a valid integer
    /// * `Err(CommandError::InvalidExpireTime)` - The deadline lies beyond what can be stored
    pub fn parse(arguments: &[String]) -> Result<Self, CommandError> {
        let [key, value, options @ ..] = arguments else {
            return Err(CommandError::WrongNumberOfArguments("set".to_string()));
        };

        let mut expiration = None;
        let mut options = options.iter();

        while let Some(option) = options.next() {
            let option = option.to_lowercase();

            if option != "px" && option != "pxat" {
                return Err(CommandError::SyntaxError);
            }

            let amount = options
                .next()
                .ok_or(CommandError::SyntaxError)?
                .parse::<u64>()
                .map_err(|_| CommandError::InvalidSetCommandExpiration)?;

            expiration = match option.as_str() {
                "px" if amount == 0 => None,
                "px" => {
                    unix_time_millis()
                        .checked_add(amount)
                        .filter(|deadline| *deadline <= MAX_EXPIRE_UNIX_MILLIS)
                        .ok_or(CommandError::InvalidExpireTime)?;

                    Some(Expiration::After(Duration::from_millis(amount)))
                }
                _ if amount > MAX_EXPIRE_UNIX_MILLIS => {
                    return Err(CommandError::InvalidExpireTime)
                }
                _ => Some(Expiration::At(amount)),
            };
        }

        Ok(Self {
            key: key.clone(),
            value: value.clone(),
            expiration,
        })
    }

    /// The command forwarded to replicas for this write.
    ///
    /// Only `SET key value` is forwarded unless `propagate_expiry` is set, in which case
    /// an expiring write carries its absolute deadline as `PXAT` so the replica expires
    /// the key at the same moment as the master.
    pub fn replication_command(&self, propagate_expiry: bool) -> RespValue {
        let mut parts = vec!["SET".to_string(), self.key.clone(), self.value.clone()];

        if propagate_expiry {
            let deadline = match &self.expiration {
                Some(Expiration::After(ttl)) => {
                    unix_time_millis().checked_add(ttl.as_millis() as u64)
                }
                Some(Expiration::At(unix_millis)) => Some(*unix_millis),
                None => None,
            };

            if let Some(deadline) = deadline {
                parts.push("PXAT".to_string());
                parts.push(deadline.to_string());
            }
        }

        RespValue::command(parts)
    }
}

/// Handles the SET command.
///
/// Stores a key-value pair in the key-value store, replacing any previous value and
/// expiry, and returns the parsed arguments so the caller can forward the write.
pub async fn set(
    store: Arc<KeyValueStore>,
    arguments: &[String],
) -> Result<SetArguments, CommandError> {
    let set_arguments = SetArguments::parse(arguments)?;
    let key = set_arguments.key.clone();
    let value = set_arguments.value.clone();

    match &set_arguments.expiration {
        None => store.set(key, value, None).await,
        Some(Expiration::After(ttl)) => store.set(key, value, Some(*ttl)).await,
        Some(Expiration::At(unix_millis)) => match instant_from_unix_millis(*unix_millis) {
            Some(deadline) => store.set_expiring_at(key, value, deadline).await,
            None => store.set(key, value, None).await,
        },
    }

    Ok(set_arguments)
}

fn unix_time_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis() as u64)
        .unwrap_or_default()
}

/// Maps a wall-clock deadline onto the monotonic clock the store uses. Deadlines in the
/// past map to now, which the store treats as expired from the next instant on. `None`
/// when the deadline is too far out for the monotonic clock.
fn instant_from_unix_millis(unix_millis: u64) -> Option<Instant> {
    let remaining = unix_millis.saturating_sub(unix_time_millis());

    Instant::now().checked_add(Duration::from_millis(remaining))
}
