use std::sync::Arc;

use crate::{
    commands::{
        command_error::CommandError,
        echo::echo,
        get::get,
        info::info,
        ping::ping,
        psync::psync,
        replconf::{replconf, replconf_getack},
        set::set,
    },
    key_value_store::KeyValueStore,
    resp::{Frame, RespValue},
    server::RedisServer,
    state::State,
};

#[derive(Debug, PartialEq)]
pub enum CommandResult {
    NoResponse,
    Response(String),
    /// FULLRESYNC preamble; the connection must follow it with the snapshot and then
    /// becomes a replica link.
    Sync(String),
}

#[derive(Debug, PartialEq, Clone)]
pub struct CommandHandler {
    /// Lower-cased command name
    pub name: String,
    /// Lower-cased arguments after the name
    pub arguments: Vec<String>,
    /// Arguments after the name as they arrived on the wire
    pub verbatim_arguments: Vec<String>,
}

impl CommandHandler {
    pub fn new(frame: Frame) -> Result<Self, CommandError> {
        let name = frame.name();
        let mut verbatim_arguments = frame.into_arguments();

        if verbatim_arguments.is_empty() {
            return Err(CommandError::EmptyCommand);
        }

        verbatim_arguments.remove(0);
        let arguments = verbatim_arguments
            .iter()
            .map(|argument| argument.to_lowercase())
            .collect();

        Ok(Self {
            name,
            arguments,
            verbatim_arguments,
        })
    }

    /// Commands every connection kind runs the same way.
    ///
    /// A SET is forwarded to the registered replicas before it is acknowledged, which
    /// only happens on a master: a replica never has replicas of its own.
    async fn handle_command(
        &self,
        server: Arc<RedisServer>,
        store: Arc<KeyValueStore>,
        state: Arc<State>,
    ) -> Result<CommandResult, CommandError> {
        match self.name.as_str() {
            "ping" => ping(&self.arguments),
            "echo" => echo(&self.verbatim_arguments),
            "get" => get(store, &self.arguments).await,
            "set" => {
                let set_arguments = set(store, &self.arguments).await?;

                if server.role.is_master() {
                    state
                        .replicas
                        .propagate(&set_arguments.replication_command(server.propagate_expiry))
                        .await;
                }

                Ok(CommandResult::Response(
                    RespValue::SimpleString("OK".to_string()).encode(),
                ))
            }
            "info" => info(server, state, &self.arguments).await,
            _ => Err(CommandError::UnknownCommand(self.name.clone())),
        }
    }

    pub async fn handle_command_for_master_server(
        &self,
        server: Arc<RedisServer>,
        client_address: &str,
        store: Arc<KeyValueStore>,
        state: Arc<State>,
    ) -> Result<CommandResult, CommandError> {
        match self.name.as_str() {
            "replconf" => replconf(client_address, state, &self.arguments).await,
            "psync" => psync(server, &self.arguments),
            _ => self.handle_command(server, store, state).await,
        }
    }

    pub async fn handle_command_for_replica_server(
        &self,
        server: Arc<RedisServer>,
        client_address: &str,
        store: Arc<KeyValueStore>,
        state: Arc<State>,
    ) -> Result<CommandResult, CommandError> {
        match self.name.as_str() {
            "replconf" => replconf(client_address, state, &self.arguments).await,
            "psync" => Err(CommandError::PsyncOnReplica),
            _ => self.handle_command(server, store, state).await,
        }
    }

    /// Applies a command from the replica's master link.
    ///
    /// Client replies are suppressed; only the acknowledgement triggered by REPLCONF is
    /// written back to the master.
    pub async fn handle_command_for_replica_master_connection(
        &self,
        server: Arc<RedisServer>,
        store: Arc<KeyValueStore>,
        state: Arc<State>,
    ) -> Result<CommandResult, CommandError> {
        if self.name == "replconf" {
            return replconf_getack(state);
        }

        self.handle_command(server, store, state).await?;

        Ok(CommandResult::NoResponse)
    }
}
