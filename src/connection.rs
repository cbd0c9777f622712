use std::sync::Arc;

use bytes::Bytes;
use tokio::{
    io::{AsyncRead, AsyncWrite, AsyncWriteExt},
    net::TcpStream,
    sync::{mpsc, Mutex},
};
use tracing::{debug, error, info, warn};

use crate::{
    commands::{CommandHandler, CommandResult},
    input::{CommandReadError, RespReader},
    key_value_store::KeyValueStore,
    rdb::write_snapshot,
    server::RedisServer,
    state::{State, REPLICA_QUEUE_CAPACITY},
};

/// Serves one client connection until it closes.
///
/// Frames are dispatched strictly in arrival order. A connection that completes `PSYNC`
/// keeps being read (the replica sends `REPLCONF ACK` on it) while a writer task streams
/// propagated commands to it. When the connection ends, its replica registration, if
/// any, is dropped.
pub async fn handle_client_connection(
    stream: TcpStream,
    client_address: String,
    server: Arc<RedisServer>,
    store: Arc<KeyValueStore>,
    state: Arc<State>,
) {
    let (reader, writer) = stream.into_split();
    let mut reader = RespReader::new(reader);
    let writer = Arc::new(Mutex::new(writer));

    'connection: loop {
        let frames = match reader.read_frames().await {
            Ok(frames) => frames,
            Err(CommandReadError::ConnectionClosed) => break,
            Err(e) => {
                warn!("error reading from {}: {}", client_address, e);
                break;
            }
        };

        for frame in frames {
            let command_handler = match CommandHandler::new(frame) {
                Ok(handler) => handler,
                Err(e) => {
                    debug!("skipping frame from {}: {}", client_address, e);
                    continue;
                }
            };

            let command_result = if server.role.is_master() {
                command_handler
                    .handle_command_for_master_server(
                        Arc::clone(&server),
                        &client_address,
                        Arc::clone(&store),
                        Arc::clone(&state),
                    )
                    .await
            } else {
                command_handler
                    .handle_command_for_replica_server(
                        Arc::clone(&server),
                        &client_address,
                        Arc::clone(&store),
                        Arc::clone(&state),
                    )
                    .await
            };

            let command_result = match command_result {
                Ok(result) => result,
                Err(e) if e.is_silent() => {
                    debug!("ignoring {} from {}: {}", command_handler.name, client_address, e);
                    continue;
                }
                Err(e) => CommandResult::Response(e.as_string()),
            };

            let written = match command_result {
                CommandResult::NoResponse => Ok(()),
                CommandResult::Response(response) => {
                    thread_safe_write_to_stream(Arc::clone(&writer), response.as_bytes()).await
                }
                CommandResult::Sync(preamble) => {
                    begin_full_resync(
                        &client_address,
                        preamble,
                        Arc::clone(&writer),
                        Arc::clone(&state),
                    )
                    .await
                }
            };

            if let Err(e) = written {
                error!("error writing to {}: {}", client_address, e);
                break 'connection;
            }
        }
    }

    if state.replicas.unregister(&client_address).await {
        info!("replica {} disconnected", client_address);
    } else {
        debug!("client {} disconnected", client_address);
    }
}

/// Applies the command stream received from the master until the link closes.
///
/// Every frame advances the replication offset by its wire length once it has been
/// processed, so a `REPLCONF GETACK` is answered with the offset of everything before it.
pub async fn handle_master_connection<R, W>(
    mut reader: RespReader<R>,
    mut writer: W,
    server: Arc<RedisServer>,
    store: Arc<KeyValueStore>,
    state: Arc<State>,
) where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    loop {
        let frames = match reader.read_frames().await {
            Ok(frames) => frames,
            Err(CommandReadError::ConnectionClosed) => {
                info!("master closed the replication link");
                break;
            }
            Err(e) => {
                error!("error reading from master: {}", e);
                break;
            }
        };

        for frame in frames {
            let wire_length = frame.wire_length();

            if let Ok(command_handler) = CommandHandler::new(frame) {
                let command_result = command_handler
                    .handle_command_for_replica_master_connection(
                        Arc::clone(&server),
                        Arc::clone(&store),
                        Arc::clone(&state),
                    )
                    .await;

                match command_result {
                    Ok(CommandResult::Response(response)) => {
                        if let Err(e) = write_to_stream(&mut writer, response.as_bytes()).await {
                            error!("error writing to master: {}", e);
                            return;
                        }
                    }
                    Ok(_) => (),
                    Err(e) => debug!("ignoring {} from master: {}", command_handler.name, e),
                }
            }

            state.offset.advance(wire_length);
        }
    }
}

/// Sends the FULLRESYNC preamble and the snapshot, then registers the connection as a
/// replica.
///
/// Registration happens while the write half is still locked, so propagated commands
/// queued from then on are written strictly after the snapshot.
async fn begin_full_resync<W>(
    client_address: &str,
    preamble: String,
    writer: Arc<Mutex<W>>,
    state: Arc<State>,
) -> tokio::io::Result<()>
where
    W: AsyncWrite + Unpin + Send + 'static,
{
    let mut writer_guard = writer.lock().await;

    writer_guard.write_all(preamble.as_bytes()).await?;
    write_snapshot(&mut *writer_guard).await?;
    writer_guard.flush().await?;

    let (sender, receiver) = mpsc::channel(REPLICA_QUEUE_CAPACITY);
    state
        .replicas
        .register(client_address.to_string(), sender)
        .await;

    tokio::spawn(forward_to_replica(
        client_address.to_string(),
        receiver,
        Arc::clone(&writer),
    ));

    Ok(())
}

/// Drains a replica's propagation channel into its socket. Ends when the channel closes,
/// which happens once the registry has pruned the replica, or when a write fails.
async fn forward_to_replica<W>(
    replica_address: String,
    mut receiver: mpsc::Receiver<Bytes>,
    writer: Arc<Mutex<W>>,
) where
    W: AsyncWrite + Unpin + Send + 'static,
{
    while let Some(command) = receiver.recv().await {
        if let Err(e) = thread_safe_write_to_stream(Arc::clone(&writer), &command).await {
            warn!("error propagating to replica {}: {}", replica_address, e);
            break;
        }
    }

    debug!("stopped propagating to replica {}", replica_address);
}

async fn thread_safe_write_to_stream<W>(
    writer: Arc<Mutex<W>>,
    response: &[u8],
) -> tokio::io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    let mut writer_guard = writer.lock().await;
    write_to_stream(&mut *writer_guard, response).await
}

async fn write_to_stream<W>(writer: &mut W, response: &[u8]) -> tokio::io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    writer.write_all(response).await?;
    writer.flush().await?;

    Ok(())
}
