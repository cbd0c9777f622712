//! Replica side of the replication handshake.
//!
//! The handshake is a strict request/response sequence over the connection to the
//! master. Every reply is read and validated before the next command is sent, and each
//! step is bounded by the configured timeout:
//!
//! 1. `PING` → `+PONG`
//! 2. `REPLCONF listening-port <port>` → `+OK`
//! 3. `REPLCONF capa psync2` → `+OK`
//! 4. `PSYNC ? -1` → `+FULLRESYNC <repl_id> <offset>` followed by the snapshot

use std::{fmt, future::Future, time::Duration};

use thiserror::Error;
use tokio::{
    io::{AsyncRead, AsyncWrite, AsyncWriteExt},
    net::{
        tcp::{OwnedReadHalf, OwnedWriteHalf},
        TcpStream,
    },
    time::timeout,
};
use tracing::info;

use crate::{
    input::{CommandReadError, RespReader},
    resp::RespValue,
    server::RedisServer,
};

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum HandshakeStep {
    Connect,
    Ping,
    ListeningPort,
    Capabilities,
    Psync,
    Snapshot,
}

impl fmt::Display for HandshakeStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            HandshakeStep::Connect => "connect",
            HandshakeStep::Ping => "PING",
            HandshakeStep::ListeningPort => "REPLCONF listening-port",
            HandshakeStep::Capabilities => "REPLCONF capa",
            HandshakeStep::Psync => "PSYNC",
            HandshakeStep::Snapshot => "snapshot transfer",
        };

        write!(f, "{}", name)
    }
}

#[derive(Error, Debug, PartialEq)]
pub enum HandshakeError {
    #[error("I/O error during {0}: {1}")]
    Io(HandshakeStep, String),
    #[error("timed out waiting for master during {0}")]
    Timeout(HandshakeStep),
    #[error("unexpected reply from master during {step}: {reply:?}")]
    UnexpectedReply { step: HandshakeStep, reply: RespValue },
    #[error("invalid FULLRESYNC reply: {0}")]
    InvalidFullResync(String),
    #[error("error reading from master during {0}: {1}")]
    Read(HandshakeStep, CommandReadError),
}

/// What the master announced when it accepted the full resync.
#[derive(Debug, Clone, PartialEq)]
pub struct FullResync {
    pub repl_id: String,
    pub offset: i64,
    pub snapshot_length: usize,
}

/// Dials the master configured in `server` and completes the handshake.
///
/// Returns the connection halves, with any bytes the master sent after the snapshot
/// still buffered in the reader.
pub async fn connect_to_master(
    server: &RedisServer,
    master_host: &str,
    master_port: u16,
) -> Result<(RespReader<OwnedReadHalf>, OwnedWriteHalf, FullResync), HandshakeError> {
    let stream = within(
        server.handshake_timeout,
        HandshakeStep::Connect,
        TcpStream::connect((master_host, master_port)),
    )
    .await?
    .map_err(|e| HandshakeError::Io(HandshakeStep::Connect, e.to_string()))?;

    info!("connected to master at {}:{}", master_host, master_port);

    let (reader, mut writer) = stream.into_split();
    let mut reader = RespReader::new(reader);

    let full_resync =
        handshake(&mut reader, &mut writer, server.port, server.handshake_timeout).await?;

    Ok((reader, writer, full_resync))
}

pub async fn handshake<R, W>(
    reader: &mut RespReader<R>,
    writer: &mut W,
    listening_port: u16,
    step_timeout: Duration,
) -> Result<FullResync, HandshakeError>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let steps = [
        (HandshakeStep::Ping, vec!["PING".to_string()], "PONG"),
        (
            HandshakeStep::ListeningPort,
            vec![
                "REPLCONF".to_string(),
                "listening-port".to_string(),
                listening_port.to_string(),
            ],
            "OK",
        ),
        (
            HandshakeStep::Capabilities,
            vec![
                "REPLCONF".to_string(),
                "capa".to_string(),
                "psync2".to_string(),
            ],
            "OK",
        ),
    ];

    for (step, command, expected) in steps {
        send_command(writer, step, RespValue::command(command)).await?;

        let reply = read_reply(reader, step, step_timeout).await?;

        match &reply {
            RespValue::SimpleString(text) if text.eq_ignore_ascii_case(expected) => {
                info!("handshake step {} acknowledged", step);
            }
            _ => return Err(HandshakeError::UnexpectedReply { step, reply }),
        }
    }

    send_command(
        writer,
        HandshakeStep::Psync,
        RespValue::command(["PSYNC", "?", "-1"]),
    )
    .await?;

    let reply = read_reply(reader, HandshakeStep::Psync, step_timeout).await?;
    let (repl_id, offset) = parse_full_resync(&reply)?;

    let snapshot = within(
        step_timeout,
        HandshakeStep::Snapshot,
        reader.read_snapshot(),
    )
    .await?
    .map_err(|e| HandshakeError::Read(HandshakeStep::Snapshot, e))?;

    info!("handshake step {} completed", HandshakeStep::Snapshot);

    Ok(FullResync {
        repl_id,
        offset,
        snapshot_length: snapshot.len(),
    })
}

async fn send_command<W>(
    writer: &mut W,
    step: HandshakeStep,
    command: RespValue,
) -> Result<(), HandshakeError>
where
    W: AsyncWrite + Unpin,
{
    writer
        .write_all(command.encode().as_bytes())
        .await
        .map_err(|e| HandshakeError::Io(step, e.to_string()))?;
    writer
        .flush()
        .await
        .map_err(|e| HandshakeError::Io(step, e.to_string()))
}

async fn read_reply<R>(
    reader: &mut RespReader<R>,
    step: HandshakeStep,
    step_timeout: Duration,
) -> Result<RespValue, HandshakeError>
where
    R: AsyncRead + Unpin,
{
    within(step_timeout, step, reader.read_reply())
        .await?
        .map_err(|e| HandshakeError::Read(step, e))
}

async fn within<F: Future>(
    step_timeout: Duration,
    step: HandshakeStep,
    future: F,
) -> Result<F::Output, HandshakeError> {
    timeout(step_timeout, future)
        .await
        .map_err(|_| HandshakeError::Timeout(step))
}

fn parse_full_resync(reply: &RespValue) -> Result<(String, i64), HandshakeError> {
    let RespValue::SimpleString(line) = reply else {
        return Err(HandshakeError::UnexpectedReply {
            step: HandshakeStep::Psync,
            reply: reply.clone(),
        });
    };

    let invalid = || HandshakeError::InvalidFullResync(line.clone());

    let parts: Vec<&str> = line.split_whitespace().collect();
    let ["FULLRESYNC", repl_id, offset] = parts.as_slice() else {
        return Err(invalid());
    };

    if !is_valid_repl_id(repl_id) {
        return Err(invalid());
    }

    let offset = offset.parse::<i64>().map_err(|_| invalid())?;

    Ok((repl_id.to_string(), offset))
}

fn is_valid_repl_id(repl_id: &str) -> bool {
    repl_id.len() == 40 && repl_id.chars().all(|c| c.is_ascii_alphanumeric())
}
