use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::net::TcpListener;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use redis_replica::{
    connection::{handle_client_connection, handle_master_connection},
    handshake::connect_to_master,
    key_value_store::KeyValueStore,
    server::{RedisRole, RedisServer},
    state::State,
};

#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let server = Arc::new(RedisServer::new(std::env::args())?);
    let store = Arc::new(KeyValueStore::new());
    let state = Arc::new(State::new());

    let listener = TcpListener::bind(("0.0.0.0", server.port))
        .await
        .with_context(|| format!("failed to bind to port {}", server.port))?;

    info!("listening on port {} as {}", server.port, server.role.as_string());

    if let RedisRole::Replica((master_host, master_port)) = &server.role {
        let (reader, writer, full_resync) = connect_to_master(&server, master_host, *master_port)
            .await
            .with_context(|| {
                format!(
                    "replication handshake with {}:{} failed",
                    master_host, master_port
                )
            })?;

        info!(
            "replicating {} from offset {} after a {} byte snapshot",
            full_resync.repl_id, full_resync.offset, full_resync.snapshot_length
        );

        tokio::spawn(handle_master_connection(
            reader,
            writer,
            Arc::clone(&server),
            Arc::clone(&store),
            Arc::clone(&state),
        ));
    }

    loop {
        match listener.accept().await {
            Ok((stream, address)) => {
                info!("accepted connection from {}", address);

                tokio::spawn(handle_client_connection(
                    stream,
                    address.to_string(),
                    Arc::clone(&server),
                    Arc::clone(&store),
                    Arc::clone(&state),
                ));
            }
            Err(e) => {
                error!("error accepting connection: {}", e);
            }
        }
    }
}
