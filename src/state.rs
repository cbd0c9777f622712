//! Replication state shared between connection handlers.
//!
//! On a master, [`ReplicaRegistry`] holds one bounded channel per replica that completed
//! `PSYNC`; each channel is drained by a writer task owning that replica's socket, so
//! propagation never performs socket I/O while the registry lock is held. On a replica,
//! [`ReplicationOffset`] counts the bytes consumed from the master's stream.

use std::{
    collections::HashMap,
    sync::atomic::{AtomicU64, Ordering},
};

use bytes::Bytes;
use tokio::sync::{
    mpsc::{self, error::TrySendError},
    Mutex,
};
use tracing::{debug, info, warn};

use crate::resp::RespValue;

/// Commands queued for a replica before it counts as stalled and is dropped.
pub const REPLICA_QUEUE_CAPACITY: usize = 1024;

#[derive(Debug)]
pub struct Replica {
    pub sender: mpsc::Sender<Bytes>,
    pub acked_offset: u64,
}

#[derive(Debug, Default)]
pub struct ReplicaRegistry {
    replicas: Mutex<HashMap<String, Replica>>,
}

impl ReplicaRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn register(&self, address: String, sender: mpsc::Sender<Bytes>) {
        info!("registering replica {}", address);

        self.replicas.lock().await.insert(
            address,
            Replica {
                sender,
                acked_offset: 0,
            },
        );
    }

    /// Removes the replica registered under `address`, returning whether there was one.
    pub async fn unregister(&self, address: &str) -> bool {
        self.replicas.lock().await.remove(address).is_some()
    }

    /// Queues `command` for every registered replica.
    ///
    /// Delivery is best-effort: a replica whose writer task has gone away, or whose queue
    /// is full because it stopped reading, is pruned and the remaining replicas are still
    /// served. Returns the number of replicas the command was queued for.
    pub async fn propagate(&self, command: &RespValue) -> usize {
        let encoded = Bytes::from(command.encode());
        let mut replicas = self.replicas.lock().await;

        replicas.retain(|address, replica| match replica.sender.try_send(encoded.clone()) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                warn!("pruning stalled replica {}", address);
                false
            }
            Err(TrySendError::Closed(_)) => {
                info!("pruning disconnected replica {}", address);
                false
            }
        });

        debug!("propagated {} bytes to {} replicas", encoded.len(), replicas.len());
        replicas.len()
    }

    pub async fn record_ack(&self, address: &str, offset: u64) {
        if let Some(replica) = self.replicas.lock().await.get_mut(address) {
            replica.acked_offset = offset;
        }
    }

    /// Last offset acknowledged by each replica, ordered by address.
    pub async fn acked_offsets(&self) -> Vec<(String, u64)> {
        let mut offsets: Vec<(String, u64)> = self
            .replicas
            .lock()
            .await
            .iter()
            .map(|(address, replica)| (address.clone(), replica.acked_offset))
            .collect();

        offsets.sort();
        offsets
    }

    pub async fn len(&self) -> usize {
        self.replicas.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.replicas.lock().await.is_empty()
    }
}

/// Bytes of the master's command stream consumed by this replica. Starts at zero and
/// only grows.
#[derive(Debug, Default)]
pub struct ReplicationOffset(AtomicU64);

impl ReplicationOffset {
    pub fn get(&self) -> u64 {
        self.0.load(Ordering::SeqCst)
    }

    pub fn advance(&self, bytes: usize) -> u64 {
        self.0.fetch_add(bytes as u64, Ordering::SeqCst) + bytes as u64
    }
}

#[derive(Debug, Default)]
pub struct State {
    pub replicas: ReplicaRegistry,
    pub offset: ReplicationOffset,
}

impl State {
    pub fn new() -> Self {
        Self::default()
    }
}
