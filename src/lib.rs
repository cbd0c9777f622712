//! An in-memory Redis-like server with master/replica replication.
//!
//! The server speaks RESP and supports:
//!
//! - Basic key-value operations with millisecond expiry (GET, SET [PX|PXAT])
//! - Server commands (PING, ECHO, INFO)
//! - Master-replica replication (REPLCONF, PSYNC): a replica performs the handshake,
//!   receives a full resync and then applies the master's write stream while tracking
//!   its replication offset
//!
//! Every connection is served by its own Tokio task against a shared store and a shared
//! replica registry, both passed in explicitly.

pub mod commands;
pub mod connection;
pub mod handshake;
pub mod input;
pub mod key_value_store;
pub mod rdb;
pub mod resp;
pub mod server;
pub mod state;
