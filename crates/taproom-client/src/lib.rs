//! Taproom protocol client.
//!
//! Connects to a Taproom server over TCP and exposes one typed method per
//! protocol operation. The transport layer bridges the socket to channels;
//! [`Client`] correlates replies by message id and buffers server pushes.
//!
//! # Example
//!
//! ```no_run
//! use taproom_client::Client;
//! use taproom_proto::payloads::auth::Role;
//!
//! # async fn run() -> Result<(), taproom_client::ClientError> {
//! let mut client = Client::connect("127.0.0.1:7440").await?;
//! client.register("teach1", "secret99", Role::Teacher, "Ada Lovelace", None).await?;
//! client.login("teach1", "secret99").await?;
//! let room = client.create_room("Midterm", 10, 30).await?;
//! println!("share this code: {}", room.room_code.unwrap_or_default());
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod client;
pub mod transport;

pub use client::{Client, ClientError};
pub use transport::{ConnectedClient, TransportError, connect};
