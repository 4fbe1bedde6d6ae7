//! Taproom production server.
//!
//! Production server implementation using Tokio TCP transport and system
//! time with cryptographic RNG.
//!
//! # Architecture
//!
//! This crate provides production "glue" around the action-based dispatcher.
//! [`ServerDriver`] is sans-IO (events in, actions out), while [`Server`]
//! executes the actions over real sockets.
//!
//! # Components
//!
//! - [`ServerDriver`]: Action-based orchestrator (pure logic, no I/O)
//! - [`Server`]: Production runtime that executes driver actions
//! - [`SystemEnv`]: Production environment (real time, crypto RNG)
//! - [`MemoryRepository`]: In-memory persistence backend

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod driver;
mod registry;
mod server_error;
pub mod storage;
mod system_env;

use std::{collections::HashMap, sync::Arc};

pub use driver::{
    GlobalTest, LogLevel, ServerAction, ServerConfig as DriverConfig, ServerDriver, ServerEvent,
};
pub use registry::{ConnectionRegistry, SessionInfo};
pub use server_error::ServerError;
pub use storage::{MemoryRepository, Repository, RepositoryError};
pub use system_env::SystemEnv;
use taproom_core::{credentials::Argon2Hasher, env::Environment};
use taproom_proto::{Frame, FrameHeader};
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::{
        TcpListener, TcpStream,
        tcp::{OwnedReadHalf, OwnedWriteHalf},
    },
    sync::{Mutex, Notify, RwLock},
};

/// Driver type used by the production runtime.
type ProductionDriver = ServerDriver<SystemEnv, MemoryRepository, Argon2Hasher>;

/// Interval between session expiry sweeps.
const TICK_INTERVAL: std::time::Duration = std::time::Duration::from_secs(60);

/// Shared state for all connections.
///
/// All frames to a client go through its single write half, ensuring
/// ordering between replies and pushes.
struct SharedState {
    /// Session ID → outbound write half
    outbound: RwLock<HashMap<u64, Mutex<OwnedWriteHalf>>>,
    /// Session ID → shutdown signal for the connection's read loop
    shutdowns: RwLock<HashMap<u64, Arc<Notify>>>,
}

/// Server configuration for the production runtime.
#[derive(Debug, Clone)]
pub struct ServerRuntimeConfig {
    /// Address to bind to (e.g., "0.0.0.0:7440")
    pub bind_address: String,
    /// Driver configuration (limits, session TTL, global test)
    pub driver: DriverConfig,
}

impl Default for ServerRuntimeConfig {
    fn default() -> Self {
        Self { bind_address: "0.0.0.0:7440".to_string(), driver: DriverConfig::default() }
    }
}

/// Production Taproom server.
///
/// Wraps `ServerDriver` with TCP transport and system environment.
pub struct Server {
    /// The action-based server driver
    driver: ProductionDriver,
    /// TCP listener
    listener: TcpListener,
    /// Environment
    env: SystemEnv,
}

impl Server {
    /// Create and bind a new server.
    pub async fn bind(config: ServerRuntimeConfig) -> Result<Self, ServerError> {
        let env = SystemEnv::new();
        let repo = MemoryRepository::new();
        let driver = ServerDriver::new(env.clone(), repo, Argon2Hasher::default(), config.driver);

        let listener = TcpListener::bind(&config.bind_address).await?;

        Ok(Self { driver, listener, env })
    }

    /// Run the server, accepting connections and processing frames.
    ///
    /// This method runs until the server is shut down or an error occurs.
    pub async fn run(self) -> Result<(), ServerError> {
        tracing::info!("Server starting on {}", self.listener.local_addr()?);

        let env = self.env;
        let driver = Arc::new(Mutex::new(self.driver));
        let shared = Arc::new(SharedState {
            outbound: RwLock::new(HashMap::new()),
            shutdowns: RwLock::new(HashMap::new()),
        });

        {
            let driver = Arc::clone(&driver);
            let shared = Arc::clone(&shared);
            tokio::spawn(async move {
                let mut interval = tokio::time::interval(TICK_INTERVAL);
                loop {
                    interval.tick().await;
                    let mut driver = driver.lock().await;
                    match driver.process_event(ServerEvent::Tick) {
                        Ok(actions) => {
                            if let Err(e) = execute_actions(&mut driver, actions, &shared).await {
                                tracing::error!("Tick action error: {}", e);
                            }
                        },
                        Err(e) => tracing::error!("Tick error: {}", e),
                    }
                }
            });
        }

        loop {
            match self.listener.accept().await {
                Ok((stream, addr)) => {
                    tracing::debug!("Accepted connection from {}", addr);
                    let driver = Arc::clone(&driver);
                    let shared = Arc::clone(&shared);
                    let env = env.clone();

                    tokio::spawn(async move {
                        if let Err(e) = handle_connection(stream, driver, shared, env).await {
                            tracing::error!("Connection error: {}", e);
                        }
                    });
                },
                Err(e) => {
                    tracing::error!("Accept error: {}", e);
                },
            }
        }
    }

    /// Local address the server is bound to.
    pub fn local_addr(&self) -> Result<std::net::SocketAddr, ServerError> {
        Ok(self.listener.local_addr()?)
    }
}

/// Handle a single TCP connection.
async fn handle_connection(
    stream: TcpStream,
    driver: Arc<Mutex<ProductionDriver>>,
    shared: Arc<SharedState>,
    env: SystemEnv,
) -> Result<(), ServerError> {
    let session_id = {
        let mut buf = [0u8; 8];
        env.random_bytes(&mut buf);
        u64::from_le_bytes(buf)
    };

    tracing::debug!("New connection: {}", session_id);

    stream.set_nodelay(true)?;
    let (mut reader, writer) = stream.into_split();
    let shutdown = Arc::new(Notify::new());

    {
        let mut outbound = shared.outbound.write().await;
        outbound.insert(session_id, Mutex::new(writer));
    }

    {
        let mut shutdowns = shared.shutdowns.write().await;
        shutdowns.insert(session_id, Arc::clone(&shutdown));
    }

    {
        let mut driver = driver.lock().await;
        let actions = driver.process_event(ServerEvent::ConnectionAccepted { session_id })?;
        execute_actions(&mut driver, actions, &shared).await?;
    }

    let close_reason = loop {
        // Cancellation can drop a partial read, but the connection is being
        // torn down at that point anyway.
        tokio::select! {
            () = shutdown.notified() => break "closed by server".to_string(),
            result = read_frame(&mut reader) => match result {
                Ok(Some(frame)) => {
                    let actions = {
                        let mut driver = driver.lock().await;
                        match driver.process_event(ServerEvent::FrameReceived {
                            session_id,
                            frame,
                        }) {
                            Ok(actions) => actions,
                            Err(e) => {
                                tracing::warn!("Frame processing error: {}", e);
                                continue;
                            },
                        }
                    };

                    let mut driver = driver.lock().await;
                    execute_actions(&mut driver, actions, &shared).await?;
                },
                Ok(None) => break "client disconnect".to_string(),
                Err(e) => {
                    tracing::debug!("Read error on {}: {}", session_id, e);
                    break format!("read error: {e}");
                },
            },
        }
    };

    {
        let mut outbound = shared.outbound.write().await;
        if let Some(writer) = outbound.remove(&session_id) {
            let mut writer = writer.into_inner();
            let _ = writer.shutdown().await;
        }
    }

    {
        let mut shutdowns = shared.shutdowns.write().await;
        shutdowns.remove(&session_id);
    }

    {
        let mut driver = driver.lock().await;
        let actions = driver
            .process_event(ServerEvent::ConnectionClosed { session_id, reason: close_reason })?;
        execute_actions(&mut driver, actions, &shared).await?;
    }

    Ok(())
}

/// Read one frame: fixed-size header, then exactly `payload_size` bytes.
///
/// Returns `Ok(None)` on clean EOF at a frame boundary.
async fn read_frame(reader: &mut OwnedReadHalf) -> Result<Option<Frame>, ServerError> {
    let mut header_buf = [0u8; FrameHeader::SIZE];
    match reader.read_exact(&mut header_buf).await {
        Ok(_) => {},
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e.into()),
    }

    let header = *FrameHeader::from_bytes(&header_buf)
        .map_err(|e| ServerError::Protocol(e.to_string()))?;

    let payload_size = header.payload_size();
    if payload_size > FrameHeader::MAX_PAYLOAD_SIZE {
        return Err(ServerError::Protocol(format!("payload too large: {payload_size}")));
    }

    let mut payload = vec![0u8; payload_size as usize];
    if payload_size > 0 {
        reader.read_exact(&mut payload).await?;
    }

    Ok(Some(Frame::new(header, payload)))
}

/// Execute server actions.
async fn execute_actions(
    driver: &mut ProductionDriver,
    actions: Vec<ServerAction>,
    shared: &SharedState,
) -> Result<(), ServerError> {
    for action in actions {
        match action {
            ServerAction::SendToSession { session_id, frame } => {
                let mut buf = Vec::new();
                frame.encode(&mut buf)?;

                let outbound = shared.outbound.read().await;
                if let Some(writer_mutex) = outbound.get(&session_id) {
                    let mut writer = writer_mutex.lock().await;
                    if let Err(e) = writer.write_all(&buf).await {
                        tracing::warn!("SendToSession write failed for {}: {}", session_id, e);
                    }
                } else {
                    tracing::warn!("SendToSession: session {} not found", session_id);
                }
            },

            ServerAction::BroadcastToRoom { room_id, frame, exclude_session } => {
                let sessions: Vec<u64> = driver.sessions_in_room(room_id).collect();

                let mut buf = Vec::new();
                frame.encode(&mut buf)?;

                let outbound = shared.outbound.read().await;
                for session_id in sessions {
                    if Some(session_id) != exclude_session {
                        if let Some(writer_mutex) = outbound.get(&session_id) {
                            let mut writer = writer_mutex.lock().await;
                            if let Err(e) = writer.write_all(&buf).await {
                                tracing::warn!(
                                    "BroadcastToRoom write failed for {}: {}",
                                    session_id,
                                    e
                                );
                            }
                        }
                    }
                }
            },

            ServerAction::CloseConnection { session_id, reason } => {
                tracing::info!("Closing connection {}: {}", session_id, reason);
                let shutdowns = shared.shutdowns.read().await;
                if let Some(shutdown) = shutdowns.get(&session_id) {
                    shutdown.notify_one();
                }
            },

            ServerAction::Log { level, message } => match level {
                LogLevel::Debug => tracing::debug!("{}", message),
                LogLevel::Info => tracing::info!("{}", message),
                LogLevel::Warn => tracing::warn!("{}", message),
                LogLevel::Error => tracing::error!("{}", message),
            },
        }
    }

    Ok(())
}
