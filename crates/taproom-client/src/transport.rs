//! TCP transport for the client.
//!
//! Provides [`ConnectedClient`] which handles socket I/O for frame
//! transport. This is a thin layer that just sends/receives frames;
//! request/response logic lives in [`crate::Client`].

use taproom_proto::{Frame, FrameHeader};
use thiserror::Error;
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::{TcpStream, tcp::OwnedReadHalf},
    sync::mpsc,
};

/// Transport errors.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Connection failed.
    #[error("connection failed: {0}")]
    Connection(String),

    /// Socket read/write error.
    #[error("stream error: {0}")]
    Stream(String),

    /// Malformed frame on the wire.
    #[error("protocol error: {0}")]
    Protocol(String),
}

/// Handle to a connected client with TCP transport.
///
/// Provides channels for frame transport. Frames are sent/received via the
/// channels, and internal tasks handle the socket I/O.
pub struct ConnectedClient {
    /// Send frames to the server.
    pub to_server: mpsc::Sender<Frame>,
    /// Receive frames from the server (replies and pushes interleaved).
    pub from_server: mpsc::Receiver<Frame>,
    /// Abort handles to stop the connection tasks.
    abort_handles: Vec<tokio::task::AbortHandle>,
}

impl ConnectedClient {
    /// Stop the connection.
    pub fn stop(&self) {
        for handle in &self.abort_handles {
            handle.abort();
        }
    }
}

impl Drop for ConnectedClient {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Connect to a Taproom server via TCP.
///
/// Returns a [`ConnectedClient`] with channels for frame transport.
pub async fn connect(server_addr: &str) -> Result<ConnectedClient, TransportError> {
    let stream = TcpStream::connect(server_addr)
        .await
        .map_err(|e| TransportError::Connection(format!("connect failed: {e}")))?;
    stream
        .set_nodelay(true)
        .map_err(|e| TransportError::Connection(format!("socket setup failed: {e}")))?;

    let (mut reader, mut writer) = stream.into_split();

    let (to_server_tx, mut to_server_rx) = mpsc::channel::<Frame>(32);
    let (from_server_tx, from_server_rx) = mpsc::channel::<Frame>(32);

    let send_handle = tokio::spawn(async move {
        while let Some(frame) = to_server_rx.recv().await {
            let mut buf = Vec::new();
            if let Err(e) = frame.encode(&mut buf) {
                tracing::error!("Frame encode error: {e}");
                continue;
            }
            if let Err(e) = writer.write_all(&buf).await {
                tracing::debug!("Send error: {e}");
                break;
            }
        }
    });

    let recv_handle = tokio::spawn(async move {
        loop {
            match read_frame(&mut reader).await {
                Ok(Some(frame)) => {
                    if from_server_tx.send(frame).await.is_err() {
                        break; // receiver dropped
                    }
                },
                Ok(None) => {
                    tracing::debug!("Server closed the connection");
                    break;
                },
                Err(e) => {
                    tracing::debug!("Receive error: {e}");
                    break;
                },
            }
        }
    });

    Ok(ConnectedClient {
        to_server: to_server_tx,
        from_server: from_server_rx,
        abort_handles: vec![send_handle.abort_handle(), recv_handle.abort_handle()],
    })
}

/// Read one frame: fixed-size header, then exactly `payload_size` bytes.
///
/// Returns `Ok(None)` on clean EOF at a frame boundary.
async fn read_frame(reader: &mut OwnedReadHalf) -> Result<Option<Frame>, TransportError> {
    let mut header_buf = [0u8; FrameHeader::SIZE];
    match reader.read_exact(&mut header_buf).await {
        Ok(_) => {},
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(TransportError::Stream(e.to_string())),
    }

    let header = *FrameHeader::from_bytes(&header_buf)
        .map_err(|e| TransportError::Protocol(e.to_string()))?;

    let payload_size = header.payload_size();
    if payload_size > FrameHeader::MAX_PAYLOAD_SIZE {
        return Err(TransportError::Protocol(format!("payload too large: {payload_size}")));
    }

    let mut payload = vec![0u8; payload_size as usize];
    if payload_size > 0 {
        reader
            .read_exact(&mut payload)
            .await
            .map_err(|e| TransportError::Stream(e.to_string()))?;
    }

    Ok(Some(Frame::new(header, payload)))
}
