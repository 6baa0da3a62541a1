//! GridConnect-over-TCP transport.
//!
//! Connects as a client to a GridConnect hub (JMRI, openlcb_hub, or a
//! CAN-USB adapter daemon) and moves ASCII-framed CAN frames in both
//! directions. Inbound bytes go through a [`GridConnectParser`], so frame
//! boundaries may fall anywhere in the TCP stream.

use super::{EventTx, TransportError, TransportEvent, TransportState};
use crate::frame::gridconnect::{self, GridConnectParser};
use crate::frame::CanFrame;
use tokio::io::AsyncReadExt;
use tokio::io::AsyncWriteExt;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// GridConnect TCP client transport.
pub struct GridConnectTcp {
    /// Hub address as host:port.
    addr: String,
    /// Current state.
    state: TransportState,
    /// Write half of the connection (None until started).
    writer: Option<OwnedWriteHalf>,
    /// Channel delivering events to the stack's owner.
    event_tx: EventTx,
    /// Receive loop task handle.
    recv_task: Option<JoinHandle<()>>,
}

impl GridConnectTcp {
    /// Create a new transport for the given hub address.
    pub fn new(addr: impl Into<String>, event_tx: EventTx) -> Self {
        Self {
            addr: addr.into(),
            state: TransportState::Configured,
            writer: None,
            event_tx,
            recv_task: None,
        }
    }

    /// The configured hub address.
    pub fn addr(&self) -> &str {
        &self.addr
    }

    pub fn state(&self) -> TransportState {
        self.state
    }

    /// Connect to the hub and spawn the receive loop.
    ///
    /// Emits [`TransportEvent::Connected`] once the connection is up.
    pub async fn start(&mut self) -> Result<(), TransportError> {
        if !self.state.can_start() {
            return Err(TransportError::AlreadyStarted);
        }
        self.state = TransportState::Starting;

        let stream = TcpStream::connect(&self.addr)
            .await
            .map_err(|e| TransportError::StartFailed(format!("connect {}: {}", self.addr, e)))?;
        stream
            .set_nodelay(true)
            .map_err(|e| TransportError::StartFailed(format!("set_nodelay: {}", e)))?;
        let (reader, writer) = stream.into_split();
        self.writer = Some(writer);

        let event_tx = self.event_tx.clone();
        if event_tx.send(TransportEvent::Connected).await.is_err() {
            return Err(TransportError::StartFailed("event channel closed".into()));
        }
        self.recv_task = Some(tokio::spawn(async move {
            receive_loop(reader, event_tx).await;
        }));
        self.state = TransportState::Up;

        info!(addr = %self.addr, "connected to GridConnect hub");
        Ok(())
    }

    /// Drop the connection and stop the receive loop.
    pub async fn stop(&mut self) -> Result<(), TransportError> {
        if !self.state.is_operational() {
            return Err(TransportError::NotStarted);
        }
        if let Some(task) = self.recv_task.take() {
            task.abort();
            let _ = task.await;
        }
        self.writer.take();
        self.state = TransportState::Down;
        debug!(addr = %self.addr, "GridConnect transport stopped");
        Ok(())
    }

    /// Send one CAN frame to the hub.
    pub async fn send_frame(&mut self, frame: &CanFrame) -> Result<(), TransportError> {
        let writer = self.writer.as_mut().ok_or(TransportError::NotStarted)?;
        let encoded = gridconnect::encode(frame);
        writer
            .write_all(encoded.as_bytes())
            .await
            .map_err(|e| TransportError::SendFailed(e.to_string()))?;
        Ok(())
    }
}

/// Receive loop - runs as a spawned task until the connection or the
/// event channel closes.
async fn receive_loop(mut reader: OwnedReadHalf, event_tx: EventTx) {
    let mut parser = GridConnectParser::new();
    let mut buf = vec![0u8; 4096];

    debug!("GridConnect receive loop starting");
    loop {
        match reader.read(&mut buf).await {
            Ok(0) => {
                info!("hub closed the connection");
                let _ = event_tx.send(TransportEvent::Disconnected).await;
                break;
            }
            Ok(len) => {
                for frame in parser.accept(&buf[..len]) {
                    if event_tx.send(TransportEvent::Frame(frame)).await.is_err() {
                        debug!("event channel closed, stopping receive loop");
                        return;
                    }
                }
            }
            Err(e) => {
                warn!(error = %e, "read error, treating as disconnect");
                let _ = event_tx.send(TransportEvent::Disconnected).await;
                break;
            }
        }
    }
    debug!("GridConnect receive loop stopped");
}
