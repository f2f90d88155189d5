//! The occupancy gate: only spawn onto an empty server.
//!
//! A poll task asks the server how many players are online at a fixed
//! interval, independent of the session, and publishes the answer on a
//! `watch` channel. `true` means "empty, spawning authorized". Anything
//! that goes wrong publishes `false`: the gate never authorizes a spawn on
//! data it could not get.

use std::future::Future;
use std::time::Duration;

use tether_protocol::ProtocolError;
use tether_protocol::status::{
    VarIntAccumulator, decode_status_response, handshake_packet, status_request_packet,
};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Largest status response we are willing to buffer.
const MAX_RESPONSE_BYTES: usize = 1 << 20;

#[derive(Debug, thiserror::Error)]
pub enum OccupancyError {
    #[error("status ping i/o: {0}")]
    Io(#[from] std::io::Error),

    #[error("status ping timed out")]
    Timeout,

    #[error("status ping: {0}")]
    Protocol(#[from] ProtocolError),
}

/// Asks the game server how many players are online.
pub trait StatusProbe: Send + Sync + 'static {
    fn online_players(&self) -> impl Future<Output = Result<u32, OccupancyError>> + Send;
}

/// A [`StatusProbe`] speaking the game's server-list-ping protocol.
#[derive(Debug, Clone)]
pub struct SlpProbe {
    host: String,
    port: u16,
    protocol: i32,
    timeout: Duration,
}

impl SlpProbe {
    pub fn new(host: impl Into<String>, port: u16, protocol: i32, timeout: Duration) -> Self {
        Self {
            host: host.into(),
            port,
            protocol,
            timeout,
        }
    }

    async fn query(&self) -> Result<u32, OccupancyError> {
        let mut stream = TcpStream::connect((self.host.as_str(), self.port)).await?;
        stream
            .write_all(&handshake_packet(&self.host, self.port, self.protocol))
            .await?;
        stream.write_all(&status_request_packet()).await?;

        let mut length = VarIntAccumulator::new();
        let len = loop {
            let byte = stream.read_u8().await?;
            if let Some(value) = length.push(byte)? {
                break value;
            }
        };
        let len = usize::try_from(len)
            .ok()
            .filter(|&n| n <= MAX_RESPONSE_BYTES)
            .ok_or_else(|| {
                ProtocolError::InvalidMessage(format!("unreasonable status length {len}"))
            })?;

        let mut body = vec![0u8; len];
        stream.read_exact(&mut body).await?;
        let status = decode_status_response(&body)?;
        Ok(status.players.online)
    }
}

impl StatusProbe for SlpProbe {
    async fn online_players(&self) -> Result<u32, OccupancyError> {
        tokio::time::timeout(self.timeout, self.query())
            .await
            .map_err(|_| OccupancyError::Timeout)?
    }
}

/// Publishes spawn authorization.
pub struct OccupancyGate;

impl OccupancyGate {
    /// Starts polling `probe` every `interval` (the first poll runs
    /// immediately). The returned receiver starts at `false`.
    ///
    /// The task ends when every receiver has been dropped.
    pub fn spawn<P: StatusProbe>(
        probe: P,
        interval: Duration,
    ) -> (watch::Receiver<bool>, JoinHandle<()>) {
        let (tx, rx) = watch::channel(false);
        let handle = tokio::spawn(poll_loop(probe, interval, tx));
        (rx, handle)
    }

    /// A gate that always authorizes, for when occupancy checks are off.
    pub fn always_open() -> watch::Receiver<bool> {
        let (tx, rx) = watch::channel(true);
        // Dropping the sender leaves the last value readable for good.
        drop(tx);
        rx
    }
}

async fn poll_loop<P: StatusProbe>(probe: P, interval: Duration, tx: watch::Sender<bool>) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = tx.closed() => break,
        }

        let authorized = match probe.online_players().await {
            Ok(online) => {
                tracing::debug!(online, "occupancy poll");
                online == 0
            }
            Err(e) => {
                tracing::warn!(error = %e, "occupancy poll failed; treating server as occupied");
                false
            }
        };

        tx.send_if_modified(|current| {
            if *current == authorized {
                return false;
            }
            tracing::info!(
                authorized,
                "occupancy changed: server is {}",
                if authorized { "empty" } else { "occupied" }
            );
            *current = authorized;
            true
        });
    }
    tracing::debug!("occupancy gate stopped");
}
