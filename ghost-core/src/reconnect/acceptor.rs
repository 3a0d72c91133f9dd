//! The reconnect socket acceptor.
//!
//! Accepts raw TCP connections on the reconnect port, reads them until a
//! full frame is available, and either posts the parsed handshake to the
//! inbox or rejects the connection outright. Connections that sit idle too
//! long without completing a handshake are dropped.

use bytes::BytesMut;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::net::{TcpListener, TcpStream};

use super::inbox::{PendingReconnect, ReconnectInbox};
use crate::clock::Clock;
use protocol::ParseOutcome;

/// A connection has not sent a complete handshake in this long, it is
/// treated as dead (ghost.cpp's socket timeout handling).
const IDLE_TIMEOUT_MS: u32 = 10_000;

struct PendingSocket {
    socket: TcpStream,
    buffer: BytesMut,
    last_activity_ms: u32,
}

impl PendingSocket {
    fn new(socket: TcpStream, now_ms: u32) -> Self {
        Self {
            socket,
            buffer: BytesMut::with_capacity(protocol::RECONNECT_MSG_LEN as usize),
            last_activity_ms: now_ms,
        }
    }
}

pub struct ReconnectAcceptor {
    bind_address: String,
    port: u16,
    enabled: bool,
    listener: Option<TcpListener>,
    sockets: Vec<PendingSocket>,
}

impl ReconnectAcceptor {
    pub fn new(bind_address: String, port: u16, enabled: bool) -> Self {
        Self {
            bind_address,
            port,
            enabled,
            listener: None,
            sockets: Vec::new(),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn pending_socket_count(&self) -> usize {
        self.sockets.len()
    }

    /// The bound address, once `ensure_listening` has succeeded. Mainly
    /// useful in tests that bind to an OS-assigned port.
    pub fn local_addr(&self) -> Option<std::net::SocketAddr> {
        self.listener.as_ref().and_then(|l| l.local_addr().ok())
    }

    /// Binds the reconnect listener on first use. A bind failure disables
    /// reconnects for the rest of the process's lifetime rather than
    /// crashing the orchestrator (supplemented from ghost.cpp's
    /// `m_Reconnect` bind handling, lines 717-739).
    pub async fn ensure_listening(&mut self) {
        if !self.enabled || self.listener.is_some() {
            return;
        }

        let addr = format!("{}:{}", self.bind_address, self.port);
        match TcpListener::bind(&addr).await {
            Ok(listener) => {
                tracing::info!(%addr, "reconnect listener bound");
                self.listener = Some(listener);
            }
            Err(error) => {
                tracing::error!(%addr, %error, "failed to bind reconnect listener, disabling reconnects");
                self.enabled = false;
            }
        }
    }

    /// One readiness epoch: wait up to `budget` for a new connection, then
    /// service every socket already accepted. Folds into the orchestrator's
    /// single blocking wait per iteration.
    pub async fn service_epoch(&mut self, budget: Duration, clock: &Clock, inbox: &ReconnectInbox) {
        if let Some(listener) = self.listener.as_ref() {
            tokio::select! {
                accepted = listener.accept() => {
                    if let Ok((socket, addr)) = accepted {
                        tracing::debug!(%addr, "accepted reconnect socket");
                        let _ = socket.set_nodelay(true);
                        self.sockets.push(PendingSocket::new(socket, clock.now_ms()));
                    }
                }
                _ = tokio::time::sleep(budget) => {}
            }
        } else {
            tokio::time::sleep(budget).await;
        }

        self.service_sockets(clock, inbox).await;
    }

    async fn service_sockets(&mut self, clock: &Clock, inbox: &ReconnectInbox) {
        let mut still_open = Vec::with_capacity(self.sockets.len());

        for mut pending in self.sockets.drain(..) {
            if clock.now_ms().wrapping_sub(pending.last_activity_ms) >= IDLE_TIMEOUT_MS {
                tracing::debug!("dropping idle reconnect socket");
                continue;
            }

            match pending.socket.try_read_buf(&mut pending.buffer) {
                Ok(0) => continue,
                Ok(_) => pending.last_activity_ms = clock.now_ms(),
                Err(ref e) if e.kind() == std::io::ErrorKind::WouldBlock => {}
                Err(_) => continue,
            }

            match protocol::parse_frame(&pending.buffer) {
                ParseOutcome::Incomplete => still_open.push(pending),
                ParseOutcome::Invalid => {
                    reject_and_close(pending.socket, protocol::RejectCode::Invalid).await;
                }
                ParseOutcome::Reconnect(handshake) => {
                    inbox
                        .push(PendingReconnect {
                            player_id: handshake.player_id,
                            reconnect_key: handshake.reconnect_key,
                            last_packet: handshake.last_packet,
                            posted_ms: clock.now_ms(),
                            socket: pending.socket,
                        })
                        .await;
                }
            }
        }

        self.sockets = still_open;
    }
}

/// Rejects a connection that never resolves to a claimed reconnect and
/// closes it; the unclaimed-entry expiry path shares this too.
pub async fn reject_and_close(mut socket: TcpStream, code: protocol::RejectCode) {
    let frame = protocol::encode_reject(code);
    let _ = socket.write_all(&frame).await;
    let _ = socket.shutdown().await;
}
