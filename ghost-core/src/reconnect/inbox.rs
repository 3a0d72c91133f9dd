//! The pending-reconnect inbox.
//!
//! A thread-safe FIFO of parsed reconnect handoffs. The acceptor posts
//! entries; a game worker claims the one matching a disconnected player of
//! its own; the orchestrator expires anything left unclaimed after the
//! reconnect window.

use tokio::net::TcpStream;
use tokio::sync::Mutex;

/// How long a posted reconnect may wait for a game to claim it before the
/// orchestrator rejects it. This is a design constant, not
/// configuration — preserved from the original bot unchanged.
pub const RECONNECT_WINDOW_MS: u32 = 1500;

/// A parsed reconnect handoff awaiting claim by the game that owns
/// `player_id`.
pub struct PendingReconnect {
    pub player_id: u8,
    pub reconnect_key: u32,
    pub last_packet: u32,
    pub posted_ms: u32,
    pub socket: TcpStream,
}

#[derive(Default)]
pub struct ReconnectInbox {
    entries: Mutex<Vec<PendingReconnect>>,
}

impl ReconnectInbox {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn push(&self, entry: PendingReconnect) {
        self.entries.lock().await.push(entry);
    }

    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    /// Removes and returns the entry matching `(player_id, reconnect_key)`,
    /// transferring socket ownership to the caller. Games call this; the
    /// orchestrator never does.
    pub async fn claim(&self, player_id: u8, reconnect_key: u32) -> Option<PendingReconnect> {
        let mut guard = self.entries.lock().await;
        let index = guard
            .iter()
            .position(|e| e.player_id == player_id && e.reconnect_key == reconnect_key)?;
        Some(guard.remove(index))
    }

    /// Removes and returns every entry older than `window_ms` as of
    /// `now_ms`. Called once per orchestrator iteration.
    pub async fn expire(&self, now_ms: u32, window_ms: u32) -> Vec<PendingReconnect> {
        let mut guard = self.entries.lock().await;
        let mut expired = Vec::new();
        let mut i = 0;
        while i < guard.len() {
            if now_ms.wrapping_sub(guard[i].posted_ms) > window_ms {
                expired.push(guard.remove(i));
            } else {
                i += 1;
            }
        }
        expired
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn dummy_socket() -> TcpStream {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (client, _) = tokio::join!(TcpStream::connect(addr), listener.accept());
        client.unwrap()
    }

    #[tokio::test]
    async fn claim_removes_matching_entry_only() {
        let inbox = ReconnectInbox::new();
        inbox
            .push(PendingReconnect {
                player_id: 1,
                reconnect_key: 0xAAAA,
                last_packet: 0,
                posted_ms: 0,
                socket: dummy_socket().await,
            })
            .await;
        inbox
            .push(PendingReconnect {
                player_id: 2,
                reconnect_key: 0xBBBB,
                last_packet: 0,
                posted_ms: 0,
                socket: dummy_socket().await,
            })
            .await;

        assert!(inbox.claim(1, 0xDEAD).await.is_none());
        let claimed = inbox.claim(1, 0xAAAA).await.unwrap();
        assert_eq!(claimed.player_id, 1);
        assert_eq!(inbox.len().await, 1);
    }

    #[tokio::test]
    async fn expire_removes_only_entries_past_the_window() {
        let inbox = ReconnectInbox::new();
        inbox
            .push(PendingReconnect {
                player_id: 1,
                reconnect_key: 1,
                last_packet: 0,
                posted_ms: 0,
                socket: dummy_socket().await,
            })
            .await;
        inbox
            .push(PendingReconnect {
                player_id: 2,
                reconnect_key: 2,
                last_packet: 0,
                posted_ms: 1000,
                socket: dummy_socket().await,
            })
            .await;

        let expired = inbox.expire(1600, RECONNECT_WINDOW_MS).await;
        assert_eq!(expired.len(), 1);
        assert_eq!(expired[0].player_id, 1);
        assert_eq!(inbox.len().await, 1);
    }
}
