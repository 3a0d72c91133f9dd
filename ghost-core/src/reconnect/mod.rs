//! Reconnect handling: accepting raw sockets, parsing handshakes, and
//! holding them until a game claims the player they belong to.

mod acceptor;
mod inbox;

pub use acceptor::{reject_and_close, ReconnectAcceptor};
pub use inbox::{PendingReconnect, ReconnectInbox, RECONNECT_WINDOW_MS};
