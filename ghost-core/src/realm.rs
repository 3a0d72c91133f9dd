//! The realm-session capability the orchestrator depends on.
//!
//! The realm login/auth handshake, the chat-command parser, and the wire
//! protocol for a specific chat/lobby server are all out of scope for this
//! crate — a realm session is an external collaborator. This module only
//! defines the narrow interface the orchestrator needs in order to drive
//! one: readiness-style update ticks plus a handful of fire-and-forget
//! enqueues, with no back-pointer from the realm into the orchestrator.

use async_trait::async_trait;

/// Whether a lobby is advertised publicly or only to its creator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GameVisibility {
    Public,
    Private,
}

/// The announcement a realm enqueues when a new lobby is created
/// (the realm's `game_create`).
#[derive(Debug, Clone)]
pub struct GameAnnouncement {
    pub visibility: GameVisibility,
    pub name: String,
    pub map_path: String,
    pub is_savegame: bool,
    pub host_counter: u32,
}

/// One connection to a remote chat/lobby server.
///
/// All `queue_*` methods are fire-and-forget: they hand the realm session
/// something to say or do the next time it gets to run, and return
/// immediately. Chat messages enqueued during a single handler run are
/// delivered in the order they were enqueued.
#[async_trait]
pub trait RealmSession: Send + Sync {
    /// The configured server hostname, used to route a chat reply back to
    /// the realm a command came from.
    fn server(&self) -> &str;

    /// A display name for logs and chat, distinct from `server()` when an
    /// operator has configured an alias.
    fn server_alias(&self) -> &str;

    fn get_hold_friends(&self) -> bool;
    fn get_hold_clan(&self) -> bool;

    /// Identifies the auth flavor of this realm (e.g. `"pvpgn"`). Used by
    /// the lobby manager to decide whether re-entering chat while
    /// advertising a private game is safe.
    fn password_hash_type(&self) -> &str;

    /// Services this realm's socket(s) for one readiness epoch. Returns
    /// `true` if the realm's connection reports a condition the
    /// orchestrator should treat as a reason to exit the loop entirely
    /// — not merely to drop this one realm.
    async fn update(&mut self) -> bool;

    fn queue_game_create(&mut self, announcement: GameAnnouncement);
    fn queue_game_uncreate(&mut self);
    fn queue_enter_chat(&mut self);
    fn queue_chat(&mut self, text: String, target: Option<String>, whisper: bool);
    fn hold_friends(&mut self, host_counter: u32);
    fn hold_clan(&mut self, host_counter: u32);
}

#[cfg(test)]
pub mod test_support {
    //! A minimal in-memory `RealmSession` used by this crate's own tests.
    //! Not a realm protocol implementation — it just records what was
    //! enqueued so tests can assert on it.

    use super::*;
    use std::sync::{Arc, Mutex};

    #[derive(Debug, Clone)]
    pub enum RealmEvent {
        GameCreate(GameAnnouncement),
        GameUncreate,
        EnterChat,
        Chat {
            text: String,
            target: Option<String>,
            whisper: bool,
        },
        HoldFriends(u32),
        HoldClan(u32),
    }

    pub struct StubRealm {
        pub server: String,
        pub alias: String,
        pub hold_friends: bool,
        pub hold_clan: bool,
        pub password_hash_type: String,
        pub should_exit: bool,
        pub events: Arc<Mutex<Vec<RealmEvent>>>,
    }

    impl StubRealm {
        pub fn new(server: &str) -> Self {
            Self {
                server: server.to_string(),
                alias: server.to_string(),
                hold_friends: false,
                hold_clan: false,
                password_hash_type: String::new(),
                should_exit: false,
                events: Arc::new(Mutex::new(Vec::new())),
            }
        }

        /// A cheaply cloneable handle to this stub's event sink, useful for
        /// inspecting events after the stub has been boxed into a
        /// `Box<dyn RealmSession>` and handed off.
        pub fn event_sink(&self) -> Arc<Mutex<Vec<RealmEvent>>> {
            self.events.clone()
        }

        pub fn events(&self) -> Vec<RealmEvent> {
            self.events.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl RealmSession for StubRealm {
        fn server(&self) -> &str {
            &self.server
        }

        fn server_alias(&self) -> &str {
            &self.alias
        }

        fn get_hold_friends(&self) -> bool {
            self.hold_friends
        }

        fn get_hold_clan(&self) -> bool {
            self.hold_clan
        }

        fn password_hash_type(&self) -> &str {
            &self.password_hash_type
        }

        async fn update(&mut self) -> bool {
            self.should_exit
        }

        fn queue_game_create(&mut self, announcement: GameAnnouncement) {
            self.events
                .lock()
                .unwrap()
                .push(RealmEvent::GameCreate(announcement));
        }

        fn queue_game_uncreate(&mut self) {
            self.events.lock().unwrap().push(RealmEvent::GameUncreate);
        }

        fn queue_enter_chat(&mut self) {
            self.events.lock().unwrap().push(RealmEvent::EnterChat);
        }

        fn queue_chat(&mut self, text: String, target: Option<String>, whisper: bool) {
            self.events.lock().unwrap().push(RealmEvent::Chat {
                text,
                target,
                whisper,
            });
        }

        fn hold_friends(&mut self, host_counter: u32) {
            self.events
                .lock()
                .unwrap()
                .push(RealmEvent::HoldFriends(host_counter));
        }

        fn hold_clan(&mut self, host_counter: u32) {
            self.events
                .lock()
                .unwrap()
                .push(RealmEvent::HoldClan(host_counter));
        }
    }
}
