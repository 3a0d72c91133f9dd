//! The game-handle capability the orchestrator depends on.
//!
//! The per-game state machine, its player-slot model, and the legacy wire
//! protocol are all out of scope for this crate. What the orchestrator
//! needs is a narrow "game handle" contract: a way to ask whether a game
//! is safe to drop, how urgently it wants to be serviced, and a few
//! lobby-lifecycle callbacks.
//!
//! Game workers run on their own task and own their memory; every method
//! here takes `&self` and is expected to be backed by interior mutability
//! (atomics, a small internal mutex, or channels) so that a game never
//! needs the orchestrator's `games` lock to touch its own state. The one
//! exception worth calling out explicitly — `ready_delete` flipping to
//! `true` — is a single atomic write.

use async_trait::async_trait;
use std::sync::Arc;

/// A loaded map, or the stand-in for one. Map-file parsing and CRC/MPQ
/// handling are out of scope; this trait only exposes what `create_game`'s
/// preconditions and autohost's matchmaking gate need to check.
pub trait Map: Send + Sync {
    fn valid(&self) -> bool;
    fn map_path(&self) -> &str;

    /// The matchmaking category this map declares, if any. `None` means the
    /// map has no matchmaking category configured, in which case
    /// matchmaking must not be enabled for lobbies hosting it.
    fn matchmaking_category(&self) -> Option<&str>;

    /// Whether the map pins player slots/teams/handicaps in a way that
    /// makes automatic matchmaking meaningful. Matchmaking is only enabled
    /// when this is also true.
    fn has_fixed_player_settings(&self) -> bool;
}

/// A loaded saved game, checked against a candidate map in `create_game`'s
/// savegame path.
pub trait SaveGame: Send + Sync {
    fn valid(&self) -> bool;
    fn map_path(&self) -> &str;
}

/// Parameters for spawning a new game, assembled by the lobby manager once
/// every `create_game` precondition has passed.
pub struct NewGameParams {
    pub host_counter: u32,
    pub host_port: u16,
    pub bind_address: String,
    pub visibility: crate::realm::GameVisibility,
    pub name: String,
    pub owner: String,
    pub creator: String,
    pub creator_realm: String,
    pub map_path: String,
    pub is_savegame: bool,
    pub enforce_players: Vec<String>,
    pub local_addresses: Vec<std::net::Ipv4Addr>,
}

/// Builds and starts new games. The concrete implementation owns the real
/// game-session type and is responsible for spawning its worker.
pub trait GameFactory: Send + Sync {
    fn spawn(&self, params: NewGameParams) -> Arc<dyn GameHandle>;
}

/// The slice of a running game the orchestrator is allowed to touch.
#[async_trait]
pub trait GameHandle: Send + Sync + std::fmt::Debug {
    fn host_counter(&self) -> u32;

    /// `true` only once the game's internal workers have finished and it
    /// is safe to drop. Must be idempotent.
    fn ready_delete(&self) -> bool;

    /// Milliseconds until this game next wants to be serviced; used to
    /// size the readiness multiplexer's blocking wait.
    fn next_timed_action_ticks(&self) -> u32;

    /// `true` while this game is still in the advertising/lobby phase.
    fn is_advertising(&self) -> bool;

    fn game_name(&self) -> String;
    fn creator_name(&self) -> String;
    fn creator_realm(&self) -> String;
    fn human_player_count(&self) -> u32;

    /// A short human-readable description used in the "another game in
    /// lobby" chat message.
    fn description(&self) -> String;

    /// A realm successfully advertised this lobby.
    fn refresh_ok(&self, realm: &str);

    /// A realm failed to advertise this lobby; the lobby manager has
    /// already broadcast the "try another name" message and will mark the
    /// lobby exiting if it has no human players.
    fn refresh_fail(&self, realm: &str);

    /// Tell the game to leave the lobby state on its own (used when a
    /// refresh failure leaves an empty lobby, or during graceful
    /// shutdown).
    fn mark_exiting(&self);

    fn set_auto_start_players(&self, threshold: u32);

    /// Enables matchmaking for this lobby with the given score bounds.
    fn enable_matchmaking(&self, min_score: f64, max_score: f64);
}

#[cfg(test)]
pub mod test_support {
    //! A minimal in-memory `GameHandle`/`GameFactory` pair used by this
    //! crate's own tests. Not a game-session implementation — real games
    //! run their own worker and their own wire protocol, both out of
    //! scope here.

    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
    use std::sync::Mutex;

    #[derive(Debug)]
    pub struct StubGame {
        pub host_counter: u32,
        pub name: String,
        pub creator: String,
        pub creator_realm: String,
        ready_delete: AtomicBool,
        advertising: AtomicBool,
        next_action_ticks: AtomicU32,
        human_players: AtomicU32,
        pub events: Mutex<Vec<String>>,
    }

    impl StubGame {
        pub fn new(host_counter: u32, name: &str, creator: &str, creator_realm: &str) -> Self {
            Self {
                host_counter,
                name: name.to_string(),
                creator: creator.to_string(),
                creator_realm: creator_realm.to_string(),
                ready_delete: AtomicBool::new(false),
                advertising: AtomicBool::new(true),
                next_action_ticks: AtomicU32::new(50),
                human_players: AtomicU32::new(0),
                events: Mutex::new(Vec::new()),
            }
        }

        pub fn set_ready_delete(&self, value: bool) {
            self.ready_delete.store(value, Ordering::SeqCst);
        }

        pub fn set_human_players(&self, value: u32) {
            self.human_players.store(value, Ordering::SeqCst);
        }
    }

    #[async_trait]
    impl GameHandle for StubGame {
        fn host_counter(&self) -> u32 {
            self.host_counter
        }

        fn ready_delete(&self) -> bool {
            self.ready_delete.load(Ordering::SeqCst)
        }

        fn next_timed_action_ticks(&self) -> u32 {
            self.next_action_ticks.load(Ordering::SeqCst)
        }

        fn is_advertising(&self) -> bool {
            self.advertising.load(Ordering::SeqCst)
        }

        fn game_name(&self) -> String {
            self.name.clone()
        }

        fn creator_name(&self) -> String {
            self.creator.clone()
        }

        fn creator_realm(&self) -> String {
            self.creator_realm.clone()
        }

        fn human_player_count(&self) -> u32 {
            self.human_players.load(Ordering::SeqCst)
        }

        fn description(&self) -> String {
            format!("{} (hosted by {})", self.name, self.creator)
        }

        fn refresh_ok(&self, realm: &str) {
            self.events
                .lock()
                .unwrap()
                .push(format!("refresh_ok:{realm}"));
        }

        fn refresh_fail(&self, realm: &str) {
            self.events
                .lock()
                .unwrap()
                .push(format!("refresh_fail:{realm}"));
        }

        fn mark_exiting(&self) {
            self.advertising.store(false, Ordering::SeqCst);
            self.events.lock().unwrap().push("mark_exiting".to_string());
        }

        fn set_auto_start_players(&self, threshold: u32) {
            self.events
                .lock()
                .unwrap()
                .push(format!("auto_start_players:{threshold}"));
        }

        fn enable_matchmaking(&self, min_score: f64, max_score: f64) {
            self.events
                .lock()
                .unwrap()
                .push(format!("matchmaking:{min_score}-{max_score}"));
        }
    }

    #[derive(Default)]
    pub struct StubMap {
        pub valid: bool,
        pub path: String,
        pub matchmaking_category: Option<String>,
        pub has_fixed_player_settings: bool,
    }

    impl Map for StubMap {
        fn valid(&self) -> bool {
            self.valid
        }

        fn map_path(&self) -> &str {
            &self.path
        }

        fn matchmaking_category(&self) -> Option<&str> {
            self.matchmaking_category.as_deref()
        }

        fn has_fixed_player_settings(&self) -> bool {
            self.has_fixed_player_settings
        }
    }

    pub struct StubSaveGame {
        pub valid: bool,
        pub path: String,
    }

    impl SaveGame for StubSaveGame {
        fn valid(&self) -> bool {
            self.valid
        }

        fn map_path(&self) -> &str {
            &self.path
        }
    }

    pub struct StubFactory;

    impl GameFactory for StubFactory {
        fn spawn(&self, params: NewGameParams) -> Arc<dyn GameHandle> {
            Arc::new(StubGame::new(
                params.host_counter,
                &params.name,
                &params.creator,
                &params.creator_realm,
            ))
        }
    }
}
