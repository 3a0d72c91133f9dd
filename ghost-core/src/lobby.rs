//! Lobby-game lifecycle.
//!
//! Owns the single "current" lobby-stage game plus the list of games that
//! have moved past the lobby, and implements `create_game`'s precondition
//! chain exactly in the order the original bot checked them — including a
//! bug in that chain (see `create_game`'s doc comment) that is worth
//! preserving rather than silently fixing.

use std::sync::Arc;

use crate::game::{GameFactory, GameHandle, Map, NewGameParams, SaveGame};
use crate::realm::{GameAnnouncement, GameVisibility, RealmSession};

/// Why `create_game` refused to start a lobby. The caller is expected to
/// turn this into a `queue_chat` reply on the creator's realm; this module
/// never talks to a realm directly to keep the chat-wording concern
/// (language files, localization) out of scope here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CreateGameRejection {
    Disabled,
    NameTooLong,
    InvalidMap,
    InvalidSaveGame,
    SaveGameMapMismatch,
    MustEnforceFirst,
    AnotherGameInLobby { description: String },
    MaxGamesReached { max_games: u32 },
}

pub struct LobbyManager {
    enabled: bool,
    max_games: u32,
    host_port: u16,
    bind_address: String,
    host_counter: u32,
    current_lobby: Option<Arc<dyn GameHandle>>,
    games: Vec<Arc<dyn GameHandle>>,
    enforce_players: Vec<String>,
    /// Mirrors the original bot's `m_SaveGame`: the most recently loaded
    /// saved game, independent of any particular `create_game` call.
    loaded_savegame: Option<Arc<dyn SaveGame>>,
}

impl LobbyManager {
    pub fn new(enabled: bool, max_games: u32, host_port: u16, bind_address: String) -> Self {
        Self {
            enabled,
            max_games,
            host_port,
            bind_address,
            host_counter: 1,
            current_lobby: None,
            games: Vec::new(),
            enforce_players: Vec::new(),
            loaded_savegame: None,
        }
    }

    pub fn current_lobby(&self) -> Option<&Arc<dyn GameHandle>> {
        self.current_lobby.as_ref()
    }

    pub fn games(&self) -> &[Arc<dyn GameHandle>] {
        &self.games
    }

    /// The host counter `create_game` will assign to the next game it
    /// starts, without reserving it.
    pub fn next_host_counter(&self) -> u32 {
        self.host_counter
    }

    pub fn set_loaded_savegame(&mut self, savegame: Arc<dyn SaveGame>) {
        self.loaded_savegame = Some(savegame);
    }

    pub fn clear_loaded_savegame(&mut self) {
        self.loaded_savegame = None;
    }

    pub fn set_enforce_players(&mut self, players: Vec<String>) {
        self.enforce_players = players;
    }

    /// Drops games whose worker reported `ready_delete`, and demotes the
    /// current lobby back to "no lobby" if it finished.
    /// Returns `true` if the current lobby was just retired, so the caller
    /// can tell every realm to uncreate and re-enter chat.
    pub fn reap(&mut self) -> bool {
        self.games.retain(|game| !game.ready_delete());

        if let Some(lobby) = &self.current_lobby {
            if lobby.ready_delete() {
                self.current_lobby = None;
                return true;
            }
        }

        false
    }

    /// Starting a new lobby-stage game (ghost.cpp's `CGHost::CreateGame`).
    /// `requested_savegame` is this call's own intent; preconditions
    /// validate against it. The enforce-players transfer below instead
    /// keys off `self.loaded_savegame`, which is whatever was most recently
    /// loaded via a separate command — not necessarily this call's
    /// savegame. That mismatch is a bug inherited from the original bot:
    /// fixing it would change which games get enforced player lists, so it
    /// is kept rather than silently corrected.
    #[allow(clippy::too_many_arguments)]
    pub fn create_game(
        &mut self,
        map: &dyn Map,
        requested_savegame: Option<&dyn SaveGame>,
        visibility: GameVisibility,
        game_name: String,
        owner_name: String,
        creator_name: String,
        creator_realm: String,
        whisper: bool,
        realms: &mut [Box<dyn RealmSession>],
        factory: &dyn GameFactory,
    ) -> Result<Arc<dyn GameHandle>, CreateGameRejection> {
        if !self.enabled {
            return Err(CreateGameRejection::Disabled);
        }

        if game_name.len() > 31 {
            return Err(CreateGameRejection::NameTooLong);
        }

        if !map.valid() {
            return Err(CreateGameRejection::InvalidMap);
        }

        if let Some(savegame) = requested_savegame {
            if !savegame.valid() {
                return Err(CreateGameRejection::InvalidSaveGame);
            }

            if savegame.map_path().to_ascii_lowercase() != map.map_path().to_ascii_lowercase() {
                return Err(CreateGameRejection::SaveGameMapMismatch);
            }

            if self.enforce_players.is_empty() {
                return Err(CreateGameRejection::MustEnforceFirst);
            }
        }

        if let Some(lobby) = &self.current_lobby {
            return Err(CreateGameRejection::AnotherGameInLobby {
                description: lobby.description(),
            });
        }

        if self.games.len() as u32 >= self.max_games {
            return Err(CreateGameRejection::MaxGamesReached {
                max_games: self.max_games,
            });
        }

        tracing::info!(name = %game_name, "creating game");

        let host_counter = self.host_counter;
        self.host_counter += 1;

        let params = NewGameParams {
            host_counter,
            host_port: self.host_port,
            bind_address: self.bind_address.clone(),
            visibility,
            name: game_name.clone(),
            owner: owner_name.clone(),
            creator: creator_name.clone(),
            creator_realm: creator_realm.clone(),
            map_path: map.map_path().to_string(),
            is_savegame: requested_savegame.is_some(),
            enforce_players: self.enforce_players.clone(),
            local_addresses: Vec::new(),
        };

        let game = factory.spawn(params);

        // Mirrors the original: gated on "do we have a loaded savegame at
        // all", not on whether this call asked for one.
        if self.loaded_savegame.is_some() {
            self.enforce_players.clear();
        }

        for realm in realms.iter_mut() {
            let is_creator = realm.server() == creator_realm;

            let text = match visibility {
                GameVisibility::Private => format!("Creating private game {game_name}: {owner_name}"),
                GameVisibility::Public => format!("Creating public game {game_name}: {owner_name}"),
            };

            if whisper && is_creator {
                realm.queue_chat(text, Some(creator_name.clone()), true);
            } else {
                realm.queue_chat(text, None, false);
            }

            realm.queue_game_create(GameAnnouncement {
                visibility,
                name: game_name.clone(),
                map_path: map.map_path().to_string(),
                is_savegame: requested_savegame.is_some(),
                host_counter,
            });
        }

        // A private game skips the refresh cycle entirely, so every realm
        // but PVPGN (which treats enterchat as a gameuncreate mid-game) can
        // rejoin chat immediately.
        if visibility == GameVisibility::Private {
            for realm in realms.iter_mut() {
                if !realm.password_hash_type().eq_ignore_ascii_case("pvpgn") {
                    realm.queue_enter_chat();
                }
            }
        }

        for realm in realms.iter_mut() {
            if realm.get_hold_friends() {
                realm.hold_friends(host_counter);
            }
            if realm.get_hold_clan() {
                realm.hold_clan(host_counter);
            }
        }

        self.current_lobby = Some(game.clone());
        Ok(game)
    }

    /// Moves the current lobby into the post-lobby `games` list once it
    /// stops advertising.
    pub fn promote_if_started(&mut self) {
        if let Some(lobby) = &self.current_lobby {
            if !lobby.is_advertising() {
                self.games.push(lobby.clone());
                self.current_lobby = None;
            }
        }
    }

    /// A realm reported a successful advertisement refresh.
    pub fn on_refresh_ok(&self, realm: &str) {
        if let Some(lobby) = &self.current_lobby {
            lobby.refresh_ok(realm);
        }
    }

    /// A realm failed to refresh the lobby's advertisement. If nobody has
    /// joined yet, the lobby has no way to attract players on that realm
    /// anymore, so it is marked exiting.
    pub fn on_refresh_fail(&self, realm: &str) {
        if let Some(lobby) = &self.current_lobby {
            lobby.refresh_fail(realm);
            if lobby.human_player_count() == 0 {
                lobby.mark_exiting();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::test_support::{StubFactory, StubMap};
    use crate::realm::test_support::StubRealm;

    fn manager() -> LobbyManager {
        LobbyManager::new(true, 4, 6112, "0.0.0.0".to_string())
    }

    #[test]
    fn rejects_name_over_31_bytes() {
        let mut mgr = manager();
        let map = StubMap {
            valid: true,
            path: "map.w3x".to_string(),
            ..Default::default()
        };
        let factory = StubFactory;
        let mut realms: Vec<Box<dyn RealmSession>> = Vec::new();
        let err = mgr
            .create_game(
                &map,
                None,
                GameVisibility::Public,
                "a".repeat(32),
                "owner".into(),
                "creator".into(),
                "realm".into(),
                false,
                &mut realms,
                &factory,
            )
            .unwrap_err();
        assert_eq!(err, CreateGameRejection::NameTooLong);
    }

    #[test]
    fn rejects_second_lobby_while_one_is_active() {
        let mut mgr = manager();
        let map = StubMap {
            valid: true,
            path: "map.w3x".to_string(),
            ..Default::default()
        };
        let factory = StubFactory;
        let mut realms: Vec<Box<dyn RealmSession>> = Vec::new();

        mgr.create_game(
            &map,
            None,
            GameVisibility::Public,
            "First".into(),
            "owner".into(),
            "creator".into(),
            "realm".into(),
            false,
            &mut realms,
            &factory,
        )
        .unwrap();

        let err = mgr
            .create_game(
                &map,
                None,
                GameVisibility::Public,
                "Second".into(),
                "owner".into(),
                "creator".into(),
                "realm".into(),
                false,
                &mut realms,
                &factory,
            )
            .unwrap_err();

        assert!(matches!(err, CreateGameRejection::AnotherGameInLobby { .. }));
    }

    #[test]
    fn enforce_players_cleared_whenever_a_savegame_is_loaded_even_if_unrequested() {
        let mut mgr = manager();
        mgr.set_enforce_players(vec!["Player1".to_string()]);
        mgr.set_loaded_savegame(Arc::new(crate::game::test_support::StubSaveGame {
            valid: true,
            path: "map.w3x".to_string(),
        }));

        let map = StubMap {
            valid: true,
            path: "map.w3x".to_string(),
            ..Default::default()
        };
        let factory = StubFactory;
        let mut realms: Vec<Box<dyn RealmSession>> = Vec::new();

        mgr.create_game(
            &map,
            None,
            GameVisibility::Public,
            "NotASaveGame".into(),
            "owner".into(),
            "creator".into(),
            "realm".into(),
            false,
            &mut realms,
            &factory,
        )
        .unwrap();

        assert!(mgr.enforce_players.is_empty());
    }

    #[test]
    fn refresh_fail_with_no_players_marks_lobby_exiting() {
        let mut mgr = manager();
        let map = StubMap {
            valid: true,
            path: "map.w3x".to_string(),
            ..Default::default()
        };
        let factory = StubFactory;
        let mut realms: Vec<Box<dyn RealmSession>> = Vec::new();

        mgr.create_game(
            &map,
            None,
            GameVisibility::Public,
            "Game".into(),
            "owner".into(),
            "creator".into(),
            "realm".into(),
            false,
            &mut realms,
            &factory,
        )
        .unwrap();

        mgr.on_refresh_fail("realm");

        let lobby = mgr.current_lobby().unwrap();
        assert!(!lobby.is_advertising());
    }

    #[test]
    fn private_game_skips_enter_chat_on_pvpgn_realms() {
        use crate::realm::test_support::RealmEvent;

        let mut mgr = manager();
        let map = StubMap {
            valid: true,
            path: "map.w3x".to_string(),
            ..Default::default()
        };
        let factory = StubFactory;
        let mut pvpgn = StubRealm::new("pvpgn.realm");
        pvpgn.password_hash_type = "pvpgn".to_string();
        let pvpgn_sink = pvpgn.event_sink();
        let mut other = StubRealm::new("other.realm");
        other.password_hash_type = "battlenet".to_string();
        let other_sink = other.event_sink();
        let mut realms: Vec<Box<dyn RealmSession>> = vec![Box::new(pvpgn), Box::new(other)];

        mgr.create_game(
            &map,
            None,
            GameVisibility::Private,
            "Game".into(),
            "owner".into(),
            "creator".into(),
            "realm".into(),
            false,
            &mut realms,
            &factory,
        )
        .unwrap();

        let pvpgn_events = pvpgn_sink.lock().unwrap();
        let other_events = other_sink.lock().unwrap();
        assert!(!pvpgn_events.iter().any(|e| matches!(e, RealmEvent::EnterChat)));
        assert!(other_events.iter().any(|e| matches!(e, RealmEvent::EnterChat)));
    }
}
