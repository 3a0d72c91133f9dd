//! The top-level orchestrator.
//!
//! Ties every other module together into the fixed processing order the
//! original bot's `CGHost::Update` used: reap finished work, handle a
//! graceful-shutdown request, drain completed database callables, accept
//! and service reconnects, then autohost. One call to `tick` is one pass
//! through that order; `run` calls `tick` until it returns `true`.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use ghost_db::DbBackend;

use crate::autohost::AutohostController;
use crate::clock::Clock;
use crate::config::Config;
use crate::game::{GameFactory, GameHandle, Map, SaveGame};
use crate::lobby::{CreateGameRejection, LobbyManager};
use crate::realm::{GameVisibility, RealmSession};
use crate::reconnect::{reject_and_close, ReconnectAcceptor, ReconnectInbox, RECONNECT_WINDOW_MS};

/// How long a game may wait to be serviced in the absence of anything more
/// urgent (a hard ceiling on the blocking wait).
const MAX_BLOCK_MS: u32 = 50;

/// How long the orchestrator waits for in-flight callables to finish once
/// every game has exited, during a graceful shutdown.
const SHUTDOWN_DRAIN_S: u32 = 60;

pub struct Orchestrator {
    clock: Clock,
    db: Box<dyn DbBackend>,
    callables: ghost_db::CallableRegistry,
    realms: Vec<Box<dyn RealmSession>>,
    lobby: LobbyManager,
    autohost: AutohostController,
    game_factory: Box<dyn GameFactory>,
    reconnect_acceptor: ReconnectAcceptor,
    reconnect_inbox: Arc<ReconnectInbox>,
    enabled: bool,
    max_games: u32,
    exiting_nice: Arc<AtomicBool>,
    exiting: bool,
    all_games_finished: bool,
    all_games_finished_at_s: Option<u32>,
    autohost_map: Option<Arc<dyn Map>>,
}

impl Orchestrator {
    pub fn new(
        config: &Config,
        db: Box<dyn DbBackend>,
        realms: Vec<Box<dyn RealmSession>>,
        game_factory: Box<dyn GameFactory>,
    ) -> Self {
        let lobby = LobbyManager::new(
            true,
            config.bot_maxgames,
            config.bot_hostport,
            config.bot_bindaddress.clone(),
        );
        let reconnect_acceptor = ReconnectAcceptor::new(
            config.bot_bindaddress.clone(),
            config.bot_reconnectport,
            config.bot_reconnect,
        );

        Self {
            clock: Clock::new(),
            db,
            callables: ghost_db::CallableRegistry::new(),
            realms,
            lobby,
            autohost: AutohostController::new(config.autohost.clone()),
            game_factory,
            reconnect_acceptor,
            reconnect_inbox: Arc::new(ReconnectInbox::new()),
            enabled: true,
            max_games: config.bot_maxgames,
            exiting_nice: Arc::new(AtomicBool::new(false)),
            exiting: false,
            all_games_finished: false,
            all_games_finished_at_s: None,
            autohost_map: None,
        }
    }

    /// A clone of the flag the signal handler flips. Installing the signal
    /// handler itself lives in `main`: two SIGINTs exit immediately, one
    /// requests a graceful shutdown.
    pub fn exit_flag(&self) -> Arc<AtomicBool> {
        self.exiting_nice.clone()
    }

    pub fn reconnect_inbox(&self) -> Arc<ReconnectInbox> {
        self.reconnect_inbox.clone()
    }

    /// The map an autohosted game should use when autohost isn't in a
    /// random-map mode, or as the target `LoadMap` overwrites when it is.
    /// Loading the map file itself is out of scope here.
    pub fn set_autohost_map(&mut self, map: Arc<dyn Map>) {
        self.autohost_map = Some(map);
    }

    /// Starts a new lobby-stage game. Exposed for whatever out-of-scope
    /// chat-command parser drives player-requested `!host` commands, and
    /// used internally by the autohost controller.
    #[allow(clippy::too_many_arguments)]
    pub fn create_game(
        &mut self,
        map: &dyn Map,
        savegame: Option<&dyn SaveGame>,
        visibility: GameVisibility,
        name: String,
        owner: String,
        creator: String,
        creator_realm: String,
        whisper: bool,
    ) -> Result<Arc<dyn GameHandle>, CreateGameRejection> {
        self.lobby.create_game(
            map,
            savegame,
            visibility,
            name,
            owner,
            creator,
            creator_realm,
            whisper,
            &mut self.realms,
            self.game_factory.as_ref(),
        )
    }

    /// Runs until the orchestrator decides to exit, then returns.
    pub async fn run(&mut self) {
        loop {
            if self.tick().await {
                break;
            }
        }
    }

    /// One pass through the fixed processing order. Returns `true` once
    /// the orchestrator should stop calling `tick` at all.
    pub async fn tick(&mut self) -> bool {
        if self.db.has_error() {
            tracing::warn!(error = ?self.db.get_error(), "database error, exiting");
            return true;
        }

        if self.lobby.reap() {
            for realm in self.realms.iter_mut() {
                realm.queue_game_uncreate();
                realm.queue_enter_chat();
            }
        }
        self.lobby.promote_if_started();

        if self.exiting_nice.load(Ordering::SeqCst) {
            self.advance_graceful_shutdown().await;
            if self.exiting {
                return true;
            }
        }

        let now_ms = self.clock.now_ms();
        let mut finished_callables = Vec::new();
        self.callables
            .drain_ready(|item| {
                tracing::debug!(label = item.label(), "callable finished");
                finished_callables.push(item);
            })
            .await;
        for item in finished_callables {
            self.db.recover_callable(item).await;
        }

        for realm in self.realms.iter_mut() {
            if realm.update().await {
                tracing::warn!("realm reported a fatal condition, exiting");
                return true;
            }
        }

        self.reconnect_acceptor.ensure_listening().await;

        let budget_ms = self.compute_budget_ms();
        self.reconnect_acceptor
            .service_epoch(Duration::from_millis(budget_ms as u64), &self.clock, &self.reconnect_inbox)
            .await;

        for expired in self.reconnect_inbox.expire(now_ms, RECONNECT_WINDOW_MS).await {
            reject_and_close(expired.socket, protocol::RejectCode::NotFound).await;
        }

        if !self.exiting_nice.load(Ordering::SeqCst) {
            self.run_autohost();
        }

        false
    }

    fn compute_budget_ms(&self) -> u32 {
        let mut budget = MAX_BLOCK_MS;
        for game in self.lobby.games() {
            budget = budget.min(game.next_timed_action_ticks());
        }
        if let Some(lobby) = self.lobby.current_lobby() {
            budget = budget.min(lobby.next_timed_action_ticks());
        }
        budget.max(1)
    }

    async fn advance_graceful_shutdown(&mut self) {
        if !self.realms.is_empty() {
            tracing::info!("dropping realm connections for graceful shutdown");
            self.realms.clear();
        }

        if let Some(lobby) = self.lobby.current_lobby() {
            lobby.mark_exiting();
        }

        if self.lobby.games().is_empty() && self.lobby.current_lobby().is_none() {
            if !self.all_games_finished {
                let pending_callables = self.callables.len().await;
                tracing::info!(
                    pending_callables,
                    "all games finished, waiting for background work to finish"
                );
                self.all_games_finished = true;
                self.all_games_finished_at_s = Some(self.clock.now_s());
            } else if self.callables.is_empty().await {
                tracing::info!("all background work finished, exiting");
                self.exiting = true;
            } else if let Some(since) = self.all_games_finished_at_s {
                if self.clock.now_s().wrapping_sub(since) >= SHUTDOWN_DRAIN_S {
                    tracing::warn!("timed out waiting for background work, exiting anyway");
                    self.exiting = true;
                }
            }
        }
    }

    fn run_autohost(&mut self) {
        let now_s = self.clock.now_s();
        let has_lobby = self.lobby.current_lobby().is_some();
        let games_len = self.lobby.games().len() as u32;

        if !self.autohost.should_attempt(
            now_s,
            self.exiting_nice.load(Ordering::SeqCst),
            self.enabled,
            has_lobby,
            games_len,
            self.max_games,
        ) {
            return;
        }

        self.autohost.record_attempt(now_s);

        let Some(map) = self.autohost_map.clone() else {
            tracing::debug!("autohost is configured but no map has been loaded yet");
            return;
        };

        if !map.valid() {
            tracing::warn!("autohost map is no longer valid, disabling autohost");
            self.autohost.disable();
            return;
        }

        // `host_counter` is only known once `create_game` assigns one, so
        // the name is built with a placeholder host counter and
        // `create_game` re-derives the real one internally; this mirrors
        // the original bot reading `m_HostCounter` before the call.
        let Some(name) = self.autohost.next_game_name(self.lobby.next_host_counter()) else {
            tracing::warn!("autohosted game name would exceed 31 bytes, disabling autohost");
            self.autohost.disable();
            return;
        };

        let config = self.autohost.config().clone();
        match self.create_game(
            map.as_ref(),
            None,
            GameVisibility::Public,
            name,
            config.owner.clone(),
            config.owner,
            config.server,
            false,
        ) {
            Ok(game) => self.autohost.configure_new_game(game.as_ref(), map.as_ref()),
            Err(rejection) => {
                tracing::debug!(?rejection, "autohost attempt did not start a game");
            }
        }
    }
}
