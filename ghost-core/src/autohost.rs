//! The autohost controller.
//!
//! Periodically starts a new lobby on its own, without any realm command,
//! as long as autohosting is configured and nothing else is already using
//! up the lobby slot. Map file enumeration and in-map matchmaking
//! categories are out of scope for this crate; the caller supplies
//! whatever map candidates exist and this module only applies the
//! selection policy and the throttle.

use rand::Rng;

use crate::config::{AutohostConfig, RandomMapMode};
use crate::game::{GameHandle, Map};

/// Minimum time between two autohost attempts, regardless of how often
/// `try_host` is called (unchanged from the original bot).
const THROTTLE_S: u32 = 30;

pub struct AutohostController {
    config: AutohostConfig,
    last_attempt_s: Option<u32>,
}

impl AutohostController {
    pub fn new(config: AutohostConfig) -> Self {
        Self {
            config,
            last_attempt_s: None,
        }
    }

    pub fn config(&self) -> &AutohostConfig {
        &self.config
    }

    pub fn disable(&mut self) {
        self.config.disable();
    }

    /// Whether an attempt should be made this tick, given the current
    /// orchestrator state. Does not itself mutate any throttle state —
    /// call `record_attempt` once an attempt is actually made.
    #[allow(clippy::too_many_arguments)]
    pub fn should_attempt(
        &self,
        now_s: u32,
        exiting_nice: bool,
        orchestrator_enabled: bool,
        has_current_lobby: bool,
        games_len: u32,
        max_games: u32,
    ) -> bool {
        if exiting_nice || !orchestrator_enabled || has_current_lobby {
            return false;
        }

        if !self.config.is_configured() {
            return false;
        }

        if games_len >= max_games || games_len >= self.config.max_games {
            return false;
        }

        match self.last_attempt_s {
            Some(last) => now_s.wrapping_sub(last) >= THROTTLE_S,
            None => true,
        }
    }

    pub fn record_attempt(&mut self, now_s: u32) {
        self.last_attempt_s = Some(now_s);
    }

    /// Picks which map to host next. `directory_candidates` and
    /// `list_candidates` are resolved by the caller from
    /// `bot_mappath`/`autohost_randommap_list` respectively; this only
    /// applies the selection policy. Returns `None`
    /// if the mode needs candidates that weren't supplied, in which case
    /// the caller should fall back to the already-loaded autohost map.
    pub fn pick_map<'a>(
        &'a self,
        directory_candidates: &'a [String],
        rng: &mut impl Rng,
    ) -> Option<&'a str> {
        match self.config.randomize_map_type {
            RandomMapMode::None => None,
            RandomMapMode::Random => {
                if directory_candidates.is_empty() {
                    None
                } else {
                    let index = rng.gen_range(0..directory_candidates.len());
                    Some(directory_candidates[index].as_str())
                }
            }
            RandomMapMode::List => {
                let entries: Vec<&str> = self
                    .config
                    .randomize_map_list
                    .split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .collect();
                if entries.is_empty() {
                    None
                } else {
                    let index = rng.gen_range(0..entries.len());
                    directory_candidates
                        .iter()
                        .map(String::as_str)
                        .find(|c| *c == entries[index])
                        .or(Some(entries[index]))
                }
            }
        }
    }

    /// `"{game_name} #{host_counter}"`, or `None` if that would exceed the
    /// 31-byte game name limit — the original bot fails silently here
    /// rather than spamming chat, and tries again on the next throttle
    /// window.
    pub fn next_game_name(&self, host_counter: u32) -> Option<String> {
        let name = format!("{} #{host_counter}", self.config.game_name);
        if name.len() > 31 {
            None
        } else {
            Some(name)
        }
    }

    /// Applies the post-creation autohost settings to a freshly created
    /// game: the auto-start threshold, and matchmaking bounds if
    /// configured. Matchmaking only turns on when the map itself declares a
    /// matchmaking category and pins its player settings; otherwise it is
    /// logged and left disabled for this lobby even if autohost's own
    /// config asked for it (ghost.cpp:993-1010).
    pub fn configure_new_game(&self, game: &dyn GameHandle, map: &dyn Map) {
        game.set_auto_start_players(self.config.start_players);

        if !self.config.matchmaking {
            return;
        }

        if map.matchmaking_category().is_some() && map.has_fixed_player_settings() {
            game.enable_matchmaking(self.config.minimum_score, self.config.maximum_score);
        } else {
            tracing::info!(
                map = map.map_path(),
                "map has no matchmaking category or fixed player settings, disabling matchmaking for this lobby"
            );
        }
    }
}
