//! Configuration loading.
//!
//! Recognizes the `key = value` line format the original bot used rather
//! than TOML or JSON, since operators' existing `ghost.cfg` files need to
//! keep working. `default.cfg` is read first (if present) and the file
//! named on the command line (default `ghost.cfg`) is overlaid on top of
//! it, key by key.

use crate::error::ConfigError;
use ghost_db::DbKind;
use std::collections::HashMap;
use std::path::Path;

/// A flattened `key -> value` view of one or more config files, in the
/// order they were merged.
#[derive(Default, Debug, Clone)]
pub struct RawConfig(HashMap<String, String>);

impl RawConfig {
    fn parse_str(contents: &str, into: &mut HashMap<String, String>) {
        for line in contents.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') || line.starts_with("//") {
                continue;
            }
            let Some((key, value)) = line.split_once('=') else {
                continue;
            };
            into.insert(key.trim().to_string(), value.trim().to_string());
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    fn get_string(&self, key: &str, default: &str) -> String {
        self.get(key).unwrap_or(default).to_string()
    }

    fn get_bool(&self, key: &str, default: bool) -> bool {
        match self.get(key) {
            Some(v) => v == "1" || v.eq_ignore_ascii_case("true"),
            None => default,
        }
    }

    fn get_u32(&self, key: &str, default: u32) -> u32 {
        self.get(key)
            .and_then(|v| v.parse().ok())
            .unwrap_or(default)
    }

    fn get_u16(&self, key: &str, default: u16) -> u16 {
        self.get(key)
            .and_then(|v| v.parse().ok())
            .unwrap_or(default)
    }

    /// Keys beginning with `bnet` (the default realm) or `bnet<N>_` (realm
    /// N, 1-indexed) grouped by realm. Realm 0 is the bare `bnet_*` block.
    pub fn realm_blocks(&self) -> Vec<HashMap<String, String>> {
        let mut blocks: HashMap<u32, HashMap<String, String>> = HashMap::new();
        for (key, value) in &self.0 {
            if let Some(rest) = key.strip_prefix("bnet") {
                let (index, field) = if let Some(underscore) = rest.find('_') {
                    let (num_part, field_part) = rest.split_at(underscore);
                    let index = num_part.parse::<u32>().unwrap_or(0);
                    (index, field_part.trim_start_matches('_'))
                } else {
                    continue;
                };
                blocks
                    .entry(index)
                    .or_default()
                    .insert(field.to_string(), value.clone());
            }
        }
        let mut ordered: Vec<(u32, HashMap<String, String>)> = blocks.into_iter().collect();
        ordered.sort_by_key(|(index, _)| *index);
        ordered.into_iter().map(|(_, block)| block).collect()
    }
}

/// How the autohost controller should pick its next map.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RandomMapMode {
    None,
    Random,
    List,
}

#[derive(Debug, Clone)]
pub struct AutohostConfig {
    pub max_games: u32,
    pub start_players: u32,
    pub game_name: String,
    pub owner: String,
    pub server: String,
    pub randomize_map_type: RandomMapMode,
    pub randomize_map_list: String,
    pub matchmaking: bool,
    pub minimum_score: f64,
    pub maximum_score: f64,
}

impl AutohostConfig {
    /// True once every autohost precondition that depends purely on
    /// configuration (not on runtime state) is satisfied.
    pub fn is_configured(&self) -> bool {
        !self.game_name.is_empty() && self.max_games != 0 && self.start_players != 0
    }

    /// Disables autohost in place, matching the original bot's behavior of
    /// clearing every autohost field rather than a single flag.
    pub fn disable(&mut self) {
        self.game_name.clear();
        self.owner.clear();
        self.max_games = 0;
        self.start_players = 0;
        self.randomize_map_type = RandomMapMode::None;
        self.randomize_map_list.clear();
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warning,
    Error,
    Fatal,
}

impl LogLevel {
    fn parse(value: &str) -> Self {
        match value.to_ascii_uppercase().as_str() {
            "TRACE" => LogLevel::Trace,
            "DEBUG" => LogLevel::Debug,
            "WARNING" => LogLevel::Warning,
            "ERROR" => LogLevel::Error,
            "FATAL" => LogLevel::Fatal,
            _ => LogLevel::Info,
        }
    }

    pub fn as_tracing_filter(self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warning => "warn",
            LogLevel::Error => "error",
            LogLevel::Fatal => "error",
        }
    }
}

/// One configured realm. The realm login/auth handshake and chat-command
/// parser are out of scope for this crate; this struct only carries the
/// raw fields a realm-session implementation would need to configure
/// itself, keyed the same way the config file is.
#[derive(Debug, Clone, Default)]
pub struct RealmConfig {
    pub fields: HashMap<String, String>,
}

impl RealmConfig {
    pub fn server(&self) -> Option<&str> {
        self.fields.get("server").map(String::as_str)
    }

    pub fn is_pvpgn(&self) -> bool {
        self.fields
            .get("passwordhashtype")
            .map(|v| v == "pvpgn")
            .unwrap_or(false)
    }

    pub fn hold_friends(&self) -> bool {
        self.fields
            .get("holdfriends")
            .map(|v| v == "1")
            .unwrap_or(false)
    }

    pub fn hold_clan(&self) -> bool {
        self.fields
            .get("holdclan")
            .map(|v| v == "1")
            .unwrap_or(false)
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub bot_tft: bool,
    pub bot_hostport: u16,
    pub bot_reconnect: bool,
    pub bot_reconnectport: u16,
    pub bot_bindaddress: String,
    pub bot_maxgames: u32,
    pub bot_lobbytimelimit: u32,
    pub bot_latency: u32,
    pub bot_synclimit: u32,
    pub bot_commandtrigger: char,
    pub bot_language: String,
    pub bot_war3path: String,
    pub bot_mapcfgpath: String,
    pub bot_mappath: String,
    pub bot_savegamepath: String,
    pub bot_replaypath: String,
    pub bot_savereplays: bool,
    pub bot_virtualhostname: String,
    pub bot_hideipaddresses: bool,
    pub bot_checkmultipleipusage: bool,
    pub bot_spoofchecks: u32,
    pub bot_requirespoofchecks: bool,
    pub bot_reserveadmins: bool,
    pub bot_refreshmessages: bool,
    pub bot_autolock: bool,
    pub bot_autosave: bool,
    pub bot_allowdownloads: u32,
    pub bot_pingduringdownloads: bool,
    pub bot_maxdownloaders: u32,
    pub bot_maxdownloadspeed: u32,
    pub bot_lcpings: bool,
    pub bot_autokickping: u32,
    pub bot_votestartallowed: bool,
    pub bot_votestartplayers: u32,
    pub bot_votestartpercentage: u8,
    pub bot_votekickallowed: bool,
    pub bot_votekickpercentage: u8,
    pub bot_banmethod: String,
    pub bot_ipblacklistfile: String,
    pub bot_motdfile: String,
    pub bot_gameloadedfile: String,
    pub bot_gameoverfile: String,
    pub tcp_nodelay: bool,
    pub bot_matchmakingmethod: String,
    pub bot_mapgametype: String,
    pub autohost: AutohostConfig,
    pub db_type: DbKind,
    pub db_url: String,
    pub udp_broadcasttarget: String,
    pub udp_dontroute: bool,
    pub bot_log: String,
    pub bot_loglevel: LogLevel,
    pub realms: Vec<RealmConfig>,
}

impl Config {
    pub fn from_raw(raw: &RawConfig) -> Self {
        let mut virtual_host = raw.get_string("bot_virtualhostname", "GHost");
        if virtual_host.len() > 15 {
            virtual_host.truncate(15);
        }

        let db_type_str = raw.get_string("db_type", "sqlite3");
        let db_type = DbKind::parse(&db_type_str).unwrap_or(DbKind::Sqlite3);

        let randomize_map_type = match raw.get_string("autohost_randommap_type", "none").as_str() {
            "random" => RandomMapMode::Random,
            "list" => RandomMapMode::List,
            _ => RandomMapMode::None,
        };

        Config {
            bot_tft: raw.get_bool("bot_tft", true),
            bot_hostport: raw.get_u16("bot_hostport", 6112),
            bot_reconnect: raw.get_bool("bot_reconnect", true),
            bot_reconnectport: raw.get_u16("bot_reconnectport", 6113),
            bot_bindaddress: raw.get_string("bot_bindaddress", "0.0.0.0"),
            bot_maxgames: raw.get_u32("bot_maxgames", 20),
            bot_lobbytimelimit: raw.get_u32("bot_lobbytimelimit", 10),
            bot_latency: raw.get_u32("bot_latency", 100),
            bot_synclimit: raw.get_u32("bot_synclimit", 50),
            bot_commandtrigger: raw
                .get_string("bot_commandtrigger", "!")
                .chars()
                .next()
                .unwrap_or('!'),
            bot_language: raw.get_string("bot_language", "language.cfg"),
            bot_war3path: raw.get_string("bot_war3path", String::new().as_str()),
            bot_mapcfgpath: raw.get_string("bot_mapcfgpath", "mapcfgs/"),
            bot_mappath: raw.get_string("bot_mappath", "maps/"),
            bot_savegamepath: raw.get_string("bot_savegamepath", "savegames/"),
            bot_replaypath: raw.get_string("bot_replaypath", "replays/"),
            bot_savereplays: raw.get_bool("bot_savereplays", false),
            bot_virtualhostname: virtual_host,
            bot_hideipaddresses: raw.get_bool("bot_hideipaddresses", false),
            bot_checkmultipleipusage: raw.get_bool("bot_checkmultipleipusage", true),
            bot_spoofchecks: raw.get_u32("bot_spoofchecks", 1),
            bot_requirespoofchecks: raw.get_bool("bot_requirespoofchecks", false),
            bot_reserveadmins: raw.get_bool("bot_reserveadmins", true),
            bot_refreshmessages: raw.get_bool("bot_refreshmessages", false),
            bot_autolock: raw.get_bool("bot_autolock", false),
            bot_autosave: raw.get_bool("bot_autosave", false),
            bot_allowdownloads: raw.get_u32("bot_allowdownloads", 1),
            bot_pingduringdownloads: raw.get_bool("bot_pingduringdownloads", false),
            bot_maxdownloaders: raw.get_u32("bot_maxdownloaders", 3),
            bot_maxdownloadspeed: raw.get_u32("bot_maxdownloadspeed", 100),
            bot_lcpings: raw.get_bool("bot_lcpings", true),
            bot_autokickping: raw.get_u32("bot_autokickping", 400),
            bot_votestartallowed: raw.get_bool("bot_votestartallowed", false),
            bot_votestartplayers: raw.get_u32("bot_votestartplayers", 2),
            bot_votestartpercentage: raw
                .get_u32("bot_votestartpercentage", 100)
                .min(100) as u8,
            bot_votekickallowed: raw.get_bool("bot_votekickallowed", true),
            bot_votekickpercentage: raw
                .get_u32("bot_votekickpercentage", 100)
                .min(100) as u8,
            bot_banmethod: raw.get_string("bot_banmethod", "0"),
            bot_ipblacklistfile: raw.get_string("bot_ipblacklistfile", String::new().as_str()),
            bot_motdfile: raw.get_string("bot_motdfile", "motd.txt"),
            bot_gameloadedfile: raw.get_string("bot_gameloadedfile", String::new().as_str()),
            bot_gameoverfile: raw.get_string("bot_gameoverfile", String::new().as_str()),
            tcp_nodelay: raw.get_bool("tcp_nodelay", true),
            bot_matchmakingmethod: raw.get_string("bot_matchmakingmethod", String::new().as_str()),
            bot_mapgametype: raw.get_string("bot_mapgametype", String::new().as_str()),
            autohost: AutohostConfig {
                max_games: raw.get_u32("autohost_maxgames", 0),
                start_players: raw.get_u32("autohost_startplayers", 0),
                game_name: raw.get_string("autohost_gamename", String::new().as_str()),
                owner: raw.get_string("autohost_owner", String::new().as_str()),
                server: raw.get_string("autohost_server", String::new().as_str()),
                randomize_map_type,
                randomize_map_list: raw.get_string("autohost_randommap_list", String::new().as_str()),
                matchmaking: raw.get_bool("autohost_matchmaking", false),
                minimum_score: raw
                    .get_string("autohost_minimumscore", "0")
                    .parse()
                    .unwrap_or(0.0),
                maximum_score: raw
                    .get_string("autohost_maximumscore", "0")
                    .parse()
                    .unwrap_or(0.0),
            },
            db_type,
            db_url: raw.get_string("db_url", "ghost.dbgame"),
            udp_broadcasttarget: raw.get_string("udp_broadcasttarget", String::new().as_str()),
            udp_dontroute: raw.get_bool("udp_dontroute", false),
            bot_log: raw.get_string("bot_log", "ghost.log"),
            bot_loglevel: LogLevel::parse(&raw.get_string("bot_loglevel", "INFO")),
            realms: raw
                .realm_blocks()
                .into_iter()
                .map(|fields| RealmConfig { fields })
                .collect(),
        }
    }
}

/// Reads `default.cfg` (if present) then overlays `path` on top of it,
/// matching the original bot's `CFG.Read("default.cfg"); CFG.Read(gCFGFile);`
/// precedence.
pub fn load(path: &Path) -> Result<Config, ConfigError> {
    let mut merged = HashMap::new();

    let default_path = Path::new("default.cfg");
    if default_path.exists() {
        let contents = std::fs::read_to_string(default_path).map_err(|source| ConfigError::Read {
            path: default_path.display().to_string(),
            source,
        })?;
        RawConfig::parse_str(&contents, &mut merged);
    }

    let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.display().to_string(),
        source,
    })?;
    RawConfig::parse_str(&contents, &mut merged);

    let raw = RawConfig(merged);
    Ok(Config::from_raw(&raw))
}

#[cfg(test)]
impl RawConfig {
    /// Test-only constructor shared across this crate's test modules.
    pub(crate) fn from_pairs(pairs: &[(&str, &str)]) -> Self {
        let mut map = HashMap::new();
        for (k, v) in pairs {
            map.insert(k.to_string(), v.to_string());
        }
        RawConfig(map)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw_from(pairs: &[(&str, &str)]) -> RawConfig {
        RawConfig::from_pairs(pairs)
    }

    #[test]
    fn votestart_percentage_is_clamped() {
        let raw = raw_from(&[("bot_votestartpercentage", "150")]);
        let cfg = Config::from_raw(&raw);
        assert_eq!(cfg.bot_votestartpercentage, 100);
    }

    #[test]
    fn virtualhostname_is_truncated_to_15_bytes() {
        let raw = raw_from(&[("bot_virtualhostname", "this-name-is-way-too-long")]);
        let cfg = Config::from_raw(&raw);
        assert!(cfg.bot_virtualhostname.len() <= 15);
    }

    #[test]
    fn unknown_db_type_falls_back_to_sqlite() {
        let raw = raw_from(&[("db_type", "postgres")]);
        let cfg = Config::from_raw(&raw);
        assert_eq!(cfg.db_type, DbKind::Sqlite3);
    }

    #[test]
    fn realm_blocks_group_by_index() {
        let raw = raw_from(&[
            ("bnet_server", "useast.battle.net"),
            ("bnet2_server", "europe.battle.net"),
            ("bnet2_cdkeyroc", "XXXX"),
        ]);
        let blocks = raw.realm_blocks();
        assert_eq!(blocks.len(), 2);
    }

    #[test]
    fn autohost_disable_clears_every_field() {
        let mut autohost = AutohostConfig {
            max_games: 5,
            start_players: 2,
            game_name: "Game".into(),
            owner: "Owner".into(),
            server: "realm".into(),
            randomize_map_type: RandomMapMode::Random,
            randomize_map_list: "a.w3x,b.w3x".into(),
            matchmaking: false,
            minimum_score: 0.0,
            maximum_score: 0.0,
        };
        autohost.disable();
        assert!(!autohost.is_configured());
        assert_eq!(autohost.max_games, 0);
    }
}
