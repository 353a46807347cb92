use serde::{Deserialize, Deserializer, Serialize};

/// Player name as reported by the server. Usually at most 16 characters, but
/// proxies and older data files carry longer ones, so no limit is enforced.
pub type PlayerName = String;

/// A player listed in the server's status sample.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SampledPlayer {
    pub name: PlayerName,
    /// Session id (UUID) reported by the server
    pub id: String,
}

/// Player counts and the sampled player set from one successful query.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServerStatus {
    pub online: u32,
    pub max: u32,
    pub players: Vec<SampledPlayer>,
}

impl ServerStatus {
    /// Build a status, dropping repeated names so the player list acts as a set.
    pub fn new(online: u32, max: u32, players: impl IntoIterator<Item = SampledPlayer>) -> Self {
        let mut unique: Vec<SampledPlayer> = Vec::new();
        for player in players {
            if !unique.iter().any(|p| p.name == player.name) {
                unique.push(player);
            }
        }
        Self {
            online,
            max,
            players: unique,
        }
    }

    pub fn is_present(&self, name: &str) -> bool {
        self.players.iter().any(|p| p.name.as_str() == name)
    }

    pub fn player_names(&self) -> impl Iterator<Item = &str> {
        self.players.iter().map(|p| p.name.as_str())
    }
}

/// One point-in-time read of server presence.
///
/// A failed query carries no counts or players at all, so nothing can
/// mistake an unreachable server for an empty one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Snapshot {
    Reachable(ServerStatus),
    Unreachable,
}

impl Snapshot {
    pub fn status(&self) -> Option<&ServerStatus> {
        match self {
            Snapshot::Reachable(status) => Some(status),
            Snapshot::Unreachable => None,
        }
    }

    pub fn is_reachable(&self) -> bool {
        matches!(self, Snapshot::Reachable(_))
    }
}

/// A chat-side identity (Discord display name and user id).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub name: String,
    pub id: String,
}

impl Identity {
    pub fn new(name: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            id: id.into(),
        }
    }
}

/// Accrued playtime for one player, persisted under the player's name.
///
/// Field names on disk match the legacy `users.json` layout.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
    #[serde(rename = "time", default)]
    pub minutes: u64,
    /// Last observed session id
    #[serde(rename = "uuid", default)]
    pub id: String,
    #[serde(rename = "discord_name", default)]
    pub linked_identity_name: String,
    #[serde(
        rename = "discord_id",
        default,
        deserialize_with = "string_or_integer"
    )]
    pub linked_identity_id: String,
}

impl LedgerEntry {
    /// A freshly observed player: one sampled minute, no linked identity.
    pub fn first_seen(id: impl Into<String>) -> Self {
        Self {
            minutes: 1,
            id: id.into(),
            ..Default::default()
        }
    }

    pub fn is_linked(&self) -> bool {
        !self.linked_identity_name.is_empty() || !self.linked_identity_id.is_empty()
    }

    pub fn linked_identity(&self) -> Option<Identity> {
        self.is_linked().then(|| {
            Identity::new(
                self.linked_identity_name.clone(),
                self.linked_identity_id.clone(),
            )
        })
    }
}

/// Older data files stored the Discord id as a bare integer once linked.
fn string_or_integer<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Text(String),
        Number(u64),
        Null(()),
    }

    Ok(match Raw::deserialize(deserializer)? {
        Raw::Text(s) => s,
        Raw::Number(n) => n.to_string(),
        Raw::Null(()) => String::new(),
    })
}
