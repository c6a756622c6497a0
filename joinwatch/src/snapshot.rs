use std::borrow::Borrow;
use std::collections::HashSet;
use std::future::Future;

use crate::query::QueryError;

/// A player name as reported by the game server. Never blank.
///
/// Names are compared exactly as received: no trimming, no case folding.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PlayerName(String);

impl PlayerName {
    /// Returns None for empty or whitespace-only names.
    pub fn new(name: impl Into<String>) -> Option<Self> {
        let name = name.into();
        if name.trim().is_empty() {
            None
        } else {
            Some(Self(name))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for PlayerName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl Borrow<str> for PlayerName {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// Live roster of the server, fetched fresh on every invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct ServerSnapshot {
    /// Display name advertised by the server.
    pub server_name: String,
    /// Player count reported by the server, including slots without a name yet.
    pub count: u32,
    /// Distinct non-blank names in the order the server listed them.
    pub players: Vec<PlayerName>,
}

impl ServerSnapshot {
    /// Build a snapshot from raw query output, dropping blank names and
    /// repeated names (the first occurrence wins).
    pub fn from_raw<I, S>(server_name: impl Into<String>, count: u32, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut seen = HashSet::new();
        let players = names
            .into_iter()
            .filter_map(PlayerName::new)
            .filter(|name| seen.insert(name.clone()))
            .collect();

        Self {
            server_name: server_name.into(),
            count,
            players,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    pub fn contains(&self, name: &str) -> bool {
        self.players.iter().any(|p| p.as_str() == name)
    }
}

/// Anything that can produce a fresh [`ServerSnapshot`].
pub trait SnapshotSource: Send + Sync {
    fn fetch(&self) -> impl Future<Output = Result<ServerSnapshot, QueryError>> + Send;
}
