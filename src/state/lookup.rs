//! Client lookup: the authoritative nick map plus the SQLite userhost index.
//!
//! The in-memory nickname map is the source of truth for presence. The
//! SQLite index exists for wildcard lookup (`WHO *!*@host`, operator mask
//! targets): glob wildcards transliterate to SQL `LIKE` patterns and matches
//! resolve back through the nick map. A row whose nickname no longer
//! resolves is stale; it is logged and skipped. Index failures degrade to
//! empty results.

use std::collections::HashMap;

use limelight_proto::{fold, Name};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool};
use thiserror::Error;
use tracing::{error, warn};

use super::client::ClientId;
use super::masks::expand_userhost;

/// Lookup-set consistency errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum LookupError {
    #[error("nick missing")]
    NickMissing,

    #[error("nickname in use")]
    NicknameInUse,

    #[error("nickname mismatch")]
    NicknameMismatch,
}

/// Escape `LIKE` metacharacters and transliterate glob wildcards:
/// `*` becomes `%`, `?` becomes `_`, and literal `\`, `%`, `_` are escaped.
pub fn quote_like(mask: &str) -> String {
    let mut out = String::with_capacity(mask.len() + 4);
    for c in mask.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '%' => out.push_str("\\%"),
            '_' => out.push_str("\\_"),
            '*' => out.push('%'),
            '?' => out.push('_'),
            c => out.push(c),
        }
    }
    out
}

/// The SQLite-backed userhost index.
#[derive(Clone)]
pub struct ClientIndex {
    pool: SqlitePool,
}

const SCHEMA: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS client (
        nickname TEXT NOT NULL UNIQUE,
        userhost TEXT NOT NULL,
        UNIQUE (nickname, userhost) ON CONFLICT REPLACE)",
    "CREATE UNIQUE INDEX IF NOT EXISTS idx_nick ON client (nickname)",
    "CREATE INDEX IF NOT EXISTS idx_uh ON client (userhost)",
];

impl ClientIndex {
    /// Open an existing index database. Fails if the file is absent; run
    /// `initdb` first.
    pub async fn open(path: &str) -> Result<Self, sqlx::Error> {
        let options = SqliteConnectOptions::new().filename(path);
        let pool = SqlitePool::connect_with(options).await?;
        Ok(ClientIndex { pool })
    }

    /// Create the index database and its schema.
    pub async fn init(path: &str) -> Result<(), sqlx::Error> {
        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true);
        let pool = SqlitePool::connect_with(options).await?;
        for stmt in SCHEMA {
            sqlx::query(stmt).execute(&pool).await?;
        }
        pool.close().await;
        Ok(())
    }

    async fn add(&self, nickname: &str, userhost: &str) {
        let result = sqlx::query("INSERT INTO client (nickname, userhost) VALUES (?1, ?2)")
            .bind(nickname)
            .bind(userhost)
            .execute(&self.pool)
            .await;
        if let Err(e) = result {
            error!(nickname, error = %e, "client index add failed");
        }
    }

    async fn remove(&self, nickname: &str) {
        let result = sqlx::query("DELETE FROM client WHERE nickname = ?1")
            .bind(nickname)
            .execute(&self.pool)
            .await;
        if let Err(e) = result {
            error!(nickname, error = %e, "client index remove failed");
        }
    }

    async fn find(&self, like_pattern: &str, limit: Option<i64>) -> Vec<String> {
        let query = match limit {
            Some(_) => {
                "SELECT nickname FROM client WHERE userhost LIKE ?1 ESCAPE '\\' LIMIT ?2"
            }
            None => "SELECT nickname FROM client WHERE userhost LIKE ?1 ESCAPE '\\'",
        };
        let mut q = sqlx::query_scalar::<_, String>(query).bind(like_pattern);
        if let Some(n) = limit {
            q = q.bind(n);
        }
        match q.fetch_all(&self.pool).await {
            Ok(rows) => rows,
            Err(e) => {
                error!(pattern = like_pattern, error = %e, "client index query failed");
                Vec::new()
            }
        }
    }
}

/// Coordinated indexes over registered clients: folded nick to client id,
/// plus the wildcard-capable userhost index.
pub struct ClientLookupSet {
    by_nick: HashMap<String, ClientId>,
    index: ClientIndex,
}

impl ClientLookupSet {
    /// A lookup set over the given index database.
    pub fn new(index: ClientIndex) -> Self {
        ClientLookupSet {
            by_nick: HashMap::new(),
            index,
        }
    }

    /// Resolve a nickname to a client id.
    pub fn get(&self, nick: &Name) -> Option<ClientId> {
        self.by_nick.get(nick.folded()).copied()
    }

    /// Number of registered clients.
    pub fn len(&self) -> usize {
        self.by_nick.len()
    }

    /// Whether no clients are registered.
    pub fn is_empty(&self) -> bool {
        self.by_nick.is_empty()
    }

    /// Register a client under its nickname and userhost.
    pub async fn add(
        &mut self,
        id: ClientId,
        nick: &Name,
        userhost: &str,
    ) -> Result<(), LookupError> {
        if nick.as_str().is_empty() {
            return Err(LookupError::NickMissing);
        }
        if self.by_nick.contains_key(nick.folded()) {
            return Err(LookupError::NicknameInUse);
        }
        self.by_nick.insert(nick.folded().to_string(), id);
        self.index.add(nick.folded(), &fold(userhost)).await;
        Ok(())
    }

    /// Remove a client's registration.
    pub async fn remove(&mut self, id: ClientId, nick: &Name) -> Result<(), LookupError> {
        if nick.as_str().is_empty() {
            return Err(LookupError::NickMissing);
        }
        match self.by_nick.get(nick.folded()) {
            Some(&present) if present == id => {
                self.by_nick.remove(nick.folded());
                self.index.remove(nick.folded()).await;
                Ok(())
            }
            _ => Err(LookupError::NicknameMismatch),
        }
    }

    /// All clients whose userhost matches the (possibly partial) mask.
    pub async fn find_all(&self, mask: &str) -> Vec<ClientId> {
        let pattern = quote_like(&fold(&expand_userhost(mask)));
        let mut found = Vec::new();
        for nickname in self.index.find(&pattern, None).await {
            match self.by_nick.get(&nickname) {
                Some(&id) => found.push(id),
                None => warn!(nickname, "stale userhost index entry, skipping"),
            }
        }
        found
    }

    /// The first client whose userhost matches the mask, if any.
    pub async fn find_one(&self, mask: &str) -> Option<ClientId> {
        let pattern = quote_like(&fold(&expand_userhost(mask)));
        for nickname in self.index.find(&pattern, Some(1)).await {
            match self.by_nick.get(&nickname) {
                Some(&id) => return Some(id),
                None => warn!(nickname, "stale userhost index entry, skipping"),
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use limelight_proto::Name;

    #[test]
    fn like_transliteration() {
        assert_eq!(quote_like("*!*@evil.*"), "%!%@evil.%");
        assert_eq!(quote_like("n?ck!*@*"), "n_ck!%@%");
        assert_eq!(quote_like("100%_\\x"), "100\\%\\_\\\\x");
    }

    async fn temp_set() -> (ClientLookupSet, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("index.db");
        let path = path.to_str().unwrap();
        ClientIndex::init(path).await.unwrap();
        let index = ClientIndex::open(path).await.unwrap();
        (ClientLookupSet::new(index), dir)
    }

    #[tokio::test]
    async fn add_get_remove() {
        let (mut set, _dir) = temp_set().await;
        let nick = Name::new("Alice");
        set.add(1, &nick, "Alice!ali@example.net").await.unwrap();
        assert_eq!(set.get(&Name::new("alice")), Some(1));
        assert_eq!(
            set.add(2, &Name::new("ALICE"), "ALICE!x@y").await,
            Err(LookupError::NicknameInUse)
        );
        assert_eq!(
            set.remove(2, &nick).await,
            Err(LookupError::NicknameMismatch)
        );
        set.remove(1, &nick).await.unwrap();
        assert_eq!(set.get(&nick), None);
    }

    #[tokio::test]
    async fn wildcard_find() {
        let (mut set, _dir) = temp_set().await;
        set.add(1, &Name::new("alice"), "alice!ali@good.host")
            .await
            .unwrap();
        set.add(2, &Name::new("bob"), "bob!b@evil.host").await.unwrap();
        set.add(3, &Name::new("carol"), "carol!c@evil.net").await.unwrap();

        let evil = set.find_all("*!*@evil.*").await;
        assert_eq!(evil.len(), 2);
        assert!(evil.contains(&2) && evil.contains(&3));

        // Bare nicks expand to nick!*@*.
        assert_eq!(set.find_one("alice").await, Some(1));
        assert_eq!(set.find_one("nobody").await, None);
    }

    #[tokio::test]
    async fn stale_rows_are_skipped() {
        let (mut set, _dir) = temp_set().await;
        set.add(1, &Name::new("ghost"), "ghost!g@h").await.unwrap();
        // Drop the nick map entry while leaving the index row behind.
        set.by_nick.clear();
        assert!(set.find_all("ghost").await.is_empty());
    }
}
