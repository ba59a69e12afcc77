//! Conversation memory for the agent.
//!
//! A session is only ever changed by committing a whole exchange (the user
//! turn and the agent turn together) or by resetting it. Each store applies
//! the commit and the eviction of turns beyond the window as one unit.

use chrono::{DateTime, SecondsFormat, Utc};
use insight_core::{AppError, AppResult};
use insight_knowledge::index::{db_error, with_connection, SharedConnection};
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use tokio::sync::RwLock;

/// Who produced a turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Agent,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Agent => "agent",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = AppError;

    fn from_str(s: &str) -> AppResult<Self> {
        match s {
            "user" => Ok(Self::User),
            "agent" => Ok(Self::Agent),
            other => Err(AppError::Unavailable(format!("Corrupt turn role: {}", other))),
        }
    }
}

/// One message in a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Turn {
    pub role: Role,
    pub text: String,
    pub at: DateTime<Utc>,
}

impl Turn {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            text: text.into(),
            at: Utc::now(),
        }
    }

    pub fn agent(text: impl Into<String>) -> Self {
        Self {
            role: Role::Agent,
            text: text.into(),
            at: Utc::now(),
        }
    }
}

/// A conversation with the agent, oldest turn first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    pub history: Vec<Turn>,
    pub created_at: DateTime<Utc>,
}

impl Session {
    fn new(id: &str) -> Self {
        Self {
            id: id.to_string(),
            history: Vec::new(),
            created_at: Utc::now(),
        }
    }
}

/// Storage for sessions.
///
/// Implementations must make `commit_exchange` atomic per session: readers see
/// either none or both of the new turns, never one of them.
#[async_trait::async_trait]
pub trait SessionStore: Send + Sync {
    /// The session, or `None` before its first completed exchange.
    async fn get(&self, session_id: &str) -> AppResult<Option<Session>>;

    /// History of a session, empty when it does not exist.
    async fn history(&self, session_id: &str) -> AppResult<Vec<Turn>> {
        Ok(self
            .get(session_id)
            .await?
            .map(|session| session.history)
            .unwrap_or_default())
    }

    /// Append a user turn and an agent turn, keeping at most `window` turns.
    ///
    /// Creates the session if needed and returns the resulting history length.
    async fn commit_exchange(
        &self,
        session_id: &str,
        user: Turn,
        agent: Turn,
        window: usize,
    ) -> AppResult<usize>;

    /// Remove a session. Returns whether it existed.
    async fn reset(&self, session_id: &str) -> AppResult<bool>;
}

/// Process-local sessions.
#[derive(Debug, Default)]
pub struct InMemorySessionStore {
    sessions: RwLock<HashMap<String, Session>>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl SessionStore for InMemorySessionStore {
    async fn get(&self, session_id: &str) -> AppResult<Option<Session>> {
        Ok(self.sessions.read().await.get(session_id).cloned())
    }

    async fn commit_exchange(
        &self,
        session_id: &str,
        user: Turn,
        agent: Turn,
        window: usize,
    ) -> AppResult<usize> {
        let mut sessions = self.sessions.write().await;
        let session = sessions
            .entry(session_id.to_string())
            .or_insert_with(|| Session::new(session_id));

        session.history.push(user);
        session.history.push(agent);
        if session.history.len() > window {
            let excess = session.history.len() - window;
            session.history.drain(..excess);
        }
        Ok(session.history.len())
    }

    async fn reset(&self, session_id: &str) -> AppResult<bool> {
        Ok(self.sessions.write().await.remove(session_id).is_some())
    }
}

/// Sessions persisted next to the records, in the index database.
pub struct SqliteSessionStore {
    conn: SharedConnection,
}

impl fmt::Debug for SqliteSessionStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SqliteSessionStore").finish_non_exhaustive()
    }
}

impl SqliteSessionStore {
    /// Use an existing connection, creating the session tables if needed.
    pub async fn new(conn: SharedConnection) -> AppResult<Self> {
        with_connection(&conn, |conn| init_schema(conn)).await?;
        Ok(Self { conn })
    }
}

fn init_schema(conn: &mut Connection) -> AppResult<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS sessions (
            id TEXT PRIMARY KEY,
            created_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS session_turns (
            session_id TEXT NOT NULL REFERENCES sessions(id),
            seq INTEGER NOT NULL,
            role TEXT NOT NULL,
            text TEXT NOT NULL,
            at TEXT NOT NULL,
            PRIMARY KEY (session_id, seq)
        );
        "#,
    )
    .map_err(db_error("Failed to create session tables"))
}

fn timestamp(at: &DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

fn parse_timestamp(value: &str) -> AppResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| AppError::Unavailable(format!("Corrupt session timestamp: {}", e)))
}

#[async_trait::async_trait]
impl SessionStore for SqliteSessionStore {
    async fn get(&self, session_id: &str) -> AppResult<Option<Session>> {
        let id = session_id.to_string();
        let loaded = with_connection(&self.conn, move |conn| {
            let created_at: Option<String> = conn
                .query_row(
                    "SELECT created_at FROM sessions WHERE id = ?1",
                    params![id],
                    |row| row.get(0),
                )
                .optional()
                .map_err(db_error("Failed to read session"))?;
            let Some(created_at) = created_at else {
                return Ok(None);
            };

            let mut stmt = conn
                .prepare(
                    "SELECT role, text, at FROM session_turns
                     WHERE session_id = ?1 ORDER BY seq ASC",
                )
                .map_err(db_error("Failed to prepare history query"))?;
            let rows = stmt
                .query_map(params![id], |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                    ))
                })
                .map_err(db_error("Failed to query history"))?;
            let turns = rows
                .collect::<rusqlite::Result<Vec<_>>>()
                .map_err(db_error("Failed to read history"))?;
            Ok(Some((created_at, turns)))
        })
        .await?;

        let Some((created_at, rows)) = loaded else {
            return Ok(None);
        };
        let history = rows
            .into_iter()
            .map(|(role, text, at)| {
                Ok(Turn {
                    role: role.parse()?,
                    text,
                    at: parse_timestamp(&at)?,
                })
            })
            .collect::<AppResult<Vec<_>>>()?;

        Ok(Some(Session {
            id: session_id.to_string(),
            history,
            created_at: parse_timestamp(&created_at)?,
        }))
    }

    async fn commit_exchange(
        &self,
        session_id: &str,
        user: Turn,
        agent: Turn,
        window: usize,
    ) -> AppResult<usize> {
        let id = session_id.to_string();
        with_connection(&self.conn, move |conn| {
            let tx = conn
                .transaction()
                .map_err(db_error("Failed to begin session commit"))?;

            tx.execute(
                "INSERT OR IGNORE INTO sessions (id, created_at) VALUES (?1, ?2)",
                params![id, timestamp(&user.at)],
            )
            .map_err(db_error("Failed to create session"))?;

            let next_seq: i64 = tx
                .query_row(
                    "SELECT COALESCE(MAX(seq), -1) + 1 FROM session_turns WHERE session_id = ?1",
                    params![id],
                    |row| row.get(0),
                )
                .map_err(db_error("Failed to read session position"))?;

            for (offset, turn) in [user, agent].iter().enumerate() {
                tx.execute(
                    "INSERT INTO session_turns (session_id, seq, role, text, at)
                     VALUES (?1, ?2, ?3, ?4, ?5)",
                    params![
                        id,
                        next_seq + offset as i64,
                        turn.role.as_str(),
                        turn.text,
                        timestamp(&turn.at)
                    ],
                )
                .map_err(db_error("Failed to append turn"))?;
            }

            tx.execute(
                "DELETE FROM session_turns WHERE session_id = ?1 AND seq NOT IN (
                     SELECT seq FROM session_turns WHERE session_id = ?1
                     ORDER BY seq DESC LIMIT ?2
                 )",
                params![id, window as i64],
            )
            .map_err(db_error("Failed to evict old turns"))?;

            let len: i64 = tx
                .query_row(
                    "SELECT COUNT(*) FROM session_turns WHERE session_id = ?1",
                    params![id],
                    |row| row.get(0),
                )
                .map_err(db_error("Failed to count turns"))?;

            tx.commit().map_err(db_error("Failed to commit session"))?;
            Ok(len as usize)
        })
        .await
    }

    async fn reset(&self, session_id: &str) -> AppResult<bool> {
        let id = session_id.to_string();
        with_connection(&self.conn, move |conn| {
            let tx = conn
                .transaction()
                .map_err(db_error("Failed to begin session reset"))?;
            tx.execute("DELETE FROM session_turns WHERE session_id = ?1", params![id])
                .map_err(db_error("Failed to clear turns"))?;
            let removed = tx
                .execute("DELETE FROM sessions WHERE id = ?1", params![id])
                .map_err(db_error("Failed to remove session"))?;
            tx.commit().map_err(db_error("Failed to commit session reset"))?;
            Ok(removed > 0)
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use insight_knowledge::SqliteIndex;

    async fn stores() -> Vec<Box<dyn SessionStore>> {
        let index = SqliteIndex::open_in_memory(8).unwrap();
        let sqlite = SqliteSessionStore::new(index.shared_connection()).await.unwrap();
        vec![Box::new(InMemorySessionStore::new()), Box::new(sqlite)]
    }

    #[tokio::test]
    async fn test_unknown_session_has_empty_history() {
        for store in stores().await {
            assert!(store.get("nobody").await.unwrap().is_none());
            assert!(store.history("nobody").await.unwrap().is_empty());
            assert!(!store.reset("nobody").await.unwrap());
        }
    }

    #[tokio::test]
    async fn test_commit_appends_both_turns_in_order() {
        for store in stores().await {
            let len = store
                .commit_exchange("s1", Turn::user("hi"), Turn::agent("hello"), 10)
                .await
                .unwrap();
            assert_eq!(len, 2);

            let history = store.history("s1").await.unwrap();
            assert_eq!(history[0].role, Role::User);
            assert_eq!(history[0].text, "hi");
            assert_eq!(history[1].role, Role::Agent);
            assert_eq!(history[1].text, "hello");
        }
    }

    #[tokio::test]
    async fn test_window_evicts_oldest_turns() {
        for store in stores().await {
            for i in 0..4 {
                store
                    .commit_exchange("s1", Turn::user(format!("q{i}")), Turn::agent(format!("a{i}")), 4)
                    .await
                    .unwrap();
            }
            let texts: Vec<String> = store
                .history("s1")
                .await
                .unwrap()
                .into_iter()
                .map(|t| t.text)
                .collect();
            assert_eq!(texts, vec!["q2", "a2", "q3", "a3"]);
        }
    }

    #[tokio::test]
    async fn test_reset_clears_only_that_session() {
        for store in stores().await {
            store.commit_exchange("a", Turn::user("1"), Turn::agent("2"), 10).await.unwrap();
            store.commit_exchange("b", Turn::user("3"), Turn::agent("4"), 10).await.unwrap();

            assert!(store.reset("a").await.unwrap());
            assert!(store.history("a").await.unwrap().is_empty());
            assert_eq!(store.history("b").await.unwrap().len(), 2);
        }
    }

    #[tokio::test]
    async fn test_sqlite_sessions_survive_reopen() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("index.sqlite");
        {
            let index = SqliteIndex::open(&path, 8).unwrap();
            let store = SqliteSessionStore::new(index.shared_connection()).await.unwrap();
            store.commit_exchange("s", Turn::user("q"), Turn::agent("a"), 10).await.unwrap();
        }
        let index = SqliteIndex::open(&path, 8).unwrap();
        let store = SqliteSessionStore::new(index.shared_connection()).await.unwrap();
        assert_eq!(store.history("s").await.unwrap().len(), 2);
    }
}
