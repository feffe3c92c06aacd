// Copyright 2026 Roster Authors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use std::fs;
use std::fs::File;
use std::fs::OpenOptions;
use std::path::Path;
use std::path::PathBuf;
use std::thread::sleep;
use std::time::Duration;
use std::time::Instant;

use anyhow::Context;
use anyhow::Result;
use fs2::FileExt;
use rusqlite::Connection;
use rusqlite::OpenFlags;
use rusqlite::OptionalExtension;
use rusqlite::params;
use sha2::Digest;
use sha2::Sha256;
use tracing::debug;

use crate::model::Contact;
use crate::model::Conversation;
use crate::model::FeedPost;
use crate::model::FriendState;
use crate::source::ConversationLookup;
use crate::source::Directory;
use crate::source::FeedStore;

pub struct Store {
    pub conn: Connection,
    pub path: PathBuf,
    _lock: StoreLock,
}

/// Advisory lock held for the life of a [`Store`]. Closing the file releases
/// it; the lock file itself stays on disk so every process locks one inode.
struct StoreLock {
    _file: File,
}

const SCHEMA_VERSION: i64 = 1;

#[derive(Debug, Clone, Copy)]
pub enum StoreMode {
    ReadOnly,
    ReadWrite,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct StoreStats {
    pub user_count: i64,
    pub contact_count: i64,
    pub conversation_count: i64,
    pub feed_count: i64,
    pub db_size_bytes: u64,
}

#[derive(Debug)]
pub struct IntegrityReport {
    pub status: String,
    pub stats: StoreStats,
    /// Feeds whose group has no conversation; listed but not openable.
    pub dangling_feeds: i64,
}

#[derive(Debug, Clone)]
pub struct UserRecord {
    pub id: String,
    pub nickname: String,
    pub username: String,
    pub friend_state: FriendState,
}

#[derive(Debug, Clone)]
pub struct FeedRecord {
    pub id: String,
    pub body: String,
    pub group_id: Option<String>,
    pub created_at: i64,
}

impl Store {
    pub fn init(path: &Path) -> Result<()> {
        if path.exists() {
            anyhow::bail!("store already exists at {}", path.display());
        }
        let _lock = Self::acquire_lock(path, StoreMode::ReadWrite)?;
        let conn = Self::open_connection(path, StoreMode::ReadWrite)?;
        Self::apply_pragmas(&conn, StoreMode::ReadWrite)?;
        Self::create_schema(&conn)?;
        Self::set_meta(&conn, "schema_version", &SCHEMA_VERSION.to_string())?;
        Ok(())
    }

    pub fn open(path: &Path, mode: StoreMode) -> Result<Self> {
        if !path.exists() {
            anyhow::bail!("store not found at {}", path.display());
        }
        let lock = Self::acquire_lock(path, mode)?;
        let conn = Self::open_connection(path, mode)?;
        Self::apply_pragmas(&conn, mode)?;
        let version = Self::schema_version(&conn)?;
        if version > SCHEMA_VERSION {
            anyhow::bail!(
                "store schema version {} is newer than supported {}",
                version,
                SCHEMA_VERSION
            );
        }
        if version < SCHEMA_VERSION {
            if matches!(mode, StoreMode::ReadOnly) {
                anyhow::bail!(
                    "store at {} needs migration; run a write command first",
                    path.display()
                );
            }
            Self::create_schema(&conn)?;
            Self::set_meta(&conn, "schema_version", &SCHEMA_VERSION.to_string())?;
        }
        debug!(path = %path.display(), ?mode, "opened store");
        Ok(Self {
            conn,
            path: path.to_path_buf(),
            _lock: lock,
        })
    }

    fn open_connection(path: &Path, mode: StoreMode) -> Result<Connection> {
        let flags = match mode {
            StoreMode::ReadOnly => OpenFlags::SQLITE_OPEN_READ_ONLY,
            StoreMode::ReadWrite => {
                OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_CREATE
            }
        };
        let conn = Connection::open_with_flags(path, flags)
            .with_context(|| format!("open {}", path.display()))?;
        conn.busy_timeout(Duration::from_millis(5000))
            .context("set busy timeout")?;
        Ok(conn)
    }

    fn apply_pragmas(conn: &Connection, mode: StoreMode) -> Result<()> {
        let mut batch = String::from("PRAGMA foreign_keys=ON;");
        if matches!(mode, StoreMode::ReadWrite) {
            batch = format!("PRAGMA journal_mode=DELETE;\nPRAGMA synchronous=NORMAL;\n{batch}");
        }
        conn.execute_batch(&batch).context("apply pragmas")?;
        Ok(())
    }

    fn lock_path_for(path: &Path) -> Result<PathBuf> {
        let canonical = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());
        let mut hasher = Sha256::new();
        hasher.update(canonical.to_string_lossy().as_bytes());
        let hash = hex::encode(hasher.finalize());
        let mut dir = std::env::temp_dir();
        dir.push("roster");
        fs::create_dir_all(&dir).with_context(|| format!("create lock dir {}", dir.display()))?;
        Ok(dir.join(format!("roster-{hash}.lock")))
    }

    fn acquire_lock(path: &Path, mode: StoreMode) -> Result<StoreLock> {
        let lock_path = Self::lock_path_for(path)?;
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&lock_path)
            .with_context(|| format!("open lock file {}", lock_path.display()))?;
        let deadline = Instant::now() + Duration::from_millis(5000);
        loop {
            let locked = match mode {
                StoreMode::ReadOnly => file.try_lock_shared().map_err(|err| err.to_string()),
                StoreMode::ReadWrite => file.try_lock_exclusive().map_err(|err| err.to_string()),
            };
            match locked {
                Ok(()) => return Ok(StoreLock { _file: file }),
                Err(_) if Instant::now() >= deadline => {
                    let mode_label = match mode {
                        StoreMode::ReadOnly => "read",
                        StoreMode::ReadWrite => "write",
                    };
                    anyhow::bail!(
                        "store is locked for {mode_label} access; another process may be using {}",
                        path.display()
                    );
                }
                Err(_) => {
                    sleep(Duration::from_millis(50));
                }
            }
        }
    }

    fn create_schema(conn: &Connection) -> Result<()> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS meta (\n  key TEXT PRIMARY KEY,\n  value TEXT\n);\n\nCREATE TABLE IF NOT EXISTS user (\n  rowid INTEGER PRIMARY KEY,\n  id TEXT UNIQUE NOT NULL,\n  nickname TEXT NOT NULL,\n  username TEXT NOT NULL,\n  friend_state TEXT NOT NULL\n);\n\nCREATE TABLE IF NOT EXISTS conversation (\n  rowid INTEGER PRIMARY KEY,\n  id TEXT UNIQUE NOT NULL,\n  group_id TEXT,\n  user_id TEXT\n);\n\nCREATE TABLE IF NOT EXISTS feed (\n  rowid INTEGER PRIMARY KEY,\n  id TEXT UNIQUE NOT NULL,\n  body TEXT NOT NULL,\n  group_id TEXT,\n  created_at INTEGER NOT NULL DEFAULT 0\n);\n\nCREATE INDEX IF NOT EXISTS idx_user_state ON user(friend_state);\nCREATE INDEX IF NOT EXISTS idx_conversation_group ON conversation(group_id);\nCREATE INDEX IF NOT EXISTS idx_feed_created ON feed(created_at);",
        )
        .context("create schema")?;
        Ok(())
    }

    pub fn set_meta(conn: &Connection, key: &str, value: &str) -> Result<()> {
        conn.execute(
            "INSERT OR REPLACE INTO meta (key, value) VALUES (?1, ?2)",
            params![key, value],
        )
        .context("set meta")?;
        Ok(())
    }

    fn get_meta(conn: &Connection, key: &str) -> Result<Option<String>> {
        conn.query_row("SELECT value FROM meta WHERE key=?1", params![key], |row| {
            row.get(0)
        })
        .optional()
        .with_context(|| format!("read meta {key}"))
    }

    fn table_exists(conn: &Connection, name: &str) -> Result<bool> {
        let count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name=?1",
                params![name],
                |row| row.get(0),
            )
            .context("check table")?;
        Ok(count > 0)
    }

    fn schema_version(conn: &Connection) -> Result<i64> {
        if !Self::table_exists(conn, "meta")? {
            return Ok(0);
        }
        let value = Self::get_meta(conn, "schema_version")?;
        Ok(value.and_then(|v| v.parse::<i64>().ok()).unwrap_or(0))
    }

    // Upserts keep the original rowid, so re-importing a record does not move
    // it in display order.
    pub fn upsert_user(&self, user: &UserRecord) -> Result<()> {
        self.conn
            .execute(
                "INSERT INTO user (id, nickname, username, friend_state) VALUES (?1, ?2, ?3, ?4)\n                 ON CONFLICT(id) DO UPDATE SET nickname=excluded.nickname, username=excluded.username, friend_state=excluded.friend_state",
                params![
                    user.id,
                    user.nickname,
                    user.username,
                    user.friend_state.as_label()
                ],
            )
            .with_context(|| format!("upsert user {}", user.id))?;
        Ok(())
    }

    pub fn upsert_conversation(&self, conversation: &Conversation) -> Result<()> {
        self.conn
            .execute(
                "INSERT INTO conversation (id, group_id, user_id) VALUES (?1, ?2, ?3)\n                 ON CONFLICT(id) DO UPDATE SET group_id=excluded.group_id, user_id=excluded.user_id",
                params![conversation.id, conversation.group_id, conversation.user_id],
            )
            .with_context(|| format!("upsert conversation {}", conversation.id))?;
        Ok(())
    }

    pub fn upsert_feed(&self, feed: &FeedRecord) -> Result<()> {
        self.conn
            .execute(
                "INSERT INTO feed (id, body, group_id, created_at) VALUES (?1, ?2, ?3, ?4)\n                 ON CONFLICT(id) DO UPDATE SET body=excluded.body, group_id=excluded.group_id, created_at=excluded.created_at",
                params![feed.id, feed.body, feed.group_id, feed.created_at],
            )
            .with_context(|| format!("upsert feed {}", feed.id))?;
        Ok(())
    }

    pub fn users(&self) -> Result<Vec<UserRecord>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, nickname, username, friend_state FROM user ORDER BY rowid ASC")?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
            ))
        })?;
        let mut users = Vec::new();
        for row in rows {
            let (id, nickname, username, state) = row?;
            let friend_state = state
                .parse::<FriendState>()
                .with_context(|| format!("user {id}"))?;
            users.push(UserRecord {
                id,
                nickname,
                username,
                friend_state,
            });
        }
        Ok(users)
    }

    pub fn conversations(&self) -> Result<Vec<Conversation>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, group_id, user_id FROM conversation ORDER BY rowid ASC")?;
        let rows = stmt.query_map([], |row| {
            Ok(Conversation {
                id: row.get(0)?,
                group_id: row.get(1)?,
                user_id: row.get(2)?,
            })
        })?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    pub fn feeds(&self) -> Result<Vec<FeedRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, body, group_id, created_at FROM feed ORDER BY created_at ASC, rowid ASC",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(FeedRecord {
                id: row.get(0)?,
                body: row.get(1)?,
                group_id: row.get(2)?,
                created_at: row.get(3)?,
            })
        })?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    pub fn stats(&self) -> Result<StoreStats> {
        let count = |sql: &str, label: &str| -> Result<i64> {
            self.conn
                .query_row(sql, [], |row| row.get(0))
                .with_context(|| format!("count {label}"))
        };
        let user_count = count("SELECT COUNT(*) FROM user", "users")?;
        let contact_count = count(
            "SELECT COUNT(*) FROM user WHERE friend_state='normal'",
            "contacts",
        )?;
        let conversation_count = count("SELECT COUNT(*) FROM conversation", "conversations")?;
        let feed_count = count("SELECT COUNT(*) FROM feed", "feeds")?;
        let db_size_bytes = std::fs::metadata(&self.path).map(|m| m.len()).unwrap_or(0);
        Ok(StoreStats {
            user_count,
            contact_count,
            conversation_count,
            feed_count,
            db_size_bytes,
        })
    }

    pub fn snapshot_token(&self) -> Result<String> {
        Ok(Self::get_meta(&self.conn, "last_import")?.unwrap_or_default())
    }

    pub fn integrity_check(&self) -> Result<IntegrityReport> {
        let status: String = self
            .conn
            .query_row("PRAGMA integrity_check", [], |row| row.get(0))
            .context("integrity_check")?;
        let dangling_feeds: i64 = self
            .conn
            .query_row(
                "SELECT COUNT(*)\n                 FROM feed\n                 LEFT JOIN conversation ON conversation.group_id = feed.group_id\n                 WHERE feed.group_id IS NOT NULL AND conversation.id IS NULL",
                [],
                |row| row.get(0),
            )
            .context("dangling feeds")?;
        let stats = self.stats()?;
        Ok(IntegrityReport {
            status,
            stats,
            dangling_feeds,
        })
    }
}

impl Directory for Store {
    fn all_contacts(&self) -> Result<Vec<Contact>> {
        let contacts = self
            .users()?
            .into_iter()
            .filter(|user| user.friend_state == FriendState::Normal)
            .map(|user| Contact {
                id: user.id,
                name: user.nickname,
                handle: user.username,
            })
            .collect();
        Ok(contacts)
    }
}

/// Posts come oldest first by `created_at`, ties in insertion order.
impl FeedStore for Store {
    fn all_feed_posts(&self) -> Result<Vec<FeedPost>> {
        let posts = self
            .feeds()?
            .into_iter()
            .map(|feed| FeedPost {
                id: feed.id,
                body: feed.body,
                thread: feed.group_id,
            })
            .collect();
        Ok(posts)
    }
}

impl ConversationLookup for Store {
    fn conversation_for_thread(&self, thread: &str) -> Result<Option<Conversation>> {
        self.conn
            .query_row(
                "SELECT id, group_id, user_id FROM conversation WHERE group_id = ?1 ORDER BY rowid ASC LIMIT 1",
                params![thread],
                |row| {
                    Ok(Conversation {
                        id: row.get(0)?,
                        group_id: row.get(1)?,
                        user_id: row.get(2)?,
                    })
                },
            )
            .optional()
            .with_context(|| format!("lookup conversation for {thread}"))
    }
}
