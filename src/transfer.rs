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

use std::io::BufRead;
use std::io::BufReader;
use std::io::Write;

use anyhow::Context;
use anyhow::Result;
use serde::Deserialize;
use serde::Serialize;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use tracing::info;

use crate::model::Conversation;
use crate::model::FriendState;
use crate::store::FeedRecord;
use crate::store::Store;
use crate::store::UserRecord;

#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
enum Line {
    User {
        id: String,
        nickname: String,
        username: String,
        #[serde(default = "default_friend_state")]
        friend_state: FriendState,
    },
    Conversation {
        id: String,
        #[serde(default)]
        group_id: Option<String>,
        #[serde(default)]
        user_id: Option<String>,
    },
    Feed {
        id: String,
        body: String,
        #[serde(default)]
        group_id: Option<String>,
        #[serde(default)]
        created_at: i64,
    },
}

fn default_friend_state() -> FriendState {
    FriendState::Normal
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct TransferStats {
    pub users: usize,
    pub conversations: usize,
    pub feeds: usize,
}

impl TransferStats {
    pub fn total(&self) -> usize {
        self.users + self.conversations + self.feeds
    }
}

pub fn export_store(store: &Store, mut writer: impl Write) -> Result<TransferStats> {
    let mut stats = TransferStats::default();

    for user in store.users()? {
        let line = Line::User {
            id: user.id,
            nickname: user.nickname,
            username: user.username,
            friend_state: user.friend_state,
        };
        writeln!(writer, "{}", serde_json::to_string(&line)?)?;
        stats.users += 1;
    }

    for conversation in store.conversations()? {
        let line = Line::Conversation {
            id: conversation.id,
            group_id: conversation.group_id,
            user_id: conversation.user_id,
        };
        writeln!(writer, "{}", serde_json::to_string(&line)?)?;
        stats.conversations += 1;
    }

    for feed in store.feeds()? {
        let line = Line::Feed {
            id: feed.id,
            body: feed.body,
            group_id: feed.group_id,
            created_at: feed.created_at,
        };
        writeln!(writer, "{}", serde_json::to_string(&line)?)?;
        stats.feeds += 1;
    }

    Ok(stats)
}

pub fn import_store(store: &Store, reader: impl std::io::Read) -> Result<TransferStats> {
    let mut stats = TransferStats::default();
    let mut buf = BufReader::new(reader);

    store.conn.execute_batch("BEGIN IMMEDIATE")?;
    let res = (|| -> Result<()> {
        let mut line = String::new();
        let mut line_no = 0usize;
        loop {
            line.clear();
            let bytes = buf.read_line(&mut line)?;
            if bytes == 0 {
                break;
            }
            line_no += 1;
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            let parsed: Line = serde_json::from_str(trimmed)
                .with_context(|| format!("parse import line {line_no}: {trimmed}"))?;
            match parsed {
                Line::User {
                    id,
                    nickname,
                    username,
                    friend_state,
                } => {
                    store.upsert_user(&UserRecord {
                        id,
                        nickname,
                        username,
                        friend_state,
                    })?;
                    stats.users += 1;
                }
                Line::Conversation {
                    id,
                    group_id,
                    user_id,
                } => {
                    store.upsert_conversation(&Conversation {
                        id,
                        group_id,
                        user_id,
                    })?;
                    stats.conversations += 1;
                }
                Line::Feed {
                    id,
                    body,
                    group_id,
                    created_at,
                } => {
                    store.upsert_feed(&FeedRecord {
                        id,
                        body,
                        group_id,
                        created_at,
                    })?;
                    stats.feeds += 1;
                }
            }
        }
        let stamp = OffsetDateTime::now_utc()
            .format(&Rfc3339)
            .context("format import time")?;
        Store::set_meta(&store.conn, "last_import", &stamp)?;
        Ok(())
    })();

    if let Err(err) = res {
        store.conn.execute_batch("ROLLBACK")?;
        return Err(err);
    }

    store.conn.execute_batch("COMMIT")?;
    info!(
        users = stats.users,
        conversations = stats.conversations,
        feeds = stats.feeds,
        "import committed"
    );
    Ok(stats)
}
