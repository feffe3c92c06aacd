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

//! Shared domain types used across the store, the index and presentation.

use std::fmt;
use std::str::FromStr;

use serde::Deserialize;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FriendState {
    Stranger,
    Normal,
    Blocked,
    Me,
}

impl FriendState {
    pub fn as_label(self) -> &'static str {
        match self {
            FriendState::Stranger => "stranger",
            FriendState::Normal => "normal",
            FriendState::Blocked => "blocked",
            FriendState::Me => "me",
        }
    }
}

impl FromStr for FriendState {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        match s {
            "stranger" => Ok(FriendState::Stranger),
            "normal" => Ok(FriendState::Normal),
            "blocked" => Ok(FriendState::Blocked),
            "me" => Ok(FriendState::Me),
            other => anyhow::bail!("unknown friend state '{other}'"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Contact {
    pub id: String,
    pub name: String,
    pub handle: String,
}

/// A shared post. `thread` names the discussion group the post links to, if
/// any; posts without one are never search results.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FeedPost {
    pub id: String,
    pub body: String,
    pub thread: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Conversation {
    pub id: String,
    pub group_id: Option<String>,
    pub user_id: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResultGroup {
    Contacts,
    MessageHistory,
    Feeds,
}

impl ResultGroup {
    /// Display order.
    pub const ALL: [ResultGroup; 3] = [
        ResultGroup::Contacts,
        ResultGroup::MessageHistory,
        ResultGroup::Feeds,
    ];

    pub fn as_label(self) -> &'static str {
        match self {
            ResultGroup::Contacts => "contacts",
            ResultGroup::MessageHistory => "message_history",
            ResultGroup::Feeds => "feeds",
        }
    }
}

impl fmt::Display for ResultGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_label())
    }
}

impl FromStr for ResultGroup {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        match s {
            "contacts" | "friends" => Ok(ResultGroup::Contacts),
            "message_history" | "messages" => Ok(ResultGroup::MessageHistory),
            "feeds" => Ok(ResultGroup::Feeds),
            other => anyhow::bail!(
                "unknown group '{other}'; expected contacts, message_history or feeds"
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn group_parses_labels_and_aliases() {
        for group in ResultGroup::ALL {
            assert_eq!(group.as_label().parse::<ResultGroup>().unwrap(), group);
        }
        assert_eq!(
            "friends".parse::<ResultGroup>().unwrap(),
            ResultGroup::Contacts
        );
        assert!("timeline".parse::<ResultGroup>().is_err());
    }

    #[test]
    fn friend_state_round_trips_labels() {
        for state in [
            FriendState::Stranger,
            FriendState::Normal,
            FriendState::Blocked,
            FriendState::Me,
        ] {
            assert_eq!(state.as_label().parse::<FriendState>().unwrap(), state);
        }
    }
}
