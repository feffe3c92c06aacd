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

//! Grouped-list projection of a [`ResultSet`].
//!
//! Three groups are always present in display order. A group with no rows has
//! no title, so the surface renders no header for it. Requests for rows past
//! the end return [`PresentationError::IndexOutOfRange`] rather than panicking
//! or yielding a blank row; a stale index held across a new search is a caller
//! bug and should surface as one.

use std::ops::Range;
use std::sync::Arc;

use anyhow::Result;
use serde::Deserialize;
use serde::Serialize;
use serde_json::json;
use thiserror::Error;

use crate::index::ResultSet;
use crate::matcher::Needle;
use crate::model::Contact;
use crate::model::Conversation;
use crate::model::FeedPost;
use crate::model::ResultGroup;
use crate::source::ConversationLookup;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PresentationError {
    #[error("row {index} is out of range for group {group} ({len} rows)")]
    IndexOutOfRange {
        group: ResultGroup,
        index: usize,
        len: usize,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GroupTitles {
    pub contacts: String,
    pub message_history: String,
    pub feeds: String,
}

impl Default for GroupTitles {
    fn default() -> Self {
        Self {
            contacts: "Friends".to_string(),
            message_history: "Messages".to_string(),
            feeds: "Joined Feeds".to_string(),
        }
    }
}

impl GroupTitles {
    pub fn label(&self, group: ResultGroup) -> &str {
        match group {
            ResultGroup::Contacts => &self.contacts,
            ResultGroup::MessageHistory => &self.message_history,
            ResultGroup::Feeds => &self.feeds,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RowDescriptor {
    Contact(ContactRow),
    Feed(FeedRow),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContactRow {
    pub contact: Arc<Contact>,
    pub name_highlights: Vec<Range<usize>>,
    pub handle_highlights: Vec<Range<usize>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedRow {
    pub post: Arc<FeedPost>,
    pub keyword: String,
    pub body_highlights: Vec<Range<usize>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SelectionIntent {
    OpenProfile(Arc<Contact>),
    OpenConversation(Conversation),
    None,
}

#[derive(Debug, Clone, Default)]
pub struct ResultPresentation {
    results: ResultSet,
    titles: GroupTitles,
}

impl ResultPresentation {
    pub fn new(results: ResultSet, titles: GroupTitles) -> Self {
        Self { results, titles }
    }

    pub fn results(&self) -> &ResultSet {
        &self.results
    }

    pub fn group_count(&self) -> usize {
        ResultGroup::ALL.len()
    }

    pub fn row_count(&self, group: ResultGroup) -> usize {
        self.results.len(group)
    }

    pub fn title(&self, group: ResultGroup) -> Option<&str> {
        (self.row_count(group) > 0).then(|| self.titles.label(group))
    }

    pub fn row(
        &self,
        group: ResultGroup,
        index: usize,
    ) -> Result<RowDescriptor, PresentationError> {
        self.check_index(group, index)?;
        let needle = Needle::new(self.results.query());
        match group {
            ResultGroup::Contacts => {
                let contact = &self.results.contacts()[index];
                Ok(RowDescriptor::Contact(ContactRow {
                    name_highlights: needle.ranges_in(&contact.name),
                    handle_highlights: needle.ranges_in(&contact.handle),
                    contact: Arc::clone(contact),
                }))
            }
            ResultGroup::Feeds => {
                let post = &self.results.feeds()[index];
                Ok(RowDescriptor::Feed(FeedRow {
                    keyword: needle.raw().to_string(),
                    body_highlights: needle.ranges_in(&post.body),
                    post: Arc::clone(post),
                }))
            }
            ResultGroup::MessageHistory => Err(PresentationError::IndexOutOfRange {
                group,
                index,
                len: 0,
            }),
        }
    }

    /// Out-of-range indices are errors for the populated groups; message
    /// history never has an action, whatever the index.
    pub fn selection_intent(
        &self,
        group: ResultGroup,
        index: usize,
        conversations: &impl ConversationLookup,
    ) -> Result<SelectionIntent> {
        match group {
            // Rows are never produced here, so there is no index to check.
            ResultGroup::MessageHistory => Ok(SelectionIntent::None),
            ResultGroup::Contacts => {
                self.check_index(group, index)?;
                Ok(SelectionIntent::OpenProfile(Arc::clone(
                    &self.results.contacts()[index],
                )))
            }
            ResultGroup::Feeds => {
                self.check_index(group, index)?;
                let post = &self.results.feeds()[index];
                let Some(thread) = post.thread.as_deref() else {
                    return Ok(SelectionIntent::None);
                };
                Ok(match conversations.conversation_for_thread(thread)? {
                    Some(conversation) => SelectionIntent::OpenConversation(conversation),
                    None => SelectionIntent::None,
                })
            }
        }
    }

    fn check_index(&self, group: ResultGroup, index: usize) -> Result<(), PresentationError> {
        let len = self.row_count(group);
        if index >= len {
            return Err(PresentationError::IndexOutOfRange { group, index, len });
        }
        Ok(())
    }

    pub fn to_json(&self) -> serde_json::Value {
        let groups: Vec<serde_json::Value> = ResultGroup::ALL
            .iter()
            .map(|group| {
                let rows: Vec<serde_json::Value> = (0..self.row_count(*group))
                    .filter_map(|index| self.row(*group, index).ok())
                    .map(|row| row.to_json())
                    .collect();
                json!({
                    "group": group.as_label(),
                    "title": self.title(*group),
                    "row_count": rows.len(),
                    "rows": rows,
                })
            })
            .collect();
        serde_json::Value::Array(groups)
    }

    /// Plain-text rendering for the terminal; matched text is bracketed.
    pub fn render_text(&self) -> String {
        let mut out = String::new();
        for group in ResultGroup::ALL {
            let Some(title) = self.title(group) else {
                continue;
            };
            out.push_str(&format!("# {title}\n"));
            for index in 0..self.row_count(group) {
                let Ok(row) = self.row(group, index) else {
                    continue;
                };
                let line = match &row {
                    RowDescriptor::Contact(c) => format!(
                        "{index}\t{}\t@{}",
                        mark(&c.contact.name, &c.name_highlights),
                        mark(&c.contact.handle, &c.handle_highlights)
                    ),
                    RowDescriptor::Feed(f) => {
                        format!("{index}\t{}", mark(&f.post.body, &f.body_highlights))
                    }
                };
                out.push_str(&line);
                out.push('\n');
            }
        }
        out
    }
}

impl RowDescriptor {
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            RowDescriptor::Contact(row) => json!({
                "kind": "contact",
                "id": row.contact.id,
                "name": row.contact.name,
                "handle": row.contact.handle,
                "name_highlights": ranges_json(&row.name_highlights),
                "handle_highlights": ranges_json(&row.handle_highlights),
            }),
            RowDescriptor::Feed(row) => json!({
                "kind": "feed",
                "id": row.post.id,
                "body": row.post.body,
                "thread": row.post.thread,
                "keyword": row.keyword,
                "body_highlights": ranges_json(&row.body_highlights),
            }),
        }
    }
}

impl SelectionIntent {
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            SelectionIntent::OpenProfile(contact) => json!({
                "action": "profile",
                "contact": {
                    "id": contact.id,
                    "name": contact.name,
                    "handle": contact.handle,
                },
            }),
            SelectionIntent::OpenConversation(conversation) => json!({
                "action": "conversation",
                "conversation": {
                    "id": conversation.id,
                    "group_id": conversation.group_id,
                    "user_id": conversation.user_id,
                },
            }),
            SelectionIntent::None => json!({ "action": "none" }),
        }
    }
}

fn ranges_json(ranges: &[Range<usize>]) -> serde_json::Value {
    ranges
        .iter()
        .map(|r| json!([r.start, r.end]))
        .collect::<Vec<_>>()
        .into()
}

fn mark(text: &str, ranges: &[Range<usize>]) -> String {
    let mut out = String::with_capacity(text.len() + ranges.len() * 2);
    let mut cursor = 0;
    for range in ranges {
        let start = range.start.max(cursor);
        let end = range.end.max(start);
        out.push_str(&text[cursor..start]);
        out.push('[');
        out.push_str(&text[start..end]);
        out.push(']');
        cursor = end;
    }
    out.push_str(&text[cursor..]);
    out
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use crate::index::SearchIndex;
    use crate::index::tests::contact;
    use crate::index::tests::sample_index;

    struct Conversations(HashMap<String, Conversation>);

    impl Conversations {
        fn with_groups(groups: &[&str]) -> Self {
            Self(
                groups
                    .iter()
                    .map(|g| {
                        (
                            g.to_string(),
                            Conversation {
                                id: format!("c-{g}"),
                                group_id: Some(g.to_string()),
                                user_id: None,
                            },
                        )
                    })
                    .collect(),
            )
        }
    }

    impl ConversationLookup for Conversations {
        fn conversation_for_thread(&self, thread: &str) -> Result<Option<Conversation>> {
            Ok(self.0.get(thread).cloned())
        }
    }

    fn present(query: &str) -> ResultPresentation {
        let outcome = sample_index().search(query);
        ResultPresentation::new(outcome.results, GroupTitles::default())
    }

    #[test]
    fn shape_has_three_groups_and_suppresses_empty_titles() {
        let view = present("hello");
        assert_eq!(view.group_count(), 3);
        assert_eq!(view.row_count(ResultGroup::Contacts), 0);
        assert_eq!(view.row_count(ResultGroup::MessageHistory), 0);
        assert_eq!(view.row_count(ResultGroup::Feeds), 2);
        assert_eq!(view.title(ResultGroup::Contacts), None);
        assert_eq!(view.title(ResultGroup::MessageHistory), None);
        assert_eq!(view.title(ResultGroup::Feeds), Some("Joined Feeds"));

        let view = present("al");
        assert_eq!(view.title(ResultGroup::Contacts), Some("Friends"));
    }

    #[test]
    fn default_state_is_empty() {
        let view = ResultPresentation::default();
        for group in ResultGroup::ALL {
            assert_eq!(view.row_count(group), 0);
            assert_eq!(view.title(group), None);
        }
    }

    #[test]
    fn row_past_end_is_index_out_of_range() {
        let view = present("al");
        let len = view.row_count(ResultGroup::Contacts);
        let err = view.row(ResultGroup::Contacts, len).unwrap_err();
        assert_eq!(
            err,
            PresentationError::IndexOutOfRange {
                group: ResultGroup::Contacts,
                index: len,
                len,
            }
        );
        assert!(view.row(ResultGroup::MessageHistory, 0).is_err());
    }

    #[test]
    fn contact_row_carries_highlights() {
        let view = present("AL");
        let RowDescriptor::Contact(row) = view.row(ResultGroup::Contacts, 0).unwrap() else {
            panic!("expected contact row");
        };
        assert_eq!(row.contact.name, "Alice");
        assert_eq!(row.name_highlights, vec![0..2]);
        assert_eq!(row.handle_highlights, vec![0..2]);
    }

    #[test]
    fn feed_row_carries_query() {
        let view = present("hello");
        let RowDescriptor::Feed(row) = view.row(ResultGroup::Feeds, 1).unwrap() else {
            panic!("expected feed row");
        };
        assert_eq!(row.post.id, "f3");
        assert_eq!(row.keyword, "hello");
        assert_eq!(&row.post.body[row.body_highlights[0].clone()], "HELLO");
    }

    #[test]
    fn selection_intents_per_group() {
        let view = present("");
        let lookup = Conversations::with_groups(&["g1", "g2"]);

        match view.selection_intent(ResultGroup::Contacts, 1, &lookup).unwrap() {
            SelectionIntent::OpenProfile(contact) => assert_eq!(contact.id, "u2"),
            other => panic!("unexpected intent {other:?}"),
        }
        match view.selection_intent(ResultGroup::Feeds, 0, &lookup).unwrap() {
            SelectionIntent::OpenConversation(conversation) => assert_eq!(conversation.id, "c-g1"),
            other => panic!("unexpected intent {other:?}"),
        }
        // f4 links to g3, which has no conversation.
        assert_eq!(
            view.selection_intent(ResultGroup::Feeds, 2, &lookup).unwrap(),
            SelectionIntent::None
        );
        assert_eq!(
            view.selection_intent(ResultGroup::MessageHistory, 0, &lookup)
                .unwrap(),
            SelectionIntent::None
        );
        assert!(view.row(ResultGroup::MessageHistory, 7).is_err());
        assert_eq!(
            view.selection_intent(ResultGroup::MessageHistory, 7, &lookup)
                .unwrap(),
            SelectionIntent::None
        );
    }

    #[test]
    fn selection_past_end_is_index_out_of_range() {
        let view = present("hello");
        let lookup = Conversations::with_groups(&[]);
        let err = view
            .selection_intent(ResultGroup::Feeds, 2, &lookup)
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<PresentationError>(),
            Some(PresentationError::IndexOutOfRange { index: 2, len: 2, .. })
        ));
    }

    #[test]
    fn custom_titles_are_used() {
        let titles = GroupTitles {
            contacts: "Amis".to_string(),
            ..GroupTitles::default()
        };
        let view = ResultPresentation::new(sample_index().search("bob").results, titles);
        assert_eq!(view.title(ResultGroup::Contacts), Some("Amis"));
    }

    #[test]
    fn json_lists_every_group() {
        let value = present("al").to_json();
        let groups = value.as_array().unwrap();
        assert_eq!(groups.len(), 3);
        assert_eq!(groups[0]["group"], "contacts");
        assert_eq!(groups[0]["row_count"], 2);
        assert_eq!(groups[1]["title"], serde_json::Value::Null);
        assert_eq!(groups[0]["rows"][0]["name_highlights"], json!([[0, 2]]));
    }

    #[test]
    fn expanded_case_folds_render_without_overlap() {
        let index = SearchIndex::new(
            vec![contact("u9", "\u{130}\u{130}\u{130}", "dotted")],
            Vec::new(),
        );
        let view = ResultPresentation::new(
            index.search("\u{307}i").results,
            GroupTitles::default(),
        );
        let RowDescriptor::Contact(row) = view.row(ResultGroup::Contacts, 0).unwrap() else {
            panic!("expected contact row");
        };
        assert_eq!(row.name_highlights, vec![0..6]);
        assert!(
            view.render_text()
                .contains("0\t[\u{130}\u{130}\u{130}]\t@dotted")
        );
    }

    #[test]
    fn mark_tolerates_overlapping_ranges() {
        assert_eq!(mark("abcdef", &[0..4, 2..6]), "[abcd][ef]");
        assert_eq!(mark("abcdef", &[1..2, 1..2]), "a[b][]cdef");
    }

    #[test]
    fn text_rendering_skips_empty_groups() {
        let rendered = present("l").render_text();
        insta::assert_snapshot!(rendered.trim_end(), @r"
        # Friends
        0	A[l]ice	@a[l]99
        1	Va[l]erie	@va[l]_dev
        # Joined Feeds
        0	he[l][l]o wor[l]d
        1	Say HE[L][L]O to rust
        ");
    }
}
