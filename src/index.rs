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

use std::sync::Arc;
use std::time::Instant;

use anyhow::Result;
use tracing::debug;

use crate::matcher::Needle;
use crate::model::Contact;
use crate::model::FeedPost;
use crate::model::ResultGroup;
use crate::source::Directory;
use crate::source::FeedStore;

/// Snapshot of contacts and feed posts, re-filtered on every query.
#[derive(Debug, Clone, Default)]
pub struct SearchIndex {
    contacts: Vec<Arc<Contact>>,
    posts: Vec<Arc<FeedPost>>,
}

/// Matches for one query. Rows keep source order within each group.
#[derive(Debug, Clone, Default)]
pub struct ResultSet {
    query: String,
    contacts: Vec<Arc<Contact>>,
    feeds: Vec<Arc<FeedPost>>,
}

#[derive(Debug, Clone)]
pub struct SearchOutcome {
    pub results: ResultSet,
    /// Any group non-empty; callers use it to reset scroll to the top.
    pub has_any_result: bool,
}

impl SearchIndex {
    pub fn new(contacts: Vec<Contact>, posts: Vec<FeedPost>) -> Self {
        Self {
            contacts: contacts.into_iter().map(Arc::new).collect(),
            posts: posts.into_iter().map(Arc::new).collect(),
        }
    }

    pub fn load(directory: &impl Directory, feeds: &impl FeedStore) -> Result<Self> {
        let index = Self::new(directory.all_contacts()?, feeds.all_feed_posts()?);
        debug!(
            contacts = index.contacts.len(),
            posts = index.posts.len(),
            "loaded search snapshot"
        );
        Ok(index)
    }

    pub fn search(&self, query: &str) -> SearchOutcome {
        let started = Instant::now();
        let needle = Needle::new(query);

        let contacts: Vec<Arc<Contact>> = self
            .contacts
            .iter()
            .filter(|contact| contact_matches(&needle, contact))
            .cloned()
            .collect();
        let feeds: Vec<Arc<FeedPost>> = self
            .posts
            .iter()
            .filter(|post| post_matches(&needle, post))
            .cloned()
            .collect();

        let results = ResultSet {
            query: query.to_string(),
            contacts,
            feeds,
        };
        let has_any_result = !results.is_empty();
        debug!(
            contacts = results.contacts.len(),
            feeds = results.feeds.len(),
            elapsed_us = started.elapsed().as_micros() as u64,
            "search finished"
        );
        SearchOutcome {
            results,
            has_any_result,
        }
    }
}

fn contact_matches(needle: &Needle, contact: &Contact) -> bool {
    needle.matches(&contact.name) || needle.matches(&contact.handle)
}

// A post with no thread cannot be opened, so it never matches.
fn post_matches(needle: &Needle, post: &FeedPost) -> bool {
    post.thread.is_some() && needle.matches(&post.body)
}

impl ResultSet {
    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn contacts(&self) -> &[Arc<Contact>] {
        &self.contacts
    }

    pub fn feeds(&self) -> &[Arc<FeedPost>] {
        &self.feeds
    }

    pub fn len(&self, group: ResultGroup) -> usize {
        match group {
            ResultGroup::Contacts => self.contacts.len(),
            ResultGroup::MessageHistory => 0,
            ResultGroup::Feeds => self.feeds.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        ResultGroup::ALL.iter().all(|group| self.len(*group) == 0)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn contact(id: &str, name: &str, handle: &str) -> Contact {
        Contact {
            id: id.to_string(),
            name: name.to_string(),
            handle: handle.to_string(),
        }
    }

    pub(crate) fn post(id: &str, body: &str, thread: Option<&str>) -> FeedPost {
        FeedPost {
            id: id.to_string(),
            body: body.to_string(),
            thread: thread.map(str::to_string),
        }
    }

    pub(crate) fn sample_index() -> SearchIndex {
        SearchIndex::new(
            vec![
                contact("u1", "Alice", "al99"),
                contact("u2", "Bob", "bobby"),
                contact("u3", "Valerie", "val_dev"),
            ],
            vec![
                post("f1", "hello world", Some("g1")),
                post("f2", "hello there", None),
                post("f3", "Say HELLO to rust", Some("g2")),
                post("f4", "nothing to see", Some("g3")),
            ],
        )
    }

    fn contact_ids(results: &ResultSet) -> Vec<&str> {
        results.contacts().iter().map(|c| c.id.as_str()).collect()
    }

    fn feed_ids(results: &ResultSet) -> Vec<&str> {
        results.feeds().iter().map(|p| p.id.as_str()).collect()
    }

    #[test]
    fn contacts_match_name_or_handle_ignoring_case() {
        let index = sample_index();
        let outcome = index.search("AL");
        assert_eq!(contact_ids(&outcome.results), vec!["u1", "u3"]);

        let outcome = index.search("BBY");
        assert_eq!(contact_ids(&outcome.results), vec!["u2"]);

        let outcome = index.search("xyz");
        assert!(outcome.results.contacts().is_empty());
    }

    #[test]
    fn two_contact_example() {
        let index = SearchIndex::new(
            vec![contact("a", "Alice", "al99"), contact("b", "Bob", "bobby")],
            Vec::new(),
        );
        assert_eq!(contact_ids(&index.search("AL").results), vec!["a"]);
        assert!(index.search("xyz").results.contacts().is_empty());
    }

    #[test]
    fn feeds_require_text_match_and_thread() {
        let index = SearchIndex::new(
            Vec::new(),
            vec![
                post("p1", "hello world", Some("T1")),
                post("p2", "hello there", None),
            ],
        );
        let outcome = index.search("hello");
        assert_eq!(feed_ids(&outcome.results), vec!["p1"]);
    }

    #[test]
    fn empty_query_returns_everything_actionable() {
        let index = sample_index();
        let outcome = index.search("");
        assert_eq!(contact_ids(&outcome.results), vec!["u1", "u2", "u3"]);
        assert_eq!(feed_ids(&outcome.results), vec!["f1", "f3", "f4"]);
        assert!(outcome.has_any_result);
    }

    #[test]
    fn message_history_is_always_empty() {
        let index = sample_index();
        for query in ["", "a", "hello", "zzz"] {
            let outcome = index.search(query);
            assert_eq!(outcome.results.len(ResultGroup::MessageHistory), 0);
        }
    }

    #[test]
    fn rows_keep_source_order() {
        let index = sample_index();
        let outcome = index.search("hello");
        assert_eq!(feed_ids(&outcome.results), vec!["f1", "f3"]);
        let outcome = index.search("l");
        assert_eq!(contact_ids(&outcome.results), vec!["u1", "u3"]);
        assert_eq!(feed_ids(&outcome.results), vec!["f1", "f3"]);
    }

    #[test]
    fn has_any_result_tracks_row_counts() {
        let index = sample_index();
        for query in ["", "al", "hello", "bobby", "see", "nope", "HELLO WORLD"] {
            let outcome = index.search(query);
            let total = outcome.results.len(ResultGroup::Contacts)
                + outcome.results.len(ResultGroup::Feeds);
            assert_eq!(outcome.has_any_result, total > 0, "query {query:?}");
        }
    }

    #[test]
    fn membership_follows_predicates() {
        let index = sample_index();
        let queries = ["", "a", "AL", "b", "o", "dev", "hello", "RUST", " ", "to", "q"];
        for query in queries {
            let folded = crate::matcher::fold(query);
            let outcome = index.search(query);
            for c in &index.contacts {
                let expected = crate::matcher::fold(&c.name).contains(&folded)
                    || crate::matcher::fold(&c.handle).contains(&folded);
                let present = outcome.results.contacts().iter().any(|r| r.id == c.id);
                assert_eq!(present, expected, "contact {} query {query:?}", c.id);
            }
            for p in &index.posts {
                let expected =
                    p.thread.is_some() && crate::matcher::fold(&p.body).contains(&folded);
                let present = outcome.results.feeds().iter().any(|r| r.id == p.id);
                assert_eq!(present, expected, "post {} query {query:?}", p.id);
            }
        }
    }

    #[test]
    fn results_share_snapshot_rows() {
        let index = sample_index();
        let outcome = index.search("alice");
        assert!(Arc::ptr_eq(&outcome.results.contacts()[0], &index.contacts[0]));
        assert_eq!(outcome.results.query(), "alice");
    }
}
