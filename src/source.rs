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

//! Collaborators the search core reads from or emits to.

use anyhow::Result;

use crate::model::Contact;
use crate::model::Conversation;
use crate::model::FeedPost;

/// Known people, in display order, excluding the local user.
pub trait Directory {
    fn all_contacts(&self) -> Result<Vec<Contact>>;
}

pub trait FeedStore {
    fn all_feed_posts(&self) -> Result<Vec<FeedPost>>;
}

pub trait ConversationLookup {
    /// The conversation attached to a discussion thread, if one exists.
    fn conversation_for_thread(&self, thread: &str) -> Result<Option<Conversation>>;
}

impl<T: ConversationLookup + ?Sized> ConversationLookup for &T {
    fn conversation_for_thread(&self, thread: &str) -> Result<Option<Conversation>> {
        (**self).conversation_for_thread(thread)
    }
}

/// Receives navigation requests; transitions are its business.
pub trait NavigationHost {
    fn open_profile(&mut self, contact: &Contact);
    fn open_conversation(&mut self, conversation: &Conversation);
}
