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

//! Query-as-you-type driver: keeps the latest results and routes row
//! selections to a navigation host.

use anyhow::Result;
use tracing::debug;

use crate::index::ResultSet;
use crate::index::SearchIndex;
use crate::model::ResultGroup;
use crate::presentation::GroupTitles;
use crate::presentation::ResultPresentation;
use crate::presentation::SelectionIntent;
use crate::source::ConversationLookup;
use crate::source::NavigationHost;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Refresh {
    pub scroll_to_top: bool,
}

pub struct SearchSession<L> {
    index: SearchIndex,
    conversations: L,
    titles: GroupTitles,
    keyword: Option<String>,
    view: ResultPresentation,
}

impl<L: ConversationLookup> SearchSession<L> {
    pub fn new(index: SearchIndex, conversations: L, titles: GroupTitles) -> Self {
        let view = ResultPresentation::new(ResultSet::default(), titles.clone());
        Self {
            index,
            conversations,
            titles,
            keyword: None,
            view,
        }
    }

    pub fn keyword(&self) -> Option<&str> {
        self.keyword.as_deref()
    }

    pub fn view(&self) -> &ResultPresentation {
        &self.view
    }

    /// Replaces the results wholesale; the previous view is dropped.
    pub fn update_query(&mut self, text: &str) -> Refresh {
        let outcome = self.index.search(text);
        self.keyword = Some(text.to_string());
        self.view = ResultPresentation::new(outcome.results, self.titles.clone());
        Refresh {
            scroll_to_top: outcome.has_any_result,
        }
    }

    pub fn cancel(&mut self) {
        self.keyword = None;
        self.view = ResultPresentation::new(ResultSet::default(), self.titles.clone());
    }

    pub fn select(
        &self,
        group: ResultGroup,
        index: usize,
        host: &mut impl NavigationHost,
    ) -> Result<SelectionIntent> {
        let intent = self
            .view
            .selection_intent(group, index, &self.conversations)?;
        match &intent {
            SelectionIntent::OpenProfile(contact) => host.open_profile(contact),
            SelectionIntent::OpenConversation(conversation) => host.open_conversation(conversation),
            SelectionIntent::None => {
                debug!(%group, index, "row has no action");
            }
        }
        Ok(intent)
    }
}
