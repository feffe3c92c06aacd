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

//! Case-insensitive substring matching.
//!
//! Text is folded char by char with Unicode default lowercasing, which does
//! not consult the host locale. Query and haystack go through the same fold so
//! context-sensitive mappings (final sigma) cannot make them disagree.

use std::ops::Range;

/// A query folded once and reused against every candidate field.
#[derive(Debug, Clone)]
pub struct Needle {
    raw: String,
    folded: String,
}

impl Needle {
    pub fn new(raw: &str) -> Self {
        Self {
            raw: raw.to_string(),
            folded: fold(raw),
        }
    }

    pub fn raw(&self) -> &str {
        &self.raw
    }

    pub fn is_empty(&self) -> bool {
        self.folded.is_empty()
    }

    pub fn matches(&self, haystack: &str) -> bool {
        if self.is_empty() {
            return true;
        }
        fold(haystack).contains(&self.folded)
    }

    /// Byte ranges into `haystack` for every occurrence, sorted and
    /// non-overlapping. Hits that widen onto the same original char are merged.
    pub fn ranges_in(&self, haystack: &str) -> Vec<Range<usize>> {
        if self.is_empty() {
            return Vec::new();
        }
        let folded = FoldedText::new(haystack);
        let mut ranges: Vec<Range<usize>> = Vec::new();
        for (start, hit) in folded.text.match_indices(&self.folded) {
            let range = folded.original_range(start..start + hit.len());
            match ranges.last_mut() {
                Some(last) if range.start < last.end => last.end = last.end.max(range.end),
                _ => ranges.push(range),
            }
        }
        ranges
    }
}

pub fn fold(text: &str) -> String {
    text.chars().flat_map(char::to_lowercase).collect()
}

struct FoldedText {
    text: String,
    spans: Vec<Span>,
}

struct Span {
    folded_start: usize,
    original: Range<usize>,
}

impl FoldedText {
    fn new(original: &str) -> Self {
        let mut text = String::with_capacity(original.len());
        let mut spans = Vec::with_capacity(original.len());
        for (start, ch) in original.char_indices() {
            let folded_start = text.len();
            text.extend(ch.to_lowercase());
            spans.push(Span {
                folded_start,
                original: start..start + ch.len_utf8(),
            });
        }
        Self { text, spans }
    }

    // A hit may start or end inside the expansion of a single char; widen to
    // whole original chars.
    fn original_range(&self, folded: Range<usize>) -> Range<usize> {
        let first = self
            .spans
            .partition_point(|span| span.folded_start <= folded.start)
            .saturating_sub(1);
        let last = self
            .spans
            .partition_point(|span| span.folded_start < folded.end)
            .saturating_sub(1);
        self.spans[first].original.start..self.spans[last].original.end
    }
}
