//! What the patterns tab shows for the current analysis

use std::collections::BTreeSet;

use diversity_types::{DocumentMatches, PatternResult, Presence};

use crate::highlight::{render_highlights, HighlightSpan};
use crate::text_match::{find_with_variable_spacing, normalize_tokenized_text};

/// Highlight classes, assigned to patterns in display order
pub const PATTERN_PALETTE: [&str; 18] = [
    "bg-red-300/90 hover:bg-red-300",
    "bg-orange-400/90 hover:bg-orange-400",
    "bg-amber-300/90 hover:bg-amber-300",
    "bg-yellow-200/90 hover:bg-yellow-200",
    "bg-rose-400/90 hover:bg-rose-400",
    "bg-blue-400/90 hover:bg-blue-400",
    "bg-sky-300/90 hover:bg-sky-300",
    "bg-teal-300/90 hover:bg-teal-300",
    "bg-emerald-400/90 hover:bg-emerald-400",
    "bg-green-300/90 hover:bg-green-300",
    "bg-lime-300/90 hover:bg-lime-300",
    "bg-stone-300/90 hover:bg-stone-300",
    "bg-amber-200/90 hover:bg-amber-200",
    "bg-purple-400/90 hover:bg-purple-400",
    "bg-fuchsia-300/90 hover:bg-fuchsia-300",
    "bg-violet-400/90 hover:bg-violet-400",
    "bg-pink-300/90 hover:bg-pink-300",
    "bg-slate-400/90 hover:bg-slate-400",
];

const FALLBACK_CLASS: &str = "bg-gray-200";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FilterMode {
    #[default]
    All,
    Doc1Only,
    Doc2Only,
    Common,
}

impl FilterMode {
    pub const ALL: [FilterMode; 4] = [
        FilterMode::All,
        FilterMode::Doc1Only,
        FilterMode::Doc2Only,
        FilterMode::Common,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            FilterMode::All => "all",
            FilterMode::Doc1Only => "doc1",
            FilterMode::Doc2Only => "doc2",
            FilterMode::Common => "common",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|m| m.as_str() == s)
    }

    pub fn label(&self) -> &'static str {
        match self {
            FilterMode::All => "All Patterns",
            FilterMode::Doc1Only => "Only in Doc 1",
            FilterMode::Doc2Only => "Only in Doc 2",
            FilterMode::Common => "Common Patterns",
        }
    }

    pub fn admits(&self, presence: &Presence) -> bool {
        match self {
            FilterMode::All => true,
            FilterMode::Doc1Only => presence.doc1 && !presence.doc2,
            FilterMode::Doc2Only => !presence.doc1 && presence.doc2,
            FilterMode::Common => presence.doc1 && presence.doc2,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocSide {
    Doc1,
    Doc2,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisplayedPattern {
    pub pattern: String,
    pub examples: Vec<String>,
    pub frequency: usize,
    pub color: &'static str,
    pub selected: bool,
}

#[derive(Debug, Clone, Default)]
pub struct PatternView {
    result: PatternResult,
    filter: FilterMode,
    selected: BTreeSet<String>,
}

fn occurrences(docs: &[DocumentMatches], pattern: &str) -> usize {
    docs.iter().map(|d| d.count_pattern(pattern)).sum()
}

impl PatternView {
    pub fn new() -> Self {
        Self::default()
    }

    /// Show a new analysis; the selection resets to the top pattern
    pub fn set_result(&mut self, result: PatternResult) {
        self.result = result;
        self.select_first();
    }

    pub fn result(&self) -> &PatternResult {
        &self.result
    }

    pub fn clear(&mut self) {
        self.result = PatternResult::default();
        self.selected.clear();
    }

    pub fn filter(&self) -> FilterMode {
        self.filter
    }

    pub fn set_filter(&mut self, filter: FilterMode) {
        self.filter = filter;
    }

    /// Patterns that pass the filter, most frequent first.
    ///
    /// Patterns that never occur in the returned matches are hidden.
    pub fn displayed(&self) -> Vec<DisplayedPattern> {
        let matches = &self.result.matches;
        let mut rows: Vec<(String, Vec<String>, usize)> = self
            .result
            .patterns
            .iter()
            .filter_map(|(pattern, examples)| {
                let presence = self.result.pattern_presence.get(pattern)?;
                let doc1 = occurrences(&matches.doc1, pattern);
                let doc2 = occurrences(&matches.doc2, pattern);
                if doc1 + doc2 == 0 || !self.filter.admits(presence) {
                    return None;
                }
                let frequency = match self.filter {
                    FilterMode::Doc1Only => doc1,
                    FilterMode::Doc2Only => doc2,
                    FilterMode::All | FilterMode::Common => doc1 + doc2,
                };
                Some((pattern.clone(), examples.clone(), frequency))
            })
            .collect();

        // patterns iterate in sorted order, so ties stay alphabetical
        rows.sort_by(|a, b| b.2.cmp(&a.2));

        rows.into_iter()
            .enumerate()
            .map(|(i, (pattern, examples, frequency))| DisplayedPattern {
                selected: self.selected.contains(&pattern),
                color: PATTERN_PALETTE[i % PATTERN_PALETTE.len()],
                pattern,
                examples,
                frequency,
            })
            .collect()
    }

    pub fn color_of(&self, pattern: &str) -> Option<&'static str> {
        self.displayed()
            .into_iter()
            .find(|p| p.pattern == pattern)
            .map(|p| p.color)
    }

    pub fn selected(&self) -> &BTreeSet<String> {
        &self.selected
    }

    pub fn is_selected(&self, pattern: &str) -> bool {
        self.selected.contains(pattern)
    }

    pub fn toggle(&mut self, pattern: &str) {
        if !self.selected.remove(pattern) {
            self.selected.insert(pattern.to_string());
        }
    }

    pub fn select_all(&mut self) {
        self.selected = self.displayed().into_iter().map(|p| p.pattern).collect();
    }

    pub fn clear_selection(&mut self) {
        self.selected.clear();
    }

    fn select_first(&mut self) {
        self.selected.clear();
        if let Some(first) = self.displayed().into_iter().next() {
            self.selected.insert(first.pattern);
        }
    }

    /// Documents of one side keeping only selected, filter-admitted matches
    pub fn visible_matches(&self, side: DocSide) -> Vec<DocumentMatches> {
        let docs = match side {
            DocSide::Doc1 => &self.result.matches.doc1,
            DocSide::Doc2 => &self.result.matches.doc2,
        };

        docs.iter()
            .filter_map(|doc| {
                let matches: Vec<(String, String)> = doc
                    .matches
                    .iter()
                    .filter(|(pattern, text)| {
                        !pattern.is_empty()
                            && !text.is_empty()
                            && self.selected.contains(pattern)
                            && self
                                .result
                                .pattern_presence
                                .get(pattern)
                                .is_some_and(|p| self.filter.admits(p))
                    })
                    .cloned()
                    .collect();
                (!matches.is_empty()).then(|| DocumentMatches {
                    text: doc.text.clone(),
                    matches,
                })
            })
            .collect()
    }

    /// Highlighted HTML for every visible document of one side
    pub fn highlighted_documents(&self, side: DocSide) -> Vec<String> {
        let colors: Vec<(String, &'static str)> = self
            .displayed()
            .into_iter()
            .map(|p| (p.pattern, p.color))
            .collect();
        let color_for = |pattern: &str| {
            colors
                .iter()
                .find(|(p, _)| p == pattern)
                .map_or(FALLBACK_CLASS, |(_, c)| *c)
        };

        self.visible_matches(side)
            .iter()
            .map(|doc| {
                let spans: Vec<HighlightSpan> = doc
                    .matches
                    .iter()
                    .flat_map(|(pattern, text)| {
                        let class = color_for(pattern);
                        find_with_variable_spacing(&doc.text, &normalize_tokenized_text(text))
                            .into_iter()
                            .map(move |m| HighlightSpan::new(m.start, m.end, pattern.clone(), class))
                    })
                    .collect();
                render_highlights(&doc.text, &spans)
            })
            .collect()
    }
}
