//! Exact phrases repeated across documents

use std::rc::Rc;

use regex::RegexBuilder;
use thiserror::Error;
use tracing::{info, warn};

use diversity_client::{AnalysisBackend, ClientError};
use diversity_types::{Document, MatchMode, PatternRequest, PatternResult, PATTERN_LENGTHS};

use crate::highlight::escape_html;
use crate::lifecycle::{RequestLifecycle, RequestTicket, Settled};

pub const DEFAULT_MIN_LENGTH: u8 = 3;
pub const DEFAULT_MIN_OCCURRENCES: usize = 2;
pub const MIN_OCCURRENCE_RANGE: std::ops::RangeInclusive<usize> = 2..=10;

const FRAGMENT_CLASS: &str = "bg-yellow-200 px-1 rounded";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExactError {
    #[error("Minimum match length must be between 2 and 10, got {0}")]
    InvalidLength(u8),

    #[error("Minimum occurrences must be between 2 and 10, got {0}")]
    InvalidOccurrences(usize),
}

/// A phrase and the documents it was found in
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExactMatch {
    pub text: String,
    pub count: usize,
    pub examples: Vec<String>,
    pub documents: Vec<String>,
}

/// Phrases found in at least `min_occurrences` documents of the first file,
/// most frequent first
pub fn exact_matches(result: &PatternResult, min_occurrences: usize) -> Vec<ExactMatch> {
    let mut found: Vec<ExactMatch> = result
        .patterns
        .iter()
        .map(|(text, examples)| {
            let documents: Vec<String> = result
                .matches
                .doc1
                .iter()
                .filter(|doc| {
                    doc.matches
                        .iter()
                        .any(|(pattern, matched)| pattern == text || matched == text)
                })
                .map(|doc| doc.text.clone())
                .collect();
            ExactMatch {
                text: text.clone(),
                count: documents.len(),
                examples: examples.clone(),
                documents,
            }
        })
        .filter(|m| m.count >= min_occurrences)
        .collect();

    found.sort_by(|a, b| b.count.cmp(&a.count));
    found
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fragment {
    pub text: String,
    pub highlighted: bool,
}

/// Split `text` around case-insensitive occurrences of `needle`
pub fn split_fragments(text: &str, needle: &str) -> Vec<Fragment> {
    let plain = |t: &str| Fragment {
        text: t.to_string(),
        highlighted: false,
    };
    if text.is_empty() || needle.is_empty() {
        return vec![plain(text)];
    }

    let re = match RegexBuilder::new(&regex::escape(needle))
        .case_insensitive(true)
        .build()
    {
        Ok(re) => re,
        Err(e) => {
            warn!(error = %e, "Cannot build fragment matcher");
            return vec![plain(text)];
        }
    };

    let mut fragments = Vec::new();
    let mut last = 0;
    for m in re.find_iter(text) {
        if m.start() > last {
            fragments.push(plain(&text[last..m.start()]));
        }
        fragments.push(Fragment {
            text: m.as_str().to_string(),
            highlighted: true,
        });
        last = m.end();
    }
    if last < text.len() {
        fragments.push(plain(&text[last..]));
    }
    fragments
}

/// Escaped HTML of `text` with each occurrence of `needle` marked
pub fn fragment_html(text: &str, needle: &str) -> String {
    split_fragments(text, needle)
        .into_iter()
        .map(|f| {
            if f.highlighted {
                format!(
                    "<span class=\"{}\">{}</span>",
                    FRAGMENT_CLASS,
                    escape_html(&f.text)
                )
            } else {
                escape_html(&f.text)
            }
        })
        .collect()
}

#[derive(Debug)]
pub struct ExactFetch {
    ticket: RequestTicket,
    document: Rc<Document>,
    request: PatternRequest,
}

#[derive(Debug)]
pub struct ExactOutcome {
    min_length: u8,
    settled: Settled<Result<PatternResult, ClientError>>,
}

impl ExactFetch {
    pub fn request(&self) -> &PatternRequest {
        &self.request
    }

    pub async fn execute<B>(self, backend: &B) -> ExactOutcome
    where
        B: AnalysisBackend + ?Sized,
    {
        info!(min_length = self.request.pattern_length, "Finding exact matches");
        let settled = self
            .ticket
            .run(backend.analyze_patterns(&self.document, None, &self.request))
            .await;
        ExactOutcome {
            min_length: self.request.pattern_length,
            settled,
        }
    }
}

pub struct ExactMatchesView {
    document: Option<Rc<Document>>,
    min_length: u8,
    min_occurrences: usize,
    lifecycle: RequestLifecycle,
    result: Option<PatternResult>,
    matches: Vec<ExactMatch>,
    error: Option<String>,
}

impl Default for ExactMatchesView {
    fn default() -> Self {
        Self::new()
    }
}

impl ExactMatchesView {
    pub fn new() -> Self {
        Self {
            document: None,
            min_length: DEFAULT_MIN_LENGTH,
            min_occurrences: DEFAULT_MIN_OCCURRENCES,
            lifecycle: RequestLifecycle::new(),
            result: None,
            matches: Vec::new(),
            error: None,
        }
    }

    /// New document: forget the previous result and fetch again
    pub fn set_document(&mut self, document: Rc<Document>) -> ExactFetch {
        self.document = Some(Rc::clone(&document));
        self.result = None;
        self.matches.clear();
        self.error = None;
        self.start(document)
    }

    pub fn set_min_length(&mut self, length: u8) -> Result<Option<ExactFetch>, ExactError> {
        if !PATTERN_LENGTHS.contains(&length) {
            return Err(ExactError::InvalidLength(length));
        }
        self.min_length = length;
        Ok(self.refresh())
    }

    /// Re-filters the current result; no request needed
    pub fn set_min_occurrences(&mut self, occurrences: usize) -> Result<(), ExactError> {
        if !MIN_OCCURRENCE_RANGE.contains(&occurrences) {
            return Err(ExactError::InvalidOccurrences(occurrences));
        }
        self.min_occurrences = occurrences;
        if let Some(result) = &self.result {
            self.matches = exact_matches(result, occurrences);
        }
        Ok(())
    }

    /// Back on the tab: fetch again if the last request never completed
    pub fn activate(&mut self) -> Option<ExactFetch> {
        if self.result.is_some() || self.lifecycle.is_busy() {
            return None;
        }
        self.refresh()
    }

    /// Fetch for the current settings, superseding anything in flight
    pub fn refresh(&mut self) -> Option<ExactFetch> {
        let document = Rc::clone(self.document.as_ref()?);
        Some(self.start(document))
    }

    fn start(&mut self, document: Rc<Document>) -> ExactFetch {
        let ticket = self
            .lifecycle
            .begin(format!("exact matches {}", self.min_length));
        ExactFetch {
            ticket,
            document,
            request: PatternRequest::new(self.min_length, MatchMode::Exact),
        }
    }

    /// Apply a finished fetch. Returns false when it was superseded.
    pub fn finish(&mut self, outcome: ExactOutcome) -> bool {
        if !self.lifecycle.settle(outcome.settled.generation()) {
            return false;
        }
        match outcome.settled {
            Settled::Cancelled { .. } => false,
            Settled::Completed { value: Ok(result), .. } => {
                self.matches = exact_matches(&result, self.min_occurrences);
                info!(
                    min_length = outcome.min_length,
                    found = self.matches.len(),
                    "Exact matches ready"
                );
                self.result = Some(result);
                self.error = None;
                true
            }
            Settled::Completed { value: Err(e), .. } => {
                warn!(error = %e, "Error analyzing patterns");
                self.error = Some(e.user_message());
                true
            }
        }
    }

    pub fn deactivate(&mut self) {
        self.lifecycle.cancel();
    }

    /// The corpus changed: abort and forget everything until a new document
    pub fn unload(&mut self) {
        self.lifecycle.cancel();
        self.document = None;
        self.result = None;
        self.matches.clear();
        self.error = None;
    }

    pub fn is_loading(&self) -> bool {
        self.lifecycle.is_busy()
    }

    pub fn matches(&self) -> &[ExactMatch] {
        &self.matches
    }

    pub fn min_length(&self) -> u8 {
        self.min_length
    }

    pub fn min_occurrences(&self) -> usize {
        self.min_occurrences
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn summary(&self) -> String {
        format!(
            "Showing text fragments that appear in {} or more different documents",
            self.min_occurrences
        )
    }
}
