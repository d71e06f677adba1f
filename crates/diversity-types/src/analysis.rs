//! Pattern analysis requests and results (`POST /analyze/patterns`)

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Pattern lengths offered by the explorer
pub const PATTERN_LENGTHS: std::ops::RangeInclusive<u8> = 2..=10;

/// Length analysed when a corpus is first loaded
pub const DEFAULT_PATTERN_LENGTH: u8 = 4;

/// Whether patterns are matched on part-of-speech sequences or exact text
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchMode {
    #[default]
    Pos,
    Exact,
}

impl MatchMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchMode::Pos => "pos",
            MatchMode::Exact => "exact",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "pos" => Some(MatchMode::Pos),
            "exact" => Some(MatchMode::Exact),
            _ => None,
        }
    }
}

impl fmt::Display for MatchMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a large corpus is reduced before analysis
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SamplingMode {
    #[serde(rename = "first100")]
    First100,
    #[serde(rename = "random200")]
    Random200,
    #[serde(rename = "full")]
    Full,
}

impl SamplingMode {
    pub const ALL: [SamplingMode; 3] = [
        SamplingMode::First100,
        SamplingMode::Random200,
        SamplingMode::Full,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SamplingMode::First100 => "first100",
            SamplingMode::Random200 => "random200",
            SamplingMode::Full => "full",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "first100" => Some(SamplingMode::First100),
            "random200" => Some(SamplingMode::Random200),
            "full" => Some(SamplingMode::Full),
            _ => None,
        }
    }

    /// Badge text shown once analysis has started
    pub fn label(&self) -> &'static str {
        match self {
            SamplingMode::First100 => "First 100 docs",
            SamplingMode::Random200 => "Random 200 docs",
            SamplingMode::Full => "All documents",
        }
    }

    /// Number of documents the backend will look at
    pub fn sample_size(&self, document_count: usize) -> usize {
        match self {
            SamplingMode::First100 => document_count.min(100),
            SamplingMode::Random200 => document_count.min(200),
            SamplingMode::Full => document_count,
        }
    }
}

impl fmt::Display for SamplingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Parameters of one pattern analysis call; the documents travel separately
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PatternRequest {
    pub pattern_length: u8,
    pub match_mode: MatchMode,
    pub sampling_mode: Option<SamplingMode>,
}

impl PatternRequest {
    pub fn new(pattern_length: u8, match_mode: MatchMode) -> Self {
        Self {
            pattern_length,
            match_mode,
            sampling_mode: None,
        }
    }

    pub fn with_sampling(mut self, mode: SamplingMode) -> Self {
        self.sampling_mode = Some(mode);
        self
    }

    /// Multipart text fields in the order the backend documents them
    pub fn form_fields(&self) -> Vec<(&'static str, String)> {
        let mut fields = vec![
            ("pattern_length", self.pattern_length.to_string()),
            ("match_mode", self.match_mode.as_str().to_string()),
        ];
        if let Some(mode) = self.sampling_mode {
            fields.push(("sampling_mode", mode.as_str().to_string()));
        }
        fields
    }
}

/// Which of the two documents a pattern occurs in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Presence {
    #[serde(default)]
    pub doc1: bool,
    #[serde(default)]
    pub doc2: bool,
}

/// One document of the corpus and the (pattern, matched text) pairs found in it
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DocumentMatches {
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub matches: Vec<(String, String)>,
}

impl DocumentMatches {
    pub fn count_pattern(&self, pattern: &str) -> usize {
        self.matches.iter().filter(|(p, _)| p == pattern).count()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DocumentMatchSet {
    #[serde(default)]
    pub doc1: Vec<DocumentMatches>,
    #[serde(default)]
    pub doc2: Vec<DocumentMatches>,
}

/// Body of a successful pattern analysis
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PatternResult {
    /// Pattern to example occurrences
    #[serde(default)]
    pub patterns: BTreeMap<String, Vec<String>>,
    #[serde(default)]
    pub pattern_presence: BTreeMap<String, Presence>,
    #[serde(default)]
    pub matches: DocumentMatchSet,
    #[serde(default, rename = "wasSampled")]
    pub was_sampled: bool,
    #[serde(default, rename = "samplingInfo", skip_serializing_if = "Option::is_none")]
    pub sampling_info: Option<String>,
}

impl PatternResult {
    pub fn pattern_count(&self) -> usize {
        self.patterns.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_pattern_result_parses_backend_shape() {
        let json = r#"{
            "patterns": {"DET NOUN VERB": ["the fox jumps", "a dog barks"]},
            "pattern_presence": {"DET NOUN VERB": {"doc1": true, "doc2": false}},
            "matches": {
                "doc1": [{"text": "the fox jumps high", "matches": [["DET NOUN VERB", "the fox jumps"]]}],
                "doc2": []
            },
            "wasSampled": true,
            "samplingInfo": "random 200 of 512"
        }"#;

        let result: PatternResult = serde_json::from_str(json).unwrap();
        assert_eq!(result.pattern_count(), 1);
        assert!(result.pattern_presence["DET NOUN VERB"].doc1);
        assert_eq!(result.matches.doc1[0].count_pattern("DET NOUN VERB"), 1);
        assert!(result.was_sampled);
        assert_eq!(result.sampling_info.as_deref(), Some("random 200 of 512"));
    }

    #[test]
    fn test_pattern_result_defaults_missing_fields() {
        let result: PatternResult = serde_json::from_str("{}").unwrap();
        assert_eq!(result, PatternResult::default());
    }

    #[test]
    fn test_form_fields_include_sampling_only_when_set() {
        let request = PatternRequest::new(5, MatchMode::Exact);
        assert_eq!(
            request.form_fields(),
            vec![
                ("pattern_length", "5".to_string()),
                ("match_mode", "exact".to_string())
            ]
        );

        let sampled = request.with_sampling(SamplingMode::Random200);
        assert_eq!(
            sampled.form_fields().last(),
            Some(&("sampling_mode", "random200".to_string()))
        );
    }

    #[test]
    fn test_sample_size() {
        assert_eq!(SamplingMode::First100.sample_size(50), 50);
        assert_eq!(SamplingMode::First100.sample_size(500), 100);
        assert_eq!(SamplingMode::Random200.sample_size(500), 200);
        assert_eq!(SamplingMode::Full.sample_size(500), 500);
    }

    #[test]
    fn test_mode_parsing() {
        assert_eq!(MatchMode::parse("POS"), Some(MatchMode::Pos));
        assert_eq!(SamplingMode::parse("random200"), Some(SamplingMode::Random200));
        assert_eq!(SamplingMode::parse("all"), None);
    }
}
