//! Sampling choice for large corpora

use diversity_types::SamplingMode;

/// Corpora with more documents than this ask for a sampling strategy first
pub const SAMPLING_THRESHOLD: usize = 100;

pub fn needs_sampling(document_count: usize) -> bool {
    document_count > SAMPLING_THRESHOLD
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SamplingState {
    /// The corpus is large enough that sampling applies
    pub enabled: bool,
    pub mode: SamplingMode,
    pub modal_open: bool,
    /// The user (or the small-corpus shortcut) has started analysis
    pub initiated: bool,
}

impl Default for SamplingState {
    fn default() -> Self {
        Self {
            enabled: false,
            mode: SamplingMode::Random200,
            modal_open: false,
            initiated: false,
        }
    }
}

impl SamplingState {
    /// Initial state right after a corpus is loaded
    pub fn for_corpus(document_count: usize) -> Self {
        if needs_sampling(document_count) {
            Self {
                enabled: true,
                mode: SamplingMode::Random200,
                modal_open: true,
                initiated: false,
            }
        } else {
            Self {
                enabled: false,
                mode: SamplingMode::Full,
                modal_open: false,
                initiated: true,
            }
        }
    }
}

/// One option card in the sampling dialog
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SamplingOption {
    pub mode: SamplingMode,
    pub title: &'static str,
    pub description: &'static str,
    pub estimate: String,
}

pub fn sampling_options(document_count: usize) -> Vec<SamplingOption> {
    SamplingMode::ALL
        .iter()
        .map(|&mode| {
            let (title, description) = match mode {
                SamplingMode::First100 => (
                    "First 100 documents",
                    "Fastest option, but may not be representative",
                ),
                SamplingMode::Random200 => (
                    "Random 200 documents",
                    "Recommended: Good balance of speed and coverage",
                ),
                SamplingMode::Full => (
                    "Full dataset",
                    "Complete analysis but may be slow with large datasets",
                ),
            };
            SamplingOption {
                mode,
                title,
                description,
                estimate: estimated_time(mode, document_count),
            }
        })
        .collect()
}

/// Rough processing time at ten documents per second
pub fn estimated_time(mode: SamplingMode, document_count: usize) -> String {
    let seconds = (mode.sample_size(document_count) + 5) / 10;
    if seconds < 60 {
        format!("~{} seconds", seconds)
    } else {
        format!("~{} minutes", (seconds + 30) / 60)
    }
}

/// Warning shown under the dialog when the full corpus is selected
pub fn full_mode_warning(document_count: usize) -> Option<&'static str> {
    if document_count > 500 {
        Some("Warning: Processing all documents may cause timeouts or crashes with very large datasets.")
    } else if document_count > 200 {
        Some("Caution: Processing may be slow with this many documents.")
    } else {
        None
    }
}
