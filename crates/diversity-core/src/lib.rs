//! Front-end state for the text diversity explorer
//!
//! Everything here is UI-framework agnostic: the web and CLI front-ends
//! drive these state machines and render what they expose. Network calls go
//! through [`diversity_client::AnalysisBackend`]; persistence and time are
//! injected through [`SessionStore`] and [`Clock`].

pub mod cache;
pub mod clock;
pub mod datasets;
pub mod exact;
pub mod explorer;
pub mod highlight;
pub mod lifecycle;
pub mod metrics;
pub mod sampling;
pub mod store;
pub mod templates;
pub mod text_match;
pub mod view;
pub mod workspace;

#[cfg(test)]
mod testing;

pub use cache::{CacheKey, CacheSource, CachedPatterns, PatternCache, Staleness};
pub use clock::{Clock, ManualClock, SystemClock};
pub use datasets::{example_corpus, load_dataset, DatasetError};
pub use exact::{exact_matches, fragment_html, ExactFetch, ExactMatch, ExactMatchesView};
pub use explorer::{
    Corpus, ExplorerError, FetchOutcome, Finished, LengthStatus, LoadOutcome, PatternExplorer,
    PendingFetch, Selection,
};
pub use highlight::{escape_html, render_highlights, HighlightSpan};
pub use lifecycle::{RequestLifecycle, RequestTicket, Settled};
pub use metrics::{format_metric, FileSlot, MetricDisplay, MetricsBoard, MetricsRun};
pub use sampling::{sampling_options, SamplingOption, SamplingState, SAMPLING_THRESHOLD};
pub use store::{MemoryStore, SessionStore, StoreError};
pub use templates::{ModelColors, TemplateCatalog, TemplateMatcher};
pub use text_match::{find_with_variable_spacing, normalize_tokenized_text, TextMatch};
pub use view::{DocSide, FilterMode, PatternView};
pub use workspace::{Tab, TabActivation, Workspace, WorkspaceError, ANALYSIS_OPTIONS};
