//! Shared data model for the text diversity explorer
//!
//! Everything that crosses the wire to the analysis backend, plus the static
//! catalogs (datasets, POS tags, metric descriptions) the front-ends render.

pub mod analysis;
pub mod catalog;
pub mod document;
pub mod metrics;
pub mod pos;
pub mod templates;

pub use analysis::{
    DocumentMatchSet, DocumentMatches, MatchMode, PatternRequest, PatternResult, Presence,
    SamplingMode, DEFAULT_PATTERN_LENGTH, PATTERN_LENGTHS,
};
pub use catalog::{
    Dataset, DatasetCategory, DatasetContent, DatasetKind, CATEGORIES, EXAMPLE_CORPUS,
    EXAMPLE_CORPUS_NAME,
};
pub use document::{
    validate_upload, Document, DocumentFingerprint, UploadError, MAX_UPLOAD_BYTES,
};
pub use metrics::{MetricDescriptor, MetricEvent, MetricKey, MetricSection, MetricValue};
pub use pos::{pos_tag_meaning, POS_TAGS};
pub use templates::{ModelsResponse, TemplateAnalysis, TemplateMatch, TemplateStat};
