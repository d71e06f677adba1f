//! The analysis service seen as a set of async calls

use async_trait::async_trait;
use serde::Serialize;

use diversity_types::{
    DatasetContent, Document, ModelsResponse, PatternRequest, PatternResult, TemplateAnalysis,
    PATTERN_LENGTHS,
};

use crate::error::ClientError;
use crate::ndjson::ByteStream;

pub const PATTERNS_PATH: &str = "analyze/patterns";
pub const TEMPLATE_NAMES_PATH: &str = "analyze/template-names";
pub const METRICS_PATH: &str = "analyze/metrics";
pub const MODELS_PATH: &str = "models";
pub const DEFAULTS_PATH: &str = "defaults";

/// JSON body of `POST /analyze/template-names`
#[derive(Debug, Clone, Serialize)]
pub struct TemplateNamesRequest<'a> {
    pub text: &'a str,
}

/// Remote analysis operations.
///
/// Futures are not `Send`: the browser implementation holds JS handles.
/// Dropping a returned future abandons the underlying transfer.
#[async_trait(?Send)]
pub trait AnalysisBackend {
    async fn analyze_patterns(
        &self,
        doc1: &Document,
        doc2: Option<&Document>,
        request: &PatternRequest,
    ) -> Result<PatternResult, ClientError>;

    async fn analyze_templates(&self, text: &str) -> Result<TemplateAnalysis, ClientError>;

    async fn models(&self) -> Result<ModelsResponse, ClientError>;

    async fn default_dataset(&self, id: &str) -> Result<DatasetContent, ClientError>;

    /// Start a metrics run; the body is NDJSON `MetricEvent`s
    async fn metrics_stream(&self, document: &Document) -> Result<ByteStream, ClientError>;
}

/// Reject requests the backend would refuse anyway
pub fn validate_pattern_request(request: &PatternRequest) -> Result<(), ClientError> {
    if !PATTERN_LENGTHS.contains(&request.pattern_length) {
        return Err(ClientError::Validation(format!(
            "Pattern length must be between {} and {}",
            PATTERN_LENGTHS.start(),
            PATTERN_LENGTHS.end()
        )));
    }
    Ok(())
}

pub fn defaults_path(id: &str) -> String {
    format!("{}/{}", DEFAULTS_PATH, id)
}
