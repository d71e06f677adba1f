//! Template-name analysis (`POST /analyze/template-names`, `GET /models`)

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// A span of the submitted text that matches a known model template.
///
/// `start` and `end` are character offsets into the submitted text.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TemplateMatch {
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub pattern: String,
    #[serde(default, rename = "templateName")]
    pub template_name: String,
    #[serde(default)]
    pub start: Option<usize>,
    #[serde(default)]
    pub end: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TemplateStat {
    /// Fraction of the model's templates found, 0.0..=1.0
    #[serde(default)]
    pub percentage: f64,
    /// Distinct templates of this model found in the text
    #[serde(default, alias = "count", skip_serializing_if = "Option::is_none")]
    pub matched: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TemplateAnalysis {
    #[serde(default)]
    pub matches: Vec<TemplateMatch>,
    #[serde(default, rename = "templateStats")]
    pub template_stats: BTreeMap<String, TemplateStat>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ModelsResponse {
    #[serde(default)]
    pub models: Vec<String>,
}
