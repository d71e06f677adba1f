//! In-memory backend for unit tests

use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::{self, StreamExt};

use diversity_client::{AnalysisBackend, ByteStream, ClientError};
use diversity_types::{
    DatasetContent, Document, DocumentMatches, ModelsResponse, PatternRequest, PatternResult,
    Presence, TemplateAnalysis,
};

/// Pattern name the fake backend reports for a given length
pub fn pattern_for_length(length: u8) -> String {
    format!("LEN{}", length)
}

pub fn result_for(request: &PatternRequest, doc1: &Document) -> PatternResult {
    let pattern = pattern_for_length(request.pattern_length);
    let first_line = doc1.text().lines().next().unwrap_or_default().to_string();

    let mut result = PatternResult::default();
    result.patterns.insert(pattern.clone(), vec![first_line.clone()]);
    result.pattern_presence.insert(
        pattern.clone(),
        Presence {
            doc1: true,
            doc2: false,
        },
    );
    result.matches.doc1.push(DocumentMatches {
        text: first_line.clone(),
        matches: vec![(pattern, first_line)],
    });
    result
}

#[derive(Default)]
pub struct FakeBackend {
    pub pattern_calls: RefCell<Vec<PatternRequest>>,
    pub pattern_error: RefCell<Option<ClientError>>,
    pub exact_result: RefCell<Option<PatternResult>>,
    pub template_failures: Cell<u32>,
    pub template_calls: Cell<u32>,
    pub template_analysis: RefCell<TemplateAnalysis>,
    pub models: RefCell<Vec<String>>,
    pub metrics_lines: RefCell<Vec<&'static str>>,
    pub datasets: RefCell<BTreeMap<String, String>>,
}

#[async_trait(?Send)]
impl AnalysisBackend for FakeBackend {
    async fn analyze_patterns(
        &self,
        doc1: &Document,
        _doc2: Option<&Document>,
        request: &PatternRequest,
    ) -> Result<PatternResult, ClientError> {
        self.pattern_calls.borrow_mut().push(*request);
        if let Some(err) = self.pattern_error.borrow().clone() {
            return Err(err);
        }
        if let Some(result) = self.exact_result.borrow().clone() {
            return Ok(result);
        }
        Ok(result_for(request, doc1))
    }

    async fn analyze_templates(&self, _text: &str) -> Result<TemplateAnalysis, ClientError> {
        self.template_calls.set(self.template_calls.get() + 1);
        if self.template_failures.get() > 0 {
            self.template_failures.set(self.template_failures.get() - 1);
            return Err(ClientError::Transport("connection refused".into()));
        }
        Ok(self.template_analysis.borrow().clone())
    }

    async fn models(&self) -> Result<ModelsResponse, ClientError> {
        Ok(ModelsResponse {
            models: self.models.borrow().clone(),
        })
    }

    async fn default_dataset(&self, id: &str) -> Result<DatasetContent, ClientError> {
        self.datasets
            .borrow()
            .get(id)
            .map(|content| DatasetContent {
                content: content.clone(),
            })
            .ok_or_else(|| ClientError::Status {
                status: 404,
                body: "not found".into(),
            })
    }

    async fn metrics_stream(&self, _document: &Document) -> Result<ByteStream, ClientError> {
        let chunks: Vec<Result<Bytes, ClientError>> = self
            .metrics_lines
            .borrow()
            .iter()
            .map(|line| Ok(Bytes::from(format!("{}\n", line))))
            .collect();
        Ok(stream::iter(chunks).boxed_local())
    }
}
