//! Native backend over reqwest

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::multipart::{Form, Part};
use reqwest::{header, Response};
use serde::de::DeserializeOwned;
use tracing::{debug, instrument};

use diversity_types::{
    DatasetContent, Document, ModelsResponse, PatternRequest, PatternResult, TemplateAnalysis,
};

use crate::backend::{
    defaults_path, validate_pattern_request, AnalysisBackend, TemplateNamesRequest, METRICS_PATH,
    MODELS_PATH, PATTERNS_PATH, TEMPLATE_NAMES_PATH,
};
use crate::config::ClientConfig;
use crate::error::ClientError;
use crate::ndjson::ByteStream;

#[derive(Debug, Clone)]
pub struct HttpBackend {
    client: reqwest::Client,
    config: ClientConfig,
}

impl HttpBackend {
    pub fn new(config: ClientConfig) -> Result<Self, ClientError> {
        config.validate()?;

        let mut builder = reqwest::Client::builder().user_agent(config.user_agent.clone());
        if let Some(timeout) = config.request_timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder
            .build()
            .map_err(|e| ClientError::Config(e.to_string()))?;

        Ok(Self { client, config })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    fn url(&self, path: &str) -> String {
        self.config.endpoint(path)
    }
}

fn file_part(document: &Document) -> Result<Part, ClientError> {
    Part::bytes(document.bytes.clone())
        .file_name(document.name.clone())
        .mime_str(document.media_type_or_default())
        .map_err(|e| ClientError::Validation(format!("Invalid media type: {}", e)))
}

/// Turn a non-2xx response into `ClientError::Status`
async fn check_status(response: Response) -> Result<Response, ClientError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(ClientError::Status {
        status: status.as_u16(),
        body,
    })
}

async fn read_json<T: DeserializeOwned>(response: Response) -> Result<T, ClientError> {
    let response = check_status(response).await?;
    let text = response.text().await?;
    Ok(serde_json::from_str(&text)?)
}

#[async_trait(?Send)]
impl AnalysisBackend for HttpBackend {
    #[instrument(skip_all, fields(length = request.pattern_length, mode = %request.match_mode))]
    async fn analyze_patterns(
        &self,
        doc1: &Document,
        doc2: Option<&Document>,
        request: &PatternRequest,
    ) -> Result<PatternResult, ClientError> {
        validate_pattern_request(request)?;

        let mut form = Form::new().part("file", file_part(doc1)?);
        for (name, value) in request.form_fields() {
            form = form.text(name, value);
        }
        if let Some(doc2) = doc2 {
            form = form.part("file2", file_part(doc2)?);
        }

        debug!(doc1 = %doc1.name, doc2 = ?doc2.map(|d| &d.name), "POST {}", PATTERNS_PATH);
        let response = self
            .client
            .post(self.url(PATTERNS_PATH))
            .header(header::ACCEPT, "application/json")
            .multipart(form)
            .send()
            .await?;
        read_json(response).await
    }

    async fn analyze_templates(&self, text: &str) -> Result<TemplateAnalysis, ClientError> {
        let response = self
            .client
            .post(self.url(TEMPLATE_NAMES_PATH))
            .json(&TemplateNamesRequest { text })
            .send()
            .await?;
        read_json(response).await
    }

    async fn models(&self) -> Result<ModelsResponse, ClientError> {
        let response = self.client.get(self.url(MODELS_PATH)).send().await?;
        read_json(response).await
    }

    async fn default_dataset(&self, id: &str) -> Result<DatasetContent, ClientError> {
        let response = self.client.get(self.url(&defaults_path(id))).send().await?;
        read_json(response).await
    }

    async fn metrics_stream(&self, document: &Document) -> Result<ByteStream, ClientError> {
        let form = Form::new().part("file", file_part(document)?);
        let response = self
            .client
            .post(self.url(METRICS_PATH))
            .multipart(form)
            .send()
            .await?;
        let response = check_status(response).await?;
        Ok(response
            .bytes_stream()
            .map(|chunk| chunk.map_err(ClientError::from))
            .boxed_local())
    }
}
