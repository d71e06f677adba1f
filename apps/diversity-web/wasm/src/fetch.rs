//! [`AnalysisBackend`] over the browser `fetch` API
//!
//! Every request carries an `AbortSignal`. The controller is owned by a guard
//! that aborts on drop, so dropping a request future (or a half-read metrics
//! stream) cancels the transfer in the browser too.

use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;
use js_sys::{Array, Reflect, Uint8Array};
use serde::de::DeserializeOwned;
use wasm_bindgen::{JsCast, JsValue};
use wasm_bindgen_futures::JsFuture;
use web_sys::{
    AbortController, Blob, BlobPropertyBag, FormData, ReadableStreamDefaultReader, Request,
    RequestInit, RequestMode, Response,
};

use diversity_client::backend::{
    defaults_path, METRICS_PATH, MODELS_PATH, PATTERNS_PATH, TEMPLATE_NAMES_PATH,
};
use diversity_client::{
    validate_pattern_request, AnalysisBackend, ByteStream, ClientConfig, ClientError,
    TemplateNamesRequest,
};
use diversity_types::{
    DatasetContent, Document, ModelsResponse, PatternRequest, PatternResult, TemplateAnalysis,
};

pub(crate) fn js_error(value: JsValue) -> ClientError {
    let message = value
        .dyn_ref::<js_sys::Error>()
        .map(|e| String::from(e.message()))
        .or_else(|| value.as_string())
        .unwrap_or_else(|| format!("{:?}", value));
    ClientError::Transport(message)
}

struct AbortOnDrop(AbortController);

impl Drop for AbortOnDrop {
    fn drop(&mut self) {
        self.0.abort();
    }
}

enum Body {
    Empty,
    Json(String),
    Form(FormData),
}

#[derive(Debug, Clone)]
pub struct FetchBackend {
    config: ClientConfig,
}

impl FetchBackend {
    pub fn new(config: ClientConfig) -> Result<Self, ClientError> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Send a request and fail on non-2xx. The guard must outlive any read
    /// of the response body.
    async fn send(
        &self,
        method: &str,
        path: &str,
        body: Body,
    ) -> Result<(Response, AbortOnDrop), ClientError> {
        let window = web_sys::window().ok_or_else(|| ClientError::Transport("No window".into()))?;
        let guard = AbortOnDrop(AbortController::new().map_err(js_error)?);

        let opts = RequestInit::new();
        opts.set_method(method);
        opts.set_mode(RequestMode::Cors);
        opts.set_signal(Some(&guard.0.signal()));
        let content_type = match &body {
            Body::Empty => None,
            Body::Json(json) => {
                opts.set_body(&JsValue::from_str(json));
                Some("application/json")
            }
            // the browser sets the multipart boundary itself
            Body::Form(form) => {
                opts.set_body(form);
                None
            }
        };

        let url = self.config.endpoint(path);
        let request = Request::new_with_str_and_init(&url, &opts).map_err(js_error)?;
        if let Some(content_type) = content_type {
            request
                .headers()
                .set("Content-Type", content_type)
                .map_err(js_error)?;
        }

        tracing::debug!(%method, %url, "fetch");
        let response = JsFuture::from(window.fetch_with_request(&request))
            .await
            .map_err(js_error)?;
        let response: Response = response.dyn_into().map_err(js_error)?;

        if !response.ok() {
            let body = match response.text() {
                Ok(promise) => JsFuture::from(promise)
                    .await
                    .ok()
                    .and_then(|v| v.as_string())
                    .unwrap_or_default(),
                Err(_) => String::new(),
            };
            return Err(ClientError::Status {
                status: response.status(),
                body,
            });
        }
        Ok((response, guard))
    }

    async fn fetch_json<T: DeserializeOwned>(
        &self,
        method: &str,
        path: &str,
        body: Body,
    ) -> Result<T, ClientError> {
        let (response, _guard) = self.send(method, path, body).await?;
        let text = JsFuture::from(response.text().map_err(js_error)?)
            .await
            .map_err(js_error)?
            .as_string()
            .ok_or_else(|| ClientError::Decode("Response body is not text".into()))?;
        Ok(serde_json::from_str(&text)?)
    }
}

fn file_blob(document: &Document) -> Result<Blob, ClientError> {
    let parts = Array::new();
    parts.push(&Uint8Array::from(document.bytes.as_slice()));
    let options = BlobPropertyBag::new();
    options.set_type(document.media_type_or_default());
    Blob::new_with_u8_array_sequence_and_options(&parts, &options).map_err(js_error)
}

fn append_file(form: &FormData, field: &str, document: &Document) -> Result<(), ClientError> {
    form.append_with_blob_and_filename(field, &file_blob(document)?, &document.name)
        .map_err(js_error)
}

/// One `read()` from a body reader; `None` at end of stream
async fn read_chunk(reader: &ReadableStreamDefaultReader) -> Result<Option<Bytes>, ClientError> {
    let result = JsFuture::from(reader.read()).await.map_err(js_error)?;
    let done = Reflect::get(&result, &"done".into())
        .ok()
        .and_then(|v| v.as_bool())
        .unwrap_or(true);
    if done {
        return Ok(None);
    }
    let value = Reflect::get(&result, &"value".into()).map_err(js_error)?;
    Ok(Some(Bytes::from(Uint8Array::new(&value).to_vec())))
}

#[async_trait(?Send)]
impl AnalysisBackend for FetchBackend {
    async fn analyze_patterns(
        &self,
        doc1: &Document,
        doc2: Option<&Document>,
        request: &PatternRequest,
    ) -> Result<PatternResult, ClientError> {
        validate_pattern_request(request)?;

        let form = FormData::new().map_err(js_error)?;
        append_file(&form, "file", doc1)?;
        for (name, value) in request.form_fields() {
            form.append_with_str(name, &value).map_err(js_error)?;
        }
        if let Some(doc2) = doc2 {
            append_file(&form, "file2", doc2)?;
        }
        self.fetch_json("POST", PATTERNS_PATH, Body::Form(form)).await
    }

    async fn analyze_templates(&self, text: &str) -> Result<TemplateAnalysis, ClientError> {
        let body = serde_json::to_string(&TemplateNamesRequest { text })?;
        self.fetch_json("POST", TEMPLATE_NAMES_PATH, Body::Json(body))
            .await
    }

    async fn models(&self) -> Result<ModelsResponse, ClientError> {
        self.fetch_json("GET", MODELS_PATH, Body::Empty).await
    }

    async fn default_dataset(&self, id: &str) -> Result<DatasetContent, ClientError> {
        self.fetch_json("GET", &defaults_path(id), Body::Empty).await
    }

    async fn metrics_stream(&self, document: &Document) -> Result<ByteStream, ClientError> {
        let form = FormData::new().map_err(js_error)?;
        append_file(&form, "file", document)?;
        let (response, guard) = self.send("POST", METRICS_PATH, Body::Form(form)).await?;

        let body = response
            .body()
            .ok_or_else(|| ClientError::Decode("Response has no body".into()))?;
        let reader: ReadableStreamDefaultReader = body.get_reader().unchecked_into();

        let chunks = futures::stream::unfold(Some((reader, guard)), |state| async move {
            let (reader, guard) = state?;
            match read_chunk(&reader).await {
                Ok(Some(bytes)) => Some((Ok(bytes), Some((reader, guard)))),
                Ok(None) => None,
                Err(e) => Some((Err(e), None)),
            }
        });
        Ok(chunks.boxed_local())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_relative_base_url() {
        assert!(matches!(
            FetchBackend::new(ClientConfig::new("/api")),
            Err(ClientError::Config(_))
        ));
        let backend = FetchBackend::new(ClientConfig::new("http://localhost:8000/")).unwrap();
        assert_eq!(
            backend.config().endpoint(PATTERNS_PATH),
            "http://localhost:8000/analyze/patterns"
        );
    }
}
