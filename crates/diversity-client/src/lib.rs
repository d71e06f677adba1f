//! Client for the text diversity analysis service
//!
//! - [`AnalysisBackend`]: one async method per endpoint
//! - [`HttpBackend`]: reqwest implementation (feature `http`)
//! - [`ndjson`]: chunk-safe NDJSON decoding for the metrics stream
//! - [`ClientConfig`]: base URL and timeouts from env or TOML

pub mod backend;
pub mod config;
pub mod error;
#[cfg(feature = "http")]
pub mod http;
pub mod ndjson;
pub mod retry;
pub mod stream;

pub use backend::{validate_pattern_request, AnalysisBackend, TemplateNamesRequest};
pub use config::{ClientConfig, API_URL_ENV, DEFAULT_API_URL};
pub use error::ClientError;
#[cfg(feature = "http")]
pub use http::HttpBackend;
pub use ndjson::{
    decode_stream, sanitize_non_finite, ByteStream, Decoded, LineBuffer, NdjsonDecoder,
    NdjsonReader,
};
pub use retry::RetryPolicy;
pub use stream::{open_metrics, read_metrics, MetricsStreamReader};
