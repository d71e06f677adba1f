//! Incremental newline-delimited JSON decoding
//!
//! Chunks from the network do not respect line boundaries, so bytes are
//! buffered until a full line arrives. Bytes (not `str`) are buffered so a
//! multi-byte character split across chunks survives.

use std::borrow::Cow;
use std::collections::VecDeque;
use std::marker::PhantomData;

use bytes::Bytes;
use futures::stream::{self, LocalBoxStream, Stream, StreamExt};
use lazy_static::lazy_static;
use regex::Regex;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::error::ClientError;

lazy_static! {
    /// A bare non-finite literal in value position: an object member
    /// (`"key": NaN,`) or an array element (`[NaN, 1]`)
    static ref BARE_NON_FINITE: Regex = Regex::new(
        r#"(?P<pre>(?:"\s*:|[\[,])\s*)(?P<val>-?Infinity|NaN)(?P<post>\s*(?:[,}\]]|$))"#
    )
    .unwrap();
}

const QUOTED_NON_FINITE: &str = r#"${pre}"${val}"${post}"#;

/// Quote bare `Infinity`, `-Infinity` and `NaN` values so the line is valid JSON.
///
/// Already-quoted sentinels are left alone.
pub fn sanitize_non_finite(line: &str) -> Cow<'_, str> {
    // A match consumes the delimiter after it, so the second of two adjacent
    // array elements only matches on another pass.
    match BARE_NON_FINITE.replace_all(line, QUOTED_NON_FINITE) {
        Cow::Borrowed(_) => Cow::Borrowed(line),
        Cow::Owned(once) => Cow::Owned(
            BARE_NON_FINITE
                .replace_all(&once, QUOTED_NON_FINITE)
                .into_owned(),
        ),
    }
}

#[derive(Debug, Default)]
pub struct LineBuffer {
    pending: Vec<u8>,
}

impl LineBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a chunk and return every line it completed
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.pending.extend_from_slice(chunk);

        let mut lines = Vec::new();
        let mut start = 0;
        while let Some(offset) = self.pending[start..].iter().position(|&b| b == b'\n') {
            let end = start + offset;
            lines.push(decode_line(&self.pending[start..end]));
            start = end + 1;
        }
        self.pending.drain(..start);
        lines
    }

    /// Flush a trailing line that had no newline
    pub fn finish(&mut self) -> Option<String> {
        if self.pending.is_empty() {
            return None;
        }
        let line = decode_line(&self.pending);
        self.pending.clear();
        Some(line)
    }

    pub fn reset(&mut self) {
        self.pending.clear();
    }

    pub fn has_partial(&self) -> bool {
        !self.pending.is_empty()
    }
}

fn decode_line(bytes: &[u8]) -> String {
    let bytes = bytes.strip_suffix(b"\r").unwrap_or(bytes);
    String::from_utf8_lossy(bytes).into_owned()
}

#[derive(Debug, Clone, PartialEq)]
pub enum Decoded<T> {
    Item(T),
    Malformed { line: String, error: String },
}

#[derive(Debug)]
pub struct NdjsonDecoder<T> {
    lines: LineBuffer,
    _item: PhantomData<fn() -> T>,
}

impl<T> Default for NdjsonDecoder<T> {
    fn default() -> Self {
        Self {
            lines: LineBuffer::new(),
            _item: PhantomData,
        }
    }
}

impl<T: DeserializeOwned> NdjsonDecoder<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, chunk: &[u8]) -> Vec<Decoded<T>> {
        self.lines
            .push(chunk)
            .iter()
            .filter_map(|line| decode(line))
            .collect()
    }

    pub fn finish(&mut self) -> Option<Decoded<T>> {
        self.lines.finish().and_then(|line| decode(&line))
    }

    /// Drop any partial line, e.g. before reading a reconnected stream
    pub fn reset(&mut self) {
        self.lines.reset();
    }
}

fn decode<T: DeserializeOwned>(line: &str) -> Option<Decoded<T>> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return None;
    }
    let sanitized = sanitize_non_finite(trimmed);
    Some(match serde_json::from_str(&sanitized) {
        Ok(item) => Decoded::Item(item),
        Err(e) => Decoded::Malformed {
            line: trimmed.to_string(),
            error: e.to_string(),
        },
    })
}

/// Chunked byte source as produced by the backends
pub type ByteStream = LocalBoxStream<'static, Result<Bytes, ClientError>>;

/// Pull-based reader over a byte stream.
///
/// Malformed lines are logged and skipped; only a transport failure ends the
/// stream with an error.
pub struct NdjsonReader<T> {
    source: Option<ByteStream>,
    decoder: NdjsonDecoder<T>,
    ready: VecDeque<T>,
    skipped: usize,
}

impl<T: DeserializeOwned> NdjsonReader<T> {
    pub fn new(source: ByteStream) -> Self {
        Self {
            source: Some(source),
            decoder: NdjsonDecoder::new(),
            ready: VecDeque::new(),
            skipped: 0,
        }
    }

    /// Number of malformed lines skipped so far
    pub fn skipped(&self) -> usize {
        self.skipped
    }

    /// Continue from a new connection, discarding any half-read line
    pub fn reconnect(&mut self, source: ByteStream) {
        self.decoder.reset();
        self.source = Some(source);
    }

    pub async fn next_item(&mut self) -> Option<Result<T, ClientError>> {
        loop {
            if let Some(item) = self.ready.pop_front() {
                return Some(Ok(item));
            }

            let source = self.source.as_mut()?;
            match source.next().await {
                Some(Ok(chunk)) => {
                    let decoded = self.decoder.push(&chunk);
                    self.enqueue(decoded);
                }
                Some(Err(e)) => {
                    self.source = None;
                    return Some(Err(e));
                }
                None => {
                    self.source = None;
                    if let Some(last) = self.decoder.finish() {
                        self.enqueue(vec![last]);
                    }
                    debug!(skipped = self.skipped, "NDJSON stream ended");
                }
            }
        }
    }

    fn enqueue(&mut self, decoded: Vec<Decoded<T>>) {
        for entry in decoded {
            match entry {
                Decoded::Item(item) => self.ready.push_back(item),
                Decoded::Malformed { line, error } => {
                    self.skipped += 1;
                    warn!(%error, line = %line, "Skipping malformed NDJSON line");
                }
            }
        }
    }

    pub fn into_stream(self) -> LocalBoxStream<'static, Result<T, ClientError>>
    where
        T: 'static,
    {
        stream::unfold(self, |mut reader| async move {
            reader.next_item().await.map(|item| (item, reader))
        })
        .boxed_local()
    }
}

/// Decode a byte stream lazily into items
pub fn decode_stream<T>(source: ByteStream) -> impl Stream<Item = Result<T, ClientError>>
where
    T: DeserializeOwned + 'static,
{
    NdjsonReader::new(source).into_stream()
}
