//! Metrics board: progressive per-file metric values fed by the stream

use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

use tracing::{debug, error, info, warn};

use diversity_client::{open_metrics, AnalysisBackend, ClientError};
use diversity_types::{Document, MetricEvent, MetricKey, MetricSection};

use crate::lifecycle::{RequestLifecycle, RequestTicket, Settled};

pub const LENGTH_NOTE: &str = "Note: Diversity scores are correlated with text length. Consider this when comparing texts of different lengths.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum FileSlot {
    File1,
    File2,
}

impl FileSlot {
    pub const ALL: [FileSlot; 2] = [FileSlot::File1, FileSlot::File2];

    pub fn as_str(&self) -> &'static str {
        match self {
            FileSlot::File1 => "file1",
            FileSlot::File2 => "file2",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|slot| slot.as_str() == s)
    }

    pub fn title(&self) -> &'static str {
        match self {
            FileSlot::File1 => "File 1",
            FileSlot::File2 => "File 2",
        }
    }

    fn index(&self) -> usize {
        match self {
            FileSlot::File1 => 0,
            FileSlot::File2 => 1,
        }
    }
}

impl fmt::Display for FileSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// `Math.round` followed by en-US grouping
fn format_count(value: f64) -> String {
    let rounded = (value + 0.5).floor() as i64;
    let digits = rounded.unsigned_abs().to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(c);
    }
    if rounded < 0 {
        format!("-{}", grouped)
    } else {
        grouped
    }
}

/// Display text for a metric value. Negative infinity and NaN show as `N/A`.
pub fn format_metric(key: MetricKey, value: f64) -> String {
    if value == f64::INFINITY {
        return "\u{221e}".to_string();
    }
    if !value.is_finite() {
        return "N/A".to_string();
    }
    match key.section() {
        MetricSection::Text => format_count(value),
        MetricSection::Diversity => format!("{:.3}", value),
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MetricDisplay {
    /// Spinner
    Calculating,
    /// Dash
    Missing,
    Value(String),
}

#[derive(Debug, Default)]
struct SlotState {
    loading: BTreeMap<MetricKey, bool>,
    values: BTreeMap<String, f64>,
    lifecycle: RequestLifecycle,
}

impl SlotState {
    fn set_all_loading(&mut self, loading: bool) {
        self.loading = MetricKey::ALL.into_iter().map(|k| (k, loading)).collect();
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ComparisonRow {
    pub name: &'static str,
    pub file1: Option<f64>,
    pub file2: Option<f64>,
}

/// A metrics run to drive with [`MetricsRun::execute`]
#[derive(Debug)]
pub struct MetricsRun {
    slot: FileSlot,
    ticket: RequestTicket,
    document: Rc<Document>,
}

#[derive(Debug)]
pub struct MetricsOutcome {
    slot: FileSlot,
    settled: Settled<Result<usize, ClientError>>,
}

impl MetricsRun {
    pub fn slot(&self) -> FileSlot {
        self.slot
    }

    pub fn generation(&self) -> u64 {
        self.ticket.generation()
    }

    /// Stream the run, handing each event to `on_event` as it arrives.
    ///
    /// `on_event` receives the slot and generation so it can call
    /// [`MetricsBoard::apply`]. Malformed lines are skipped by the reader.
    pub async fn execute<B, F>(self, backend: &B, mut on_event: F) -> MetricsOutcome
    where
        B: AnalysisBackend + ?Sized,
        F: FnMut(FileSlot, u64, MetricEvent),
    {
        let MetricsRun {
            slot,
            ticket,
            document,
        } = self;
        let generation = ticket.generation();

        let settled = ticket
            .run(async {
                let mut reader = open_metrics(backend, &document).await?;
                let mut received: usize = 0;
                while let Some(event) = reader.next_item().await {
                    on_event(slot, generation, event?);
                    received += 1;
                }
                if reader.skipped() > 0 {
                    warn!(%slot, skipped = reader.skipped(), "Skipped malformed metric lines");
                }
                Ok::<_, ClientError>(received)
            })
            .await;

        MetricsOutcome { slot, settled }
    }
}

#[derive(Debug, Default)]
pub struct MetricsBoard {
    slots: [SlotState; 2],
    error: Option<String>,
}

impl MetricsBoard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Forget a slot's values, e.g. after a new upload
    pub fn reset(&mut self, slot: FileSlot) {
        let state = &mut self.slots[slot.index()];
        state.lifecycle.cancel();
        state.values.clear();
        state.set_all_loading(false);
    }

    /// Start a run for `slot`, superseding any run already streaming there
    pub fn begin(&mut self, slot: FileSlot, document: Rc<Document>) -> MetricsRun {
        self.error = None;
        let state = &mut self.slots[slot.index()];
        state.values.clear();
        state.set_all_loading(true);
        let ticket = state.lifecycle.begin(format!("metrics {}", slot));
        MetricsRun {
            slot,
            ticket,
            document,
        }
    }

    /// Apply one stream event. Events of a superseded run are ignored.
    pub fn apply(&mut self, slot: FileSlot, generation: u64, event: MetricEvent) -> bool {
        let state = &mut self.slots[slot.index()];
        if !state.lifecycle.is_current(generation) {
            return false;
        }
        let key = MetricKey::parse(event.metric());
        match event {
            MetricEvent::Start { metric } => {
                debug!(%slot, %metric, "Starting metric");
                if let Some(key) = key {
                    state.loading.insert(key, true);
                }
            }
            MetricEvent::Complete { metric, value } => {
                debug!(%slot, %metric, value = value.get(), "Completed metric");
                if let Some(key) = key {
                    state.loading.insert(key, false);
                }
                state.values.insert(metric, value.get());
            }
            MetricEvent::Error { metric, error } => {
                error!(%slot, %metric, error = error.as_deref().unwrap_or(""), "Error calculating metric");
                if let Some(key) = key {
                    state.loading.insert(key, false);
                }
            }
        }
        true
    }

    /// Close a run. A transport failure clears every loading flag and
    /// records the error; so does a clean end for metrics never reported.
    pub fn finish(&mut self, outcome: MetricsOutcome) -> bool {
        let MetricsOutcome { slot, settled } = outcome;
        let state = &mut self.slots[slot.index()];
        if !state.lifecycle.settle(settled.generation()) {
            return false;
        }
        match settled {
            Settled::Cancelled { .. } => return false,
            Settled::Completed { value: Ok(received), .. } => {
                info!(%slot, events = received, "Metrics stream finished");
            }
            Settled::Completed { value: Err(e), .. } => {
                error!(%slot, error = %e, "Error processing file");
                self.fail(slot, format!("Error processing file: {}", e));
                return true;
            }
        }
        self.slots[slot.index()].set_all_loading(false);
        true
    }

    /// Stop every spinner for `slot` and record `message`
    pub fn fail(&mut self, slot: FileSlot, message: impl Into<String>) {
        self.slots[slot.index()].set_all_loading(false);
        self.error = Some(message.into());
    }

    pub fn cancel(&mut self, slot: FileSlot) {
        let state = &mut self.slots[slot.index()];
        if state.lifecycle.cancel() {
            state.set_all_loading(false);
        }
    }

    pub fn is_loading(&self, slot: FileSlot, key: MetricKey) -> bool {
        self.slots[slot.index()]
            .loading
            .get(&key)
            .copied()
            .unwrap_or(false)
    }

    pub fn any_loading(&self) -> bool {
        self.slots
            .iter()
            .any(|s| s.loading.values().any(|loading| *loading))
    }

    pub fn value(&self, slot: FileSlot, key: MetricKey) -> Option<f64> {
        self.slots[slot.index()].values.get(key.as_str()).copied()
    }

    pub fn has_values(&self, slot: FileSlot) -> bool {
        !self.slots[slot.index()].values.is_empty()
    }

    pub fn display(&self, slot: FileSlot, key: MetricKey) -> MetricDisplay {
        let loading = self.is_loading(slot, key);
        match (self.value(slot, key), key.section()) {
            _ if loading => MetricDisplay::Calculating,
            (Some(value), _) => MetricDisplay::Value(format_metric(key, value)),
            (None, MetricSection::Text) => MetricDisplay::Calculating,
            (None, MetricSection::Diversity) => MetricDisplay::Missing,
        }
    }

    /// Bars for the two-file comparison chart
    pub fn comparison(&self) -> Vec<ComparisonRow> {
        let row = |key: MetricKey| ComparisonRow {
            name: key.label(),
            file1: self.value(FileSlot::File1, key),
            file2: self.value(FileSlot::File2, key),
        };
        let mut rows = vec![row(MetricKey::CompressionRatio)];
        let repetition = row(MetricKey::SelfRepetition);
        if repetition.file1.is_some() && repetition.file2.is_some() {
            rows.push(repetition);
        }
        rows
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn set_error(&mut self, message: impl Into<String>) {
        self.error = Some(message.into());
    }

    pub fn dismiss_error(&mut self) {
        self.error = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeBackend;
    use diversity_types::MetricValue;
    use futures::executor::block_on;
    use pretty_assertions::assert_eq;

    fn doc() -> Rc<Document> {
        Rc::new(Document::from_text("a.txt", "one\ntwo"))
    }

    fn complete(metric: &str, value: f64) -> MetricEvent {
        MetricEvent::Complete {
            metric: metric.to_string(),
            value: MetricValue(value),
        }
    }

    #[test]
    fn test_format_metric() {
        assert_eq!(format_metric(MetricKey::CompressionRatio, f64::INFINITY), "\u{221e}");
        assert_eq!(format_metric(MetricKey::CompressionRatio, f64::NEG_INFINITY), "N/A");
        assert_eq!(format_metric(MetricKey::SelfRepetition, f64::NAN), "N/A");
        assert_eq!(format_metric(MetricKey::CompressionPos, 2.71828), "2.718");
        assert_eq!(format_metric(MetricKey::NTexts, 1234567.4), "1,234,567");
        assert_eq!(format_metric(MetricKey::AvgLength, 12.5), "13");
        assert_eq!(format_metric(MetricKey::VarLength, 999.4), "999");
        assert_eq!(format_metric(MetricKey::NTexts, 1000.0), "1,000");
    }

    #[test]
    fn test_events_drive_loading_flags() {
        let mut board = MetricsBoard::new();
        let run = board.begin(FileSlot::File1, doc());
        let generation = run.generation();
        assert!(board.is_loading(FileSlot::File1, MetricKey::NTexts));

        board.apply(FileSlot::File1, generation, complete("n_texts", 2.0));
        assert_eq!(
            board.display(FileSlot::File1, MetricKey::NTexts),
            MetricDisplay::Value("2".into())
        );

        board.apply(
            FileSlot::File1,
            generation,
            MetricEvent::Error {
                metric: "self_repetition".into(),
                error: Some("boom".into()),
            },
        );
        assert_eq!(
            board.display(FileSlot::File1, MetricKey::SelfRepetition),
            MetricDisplay::Missing
        );
        assert_eq!(
            board.display(FileSlot::File1, MetricKey::AvgLength),
            MetricDisplay::Calculating
        );
    }

    #[test]
    fn test_negative_infinity_renders_na() {
        let mut board = MetricsBoard::new();
        let run = board.begin(FileSlot::File2, doc());
        board.apply(
            FileSlot::File2,
            run.generation(),
            complete("compression_ratio", f64::NEG_INFINITY),
        );
        assert_eq!(
            board.display(FileSlot::File2, MetricKey::CompressionRatio),
            MetricDisplay::Value("N/A".into())
        );
    }

    #[test]
    fn test_superseded_run_events_ignored() {
        let mut board = MetricsBoard::new();
        let old = board.begin(FileSlot::File1, doc());
        let new = board.begin(FileSlot::File1, doc());
        assert!(!board.apply(FileSlot::File1, old.generation(), complete("n_texts", 5.0)));
        assert!(board.apply(FileSlot::File1, new.generation(), complete("n_texts", 7.0)));
        assert_eq!(board.value(FileSlot::File1, MetricKey::NTexts), Some(7.0));
    }

    #[test]
    fn test_run_streams_into_board() {
        let backend = FakeBackend::default();
        *backend.metrics_lines.borrow_mut() = vec![
            r#"{"type":"metricStart","metric":"compression_ratio"}"#,
            r#"{"type":"metricComplete","metric":"compression_ratio","value":-Infinity}"#,
            "not json",
            r#"{"type":"metricComplete","metric":"self_repetition","value":0.25}"#,
        ];
        let mut board = MetricsBoard::new();
        let run = board.begin(FileSlot::File1, doc());

        let mut events = Vec::new();
        let outcome = block_on(run.execute(&backend, |slot, generation, event| {
            events.push((slot, generation, event));
        }));
        for (slot, generation, event) in events {
            assert!(board.apply(slot, generation, event));
        }
        assert!(board.finish(outcome));

        assert!(!board.any_loading());
        assert_eq!(
            board.value(FileSlot::File1, MetricKey::CompressionRatio),
            Some(f64::NEG_INFINITY)
        );
        assert_eq!(
            board.display(FileSlot::File1, MetricKey::SelfRepetition),
            MetricDisplay::Value("0.250".into())
        );
        assert!(board.error().is_none());
    }

    #[test]
    fn test_comparison_rows() {
        let mut board = MetricsBoard::new();
        let one = board.begin(FileSlot::File1, doc());
        let two = board.begin(FileSlot::File2, doc());
        board.apply(FileSlot::File1, one.generation(), complete("compression_ratio", 2.0));
        board.apply(FileSlot::File1, one.generation(), complete("self_repetition", 0.5));
        board.apply(FileSlot::File2, two.generation(), complete("compression_ratio", 3.0));

        let rows = board.comparison();
        assert_eq!(
            rows,
            vec![ComparisonRow {
                name: "Compression Ratio",
                file1: Some(2.0),
                file2: Some(3.0),
            }]
        );

        board.apply(FileSlot::File2, two.generation(), complete("self_repetition", 0.1));
        assert_eq!(board.comparison().len(), 2);
    }

    #[test]
    fn test_reset_and_cancel() {
        let mut board = MetricsBoard::new();
        let run = board.begin(FileSlot::File1, doc());
        board.cancel(FileSlot::File1);
        assert!(!board.any_loading());
        assert!(!board.apply(FileSlot::File1, run.generation(), complete("n_texts", 1.0)));

        board.reset(FileSlot::File1);
        assert!(!board.has_values(FileSlot::File1));
    }

    #[test]
    fn test_fail_stops_spinners() {
        let mut board = MetricsBoard::new();
        let _run = board.begin(FileSlot::File2, doc());
        assert!(board.any_loading());
        board.fail(FileSlot::File2, "Error processing file: boom");
        assert!(!board.any_loading());
        assert_eq!(board.error(), Some("Error processing file: boom"));
    }
}
