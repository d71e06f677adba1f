//! Reading the progressive metrics stream

use diversity_types::{Document, MetricEvent};
use tracing::info;

use crate::backend::AnalysisBackend;
use crate::error::ClientError;
use crate::ndjson::{ByteStream, NdjsonReader};

/// Events from `POST /analyze/metrics`, in arrival order
pub type MetricsStreamReader = NdjsonReader<MetricEvent>;

pub fn read_metrics(source: ByteStream) -> MetricsStreamReader {
    MetricsStreamReader::new(source)
}

/// Open a metrics run for `document` and wrap the body in a reader
pub async fn open_metrics<B>(backend: &B, document: &Document) -> Result<MetricsStreamReader, ClientError>
where
    B: AnalysisBackend + ?Sized,
{
    info!(file = %document.name, bytes = document.size(), "Starting metrics stream");
    let source = backend.metrics_stream(document).await?;
    Ok(read_metrics(source))
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use futures::executor::block_on;
    use futures::stream::{self, StreamExt};

    #[test]
    fn test_events_in_order_with_error_event() {
        let body = concat!(
            "{\"type\":\"metricStart\",\"metric\":\"avg_length\"}\n",
            "{\"type\":\"metricComplete\",\"metric\":\"avg_length\",\"value\":12.5}\n",
            "{\"type\":\"metricStart\",\"metric\":\"self_repetition\"}\n",
            "{\"type\":\"metricError\",\"metric\":\"self_repetition\",\"error\":\"boom\"}\n",
        );
        let source = stream::iter(vec![Ok(Bytes::from_static(body.as_bytes()))]).boxed_local();

        let events: Vec<MetricEvent> = block_on(
            read_metrics(source)
                .into_stream()
                .map(|r| r.unwrap())
                .collect(),
        );

        let metrics: Vec<&str> = events.iter().map(|e| e.metric()).collect();
        assert_eq!(
            metrics,
            vec!["avg_length", "avg_length", "self_repetition", "self_repetition"]
        );
        assert!(matches!(
            &events[3],
            MetricEvent::Error { error: Some(msg), .. } if msg == "boom"
        ));
    }
}
