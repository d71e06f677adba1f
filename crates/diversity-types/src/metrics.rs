//! Diversity metric events streamed from `POST /analyze/metrics`

use std::fmt;

use serde::de::{self, Deserializer, Visitor};
use serde::{Deserialize, Serialize, Serializer};

/// Numeric metric value that may be non-finite.
///
/// The backend writes `Infinity`, `-Infinity` and `NaN` as quoted sentinels
/// (the stream reader quotes bare ones before parsing). `null` is read as NaN.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MetricValue(pub f64);

impl MetricValue {
    pub fn get(&self) -> f64 {
        self.0
    }

    pub fn parse_sentinel(s: &str) -> Option<f64> {
        match s.trim() {
            "Infinity" | "+Infinity" => Some(f64::INFINITY),
            "-Infinity" => Some(f64::NEG_INFINITY),
            "NaN" => Some(f64::NAN),
            other => other.parse().ok(),
        }
    }
}

impl From<f64> for MetricValue {
    fn from(v: f64) -> Self {
        MetricValue(v)
    }
}

impl Serialize for MetricValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let v = self.0;
        if v.is_nan() {
            serializer.serialize_str("NaN")
        } else if v == f64::INFINITY {
            serializer.serialize_str("Infinity")
        } else if v == f64::NEG_INFINITY {
            serializer.serialize_str("-Infinity")
        } else {
            serializer.serialize_f64(v)
        }
    }
}

impl<'de> Deserialize<'de> for MetricValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct ValueVisitor;

        impl<'de> Visitor<'de> for ValueVisitor {
            type Value = MetricValue;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a number, null, or one of \"Infinity\", \"-Infinity\", \"NaN\"")
            }

            fn visit_f64<E: de::Error>(self, v: f64) -> Result<MetricValue, E> {
                Ok(MetricValue(v))
            }

            fn visit_i64<E: de::Error>(self, v: i64) -> Result<MetricValue, E> {
                Ok(MetricValue(v as f64))
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> Result<MetricValue, E> {
                Ok(MetricValue(v as f64))
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<MetricValue, E> {
                MetricValue::parse_sentinel(v)
                    .map(MetricValue)
                    .ok_or_else(|| E::invalid_value(de::Unexpected::Str(v), &self))
            }

            fn visit_unit<E: de::Error>(self) -> Result<MetricValue, E> {
                Ok(MetricValue(f64::NAN))
            }

            fn visit_none<E: de::Error>(self) -> Result<MetricValue, E> {
                Ok(MetricValue(f64::NAN))
            }
        }

        deserializer.deserialize_any(ValueVisitor)
    }
}

/// One line of the metrics stream
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum MetricEvent {
    #[serde(rename = "metricStart")]
    Start { metric: String },

    #[serde(rename = "metricComplete")]
    Complete { metric: String, value: MetricValue },

    #[serde(rename = "metricError")]
    Error {
        metric: String,
        #[serde(default)]
        error: Option<String>,
    },
}

impl MetricEvent {
    pub fn metric(&self) -> &str {
        match self {
            MetricEvent::Start { metric }
            | MetricEvent::Complete { metric, .. }
            | MetricEvent::Error { metric, .. } => metric,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricSection {
    Text,
    Diversity,
}

/// Metrics the backend is known to emit, in display order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum MetricKey {
    NTexts,
    AvgLength,
    VarLength,
    CompressionRatio,
    CompressionPos,
    SelfRepetition,
}

impl MetricKey {
    pub const ALL: [MetricKey; 6] = [
        MetricKey::NTexts,
        MetricKey::AvgLength,
        MetricKey::VarLength,
        MetricKey::CompressionRatio,
        MetricKey::CompressionPos,
        MetricKey::SelfRepetition,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            MetricKey::NTexts => "n_texts",
            MetricKey::AvgLength => "avg_length",
            MetricKey::VarLength => "var_length",
            MetricKey::CompressionRatio => "compression_ratio",
            MetricKey::CompressionPos => "compression_pos",
            MetricKey::SelfRepetition => "self_repetition",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.as_str() == s)
    }

    pub fn label(&self) -> &'static str {
        match self {
            MetricKey::NTexts => "Num. Documents",
            MetricKey::AvgLength => "Mean Num. Words",
            MetricKey::VarLength => "Variance Num. Words",
            MetricKey::CompressionRatio => "Compression Ratio",
            MetricKey::CompressionPos => "POS Compression",
            MetricKey::SelfRepetition => "Self-Repetition",
        }
    }

    pub fn section(&self) -> MetricSection {
        match self {
            MetricKey::NTexts | MetricKey::AvgLength | MetricKey::VarLength => MetricSection::Text,
            _ => MetricSection::Diversity,
        }
    }
}

/// Help text for the metrics panel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MetricDescriptor {
    pub name: &'static str,
    pub description: &'static str,
    pub interpretation: &'static str,
}

impl MetricDescriptor {
    pub const ALL: [MetricDescriptor; 4] = [
        MetricDescriptor {
            name: "Compression Ratio",
            description: "Measures text redundancy using compression algorithms. Higher values indicate more repetitive/templated text.",
            interpretation: "Higher values indicate more redundancy, meaning the text contains many repeated sequences that can be compressed.",
        },
        MetricDescriptor {
            name: "POS Compression Ratio",
            description: "Measures redundancy in syntactic patterns by compressing sequences of part-of-speech (POS) tags.",
            interpretation: "Higher values indicate repetitive syntactic patterns and similar sentence structures.",
        },
        MetricDescriptor {
            name: "Self-BLEU",
            description: "Measures similarity between different outputs by using one output as a reference.",
            interpretation: "Lower values suggest greater diversity, which is desirable for creative tasks.",
        },
        MetricDescriptor {
            name: "Self-Repetition Score",
            description: "Measures how often long n-grams are repeated across different outputs.",
            interpretation: "Lower values indicate the text avoids repetitive patterns and is more original.",
        },
    ];
}
