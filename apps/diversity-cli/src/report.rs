//! Plain-text rendering of analysis results

use std::fmt::Write;

use diversity_core::templates::CoverageRow;
use diversity_core::view::DisplayedPattern;
use diversity_core::{ExactMatch, FileSlot, MetricDisplay, MetricsBoard, ModelColors};
use diversity_types::{pos_tag_meaning, DatasetKind, MetricKey, CATEGORIES};

const MAX_EXAMPLES: usize = 3;

pub fn patterns(rows: &[DisplayedPattern], status: &str) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{}", status);
    for row in rows {
        let tags: Vec<String> = row
            .pattern
            .split_whitespace()
            .map(|tag| match pos_tag_meaning(tag) {
                Some(meaning) => format!("{} ({})", tag, meaning),
                None => tag.to_string(),
            })
            .collect();
        let _ = writeln!(out, "\n{:>5}x  {}", row.frequency, row.pattern);
        let _ = writeln!(out, "        {}", tags.join(" "));
        for example in row.examples.iter().take(MAX_EXAMPLES) {
            let _ = writeln!(out, "        - {}", example);
        }
    }
    out
}

pub fn exact(matches: &[ExactMatch], summary: &str) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{}", summary);
    if matches.is_empty() {
        let _ = writeln!(out, "No repeated phrases found");
        return out;
    }
    for m in matches {
        let _ = writeln!(out, "\n{:>5} docs  \"{}\"", m.count, m.text);
        for example in m.examples.iter().take(MAX_EXAMPLES) {
            let _ = writeln!(out, "        - {}", example);
        }
    }
    out
}

fn cell(display: MetricDisplay) -> String {
    match display {
        MetricDisplay::Calculating => "...".to_string(),
        MetricDisplay::Missing => "-".to_string(),
        MetricDisplay::Value(v) => v,
    }
}

pub fn metrics(board: &MetricsBoard, slots: &[FileSlot]) -> String {
    let mut out = String::new();
    let _ = write!(out, "{:<28}", "Metric");
    for slot in slots {
        let _ = write!(out, "{:>14}", slot.title());
    }
    out.push('\n');
    for key in MetricKey::ALL {
        let _ = write!(out, "{:<28}", key.label());
        for &slot in slots {
            let _ = write!(out, "{:>14}", cell(board.display(slot, key)));
        }
        out.push('\n');
    }
    if let Some(error) = board.error() {
        let _ = writeln!(out, "\n{}", error);
    }
    out
}

pub fn coverage(rows: &[CoverageRow]) -> String {
    let mut out = String::new();
    for row in rows {
        let marker = if row.highlighted { "*" } else { " " };
        let _ = writeln!(
            out,
            "{} {:<20} {:<18} {} of {} templates",
            marker, row.model, row.label, row.found, row.known
        );
    }
    out
}

pub fn models(colors: &ModelColors) -> String {
    let mut out = String::new();
    for (model, class) in colors.iter() {
        let _ = writeln!(out, "{:<24} {}", model, class);
    }
    out
}

pub fn datasets() -> String {
    let mut out = String::new();
    for category in CATEGORIES {
        let _ = writeln!(out, "{:<16} {}", category.id, category.name);
        if let DatasetKind::Collection { datasets } = category.kind {
            for dataset in datasets {
                let _ = writeln!(out, "    {:<24} {}", dataset.id, dataset.name);
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_pattern_rows_expand_tags() {
        let rows = vec![DisplayedPattern {
            pattern: "DET NOUN".into(),
            examples: vec!["the cat".into(), "a dog".into()],
            frequency: 2,
            color: "bg-blue-200",
            selected: true,
        }];
        let text = patterns(&rows, "1 patterns found");
        assert!(text.starts_with("1 patterns found\n"));
        assert!(text.contains("    2x  DET NOUN"));
        assert!(text.contains("DET (Determiner (a, an, the))"));
        assert!(text.contains("- a dog"));
    }

    #[test]
    fn test_exact_empty() {
        assert_eq!(
            exact(&[], "summary"),
            "summary\nNo repeated phrases found\n"
        );
    }

    #[test]
    fn test_metrics_table_has_row_per_metric() {
        let board = MetricsBoard::new();
        let table = metrics(&board, &[FileSlot::File1]);
        assert_eq!(table.lines().count(), 1 + MetricKey::ALL.len());
    }

    #[test]
    fn test_dataset_listing_names_collections() {
        let text = datasets();
        assert!(text.contains("cnn_gpt4"));
    }
}
