//! Plain serializable copies of the workspace state for the page to render

use serde::Serialize;

use diversity_core::exact::fragment_html;
use diversity_core::sampling::sampling_options;
use diversity_core::{
    Clock, DocSide, FileSlot, LengthStatus, MetricDisplay, SessionStore, Workspace,
};
use diversity_types::{MetricKey, MetricSection, PATTERN_LENGTHS};

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FileSnapshot {
    pub slot: &'static str,
    pub name: String,
    pub size: u64,
    pub document_count: usize,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LengthButton {
    pub length: u8,
    /// `loading`, `active`, `loaded` or `idle`
    pub status: &'static str,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SamplingCard {
    pub mode: &'static str,
    pub title: &'static str,
    pub description: &'static str,
    pub estimate: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SamplingSnapshot {
    pub enabled: bool,
    pub mode: &'static str,
    pub modal_open: bool,
    pub initiated: bool,
    pub options: Vec<SamplingCard>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PatternRow {
    pub pattern: String,
    pub examples: Vec<String>,
    pub frequency: usize,
    pub color: &'static str,
    pub selected: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PatternsSnapshot {
    pub status_line: String,
    pub loading: bool,
    pub active_length: u8,
    pub lengths: Vec<LengthButton>,
    pub filter: &'static str,
    pub sampling: SamplingSnapshot,
    pub sampling_info: Option<String>,
    pub patterns: Vec<PatternRow>,
    pub doc1_html: Vec<String>,
    pub doc2_html: Vec<String>,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExactRow {
    pub text: String,
    pub count: usize,
    pub examples_html: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExactSnapshot {
    pub loading: bool,
    pub min_length: u8,
    pub min_occurrences: usize,
    pub summary: String,
    pub matches: Vec<ExactRow>,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricCell {
    pub key: &'static str,
    pub label: &'static str,
    pub section: &'static str,
    /// `calculating`, `missing` or `value`
    pub state: &'static str,
    pub value: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsFile {
    pub slot: &'static str,
    pub title: &'static str,
    pub cells: Vec<MetricCell>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ComparisonBar {
    pub name: &'static str,
    pub file1: Option<f64>,
    pub file2: Option<f64>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsSnapshot {
    pub any_loading: bool,
    pub files: Vec<MetricsFile>,
    pub comparison: Vec<ComparisonBar>,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TemplatePatternItem {
    pub pattern: String,
    pub selected: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelSection {
    pub model: String,
    pub color: &'static str,
    pub open: bool,
    pub patterns: Vec<TemplatePatternItem>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CoverageBar {
    pub model: String,
    pub color: &'static str,
    pub label: String,
    pub bar_width: f64,
    pub highlighted: bool,
    pub found: usize,
    pub known: usize,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PopoverItem {
    pub pattern: String,
    pub text: String,
    pub models: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TemplatesSnapshot {
    pub input: String,
    pub can_analyze: bool,
    pub loading: bool,
    pub highlighted_html: String,
    pub sections: Vec<ModelSection>,
    pub coverage: Vec<CoverageBar>,
    pub popover: Vec<PopoverItem>,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkspaceSnapshot {
    pub active_tab: &'static str,
    pub has_upload: bool,
    pub chooser_open: bool,
    pub error: Option<String>,
    pub files: Vec<FileSnapshot>,
    pub patterns: PatternsSnapshot,
    pub exact: ExactSnapshot,
    pub metrics: MetricsSnapshot,
    pub templates: TemplatesSnapshot,
}

fn status_name(status: LengthStatus) -> &'static str {
    match status {
        LengthStatus::Loading => "loading",
        LengthStatus::Active => "active",
        LengthStatus::Loaded => "loaded",
        LengthStatus::Idle => "idle",
    }
}

fn section_name(section: MetricSection) -> &'static str {
    match section {
        MetricSection::Text => "text",
        MetricSection::Diversity => "diversity",
    }
}

fn patterns<S: SessionStore, C: Clock>(w: &Workspace<S, C>) -> PatternsSnapshot {
    let explorer = w.explorer();
    let view = explorer.view();
    let sampling = explorer.sampling();
    let document_count = explorer.corpus().map_or(0, |c| c.document_count());

    PatternsSnapshot {
        status_line: explorer.status_line(),
        loading: explorer.is_loading(),
        active_length: explorer.active_length(),
        lengths: PATTERN_LENGTHS
            .map(|length| LengthButton {
                length,
                status: status_name(explorer.length_status(length)),
            })
            .collect(),
        filter: view.filter().as_str(),
        sampling: SamplingSnapshot {
            enabled: sampling.enabled,
            mode: sampling.mode.as_str(),
            modal_open: sampling.modal_open,
            initiated: sampling.initiated,
            options: sampling_options(document_count)
                .into_iter()
                .map(|o| SamplingCard {
                    mode: o.mode.as_str(),
                    title: o.title,
                    description: o.description,
                    estimate: o.estimate,
                })
                .collect(),
        },
        sampling_info: view.result().sampling_info.clone(),
        patterns: view
            .displayed()
            .into_iter()
            .map(|p| PatternRow {
                pattern: p.pattern,
                examples: p.examples,
                frequency: p.frequency,
                color: p.color,
                selected: p.selected,
            })
            .collect(),
        doc1_html: view.highlighted_documents(DocSide::Doc1),
        doc2_html: view.highlighted_documents(DocSide::Doc2),
        error: explorer.error().map(str::to_string),
    }
}

fn exact<S: SessionStore, C: Clock>(w: &Workspace<S, C>) -> ExactSnapshot {
    let exact = w.exact();
    ExactSnapshot {
        loading: exact.is_loading(),
        min_length: exact.min_length(),
        min_occurrences: exact.min_occurrences(),
        summary: exact.summary(),
        matches: exact
            .matches()
            .iter()
            .map(|m| ExactRow {
                text: m.text.clone(),
                count: m.count,
                examples_html: m
                    .examples
                    .iter()
                    .map(|example| fragment_html(example, &m.text))
                    .collect(),
            })
            .collect(),
        error: exact.error().map(str::to_string),
    }
}

fn metrics<S: SessionStore, C: Clock>(w: &Workspace<S, C>) -> MetricsSnapshot {
    let board = w.metrics();
    let files = FileSlot::ALL
        .into_iter()
        .filter(|&slot| w.document(slot).is_some())
        .map(|slot| MetricsFile {
            slot: slot.as_str(),
            title: slot.title(),
            cells: MetricKey::ALL
                .into_iter()
                .map(|key| {
                    let (state, value) = match board.display(slot, key) {
                        MetricDisplay::Calculating => ("calculating", None),
                        MetricDisplay::Missing => ("missing", None),
                        MetricDisplay::Value(v) => ("value", Some(v)),
                    };
                    MetricCell {
                        key: key.as_str(),
                        label: key.label(),
                        section: section_name(key.section()),
                        state,
                        value,
                    }
                })
                .collect(),
        })
        .collect();

    MetricsSnapshot {
        any_loading: board.any_loading(),
        files,
        comparison: board
            .comparison()
            .into_iter()
            .map(|row| ComparisonBar {
                name: row.name,
                file1: row.file1,
                file2: row.file2,
            })
            .collect(),
        error: board.error().map(str::to_string),
    }
}

fn templates<S: SessionStore, C: Clock>(w: &Workspace<S, C>) -> TemplatesSnapshot {
    let matcher = w.templates();
    let sections = matcher
        .colors()
        .iter()
        .map(|(model, color)| ModelSection {
            model: model.to_string(),
            color,
            open: matcher.is_open(model),
            patterns: matcher
                .catalog()
                .get(model)
                .into_iter()
                .flatten()
                .map(|pattern| TemplatePatternItem {
                    pattern: pattern.clone(),
                    selected: matcher.is_selected(pattern),
                })
                .collect(),
        })
        .collect();

    TemplatesSnapshot {
        input: matcher.input().to_string(),
        can_analyze: matcher.can_analyze(),
        loading: matcher.is_loading(),
        highlighted_html: matcher.highlighted_html(),
        sections,
        coverage: matcher
            .coverage()
            .into_iter()
            .map(|row| CoverageBar {
                model: row.model,
                color: row.color,
                label: row.label,
                bar_width: row.bar_width,
                highlighted: row.highlighted,
                found: row.found,
                known: row.known,
            })
            .collect(),
        popover: matcher
            .popover_entries()
            .into_iter()
            .map(|e| PopoverItem {
                pattern: e.pattern,
                text: e.text,
                models: e.models,
            })
            .collect(),
        error: matcher.error().map(str::to_string),
    }
}

impl WorkspaceSnapshot {
    pub fn capture<S: SessionStore, C: Clock>(w: &Workspace<S, C>) -> Self {
        Self {
            active_tab: w.active_tab().as_str(),
            has_upload: w.has_upload(),
            chooser_open: w.chooser_open(),
            error: w.error().map(str::to_string),
            files: FileSlot::ALL
                .into_iter()
                .filter_map(|slot| {
                    let doc = w.document(slot)?;
                    Some(FileSnapshot {
                        slot: slot.as_str(),
                        name: doc.name.clone(),
                        size: doc.size(),
                        document_count: doc.document_count(),
                    })
                })
                .collect(),
            patterns: patterns(w),
            exact: exact(w),
            metrics: metrics(w),
            templates: templates(w),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use diversity_core::{ManualClock, MemoryStore};
    use pretty_assertions::assert_eq;

    #[test]
    fn test_empty_workspace() {
        let w = Workspace::new(MemoryStore::new(), ManualClock::new(0));
        let snapshot = WorkspaceSnapshot::capture(&w);
        assert_eq!(snapshot.active_tab, "readme");
        assert!(!snapshot.has_upload);
        assert!(snapshot.files.is_empty());
        assert!(snapshot.metrics.files.is_empty());
        assert_eq!(snapshot.patterns.lengths.len(), 9);
        let marked: Vec<(u8, &str)> = snapshot
            .patterns
            .lengths
            .iter()
            .filter(|b| b.status != "idle")
            .map(|b| (b.length, b.status))
            .collect();
        assert_eq!(marked, vec![(4, "active")]);
        assert_eq!(snapshot.patterns.status_line, "Select a pattern length");
    }

    #[test]
    fn test_camel_case_json() {
        let mut w = Workspace::new(MemoryStore::new(), ManualClock::new(0));
        w.upload(FileSlot::File1, "a.txt", Some("text/plain"), b"x\ny\n".to_vec())
            .unwrap();
        let json = serde_json::to_value(WorkspaceSnapshot::capture(&w)).unwrap();
        assert_eq!(json["hasUpload"], true);
        assert_eq!(json["files"][0]["documentCount"], 2);
        assert_eq!(json["metrics"]["files"][0]["cells"].as_array().unwrap().len(), 6);
        assert_eq!(json["exact"]["minLength"], 3);
    }
}
