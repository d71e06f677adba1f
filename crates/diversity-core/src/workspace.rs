//! The application shell: two file slots, tabs and the analysis chooser

use std::fmt;
use std::rc::Rc;

use thiserror::Error;
use tracing::{info, warn};

use diversity_types::{Document, UploadError};

use crate::clock::Clock;
use crate::exact::{ExactFetch, ExactMatchesView};
use crate::explorer::{LoadOutcome, PatternExplorer, Selection};
use crate::metrics::{FileSlot, MetricsBoard, MetricsRun};
use crate::store::SessionStore;
use crate::templates::TemplateMatcher;

pub const NEEDS_UPLOAD_MESSAGE: &str = "Please upload a file in the Upload Text tab first";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Tab {
    #[default]
    Readme,
    Upload,
    Patterns,
    Exact,
    Metrics,
    Templates,
}

impl Tab {
    pub const ALL: [Tab; 6] = [
        Tab::Readme,
        Tab::Upload,
        Tab::Patterns,
        Tab::Exact,
        Tab::Metrics,
        Tab::Templates,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Tab::Readme => "readme",
            Tab::Upload => "upload",
            Tab::Patterns => "patterns",
            Tab::Exact => "exact",
            Tab::Metrics => "metrics",
            Tab::Templates => "templates",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.as_str() == s)
    }

    pub fn label(&self) -> &'static str {
        match self {
            Tab::Readme => "README",
            Tab::Upload => "Upload Text",
            Tab::Patterns => "Patterns",
            Tab::Exact => "Exact Matches",
            Tab::Metrics => "Metrics",
            Tab::Templates => "Templates",
        }
    }

    pub fn requires_upload(&self) -> bool {
        matches!(self, Tab::Patterns | Tab::Exact | Tab::Metrics)
    }
}

impl fmt::Display for Tab {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkspaceError {
    #[error("Please upload a file in the Upload Text tab first")]
    NeedsUpload,
}

/// A card in the "Choose Analysis Type" dialog
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnalysisOption {
    pub tab: Tab,
    pub title: &'static str,
    pub description: &'static str,
}

pub const ANALYSIS_OPTIONS: [AnalysisOption; 3] = [
    AnalysisOption {
        tab: Tab::Patterns,
        title: "POS Pattern Analysis",
        description: "Analyze syntactic patterns using Part-of-Speech tagging",
    },
    AnalysisOption {
        tab: Tab::Exact,
        title: "Exact Match Analysis",
        description: "Find repeated exact phrases and patterns in the text",
    },
    AnalysisOption {
        tab: Tab::Metrics,
        title: "Diversity Metrics",
        description: "Calculate and analyze text diversity metrics",
    },
];

/// Work the caller must drive after a tab switch
#[derive(Debug)]
pub enum TabActivation {
    Shown,
    Patterns(LoadOutcome),
    PatternLength(Selection),
    Exact(ExactFetch),
    Metrics(Vec<MetricsRun>),
}

pub struct Workspace<S, C> {
    files: [Option<Rc<Document>>; 2],
    active: Tab,
    chooser_open: bool,
    error: Option<String>,
    patterns_stale: bool,
    exact_stale: bool,
    explorer: PatternExplorer<S, C>,
    exact: ExactMatchesView,
    templates: TemplateMatcher,
    metrics: MetricsBoard,
}

fn slot_index(slot: FileSlot) -> usize {
    match slot {
        FileSlot::File1 => 0,
        FileSlot::File2 => 1,
    }
}

impl<S: SessionStore, C: Clock> Workspace<S, C> {
    pub fn new(store: S, clock: C) -> Self {
        Self {
            files: [None, None],
            active: Tab::default(),
            chooser_open: false,
            error: None,
            patterns_stale: false,
            exact_stale: false,
            explorer: PatternExplorer::new(store, clock),
            exact: ExactMatchesView::new(),
            templates: TemplateMatcher::new(),
            metrics: MetricsBoard::new(),
        }
    }

    /// Validate and store an uploaded file. On failure the slot is emptied.
    pub fn upload(
        &mut self,
        slot: FileSlot,
        name: &str,
        media_type: Option<&str>,
        bytes: Vec<u8>,
    ) -> Result<(), UploadError> {
        match Document::from_upload(name, media_type, bytes) {
            Ok(document) => {
                self.set_document(slot, document);
                Ok(())
            }
            Err(e) => {
                warn!(%slot, file = name, error = %e, "Upload rejected");
                self.files[slot_index(slot)] = None;
                self.metrics.reset(slot);
                self.mark_stale(slot);
                self.error = Some(e.to_string());
                Err(e)
            }
        }
    }

    /// Put an already-built document (dataset, example corpus) in a slot
    pub fn set_document(&mut self, slot: FileSlot, document: Document) {
        info!(%slot, file = %document.name, bytes = document.size(), "File loaded");
        self.files[slot_index(slot)] = Some(Rc::new(document));
        self.error = None;
        self.metrics.reset(slot);
        self.mark_stale(slot);
        self.chooser_open = true;
    }

    pub fn clear_document(&mut self, slot: FileSlot) {
        self.files[slot_index(slot)] = None;
        self.metrics.reset(slot);
        self.mark_stale(slot);
    }

    /// Results of the previous corpus are dropped at once, in-flight work
    /// included. The views reload on the next activation.
    fn mark_stale(&mut self, slot: FileSlot) {
        self.explorer.unload();
        self.patterns_stale = true;
        if slot == FileSlot::File1 {
            self.exact.unload();
            self.exact_stale = true;
        }
    }

    /// Reload the open analysis tab after a document change
    pub fn refresh_active(&mut self) -> TabActivation {
        match self.active {
            Tab::Patterns | Tab::Exact if self.has_upload() => self
                .select_tab(self.active)
                .unwrap_or(TabActivation::Shown),
            _ => TabActivation::Shown,
        }
    }

    pub fn document(&self, slot: FileSlot) -> Option<&Rc<Document>> {
        self.files[slot_index(slot)].as_ref()
    }

    pub fn has_upload(&self) -> bool {
        self.files[0].is_some()
    }

    /// Switch tabs. Leaving the pattern or exact tab cancels its request.
    pub fn select_tab(&mut self, tab: Tab) -> Result<TabActivation, WorkspaceError> {
        if tab.requires_upload() && !self.has_upload() {
            return Err(WorkspaceError::NeedsUpload);
        }

        if self.active != tab {
            match self.active {
                Tab::Patterns => self.explorer.deactivate(),
                Tab::Exact => self.exact.deactivate(),
                _ => {}
            }
        }
        self.active = tab;

        let Some(doc1) = self.files[0].clone() else {
            return Ok(TabActivation::Shown);
        };

        let activation = match tab {
            Tab::Patterns if self.patterns_stale => {
                self.patterns_stale = false;
                let doc2 = self.files[1].as_deref().cloned();
                TabActivation::Patterns(self.explorer.load_corpus((*doc1).clone(), doc2))
            }
            Tab::Patterns => match self.explorer.activate() {
                Some(selection) => TabActivation::PatternLength(selection),
                None => TabActivation::Shown,
            },
            Tab::Exact if self.exact_stale => {
                self.exact_stale = false;
                TabActivation::Exact(self.exact.set_document(doc1))
            }
            Tab::Exact => match self.exact.activate() {
                Some(fetch) => TabActivation::Exact(fetch),
                None => TabActivation::Shown,
            },
            Tab::Metrics => {
                let runs = FileSlot::ALL
                    .into_iter()
                    .filter_map(|slot| {
                        let document = Rc::clone(self.files[slot_index(slot)].as_ref()?);
                        Some(self.metrics.begin(slot, document))
                    })
                    .collect();
                TabActivation::Metrics(runs)
            }
            _ => TabActivation::Shown,
        };
        Ok(activation)
    }

    /// Pick a card in the analysis chooser
    pub fn choose_analysis(&mut self, tab: Tab) -> Result<TabActivation, WorkspaceError> {
        self.chooser_open = false;
        self.select_tab(tab)
    }

    pub fn chooser_open(&self) -> bool {
        self.chooser_open
    }

    pub fn close_chooser(&mut self) {
        self.chooser_open = false;
    }

    pub fn active_tab(&self) -> Tab {
        self.active
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

    pub fn explorer(&self) -> &PatternExplorer<S, C> {
        &self.explorer
    }

    pub fn explorer_mut(&mut self) -> &mut PatternExplorer<S, C> {
        &mut self.explorer
    }

    pub fn exact(&self) -> &ExactMatchesView {
        &self.exact
    }

    pub fn exact_mut(&mut self) -> &mut ExactMatchesView {
        &mut self.exact
    }

    pub fn templates(&self) -> &TemplateMatcher {
        &self.templates
    }

    pub fn templates_mut(&mut self) -> &mut TemplateMatcher {
        &mut self.templates
    }

    pub fn metrics(&self) -> &MetricsBoard {
        &self.metrics
    }

    pub fn metrics_mut(&mut self) -> &mut MetricsBoard {
        &mut self.metrics
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::explorer::Finished;
    use crate::store::MemoryStore;
    use crate::testing::FakeBackend;
    use futures::executor::block_on;
    use pretty_assertions::assert_eq;

    fn workspace() -> Workspace<MemoryStore, ManualClock> {
        Workspace::new(MemoryStore::new(), ManualClock::new(0))
    }

    #[test]
    fn test_analysis_tabs_need_upload() {
        let mut ws = workspace();
        for tab in [Tab::Patterns, Tab::Exact, Tab::Metrics] {
            assert_eq!(ws.select_tab(tab).unwrap_err(), WorkspaceError::NeedsUpload);
        }
        assert_eq!(ws.active_tab(), Tab::Readme);
        assert!(matches!(ws.select_tab(Tab::Templates), Ok(TabActivation::Shown)));
        assert_eq!(WorkspaceError::NeedsUpload.to_string(), NEEDS_UPLOAD_MESSAGE);
    }

    #[test]
    fn test_rejected_upload_clears_slot() {
        let mut ws = workspace();
        ws.upload(FileSlot::File1, "a.txt", Some("text/plain"), b"x\n".to_vec())
            .unwrap();
        let err = ws
            .upload(FileSlot::File1, "a.pdf", Some("application/pdf"), vec![1])
            .unwrap_err();
        assert!(matches!(err, UploadError::UnsupportedType { .. }));
        assert!(!ws.has_upload());
        assert_eq!(
            ws.error(),
            Some("Please upload a valid text file (.txt) or CSV file (.csv)")
        );
    }

    #[test]
    fn test_upload_opens_chooser_and_patterns_load_once() {
        let backend = FakeBackend::default();
        let mut ws = workspace();
        ws.upload(FileSlot::File1, "a.txt", None, b"one\ntwo\n".to_vec())
            .unwrap();
        assert!(ws.chooser_open());

        let Ok(TabActivation::Patterns(LoadOutcome::Fetch(pending))) =
            ws.choose_analysis(Tab::Patterns)
        else {
            panic!("expected the corpus to load");
        };
        assert!(!ws.chooser_open());
        let outcome = block_on(pending.execute(&backend));
        assert!(matches!(
            ws.explorer_mut().finish(outcome),
            Finished::Applied { .. }
        ));

        ws.select_tab(Tab::Upload).unwrap();
        assert!(matches!(ws.select_tab(Tab::Patterns), Ok(TabActivation::Shown)));
        assert_eq!(backend.pattern_calls.borrow().len(), 1);
    }

    #[test]
    fn test_second_file_reloads_patterns_but_not_exact() {
        let mut ws = workspace();
        ws.upload(FileSlot::File1, "a.txt", None, b"one\n".to_vec())
            .unwrap();
        assert!(matches!(ws.select_tab(Tab::Exact), Ok(TabActivation::Exact(_))));
        ws.select_tab(Tab::Patterns).unwrap();

        ws.upload(FileSlot::File2, "b.txt", None, b"two\n".to_vec())
            .unwrap();
        assert!(matches!(
            ws.select_tab(Tab::Patterns),
            Ok(TabActivation::Patterns(_))
        ));
        assert!(ws.explorer().corpus().unwrap().doc2.is_some());
    }

    #[test]
    fn test_document_change_on_patterns_tab_invalidates_everything() {
        let backend = FakeBackend::default();
        let mut ws = workspace();
        ws.upload(FileSlot::File1, "a.txt", None, b"one\ntwo\n".to_vec())
            .unwrap();
        let Ok(TabActivation::Patterns(LoadOutcome::Fetch(pending))) =
            ws.select_tab(Tab::Patterns)
        else {
            panic!("expected the corpus to load");
        };
        let outcome = block_on(pending.execute(&backend));
        ws.explorer_mut().finish(outcome);
        let Selection::Fetch(late) = ws.explorer_mut().select_length(5).unwrap() else {
            panic!("expected a fetch");
        };

        ws.upload(FileSlot::File1, "b.txt", None, b"red\ngreen\nblue\n".to_vec())
            .unwrap();
        assert!(ws.explorer().store().keys().is_empty());
        assert!(ws.explorer().loaded_lengths().is_empty());
        assert_eq!(
            ws.explorer_mut().select_length(4).unwrap_err(),
            crate::explorer::ExplorerError::NoCorpus
        );
        let outcome = block_on(late.execute(&backend));
        assert_eq!(ws.explorer_mut().finish(outcome), Finished::Discarded);

        let TabActivation::Patterns(LoadOutcome::Fetch(pending)) = ws.refresh_active() else {
            panic!("expected a reload for the new corpus");
        };
        assert_eq!(ws.explorer().corpus().unwrap().document_count(), 3);
        let outcome = block_on(pending.execute(&backend));
        assert!(matches!(
            ws.explorer_mut().finish(outcome),
            Finished::Applied { .. }
        ));
        assert_eq!(ws.explorer().view().displayed()[0].examples, vec!["red".to_string()]);
    }

    #[test]
    fn test_document_change_on_exact_tab_reloads() {
        let mut ws = workspace();
        ws.upload(FileSlot::File1, "a.txt", None, b"one\n".to_vec())
            .unwrap();
        let Ok(TabActivation::Exact(first)) = ws.select_tab(Tab::Exact) else {
            panic!("expected an exact fetch");
        };
        ws.upload(FileSlot::File1, "b.txt", None, b"two\n".to_vec())
            .unwrap();
        assert!(!ws.exact().is_loading());

        let TabActivation::Exact(second) = ws.refresh_active() else {
            panic!("expected an exact reload");
        };
        let backend = FakeBackend::default();
        assert!(!ws.exact_mut().finish(block_on(first.execute(&backend))));
        assert!(ws.exact_mut().finish(block_on(second.execute(&backend))));

        ws.clear_document(FileSlot::File1);
        assert!(matches!(ws.refresh_active(), TabActivation::Shown));
        assert!(ws.exact().matches().is_empty());
    }

    #[test]
    fn test_metrics_tab_runs_loaded_slots() {
        let mut ws = workspace();
        ws.upload(FileSlot::File1, "a.txt", None, b"one\n".to_vec())
            .unwrap();
        let Ok(TabActivation::Metrics(runs)) = ws.select_tab(Tab::Metrics) else {
            panic!("expected metric runs");
        };
        assert_eq!(runs.len(), 1);
        assert_eq!(runs[0].slot(), FileSlot::File1);

        ws.upload(FileSlot::File2, "b.txt", None, b"two\n".to_vec())
            .unwrap();
        let Ok(TabActivation::Metrics(runs)) = ws.select_tab(Tab::Metrics) else {
            panic!("expected metric runs");
        };
        assert_eq!(runs.len(), 2);
    }

    #[test]
    fn test_tab_names() {
        for tab in Tab::ALL {
            assert_eq!(Tab::parse(tab.as_str()), Some(tab));
        }
        assert_eq!(ANALYSIS_OPTIONS[1].title, "Exact Match Analysis");
    }
}
