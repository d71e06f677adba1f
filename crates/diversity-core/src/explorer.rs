//! Pattern explorer: corpus, sampling gate, per-length cache and the one
//! request allowed in flight.
//!
//! Fetching is split in three steps so no borrow of the explorer is held
//! across an await:
//!
//! ```ignore
//! if let Selection::Fetch(pending) = explorer.select_length(5)? {
//!     let outcome = pending.execute(&backend).await;
//!     explorer.finish(outcome);
//! }
//! ```

use std::collections::BTreeSet;
use std::rc::Rc;

use thiserror::Error;
use tracing::{debug, info, warn};

use diversity_client::{AnalysisBackend, ClientError};
use diversity_types::{
    Document, DocumentFingerprint, MatchMode, PatternRequest, PatternResult, SamplingMode,
    DEFAULT_PATTERN_LENGTH, PATTERN_LENGTHS,
};

use crate::cache::{CacheKey, CacheSource, PatternCache};
use crate::clock::Clock;
use crate::lifecycle::{RequestLifecycle, RequestTicket, Settled};
use crate::sampling::SamplingState;
use crate::store::SessionStore;
use crate::view::PatternView;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExplorerError {
    #[error("Pattern length must be between 2 and 10, got {0}")]
    InvalidLength(u8),

    #[error("No file uploaded")]
    NoCorpus,

    #[error("Choose a sampling strategy before analysing")]
    AnalysisNotStarted,
}

/// The one or two documents under analysis
#[derive(Debug, Clone)]
pub struct Corpus {
    pub doc1: Rc<Document>,
    pub doc2: Option<Rc<Document>>,
    fingerprint: DocumentFingerprint,
}

impl Corpus {
    pub fn new(doc1: Document, doc2: Option<Document>) -> Self {
        let mut fingerprint = doc1.fingerprint();
        if let Some(doc2) = &doc2 {
            fingerprint.digest = format!("{}:{}", fingerprint.digest, doc2.fingerprint().digest);
        }
        Self {
            doc1: Rc::new(doc1),
            doc2: doc2.map(Rc::new),
            fingerprint,
        }
    }

    /// Cache identity: first document's count plus the digest of both
    pub fn fingerprint(&self) -> &DocumentFingerprint {
        &self.fingerprint
    }

    pub fn document_count(&self) -> usize {
        self.fingerprint.document_count
    }
}

/// A request the caller must drive with [`PendingFetch::execute`]
#[derive(Debug)]
pub struct PendingFetch {
    ticket: RequestTicket,
    key: CacheKey,
    sampling_mode: SamplingMode,
    doc1: Rc<Document>,
    doc2: Option<Rc<Document>>,
    request: PatternRequest,
}

#[derive(Debug)]
pub struct FetchOutcome {
    key: CacheKey,
    sampling_mode: SamplingMode,
    settled: Settled<Result<PatternResult, ClientError>>,
}

impl PendingFetch {
    pub fn key(&self) -> CacheKey {
        self.key
    }

    pub fn request(&self) -> &PatternRequest {
        &self.request
    }

    pub fn generation(&self) -> u64 {
        self.ticket.generation()
    }

    pub async fn execute<B>(self, backend: &B) -> FetchOutcome
    where
        B: AnalysisBackend + ?Sized,
    {
        let PendingFetch {
            ticket,
            key,
            sampling_mode,
            doc1,
            doc2,
            request,
        } = self;

        info!(%key, sampling = %sampling_mode, "Analyzing patterns");
        let settled = ticket
            .run(backend.analyze_patterns(&doc1, doc2.as_deref(), &request))
            .await;

        FetchOutcome {
            key,
            sampling_mode,
            settled,
        }
    }
}

#[derive(Debug)]
pub enum LoadOutcome {
    /// Large corpus: the sampling dialog is open and nothing was sent
    AwaitingSampling,
    Fetch(PendingFetch),
}

#[derive(Debug)]
pub enum Selection {
    Served { source: CacheSource },
    Fetch(PendingFetch),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Finished {
    Applied { key: CacheKey },
    /// Superseded or cancelled; nothing changed
    Discarded,
    Failed(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LengthStatus {
    Loading,
    Active,
    Loaded,
    Idle,
}

pub struct PatternExplorer<S, C> {
    cache: PatternCache<S>,
    clock: C,
    lifecycle: RequestLifecycle,
    corpus: Option<Corpus>,
    sampling: SamplingState,
    match_mode: MatchMode,
    active_length: u8,
    loading_length: Option<u8>,
    loaded: BTreeSet<u8>,
    view: PatternView,
    error: Option<String>,
}

impl<S: SessionStore, C: Clock> PatternExplorer<S, C> {
    pub fn new(store: S, clock: C) -> Self {
        Self {
            cache: PatternCache::new(store),
            clock,
            lifecycle: RequestLifecycle::new(),
            corpus: None,
            sampling: SamplingState::default(),
            match_mode: MatchMode::Pos,
            active_length: DEFAULT_PATTERN_LENGTH,
            loading_length: None,
            loaded: BTreeSet::new(),
            view: PatternView::new(),
            error: None,
        }
    }

    /// Replace the corpus. Everything cached for the previous one is dropped.
    pub fn load_corpus(&mut self, doc1: Document, doc2: Option<Document>) -> LoadOutcome {
        self.reset_results();
        self.error = None;
        self.active_length = DEFAULT_PATTERN_LENGTH;

        let corpus = Corpus::new(doc1, doc2);
        let count = corpus.document_count();
        self.sampling = SamplingState::for_corpus(count);
        self.corpus = Some(corpus);

        if self.sampling.initiated {
            debug!(documents = count, "Small corpus, analysing in full");
            match self.start_fetch(DEFAULT_PATTERN_LENGTH) {
                Some(pending) => LoadOutcome::Fetch(pending),
                None => LoadOutcome::AwaitingSampling,
            }
        } else {
            info!(documents = count, "Large dataset detected");
            LoadOutcome::AwaitingSampling
        }
    }

    /// Start (or restart) analysis with a sampling mode from the dialog
    pub fn apply_sampling(&mut self, mode: SamplingMode) -> Result<PendingFetch, ExplorerError> {
        if self.corpus.is_none() {
            return Err(ExplorerError::NoCorpus);
        }

        self.sampling.mode = mode;
        self.sampling.modal_open = false;
        self.sampling.initiated = true;
        self.reset_results();
        self.active_length = DEFAULT_PATTERN_LENGTH;

        self.start_fetch(DEFAULT_PATTERN_LENGTH)
            .ok_or(ExplorerError::NoCorpus)
    }

    pub fn open_sampling_modal(&mut self) {
        if self.corpus.is_some() {
            self.sampling.modal_open = true;
        }
    }

    pub fn dismiss_sampling_modal(&mut self) {
        self.sampling.modal_open = false;
    }

    /// Show a pattern length, from cache if possible.
    ///
    /// A fetch supersedes any request still in flight.
    pub fn select_length(&mut self, length: u8) -> Result<Selection, ExplorerError> {
        if !PATTERN_LENGTHS.contains(&length) {
            return Err(ExplorerError::InvalidLength(length));
        }
        let fingerprint = match &self.corpus {
            Some(corpus) => corpus.fingerprint().clone(),
            None => return Err(ExplorerError::NoCorpus),
        };
        if !self.sampling.initiated {
            return Err(ExplorerError::AnalysisNotStarted);
        }

        self.active_length = length;
        let key = CacheKey::new(length, self.match_mode);
        let now = self.clock.now_ms();

        if let Some((source, result)) =
            self.cache
                .lookup(key, &fingerprint, self.sampling.mode, now)
        {
            self.lifecycle.cancel();
            self.loading_length = None;
            self.loaded.insert(length);
            self.view.set_result(result);
            return Ok(Selection::Served { source });
        }

        self.start_fetch(length)
            .map(Selection::Fetch)
            .ok_or(ExplorerError::NoCorpus)
    }

    fn start_fetch(&mut self, length: u8) -> Option<PendingFetch> {
        let corpus = self.corpus.as_ref()?;
        let key = CacheKey::new(length, self.match_mode);
        let ticket = self.lifecycle.begin(format!("patterns {}", key));
        self.loading_length = Some(length);

        Some(PendingFetch {
            ticket,
            key,
            sampling_mode: self.sampling.mode,
            doc1: Rc::clone(&corpus.doc1),
            doc2: corpus.doc2.clone(),
            request: PatternRequest::new(length, self.match_mode).with_sampling(self.sampling.mode),
        })
    }

    /// Apply a finished fetch if it is still the current request
    pub fn finish(&mut self, outcome: FetchOutcome) -> Finished {
        let FetchOutcome {
            key,
            sampling_mode,
            settled,
        } = outcome;

        if !self.lifecycle.settle(settled.generation()) {
            debug!(%key, "Discarding superseded pattern result");
            return Finished::Discarded;
        }
        self.loading_length = None;

        match settled {
            Settled::Cancelled { .. } => Finished::Discarded,
            Settled::Completed { value: Ok(result), .. } => {
                let Some(corpus) = &self.corpus else {
                    return Finished::Discarded;
                };
                if result.was_sampled {
                    self.sampling.enabled = true;
                    if let Some(info) = &result.sampling_info {
                        info!(%info, "Server used sampling");
                    }
                }
                let now = self.clock.now_ms();
                self.cache
                    .insert(key, &result, corpus.fingerprint(), sampling_mode, now);
                self.loaded.insert(key.pattern_length);
                if key.pattern_length == self.active_length {
                    self.view.set_result(result);
                }
                Finished::Applied { key }
            }
            Settled::Completed { value: Err(e), .. } => {
                warn!(%key, error = %e, "Pattern analysis failed");
                let message = e.user_message();
                self.error = Some(message.clone());
                Finished::Failed(message)
            }
        }
    }

    /// The tab was switched away; stop the in-flight request
    pub fn deactivate(&mut self) {
        if self.lifecycle.cancel() {
            info!("Aborting pattern analysis - tab switched");
        }
        self.loading_length = None;
    }

    /// Back on the tab: reload the active length if it never arrived
    pub fn activate(&mut self) -> Option<Selection> {
        if self.corpus.is_none() || !self.sampling.initiated || self.lifecycle.is_busy() {
            return None;
        }
        if self.loaded.contains(&self.active_length) {
            return None;
        }
        self.select_length(self.active_length).ok()
    }

    /// The source documents changed: drop the corpus and everything derived
    /// from it. Nothing can be selected until the next `load_corpus`.
    pub fn unload(&mut self) {
        self.reset_results();
        self.corpus = None;
        self.sampling = SamplingState::default();
        self.active_length = DEFAULT_PATTERN_LENGTH;
        self.error = None;
    }

    fn reset_results(&mut self) {
        self.lifecycle.cancel();
        self.loading_length = None;
        self.cache.clear();
        self.loaded.clear();
        self.view.clear();
    }

    pub fn length_status(&self, length: u8) -> LengthStatus {
        if self.loading_length == Some(length) {
            LengthStatus::Loading
        } else if self.active_length == length {
            LengthStatus::Active
        } else if self.loaded.contains(&length) {
            LengthStatus::Loaded
        } else {
            LengthStatus::Idle
        }
    }

    /// Summary shown next to the length buttons
    pub fn status_line(&self) -> String {
        if self.is_loading() {
            return "Processing...".to_string();
        }
        match self.view.displayed().len() {
            0 => "Select a pattern length".to_string(),
            n => format!("{} patterns found", n),
        }
    }

    pub fn is_loading(&self) -> bool {
        self.loading_length.is_some()
    }

    pub fn active_length(&self) -> u8 {
        self.active_length
    }

    pub fn loaded_lengths(&self) -> &BTreeSet<u8> {
        &self.loaded
    }

    pub fn corpus(&self) -> Option<&Corpus> {
        self.corpus.as_ref()
    }

    pub fn sampling(&self) -> &SamplingState {
        &self.sampling
    }

    pub fn view(&self) -> &PatternView {
        &self.view
    }

    pub fn view_mut(&mut self) -> &mut PatternView {
        &mut self.view
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn dismiss_error(&mut self) {
        self.error = None;
    }

    pub fn store(&self) -> &S {
        self.cache.store()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::FRESHNESS_MS;
    use crate::clock::ManualClock;
    use crate::store::MemoryStore;
    use crate::testing::{pattern_for_length, FakeBackend};
    use futures::executor::block_on;
    use pretty_assertions::assert_eq;

    type Explorer = PatternExplorer<MemoryStore, ManualClock>;

    fn explorer() -> (Explorer, MemoryStore, ManualClock) {
        let store = MemoryStore::new();
        let clock = ManualClock::new(1_000_000);
        (PatternExplorer::new(store.clone(), clock.clone()), store, clock)
    }

    fn corpus(lines: usize) -> Document {
        let text: String = (0..lines).map(|i| format!("sentence number {}\n", i)).collect();
        Document::from_text("corpus.txt", text)
    }

    fn run(explorer: &mut Explorer, backend: &FakeBackend, pending: PendingFetch) -> Finished {
        let outcome = block_on(pending.execute(backend));
        explorer.finish(outcome)
    }

    fn shown(explorer: &Explorer) -> Vec<String> {
        explorer
            .view()
            .displayed()
            .into_iter()
            .map(|p| p.pattern)
            .collect()
    }

    #[test]
    fn test_small_corpus_starts_immediately() {
        let (mut explorer, _, _) = explorer();
        let backend = FakeBackend::default();

        let LoadOutcome::Fetch(pending) = explorer.load_corpus(corpus(100), None) else {
            panic!("expected a fetch");
        };
        assert_eq!(pending.request().sampling_mode, Some(SamplingMode::Full));
        assert_eq!(explorer.length_status(4), LengthStatus::Loading);

        assert_eq!(
            run(&mut explorer, &backend, pending),
            Finished::Applied {
                key: CacheKey::new(4, MatchMode::Pos)
            }
        );
        assert_eq!(shown(&explorer), vec![pattern_for_length(4)]);
        assert_eq!(explorer.length_status(4), LengthStatus::Active);
        assert_eq!(explorer.status_line(), "1 patterns found");
    }

    #[test]
    fn test_large_corpus_waits_for_sampling() {
        let (mut explorer, _, _) = explorer();
        let backend = FakeBackend::default();

        assert!(matches!(
            explorer.load_corpus(corpus(101), None),
            LoadOutcome::AwaitingSampling
        ));
        assert!(explorer.sampling().modal_open);
        assert_eq!(explorer.sampling().mode, SamplingMode::Random200);
        assert_eq!(
            explorer.select_length(5).unwrap_err(),
            ExplorerError::AnalysisNotStarted
        );
        assert!(backend.pattern_calls.borrow().is_empty());

        let pending = explorer.apply_sampling(SamplingMode::First100).unwrap();
        assert!(!explorer.sampling().modal_open);
        run(&mut explorer, &backend, pending);

        let calls = backend.pattern_calls.borrow();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].sampling_mode, Some(SamplingMode::First100));
        assert_eq!(calls[0].pattern_length, 4);
    }

    #[test]
    fn test_cached_length_served_without_request() {
        let (mut explorer, _, _) = explorer();
        let backend = FakeBackend::default();
        let LoadOutcome::Fetch(pending) = explorer.load_corpus(corpus(3), None) else {
            panic!("expected a fetch");
        };
        run(&mut explorer, &backend, pending);

        let Selection::Fetch(pending) = explorer.select_length(6).unwrap() else {
            panic!("length 6 is not cached");
        };
        run(&mut explorer, &backend, pending);
        assert_eq!(explorer.length_status(4), LengthStatus::Loaded);

        let selection = explorer.select_length(4).unwrap();
        assert!(matches!(
            selection,
            Selection::Served {
                source: CacheSource::Memory
            }
        ));
        assert_eq!(shown(&explorer), vec![pattern_for_length(4)]);
        assert_eq!(backend.pattern_calls.borrow().len(), 2);
    }

    #[test]
    fn test_superseded_request_is_discarded() {
        let (mut explorer, _, _) = explorer();
        let backend = FakeBackend::default();
        let LoadOutcome::Fetch(first) = explorer.load_corpus(corpus(3), None) else {
            panic!("expected a fetch");
        };

        let Selection::Fetch(second) = explorer.select_length(7).unwrap() else {
            panic!("expected a fetch");
        };

        // the first call resolves after being superseded
        let late = block_on(first.execute(&backend));
        assert_eq!(explorer.finish(late), Finished::Discarded);
        assert!(explorer.view().displayed().is_empty());

        run(&mut explorer, &backend, second);
        assert_eq!(shown(&explorer), vec![pattern_for_length(7)]);
        assert_eq!(explorer.loaded_lengths().iter().copied().collect::<Vec<_>>(), vec![7]);
    }

    #[test]
    fn test_failure_keeps_cache_and_sets_error() {
        let (mut explorer, _, _) = explorer();
        let backend = FakeBackend::default();
        let LoadOutcome::Fetch(pending) = explorer.load_corpus(corpus(3), None) else {
            panic!("expected a fetch");
        };
        run(&mut explorer, &backend, pending);

        *backend.pattern_error.borrow_mut() = Some(ClientError::Status {
            status: 500,
            body: "boom".into(),
        });
        let Selection::Fetch(pending) = explorer.select_length(5).unwrap() else {
            panic!("expected a fetch");
        };
        assert_eq!(
            run(&mut explorer, &backend, pending),
            Finished::Failed("HTTP error! status: 500".into())
        );
        assert_eq!(explorer.error(), Some("HTTP error! status: 500"));
        assert!(!explorer.is_loading());

        explorer.dismiss_error();
        assert!(matches!(
            explorer.select_length(4).unwrap(),
            Selection::Served { .. }
        ));
    }

    #[test]
    fn test_deactivate_cancels_and_activate_resumes() {
        let (mut explorer, _, _) = explorer();
        let backend = FakeBackend::default();
        let LoadOutcome::Fetch(pending) = explorer.load_corpus(corpus(3), None) else {
            panic!("expected a fetch");
        };

        explorer.deactivate();
        let outcome = block_on(pending.execute(&backend));
        assert_eq!(explorer.finish(outcome), Finished::Discarded);
        assert!(backend.pattern_calls.borrow().is_empty());

        let Some(Selection::Fetch(pending)) = explorer.activate() else {
            panic!("expected the active length to reload");
        };
        run(&mut explorer, &backend, pending);
        assert!(explorer.activate().is_none());
    }

    #[test]
    fn test_session_entry_reused_after_reload_and_expires() {
        let (mut explorer, store, clock) = explorer();
        let backend = FakeBackend::default();
        let doc = corpus(3);
        let LoadOutcome::Fetch(pending) = explorer.load_corpus(doc.clone(), None) else {
            panic!("expected a fetch");
        };
        run(&mut explorer, &backend, pending);

        // a second explorer over the same session storage (page reload)
        let mut reloaded = PatternExplorer::new(store.clone(), clock.clone());
        reloaded.corpus = Some(Corpus::new(doc, None));
        reloaded.sampling = SamplingState::for_corpus(3);
        assert!(matches!(
            reloaded.select_length(4).unwrap(),
            Selection::Served {
                source: CacheSource::Session
            }
        ));

        clock.advance(FRESHNESS_MS + 1);
        assert!(matches!(explorer.select_length(4).unwrap(), Selection::Fetch(_)));
    }

    #[test]
    fn test_new_corpus_clears_session_entries() {
        let (mut explorer, store, _) = explorer();
        let backend = FakeBackend::default();
        let LoadOutcome::Fetch(pending) = explorer.load_corpus(corpus(3), None) else {
            panic!("expected a fetch");
        };
        run(&mut explorer, &backend, pending);
        assert_eq!(store.len(), 1);

        let _ = explorer.load_corpus(corpus(4), None);
        assert!(store.is_empty());
        assert!(explorer.loaded_lengths().is_empty());
    }

    #[test]
    fn test_unload_discards_late_result_and_cache() {
        let (mut explorer, store, _) = explorer();
        let backend = FakeBackend::default();
        let LoadOutcome::Fetch(pending) = explorer.load_corpus(corpus(2), None) else {
            panic!("expected a fetch");
        };
        run(&mut explorer, &backend, pending);
        let Selection::Fetch(late) = explorer.select_length(5).unwrap() else {
            panic!("expected a fetch");
        };
        explorer.unload();
        assert!(store.is_empty());
        assert!(explorer.loaded_lengths().is_empty());
        assert!(explorer.corpus().is_none());
        assert!(!explorer.is_loading());
        assert_eq!(run(&mut explorer, &backend, late), Finished::Discarded);
        assert!(explorer.view().displayed().is_empty());
        assert_eq!(explorer.select_length(4).unwrap_err(), ExplorerError::NoCorpus);
    }

    #[test]
    fn test_invalid_length() {
        let (mut explorer, _, _) = explorer();
        assert_eq!(
            explorer.select_length(11).unwrap_err(),
            ExplorerError::InvalidLength(11)
        );
        assert_eq!(explorer.select_length(3).unwrap_err(), ExplorerError::NoCorpus);
    }

    #[test]
    fn test_changing_sampling_reloads_initial_length() {
        let (mut explorer, _, _) = explorer();
        let backend = FakeBackend::default();
        let _ = explorer.load_corpus(corpus(150), None);
        let pending = explorer.apply_sampling(SamplingMode::Random200).unwrap();
        run(&mut explorer, &backend, pending);
        let Selection::Fetch(pending) = explorer.select_length(8).unwrap() else {
            panic!("expected a fetch");
        };
        run(&mut explorer, &backend, pending);

        explorer.open_sampling_modal();
        let pending = explorer.apply_sampling(SamplingMode::Full).unwrap();
        assert_eq!(pending.key(), CacheKey::new(4, MatchMode::Pos));
        assert!(explorer.loaded_lengths().is_empty());
        assert_eq!(explorer.active_length(), 4);
    }
}
