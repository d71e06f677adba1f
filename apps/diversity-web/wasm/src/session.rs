//! Drives the workspace state machines against a backend
//!
//! State changes happen inside short `RefCell` borrows and no borrow is held
//! across an await, so overlapping requests interleave on the single browser
//! thread. Each change is followed by the change callback so the page can
//! re-render from a fresh snapshot.

use std::cell::RefCell;
use std::future::Future;
use std::rc::Rc;
use std::time::Duration;

use futures::future::join_all;
use tracing::{debug, warn};

use diversity_client::{AnalysisBackend, RetryPolicy};
use diversity_core::exact::ExactError;
use diversity_core::metrics::FileSlot;
use diversity_core::templates::{load_catalog, load_models};
use diversity_core::{
    load_dataset, Clock, DatasetError, ExactFetch, ExplorerError, Finished, LoadOutcome,
    MetricsRun, PendingFetch, Selection, SessionStore, Tab, TabActivation, Workspace,
    WorkspaceError,
};
use diversity_types::{Document, SamplingMode, UploadError};

type ChangeCallback = Rc<RefCell<Option<Box<dyn Fn()>>>>;

pub struct Session<B, S, C> {
    workspace: Rc<RefCell<Workspace<S, C>>>,
    backend: Rc<B>,
    on_change: ChangeCallback,
}

impl<B, S, C> Clone for Session<B, S, C> {
    fn clone(&self) -> Self {
        Self {
            workspace: Rc::clone(&self.workspace),
            backend: Rc::clone(&self.backend),
            on_change: Rc::clone(&self.on_change),
        }
    }
}

impl<B, S, C> Session<B, S, C>
where
    B: AnalysisBackend,
    S: SessionStore,
    C: Clock,
{
    pub fn new(workspace: Workspace<S, C>, backend: B) -> Self {
        Self {
            workspace: Rc::new(RefCell::new(workspace)),
            backend: Rc::new(backend),
            on_change: Rc::default(),
        }
    }

    pub fn set_on_change(&self, callback: impl Fn() + 'static) {
        *self.on_change.borrow_mut() = Some(Box::new(callback));
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn read<R>(&self, f: impl FnOnce(&Workspace<S, C>) -> R) -> R {
        f(&self.workspace.borrow())
    }

    /// Mutate the workspace, then notify
    pub fn update<R>(&self, f: impl FnOnce(&mut Workspace<S, C>) -> R) -> R {
        let result = f(&mut self.workspace.borrow_mut());
        self.notify();
        result
    }

    fn notify(&self) {
        if let Some(callback) = self.on_change.borrow().as_ref() {
            callback();
        }
    }

    /// Run whatever a tab switch asked for
    pub async fn drive(&self, activation: TabActivation) {
        match activation {
            TabActivation::Shown
            | TabActivation::Patterns(LoadOutcome::AwaitingSampling)
            | TabActivation::PatternLength(Selection::Served { .. }) => {}
            TabActivation::Patterns(LoadOutcome::Fetch(fetch))
            | TabActivation::PatternLength(Selection::Fetch(fetch)) => {
                self.run_patterns(fetch).await
            }
            TabActivation::Exact(fetch) => self.run_exact(fetch).await,
            TabActivation::Metrics(runs) => {
                join_all(runs.into_iter().map(|run| self.run_metrics(run))).await;
            }
        }
    }

    pub async fn select_tab(&self, tab: Tab) -> Result<(), WorkspaceError> {
        let activation = self.update(|w| w.select_tab(tab))?;
        self.drive(activation).await;
        Ok(())
    }

    pub async fn choose_analysis(&self, tab: Tab) -> Result<(), WorkspaceError> {
        let activation = self.update(|w| w.choose_analysis(tab))?;
        self.drive(activation).await;
        Ok(())
    }

    /// A document change invalidates the open analysis; reload it
    async fn refresh_active(&self) {
        let activation = self.update(|w| w.refresh_active());
        self.drive(activation).await;
    }

    pub async fn upload(
        &self,
        slot: FileSlot,
        name: &str,
        media_type: Option<&str>,
        bytes: Vec<u8>,
    ) -> Result<(), UploadError> {
        let uploaded = self.update(|w| w.upload(slot, name, media_type, bytes));
        self.refresh_active().await;
        uploaded
    }

    pub async fn set_document(&self, slot: FileSlot, document: Document) {
        self.update(|w| w.set_document(slot, document));
        self.refresh_active().await;
    }

    pub async fn clear_document(&self, slot: FileSlot) {
        self.update(|w| w.clear_document(slot));
        self.refresh_active().await;
    }

    pub async fn load_dataset(
        &self,
        slot: FileSlot,
        category: &str,
        dataset: Option<&str>,
    ) -> Result<(), DatasetError> {
        match load_dataset(&*self.backend, category, dataset).await {
            Ok(document) => {
                self.set_document(slot, document).await;
                Ok(())
            }
            Err(e) => {
                self.update(|w| w.set_error(e.to_string()));
                Err(e)
            }
        }
    }

    pub async fn select_length(&self, length: u8) -> Result<(), ExplorerError> {
        if let Selection::Fetch(fetch) = self.update(|w| w.explorer_mut().select_length(length))? {
            self.run_patterns(fetch).await;
        }
        Ok(())
    }

    pub async fn apply_sampling(&self, mode: SamplingMode) -> Result<(), ExplorerError> {
        let fetch = self.update(|w| w.explorer_mut().apply_sampling(mode))?;
        self.run_patterns(fetch).await;
        Ok(())
    }

    async fn run_patterns(&self, fetch: PendingFetch) {
        let length = fetch.request().pattern_length;
        let outcome = fetch.execute(&*self.backend).await;
        match self.update(|w| w.explorer_mut().finish(outcome)) {
            Finished::Failed(message) => warn!(length, %message, "Pattern analysis failed"),
            finished => debug!(length, ?finished, "Pattern request settled"),
        }
    }

    pub async fn set_exact_min_length(&self, length: u8) -> Result<(), ExactError> {
        if let Some(fetch) = self.update(|w| w.exact_mut().set_min_length(length))? {
            self.run_exact(fetch).await;
        }
        Ok(())
    }

    pub async fn refresh_exact(&self) {
        if let Some(fetch) = self.update(|w| w.exact_mut().refresh()) {
            self.run_exact(fetch).await;
        }
    }

    async fn run_exact(&self, fetch: ExactFetch) {
        let outcome = fetch.execute(&*self.backend).await;
        self.update(|w| w.exact_mut().finish(outcome));
    }

    async fn run_metrics(&self, run: MetricsRun) {
        let outcome = run
            .execute(&*self.backend, |slot, generation, event| {
                self.update(|w| w.metrics_mut().apply(slot, generation, event));
            })
            .await;
        self.update(|w| w.metrics_mut().finish(outcome));
    }

    /// Load the pattern catalog and model colours the template tab needs
    pub async fn prepare_templates<Sleep, SleepFut, T>(
        &self,
        policy: RetryPolicy,
        sleep: Sleep,
        models_timer: T,
    ) where
        Sleep: FnMut(Duration) -> SleepFut,
        SleepFut: Future<Output = ()>,
        T: Future<Output = ()>,
    {
        let backend = &*self.backend;
        let (catalog, models) = futures::join!(
            load_catalog(backend, &policy, sleep),
            load_models(backend, models_timer)
        );
        self.update(|w| {
            let templates = w.templates_mut();
            templates.set_catalog(catalog);
            templates.set_models(models);
        });
    }

    pub async fn analyze_templates(&self) {
        let Some(fetch) = self.update(|w| w.templates_mut().analyze()) else {
            return;
        };
        let outcome = fetch.execute(&*self.backend).await;
        self.update(|w| w.templates_mut().finish(outcome));
    }
}
