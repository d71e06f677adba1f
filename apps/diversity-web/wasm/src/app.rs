//! The page-facing `DiversityApp` class
//!
//! JS holds one instance, calls methods on user input, and re-renders from
//! `snapshot()` whenever the change callback fires. Methods that talk to the
//! backend return a `Promise` that resolves once the request has settled.

use std::convert::Infallible;
use std::future::Future;

use js_sys::{Function, Promise};
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::future_to_promise;

use diversity_client::{ClientConfig, RetryPolicy};
use diversity_core::templates::{place_popover, Rect, Size, MODELS_TIMEOUT};
use diversity_core::{
    example_corpus, FileSlot, FilterMode, SystemClock, Tab, Workspace,
};
use diversity_types::{SamplingMode, TemplateMatch};

use crate::fetch::FetchBackend;
use crate::session::Session;
use crate::snapshot::WorkspaceSnapshot;
use crate::storage::BrowserSessionStore;
use crate::timer::sleep;

type BrowserSession = Session<FetchBackend, BrowserSessionStore, SystemClock>;

fn to_js<E: std::fmt::Display>(err: E) -> JsValue {
    JsValue::from_str(&err.to_string())
}

fn parse_slot(slot: &str) -> Result<FileSlot, JsValue> {
    FileSlot::parse(slot).ok_or_else(|| JsValue::from_str(&format!("Unknown file slot: {}", slot)))
}

fn parse_tab(tab: &str) -> Result<Tab, JsValue> {
    Tab::parse(tab).ok_or_else(|| JsValue::from_str(&format!("Unknown tab: {}", tab)))
}

/// Run `op` to completion as a Promise resolving to `undefined`
fn spawn<F, E>(op: F) -> Promise
where
    F: Future<Output = Result<(), E>> + 'static,
    E: std::fmt::Display,
{
    future_to_promise(async move {
        op.await.map_err(to_js)?;
        Ok(JsValue::UNDEFINED)
    })
}

#[wasm_bindgen]
pub struct DiversityApp {
    session: BrowserSession,
}

#[wasm_bindgen]
impl DiversityApp {
    /// `api_url` defaults to the public demo backend
    #[wasm_bindgen(constructor)]
    pub fn new(api_url: Option<String>) -> Result<DiversityApp, JsValue> {
        let config = match api_url {
            Some(url) => ClientConfig::new(url),
            None => ClientConfig::default(),
        };
        let backend = FetchBackend::new(config).map_err(to_js)?;
        let workspace = Workspace::new(BrowserSessionStore::open(), SystemClock);
        Ok(Self {
            session: Session::new(workspace, backend),
        })
    }

    /// Callback signature: `() => void`, called after every state change
    #[wasm_bindgen(js_name = setChangeCallback)]
    pub fn set_change_callback(&self, callback: Function) {
        self.session.set_on_change(move || {
            let _ = callback.call0(&JsValue::NULL);
        });
    }

    /// Internal method (testable without JsValue)
    fn snapshot_internal(&self) -> WorkspaceSnapshot {
        self.session.read(WorkspaceSnapshot::capture)
    }

    /// Current UI state as a plain object
    #[wasm_bindgen]
    pub fn snapshot(&self) -> Result<JsValue, JsValue> {
        serde_wasm_bindgen::to_value(&self.snapshot_internal())
            .map_err(|e| JsValue::from_str(&format!("Serialization error: {}", e)))
    }

    // Files

    /// Rejects with the validation message; an open analysis tab reloads
    #[wasm_bindgen(js_name = uploadFile)]
    pub fn upload_file(
        &self,
        slot: &str,
        name: String,
        media_type: Option<String>,
        bytes: Vec<u8>,
    ) -> Result<Promise, JsValue> {
        let slot = parse_slot(slot)?;
        let session = self.session.clone();
        Ok(spawn(async move {
            session
                .upload(slot, &name, media_type.as_deref(), bytes)
                .await
        }))
    }

    #[wasm_bindgen(js_name = clearFile)]
    pub fn clear_file(&self, slot: &str) -> Result<Promise, JsValue> {
        let slot = parse_slot(slot)?;
        let session = self.session.clone();
        Ok(spawn(async move {
            session.clear_document(slot).await;
            Ok::<_, Infallible>(())
        }))
    }

    #[wasm_bindgen(js_name = loadExampleCorpus)]
    pub fn load_example_corpus(&self, slot: &str) -> Result<Promise, JsValue> {
        let slot = parse_slot(slot)?;
        let session = self.session.clone();
        Ok(spawn(async move {
            session.set_document(slot, example_corpus()).await;
            Ok::<_, Infallible>(())
        }))
    }

    #[wasm_bindgen(js_name = loadDataset)]
    pub fn load_dataset(
        &self,
        slot: &str,
        category: String,
        dataset: Option<String>,
    ) -> Result<Promise, JsValue> {
        let slot = parse_slot(slot)?;
        let session = self.session.clone();
        Ok(spawn(async move {
            session
                .load_dataset(slot, &category, dataset.as_deref())
                .await
        }))
    }

    // Navigation

    #[wasm_bindgen(js_name = selectTab)]
    pub fn select_tab(&self, tab: &str) -> Result<Promise, JsValue> {
        let tab = parse_tab(tab)?;
        let session = self.session.clone();
        Ok(spawn(async move { session.select_tab(tab).await }))
    }

    #[wasm_bindgen(js_name = chooseAnalysis)]
    pub fn choose_analysis(&self, tab: &str) -> Result<Promise, JsValue> {
        let tab = parse_tab(tab)?;
        let session = self.session.clone();
        Ok(spawn(async move { session.choose_analysis(tab).await }))
    }

    #[wasm_bindgen(js_name = closeChooser)]
    pub fn close_chooser(&self) {
        self.session.update(|w| w.close_chooser());
    }

    #[wasm_bindgen(js_name = dismissError)]
    pub fn dismiss_error(&self) {
        self.session.update(|w| w.dismiss_error());
    }

    // Pattern explorer

    #[wasm_bindgen(js_name = selectPatternLength)]
    pub fn select_pattern_length(&self, length: u8) -> Promise {
        let session = self.session.clone();
        spawn(async move { session.select_length(length).await })
    }

    #[wasm_bindgen(js_name = applySampling)]
    pub fn apply_sampling(&self, mode: &str) -> Result<Promise, JsValue> {
        let mode = SamplingMode::parse(mode)
            .ok_or_else(|| JsValue::from_str(&format!("Unknown sampling mode: {}", mode)))?;
        let session = self.session.clone();
        Ok(spawn(async move { session.apply_sampling(mode).await }))
    }

    #[wasm_bindgen(js_name = openSamplingModal)]
    pub fn open_sampling_modal(&self) {
        self.session.update(|w| w.explorer_mut().open_sampling_modal());
    }

    #[wasm_bindgen(js_name = dismissSamplingModal)]
    pub fn dismiss_sampling_modal(&self) {
        self.session
            .update(|w| w.explorer_mut().dismiss_sampling_modal());
    }

    #[wasm_bindgen(js_name = setPatternFilter)]
    pub fn set_pattern_filter(&self, filter: &str) -> Result<(), JsValue> {
        let filter = FilterMode::parse(filter)
            .ok_or_else(|| JsValue::from_str(&format!("Unknown filter: {}", filter)))?;
        self.session
            .update(|w| w.explorer_mut().view_mut().set_filter(filter));
        Ok(())
    }

    #[wasm_bindgen(js_name = togglePattern)]
    pub fn toggle_pattern(&self, pattern: &str) {
        self.session
            .update(|w| w.explorer_mut().view_mut().toggle(pattern));
    }

    #[wasm_bindgen(js_name = selectAllPatterns)]
    pub fn select_all_patterns(&self) {
        self.session
            .update(|w| w.explorer_mut().view_mut().select_all());
    }

    #[wasm_bindgen(js_name = clearPatternSelection)]
    pub fn clear_pattern_selection(&self) {
        self.session
            .update(|w| w.explorer_mut().view_mut().clear_selection());
    }

    #[wasm_bindgen(js_name = dismissPatternError)]
    pub fn dismiss_pattern_error(&self) {
        self.session.update(|w| w.explorer_mut().dismiss_error());
    }

    // Exact matches

    #[wasm_bindgen(js_name = setExactMinLength)]
    pub fn set_exact_min_length(&self, length: u8) -> Promise {
        let session = self.session.clone();
        spawn(async move { session.set_exact_min_length(length).await })
    }

    #[wasm_bindgen(js_name = setExactMinOccurrences)]
    pub fn set_exact_min_occurrences(&self, occurrences: usize) -> Result<(), JsValue> {
        self.session
            .update(|w| w.exact_mut().set_min_occurrences(occurrences))
            .map_err(to_js)
    }

    #[wasm_bindgen(js_name = refreshExact)]
    pub fn refresh_exact(&self) -> Promise {
        let session = self.session.clone();
        spawn(async move {
            session.refresh_exact().await;
            Ok::<_, Infallible>(())
        })
    }

    // Metrics

    #[wasm_bindgen(js_name = dismissMetricsError)]
    pub fn dismiss_metrics_error(&self) {
        self.session.update(|w| w.metrics_mut().dismiss_error());
    }

    // Template matcher

    /// Load the template catalog and model list
    #[wasm_bindgen(js_name = prepareTemplates)]
    pub fn prepare_templates(&self) -> Promise {
        let session = self.session.clone();
        spawn(async move {
            session
                .prepare_templates(RetryPolicy::default(), sleep, sleep(MODELS_TIMEOUT))
                .await;
            Ok::<_, Infallible>(())
        })
    }

    #[wasm_bindgen(js_name = setTemplateInput)]
    pub fn set_template_input(&self, text: String) {
        self.session.update(|w| w.templates_mut().set_input(text));
    }

    #[wasm_bindgen(js_name = analyzeTemplates)]
    pub fn analyze_templates(&self) -> Promise {
        let session = self.session.clone();
        spawn(async move {
            session.analyze_templates().await;
            Ok::<_, Infallible>(())
        })
    }

    #[wasm_bindgen(js_name = toggleTemplatePattern)]
    pub fn toggle_template_pattern(&self, pattern: &str) {
        self.session
            .update(|w| w.templates_mut().toggle_pattern(pattern));
    }

    #[wasm_bindgen(js_name = selectModel)]
    pub fn select_model(&self, model: &str) {
        self.session.update(|w| w.templates_mut().select_model(model));
    }

    #[wasm_bindgen(js_name = deselectModel)]
    pub fn deselect_model(&self, model: &str) {
        self.session
            .update(|w| w.templates_mut().deselect_model(model));
    }

    /// Select patterns only `model` uses; returns them
    #[wasm_bindgen(js_name = selectUniquePatterns)]
    pub fn select_unique_patterns(&self, model: &str) -> Vec<String> {
        self.session
            .update(|w| w.templates_mut().select_unique(model))
    }

    #[wasm_bindgen(js_name = toggleModelSection)]
    pub fn toggle_model_section(&self, model: &str) {
        self.session
            .update(|w| w.templates_mut().toggle_section(model));
    }

    #[wasm_bindgen(js_name = toggleAllModelSections)]
    pub fn toggle_all_model_sections(&self) {
        self.session
            .update(|w| w.templates_mut().toggle_all_sections());
    }

    /// `data_match` is the `data-match` attribute of the clicked highlight.
    /// Returns whether the popover is now open.
    #[wasm_bindgen(js_name = togglePopover)]
    pub fn toggle_popover(&self, data_match: &str) -> Result<bool, JsValue> {
        let matches: Vec<TemplateMatch> = serde_json::from_str(data_match).map_err(to_js)?;
        Ok(self
            .session
            .update(|w| w.templates_mut().toggle_popover(matches)))
    }

    #[wasm_bindgen(js_name = closePopover)]
    pub fn close_popover(&self) {
        self.session.update(|w| w.templates_mut().close_popover());
    }

    #[wasm_bindgen(js_name = dismissTemplateError)]
    pub fn dismiss_template_error(&self) {
        self.session
            .update(|w| w.templates_mut().dismiss_error());
    }
}

/// Popover position as `[top, left]` for an anchor's bounding rect
#[wasm_bindgen(js_name = placePopover)]
#[allow(clippy::too_many_arguments)]
pub fn place_popover_js(
    anchor_top: f64,
    anchor_bottom: f64,
    anchor_left: f64,
    anchor_right: f64,
    popover_width: f64,
    popover_height: f64,
    viewport_width: f64,
    viewport_height: f64,
) -> Vec<f64> {
    let (top, left) = place_popover(
        Rect {
            top: anchor_top,
            bottom: anchor_bottom,
            left: anchor_left,
            right: anchor_right,
        },
        Size {
            width: popover_width,
            height: popover_height,
        },
        Size {
            width: viewport_width,
            height: viewport_height,
        },
    );
    vec![top, left]
}
