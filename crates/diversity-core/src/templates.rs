//! Template matcher: which model templates occur in a piece of free text

use std::collections::{BTreeMap, BTreeSet};
use std::future::Future;
use std::pin::pin;
use std::time::Duration;

use futures::future::{self, Either};
use tracing::{error, info, warn};

use diversity_client::{AnalysisBackend, ClientError, RetryPolicy};
use diversity_types::{TemplateAnalysis, TemplateMatch};

use crate::highlight::{render_highlights, HighlightSpan};
use crate::lifecycle::{RequestLifecycle, RequestTicket, Settled};

pub const MODEL_PALETTE: [&str; 10] = [
    "bg-red-400",
    "bg-emerald-400",
    "bg-blue-400",
    "bg-amber-400",
    "bg-purple-400",
    "bg-cyan-400",
    "bg-pink-400",
    "bg-teal-400",
    "bg-orange-400",
    "bg-indigo-400",
];

const UNKNOWN_MODEL_CLASS: &str = "bg-gray-400";
const MATCH_CLASS: &str = "bg-blue-100 cursor-pointer rounded px-1 py-0.5 transition-all group relative border-x-2 border-transparent hover:border-blue-500";
const DOTS_CLASS: &str = "invisible group-hover:visible absolute -top-2 left-1/2 transform -translate-x-1/2 flex items-center gap-0.5 bg-white shadow-md border border-gray-200 rounded-full px-2 py-1 z-[100]";

pub const MODELS_TIMEOUT: Duration = Duration::from_secs(30);
pub const POPOVER_MARGIN: f64 = 16.0;

pub const CATALOG_ERROR: &str =
    "Unable to load template patterns. You can still analyze text, but pattern matching may be limited.";
pub const ANALYZE_ERROR: &str = "Unable to analyze text. Please try again in a moment.";
pub const TIMEOUT_ERROR: &str = "Request timed out. Please try again.";

/// Model name to its distinct template patterns, in first-seen order
pub type TemplateCatalog = BTreeMap<String, Vec<String>>;

pub fn build_catalog(matches: &[TemplateMatch]) -> TemplateCatalog {
    let mut catalog = TemplateCatalog::new();
    for m in matches {
        let patterns = catalog.entry(m.template_name.clone()).or_default();
        if !patterns.contains(&m.pattern) {
            patterns.push(m.pattern.clone());
        }
    }
    catalog
}

/// Fetch every known template (empty text), retrying per `policy`
pub async fn load_catalog<B, Sleep, SleepFut>(
    backend: &B,
    policy: &RetryPolicy,
    sleep: Sleep,
) -> Result<TemplateCatalog, ClientError>
where
    B: AnalysisBackend + ?Sized,
    Sleep: FnMut(Duration) -> SleepFut,
    SleepFut: Future<Output = ()>,
{
    let analysis = policy
        .run("template patterns", || backend.analyze_templates(""), sleep)
        .await?;
    if analysis.matches.is_empty() {
        warn!("No template patterns received from server");
    }
    Ok(build_catalog(&analysis.matches))
}

/// Colour class per model, assigned in the order the server lists them
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModelColors {
    entries: Vec<(String, &'static str)>,
}

impl ModelColors {
    pub fn assign(models: &[String]) -> Self {
        Self {
            entries: models
                .iter()
                .enumerate()
                .map(|(i, m)| (m.clone(), MODEL_PALETTE[i % MODEL_PALETTE.len()]))
                .collect(),
        }
    }

    pub fn get(&self, model: &str) -> Option<&'static str> {
        self.entries
            .iter()
            .find(|(name, _)| name == model)
            .map(|(_, class)| *class)
    }

    pub fn class_of(&self, model: &str) -> &'static str {
        self.get(model).unwrap_or(UNKNOWN_MODEL_CLASS)
    }

    /// Legend entries
    pub fn iter(&self) -> impl Iterator<Item = (&str, &'static str)> {
        self.entries.iter().map(|(name, class)| (name.as_str(), *class))
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// `None` if `timer` fires first
pub async fn with_timeout<F, T>(fut: F, timer: T) -> Option<F::Output>
where
    F: Future,
    T: Future<Output = ()>,
{
    match future::select(pin!(fut), pin!(timer)).await {
        Either::Left((value, _)) => Some(value),
        Either::Right(((), _)) => None,
    }
}

/// Fetch `/models` and assign colours. `timer` should complete after
/// [`MODELS_TIMEOUT`]. The error is the message to show.
pub async fn load_models<B, T>(backend: &B, timer: T) -> Result<ModelColors, String>
where
    B: AnalysisBackend + ?Sized,
    T: Future<Output = ()>,
{
    match with_timeout(backend.models(), timer).await {
        Some(Ok(response)) => Ok(ModelColors::assign(&response.models)),
        Some(Err(e)) => {
            error!(error = %e, "Error fetching models");
            Err(format!("Failed to load models: {}", e))
        }
        None => {
            error!("Timed out fetching models");
            Err(TIMEOUT_ERROR.to_string())
        }
    }
}

/// Trim text and pattern, default the model name, drop empty matches
pub fn normalize_matches(matches: Vec<TemplateMatch>) -> Vec<TemplateMatch> {
    matches
        .into_iter()
        .map(|m| TemplateMatch {
            text: m.text.trim().to_string(),
            pattern: m.pattern.trim().to_string(),
            template_name: if m.template_name.is_empty() {
                "unknown".to_string()
            } else {
                m.template_name
            },
            ..m
        })
        .filter(|m| !m.text.is_empty() && !m.pattern.is_empty())
        .collect()
}

#[derive(Debug, Clone, PartialEq)]
pub struct CoverageRow {
    pub model: String,
    pub color: &'static str,
    pub label: String,
    /// Percent width of the bar, never below 2
    pub bar_width: f64,
    pub highlighted: bool,
    pub found: usize,
    pub known: usize,
}

/// One row per model with an assigned colour
pub fn coverage_rows(
    analysis: &TemplateAnalysis,
    colors: &ModelColors,
    catalog: &TemplateCatalog,
) -> Vec<CoverageRow> {
    analysis
        .template_stats
        .iter()
        .filter_map(|(model, stat)| {
            let color = colors.get(model)?;
            Some(CoverageRow {
                model: model.clone(),
                color,
                label: format!("{:.1}% coverage", stat.percentage * 100.0),
                bar_width: (stat.percentage * 100.0).max(2.0),
                highlighted: stat.percentage > 0.5,
                found: stat.matched.unwrap_or(0),
                known: catalog.get(model).map_or(0, Vec::len),
            })
        })
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub top: f64,
    pub bottom: f64,
    pub left: f64,
    pub right: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Size {
    pub width: f64,
    pub height: f64,
}

/// Top-left corner for a popover anchored to `anchor`.
///
/// Below the anchor by default, above it when that would overflow, then
/// clamped so it keeps [`POPOVER_MARGIN`] from every viewport edge.
pub fn place_popover(anchor: Rect, popover: Size, viewport: Size) -> (f64, f64) {
    let m = POPOVER_MARGIN;
    let mut top = anchor.bottom + m;
    let mut left = anchor.left;

    if top + popover.height > viewport.height - m {
        top = anchor.top - popover.height - m;
    }
    if left + popover.width > viewport.width - m {
        left = m.max(anchor.right - popover.width);
    }

    let top = m.max(top.min(viewport.height - popover.height - m));
    let left = m.max(left.min(viewport.width - popover.width - m));
    (top, left)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PopoverEntry {
    pub pattern: String,
    pub text: String,
    pub models: Vec<String>,
}

/// Matches under one highlight, grouped by pattern
pub fn group_for_popover(matches: &[TemplateMatch]) -> Vec<PopoverEntry> {
    let mut entries: Vec<PopoverEntry> = Vec::new();
    for m in matches {
        match entries.iter_mut().find(|e| e.pattern == m.pattern) {
            Some(entry) => {
                if !entry.models.contains(&m.template_name) {
                    entry.models.push(m.template_name.clone());
                }
            }
            None => entries.push(PopoverEntry {
                pattern: m.pattern.clone(),
                text: m.text.clone(),
                models: vec![m.template_name.clone()],
            }),
        }
    }
    entries
}

fn model_dots(matches: &[&TemplateMatch], colors: &ModelColors) -> String {
    let mut models: Vec<&str> = Vec::new();
    for m in matches {
        if !models.contains(&m.template_name.as_str()) {
            models.push(&m.template_name);
        }
    }
    let dots: String = models
        .iter()
        .enumerate()
        .map(|(i, model)| {
            format!(
                "<span class=\"inline-block w-2.5 h-2.5 rounded-full {} border border-white{}\" style=\"z-index: {};\"></span>",
                colors.class_of(model),
                if i > 0 { " ml-[-8px]" } else { "" },
                100 - i as i64
            )
        })
        .collect();
    format!("<span class=\"{}\">{}</span>", DOTS_CLASS, dots)
}

fn char_to_byte(text: &str, char_index: usize) -> Option<usize> {
    text.char_indices()
        .map(|(b, _)| b)
        .chain(std::iter::once(text.len()))
        .nth(char_index)
}

/// Markup for the analysed text: one span per distinct `(start, end)` of a
/// selected pattern, carrying its matches as JSON in `data-match`
pub fn render_template_highlights(
    text: &str,
    matches: &[TemplateMatch],
    selected: &BTreeSet<String>,
    colors: &ModelColors,
) -> String {
    let char_len = text.chars().count();
    let mut groups: BTreeMap<(usize, usize), Vec<&TemplateMatch>> = BTreeMap::new();
    for m in matches {
        let (Some(start), Some(end)) = (m.start, m.end) else {
            continue;
        };
        if !selected.contains(&m.pattern)
            || end > char_len
            || m.text.trim().is_empty()
            || m.pattern.trim().is_empty()
        {
            continue;
        }
        groups.entry((start, end)).or_default().push(m);
    }

    let spans: Vec<HighlightSpan> = groups
        .iter()
        .filter_map(|(&(start, end), group)| {
            let start = char_to_byte(text, start)?;
            let end = char_to_byte(text, end)?;
            let data = match serde_json::to_string(group) {
                Ok(json) => json,
                Err(e) => {
                    warn!(error = %e, "Cannot encode template match");
                    return None;
                }
            };
            Some(
                HighlightSpan::new(start, end, group[0].pattern.as_str(), MATCH_CLASS)
                    .with_attribute("data-match", data)
                    .with_badge(model_dots(group, colors)),
            )
        })
        .collect();

    render_highlights(text, &spans)
}

#[derive(Debug)]
pub struct TemplateFetch {
    ticket: RequestTicket,
    text: String,
}

#[derive(Debug)]
pub struct TemplateOutcome {
    /// The submitted text; match offsets point into it
    text: String,
    settled: Settled<Result<TemplateAnalysis, ClientError>>,
}

impl TemplateFetch {
    pub async fn execute<B>(self, backend: &B) -> TemplateOutcome
    where
        B: AnalysisBackend + ?Sized,
    {
        let TemplateFetch { ticket, text } = self;
        let settled = ticket.run(backend.analyze_templates(&text)).await;
        TemplateOutcome { text, settled }
    }
}

/// State behind the template matcher tab
#[derive(Default)]
pub struct TemplateMatcher {
    input: String,
    analysed_text: String,
    analysis: Option<TemplateAnalysis>,
    selected: BTreeSet<String>,
    open_sections: BTreeMap<String, bool>,
    colors: ModelColors,
    catalog: TemplateCatalog,
    popover: Option<Vec<TemplateMatch>>,
    lifecycle: RequestLifecycle,
    error: Option<String>,
}

impl TemplateMatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_input(&mut self, text: impl Into<String>) {
        self.input = text.into();
    }

    pub fn input(&self) -> &str {
        &self.input
    }

    pub fn can_analyze(&self) -> bool {
        !self.lifecycle.is_busy() && !self.input.trim().is_empty()
    }

    pub fn set_catalog(&mut self, loaded: Result<TemplateCatalog, ClientError>) {
        match loaded {
            Ok(catalog) => {
                info!(models = catalog.len(), "Template catalog loaded");
                self.catalog = catalog;
            }
            Err(e) => {
                error!(error = %e, "Error fetching template patterns");
                self.catalog.clear();
                self.error = Some(CATALOG_ERROR.to_string());
            }
        }
    }

    pub fn set_models(&mut self, loaded: Result<ModelColors, String>) {
        match loaded {
            Ok(colors) => self.colors = colors,
            Err(message) => self.error = Some(message),
        }
    }

    /// Start analysing the current input; `None` when there is nothing to send
    pub fn analyze(&mut self) -> Option<TemplateFetch> {
        if self.input.trim().is_empty() {
            return None;
        }
        self.error = None;
        self.popover = None;
        let ticket = self.lifecycle.begin("template names");
        Some(TemplateFetch {
            ticket,
            text: self.input.clone(),
        })
    }

    pub fn finish(&mut self, outcome: TemplateOutcome) -> bool {
        if !self.lifecycle.settle(outcome.settled.generation()) {
            return false;
        }
        match outcome.settled {
            Settled::Cancelled { .. } => false,
            Settled::Completed { value: Ok(mut analysis), .. } => {
                analysis.matches = normalize_matches(analysis.matches);
                self.selected = analysis.matches.iter().map(|m| m.pattern.clone()).collect();
                self.open_sections = analysis
                    .matches
                    .iter()
                    .map(|m| (m.template_name.clone(), true))
                    .collect();
                self.analysed_text = outcome.text;
                self.analysis = Some(analysis);
                true
            }
            Settled::Completed { value: Err(e), .. } => {
                error!(error = %e, "Error analyzing text");
                self.error = Some(ANALYZE_ERROR.to_string());
                self.analysis = None;
                self.selected.clear();
                self.open_sections.clear();
                true
            }
        }
    }

    pub fn analysis(&self) -> Option<&TemplateAnalysis> {
        self.analysis.as_ref()
    }

    /// Distinct patterns per model in the current analysis
    pub fn patterns_by_model(&self) -> TemplateCatalog {
        self.analysis
            .as_ref()
            .map(|a| build_catalog(&a.matches))
            .unwrap_or_default()
    }

    pub fn is_selected(&self, pattern: &str) -> bool {
        self.selected.contains(pattern)
    }

    pub fn toggle_pattern(&mut self, pattern: &str) {
        if !self.selected.remove(pattern) {
            self.selected.insert(pattern.to_string());
        }
    }

    pub fn select_model(&mut self, model: &str) {
        if let Some(patterns) = self.patterns_by_model().remove(model) {
            self.selected.extend(patterns);
        }
    }

    pub fn deselect_model(&mut self, model: &str) {
        if let Some(patterns) = self.patterns_by_model().get(model) {
            for p in patterns {
                self.selected.remove(p);
            }
        }
    }

    /// Select the patterns no other model shares. Returns what was added.
    pub fn select_unique(&mut self, model: &str) -> Vec<String> {
        let by_model = self.patterns_by_model();
        let Some(own) = by_model.get(model) else {
            return Vec::new();
        };
        let unique: Vec<String> = own
            .iter()
            .filter(|p| {
                by_model
                    .iter()
                    .all(|(other, patterns)| other == model || !patterns.contains(p))
            })
            .cloned()
            .collect();
        self.selected.extend(unique.iter().cloned());
        unique
    }

    pub fn is_open(&self, model: &str) -> bool {
        self.open_sections.get(model).copied().unwrap_or(false)
    }

    pub fn toggle_section(&mut self, model: &str) {
        let open = self.is_open(model);
        self.open_sections.insert(model.to_string(), !open);
    }

    /// Collapse everything if all sections are open, otherwise open all
    pub fn toggle_all_sections(&mut self) {
        let Some(analysis) = &self.analysis else {
            return;
        };
        let models: Vec<String> = analysis.template_stats.keys().cloned().collect();
        let all_open = models.iter().all(|m| self.is_open(m));
        self.open_sections = models.into_iter().map(|m| (m, !all_open)).collect();
    }

    pub fn highlighted_html(&self) -> String {
        match &self.analysis {
            Some(analysis) => render_template_highlights(
                &self.analysed_text,
                &analysis.matches,
                &self.selected,
                &self.colors,
            ),
            None => crate::highlight::escape_html(&self.analysed_text),
        }
    }

    pub fn coverage(&self) -> Vec<CoverageRow> {
        self.analysis
            .as_ref()
            .map(|a| coverage_rows(a, &self.colors, &self.catalog))
            .unwrap_or_default()
    }

    /// Clicking the same highlight again closes its popover
    pub fn toggle_popover(&mut self, matches: Vec<TemplateMatch>) -> bool {
        if self.popover.as_ref() == Some(&matches) {
            self.popover = None;
            false
        } else {
            self.popover = Some(matches);
            true
        }
    }

    pub fn close_popover(&mut self) {
        self.popover = None;
    }

    pub fn popover_entries(&self) -> Vec<PopoverEntry> {
        self.popover
            .as_deref()
            .map(group_for_popover)
            .unwrap_or_default()
    }

    pub fn colors(&self) -> &ModelColors {
        &self.colors
    }

    pub fn catalog(&self) -> &TemplateCatalog {
        &self.catalog
    }

    pub fn is_loading(&self) -> bool {
        self.lifecycle.is_busy()
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn dismiss_error(&mut self) {
        self.error = None;
    }
}
