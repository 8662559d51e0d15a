//! Annotator: per-page-view lifecycle controller
//!
//! # State machine
//! ```text
//! Idle → Extracting → AnnotatingInitial → Watching ⇄ DebouncePending
//!                 ↘ Dormant                    ↖ AnnotatingIncremental ↙
//! ```
//! A view with no birth year (or no content area) goes `Dormant` and stays
//! there until `navigate`. Years are extracted once per view; every
//! re-pass reuses them together with the view's visited set.
//!
//! The controller is clock-agnostic and document-agnostic: it works on any
//! `PageTree`, and callers hand it mutation batches and timestamps.

use crate::annotate::{AnnotationEngine, PassReport, YearWindow};
use crate::config::{AnnotatorConfig, CompiledSelectors};
use crate::dom::{MutationRecord, PageTree};
use crate::error::ConfigError;
use crate::extract::{ExtractionResult, YearExtractor};
use crate::watcher::ChangeWatcher;
use serde::Serialize;

// =============================================================================
// State Machine
// =============================================================================

#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Fresh view, nothing run yet
    Idle,
    Extracting,
    AnnotatingInitial,
    /// Initial pass done, observing the content area
    Watching,
    /// A qualifying mutation arrived; re-pass scheduled
    DebouncePending,
    AnnotatingIncremental,
    /// Nothing to annotate in this view
    Dormant,
}

impl SessionState {
    pub fn name(&self) -> &'static str {
        match self {
            SessionState::Idle => "idle",
            SessionState::Extracting => "extracting",
            SessionState::AnnotatingInitial => "annotating-initial",
            SessionState::Watching => "watching",
            SessionState::DebouncePending => "debounce-pending",
            SessionState::AnnotatingIncremental => "annotating-incremental",
            SessionState::Dormant => "dormant",
        }
    }
}

// =============================================================================
// PageSession
// =============================================================================

/// Everything that belongs to a single page view.
pub struct PageSession<T: PageTree> {
    state: SessionState,
    extraction: ExtractionResult,
    window: Option<YearWindow>,
    content_root: Option<T::Node>,
    visited: T::Visited,
    watcher: ChangeWatcher,
    passes: usize,
    annotated: usize,
}

impl<T: PageTree> PageSession<T> {
    fn new(config: &AnnotatorConfig) -> Self {
        Self {
            state: SessionState::Idle,
            extraction: ExtractionResult::default(),
            window: None,
            content_root: None,
            visited: T::Visited::default(),
            watcher: ChangeWatcher::new(config.debounce_ms, config.observe_attributes),
            passes: 0,
            annotated: 0,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn extraction(&self) -> &ExtractionResult {
        &self.extraction
    }

    pub fn window(&self) -> Option<&YearWindow> {
        self.window.as_ref()
    }

    pub fn content_root(&self) -> Option<&T::Node> {
        self.content_root.as_ref()
    }

    pub fn visited(&self) -> &T::Visited {
        &self.visited
    }

    pub fn watcher(&self) -> &ChangeWatcher {
        &self.watcher
    }

    /// Passes run in this view, initial included.
    pub fn passes(&self) -> usize {
        self.passes
    }

    /// Years annotated in this view so far.
    pub fn annotated(&self) -> usize {
        self.annotated
    }

    fn record_pass(&mut self, report: &PassReport) {
        self.passes += 1;
        self.annotated += report.annotated;
    }
}

// =============================================================================
// Annotator
// =============================================================================

/// Lifecycle controller tying extraction, annotation and watching together.
pub struct Annotator<T: PageTree> {
    config: AnnotatorConfig,
    selectors: CompiledSelectors,
    extractor: YearExtractor,
    engine: AnnotationEngine,
    session: PageSession<T>,
    views: u64,
}

impl<T: PageTree> Annotator<T> {
    pub fn new(config: AnnotatorConfig) -> Result<Self, ConfigError> {
        let selectors = config.compile()?;
        let engine = AnnotationEngine::new(&selectors, config.marker_template());
        Ok(Self {
            session: PageSession::new(&config),
            extractor: YearExtractor::new(),
            engine,
            selectors,
            config,
            views: 1,
        })
    }

    pub fn config(&self) -> &AnnotatorConfig {
        &self.config
    }

    pub fn selectors(&self) -> &CompiledSelectors {
        &self.selectors
    }

    pub fn session(&self) -> &PageSession<T> {
        &self.session
    }

    pub fn state(&self) -> SessionState {
        self.session.state
    }

    /// Page views started, the first included.
    pub fn views(&self) -> u64 {
        self.views
    }

    /// Deadline of the pending re-pass, if any.
    pub fn next_deadline(&self) -> Option<f64> {
        self.session.watcher.debouncer().deadline()
    }

    /// Run extraction and the initial pass. Only the first trigger of a view
    /// does anything, and nothing runs once the processed flag is set.
    pub fn trigger(&mut self, tree: &mut T, current_year: i32) -> Option<PassReport> {
        if self.session.state != SessionState::Idle {
            log::trace!("[WikiAge] trigger ignored in state {}", self.session.state.name());
            return None;
        }
        if tree.root_flag(&self.config.processed_attribute) {
            log::debug!("[WikiAge] page already processed");
            self.session.state = SessionState::Dormant;
            return None;
        }

        self.session.state = SessionState::Extracting;
        let extraction =
            self.extractor
                .extract_from(tree, &self.selectors, self.config.lead_paragraphs);
        self.session.extraction = extraction;
        let Some(birth) = extraction.birth_year else {
            log::debug!("[WikiAge] no birth year; view left unannotated");
            self.session.state = SessionState::Dormant;
            return None;
        };
        let Some(root) = tree.query(None, &self.selectors.content) else {
            log::warn!("[WikiAge] content area {:?} not found", self.config.content_selector);
            self.session.state = SessionState::Dormant;
            return None;
        };

        let window = YearWindow::new(birth, extraction.death_year, current_year);
        log::debug!(
            "[WikiAge] birth {} ({:?}), upper bound {}",
            birth,
            extraction.birth_rule,
            window.upper()
        );

        self.session.state = SessionState::AnnotatingInitial;
        let report = self
            .engine
            .annotate(tree, &root, &window, &mut self.session.visited);
        self.session.record_pass(&report);
        tree.set_root_flag(&self.config.processed_attribute, true);

        self.session.window = Some(window);
        self.session.content_root = Some(root);
        self.session.watcher.arm();
        self.session.state = SessionState::Watching;
        Some(report)
    }

    /// Feed a mutation batch. Returns the re-pass deadline when the batch
    /// (re)scheduled one.
    pub fn on_mutations(&mut self, tree: &T, records: &[MutationRecord<T::Node>], now: f64) -> Option<f64> {
        if !matches!(
            self.session.state,
            SessionState::Watching | SessionState::DebouncePending
        ) {
            return None;
        }
        let root = self.session.content_root.clone()?;
        if let Some(live) = tree.query(None, &self.selectors.content) {
            if !tree.is_within(&root, &live) {
                log::debug!("[WikiAge] content area replaced");
                self.session.content_root = Some(live);
                let deadline = self.session.watcher.content_swapped(now)?;
                self.session.state = SessionState::DebouncePending;
                return Some(deadline);
            }
        }
        let relevant: Vec<MutationRecord<T::Node>> = records
            .iter()
            .filter(|r| tree.is_within(&root, r.target()))
            .cloned()
            .collect();

        let deadline = self.session.watcher.observe(&relevant, now)?;
        self.session.state = SessionState::DebouncePending;
        log::trace!("[WikiAge] re-pass scheduled for {:.0}", deadline);
        Some(deadline)
    }

    /// Run the pending re-pass if its quiet period has elapsed.
    pub fn poll(&mut self, tree: &mut T, now: f64) -> Option<PassReport> {
        if self.session.state != SessionState::DebouncePending || !self.session.watcher.poll(now) {
            return None;
        }
        self.run_incremental(tree)
    }

    /// Re-pass over the whole content area with the view's years and visited set.
    pub fn run_incremental(&mut self, tree: &mut T) -> Option<PassReport> {
        let window = self.session.window?;
        // the content area may have been swapped out wholesale
        let root = tree
            .query(None, &self.selectors.content)
            .or_else(|| self.session.content_root.clone())?;

        self.session.state = SessionState::AnnotatingIncremental;
        let forgotten = tree.forget_removed(&mut self.session.visited);
        let report = self
            .engine
            .annotate(tree, &root, &window, &mut self.session.visited);
        self.session.record_pass(&report);
        if forgotten > 0 {
            log::trace!("[WikiAge] dropped {} removed fragments from the visited set", forgotten);
        }

        self.session.content_root = Some(root);
        self.session.state = if self.session.watcher.is_pending() {
            SessionState::DebouncePending
        } else {
            SessionState::Watching
        };
        Some(report)
    }

    /// The user moved to another article: drop markers, clear the processed
    /// flag and start a fresh view.
    pub fn navigate(&mut self, tree: &mut T) -> usize {
        self.session.watcher.disarm();
        let removed = tree.unwrap_markers(&self.selectors.wrappers, &self.selectors.markers);
        tree.set_root_flag(&self.config.processed_attribute, false);
        self.session = PageSession::new(&self.config);
        self.views += 1;
        log::debug!("[WikiAge] view {} started, {} stale markers removed", self.views, removed);
        removed
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::annotate::NodeSet;
    use crate::dom::{el, Document, VisitedSet};

    const YEAR: i32 = 2024;

    fn biography(lead: &str) -> Document {
        Document::with_body(
            el("div")
                .child(el("h1").id("firstHeading").text("Jane Roe"))
                .child(el("div").class("mw-parser-output").child(el("p").text(lead))),
        )
    }

    fn annotator() -> Annotator<Document> {
        Annotator::new(AnnotatorConfig::default()).unwrap()
    }

    fn content(doc: &Document, a: &Annotator<Document>) -> crate::dom::NodeId {
        doc.query_selector(None, &a.selectors().content).unwrap()
    }

    // -------------------------------------------------------------------------
    // Initial pass
    // -------------------------------------------------------------------------
    #[test]
    fn test_trigger_runs_once_per_view() {
        let mut doc = biography("Jane Roe (born 1950) wrote a novel in 1975.");
        let mut a = annotator();

        let report = a.trigger(&mut doc, YEAR).unwrap();
        assert_eq!(report.annotated, 2);
        assert_eq!(a.state(), SessionState::Watching);
        assert!(doc.root_flag("data-wiki-age-processed"));
        assert!(a.trigger(&mut doc, YEAR).is_none());
        assert_eq!(a.session().passes(), 1);
    }

    #[test]
    fn test_processed_flag_blocks_initial_pass() {
        let mut doc = biography("Jane Roe (born 1950) wrote in 1975.");
        doc.set_root_flag("data-wiki-age-processed", true);
        let mut a = annotator();
        assert!(a.trigger(&mut doc, YEAR).is_none());
        assert_eq!(a.state(), SessionState::Dormant);
    }

    #[test]
    fn test_no_birth_year_goes_dormant() {
        let mut doc = biography("Rome is a city. In 1975 it hosted something.");
        let mut a = annotator();
        assert!(a.trigger(&mut doc, YEAR).is_none());
        assert_eq!(a.state(), SessionState::Dormant);
        assert!(!a.session().watcher().is_armed());
        assert!(!doc.root_flag("data-wiki-age-processed"));

        let root = content(&doc, &a);
        doc.build(root, el("p").text("In 1980."))
            .unwrap();
        let records = doc.take_records();
        assert_eq!(a.on_mutations(&doc, &records, 0.0), None);
    }

    // -------------------------------------------------------------------------
    // Mutation re-pass
    // -------------------------------------------------------------------------
    #[test]
    fn test_mutation_schedules_debounced_repass() {
        let mut doc = biography("Jane Roe (born 1950) is a writer.");
        let mut a = annotator();
        a.trigger(&mut doc, YEAR);
        doc.take_records();

        let root = content(&doc, &a);
        doc.build(root, el("p").text("In 1990 she moved.")).unwrap();
        let records = doc.take_records();

        assert_eq!(a.on_mutations(&doc, &records, 1000.0), Some(1300.0));
        assert_eq!(a.state(), SessionState::DebouncePending);
        assert!(a.poll(&mut doc, 1200.0).is_none());

        let report = a.poll(&mut doc, 1300.0).unwrap();
        assert_eq!(report.annotated, 1);
        assert_eq!(a.state(), SessionState::Watching);
        assert!(doc.text_content(root).contains("1990(age 40)"));
    }

    #[test]
    fn test_mutations_outside_content_ignored() {
        let mut doc = biography("Jane Roe (born 1950) is a writer.");
        let mut a = annotator();
        a.trigger(&mut doc, YEAR);
        doc.take_records();

        let root = doc.root();
        doc.build(root, el("div").class("sidebar").text("1999")).unwrap();
        let records = doc.take_records();
        assert_eq!(a.on_mutations(&doc, &records, 0.0), None);
        assert_eq!(a.state(), SessionState::Watching);
    }

    #[test]
    fn test_removed_fragments_are_forgotten() {
        let mut doc = biography("Jane Roe (born 1950) is a writer.");
        let mut a = annotator();
        a.trigger(&mut doc, YEAR);
        let visited_before = a.session().visited().len();

        let root = content(&doc, &a);
        let first = doc.children(root)[0];
        doc.remove(first).unwrap();
        doc.build(root, el("p").text("Replaced.")).unwrap();
        let records = doc.take_records();
        a.on_mutations(&doc, &records, 0.0);
        a.poll(&mut doc, 300.0).unwrap();

        // only the new paragraph's leaf remains
        assert!(visited_before > 1);
        assert_eq!(a.session().visited().len(), 1);
    }

    // -------------------------------------------------------------------------
    // Navigation
    // -------------------------------------------------------------------------
    #[test]
    fn test_navigate_resets_view() {
        let mut doc = biography("Jane Roe (born 1950) wrote in 1975.");
        let mut a = annotator();
        a.trigger(&mut doc, YEAR);
        let seen: Vec<_> = a.session().visited().iter().copied().collect();
        assert!(!seen.is_empty());

        let removed = a.navigate(&mut doc);
        assert_eq!(removed, 2);
        assert_eq!(a.state(), SessionState::Idle);
        assert_eq!(a.views(), 2);
        assert!(!doc.root_flag("data-wiki-age-processed"));
        assert!(doc.query_selector(None, &a.selectors().markers).is_none());
        let fresh: &NodeSet = a.session().visited();
        assert!(seen.iter().all(|id| !fresh.contains(id)));

        // markers come back on the next trigger
        let report = a.trigger(&mut doc, YEAR).unwrap();
        assert_eq!(report.annotated, 2);
    }
}
