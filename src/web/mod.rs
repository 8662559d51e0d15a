//! Browser entry points (wasm32 only)
//!
//! # Usage
//! ```javascript,ignore
//! import init, { run, runWithConfig, notifyNavigation, isAnnotatableUrl } from 'wikiage';
//!
//! await init();
//! run();                                  // default Wikipedia configuration
//! runWithConfig({ debug: true });         // or with overrides
//!
//! // from the SPA navigation hook
//! notifyNavigation();
//!
//! // activation side, before injecting the content script
//! if (isAnnotatableUrl(tab.url)) { /* inject */ }
//! ```
//!
//! One `Runtime` lives per page in a thread-local: the `Annotator` with its
//! page-view session, the `MutationObserver` on the document body, and the
//! `setTimeout` handle of the pending re-pass. The runtime exists from the
//! first `run` on, even on pages that are not articles, so a later
//! `notifyNavigation` to an article still annotates it.

pub mod logger;
pub mod page;

pub use page::{WeakNodeSet, WebPage};

use crate::annotate::{current_year, PassReport};
use crate::config::AnnotatorConfig;
use crate::dom::MutationRecord;
use crate::page::{is_annotatable_url, is_article_path};
use crate::session::Annotator;
use std::cell::RefCell;
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use web_sys::{MutationObserver, MutationObserverInit, Node};

thread_local! {
    static RUNTIME: RefCell<Option<Runtime>> = const { RefCell::new(None) };
}

fn now() -> f64 {
    js_sys::Date::now()
}

// =============================================================================
// Runtime
// =============================================================================

struct Runtime {
    annotator: Annotator<WebPage>,
    page: WebPage,
    observer: MutationObserver,
    observing: bool,
    timer: Option<i32>,
    _on_mutation: Closure<dyn FnMut(js_sys::Array, MutationObserver)>,
    on_timeout: Closure<dyn FnMut()>,
}

impl Runtime {
    fn new(config: AnnotatorConfig) -> Result<Self, JsValue> {
        logger::init(config.debug);
        let annotator =
            Annotator::new(config).map_err(|e| JsValue::from_str(&e.to_string()))?;
        let on_mutation = Closure::<dyn FnMut(js_sys::Array, MutationObserver)>::new(
            |records: js_sys::Array, _observer: MutationObserver| handle_mutations(records),
        );
        let observer = MutationObserver::new(on_mutation.as_ref().unchecked_ref())?;
        Ok(Self {
            annotator,
            page: WebPage::current()?,
            observer,
            observing: false,
            timer: None,
            _on_mutation: on_mutation,
            on_timeout: Closure::<dyn FnMut()>::new(handle_timeout),
        })
    }

    /// Initial pass for the current view, then start observing.
    fn start(&mut self) -> Result<Option<PassReport>, JsValue> {
        let report = self.annotator.trigger(&mut self.page, current_year());
        if report.is_some() {
            self.observe()?;
        }
        Ok(report)
    }

    fn observe(&mut self) -> Result<(), JsValue> {
        if self.observing {
            return Ok(());
        }
        // the body outlives content-area swaps; records are filtered to the content area
        let target: Node = match self.page.document().body() {
            Some(body) => body.into(),
            None => match self.annotator.session().content_root() {
                Some(root) => root.clone(),
                None => return Ok(()),
            },
        };
        let init = MutationObserverInit::new();
        init.set_child_list(true);
        init.set_subtree(true);
        init.set_character_data(true);
        let filter = self.annotator.session().watcher().attribute_filter();
        if !filter.is_empty() {
            let names: js_sys::Array = filter.iter().map(|n| JsValue::from_str(n)).collect();
            init.set_attributes(true);
            init.set_attribute_filter(&names);
        }
        self.observer.observe_with_options(&target, &init)?;
        self.observing = true;
        Ok(())
    }

    fn stop(&mut self) {
        self.clear_timer();
        self.observer.disconnect();
        self.observing = false;
    }

    fn clear_timer(&mut self) {
        if let (Some(handle), Some(window)) = (self.timer.take(), web_sys::window()) {
            window.clear_timeout_with_handle(handle);
        }
    }

    fn schedule(&mut self) -> Result<(), JsValue> {
        self.clear_timer();
        let window = web_sys::window().ok_or_else(|| JsValue::from_str("no window"))?;
        let delay = self.annotator.config().debounce_ms as i32;
        let handle = window.set_timeout_with_callback_and_timeout_and_arguments_0(
            self.on_timeout.as_ref().unchecked_ref(),
            delay,
        )?;
        self.timer = Some(handle);
        Ok(())
    }

    /// Drop records our own splices produced.
    fn discard_own_records(&self) {
        if self.observing {
            let _ = self.observer.take_records();
        }
    }
}

fn convert(record: &web_sys::MutationRecord) -> Option<MutationRecord<Node>> {
    let target = record.target()?;
    match record.type_().as_str() {
        "childList" => Some(MutationRecord::ChildList {
            target,
            added: record.added_nodes().length() as usize,
            removed: record.removed_nodes().length() as usize,
        }),
        "attributes" => Some(MutationRecord::Attributes {
            target,
            name: record.attribute_name().unwrap_or_default(),
        }),
        "characterData" => Some(MutationRecord::CharacterData { target }),
        _ => None,
    }
}

fn handle_mutations(records: js_sys::Array) {
    let batch: Vec<MutationRecord<Node>> = records
        .iter()
        .filter_map(|r| r.dyn_into::<web_sys::MutationRecord>().ok())
        .filter_map(|r| convert(&r))
        .collect();
    with_runtime(|rt| {
        if rt.annotator.on_mutations(&rt.page, &batch, now()).is_some() {
            if let Err(err) = rt.schedule() {
                log::warn!("[WikiAge] could not schedule re-pass: {:?}", err);
            }
        }
    });
}

fn handle_timeout() {
    with_runtime(|rt| {
        rt.timer = None;
        // the timer firing means the quiet period is over
        let due = rt.annotator.next_deadline().unwrap_or(0.0).max(now());
        if let Some(report) = rt.annotator.poll(&mut rt.page, due) {
            log::debug!("[WikiAge] re-pass annotated {} years", report.annotated);
        }
        rt.discard_own_records();
    });
}

fn with_runtime(f: impl FnOnce(&mut Runtime)) {
    RUNTIME.with(|cell| match cell.try_borrow_mut() {
        Ok(mut slot) => {
            if let Some(rt) = slot.as_mut() {
                f(rt);
            }
        }
        Err(_) => log::warn!("[WikiAge] runtime busy; callback dropped"),
    });
}

fn to_js(report: Option<PassReport>) -> Result<JsValue, JsValue> {
    match report {
        Some(report) => serde_wasm_bindgen::to_value(&report).map_err(|e| JsValue::from_str(&e.to_string())),
        None => Ok(JsValue::NULL),
    }
}

fn article_page() -> bool {
    web_sys::window()
        .and_then(|w| w.location().pathname().ok())
        .map_or(false, |path| is_article_path(&path))
}

// =============================================================================
// Exports
// =============================================================================

/// Annotate the current article with the default configuration.
/// Returns the initial `PassReport`, or `null` when nothing ran.
#[wasm_bindgen]
pub fn run() -> Result<JsValue, JsValue> {
    RUNTIME.with(|cell| {
        let mut slot = cell.borrow_mut();
        if slot.is_none() {
            *slot = Some(Runtime::new(AnnotatorConfig::wikipedia())?);
        }
        let Some(rt) = slot.as_mut() else {
            return Ok(JsValue::NULL);
        };
        if !article_page() {
            return Ok(JsValue::NULL);
        }
        to_js(rt.start()?)
    })
}

/// Like `run`, replacing any previous configuration. Missing fields use defaults.
#[wasm_bindgen(js_name = runWithConfig)]
pub fn run_with_config(config: JsValue) -> Result<JsValue, JsValue> {
    let config: AnnotatorConfig = if config.is_undefined() || config.is_null() {
        AnnotatorConfig::default()
    } else {
        serde_wasm_bindgen::from_value(config).map_err(|e| JsValue::from_str(&e.to_string()))?
    };
    config
        .validate()
        .map_err(|e| JsValue::from_str(&e.to_string()))?;
    RUNTIME.with(|cell| {
        let mut slot = cell.borrow_mut();
        if let Some(mut old) = slot.take() {
            old.stop();
        }
        let rt = slot.insert(Runtime::new(config)?);
        if !article_page() {
            return Ok(JsValue::NULL);
        }
        to_js(rt.start()?)
    })
}

/// The user is now viewing a different article: reset and annotate afresh.
#[wasm_bindgen(js_name = notifyNavigation)]
pub fn notify_navigation() -> Result<JsValue, JsValue> {
    RUNTIME.with(|cell| {
        let mut slot = cell.borrow_mut();
        if slot.is_none() {
            *slot = Some(Runtime::new(AnnotatorConfig::wikipedia())?);
        }
        let Some(rt) = slot.as_mut() else {
            return Ok(JsValue::NULL);
        };
        rt.stop();
        rt.annotator.navigate(&mut rt.page);
        if !article_page() {
            return Ok(JsValue::NULL);
        }
        to_js(rt.start()?)
    })
}

/// Whether a tab URL should get the content script at all.
#[wasm_bindgen(js_name = isAnnotatableUrl)]
pub fn annotatable_url(url: &str) -> bool {
    is_annotatable_url(url)
}

/// Current state of the page-view session, e.g. `"watching"`.
#[wasm_bindgen(js_name = sessionState)]
pub fn session_state() -> String {
    RUNTIME.with(|cell| {
        cell.borrow()
            .as_ref()
            .map_or("idle", |rt| rt.annotator.state().name())
            .to_string()
    })
}
