//! WikiAge: age annotations for Wikipedia biographies
//!
//! A Rust/WASM content-script core that finds an article subject's birth
//! (and death) year and marks every plausible year in the article body with
//! the subject's age at the time: `1975 (age 25)`.
//!
//! # Architecture
//!
//! ## Extraction
//! - `extract/rules.rs` - YearRule/RuleChain: ordered first-match heuristics
//! - `extract/mod.rs` - YearExtractor: panel → lead prose → title
//!
//! ## Annotation
//! - `annotate/scan.rs` - YearScanner (year boundary rule), YearWindow (ages)
//! - `annotate/visited.rs` - NodeSet: weak-identity visited set
//! - `annotate/mod.rs` - AnnotationEngine: idempotent text-leaf rewriting
//!
//! ## Lifecycle
//! - `watcher.rs` - ChangeWatcher: mutation filter + cancel-and-reschedule debounce
//! - `session.rs` - Annotator: per-page-view state machine
//! - `page.rs` - article gating
//!
//! ## Document layer
//! - `dom/` - PageTree trait, in-memory Document, CSS selector subset
//! - `web/` - WebPage over `web_sys` and the exported entry points (wasm32 only)
//!
//! # Usage (native)
//! ```rust
//! use wikiage::dom::{el, Document};
//! use wikiage::{Annotator, AnnotatorConfig};
//!
//! let mut doc = Document::with_body(
//!     el("div").class("mw-parser-output")
//!         .child(el("p").text("Ada Lovelace (born 1815) published her notes in 1843.")),
//! );
//! let mut annotator: Annotator<Document> = Annotator::new(AnnotatorConfig::wikipedia()).unwrap();
//! let report = annotator.trigger(&mut doc, 2024).unwrap();
//! assert_eq!(report.annotated, 2);
//! assert!(doc.text_content(doc.root()).contains("1843(age 28)"));
//! ```

pub mod annotate;
pub mod config;
pub mod dom;
pub mod error;
pub mod extract;
pub mod page;
pub mod session;
pub mod watcher;

#[cfg(target_arch = "wasm32")]
pub mod web;

#[cfg(test)]
mod tests;

pub use annotate::{AnnotationEngine, PassReport, YearScanner, YearWindow};
pub use config::{AnnotatorConfig, CompiledSelectors, MarkerStyle};
pub use error::{ConfigError, DomError, SelectorError};
pub use extract::{ExtractionResult, YearExtractor};
pub use session::{Annotator, SessionState};
pub use watcher::{ChangeWatcher, Debouncer};

use wasm_bindgen::prelude::*;

// When the `wee_alloc` feature is enabled, use `wee_alloc` as the global
// allocator for smaller WASM bundle size.
#[cfg(feature = "wee_alloc")]
#[global_allocator]
static ALLOC: wee_alloc::WeeAlloc = wee_alloc::WeeAlloc::INIT;

/// Initialize panic hook for better error messages in browser console
#[wasm_bindgen(start)]
pub fn main() {
    #[cfg(feature = "console_error_panic_hook")]
    console_error_panic_hook::set_once();
}

/// Get version information
#[wasm_bindgen]
pub fn version() -> String {
    format!("wikiage v{}", env!("CARGO_PKG_VERSION"))
}
