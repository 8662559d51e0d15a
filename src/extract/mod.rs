//! Year Extractor
//!
//! Finds the subject's birth year and optional death year. The page is first
//! reduced to a `PageText` snapshot (panel row texts, lead paragraph texts,
//! title text), then the birth and death `RuleChain`s run over it. Rule
//! order is the trust order: structured panel, then prose, then title.
//!
//! Extraction never fails. A missing birth year is a normal outcome that
//! simply leaves the page unannotated.

pub mod rules;

pub use rules::*;

use crate::config::CompiledSelectors;
use crate::dom::PageTree;
use serde::Serialize;

// =============================================================================
// Types
// =============================================================================

/// Years found for the article subject. Immutable for the page view.
#[derive(Serialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ExtractionResult {
    pub birth_year: Option<i32>,
    pub death_year: Option<i32>,
    /// Rule that produced `birth_year`
    pub birth_rule: Option<&'static str>,
    /// Rule that produced `death_year`
    pub death_rule: Option<&'static str>,
}

impl ExtractionResult {
    pub fn has_birth_year(&self) -> bool {
        self.birth_year.is_some()
    }
}

/// Plain-text view of the parts of a page the extractor reads.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageText {
    /// Text of every panel row/cell, in document order
    pub panel_rows: Vec<String>,
    /// Leading non-empty paragraphs of the article body
    pub lead: Vec<String>,
    /// Page heading text
    pub title: Option<String>,
}

impl PageText {
    /// Snapshot `tree`. Only the first `lead_paragraphs` non-blank paragraphs are kept.
    pub fn collect<T: PageTree>(tree: &T, selectors: &CompiledSelectors, lead_paragraphs: usize) -> Self {
        // Cells are joined with a space: label and value cells usually sit
        // back to back ("Born" + "12 May 1920") with no whitespace between.
        let row_text = |row: &T::Node| {
            let cells = tree.query_all(Some(row), &selectors.panel_rows);
            if cells.is_empty() {
                tree.text_content(row)
            } else {
                cells
                    .iter()
                    .map(|cell| tree.text_content(cell))
                    .collect::<Vec<_>>()
                    .join(" ")
            }
        };
        let panel_rows = tree
            .query(None, &selectors.panel)
            .map(|panel| {
                tree.query_all(Some(&panel), &selectors.panel_rows)
                    .iter()
                    .map(row_text)
                    .collect()
            })
            .unwrap_or_default();

        let lead = tree
            .query_all(None, &selectors.lead_paragraphs)
            .iter()
            .map(|p| tree.text_content(p))
            .filter(|text| !text.trim().is_empty())
            .take(lead_paragraphs)
            .collect();

        let title = tree
            .query(None, &selectors.title)
            .map(|h| tree.text_content(&h));

        Self {
            panel_rows,
            lead,
            title,
        }
    }
}

// =============================================================================
// YearExtractor
// =============================================================================

/// Birth/death rule chains with compiled patterns.
#[derive(Debug, Clone)]
pub struct YearExtractor {
    birth: RuleChain,
    death: RuleChain,
}

impl Default for YearExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl YearExtractor {
    pub fn new() -> Self {
        Self {
            birth: RuleChain::birth(),
            death: RuleChain::death(),
        }
    }

    /// Run both chains over a snapshot. Death is only looked for once a
    /// birth year exists.
    pub fn extract(&self, page: &PageText) -> ExtractionResult {
        let Some(birth) = self.birth.first_match(page) else {
            log::debug!("[YearExtractor] no birth year found");
            return ExtractionResult::default();
        };
        let death = self.death.first_match(page);

        log::debug!(
            "[YearExtractor] birth={} via {}, death={:?} via {:?}",
            birth.year,
            birth.rule,
            death.map(|d| d.year),
            death.map(|d| d.rule)
        );

        ExtractionResult {
            birth_year: Some(birth.year),
            death_year: death.map(|d| d.year),
            birth_rule: Some(birth.rule),
            death_rule: death.map(|d| d.rule),
        }
    }

    /// Snapshot `tree` and extract.
    pub fn extract_from<T: PageTree>(
        &self,
        tree: &T,
        selectors: &CompiledSelectors,
        lead_paragraphs: usize,
    ) -> ExtractionResult {
        self.extract(&PageText::collect(tree, selectors, lead_paragraphs))
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AnnotatorConfig;
    use crate::dom::{el, Document};

    fn extract(doc: &Document) -> ExtractionResult {
        let selectors = AnnotatorConfig::default().compile().unwrap();
        YearExtractor::new().extract_from(doc, &selectors, 3)
    }

    fn infobox(rows: &[(&str, &str)]) -> crate::dom::El {
        el("table").class("infobox").child(
            el("tbody").children(rows.iter().map(|(label, value)| {
                el("tr")
                    .child(el("th").text(label))
                    .child(el("td").text(value))
            })),
        )
    }

    // -------------------------------------------------------------------------
    // Precedence
    // -------------------------------------------------------------------------
    #[test]
    fn test_panel_beats_lead() {
        let doc = Document::with_body(
            el("div").class("mw-parser-output")
                .child(infobox(&[("Born", "1960")]))
                .child(el("p").text("Someone (born 1958) is a singer.")),
        );
        let result = extract(&doc);
        assert_eq!(result.birth_year, Some(1960));
        assert_eq!(result.birth_rule, Some("panel.year"));
    }

    #[test]
    fn test_lead_only() {
        let doc = Document::with_body(
            el("div").class("mw-parser-output")
                .child(el("p").text("Someone (born 1972) is a singer.")),
        );
        let result = extract(&doc);
        assert_eq!(result.birth_year, Some(1972));
        assert_eq!(result.death_year, None);
    }

    #[test]
    fn test_title_fallback() {
        let doc = Document::with_body(
            el("div")
                .child(el("h1").id("firstHeading").text("Jane Roe (1901–1977)"))
                .child(el("div").class("mw-parser-output").child(el("p").text("A painter."))),
        );
        let result = extract(&doc);
        assert_eq!(result.birth_year, Some(1901));
        assert_eq!(result.death_year, Some(1977));
        assert_eq!(result.death_rule, Some("title.range_end"));
    }

    #[test]
    fn test_no_birth_year_skips_death() {
        let doc = Document::with_body(
            el("div").class("mw-parser-output")
                .child(el("p").text("The treaty died out in 1850 and again 1850–1860.")),
        );
        let result = extract(&doc);
        assert!(!result.has_birth_year());
        assert_eq!(result, ExtractionResult::default());
    }

    // -------------------------------------------------------------------------
    // Death year
    // -------------------------------------------------------------------------
    #[test]
    fn test_panel_death_row() {
        let doc = Document::with_body(
            el("div").class("mw-parser-output").child(infobox(&[
                ("Born", "12 May 1920 London"),
                ("Died", "3 June 2000 (aged 80) Paris"),
            ])),
        );
        let result = extract(&doc);
        assert_eq!(result.birth_year, Some(1920));
        assert_eq!(result.death_year, Some(2000));
    }

    #[test]
    fn test_lead_range_death() {
        let doc = Document::with_body(
            el("div").class("mw-parser-output").child(
                el("p").text("Ada Lovelace (10 December 1815 – 27 November 1852) was a mathematician."),
            ),
        );
        let result = extract(&doc);
        assert_eq!(result.birth_year, Some(1815));
        assert_eq!(result.death_year, Some(1852));
    }

    #[test]
    fn test_doctorate_is_not_a_death() {
        let doc = Document::with_body(
            el("div").class("mw-parser-output")
                .child(el("p").text("Jane Roe (born 1950) is an American chemist."))
                .child(el("p").text(
                    "She received her Ph.D. in 1978 from MIT and has taught there since 1985.",
                )),
        );
        let result = extract(&doc);
        assert_eq!(result.birth_year, Some(1950));
        assert_eq!(result.death_year, None);
        assert_eq!(result.death_rule, None);
    }

    // -------------------------------------------------------------------------
    // Lead window
    // -------------------------------------------------------------------------
    #[test]
    fn test_blank_paragraphs_do_not_count() {
        let doc = Document::with_body(
            el("div").class("mw-parser-output")
                .child(el("p").class("mw-empty-elt").text("  "))
                .child(el("p").text("First."))
                .child(el("p").text("Second."))
                .child(el("p").text("Third, born 1944.")),
        );
        assert_eq!(extract(&doc).birth_year, Some(1944));
    }

    #[test]
    fn test_fourth_paragraph_ignored() {
        let doc = Document::with_body(
            el("div").class("mw-parser-output")
                .child(el("p").text("First."))
                .child(el("p").text("Second."))
                .child(el("p").text("Third."))
                .child(el("p").text("Fourth, born 1944.")),
        );
        assert_eq!(extract(&doc).birth_year, None);
    }
}
