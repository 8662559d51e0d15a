//! Annotation Engine
//!
//! One pass walks the text leaves under the content root in document order,
//! rejects the ones that must not be touched, and rewrites each remaining
//! leaf that mentions a qualifying year into
//! `text, [year (age N)], text, [year (age N)], ..., text`.
//!
//! Every leaf the pass looks at goes into the visited set, rewritten or not,
//! and so do the literal text pieces a rewrite creates. A later pass over
//! the same tree therefore only ever inspects leaves it has not seen, and it
//! never descends into an inserted wrapper because wrappers are an excluded
//! region. Splice failures are counted and skipped; a pass never fails.

pub mod scan;
pub mod visited;

pub use scan::*;
pub use visited::*;

use crate::config::CompiledSelectors;
use crate::dom::{MarkerTemplate, PageTree, Piece, SelectorList, VisitedSet};
use serde::Serialize;

// =============================================================================
// Types
// =============================================================================

/// Outcome of one annotation pass.
#[derive(Serialize, Clone, Copy, Debug, Default, PartialEq)]
pub struct PassReport {
    /// Text leaves found under the root
    pub candidates: usize,
    /// Years annotated
    pub annotated: usize,
    /// Leaves replaced by a rewritten sequence
    pub rewritten: usize,
    /// Leaves skipped because an earlier pass saw them
    pub skipped_visited: usize,
    /// Leaves inside excluded or non-rendered regions
    pub excluded: usize,
    /// Blank leaves, leaves without a year, leaves without a qualifying year
    pub rejected: usize,
    /// Rewrites the document refused (leaf or parent went away)
    pub failed: usize,
    pub elapsed_ms: f64,
}

// =============================================================================
// AnnotationEngine
// =============================================================================

pub struct AnnotationEngine {
    scanner: YearScanner,
    excluded: SelectorList,
    non_rendered: Option<SelectorList>,
    template: MarkerTemplate,
}

impl AnnotationEngine {
    pub fn new(selectors: &CompiledSelectors, template: MarkerTemplate) -> Self {
        Self {
            scanner: YearScanner::new(),
            excluded: selectors.excluded.clone(),
            non_rendered: selectors.non_rendered.clone(),
            template,
        }
    }

    pub fn scanner(&self) -> &YearScanner {
        &self.scanner
    }

    /// Annotate every unvisited leaf under `root`.
    pub fn annotate<T: PageTree>(
        &self,
        tree: &mut T,
        root: &T::Node,
        window: &YearWindow,
        visited: &mut T::Visited,
    ) -> PassReport {
        let start = instant::Instant::now();
        let mut report = PassReport::default();

        // Collected up front: splicing must not disturb the traversal.
        let fragments = tree.text_fragments(root);
        report.candidates = fragments.len();

        for fragment in fragments {
            if visited.contains(&fragment) {
                report.skipped_visited += 1;
                continue;
            }
            let Some(text) = tree.fragment_text(&fragment) else {
                report.failed += 1;
                continue;
            };
            visited.insert(&fragment);

            if text.trim().is_empty() {
                report.rejected += 1;
                continue;
            }
            if self.is_excluded(tree, &fragment) {
                report.excluded += 1;
                continue;
            }
            if !self.scanner.has_year_run(&text) {
                report.rejected += 1;
                continue;
            }
            let Some(pieces) = self.rewrite(&text, window) else {
                report.rejected += 1;
                continue;
            };

            let years = pieces
                .iter()
                .filter(|p| matches!(p, Piece::Year { .. }))
                .count();
            match tree.splice(&fragment, &pieces, &self.template) {
                Ok(literals) => {
                    for literal in &literals {
                        visited.insert(literal);
                    }
                    report.annotated += years;
                    report.rewritten += 1;
                }
                Err(err) => {
                    log::debug!("[AnnotationEngine] skipped {:?}: {}", fragment, err);
                    report.failed += 1;
                }
            }
        }

        report.elapsed_ms = start.elapsed().as_secs_f64() * 1000.0;
        log::debug!(
            "[AnnotationEngine] {} years in {} leaves ({} candidates, {} already visited) in {:.2}ms",
            report.annotated,
            report.rewritten,
            report.candidates,
            report.skipped_visited,
            report.elapsed_ms
        );
        report
    }

    /// Inside an excluded region, under a non-rendered element, or orphaned.
    fn is_excluded<T: PageTree>(&self, tree: &T, fragment: &T::Node) -> bool {
        let Some(parent) = tree.parent_element(fragment) else {
            return true;
        };
        if tree.closest(&parent, &self.excluded).is_some() {
            return true;
        }
        self.non_rendered
            .as_ref()
            .map_or(false, |tags| tree.closest(&parent, tags).is_some())
    }

    /// Split `text` around qualifying years. `None` when no year qualifies.
    pub fn rewrite(&self, text: &str, window: &YearWindow) -> Option<Vec<Piece>> {
        let mut pieces = Vec::new();
        let mut last = 0;
        let mut any = false;

        for m in self.scanner.scan(text) {
            if !window.contains(m.year) {
                continue;
            }
            if m.start > last {
                pieces.push(Piece::Text(text[last..m.start].to_string()));
            }
            pieces.push(Piece::Year {
                text: text[m.start..m.end].to_string(),
                age: window.age(m.year),
            });
            last = m.end;
            any = true;
        }

        if !any {
            return None;
        }
        if last < text.len() {
            pieces.push(Piece::Text(text[last..].to_string()));
        }
        Some(pieces)
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AnnotatorConfig;
    use crate::dom::{el, Document, NodeId};

    const CONTENT: &str = ".mw-parser-output";

    fn engine() -> (AnnotationEngine, CompiledSelectors) {
        let config = AnnotatorConfig::default();
        let selectors = config.compile().unwrap();
        (AnnotationEngine::new(&selectors, config.marker_template()), selectors)
    }

    fn content(doc: &Document) -> NodeId {
        doc.query_selector(None, &SelectorList::parse(CONTENT).unwrap())
            .unwrap()
    }

    fn page(paragraphs: &[&str]) -> Document {
        Document::with_body(
            el("div")
                .class("mw-parser-output")
                .children(paragraphs.iter().map(|t| el("p").text(t))),
        )
    }

    // -------------------------------------------------------------------------
    // Rewrite
    // -------------------------------------------------------------------------
    #[test]
    fn test_rewrite_pieces() {
        let (engine, _) = engine();
        let window = YearWindow::new(1950, Some(2000), 2024);
        let pieces = engine
            .rewrite("From 1945 to 1975 and 2000, not 2005.", &window)
            .unwrap();
        assert_eq!(
            pieces,
            vec![
                Piece::Text("From 1945 to ".to_string()),
                Piece::Year { text: "1975".to_string(), age: 25 },
                Piece::Text(" and ".to_string()),
                Piece::Year { text: "2000".to_string(), age: 50 },
                Piece::Text(", not 2005.".to_string()),
            ]
        );
    }

    #[test]
    fn test_rewrite_none_when_nothing_qualifies() {
        let (engine, _) = engine();
        let window = YearWindow::new(1950, Some(2000), 2024);
        assert!(engine.rewrite("In 1900 and 2010.", &window).is_none());
    }

    // -------------------------------------------------------------------------
    // Pass behaviour
    // -------------------------------------------------------------------------
    #[test]
    fn test_annotates_qualifying_years() {
        let (engine, _) = engine();
        let mut doc = page(&["In 1975 she moved to Paris.", "Nothing here."]);
        let root = content(&doc);
        let mut visited = NodeSet::new();
        let window = YearWindow::new(1950, Some(2000), 2024);

        let report = engine.annotate(&mut doc, &root, &window, &mut visited);

        assert_eq!(report.annotated, 1);
        assert_eq!(report.rewritten, 1);
        assert_eq!(
            doc.text_content(root),
            "In 1975(age 25) she moved to Paris.Nothing here."
        );
    }

    #[test]
    fn test_second_pass_is_a_no_op() {
        let (engine, _) = engine();
        let mut doc = page(&["In 1975 and 1980 things happened.", "Born 1950."]);
        let root = content(&doc);
        let mut visited = NodeSet::new();
        let window = YearWindow::new(1950, None, 2024);

        let first = engine.annotate(&mut doc, &root, &window, &mut visited);
        let html_after_first = crate::dom::to_html(&doc, root);
        let second = engine.annotate(&mut doc, &root, &window, &mut visited);

        assert_eq!(first.annotated, 3);
        assert_eq!(second.annotated, 0);
        assert_eq!(second.rewritten, 0);
        assert_eq!(crate::dom::to_html(&doc, root), html_after_first);
    }

    #[test]
    fn test_markers_not_rewrapped_with_fresh_visited_set() {
        let (engine, _) = engine();
        let mut doc = page(&["In 1975 she moved."]);
        let root = content(&doc);
        let window = YearWindow::new(1950, None, 2024);

        engine.annotate(&mut doc, &root, &window, &mut NodeSet::new());
        // a fresh set forgets everything; exclusion of wrappers must still hold
        let again = engine.annotate(&mut doc, &root, &window, &mut NodeSet::new());

        assert_eq!(again.annotated, 0);
        assert!(again.excluded >= 2);
        let markers = doc.query_selector_all(
            Some(root),
            &SelectorList::parse(".wiki-age-annotation").unwrap(),
        );
        assert_eq!(markers.len(), 1);
    }

    #[test]
    fn test_excluded_regions_skipped() {
        let (engine, _) = engine();
        let mut doc = Document::with_body(
            el("div")
                .class("mw-parser-output")
                .child(el("p").text("Text 1980").child(el("sup").class("reference").text("[1990]")))
                .child(el("table").class("infobox").child(el("tr").child(el("td").text("1985"))))
                .child(el("div").class("navbox").text("1981"))
                .child(el("script").text("var y = 1982;"))
                .child(el("style").text(".x { width: 1983 }")),
        );
        let root = content(&doc);
        let window = YearWindow::new(1950, None, 2024);
        let report = engine.annotate(&mut doc, &root, &window, &mut NodeSet::new());

        assert_eq!(report.annotated, 1);
        assert_eq!(report.excluded, 5);
        assert!(doc.text_content(root).starts_with("Text 1980(age 30)[1990]"));
    }

    #[test]
    fn test_new_content_only_is_scanned() {
        let (engine, _) = engine();
        let mut doc = page(&["In 1975."]);
        let root = content(&doc);
        let mut visited = NodeSet::new();
        let window = YearWindow::new(1950, None, 2024);
        engine.annotate(&mut doc, &root, &window, &mut visited);

        doc.build(root, el("p").text("Later, in 1990.")).unwrap();
        let report = engine.annotate(&mut doc, &root, &window, &mut visited);

        assert_eq!(report.annotated, 1);
        assert!(report.skipped_visited >= 1);
    }

    #[test]
    fn test_failed_splice_does_not_abort_pass() {
        struct Flaky<'a>(&'a mut Document, NodeId);
        impl<'a> PageTree for Flaky<'a> {
            type Node = NodeId;
            type Visited = NodeSet;
            fn query(&self, s: Option<&NodeId>, sel: &SelectorList) -> Option<NodeId> {
                self.0.query(s, sel)
            }
            fn query_all(&self, s: Option<&NodeId>, sel: &SelectorList) -> Vec<NodeId> {
                self.0.query_all(s, sel)
            }
            fn text_content(&self, n: &NodeId) -> String {
                PageTree::text_content(&*self.0, n)
            }
            fn text_fragments(&self, r: &NodeId) -> Vec<NodeId> {
                self.0.text_fragments(r)
            }
            fn fragment_text(&self, f: &NodeId) -> Option<String> {
                self.0.fragment_text(f)
            }
            fn parent_element(&self, n: &NodeId) -> Option<NodeId> {
                self.0.parent_element(n)
            }
            fn closest(&self, e: &NodeId, sel: &SelectorList) -> Option<NodeId> {
                PageTree::closest(&*self.0, e, sel)
            }
            fn tag_name(&self, e: &NodeId) -> Option<String> {
                self.0.tag_name(e)
            }
            fn is_within(&self, a: &NodeId, n: &NodeId) -> bool {
                self.0.is_within(a, n)
            }
            fn splice(
                &mut self,
                f: &NodeId,
                p: &[Piece],
                t: &MarkerTemplate,
            ) -> Result<Vec<NodeId>, crate::error::DomError> {
                // the first paragraph disappears right before its rewrite
                if let Some(parent) = self.0.parent(*f) {
                    if parent == self.1 {
                        self.0.remove(parent)?;
                    }
                }
                self.0.splice(f, p, t)
            }
            fn unwrap_markers(&mut self, w: &SelectorList, m: &SelectorList) -> usize {
                self.0.unwrap_markers(w, m)
            }
            fn root_flag(&self, n: &str) -> bool {
                self.0.root_flag(n)
            }
            fn set_root_flag(&mut self, n: &str, on: bool) {
                self.0.set_root_flag(n, on)
            }
        }

        let (engine, _) = engine();
        let mut doc = page(&["In 1975.", "In 1980."]);
        let root = content(&doc);
        let first_p = doc.children(root)[0];
        let window = YearWindow::new(1950, None, 2024);

        let report = {
            let mut flaky = Flaky(&mut doc, first_p);
            engine.annotate(&mut flaky, &root, &window, &mut NodeSet::new())
        };

        assert_eq!(report.failed, 1);
        assert_eq!(report.annotated, 1);
        assert_eq!(doc.text_content(root), "In 1980(age 30).");
    }
}
