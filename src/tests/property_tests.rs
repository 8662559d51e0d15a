use crate::dom::{el, to_html, Document, El, NodeId, SelectorList};
use crate::{Annotator, AnnotatorConfig};

fn sel(s: &str) -> SelectorList {
    SelectorList::parse(s).unwrap()
}

fn page(panel: Vec<(&str, &str)>, paragraphs: &[&str]) -> Document {
    let mut content = el("div").class("mw-parser-output");
    if !panel.is_empty() {
        content = content.child(el("table").class("infobox").children(panel.into_iter().map(
            |(label, value)| {
                el("tr")
                    .child(el("th").text(label))
                    .child(el("td").text(value))
            },
        )));
    }
    Document::with_body(
        el("div")
            .child(el("h1").id("firstHeading").text("Subject"))
            .child(content.children(paragraphs.iter().map(|p| el("p").text(p)))),
    )
}

fn content(doc: &Document) -> NodeId {
    doc.query_selector(None, &sel(".mw-parser-output")).unwrap()
}

fn labels(doc: &Document) -> Vec<String> {
    doc.query_selector_all(None, &sel(".wiki-age-annotation"))
        .into_iter()
        .map(|m| doc.text_content(m))
        .collect()
}

fn annotated_years(doc: &Document) -> Vec<String> {
    doc.query_selector_all(None, &sel(".wiki-year-age-wrapper"))
        .into_iter()
        .filter_map(|w| doc.children(w).first().and_then(|t| doc.text(*t)).map(str::to_string))
        .collect()
}

fn run(doc: &mut Document, current_year: i32) -> Annotator<Document> {
    let mut a = Annotator::new(AnnotatorConfig::default()).unwrap();
    a.trigger(doc, current_year);
    a
}

fn lead(text: &str) -> El {
    el("p").text(text)
}

// ============================================================================
// Idempotence
// ============================================================================

#[test]
fn test_repeated_pass_leaves_document_unchanged() {
    let mut doc = page(
        vec![("Born", "1950")],
        &["Jane (born 1950) started in 1968, retired in 2010.", "In 1975 and 1976."],
    );
    let mut a = run(&mut doc, 2024);
    let root = content(&doc);
    let html = to_html(&doc, root);
    let text = doc.text_content(root);

    for _ in 0..3 {
        let report = a.run_incremental(&mut doc).unwrap();
        assert_eq!(report.annotated, 0);
    }
    assert_eq!(to_html(&doc, root), html);
    assert_eq!(doc.text_content(root), text);
}

#[test]
fn test_no_double_annotation_after_insertions() {
    let mut doc = page(vec![], &["Jane (born 1950) started in 1968."]);
    let mut a = run(&mut doc, 2024);
    let root = content(&doc);

    for text in ["In 1970.", "In 1971.", "In 1970 again."] {
        doc.build(root, lead(text)).unwrap();
        let records = doc.take_records();
        a.on_mutations(&doc, &records, 0.0);
        a.poll(&mut doc, 1_000.0);
    }

    assert_eq!(
        annotated_years(&doc),
        vec!["1950", "1968", "1970", "1971", "1970"]
    );
    // no wrapper ever nests another
    let nested = doc.query_selector_all(None, &sel(".wiki-year-age-wrapper .wiki-year-age-wrapper"));
    assert!(nested.is_empty());
}

// ============================================================================
// Boundary rule in place
// ============================================================================

#[test]
fn test_boundary_rule_on_page() {
    let mut doc = page(
        vec![],
        &[
            "Jane (born 1950) wrote in 1999 a note.",
            "Image 500px wide, dated 12/2024, serial 19991, width 1980px, 1985% growth.",
        ],
    );
    run(&mut doc, 2024);
    assert_eq!(annotated_years(&doc), vec!["1950", "1999"]);
}

// ============================================================================
// Age arithmetic
// ============================================================================

#[test]
fn test_ages_within_life_span() {
    let mut doc = page(
        vec![("Born", "3 March 1950"), ("Died", "4 April 2000")],
        &["Events: 1945, 1975, 2000 and 2005."],
    );
    run(&mut doc, 2024);
    assert_eq!(annotated_years(&doc), vec!["1975", "2000"]);
    assert_eq!(labels(&doc), vec!["(age 25)", "(age 50)"]);
}

#[test]
fn test_living_subject_capped_at_current_year() {
    let mut doc = page(
        vec![("Born", "1990")],
        &["Plans for 2030 were announced in 2024."],
    );
    run(&mut doc, 2024);
    assert_eq!(annotated_years(&doc), vec!["2024"]);
    assert_eq!(labels(&doc), vec!["(age 34)"]);
}

#[test]
fn test_living_academic_keeps_later_years() {
    let mut doc = page(
        vec![],
        &[
            "Jane Roe (born 1950) is an American chemist.",
            "She received her Ph.D. in 1978 from MIT and has taught there since 1985.",
        ],
    );
    let a = run(&mut doc, 2024);
    assert_eq!(a.session().extraction().death_year, None);
    assert_eq!(annotated_years(&doc), vec!["1950", "1978", "1985"]);
    assert_eq!(labels(&doc), vec!["(age 0)", "(age 28)", "(age 35)"]);
}

// ============================================================================
// Precedence
// ============================================================================

#[test]
fn test_panel_precedes_lead() {
    let mut doc = page(vec![("Born:", "1960")], &["X (born 1958) is a singer."]);
    let a = run(&mut doc, 2024);
    assert_eq!(a.session().extraction().birth_year, Some(1960));
}

#[test]
fn test_lead_without_panel() {
    let mut doc = page(vec![], &["X (born 1972) is a singer."]);
    let a = run(&mut doc, 2024);
    assert_eq!(a.session().extraction().birth_year, Some(1972));
    assert_eq!(labels(&doc), vec!["(age 0)"]);
}

#[test]
fn test_strict_preset_skips_tables() {
    let mut doc = Document::with_body(
        el("div").class("mw-parser-output")
            .child(lead("X (born 1972) is a singer."))
            .child(el("table").child(el("tr").child(el("td").text("Album 1999")))),
    );
    let mut a = Annotator::new(AnnotatorConfig::strict()).unwrap();
    let report = a.trigger(&mut doc, 2024).unwrap();
    assert_eq!(report.annotated, 1);
    assert_eq!(annotated_years(&doc), vec!["1972"]);
}
