//! Year rules - ordered regex extractors with first-match semantics
//!
//! A `RuleChain` is tried rule by rule; each rule looks at one text source
//! (panel rows, lead paragraphs or title) and yields the first 4-digit year
//! its capture group recovers. The first rule that yields wins.

use super::PageText;
use regex::Regex;
use serde::Serialize;

// ==================== PATTERN PIECES ====================

/// Month names and abbreviations, longest alternatives first.
const MONTH: &str = r"(?:January|February|March|April|May|June|July|August|September|October|November|December|Sept|Jan|Feb|Mar|Apr|Jun|Jul|Aug|Sep|Oct|Nov|Dec)\.?";

/// Optional day/month prefix in front of a year: "12 May ", "May 12, ", "May ".
fn date_prefix() -> String {
    format!(
        r"(?:\d{{1,2}}\s+{m}\s+|{m}\s+\d{{1,2}}(?:st|nd|rd|th)?,?\s+|{m}\s+)?",
        m = MONTH
    )
}

/// Dash variants used in year ranges.
const DASH: &str = r"[–—-]";

/// Lowercase `b.` abbreviation standing on its own, e.g. `(b. 1901` but not `Club.`.
const B_ABBR: &str = r"(?:^|[\s(\[;,])(?-i:b\.)";

/// Lowercase `d.` abbreviation standing on its own, e.g. `, d. 1977` but not `Ph.D.`.
const D_ABBR: &str = r"(?:^|[\s(\[;,])(?-i:d\.)";

// ==================== TYPES ====================

/// Where a rule looks.
#[derive(Serialize, Clone, Copy, Debug, PartialEq, Eq)]
pub enum Source {
    /// Metadata panel rows carrying the chain's label
    Panel,
    /// Leading paragraphs of the article body
    Lead,
    /// Page heading
    Title,
}

/// A single extractor: pattern + capture group holding the year.
#[derive(Debug, Clone)]
pub struct YearRule {
    name: &'static str,
    source: Source,
    pattern: Regex,
    group: usize,
}

impl YearRule {
    /// Build from a pattern literal. Patterns are case-insensitive except where
    /// they opt out with `(?-i:..)`.
    fn new(name: &'static str, source: Source, pattern: &str, group: usize) -> Self {
        Self {
            name,
            source,
            pattern: Regex::new(&format!("(?i){}", pattern)).unwrap(),
            group,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn source(&self) -> Source {
        self.source
    }

    /// Year recovered from the first match in `text`.
    pub fn apply(&self, text: &str) -> Option<i32> {
        self.pattern
            .captures(text)
            .and_then(|caps| caps.get(self.group))
            .and_then(|m| m.as_str().parse().ok())
    }
}

/// Successful rule application.
#[derive(Serialize, Clone, Copy, Debug, PartialEq, Eq)]
pub struct YearHit {
    pub year: i32,
    pub rule: &'static str,
    pub source: Source,
}

/// Ordered rules plus the label that selects panel rows.
#[derive(Debug, Clone)]
pub struct RuleChain {
    panel_label: Regex,
    rules: Vec<YearRule>,
}

impl RuleChain {
    pub fn rules(&self) -> &[YearRule] {
        &self.rules
    }

    /// Panel rows this chain inspects, in document order.
    pub fn labelled_rows<'p>(&self, page: &'p PageText) -> Vec<&'p str> {
        page.panel_rows
            .iter()
            .map(String::as_str)
            .filter(|row| self.panel_label.is_match(row))
            .collect()
    }

    /// First rule, in order, that recovers a year from its source.
    pub fn first_match(&self, page: &PageText) -> Option<YearHit> {
        self.rules.iter().find_map(|rule| {
            let hit = |text: &str| {
                rule.apply(text).map(|year| YearHit {
                    year,
                    rule: rule.name,
                    source: rule.source,
                })
            };
            match rule.source {
                Source::Panel => self.labelled_rows(page).into_iter().find_map(hit),
                Source::Lead => page.lead.iter().map(String::as_str).find_map(hit),
                Source::Title => page.title.as_deref().and_then(hit),
            }
        })
    }

    /// Birth-year battery: panel, then lead prose, then title.
    pub fn birth() -> Self {
        let date = date_prefix();
        let born = format!(r"(?:{}|\bborn)", B_ABBR);
        Self {
            panel_label: Regex::new(r"(?i)\bborn\b|\bb\.|birth date").unwrap(),
            rules: vec![
                YearRule::new("panel.year", Source::Panel, r"\b(\d{4})\b", 1),
                YearRule::new(
                    "panel.month_year",
                    Source::Panel,
                    &format!(r"\b{}\s+(?:\d{{1,2}}(?:st|nd|rd|th)?,?\s+)?(\d{{4}})\b", MONTH),
                    1,
                ),
                YearRule::new(
                    "panel.day_month_year",
                    Source::Panel,
                    &format!(r"\b\d{{1,2}}\s+{}\s+(\d{{4}})\b", MONTH),
                    1,
                ),
                YearRule::new(
                    "panel.born_year",
                    Source::Panel,
                    &format!(r"{}\s*(\d{{4}})\b", born),
                    1,
                ),
                YearRule::new(
                    "panel.born_month_day_year",
                    Source::Panel,
                    &format!(r"{}\s*{}\s+\d{{1,2}},?\s+(\d{{4}})\b", born, MONTH),
                    1,
                ),
                YearRule::new(
                    "lead.paren_born",
                    Source::Lead,
                    &format!(r"\([^()]*?\bborn\s+{}(\d{{4}})\b", date),
                    1,
                ),
                YearRule::new(
                    "lead.born",
                    Source::Lead,
                    &format!(r"\bborn\s+{}(\d{{4}})\b", date),
                    1,
                ),
                YearRule::new(
                    "lead.born_year",
                    Source::Lead,
                    &format!(r"{}\s*(\d{{4}})\b", born),
                    1,
                ),
                YearRule::new(
                    "lead.range_start",
                    Source::Lead,
                    &format!(r"(?:\([^()]*?|{}\s*){}(\d{{4}})\s*{}", B_ABBR, date, DASH),
                    1,
                ),
                YearRule::new("title.year", Source::Title, r"\((\d{4})\)", 1),
                YearRule::new(
                    "title.range_start",
                    Source::Title,
                    &format!(r"\((\d{{4}})\s*{}\s*\d{{4}}\)", DASH),
                    1,
                ),
                YearRule::new("title.born", Source::Title, r"\(born\s+(\d{4})\)", 1),
            ],
        }
    }

    /// Death-year battery, tried only once a birth year is known.
    pub fn death() -> Self {
        let date = date_prefix();
        Self {
            panel_label: Regex::new(r"(?i)\bdied\b|death date").unwrap(),
            rules: vec![
                YearRule::new("panel.year", Source::Panel, r"\b(\d{4})\b", 1),
                YearRule::new(
                    "lead.died",
                    Source::Lead,
                    &format!(r"(?:\bdied|{})\s*(?:on\s+|in\s+)?{}(\d{{4}})\b", D_ABBR, date),
                    1,
                ),
                YearRule::new(
                    "lead.range_end",
                    Source::Lead,
                    &format!(r"\b\d{{4}}\s*{}\s*{}(\d{{4}})\b", DASH, date),
                    1,
                ),
                YearRule::new(
                    "title.range_end",
                    Source::Title,
                    &format!(r"\(\d{{4}}\s*{}\s*(\d{{4}})\)", DASH),
                    1,
                ),
            ],
        }
    }
}

// ==================== TESTS ====================
