//! YearScanner - finds year-shaped numbers in running text
//!
//! A year is a run of exactly four ASCII digits that:
//! - is ASCII word-bounded on both sides (so `19991` and `A1999` never match,
//!   while `1961年` and `é1999` do)
//! - is not preceded by `/` (`12/2024`)
//! - is not followed by a unit suffix, optionally after whitespace
//!   (`1920px`, `1200 em`, `1999%`, `1800 deg`)

use chrono::Datelike;
use regex::Regex;
use serde::Serialize;

/// A year occurrence as byte offsets into the scanned text.
#[derive(Serialize, Clone, Copy, Debug, PartialEq, Eq)]
pub struct YearMatch {
    pub start: usize,
    pub end: usize,
    pub year: i32,
}

#[derive(Debug, Clone)]
pub struct YearScanner {
    candidate: Regex,
    unit_suffix: Regex,
}

impl Default for YearScanner {
    fn default() -> Self {
        Self::new()
    }
}

impl YearScanner {
    pub fn new() -> Self {
        Self {
            candidate: Regex::new(r"[0-9]+").unwrap(),
            unit_suffix: Regex::new(r"^(?:\s*%|\s*(?:px|em|deg)\b)").unwrap(),
        }
    }

    /// Four-digit runs with an ASCII word boundary on both sides.
    fn bounded_runs<'s, 't>(&'s self, text: &'t str) -> impl Iterator<Item = regex::Match<'t>> + 's
    where
        't: 's,
    {
        let is_word = |c: char| c.is_ascii_alphanumeric() || c == '_';
        self.candidate.find_iter(text).filter(move |m| {
            let before = text[..m.start()].chars().next_back();
            let after = text[m.end()..].chars().next();
            m.len() == 4
                && !matches!(before, Some(c) if is_word(c))
                && !matches!(after, Some(c) if is_word(c))
        })
    }

    /// Cheap pre-check: does the text contain any bounded 4-digit run at all?
    pub fn has_year_run(&self, text: &str) -> bool {
        self.bounded_runs(text).next().is_some()
    }

    /// All year occurrences, left to right.
    pub fn scan(&self, text: &str) -> Vec<YearMatch> {
        self.bounded_runs(text)
            .filter(|m| !text[..m.start()].ends_with('/'))
            .filter(|m| !self.unit_suffix.is_match(&text[m.end()..]))
            .filter_map(|m| {
                m.as_str().parse().ok().map(|year| YearMatch {
                    start: m.start(),
                    end: m.end(),
                    year,
                })
            })
            .collect()
    }
}

// =============================================================================
// YearWindow
// =============================================================================

/// Inclusive range of years that get an age marker.
#[derive(Serialize, Clone, Copy, Debug, PartialEq, Eq)]
pub struct YearWindow {
    birth: i32,
    upper: i32,
}

impl YearWindow {
    /// Upper bound is the death year, or `current_year` for a living subject.
    pub fn new(birth: i32, death: Option<i32>, current_year: i32) -> Self {
        Self {
            birth,
            upper: death.unwrap_or(current_year),
        }
    }

    pub fn birth(&self) -> i32 {
        self.birth
    }

    pub fn upper(&self) -> i32 {
        self.upper
    }

    pub fn contains(&self, year: i32) -> bool {
        year >= self.birth && year <= self.upper
    }

    pub fn age(&self, year: i32) -> i32 {
        year - self.birth
    }
}

/// Calendar year on the host clock.
pub fn current_year() -> i32 {
    chrono::Local::now().year()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn years(text: &str) -> Vec<i32> {
        YearScanner::new().scan(text).iter().map(|m| m.year).collect()
    }

    // -------------------------------------------------------------------------
    // Boundary rule
    // -------------------------------------------------------------------------
    #[test]
    fn test_plain_year() {
        assert_eq!(years("In 1999 "), vec![1999]);
        assert_eq!(years("42 1999"), vec![1999]);
        assert_eq!(years("(1999)"), vec![1999]);
        assert_eq!(years("1999, 2004 and 2010."), vec![1999, 2004, 2010]);
    }

    #[test]
    fn test_adjacent_digits_rejected() {
        assert!(years("19991").is_empty());
        assert!(years("119991").is_empty());
        assert!(years("A1999").is_empty());
    }

    #[test]
    fn test_slash_and_units_rejected() {
        assert!(years("12/2024").is_empty());
        assert!(years("500px").is_empty());
        assert!(years("1920px").is_empty());
        assert!(years("1200 px wide").is_empty());
        assert!(years("1999%").is_empty());
        assert!(years("rotate 1800deg").is_empty());
        assert!(years("1800 deg").is_empty());
    }

    #[test]
    fn test_unit_prefix_words_still_match() {
        assert_eq!(years("In 1999 employees struck"), vec![1999]);
        assert_eq!(years("In 1999 degrees were awarded"), vec![1999]);
    }

    #[test]
    fn test_non_ascii_letters_do_not_block() {
        assert_eq!(years("1961年8月4日"), vec![1961]);
        assert_eq!(years("于2008年加入"), vec![2008]);
        assert_eq!(years("é1999 and 1999ü"), vec![1999, 1999]);
        assert!(years("x1999").is_empty());
        assert!(years("1999_a").is_empty());
    }

    #[test]
    fn test_offsets() {
        let found = YearScanner::new().scan("née 1950");
        assert_eq!(found.len(), 1);
        assert_eq!(&"née 1950"[found[0].start..found[0].end], "1950");
    }

    #[test]
    fn test_has_year_run() {
        let scanner = YearScanner::new();
        assert!(scanner.has_year_run("in 2001"));
        assert!(!scanner.has_year_run("in 201 or 20011"));
    }

    // -------------------------------------------------------------------------
    // Window
    // -------------------------------------------------------------------------
    #[test]
    fn test_window_with_death_year() {
        let w = YearWindow::new(1950, Some(2000), 2024);
        assert!(w.contains(1975));
        assert_eq!(w.age(1975), 25);
        assert!(w.contains(2000));
        assert_eq!(w.age(2000), 50);
        assert!(!w.contains(2005));
        assert!(!w.contains(1945));
    }

    #[test]
    fn test_window_capped_at_current_year() {
        let w = YearWindow::new(1990, None, 2024);
        assert!(w.contains(2024));
        assert_eq!(w.age(2024), 34);
        assert!(!w.contains(2030));
    }
}
