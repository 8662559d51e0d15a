//! Selector - the CSS subset used by the annotator configuration
//!
//! Supported grammar:
//! - type selectors and `*`: `p`, `table`
//! - id and class qualifiers: `#firstHeading`, `.infobox.vcard`
//! - descendant (whitespace) and child (`>`) combinators
//! - selector lists: `.reference, .navbox`
//!
//! The original text is kept next to the parsed form so a browser backend can
//! hand it to `querySelector` verbatim while the in-memory document matches
//! the parsed form.

use crate::error::SelectorError;
use std::fmt;

// ==================== MATCHING SUBJECT ====================

/// An element as seen by the selector matcher.
pub trait Subject: Sized {
    /// Lowercase tag name.
    fn tag_name(&self) -> &str;
    fn id(&self) -> Option<&str>;
    fn has_class(&self, class: &str) -> bool;
    /// Parent element, if any.
    fn parent(&self) -> Option<Self>;
}

// ==================== TYPES ====================

/// One compound selector, e.g. `p.lead#intro`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Compound {
    tag: Option<String>,
    id: Option<String>,
    classes: Vec<String>,
}

impl Compound {
    fn matches<S: Subject>(&self, el: &S) -> bool {
        if let Some(tag) = &self.tag {
            if !el.tag_name().eq_ignore_ascii_case(tag) {
                return false;
            }
        }
        if let Some(id) = &self.id {
            if el.id() != Some(id.as_str()) {
                return false;
            }
        }
        self.classes.iter().all(|c| el.has_class(c))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Combinator {
    Descendant,
    Child,
}

/// A chain of compounds joined by combinators, e.g. `.mw-parser-output > p`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComplexSelector {
    compounds: Vec<Compound>,
    /// `combinators[i]` sits between `compounds[i]` and `compounds[i + 1]`
    combinators: Vec<Combinator>,
}

impl ComplexSelector {
    /// Right-to-left match with backtracking over descendant combinators.
    fn matches_at<S: Subject>(&self, idx: usize, el: &S) -> bool {
        if !self.compounds[idx].matches(el) {
            return false;
        }
        if idx == 0 {
            return true;
        }
        match self.combinators[idx - 1] {
            Combinator::Child => el
                .parent()
                .map_or(false, |parent| self.matches_at(idx - 1, &parent)),
            Combinator::Descendant => {
                let mut ancestor = el.parent();
                while let Some(candidate) = ancestor {
                    if self.matches_at(idx - 1, &candidate) {
                        return true;
                    }
                    ancestor = candidate.parent();
                }
                false
            }
        }
    }

    pub fn matches<S: Subject>(&self, el: &S) -> bool {
        self.matches_at(self.compounds.len() - 1, el)
    }
}

/// A parsed, comma-separated selector list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectorList {
    source: String,
    selectors: Vec<ComplexSelector>,
}

impl SelectorList {
    pub fn parse(source: &str) -> Result<Self, SelectorError> {
        if source.trim().is_empty() {
            return Err(SelectorError::Empty);
        }
        let selectors = Parser { src: source, pos: 0 }.list()?;
        Ok(Self {
            source: source.trim().to_string(),
            selectors,
        })
    }

    /// Selector text as written, suitable for `querySelector`.
    pub fn as_str(&self) -> &str {
        &self.source
    }

    pub fn len(&self) -> usize {
        self.selectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.selectors.is_empty()
    }

    /// True if any selector in the list matches the element.
    pub fn matches<S: Subject>(&self, el: &S) -> bool {
        self.selectors.iter().any(|s| s.matches(el))
    }

    /// Nearest inclusive ancestor matching the list.
    pub fn closest<S: Subject>(&self, el: S) -> Option<S> {
        let mut current = Some(el);
        while let Some(candidate) = current {
            if self.matches(&candidate) {
                return Some(candidate);
            }
            current = candidate.parent();
        }
        None
    }
}

impl fmt::Display for SelectorList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

// ==================== PARSER ====================

fn is_ident(c: char) -> bool {
    c.is_alphanumeric() || c == '-' || c == '_'
}

struct Parser<'a> {
    src: &'a str,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn peek(&self) -> Option<char> {
        self.src[self.pos..].chars().next()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    /// Returns true if any whitespace was consumed.
    fn skip_ws(&mut self) -> bool {
        let start = self.pos;
        while matches!(self.peek(), Some(c) if c.is_whitespace()) {
            self.bump();
        }
        self.pos > start
    }

    fn ident(&mut self) -> &'a str {
        let start = self.pos;
        while matches!(self.peek(), Some(c) if is_ident(c)) {
            self.bump();
        }
        &self.src[start..self.pos]
    }

    fn unexpected(&self) -> SelectorError {
        match self.peek() {
            Some(found) => SelectorError::Unexpected {
                found,
                offset: self.pos,
            },
            None => SelectorError::DanglingCombinator,
        }
    }

    fn qualifier(&mut self) -> Result<String, SelectorError> {
        let name = self.ident();
        if name.is_empty() {
            return Err(self.unexpected());
        }
        Ok(name.to_string())
    }

    fn compound(&mut self) -> Result<Option<Compound>, SelectorError> {
        let mut compound = Compound::default();
        let mut seen = false;

        match self.peek() {
            Some('*') => {
                self.bump();
                seen = true;
            }
            Some(c) if is_ident(c) => {
                compound.tag = Some(self.ident().to_ascii_lowercase());
                seen = true;
            }
            _ => {}
        }

        loop {
            match self.peek() {
                Some('#') => {
                    self.bump();
                    compound.id = Some(self.qualifier()?);
                }
                Some('.') => {
                    self.bump();
                    compound.classes.push(self.qualifier()?);
                }
                _ => break,
            }
            seen = true;
        }

        Ok(seen.then_some(compound))
    }

    fn complex(&mut self) -> Result<ComplexSelector, SelectorError> {
        self.skip_ws();
        let first = match self.compound()? {
            Some(c) => c,
            None if matches!(self.peek(), None | Some(',')) => return Err(SelectorError::Empty),
            None => return Err(self.unexpected()),
        };

        let mut compounds = vec![first];
        let mut combinators = Vec::new();

        loop {
            let had_ws = self.skip_ws();
            let combinator = match self.peek() {
                None | Some(',') => break,
                Some('>') => {
                    self.bump();
                    self.skip_ws();
                    Combinator::Child
                }
                Some(_) if had_ws => Combinator::Descendant,
                Some(_) => return Err(self.unexpected()),
            };
            match self.compound()? {
                Some(next) => {
                    combinators.push(combinator);
                    compounds.push(next);
                }
                None if matches!(self.peek(), None | Some(',')) => {
                    return Err(SelectorError::DanglingCombinator)
                }
                None => return Err(self.unexpected()),
            }
        }

        Ok(ComplexSelector {
            compounds,
            combinators,
        })
    }

    fn list(mut self) -> Result<Vec<ComplexSelector>, SelectorError> {
        let mut out = Vec::new();
        loop {
            out.push(self.complex()?);
            match self.peek() {
                Some(',') => {
                    self.bump();
                }
                None => break,
                Some(_) => return Err(self.unexpected()),
            }
        }
        Ok(out)
    }
}

// ==================== TESTS ====================
