//! Configuration types and defaults for the annotator
//!
//! Selectors are kept as CSS text so the same configuration drives both the
//! browser backend (`querySelector`) and the in-memory `Document`.
//! `AnnotatorConfig::compile` parses them once per page view.

use crate::dom::{MarkerTemplate, SelectorList};
use crate::error::ConfigError;
use serde::{Deserialize, Serialize};

/// Range accepted for `lead_paragraphs`.
pub const LEAD_PARAGRAPH_RANGE: std::ops::RangeInclusive<usize> = 3..=5;

// =============================================================================
// Marker Style
// =============================================================================

/// Inline style profile of the `(age N)` marker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MarkerStyle {
    pub color: String,
    pub padding: String,
    pub border_radius: String,
    pub font_size: String,
    pub italic: bool,
    pub margin_left: String,
}

impl Default for MarkerStyle {
    fn default() -> Self {
        Self {
            color: "#555".to_string(),
            padding: "1px 3px".to_string(),
            border_radius: "2px".to_string(),
            font_size: "0.88em".to_string(),
            italic: true,
            margin_left: "3px".to_string(),
        }
    }
}

impl MarkerStyle {
    /// CSS declarations for the marker element.
    pub fn marker_css(&self) -> String {
        let font_style = if self.italic { "italic" } else { "normal" };
        format!(
            "color: {}; padding: {}; border-radius: {}; font-size: {}; font-style: {}; \
             margin-left: {}; vertical-align: baseline; cursor: default; white-space: nowrap;",
            self.color, self.padding, self.border_radius, self.font_size, font_style, self.margin_left
        )
    }

    /// CSS declarations for the wrapper keeping year and marker on one line.
    pub fn wrapper_css(&self) -> String {
        "white-space: nowrap;".to_string()
    }
}

// =============================================================================
// Main Configuration
// =============================================================================

/// Annotator configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnnotatorConfig {
    /// Main article body. Default: `.mw-parser-output`
    pub content_selector: String,
    /// Metadata panel. Default: `.infobox, .infobox_v3`
    pub panel_selector: String,
    /// Rows and cells scanned inside the panel. Default: `tr, th, td`
    pub panel_row_selector: String,
    /// Lead prose paragraphs. Default: `.mw-parser-output > p`
    pub lead_paragraph_selector: String,
    /// Page heading. Default: `#firstHeading, h1`
    pub title_selector: String,
    /// Regions never annotated. Wrapper and marker classes are always added.
    pub excluded_selectors: Vec<String>,
    /// Tags whose text is never rendered.
    pub non_rendered_tags: Vec<String>,
    pub wrapper_class: String,
    pub marker_class: String,
    /// Attribute set on the document root once the initial pass has run.
    pub processed_attribute: String,
    /// Non-empty lead paragraphs scanned for years. Must be within 3..=5.
    pub lead_paragraphs: usize,
    /// Quiet period before a mutation-triggered re-pass, in milliseconds.
    pub debounce_ms: u32,
    /// Treat `class`/`id` attribute changes as content swaps.
    pub observe_attributes: bool,
    pub style: MarkerStyle,
    /// Route debug diagnostics to the console.
    pub debug: bool,
}

impl Default for AnnotatorConfig {
    fn default() -> Self {
        Self {
            content_selector: ".mw-parser-output".to_string(),
            panel_selector: ".infobox, .infobox_v3".to_string(),
            panel_row_selector: "tr, th, td".to_string(),
            lead_paragraph_selector: ".mw-parser-output > p".to_string(),
            title_selector: "#firstHeading, h1".to_string(),
            excluded_selectors: [
                ".reference",
                ".mw-references-wrap",
                ".mw-editsection",
                ".mw-cite-backlink",
                ".noprint",
                ".metadata",
                ".navbox",
                ".catlinks",
                ".thumb",
                ".gallery",
                ".wikitable",
                ".infobox",
                ".infobox_v3",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            non_rendered_tags: ["script", "style", "noscript", "template"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            wrapper_class: "wiki-year-age-wrapper".to_string(),
            marker_class: "wiki-age-annotation".to_string(),
            processed_attribute: "data-wiki-age-processed".to_string(),
            lead_paragraphs: 3,
            debounce_ms: 300,
            observe_attributes: true,
            style: MarkerStyle::default(),
            debug: false,
        }
    }
}

impl AnnotatorConfig {
    /// Wikipedia article layout (same as default)
    pub fn wikipedia() -> Self {
        Self::default()
    }

    /// Also skips generic tables, hatnotes and sidebars
    pub fn strict() -> Self {
        let mut config = Self::default();
        config
            .excluded_selectors
            .extend(["table", ".hatnote", ".sidebar"].iter().map(|s| s.to_string()));
        config
    }

    /// Parse from JSON; missing fields fall back to defaults.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !LEAD_PARAGRAPH_RANGE.contains(&self.lead_paragraphs) {
            return Err(ConfigError::Invalid {
                field: "lead_paragraphs",
                reason: format!(
                    "{} is outside {}..={}",
                    self.lead_paragraphs,
                    LEAD_PARAGRAPH_RANGE.start(),
                    LEAD_PARAGRAPH_RANGE.end()
                ),
            });
        }
        for (field, class) in [
            ("wrapper_class", &self.wrapper_class),
            ("marker_class", &self.marker_class),
        ] {
            if class.is_empty() || class.contains(char::is_whitespace) {
                return Err(ConfigError::Invalid {
                    field,
                    reason: format!("{:?} is not a single class name", class),
                });
            }
        }
        if self.processed_attribute.is_empty() {
            return Err(ConfigError::Invalid {
                field: "processed_attribute",
                reason: "must not be empty".to_string(),
            });
        }
        Ok(())
    }

    /// Excluded-region selector text, including the annotator's own classes.
    pub fn excluded_selector_text(&self) -> String {
        let mut parts = self.excluded_selectors.clone();
        parts.push(format!(".{}", self.wrapper_class));
        parts.push(format!(".{}", self.marker_class));
        parts.join(", ")
    }

    pub fn marker_template(&self) -> MarkerTemplate {
        MarkerTemplate {
            wrapper_class: self.wrapper_class.clone(),
            wrapper_style: self.style.wrapper_css(),
            marker_class: self.marker_class.clone(),
            marker_style: self.style.marker_css(),
        }
    }

    /// Validate and parse every selector.
    pub fn compile(&self) -> Result<CompiledSelectors, ConfigError> {
        self.validate()?;
        fn parse(field: &'static str, text: &str) -> Result<SelectorList, ConfigError> {
            SelectorList::parse(text).map_err(|source| ConfigError::Selector { field, source })
        }
        let non_rendered = if self.non_rendered_tags.is_empty() {
            None
        } else {
            Some(parse("non_rendered_tags", &self.non_rendered_tags.join(", "))?)
        };
        Ok(CompiledSelectors {
            content: parse("content_selector", &self.content_selector)?,
            panel: parse("panel_selector", &self.panel_selector)?,
            panel_rows: parse("panel_row_selector", &self.panel_row_selector)?,
            lead_paragraphs: parse("lead_paragraph_selector", &self.lead_paragraph_selector)?,
            title: parse("title_selector", &self.title_selector)?,
            excluded: parse("excluded_selectors", &self.excluded_selector_text())?,
            non_rendered,
            wrappers: parse("wrapper_class", &format!(".{}", self.wrapper_class))?,
            markers: parse("marker_class", &format!(".{}", self.marker_class))?,
        })
    }
}

/// Parsed selectors for one page view.
#[derive(Debug, Clone)]
pub struct CompiledSelectors {
    pub content: SelectorList,
    pub panel: SelectorList,
    pub panel_rows: SelectorList,
    pub lead_paragraphs: SelectorList,
    pub title: SelectorList,
    pub excluded: SelectorList,
    pub non_rendered: Option<SelectorList>,
    pub wrappers: SelectorList,
    pub markers: SelectorList,
}

// =============================================================================
// Tests
// =============================================================================
