//! Style Override Injector
//!
//! A global stylesheet that forces the page scrollable and strips blur and
//! backdrop effects before the classifier has looked at anything. It is the
//! first line of defense and works even if every heuristic misses.
//!
//! The sheet is generated with a small typed CSS builder and inserted under a
//! fixed marker id, so injecting twice replaces rather than duplicates.

use crate::dom::Dom;
use crate::result::DomResult;
use crate::unlock::CONTENT_SELECTORS;
use serde::{Deserialize, Serialize};

/// `id` of the injected `<style>` element
pub const STYLE_MARKER: &str = "unveil-style-override";

/// Generated CSS output
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratedCss {
    /// CSS content
    pub content: String,
    /// CSS rules in the stylesheet
    pub rules: Vec<CssRule>,
}

/// A CSS rule whose declarations are all `!important`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CssRule {
    /// CSS selector
    pub selector: String,
    /// Property and value pairs
    pub declarations: Vec<(String, String)>,
}

impl CssRule {
    /// Create a new CSS rule
    #[must_use]
    pub fn new(selector: &str) -> Self {
        Self {
            selector: selector.to_string(),
            declarations: Vec::new(),
        }
    }

    /// Add an `!important` declaration
    #[must_use]
    pub fn forced(mut self, property: &str, value: &str) -> Self {
        self.declarations
            .push((property.to_string(), value.to_string()));
        self
    }

    /// Render rule to CSS string
    #[must_use]
    pub fn render(&self) -> String {
        if self.declarations.is_empty() {
            return String::new();
        }

        let decls = self
            .declarations
            .iter()
            .map(|(prop, val)| format!("    {prop}: {val} !important;"))
            .collect::<Vec<_>>()
            .join("\n");

        format!("{} {{\n{}\n}}", self.selector, decls)
    }
}

/// Type-safe CSS builder
#[derive(Debug, Clone, Default)]
pub struct CssBuilder {
    rules: Vec<CssRule>,
}

impl CssBuilder {
    /// Create a new CSS builder
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Force the root scroll container open
    #[must_use]
    pub fn scrollable_root(mut self) -> Self {
        self.rules.push(
            CssRule::new("html, body")
                .forced("overflow", "auto")
                .forced("overflow-x", "auto")
                .forced("overflow-y", "auto")
                .forced("height", "auto")
                .forced("max-height", "none"),
        );
        self
    }

    /// Remove blur and backdrop effects from the given selectors
    #[must_use]
    pub fn unblurred(mut self, selector: &str) -> Self {
        self.rules.push(
            CssRule::new(selector)
                .forced("filter", "none")
                .forced("backdrop-filter", "none")
                .forced("-webkit-backdrop-filter", "none"),
        );
        self
    }

    /// Build the CSS stylesheet
    #[must_use]
    pub fn build(self) -> GeneratedCss {
        let content = self
            .rules
            .iter()
            .map(CssRule::render)
            .filter(|r| !r.is_empty())
            .collect::<Vec<_>>()
            .join("\n\n");

        GeneratedCss {
            content,
            rules: self.rules,
        }
    }
}

/// The override stylesheet the engine injects
#[must_use]
pub fn override_stylesheet() -> GeneratedCss {
    CssBuilder::new()
        .scrollable_root()
        .unblurred("html, body")
        .unblurred(&CONTENT_SELECTORS.join(", "))
        .build()
}

/// Insert (or replace) the override stylesheet
pub fn inject_style_overrides<D: Dom>(dom: &D) -> DomResult<()> {
    let css = override_stylesheet();
    dom.upsert_stylesheet(STYLE_MARKER, &css.content)?;
    tracing::debug!(marker = STYLE_MARKER, rules = css.rules.len(), "style overrides injected");
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::mock::MockDom;

    #[test]
    fn test_rule_render() {
        let rule = CssRule::new("body")
            .forced("margin", "0")
            .forced("overflow", "auto");

        let rendered = rule.render();
        assert_eq!(
            rendered,
            "body {\n    margin: 0 !important;\n    overflow: auto !important;\n}"
        );
    }

    #[test]
    fn test_rule_empty_declarations() {
        assert!(CssRule::new("div").render().is_empty());
        assert!(CssBuilder::new().build().content.is_empty());
    }

    #[test]
    fn test_override_sheet_contents() {
        let css = override_stylesheet();
        assert!(css.content.contains("html, body {"));
        assert!(css.content.contains("overflow-y: auto !important;"));
        assert!(css.content.contains("max-height: none !important;"));
        assert!(css.content.contains("backdrop-filter: none !important;"));
        assert!(css.content.contains("[role=\"main\"]"));
        assert_eq!(css.rules.len(), 3);
    }

    #[test]
    fn test_inject_is_idempotent() {
        let dom = MockDom::new(800.0, 600.0);
        inject_style_overrides(&dom).unwrap();
        inject_style_overrides(&dom).unwrap();
        assert_eq!(dom.stylesheet_count(), 1);
        assert_eq!(
            dom.stylesheet(STYLE_MARKER),
            Some(override_stylesheet().content)
        );
    }
}
