//! Selector-queryable view over a fetched HTML page

use scraper::{ElementRef, Html, Selector};
use std::collections::HashSet;

/// Parsed HTML document
///
/// Every lookup treats a missing element as absent rather than as an error.
/// Selectors given as strings are compiled per call and an invalid selector
/// matches nothing; use the `*_with` variants for pre-compiled selectors.
pub struct Document {
    html: Html,
}

impl Document {
    pub fn parse(body: &str) -> Self {
        Self {
            html: Html::parse_document(body),
        }
    }

    /// All elements matching `selector`, in document order
    pub fn select_all(&self, selector: &str) -> Vec<ElementRef<'_>> {
        match Selector::parse(selector) {
            Ok(sel) => self.html.select(&sel).collect(),
            Err(_) => Vec::new(),
        }
    }

    /// Number of elements matching `selector`
    pub fn count(&self, selector: &str) -> usize {
        self.select_all(selector).len()
    }

    /// Text content of the first match, untrimmed
    pub fn text(&self, selector: &str) -> Option<String> {
        Selector::parse(selector)
            .ok()
            .and_then(|sel| self.text_with(&sel))
    }

    /// Text content of every match
    pub fn texts(&self, selector: &str) -> Vec<String> {
        self.select_all(selector)
            .into_iter()
            .map(|el| element_text(&el))
            .collect()
    }

    /// Attribute value of the first match
    pub fn attr(&self, selector: &str, name: &str) -> Option<String> {
        Selector::parse(selector)
            .ok()
            .and_then(|sel| self.attr_with(&sel, name))
    }

    /// Attribute value of every match that carries it
    pub fn attrs(&self, selector: &str, name: &str) -> Vec<String> {
        self.select_all(selector)
            .into_iter()
            .filter_map(|el| el.value().attr(name).map(str::to_string))
            .collect()
    }

    pub fn text_with(&self, selector: &Selector) -> Option<String> {
        self.html.select(selector).next().map(|el| element_text(&el))
    }

    pub fn attr_with(&self, selector: &Selector, name: &str) -> Option<String> {
        self.html
            .select(selector)
            .next()
            .and_then(|el| el.value().attr(name).map(str::to_string))
    }

    /// Text of the row whose `heading` contains `label`, searched within `container`
    ///
    /// The row is the heading's parent element, so neighbouring rows inside
    /// the same container never leak in. The whole row text is returned,
    /// heading included, e.g. a `<div><h4>Runtime:</h4> 142 min</div>` row
    /// looked up with `("div", "h4", "Runtime")` yields `"Runtime: 142 min"`.
    pub fn labeled_text(&self, container: &str, heading: &str, label: &str) -> Option<String> {
        let containers = Selector::parse(container).ok()?;
        let headings = Selector::parse(heading).ok()?;

        self.html
            .select(&containers)
            .flat_map(|scope| scope.select(&headings))
            .find(|h| element_text(h).contains(label))
            .and_then(|h| h.parent())
            .and_then(ElementRef::wrap)
            .map(|row| element_text(&row))
    }

    /// Text of the first match, skipping text inside nested `exclude` matches
    pub fn text_without(&self, selector: &str, exclude: &str) -> Option<String> {
        let sel = Selector::parse(selector).ok()?;
        let excluded = Selector::parse(exclude).ok()?;

        let element = self.html.select(&sel).next()?;
        let hidden: HashSet<_> = element.select(&excluded).map(|e| e.id()).collect();

        let text = element
            .descendants()
            .filter(|node| !node.ancestors().any(|a| hidden.contains(&a.id())))
            .filter_map(|node| node.value().as_text().map(|t| &**t))
            .collect::<String>();
        Some(text)
    }
}

fn element_text(element: &ElementRef<'_>) -> String {
    element.text().collect::<String>()
}
