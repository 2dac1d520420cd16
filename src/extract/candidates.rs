//! Ordered candidate probes for pulling one field out of an element
//!
//! Each field is described by a list of probes. The first probe that yields
//! a non-empty value wins, so supporting a new template variant means adding
//! a probe rather than changing the extractors.

use scraper::{ElementRef, Html, Selector};
use url::Url;

/// One way of reading a field from an element
#[derive(Debug, Clone, Copy)]
pub enum Probe {
    /// Trimmed text of the first descendant matching the selector
    Text(&'static str),
    /// Non-blank text nodes of the first matching descendant, one per line
    Lines(&'static str),
    /// An attribute of the first descendant matching the selector
    Attr(&'static str, &'static str),
    /// An attribute of the element itself
    SelfAttr(&'static str),
}

#[derive(Debug)]
enum Compiled {
    Text(Selector),
    Lines(Selector),
    Attr(Selector, &'static str),
    SelfAttr(&'static str),
}

/// A compiled, ordered list of probes for one field
#[derive(Debug)]
pub struct Cascade {
    probes: Vec<Compiled>,
}

impl Cascade {
    /// Compiles the probes, dropping any whose selector does not parse
    pub fn new(probes: &[Probe]) -> Self {
        let probes = probes
            .iter()
            .filter_map(|probe| match *probe {
                Probe::Text(css) => compile(css).map(Compiled::Text),
                Probe::Lines(css) => compile(css).map(Compiled::Lines),
                Probe::Attr(css, attr) => compile(css).map(|sel| Compiled::Attr(sel, attr)),
                Probe::SelfAttr(attr) => Some(Compiled::SelfAttr(attr)),
            })
            .collect();
        Self { probes }
    }

    /// Returns the first non-empty value any probe yields
    pub fn first(&self, element: ElementRef<'_>) -> Option<String> {
        self.first_with(element, |value| Some(value.to_string()))
    }

    /// Returns the first probe value accepted by `accept`
    ///
    /// Probes whose raw value is rejected fall through to the next probe.
    pub fn first_with<F>(&self, element: ElementRef<'_>, accept: F) -> Option<String>
    where
        F: Fn(&str) -> Option<String>,
    {
        self.probes.iter().find_map(|probe| {
            let raw = read(probe, element)?;
            let raw = raw.trim();
            if raw.is_empty() {
                None
            } else {
                accept(raw)
            }
        })
    }
}

fn read(probe: &Compiled, element: ElementRef<'_>) -> Option<String> {
    match probe {
        Compiled::Text(sel) => element.select(sel).map(collapsed_text).find(|t| !t.is_empty()),
        Compiled::Lines(sel) => element.select(sel).map(line_text).find(|t| !t.is_empty()),
        Compiled::Attr(sel, attr) => element
            .select(sel)
            .filter_map(|el| el.value().attr(attr))
            .map(str::to_string)
            .find(|v| !v.trim().is_empty()),
        Compiled::SelfAttr(attr) => element.value().attr(attr).map(str::to_string),
    }
}

/// Container selectors tried in order; the first that matches anything wins
#[derive(Debug)]
pub struct Containers {
    selectors: Vec<Selector>,
}

impl Containers {
    pub fn new(selectors: &[&'static str]) -> Self {
        Self {
            selectors: selectors.iter().filter_map(|css| compile(css)).collect(),
        }
    }

    /// Selects elements with the first selector that matches, in document order
    pub fn select<'a>(&self, document: &'a Html) -> Vec<ElementRef<'a>> {
        self.selectors
            .iter()
            .map(|sel| document.select(sel).collect::<Vec<_>>())
            .find(|found| !found.is_empty())
            .unwrap_or_default()
    }
}

fn compile(css: &str) -> Option<Selector> {
    match Selector::parse(css) {
        Ok(sel) => Some(sel),
        Err(e) => {
            tracing::warn!("Dropping unparsable selector '{}': {:?}", css, e);
            None
        }
    }
}

/// All text under an element with whitespace runs collapsed to one space
pub fn collapsed_text(element: ElementRef<'_>) -> String {
    element.text().flat_map(str::split_whitespace).collect::<Vec<_>>().join(" ")
}

/// Non-blank text nodes under an element, trimmed, one per line
pub fn line_text(element: ElementRef<'_>) -> String {
    element
        .text()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Resolves an href found on a page to an absolute http(s) URL
///
/// Returns None for empty, fragment-only, `javascript:`, `mailto:`, `tel:`
/// and `data:` links.
pub fn resolve_link(href: &str, base_url: &Url) -> Option<Url> {
    let href = href.trim();

    if href.is_empty() || href.starts_with('#') {
        return None;
    }

    let lowered = href.to_ascii_lowercase();
    if ["javascript:", "mailto:", "tel:", "data:"]
        .iter()
        .any(|scheme| lowered.starts_with(scheme))
    {
        return None;
    }

    base_url
        .join(href)
        .ok()
        .filter(|url| url.scheme() == "http" || url.scheme() == "https")
}
