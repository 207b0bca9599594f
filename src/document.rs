//! Query surface over a parsed page.
//!
//! Strategies only ever need two views of a document: the text of every
//! element, and the text of every anchor, both in document order. Keeping that
//! behind a trait lets the extraction rules run against hand-built fixtures in
//! tests and against `scraper`'s html5ever tree in production.

use once_cell::sync::Lazy;
use scraper::{ElementRef, Html, Selector};

static ANY_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("*").expect("universal selector must parse"));
static ANCHOR_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("a").expect("anchor selector must parse"));

/// Elements whose content is never rendered text. Neither they nor anything
/// under them is reported, and their text never leaks into an ancestor's.
const NON_CONTENT_TAGS: [&str; 4] = ["script", "style", "noscript", "template"];

pub trait DocumentQuery {
    /// Trimmed text of every element, pre-order (ancestors before descendants).
    fn all_element_texts(&self) -> Vec<String>;

    /// Trimmed text of every `<a>` element, in document order.
    fn anchor_texts(&self) -> Vec<String>;
}

/// A fetched page parsed with html5ever.
///
/// `scraper::Html` is not `Send`; build it, extract, and drop it inside a
/// synchronous scope.
pub struct HtmlDocument {
    html: Html,
}

impl HtmlDocument {
    pub fn parse(markup: &str) -> Self {
        Self {
            html: Html::parse_document(markup),
        }
    }

    fn texts_of(&self, selector: &Selector) -> Vec<String> {
        self.html
            .select(selector)
            .filter(|el| !is_non_content(*el) && !inside_non_content(*el))
            .map(text_of)
            .collect()
    }
}

impl DocumentQuery for HtmlDocument {
    fn all_element_texts(&self) -> Vec<String> {
        self.texts_of(&ANY_SELECTOR)
    }

    fn anchor_texts(&self) -> Vec<String> {
        self.texts_of(&ANCHOR_SELECTOR)
    }
}

/// Concatenated descendant text, trimmed at both ends. Inner whitespace is
/// left as the page has it. Script, style, noscript and template subtrees
/// contribute nothing.
pub fn text_of(el: ElementRef<'_>) -> String {
    let mut out = String::new();
    push_text(el, &mut out);
    out.trim().to_string()
}

fn push_text(el: ElementRef<'_>, out: &mut String) {
    for child in el.children() {
        if let Some(text) = child.value().as_text() {
            out.push_str(text);
        } else if let Some(child_el) = ElementRef::wrap(child) {
            if !is_non_content(child_el) {
                push_text(child_el, out);
            }
        }
    }
}

fn is_non_content(el: ElementRef<'_>) -> bool {
    NON_CONTENT_TAGS.contains(&el.value().name())
}

fn inside_non_content(el: ElementRef<'_>) -> bool {
    el.ancestors()
        .filter_map(ElementRef::wrap)
        .any(is_non_content)
}

/// Pre-split document for tests and tools that already have the texts.
#[derive(Debug, Clone, Default)]
pub struct StaticDocument {
    pub elements: Vec<String>,
    pub anchors: Vec<String>,
}

impl StaticDocument {
    pub fn with_anchors<S: Into<String>>(anchors: impl IntoIterator<Item = S>) -> Self {
        Self {
            elements: Vec::new(),
            anchors: anchors.into_iter().map(Into::into).collect(),
        }
    }

    pub fn with_elements<S: Into<String>>(elements: impl IntoIterator<Item = S>) -> Self {
        Self {
            elements: elements.into_iter().map(Into::into).collect(),
            anchors: Vec::new(),
        }
    }
}

impl DocumentQuery for StaticDocument {
    fn all_element_texts(&self) -> Vec<String> {
        self.elements.iter().map(|s| s.trim().to_string()).collect()
    }

    fn anchor_texts(&self) -> Vec<String> {
        self.anchors.iter().map(|s| s.trim().to_string()).collect()
    }
}
