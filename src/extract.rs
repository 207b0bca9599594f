//! # Extraction strategies
//! Each monitored page marks its newest item differently, so each source
//! carries one of these variants. Polarity (newest-first vs newest-last) and
//! the scanned element set (anchors vs everything) are part of the variant and
//! are never inferred from the page.

use std::collections::HashMap;
use std::sync::Mutex;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::document::DocumentQuery;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("no element matched {strategy}")]
pub struct NotFound {
    pub strategy: &'static str,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ExtractionStrategy {
    /// First anchor whose text starts with `prefix`.
    PrefixFirstMatch { prefix: String },

    /// One left-to-right pass over anchors; each anchor is tested against
    /// `prefix`, then against `fallback_prefix`. An empty prefix of either
    /// kind is treated as absent and never matches.
    PrefixFirstMatchWithFallback {
        prefix: String,
        fallback_prefix: String,
    },

    /// Same scan as `PrefixFirstMatch`, for pages that list newest at the top.
    TopmostPrefixedAnchor { prefix: String },

    /// Last element (any tag) whose text contains every fragment. For pages
    /// listing periods in ascending order. See [`contains_fragment`].
    BottommostPatternMatch { must_contain_all: Vec<String> },
}

impl ExtractionStrategy {
    pub fn name(&self) -> &'static str {
        match self {
            ExtractionStrategy::PrefixFirstMatch { .. } => "prefix_first_match",
            ExtractionStrategy::PrefixFirstMatchWithFallback { .. } => {
                "prefix_first_match_with_fallback"
            }
            ExtractionStrategy::TopmostPrefixedAnchor { .. } => "topmost_prefixed_anchor",
            ExtractionStrategy::BottommostPatternMatch { .. } => "bottommost_pattern_match",
        }
    }

    pub fn extract<D: DocumentQuery + ?Sized>(&self, doc: &D) -> Result<String, NotFound> {
        let found = match self {
            ExtractionStrategy::PrefixFirstMatch { prefix }
            | ExtractionStrategy::TopmostPrefixedAnchor { prefix } => {
                first_anchor(doc, |t| t.starts_with(prefix.as_str()))
            }
            ExtractionStrategy::PrefixFirstMatchWithFallback {
                prefix,
                fallback_prefix,
            } => first_anchor(doc, |t| {
                starts_with_given(t, prefix) || starts_with_given(t, fallback_prefix)
            }),
            ExtractionStrategy::BottommostPatternMatch { must_contain_all } => doc
                .all_element_texts()
                .into_iter()
                .rev()
                .find(|t| !t.is_empty() && must_contain_all.iter().all(|f| contains_fragment(t, f))),
        };
        found.ok_or(NotFound {
            strategy: self.name(),
        })
    }
}

fn first_anchor<D, F>(doc: &D, accept: F) -> Option<String>
where
    D: DocumentQuery + ?Sized,
    F: Fn(&str) -> bool,
{
    // Empty anchors (icon links etc.) can never be an observed value.
    doc.anchor_texts()
        .into_iter()
        .find(|t| !t.is_empty() && accept(t))
}

fn starts_with_given(text: &str, prefix: &str) -> bool {
    !prefix.is_empty() && text.starts_with(prefix)
}

static FRAGMENT_PATTERNS: Lazy<Mutex<HashMap<String, Regex>>> =
    Lazy::new(|| Mutex::new(HashMap::new()));

/// Each whitespace-separated piece after the first must start the next word:
/// only the rest of the previous piece's word and whitespace may sit between.
fn fragment_pattern(fragment: &str) -> String {
    fragment
        .split_whitespace()
        .map(regex::escape)
        .collect::<Vec<_>>()
        .join(r"\S*\s+")
}

fn fragment_regex(fragment: &str) -> Option<Regex> {
    let mut cache = FRAGMENT_PATTERNS.lock().unwrap_or_else(|p| p.into_inner());
    if let Some(re) = cache.get(fragment) {
        return Some(re.clone());
    }
    let re = Regex::new(&fragment_pattern(fragment)).ok()?;
    cache.insert(fragment.to_string(), re.clone());
    Some(re)
}

/// True when `fragment` occurs in `text`, where the gap between two of its
/// pieces may only be the remainder of a word plus whitespace. `"Month ("`
/// therefore matches `"Month (Mid-July)"` and `"Two Months (Mid-August)"` but
/// not `"Monthly Statistics (BFR)"`. A single-word fragment is a plain
/// case-sensitive substring test.
pub fn contains_fragment(text: &str, fragment: &str) -> bool {
    fragment_regex(fragment).is_some_and(|re| re.is_match(text))
}
