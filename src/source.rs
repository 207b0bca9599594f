// src/source.rs
use serde::{Deserialize, Serialize};

use crate::extract::ExtractionStrategy;

/// One monitored page.
///
/// `id` is also the persistence key, so it has to stay stable across runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Source {
    pub id: String,
    pub label: String,
    pub locator: String,
    pub strategy: ExtractionStrategy,
}

pub const URL_MONTHLY_BFR: &str = "https://www.nrb.org.np/category/monthly-statistics/?department=bfr";
pub const URL_MACRO: &str =
    "https://www.nrb.org.np/category/current-macroeconomic-situation/?department=red&fy=2082-83";
pub const URL_INDICATORS: &str = "https://www.nrb.org.np/departments/psd/#-indicators-";

/// Nepali fiscal-year titles on the portal start with the century digits.
pub const NEPALI_YEAR_PREFIX: &str = "208";

/// The three NRB statistics pages watched when no config file is present.
pub fn default_sources() -> Vec<Source> {
    vec![
        Source {
            id: "month".into(),
            label: "Monthly Statistics (BFR)".into(),
            locator: URL_MONTHLY_BFR.into(),
            strategy: ExtractionStrategy::TopmostPrefixedAnchor {
                prefix: NEPALI_YEAR_PREFIX.into(),
            },
        },
        Source {
            id: "macro".into(),
            label: "Current Macro-Economic & Financial Situation".into(),
            locator: URL_MACRO.into(),
            strategy: ExtractionStrategy::PrefixFirstMatchWithFallback {
                prefix: "Current".into(),
                fallback_prefix: NEPALI_YEAR_PREFIX.into(),
            },
        },
        Source {
            id: "indicator".into(),
            label: "Digital Payment Indicators".into(),
            locator: URL_INDICATORS.into(),
            strategy: ExtractionStrategy::BottommostPatternMatch {
                must_contain_all: vec!["Month (".into(), "Mid".into()],
            },
        },
    ]
}
