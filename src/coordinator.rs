//! # Run coordinator
//! Checks every configured source once. A failure is attributed to its
//! source and never stops the remaining checks; the caller gets a per-source
//! report instead of a single pass/fail bit.

use chrono::{DateTime, Utc};
use metrics::{counter, gauge};
use serde::Serialize;
use tracing::Instrument;

use crate::fetch::PageFetcher;
use crate::metrics::ensure_metrics_described;
use crate::notify::NotificationDispatcher;
use crate::source::Source;
use crate::store::StateStore;
use crate::watch::{CheckResult, Outcome, SourceWatch};

#[derive(Debug)]
pub struct RunReport {
    pub started_at: DateTime<Utc>,
    pub results: Vec<CheckResult>,
}

/// Serialisable per-source line of the report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourceSummary {
    pub source: String,
    pub outcome: Outcome,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latest: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub started_at: DateTime<Utc>,
    pub changed: usize,
    pub unchanged: usize,
    pub errored: usize,
    pub sources: Vec<SourceSummary>,
}

impl RunReport {
    pub fn has_errors(&self) -> bool {
        self.results.iter().any(|r| r.error.is_some())
    }

    /// 0 when every source was checked cleanly, changed or not; 1 otherwise.
    pub fn exit_code(&self) -> u8 {
        u8::from(self.has_errors())
    }

    pub fn count(&self, outcome: Outcome) -> usize {
        self.results
            .iter()
            .filter(|r| r.outcome() == outcome)
            .count()
    }

    pub fn summary(&self) -> RunSummary {
        RunSummary {
            started_at: self.started_at,
            changed: self.count(Outcome::Changed),
            unchanged: self.count(Outcome::Unchanged),
            errored: self.count(Outcome::Errored),
            sources: self
                .results
                .iter()
                .map(|r| SourceSummary {
                    source: r.source.clone(),
                    outcome: r.outcome(),
                    latest: r.latest.clone(),
                    error_kind: r.error.as_ref().map(|e| e.kind()),
                    error: r.error.as_ref().map(|e| e.to_string()),
                })
                .collect(),
        }
    }
}

pub struct RunCoordinator<'a> {
    fetcher: &'a dyn PageFetcher,
    store: &'a dyn StateStore,
    dispatcher: &'a NotificationDispatcher,
}

impl<'a> RunCoordinator<'a> {
    pub fn new(
        fetcher: &'a dyn PageFetcher,
        store: &'a dyn StateStore,
        dispatcher: &'a NotificationDispatcher,
    ) -> Self {
        Self {
            fetcher,
            store,
            dispatcher,
        }
    }

    /// Sources run one after another, in configuration order.
    pub async fn run_all(&self, sources: &[Source]) -> RunReport {
        ensure_metrics_described();
        let started_at = Utc::now();

        let mut results = Vec::with_capacity(sources.len());
        for source in sources {
            let span = tracing::info_span!("check", source = %source.id);
            span.in_scope(|| {
                tracing::info!(label = %source.label, strategy = source.strategy.name(), "checking")
            });

            let result = SourceWatch::new(source)
                .check(self.fetcher, self.store, self.dispatcher)
                .instrument(span)
                .await;
            record(&result);
            results.push(result);
        }

        gauge!("watch_last_run_ts").set(Utc::now().timestamp() as f64);
        RunReport {
            started_at,
            results,
        }
    }
}

fn record(result: &CheckResult) {
    let outcome = result.outcome();
    let label = match outcome {
        Outcome::Changed => "changed",
        Outcome::Unchanged => "unchanged",
        Outcome::Errored => "errored",
    };
    counter!("watch_checks_total", "outcome" => label).increment(1);

    match &result.error {
        Some(e) => {
            counter!("watch_errors_total", "kind" => e.kind()).increment(1);
            tracing::warn!(source = %result.source, kind = e.kind(), error = %e, "check failed");
        }
        None if result.changed => {
            counter!("watch_notifications_total").increment(1);
        }
        None => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CheckError;

    fn result(source: &str, changed: bool, error: Option<CheckError>) -> CheckResult {
        CheckResult {
            source: source.into(),
            latest: None,
            changed,
            error,
        }
    }

    #[test]
    fn exit_code_ignores_change_but_not_errors() {
        let clean = RunReport {
            started_at: Utc::now(),
            results: vec![result("a", true, None), result("b", false, None)],
        };
        assert_eq!(clean.exit_code(), 0);

        let broken = RunReport {
            started_at: Utc::now(),
            results: vec![
                result("a", true, None),
                result("b", false, Some(CheckError::DeliveryFailed("x".into()))),
            ],
        };
        assert_eq!(broken.exit_code(), 1);
        let s = broken.summary();
        assert_eq!((s.changed, s.unchanged, s.errored), (1, 0, 1));
        assert_eq!(s.sources[1].error_kind, Some("delivery_failed"));
    }

    #[test]
    fn summary_serialises_outcomes_in_snake_case() {
        let r = RunReport {
            started_at: Utc::now(),
            results: vec![result("month", false, None)],
        };
        let json = serde_json::to_value(r.summary()).unwrap();
        assert_eq!(json["sources"][0]["outcome"], "unchanged");
        assert!(json["sources"][0].get("error").is_none());
    }
}
