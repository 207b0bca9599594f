//! # Source watch
//! One check cycle for one source: fetch → extract → load previous → compare
//! → notify → persist. Steps run strictly in that order; the store is only
//! written after the notification went out, so a failed send leaves the old
//! value in place and the next run re-detects (and re-sends) the same change.

use serde::Serialize;

use crate::document::HtmlDocument;
use crate::error::CheckError;
use crate::fetch::PageFetcher;
use crate::notify::NotificationDispatcher;
use crate::source::Source;
use crate::store::StateStore;

#[derive(Debug)]
pub struct CheckResult {
    pub source: String,
    pub latest: Option<String>,
    pub changed: bool,
    pub error: Option<CheckError>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Changed,
    Unchanged,
    Errored,
}

impl CheckResult {
    fn failed(source: &Source, latest: Option<String>, error: CheckError) -> Self {
        Self {
            source: source.id.clone(),
            latest,
            changed: false,
            error: Some(error),
        }
    }

    pub fn outcome(&self) -> Outcome {
        match (&self.error, self.changed) {
            (Some(_), _) => Outcome::Errored,
            (None, true) => Outcome::Changed,
            (None, false) => Outcome::Unchanged,
        }
    }
}

pub struct SourceWatch<'a> {
    source: &'a Source,
}

impl<'a> SourceWatch<'a> {
    pub fn new(source: &'a Source) -> Self {
        Self { source }
    }

    pub fn source(&self) -> &Source {
        self.source
    }

    /// Full cycle including retrieval.
    pub async fn check(
        &self,
        fetcher: &dyn PageFetcher,
        store: &dyn StateStore,
        dispatcher: &NotificationDispatcher,
    ) -> CheckResult {
        let markup = match fetcher.fetch(&self.source.locator).await {
            Ok(m) => m,
            Err(e) => return CheckResult::failed(self.source, None, e),
        };
        self.check_markup(&markup, store, dispatcher).await
    }

    /// Cycle over markup that was already fetched.
    pub async fn check_markup(
        &self,
        markup: &str,
        store: &dyn StateStore,
        dispatcher: &NotificationDispatcher,
    ) -> CheckResult {
        let latest = match self.extract(markup) {
            Ok(v) => v,
            Err(e) => return CheckResult::failed(self.source, None, e),
        };
        self.check_value(latest, store, dispatcher).await
    }

    /// Parse and run the configured strategy. The parsed tree stays in this
    /// synchronous scope.
    pub fn extract(&self, markup: &str) -> Result<String, CheckError> {
        let doc = HtmlDocument::parse(markup);
        self.source
            .strategy
            .extract(&doc)
            .map_err(|nf| CheckError::ExtractionFailed {
                strategy: nf.strategy,
            })
    }

    /// Compare an extracted value against the store and act on a difference.
    pub async fn check_value(
        &self,
        latest: String,
        store: &dyn StateStore,
        dispatcher: &NotificationDispatcher,
    ) -> CheckResult {
        let id = self.source.id.as_str();

        let previous = match store.load(id).await {
            Ok(p) => p.unwrap_or_default(),
            Err(e) => return CheckResult::failed(self.source, Some(latest), e),
        };
        tracing::debug!(source = id, latest = %latest, previous = ?previous, "compared");

        if latest == previous {
            tracing::info!(source = id, "no change detected");
            return CheckResult {
                source: id.to_string(),
                latest: Some(latest),
                changed: false,
                error: None,
            };
        }

        tracing::info!(source = id, latest = %latest, "new update found");
        if let Err(e) = dispatcher.notify_change(self.source, &latest).await {
            return CheckResult::failed(self.source, Some(latest), e);
        }
        if let Err(e) = store.save(id, &latest).await {
            return CheckResult::failed(self.source, Some(latest), e);
        }

        CheckResult {
            source: id.to_string(),
            latest: Some(latest),
            changed: true,
            error: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::ExtractionStrategy;
    use crate::notify::RecordingNotifier;
    use crate::store::MemoryStateStore;
    use std::sync::Arc;

    fn month() -> Source {
        Source {
            id: "month".into(),
            label: "Monthly Statistics (BFR)".into(),
            locator: "https://example.test/monthly".into(),
            strategy: ExtractionStrategy::PrefixFirstMatch {
                prefix: "208".into(),
            },
        }
    }

    const PAGE: &str = r#"<ul><li><a href="/x">Other</a></li>
        <li><a href="/a">208212</a></li><li><a href="/b">208211</a></li></ul>"#;

    #[tokio::test]
    async fn first_run_fires_once_and_records() {
        let src = month();
        let store = MemoryStateStore::new();
        let rec = Arc::new(RecordingNotifier::new());
        let d = NotificationDispatcher::new(rec.clone());

        let r = SourceWatch::new(&src).check_markup(PAGE, &store, &d).await;
        assert!(r.changed);
        assert!(r.error.is_none());
        assert_eq!(r.outcome(), Outcome::Changed);
        assert_eq!(rec.sent().len(), 1);
        assert_eq!(store.get("month").as_deref(), Some("208212"));
    }

    #[tokio::test]
    async fn second_run_on_same_page_is_quiet() {
        let src = month();
        let store = MemoryStateStore::new();
        let rec = Arc::new(RecordingNotifier::new());
        let d = NotificationDispatcher::new(rec.clone());
        let w = SourceWatch::new(&src);

        w.check_markup(PAGE, &store, &d).await;
        let r = w.check_markup(PAGE, &store, &d).await;
        assert!(!r.changed);
        assert_eq!(r.outcome(), Outcome::Unchanged);
        assert_eq!(rec.sent().len(), 1);
    }

    #[tokio::test]
    async fn extraction_failure_leaves_state_alone() {
        let src = month();
        let store = MemoryStateStore::with_entry("month", "208210");
        let rec = Arc::new(RecordingNotifier::new());
        let d = NotificationDispatcher::new(rec.clone());

        let r = SourceWatch::new(&src)
            .check_markup("<a>Home</a>", &store, &d)
            .await;
        assert_eq!(r.error.as_ref().map(|e| e.kind()), Some("extraction_failed"));
        assert!(r.latest.is_none());
        assert!(rec.sent().is_empty());
        assert_eq!(store.get("month").as_deref(), Some("208210"));
    }

    #[tokio::test]
    async fn delivery_failure_does_not_advance_state() {
        let src = month();
        let store = MemoryStateStore::with_entry("month", "208210");
        let d = NotificationDispatcher::new(Arc::new(RecordingNotifier::failing()));

        let r = SourceWatch::new(&src).check_markup(PAGE, &store, &d).await;
        assert!(!r.changed);
        assert_eq!(r.error.as_ref().map(|e| e.kind()), Some("delivery_failed"));
        assert_eq!(r.latest.as_deref(), Some("208212"));
        assert_eq!(store.get("month").as_deref(), Some("208210"));
    }
}
