//! Cursor-paginated retrieval with a time-window cutoff.
//!
//! Precondition: unless [`PageOrdering::Unordered`] is configured, the
//! upstream must return conversations newest-first. The first record older
//! than the window start then proves that every remaining record (in this
//! page and all later ones) is older too, so pagination stops right there.
//!
//! A failed request ends pagination but is not an error for the caller: the
//! conversations accumulated so far are returned and marked as partial.

use crate::fetch::page::PageSource;
use crate::fetch::timestamp::parse_timestamp;
use crate::models::{Conversation, PageOrdering, TimeWindow, TimestampPolicy};
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Parameters of a fetch run.
#[derive(Debug, Clone)]
pub struct FetchConfig {
    pub window: TimeWindow,
    pub timestamp_policy: TimestampPolicy,
    pub ordering: PageOrdering,
    /// Upper bound on requests; `None` for no bound.
    pub max_pages: Option<u32>,
    pub show_progress: bool,
}

impl FetchConfig {
    pub fn new(window: TimeWindow) -> Self {
        Self {
            window,
            timestamp_policy: TimestampPolicy::default(),
            ordering: PageOrdering::default(),
            max_pages: None,
            show_progress: false,
        }
    }
}

/// Why pagination ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// The last page carried no next cursor.
    Exhausted,
    /// A page came back with no conversations.
    EmptyPage,
    /// A conversation older than the window start was reached.
    ReachedWindowStart,
    /// A request failed; results are partial.
    RequestFailed,
    /// `max_pages` requests were issued.
    PageLimit,
}

/// Result of [`Fetcher::fetch_all`].
#[derive(Debug, Clone)]
pub struct FetchOutcome {
    /// Conversations inside the window, in server order.
    pub conversations: Vec<Conversation>,
    /// Number of successful page requests.
    pub pages_fetched: u32,
    pub stop_reason: StopReason,
}

impl FetchOutcome {
    pub fn is_partial(&self) -> bool {
        self.stop_reason == StopReason::RequestFailed
    }
}

/// Decision for a single conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Keep,
    Discard,
    /// Older than the window on a newest-first feed: stop paginating.
    Stop,
}

/// Decide whether a conversation belongs in the result.
pub fn classify(conversation: &Conversation, config: &FetchConfig) -> Verdict {
    let lenient = config.timestamp_policy == TimestampPolicy::Lenient;

    let (alias, raw) = match conversation.created_at_raw() {
        Some(found) => found,
        None => {
            warn!(
                "Could not find creation time in conversation; keys: {:?}",
                conversation.keys()
            );
            return if lenient {
                Verdict::Keep
            } else {
                Verdict::Discard
            };
        }
    };

    let created_at = match parse_timestamp(raw) {
        Ok(ts) => ts,
        Err(e) => {
            warn!("Error parsing date {} ({}): {}", raw, alias, e);
            return if lenient {
                Verdict::Keep
            } else {
                Verdict::Discard
            };
        }
    };

    let window = &config.window;
    if created_at < window.start {
        return match config.ordering {
            PageOrdering::NewestFirst => {
                info!(
                    "Reached conversation from {}, which is older than {}. Stopping.",
                    created_at, window.start
                );
                Verdict::Stop
            }
            PageOrdering::Unordered => {
                debug!("Skipping conversation from {} (before window)", created_at);
                Verdict::Discard
            }
        };
    }

    if window.contains(created_at) {
        Verdict::Keep
    } else {
        debug!("Skipping conversation from {} (after window end)", created_at);
        Verdict::Discard
    }
}

/// Walks the paginated collection and keeps conversations inside the window.
pub struct Fetcher<S> {
    source: S,
    config: FetchConfig,
}

impl<S: PageSource> Fetcher<S> {
    pub fn new(source: S, config: FetchConfig) -> Self {
        Self { source, config }
    }

    /// Fetch every in-window conversation. Never fails; see [`FetchOutcome`].
    pub async fn fetch_all(&self) -> FetchOutcome {
        info!(
            "Fetching conversations from {} ({} ordering)",
            self.config.window, self.config.ordering
        );

        let progress = self.progress_bar();
        let mut conversations = Vec::new();
        let mut cursor: Option<String> = None;
        let mut pages_fetched = 0u32;

        let stop_reason = loop {
            if let Some(max) = self.config.max_pages {
                if pages_fetched >= max {
                    warn!("Stopping after {} pages (max_pages reached)", max);
                    break StopReason::PageLimit;
                }
            }

            let page = match self.source.fetch_page(cursor.as_deref()).await {
                Ok(page) => page,
                Err(e) => {
                    error!("API request failed: {}", e);
                    if let Some(body) = e.body() {
                        error!("Response body: {}", body);
                    }
                    break StopReason::RequestFailed;
                }
            };
            pages_fetched += 1;

            if page.is_empty() {
                info!("No more conversations found.");
                break StopReason::EmptyPage;
            }

            info!(
                "Fetched {} conversations in page {}.",
                page.conversations.len(),
                pages_fetched
            );

            let mut reached_start = false;
            for conversation in page.conversations {
                match classify(&conversation, &self.config) {
                    Verdict::Keep => conversations.push(conversation),
                    Verdict::Discard => {}
                    Verdict::Stop => {
                        reached_start = true;
                        break;
                    }
                }
            }

            progress.set_message(format!(
                "{} pages, {} conversations kept",
                pages_fetched,
                conversations.len()
            ));

            if reached_start {
                break StopReason::ReachedWindowStart;
            }

            match page.next_cursor {
                Some(next) => cursor = Some(next),
                None => break StopReason::Exhausted,
            }
        };

        progress.finish_and_clear();
        info!(
            "Pagination finished after {} pages ({:?}); {} conversations in window",
            pages_fetched,
            stop_reason,
            conversations.len()
        );

        FetchOutcome {
            conversations,
            pages_fetched,
            stop_reason,
        }
    }

    fn progress_bar(&self) -> ProgressBar {
        if !self.config.show_progress {
            return ProgressBar::hidden();
        }

        let pb = ProgressBar::new_spinner();
        pb.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.green} [{elapsed_precise}] {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        pb.set_message("requesting first page");
        pb.enable_steady_tick(Duration::from_millis(120));
        pb
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::error::FetchError;
    use crate::fetch::page::Page;
    use async_trait::async_trait;
    use chrono::{TimeZone, Utc};
    use serde_json::{json, Value};
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Hands out pre-built pages and records the cursor of every request.
    struct ScriptedSource {
        pages: Mutex<VecDeque<Result<Page, FetchError>>>,
        requests: Mutex<Vec<Option<String>>>,
    }

    impl ScriptedSource {
        fn new(pages: Vec<Result<Page, FetchError>>) -> Self {
            Self {
                pages: Mutex::new(pages.into()),
                requests: Mutex::new(Vec::new()),
            }
        }

        fn requests(&self) -> Vec<Option<String>> {
            self.requests.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl PageSource for ScriptedSource {
        async fn fetch_page(&self, cursor: Option<&str>) -> Result<Page, FetchError> {
            self.requests
                .lock()
                .unwrap()
                .push(cursor.map(str::to_string));
            self.pages
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(FetchError::Decode("unexpected request".to_string())))
        }
    }

    #[async_trait]
    impl<T: PageSource> PageSource for &T {
        async fn fetch_page(&self, cursor: Option<&str>) -> Result<Page, FetchError> {
            (**self).fetch_page(cursor).await
        }
    }

    fn window() -> TimeWindow {
        TimeWindow::trailing(Utc.with_ymd_and_hms(2024, 6, 30, 0, 0, 0).unwrap(), 90)
    }

    fn config() -> FetchConfig {
        FetchConfig::new(window())
    }

    fn conv(value: Value) -> Conversation {
        serde_json::from_value(value).unwrap()
    }

    /// In-window conversation (June 2024).
    fn recent(id: usize) -> Conversation {
        conv(json!({"id": id, "created_at": "2024-06-15T10:00:00Z"}))
    }

    /// Conversation from before the window (January 2024).
    fn old(id: usize) -> Conversation {
        conv(json!({"id": id, "created_at": "2024-01-10T10:00:00Z"}))
    }

    fn page(conversations: Vec<Conversation>, next: Option<&str>) -> Result<Page, FetchError> {
        Ok(Page {
            conversations,
            next_cursor: next.map(str::to_string),
        })
    }

    fn ids(outcome: &FetchOutcome) -> Vec<u64> {
        outcome
            .conversations
            .iter()
            .filter_map(|c| c.get("id").and_then(Value::as_u64))
            .collect()
    }

    fn run(source: &ScriptedSource, config: FetchConfig) -> FetchOutcome {
        tokio_test::block_on(Fetcher::new(source, config).fetch_all())
    }

    #[test]
    fn test_two_pages_until_cursor_runs_out() {
        let source = ScriptedSource::new(vec![
            page((0..50).map(recent).collect(), Some("c2")),
            page((50..60).map(recent).collect(), None),
        ]);

        let outcome = run(&source, config());

        assert_eq!(outcome.conversations.len(), 60);
        assert_eq!(outcome.pages_fetched, 2);
        assert_eq!(outcome.stop_reason, StopReason::Exhausted);
        assert_eq!(source.requests(), vec![None, Some("c2".to_string())]);
    }

    #[test]
    fn test_old_record_mid_page_halts_pagination() {
        let source = ScriptedSource::new(vec![
            page(vec![recent(1), recent(2), old(3), recent(4), recent(5)], Some("c2")),
            page(vec![recent(6)], None),
        ]);

        let outcome = run(&source, config());

        assert_eq!(ids(&outcome), vec![1, 2]);
        assert_eq!(outcome.stop_reason, StopReason::ReachedWindowStart);
        assert_eq!(source.requests().len(), 1);
    }

    #[test]
    fn test_old_first_record_excludes_rest_of_page() {
        let source = ScriptedSource::new(vec![
            page(vec![recent(1), recent(2)], Some("c2")),
            page(vec![old(3), recent(4)], Some("c3")),
            page(vec![recent(5)], None),
        ]);

        let outcome = run(&source, config());

        assert_eq!(ids(&outcome), vec![1, 2]);
        assert_eq!(source.requests().len(), 2);
    }

    #[test]
    fn test_missing_timestamp_lenient_and_strict() {
        let pages = || {
            vec![page(
                vec![conv(json!({"id": 1, "message_count": 3})), recent(2)],
                None,
            )]
        };

        let lenient = run(&ScriptedSource::new(pages()), config());
        assert_eq!(ids(&lenient), vec![1, 2]);

        let mut strict_config = config();
        strict_config.timestamp_policy = TimestampPolicy::Strict;
        let strict = run(&ScriptedSource::new(pages()), strict_config);
        assert_eq!(ids(&strict), vec![2]);
    }

    #[test]
    fn test_unparseable_timestamp_is_kept_when_lenient() {
        let source = ScriptedSource::new(vec![page(
            vec![conv(json!({"id": 1, "created_time": "not a date"})), recent(2)],
            None,
        )]);

        let outcome = run(&source, config());
        assert_eq!(ids(&outcome), vec![1, 2]);
    }

    #[test]
    fn test_future_record_is_discarded() {
        let source = ScriptedSource::new(vec![page(
            vec![conv(json!({"id": 1, "created_at": "2024-07-02T00:00:00Z"})), recent(2)],
            None,
        )]);

        let outcome = run(&source, config());
        assert_eq!(ids(&outcome), vec![2]);
        assert_eq!(outcome.stop_reason, StopReason::Exhausted);
    }

    #[test]
    fn test_naive_timestamp_is_utc_boundary() {
        let start = window().start.format("%Y-%m-%dT%H:%M:%S").to_string();
        let source = ScriptedSource::new(vec![page(
            vec![conv(json!({"id": 1, "inserted_at": start}))],
            None,
        )]);

        let outcome = run(&source, config());
        assert_eq!(ids(&outcome), vec![1]);
    }

    #[test]
    fn test_request_failure_returns_partial_results() {
        let source = ScriptedSource::new(vec![
            page(vec![recent(1), recent(2)], Some("c2")),
            Err(FetchError::Status {
                status: 502,
                body: "bad gateway".to_string(),
            }),
        ]);

        let outcome = run(&source, config());

        assert_eq!(ids(&outcome), vec![1, 2]);
        assert!(outcome.is_partial());
        assert_eq!(outcome.pages_fetched, 1);
    }

    #[test]
    fn test_failure_on_first_page_yields_empty_list() {
        let source = ScriptedSource::new(vec![Err(FetchError::Decode("boom".to_string()))]);

        let outcome = run(&source, config());
        assert!(outcome.conversations.is_empty());
        assert_eq!(outcome.stop_reason, StopReason::RequestFailed);
    }

    #[test]
    fn test_empty_page_ends_pagination() {
        let source = ScriptedSource::new(vec![
            page(vec![recent(1)], Some("c2")),
            page(vec![], Some("c3")),
        ]);

        let outcome = run(&source, config());
        assert_eq!(ids(&outcome), vec![1]);
        assert_eq!(outcome.stop_reason, StopReason::EmptyPage);
        assert_eq!(source.requests().len(), 2);
    }

    #[test]
    fn test_unordered_mode_skips_old_records_and_continues() {
        let source = ScriptedSource::new(vec![
            page(vec![old(1), recent(2)], Some("c2")),
            page(vec![recent(3), old(4)], None),
        ]);
        let mut cfg = config();
        cfg.ordering = PageOrdering::Unordered;

        let outcome = run(&source, cfg);
        assert_eq!(ids(&outcome), vec![2, 3]);
        assert_eq!(outcome.stop_reason, StopReason::Exhausted);
        assert_eq!(source.requests().len(), 2);
    }

    #[test]
    fn test_max_pages_bounds_requests() {
        let source = ScriptedSource::new(vec![
            page(vec![recent(1)], Some("c2")),
            page(vec![recent(2)], Some("c3")),
            page(vec![recent(3)], None),
        ]);
        let mut cfg = config();
        cfg.max_pages = Some(2);

        let outcome = run(&source, cfg);
        assert_eq!(ids(&outcome), vec![1, 2]);
        assert_eq!(outcome.stop_reason, StopReason::PageLimit);
        assert_eq!(source.requests().len(), 2);
    }

    #[test]
    fn test_classify_window_edges() {
        let cfg = config();
        let at = |ts: String| conv(json!({ "created_at": ts }));

        let start = window().start.to_rfc3339();
        let end = window().end.to_rfc3339();
        assert_eq!(classify(&at(start), &cfg), Verdict::Keep);
        assert_eq!(classify(&at(end), &cfg), Verdict::Keep);
        assert_eq!(
            classify(&at("2023-12-31T23:59:59Z".to_string()), &cfg),
            Verdict::Stop
        );
    }
}
