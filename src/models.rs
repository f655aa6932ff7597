//! Data models shared across the fetcher, aggregator and reports.
//!
//! Conversation records are kept as opaque JSON objects (with serde_json's
//! `preserve_order`, so field order survives) and are persisted exactly as
//! the API returned them; typed accessors do the lookups the rest of the
//! crate needs.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;

/// Field names that may carry a conversation's creation time, in lookup order.
pub const TIMESTAMP_ALIASES: [&str; 4] = ["created_time", "created_at", "inserted_at", "created"];

/// Exclusive lower bound for a conversation to count as "responded".
pub const RESPONSE_THRESHOLD: u64 = 1;

/// Exclusive lower bounds of the interaction buckets.
pub const INTERACTION_THRESHOLDS: [u64; 4] = [3, 5, 7, 10];

/// Message counts at or above this value share the last histogram bin ("21+").
pub const HISTOGRAM_CAP: u64 = 21;

/// A single conversation record, exactly as returned by the API.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Conversation(pub Map<String, Value>);

impl Conversation {
    /// Look up a top-level field.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Top-level keys, used when reporting records without a timestamp.
    pub fn keys(&self) -> Vec<&str> {
        self.0.keys().map(String::as_str).collect()
    }

    /// First timestamp alias holding a usable value.
    ///
    /// `null`, `false` and empty strings are treated as absent so the
    /// lookup falls through to the next alias.
    pub fn created_at_raw(&self) -> Option<(&'static str, &Value)> {
        TIMESTAMP_ALIASES.iter().find_map(|alias| {
            let value = self.get(alias)?;
            let present = match value {
                Value::Null | Value::Bool(false) => false,
                Value::String(s) => !s.is_empty(),
                _ => true,
            };
            present.then_some((*alias, value))
        })
    }

    /// Number of messages exchanged; 0 when absent or not numeric.
    pub fn message_count(&self) -> u64 {
        match self.get("message_count") {
            Some(Value::Number(n)) => n
                .as_u64()
                .or_else(|| n.as_f64().filter(|f| *f > 0.0).map(|f| f as u64))
                .unwrap_or(0),
            _ => 0,
        }
    }

    /// The nested `context` object, if any.
    pub fn context(&self) -> Option<&Map<String, Value>> {
        self.get("context")?.as_object()
    }

    /// String labels under `context.tags`; other entries are skipped.
    pub fn tags(&self) -> Vec<&str> {
        self.context()
            .and_then(|ctx| ctx.get("tags"))
            .and_then(Value::as_array)
            .map(|tags| tags.iter().filter_map(Value::as_str).collect())
            .unwrap_or_default()
    }

    /// Raw value of `context.live_instructions.<variable>`.
    pub fn live_instruction(&self, variable: &str) -> Option<&Value> {
        self.context()?
            .get("live_instructions")?
            .as_object()?
            .get(variable)
    }

    /// ERV field `variable`, read from wherever `source` says it lives.
    pub fn erv_field(&self, variable: &str, source: ErvSource) -> Option<&Value> {
        match source {
            ErvSource::LiveInstructions => self.live_instruction(variable),
            ErvSource::Context => self.context()?.get(variable),
        }
    }

    /// Whether a human agent was assigned to the conversation.
    pub fn has_human_attendance(&self) -> bool {
        matches!(self.get("assignee_agent_id"), Some(v) if !v.is_null())
    }
}

impl From<Map<String, Value>> for Conversation {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

/// Closed time interval `[start, end]` in UTC.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeWindow {
    /// Window of `days` days ending at `end`.
    pub fn trailing(end: DateTime<Utc>, days: u32) -> Self {
        Self {
            start: end - Duration::days(i64::from(days)),
            end,
        }
    }

    pub fn contains(&self, ts: DateTime<Utc>) -> bool {
        self.start <= ts && ts <= self.end
    }

    /// Length of the window in whole days.
    pub fn days(&self) -> i64 {
        (self.end - self.start).num_days()
    }
}

impl fmt::Display for TimeWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} to {}",
            self.start.format("%Y-%m-%d %H:%M:%S UTC"),
            self.end.format("%Y-%m-%d %H:%M:%S UTC")
        )
    }
}

/// What to do with records whose creation time is missing or unparseable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimestampPolicy {
    /// Keep them (they cannot be placed outside the window).
    #[default]
    Lenient,
    /// Drop them.
    Strict,
}

/// Ordering the upstream API is assumed to return records in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PageOrdering {
    /// Newest first: the first record older than the window ends pagination.
    #[default]
    NewestFirst,
    /// No guarantee: every page is read and old records are skipped.
    Unordered,
}

impl fmt::Display for PageOrdering {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PageOrdering::NewestFirst => write!(f, "newest-first"),
            PageOrdering::Unordered => write!(f, "unordered"),
        }
    }
}

/// Where a conversation's ERV value is stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErvSource {
    /// `context.live_instructions.<variable>`
    #[default]
    LiveInstructions,
    /// `context.<variable>`
    Context,
}

/// Count, monetary total and human-attendance tally for a group of conversations.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ValueBucket {
    pub count: usize,
    pub total_erv: f64,
    pub human_attendance: usize,
}

impl ValueBucket {
    /// Record one conversation in this bucket.
    pub fn add(&mut self, erv: f64, human: bool) {
        self.count += 1;
        self.total_erv += erv;
        if human {
            self.human_attendance += 1;
        }
    }

    pub fn avg_erv(&self) -> f64 {
        if self.count > 0 {
            self.total_erv / self.count as f64
        } else {
            0.0
        }
    }

    /// Share of this bucket's conversations attended by a human, in percent.
    pub fn human_attendance_pct(&self) -> f64 {
        percentage(self.human_attendance, self.count)
    }
}

/// Conversations with more than `threshold` messages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThresholdBucket {
    pub threshold: u64,
    #[serde(flatten)]
    pub bucket: ValueBucket,
}

impl ThresholdBucket {
    /// Human-readable label, e.g. "More Than 3".
    pub fn label(&self) -> String {
        format!("More Than {}", self.threshold)
    }
}

/// Conversations carrying a given funnel tag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunnelBucket {
    pub tag: String,
    #[serde(flatten)]
    pub bucket: ValueBucket,
    /// Threshold buckets restricted to conversations carrying this tag.
    pub interactions: Vec<ThresholdBucket>,
}

/// Occurrences of a tag across all conversations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagCount {
    pub tag: String,
    pub count: usize,
}

/// The five engagement counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngagementCounts {
    pub with_response: usize,
    pub more_than_3: usize,
    pub more_than_5: usize,
    pub more_than_7: usize,
    pub more_than_10: usize,
}

impl EngagementCounts {
    /// Counters paired with their report labels, in display order.
    pub fn labelled(&self) -> [(&'static str, usize); 5] {
        [
            ("With response (>1 message)", self.with_response),
            ("More than 3 interactions", self.more_than_3),
            ("More than 5 interactions", self.more_than_5),
            ("More than 7 interactions", self.more_than_7),
            ("More than 10 interactions", self.more_than_10),
        ]
    }
}

/// One point of the cumulative "more than N interactions" curve.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CumulativePoint {
    pub interactions: u64,
    pub count: usize,
    pub total_erv: f64,
    pub avg_erv: f64,
    pub human_attendance: usize,
}

/// Everything the aggregator computes in one pass.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Statistics {
    /// Number of conversations analyzed.
    pub total: usize,
    /// All conversations taken together.
    pub overall: ValueBucket,
    pub engagement: EngagementCounts,
    pub interactions: Vec<ThresholdBucket>,
    pub funnel: Vec<FunnelBucket>,
    /// Conversations carrying none of the funnel tags.
    pub untagged: ValueBucket,
    /// Tag frequencies, most frequent first; ties keep first-seen order.
    pub tags: Vec<TagCount>,
    /// Conversations per exact message count; the last bin is `HISTOGRAM_CAP`+.
    pub message_histogram: BTreeMap<u64, ValueBucket>,
    /// The client's key tag, when one is configured.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag_key: Option<String>,
    /// Same as `message_histogram`, restricted to conversations carrying `tag_key`.
    #[serde(default)]
    pub tag_key_histogram: BTreeMap<u64, ValueBucket>,
}

impl Statistics {
    /// Percentage of all analyzed conversations that `count` represents.
    pub fn pct_of_total(&self, count: usize) -> f64 {
        percentage(count, self.total)
    }

    /// For each n from 0 up to the largest histogram bin, the conversations
    /// with more than n messages. Points with no conversations are omitted.
    pub fn cumulative_interactions(&self) -> Vec<CumulativePoint> {
        cumulative_curve(&self.message_histogram)
    }

    /// The cumulative curve over conversations carrying the key tag.
    pub fn tag_key_interactions(&self) -> Vec<CumulativePoint> {
        cumulative_curve(&self.tag_key_histogram)
    }
}

/// Cumulative "more than n" curve over an exact-count histogram.
pub fn cumulative_curve(histogram: &BTreeMap<u64, ValueBucket>) -> Vec<CumulativePoint> {
    let max = match histogram.keys().next_back() {
        Some(max) => *max,
        None => return Vec::new(),
    };

    (0..=max)
        .filter_map(|n| {
            let mut acc = ValueBucket::default();
            for bucket in histogram.range(n + 1..).map(|(_, b)| b) {
                acc.count += bucket.count;
                acc.total_erv += bucket.total_erv;
                acc.human_attendance += bucket.human_attendance;
            }
            (acc.count > 0).then(|| CumulativePoint {
                interactions: n,
                count: acc.count,
                total_erv: acc.total_erv,
                avg_erv: acc.avg_erv(),
                human_attendance: acc.human_attendance,
            })
        })
        .collect()
}

/// Metadata about a statistics run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportMetadata {
    pub generated_at: DateTime<Utc>,
    pub account_slug: String,
    pub display_name: Option<String>,
    pub window: TimeWindow,
    /// Whether pagination ended because of a failed request.
    pub partial: bool,
}

/// The statistics report written with `--stats-output`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatsReport {
    pub metadata: ReportMetadata,
    pub statistics: Statistics,
    pub cumulative_interactions: Vec<CumulativePoint>,
    pub tag_key_interactions: Vec<CumulativePoint>,
}

impl StatsReport {
    pub fn new(metadata: ReportMetadata, statistics: Statistics) -> Self {
        let cumulative_interactions = statistics.cumulative_interactions();
        let tag_key_interactions = statistics.tag_key_interactions();
        Self {
            metadata,
            statistics,
            cumulative_interactions,
            tag_key_interactions,
        }
    }
}

fn percentage(part: usize, whole: usize) -> f64 {
    if whole > 0 {
        part as f64 / whole as f64 * 100.0
    } else {
        0.0
    }
}
