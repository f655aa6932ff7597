//! Single-pass aggregation of conversation statistics.
//!
//! Every statistic is accumulated independently while walking the
//! filtered conversations once; records are only read, never modified.

use crate::analysis::erv::erv_from_value;
use crate::config::AnalysisConfig;
use crate::models::{
    Conversation, EngagementCounts, ErvSource, FunnelBucket, Statistics, TagCount,
    ThresholdBucket, ValueBucket, HISTOGRAM_CAP, INTERACTION_THRESHOLDS, RESPONSE_THRESHOLD,
};
use std::collections::{BTreeMap, HashMap};
use tracing::debug;

/// Settings that shape how conversations are read during aggregation.
#[derive(Debug, Clone)]
pub struct AggregationSettings {
    /// Tags tracked as funnel stages, in report order.
    pub funnel_tags: Vec<String>,
    /// Key holding the ERV.
    pub erv_variable: String,
    /// Object the ERV key is looked up in.
    pub erv_source: ErvSource,
    /// Currency symbol stripped from ERV strings.
    pub currency_symbol: String,
    /// Tag that gets its own message-count histogram.
    pub tag_key: Option<String>,
}

impl Default for AggregationSettings {
    fn default() -> Self {
        Self::from(&AnalysisConfig::default())
    }
}

impl From<&AnalysisConfig> for AggregationSettings {
    fn from(config: &AnalysisConfig) -> Self {
        Self {
            funnel_tags: config.funnel_tags.clone(),
            erv_variable: config.erv_variable.clone(),
            erv_source: config.erv_source,
            currency_symbol: config.currency_symbol.clone(),
            tag_key: config.tag_key.clone(),
        }
    }
}

/// Running accumulator; feed it with [`Aggregator::add`], then [`Aggregator::finish`].
#[derive(Debug)]
pub struct Aggregator {
    settings: AggregationSettings,
    total: usize,
    overall: ValueBucket,
    with_response: usize,
    interactions: Vec<ThresholdBucket>,
    funnel: Vec<FunnelBucket>,
    untagged: ValueBucket,
    tag_counts: Vec<TagCount>,
    tag_index: HashMap<String, usize>,
    histogram: BTreeMap<u64, ValueBucket>,
    tag_key_histogram: BTreeMap<u64, ValueBucket>,
}

impl Aggregator {
    pub fn new(settings: AggregationSettings) -> Self {
        let funnel = settings
            .funnel_tags
            .iter()
            .map(|tag| FunnelBucket {
                tag: tag.clone(),
                bucket: ValueBucket::default(),
                interactions: threshold_buckets(),
            })
            .collect();

        Self {
            settings,
            total: 0,
            overall: ValueBucket::default(),
            with_response: 0,
            interactions: threshold_buckets(),
            funnel,
            untagged: ValueBucket::default(),
            tag_counts: Vec::new(),
            tag_index: HashMap::new(),
            histogram: BTreeMap::new(),
            tag_key_histogram: BTreeMap::new(),
        }
    }

    /// Account for one conversation.
    pub fn add(&mut self, conversation: &Conversation) {
        let msg_count = conversation.message_count();
        let erv = erv_from_value(
            conversation.erv_field(&self.settings.erv_variable, self.settings.erv_source),
            &self.settings.currency_symbol,
        );
        let human = conversation.has_human_attendance();

        self.total += 1;
        self.overall.add(erv, human);
        self.histogram
            .entry(msg_count.min(HISTOGRAM_CAP))
            .or_default()
            .add(erv, human);

        if msg_count > RESPONSE_THRESHOLD {
            self.with_response += 1;
        }
        add_to_thresholds(&mut self.interactions, msg_count, erv, human);

        let tags = conversation.tags();
        if let Some(ref key) = self.settings.tag_key {
            if tags.iter().any(|t| *t == key.as_str()) {
                self.tag_key_histogram
                    .entry(msg_count.min(HISTOGRAM_CAP))
                    .or_default()
                    .add(erv, human);
            }
        }

        let mut has_funnel_tag = false;
        for tag in tags {
            self.count_tag(tag);

            if let Some(stage) = self.funnel.iter_mut().find(|f| f.tag == tag) {
                has_funnel_tag = true;
                stage.bucket.add(erv, human);
                add_to_thresholds(&mut stage.interactions, msg_count, erv, human);
            }
        }

        if !has_funnel_tag {
            self.untagged.add(erv, human);
        }
    }

    fn count_tag(&mut self, tag: &str) {
        match self.tag_index.get(tag) {
            Some(&idx) => self.tag_counts[idx].count += 1,
            None => {
                self.tag_index.insert(tag.to_string(), self.tag_counts.len());
                self.tag_counts.push(TagCount {
                    tag: tag.to_string(),
                    count: 1,
                });
            }
        }
    }

    /// Produce the final statistics.
    pub fn finish(self) -> Statistics {
        let mut tags = self.tag_counts;
        // Stable: equal counts keep first-seen order.
        tags.sort_by_key(|t| std::cmp::Reverse(t.count));

        debug!(
            "Aggregated {} conversations, {} distinct tags",
            self.total,
            tags.len()
        );

        let over = |threshold: u64| {
            self.interactions
                .iter()
                .find(|b| b.threshold == threshold)
                .map_or(0, |b| b.bucket.count)
        };
        let engagement = EngagementCounts {
            with_response: self.with_response,
            more_than_3: over(3),
            more_than_5: over(5),
            more_than_7: over(7),
            more_than_10: over(10),
        };

        Statistics {
            total: self.total,
            overall: self.overall,
            engagement,
            interactions: self.interactions,
            funnel: self.funnel,
            untagged: self.untagged,
            tags,
            message_histogram: self.histogram,
            tag_key: self.settings.tag_key,
            tag_key_histogram: self.tag_key_histogram,
        }
    }
}

fn threshold_buckets() -> Vec<ThresholdBucket> {
    INTERACTION_THRESHOLDS
        .iter()
        .map(|&threshold| ThresholdBucket {
            threshold,
            bucket: ValueBucket::default(),
        })
        .collect()
}

fn add_to_thresholds(buckets: &mut [ThresholdBucket], msg_count: u64, erv: f64, human: bool) {
    for b in buckets.iter_mut().filter(|b| msg_count > b.threshold) {
        b.bucket.add(erv, human);
    }
}

/// Aggregate a whole list of conversations in one pass.
pub fn analyze(conversations: &[Conversation], settings: &AggregationSettings) -> Statistics {
    let mut aggregator = Aggregator::new(settings.clone());
    for conversation in conversations {
        aggregator.add(conversation);
    }
    aggregator.finish()
}
