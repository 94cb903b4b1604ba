//! Sentiment aggregations over call records.
//!
//! Computes the (attendant, sentiment) overview counts, the duration- and
//! selection-filtered sentiment counts for a single attendant, and
//! per-attendant call summaries.

use sac_core::config::DEFAULT_DURATION_THRESHOLD_SECS;
use sac_core::types::CallRecord;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

/// Count of records for one (attendant, sentiment) pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregateRow {
    pub attendant: String,
    pub sentiment: String,
    pub count: u32,
}

/// The attendant and sentiment labels currently selected.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FilterSelection {
    pub attendant: String,
    /// Selected labels in display order, without duplicates.
    sentiments: Vec<String>,
}

impl FilterSelection {
    pub fn new<I, S>(attendant: impl Into<String>, sentiments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut selection = Self {
            attendant: attendant.into(),
            sentiments: Vec::new(),
        };
        selection.set_sentiments(sentiments);
        selection
    }

    pub fn sentiments(&self) -> &[String] {
        &self.sentiments
    }

    /// Replace the selected labels, keeping first occurrences only.
    pub fn set_sentiments<I, S>(&mut self, sentiments: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.sentiments.clear();
        for sentiment in sentiments {
            let sentiment = sentiment.into();
            if !self.sentiments.contains(&sentiment) {
                self.sentiments.push(sentiment);
            }
        }
    }

    /// Add the label if absent, remove it if present. Returns whether it is
    /// selected afterwards.
    pub fn toggle(&mut self, sentiment: &str) -> bool {
        if let Some(pos) = self.sentiments.iter().position(|s| s == sentiment) {
            self.sentiments.remove(pos);
            false
        } else {
            self.sentiments.push(sentiment.to_string());
            true
        }
    }

    pub fn is_selected(&self, sentiment: &str) -> bool {
        self.sentiments.iter().any(|s| s == sentiment)
    }
}

/// Per-label counts for a filtered view, one entry per selected label.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilteredCount {
    pub entries: Vec<(String, u32)>,
}

impl FilteredCount {
    pub fn get(&self, sentiment: &str) -> Option<u32> {
        self.entries
            .iter()
            .find(|(label, _)| label == sentiment)
            .map(|(_, count)| *count)
    }

    pub fn total(&self) -> u32 {
        self.entries.iter().map(|(_, count)| count).sum()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn is_all_zero(&self) -> bool {
        self.total() == 0
    }

    /// Fraction of the total per label (0.0..1.0), all zero when nothing matched.
    pub fn shares(&self) -> Vec<(String, f64)> {
        let total = self.total();
        self.entries
            .iter()
            .map(|(label, count)| {
                let share = if total == 0 {
                    0.0
                } else {
                    *count as f64 / total as f64
                };
                (label.clone(), share)
            })
            .collect()
    }
}

/// Call statistics for one attendant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttendantSummary {
    pub attendant: String,
    pub total_calls: u32,
    /// Calls whose duration could be parsed.
    pub timed_calls: u32,
    /// Calls strictly longer than the threshold.
    pub long_calls: u32,
    /// Mean duration of the timed calls, in seconds.
    pub average_duration_secs: Option<u64>,
}

/// Aggregation engine holding the duration threshold for filtered views.
#[derive(Debug, Clone, Copy)]
pub struct SentimentAggregator {
    threshold: Duration,
}

impl SentimentAggregator {
    pub fn new(threshold: Duration) -> Self {
        Self { threshold }
    }

    pub fn threshold(&self) -> Duration {
        self.threshold
    }

    /// Count every (attendant, sentiment) pair, sorted by attendant then
    /// sentiment. No filtering.
    pub fn overview(&self, records: &[CallRecord]) -> Vec<AggregateRow> {
        let mut counts: BTreeMap<(&str, &str), u32> = BTreeMap::new();
        for record in records {
            *counts
                .entry((record.attendant.as_str(), record.sentiment.as_str()))
                .or_insert(0) += 1;
        }

        counts
            .into_iter()
            .map(|((attendant, sentiment), count)| AggregateRow {
                attendant: attendant.to_string(),
                sentiment: sentiment.to_string(),
                count,
            })
            .collect()
    }

    /// Records behind the filtered view, in dataset order: longer than the
    /// threshold, from the selected attendant, with a selected sentiment.
    pub fn filtered_records<'a>(
        &self,
        records: &'a [CallRecord],
        selection: &FilterSelection,
    ) -> Vec<&'a CallRecord> {
        records
            .iter()
            .filter(|r| r.exceeds(self.threshold))
            .filter(|r| r.attendant == selection.attendant)
            .filter(|r| selection.is_selected(&r.sentiment))
            .collect()
    }

    /// Sentiment counts for the filtered view, zero-filled so every selected
    /// label has exactly one entry, in selection order.
    pub fn filtered_counts(
        &self,
        records: &[CallRecord],
        selection: &FilterSelection,
    ) -> FilteredCount {
        let mut counts: HashMap<&str, u32> = HashMap::new();
        for record in self.filtered_records(records, selection) {
            *counts.entry(record.sentiment.as_str()).or_insert(0) += 1;
        }

        let entries = selection
            .sentiments()
            .iter()
            .map(|label| (label.clone(), counts.get(label.as_str()).copied().unwrap_or(0)))
            .collect();

        tracing::debug!(
            "Filtered counts for {} over {} labels",
            selection.attendant,
            selection.sentiments().len()
        );
        FilteredCount { entries }
    }

    /// Per-attendant call statistics, sorted by attendant.
    pub fn attendant_summaries(&self, records: &[CallRecord]) -> Vec<AttendantSummary> {
        struct Acc {
            total: u32,
            timed: u32,
            long: u32,
            duration_sum: Duration,
        }

        let mut by_attendant: BTreeMap<&str, Acc> = BTreeMap::new();
        for record in records {
            let acc = by_attendant
                .entry(record.attendant.as_str())
                .or_insert(Acc {
                    total: 0,
                    timed: 0,
                    long: 0,
                    duration_sum: Duration::ZERO,
                });
            acc.total += 1;
            if let Some(elapsed) = record.elapsed() {
                acc.timed += 1;
                acc.duration_sum = acc.duration_sum.saturating_add(elapsed);
                if elapsed > self.threshold {
                    acc.long += 1;
                }
            }
        }

        by_attendant
            .into_iter()
            .map(|(attendant, acc)| AttendantSummary {
                attendant: attendant.to_string(),
                total_calls: acc.total,
                timed_calls: acc.timed,
                long_calls: acc.long,
                average_duration_secs: (acc.timed > 0)
                    .then(|| acc.duration_sum.as_secs() / acc.timed as u64),
            })
            .collect()
    }
}

impl Default for SentimentAggregator {
    fn default() -> Self {
        Self::new(Duration::from_secs(DEFAULT_DURATION_THRESHOLD_SECS))
    }
}

/// Format seconds as a human-readable duration string.
pub fn format_duration(seconds: u64) -> String {
    let hours = seconds / 3600;
    let minutes = (seconds % 3600) / 60;
    let secs = seconds % 60;

    if hours > 0 {
        format!("{}h {}m", hours, minutes)
    } else if minutes > 0 {
        format!("{}m {}s", minutes, secs)
    } else {
        format!("{}s", secs)
    }
}
