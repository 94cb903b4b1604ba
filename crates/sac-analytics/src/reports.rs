//! Text and markdown rendering of the aggregates.
//!
//! The overview table is the textual form of the grouped bar chart; the
//! filtered summary combines the bar and pie views of one attendant.

use crate::aggregations::{
    format_duration, AggregateRow, FilterSelection, FilteredCount, SentimentAggregator,
};
use sac_core::loader::LoadOutcome;
use std::collections::{BTreeMap, BTreeSet};

const BAR_WIDTH: usize = 30;

/// Report generator for terminal and markdown output.
pub struct ReportGenerator;

impl ReportGenerator {
    /// Attendant-by-sentiment pivot table in markdown.
    pub fn overview_table(rows: &[AggregateRow]) -> String {
        if rows.is_empty() {
            return "No calls loaded.\n".to_string();
        }

        let sentiments: BTreeSet<&str> = rows.iter().map(|r| r.sentiment.as_str()).collect();
        let mut pivot: BTreeMap<&str, BTreeMap<&str, u32>> = BTreeMap::new();
        for row in rows {
            pivot
                .entry(row.attendant.as_str())
                .or_default()
                .insert(row.sentiment.as_str(), row.count);
        }

        let mut table = String::from("| Attendant |");
        for sentiment in &sentiments {
            table.push_str(&format!(" {} |", escape_cell(sentiment)));
        }
        table.push_str(" Total |\n|-----------|");
        for sentiment in &sentiments {
            let width = escape_cell(sentiment).chars().count() + 2;
            table.push_str(&format!("{}|", "-".repeat(width)));
        }
        table.push_str("-------|\n");

        for (attendant, counts) in &pivot {
            table.push_str(&format!("| {} |", escape_cell(attendant)));
            for sentiment in &sentiments {
                table.push_str(&format!(" {} |", counts.get(sentiment).copied().unwrap_or(0)));
            }
            table.push_str(&format!(" {} |\n", counts.values().sum::<u32>()));
        }

        table
    }

    /// Counts with proportional bars and percentage shares for one attendant.
    pub fn filtered_summary(
        selection: &FilterSelection,
        counts: &FilteredCount,
        aggregator: &SentimentAggregator,
    ) -> String {
        let mut output = format!(
            "  {} (calls longer than {})\n",
            selection.attendant,
            format_duration(aggregator.threshold().as_secs())
        );

        if counts.is_empty() {
            output.push_str("  No sentiments selected.\n");
            return output;
        }

        let label_width = counts
            .entries
            .iter()
            .map(|(label, _)| label.chars().count())
            .max()
            .unwrap_or(0);
        let max = counts.entries.iter().map(|(_, c)| *c).max().unwrap_or(0);

        for ((label, count), (_, share)) in counts.entries.iter().zip(counts.shares()) {
            let bar_len = if max == 0 {
                0
            } else {
                (*count as usize * BAR_WIDTH).div_ceil(max as usize)
            };
            output.push_str(&format!(
                "  {:<width$}  {:>4}  {:>5.1}%  {}\n",
                label,
                count,
                share * 100.0,
                "█".repeat(bar_len),
                width = label_width
            ));
        }

        if counts.is_all_zero() {
            output.push_str("  No calls matched the selected filters.\n");
        } else {
            output.push_str(&format!("  Total: {}\n", counts.total()));
        }

        output
    }

    /// Full markdown report: data origin, notices, overview and per-attendant stats.
    pub fn markdown_report(outcome: &LoadOutcome, aggregator: &SentimentAggregator) -> String {
        let records = outcome.dataset.records();
        let mut report = String::from("# Sentiment by Attendant\n\n");

        report.push_str(&format!("- **Source:** {}\n", outcome.origin));
        report.push_str(&format!("- **Calls:** {}\n", records.len()));
        report.push_str(&format!(
            "- **Duration threshold:** {}\n\n",
            format_duration(aggregator.threshold().as_secs())
        ));

        if !outcome.notices.is_empty() {
            report.push_str("## Notices\n\n");
            for notice in &outcome.notices {
                report.push_str(&format!("- {}\n", notice));
            }
            report.push('\n');
        }

        report.push_str("## Overview\n\n");
        report.push_str(&Self::overview_table(&aggregator.overview(records)));
        report.push('\n');

        let summaries = aggregator.attendant_summaries(records);
        if !summaries.is_empty() {
            report.push_str("## Attendants\n\n");
            report.push_str("| Attendant | Calls | Timed | Above threshold | Avg duration |\n");
            report.push_str("|-----------|-------|-------|-----------------|--------------|\n");
            for s in &summaries {
                report.push_str(&format!(
                    "| {} | {} | {} | {} | {} |\n",
                    escape_cell(&s.attendant),
                    s.total_calls,
                    s.timed_calls,
                    s.long_calls,
                    s.average_duration_secs
                        .map(format_duration)
                        .unwrap_or_else(|| "-".to_string()),
                ));
            }
            report.push('\n');
        }

        report
    }
}

/// A `|` inside a cell would end it early.
fn escape_cell(text: &str) -> String {
    text.replace('|', "\\|")
}
