//! Statistics report generation.
//!
//! The text report is what gets printed to the console at the end of a
//! run; the JSON report carries the same numbers for other tools.

use crate::analysis::format_money;
use crate::models::{CumulativePoint, Statistics, StatsReport, ValueBucket};
use anyhow::Result;
use std::fmt::Write as _;

/// Generate the console statistics report.
pub fn generate_text_report(stats: &Statistics, currency: &str) -> String {
    let mut output = String::new();

    output.push_str("\n--- Statistics ---\n");
    output.push_str(&format!("Total conversations: {}\n", stats.total));

    if stats.total == 0 {
        output.push_str("No conversations found to analyze.\n");
        output.push_str("------------------\n");
        return output;
    }

    output.push_str(&generate_engagement_section(stats, currency));
    output.push_str(&generate_interactions_section(stats, currency));
    output.push_str(&generate_funnel_section(stats, currency));
    output.push_str(&generate_tag_section(stats));
    output.push_str(&generate_curve_section(
        "More Than N Interactions",
        &stats.cumulative_interactions(),
        stats,
        currency,
    ));
    if let Some(ref tag) = stats.tag_key {
        output.push_str(&generate_curve_section(
            &format!("More Than N Interactions (Tag: {})", tag),
            &stats.tag_key_interactions(),
            stats,
            currency,
        ));
    }
    output.push_str("------------------\n");

    output
}

fn generate_engagement_section(stats: &Statistics, currency: &str) -> String {
    let mut section = String::new();

    for (label, count) in stats.engagement.labelled() {
        let _ = writeln!(
            section,
            "{}: {} ({:.2}%)",
            label,
            count,
            stats.pct_of_total(count)
        );
    }
    let _ = writeln!(
        section,
        "Human attendance: {} ({:.2}%)",
        stats.overall.human_attendance,
        stats.overall.human_attendance_pct()
    );
    let _ = writeln!(
        section,
        "Total ERV: {}",
        format_money(stats.overall.total_erv, currency)
    );

    section
}

fn generate_interactions_section(stats: &Statistics, currency: &str) -> String {
    let mut section = String::from("\n--- Interaction ERV Analysis ---\n");

    for b in &stats.interactions {
        let _ = writeln!(section, "{}:", b.label());
        section.push_str(&bucket_lines(&b.bucket, currency));
    }

    section
}

fn generate_funnel_section(stats: &Statistics, currency: &str) -> String {
    let mut section = String::from("\n--- Funnel & ERV Analysis (Tags) ---\n");

    for stage in &stats.funnel {
        let _ = writeln!(section, "Tag: {}", stage.tag);
        section.push_str(&bucket_lines(&stage.bucket, currency));
        for b in stage.interactions.iter().filter(|b| b.bucket.count > 0) {
            let _ = writeln!(
                section,
                "    {}: {} ({})",
                b.label(),
                b.bucket.count,
                format_money(b.bucket.total_erv, currency)
            );
        }
    }

    let _ = writeln!(section, "Without funnel tags:");
    section.push_str(&bucket_lines(&stats.untagged, currency));
    let _ = writeln!(
        section,
        "  Share: {:.2}%",
        stats.pct_of_total(stats.untagged.count)
    );

    section
}

fn generate_tag_section(stats: &Statistics) -> String {
    let mut section = String::from("\n--- Tag Volume ---\n");

    if stats.tags.is_empty() {
        section.push_str("No tags found.\n");
        return section;
    }

    for tag in &stats.tags {
        let _ = writeln!(
            section,
            "{}: {} ({:.2}%)",
            tag.tag,
            tag.count,
            stats.pct_of_total(tag.count)
        );
    }

    section
}

fn generate_curve_section(
    title: &str,
    curve: &[CumulativePoint],
    stats: &Statistics,
    currency: &str,
) -> String {
    if curve.is_empty() {
        return String::new();
    }

    let mut section = format!("\n--- {} ---\n", title);
    for point in curve {
        let _ = writeln!(
            section,
            "> {:>2}: {} ({:.2}%), avg ERV {}",
            point.interactions,
            point.count,
            stats.pct_of_total(point.count),
            format_money(point.avg_erv, currency)
        );
    }

    section
}

fn bucket_lines(bucket: &ValueBucket, currency: &str) -> String {
    format!(
        "  Volume: {}\n  Total ERV: {}\n  Avg ERV: {}\n  Human attendance: {} ({:.2}%)\n",
        bucket.count,
        format_money(bucket.total_erv, currency),
        format_money(bucket.avg_erv(), currency),
        bucket.human_attendance,
        bucket.human_attendance_pct()
    )
}

/// Generate a JSON statistics report.
pub fn generate_json_report(report: &StatsReport) -> Result<String> {
    serde_json::to_string_pretty(report).map_err(Into::into)
}
