//! Text summary builders for CLI output.
//!
//! This module derives metrics and formats human-readable lines for text mode.

use crate::competition::{CompetitorProfile, CompetitorShare, ContactKindCount};
use crate::metrics::{self, CalendarMonth, Intensity, Overview, PositionDistribution, StatCard, Timeline};
use crate::model::{Contact, Execution, Keyword};
use std::time::{Duration, SystemTime};

/// Pre-formatted lines for text output.
pub(crate) struct TextSummary {
    pub lines: Vec<String>,
}

/// Build the summary of one execution: counters, rates and running time.
pub(crate) fn build_text_summary(execution: &Execution, now: SystemTime) -> TextSummary {
    let mut lines = Vec::new();
    let rates = metrics::execution_rates(execution);

    lines.push(format!(
        "Execution {} ({}, {})",
        execution.id,
        execution.status.as_str(),
        execution.mode.as_str()
    ));
    lines.push(format!("Started: {}", execution.start_time));
    match execution.end_time.as_deref() {
        Some(end) => lines.push(format!("Ended:   {end}")),
        None => {
            if let Some(elapsed) = metrics::running_time(&execution.start_time, now) {
                lines.push(format!("Running: {}", format_elapsed(elapsed)));
            }
        }
    }
    lines.push(format!(
        "Searches: {}  Clicks: {}  Target found: {}",
        execution.total_searches, execution.total_clicks, execution.total_target_found
    ));
    lines.push(format!(
        "Target rate: {:.2}%  Click rate: {:.2}%",
        rates.target_rate, rates.click_rate
    ));
    if let Some(err) = execution.error_message.as_deref() {
        lines.push(format!("Error: {err}"));
    }

    TextSummary { lines }
}

/// One-line progress update used while watching an execution.
pub(crate) fn progress_line(execution: &Execution) -> String {
    let rates = metrics::execution_rates(execution);
    format!(
        "[{}] searches {} clicks {} target {} ({:.2}%)",
        execution.status.as_str(),
        execution.total_searches,
        execution.total_clicks,
        execution.total_target_found,
        rates.target_rate
    )
}

/// Whole seconds as `HH:MM:SS`.
pub(crate) fn format_elapsed(elapsed: Duration) -> String {
    let secs = elapsed.as_secs();
    format!("{:02}:{:02}:{:02}", secs / 3600, (secs / 60) % 60, secs % 60)
}

fn card(label: &str, card: &StatCard) -> String {
    let arrow = if card.trend.is_positive { '+' } else { '-' };
    format!("{label:<14}{:>10}  {arrow}{:.1}%", card.value, card.trend.value)
}

pub(crate) fn overview_lines(overview: &Overview) -> Vec<String> {
    vec![
        card("Executions", &overview.executions),
        card("Searches", &overview.searches),
        card("Clicks", &overview.clicks),
        card("Target found", &overview.target_found),
    ]
}

pub(crate) fn timeline_lines(timeline: &Timeline) -> Vec<String> {
    let mut lines = vec![format!(
        "{:<12}{:>10}{:>8}{:>8}{:>9}{:>9}",
        "Date", "Searches", "Clicks", "Target", "Click%", "Target%"
    )];
    for p in &timeline.points {
        lines.push(format!(
            "{:<12}{:>10}{:>8}{:>8}{:>9.2}{:>9.2}",
            p.date, p.searches, p.clicks, p.target_found, p.click_rate, p.target_rate
        ));
    }
    lines.push(format!(
        "Total searches: {}  Daily average: {}",
        timeline.total_searches, timeline.daily_average
    ));
    lines
}

pub(crate) fn position_lines(distribution: &PositionDistribution) -> Vec<String> {
    let mut lines: Vec<String> = distribution
        .buckets
        .iter()
        .map(|b| {
            let bar = "#".repeat((b.percentage / 2.0).round() as usize);
            format!(
                "Position {}: {:>6} ({:>5.1}%) {bar}",
                b.position, b.count, b.percentage
            )
        })
        .collect();
    match metrics::most_frequent_bucket(&distribution.buckets) {
        Some(position) => lines.push(format!("Most frequent: position {position}")),
        None => lines.push("Most frequent: -".to_string()),
    }
    if distribution.excluded > 0 {
        lines.push(format!(
            "Excluded (outside positions 1-4): {}",
            distribution.excluded
        ));
    }
    lines
}

fn intensity_mark(intensity: Intensity) -> char {
    match intensity {
        Intensity::None => '.',
        Intensity::Low => '-',
        Intensity::Medium => '+',
        Intensity::High => '#',
    }
}

/// Sunday-first month grid; each cell is the day number and an intensity mark.
pub(crate) fn calendar_lines(month: &CalendarMonth) -> Vec<String> {
    let mut lines = vec![
        format!("{:04}-{:02}", month.year, month.month),
        " Su  Mo  Tu  We  Th  Fr  Sa".to_string(),
    ];
    let mut row = "    ".repeat(month.leading_blanks as usize);
    let mut col = month.leading_blanks as usize;
    for cell in &month.cells {
        row.push_str(&format!("{:>3}{}", cell.day, intensity_mark(cell.intensity)));
        col += 1;
        if col == 7 {
            lines.push(std::mem::take(&mut row));
            col = 0;
        }
    }
    if !row.is_empty() {
        lines.push(row);
    }
    let total: u64 = month.cells.iter().map(|c| c.executions).sum();
    lines.push(format!("Executions this month: {total}"));
    lines
}

pub(crate) fn keyword_lines(keywords: &[Keyword]) -> Vec<String> {
    if keywords.is_empty() {
        return vec!["No keywords.".to_string()];
    }
    keywords
        .iter()
        .map(|k| {
            format!(
                "{:>5} [{}] {}  (used {}x)",
                k.id,
                if k.active { "on " } else { "off" },
                k.text,
                k.use_count
            )
        })
        .collect()
}

pub(crate) fn history_lines(executions: &[Execution]) -> Vec<String> {
    if executions.is_empty() {
        return vec!["No executions yet.".to_string()];
    }
    executions
        .iter()
        .map(|e| {
            let rates = metrics::execution_rates(e);
            format!(
                "{:>5}  {:<20} {:<9} {:<8} {:>6} searches {:>5} clicks {:>6.2}%",
                e.id,
                e.start_time,
                e.status.as_str(),
                e.mode.as_str(),
                e.total_searches,
                e.total_clicks,
                rates.target_rate
            )
        })
        .collect()
}

pub(crate) fn competitor_lines(shares: &[CompetitorShare]) -> Vec<String> {
    if shares.is_empty() {
        return vec!["No competitors in this window.".to_string()];
    }
    let mut lines = vec![format!(
        "{:>5}  {:<32}{:>12}{:>8}{:>9}  {}",
        "Id", "Domain", "Appearances", "Share", "Avg pos", "Tier"
    )];
    for s in shares {
        lines.push(format!(
            "{:>5}  {:<32}{:>12}{:>7.1}%{:>9.1}  {}",
            s.id,
            s.domain,
            s.appearances,
            s.share,
            s.average_position,
            s.tier.as_str()
        ));
    }
    lines
}

pub(crate) fn profile_lines(profile: &CompetitorProfile) -> Vec<String> {
    let c = &profile.details.competitor;
    let mut lines = vec![match c.business_name.as_deref() {
        Some(name) => format!("Competitor {} {} ({name})", c.id, c.domain),
        None => format!("Competitor {} {}", c.id, c.domain),
    }];
    lines.push(format!(
        "Seen: {} .. {}  Lifetime appearances: {}",
        c.first_seen.as_deref().unwrap_or("-"),
        c.last_seen.as_deref().unwrap_or("-"),
        c.total_appearances
    ));
    if profile.details.keyword_analysis.is_empty() {
        lines.push("No keyword appearances in this window.".to_string());
    } else {
        lines.push(format!("{:<32}{:>12}{:>9}", "Keyword", "Appearances", "Avg pos"));
        for k in &profile.details.keyword_analysis {
            lines.push(format!(
                "{:<32}{:>12}{:>9.1}",
                k.keyword, k.appearances, k.average_position
            ));
        }
    }
    match profile.contacts.as_deref() {
        Some(contacts) => lines.extend(contact_lines(contacts)),
        None => lines.push("Contacts unavailable.".to_string()),
    }
    lines
}

/// One line per contact, most frequently found first as the service orders them.
pub(crate) fn contact_lines(contacts: &[Contact]) -> Vec<String> {
    if contacts.is_empty() {
        return vec!["No contacts.".to_string()];
    }
    contacts
        .iter()
        .map(|c| {
            let owner = c
                .competitor_domain
                .clone()
                .unwrap_or_else(|| format!("competitor {}", c.competitor_id));
            format!(
                "{:<10} {:<22} {:>4}x  {:<28} last {}",
                c.kind.to_uppercase(),
                c.value,
                c.times_found,
                owner,
                c.last_seen.as_deref().unwrap_or("-")
            )
        })
        .collect()
}

pub(crate) fn contact_kind_lines(kinds: &[ContactKindCount]) -> Vec<String> {
    kinds
        .iter()
        .map(|k| {
            format!(
                "{}: {} contact(s), found {} time(s)",
                k.kind, k.contacts, k.times_found
            )
        })
        .collect()
}
