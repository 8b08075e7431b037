use ratatui::{
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::Color,
    style::{Modifier, Style},
    symbols,
    text::{Line, Span},
    widgets::{Axis, Bar, BarChart, BarGroup, Block, Borders, Chart, Dataset, GraphType, Paragraph},
    Frame,
};

use super::state::UiState;
use crate::metrics::{self, CalendarMonth, Intensity, StatCard};

pub fn intensity_color(intensity: Intensity) -> Color {
    match intensity {
        Intensity::None => Color::DarkGray,
        Intensity::Low => Color::LightGreen,
        Intensity::Medium => Color::Green,
        Intensity::High => Color::Yellow,
    }
}

fn render_card(f: &mut Frame, area: Rect, title: &str, card: &StatCard) {
    let (arrow, color) = if card.trend.is_positive {
        ("▲", Color::Green)
    } else {
        ("▼", Color::Red)
    };
    let body = vec![
        Line::from(Span::styled(
            card.value.to_string(),
            Style::default().add_modifier(Modifier::BOLD),
        )),
        Line::from(Span::styled(
            format!("{arrow} {:.1}%", card.trend.value),
            Style::default().fg(color),
        )),
    ];
    f.render_widget(
        Paragraph::new(body)
            .alignment(Alignment::Center)
            .block(Block::default().borders(Borders::ALL).title(title.to_string())),
        area,
    );
}

/// Performance tab: overview cards, timeline, position distribution and calendar.
pub fn draw_performance(area: Rect, f: &mut Frame, state: &UiState) {
    if !state.stats_loaded {
        f.render_widget(
            Paragraph::new("Loading statistics...")
                .block(Block::default().borders(Borders::ALL).title("Performance")),
            area,
        );
        return;
    }

    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(4), Constraint::Min(10), Constraint::Length(12)].as_ref())
        .split(area);

    let cards = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(25); 4].as_ref())
        .split(rows[0]);
    render_card(f, cards[0], "Executions", &state.overview.executions);
    render_card(f, cards[1], "Searches", &state.overview.searches);
    render_card(f, cards[2], "Clicks", &state.overview.clicks);
    render_card(f, cards[3], "Target found", &state.overview.target_found);

    draw_timeline(rows[1], f, state);

    let bottom = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(55), Constraint::Percentage(45)].as_ref())
        .split(rows[2]);
    draw_positions(bottom[0], f, state);
    draw_calendar(bottom[1], f, state.calendar.as_ref());
}

fn draw_timeline(area: Rect, f: &mut Frame, state: &UiState) {
    let timeline = &state.timeline;
    let title = Line::from(vec![
        Span::raw("Timeline (total "),
        Span::styled(
            timeline.total_searches.to_string(),
            Style::default().fg(Color::Cyan),
        ),
        Span::raw(" searches, avg "),
        Span::styled(
            timeline.daily_average.to_string(),
            Style::default().fg(Color::Cyan),
        ),
        Span::raw("/day)"),
    ]);
    let block = Block::default().borders(Borders::ALL).title(title);

    if timeline.points.is_empty() {
        f.render_widget(Paragraph::new("No data for this period.").block(block), area);
        return;
    }

    let searches: Vec<(f64, f64)> = timeline
        .points
        .iter()
        .enumerate()
        .map(|(i, p)| (i as f64, p.searches as f64))
        .collect();
    let clicks: Vec<(f64, f64)> = timeline
        .points
        .iter()
        .enumerate()
        .map(|(i, p)| (i as f64, p.clicks as f64))
        .collect();
    let found: Vec<(f64, f64)> = timeline
        .points
        .iter()
        .enumerate()
        .map(|(i, p)| (i as f64, p.target_found as f64))
        .collect();

    let x_max = (timeline.points.len().saturating_sub(1)).max(1) as f64;
    let y_max = searches
        .iter()
        .map(|(_, y)| *y)
        .fold(0.0_f64, f64::max)
        .max(10.0)
        * 1.10;

    let first = timeline.points.first().map(|p| p.date.clone()).unwrap_or_default();
    let last = timeline.points.last().map(|p| p.date.clone()).unwrap_or_default();

    let datasets = vec![
        Dataset::default()
            .name("searches")
            .graph_type(GraphType::Line)
            .marker(symbols::Marker::Braille)
            .style(Style::default().fg(Color::Cyan))
            .data(&searches),
        Dataset::default()
            .name("clicks")
            .graph_type(GraphType::Line)
            .marker(symbols::Marker::Braille)
            .style(Style::default().fg(Color::Green))
            .data(&clicks),
        Dataset::default()
            .name("target")
            .graph_type(GraphType::Line)
            .marker(symbols::Marker::Braille)
            .style(Style::default().fg(Color::Magenta))
            .data(&found),
    ];
    let chart = Chart::new(datasets)
        .block(block)
        .x_axis(
            Axis::default()
                .style(Style::default().fg(Color::Gray))
                .bounds([0.0, x_max])
                .labels(vec![Span::raw(first), Span::raw(last)]),
        )
        .y_axis(
            Axis::default()
                .style(Style::default().fg(Color::Gray))
                .bounds([0.0, y_max])
                .labels(vec![Span::raw("0"), Span::raw(format!("{y_max:.0}"))]),
        );
    f.render_widget(chart, area);
}

fn draw_positions(area: Rect, f: &mut Frame, state: &UiState) {
    let dist = &state.positions;
    let leader = metrics::most_frequent_bucket(&dist.buckets);

    let bars: Vec<Bar> = dist
        .buckets
        .iter()
        .map(|b| {
            let color = if Some(b.position) == leader {
                Color::Yellow
            } else {
                Color::Cyan
            };
            Bar::default()
                .value(b.count)
                .label(Line::from(format!("#{}", b.position)))
                .text_value(format!("{:.0}%", b.percentage))
                .style(Style::default().fg(color))
        })
        .collect();

    let mut title = format!("Ad positions (n={})", dist.total);
    if dist.excluded > 0 {
        title.push_str(&format!(", {} outside 1-4", dist.excluded));
    }

    let inner_width = area.width.saturating_sub(2);
    let bar_width = (inner_width / 4).saturating_sub(1).clamp(3, 12);
    let chart = BarChart::default()
        .block(Block::default().borders(Borders::ALL).title(title))
        .data(BarGroup::default().bars(&bars))
        .bar_width(bar_width)
        .bar_gap(1)
        .max(dist.buckets.iter().map(|b| b.count).max().unwrap_or(0).max(1));
    f.render_widget(chart, area);
}

fn draw_calendar(area: Rect, f: &mut Frame, month: Option<&CalendarMonth>) {
    let Some(month) = month else {
        f.render_widget(
            Paragraph::new("No calendar data.")
                .block(Block::default().borders(Borders::ALL).title("Calendar")),
            area,
        );
        return;
    };

    let mut lines = vec![Line::from(Span::styled(
        " Su  Mo  Tu  We  Th  Fr  Sa",
        Style::default().fg(Color::Gray),
    ))];
    let mut row: Vec<Span> = vec![Span::raw("    ".repeat(month.leading_blanks as usize))];
    let mut col = month.leading_blanks as usize;
    for cell in &month.cells {
        row.push(Span::styled(
            format!("{:>3} ", cell.day),
            Style::default().fg(intensity_color(cell.intensity)),
        ));
        col += 1;
        if col == 7 {
            lines.push(Line::from(std::mem::take(&mut row)));
            col = 0;
        }
    }
    if !row.is_empty() {
        lines.push(Line::from(row));
    }

    let total: u64 = month.cells.iter().map(|c| c.executions).sum();
    let title = format!("Calendar {:04}-{:02} ({total} executions)", month.year, month.month);
    f.render_widget(
        Paragraph::new(lines).block(Block::default().borders(Borders::ALL).title(title)),
        area,
    );
}
