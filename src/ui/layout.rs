use {
    crate::record::SentimentRange,
    crate::snapshot::Snapshot,
    ratatui::{
        layout::{Constraint, Layout as RatLayout, Rect},
        style::{Color, Modifier, Style},
        text::{Line, Span},
        widgets::{Bar, BarChart, BarGroup, Block, Borders, Paragraph},
        Frame,
    },
};

/// Bars are scaled to this many steps across the configured sentiment range.
const BAR_SCALE: u64 = 100;

/// Render the full UI: header, category bar chart, status footer.
pub fn render_layout(
    f: &mut Frame,
    area: Rect,
    snapshot: &Snapshot,
    range: SentimentRange,
    stale: bool,
) {
    let chunks = RatLayout::default()
        .direction(ratatui::layout::Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Header
            Constraint::Min(0),    // Bar chart
            Constraint::Length(3), // Footer/Status
        ])
        .split(area);

    render_header(f, chunks[0]);
    render_chart(f, chunks[1], snapshot, range);
    render_footer(f, chunks[2], snapshot, stale);
}

fn render_header(f: &mut Frame, area: Rect) {
    let header = Block::default().borders(Borders::ALL);

    let text = vec![
        Line::from(vec![
            Span::styled(
                "Sentiflow",
                Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
            ),
            Span::raw(" - Average Sentiment by Category"),
        ]),
        Line::from(vec![Span::raw("Press 'q' or Esc to quit")]),
    ];

    f.render_widget(Paragraph::new(text).block(header), area);
}

fn render_chart(f: &mut Frame, area: Rect, snapshot: &Snapshot, range: SentimentRange) {
    let bars: Vec<Bar> = snapshot
        .categories
        .iter()
        .map(|category| {
            let (value, text) = match category.mean {
                Some(mean) => (scale_mean(mean, range), format!("{:+.2}", mean)),
                // No current data; renderers must not show it as zero
                None => (0, "n/a".to_string()),
            };
            let color = match category.mean {
                Some(mean) if mean >= 0.0 => Color::Green,
                Some(_) => Color::Red,
                None => Color::Gray,
            };

            Bar::default()
                .label(Line::from(category.name.clone()))
                .value(value)
                .text_value(text)
                .style(Style::default().fg(color))
        })
        .collect();

    let chart = BarChart::default()
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title("Mean Sentiment"),
        )
        .bar_width(9)
        .bar_gap(2)
        .max(BAR_SCALE)
        .data(BarGroup::default().bars(&bars));

    f.render_widget(chart, area);
}

fn render_footer(f: &mut Frame, area: Rect, snapshot: &Snapshot, stale: bool) {
    let mut spans = vec![
        Span::styled("Snapshot: ", Style::default().fg(Color::Cyan)),
        Span::raw(format!("#{}", snapshot.sequence)),
        Span::raw(" | "),
        Span::styled("Categories: ", Style::default().fg(Color::Cyan)),
        Span::raw(snapshot.categories.len().to_string()),
        Span::raw(" | "),
        Span::styled("Updated: ", Style::default().fg(Color::Cyan)),
        Span::raw(format_timestamp(snapshot.taken_at)),
    ];
    if stale {
        spans.push(Span::raw(" | "));
        spans.push(Span::styled(
            "STALE",
            Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
        ));
    }

    let footer = Block::default().borders(Borders::ALL).title("Status");
    f.render_widget(Paragraph::new(vec![Line::from(spans)]).block(footer), area);
}

/// Map a mean inside `[range.min, range.max]` onto `0..=BAR_SCALE`.
fn scale_mean(mean: f64, range: SentimentRange) -> u64 {
    let span = range.max - range.min;
    if span <= 0.0 {
        return 0;
    }
    let ratio = ((mean - range.min) / span).clamp(0.0, 1.0);
    (ratio * BAR_SCALE as f64).round() as u64
}

fn format_timestamp(timestamp: i64) -> String {
    use chrono::{DateTime, Utc};

    if timestamp == 0 {
        return "never".to_string();
    }
    if let Some(dt) = DateTime::<Utc>::from_timestamp(timestamp, 0) {
        dt.format("%H:%M:%S").to_string()
    } else {
        "N/A".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scale_mean_default_range() {
        let range = SentimentRange::default();
        assert_eq!(scale_mean(-1.0, range), 0);
        assert_eq!(scale_mean(0.0, range), 50);
        assert_eq!(scale_mean(1.0, range), 100);
    }

    #[test]
    fn test_scale_mean_clamps_outside_range() {
        let range = SentimentRange::default();
        assert_eq!(scale_mean(5.0, range), 100);
        assert_eq!(scale_mean(-5.0, range), 0);
    }
}
