use {
    crate::record::SentimentRange,
    crate::snapshot::Snapshot,
    ratatui::{backend::CrosstermBackend, Terminal},
    std::time::Duration,
    tokio::sync::watch,
};

/// Run the TUI event loop until 'q'/Esc is pressed or the snapshot source
/// goes away.
///
/// Reads only immutable snapshots from the watch cell; a slow frame here can
/// never block ingestion. Staleness is flagged when no new snapshot arrives
/// within 3x the expected cadence.
pub async fn run_ui(
    snapshots: watch::Receiver<Snapshot>,
    range: SentimentRange,
    expected_interval: Duration,
) -> Result<(), Box<dyn std::error::Error>> {
    let stdout = std::io::stdout();
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    // Raw mode + alternate screen isolates the chart from stderr logs
    crossterm::terminal::enable_raw_mode()?;
    crossterm::execute!(
        std::io::stdout(),
        crossterm::terminal::EnterAlternateScreen,
        crossterm::cursor::Hide
    )?;
    terminal.clear()?;

    let refresh_interval = Duration::from_millis(250);
    let stale_after = expected_interval.saturating_mul(3);
    let mut last_change = std::time::Instant::now();
    let mut last_sequence = 0u64;

    loop {
        // Poll for keyboard input; doubles as the frame throttle
        if crossterm::event::poll(refresh_interval)? {
            if let crossterm::event::Event::Key(key) = crossterm::event::read()? {
                match key.code {
                    crossterm::event::KeyCode::Char('q') | crossterm::event::KeyCode::Esc => {
                        break;
                    }
                    _ => {}
                }
            }
        }

        let snapshot = snapshots.borrow().clone();
        if snapshot.sequence != last_sequence {
            last_sequence = snapshot.sequence;
            last_change = std::time::Instant::now();
        }
        let stale = !snapshot.is_placeholder() && last_change.elapsed() > stale_after;

        let area = terminal.size()?;
        terminal.draw(|f| {
            crate::ui::layout::render_layout(f, area, &snapshot, range, stale);
        })?;
    }

    // Restore terminal state
    crossterm::execute!(
        std::io::stdout(),
        crossterm::terminal::LeaveAlternateScreen,
        crossterm::cursor::Show
    )?;
    crossterm::terminal::disable_raw_mode()?;
    Ok(())
}
