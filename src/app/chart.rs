use std::io;

use crossterm::event::{self, Event, KeyCode, KeyEventKind};
use crossterm::execute;
use crossterm::terminal::{
    EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode,
};
use ratatui::backend::CrosstermBackend;
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::symbols::Marker;
use ratatui::widgets::{Axis, Block, Borders, Cell, Chart, Dataset, GraphType, Row, Table};
use ratatui::{Frame, Terminal};

use super::types::EmissionsRange;

const RANGE_COLOR: Color = Color::Cyan;
const AVG_COLOR: Color = Color::Red;

fn y_upper_bound(series: &[EmissionsRange]) -> f64 {
    let max = series
        .iter()
        .map(|s| s.max)
        .filter(|v| v.is_finite())
        .fold(0.0_f64, f64::max);
    if max > 0.0 { max * 1.1 } else { 1.0 }
}

pub fn render_chart(f: &mut Frame, area: Rect, series: &[EmissionsRange]) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Min(10),
            Constraint::Length(series.len() as u16 + 3),
        ])
        .split(area);

    let ranges = series
        .iter()
        .enumerate()
        .map(|(i, s)| [(i as f64, s.min), (i as f64, s.max)])
        .collect::<Vec<_>>();
    let averages = series
        .iter()
        .enumerate()
        .map(|(i, s)| (i as f64, s.avg))
        .collect::<Vec<_>>();

    let range_style = Style::default().fg(RANGE_COLOR);
    let mut datasets = Vec::with_capacity(series.len() * 2 + 1);
    for (i, range) in ranges.iter().enumerate() {
        let mut line = Dataset::default()
            .marker(Marker::Braille)
            .graph_type(GraphType::Line)
            .style(range_style)
            .data(range);
        if i == 0 {
            line = line.name("Min/Max");
        }
        datasets.push(line);
        datasets.push(
            Dataset::default()
                .marker(Marker::Dot)
                .graph_type(GraphType::Scatter)
                .style(range_style)
                .data(range),
        );
    }
    datasets.push(
        Dataset::default()
            .name("Avg")
            .marker(Marker::Block)
            .graph_type(GraphType::Scatter)
            .style(Style::default().fg(AVG_COLOR).add_modifier(Modifier::BOLD))
            .data(&averages),
    );

    let n = series.len();
    let x_labels = std::iter::once(String::new())
        .chain(series.iter().map(|s| s.website.clone()))
        .chain(std::iter::once(String::new()))
        .collect::<Vec<_>>();
    let y_max = y_upper_bound(series);
    let y_labels = [0.0, y_max / 2.0, y_max]
        .iter()
        .map(|v| format!("{v:.3}"))
        .collect::<Vec<_>>();

    let chart = Chart::new(datasets)
        .block(
            Block::default()
                .title("CO2e emissions per page, by website (q to close)")
                .borders(Borders::ALL),
        )
        .x_axis(
            Axis::default()
                .title("Website")
                .style(Style::default().fg(Color::Gray))
                .bounds([-1.0, n as f64])
                .labels(x_labels),
        )
        .y_axis(
            Axis::default()
                .title("CO2e (grams)")
                .style(Style::default().fg(Color::Gray))
                .bounds([0.0, y_max])
                .labels(y_labels),
        );
    f.render_widget(chart, chunks[0]);

    let rows = series.iter().map(|s| {
        Row::new(vec![
            Cell::from(s.website.clone()),
            Cell::from(format!("{:.3}", s.min)),
            Cell::from(format!("{:.3}", s.avg)).style(Style::default().fg(AVG_COLOR)),
            Cell::from(format!("{:.3}", s.max)),
        ])
    });
    let table = Table::new(
        rows,
        [
            Constraint::Min(20),
            Constraint::Length(12),
            Constraint::Length(12),
            Constraint::Length(12),
        ],
    )
    .header(
        Row::new(vec!["Website", "Min", "Avg", "Max"])
            .style(Style::default().add_modifier(Modifier::BOLD)),
    )
    .block(Block::default().title("CO2e (grams)").borders(Borders::ALL));
    f.render_widget(table, chunks[1]);
}

/// Full-screen chart until `q`, `Esc` or `Enter`.
pub fn show_chart(series: &[EmissionsRange]) -> io::Result<()> {
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;
    terminal.clear()?;

    let result = chart_loop(&mut terminal, series);

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    result
}

fn chart_loop(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    series: &[EmissionsRange],
) -> io::Result<()> {
    loop {
        terminal.draw(|f| render_chart(f, f.area(), series))?;
        if let Event::Key(key) = event::read()?
            && key.kind == KeyEventKind::Press
            && matches!(key.code, KeyCode::Char('q') | KeyCode::Esc | KeyCode::Enter)
        {
            return Ok(());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ratatui::backend::TestBackend;

    fn range(website: &str, min: f64, avg: f64, max: f64) -> EmissionsRange {
        EmissionsRange {
            website: website.to_string(),
            min,
            avg,
            max,
        }
    }

    fn screen(series: &[EmissionsRange]) -> String {
        let mut terminal = Terminal::new(TestBackend::new(100, 30)).unwrap();
        terminal
            .draw(|f| render_chart(f, f.area(), series))
            .unwrap();
        terminal
            .backend()
            .buffer()
            .content
            .iter()
            .map(|cell| cell.symbol())
            .collect()
    }

    #[test]
    fn renders_each_website_with_its_numbers() {
        let out = screen(&[
            range("Alpha", 0.1, 0.25, 0.4),
            range("Beta", 1.0, 1.5, 2.0),
        ]);
        assert!(out.contains("Alpha"));
        assert!(out.contains("Beta"));
        assert!(out.contains("CO2e (grams)"));
        assert!(out.contains("0.250"));
        assert!(out.contains("2.000"));
        assert!(out.contains("Avg"));
    }

    #[test]
    fn zero_emissions_keep_a_usable_axis() {
        assert_eq!(y_upper_bound(&[range("Z", 0.0, 0.0, 0.0)]), 1.0);
        assert!((y_upper_bound(&[range("A", 1.0, 1.5, 2.0)]) - 2.2).abs() < 1e-9);
        let out = screen(&[range("Z", 0.0, 0.0, 0.0)]);
        assert!(out.contains("Z"));
    }
}
