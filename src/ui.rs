use anyhow::Result;
use crossterm::{
    event::{self, Event, KeyCode, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Bar, BarChart, BarGroup, Block, Borders, Cell, Paragraph, Row, Table},
    Frame, Terminal,
};
use retail_star::analytics::{MonthlyRevenue, ProductRevenue};
use std::io;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Page {
    MonthlyRevenue,
    TopProducts,
}

impl Page {
    pub fn next(&self) -> Self {
        match self {
            Page::MonthlyRevenue => Page::TopProducts,
            Page::TopProducts => Page::MonthlyRevenue,
        }
    }

    pub fn previous(&self) -> Self {
        // Two pages: previous and next coincide
        self.next()
    }

    pub fn title(&self) -> &str {
        match self {
            Page::MonthlyRevenue => "Monthly Revenue",
            Page::TopProducts => "Top Products",
        }
    }
}

pub struct App {
    pub monthly: Vec<MonthlyRevenue>,
    pub top: Vec<ProductRevenue>,
    pub current_page: Page,
}

impl App {
    pub fn new(monthly: Vec<MonthlyRevenue>, top: Vec<ProductRevenue>) -> Self {
        Self {
            monthly,
            top,
            current_page: Page::MonthlyRevenue,
        }
    }

    pub fn next_page(&mut self) {
        self.current_page = self.current_page.next();
    }

    pub fn previous_page(&mut self) {
        self.current_page = self.current_page.previous();
    }

    pub fn total_revenue(&self) -> f64 {
        self.monthly.iter().map(|m| m.revenue).sum()
    }

    /// Best month by revenue, if any
    pub fn peak_month(&self) -> Option<&MonthlyRevenue> {
        self.monthly
            .iter()
            .max_by(|a, b| a.revenue.total_cmp(&b.revenue))
    }
}

pub fn run_ui(app: &mut App) -> Result<()> {
    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let res = run_app(&mut terminal, app);

    // Restore terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    res?;
    Ok(())
}

fn run_app<B: ratatui::backend::Backend>(
    terminal: &mut Terminal<B>,
    app: &mut App,
) -> io::Result<()> {
    loop {
        terminal.draw(|f| ui(f, app))?;

        if let Event::Key(key) = event::read()? {
            match key.code {
                KeyCode::Char('q') | KeyCode::Esc => return Ok(()),
                KeyCode::Tab => {
                    if key.modifiers.contains(KeyModifiers::SHIFT) {
                        app.previous_page();
                    } else {
                        app.next_page();
                    }
                }
                KeyCode::BackTab => app.previous_page(),
                KeyCode::Char('1') => app.current_page = Page::MonthlyRevenue,
                KeyCode::Char('2') => app.current_page = Page::TopProducts,
                _ => {}
            }
        }
    }
}

fn ui(f: &mut Frame, app: &App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Header with navigation
            Constraint::Min(0),    // Chart
            Constraint::Length(3), // Status bar
        ])
        .split(f.size());

    render_header(f, chunks[0], app);

    match app.current_page {
        Page::MonthlyRevenue => render_monthly(f, chunks[1], app),
        Page::TopProducts => render_top_products(f, chunks[1], app),
    }

    render_status_bar(f, chunks[2]);
}

fn render_header(f: &mut Frame, area: Rect, app: &App) {
    let mut tab_spans = vec![];
    for (i, page) in [Page::MonthlyRevenue, Page::TopProducts].iter().enumerate() {
        if i > 0 {
            tab_spans.push(Span::raw(" │ "));
        }

        let style = if *page == app.current_page {
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD | Modifier::UNDERLINED)
        } else {
            Style::default().fg(Color::DarkGray)
        };

        tab_spans.push(Span::styled(page.title().to_string(), style));
    }

    tab_spans.push(Span::raw("  |  "));
    tab_spans.push(Span::styled(
        format!("Revenue: {:.2}", app.total_revenue()),
        Style::default().fg(Color::Green),
    ));
    if let Some(peak) = app.peak_month() {
        tab_spans.push(Span::raw("  |  "));
        tab_spans.push(Span::styled(
            format!("Peak: {}", peak.period()),
            Style::default().fg(Color::White),
        ));
    }

    let header = Paragraph::new(vec![Line::from(tab_spans)])
        .block(Block::default().borders(Borders::ALL).border_style(Style::default().fg(Color::Cyan)));

    f.render_widget(header, area);
}

fn render_monthly(f: &mut Frame, area: Rect, app: &App) {
    if app.monthly.is_empty() {
        render_empty(f, area, " Monthly Revenue ");
        return;
    }

    let bars: Vec<Bar> = app
        .monthly
        .iter()
        .map(|m| {
            Bar::default()
                .value(bar_value(m.revenue))
                .label(Line::from(m.period()))
                .text_value(format!("{:.0}", m.revenue))
                .style(bar_style(m.revenue))
        })
        .collect();

    let chart = BarChart::default()
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::White))
                .title(" Monthly Revenue "),
        )
        .data(BarGroup::default().bars(&bars))
        .bar_width(7)
        .bar_gap(1)
        .value_style(Style::default().fg(Color::Black).bg(Color::Green));

    f.render_widget(chart, area);
}

fn render_top_products(f: &mut Frame, area: Rect, app: &App) {
    if app.top.is_empty() {
        render_empty(f, area, " Top Products ");
        return;
    }

    let chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(60), Constraint::Percentage(40)])
        .split(area);

    let bars: Vec<Bar> = app
        .top
        .iter()
        .map(|p| {
            Bar::default()
                .value(bar_value(p.revenue))
                .label(Line::from(truncate(&p.description, 24)))
                .text_value(format!("{:.0}", p.revenue))
                .style(bar_style(p.revenue))
        })
        .collect();

    let chart = BarChart::default()
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::White))
                .title(format!(" Top {} Products ", app.top.len())),
        )
        .direction(Direction::Horizontal)
        .data(BarGroup::default().bars(&bars))
        .bar_width(1)
        .bar_gap(0);

    f.render_widget(chart, chunks[0]);

    let header = Row::new(["#", "Product", "Revenue"].iter().map(|h| {
        Cell::from(*h).style(Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD))
    }))
    .style(Style::default().bg(Color::DarkGray));

    let rows = app.top.iter().enumerate().map(|(i, p)| {
        Row::new(vec![
            Cell::from(format!("{}", i + 1)),
            Cell::from(truncate(&p.description, 30)),
            Cell::from(format!("{:.2}", p.revenue)).style(bar_style(p.revenue)),
        ])
    });

    let table = Table::new(
        rows,
        [Constraint::Length(4), Constraint::Min(10), Constraint::Length(14)],
    )
    .header(header)
    .block(Block::default().borders(Borders::ALL).title(" Ranking "));

    f.render_widget(table, chunks[1]);
}

fn render_empty(f: &mut Frame, area: Rect, title: &str) {
    let empty = Paragraph::new("No facts loaded yet. Run: retail-star run")
        .style(Style::default().fg(Color::DarkGray))
        .block(Block::default().borders(Borders::ALL).title(title.to_string()));
    f.render_widget(empty, area);
}

fn render_status_bar(f: &mut Frame, area: Rect) {
    let status_spans = vec![
        Span::styled(" Tab", Style::default().fg(Color::Yellow)),
        Span::raw(" Page | "),
        Span::styled("1/2", Style::default().fg(Color::Yellow)),
        Span::raw(" Jump | "),
        Span::styled("q", Style::default().fg(Color::Red)),
        Span::raw(" Quit"),
    ];

    let status_bar = Paragraph::new(vec![Line::from(status_spans)]).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::White)),
    );

    f.render_widget(status_bar, area);
}

/// Bars cannot go below zero; net-negative periods draw as empty bars
fn bar_value(revenue: f64) -> u64 {
    if revenue > 0.0 {
        revenue.round() as u64
    } else {
        0
    }
}

fn bar_style(revenue: f64) -> Style {
    if revenue < 0.0 {
        Style::default().fg(Color::Red)
    } else {
        Style::default().fg(Color::Green)
    }
}

fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let head: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", head)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_app() -> App {
        App::new(
            vec![
                MonthlyRevenue { year: 2010, month: 12, revenue: 120.0 },
                MonthlyRevenue { year: 2011, month: 1, revenue: -15.5 },
                MonthlyRevenue { year: 2011, month: 2, revenue: 300.25 },
            ],
            vec![ProductRevenue {
                description: "WHITE HANGING HEART T-LIGHT HOLDER".to_string(),
                revenue: 255.0,
            }],
        )
    }

    #[test]
    fn test_page_cycle() {
        let mut app = sample_app();
        assert_eq!(app.current_page, Page::MonthlyRevenue);

        app.next_page();
        assert_eq!(app.current_page, Page::TopProducts);
        app.next_page();
        assert_eq!(app.current_page, Page::MonthlyRevenue);
        app.previous_page();
        assert_eq!(app.current_page, Page::TopProducts);
    }

    #[test]
    fn test_header_figures() {
        let app = sample_app();
        assert!((app.total_revenue() - 404.75).abs() < 1e-9);
        assert_eq!(app.peak_month().map(|m| m.period()), Some("2011-02".to_string()));
    }

    #[test]
    fn test_negative_revenue_draws_empty_bar() {
        assert_eq!(bar_value(-15.5), 0);
        assert_eq!(bar_value(120.4), 120);
    }

    #[test]
    fn test_truncate_is_char_safe() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("CAFÉ CRÈME SET OF 4", 8), "CAFÉ ...");
    }
}
