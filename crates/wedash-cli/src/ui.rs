use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Cell, Paragraph, Row, Table, TableState, Tabs},
    Frame,
};
use wedash_core::{Filter, Registry};
use wedash_types::{ActivityState, Service};

use crate::{
    app::{App, InputMode},
    config::Columns,
    logger::format_time,
};

const FILTERS: [Filter; 3] = [Filter::All, Filter::Active, Filter::Failed];

pub fn render(frame: &mut Frame, app: &App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(5),
            Constraint::Length(1),
        ])
        .split(frame.area());

    let body = Layout::default()
        .direction(Direction::Horizontal)
        .constraints(match app.columns {
            Columns::Minimal => [Constraint::Percentage(35), Constraint::Percentage(65)],
            Columns::Full => [Constraint::Percentage(60), Constraint::Percentage(40)],
        })
        .split(chunks[1]);

    {
        let registry = app.registry.read();
        render_header(frame, chunks[0], app, &registry);
        render_table(frame, body[0], app.columns, &registry);
    }
    render_log(frame, body[1], app);
    render_footer(frame, chunks[2], app);
}

fn render_header(frame: &mut Frame, area: Rect, app: &App, registry: &Registry) {
    let halves = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
        .split(area);

    let selected = FILTERS
        .iter()
        .position(|filter| *filter == registry.filter())
        .unwrap_or_default();
    let tabs = Tabs::new(
        FILTERS
            .iter()
            .enumerate()
            .map(|(i, filter)| format!("{} {}", i + 1, filter.label())),
    )
    .select(selected)
    .block(Block::default().borders(Borders::ALL).title(" wedash "))
    .highlight_style(Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD));
    frame.render_widget(tabs, halves[0]);

    let (search_style, cursor) = match app.mode {
        InputMode::Search => (Style::default().fg(Color::Yellow), "_"),
        InputMode::Normal => (Style::default(), ""),
    };
    let search = Paragraph::new(format!("{}{cursor}", app.search))
        .style(search_style)
        .block(Block::default().borders(Borders::ALL).title(" / search "));
    frame.render_widget(search, halves[1]);
}

fn state_style(state: ActivityState) -> Style {
    let color = match state {
        ActivityState::Active => Color::Green,
        ActivityState::Inactive => Color::DarkGray,
        ActivityState::Failed => Color::Red,
        ActivityState::Unknown => Color::Yellow,
    };
    Style::default().fg(color)
}

fn service_row(service: &Service, columns: Columns) -> Row<'static> {
    let mut cells = vec![
        Cell::from(service.state.as_str()).style(state_style(service.state)),
        Cell::from(service.name.clone()),
        Cell::from(
            service
                .visible_pid()
                .map_or_else(|| "-".to_owned(), |pid| pid.to_string()),
        ),
    ];
    if columns == Columns::Full {
        cells.extend([
            Cell::from(service.unit.clone()),
            Cell::from(service.project.clone().unwrap_or_else(|| "-".to_owned())),
            Cell::from(
                service
                    .log_file
                    .as_ref()
                    .map_or_else(|| "-".to_owned(), |path| path.display().to_string()),
            ),
            Cell::from(service.updated_at.map_or_else(|| "-".to_owned(), format_time)),
        ]);
    }
    Row::new(cells)
}

fn render_table(frame: &mut Frame, area: Rect, columns: Columns, registry: &Registry) {
    let (titles, widths): (Vec<&str>, Vec<Constraint>) = match columns {
        Columns::Minimal => (
            vec!["Status", "Service", "PID"],
            vec![Constraint::Length(9), Constraint::Min(12), Constraint::Length(8)],
        ),
        Columns::Full => (
            vec!["Status", "Service", "PID", "Unit", "Project", "Log Path", "Updated"],
            vec![
                Constraint::Length(9),
                Constraint::Min(12),
                Constraint::Length(8),
                Constraint::Min(14),
                Constraint::Length(12),
                Constraint::Min(16),
                Constraint::Length(9),
            ],
        ),
    };

    let rows: Vec<Row> = (0..registry.rows().len())
        .filter_map(|row| registry.row_service(row))
        .map(|service| service_row(service, columns))
        .collect();

    let title = format!(" Services {}/{} ", registry.rows().len(), registry.len());
    let table = Table::new(rows, widths)
        .header(Row::new(titles).style(Style::default().add_modifier(Modifier::BOLD)))
        .block(Block::default().borders(Borders::ALL).title(title))
        .row_highlight_style(Style::default().add_modifier(Modifier::REVERSED));

    let mut state = TableState::default().with_selected(registry.selected_row());
    frame.render_stateful_widget(table, area, &mut state);
}

fn render_log(frame: &mut Frame, area: Rect, app: &App) {
    let height = usize::from(area.height.saturating_sub(2));
    let lines: Vec<Line> = app
        .log
        .tail(height)
        .into_iter()
        .map(|line| {
            if line.starts_with("[note]") || line.starts_with("[error") {
                Line::styled(line, Style::default().fg(Color::Yellow))
            } else if line.starts_with("$ ") {
                Line::styled(line, Style::default().add_modifier(Modifier::BOLD))
            } else {
                Line::raw(line)
            }
        })
        .collect();

    let paragraph =
        Paragraph::new(lines).block(Block::default().borders(Borders::ALL).title(" Log "));
    frame.render_widget(paragraph, area);
}

fn render_footer(frame: &mut Frame, area: Rect, app: &App) {
    let hints = match app.mode {
        InputMode::Search => "type to filter · Esc/Enter done",
        InputMode::Normal => {
            "↑↓ move · f follow · j journal · l last · u up · d down · r restart · \
             / search · Tab filter · ^R rescan · q quit"
        }
    };

    let mut spans = vec![Span::styled(hints, Style::default().fg(Color::DarkGray))];
    if let Some(notice) = &app.notice {
        spans.insert(0, Span::styled(format!("{notice}  "), Style::default().fg(Color::Yellow)));
    }
    frame.render_widget(Paragraph::new(Line::from(spans)), area);
}
