//! Dashboard rendering

use kittypass_core::format;
use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style, Stylize},
    text::{Line, Span},
    widgets::{Block, Borders, Cell, Clear, Paragraph, Row, Table},
    Frame,
};

use super::app::{App, Focus};

const SECRET_MASK: &str = "********";

/// Main draw function
pub fn draw(f: &mut Frame, app: &App) {
    // Header, three panes, footer
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(0),
            Constraint::Length(1),
        ])
        .split(f.area());

    draw_header(f, app, chunks[0]);
    draw_content(f, app, chunks[1]);
    draw_footer(f, app, chunks[2]);

    if app.prompt.is_some() {
        draw_prompt(f, app);
    } else if app.show_help {
        draw_help_overlay(f);
    }
}

fn draw_header(f: &mut Frame, app: &App, area: Rect) {
    let state = match app.open_vault_name() {
        Some(name) => Span::styled(format!("unlocked: {name}"), Style::default().fg(Color::Green)),
        None => Span::styled("all vaults locked", Style::default().fg(Color::DarkGray)),
    };

    let header = Paragraph::new(Line::from(vec![
        Span::styled(" kittypass ", Style::default().fg(Color::Cyan).bold()),
        Span::raw(" - "),
        state,
    ]))
    .block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Cyan)),
    );

    f.render_widget(header, area);
}

fn draw_content(f: &mut Frame, app: &App, area: Rect) {
    let cols = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage(30),
            Constraint::Percentage(35),
            Constraint::Percentage(35),
        ])
        .split(area);

    draw_vaults_panel(f, app, cols[0]);
    draw_logins_panel(f, app, cols[1]);
    draw_detail_panel(f, app, cols[2]);
}

fn pane(title: String, color: Color, focused: bool) -> Block<'static> {
    let border_color = if focused { Color::Yellow } else { color };
    Block::default()
        .title(title)
        .title_style(Style::default().fg(color).bold())
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border_color))
}

fn row_style(selected: bool, focused: bool) -> Style {
    match (selected, focused) {
        (true, true) => Style::default().fg(Color::Black).bg(Color::Yellow),
        (true, false) => Style::default().add_modifier(Modifier::BOLD),
        _ => Style::default(),
    }
}

/// First row to draw so the selected one stays visible
fn scroll_offset(selected: usize, visible: usize) -> usize {
    if visible == 0 {
        0
    } else {
        selected.saturating_sub(visible - 1)
    }
}

/// Rows left for data once borders, header and its margin are drawn
fn table_rows(area: Rect) -> usize {
    area.height.saturating_sub(4) as usize
}

fn placeholder(message: &str) -> Vec<Row<'static>> {
    vec![Row::new(vec![Cell::from(message.to_string())]).style(Style::default().fg(Color::DarkGray))]
}

fn draw_vaults_panel(f: &mut Frame, app: &App, area: Rect) {
    let focused = app.focus == Focus::Vaults;

    let header = Row::new(vec!["Name", "Description"])
        .style(Style::default().fg(Color::Cyan).bold())
        .bottom_margin(1);

    let rows: Vec<Row> = if app.vaults.is_empty() {
        placeholder("No vaults")
    } else {
        let offset = scroll_offset(app.vault_index, table_rows(area));
        app.vaults
            .iter()
            .enumerate()
            .skip(offset)
            .map(|(i, v)| {
                let marker = if app.open_vault_name() == Some(v.name.as_str()) { "●" } else { " " };
                Row::new(vec![
                    Cell::from(format!("{marker} {}", format::truncate(&v.name, 16))),
                    Cell::from(format::truncate(&v.description, 30)),
                ])
                .style(row_style(i == app.vault_index, focused))
            })
            .collect()
    };

    let table = Table::new(rows, [Constraint::Length(19), Constraint::Min(10)])
        .header(header)
        .block(pane(" Vaults ".to_string(), Color::Blue, focused));

    f.render_widget(table, area);
}

fn draw_logins_panel(f: &mut Frame, app: &App, area: Rect) {
    let focused = app.focus == Focus::Logins;
    let title = match &app.logins_vault {
        Some(name) => format!(" Logins in {} ", format::truncate(name, 20)),
        None => " Logins ".to_string(),
    };

    let header = Row::new(vec!["Name", "Username", "Created"])
        .style(Style::default().fg(Color::Cyan).bold())
        .bottom_margin(1);

    let rows: Vec<Row> = match (&app.logins_vault, app.logins.is_empty()) {
        (None, _) => placeholder("Select a vault"),
        (Some(_), true) => placeholder("No logins"),
        (Some(_), false) => {
            let offset = scroll_offset(app.login_index, table_rows(area));
            app.logins
                .iter()
                .enumerate()
                .skip(offset)
                .map(|(i, l)| {
                    Row::new(vec![
                        Cell::from(format::truncate(&l.name, 14)),
                        Cell::from(format::truncate(&l.username, 16)),
                        Cell::from(format::relative_time(l.created_at))
                            .style(Style::default().fg(Color::DarkGray)),
                    ])
                    .style(row_style(i == app.login_index, focused))
                })
                .collect()
        }
    };

    let table = Table::new(
        rows,
        [
            Constraint::Length(15),
            Constraint::Min(10),
            Constraint::Length(9),
        ],
    )
    .header(header)
    .block(pane(title, Color::Magenta, focused));

    f.render_widget(table, area);
}

fn draw_detail_panel(f: &mut Frame, app: &App, area: Rect) {
    let focused = app.focus == Focus::Detail;
    let label = Style::default().fg(Color::Blue);

    let lines: Vec<Line> = match &app.detail {
        Some(login) => {
            let secret = if app.reveal {
                Span::raw(login.secret.as_str())
            } else {
                Span::styled(SECRET_MASK, Style::default().fg(Color::DarkGray))
            };
            vec![
                Line::from(vec![Span::styled("Login Name: ", label), Span::raw(login.name.as_str())]),
                Line::from(vec![Span::styled("Username:   ", label), Span::raw(login.username.as_str())]),
                Line::from(vec![Span::styled("Password:   ", label), secret]),
                Line::from(""),
                Line::from(Span::styled(
                    if app.reveal { "s to hide" } else { "s to show" },
                    Style::default().fg(Color::DarkGray),
                )),
            ]
        }
        None => vec![Line::from(Span::styled(
            "Enter on a login to decrypt it",
            Style::default().fg(Color::DarkGray),
        ))],
    };

    let paragraph = Paragraph::new(lines).block(pane(" Login ".to_string(), Color::Green, focused));
    f.render_widget(paragraph, area);
}

fn draw_footer(f: &mut Frame, app: &App, area: Rect) {
    let line = match &app.status {
        Some(status) => {
            let color = if status.is_error { Color::Red } else { Color::Green };
            Line::from(Span::styled(format!(" {}", status.message), Style::default().fg(color)))
        }
        None => Line::from(vec![
            Span::styled(" q", Style::default().fg(Color::Cyan).bold()),
            Span::raw(" quit  "),
            Span::styled("Enter", Style::default().fg(Color::Cyan).bold()),
            Span::raw(" open  "),
            Span::styled("Esc", Style::default().fg(Color::Cyan).bold()),
            Span::raw(" back  "),
            Span::styled("x", Style::default().fg(Color::Cyan).bold()),
            Span::raw(" lock  "),
            Span::styled("?", Style::default().fg(Color::Cyan).bold()),
            Span::raw(" help"),
        ]),
    };

    let footer = Paragraph::new(line).style(Style::default().fg(Color::DarkGray));
    f.render_widget(footer, area);
}

fn centered(area: Rect, width: u16, height: u16) -> Rect {
    let width = width.min(area.width);
    let height = height.min(area.height);
    let x = area.x + (area.width - width) / 2;
    let y = area.y + (area.height - height) / 2;
    Rect::new(x, y, width, height)
}

fn draw_prompt(f: &mut Frame, app: &App) {
    let Some(prompt) = &app.prompt else {
        return;
    };
    let popup_area = centered(f.area(), 50, 5);
    f.render_widget(Clear, popup_area);

    let masked = "*".repeat(prompt.input.chars().count());
    let text = vec![
        Line::from(vec![
            Span::styled("> ", Style::default().fg(Color::Cyan)),
            Span::raw(masked),
        ]),
        Line::from(""),
        Line::from(Span::styled(
            "Enter to unlock, Esc to cancel",
            Style::default().fg(Color::DarkGray),
        )),
    ];

    let popup = Paragraph::new(text).block(
        Block::default()
            .title(format!(" Master password for '{}' ", format::truncate(&prompt.vault_name, 20)))
            .title_style(Style::default().fg(Color::Yellow).bold())
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Yellow)),
    );

    f.render_widget(popup, popup_area);
}

fn draw_help_overlay(f: &mut Frame) {
    let popup_area = centered(f.area(), 46, 13);
    f.render_widget(Clear, popup_area);

    let key = Style::default().fg(Color::Cyan);
    let help_text = vec![
        Line::from(""),
        Line::from(vec![Span::styled("  q / Ctrl+C ", key), Span::raw("Quit")]),
        Line::from(vec![Span::styled("  j/k        ", key), Span::raw("Move down/up")]),
        Line::from(vec![Span::styled("  Enter / l  ", key), Span::raw("Open vault or login")]),
        Line::from(vec![Span::styled("  Esc / h    ", key), Span::raw("Back")]),
        Line::from(vec![Span::styled("  s          ", key), Span::raw("Show/hide password")]),
        Line::from(vec![Span::styled("  x          ", key), Span::raw("Lock the open vault")]),
        Line::from(vec![Span::styled("  r          ", key), Span::raw("Reload vaults")]),
        Line::from(""),
        Line::from(Span::styled(
            "Press ? to close",
            Style::default().fg(Color::DarkGray),
        ))
        .centered(),
    ];

    let help_popup = Paragraph::new(help_text).block(
        Block::default()
            .title(" Keyboard Shortcuts ")
            .title_style(Style::default().fg(Color::Yellow).bold())
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Yellow)),
    );

    f.render_widget(help_popup, popup_area);
}
