use chrono::Utc;
use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    text::{Line, Span},
    widgets::{Block, Borders, Cell, Paragraph, Row, Table, TableState, Wrap},
    Frame,
};

use userdesk_core::models::UserSortColumn;
use userdesk_core::utils::{age_display, truncate_string};
use userdesk_core::User;

use crate::app::App;
use crate::ui::styles;

/// Render the user directory - sortable table on the left, detail on the right
pub fn render(frame: &mut Frame, app: &App, area: Rect) {
    let chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(60), Constraint::Percentage(40)])
        .split(area);

    render_table(frame, app, chunks[0]);
    render_detail(frame, app.selected_user(), chunks[1]);
}

fn render_table(frame: &mut Frame, app: &App, area: Rect) {
    let users = app.visible_users();

    // Build header with sort indicators
    let sort_indicator = |col: UserSortColumn| {
        if app.sort_column == col {
            if app.sort_ascending { " ▲" } else { " ▼" }
        } else {
            ""
        }
    };

    let header = Row::new([
        Cell::from(format!("Name{}", sort_indicator(UserSortColumn::Name))),
        Cell::from(format!("Email{}", sort_indicator(UserSortColumn::Email))),
        Cell::from(format!("Role{}", sort_indicator(UserSortColumn::Role))),
    ])
    .style(styles::title_style())
    .height(1);

    let rows: Vec<Row> = users
        .iter()
        .enumerate()
        .map(|(i, user)| {
            let style = if i == app.selection {
                styles::selected_style()
            } else {
                styles::list_item_style()
            };
            Row::new(vec![
                Cell::from(truncate_string(user.display_name(), 30)),
                Cell::from(truncate_string(&user.email, 40)),
                Cell::from(Span::styled(
                    user.role.to_string(),
                    styles::role_style(user.is_admin()),
                )),
            ])
            .style(style)
        })
        .collect();

    let widths = [
        Constraint::Percentage(35),
        Constraint::Fill(2),
        Constraint::Length(8),
    ];

    let title = if app.search_query.is_empty() {
        format!(" Users ({}) - [s]ort [o]rder ", app.users.len())
    } else {
        format!(" Users ({}/{}) - \"{}\" ", users.len(), app.users.len(), app.search_query)
    };

    let table = Table::new(rows, widths)
        .header(header)
        .block(
            Block::default()
                .title(title)
                .title_style(styles::muted_style())
                .borders(Borders::ALL)
                .border_style(styles::border_style(true)),
        )
        .row_highlight_style(styles::selected_style());

    let mut state = TableState::default();
    if !users.is_empty() {
        state.select(Some(app.selection));
    }

    frame.render_stateful_widget(table, area, &mut state);

    if users.is_empty() {
        let message = if app.loading_users {
            "Loading users..."
        } else if app.search_query.is_empty() {
            "No users yet. Press [n] to register one."
        } else {
            "No users match the search."
        };
        let inner = Rect::new(
            area.x + 2,
            area.y + 2,
            area.width.saturating_sub(4),
            1.min(area.height.saturating_sub(3)),
        );
        frame.render_widget(
            Paragraph::new(Span::styled(message, styles::muted_style())),
            inner,
        );
    }
}

fn render_detail(frame: &mut Frame, selected: Option<&User>, area: Rect) {
    let placeholder = "-";

    let content = match selected {
        Some(user) => {
            let field = |label: &'static str, value: String| {
                Line::from(vec![
                    Span::styled(format!("{:<8}", label), styles::muted_style()),
                    Span::styled(value, styles::list_item_style()),
                ])
            };
            vec![
                Line::from(Span::styled(user.display_name().to_string(), styles::title_style())),
                Line::from(""),
                field("Email", user.email.clone()),
                Line::from(vec![
                    Span::styled(format!("{:<8}", "Role"), styles::muted_style()),
                    Span::styled(user.role.to_string(), styles::role_style(user.is_admin())),
                ]),
                field(
                    "ID",
                    if user.id.is_empty() { placeholder.to_string() } else { user.id.clone() },
                ),
                Line::from(""),
                Line::from(vec![
                    Span::styled("[e]", styles::help_key_style()),
                    Span::styled("dit  ", styles::muted_style()),
                    Span::styled("[d]", styles::help_key_style()),
                    Span::styled("elete", styles::muted_style()),
                ]),
            ]
        }
        None => vec![Line::from(Span::styled(placeholder, styles::muted_style()))],
    };

    let paragraph = Paragraph::new(content)
        .wrap(Wrap { trim: false })
        .block(
            Block::default()
                .title(" Details ")
                .title_style(styles::muted_style())
                .borders(Borders::ALL)
                .border_style(styles::border_style(false)),
        );
    frame.render_widget(paragraph, area);
}

/// "Updated 5m ago" text for the status bar
pub fn freshness(app: &App) -> Option<String> {
    app.users_fetched_at
        .map(|at| format!("Updated {}", age_display(at, Utc::now())))
}
