use ratatui::{
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::Style,
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph},
    Frame,
};

use userdesk_core::auth::{guard, Access};

use crate::app::{App, AppState};
use crate::form::Form;

use super::styles;
use super::users;

pub fn render(frame: &mut Frame, app: &App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Title bar
            Constraint::Min(10),   // Main content
            Constraint::Length(2), // Status bar
        ])
        .split(frame.area());

    render_title_bar(frame, app, chunks[0]);
    render_main_content(frame, app, chunks[1]);
    render_status_bar(frame, app, chunks[2]);

    // Render overlays
    match app.state {
        AppState::ShowingHelp => render_help_overlay(frame),
        AppState::LoggingIn => render_form_overlay(frame, " Login ", "Login", &app.login_form),
        AppState::Registering => {
            render_form_overlay(frame, " Register User ", "Register", &app.register_form)
        }
        AppState::Editing => render_form_overlay(frame, " Edit User ", "Save", &app.edit_form),
        AppState::ConfirmingDelete => {
            let name = app
                .selected_user()
                .map(|u| u.display_name().to_string())
                .unwrap_or_default();
            render_confirm_overlay(frame, &format!("Delete {}?", name), "delete");
        }
        AppState::ConfirmingLogout => {
            render_confirm_overlay(frame, "Are you sure you want to log out?", "log out")
        }
        AppState::ConfirmingQuit => {
            render_confirm_overlay(frame, "Are you sure you want to quit?", "quit")
        }
        AppState::Normal | AppState::Searching | AppState::Quitting => {}
    }
}

fn render_title_bar(frame: &mut Frame, app: &App, area: Rect) {
    let title = "  userdesk";
    let who = match app.current_user() {
        Some(user) if app.session_view.is_ready() => {
            format!("{} ({})  [?] Help", user.display_name(), user.role)
        }
        _ => "[?] Help".to_string(),
    };

    let title_line = Line::from(vec![
        Span::styled(title, styles::title_style()),
        Span::raw(" ".repeat(
            (area.width as usize).saturating_sub(title.len() + who.chars().count() + 4),
        )),
        Span::styled(who, styles::muted_style()),
    ]);

    let block = Block::default()
        .borders(Borders::BOTTOM)
        .border_style(styles::muted_style());

    let paragraph = Paragraph::new(title_line).block(block);
    frame.render_widget(paragraph, area);
}

/// The protected area: what it shows is decided by the session alone
fn render_main_content(frame: &mut Frame, app: &App, area: Rect) {
    match guard(&app.session_view, || ()) {
        Access::Loading => render_placeholder(
            frame,
            area,
            vec![Line::from(Span::styled("Loading...", styles::muted_style()))],
        ),
        Access::Denied => render_placeholder(
            frame,
            area,
            vec![
                Line::from(Span::styled("🔒 Access Denied", styles::error_style())),
                Line::from(""),
                Line::from(Span::styled(
                    "Please login to access this content.",
                    styles::muted_style(),
                )),
            ],
        ),
        Access::Granted(()) => users::render(frame, app, area),
    }
}

fn render_placeholder(frame: &mut Frame, area: Rect, lines: Vec<Line>) {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(styles::border_style(false));
    let inner = block.inner(area);
    frame.render_widget(block, area);

    // Vertically center the message
    let height = lines.len() as u16;
    let top = inner.y + inner.height.saturating_sub(height) / 2;
    let message_area = Rect::new(inner.x, top, inner.width, height.min(inner.height));
    frame.render_widget(Paragraph::new(lines).alignment(Alignment::Center), message_area);
}

fn render_status_bar(frame: &mut Frame, app: &App, area: Rect) {
    let shortcuts = match app.state {
        AppState::Searching => "type to filter | [Enter] keep | [Esc] clear",
        _ if app.session_view.is_authenticated() => "[r]efresh [n]ew [/]search [L]ogout [q]uit",
        _ => "[q]uit",
    };

    let left_text = if let Some(ref msg) = app.status_message {
        format!(" {} ", msg)
    } else if matches!(app.state, AppState::Searching) {
        format!(" /{}▌ ", app.search_query)
    } else if let Some(updated) = users::freshness(app) {
        format!(" {} ", updated)
    } else {
        String::new()
    };
    let left_style = if matches!(app.state, AppState::Searching) && app.status_message.is_none() {
        styles::search_style()
    } else {
        styles::muted_style()
    };

    let right_text = format!(" {} ", shortcuts);
    let padding_len = (area.width as usize)
        .saturating_sub(left_text.chars().count())
        .saturating_sub(right_text.chars().count());

    let status_line = Line::from(vec![
        Span::styled(left_text, left_style),
        Span::raw(" ".repeat(padding_len)),
        Span::styled(right_text, styles::muted_style()),
    ]);
    let paragraph = Paragraph::new(status_line).style(styles::status_bar_style());
    frame.render_widget(paragraph, area);
}

fn render_help_overlay(frame: &mut Frame) {
    let area = centered_rect_fixed(52, 24, frame.area());

    // Clear the area
    frame.render_widget(Clear, area);

    let version = env!("CARGO_PKG_VERSION");
    let key = |k: &'static str, desc: &'static str| {
        Line::from(vec![
            Span::styled(format!("  {:<10}", k), styles::help_key_style()),
            Span::styled(desc, styles::help_desc_style()),
        ])
    };

    let help_text = vec![
        Line::from(Span::styled("  userdesk", styles::title_style())),
        Line::from(Span::styled(format!("  version {}", version), styles::muted_style())),
        Line::from(""),
        Line::from(Span::styled(" Navigation", styles::highlight_style())),
        key("↑/↓ j/k", "Navigate list"),
        key("PgUp/PgDn", "Scroll a page"),
        key("Home/End", "First / last user"),
        key("/", "Search by name or email"),
        key("s / o", "Sort column / order"),
        Line::from(""),
        Line::from(Span::styled(" Users", styles::highlight_style())),
        key("r", "Refresh from server"),
        key("n", "Register a new user"),
        key("e", "Edit selected user"),
        key("d", "Delete selected user"),
        Line::from(""),
        Line::from(Span::styled(" Session", styles::highlight_style())),
        key("L", "Log out"),
        key("q", "Quit"),
        Line::from(""),
        Line::from(vec![
            Span::styled("       Press ", styles::muted_style()),
            Span::styled("?", styles::help_key_style()),
            Span::styled(" or ", styles::muted_style()),
            Span::styled("Esc", styles::help_key_style()),
            Span::styled(" to close", styles::muted_style()),
        ]),
    ];

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(styles::border_style(true))
        .style(Style::default());

    frame.render_widget(Paragraph::new(help_text).block(block), area);
}

/// Width of the value column inside form overlays
const FIELD_WIDTH: usize = 28;

fn render_form_overlay(frame: &mut Frame, title: &'static str, button: &str, form: &Form) {
    let error_lines = form.fields.iter().filter(|f| f.error.is_some()).count()
        + usize::from(form.general_error.is_some());
    let height = (form.fields.len() + error_lines + 6) as u16;
    let area = centered_rect_fixed(56, height, frame.area());

    // Clear the area
    frame.render_widget(Clear, area);

    let mut lines = vec![Line::from("")];

    for (i, field) in form.fields.iter().enumerate() {
        let focused = form.focus == i;
        let value_style = if focused {
            styles::selected_style()
        } else {
            styles::list_item_style()
        };
        let cursor = if focused { "▌" } else { "" };

        // Show the tail of long values so the cursor stays visible
        let value = field.display_value();
        let shown: String = {
            let count = value.chars().count();
            value.chars().skip(count.saturating_sub(FIELD_WIDTH - 1)).collect()
        };
        let hint = if matches!(field.kind, crate::form::FieldKind::Choice(_)) && focused {
            " ␣"
        } else {
            ""
        };

        lines.push(Line::from(vec![
            Span::styled(format!("  {:>8}: [", field.label), styles::muted_style()),
            Span::styled(
                format!("{:<width$}", format!("{}{}", shown, cursor), width = FIELD_WIDTH),
                value_style,
            ),
            Span::styled("]", styles::muted_style()),
            Span::styled(hint, styles::muted_style()),
        ]));

        if let Some(ref error) = field.error {
            lines.push(Line::from(Span::styled(
                format!("            {}", error),
                styles::error_style(),
            )));
        }
    }

    // Submit button
    lines.push(Line::from(""));
    let label = if form.submitting {
        format!(" {}... ", button)
    } else if form.on_button() {
        format!(" ▶ {} ◀ ", button)
    } else {
        format!("   {}   ", button)
    };
    let button_style = if form.on_button() {
        styles::selected_style()
    } else {
        styles::list_item_style()
    };
    lines.push(
        Line::from(vec![
            Span::raw("["),
            Span::styled(label, button_style),
            Span::raw("]"),
        ])
        .alignment(Alignment::Center),
    );

    // Error message
    if let Some(ref error) = form.general_error {
        lines.push(Line::from(Span::styled(format!(" {}", error), styles::error_style())));
    }

    let block = Block::default()
        .title(title)
        .title_style(styles::title_style())
        .borders(Borders::ALL)
        .border_style(styles::border_style(true))
        .style(Style::default());

    frame.render_widget(Paragraph::new(lines).block(block), area);
}

fn render_confirm_overlay(frame: &mut Frame, question: &str, verb: &str) {
    let area = centered_rect_fixed(46, 7, frame.area());

    // Clear the area
    frame.render_widget(Clear, area);

    let lines = vec![
        Line::from(""),
        Line::from(Span::styled(question.to_string(), styles::highlight_style()))
            .alignment(Alignment::Center),
        Line::from(""),
        Line::from(vec![
            Span::styled("Press ", styles::muted_style()),
            Span::styled("[Y]", styles::help_key_style()),
            Span::styled(format!(" to {}, ", verb), styles::muted_style()),
            Span::styled("[N]", styles::help_key_style()),
            Span::styled(" to cancel", styles::muted_style()),
        ])
        .alignment(Alignment::Center),
    ];

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(styles::border_style(true))
        .style(Style::default());

    frame.render_widget(Paragraph::new(lines).block(block), area);
}

/// Create a centered rectangle with fixed dimensions
fn centered_rect_fixed(width: u16, height: u16, r: Rect) -> Rect {
    let x = r.x + (r.width.saturating_sub(width)) / 2;
    let y = r.y + (r.height.saturating_sub(height)) / 2;
    Rect::new(x, y, width.min(r.width), height.min(r.height))
}
