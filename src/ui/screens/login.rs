use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Clear, Paragraph},
    Frame,
};

use crate::ui::app::{App, LoginField, LoginMode};
use crate::ui::theme;

const FORM_WIDTH: u16 = 52;
const FORM_HEIGHT: u16 = 13;

pub(crate) fn render(f: &mut Frame, area: Rect, app: &App) {
    let form = &app.login;

    let width = FORM_WIDTH.min(area.width);
    let height = FORM_HEIGHT.min(area.height);
    let popup = Rect::new(
        area.x + area.width.saturating_sub(width) / 2,
        area.y + area.height.saturating_sub(height) / 2,
        width,
        height,
    );
    f.render_widget(Clear, popup);
    let block = theme::panel(form.mode.to_string());
    let inner = block.inner(popup);
    f.render_widget(block, popup);

    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1), // spacer
            Constraint::Length(1), // email
            Constraint::Length(1), // spacer
            Constraint::Length(1), // password
            Constraint::Length(1), // spacer
            Constraint::Min(2),    // message
            Constraint::Length(2), // hints
        ])
        .split(inner);

    let masked = "•".repeat(form.password.chars().count());
    f.render_widget(
        field_line("Email", &form.email, form.field == LoginField::Email),
        rows[1],
    );
    f.render_widget(
        field_line("Password", &masked, form.field == LoginField::Password),
        rows[3],
    );

    let message = match (&form.error, &form.notice) {
        (Some(err), _) => Line::from(Span::styled(err.as_str(), theme::error_style())),
        (None, Some(notice)) => Line::from(Span::styled(notice.as_str(), theme::income_style())),
        (None, None) => Line::from(""),
    };
    f.render_widget(Paragraph::new(message).centered(), rows[5]);

    let other = match form.mode {
        LoginMode::SignIn => "create an account",
        LoginMode::SignUp => "sign in instead",
    };
    let hints = vec![
        Line::from(Span::styled(
            "Tab next field | Enter submit | Esc quit",
            theme::dim_style(),
        )),
        Line::from(Span::styled(format!("Ctrl-t {other}"), theme::dim_style())),
    ];
    f.render_widget(Paragraph::new(hints).centered(), rows[6]);

    let focused = match form.field {
        LoginField::Email => (rows[1], form.email.chars().count()),
        LoginField::Password => (rows[3], masked.chars().count()),
    };
    let (row, len) = focused;
    let x = row.x + 12 + len as u16;
    if x < row.x + row.width {
        f.set_cursor_position((x, row.y));
    }
}

fn field_line<'a>(label: &'a str, value: &'a str, focused: bool) -> Paragraph<'a> {
    let label_style = if focused {
        Style::default()
            .fg(theme::ACCENT)
            .add_modifier(Modifier::BOLD)
    } else {
        theme::dim_style()
    };
    Paragraph::new(Line::from(vec![
        Span::styled(format!(" {label:<10} "), label_style),
        Span::styled(value, theme::normal_style()),
    ]))
}
