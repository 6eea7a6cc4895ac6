use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Cell, Paragraph, Row, Table},
    Frame,
};
use rust_decimal::Decimal;

use crate::ui::app::App;
use crate::ui::theme;
use crate::ui::util::{format_amount, format_signed, truncate};

pub(crate) fn render(f: &mut Frame, area: Rect, app: &App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(5), // Balance cards
            Constraint::Min(5),    // Transaction list
        ])
        .split(area);

    render_cards(f, chunks[0], app);
    render_transactions(f, chunks[1], app);
}

fn render_cards(f: &mut Frame, area: Rect, app: &App) {
    let cards = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage(40),
            Constraint::Percentage(30),
            Constraint::Percentage(30),
        ])
        .split(area);

    let view = &app.view;
    let income_count = view.transactions.iter().filter(|t| t.is_income()).count();
    let expense_count = view.transactions.iter().filter(|t| t.is_expense()).count();
    let badge = app.sync_badge();

    render_card(
        f,
        cards[0],
        "Balance",
        view.balance,
        if view.balance >= Decimal::ZERO {
            theme::GREEN
        } else {
            theme::RED
        },
        Line::from(Span::styled(format!(" {badge} "), theme::badge_style(&badge))),
    );
    render_card(
        f,
        cards[1],
        "Income",
        view.income,
        theme::GREEN,
        Line::from(Span::styled(format!("{income_count} txns"), theme::dim_style())),
    );
    render_card(
        f,
        cards[2],
        "Expenses",
        view.expense,
        theme::RED,
        Line::from(Span::styled(format!("{expense_count} txns"), theme::dim_style())),
    );
}

fn render_card(f: &mut Frame, area: Rect, title: &str, amount: Decimal, color: Color, footer: Line) {
    let text = Paragraph::new(vec![
        Line::from(Span::styled(
            format_amount(amount),
            Style::default().fg(color).add_modifier(Modifier::BOLD),
        )),
        footer,
    ])
    .centered()
    .block(theme::panel(title));

    f.render_widget(text, area);
}

fn render_transactions(f: &mut Frame, area: Rect, app: &App) {
    let txns = &app.view.transactions;
    if txns.is_empty() {
        let msg = vec![
            Line::from(""),
            Line::from(Span::styled("No transactions yet", theme::dim_style())),
            Line::from(""),
            Line::from(Span::styled(
                "Add one with :income 2000 Salary or :expense 50 Groceries",
                theme::dim_style(),
            )),
        ];
        f.render_widget(
            Paragraph::new(msg).centered().block(theme::panel("Transactions (0)")),
            area,
        );
        return;
    }

    let header = Row::new(
        ["Date", "Description", "Type", "Amount"]
            .iter()
            .map(|h| Cell::from(*h).style(theme::header_style())),
    )
    .height(1);

    let rows: Vec<Row> = txns
        .iter()
        .enumerate()
        .skip(app.cursor.scroll)
        .take(area.height.saturating_sub(3) as usize)
        .map(|(i, txn)| {
            let amount_style = if txn.is_income() {
                theme::income_style()
            } else {
                theme::expense_style()
            };
            let style = if i == app.cursor.index {
                theme::selected_style()
            } else if i % 2 == 1 {
                theme::alt_row_style()
            } else {
                theme::normal_style()
            };

            Row::new(vec![
                Cell::from(txn.date.format("%Y-%m-%d").to_string()),
                Cell::from(truncate(&txn.description, 40)),
                Cell::from(txn.kind.as_str()),
                Cell::from(Span::styled(format_signed(txn), amount_style)),
            ])
            .style(style)
        })
        .collect();

    let widths = [
        Constraint::Length(12),
        Constraint::Min(20),
        Constraint::Length(9),
        Constraint::Length(16),
    ];

    let table = Table::new(rows, widths)
        .header(header)
        .block(theme::panel(format!("Transactions ({})", txns.len())));

    f.render_widget(table, area);
}
