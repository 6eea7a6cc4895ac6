use std::collections::HashMap;
use std::sync::LazyLock;

use super::app::App;
use crate::models::TransactionType;

/// What the event loop should do in answer to a key or a `:` command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Action {
    Quit,
    ShowHelp,
    Reload,
    /// Ask before signing out.
    RequestLogout,
    Add {
        kind: TransactionType,
        amount: String,
        description: String,
    },
    /// Ask before deleting this id.
    RequestDelete(String),
    /// The user answered yes to the pending confirmation.
    ConfirmPending,
    SubmitLogin,
}

pub(crate) struct Command {
    pub(crate) description: &'static str,
    pub(crate) parse: fn(&str, &App) -> Result<Action, String>,
}

macro_rules! register_command {
    ($name:expr, $desc:expr, $func:expr, $registry:expr) => {{
        $registry.insert(
            $name,
            Command {
                description: $desc,
                parse: $func,
            },
        );
    }};
}

pub(crate) static COMMANDS: LazyLock<HashMap<&str, Command>> = LazyLock::new(|| {
    let mut r: HashMap<&str, Command> = HashMap::new();

    register_command!("q", "Quit", cmd_quit, r);
    register_command!("quit", "Quit", cmd_quit, r);
    register_command!("help", "Show available commands", cmd_help, r);
    register_command!("h", "Show available commands", cmd_help, r);
    register_command!(
        "add",
        "Add a transaction (e.g. :add expense 4.50 Coffee)",
        cmd_add,
        r
    );
    register_command!("a", "Add a transaction", cmd_add, r);
    register_command!(
        "income",
        "Add income (e.g. :income 2000 Salary)",
        cmd_income,
        r
    );
    register_command!("i", "Add income", cmd_income, r);
    register_command!(
        "expense",
        "Add expense (e.g. :expense 50 Groceries)",
        cmd_expense,
        r
    );
    register_command!("e", "Add expense", cmd_expense, r);
    register_command!(
        "delete",
        "Delete the selected transaction (or :delete <id>)",
        cmd_delete,
        r
    );
    register_command!("d", "Delete the selected transaction", cmd_delete, r);
    register_command!("reload", "Reload transactions from the backend", cmd_reload, r);
    register_command!("r", "Reload transactions", cmd_reload, r);
    register_command!("logout", "Sign out", cmd_logout, r);

    r
});

/// Parse a `:` command line. `Err` carries the message for the status line.
pub(crate) fn parse_command(input: &str, app: &App) -> Result<Action, String> {
    let trimmed = input.trim();
    let (name, args) = trimmed.split_once(' ').unwrap_or((trimmed, ""));

    match COMMANDS.get(name) {
        Some(cmd) => (cmd.parse)(args.trim(), app),
        None => Err(format!(
            "Unknown command: :{name}. Did you mean :{}?",
            find_closest(name)
        )),
    }
}

fn find_closest(input: &str) -> &'static str {
    COMMANDS
        .keys()
        .copied()
        .filter(|k| k.len() > 1)
        .min_by_key(|k| (levenshtein(input, k), *k))
        .unwrap_or("help")
}

fn levenshtein(a: &str, b: &str) -> usize {
    let (a, b) = (a.as_bytes(), b.as_bytes());
    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut curr = vec![0; b.len() + 1];

    for i in 1..=a.len() {
        curr[0] = i;
        for j in 1..=b.len() {
            let cost = usize::from(a[i - 1] != b[j - 1]);
            curr[j] = (prev[j] + 1).min(curr[j - 1] + 1).min(prev[j - 1] + cost);
        }
        std::mem::swap(&mut prev, &mut curr);
    }

    prev[b.len()]
}

// ── Command parsers ──────────────────────────────────────────

fn cmd_quit(_args: &str, _app: &App) -> Result<Action, String> {
    Ok(Action::Quit)
}

fn cmd_help(_args: &str, _app: &App) -> Result<Action, String> {
    Ok(Action::ShowHelp)
}

fn cmd_reload(_args: &str, _app: &App) -> Result<Action, String> {
    Ok(Action::Reload)
}

fn cmd_logout(_args: &str, app: &App) -> Result<Action, String> {
    if app.user_email.is_none() {
        return Err("Not signed in".into());
    }
    Ok(Action::RequestLogout)
}

fn cmd_add(args: &str, _app: &App) -> Result<Action, String> {
    let (kind, rest) = args
        .split_once(' ')
        .ok_or("Usage: :add <income|expense> <amount> <description>")?;
    let kind = TransactionType::parse(kind).map_err(|e| e.to_string())?;
    add_of(kind, rest)
}

fn cmd_income(args: &str, _app: &App) -> Result<Action, String> {
    add_of(TransactionType::Income, args)
}

fn cmd_expense(args: &str, _app: &App) -> Result<Action, String> {
    add_of(TransactionType::Expense, args)
}

/// `<amount> <description>`; the ledger validates both.
fn add_of(kind: TransactionType, args: &str) -> Result<Action, String> {
    let args = args.trim();
    if args.is_empty() {
        return Err(format!("Usage: :{kind} <amount> <description>"));
    }
    let (amount, description) = args.split_once(' ').unwrap_or((args, ""));
    Ok(Action::Add {
        kind,
        amount: amount.to_string(),
        description: description.trim().to_string(),
    })
}

fn cmd_delete(args: &str, app: &App) -> Result<Action, String> {
    if !args.is_empty() {
        return Ok(Action::RequestDelete(args.to_string()));
    }
    app.selected()
        .map(|txn| Action::RequestDelete(txn.id.clone()))
        .ok_or_else(|| "No transaction selected".to_string())
}
