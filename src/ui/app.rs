use rust_decimal::Decimal;

use super::util::ListCursor;
use crate::ledger::{Ledger, RemovalRequest, SyncStatus};
use crate::models::Transaction;
use crate::store::Persistence;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Screen {
    Login,
    Balance,
}

impl std::fmt::Display for Screen {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Login => write!(f, "Login"),
            Self::Balance => write!(f, "Balance"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum InputMode {
    Normal,
    Command,
    Confirm,
}

impl std::fmt::Display for InputMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Normal => write!(f, "NORMAL"),
            Self::Command => write!(f, "COMMAND"),
            Self::Confirm => write!(f, "CONFIRM"),
        }
    }
}

/// Pending action that requires user confirmation.
#[derive(Debug, Clone)]
pub(crate) enum PendingAction {
    Delete(RemovalRequest),
    Logout,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum LoginField {
    Email,
    Password,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum LoginMode {
    SignIn,
    SignUp,
}

impl std::fmt::Display for LoginMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::SignIn => write!(f, "Sign in"),
            Self::SignUp => write!(f, "Create account"),
        }
    }
}

#[derive(Debug, Clone)]
pub(crate) struct LoginForm {
    pub(crate) email: String,
    pub(crate) password: String,
    pub(crate) field: LoginField,
    pub(crate) mode: LoginMode,
    /// Last validation or backend message, shown under the form.
    pub(crate) error: Option<String>,
    pub(crate) notice: Option<String>,
}

impl Default for LoginForm {
    fn default() -> Self {
        Self {
            email: String::new(),
            password: String::new(),
            field: LoginField::Email,
            mode: LoginMode::SignIn,
            error: None,
            notice: None,
        }
    }
}

impl LoginForm {
    pub(crate) fn focused_mut(&mut self) -> &mut String {
        match self.field {
            LoginField::Email => &mut self.email,
            LoginField::Password => &mut self.password,
        }
    }

    pub(crate) fn next_field(&mut self) {
        self.field = match self.field {
            LoginField::Email => LoginField::Password,
            LoginField::Password => LoginField::Email,
        };
    }

    pub(crate) fn toggle_mode(&mut self) {
        self.mode = match self.mode {
            LoginMode::SignIn => LoginMode::SignUp,
            LoginMode::SignUp => LoginMode::SignIn,
        };
        self.error = None;
        self.notice = None;
    }

    /// The password never outlives a submission attempt.
    pub(crate) fn take_credentials(&mut self) -> (String, String) {
        let email = self.email.trim().to_string();
        (email, std::mem::take(&mut self.password))
    }
}

/// What the balance screen shows, copied out of the ledger after each change.
#[derive(Debug, Clone, Default)]
pub(crate) struct LedgerView {
    pub(crate) transactions: Vec<Transaction>,
    pub(crate) balance: Decimal,
    pub(crate) income: Decimal,
    pub(crate) expense: Decimal,
    pub(crate) status: Option<SyncStatus>,
}

pub(crate) struct App {
    pub(crate) running: bool,
    pub(crate) screen: Screen,
    pub(crate) input_mode: InputMode,
    pub(crate) command_input: String,
    pub(crate) status_message: String,
    pub(crate) show_help: bool,

    pub(crate) backend_label: &'static str,
    pub(crate) user_email: Option<String>,

    pub(crate) view: LedgerView,
    pub(crate) cursor: ListCursor,

    pub(crate) login: LoginForm,

    // Confirmation
    pub(crate) pending_action: Option<PendingAction>,
    pub(crate) confirm_message: String,

    // Layout (updated each render frame)
    pub(crate) visible_rows: usize,
}

impl App {
    pub(crate) fn new(backend_label: &'static str, screen: Screen) -> Self {
        Self {
            running: true,
            screen,
            input_mode: InputMode::Normal,
            command_input: String::new(),
            status_message: String::new(),
            show_help: false,
            backend_label,
            user_email: None,
            view: LedgerView::default(),
            cursor: ListCursor::default(),
            login: LoginForm::default(),
            pending_action: None,
            confirm_message: String::new(),
            visible_rows: 20,
        }
    }

    pub(crate) fn sync_from<P: Persistence>(&mut self, ledger: &Ledger<P>) {
        self.view = LedgerView {
            transactions: ledger.snapshot(),
            balance: ledger.balance(),
            income: ledger.total_income(),
            expense: ledger.total_expense(),
            status: Some(ledger.status()),
        };
        self.cursor.clamp(self.view.transactions.len());
    }

    pub(crate) fn selected(&self) -> Option<&Transaction> {
        self.view.transactions.get(self.cursor.index)
    }

    /// Badge shown next to the balance.
    pub(crate) fn sync_badge(&self) -> String {
        if self.backend_label == "local" {
            return "Local".to_string();
        }
        self.view.status.unwrap_or(SyncStatus::Unloaded).to_string()
    }

    pub(crate) fn ask_confirm(&mut self, action: PendingAction) {
        self.confirm_message = match &action {
            PendingAction::Delete(request) => request.prompt(),
            PendingAction::Logout => match &self.user_email {
                Some(email) => format!("Sign out of {email}?"),
                None => "Sign out?".to_string(),
            },
        };
        self.pending_action = Some(action);
        self.input_mode = InputMode::Confirm;
    }

    pub(crate) fn cancel_confirm(&mut self) {
        self.pending_action = None;
        self.confirm_message.clear();
        self.input_mode = InputMode::Normal;
    }

    /// Back to an empty login screen after sign-out.
    pub(crate) fn signed_out(&mut self) {
        self.screen = Screen::Login;
        self.view = LedgerView::default();
        self.cursor.top();
        self.user_email = None;
        self.pending_action = None;
        self.input_mode = InputMode::Normal;
        self.login = LoginForm::default();
    }

    pub(crate) fn signed_in(&mut self, email: Option<String>) {
        self.screen = Screen::Balance;
        self.user_email = email;
        self.login = LoginForm::default();
    }

    pub(crate) fn set_status(&mut self, msg: impl Into<String>) {
        self.status_message = msg.into();
    }
}
