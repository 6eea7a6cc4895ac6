use std::io;
use std::thread;
use std::time::Duration;

use anyhow::Result;
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::{
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, Terminal};
use tokio::sync::{mpsc, watch};
use tokio::time::MissedTickBehavior;
use tracing::{info, warn};

use super::{LedgerSession, Runtime};
use crate::auth::SignUpOutcome;
use crate::models::Session;
use crate::store::ChangeEvent;
use crate::ui::app::{App, InputMode, LoginField, LoginMode, PendingAction, Screen};
use crate::ui::commands::{self, Action};
use crate::ui::util::format_signed;

type Term = Terminal<CrosstermBackend<io::Stdout>>;

/// How often the session expiry is checked while the UI is idle.
const SESSION_CHECK_INTERVAL: Duration = Duration::from_secs(30);

pub(crate) async fn as_tui(rt: &Runtime) -> Result<()> {
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let result = run_app(&mut terminal, rt).await;

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    if let Err(ref e) = result {
        eprintln!("Error: {e:?}");
    }

    result
}

/// Terminal input blocks, so it is read on its own thread.
fn spawn_input_reader() -> mpsc::UnboundedReceiver<Event> {
    let (tx, rx) = mpsc::unbounded_channel();
    thread::spawn(move || loop {
        match event::read() {
            Ok(ev) => {
                if tx.send(ev).is_err() {
                    break;
                }
            }
            Err(e) => {
                warn!(error = %e, "terminal input failed");
                break;
            }
        }
    });
    rx
}

async fn next_change(current: &mut Option<LedgerSession>) -> Option<ChangeEvent> {
    match current.as_mut().and_then(|s| s.feed.as_mut()) {
        Some(feed) => feed.recv().await,
        None => std::future::pending().await,
    }
}

async fn session_changed(
    rx: &mut Option<watch::Receiver<Option<Session>>>,
) -> Option<Option<Session>> {
    let Some(rx) = rx else {
        return std::future::pending().await;
    };
    if rx.changed().await.is_err() {
        return std::future::pending().await;
    }
    Some(rx.borrow_and_update().clone())
}

fn draw(terminal: &mut Term, app: &mut App) -> Result<()> {
    terminal.draw(|f| {
        // 3 bars, 5 rows of cards, 2 borders and the table header
        let content_height = f.area().height.saturating_sub(11) as usize;
        app.visible_rows = content_height.max(1);
        crate::ui::render::render(f, app);
    })?;
    Ok(())
}

async fn run_app(terminal: &mut Term, rt: &Runtime) -> Result<()> {
    let mut input = spawn_input_reader();
    let mut session_rx = rt.auth.as_ref().map(|auth| auth.subscribe());
    if let Some(rx) = session_rx.as_mut() {
        rx.borrow_and_update();
    }

    let label = rt.backend().label();
    let mut app = if rt.scope().is_some() {
        App::new(label, Screen::Balance)
    } else {
        App::new(label, Screen::Login)
    };
    let mut session_check = tokio::time::interval(SESSION_CHECK_INTERVAL);
    session_check.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let mut current = None;
    if app.screen == Screen::Balance {
        let email = rt
            .auth
            .as_ref()
            .and_then(|auth| auth.current_session())
            .map(|s| s.email().to_string());
        app.signed_in(email);
        current = start_session(terminal, rt, &mut app).await?;
    }

    while app.running {
        draw(terminal, &mut app)?;

        tokio::select! {
            maybe = input.recv() => match maybe {
                Some(Event::Key(key)) if key.kind == KeyEventKind::Press => {
                    if let Some(action) = handle_key(key, &mut app) {
                        perform(action, terminal, rt, &mut app, current.as_ref()).await?;
                    }
                }
                Some(_) => {}
                None => app.running = false,
            },
            Some(first) = next_change(&mut current) => {
                refresh_session(rt, &mut app).await;
                if let Some(session) = current.as_mut() {
                    let mut events = vec![first];
                    if let Some(feed) = session.feed.as_mut() {
                        events.extend(feed.drain());
                    }
                    if let Err(e) = session.ledger.reconcile(&events).await {
                        app.set_status(format!("Reload failed: {e}"));
                    }
                    app.sync_from(&session.ledger);
                }
            },
            _ = session_check.tick(), if rt.auth.is_some() => {
                refresh_session(rt, &mut app).await;
            },
            Some(session) = session_changed(&mut session_rx) => match session {
                Some(session) => {
                    if current.is_none() {
                        app.signed_in(Some(session.email().to_string()));
                        current = start_session(terminal, rt, &mut app).await?;
                    }
                }
                None => {
                    if let Some(old) = current.take() {
                        old.ledger.clear();
                    }
                    app.signed_out();
                    app.set_status("Signed out");
                }
            },
        }
    }
    Ok(())
}

async fn start_session(
    terminal: &mut Term,
    rt: &Runtime,
    app: &mut App,
) -> Result<Option<LedgerSession>> {
    let Some(session) = rt.open_session() else {
        return Ok(None);
    };
    info!(scope = ?session.ledger.scope(), live = session.feed.is_some(), "ledger session started");
    app.set_status("Loading…");
    draw(terminal, app)?;
    match session.ledger.load().await {
        Ok(count) => app.set_status(format!("Loaded {count} transactions")),
        Err(e) => app.set_status(format!("Could not load transactions: {e}")),
    }
    app.sync_from(&session.ledger);
    Ok(Some(session))
}

// ── Actions ──────────────────────────────────────────────────

async fn perform(
    action: Action,
    terminal: &mut Term,
    rt: &Runtime,
    app: &mut App,
    current: Option<&LedgerSession>,
) -> Result<()> {
    match action {
        Action::Quit => app.running = false,
        Action::ShowHelp => app.show_help = true,
        Action::SubmitLogin => submit_login(terminal, rt, app).await?,
        Action::RequestLogout => app.ask_confirm(PendingAction::Logout),
        Action::Reload => {
            let Some(session) = current else {
                return Ok(());
            };
            refresh_session(rt, app).await;
            match session.ledger.load().await {
                Ok(count) => app.set_status(format!("Reloaded {count} transactions")),
                Err(e) => app.set_status(format!("Reload failed: {e}")),
            }
            app.sync_from(&session.ledger);
        }
        Action::Add {
            kind,
            amount,
            description,
        } => {
            let Some(session) = current else {
                return Ok(());
            };
            app.set_status("Saving…");
            draw(terminal, app)?;
            refresh_session(rt, app).await;
            match session.ledger.add(&description, &amount, kind).await {
                Ok(txn) => {
                    app.set_status(format!("Added '{}' {}", txn.description, format_signed(&txn)));
                    app.cursor.top();
                }
                Err(e) if e.is_validation() => app.set_status(e.to_string()),
                Err(e) => app.set_status(format!("Could not save: {e}")),
            }
            app.sync_from(&session.ledger);
        }
        Action::RequestDelete(id) => {
            let Some(session) = current else {
                return Ok(());
            };
            let request = session.ledger.request_removal(&id);
            app.ask_confirm(PendingAction::Delete(request));
        }
        Action::ConfirmPending => {
            let Some(pending) = app.pending_action.take() else {
                return Ok(());
            };
            app.confirm_message.clear();
            match pending {
                PendingAction::Delete(request) => {
                    let Some(session) = current else {
                        return Ok(());
                    };
                    refresh_session(rt, app).await;
                    let id = request.id().to_string();
                    match session.ledger.remove(request).await {
                        Ok(true) => app.set_status("Transaction deleted"),
                        Ok(false) => app.set_status(format!("No transaction with id {id}")),
                        Err(e) => app.set_status(format!("Could not delete: {e}")),
                    }
                    app.sync_from(&session.ledger);
                }
                PendingAction::Logout => {
                    if let Some(auth) = &rt.auth {
                        if let Err(e) = auth.sign_out().await {
                            app.set_status(format!("Sign-out failed: {e}"));
                        }
                    }
                }
            }
        }
    }
    Ok(())
}

/// Renew the access token if it is about to expire. A refused refresh
/// signs the user out, which the session watch then turns into the login
/// screen.
async fn refresh_session(rt: &Runtime, app: &mut App) {
    let Some(auth) = &rt.auth else {
        return;
    };
    if let Err(e) = auth.ensure_fresh().await {
        app.set_status(format!("Session refresh failed: {e}"));
    }
}

async fn submit_login(terminal: &mut Term, rt: &Runtime, app: &mut App) -> Result<()> {
    let Some(auth) = &rt.auth else {
        return Ok(());
    };
    let (email, password) = app.login.take_credentials();
    app.login.error = None;
    app.login.notice = Some("Contacting server…".into());
    draw(terminal, app)?;

    let outcome = match app.login.mode {
        LoginMode::SignIn => auth.sign_in(&email, &password).await.map(|_| None),
        LoginMode::SignUp => auth.sign_up(&email, &password).await.map(Some),
    };
    app.login.notice = None;
    match outcome {
        Ok(Some(SignUpOutcome::ConfirmationPending)) => {
            app.login.mode = LoginMode::SignIn;
            app.login.field = LoginField::Password;
            app.login.notice = Some(format!("Check {email} for a confirmation link"));
        }
        Ok(_) => {}
        Err(e) => {
            app.login.field = LoginField::Password;
            app.login.error = Some(e.to_string());
        }
    }
    Ok(())
}

// ── Input handlers ───────────────────────────────────────────

fn handle_key(key: KeyEvent, app: &mut App) -> Option<Action> {
    if app.show_help {
        app.show_help = false;
        return None;
    }
    if key.modifiers.contains(KeyModifiers::CONTROL)
        && matches!(key.code, KeyCode::Char('q') | KeyCode::Char('c'))
    {
        return Some(Action::Quit);
    }
    if app.screen == Screen::Login {
        return handle_login_input(key, app);
    }
    match app.input_mode {
        InputMode::Normal => handle_normal_input(key, app),
        InputMode::Command => handle_command_input(key, app),
        InputMode::Confirm => handle_confirm_input(key, app),
    }
}

fn handle_normal_input(key: KeyEvent, app: &mut App) -> Option<Action> {
    let len = app.view.transactions.len();
    let page = app.visible_rows;
    match key.code {
        KeyCode::Char(':') => {
            app.input_mode = InputMode::Command;
            app.command_input.clear();
        }
        KeyCode::Char('d') if key.modifiers.contains(KeyModifiers::CONTROL) => {
            for _ in 0..page / 2 {
                app.cursor.down(len, page);
            }
        }
        KeyCode::Char('u') if key.modifiers.contains(KeyModifiers::CONTROL) => {
            for _ in 0..page / 2 {
                app.cursor.up();
            }
        }
        KeyCode::Char('j') | KeyCode::Down => app.cursor.down(len, page),
        KeyCode::Char('k') | KeyCode::Up => app.cursor.up(),
        KeyCode::Char('g') | KeyCode::Home => app.cursor.top(),
        KeyCode::Char('G') | KeyCode::End => app.cursor.bottom(len, page),
        KeyCode::Char('D') | KeyCode::Delete => {
            return app.selected().map(|txn| Action::RequestDelete(txn.id.clone()));
        }
        KeyCode::Char('r') => return Some(Action::Reload),
        KeyCode::Char('?') => return Some(Action::ShowHelp),
        KeyCode::Char('q') => return Some(Action::Quit),
        KeyCode::Esc => app.status_message.clear(),
        _ => {}
    }
    None
}

fn handle_command_input(key: KeyEvent, app: &mut App) -> Option<Action> {
    match key.code {
        KeyCode::Char(c) => app.command_input.push(c),
        KeyCode::Backspace => {
            if app.command_input.pop().is_none() {
                app.input_mode = InputMode::Normal;
            }
        }
        KeyCode::Esc => {
            app.input_mode = InputMode::Normal;
            app.command_input.clear();
        }
        KeyCode::Enter => {
            app.input_mode = InputMode::Normal;
            let input = std::mem::take(&mut app.command_input);
            if input.trim().is_empty() {
                return None;
            }
            match commands::parse_command(&input, app) {
                Ok(action) => return Some(action),
                Err(msg) => app.set_status(msg),
            }
        }
        _ => {}
    }
    None
}

fn handle_confirm_input(key: KeyEvent, app: &mut App) -> Option<Action> {
    match key.code {
        KeyCode::Char('y') | KeyCode::Char('Y') => {
            app.input_mode = InputMode::Normal;
            Some(Action::ConfirmPending)
        }
        _ => {
            app.cancel_confirm();
            app.set_status("Cancelled");
            None
        }
    }
}

fn handle_login_input(key: KeyEvent, app: &mut App) -> Option<Action> {
    let form = &mut app.login;
    match key.code {
        KeyCode::Char('t') if key.modifiers.contains(KeyModifiers::CONTROL) => form.toggle_mode(),
        KeyCode::Tab | KeyCode::BackTab | KeyCode::Up | KeyCode::Down => form.next_field(),
        KeyCode::Enter => {
            if form.field == LoginField::Email && form.password.is_empty() {
                form.next_field();
            } else {
                return Some(Action::SubmitLogin);
            }
        }
        KeyCode::Esc => return Some(Action::Quit),
        KeyCode::Backspace => {
            form.focused_mut().pop();
        }
        KeyCode::Char(c) => {
            form.focused_mut().push(c);
            form.error = None;
        }
        _ => {}
    }
    None
}

#[cfg(test)]
#[path = "tui_tests.rs"]
mod tests;
