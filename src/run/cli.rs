use std::io::{self, BufRead, Write};
use std::path::Path;

use anyhow::{Context, Result};

use super::Runtime;
use crate::auth::SignUpOutcome;
use crate::export;
use crate::ledger::Ledger;
use crate::models::TransactionType;
use crate::store::Backend;
use crate::ui::util::{format_amount, format_signed, truncate};

pub(crate) async fn as_cli(args: &[String], rt: &Runtime) -> Result<()> {
    let rest = &args[2..];
    match args[1].as_str() {
        "list" | "ls" => cli_list(rt).await,
        "summary" | "s" => cli_summary(rt).await,
        "add" => cli_add(rest, rt).await,
        "remove" | "rm" => cli_remove(rest, rt).await,
        "export" => cli_export(rest, rt).await,
        "signup" => cli_signup(rest, rt).await,
        "login" => cli_login(rest, rt).await,
        "logout" => cli_logout(rt).await,
        "whoami" => cli_whoami(rt),
        "--help" | "-h" | "help" => {
            print_usage();
            Ok(())
        }
        "--version" | "-V" | "version" => {
            println!("finanzas {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        other => {
            print_usage();
            anyhow::bail!("Unknown command: {other}");
        }
    }
}

fn print_usage() {
    println!("Finanzas - personal finance ledger");
    println!();
    println!("Usage: finanzas [command]");
    println!();
    println!("Commands:");
    println!("  (none)                            Launch interactive TUI");
    println!("  list                              List transactions, newest first");
    println!("  summary                           Print balance, income and expenses");
    println!("  add <income|expense> <amount> <description>");
    println!("                                    Record a transaction");
    println!("  remove <id> [--yes]               Delete a transaction");
    println!("  export [path]                     Export transactions to CSV (stdout if no path)");
    println!("  signup <email>                    Create an account (remote-auth backend)");
    println!("  login <email>                     Sign in (remote-auth backend)");
    println!("  logout                            Sign out");
    println!("  whoami                            Show the signed-in account");
    println!("  --help, -h                        Show this help");
    println!("  --version, -V                     Show version");
    println!();
    println!("Backend is chosen with FINANZAS_BACKEND=local|remote|remote-auth.");
}

/// Loaded ledger for the current session.
async fn loaded_ledger(rt: &Runtime) -> Result<Ledger<Backend>> {
    let ledger = rt
        .open_ledger()
        .ok_or_else(|| anyhow::anyhow!("Not signed in. Run `finanzas login <email>` first."))?;
    ledger.load().await?;
    Ok(ledger)
}

async fn cli_list(rt: &Runtime) -> Result<()> {
    let ledger = loaded_ledger(rt).await?;
    let txns = ledger.snapshot();
    if txns.is_empty() {
        println!("No transactions.");
        return Ok(());
    }
    println!("{:<16} {:<10} {:<40} {:>14}", "ID", "Date", "Description", "Amount");
    for txn in &txns {
        println!(
            "{:<16} {:<10} {:<40} {:>14}",
            truncate(&txn.id, 16),
            txn.date.format("%Y-%m-%d"),
            truncate(&txn.description, 40),
            format_signed(txn)
        );
    }
    println!();
    println!("{} transactions, balance {}", txns.len(), format_amount(ledger.balance()));
    Ok(())
}

async fn cli_summary(rt: &Runtime) -> Result<()> {
    let ledger = loaded_ledger(rt).await?;
    println!("Backend:   {}", rt.backend().label());
    println!("Balance:   {:>14}", format_amount(ledger.balance()));
    println!("Income:    {:>14}", format_amount(ledger.total_income()));
    println!("Expenses:  {:>14}", format_amount(ledger.total_expense()));
    println!("Entries:   {:>14}", ledger.len());
    Ok(())
}

async fn cli_add(args: &[String], rt: &Runtime) -> Result<()> {
    if args.len() < 3 {
        anyhow::bail!("Usage: finanzas add <income|expense> <amount> <description>");
    }
    let kind = TransactionType::parse(&args[0])?;
    let description = args[2..].join(" ");

    let ledger = rt
        .open_ledger()
        .ok_or_else(|| anyhow::anyhow!("Not signed in. Run `finanzas login <email>` first."))?;
    let txn = ledger.add(&description, &args[1], kind).await?;
    println!(
        "Added {} '{}' {} (id {})",
        txn.kind,
        txn.description,
        format_signed(&txn),
        txn.id
    );
    Ok(())
}

async fn cli_remove(args: &[String], rt: &Runtime) -> Result<()> {
    let id = args
        .iter()
        .find(|a| !a.starts_with('-'))
        .ok_or_else(|| anyhow::anyhow!("Usage: finanzas remove <id> [--yes]"))?;
    let assume_yes = args.iter().any(|a| a == "--yes" || a == "-y");

    let ledger = loaded_ledger(rt).await?;
    let request = ledger.request_removal(id);
    if !assume_yes && !confirm(&request.prompt())? {
        println!("Cancelled.");
        return Ok(());
    }
    if ledger.remove(request).await? {
        println!("Deleted {id}.");
    } else {
        println!("No transaction with id {id}.");
    }
    Ok(())
}

async fn cli_export(args: &[String], rt: &Runtime) -> Result<()> {
    let ledger = loaded_ledger(rt).await?;
    let txns = ledger.snapshot();
    match args.first().filter(|a| !a.starts_with('-')) {
        Some(path) => {
            let path = Path::new(path);
            let file = std::fs::File::create(path)
                .with_context(|| format!("Failed to create {}", path.display()))?;
            let count = export::write_csv(&txns, file)?;
            println!("Exported {count} transactions to {}", path.display());
        }
        None => {
            export::write_csv(&txns, io::stdout().lock())?;
        }
    }
    Ok(())
}

fn email_arg(args: &[String], usage: &str) -> Result<String> {
    args.first()
        .cloned()
        .ok_or_else(|| anyhow::anyhow!("Usage: finanzas {usage} <email>"))
}

async fn cli_signup(args: &[String], rt: &Runtime) -> Result<()> {
    let auth = rt.auth.as_ref().ok_or_else(not_auth_backend)?;
    let email = email_arg(args, "signup")?;
    let password = rpassword::prompt_password("Password: ")?;
    match auth.sign_up(&email, &password).await? {
        SignUpOutcome::SignedIn => println!("Account created. Signed in as {email}."),
        SignUpOutcome::ConfirmationPending => {
            println!("Account created. Check {email} for a confirmation link, then log in.")
        }
    }
    Ok(())
}

async fn cli_login(args: &[String], rt: &Runtime) -> Result<()> {
    let auth = rt.auth.as_ref().ok_or_else(not_auth_backend)?;
    let email = email_arg(args, "login")?;
    let password = rpassword::prompt_password("Password: ")?;
    let session = auth.sign_in(&email, &password).await?;
    println!("Signed in as {}.", session.email());
    Ok(())
}

async fn cli_logout(rt: &Runtime) -> Result<()> {
    let auth = rt.auth.as_ref().ok_or_else(not_auth_backend)?;
    auth.sign_out().await?;
    println!("Signed out.");
    Ok(())
}

fn cli_whoami(rt: &Runtime) -> Result<()> {
    match rt.auth.as_ref().map(|a| a.current_session()) {
        None => println!("Backend '{}' has no accounts.", rt.backend().label()),
        Some(None) => println!("Not signed in."),
        Some(Some(session)) => println!("{} ({})", session.email(), session.user_id()),
    }
    Ok(())
}

fn not_auth_backend() -> anyhow::Error {
    anyhow::anyhow!("Accounts need FINANZAS_BACKEND=remote-auth")
}

fn confirm(prompt: &str) -> Result<bool> {
    print!("{prompt} [y/N] ");
    io::stdout().flush()?;
    let mut answer = String::new();
    io::stdin().lock().read_line(&mut answer)?;
    Ok(matches!(answer.trim().to_lowercase().as_str(), "y" | "yes"))
}
