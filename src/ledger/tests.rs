#![allow(clippy::unwrap_used)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use chrono::{TimeZone, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tokio::sync::oneshot;

use super::*;
use crate::models::NewTransaction;

// ── Fake backend ──────────────────────────────────────────────

#[derive(Clone, Copy, PartialEq, Eq)]
enum Fail {
    Never,
    Rejected,
    Unreachable,
}

#[derive(Default)]
struct Inner {
    rows: Mutex<Vec<Transaction>>,
    next_id: AtomicUsize,
    fetches: AtomicUsize,
    inserts: AtomicUsize,
    fail: Mutex<Option<Fail>>,
    gates: Mutex<VecDeque<oneshot::Receiver<()>>>,
}

#[derive(Clone, Default)]
struct FakeStore(Arc<Inner>);

impl FakeStore {
    fn failing(&self, mode: Fail) {
        *self.0.fail.lock().unwrap() = Some(mode);
    }

    fn seed(&self, rows: Vec<Transaction>) {
        *self.0.rows.lock().unwrap() = rows;
    }

    fn rows(&self) -> Vec<Transaction> {
        self.0.rows.lock().unwrap().clone()
    }

    async fn check(&self) -> Result<(), StoreError> {
        let mode = self.0.fail.lock().unwrap().unwrap_or(Fail::Never);
        match mode {
            Fail::Never => Ok(()),
            Fail::Rejected => Err(StoreError::Rejected {
                endpoint: "fake".into(),
                status: 500,
                body: "boom".into(),
            }),
            Fail::Unreachable => {
                let source = reqwest::Client::new()
                    .get("http://127.0.0.1:1")
                    .send()
                    .await
                    .unwrap_err();
                Err(StoreError::Unreachable {
                    endpoint: "fake".into(),
                    source,
                })
            }
        }
    }
}

impl Persistence for FakeStore {
    async fn fetch_all(&self, scope: &Scope) -> Result<Vec<Transaction>, StoreError> {
        self.0.fetches.fetch_add(1, Ordering::SeqCst);
        self.check().await?;
        Ok(self
            .rows()
            .into_iter()
            .filter(|t| scope.owner().is_none() || t.user_id.as_deref() == scope.owner())
            .collect())
    }

    async fn insert(&self, new: &NewTransaction) -> Result<Transaction, StoreError> {
        self.0.inserts.fetch_add(1, Ordering::SeqCst);
        let gate = self.0.gates.lock().unwrap().pop_front();
        if let Some(gate) = gate {
            let _ = gate.await;
        }
        self.check().await?;
        let id = self.0.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        let stored = new.clone().into_transaction(id.to_string());
        self.0.rows.lock().unwrap().push(stored.clone());
        // The response is still in flight after the row is committed.
        tokio::task::yield_now().await;
        Ok(stored)
    }

    async fn delete(&self, id: &str, _scope: &Scope) -> Result<(), StoreError> {
        self.check().await?;
        self.0.rows.lock().unwrap().retain(|t| t.id != id);
        Ok(())
    }
}

fn row(id: &str, description: &str, amount: Decimal, kind: TransactionType, day: u32) -> Transaction {
    Transaction {
        id: id.into(),
        user_id: None,
        description: description.into(),
        amount,
        kind,
        date: Utc.with_ymd_and_hms(2024, 3, day, 12, 0, 0).unwrap(),
        created_at: None,
        updated_at: None,
    }
}

fn ledger() -> (Ledger<FakeStore>, FakeStore) {
    let store = FakeStore::default();
    (Ledger::new(store.clone(), Scope::All), store)
}

// ── Balance and totals ────────────────────────────────────────

#[tokio::test]
async fn test_groceries_and_salary_end_to_end() {
    let (ledger, _) = ledger();
    ledger
        .add("Groceries", "50", TransactionType::Expense)
        .await
        .unwrap();
    ledger
        .add("Salary", "2000", TransactionType::Income)
        .await
        .unwrap();

    assert_eq!(ledger.balance(), dec!(1950.00));
    assert_eq!(ledger.total_income(), dec!(2000.00));
    assert_eq!(ledger.total_expense(), dec!(50.00));
    assert_eq!(crate::ui::util::format_amount(ledger.balance()), "$1,950.00");
}

#[tokio::test]
async fn test_add_moves_balance_by_signed_amount() {
    let (ledger, _) = ledger();
    let before = ledger.balance();
    ledger
        .add("Freelance", "120.50", TransactionType::Income)
        .await
        .unwrap();
    assert_eq!(ledger.balance() - before, dec!(120.50));

    let before = ledger.balance();
    ledger
        .add("Rent", "80.25", TransactionType::Expense)
        .await
        .unwrap();
    assert_eq!(ledger.balance() - before, dec!(-80.25));
}

#[tokio::test]
async fn test_balance_equals_income_minus_expense_throughout() {
    let (ledger, _) = ledger();
    let check = |l: &Ledger<FakeStore>| {
        assert_eq!(l.balance(), l.total_income() - l.total_expense());
    };

    check(&ledger);
    let a = ledger.add("a", "10", TransactionType::Income).await.unwrap();
    check(&ledger);
    let b = ledger.add("b", "3.3", TransactionType::Expense).await.unwrap();
    check(&ledger);
    ledger.add("c", "7", TransactionType::Expense).await.unwrap();
    check(&ledger);
    ledger.remove(ledger.request_removal(&a.id)).await.unwrap();
    check(&ledger);
    ledger.remove(ledger.request_removal(&b.id)).await.unwrap();
    check(&ledger);
    assert_eq!(ledger.balance(), dec!(-7));
}

// ── Validation ────────────────────────────────────────────────

#[tokio::test]
async fn test_invalid_amounts_rejected_without_backend_call() {
    let (ledger, store) = ledger();
    ledger.add("Seed", "5", TransactionType::Income).await.unwrap();
    let balance = ledger.balance();

    for amount in ["-5", "", "abc", "0"] {
        let err = ledger
            .add("Lunch", amount, TransactionType::Expense)
            .await
            .unwrap_err();
        assert!(err.is_validation(), "{amount:?} should be a validation error");
    }
    let err = ledger
        .add("   ", "5", TransactionType::Expense)
        .await
        .unwrap_err();
    assert!(err.is_validation());

    assert_eq!(ledger.len(), 1);
    assert_eq!(ledger.balance(), balance);
    assert_eq!(store.0.inserts.load(Ordering::SeqCst), 1);
}

// ── Persistence failures ──────────────────────────────────────

#[tokio::test]
async fn test_failed_add_keeps_length() {
    let (ledger, store) = ledger();
    ledger.add("Kept", "1", TransactionType::Income).await.unwrap();
    store.failing(Fail::Rejected);

    let err = ledger
        .add("Lost", "2", TransactionType::Income)
        .await
        .unwrap_err();
    assert!(!err.is_validation());
    assert_eq!(ledger.len(), 1);
    assert_eq!(ledger.snapshot()[0].description, "Kept");
}

#[tokio::test]
async fn test_failed_load_keeps_previous_list_and_goes_offline() {
    let (ledger, store) = ledger();
    store.seed(vec![row("1", "Rent", dec!(900), TransactionType::Expense, 1)]);
    ledger.load().await.unwrap();
    assert_eq!(ledger.status(), SyncStatus::Online);

    store.failing(Fail::Unreachable);
    assert!(ledger.load().await.unwrap_err().is_unreachable());
    assert_eq!(ledger.len(), 1);
    assert_eq!(ledger.status(), SyncStatus::Offline);

    store.failing(Fail::Never);
    ledger.load().await.unwrap();
    assert_eq!(ledger.status(), SyncStatus::Online);
}

#[tokio::test]
async fn test_rejected_load_does_not_mark_offline() {
    let (ledger, store) = ledger();
    store.failing(Fail::Rejected);
    assert!(ledger.load().await.is_err());
    assert_eq!(ledger.status(), SyncStatus::Unloaded);
}

#[tokio::test]
async fn test_failed_remove_keeps_row() {
    let (ledger, store) = ledger();
    let t = ledger.add("Keep me", "4", TransactionType::Expense).await.unwrap();
    store.failing(Fail::Rejected);

    assert!(ledger.remove(ledger.request_removal(&t.id)).await.is_err());
    assert_eq!(ledger.len(), 1);
}

// ── Load and remove ───────────────────────────────────────────

#[tokio::test]
async fn test_load_sorts_by_date_desc() {
    let (ledger, store) = ledger();
    store.seed(vec![
        row("1", "early", dec!(1), TransactionType::Income, 1),
        row("3", "late", dec!(1), TransactionType::Income, 20),
        row("2", "mid", dec!(1), TransactionType::Expense, 10),
    ]);
    assert_eq!(ledger.load().await.unwrap(), 3);

    let dates: Vec<_> = ledger.snapshot().iter().map(|t| t.date).collect();
    let mut sorted = dates.clone();
    sorted.sort_by(|a, b| b.cmp(a));
    assert_eq!(dates, sorted);
    assert_eq!(ledger.snapshot()[0].description, "late");
}

#[tokio::test]
async fn test_remove_unknown_id_is_noop() {
    let (ledger, _) = ledger();
    let t = ledger.add("Coffee", "3", TransactionType::Expense).await.unwrap();

    assert!(!ledger.remove(ledger.request_removal("nope")).await.unwrap());
    assert_eq!(ledger.len(), 1);

    assert!(ledger.remove(ledger.request_removal(&t.id)).await.unwrap());
    assert!(!ledger.remove(ledger.request_removal(&t.id)).await.unwrap());
    assert_eq!(ledger.len(), 0);
}

#[tokio::test]
async fn test_removal_request_prompt() {
    let (ledger, _) = ledger();
    let t = ledger.add("Cinema", "12", TransactionType::Expense).await.unwrap();
    let req = ledger.request_removal(&t.id);
    assert_eq!(req.id(), t.id);
    assert_eq!(req.prompt(), "Delete 'Cinema'?");
    assert_eq!(
        ledger.request_removal("x9").prompt(),
        "Delete transaction x9?"
    );
}

#[tokio::test]
async fn test_new_entry_is_prepended() {
    let (ledger, store) = ledger();
    store.seed(vec![row("old", "Old", dec!(1), TransactionType::Income, 1)]);
    ledger.load().await.unwrap();
    ledger.add("New", "2", TransactionType::Income).await.unwrap();
    assert_eq!(ledger.snapshot()[0].description, "New");
}

// ── Concurrency ───────────────────────────────────────────────

#[tokio::test]
async fn test_concurrent_adds_both_land_in_completion_order() {
    let (ledger, store) = ledger();
    let (release_first, gate_first) = oneshot::channel();
    let (release_second, gate_second) = oneshot::channel();
    store
        .0
        .gates
        .lock()
        .unwrap()
        .extend([gate_first, gate_second]);

    let first = ledger.add("First", "10", TransactionType::Expense);
    let second = ledger.add("Second", "20", TransactionType::Expense);
    let driver = async {
        release_second.send(()).unwrap();
        while ledger.len() < 1 {
            tokio::task::yield_now().await;
        }
        release_first.send(()).unwrap();
    };
    let (a, b, ()) = tokio::join!(first, second, driver);
    let (a, b) = (a.unwrap(), b.unwrap());

    assert_ne!(a.id, b.id);
    let names: Vec<String> = ledger.snapshot().into_iter().map(|t| t.description).collect();
    assert_eq!(names, vec!["First", "Second"]);
    assert_eq!(ledger.total_expense(), dec!(30));
}

#[tokio::test]
async fn test_add_does_not_duplicate_row_already_reloaded() {
    let (ledger, store) = ledger();
    let (release, gate) = oneshot::channel();
    store.0.gates.lock().unwrap().push_back(gate);

    let adding = ledger.add("Racy", "5", TransactionType::Income);
    let driver = async {
        // Reload after the row is committed but before the insert returns.
        tokio::task::yield_now().await;
        release.send(()).unwrap();
        while store.rows().is_empty() {
            tokio::task::yield_now().await;
        }
        ledger.load().await.unwrap();
    };
    let (added, ()) = tokio::join!(adding, driver);
    added.unwrap();

    let ids: Vec<String> = ledger.snapshot().into_iter().map(|t| t.id).collect();
    assert_eq!(ids.len(), 1);
}

// ── Scope, realtime, teardown ─────────────────────────────────

#[tokio::test]
async fn test_owner_scope_stamps_user_and_filters_load() {
    let store = FakeStore::default();
    let mut foreign = row("f", "Not mine", dec!(99), TransactionType::Income, 2);
    foreign.user_id = Some("someone-else".into());
    store.seed(vec![foreign]);

    let ledger = Ledger::new(store.clone(), Scope::Owner("u-1".into()));
    ledger.load().await.unwrap();
    assert_eq!(ledger.len(), 0);

    let t = ledger.add("Mine", "1", TransactionType::Income).await.unwrap();
    assert_eq!(t.user_id.as_deref(), Some("u-1"));
    assert_eq!(ledger.scope(), &Scope::Owner("u-1".into()));
}

#[tokio::test]
async fn test_reconcile_reloads_on_events_only() {
    let (ledger, store) = ledger();
    ledger.load().await.unwrap();
    let fetches = store.0.fetches.load(Ordering::SeqCst);

    ledger.reconcile(&[]).await.unwrap();
    assert_eq!(store.0.fetches.load(Ordering::SeqCst), fetches);

    // Another device inserted a row.
    store.seed(vec![row("r", "From phone", dec!(8), TransactionType::Expense, 5)]);
    let count = ledger
        .reconcile(&[ChangeEvent::Insert("r".into())])
        .await
        .unwrap();
    assert_eq!(count, 1);
    assert_eq!(store.0.fetches.load(Ordering::SeqCst), fetches + 1);
    assert_eq!(ledger.balance(), dec!(-8));
}

#[tokio::test]
async fn test_clear_drops_everything() {
    let (ledger, _) = ledger();
    ledger.add("x", "1", TransactionType::Income).await.unwrap();
    ledger.clear();
    assert_eq!(ledger.len(), 0);
    assert_eq!(ledger.balance(), Decimal::ZERO);
    assert_eq!(ledger.status(), SyncStatus::Unloaded);
}
