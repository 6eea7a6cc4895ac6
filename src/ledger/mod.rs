//! The ledger store: the session's ordered list of transactions.
//!
//! Every mutation is persisted first and applied to memory only after the
//! backend confirms it. Operations take `&self` so several may be in flight
//! at once; the state lock is never held across an await, which makes each
//! in-memory update atomic and interleaved completions last-writer-wins.

use std::sync::{Mutex, MutexGuard};

use chrono::Utc;
use rust_decimal::Decimal;
use tracing::{error, info};

use crate::error::{LedgerError, StoreError};
use crate::models::{Transaction, TransactionDraft, TransactionType};
use crate::store::{ChangeEvent, Persistence, Scope};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SyncStatus {
    /// Nothing loaded yet.
    Unloaded,
    Online,
    /// Last attempt could not reach the backend.
    Offline,
}

impl std::fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unloaded => write!(f, "Loading"),
            Self::Online => write!(f, "Synced"),
            Self::Offline => write!(f, "Offline"),
        }
    }
}

/// A deletion awaiting the user's decision. Only a request can be passed to
/// [`Ledger::remove`]; dropping it cancels the deletion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct RemovalRequest {
    id: String,
    description: Option<String>,
}

impl RemovalRequest {
    pub(crate) fn id(&self) -> &str {
        &self.id
    }

    pub(crate) fn prompt(&self) -> String {
        match &self.description {
            Some(desc) => format!("Delete '{desc}'?"),
            None => format!("Delete transaction {}?", self.id),
        }
    }
}

struct LedgerState {
    transactions: Vec<Transaction>,
    status: SyncStatus,
}

pub(crate) struct Ledger<P> {
    store: P,
    scope: Scope,
    state: Mutex<LedgerState>,
}

impl<P: Persistence> Ledger<P> {
    pub(crate) fn new(store: P, scope: Scope) -> Self {
        Self {
            store,
            scope,
            state: Mutex::new(LedgerState {
                transactions: Vec::new(),
                status: SyncStatus::Unloaded,
            }),
        }
    }

    fn state(&self) -> MutexGuard<'_, LedgerState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn note_failure(&self, err: &StoreError) {
        if err.is_unreachable() {
            self.state().status = SyncStatus::Offline;
        }
    }

    pub(crate) fn scope(&self) -> &Scope {
        &self.scope
    }

    // ── Operations ────────────────────────────────────────────

    /// Replace the in-memory list with the backend's, newest first.
    /// On failure the previous list is kept.
    pub(crate) async fn load(&self) -> Result<usize, StoreError> {
        match self.store.fetch_all(&self.scope).await {
            Ok(mut txns) => {
                txns.sort_by(|a, b| b.date.cmp(&a.date));
                let count = txns.len();
                let mut state = self.state();
                state.transactions = txns;
                state.status = SyncStatus::Online;
                info!(count, "ledger loaded");
                Ok(count)
            }
            Err(e) => {
                error!(error = %e, "ledger load failed");
                self.note_failure(&e);
                Err(e)
            }
        }
    }

    /// Validate form input, persist it, and prepend the stored row.
    pub(crate) async fn add(
        &self,
        description: &str,
        amount_text: &str,
        kind: TransactionType,
    ) -> Result<Transaction, LedgerError> {
        let draft = TransactionDraft::parse(description, amount_text, kind)?;
        let new = draft.stamp(self.scope.owner().map(str::to_string), Utc::now());

        let stored = match self.store.insert(&new).await {
            Ok(stored) => stored,
            Err(e) => {
                error!(error = %e, "saving transaction failed");
                self.note_failure(&e);
                return Err(e.into());
            }
        };

        let mut state = self.state();
        // A reload that completed meanwhile may already contain the row.
        state.transactions.retain(|t| t.id != stored.id);
        state.transactions.insert(0, stored.clone());
        info!(id = %stored.id, kind = %stored.kind, "transaction added");
        Ok(stored)
    }

    /// First half of a deletion: describe what would be removed.
    pub(crate) fn request_removal(&self, id: &str) -> RemovalRequest {
        let description = self
            .state()
            .transactions
            .iter()
            .find(|t| t.id == id)
            .map(|t| t.description.clone());
        RemovalRequest {
            id: id.to_string(),
            description,
        }
    }

    /// Delete a confirmed request. Returns whether a row left the list;
    /// unknown ids are not an error.
    pub(crate) async fn remove(&self, request: RemovalRequest) -> Result<bool, StoreError> {
        if let Err(e) = self.store.delete(&request.id, &self.scope).await {
            error!(id = %request.id, error = %e, "deleting transaction failed");
            self.note_failure(&e);
            return Err(e);
        }
        let mut state = self.state();
        let before = state.transactions.len();
        state.transactions.retain(|t| t.id != request.id);
        let removed = state.transactions.len() != before;
        info!(id = %request.id, removed, "transaction deleted");
        Ok(removed)
    }

    /// Full reload in answer to change notifications.
    pub(crate) async fn reconcile(&self, events: &[ChangeEvent]) -> Result<usize, StoreError> {
        if events.is_empty() {
            return Ok(self.len());
        }
        info!(events = events.len(), "remote change detected, reloading");
        self.load().await
    }

    /// Teardown on sign-out.
    pub(crate) fn clear(&self) {
        let mut state = self.state();
        state.transactions.clear();
        state.status = SyncStatus::Unloaded;
        info!("ledger cleared");
    }

    // ── Derived values ────────────────────────────────────────

    pub(crate) fn balance(&self) -> Decimal {
        self.state()
            .transactions
            .iter()
            .map(Transaction::signed_amount)
            .sum()
    }

    pub(crate) fn total_income(&self) -> Decimal {
        self.total_of(TransactionType::Income)
    }

    pub(crate) fn total_expense(&self) -> Decimal {
        self.total_of(TransactionType::Expense)
    }

    fn total_of(&self, kind: TransactionType) -> Decimal {
        self.state()
            .transactions
            .iter()
            .filter(|t| t.kind == kind)
            .map(|t| t.amount)
            .sum()
    }

    pub(crate) fn snapshot(&self) -> Vec<Transaction> {
        self.state().transactions.clone()
    }

    pub(crate) fn len(&self) -> usize {
        self.state().transactions.len()
    }

    pub(crate) fn status(&self) -> SyncStatus {
        self.state().status
    }
}

#[cfg(test)]
mod tests;
