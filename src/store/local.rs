use std::sync::Arc;

use tracing::debug;

use super::{Persistence, Scope};
use crate::db::{schema::TRANSACTIONS_SLOT, Database};
use crate::error::StoreError;
use crate::models::{NewTransaction, Transaction};

/// Device-local ledger kept in a single key-value slot.
///
/// The slot holds the whole collection as a JSON array and is rewritten
/// wholesale on every mutation. Ids are millisecond timestamps.
#[derive(Clone)]
pub(crate) struct LocalStore {
    db: Arc<Database>,
}

impl LocalStore {
    pub(crate) fn new(db: Arc<Database>) -> Self {
        Self { db }
    }
}

fn decode(slot: Option<&str>) -> Result<Vec<Transaction>, StoreError> {
    match slot {
        Some(json) => Ok(serde_json::from_str(json)?),
        None => Ok(Vec::new()),
    }
}

/// Next id derived from the clock, bumped past any id already in use.
pub(super) fn next_id(existing: &[Transaction], now_millis: i64) -> String {
    let mut candidate = now_millis;
    while existing.iter().any(|t| t.id == candidate.to_string()) {
        candidate += 1;
    }
    candidate.to_string()
}

impl Persistence for LocalStore {
    async fn fetch_all(&self, _scope: &Scope) -> Result<Vec<Transaction>, StoreError> {
        let slot = self.db.read_slot(TRANSACTIONS_SLOT)?;
        let mut txns = decode(slot.as_deref())?;
        txns.sort_by(|a, b| b.date.cmp(&a.date));
        debug!(count = txns.len(), "read local ledger slot");
        Ok(txns)
    }

    async fn insert(&self, new: &NewTransaction) -> Result<Transaction, StoreError> {
        self.db.update_slot(TRANSACTIONS_SLOT, |slot| {
            let mut txns = decode(slot.as_deref())?;
            let id = next_id(&txns, chrono::Utc::now().timestamp_millis());
            let stored = new.clone().into_transaction(id);
            txns.insert(0, stored.clone());
            let json = serde_json::to_string(&txns)?;
            debug!(id = %stored.id, count = txns.len(), "wrote local ledger slot");
            Ok((Some(json), stored))
        })
    }

    async fn delete(&self, id: &str, scope: &Scope) -> Result<(), StoreError> {
        self.db.update_slot(TRANSACTIONS_SLOT, |slot| {
            let mut txns = decode(slot.as_deref())?;
            let before = txns.len();
            txns.retain(|t| {
                let owned = match (scope.owner(), t.user_id.as_deref()) {
                    (Some(owner), Some(user)) => owner == user,
                    _ => true,
                };
                !(t.id == id && owned)
            });
            if txns.len() == before {
                return Ok((None, ()));
            }
            debug!(id, count = txns.len(), "wrote local ledger slot");
            Ok((Some(serde_json::to_string(&txns)?), ()))
        })
    }
}

