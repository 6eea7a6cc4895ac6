mod session;
mod transaction;

pub(crate) use session::{Session, User};
pub(crate) use transaction::{NewTransaction, Transaction, TransactionDraft, TransactionType};
