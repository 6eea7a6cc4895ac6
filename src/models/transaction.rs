use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::error::ValidationError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub(crate) enum TransactionType {
    Income,
    Expense,
}

impl TransactionType {
    pub(crate) fn as_str(&self) -> &'static str {
        match self {
            Self::Income => "income",
            Self::Expense => "expense",
        }
    }

    pub(crate) fn parse(s: &str) -> Result<Self, ValidationError> {
        match s.trim().to_lowercase().as_str() {
            "income" | "in" | "+" => Ok(Self::Income),
            "expense" | "out" | "-" => Ok(Self::Expense),
            other => Err(ValidationError::UnknownKind(other.to_string())),
        }
    }
}

impl std::fmt::Display for TransactionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Largest amount the remote `numeric(14, 2)` column holds.
pub(crate) const MAX_AMOUNT: Decimal = Decimal::from_parts(276_447_231, 23_283, 0, false, 2);

/// Decimal places kept for an amount.
const AMOUNT_SCALE: u32 = 2;

/// A recorded income or expense event, as stored by the backend.
///
/// Field names match the remote `transactions` table so the same type is
/// used for the wire format and for the local JSON slot. Amounts are written
/// as decimal strings and read from either strings or JSON numbers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) struct Transaction {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    pub description: String,
    #[serde(serialize_with = "rust_decimal::serde::str::serialize")]
    pub amount: Decimal,
    #[serde(rename = "type")]
    pub kind: TransactionType,
    pub date: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Transaction {
    pub(crate) fn is_income(&self) -> bool {
        self.kind == TransactionType::Income
    }

    pub(crate) fn is_expense(&self) -> bool {
        self.kind == TransactionType::Expense
    }

    /// Amount with the sign it contributes to the balance.
    pub(crate) fn signed_amount(&self) -> Decimal {
        match self.kind {
            TransactionType::Income => self.amount,
            TransactionType::Expense => -self.amount,
        }
    }
}

/// Row to insert. The backend assigns `id` (and the server timestamps).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub(crate) struct NewTransaction {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    pub description: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub amount: Decimal,
    #[serde(rename = "type")]
    pub kind: TransactionType,
    pub date: DateTime<Utc>,
}

impl NewTransaction {
    pub(crate) fn into_transaction(self, id: String) -> Transaction {
        Transaction {
            id,
            user_id: self.user_id,
            description: self.description,
            amount: self.amount,
            kind: self.kind,
            date: self.date,
            created_at: None,
            updated_at: None,
        }
    }
}

/// Validated form input, ready to be stamped and persisted.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct TransactionDraft {
    pub description: String,
    pub amount: Decimal,
    pub kind: TransactionType,
}

impl TransactionDraft {
    pub(crate) fn parse(
        description: &str,
        amount_text: &str,
        kind: TransactionType,
    ) -> Result<Self, ValidationError> {
        let description = description.trim();
        if description.is_empty() {
            return Err(ValidationError::EmptyDescription);
        }
        let amount_text = amount_text.trim();
        let amount = Decimal::from_str(amount_text)
            .map_err(|_| ValidationError::InvalidAmount(amount_text.to_string()))?;
        if amount <= Decimal::ZERO {
            return Err(ValidationError::NonPositiveAmount);
        }
        if amount.normalize().scale() > AMOUNT_SCALE {
            return Err(ValidationError::TooManyDecimals(AMOUNT_SCALE));
        }
        if amount > MAX_AMOUNT {
            return Err(ValidationError::AmountTooLarge(MAX_AMOUNT));
        }
        Ok(Self {
            description: description.to_string(),
            amount,
            kind,
        })
    }

    pub(crate) fn stamp(self, user_id: Option<String>, date: DateTime<Utc>) -> NewTransaction {
        NewTransaction {
            user_id,
            description: self.description,
            amount: self.amount,
            kind: self.kind,
            date,
        }
    }
}
