use thiserror::Error;

/// Input rejected before any backend call is made.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub(crate) enum ValidationError {
    #[error("Description cannot be empty")]
    EmptyDescription,
    #[error("Amount is not a number: '{0}'")]
    InvalidAmount(String),
    #[error("Amount must be greater than zero")]
    NonPositiveAmount,
    #[error("Amount can have at most {0} decimal places")]
    TooManyDecimals(u32),
    #[error("Amount cannot exceed {0}")]
    AmountTooLarge(rust_decimal::Decimal),
    #[error("Unknown transaction type: '{0}' (use income or expense)")]
    UnknownKind(String),
    #[error("Email and password are required")]
    MissingCredentials,
    #[error("Invalid email address: '{0}'")]
    InvalidEmail(String),
    #[error("Password must be at least {0} characters")]
    PasswordTooShort(usize),
}

/// Failure of a persistence backend.
#[derive(Debug, Error)]
pub(crate) enum StoreError {
    /// The backend could not be reached at all.
    #[error("backend unreachable ({endpoint}): {source}")]
    Unreachable {
        endpoint: String,
        #[source]
        source: reqwest::Error,
    },
    /// The backend answered but refused the request.
    #[error("backend rejected {endpoint} with status {status}: {body}")]
    Rejected {
        endpoint: String,
        status: u16,
        body: String,
    },
    #[error("could not decode response from {endpoint}: {source}")]
    Decode {
        endpoint: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("local storage error: {0}")]
    Storage(#[from] rusqlite::Error),
    #[error("corrupt ledger data: {0}")]
    Corrupt(#[from] serde_json::Error),
    #[error("no signed-in session")]
    NotAuthenticated,
}

impl StoreError {
    pub(crate) fn is_unreachable(&self) -> bool {
        matches!(self, Self::Unreachable { .. })
    }
}

/// Error from a ledger operation.
#[derive(Debug, Error)]
pub(crate) enum LedgerError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl LedgerError {
    pub(crate) fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }
}

/// Authentication failure. Backend messages are kept verbatim.
#[derive(Debug, Error)]
pub(crate) enum AuthError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("{0}")]
    Backend(String),
    #[error("authentication service unreachable: {0}")]
    Unreachable(#[source] reqwest::Error),
    #[error("could not decode authentication response: {0}")]
    Decode(#[source] reqwest::Error),
    #[error("session storage error: {0}")]
    Storage(#[from] rusqlite::Error),
    #[error("corrupt stored session: {0}")]
    Corrupt(#[from] serde_json::Error),
}
