//! Finance Tracker is a client for a personal finance web API.
//!
//! The library keeps client-side state for the signed in user, their
//! spending/income categories and their transactions. Each store wraps the
//! remote CRUD endpoints, keeps one page of data in memory, and derives the
//! financial summary and dashboard figures from it.
//!
//! [AppState] wires the stores together. The stores themselves never read each
//! other: operations that need another store's data take it as an argument.

#![warn(missing_docs)]

mod api;
mod app_state;
mod category;
mod config;
mod currency;
mod dashboard;
mod endpoints;
mod http;
mod logging;
mod notification;
mod pagination;
mod persistence;
mod request_sequence;
mod session;
mod summary;
mod transaction;
mod transaction_view;
mod user;

#[cfg(test)]
mod test_utils;

pub use api::{AuthResponse, FinanceApi, PageLinks, PageResponse};
pub use app_state::AppState;
pub use category::{Category, CategoryId, CategoryName, CategoryStore};
pub use config::{ClientConfig, DEFAULT_API_BASE_URL, DEFAULT_STATE_PATH};
pub use currency::currency;
pub use dashboard::{DashboardData, MonthlyTotals, RECENT_TRANSACTION_COUNT};
pub use http::{HttpClient, HttpMethod, HttpRequest, HttpResponse, ReqwestHttpClient};
pub use notification::{ChannelNotifier, Notification, NotificationKind, Notifier, TracingNotifier};
pub use pagination::{
    PageCursor, PaginationConfig, PaginationIndicator, create_pagination_indicators,
};
pub use persistence::{MemoryStateStorage, SQLiteStateStorage, StateStorage};
pub use session::SessionStore;
pub use summary::{FinancialSummary, SummarySource, summarize};
pub use transaction::{
    NewTransaction, Transaction, TransactionId, TransactionStore, TransactionType,
};
pub use transaction_view::{TransactionView, TypeFilter};
pub use user::{AuthToken, User, UserId};

/// The errors that may occur in the application.
#[derive(Debug, Clone, thiserror::Error, PartialEq)]
pub enum Error {
    /// An empty string was used to create a category name.
    #[error("Category name cannot be empty")]
    EmptyCategoryName,

    /// An empty string was used as a transaction description.
    #[error("Description cannot be empty")]
    EmptyDescription,

    /// A zero, negative or non-finite amount was used for a transaction.
    ///
    /// The direction of money is given by the transaction type, so amounts
    /// are always positive.
    #[error("{0} is not a valid amount, amounts must be greater than zero")]
    NonPositiveAmount(f64),

    /// The password and the password confirmation given to register did not
    /// match.
    #[error("Passwords do not match")]
    PasswordMismatch,

    /// A transaction referred to a category that is not in the held category
    /// set.
    #[error("Selected category {0} does not exist")]
    CategoryNotFound(CategoryId),

    /// Tried to delete a category that is used by at least one transaction.
    #[error("Category {0} is in use by one or more transactions")]
    CategoryInUse(CategoryId),

    /// An action that needs a session was called while logged out.
    #[error("You must be logged in to do that")]
    NotAuthenticated,

    /// The API responded with a non-2xx status code.
    ///
    /// `message` is the message provided by the server when the response body
    /// has one, otherwise a generic description of the status.
    #[error("API error {status}: {message}")]
    Api {
        /// The HTTP status code of the response.
        status: u16,
        /// The server-provided error message.
        message: String,
    },

    /// The request could not be sent or the response could not be read.
    #[error("network error: {0}")]
    Network(String),

    /// The response body could not be decoded into the expected type.
    #[error("invalid response from the API: {0}")]
    InvalidResponse(String),

    /// Reading or writing persisted client state failed.
    #[error("could not access saved state: {0}")]
    Storage(String),

    /// An error occurred while serializing a struct as JSON
    #[error("could not serialize as JSON: {0}")]
    JSONSerialization(String),
}

impl Error {
    /// Whether the error was raised by local validation, before any network
    /// call was made.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Error::EmptyCategoryName
                | Error::EmptyDescription
                | Error::NonPositiveAmount(_)
                | Error::PasswordMismatch
                | Error::CategoryNotFound(_)
        )
    }
}

impl From<rusqlite::Error> for Error {
    fn from(value: rusqlite::Error) -> Self {
        tracing::error!("an unhandled SQL error occurred: {}", value);
        Error::Storage(value.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(value: serde_json::Error) -> Self {
        Error::JSONSerialization(value.to_string())
    }
}
