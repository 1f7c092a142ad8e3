//! Transactions are dated income or expense records with an amount and a
//! category.
//!
//! [TransactionStore] holds one page of the user's transactions together with
//! the financial summary, and keeps both in sync with the API.

use std::{
    fmt::Display,
    str::FromStr,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use serde::{Deserialize, Serialize};
use time::Date;

use crate::{
    Error,
    api::{FinanceApi, deserialize_decimal},
    category::{Category, CategoryId},
    http::HttpClient,
    notification::{Notification, Notifier},
    pagination::PageCursor,
    persistence::{
        StateStorage, TRANSACTION_KEY, load_snapshot, remove_snapshot, save_snapshot,
    },
    request_sequence::{LoadingCounter, LoadingGuard, RequestSequence},
    summary::{FinancialSummary, summarize},
    user::AuthToken,
};

/// The server-assigned ID of a transaction.
pub type TransactionId = i64;

time::serde::format_description!(iso_date, Date, "[year]-[month]-[day]");

/// Whether money came in or went out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionType {
    /// Money received, e.g. wages.
    Income,
    /// Money spent.
    Expense,
}

impl Display for TransactionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransactionType::Income => f.write_str("income"),
            TransactionType::Expense => f.write_str("expense"),
        }
    }
}

impl FromStr for TransactionType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "income" => Ok(TransactionType::Income),
            "expense" => Ok(TransactionType::Expense),
            other => Err(format!(
                "\"{other}\" is not a transaction type, expected \"income\" or \"expense\""
            )),
        }
    }
}

/// A transaction as stored by the API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    /// The ID of the transaction.
    pub id: TransactionId,
    /// The amount of money, always positive.
    #[serde(deserialize_with = "deserialize_decimal")]
    pub amount: f64,
    /// What the transaction was for.
    pub description: String,
    /// Whether the money came in or went out.
    pub transaction_type: TransactionType,
    /// The ID of the transaction's category.
    pub category: CategoryId,
    /// The category's name, filled in by the API.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category_name: Option<String>,
    /// When the transaction happened.
    #[serde(with = "iso_date")]
    pub date: Date,
}

/// The fields for creating or updating a transaction.
///
/// Construction validates everything that can be checked without other
/// state. Whether the category exists is checked by the [TransactionStore].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewTransaction {
    amount: f64,
    description: String,
    transaction_type: TransactionType,
    category: CategoryId,
    #[serde(with = "iso_date")]
    date: Date,
}

impl NewTransaction {
    /// Create the fields for a transaction.
    ///
    /// # Errors
    /// Returns [Error::NonPositiveAmount] if `amount` is not a finite number
    /// greater than zero, or [Error::EmptyDescription] if `description` is
    /// empty or only whitespace.
    pub fn new(
        amount: f64,
        description: &str,
        transaction_type: TransactionType,
        category: CategoryId,
        date: Date,
    ) -> Result<Self, Error> {
        if !amount.is_finite() || amount <= 0.0 {
            return Err(Error::NonPositiveAmount(amount));
        }

        let description = description.trim();
        if description.is_empty() {
            return Err(Error::EmptyDescription);
        }

        Ok(Self {
            amount,
            description: description.to_owned(),
            transaction_type,
            category,
            date,
        })
    }

    /// The amount of money.
    pub fn amount(&self) -> f64 {
        self.amount
    }

    /// What the transaction is for.
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Whether the money comes in or goes out.
    pub fn transaction_type(&self) -> TransactionType {
        self.transaction_type
    }

    /// The category the transaction belongs to.
    pub fn category(&self) -> CategoryId {
        self.category
    }

    /// When the transaction happened.
    pub fn date(&self) -> Date {
        self.date
    }
}

/// The part of the transaction state that is saved between runs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
struct TransactionSnapshot {
    transactions: Vec<Transaction>,
    cursor: PageCursor,
    summary: FinancialSummary,
}

#[derive(Debug, Default)]
struct TransactionState {
    snapshot: TransactionSnapshot,
    error: Option<Error>,
}

/// Holds a page of the user's transactions and their summary.
///
/// Every change re-fetches the current page and the summary from the API, so
/// the client never shows totals for a transaction set that differs from the
/// server's.
pub struct TransactionStore<C> {
    api: FinanceApi<C>,
    state: Mutex<TransactionState>,
    page_requests: RequestSequence,
    summary_requests: RequestSequence,
    loading: LoadingCounter,
    notifier: Arc<dyn Notifier>,
    storage: Arc<dyn StateStorage>,
}

impl<C: HttpClient> TransactionStore<C> {
    /// Create a store, restoring any transactions saved in `storage`.
    pub fn new(
        api: FinanceApi<C>,
        notifier: Arc<dyn Notifier>,
        storage: Arc<dyn StateStorage>,
    ) -> Self {
        let snapshot = load_snapshot(storage.as_ref(), TRANSACTION_KEY).unwrap_or_default();

        Self {
            api,
            state: Mutex::new(TransactionState {
                snapshot,
                error: None,
            }),
            page_requests: RequestSequence::new(),
            summary_requests: RequestSequence::new(),
            loading: LoadingCounter::default(),
            notifier,
            storage,
        }
    }

    /// The transactions currently held.
    pub fn transactions(&self) -> Vec<Transaction> {
        self.state().snapshot.transactions.clone()
    }

    /// The page of transactions currently held.
    pub fn cursor(&self) -> PageCursor {
        self.state().snapshot.cursor
    }

    /// The latest summary.
    pub fn summary(&self) -> FinancialSummary {
        self.state().snapshot.summary
    }

    /// Whether a request is in flight.
    pub fn is_loading(&self) -> bool {
        self.loading.is_loading()
    }

    /// The error from the last action, cleared when the next action starts.
    pub fn error(&self) -> Option<Error> {
        self.state().error.clone()
    }

    /// Replace the held transactions with page `page` from the API, then
    /// recompute the summary.
    ///
    /// On failure the previously held transactions are kept. A response that
    /// arrives after a newer fetch was issued is discarded.
    pub async fn fetch_transactions(&self, token: &AuthToken, page: u64) -> Result<(), Error> {
        let _loading = self.start_action();

        let result = self.load_page(token, page).await;

        match result {
            Ok(()) => {
                self.calculate_summary(token).await;
                Ok(())
            }
            Err(error) => {
                self.fail(&error);
                Err(error)
            }
        }
    }

    /// Recompute the summary and return it.
    ///
    /// The API's aggregate over all transactions is used. If it cannot be
    /// fetched, the held page is reduced locally instead and the summary is
    /// labelled [crate::SummarySource::LocalPage].
    pub async fn calculate_summary(&self, token: &AuthToken) -> FinancialSummary {
        let _loading = self.loading.start();
        let request = self.summary_requests.issue();

        let summary = match self.api.transaction_summary(token).await {
            Ok(summary) => summary,
            Err(error) => {
                tracing::warn!(
                    "Could not fetch the transaction summary, using the loaded page: {error}"
                );
                summarize(&self.state().snapshot.transactions)
            }
        };

        if !self.summary_requests.is_latest(request) {
            tracing::debug!("Discarding stale transaction summary.");
            return self.summary();
        }

        self.commit(|snapshot| snapshot.summary = summary);

        summary
    }

    /// Create a transaction.
    ///
    /// `categories` are the categories the client holds. If `transaction`
    /// refers to a category not among them, the call fails with
    /// [Error::CategoryNotFound] and no request is sent. On success the
    /// current page and the summary are fetched again.
    pub async fn add_transaction(
        &self,
        token: &AuthToken,
        transaction: &NewTransaction,
        categories: &[Category],
    ) -> Result<Transaction, Error> {
        let _loading = self.start_action();

        let result = async {
            check_category_exists(transaction.category, categories)?;
            let created = self.api.create_transaction(token, transaction).await?;

            self.refresh(token, self.cursor().current_page).await;
            self.calculate_summary(token).await;

            Ok::<_, Error>(created)
        }
        .await;

        self.finish(result, "Transaction added successfully")
    }

    /// Update the transaction `id`.
    ///
    /// Uses the same category check as [TransactionStore::add_transaction].
    /// The updated transaction replaces the held one, then the summary and the
    /// current page are fetched again.
    pub async fn update_transaction(
        &self,
        token: &AuthToken,
        id: TransactionId,
        transaction: &NewTransaction,
        categories: &[Category],
    ) -> Result<Transaction, Error> {
        let _loading = self.start_action();

        let result = async {
            check_category_exists(transaction.category, categories)?;
            let updated = self.api.update_transaction(token, id, transaction).await?;

            // A page fetched before the update would undo it.
            self.page_requests.issue();
            self.commit(|snapshot| {
                if let Some(held) = snapshot
                    .transactions
                    .iter_mut()
                    .find(|held| held.id == id)
                {
                    *held = updated.clone();
                }
            });
            self.calculate_summary(token).await;
            self.refresh(token, self.cursor().current_page).await;

            Ok::<_, Error>(updated)
        }
        .await;

        self.finish(result, "Transaction updated successfully")
    }

    /// Delete the transaction `id`.
    ///
    /// When the deleted transaction was the last one on a page other than the
    /// first, the previous page is loaded.
    pub async fn delete_transaction(
        &self,
        token: &AuthToken,
        id: TransactionId,
    ) -> Result<(), Error> {
        let _loading = self.start_action();

        let result = async {
            self.api.delete_transaction(token, id).await?;

            let mut remaining = 0;
            self.page_requests.issue();
            self.commit(|snapshot| {
                snapshot.transactions.retain(|held| held.id != id);
                remaining = snapshot.transactions.len();
            });
            self.calculate_summary(token).await;

            let page = self.cursor().page_after_removal(remaining);
            self.refresh(token, page).await;

            Ok::<_, Error>(())
        }
        .await;

        self.finish(result, "Transaction deleted successfully")
    }

    /// Forget all held transactions, e.g. after logging out.
    pub fn clear(&self) {
        self.page_requests.issue();
        self.summary_requests.issue();
        *self.state() = TransactionState::default();
        remove_snapshot(self.storage.as_ref(), TRANSACTION_KEY);
    }

    fn state(&self) -> MutexGuard<'_, TransactionState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn start_action(&self) -> LoadingGuard<'_> {
        self.state().error = None;
        self.loading.start()
    }

    async fn load_page(&self, token: &AuthToken, page: u64) -> Result<(), Error> {
        let request = self.page_requests.issue();
        let result = self.api.list_transactions(token, page).await;

        if !self.page_requests.is_latest(request) {
            tracing::debug!("Discarding stale transaction page {page}.");
            return Ok(());
        }

        let response = result?;
        self.commit(|snapshot| {
            snapshot.cursor = response.cursor();
            snapshot.transactions = response.data;
        });

        Ok(())
    }

    /// Reload `page` after a successful change. A failed reload leaves the
    /// locally patched state in place.
    async fn refresh(&self, token: &AuthToken, page: u64) {
        if let Err(error) = self.load_page(token, page).await {
            tracing::warn!("Could not reload transaction page {page}: {error}");
        }
    }

    /// Apply `change` and save the result.
    fn commit(&self, change: impl FnOnce(&mut TransactionSnapshot)) {
        let snapshot = {
            let mut state = self.state();
            change(&mut state.snapshot);
            state.snapshot.clone()
        };

        save_snapshot(self.storage.as_ref(), TRANSACTION_KEY, &snapshot);
    }

    fn fail(&self, error: &Error) {
        tracing::warn!("Transaction action failed: {error}");
        self.state().error = Some(error.clone());
        self.notifier.notify(Notification::error(error.to_string()));
    }

    fn finish<T>(&self, result: Result<T, Error>, success_message: &str) -> Result<T, Error> {
        match &result {
            Ok(_) => self.notifier.notify(Notification::success(success_message)),
            Err(error) => self.fail(error),
        }

        result
    }
}

fn check_category_exists(category: CategoryId, categories: &[Category]) -> Result<(), Error> {
    if categories.iter().any(|held| held.id == category) {
        Ok(())
    } else {
        Err(Error::CategoryNotFound(category))
    }
}
