//! Categories group transactions, e.g. 'Food', 'Rent', 'Wages'.
//!
//! [CategoryStore] holds one page of the user's categories and keeps it in
//! sync with the API.

use std::{
    fmt::Display,
    str::FromStr,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use serde::{Deserialize, Serialize};

use crate::{
    Error,
    api::FinanceApi,
    http::HttpClient,
    notification::{Notification, Notifier},
    pagination::PageCursor,
    persistence::{CATEGORY_KEY, StateStorage, load_snapshot, remove_snapshot, save_snapshot},
    request_sequence::{LoadingCounter, LoadingGuard, RequestSequence},
    transaction::Transaction,
    user::AuthToken,
};

/// The server-assigned ID of a category.
pub type CategoryId = i64;

/// The name of a category.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, Hash)]
#[serde(transparent)]
pub struct CategoryName(String);

impl CategoryName {
    /// Create a category name, trimming surrounding whitespace.
    ///
    /// # Errors
    ///
    /// This function will return an [Error::EmptyCategoryName] if `name` is empty or only
    /// whitespace.
    pub fn new(name: &str) -> Result<Self, Error> {
        let name = name.trim();

        if name.is_empty() {
            Err(Error::EmptyCategoryName)
        } else {
            Ok(Self(name.to_string()))
        }
    }
}

impl AsRef<str> for CategoryName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl FromStr for CategoryName {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        CategoryName::new(s)
    }
}

impl Display for CategoryName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A category for expenses and income.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Hash)]
pub struct Category {
    /// The ID of the category.
    pub id: CategoryId,

    /// The name of the category.
    pub name: CategoryName,
}

/// The part of the category state that is saved between runs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
struct CategorySnapshot {
    categories: Vec<Category>,
    cursor: PageCursor,
}

#[derive(Debug, Default)]
struct CategoryState {
    snapshot: CategorySnapshot,
    error: Option<Error>,
}

/// Holds the user's categories and wraps the category endpoints.
///
/// Actions record their failure in [CategoryStore::error] and also return it,
/// so callers such as forms can branch on the outcome.
pub struct CategoryStore<C> {
    api: FinanceApi<C>,
    state: Mutex<CategoryState>,
    requests: RequestSequence,
    loading: LoadingCounter,
    notifier: Arc<dyn Notifier>,
    storage: Arc<dyn StateStorage>,
}

impl<C: HttpClient> CategoryStore<C> {
    /// Create a store, restoring any categories saved in `storage`.
    pub fn new(
        api: FinanceApi<C>,
        notifier: Arc<dyn Notifier>,
        storage: Arc<dyn StateStorage>,
    ) -> Self {
        let snapshot = load_snapshot(storage.as_ref(), CATEGORY_KEY).unwrap_or_default();

        Self {
            api,
            state: Mutex::new(CategoryState {
                snapshot,
                error: None,
            }),
            requests: RequestSequence::new(),
            loading: LoadingCounter::default(),
            notifier,
            storage,
        }
    }

    /// The categories currently held.
    pub fn categories(&self) -> Vec<Category> {
        self.state().snapshot.categories.clone()
    }

    /// The page of categories currently held.
    pub fn cursor(&self) -> PageCursor {
        self.state().snapshot.cursor
    }

    /// Whether a request is in flight.
    pub fn is_loading(&self) -> bool {
        self.loading.is_loading()
    }

    /// The error from the last action, cleared when the next action starts.
    pub fn error(&self) -> Option<Error> {
        self.state().error.clone()
    }

    /// Replace the held categories with page `page` from the API.
    ///
    /// On failure the previously held categories are kept. A response that
    /// arrives after a newer fetch was issued is discarded.
    pub async fn fetch_categories(&self, token: &AuthToken, page: u64) -> Result<(), Error> {
        let _loading = self.start_action();

        self.load_page(token, page)
            .await
            .inspect_err(|error| self.fail(error))
    }

    /// Replace the held categories with every category, walking the pages
    /// until the last one.
    ///
    /// The cursor afterwards describes a single page holding everything.
    pub async fn fetch_all_categories(&self, token: &AuthToken) -> Result<(), Error> {
        let _loading = self.start_action();
        let request = self.requests.issue();

        let mut categories = Vec::new();
        let mut page = 1;

        loop {
            let response = match self.api.list_categories(token, page).await {
                Ok(response) => response,
                Err(error) => {
                    if self.requests.is_latest(request) {
                        self.fail(&error);
                        return Err(error);
                    }

                    return Ok(());
                }
            };

            let is_last = page >= response.pages
                || response.current_page >= response.pages
                || response.data.is_empty();
            categories.extend(response.data);

            if is_last {
                break;
            }

            page += 1;
        }

        if !self.requests.is_latest(request) {
            tracing::debug!("Discarding stale list of all categories.");
            return Ok(());
        }

        let total_count = categories.len() as u64;
        self.commit(|snapshot| {
            snapshot.categories = categories;
            snapshot.cursor = PageCursor {
                current_page: 1,
                total_pages: 1,
                total_count: Some(total_count),
            };
        });

        Ok(())
    }

    /// Create a category called `name`.
    ///
    /// Empty or whitespace-only names are rejected without contacting the API.
    /// After the category is created the current page is fetched again so the
    /// list and the cursor match the server.
    pub async fn add_category(&self, token: &AuthToken, name: &str) -> Result<Category, Error> {
        let _loading = self.start_action();

        let result = async {
            let name = CategoryName::new(name)?;
            let category = self.api.create_category(token, &name).await?;
            self.refresh(token, self.cursor().current_page).await;

            Ok::<_, Error>(category)
        }
        .await;

        self.finish(result, "Category added successfully")
    }

    /// Rename the category `id`.
    ///
    /// The updated category replaces the held one in place. On failure the
    /// held category is left unchanged.
    pub async fn update_category(
        &self,
        token: &AuthToken,
        id: CategoryId,
        name: &str,
    ) -> Result<Category, Error> {
        let _loading = self.start_action();

        let result = async {
            let name = CategoryName::new(name)?;
            let updated = self.api.update_category(token, id, &name).await?;

            self.commit(|snapshot| {
                if let Some(category) = snapshot
                    .categories
                    .iter_mut()
                    .find(|category| category.id == id)
                {
                    *category = updated.clone();
                }
            });

            Ok::<_, Error>(updated)
        }
        .await;

        self.finish(result, "Category updated successfully")
    }

    /// Delete the category `id`.
    ///
    /// `transactions` are the transactions the client holds. If any of them
    /// uses the category, the delete fails with [Error::CategoryInUse] and no
    /// request is sent. The API enforces the same rule for transactions the
    /// client has not loaded.
    ///
    /// When the deleted category was the last one on a page other than the
    /// first, the previous page is loaded.
    pub async fn delete_category(
        &self,
        token: &AuthToken,
        id: CategoryId,
        transactions: &[Transaction],
    ) -> Result<(), Error> {
        let _loading = self.start_action();

        let result = async {
            if transactions
                .iter()
                .any(|transaction| transaction.category == id)
            {
                return Err(Error::CategoryInUse(id));
            }

            self.api.delete_category(token, id).await?;

            let mut remaining = 0;
            self.commit(|snapshot| {
                snapshot.categories.retain(|category| category.id != id);
                remaining = snapshot.categories.len();
            });

            let page = self.cursor().page_after_removal(remaining);
            self.refresh(token, page).await;

            Ok::<_, Error>(())
        }
        .await;

        self.finish(result, "Category deleted successfully")
    }

    /// Forget all held categories, e.g. after logging out.
    pub fn clear(&self) {
        self.requests.issue();
        *self.state() = CategoryState::default();
        remove_snapshot(self.storage.as_ref(), CATEGORY_KEY);
    }

    fn state(&self) -> MutexGuard<'_, CategoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn start_action(&self) -> LoadingGuard<'_> {
        self.state().error = None;
        self.loading.start()
    }

    async fn load_page(&self, token: &AuthToken, page: u64) -> Result<(), Error> {
        let request = self.requests.issue();
        let result = self.api.list_categories(token, page).await;

        if !self.requests.is_latest(request) {
            tracing::debug!("Discarding stale category page {page}.");
            return Ok(());
        }

        let response = result?;
        self.commit(|snapshot| {
            snapshot.cursor = response.cursor();
            snapshot.categories = response.data;
        });

        Ok(())
    }

    /// Reload `page` after a successful change. A failed reload leaves the
    /// locally patched state in place.
    async fn refresh(&self, token: &AuthToken, page: u64) {
        if let Err(error) = self.load_page(token, page).await {
            tracing::warn!("Could not reload category page {page}: {error}");
        }
    }

    /// Apply `change` and save the result. A committed change supersedes any
    /// fetch still in flight.
    fn commit(&self, change: impl FnOnce(&mut CategorySnapshot)) {
        self.requests.issue();

        let snapshot = {
            let mut state = self.state();
            change(&mut state.snapshot);
            state.snapshot.clone()
        };

        save_snapshot(self.storage.as_ref(), CATEGORY_KEY, &snapshot);
    }

    fn fail(&self, error: &Error) {
        tracing::warn!("Category action failed: {error}");
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
