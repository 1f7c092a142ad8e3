//! Implements a struct that holds the state of the client.

use std::sync::Arc;

use time::Date;

use crate::{
    Error,
    api::FinanceApi,
    category::{Category, CategoryId, CategoryStore},
    config::ClientConfig,
    dashboard::DashboardData,
    http::{HttpClient, ReqwestHttpClient},
    notification::Notifier,
    persistence::{SQLiteStateStorage, StateStorage},
    session::SessionStore,
    summary::FinancialSummary,
    transaction::{NewTransaction, Transaction, TransactionId, TransactionStore},
    user::{AuthToken, User},
};

/// The state of the client: the session, category and transaction stores.
///
/// The stores never read each other. [AppState] passes the token, the held
/// transactions or the held categories into the store operations that need
/// them.
pub struct AppState<C> {
    /// The settings the client was started with.
    pub config: ClientConfig,
    session: SessionStore<C>,
    categories: CategoryStore<C>,
    transactions: TransactionStore<C>,
}

impl AppState<ReqwestHttpClient> {
    /// Create the state for talking to the API at `config.api_base_url`,
    /// saving state to the SQLite database at `config.state_path`.
    ///
    /// # Errors
    /// Returns an error if the state database cannot be opened.
    pub fn open(config: ClientConfig, notifier: Arc<dyn Notifier>) -> Result<Self, Error> {
        let storage = SQLiteStateStorage::open(&config.state_path)?;
        let client = ReqwestHttpClient::new(&config.api_base_url);

        Ok(Self::new(config, client, notifier, Arc::new(storage)))
    }
}

impl<C: HttpClient> AppState<C> {
    /// Create the stores, restoring whatever was saved in `storage`.
    pub fn new(
        config: ClientConfig,
        client: C,
        notifier: Arc<dyn Notifier>,
        storage: Arc<dyn StateStorage>,
    ) -> Self {
        Self {
            config,
            session: SessionStore::new(
                FinanceApi::new(client.clone()),
                notifier.clone(),
                storage.clone(),
            ),
            categories: CategoryStore::new(
                FinanceApi::new(client.clone()),
                notifier.clone(),
                storage.clone(),
            ),
            transactions: TransactionStore::new(FinanceApi::new(client), notifier, storage),
        }
    }

    /// The session store.
    pub fn session(&self) -> &SessionStore<C> {
        &self.session
    }

    /// The category store.
    pub fn categories(&self) -> &CategoryStore<C> {
        &self.categories
    }

    /// The transaction store.
    pub fn transactions(&self) -> &TransactionStore<C> {
        &self.transactions
    }

    /// Log in, see [SessionStore::login].
    ///
    /// Signing in as a different user forgets the previous user's categories
    /// and transactions.
    pub async fn login(&self, username: &str, password: &str) -> Result<User, Error> {
        let previous_user = self.session.user();
        let user = self.session.login(username, password).await?;
        self.forget_other_user_data(previous_user, &user);

        Ok(user)
    }

    /// Create an account and log in, see [SessionStore::register].
    pub async fn register(
        &self,
        username: &str,
        email: &str,
        password: &str,
        confirm_password: &str,
    ) -> Result<User, Error> {
        let previous_user = self.session.user();
        let user = self
            .session
            .register(username, email, password, confirm_password)
            .await?;
        self.forget_other_user_data(previous_user, &user);

        Ok(user)
    }

    /// Log out and forget the user's categories and transactions.
    pub fn logout(&self) {
        self.session.logout();
        self.categories.clear();
        self.transactions.clear();
    }

    /// Load one page of categories.
    pub async fn fetch_categories(&self, page: u64) -> Result<(), Error> {
        let token = self.token()?;
        self.categories.fetch_categories(&token, page).await
    }

    /// Load every category.
    pub async fn fetch_all_categories(&self) -> Result<(), Error> {
        let token = self.token()?;
        self.categories.fetch_all_categories(&token).await
    }

    /// Create a category.
    pub async fn add_category(&self, name: &str) -> Result<Category, Error> {
        let token = self.token()?;
        self.categories.add_category(&token, name).await
    }

    /// Rename a category.
    pub async fn update_category(&self, id: CategoryId, name: &str) -> Result<Category, Error> {
        let token = self.token()?;
        self.categories.update_category(&token, id, name).await
    }

    /// Delete a category unless one of the held transactions uses it.
    pub async fn delete_category(&self, id: CategoryId) -> Result<(), Error> {
        let token = self.token()?;
        let transactions = self.transactions.transactions();

        self.categories
            .delete_category(&token, id, &transactions)
            .await
    }

    /// Load one page of transactions and the summary.
    pub async fn fetch_transactions(&self, page: u64) -> Result<(), Error> {
        let token = self.token()?;
        self.transactions.fetch_transactions(&token, page).await
    }

    /// Create a transaction in one of the held categories.
    pub async fn add_transaction(&self, transaction: &NewTransaction) -> Result<Transaction, Error> {
        let token = self.token()?;
        let categories = self.categories.categories();

        self.transactions
            .add_transaction(&token, transaction, &categories)
            .await
    }

    /// Update a transaction, keeping it in one of the held categories.
    pub async fn update_transaction(
        &self,
        id: TransactionId,
        transaction: &NewTransaction,
    ) -> Result<Transaction, Error> {
        let token = self.token()?;
        let categories = self.categories.categories();

        self.transactions
            .update_transaction(&token, id, transaction, &categories)
            .await
    }

    /// Delete a transaction.
    pub async fn delete_transaction(&self, id: TransactionId) -> Result<(), Error> {
        let token = self.token()?;
        self.transactions.delete_transaction(&token, id).await
    }

    /// Recompute the summary.
    pub async fn calculate_summary(&self) -> Result<FinancialSummary, Error> {
        let token = self.token()?;
        Ok(self.transactions.calculate_summary(&token).await)
    }

    /// The dashboard for the held transactions and categories.
    pub fn dashboard(&self, today: Date) -> DashboardData {
        DashboardData::new(
            self.transactions.summary(),
            &self.transactions.transactions(),
            &self.categories.categories(),
            today,
        )
    }

    fn forget_other_user_data(&self, previous_user: Option<User>, user: &User) {
        if previous_user.is_some_and(|previous_user| previous_user.id == user.id) {
            return;
        }

        tracing::debug!("Clearing held data for newly signed in user {}.", user.id);
        self.categories.clear();
        self.transactions.clear();
    }

    fn token(&self) -> Result<AuthToken, Error> {
        self.session.token().ok_or(Error::NotAuthenticated)
    }
}
