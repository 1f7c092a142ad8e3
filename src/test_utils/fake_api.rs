//! An in-memory stand-in for the finance API.

use std::{
    sync::{Arc, Mutex, MutexGuard},
    time::Duration,
};

use async_trait::async_trait;
use serde_json::{Value, json};
use time::macros::date;

use crate::{
    Error,
    category::{Category, CategoryId, CategoryName},
    http::{HttpClient, HttpMethod, HttpRequest, HttpResponse},
    transaction::{Transaction, TransactionId, TransactionType},
    user::{AuthToken, User, UserId},
};

/// The page size the fake serves lists with.
pub const FAKE_PAGE_SIZE: usize = 10;

struct Account {
    user: User,
    password: String,
}

struct InjectedFailure {
    method: HttpMethod,
    path_prefix: String,
    status: u16,
}

struct PageDelay {
    path_prefix: String,
    page: u64,
    delay: Duration,
}

#[derive(Default)]
struct FakeServer {
    accounts: Vec<Account>,
    categories: Vec<Category>,
    transactions: Vec<Transaction>,
    next_user_id: i64,
    next_category_id: CategoryId,
    next_transaction_id: TransactionId,
    calls: Vec<HttpRequest>,
    failures: Vec<InjectedFailure>,
    delays: Vec<PageDelay>,
}

/// Behaves like the finance API: token auth, pages of [FAKE_PAGE_SIZE],
/// server-side checks, decimal amounts sent as strings and 204 for deletes.
///
/// All accounts share one set of categories and transactions. Every request
/// is recorded, and failures or delays can be injected per path.
#[derive(Clone, Default)]
pub struct FakeFinanceApi {
    server: Arc<Mutex<FakeServer>>,
}

impl FakeFinanceApi {
    pub fn new() -> Self {
        Self::default()
    }

    fn server(&self) -> MutexGuard<'_, FakeServer> {
        self.server.lock().unwrap()
    }

    /// Create an account without going through the API.
    pub fn insert_user(&self, username: &str, email: &str, password: &str) -> (User, AuthToken) {
        let mut server = self.server();
        let user = server.create_account(username, email, password);
        let token = token_for(&user);

        (user, token)
    }

    /// The token the API hands out to `username`.
    pub fn token_for(&self, username: &str) -> Option<AuthToken> {
        self.server()
            .accounts
            .iter()
            .find(|account| account.user.username == username)
            .map(|account| token_for(&account.user))
    }

    /// Create a category without going through the API.
    pub fn insert_category(&self, name: &str) -> Category {
        self.server().create_category(CategoryName::new(name).unwrap())
    }

    /// Create an expense dated 2025-01-03 without going through the API.
    pub fn insert_transaction(
        &self,
        description: &str,
        amount: f64,
        category: CategoryId,
    ) -> Transaction {
        self.insert_dated_transaction(
            description,
            amount,
            TransactionType::Expense,
            category,
            date!(2025 - 01 - 03),
        )
    }

    pub fn insert_dated_transaction(
        &self,
        description: &str,
        amount: f64,
        transaction_type: TransactionType,
        category: CategoryId,
        date: time::Date,
    ) -> Transaction {
        let mut server = self.server();
        server.next_transaction_id += 1;
        let transaction = Transaction {
            id: server.next_transaction_id,
            amount,
            description: description.to_owned(),
            transaction_type,
            category,
            category_name: None,
            date,
        };
        server.transactions.push(transaction.clone());

        server.with_category_name(&transaction)
    }

    /// Every category on the server.
    pub fn categories(&self) -> Vec<Category> {
        self.server().categories.clone()
    }

    /// Every transaction on the server, as the API would return them.
    pub fn transactions(&self) -> Vec<Transaction> {
        let server = self.server();

        server
            .transactions
            .iter()
            .map(|transaction| server.with_category_name(transaction))
            .collect()
    }

    /// Every request received so far.
    pub fn calls(&self) -> Vec<HttpRequest> {
        self.server().calls.clone()
    }

    /// The requests with `method` whose path starts with `path_prefix`.
    pub fn calls_matching(&self, method: HttpMethod, path_prefix: &str) -> Vec<HttpRequest> {
        self.server()
            .calls
            .iter()
            .filter(|call| call.method == method && call.path.starts_with(path_prefix))
            .cloned()
            .collect()
    }

    /// Answer every later request with `method` whose path starts with
    /// `path_prefix` with an error `status`.
    pub fn fail_requests(&self, method: HttpMethod, path_prefix: &str, status: u16) {
        self.server().failures.push(InjectedFailure {
            method,
            path_prefix: path_prefix.to_owned(),
            status,
        });
    }

    /// Hold back the response to GET requests for `page` of the list at
    /// `path_prefix` by `delay`.
    pub fn delay_page(&self, path_prefix: &str, page: u64, delay: Duration) {
        self.server().delays.push(PageDelay {
            path_prefix: path_prefix.to_owned(),
            page,
            delay,
        });
    }
}

#[async_trait]
impl HttpClient for FakeFinanceApi {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, Error> {
        let (path, page) = split_page(&request.path);

        let delay = {
            let mut server = self.server();
            server.calls.push(request.clone());

            if let Some(failure) = server.failures.iter().find(|failure| {
                failure.method == request.method && request.path.starts_with(&failure.path_prefix)
            }) {
                return Ok(respond(
                    failure.status,
                    json!({ "detail": format!("Injected failure {}", failure.status) }),
                ));
            }

            server
                .delays
                .iter()
                .find(|delay| {
                    request.method == HttpMethod::Get
                        && path.starts_with(&delay.path_prefix)
                        && page == Some(delay.page)
                })
                .map(|delay| delay.delay)
        };

        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let mut server = self.server();

        if path.starts_with("/finance/") && server.authenticate(request.token.as_ref()).is_none() {
            return Ok(respond(
                401,
                json!({ "detail": "Authentication credentials were not provided." }),
            ));
        }

        let body = request.body.unwrap_or(Value::Null);
        let segments: Vec<&str> = path.split('/').filter(|part| !part.is_empty()).collect();

        let response = match (request.method, segments.as_slice()) {
            (HttpMethod::Post, ["authentication", "login"]) => server.log_in(&body),
            (HttpMethod::Post, ["authentication", "register"]) => server.register(&body),
            (HttpMethod::Get, ["finance", "categories"]) => {
                server.list(&server.categories, page.unwrap_or(1), path, |category| {
                    json!(category)
                })
            }
            (HttpMethod::Post, ["finance", "categories"]) => server.post_category(&body),
            (HttpMethod::Put, ["finance", "categories", id]) => server.put_category(id, &body),
            (HttpMethod::Delete, ["finance", "categories", id]) => server.delete_category(id),
            (HttpMethod::Get, ["finance", "transactions", "summary"]) => server.summary(),
            (HttpMethod::Get, ["finance", "transactions"]) => {
                server.list(&server.transactions, page.unwrap_or(1), path, |transaction| {
                    server.transaction_json(transaction)
                })
            }
            (HttpMethod::Post, ["finance", "transactions"]) => server.post_transaction(body),
            (HttpMethod::Put, ["finance", "transactions", id]) => {
                server.put_transaction(id, body)
            }
            (HttpMethod::Delete, ["finance", "transactions", id]) => {
                server.delete_transaction(id)
            }
            _ => respond(404, json!({ "detail": "Not found." })),
        };

        Ok(response)
    }
}

impl FakeServer {
    fn create_account(&mut self, username: &str, email: &str, password: &str) -> User {
        self.next_user_id += 1;
        let user = User {
            id: UserId::new(self.next_user_id),
            username: username.to_owned(),
            email: email.to_owned(),
        };
        self.accounts.push(Account {
            user: user.clone(),
            password: password.to_owned(),
        });

        user
    }

    fn create_category(&mut self, name: CategoryName) -> Category {
        self.next_category_id += 1;
        let category = Category {
            id: self.next_category_id,
            name,
        };
        self.categories.push(category.clone());

        category
    }

    fn authenticate(&self, token: Option<&AuthToken>) -> Option<&User> {
        let token = token?;

        self.accounts
            .iter()
            .map(|account| &account.user)
            .find(|user| token_for(user) == *token)
    }

    fn log_in(&self, body: &Value) -> HttpResponse {
        let username = body["username"].as_str().unwrap_or_default();
        let password = body["password"].as_str().unwrap_or_default();

        match self
            .accounts
            .iter()
            .find(|account| account.user.username == username && account.password == password)
        {
            Some(account) => auth_response(200, &account.user),
            None => respond(
                400,
                json!({ "non_field_errors": ["Unable to log in with provided credentials."] }),
            ),
        }
    }

    fn register(&mut self, body: &Value) -> HttpResponse {
        let field = |name: &str| body[name].as_str().unwrap_or_default().to_owned();
        let (username, email, password, password2) = (
            field("username"),
            field("email"),
            field("password"),
            field("password2"),
        );

        if password != password2 {
            return respond(
                400,
                json!({ "password": ["Password fields didn't match."] }),
            );
        }

        if self
            .accounts
            .iter()
            .any(|account| account.user.username == username)
        {
            return respond(
                400,
                json!({ "username": ["A user with that username already exists."] }),
            );
        }

        let user = self.create_account(&username, &email, &password);

        auth_response(201, &user)
    }

    fn list<T>(&self, items: &[T], page: u64, path: &str, to_json: impl Fn(&T) -> Value) -> HttpResponse {
        let pages = items.len().div_ceil(FAKE_PAGE_SIZE).max(1) as u64;

        if page == 0 || page > pages {
            return respond(404, json!({ "detail": "Invalid page." }));
        }

        let start = (page as usize - 1) * FAKE_PAGE_SIZE;
        let data: Vec<Value> = items
            .iter()
            .skip(start)
            .take(FAKE_PAGE_SIZE)
            .map(to_json)
            .collect();
        let link = |page: u64| format!("http://testserver/api{path}?page={page}");

        respond(
            200,
            json!({
                "data": data,
                "count": items.len(),
                "pages": pages,
                "current_page": page,
                "links": {
                    "next": (page < pages).then(|| link(page + 1)),
                    "previous": (page > 1).then(|| link(page - 1)),
                },
            }),
        )
    }

    fn post_category(&mut self, body: &Value) -> HttpResponse {
        match CategoryName::new(body["name"].as_str().unwrap_or_default()) {
            Ok(name) => respond(201, json!(self.create_category(name))),
            Err(_) => respond(400, json!({ "name": ["This field may not be blank."] })),
        }
    }

    fn put_category(&mut self, id: &str, body: &Value) -> HttpResponse {
        let Ok(name) = CategoryName::new(body["name"].as_str().unwrap_or_default()) else {
            return respond(400, json!({ "name": ["This field may not be blank."] }));
        };

        match self
            .categories
            .iter_mut()
            .find(|category| Some(category.id) == parse_id(id))
        {
            Some(category) => {
                category.name = name;
                respond(200, json!(category))
            }
            None => not_found(),
        }
    }

    fn delete_category(&mut self, id: &str) -> HttpResponse {
        let Some(id) = parse_id(id).filter(|&id| self.find_category(id).is_some()) else {
            return not_found();
        };

        if self
            .transactions
            .iter()
            .any(|transaction| transaction.category == id)
        {
            return respond(
                400,
                json!({ "detail": "Cannot delete a category that has transactions." }),
            );
        }

        self.categories.retain(|category| category.id != id);

        no_content()
    }

    fn find_category(&self, id: CategoryId) -> Option<&Category> {
        self.categories.iter().find(|category| category.id == id)
    }

    fn with_category_name(&self, transaction: &Transaction) -> Transaction {
        Transaction {
            category_name: self
                .find_category(transaction.category)
                .map(|category| category.name.to_string()),
            ..transaction.clone()
        }
    }

    fn transaction_json(&self, transaction: &Transaction) -> Value {
        let mut value = json!(self.with_category_name(transaction));
        value["amount"] = json!(format!("{:.2}", transaction.amount));

        value
    }

    /// Decode a transaction body the way the API validates it.
    fn parse_transaction(
        &self,
        mut body: Value,
        id: TransactionId,
    ) -> Result<Transaction, HttpResponse> {
        body["id"] = json!(id);

        let transaction: Transaction = serde_json::from_value(body)
            .map_err(|error| respond(400, json!({ "detail": error.to_string() })))?;

        if transaction.amount <= 0.0 {
            return Err(respond(
                400,
                json!({ "amount": ["Ensure this value is greater than 0."] }),
            ));
        }

        if self.find_category(transaction.category).is_none() {
            return Err(respond(
                400,
                json!({ "category": [format!(
                    "Invalid pk \"{}\" - object does not exist.",
                    transaction.category
                )] }),
            ));
        }

        Ok(transaction)
    }

    fn post_transaction(&mut self, body: Value) -> HttpResponse {
        let transaction = match self.parse_transaction(body, self.next_transaction_id + 1) {
            Ok(transaction) => transaction,
            Err(response) => return response,
        };

        self.next_transaction_id += 1;
        let response = respond(201, self.transaction_json(&transaction));
        self.transactions.push(transaction);

        response
    }

    fn put_transaction(&mut self, id: &str, body: Value) -> HttpResponse {
        let Some(index) = parse_id(id).and_then(|id| {
            self.transactions
                .iter()
                .position(|transaction| transaction.id == id)
        }) else {
            return not_found();
        };

        let id = self.transactions[index].id;
        let transaction = match self.parse_transaction(body, id) {
            Ok(transaction) => transaction,
            Err(response) => return response,
        };

        let response = respond(200, self.transaction_json(&transaction));
        self.transactions[index] = transaction;

        response
    }

    fn delete_transaction(&mut self, id: &str) -> HttpResponse {
        let count = self.transactions.len();
        self.transactions
            .retain(|transaction| Some(transaction.id) != parse_id(id));

        if self.transactions.len() == count {
            not_found()
        } else {
            no_content()
        }
    }

    fn summary(&self) -> HttpResponse {
        let total = |transaction_type: TransactionType| -> f64 {
            self.transactions
                .iter()
                .filter(|transaction| transaction.transaction_type == transaction_type)
                .map(|transaction| transaction.amount)
                .sum()
        };
        let income = total(TransactionType::Income);
        let expense = total(TransactionType::Expense);

        respond(
            200,
            json!({
                "total_income": format!("{income:.2}"),
                "total_expense": format!("{expense:.2}"),
                "net_balance": format!("{:.2}", income - expense),
            }),
        )
    }
}

fn token_for(user: &User) -> AuthToken {
    AuthToken::new(format!("token-{}", user.id))
}

fn split_page(path: &str) -> (&str, Option<u64>) {
    match path.split_once('?') {
        Some((path, query)) => {
            let page = query
                .split('&')
                .find_map(|pair| pair.strip_prefix("page="))
                .and_then(|page| page.parse().ok());

            (path, page)
        }
        None => (path, None),
    }
}

fn parse_id(id: &str) -> Option<i64> {
    id.parse().ok()
}

fn respond(status: u16, body: Value) -> HttpResponse {
    HttpResponse {
        status,
        body: body.to_string(),
    }
}

fn auth_response(status: u16, user: &User) -> HttpResponse {
    respond(
        status,
        json!({ "token": token_for(user).as_str(), "user": user }),
    )
}

fn not_found() -> HttpResponse {
    respond(404, json!({ "detail": "Not found." }))
}

fn no_content() -> HttpResponse {
    HttpResponse {
        status: 204,
        body: String::new(),
    }
}
