//! Typed access to the finance API.
//!
//! [FinanceApi] turns each endpoint into an async method, encodes request
//! bodies, decodes responses and converts non-2xx responses into
//! [Error::Api] carrying the server's own error message where it sent one.

use serde::{Deserialize, Deserializer, Serialize, de::DeserializeOwned};
use serde_json::{Value, json};

use crate::{
    Error,
    category::{Category, CategoryId, CategoryName},
    endpoints::{self, format_endpoint, paged},
    http::{HttpClient, HttpMethod, HttpRequest, HttpResponse},
    logging::redact_body_text,
    pagination::PageCursor,
    summary::{FinancialSummary, SummarySource},
    transaction::{NewTransaction, Transaction, TransactionId},
    user::{AuthToken, User},
};

/// One page of a list endpoint.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct PageResponse<T> {
    /// The items on this page.
    pub data: Vec<T>,
    /// The number of items across all pages, if the endpoint reports it.
    #[serde(default)]
    pub count: Option<u64>,
    /// The number of pages.
    pub pages: u64,
    /// The 1-based number of this page.
    pub current_page: u64,
    /// Links to the neighbouring pages, if the endpoint reports them.
    #[serde(default)]
    pub links: Option<PageLinks>,
}

impl<T> PageResponse<T> {
    /// The cursor describing this page.
    pub fn cursor(&self) -> PageCursor {
        PageCursor {
            current_page: self.current_page,
            total_pages: self.pages,
            total_count: self.count,
        }
    }
}

/// Links to the pages either side of a [PageResponse].
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct PageLinks {
    /// The URL of the next page, if there is one.
    pub next: Option<String>,
    /// The URL of the previous page, if there is one.
    pub previous: Option<String>,
}

/// The body of a successful log in or registration.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct AuthResponse {
    /// The new session token.
    pub token: AuthToken,
    /// The user the token belongs to.
    pub user: User,
}

#[derive(Deserialize)]
struct SummaryResponse {
    #[serde(deserialize_with = "deserialize_decimal")]
    total_income: f64,
    #[serde(deserialize_with = "deserialize_decimal")]
    total_expense: f64,
    #[serde(default, deserialize_with = "deserialize_optional_decimal")]
    net_balance: Option<f64>,
}

/// The finance API, reached through the HTTP client `C`.
#[derive(Debug, Clone)]
pub struct FinanceApi<C> {
    client: C,
}

impl<C: HttpClient> FinanceApi<C> {
    /// Wrap `client`.
    pub fn new(client: C) -> Self {
        Self { client }
    }

    /// Exchange a username and password for a session.
    pub async fn log_in(&self, username: &str, password: &str) -> Result<AuthResponse, Error> {
        let request = HttpRequest::new(HttpMethod::Post, endpoints::LOG_IN)
            .with_body(json!({ "username": username, "password": password }));

        decode(self.client.send(request).await?)
    }

    /// Create an account and a session for it.
    pub async fn register(
        &self,
        username: &str,
        email: &str,
        password: &str,
        password2: &str,
    ) -> Result<AuthResponse, Error> {
        let request = HttpRequest::new(HttpMethod::Post, endpoints::REGISTER).with_body(json!({
            "username": username,
            "email": email,
            "password": password,
            "password2": password2,
        }));

        decode(self.client.send(request).await?)
    }

    /// Get one page of categories.
    pub async fn list_categories(
        &self,
        token: &AuthToken,
        page: u64,
    ) -> Result<PageResponse<Category>, Error> {
        let request = HttpRequest::new(HttpMethod::Get, paged(endpoints::CATEGORIES, page))
            .with_token(token);

        decode(self.client.send(request).await?)
    }

    /// Create a category.
    pub async fn create_category(
        &self,
        token: &AuthToken,
        name: &CategoryName,
    ) -> Result<Category, Error> {
        let request = HttpRequest::new(HttpMethod::Post, endpoints::CATEGORIES)
            .with_body(json!({ "name": name.as_ref() }))
            .with_token(token);

        decode(self.client.send(request).await?)
    }

    /// Rename a category.
    pub async fn update_category(
        &self,
        token: &AuthToken,
        id: CategoryId,
        name: &CategoryName,
    ) -> Result<Category, Error> {
        let request = HttpRequest::new(HttpMethod::Put, format_endpoint(endpoints::CATEGORY, id))
            .with_body(json!({ "name": name.as_ref() }))
            .with_token(token);

        decode(self.client.send(request).await?)
    }

    /// Delete a category.
    pub async fn delete_category(&self, token: &AuthToken, id: CategoryId) -> Result<(), Error> {
        let request =
            HttpRequest::new(HttpMethod::Delete, format_endpoint(endpoints::CATEGORY, id))
                .with_token(token);

        expect_success(self.client.send(request).await?)
    }

    /// Get one page of transactions.
    pub async fn list_transactions(
        &self,
        token: &AuthToken,
        page: u64,
    ) -> Result<PageResponse<Transaction>, Error> {
        let request = HttpRequest::new(HttpMethod::Get, paged(endpoints::TRANSACTIONS, page))
            .with_token(token);

        decode(self.client.send(request).await?)
    }

    /// Create a transaction.
    pub async fn create_transaction(
        &self,
        token: &AuthToken,
        transaction: &NewTransaction,
    ) -> Result<Transaction, Error> {
        let request = HttpRequest::new(HttpMethod::Post, endpoints::TRANSACTIONS)
            .with_body(serde_json::to_value(transaction)?)
            .with_token(token);

        decode(self.client.send(request).await?)
    }

    /// Replace the fields of a transaction.
    pub async fn update_transaction(
        &self,
        token: &AuthToken,
        id: TransactionId,
        transaction: &NewTransaction,
    ) -> Result<Transaction, Error> {
        let request =
            HttpRequest::new(HttpMethod::Put, format_endpoint(endpoints::TRANSACTION, id))
                .with_body(serde_json::to_value(transaction)?)
                .with_token(token);

        decode(self.client.send(request).await?)
    }

    /// Delete a transaction.
    pub async fn delete_transaction(
        &self,
        token: &AuthToken,
        id: TransactionId,
    ) -> Result<(), Error> {
        let request =
            HttpRequest::new(HttpMethod::Delete, format_endpoint(endpoints::TRANSACTION, id))
                .with_token(token);

        expect_success(self.client.send(request).await?)
    }

    /// Get the totals over all of the user's transactions.
    pub async fn transaction_summary(&self, token: &AuthToken) -> Result<FinancialSummary, Error> {
        let request =
            HttpRequest::new(HttpMethod::Get, endpoints::TRANSACTION_SUMMARY).with_token(token);

        let response: SummaryResponse = decode(self.client.send(request).await?)?;
        let summary = FinancialSummary::new(
            response.total_income,
            response.total_expense,
            SummarySource::Remote,
        );

        if let Some(net_balance) = response.net_balance
            && (net_balance - summary.net_balance).abs() > 0.005
        {
            tracing::warn!(
                "API net balance {net_balance} does not match income minus expense {}, using the latter.",
                summary.net_balance
            );
        }

        Ok(summary)
    }
}

fn decode<T: DeserializeOwned>(response: HttpResponse) -> Result<T, Error> {
    expect_success_ref(&response)?;

    serde_json::from_str(&response.body).map_err(|error| {
        tracing::error!(
            "Could not decode response body {:?}: {error}",
            redact_body_text(&response.body)
        );
        Error::InvalidResponse(error.to_string())
    })
}

fn expect_success(response: HttpResponse) -> Result<(), Error> {
    expect_success_ref(&response)
}

fn expect_success_ref(response: &HttpResponse) -> Result<(), Error> {
    if response.is_success() {
        Ok(())
    } else {
        Err(Error::Api {
            status: response.status,
            message: error_message(response),
        })
    }
}

/// Pull the human readable message out of an error response.
///
/// Understands `{"detail": ...}`, `{"message": ...}`, `{"error": ...}` and
/// field error lists such as `{"name": ["This field may not be blank."]}`.
fn error_message(response: &HttpResponse) -> String {
    let fallback = || format!("request failed with status {}", response.status);

    let Ok(Value::Object(fields)) = serde_json::from_str::<Value>(&response.body) else {
        return fallback();
    };

    for key in ["detail", "message", "error"] {
        if let Some(Value::String(message)) = fields.get(key) {
            return message.clone();
        }
    }

    let first_error = |errors: &Value| match errors {
        Value::Array(errors) => errors.first().and_then(Value::as_str).map(str::to_owned),
        Value::String(error) => Some(error.clone()),
        _ => None,
    };

    if let Some(message) = fields.get("non_field_errors").and_then(first_error) {
        return message;
    }

    fields
        .iter()
        .find_map(|(field, errors)| first_error(errors).map(|error| format!("{field}: {error}")))
        .unwrap_or_else(fallback)
}

/// Decimal fields may arrive as JSON numbers or as strings such as "100.00".
#[derive(Deserialize)]
#[serde(untagged)]
enum Decimal {
    Number(f64),
    Text(String),
}

impl Decimal {
    fn into_f64<E: serde::de::Error>(self) -> Result<f64, E> {
        match self {
            Decimal::Number(number) => Ok(number),
            Decimal::Text(text) => text
                .trim()
                .parse()
                .map_err(|_| E::custom(format!("\"{text}\" is not a decimal number"))),
        }
    }
}

pub(crate) fn deserialize_decimal<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
    Decimal::deserialize(deserializer)?.into_f64()
}

fn deserialize_optional_decimal<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<f64>, D::Error> {
    Option::<Decimal>::deserialize(deserializer)?
        .map(Decimal::into_f64)
        .transpose()
}
