//! The remote API endpoint paths, relative to the API base URL.
//!
//! For endpoints that take a parameter, e.g., '/finance/categories/{category_id}/',
//! use [format_endpoint]. List endpoints take the page as a query string, see
//! [paged].

/// The route for logging in a user.
pub const LOG_IN: &str = "/authentication/login/";
/// The route for registering a new user.
pub const REGISTER: &str = "/authentication/register/";
/// The route to list and create categories.
pub const CATEGORIES: &str = "/finance/categories/";
/// The route to update or delete a single category.
pub const CATEGORY: &str = "/finance/categories/{category_id}/";
/// The route to list and create transactions.
pub const TRANSACTIONS: &str = "/finance/transactions/";
/// The route to update or delete a single transaction.
pub const TRANSACTION: &str = "/finance/transactions/{transaction_id}/";
/// The route for the income/expense totals over all of the user's transactions.
pub const TRANSACTION_SUMMARY: &str = "/finance/transactions/summary/";

/// Replace the parameter in `endpoint_path` with `id`.
///
/// A parameter is a string that starts with a left brace, followed by
/// lowercase letters or underscores, and ends with a right brace.
/// For example, in the endpoint path '/finance/categories/{category_id}/',
/// '{category_id}' is the parameter.
///
/// This function assumes that an endpoint path only contains ASCII characters
/// and a single parameter.
///
/// If no parameter is found in `endpoint_path`, the function returns the
/// the original `endpoint_path`.
pub fn format_endpoint(endpoint_path: &str, id: i64) -> String {
    let Some(param_start) = endpoint_path.find('{') else {
        return endpoint_path.to_string();
    };

    let param_end = endpoint_path[param_start..]
        .find('}')
        .map(|offset| param_start + offset + 1)
        .unwrap_or(endpoint_path.len());

    format!(
        "{}{}{}",
        &endpoint_path[..param_start],
        id,
        &endpoint_path[param_end..]
    )
}

/// Append the page query to a list endpoint, e.g. '/finance/categories/?page=2'.
pub fn paged(endpoint_path: &str, page: u64) -> String {
    format!("{endpoint_path}?page={page}")
}
