//! Figures for the dashboard: the summary cards, expenses by category, income
//! against expense per month, and the latest transactions.
//!
//! Everything here is derived from data the stores already hold, so building
//! the dashboard never touches the network.

use std::collections::HashMap;

use time::{Date, Month};

use crate::{
    category::Category,
    summary::FinancialSummary,
    transaction::{Transaction, TransactionType},
};

/// How many transactions the dashboard lists as recent.
pub const RECENT_TRANSACTION_COUNT: usize = 5;

/// How many months, counting the current one, the monthly chart covers.
const MONTH_COUNT: usize = 6;

/// The label for expenses whose category is not in the held category set.
const UNKNOWN_CATEGORY_LABEL: &str = "Unknown";

/// Income and expense totals for one calendar month.
#[derive(Debug, Clone, PartialEq)]
pub struct MonthlyTotals {
    /// The three letter month name, e.g. "Jan".
    pub label: String,
    /// The first day of the month.
    pub month: Date,
    /// The sum of income amounts in the month.
    pub income: f64,
    /// The sum of expense amounts in the month.
    pub expense: f64,
}

/// Everything the dashboard displays.
#[derive(Debug, Clone, PartialEq)]
pub struct DashboardData {
    /// The totals shown on the summary cards.
    pub summary: FinancialSummary,
    /// Expense totals per category name, largest first.
    pub expenses_by_category: Vec<(String, f64)>,
    /// One entry per month, oldest first, ending with the month of `today`.
    pub monthly_totals: Vec<MonthlyTotals>,
    /// The most recent transactions, newest first.
    pub recent_transactions: Vec<Transaction>,
}

impl DashboardData {
    /// Build the dashboard from the held transactions and categories.
    ///
    /// `today` decides which months the monthly chart covers.
    pub fn new(
        summary: FinancialSummary,
        transactions: &[Transaction],
        categories: &[Category],
        today: Date,
    ) -> Self {
        Self {
            summary,
            expenses_by_category: group_expenses_by_category(transactions, categories),
            monthly_totals: monthly_income_and_expense(transactions, today),
            recent_transactions: most_recent(transactions, RECENT_TRANSACTION_COUNT),
        }
    }
}

/// Sums expense amounts per category name.
///
/// Income is ignored. Categories that are not in `categories` use the name the
/// server sent with the transaction, or are grouped under "Unknown". The result is sorted by total, largest first, then by name.
fn group_expenses_by_category(
    transactions: &[Transaction],
    categories: &[Category],
) -> Vec<(String, f64)> {
    let names: HashMap<i64, &str> = categories
        .iter()
        .map(|category| (category.id, category.name.as_ref()))
        .collect();

    let mut totals: HashMap<&str, f64> = HashMap::new();

    for transaction in transactions
        .iter()
        .filter(|transaction| transaction.transaction_type == TransactionType::Expense)
    {
        let name = names
            .get(&transaction.category)
            .copied()
            .or(transaction.category_name.as_deref())
            .unwrap_or(UNKNOWN_CATEGORY_LABEL);
        *totals.entry(name).or_insert(0.0) += transaction.amount;
    }

    let mut grouped: Vec<_> = totals
        .into_iter()
        .map(|(name, total)| (name.to_owned(), total))
        .collect();
    grouped.sort_by(|(a_name, a_total), (b_name, b_total)| {
        b_total.total_cmp(a_total).then_with(|| a_name.cmp(b_name))
    });

    grouped
}

/// Sums income and expense per month for the [MONTH_COUNT] months ending with
/// the month of `today`. Months without transactions are included with zero
/// totals.
fn monthly_income_and_expense(transactions: &[Transaction], today: Date) -> Vec<MonthlyTotals> {
    let months = last_months(today, MONTH_COUNT);

    let mut totals: HashMap<Date, (f64, f64)> = HashMap::new();

    for transaction in transactions {
        let month = first_of_month(transaction.date);
        let (income, expense) = totals.entry(month).or_insert((0.0, 0.0));

        match transaction.transaction_type {
            TransactionType::Income => *income += transaction.amount,
            TransactionType::Expense => *expense += transaction.amount,
        }
    }

    months
        .into_iter()
        .map(|month| {
            let (income, expense) = totals.get(&month).copied().unwrap_or((0.0, 0.0));

            MonthlyTotals {
                label: month_label(month.month()).to_owned(),
                month,
                income,
                expense,
            }
        })
        .collect()
}

/// The first day of the `count` months ending with the month of `today`,
/// oldest first.
fn last_months(today: Date, count: usize) -> Vec<Date> {
    let mut months = Vec::with_capacity(count);
    let mut month = first_of_month(today);

    for _ in 0..count {
        months.push(month);

        match month.previous_day() {
            Some(last_day_of_previous_month) => month = first_of_month(last_day_of_previous_month),
            None => break,
        }
    }

    months.reverse();
    months
}

fn first_of_month(date: Date) -> Date {
    // Day 1 is valid for every month.
    Date::from_calendar_date(date.year(), date.month(), 1).unwrap_or(date)
}

/// Formats a month as a three-letter abbreviation, e.g. "Jan".
fn month_label(month: Month) -> &'static str {
    match month {
        Month::January => "Jan",
        Month::February => "Feb",
        Month::March => "Mar",
        Month::April => "Apr",
        Month::May => "May",
        Month::June => "Jun",
        Month::July => "Jul",
        Month::August => "Aug",
        Month::September => "Sep",
        Month::October => "Oct",
        Month::November => "Nov",
        Month::December => "Dec",
    }
}

/// The `count` latest transactions by date, newest first. Ties keep the
/// higher ID first.
fn most_recent(transactions: &[Transaction], count: usize) -> Vec<Transaction> {
    let mut sorted = transactions.to_vec();
    sorted.sort_by(|a, b| b.date.cmp(&a.date).then_with(|| b.id.cmp(&a.id)));
    sorted.truncate(count);

    sorted
}

#[cfg(test)]
mod tests {
    use time::macros::date;

    use crate::{
        category::{Category, CategoryName},
        summary::summarize,
        transaction::{Transaction, TransactionType},
    };

    use super::{
        DashboardData, RECENT_TRANSACTION_COUNT, group_expenses_by_category, last_months,
        monthly_income_and_expense,
    };

    fn create_test_transaction(
        id: i64,
        amount: f64,
        transaction_type: TransactionType,
        category: i64,
        date: time::Date,
    ) -> Transaction {
        Transaction {
            id,
            amount,
            description: format!("transaction {id}"),
            transaction_type,
            category,
            category_name: None,
            date,
        }
    }

    fn categories() -> Vec<Category> {
        vec![
            Category {
                id: 1,
                name: CategoryName::new("Food").unwrap(),
            },
            Category {
                id: 2,
                name: CategoryName::new("Rent").unwrap(),
            },
        ]
    }

    #[test]
    fn groups_expenses_by_category_name() {
        let transactions = vec![
            create_test_transaction(1, 20.0, TransactionType::Expense, 1, date!(2025 - 01 - 01)),
            create_test_transaction(2, 500.0, TransactionType::Expense, 2, date!(2025 - 01 - 02)),
            create_test_transaction(3, 15.0, TransactionType::Expense, 1, date!(2025 - 01 - 03)),
            create_test_transaction(4, 9000.0, TransactionType::Income, 1, date!(2025 - 01 - 04)),
        ];

        let result = group_expenses_by_category(&transactions, &categories());

        assert_eq!(
            result,
            vec![("Rent".to_owned(), 500.0), ("Food".to_owned(), 35.0)]
        );
    }

    #[test]
    fn unknown_category_ids_are_grouped_together() {
        let transactions = vec![
            create_test_transaction(1, 20.0, TransactionType::Expense, 7, date!(2025 - 01 - 01)),
            create_test_transaction(2, 5.0, TransactionType::Expense, 8, date!(2025 - 01 - 02)),
        ];

        let result = group_expenses_by_category(&transactions, &categories());

        assert_eq!(result, vec![("Unknown".to_owned(), 25.0)]);
    }

    #[test]
    fn falls_back_to_server_category_name() {
        let mut groceries =
            create_test_transaction(1, 30.0, TransactionType::Expense, 9, date!(2025 - 01 - 01));
        groceries.category_name = Some("Groceries".to_owned());
        let transactions = vec![
            groceries,
            create_test_transaction(2, 5.0, TransactionType::Expense, 8, date!(2025 - 01 - 02)),
        ];

        let result = group_expenses_by_category(&transactions, &categories());

        assert_eq!(
            result,
            vec![("Groceries".to_owned(), 30.0), ("Unknown".to_owned(), 5.0)]
        );
    }

    #[test]
    fn last_months_crosses_year_boundary() {
        let months = last_months(date!(2025 - 02 - 14), 6);

        assert_eq!(
            months,
            vec![
                date!(2024 - 09 - 01),
                date!(2024 - 10 - 01),
                date!(2024 - 11 - 01),
                date!(2024 - 12 - 01),
                date!(2025 - 01 - 01),
                date!(2025 - 02 - 01),
            ]
        );
    }

    #[test]
    fn monthly_totals_cover_six_months_with_zeroes() {
        let transactions = vec![
            create_test_transaction(1, 100.0, TransactionType::Expense, 1, date!(2025 - 01 - 01)),
            create_test_transaction(2, 5000.0, TransactionType::Income, 2, date!(2025 - 01 - 02)),
            create_test_transaction(3, 40.0, TransactionType::Expense, 1, date!(2025 - 03 - 31)),
            // Outside the window.
            create_test_transaction(4, 999.0, TransactionType::Expense, 1, date!(2024 - 06 - 30)),
        ];

        let result = monthly_income_and_expense(&transactions, date!(2025 - 03 - 15));

        let labels: Vec<_> = result.iter().map(|totals| totals.label.as_str()).collect();
        assert_eq!(labels, vec!["Oct", "Nov", "Dec", "Jan", "Feb", "Mar"]);
        assert_eq!(result[3].income, 5000.0);
        assert_eq!(result[3].expense, 100.0);
        assert_eq!(result[4].income, 0.0);
        assert_eq!(result[4].expense, 0.0);
        assert_eq!(result[5].expense, 40.0);
    }

    #[test]
    fn recent_transactions_are_newest_first_and_limited() {
        let transactions: Vec<_> = (1..=8)
            .map(|day| {
                create_test_transaction(
                    day,
                    10.0,
                    TransactionType::Expense,
                    1,
                    date!(2025 - 01 - 01).replace_day(day as u8).unwrap(),
                )
            })
            .collect();

        let dashboard = DashboardData::new(
            summarize(&transactions),
            &transactions,
            &categories(),
            date!(2025 - 01 - 31),
        );

        let ids: Vec<_> = dashboard
            .recent_transactions
            .iter()
            .map(|transaction| transaction.id)
            .collect();
        assert_eq!(ids.len(), RECENT_TRANSACTION_COUNT);
        assert_eq!(ids, vec![8, 7, 6, 5, 4]);
    }
}
