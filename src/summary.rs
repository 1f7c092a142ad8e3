//! The income, expense and net balance totals shown on the dashboard.

use serde::{Deserialize, Serialize};

use crate::transaction::{Transaction, TransactionType};

/// Where a [FinancialSummary] was computed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SummarySource {
    /// The API's aggregate over every transaction the user has.
    #[default]
    Remote,
    /// A local reduction over the page of transactions held by the client.
    ///
    /// Only used when the remote aggregate could not be fetched. The totals
    /// undercount whenever the user has more than one page of transactions.
    LocalPage,
}

/// Aggregate totals over a set of transactions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct FinancialSummary {
    /// The sum of all income amounts.
    pub total_income: f64,
    /// The sum of all expense amounts.
    pub total_expense: f64,
    /// `total_income - total_expense`.
    pub net_balance: f64,
    /// Whether the totals cover all transactions or only the held page.
    pub source: SummarySource,
}

impl FinancialSummary {
    /// Create a summary, deriving the net balance from the totals.
    pub fn new(total_income: f64, total_expense: f64, source: SummarySource) -> Self {
        Self {
            total_income,
            total_expense,
            net_balance: total_income - total_expense,
            source,
        }
    }
}

/// Reduce `transactions` to their income and expense totals.
///
/// The result is labelled [SummarySource::LocalPage].
pub fn summarize(transactions: &[Transaction]) -> FinancialSummary {
    let (total_income, total_expense) =
        transactions
            .iter()
            .fold((0.0, 0.0), |(income, expense), transaction| {
                match transaction.transaction_type {
                    TransactionType::Income => (income + transaction.amount, expense),
                    TransactionType::Expense => (income, expense + transaction.amount),
                }
            });

    FinancialSummary::new(total_income, total_expense, SummarySource::LocalPage)
}
