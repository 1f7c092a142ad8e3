//! A filtered, searchable and paged view over the held transactions.
//!
//! The view never changes the transactions themselves. Any change to a filter
//! or to the search text sends the view back to page 1.

use std::str::FromStr;

use crate::{
    category::CategoryId,
    pagination::{PaginationConfig, PaginationIndicator, create_pagination_indicators},
    transaction::{Transaction, TransactionType},
};

/// Which transaction types the view shows.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TypeFilter {
    /// Income and expenses.
    #[default]
    All,
    /// Income only.
    Income,
    /// Expenses only.
    Expense,
}

impl TypeFilter {
    fn matches(self, transaction_type: TransactionType) -> bool {
        match self {
            TypeFilter::All => true,
            TypeFilter::Income => transaction_type == TransactionType::Income,
            TypeFilter::Expense => transaction_type == TransactionType::Expense,
        }
    }
}

impl FromStr for TypeFilter {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "all" => Ok(TypeFilter::All),
            "income" => Ok(TypeFilter::Income),
            "expense" => Ok(TypeFilter::Expense),
            other => Err(format!(
                "\"{other}\" is not a type filter, expected \"all\", \"income\" or \"expense\""
            )),
        }
    }
}

/// The filters and page of the transaction list.
#[derive(Debug, Clone, PartialEq)]
pub struct TransactionView {
    type_filter: TypeFilter,
    category_filter: Option<CategoryId>,
    search: String,
    page: u64,
    page_size: u64,
    max_pages: u64,
}

impl TransactionView {
    /// Create a view showing everything, starting at the configured default
    /// page.
    pub fn new(config: &PaginationConfig) -> Self {
        Self {
            type_filter: TypeFilter::All,
            category_filter: None,
            search: String::new(),
            page: config.default_page.max(1),
            page_size: config.page_size.max(1),
            max_pages: config.max_pages,
        }
    }

    /// The active type filter.
    pub fn type_filter(&self) -> TypeFilter {
        self.type_filter
    }

    /// The category being filtered on, if any.
    pub fn category_filter(&self) -> Option<CategoryId> {
        self.category_filter
    }

    /// The description search text.
    pub fn search(&self) -> &str {
        &self.search
    }

    /// The 1-based page being shown.
    pub fn page(&self) -> u64 {
        self.page
    }

    /// Show only transactions of `filter`'s type and go back to page 1.
    pub fn set_type_filter(&mut self, filter: TypeFilter) {
        self.type_filter = filter;
        self.page = 1;
    }

    /// Show only transactions in `category`, or every category for `None`,
    /// and go back to page 1.
    pub fn set_category_filter(&mut self, category: Option<CategoryId>) {
        self.category_filter = category;
        self.page = 1;
    }

    /// Show only transactions whose description contains `search`, ignoring
    /// case, and go back to page 1.
    pub fn set_search(&mut self, search: &str) {
        self.search = search.trim().to_owned();
        self.page = 1;
    }

    /// Show `page`, clamped to the pages `transactions` fill.
    pub fn set_page(&mut self, page: u64, transactions: &[Transaction]) {
        self.page = page.clamp(1, self.total_pages(transactions));
    }

    /// Show the next page, if there is one.
    pub fn next_page(&mut self, transactions: &[Transaction]) {
        self.set_page(self.page.saturating_add(1), transactions);
    }

    /// Show the previous page, if there is one.
    pub fn previous_page(&mut self, transactions: &[Transaction]) {
        self.set_page(self.page.saturating_sub(1), transactions);
    }

    /// Move back to the last page with rows after rows were removed, e.g.
    /// when the only row on the last page was deleted.
    pub fn clamp_page(&mut self, transactions: &[Transaction]) {
        self.set_page(self.page, transactions);
    }

    /// The transactions that pass every filter, newest first.
    pub fn filtered<'a>(&self, transactions: &'a [Transaction]) -> Vec<&'a Transaction> {
        let search = self.search.to_lowercase();

        let mut filtered: Vec<_> = transactions
            .iter()
            .filter(|transaction| self.type_filter.matches(transaction.transaction_type))
            .filter(|transaction| {
                self.category_filter
                    .is_none_or(|category| transaction.category == category)
            })
            .filter(|transaction| {
                search.is_empty() || transaction.description.to_lowercase().contains(&search)
            })
            .collect();

        filtered.sort_by(|a, b| b.date.cmp(&a.date).then_with(|| b.id.cmp(&a.id)));

        filtered
    }

    /// The rows on the current page.
    pub fn visible<'a>(&self, transactions: &'a [Transaction]) -> Vec<&'a Transaction> {
        let page_size = self.page_size as usize;
        let offset = (self.page as usize - 1) * page_size;

        self.filtered(transactions)
            .into_iter()
            .skip(offset)
            .take(page_size)
            .collect()
    }

    /// The number of pages the filtered rows fill. An empty list still has
    /// one page.
    pub fn total_pages(&self, transactions: &[Transaction]) -> u64 {
        let count = self.filtered(transactions).len() as u64;

        count.div_ceil(self.page_size).max(1)
    }

    /// The page controls for the current page.
    pub fn indicators(&self, transactions: &[Transaction]) -> Vec<PaginationIndicator> {
        create_pagination_indicators(self.page, self.total_pages(transactions), self.max_pages)
    }
}

#[cfg(test)]
mod tests {
    use time::{Duration, macros::date};

    use crate::{
        pagination::{PaginationConfig, PaginationIndicator},
        transaction::{Transaction, TransactionType},
    };

    use super::{TransactionView, TypeFilter};

    fn create_transactions(count: i64) -> Vec<Transaction> {
        (1..=count)
            .map(|id| Transaction {
                id,
                amount: 10.0 * id as f64,
                description: if id % 2 == 0 {
                    format!("Salary {id}")
                } else {
                    format!("Groceries {id}")
                },
                transaction_type: if id % 2 == 0 {
                    TransactionType::Income
                } else {
                    TransactionType::Expense
                },
                category: id % 3 + 1,
                category_name: None,
                date: date!(2025 - 01 - 01) + Duration::days(id),
            })
            .collect()
    }

    fn new_view() -> TransactionView {
        TransactionView::new(&PaginationConfig::default())
    }

    #[test]
    fn changing_type_filter_resets_page() {
        let transactions = create_transactions(35);
        let mut view = new_view();
        view.set_page(3, &transactions);
        assert_eq!(view.page(), 3);

        view.set_type_filter(TypeFilter::Income);

        assert_eq!(view.page(), 1);
        assert!(
            view.visible(&transactions)
                .iter()
                .all(|transaction| transaction.transaction_type == TransactionType::Income)
        );
    }

    #[test]
    fn changing_category_or_search_resets_page() {
        let transactions = create_transactions(35);
        let mut view = new_view();

        view.set_page(2, &transactions);
        view.set_category_filter(Some(1));
        assert_eq!(view.page(), 1);

        view.set_page(2, &transactions);
        view.set_search("salary");
        assert_eq!(view.page(), 1);
    }

    #[test]
    fn search_ignores_case() {
        let transactions = create_transactions(6);
        let mut view = new_view();

        view.set_search("GROCERIES");

        let ids: Vec<_> = view
            .filtered(&transactions)
            .iter()
            .map(|transaction| transaction.id)
            .collect();
        assert_eq!(ids, vec![5, 3, 1]);
    }

    #[test]
    fn filters_combine() {
        let transactions = create_transactions(12);
        let mut view = new_view();

        view.set_type_filter(TypeFilter::Expense);
        view.set_category_filter(Some(2));

        let ids: Vec<_> = view
            .filtered(&transactions)
            .iter()
            .map(|transaction| transaction.id)
            .collect();
        // Odd IDs are expenses, id % 3 == 1 is category 2.
        assert_eq!(ids, vec![7, 1]);
    }

    #[test]
    fn pages_hold_at_most_page_size_rows() {
        let transactions = create_transactions(25);
        let mut view = new_view();

        assert_eq!(view.total_pages(&transactions), 3);
        assert_eq!(view.visible(&transactions).len(), 10);

        view.set_page(3, &transactions);
        assert_eq!(view.visible(&transactions).len(), 5);
        // Newest first, so the last page holds the oldest rows.
        assert_eq!(view.visible(&transactions)[4].id, 1);
    }

    #[test]
    fn set_page_clamps_to_range() {
        let transactions = create_transactions(25);
        let mut view = new_view();

        view.set_page(99, &transactions);
        assert_eq!(view.page(), 3);

        view.set_page(0, &transactions);
        assert_eq!(view.page(), 1);

        view.previous_page(&transactions);
        assert_eq!(view.page(), 1);

        view.next_page(&transactions);
        assert_eq!(view.page(), 2);
    }

    #[test]
    fn clamp_page_steps_back_when_last_page_is_emptied() {
        let mut transactions = create_transactions(11);
        let mut view = new_view();
        view.set_page(2, &transactions);

        // The oldest row is alone on page 2.
        transactions.retain(|transaction| transaction.id != 1);
        view.clamp_page(&transactions);

        assert_eq!(view.page(), 1);
    }

    #[test]
    fn empty_list_has_one_page() {
        let view = new_view();

        assert_eq!(view.total_pages(&[]), 1);
        assert!(view.visible(&[]).is_empty());
        assert_eq!(view.indicators(&[]), vec![PaginationIndicator::CurrPage(1)]);
    }

    #[test]
    fn parses_type_filter() {
        assert_eq!("all".parse(), Ok(TypeFilter::All));
        assert_eq!("Income".parse(), Ok(TypeFilter::Income));
        assert_eq!("expense".parse(), Ok(TypeFilter::Expense));
        assert!("transfer".parse::<TypeFilter>().is_err());
    }
}
