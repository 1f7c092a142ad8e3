use std::{
    fs::OpenOptions,
    io,
    path::PathBuf,
    process::ExitCode,
    sync::Arc,
};

use clap::{Args, Parser, Subcommand};
use time::{Date, OffsetDateTime, macros::format_description};
use tracing_subscriber::{
    EnvFilter, Layer, filter, layer::SubscriberExt, util::SubscriberInitExt,
};

use finance_tracker::{
    AppState, ClientConfig, DEFAULT_API_BASE_URL, DEFAULT_STATE_PATH, Error, HttpClient,
    NewTransaction, Notification, NotificationKind, Notifier, PageCursor, PaginationConfig,
    PaginationIndicator, Transaction, TransactionType, TransactionView, TypeFilter,
    create_pagination_indicators, currency,
};

/// A command line client for the finance tracker API.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Cli {
    /// The base URL of the finance API.
    #[arg(long, env = "FINANCE_API_URL", default_value = DEFAULT_API_BASE_URL)]
    api_url: String,

    /// File path to the SQLite database that keeps the session and cached data.
    #[arg(long, env = "FINANCE_STATE_PATH", default_value = DEFAULT_STATE_PATH)]
    state_path: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Log in, prompting for the password.
    Login {
        /// The username to log in as.
        username: String,
    },
    /// Create an account and log in, prompting for the password twice.
    Register {
        /// The username for the new account.
        username: String,
        /// The email address for the new account.
        email: String,
    },
    /// Log out and forget the cached categories and transactions.
    Logout,
    /// Show the signed in user.
    Whoami,
    /// Manage categories.
    #[command(subcommand)]
    Categories(CategoryCommand),
    /// Manage transactions.
    #[command(subcommand)]
    Transactions(TransactionCommand),
    /// Show income, expense and net balance over all transactions.
    Summary,
    /// Show the dashboard for the cached transactions.
    Dashboard,
}

#[derive(Subcommand, Debug)]
enum CategoryCommand {
    /// List one page of categories.
    List {
        #[arg(long, default_value_t = 1)]
        page: u64,
    },
    /// List every category.
    All,
    /// Create a category.
    Add { name: String },
    /// Rename a category.
    Rename { id: i64, name: String },
    /// Delete a category that no cached transaction uses.
    Delete { id: i64 },
}

#[derive(Subcommand, Debug)]
enum TransactionCommand {
    /// List one page of transactions.
    List {
        #[arg(long, default_value_t = 1)]
        page: u64,
        /// Show only "all", "income" or "expense".
        #[arg(long = "type", default_value = "all")]
        type_filter: TypeFilter,
        /// Show only transactions in this category.
        #[arg(long)]
        category: Option<i64>,
        /// Show only transactions whose description contains this text.
        #[arg(long)]
        search: Option<String>,
    },
    /// Create a transaction.
    Add(TransactionFields),
    /// Replace the fields of a transaction.
    Update {
        id: i64,
        #[command(flatten)]
        fields: TransactionFields,
    },
    /// Delete a transaction.
    Delete { id: i64 },
}

#[derive(Args, Debug)]
struct TransactionFields {
    /// The amount, greater than zero.
    #[arg(long)]
    amount: f64,
    #[arg(long)]
    description: String,
    /// "income" or "expense".
    #[arg(long = "type")]
    transaction_type: TransactionType,
    /// The ID of the category.
    #[arg(long)]
    category: i64,
    /// The date as YYYY-MM-DD, defaults to today.
    #[arg(long, value_parser = parse_date)]
    date: Option<Date>,
}

/// Prints notifications to the terminal.
struct ConsoleNotifier;

impl Notifier for ConsoleNotifier {
    fn notify(&self, notification: Notification) {
        match notification.kind {
            NotificationKind::Success => println!("\x1b[32m{}\x1b[0m", notification.message),
            NotificationKind::Error => print_error(notification.message),
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    setup_logging();

    let cli = Cli::parse();
    let config = ClientConfig {
        api_base_url: cli.api_url,
        state_path: cli.state_path,
        pagination: PaginationConfig::default(),
    };

    let state = match AppState::open(config, Arc::new(ConsoleNotifier)) {
        Ok(state) => state,
        Err(error) => {
            print_error(format!("Could not open the state database: {error}"));
            return ExitCode::FAILURE;
        }
    };

    // Failed store actions have already been reported by the notifier.
    match run(cli.command, &state).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(Error::NotAuthenticated) => {
            print_error("You are not logged in, run `finance login <username>` first.");
            ExitCode::FAILURE
        }
        Err(error) => {
            tracing::debug!("Command failed: {error}");
            ExitCode::FAILURE
        }
    }
}

async fn run<C: HttpClient>(command: Command, state: &AppState<C>) -> Result<(), Error> {
    match command {
        Command::Login { username } => {
            let Some(password) = prompt_password("Password: ") else {
                return Ok(());
            };
            let user = state.login(&username, &password).await?;
            println!("Signed in as {} <{}>", user.username, user.email);
        }
        Command::Register { username, email } => {
            let Some(password) = prompt_password("Password: ") else {
                return Ok(());
            };
            let Some(confirm_password) = prompt_password("Enter the same password again: ")
            else {
                return Ok(());
            };
            state
                .register(&username, &email, &password, &confirm_password)
                .await?;
        }
        Command::Logout => state.logout(),
        Command::Whoami => match state.session().user() {
            Some(user) => println!("{} <{}> (ID {})", user.username, user.email, user.id),
            None => return Err(Error::NotAuthenticated),
        },
        Command::Categories(command) => run_category_command(command, state).await?,
        Command::Transactions(command) => run_transaction_command(command, state).await?,
        Command::Summary => {
            let summary = state.calculate_summary().await?;
            println!("Income:      {:>14}", currency(summary.total_income));
            println!("Expenses:    {:>14}", currency(summary.total_expense));
            println!("Net balance: {:>14}", currency(summary.net_balance));
        }
        Command::Dashboard => {
            state.fetch_all_categories().await?;
            let page = state.transactions().cursor().current_page;
            state.fetch_transactions(page).await?;
            print_dashboard(state, today());
        }
    }

    Ok(())
}

async fn run_category_command<C: HttpClient>(
    command: CategoryCommand,
    state: &AppState<C>,
) -> Result<(), Error> {
    match command {
        CategoryCommand::List { page } => {
            state.fetch_categories(page).await?;
            print_categories(state);
            println!();
            println!("{}", page_hint(&state.categories().cursor()));
        }
        CategoryCommand::All => {
            state.fetch_all_categories().await?;
            print_categories(state);
        }
        CategoryCommand::Add { name } => {
            let category = state.add_category(&name).await?;
            println!("{:>5}  {}", category.id, category.name);
        }
        CategoryCommand::Rename { id, name } => {
            state.update_category(id, &name).await?;
        }
        CategoryCommand::Delete { id } => {
            let page = state.transactions().cursor().current_page;
            state.fetch_transactions(page).await?;
            state.delete_category(id).await?;
        }
    }

    Ok(())
}

async fn run_transaction_command<C: HttpClient>(
    command: TransactionCommand,
    state: &AppState<C>,
) -> Result<(), Error> {
    match command {
        TransactionCommand::List {
            page,
            type_filter,
            category,
            search,
        } => {
            state.fetch_transactions(page).await?;

            let mut view = TransactionView::new(&state.config.pagination);
            view.set_type_filter(type_filter);
            view.set_category_filter(category);
            view.set_search(search.as_deref().unwrap_or_default());

            let transactions = state.transactions().transactions();
            print_transactions(&view.visible(&transactions));

            let cursor = state.transactions().cursor();
            println!();
            println!(
                "Page {}",
                format_indicators(&create_pagination_indicators(
                    cursor.current_page,
                    cursor.total_pages,
                    state.config.pagination.max_pages,
                ))
            );
        }
        TransactionCommand::Add(fields) => {
            state.fetch_all_categories().await?;
            let transaction = state.add_transaction(&fields.into_new_transaction()?).await?;
            print_transactions(&[&transaction]);
        }
        TransactionCommand::Update { id, fields } => {
            state.fetch_all_categories().await?;
            let transaction = state
                .update_transaction(id, &fields.into_new_transaction()?)
                .await?;
            print_transactions(&[&transaction]);
        }
        TransactionCommand::Delete { id } => state.delete_transaction(id).await?,
    }

    Ok(())
}

impl TransactionFields {
    fn into_new_transaction(self) -> Result<NewTransaction, Error> {
        NewTransaction::new(
            self.amount,
            &self.description,
            self.transaction_type,
            self.category,
            self.date.unwrap_or_else(today),
        )
        .inspect_err(|error| print_error(error))
    }
}

fn print_categories<C: HttpClient>(state: &AppState<C>) {
    let categories = state.categories().categories();

    if categories.is_empty() {
        println!("No categories.");
        return;
    }

    for category in categories {
        println!("{:>5}  {}", category.id, category.name);
    }
}

fn print_transactions(transactions: &[&Transaction]) {
    if transactions.is_empty() {
        println!("No transactions.");
        return;
    }

    for transaction in transactions {
        let amount = match transaction.transaction_type {
            TransactionType::Income => currency(transaction.amount),
            TransactionType::Expense => currency(-transaction.amount),
        };

        println!(
            "{:>5}  {}  {:>12}  {:<30}  {}",
            transaction.id,
            transaction.date,
            amount,
            transaction.description,
            transaction
                .category_name
                .as_deref()
                .unwrap_or("Unknown"),
        );
    }
}

fn print_dashboard<C: HttpClient>(state: &AppState<C>, today: Date) {
    let dashboard = state.dashboard(today);

    println!("Income:      {:>14}", currency(dashboard.summary.total_income));
    println!("Expenses:    {:>14}", currency(dashboard.summary.total_expense));
    println!("Net balance: {:>14}", currency(dashboard.summary.net_balance));

    println!();
    println!("Expenses by category");
    for (name, total) in &dashboard.expenses_by_category {
        println!("  {name:<20} {:>14}", currency(*total));
    }

    println!();
    println!("Income vs expenses");
    for month in &dashboard.monthly_totals {
        println!(
            "  {}  {:>14}  {:>14}",
            month.label,
            currency(month.income),
            currency(-month.expense)
        );
    }

    println!();
    println!("Recent transactions");
    let recent: Vec<_> = dashboard.recent_transactions.iter().collect();
    print_transactions(&recent);
}

fn format_indicators(indicators: &[PaginationIndicator]) -> String {
    indicators
        .iter()
        .map(|indicator| match indicator {
            PaginationIndicator::Page(page) => page.to_string(),
            PaginationIndicator::CurrPage(page) => format!("[{page}]"),
            PaginationIndicator::Ellipsis => "...".to_owned(),
            PaginationIndicator::NextButton(_) => ">".to_owned(),
            PaginationIndicator::BackButton(_) => "<".to_owned(),
        })
        .collect::<Vec<_>>()
        .join(" ")
}

fn page_hint(cursor: &PageCursor) -> String {
    let mut hint = format!("Page {} of {}", cursor.current_page, cursor.total_pages);

    if cursor.has_previous() {
        hint.push_str(&format!(", previous: --page {}", cursor.current_page - 1));
    }

    if cursor.has_next() {
        hint.push_str(&format!(", next: --page {}", cursor.current_page + 1));
    }

    hint
}

fn parse_date(text: &str) -> Result<Date, String> {
    Date::parse(text, format_description!("[year]-[month]-[day]"))
        .map_err(|error| format!("\"{text}\" is not a YYYY-MM-DD date: {error}"))
}

fn today() -> Date {
    OffsetDateTime::now_local()
        .unwrap_or_else(|_| OffsetDateTime::now_utc())
        .date()
}

/// Reads a password without echoing it. Returns `None` on end of input.
fn prompt_password(prompt: &str) -> Option<String> {
    match rpassword::prompt_password(prompt) {
        Ok(password) => Some(password),
        Err(error) if error.kind() == io::ErrorKind::UnexpectedEof => None,
        Err(error) => {
            print_error(format!("Could not read password from stdin: {error}"));
            None
        }
    }
}

fn print_error(error: impl ToString) {
    eprintln!(
        "\x1b[31;1m{}\x1b[0m",
        capitalise_first_char(&error.to_string())
    )
}

fn capitalise_first_char(string: &str) -> String {
    let mut chars = string.chars();
    let Some(first) = chars.next() else {
        return String::with_capacity(0);
    };
    first.to_uppercase().chain(chars).collect()
}

fn setup_logging() {
    let stderr_log = tracing_subscriber::fmt::layer()
        .with_writer(io::stderr)
        .with_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")));

    let log_file = OpenOptions::new()
        .create(true)
        .append(true)
        .open("debug.log")
        .expect("Could not create log file");

    let debug_log = tracing_subscriber::fmt::layer()
        .pretty()
        .with_writer(Arc::new(log_file))
        .with_filter(filter::LevelFilter::DEBUG);

    tracing_subscriber::registry()
        .with(stderr_log)
        .with(debug_log)
        .init();
}
