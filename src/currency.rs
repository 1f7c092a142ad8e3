//! Formatting of money amounts for display.

use std::sync::OnceLock;

use numfmt::{Formatter, Precision};

/// Format `number` as dollars with two decimal places and thousands
/// separators, e.g. "$1,234.50" or "-$12.00".
pub fn currency(number: f64) -> String {
    static POSITIVE_FMT: OnceLock<Option<Formatter>> = OnceLock::new();
    static NEGATIVE_FMT: OnceLock<Option<Formatter>> = OnceLock::new();

    let positive_fmt = POSITIVE_FMT.get_or_init(|| currency_formatter("$"));
    let negative_fmt = NEGATIVE_FMT.get_or_init(|| currency_formatter("-$"));

    let formatted = match (positive_fmt, negative_fmt) {
        (Some(positive_fmt), Some(negative_fmt)) => {
            if number < 0.0 {
                negative_fmt.fmt_string(number.abs())
            } else if number > 0.0 {
                positive_fmt.fmt_string(number)
            } else {
                // numfmt renders zero as "0".
                return "$0.00".to_owned();
            }
        }
        _ => return plain_currency(number),
    };

    pad_cents(formatted)
}

fn currency_formatter(prefix: &str) -> Option<Formatter> {
    let Ok(formatter) = Formatter::currency(prefix) else {
        tracing::error!("Could not create currency formatter for \"{prefix}\"");
        return None;
    };

    Some(formatter.precision(Precision::Decimals(2)))
}

/// numfmt drops trailing zeros, so "12.30" comes out as "12.3" and "12.00" as
/// "12".
fn pad_cents(formatted: String) -> String {
    match formatted.rfind('.') {
        Some(point) => {
            let decimals = formatted.len() - point - 1;
            format!("{formatted}{}", "0".repeat(2usize.saturating_sub(decimals)))
        }
        None => format!("{formatted}.00"),
    }
}

fn plain_currency(number: f64) -> String {
    if number < 0.0 {
        format!("-${:.2}", number.abs())
    } else {
        format!("${number:.2}")
    }
}
