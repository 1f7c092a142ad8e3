#![allow(missing_docs)]

mod fake_api;

pub(crate) use fake_api::FakeFinanceApi;

use time::macros::date;
use tokio::sync::mpsc::UnboundedReceiver;

use crate::{notification::Notification, transaction::TransactionType, user::AuthToken};

/// A fake API with the account alice/hunter22, the categories Food (1) and
/// Rent (2), and two transactions:
/// - 1: a 100.00 expense "lunch" in Food on 2025-01-01,
/// - 2: a 5000.00 income "salary" in Rent on 2025-01-02.
pub(crate) fn seeded_fake() -> FakeFinanceApi {
    let fake = FakeFinanceApi::new();
    fake.insert_user("alice", "alice@example.com", "hunter22");

    let food = fake.insert_category("Food");
    let rent = fake.insert_category("Rent");
    fake.insert_dated_transaction(
        "lunch",
        100.0,
        TransactionType::Expense,
        food.id,
        date!(2025 - 01 - 01),
    );
    fake.insert_dated_transaction(
        "salary",
        5000.0,
        TransactionType::Income,
        rent.id,
        date!(2025 - 01 - 02),
    );

    fake
}

/// [seeded_fake] and a token for alice.
pub(crate) async fn seeded_api() -> (FakeFinanceApi, AuthToken) {
    let fake = seeded_fake();
    let token = fake.token_for("alice").expect("seeded user missing");

    (fake, token)
}

/// Take every notification sent so far.
pub(crate) fn drain(receiver: &mut UnboundedReceiver<Notification>) -> Vec<Notification> {
    let mut notifications = Vec::new();

    while let Ok(notification) = receiver.try_recv() {
        notifications.push(notification);
    }

    notifications
}
