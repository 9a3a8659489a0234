use log::debug;
use sqlx::SqliteConnection;

use crate::db_types::{NewPayment, Payment};

/// Inserts the payment, returning `false` in the second parameter if a payment with the same
/// `transaction_id` has already been recorded. Marking the order paid is the caller's half of
/// the transaction.
pub async fn idempotent_insert(
    payment: NewPayment,
    conn: &mut SqliteConnection,
) -> Result<(Payment, bool), sqlx::Error> {
    let inserted = match fetch_payment_by_txid(&payment.transaction_id, conn).await? {
        Some(payment) => (payment, false),
        None => {
            let payment = insert_payment(payment, conn).await?;
            debug!("📝️ Payment [{}] saved for order #{}", payment.transaction_id, payment.order_id);
            (payment, true)
        },
    };
    Ok(inserted)
}

async fn insert_payment(payment: NewPayment, conn: &mut SqliteConnection) -> Result<Payment, sqlx::Error> {
    let payment = sqlx::query_as(
        r#"
            INSERT INTO payments (order_id, amount, currency, customer_email, payment_status, transaction_id)
            VALUES ($1, $2, $3, $4, 'paid', $5)
            RETURNING *;
        "#,
    )
    .bind(payment.order_id)
    .bind(payment.amount)
    .bind(payment.currency)
    .bind(payment.customer_email)
    .bind(payment.transaction_id)
    .fetch_one(conn)
    .await?;
    Ok(payment)
}

pub async fn fetch_payment_by_txid(txid: &str, conn: &mut SqliteConnection) -> Result<Option<Payment>, sqlx::Error> {
    let payment =
        sqlx::query_as("SELECT * FROM payments WHERE transaction_id = $1").bind(txid).fetch_optional(conn).await?;
    Ok(payment)
}

pub async fn fetch_payment_for_order(
    order_id: i64,
    conn: &mut SqliteConnection,
) -> Result<Option<Payment>, sqlx::Error> {
    let payment =
        sqlx::query_as("SELECT * FROM payments WHERE order_id = $1").bind(order_id).fetch_optional(conn).await?;
    Ok(payment)
}
