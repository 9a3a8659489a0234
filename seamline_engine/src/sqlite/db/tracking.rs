use log::debug;
use sqlx::SqliteConnection;

use crate::db_types::{NewTrackingUpdate, TrackingUpdate};

/// Appends one entry to the order's fulfilment log. The log is append-only; repeated stages are
/// written as given and never de-duplicated.
pub async fn append_update(
    order_id: i64,
    update: NewTrackingUpdate,
    conn: &mut SqliteConnection,
) -> Result<TrackingUpdate, sqlx::Error> {
    let update = sqlx::query_as(
        "INSERT INTO tracking_updates (order_id, stage, location, note) VALUES ($1, $2, $3, $4) RETURNING *",
    )
    .bind(order_id)
    .bind(update.stage)
    .bind(update.location)
    .bind(update.note)
    .fetch_one(conn)
    .await?;
    debug!("📝️ Tracking update saved for order #{order_id}");
    Ok(update)
}

/// The full fulfilment log for an order, in the order it was written.
pub async fn log_for_order(order_id: i64, conn: &mut SqliteConnection) -> Result<Vec<TrackingUpdate>, sqlx::Error> {
    let log = sqlx::query_as("SELECT * FROM tracking_updates WHERE order_id = $1 ORDER BY id ASC")
        .bind(order_id)
        .fetch_all(conn)
        .await?;
    Ok(log)
}
