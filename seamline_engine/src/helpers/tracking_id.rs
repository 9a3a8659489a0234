use rand::{distributions::Alphanumeric, Rng};

use crate::db_types::TrackingId;

/// Generates a customer-facing tracking code of the form `TRK-9H3K2M8PQ61D`. The suffix is 12
/// uppercase alphanumeric characters, which is short enough to read over the phone and long
/// enough that guessing one is not a practical way to enumerate orders.
pub fn new_tracking_id() -> TrackingId {
    let suffix: String =
        rand::thread_rng().sample_iter(&Alphanumeric).take(12).map(char::from).map(|c| c.to_ascii_uppercase()).collect();
    TrackingId(format!("TRK-{suffix}"))
}
