use std::fmt::Display;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::db_types::{FulfilmentStage, Order, OrderStatusType, TrackingId, TrackingUpdate};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OrderQueryFilter {
    pub buyer_uid: Option<String>,
    pub manager_uid: Option<String>,
    pub product_id: Option<i64>,
    pub since: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
    pub status: Option<Vec<OrderStatusType>>,
}

impl OrderQueryFilter {
    pub fn with_buyer(mut self, uid: String) -> Self {
        self.buyer_uid = Some(uid);
        self
    }

    pub fn with_manager(mut self, uid: String) -> Self {
        self.manager_uid = Some(uid);
        self
    }

    pub fn with_product_id(mut self, product_id: i64) -> Self {
        self.product_id = Some(product_id);
        self
    }

    pub fn since(mut self, since: DateTime<Utc>) -> Self {
        self.since = Some(since);
        self
    }

    pub fn until(mut self, until: DateTime<Utc>) -> Self {
        self.until = Some(until);
        self
    }

    pub fn with_status(mut self, status: OrderStatusType) -> Self {
        self.status.get_or_insert_with(Vec::new).push(status);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.buyer_uid.is_none() &&
            self.manager_uid.is_none() &&
            self.product_id.is_none() &&
            self.since.is_none() &&
            self.until.is_none() &&
            self.status.is_none()
    }
}

impl Display for OrderQueryFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_empty() {
            write!(f, "No filters.")?;
            return Ok(());
        }
        if let Some(uid) = &self.buyer_uid {
            write!(f, "buyer: {uid}. ")?;
        }
        if let Some(uid) = &self.manager_uid {
            write!(f, "manager: {uid}. ")?;
        }
        if let Some(product_id) = &self.product_id {
            write!(f, "product: {product_id}. ")?;
        }
        if let Some(since) = &self.since {
            write!(f, "since {since}. ")?;
        }
        if let Some(until) = &self.until {
            write!(f, "until {until}. ")?;
        }
        if let Some(statuses) = &self.status {
            let statuses = statuses.iter().map(|s| s.to_string()).collect::<Vec<String>>().join(",");
            write!(f, "statuses: [{statuses}]. ")?;
        }
        Ok(())
    }
}

//--------------------------------------      Timeline       ---------------------------------------------------------

/// One stage of the derived fulfilment timeline. `complete` follows the skip-tolerant rule;
/// location, note and timestamp are only present when the stage was explicitly logged.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimelineStage {
    pub stage: FulfilmentStage,
    pub complete: bool,
    pub location: Option<String>,
    pub note: Option<String>,
    pub timestamp: Option<DateTime<Utc>>,
}

/// The display timeline for an order, projected from its fulfilment log.
///
/// This is a pure function of the stored log. It is recomputed on every read and never persisted,
/// so the log remains the single source of truth.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Timeline {
    pub tracking_id: TrackingId,
    pub order_status: OrderStatusType,
    /// Exactly one entry per fulfilment stage, in stage order.
    pub stages: Vec<TimelineStage>,
    /// The most recently appended log entry, which is not necessarily the furthest stage when
    /// updates arrive out of sequence.
    pub last_update: Option<TrackingUpdate>,
}

impl Timeline {
    /// Projects the timeline from an order's log.
    ///
    /// A stage counts as complete if any logged entry's stage index is at least as large, so
    /// logging a later stage implicitly completes every earlier one (skip-tolerant completion).
    /// A stage that was logged more than once carries the detail of its latest entry in log
    /// order.
    pub fn derive(order: &Order, log: &[TrackingUpdate]) -> Self {
        let highest = log.iter().map(|u| u.stage.index()).max();
        let stages = FulfilmentStage::ALL
            .iter()
            .map(|&stage| {
                let entry = log.iter().filter(|u| u.stage == stage).last();
                let complete = highest.map(|h| stage.index() <= h).unwrap_or(false);
                TimelineStage {
                    stage,
                    complete,
                    location: entry.map(|u| u.location.clone()),
                    note: entry.and_then(|u| u.note.clone()),
                    timestamp: entry.map(|u| u.created_at),
                }
            })
            .collect();
        Timeline {
            tracking_id: order.tracking_id.clone(),
            order_status: order.status,
            stages,
            last_update: log.last().cloned(),
        }
    }

    /// The number of stages marked complete.
    pub fn completed_stages(&self) -> usize {
        self.stages.iter().filter(|s| s.complete).count()
    }
}
