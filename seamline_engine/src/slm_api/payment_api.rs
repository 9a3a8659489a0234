use std::fmt::Debug;

use log::*;

use crate::{
    db_types::{NewPayment, Order, Payment, PaymentStatusType},
    traits::{OrderManagement, PaymentApiError, PaymentManagement},
};

/// `PaymentApi` records payment captures against orders. There are two entry paths with
/// different trust levels:
/// * [`record_payment`](Self::record_payment), called on behalf of the buyer, which validates
///   ownership and the amount before anything is stored, and
/// * [`confirm_payment`](Self::confirm_payment), called by the payment gateway's webhook after
///   the server has verified the request signature.
///
/// Both paths are idempotent on the gateway transaction id, so neither client retries nor
/// webhook replays can double-record a payment.
pub struct PaymentApi<B> {
    db: B,
}

impl<B: Debug> Debug for PaymentApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "PaymentApi ({:?})", self.db)
    }
}

impl<B> PaymentApi<B>
where B: PaymentManagement + OrderManagement
{
    pub fn new(db: B) -> Self {
        Self { db }
    }

    /// Records a payment capture submitted by the buyer who owns the order.
    ///
    /// The order must require an online payment, the amount must match the order price exactly,
    /// and the order must not already be paid under a different transaction. Submitting the same
    /// `transaction_id` twice returns the stored record unchanged.
    pub async fn record_payment(&self, caller_uid: &str, payment: NewPayment) -> Result<Payment, PaymentApiError> {
        if payment.transaction_id.trim().is_empty() {
            return Err(PaymentApiError::MissingField("transaction_id"));
        }
        let order = self
            .db
            .fetch_order(payment.order_id)
            .await
            .map_err(PaymentApiError::from)?
            .ok_or(PaymentApiError::OrderNotFound(payment.order_id))?;
        if order.buyer_uid != caller_uid {
            warn!("💳️ {caller_uid} tried to pay for order #{}, which belongs to another buyer", order.id);
            return Err(PaymentApiError::Forbidden);
        }
        if !order.requires_online_payment {
            return Err(PaymentApiError::PaymentNotRequired(order.id));
        }
        if payment.amount != order.order_price {
            return Err(PaymentApiError::AmountMismatch { expected: order.order_price, paid: payment.amount });
        }
        if order.payment_status == PaymentStatusType::Paid {
            if let Some(existing) = self.db.fetch_payment_for_order(order.id).await? {
                if existing.transaction_id == payment.transaction_id {
                    debug!("💳️ Duplicate capture for order #{}; returning the recorded payment", order.id);
                    return Ok(existing);
                }
            }
            return Err(PaymentApiError::AlreadyPaid(order.id));
        }
        let (payment, created) = self.db.insert_payment(payment).await?;
        if created {
            info!(
                "💳️ Payment of {} recorded for order #{} (txn {})",
                payment.amount, payment.order_id, payment.transaction_id
            );
        } else {
            debug!("💳️ Transaction {} was already recorded", payment.transaction_id);
        }
        Ok(payment)
    }

    /// Records a payment confirmation delivered by the gateway. The caller has already verified
    /// the webhook signature, so no ownership check applies here. A mismatched amount is logged
    /// and stored rather than rejected, since at this point the money has moved; reconciliation
    /// is an operator problem, not the gateway's.
    ///
    /// Returns the stored payment together with the freshly-read order, so the caller can decide
    /// whether an automatic approval should follow.
    pub async fn confirm_payment(&self, payment: NewPayment) -> Result<(Payment, Order), PaymentApiError> {
        if payment.transaction_id.trim().is_empty() {
            return Err(PaymentApiError::MissingField("transaction_id"));
        }
        let order = self
            .db
            .fetch_order(payment.order_id)
            .await
            .map_err(PaymentApiError::from)?
            .ok_or(PaymentApiError::OrderNotFound(payment.order_id))?;
        if payment.amount != order.order_price {
            warn!(
                "💳️ The gateway reported {} for order #{}, but the order price is {}. Recording it as given",
                payment.amount, order.id, order.order_price
            );
        }
        if order.payment_status == PaymentStatusType::Paid {
            if let Some(existing) = self.db.fetch_payment_for_order(order.id).await? {
                if existing.transaction_id != payment.transaction_id {
                    warn!(
                        "💳️ Order #{} is already paid under transaction {}. Ignoring the confirmation for {}",
                        order.id, existing.transaction_id, payment.transaction_id
                    );
                }
                return Ok((existing, order));
            }
        }
        let (payment, created) = self.db.insert_payment(payment).await?;
        if created {
            info!("💳️ Gateway confirmed payment of {} for order #{}", payment.amount, payment.order_id);
        } else {
            debug!("💳️ Webhook replay for order #{}; nothing new recorded", payment.order_id);
        }
        let order = self
            .db
            .fetch_order(payment.order_id)
            .await
            .map_err(PaymentApiError::from)?
            .ok_or(PaymentApiError::OrderNotFound(payment.order_id))?;
        Ok((payment, order))
    }

    /// The stored payment for an order. Read scoping is the caller's concern; the route layer
    /// checks order visibility before asking.
    pub async fn payment_for_order(&self, order_id: i64) -> Result<Payment, PaymentApiError> {
        self.db.fetch_payment_for_order(order_id).await?.ok_or(PaymentApiError::PaymentNotFound(order_id))
    }
}
