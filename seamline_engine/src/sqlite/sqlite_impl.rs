//! `SqliteDatabase` is a concrete implementation of a Seamline storage backend.
//!
//! Unsurprisingly, it uses SQLite as the backend and implements all the traits defined in the [`traits`] module.
//!
//! [`traits`]: crate::traits
use std::fmt::Debug;

use log::*;
use sqlx::SqlitePool;

use super::db::{db_url, new_pool, orders, payments, products, tracking, users};
use crate::{
    catalog_objects::{CatalogStats, ProductList, ProductQueryFilter, ProductUpdate},
    db_types::{
        AccountStatus,
        NewOrder,
        NewPayment,
        NewProduct,
        NewSuspension,
        NewTrackingUpdate,
        NewUser,
        Order,
        OrderAction,
        Payment,
        PaymentOption,
        PaymentStatusType,
        Product,
        Role,
        Suspension,
        TrackingId,
        TrackingUpdate,
        User,
    },
    helpers::new_tracking_id,
    order_objects::OrderQueryFilter,
    traits::{
        CatalogApiError,
        CatalogManagement,
        OrderApiError,
        OrderManagement,
        PaymentApiError,
        PaymentManagement,
        UserApiError,
        UserManagement,
    },
    user_objects::ProfileUpdate,
};

#[derive(Clone)]
pub struct SqliteDatabase {
    url: String,
    pool: SqlitePool,
}

impl Debug for SqliteDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "SqliteDatabase ({:?})", self.pool)
    }
}

impl OrderManagement for SqliteDatabase {
    fn url(&self) -> &str {
        self.url.as_str()
    }

    /// Takes a new order and, in a single atomic transaction,
    /// * reserves the requested stock, checking the product's availability and minimum order
    ///   quantity inside the UPDATE itself,
    /// * snapshots the order price from the product as it stands in the same transaction,
    /// * inserts the order with a fresh tracking id.
    ///
    /// The reservation runs *first* so the transaction holds the write lock before any reads.
    /// Concurrent creations serialize on that lock, and the loser sees the decremented stock
    /// rather than a stale snapshot. A failed validation rolls the reservation back.
    async fn create_order(&self, order: NewOrder) -> Result<Order, OrderApiError> {
        let mut tx = self.pool.begin().await?;
        let reserved = products::reserve_stock(order.product_id, order.quantity, &mut tx).await?;
        if reserved == 0 {
            let product = products::fetch_product(order.product_id, &mut tx).await?;
            let err = match product {
                None => OrderApiError::ProductNotFound(order.product_id),
                Some(p) if order.quantity < p.min_order_quantity => {
                    OrderApiError::BelowMinimumQuantity { quantity: order.quantity, min: p.min_order_quantity }
                },
                Some(p) => {
                    OrderApiError::InsufficientStock { available: p.available_quantity, quantity: order.quantity }
                },
            };
            return Err(err);
        }
        let product = products::fetch_product(order.product_id, &mut tx)
            .await?
            .ok_or(OrderApiError::ProductNotFound(order.product_id))?;
        if !product.payment_options.accepts(order.payment_option) {
            return Err(OrderApiError::PaymentOptionNotOffered(order.payment_option));
        }
        let order_price = product.price.checked_mul(order.quantity).ok_or(OrderApiError::PriceOverflow)?;
        let requires_online_payment = order.payment_option == PaymentOption::PayFirst;
        let tracking_id = new_tracking_id();
        let order = orders::insert_order(order, &tracking_id, order_price, requires_online_payment, &mut tx).await?;
        debug!("🗃️ Order #{} saved. {} unit(s) of product {} reserved", order.id, order.quantity, order.product_id);
        tx.commit().await?;
        Ok(order)
    }

    async fn fetch_order(&self, id: i64) -> Result<Option<Order>, OrderApiError> {
        let mut conn = self.pool.acquire().await?;
        let order = orders::fetch_order(id, &mut conn).await?;
        Ok(order)
    }

    async fn fetch_order_by_tracking_id(&self, tracking_id: &TrackingId) -> Result<Option<Order>, OrderApiError> {
        let mut conn = self.pool.acquire().await?;
        let order = orders::fetch_order_by_tracking_id(tracking_id, &mut conn).await?;
        Ok(order)
    }

    async fn search_orders(&self, query: OrderQueryFilter) -> Result<Vec<Order>, OrderApiError> {
        let mut conn = self.pool.acquire().await?;
        let orders = orders::search_orders(query, &mut conn).await?;
        Ok(orders)
    }

    /// Applies the action behind a `status = 'pending'` guard. When the guard misses, the order
    /// is re-read in the same transaction to tell "no such order" apart from "already terminal".
    /// A rejection also returns the reserved stock to the product before the commit.
    async fn transition_order(&self, id: i64, action: OrderAction) -> Result<Order, OrderApiError> {
        let mut tx = self.pool.begin().await?;
        let updated = orders::transition_order(id, action, &mut tx).await?;
        let order = match updated {
            Some(order) => order,
            None => {
                let existing = orders::fetch_order(id, &mut tx).await?.ok_or(OrderApiError::OrderNotFound(id))?;
                return Err(OrderApiError::IllegalStateChange { status: existing.status, action });
            },
        };
        if action == OrderAction::Reject {
            let restored = products::restore_stock(order.product_id, order.quantity, &mut tx).await?;
            if restored == 0 {
                warn!(
                    "🗃️ Order #{id} was rejected but product {} no longer exists. No stock to restore",
                    order.product_id
                );
            } else {
                debug!(
                    "🗃️ {} unit(s) returned to product {} after rejecting order #{id}",
                    order.quantity, order.product_id
                );
            }
        }
        tx.commit().await?;
        Ok(order)
    }

    async fn append_tracking(
        &self,
        order_id: i64,
        update: NewTrackingUpdate,
    ) -> Result<TrackingUpdate, OrderApiError> {
        let mut conn = self.pool.acquire().await?;
        let update = tracking::append_update(order_id, update, &mut conn).await?;
        Ok(update)
    }

    async fn tracking_log(&self, order_id: i64) -> Result<Vec<TrackingUpdate>, OrderApiError> {
        let mut conn = self.pool.acquire().await?;
        let log = tracking::log_for_order(order_id, &mut conn).await?;
        Ok(log)
    }

    async fn close(&mut self) -> Result<(), OrderApiError> {
        self.pool.close().await;
        Ok(())
    }
}

impl CatalogManagement for SqliteDatabase {
    async fn insert_product(&self, product: NewProduct) -> Result<Product, CatalogApiError> {
        let mut conn = self.pool.acquire().await?;
        let product = products::insert_product(product, &mut conn).await?;
        debug!("🗃️ Product #{} saved", product.id);
        Ok(product)
    }

    async fn fetch_product(&self, id: i64) -> Result<Option<Product>, CatalogApiError> {
        let mut conn = self.pool.acquire().await?;
        let product = products::fetch_product(id, &mut conn).await?;
        Ok(product)
    }

    async fn search_products(&self, query: ProductQueryFilter) -> Result<ProductList, CatalogApiError> {
        let mut conn = self.pool.acquire().await?;
        let list = products::search_products(query, &mut conn).await?;
        Ok(list)
    }

    async fn update_product(&self, id: i64, update: ProductUpdate) -> Result<Option<Product>, CatalogApiError> {
        let mut conn = self.pool.acquire().await?;
        let product = products::update_product(id, update, &mut conn).await?;
        Ok(product)
    }

    async fn delete_product(&self, id: i64) -> Result<Option<Product>, CatalogApiError> {
        let mut conn = self.pool.acquire().await?;
        let product = products::delete_product(id, &mut conn).await?;
        Ok(product)
    }

    async fn set_show_on_home(&self, ids: &[i64], show: bool) -> Result<u64, CatalogApiError> {
        let mut conn = self.pool.acquire().await?;
        let n = products::set_show_on_home(ids, show, &mut conn).await?;
        Ok(n)
    }

    async fn catalog_stats(&self) -> Result<CatalogStats, CatalogApiError> {
        let mut conn = self.pool.acquire().await?;
        let stats = products::catalog_stats(&mut conn).await?;
        Ok(stats)
    }

    async fn categories(&self) -> Result<Vec<String>, CatalogApiError> {
        let mut conn = self.pool.acquire().await?;
        let categories = products::categories(&mut conn).await?;
        Ok(categories)
    }
}

impl UserManagement for SqliteDatabase {
    async fn insert_user(&self, user: NewUser) -> Result<(User, bool), UserApiError> {
        let mut tx = self.pool.begin().await?;
        if users::fetch_user_by_uid(&user.uid, &mut tx).await?.is_none() &&
            users::fetch_user_by_email(&user.email, &mut tx).await?.is_some()
        {
            return Err(UserApiError::EmailInUse(user.email));
        }
        let (user, created) = users::idempotent_insert(user, &mut tx).await?;
        tx.commit().await?;
        Ok((user, created))
    }

    async fn fetch_user_by_uid(&self, uid: &str) -> Result<Option<User>, UserApiError> {
        let mut conn = self.pool.acquire().await?;
        let user = users::fetch_user_by_uid(uid, &mut conn).await?;
        Ok(user)
    }

    async fn fetch_user_by_email(&self, email: &str) -> Result<Option<User>, UserApiError> {
        let mut conn = self.pool.acquire().await?;
        let user = users::fetch_user_by_email(email, &mut conn).await?;
        Ok(user)
    }

    async fn search_users(&self, search: Option<&str>) -> Result<Vec<User>, UserApiError> {
        let mut conn = self.pool.acquire().await?;
        let users = users::search_users(search, &mut conn).await?;
        Ok(users)
    }

    async fn update_role(&self, id: i64, role: Role) -> Result<Option<User>, UserApiError> {
        let mut conn = self.pool.acquire().await?;
        let user = users::update_role(id, role, &mut conn).await?;
        Ok(user)
    }

    async fn update_profile(&self, uid: &str, update: ProfileUpdate) -> Result<Option<User>, UserApiError> {
        let mut conn = self.pool.acquire().await?;
        let user = users::update_profile(uid, update, &mut conn).await?;
        Ok(user)
    }

    async fn delete_user(&self, id: i64) -> Result<Option<User>, UserApiError> {
        let mut conn = self.pool.acquire().await?;
        let user = users::delete_user(id, &mut conn).await?;
        Ok(user)
    }

    /// Marks the account suspended and records the reason in a single transaction, so the status
    /// flag and the suspension history can never disagree.
    async fn suspend_user(&self, suspension: NewSuspension) -> Result<Suspension, UserApiError> {
        let mut tx = self.pool.begin().await?;
        let user = users::set_account_status(suspension.user_id, AccountStatus::Suspended, &mut tx)
            .await?
            .ok_or_else(|| UserApiError::UserNotFound(suspension.user_id.to_string()))?;
        let suspension = users::insert_suspension(suspension, &mut tx).await?;
        debug!("🗃️ {} suspended. Reason: {}", user.email, suspension.reason);
        tx.commit().await?;
        Ok(suspension)
    }

    async fn suspensions_for_user(&self, user_id: i64) -> Result<Vec<Suspension>, UserApiError> {
        let mut conn = self.pool.acquire().await?;
        let suspensions = users::suspensions_for_user(user_id, &mut conn).await?;
        Ok(suspensions)
    }
}

impl PaymentManagement for SqliteDatabase {
    /// Saves the payment and marks the order paid in one transaction. A `transaction_id` that has
    /// been seen before short-circuits: the stored payment is returned and the order is left
    /// untouched.
    async fn insert_payment(&self, payment: NewPayment) -> Result<(Payment, bool), PaymentApiError> {
        let mut tx = self.pool.begin().await?;
        let (payment, created) = payments::idempotent_insert(payment, &mut tx).await?;
        if created {
            orders::set_payment_status(payment.order_id, PaymentStatusType::Paid, &mut tx)
                .await?
                .ok_or(PaymentApiError::OrderNotFound(payment.order_id))?;
            debug!("🗃️ Order #{} marked as paid by transaction {}", payment.order_id, payment.transaction_id);
        }
        tx.commit().await?;
        Ok((payment, created))
    }

    async fn fetch_payment_for_order(&self, order_id: i64) -> Result<Option<Payment>, PaymentApiError> {
        let mut conn = self.pool.acquire().await?;
        let payment = payments::fetch_payment_for_order(order_id, &mut conn).await?;
        Ok(payment)
    }
}

impl SqliteDatabase {
    /// Creates a new database API object
    pub async fn new(max_connections: u32) -> Result<Self, sqlx::Error> {
        let url = db_url();
        SqliteDatabase::new_with_url(url.as_str(), max_connections).await
    }

    pub async fn new_with_url(url: &str, max_connections: u32) -> Result<Self, sqlx::Error> {
        trace!("Creating new database connection pool with url {url}");
        let pool = new_pool(url, max_connections).await?;
        let url = url.to_string();
        Ok(Self { url, pool })
    }

    /// Returns a reference to the database connection pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}
