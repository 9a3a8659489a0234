use thiserror::Error;

use crate::{
    catalog_objects::{CatalogStats, ProductList, ProductQueryFilter, ProductUpdate},
    db_types::{NewProduct, Product},
};

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CatalogApiError {
    #[error("Could not connect to the database. {0}")]
    DatabaseError(String),
    #[error("Product {0} does not exist")]
    ProductNotFound(i64),
    #[error("Invalid product: {0}")]
    ValidationError(String),
    #[error("Invalid product query: {0}")]
    QueryError(String),
    #[error("You do not have permission to modify this product")]
    Forbidden,
}

impl From<sqlx::Error> for CatalogApiError {
    fn from(e: sqlx::Error) -> Self {
        Self::DatabaseError(e.to_string())
    }
}

/// Storage contract for the product catalog.
///
/// Stock mutation during order creation and rejection is deliberately *not* part of this trait.
/// Those writes must be atomic with the order write, so they belong to
/// [`OrderManagement`](crate::traits::OrderManagement).
#[allow(async_fn_in_trait)]
pub trait CatalogManagement {
    async fn insert_product(&self, product: NewProduct) -> Result<Product, CatalogApiError>;

    async fn fetch_product(&self, id: i64) -> Result<Option<Product>, CatalogApiError>;

    /// Fetches a filtered, sorted page of the catalog together with pagination metadata.
    async fn search_products(&self, query: ProductQueryFilter) -> Result<ProductList, CatalogApiError>;

    /// Applies a partial update. Returns `None` if the product does not exist.
    async fn update_product(&self, id: i64, update: ProductUpdate) -> Result<Option<Product>, CatalogApiError>;

    /// Deletes the product, returning the deleted row, or `None` if it did not exist.
    async fn delete_product(&self, id: i64) -> Result<Option<Product>, CatalogApiError>;

    /// Sets the homepage flag on every product in `ids`. Returns the number of rows changed.
    async fn set_show_on_home(&self, ids: &[i64], show: bool) -> Result<u64, CatalogApiError>;

    async fn catalog_stats(&self) -> Result<CatalogStats, CatalogApiError>;

    /// The distinct categories present in the catalog, sorted alphabetically.
    async fn categories(&self) -> Result<Vec<String>, CatalogApiError>;
}
