use std::fmt::Debug;

use log::*;

use crate::{
    catalog_objects::{CatalogStats, ProductList, ProductQueryFilter, ProductUpdate},
    db_types::{NewProduct, Product, Role},
    slm_api::policy,
    traits::{CatalogApiError, CatalogManagement},
};

/// `CatalogApi` manages the product catalogue: listing, search and pagination, owner-scoped
/// edits, and the admin-curated home page selection. Stock levels are read here but only ever
/// *mutated* by the order lifecycle.
pub struct CatalogApi<B> {
    db: B,
}

impl<B: Debug> Debug for CatalogApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "CatalogApi ({:?})", self.db)
    }
}

impl<B> CatalogApi<B>
where B: CatalogManagement
{
    pub fn new(db: B) -> Self {
        Self { db }
    }

    /// Lists a new product. The manager snapshot fields must already be populated from the
    /// caller's verified identity.
    pub async fn create_product(&self, product: NewProduct) -> Result<Product, CatalogApiError> {
        validate_new_product(&product)?;
        let product = self.db.insert_product(product).await?;
        info!("🧺️ Product #{} '{}' listed by {}", product.id, product.name, product.manager_email);
        Ok(product)
    }

    pub async fn fetch_product(&self, id: i64) -> Result<Option<Product>, CatalogApiError> {
        self.db.fetch_product(id).await
    }

    /// Fetches one page of products matching the filter, with pagination metadata.
    pub async fn search(&self, query: ProductQueryFilter) -> Result<ProductList, CatalogApiError> {
        trace!("🧺️ Searching products. {query}");
        self.db.search_products(query).await
    }

    /// The products owned by `manager_uid`, optionally narrowed by a search term. Not paginated;
    /// a manager's own catalogue is small.
    pub async fn my_products(
        &self,
        manager_uid: &str,
        search_text: Option<String>,
    ) -> Result<Vec<Product>, CatalogApiError> {
        let mut query = ProductQueryFilter::default().with_manager(manager_uid.to_string());
        if let Some(term) = search_text {
            query = query.with_search_text(term);
        }
        let list = self.db.search_products(query.with_page(1, crate::catalog_objects::MAX_PAGE_SIZE)).await?;
        Ok(list.products)
    }

    /// Applies a partial update to a product. `caller_uid` must be an admin or the manager who
    /// owns the listing.
    pub async fn update_product(
        &self,
        id: i64,
        update: ProductUpdate,
        caller_uid: &str,
        role: Role,
    ) -> Result<Product, CatalogApiError> {
        if update.is_empty() {
            return Err(CatalogApiError::ValidationError("The update contains no fields".to_string()));
        }
        validate_product_update(&update)?;
        let existing = self.db.fetch_product(id).await?.ok_or(CatalogApiError::ProductNotFound(id))?;
        if !policy::can_manage(role, caller_uid, &existing.manager_uid) {
            warn!("🧺️ {caller_uid} ({role}) tried to edit product #{id} without permission");
            return Err(CatalogApiError::Forbidden);
        }
        let product = self.db.update_product(id, update).await?.ok_or(CatalogApiError::ProductNotFound(id))?;
        info!("🧺️ Product #{id} updated by {caller_uid}");
        Ok(product)
    }

    /// Removes a product from the catalogue and returns the deleted record. Owner-scoped like
    /// [`update_product`](Self::update_product). Existing orders keep their snapshot of the price
    /// and name, so deletion does not rewrite history.
    pub async fn delete_product(&self, id: i64, caller_uid: &str, role: Role) -> Result<Product, CatalogApiError> {
        let existing = self.db.fetch_product(id).await?.ok_or(CatalogApiError::ProductNotFound(id))?;
        if !policy::can_manage(role, caller_uid, &existing.manager_uid) {
            warn!("🧺️ {caller_uid} ({role}) tried to delete product #{id} without permission");
            return Err(CatalogApiError::Forbidden);
        }
        let product = self.db.delete_product(id).await?.ok_or(CatalogApiError::ProductNotFound(id))?;
        info!("🧺️🗑️ Product #{id} '{}' delisted by {caller_uid}", product.name);
        Ok(product)
    }

    /// Flips the home page flag on a single product. Admin only, enforced at the route layer.
    pub async fn set_show_on_home(&self, id: i64, show: bool) -> Result<Product, CatalogApiError> {
        let n = self.db.set_show_on_home(&[id], show).await?;
        if n == 0 {
            return Err(CatalogApiError::ProductNotFound(id));
        }
        let product = self.db.fetch_product(id).await?.ok_or(CatalogApiError::ProductNotFound(id))?;
        info!("🧺️ Product #{id} {} the home page", if show { "added to" } else { "removed from" });
        Ok(product)
    }

    /// Sets the home page flag on a batch of products in one statement, returning how many rows
    /// changed. Ids that do not exist are skipped rather than reported.
    pub async fn bulk_set_show_on_home(&self, ids: &[i64], show: bool) -> Result<u64, CatalogApiError> {
        if ids.is_empty() {
            return Err(CatalogApiError::ValidationError("No product ids were supplied".to_string()));
        }
        let n = self.db.set_show_on_home(ids, show).await?;
        info!("🧺️ Home page flag set to {show} on {n} of {} product(s)", ids.len());
        Ok(n)
    }

    pub async fn stats(&self) -> Result<CatalogStats, CatalogApiError> {
        self.db.catalog_stats().await
    }

    pub async fn categories(&self) -> Result<Vec<String>, CatalogApiError> {
        self.db.categories().await
    }
}

fn validate_new_product(product: &NewProduct) -> Result<(), CatalogApiError> {
    let required = [
        ("name", &product.name),
        ("category", &product.category),
        ("manager_uid", &product.manager_uid),
        ("manager_email", &product.manager_email),
    ];
    for (field, value) in required {
        if value.trim().is_empty() {
            return Err(CatalogApiError::ValidationError(format!("{field} must not be empty")));
        }
    }
    if product.price.value() <= 0 {
        return Err(CatalogApiError::ValidationError("The price must be positive".to_string()));
    }
    if product.available_quantity < 0 {
        return Err(CatalogApiError::ValidationError("The available quantity cannot be negative".to_string()));
    }
    if product.min_order_quantity < 1 {
        return Err(CatalogApiError::ValidationError("The minimum order quantity must be at least 1".to_string()));
    }
    if product.payment_options.is_empty() {
        return Err(CatalogApiError::ValidationError("At least one payment option is required".to_string()));
    }
    Ok(())
}

fn validate_product_update(update: &ProductUpdate) -> Result<(), CatalogApiError> {
    if matches!(&update.name, Some(name) if name.trim().is_empty()) {
        return Err(CatalogApiError::ValidationError("name must not be empty".to_string()));
    }
    if matches!(&update.category, Some(cat) if cat.trim().is_empty()) {
        return Err(CatalogApiError::ValidationError("category must not be empty".to_string()));
    }
    if matches!(update.price, Some(price) if price.value() <= 0) {
        return Err(CatalogApiError::ValidationError("The price must be positive".to_string()));
    }
    if matches!(update.available_quantity, Some(q) if q < 0) {
        return Err(CatalogApiError::ValidationError("The available quantity cannot be negative".to_string()));
    }
    if matches!(update.min_order_quantity, Some(q) if q < 1) {
        return Err(CatalogApiError::ValidationError("The minimum order quantity must be at least 1".to_string()));
    }
    if matches!(&update.payment_options, Some(opts) if opts.is_empty()) {
        return Err(CatalogApiError::ValidationError("At least one payment option is required".to_string()));
    }
    Ok(())
}
