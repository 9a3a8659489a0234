use std::{fmt::Display, str::FromStr};

use serde::{Deserialize, Serialize};
use slm_common::Money;
use sqlx::FromRow;

use crate::db_types::{ConversionError, ImageUrls, PaymentOptions, Product};

pub const DEFAULT_PAGE_SIZE: i64 = 10;
pub const MAX_PAGE_SIZE: i64 = 100;

//--------------------------------------      Sorting        ---------------------------------------------------------

/// The whitelist of catalog sort keys. Everything else is rejected before reaching the query
/// builder.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProductSortKey {
    #[default]
    CreatedAt,
    Price,
    Name,
}

impl ProductSortKey {
    /// The column this key sorts on.
    pub fn column(&self) -> &'static str {
        match self {
            ProductSortKey::CreatedAt => "created_at",
            ProductSortKey::Price => "price",
            ProductSortKey::Name => "name",
        }
    }
}

impl FromStr for ProductSortKey {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "created_at" => Ok(Self::CreatedAt),
            "price" => Ok(Self::Price),
            "name" => Ok(Self::Name),
            s => Err(ConversionError(format!("Invalid sort field: {s}"))),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    #[default]
    Desc,
    Asc,
}

impl SortOrder {
    pub fn sql(&self) -> &'static str {
        match self {
            SortOrder::Desc => "DESC",
            SortOrder::Asc => "ASC",
        }
    }
}

impl FromStr for SortOrder {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "asc" => Ok(Self::Asc),
            "desc" => Ok(Self::Desc),
            s => Err(ConversionError(format!("Invalid sort order: {s}"))),
        }
    }
}

//--------------------------------------  ProductQueryFilter ---------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProductQueryFilter {
    /// Case-insensitive substring match against name and description.
    pub search_text: Option<String>,
    pub category: Option<String>,
    pub min_price: Option<Money>,
    pub max_price: Option<Money>,
    pub show_on_home: Option<bool>,
    pub manager_uid: Option<String>,
    pub sort_by: ProductSortKey,
    pub sort_order: SortOrder,
    pub page: i64,
    pub limit: i64,
}

impl Default for ProductQueryFilter {
    fn default() -> Self {
        Self {
            search_text: None,
            category: None,
            min_price: None,
            max_price: None,
            show_on_home: None,
            manager_uid: None,
            sort_by: ProductSortKey::default(),
            sort_order: SortOrder::default(),
            page: 1,
            limit: DEFAULT_PAGE_SIZE,
        }
    }
}

impl ProductQueryFilter {
    pub fn with_search_text(mut self, text: String) -> Self {
        self.search_text = Some(text);
        self
    }

    pub fn with_category(mut self, category: String) -> Self {
        self.category = Some(category);
        self
    }

    pub fn with_price_range(mut self, min: Option<Money>, max: Option<Money>) -> Self {
        self.min_price = min;
        self.max_price = max;
        self
    }

    pub fn on_home_only(mut self) -> Self {
        self.show_on_home = Some(true);
        self
    }

    pub fn with_manager(mut self, uid: String) -> Self {
        self.manager_uid = Some(uid);
        self
    }

    pub fn with_sort(mut self, key: ProductSortKey, order: SortOrder) -> Self {
        self.sort_by = key;
        self.sort_order = order;
        self
    }

    pub fn with_page(mut self, page: i64, limit: i64) -> Self {
        self.page = page;
        self.limit = limit;
        self
    }

    /// The page number, forced to at least 1.
    pub fn page(&self) -> i64 {
        self.page.max(1)
    }

    /// The page size, clamped to `1..=MAX_PAGE_SIZE`.
    pub fn limit(&self) -> i64 {
        self.limit.clamp(1, MAX_PAGE_SIZE)
    }

    pub fn offset(&self) -> i64 {
        (self.page() - 1) * self.limit()
    }

    pub fn has_filters(&self) -> bool {
        self.search_text.is_some() ||
            self.category.is_some() ||
            self.min_price.is_some() ||
            self.max_price.is_some() ||
            self.show_on_home.is_some() ||
            self.manager_uid.is_some()
    }
}

impl Display for ProductQueryFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if let Some(text) = &self.search_text {
            write!(f, "search: {text}. ")?;
        }
        if let Some(category) = &self.category {
            write!(f, "category: {category}. ")?;
        }
        if let Some(min) = &self.min_price {
            write!(f, "price >= {min}. ")?;
        }
        if let Some(max) = &self.max_price {
            write!(f, "price <= {max}. ")?;
        }
        if let Some(home) = &self.show_on_home {
            write!(f, "on home: {home}. ")?;
        }
        if let Some(uid) = &self.manager_uid {
            write!(f, "manager: {uid}. ")?;
        }
        write!(f, "sort {} {}, page {} ({} per page)", self.sort_by.column(), self.sort_order.sql(), self.page(), self.limit())
    }
}

//--------------------------------------     Pagination      ---------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pagination {
    pub current_page: i64,
    pub total_pages: i64,
    pub total_items: i64,
    pub items_per_page: i64,
}

impl Pagination {
    pub fn new(total_items: i64, page: i64, limit: i64) -> Self {
        let total_pages = if total_items == 0 { 0 } else { (total_items + limit - 1) / limit };
        Self { current_page: page, total_pages, total_items, items_per_page: limit }
    }

    pub fn has_next_page(&self) -> bool {
        self.current_page < self.total_pages
    }
}

/// One page of catalog results plus the pagination metadata for it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductList {
    pub products: Vec<Product>,
    pub pagination: Pagination,
}

//--------------------------------------    CatalogStats     ---------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct CategoryCount {
    pub category: String,
    pub count: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogStats {
    pub total_products: i64,
    pub products_on_home: i64,
    /// Sum of `available_quantity` across the catalog.
    pub total_stock: i64,
    pub by_category: Vec<CategoryCount>,
}

//--------------------------------------    ProductUpdate    ---------------------------------------------------------

/// A partial product update. Only the populated fields are written.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProductUpdate {
    pub name: Option<String>,
    pub description: Option<String>,
    pub category: Option<String>,
    pub price: Option<Money>,
    pub available_quantity: Option<i64>,
    pub min_order_quantity: Option<i64>,
    pub images: Option<ImageUrls>,
    pub demo_video: Option<String>,
    pub payment_options: Option<PaymentOptions>,
}

impl ProductUpdate {
    pub fn with_name(mut self, name: String) -> Self {
        self.name = Some(name);
        self
    }

    pub fn with_price(mut self, price: Money) -> Self {
        self.price = Some(price);
        self
    }

    pub fn with_available_quantity(mut self, quantity: i64) -> Self {
        self.available_quantity = Some(quantity);
        self
    }

    pub fn with_min_order_quantity(mut self, min: i64) -> Self {
        self.min_order_quantity = Some(min);
        self
    }

    pub fn with_payment_options(mut self, options: PaymentOptions) -> Self {
        self.payment_options = Some(options);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.name.is_none() &&
            self.description.is_none() &&
            self.category.is_none() &&
            self.price.is_none() &&
            self.available_quantity.is_none() &&
            self.min_order_quantity.is_none() &&
            self.images.is_none() &&
            self.demo_video.is_none() &&
            self.payment_options.is_none()
    }
}
