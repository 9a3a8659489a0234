use log::trace;
use sqlx::{sqlite::SqliteRow, FromRow, QueryBuilder, Sqlite, SqliteConnection};

use crate::{
    catalog_objects::{CatalogStats, Pagination, ProductList, ProductQueryFilter, ProductUpdate},
    db_types::{NewProduct, Product},
};

pub async fn insert_product(product: NewProduct, conn: &mut SqliteConnection) -> Result<Product, sqlx::Error> {
    let product = sqlx::query_as(
        r#"
            INSERT INTO products (
                name,
                description,
                category,
                price,
                available_quantity,
                min_order_quantity,
                images,
                demo_video,
                payment_options,
                manager_uid,
                manager_name,
                manager_email
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            RETURNING *;
        "#,
    )
    .bind(product.name)
    .bind(product.description)
    .bind(product.category)
    .bind(product.price)
    .bind(product.available_quantity)
    .bind(product.min_order_quantity)
    .bind(product.images.to_json())
    .bind(product.demo_video)
    .bind(product.payment_options.to_string())
    .bind(product.manager_uid)
    .bind(product.manager_name)
    .bind(product.manager_email)
    .fetch_one(conn)
    .await?;
    Ok(product)
}

pub async fn fetch_product(id: i64, conn: &mut SqliteConnection) -> Result<Option<Product>, sqlx::Error> {
    let product = sqlx::query_as("SELECT * FROM products WHERE id = $1").bind(id).fetch_optional(conn).await?;
    Ok(product)
}

fn push_product_filters(builder: &mut QueryBuilder<'_, Sqlite>, query: &ProductQueryFilter) {
    if !query.has_filters() {
        return;
    }
    builder.push("WHERE ");
    let mut where_clause = builder.separated(" AND ");
    if let Some(term) = &query.search_text {
        let pattern = format!("%{term}%");
        where_clause.push("(name LIKE ");
        where_clause.push_bind_unseparated(pattern.clone());
        where_clause.push_unseparated(" OR description LIKE ");
        where_clause.push_bind_unseparated(pattern.clone());
        where_clause.push_unseparated(" OR category LIKE ");
        where_clause.push_bind_unseparated(pattern);
        where_clause.push_unseparated(")");
    }
    if let Some(category) = &query.category {
        where_clause.push("category = ");
        where_clause.push_bind_unseparated(category.clone());
    }
    if let Some(min) = query.min_price {
        where_clause.push("price >= ");
        where_clause.push_bind_unseparated(min);
    }
    if let Some(max) = query.max_price {
        where_clause.push("price <= ");
        where_clause.push_bind_unseparated(max);
    }
    if let Some(show) = query.show_on_home {
        where_clause.push("show_on_home = ");
        where_clause.push_bind_unseparated(show);
    }
    if let Some(uid) = &query.manager_uid {
        where_clause.push("manager_uid = ");
        where_clause.push_bind_unseparated(uid.clone());
    }
}

/// Fetches one page of products matching the filter, together with the total count so the caller
/// can report pagination metadata. The count and the page share the same WHERE clause.
pub async fn search_products(
    query: ProductQueryFilter,
    conn: &mut SqliteConnection,
) -> Result<ProductList, sqlx::Error> {
    let mut count = QueryBuilder::new("SELECT COUNT(*) FROM products ");
    push_product_filters(&mut count, &query);
    let total_items: i64 = count.build_query_scalar().fetch_one(&mut *conn).await?;

    let mut builder = QueryBuilder::new("SELECT * FROM products ");
    push_product_filters(&mut builder, &query);
    // The id tiebreak keeps page boundaries stable when the sort column has duplicates
    builder.push(format!(" ORDER BY {0} {1}, id {1}", query.sort_by.column(), query.sort_order.sql()));
    builder.push(" LIMIT ");
    builder.push_bind(query.limit());
    builder.push(" OFFSET ");
    builder.push_bind(query.offset());
    trace!("📝️ Executing query: {}", builder.sql());
    let products = builder.build_query_as::<Product>().fetch_all(conn).await?;
    let pagination = Pagination::new(total_items, query.page(), query.limit());
    Ok(ProductList { products, pagination })
}

/// The stock reservation guard for order creation. Decrements `available_quantity` only when the
/// product exists, has at least `quantity` units left, and `quantity` meets the product's
/// minimum. Returns the number of rows changed; `0` means the reservation failed and the caller
/// must work out why. Run this as the *first* statement of the creation transaction, so the
/// write lock is taken before any reads.
pub(crate) async fn reserve_stock(
    product_id: i64,
    quantity: i64,
    conn: &mut SqliteConnection,
) -> Result<u64, sqlx::Error> {
    let result = sqlx::query(
        "UPDATE products SET available_quantity = available_quantity - $1, updated_at = CURRENT_TIMESTAMP WHERE id = \
         $2 AND available_quantity >= $1 AND min_order_quantity <= $1",
    )
    .bind(quantity)
    .bind(product_id)
    .execute(conn)
    .await?;
    Ok(result.rows_affected())
}

/// The exact inverse of [`reserve_stock`], used when a pending order is rejected. Runs in the
/// same transaction as the order's status change.
pub(crate) async fn restore_stock(
    product_id: i64,
    quantity: i64,
    conn: &mut SqliteConnection,
) -> Result<u64, sqlx::Error> {
    let result = sqlx::query(
        "UPDATE products SET available_quantity = available_quantity + $1, updated_at = CURRENT_TIMESTAMP WHERE id = \
         $2",
    )
    .bind(quantity)
    .bind(product_id)
    .execute(conn)
    .await?;
    Ok(result.rows_affected())
}

pub(crate) async fn update_product(
    id: i64,
    update: ProductUpdate,
    conn: &mut SqliteConnection,
) -> Result<Option<Product>, sqlx::Error> {
    let mut builder = QueryBuilder::new("UPDATE products SET updated_at = CURRENT_TIMESTAMP, ");
    let mut set_clause = builder.separated(", ");
    if let Some(name) = update.name {
        set_clause.push("name = ");
        set_clause.push_bind_unseparated(name);
    }
    if let Some(description) = update.description {
        set_clause.push("description = ");
        set_clause.push_bind_unseparated(description);
    }
    if let Some(category) = update.category {
        set_clause.push("category = ");
        set_clause.push_bind_unseparated(category);
    }
    if let Some(price) = update.price {
        set_clause.push("price = ");
        set_clause.push_bind_unseparated(price);
    }
    if let Some(quantity) = update.available_quantity {
        set_clause.push("available_quantity = ");
        set_clause.push_bind_unseparated(quantity);
    }
    if let Some(min) = update.min_order_quantity {
        set_clause.push("min_order_quantity = ");
        set_clause.push_bind_unseparated(min);
    }
    if let Some(images) = update.images {
        set_clause.push("images = ");
        set_clause.push_bind_unseparated(images.to_json());
    }
    if let Some(video) = update.demo_video {
        set_clause.push("demo_video = ");
        set_clause.push_bind_unseparated(video);
    }
    if let Some(options) = update.payment_options {
        set_clause.push("payment_options = ");
        set_clause.push_bind_unseparated(options.to_string());
    }
    builder.push(" WHERE id = ");
    builder.push_bind(id);
    builder.push(" RETURNING *");
    trace!("📝️ Executing query: {}", builder.sql());
    let res = builder.build().fetch_optional(conn).await?.map(|row: SqliteRow| Product::from_row(&row)).transpose()?;
    Ok(res)
}

pub(crate) async fn delete_product(id: i64, conn: &mut SqliteConnection) -> Result<Option<Product>, sqlx::Error> {
    let product =
        sqlx::query_as("DELETE FROM products WHERE id = $1 RETURNING *").bind(id).fetch_optional(conn).await?;
    Ok(product)
}

pub(crate) async fn set_show_on_home(
    ids: &[i64],
    show: bool,
    conn: &mut SqliteConnection,
) -> Result<u64, sqlx::Error> {
    let mut builder = QueryBuilder::new("UPDATE products SET show_on_home = ");
    builder.push_bind(show);
    builder.push(", updated_at = CURRENT_TIMESTAMP WHERE id IN (");
    let mut ids_clause = builder.separated(", ");
    for id in ids {
        ids_clause.push_bind(*id);
    }
    builder.push(")");
    let result = builder.build().execute(conn).await?;
    Ok(result.rows_affected())
}

pub async fn catalog_stats(conn: &mut SqliteConnection) -> Result<CatalogStats, sqlx::Error> {
    let (total_products, products_on_home, total_stock): (i64, i64, i64) = sqlx::query_as(
        "SELECT COUNT(*), COALESCE(SUM(show_on_home), 0), COALESCE(SUM(available_quantity), 0) FROM products",
    )
    .fetch_one(&mut *conn)
    .await?;
    let by_category =
        sqlx::query_as("SELECT category, COUNT(*) AS count FROM products GROUP BY category ORDER BY count DESC")
            .fetch_all(conn)
            .await?;
    Ok(CatalogStats { total_products, products_on_home, total_stock, by_category })
}

pub async fn categories(conn: &mut SqliteConnection) -> Result<Vec<String>, sqlx::Error> {
    let categories =
        sqlx::query_scalar("SELECT DISTINCT category FROM products ORDER BY category ASC").fetch_all(conn).await?;
    Ok(categories)
}
