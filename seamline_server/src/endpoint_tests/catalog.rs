use actix_web::{body::MessageBody, http::StatusCode, test, test::TestRequest, web, web::ServiceConfig, App};
use chrono::{Duration, TimeZone, Utc};
use log::*;
use seamline_engine::{
    catalog_objects::{CatalogStats, CategoryCount, Pagination, ProductList},
    db_types::{ImageUrls, PaymentOption, PaymentOptions, Product, Role},
    CatalogApi,
};
use serde_json::json;
use slm_common::Money;

use super::{
    helpers::{get_request, issue_access_token, patch_request, post_request},
    mocks::MockCatalogManager,
};
use crate::{
    auth::JwtClaims,
    routes::{
        BulkShowOnHomeRoute,
        CreateProductRoute,
        MyProductsRoute,
        ProductCategoriesRoute,
        ProductRoute,
        ProductStatsRoute,
        ProductsRoute,
        SetShowOnHomeRoute,
        UpdateProductRoute,
    },
};

const LINEN_SHIRT_JSON: &str = r#"{"id":1,"name":"Linen shirt","description":"Breathable linen","category":"Shirts","price":4500,"available_quantity":20,"min_order_quantity":1,"images":["https://cdn.example.com/p/1.jpg"],"demo_video":null,"payment_options":["COD","PayFirst"],"show_on_home":true,"manager_uid":"uid-900","manager_name":"Asha Rahman","manager_email":"asha@example.com","created_at":"2024-05-01T08:00:00Z","updated_at":"2024-05-01T08:00:00Z"}"#;

const PRODUCTS_JSON: &str = r#"{"products":[{"id":1,"name":"Linen shirt","description":"Breathable linen","category":"Shirts","price":4500,"available_quantity":20,"min_order_quantity":1,"images":["https://cdn.example.com/p/1.jpg"],"demo_video":null,"payment_options":["COD","PayFirst"],"show_on_home":true,"manager_uid":"uid-900","manager_name":"Asha Rahman","manager_email":"asha@example.com","created_at":"2024-05-01T08:00:00Z","updated_at":"2024-05-01T08:00:00Z"},{"id":2,"name":"Denim trousers","description":null,"category":"Trousers","price":7800,"available_quantity":15,"min_order_quantity":2,"images":[],"demo_video":null,"payment_options":["COD"],"show_on_home":false,"manager_uid":"mgr-2","manager_name":"Rina Das","manager_email":"rina@example.com","created_at":"2024-05-02T12:00:00Z","updated_at":"2024-05-02T12:00:00Z"}],"pagination":{"current_page":1,"total_pages":1,"total_items":2,"items_per_page":10}}"#;

const STATS_JSON: &str = r#"{"total_products":2,"products_on_home":1,"total_stock":35,"by_category":[{"category":"Shirts","count":1},{"category":"Trousers","count":1}]}"#;

//------------------------------------  Public catalog routes  -------------------------------------------------------

#[actix_web::test]
async fn product_listing_is_public() {
    let _ = env_logger::try_init().ok();
    let (status, body) = public_get("/api/products?category=Shirts&min_price=1000", configure_search).await;
    assert!(status.is_success(), "was: {body}");
    assert_eq!(body, PRODUCTS_JSON);
}

#[actix_web::test]
async fn single_product_detail() {
    let _ = env_logger::try_init().ok();
    let (status, body) = public_get("/api/products/1", configure_single_product).await;
    assert!(status.is_success(), "was: {body}");
    assert_eq!(body, LINEN_SHIRT_JSON);
}

#[actix_web::test]
async fn unknown_products_are_a_404() {
    let _ = env_logger::try_init().ok();
    let (status, body) = public_get("/api/products/42", configure_missing_product).await;
    assert_eq!(status.as_u16(), StatusCode::NOT_FOUND.as_u16());
    assert_eq!(body, r#"{"error":"The data was not found. Product 42"}"#);
}

#[actix_web::test]
async fn catalog_stats_summarise_the_catalogue() {
    let _ = env_logger::try_init().ok();
    let (status, body) = public_get("/api/products/stats", configure_stats).await;
    assert!(status.is_success(), "was: {body}");
    assert_eq!(body, STATS_JSON);
}

#[actix_web::test]
async fn category_list() {
    let _ = env_logger::try_init().ok();
    let (status, body) = public_get("/api/products/categories", configure_categories).await;
    assert!(status.is_success(), "was: {body}");
    assert_eq!(body, r#"["Shirts","Trousers"]"#);
}

//------------------------------------  Manager catalog routes  ------------------------------------------------------

#[actix_web::test]
async fn my_products_needs_a_manager_role() {
    let _ = env_logger::try_init().ok();
    let token = valid_token(Role::Buyer);
    let err = get_request(&token, "/products/my", configure_my_products).await.err().unwrap();
    assert!(err.contains("Insufficient permissions"), "was: {err}");
}

#[actix_web::test]
async fn my_products_only_shows_the_callers_listings() {
    let _ = env_logger::try_init().ok();
    let token = valid_token(Role::Manager);
    let (status, body) = get_request(&token, "/products/my", configure_my_products).await.unwrap();
    assert!(status.is_success(), "was: {body}");
    assert_eq!(body, format!("[{LINEN_SHIRT_JSON}]"));
}

#[actix_web::test]
async fn listing_a_product_stamps_the_caller_as_manager() {
    let _ = env_logger::try_init().ok();
    let token = valid_token(Role::Manager);
    // The body claims someone else is the manager. The verified claims must win.
    let listing = json!({
        "name": "Linen shirt",
        "category": "Shirts",
        "price": 4500,
        "available_quantity": 20,
        "payment_options": ["COD", "PayFirst"],
        "manager_uid": "someone-else",
        "manager_name": "Impostor",
        "manager_email": "impostor@example.com",
    });
    let (status, body) = post_request(&token, "/products", listing, configure_create_product).await.unwrap();
    assert!(status.is_success(), "was: {body}");
    assert!(body.contains(r#""manager_uid":"uid-900""#), "was: {body}");
}

#[actix_web::test]
async fn buyers_cannot_list_products() {
    let _ = env_logger::try_init().ok();
    let token = valid_token(Role::Buyer);
    let listing = json!({"name": "Linen shirt", "category": "Shirts", "price": 4500, "available_quantity": 20,
        "payment_options": ["COD"]});
    let err = post_request(&token, "/products", listing, configure_create_product).await.err().unwrap();
    assert!(err.contains("Insufficient permissions"), "was: {err}");
}

#[actix_web::test]
async fn managers_cannot_edit_competitors_products() {
    let _ = env_logger::try_init().ok();
    let token = valid_token(Role::Manager);
    let update = json!({"price": 8000});
    let (status, body) = patch_request(&token, "/products/2", update, configure_update_product).await.unwrap();
    assert_eq!(status.as_u16(), StatusCode::FORBIDDEN.as_u16());
    assert_eq!(body, r#"{"error":"You do not have permission to modify this product"}"#);
}

#[actix_web::test]
async fn admins_can_edit_any_product() {
    let _ = env_logger::try_init().ok();
    let token = valid_token(Role::Admin);
    let update = json!({"price": 8000});
    let (status, body) = patch_request(&token, "/products/2", update, configure_update_product).await.unwrap();
    assert!(status.is_success(), "was: {body}");
    assert!(body.contains(r#""price":8000"#), "was: {body}");
}

//------------------------------------  Homepage curation  -----------------------------------------------------------

#[actix_web::test]
async fn homepage_curation_is_admin_only() {
    let _ = env_logger::try_init().ok();
    let token = valid_token(Role::Manager);
    let err = patch_request(&token, "/products/1/show-on-home", json!({"show": true}), configure_show_on_home)
        .await
        .err()
        .unwrap();
    assert!(err.contains("Insufficient permissions"), "was: {err}");
}

#[actix_web::test]
async fn bulk_homepage_curation_reports_the_rows_changed() {
    let _ = env_logger::try_init().ok();
    let token = valid_token(Role::Admin);
    let body = json!({"ids": [1, 2, 9], "show": true});
    let (status, body) = patch_request(&token, "/products/show-on-home", body, configure_bulk_show_on_home).await.unwrap();
    assert!(status.is_success(), "was: {body}");
    assert_eq!(body, r#"{"updated":2}"#);
}

//------------------------------------  Fixtures and plumbing  -------------------------------------------------------

// The catalog read endpoints sit outside the authenticated scope, so these requests run without
// the JWT middleware, exactly as in production.
async fn public_get(path: &str, configure: fn(&mut ServiceConfig)) -> (StatusCode, String) {
    let app = test::init_service(App::new().configure(configure)).await;
    let req = TestRequest::get().uri(path).to_request();
    let (_req, res) = test::call_service(&app, req).await.into_parts();
    let status = res.status();
    let body = String::from_utf8_lossy(&res.into_body().try_into_bytes().unwrap()).into_owned();
    debug!("Response body: {body}");
    (status, body)
}

fn valid_token(role: Role) -> String {
    let claims = JwtClaims {
        sub: "uid-900".to_string(),
        name: "Asha Rahman".to_string(),
        email: "asha@example.com".to_string(),
        role,
        exp: (Utc::now() + Duration::days(1)).timestamp(),
    };
    issue_access_token(&claims)
}

fn linen_shirt() -> Product {
    Product {
        id: 1,
        name: "Linen shirt".to_string(),
        description: Some("Breathable linen".to_string()),
        category: "Shirts".to_string(),
        price: Money::from_cents(4500),
        available_quantity: 20,
        min_order_quantity: 1,
        images: ImageUrls(vec!["https://cdn.example.com/p/1.jpg".to_string()]),
        demo_video: None,
        payment_options: PaymentOptions::new(vec![PaymentOption::Cod, PaymentOption::PayFirst]),
        show_on_home: true,
        manager_uid: "uid-900".to_string(),
        manager_name: "Asha Rahman".to_string(),
        manager_email: "asha@example.com".to_string(),
        created_at: Utc.with_ymd_and_hms(2024, 5, 1, 8, 0, 0).unwrap(),
        updated_at: Utc.with_ymd_and_hms(2024, 5, 1, 8, 0, 0).unwrap(),
    }
}

fn denim_trousers() -> Product {
    Product {
        id: 2,
        name: "Denim trousers".to_string(),
        description: None,
        category: "Trousers".to_string(),
        price: Money::from_cents(7800),
        available_quantity: 15,
        min_order_quantity: 2,
        images: ImageUrls::default(),
        demo_video: None,
        payment_options: PaymentOptions::new(vec![PaymentOption::Cod]),
        show_on_home: false,
        manager_uid: "mgr-2".to_string(),
        manager_name: "Rina Das".to_string(),
        manager_email: "rina@example.com".to_string(),
        created_at: Utc.with_ymd_and_hms(2024, 5, 2, 12, 0, 0).unwrap(),
        updated_at: Utc.with_ymd_and_hms(2024, 5, 2, 12, 0, 0).unwrap(),
    }
}

fn product_list() -> ProductList {
    ProductList { products: vec![linen_shirt(), denim_trousers()], pagination: Pagination::new(2, 1, 10) }
}

fn configure_search(cfg: &mut ServiceConfig) {
    let mut api = MockCatalogManager::new();
    api.expect_search_products()
        .withf(|q| q.category.as_deref() == Some("Shirts") && q.min_price == Some(Money::from_cents(1000)))
        .return_const(Ok(product_list()));
    let api = CatalogApi::new(api);
    cfg.service(ProductsRoute::<MockCatalogManager>::new()).app_data(web::Data::new(api));
}

fn configure_single_product(cfg: &mut ServiceConfig) {
    let mut api = MockCatalogManager::new();
    api.expect_fetch_product().withf(|id| *id == 1).return_const(Ok(Some(linen_shirt())));
    let api = CatalogApi::new(api);
    cfg.service(ProductRoute::<MockCatalogManager>::new()).app_data(web::Data::new(api));
}

fn configure_missing_product(cfg: &mut ServiceConfig) {
    let mut api = MockCatalogManager::new();
    api.expect_fetch_product().return_const(Ok(None));
    let api = CatalogApi::new(api);
    cfg.service(ProductRoute::<MockCatalogManager>::new()).app_data(web::Data::new(api));
}

fn configure_stats(cfg: &mut ServiceConfig) {
    let stats = CatalogStats {
        total_products: 2,
        products_on_home: 1,
        total_stock: 35,
        by_category: vec![
            CategoryCount { category: "Shirts".to_string(), count: 1 },
            CategoryCount { category: "Trousers".to_string(), count: 1 },
        ],
    };
    let mut api = MockCatalogManager::new();
    api.expect_catalog_stats().return_const(Ok(stats));
    let api = CatalogApi::new(api);
    cfg.service(ProductStatsRoute::<MockCatalogManager>::new()).app_data(web::Data::new(api));
}

fn configure_categories(cfg: &mut ServiceConfig) {
    let mut api = MockCatalogManager::new();
    api.expect_categories().return_const(Ok(vec!["Shirts".to_string(), "Trousers".to_string()]));
    let api = CatalogApi::new(api);
    cfg.service(ProductCategoriesRoute::<MockCatalogManager>::new()).app_data(web::Data::new(api));
}

fn configure_my_products(cfg: &mut ServiceConfig) {
    let mut api = MockCatalogManager::new();
    api.expect_search_products()
        .withf(|q| q.manager_uid.as_deref() == Some("uid-900") && q.page() == 1 && q.limit() == 100)
        .return_const(Ok(ProductList { products: vec![linen_shirt()], pagination: Pagination::new(1, 1, 100) }));
    let api = CatalogApi::new(api);
    cfg.service(MyProductsRoute::<MockCatalogManager>::new()).app_data(web::Data::new(api));
}

fn configure_create_product(cfg: &mut ServiceConfig) {
    let mut api = MockCatalogManager::new();
    api.expect_insert_product()
        .withf(|p| {
            p.manager_uid == "uid-900" && p.manager_name == "Asha Rahman" && p.manager_email == "asha@example.com"
        })
        .return_const(Ok(linen_shirt()));
    let api = CatalogApi::new(api);
    cfg.service(CreateProductRoute::<MockCatalogManager>::new()).app_data(web::Data::new(api));
}

fn configure_update_product(cfg: &mut ServiceConfig) {
    let mut api = MockCatalogManager::new();
    api.expect_fetch_product().withf(|id| *id == 2).return_const(Ok(Some(denim_trousers())));
    let updated = Product { price: Money::from_cents(8000), ..denim_trousers() };
    api.expect_update_product().withf(|id, u| *id == 2 && u.price == Some(Money::from_cents(8000))).return_const(Ok(Some(updated)));
    let api = CatalogApi::new(api);
    cfg.service(UpdateProductRoute::<MockCatalogManager>::new()).app_data(web::Data::new(api));
}

fn configure_show_on_home(cfg: &mut ServiceConfig) {
    let api = CatalogApi::new(MockCatalogManager::new());
    cfg.service(SetShowOnHomeRoute::<MockCatalogManager>::new()).app_data(web::Data::new(api));
}

fn configure_bulk_show_on_home(cfg: &mut ServiceConfig) {
    let mut api = MockCatalogManager::new();
    api.expect_set_show_on_home().withf(|ids, show| ids == [1, 2, 9] && *show).return_const(Ok(2u64));
    let api = CatalogApi::new(api);
    cfg.service(BulkShowOnHomeRoute::<MockCatalogManager>::new()).app_data(web::Data::new(api));
}
