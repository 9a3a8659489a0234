use actix_web::{
    body::MessageBody,
    http::{header::ContentType, StatusCode},
    test,
    test::TestRequest,
    web,
    web::ServiceConfig,
    App,
};
use chrono::{Duration, TimeZone, Utc};
use log::*;
use seamline_engine::{
    db_types::{
        ImageUrls,
        Order,
        OrderAction,
        OrderStatusType,
        Payment,
        PaymentOption,
        PaymentOptions,
        PaymentStatusType,
        Product,
        Role,
        TrackingId,
    },
    OrderFlowApi,
    PaymentApi,
};
use serde_json::json;
use slm_common::{Money, Secret};

use super::{
    helpers::{get_request, issue_access_token, post_request},
    mocks::MockOrderManager,
};
use crate::{
    auth::JwtClaims,
    config::ServerOptions,
    helpers::calculate_hmac,
    middleware::HmacMiddlewareFactory,
    routes::{PaymentForOrderRoute, PaymentWebhookRoute, RecordPaymentRoute},
};

const PAYMENT_JSON: &str = r#"{"id":1,"order_id":2,"amount":4500,"currency":"USD","customer_email":"asha@example.com","payment_status":"paid","transaction_id":"TXN-1","created_at":"2024-05-03T10:45:00Z"}"#;

const WEBHOOK_SECRET: &str = "c0c9a95301acacd5b1a9dcae0f31280e";
const WEBHOOK_BODY: &str = r#"{"order_id":2,"amount":4500,"transaction_id":"TXN-GW-1"}"#;

//------------------------------------  Buyer payment capture  -------------------------------------------------------

#[actix_web::test]
async fn recording_a_payment_for_an_unpaid_order() {
    let _ = env_logger::try_init().ok();
    let token = valid_token(Role::Buyer);
    let payment = json!({"order_id": 2, "amount": 4500, "transaction_id": "TXN-1"});
    let (status, body) = post_request(&token, "/payments", payment, configure_record_payment).await.unwrap();
    assert!(status.is_success(), "was: {body}");
    assert_eq!(body, PAYMENT_JSON);
}

#[actix_web::test]
async fn payment_amounts_must_match_the_order_price() {
    let _ = env_logger::try_init().ok();
    let token = valid_token(Role::Buyer);
    let payment = json!({"order_id": 2, "amount": 5000, "transaction_id": "TXN-1"});
    let (status, body) = post_request(&token, "/payments", payment, configure_record_payment).await.unwrap();
    assert_eq!(status.as_u16(), StatusCode::BAD_REQUEST.as_u16());
    assert_eq!(body, r#"{"error":"Payment of $50.00 does not match the order price of $45.00"}"#);
}

#[actix_web::test]
async fn paying_for_anothers_order_is_refused() {
    let _ = env_logger::try_init().ok();
    let token = valid_token(Role::Buyer);
    let payment = json!({"order_id": 2, "amount": 4500, "transaction_id": "TXN-1"});
    let (status, body) = post_request(&token, "/payments", payment, configure_foreign_payment).await.unwrap();
    assert_eq!(status.as_u16(), StatusCode::FORBIDDEN.as_u16());
    assert_eq!(body, r#"{"error":"You do not have permission to act on this payment"}"#);
}

#[actix_web::test]
async fn cod_orders_take_no_online_payment() {
    let _ = env_logger::try_init().ok();
    let token = valid_token(Role::Buyer);
    let payment = json!({"order_id": 2, "amount": 4500, "transaction_id": "TXN-1"});
    let (status, body) = post_request(&token, "/payments", payment, configure_cod_payment).await.unwrap();
    assert_eq!(status.as_u16(), StatusCode::BAD_REQUEST.as_u16());
    assert_eq!(body, r#"{"error":"Order 2 does not require an online payment"}"#);
}

#[actix_web::test]
async fn duplicate_captures_return_the_stored_payment() {
    let _ = env_logger::try_init().ok();
    let token = valid_token(Role::Buyer);
    let payment = json!({"order_id": 2, "amount": 4500, "transaction_id": "TXN-1"});
    let (status, body) = post_request(&token, "/payments", payment, configure_duplicate_payment).await.unwrap();
    assert!(status.is_success(), "was: {body}");
    assert_eq!(body, PAYMENT_JSON);
}

//------------------------------------  Payment lookup  --------------------------------------------------------------

#[actix_web::test]
async fn payment_lookup_follows_order_visibility() {
    let _ = env_logger::try_init().ok();
    let token = valid_token(Role::Buyer);
    let (status, body) = get_request(&token, "/payments/2", configure_foreign_lookup).await.unwrap();
    assert_eq!(status.as_u16(), StatusCode::FORBIDDEN.as_u16());
    assert_eq!(body, r#"{"error":"You do not have permission to act on this order"}"#);
}

#[actix_web::test]
async fn payment_lookup_for_the_buyer() {
    let _ = env_logger::try_init().ok();
    let token = valid_token(Role::Buyer);
    let (status, body) = get_request(&token, "/payments/2", configure_own_lookup).await.unwrap();
    assert!(status.is_success(), "was: {body}");
    assert_eq!(body, PAYMENT_JSON);
}

#[actix_web::test]
async fn an_unpaid_order_has_no_payment_record() {
    let _ = env_logger::try_init().ok();
    let token = valid_token(Role::Buyer);
    let (status, body) = get_request(&token, "/payments/2", configure_missing_lookup).await.unwrap();
    assert_eq!(status.as_u16(), StatusCode::NOT_FOUND.as_u16());
    assert_eq!(body, r#"{"error":"No payment has been recorded for order 2"}"#);
}

//------------------------------------  Gateway webhook  -------------------------------------------------------------

#[actix_web::test]
async fn gateway_confirmations_need_a_signature() {
    let _ = env_logger::try_init().ok();
    let err = webhook_request(WEBHOOK_BODY, None, configure_webhook).await.err().unwrap();
    assert_eq!(err, "No HMAC signature found.");
}

#[actix_web::test]
async fn a_bad_signature_is_refused() {
    let _ = env_logger::try_init().ok();
    let signature = calculate_hmac(WEBHOOK_SECRET, b"a different body entirely");
    let err = webhook_request(WEBHOOK_BODY, Some(signature), configure_webhook).await.err().unwrap();
    assert_eq!(err, "Invalid HMAC signature.");
}

#[actix_web::test]
async fn a_signed_confirmation_records_the_payment() {
    let _ = env_logger::try_init().ok();
    let signature = calculate_hmac(WEBHOOK_SECRET, WEBHOOK_BODY.as_bytes());
    let (status, body) = webhook_request(WEBHOOK_BODY, Some(signature), configure_webhook).await.unwrap();
    assert!(status.is_success(), "was: {body}");
    assert_eq!(body, r#"{"success":true,"message":"Payment TXN-GW-1 confirmed."}"#);
}

#[actix_web::test]
async fn confirmed_payments_can_auto_approve_the_order() {
    let _ = env_logger::try_init().ok();
    let signature = calculate_hmac(WEBHOOK_SECRET, WEBHOOK_BODY.as_bytes());
    let (status, body) = webhook_request(WEBHOOK_BODY, Some(signature), configure_webhook_auto_approve).await.unwrap();
    assert!(status.is_success(), "was: {body}");
    assert_eq!(body, r#"{"success":true,"message":"Payment TXN-GW-1 confirmed."}"#);
}

#[actix_web::test]
async fn confirmations_for_unknown_orders_still_answer_200() {
    let _ = env_logger::try_init().ok();
    // Errors are reported in the body only. A non-2xx response would make the gateway re-deliver
    // a confirmation that can never succeed.
    let signature = calculate_hmac(WEBHOOK_SECRET, WEBHOOK_BODY.as_bytes());
    let (status, body) = webhook_request(WEBHOOK_BODY, Some(signature), configure_webhook_unknown_order).await.unwrap();
    assert!(status.is_success(), "was: {body}");
    assert_eq!(body, r#"{"success":false,"message":"Order 2 does not exist"}"#);
}

#[actix_web::test]
async fn hmac_checks_can_be_disabled_for_development() {
    let _ = env_logger::try_init().ok();
    let (status, body) = webhook_request(WEBHOOK_BODY, None, configure_webhook_disabled).await.unwrap();
    assert!(status.is_success(), "was: {body}");
    assert_eq!(body, r#"{"success":true,"message":"Payment TXN-GW-1 confirmed."}"#);
}

//------------------------------------  Fixtures and plumbing  -------------------------------------------------------

async fn webhook_request(
    body: &str,
    signature: Option<String>,
    configure: fn(&mut ServiceConfig),
) -> Result<(StatusCode, String), String> {
    let mut req = TestRequest::post()
        .uri("/webhook/payment")
        .insert_header(ContentType::json())
        .set_payload(body.to_string());
    if let Some(signature) = signature {
        req = req.insert_header(("x-slm-signature", signature));
    }
    let app = App::new().configure(configure);
    let service = test::init_service(app).await;
    let (_req, res) = test::try_call_service(&service, req.to_request()).await.map_err(|e| e.to_string())?.into_parts();
    let status = res.status();
    let body = String::from_utf8_lossy(&res.into_body().try_into_bytes().unwrap()).into_owned();
    debug!("Response body: {body}");
    Ok((status, body))
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

// An order awaiting its online payment.
fn unpaid_order() -> Order {
    Order {
        id: 2,
        tracking_id: TrackingId("TRK-0000000002".to_string()),
        product_id: 7,
        buyer_uid: "uid-900".to_string(),
        buyer_email: "asha@example.com".to_string(),
        first_name: "Asha".to_string(),
        last_name: "Rahman".to_string(),
        contact_number: "+8801712000000".to_string(),
        delivery_address: "12 Mirpur Rd, Dhaka".to_string(),
        notes: None,
        quantity: 1,
        order_price: Money::from_cents(4500),
        payment_option: PaymentOption::PayFirst,
        requires_online_payment: true,
        payment_status: PaymentStatusType::Pending,
        status: OrderStatusType::Pending,
        created_at: Utc.with_ymd_and_hms(2024, 5, 3, 10, 30, 0).unwrap(),
        updated_at: Utc.with_ymd_and_hms(2024, 5, 3, 10, 30, 0).unwrap(),
        approved_at: None,
        cancelled_at: None,
    }
}

fn recorded_payment() -> Payment {
    Payment {
        id: 1,
        order_id: 2,
        amount: Money::from_cents(4500),
        currency: "USD".to_string(),
        customer_email: "asha@example.com".to_string(),
        payment_status: PaymentStatusType::Paid,
        transaction_id: "TXN-1".to_string(),
        created_at: Utc.with_ymd_and_hms(2024, 5, 3, 10, 45, 0).unwrap(),
    }
}

fn gateway_payment() -> Payment {
    Payment { transaction_id: "TXN-GW-1".to_string(), customer_email: String::new(), ..recorded_payment() }
}

fn shirt_product(manager_uid: &str) -> Product {
    Product {
        id: 7,
        name: "Linen shirt".to_string(),
        description: None,
        category: "Shirts".to_string(),
        price: Money::from_cents(4500),
        available_quantity: 20,
        min_order_quantity: 1,
        images: ImageUrls::default(),
        demo_video: None,
        payment_options: PaymentOptions::new(vec![PaymentOption::PayFirst]),
        show_on_home: false,
        manager_uid: manager_uid.to_string(),
        manager_name: "Rina Das".to_string(),
        manager_email: "rina@example.com".to_string(),
        created_at: Utc.with_ymd_and_hms(2024, 5, 1, 8, 0, 0).unwrap(),
        updated_at: Utc.with_ymd_and_hms(2024, 5, 1, 8, 0, 0).unwrap(),
    }
}

fn configure_record_payment(cfg: &mut ServiceConfig) {
    let mut api = MockOrderManager::new();
    api.expect_fetch_order().return_const(Ok(Some(unpaid_order())));
    api.expect_insert_payment()
        .withf(|p| p.customer_email == "asha@example.com" && p.transaction_id == "TXN-1")
        .return_const(Ok((recorded_payment(), true)));
    let api = PaymentApi::new(api);
    cfg.service(RecordPaymentRoute::<MockOrderManager>::new()).app_data(web::Data::new(api));
}

fn configure_foreign_payment(cfg: &mut ServiceConfig) {
    let mut api = MockOrderManager::new();
    let order = Order { buyer_uid: "buyer-2".to_string(), ..unpaid_order() };
    api.expect_fetch_order().return_const(Ok(Some(order)));
    let api = PaymentApi::new(api);
    cfg.service(RecordPaymentRoute::<MockOrderManager>::new()).app_data(web::Data::new(api));
}

fn configure_cod_payment(cfg: &mut ServiceConfig) {
    let mut api = MockOrderManager::new();
    let order = Order { payment_option: PaymentOption::Cod, requires_online_payment: false, ..unpaid_order() };
    api.expect_fetch_order().return_const(Ok(Some(order)));
    let api = PaymentApi::new(api);
    cfg.service(RecordPaymentRoute::<MockOrderManager>::new()).app_data(web::Data::new(api));
}

fn configure_duplicate_payment(cfg: &mut ServiceConfig) {
    let mut api = MockOrderManager::new();
    let order = Order { payment_status: PaymentStatusType::Paid, ..unpaid_order() };
    api.expect_fetch_order().return_const(Ok(Some(order)));
    api.expect_fetch_payment_for_order().withf(|id| *id == 2).return_const(Ok(Some(recorded_payment())));
    let api = PaymentApi::new(api);
    cfg.service(RecordPaymentRoute::<MockOrderManager>::new()).app_data(web::Data::new(api));
}

fn configure_foreign_lookup(cfg: &mut ServiceConfig) {
    let mut orders = MockOrderManager::new();
    let order = Order { buyer_uid: "buyer-2".to_string(), ..unpaid_order() };
    orders.expect_fetch_order().return_const(Ok(Some(order)));
    orders.expect_fetch_product().return_const(Ok(Some(shirt_product("mgr-2"))));
    let payments = PaymentApi::new(MockOrderManager::new());
    cfg.service(PaymentForOrderRoute::<MockOrderManager>::new())
        .app_data(web::Data::new(OrderFlowApi::new(orders)))
        .app_data(web::Data::new(payments));
}

fn configure_own_lookup(cfg: &mut ServiceConfig) {
    let mut orders = MockOrderManager::new();
    orders.expect_fetch_order().return_const(Ok(Some(unpaid_order())));
    orders.expect_fetch_product().return_const(Ok(Some(shirt_product("mgr-2"))));
    let mut payments = MockOrderManager::new();
    payments.expect_fetch_payment_for_order().withf(|id| *id == 2).return_const(Ok(Some(recorded_payment())));
    cfg.service(PaymentForOrderRoute::<MockOrderManager>::new())
        .app_data(web::Data::new(OrderFlowApi::new(orders)))
        .app_data(web::Data::new(PaymentApi::new(payments)));
}

fn configure_missing_lookup(cfg: &mut ServiceConfig) {
    let mut orders = MockOrderManager::new();
    orders.expect_fetch_order().return_const(Ok(Some(unpaid_order())));
    orders.expect_fetch_product().return_const(Ok(Some(shirt_product("mgr-2"))));
    let mut payments = MockOrderManager::new();
    payments.expect_fetch_payment_for_order().return_const(Ok(None));
    cfg.service(PaymentForOrderRoute::<MockOrderManager>::new())
        .app_data(web::Data::new(OrderFlowApi::new(orders)))
        .app_data(web::Data::new(PaymentApi::new(payments)));
}

fn webhook_options(auto_approve: bool) -> ServerOptions {
    ServerOptions { use_x_forwarded_for: false, use_forwarded: false, auto_approve_on_payment: auto_approve }
}

fn webhook_scope(enabled: bool) -> impl actix_web::dev::HttpServiceFactory {
    web::scope("/webhook")
        .wrap(HmacMiddlewareFactory::new("x-slm-signature", Secret::new(WEBHOOK_SECRET.to_string()), enabled))
        .service(PaymentWebhookRoute::<MockOrderManager>::new())
}

// The gateway confirms TXN-GW-1 against order 2, which is awaiting payment.
fn confirming_backend() -> MockOrderManager {
    let mut db = MockOrderManager::new();
    db.expect_fetch_order().return_const(Ok(Some(unpaid_order())));
    db.expect_insert_payment()
        .withf(|p| p.transaction_id == "TXN-GW-1" && p.amount == Money::from_cents(4500))
        .return_const(Ok((gateway_payment(), true)));
    db
}

fn configure_webhook(cfg: &mut ServiceConfig) {
    let payments = PaymentApi::new(confirming_backend());
    let orders = OrderFlowApi::new(MockOrderManager::new());
    cfg.service(webhook_scope(true))
        .app_data(web::Data::new(webhook_options(false)))
        .app_data(web::Data::new(orders))
        .app_data(web::Data::new(payments));
}

fn configure_webhook_auto_approve(cfg: &mut ServiceConfig) {
    let payments = PaymentApi::new(confirming_backend());
    let mut db = MockOrderManager::new();
    db.expect_fetch_order().return_const(Ok(Some(unpaid_order())));
    let approved = Order { status: OrderStatusType::Approved, ..unpaid_order() };
    db.expect_transition_order()
        .withf(|id, action| *id == 2 && *action == OrderAction::Approve)
        .times(1)
        .return_const(Ok(approved));
    cfg.service(webhook_scope(true))
        .app_data(web::Data::new(webhook_options(true)))
        .app_data(web::Data::new(OrderFlowApi::new(db)))
        .app_data(web::Data::new(payments));
}

fn configure_webhook_unknown_order(cfg: &mut ServiceConfig) {
    let mut db = MockOrderManager::new();
    db.expect_fetch_order().return_const(Ok(None));
    cfg.service(webhook_scope(true))
        .app_data(web::Data::new(webhook_options(false)))
        .app_data(web::Data::new(OrderFlowApi::new(MockOrderManager::new())))
        .app_data(web::Data::new(PaymentApi::new(db)));
}

fn configure_webhook_disabled(cfg: &mut ServiceConfig) {
    let payments = PaymentApi::new(confirming_backend());
    let orders = OrderFlowApi::new(MockOrderManager::new());
    cfg.service(webhook_scope(false))
        .app_data(web::Data::new(webhook_options(false)))
        .app_data(web::Data::new(orders))
        .app_data(web::Data::new(payments));
}
