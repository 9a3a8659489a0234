use std::str::FromStr;

use cucumber::{then, when};
use seamline_engine::{
    db_types::{FulfilmentStage, NewOrder, NewTrackingUpdate, OrderStatusType, PaymentOption, Role},
    traits::{OrderApiError, OrderManagement},
};

use crate::cucumber::{setups::MANAGER, MarketWorld};

pub async fn place_order(world: &mut MarketWorld, buyer: String, quantity: i64, product: String) {
    let product_id = world.product(&product).id;
    let order = NewOrder::new(product_id, quantity, PaymentOption::Cod)
        .for_buyer(buyer.clone(), format!("{buyer}@example.com"))
        .with_contact(buyer, "Begum".into(), "+8801700000000".into(), "12 Mirpur Road, Dhaka".into());
    let result = world.orders().place_order(order).await;
    world.record(result);
}

#[when(expr = "{word} orders {int} units of {string}")]
async fn order_product(world: &mut MarketWorld, buyer: String, quantity: i64, product: String) {
    place_order(world, buyer, quantity, product).await;
}

#[when("the manager approves the order")]
async fn approve_order(world: &mut MarketWorld) {
    let id = world.current_order().id;
    let result = world.orders().approve_order(id, MANAGER, Role::Manager).await;
    world.record(result);
}

#[when("the manager rejects the order")]
async fn reject_order(world: &mut MarketWorld) {
    let id = world.current_order().id;
    let result = world.orders().reject_order(id, MANAGER, Role::Manager).await;
    world.record(result);
}

#[when(expr = "{word} cancels the order")]
async fn cancel_order(world: &mut MarketWorld, buyer: String) {
    let id = world.current_order().id;
    let result = world.orders().cancel_order(id, &buyer, Role::Buyer).await;
    world.record(result);
}

#[when(expr = "the manager logs {string} at {string}")]
async fn log_tracking(world: &mut MarketWorld, stage: String, location: String) {
    let stage = FulfilmentStage::from_str(&stage).expect("Not a fulfilment stage");
    let id = world.current_order().id;
    let update = NewTrackingUpdate::new(stage, location);
    if let Err(e) = world.orders().add_tracking(id, MANAGER, Role::Manager, update).await {
        world.last_error = Some(e);
    }
}

#[then(expr = "the order is {word}")]
async fn order_status(world: &mut MarketWorld, status: String) {
    let expected = OrderStatusType::from_str(&status).expect("Not an order status");
    let id = world.current_order().id;
    let order = world
        .db()
        .fetch_order(id)
        .await
        .expect("Error fetching order")
        .expect("The order has disappeared");
    assert_eq!(order.status, expected, "Order status is incorrect");
}

#[then("the order is refused for insufficient stock")]
async fn order_refused(world: &mut MarketWorld) {
    match &world.last_error {
        Some(OrderApiError::InsufficientStock { .. }) => {},
        other => panic!("Expected an insufficient stock refusal, got {other:?}"),
    }
}

#[then("the change is refused because the order is no longer pending")]
async fn change_refused(world: &mut MarketWorld) {
    match &world.last_error {
        Some(OrderApiError::IllegalStateChange { .. }) => {},
        other => panic!("Expected an illegal state change refusal, got {other:?}"),
    }
}

#[then("the tracking update is refused")]
async fn tracking_refused(world: &mut MarketWorld) {
    match &world.last_error {
        Some(OrderApiError::TrackingUnavailable { .. }) => {},
        other => panic!("Expected a tracking refusal, got {other:?}"),
    }
}

#[then(expr = "{string} has {int} units in stock")]
async fn check_stock(world: &mut MarketWorld, product: String, stock: i64) {
    let id = world.product(&product).id;
    let product = world
        .catalog()
        .fetch_product(id)
        .await
        .expect("Error fetching product")
        .expect("The product has disappeared");
    assert_eq!(product.available_quantity, stock, "Stock level is incorrect");
}

#[then(expr = "the timeline shows {int} completed stages")]
async fn check_timeline(world: &mut MarketWorld, completed: usize) {
    let order = world.current_order();
    let timeline = world
        .orders()
        .tracking_timeline(order.id, &order.buyer_uid, Role::Buyer)
        .await
        .expect("Error deriving timeline");
    assert_eq!(timeline.completed_stages(), completed, "Completed stage count is incorrect");
}

#[then(expr = "the timeline stage {string} is complete without details")]
async fn check_implied_stage(world: &mut MarketWorld, stage: String) {
    let stage = FulfilmentStage::from_str(&stage).expect("Not a fulfilment stage");
    let order = world.current_order();
    let timeline = world
        .orders()
        .tracking_timeline(order.id, &order.buyer_uid, Role::Buyer)
        .await
        .expect("Error deriving timeline");
    let entry = &timeline.stages[stage.index()];
    assert!(entry.complete, "Stage {stage} should be complete");
    assert!(entry.location.is_none(), "Stage {stage} should carry no location");
    assert!(entry.timestamp.is_none(), "Stage {stage} should carry no timestamp");
}

#[then(expr = "the last update is {string} at {string}")]
async fn check_last_update(world: &mut MarketWorld, stage: String, location: String) {
    let stage = FulfilmentStage::from_str(&stage).expect("Not a fulfilment stage");
    let order = world.current_order();
    let timeline = world
        .orders()
        .tracking_timeline(order.id, &order.buyer_uid, Role::Buyer)
        .await
        .expect("Error deriving timeline");
    let last = timeline.last_update.expect("The fulfilment log is empty");
    assert_eq!(last.stage, stage, "Last update stage is incorrect");
    assert_eq!(last.location, location, "Last update location is incorrect");
}
