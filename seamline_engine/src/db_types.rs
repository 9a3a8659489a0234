use std::{fmt::Display, str::FromStr};

use chrono::{DateTime, Utc};
use log::error;
use serde::{Deserialize, Serialize};
use slm_common::Money;
use sqlx::{FromRow, Type};
use thiserror::Error;

#[derive(Debug, Clone, Error)]
#[error("{0}")]
pub struct ConversionError(pub String);

//--------------------------------------        Role        ---------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum Role {
    /// Places orders and may cancel them while they are still pending.
    #[default]
    Buyer,
    /// Lists products and drives the lifecycle of orders placed against them.
    Manager,
    /// Full access, including user administration and homepage curation.
    Admin,
}

impl Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::Buyer => write!(f, "buyer"),
            Role::Manager => write!(f, "manager"),
            Role::Admin => write!(f, "admin"),
        }
    }
}

impl FromStr for Role {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "buyer" => Ok(Self::Buyer),
            "manager" => Ok(Self::Manager),
            "admin" => Ok(Self::Admin),
            s => Err(ConversionError(format!("Invalid role: {s}"))),
        }
    }
}

//--------------------------------------    AccountStatus    ---------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum AccountStatus {
    /// Freshly registered. May sign in, but is surfaced to admins for review.
    #[default]
    Pending,
    Active,
    /// Suspended accounts are refused new access tokens.
    Suspended,
}

impl Display for AccountStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AccountStatus::Pending => write!(f, "pending"),
            AccountStatus::Active => write!(f, "active"),
            AccountStatus::Suspended => write!(f, "suspended"),
        }
    }
}

impl FromStr for AccountStatus {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "active" => Ok(Self::Active),
            "suspended" => Ok(Self::Suspended),
            s => Err(ConversionError(format!("Invalid account status: {s}"))),
        }
    }
}

//--------------------------------------   OrderStatusType   ---------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum OrderStatusType {
    /// The order has been placed and stock reserved, but the manager has not acted on it yet.
    /// This is the only state a new order can be created in.
    Pending,
    /// The manager has accepted the order. Fulfilment tracking becomes available. Terminal.
    Approved,
    /// The manager has declined the order and the reserved stock has been returned. Terminal.
    Rejected,
    /// The buyer withdrew the order while it was still pending. Terminal.
    Cancelled,
}

impl Display for OrderStatusType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OrderStatusType::Pending => write!(f, "pending"),
            OrderStatusType::Approved => write!(f, "approved"),
            OrderStatusType::Rejected => write!(f, "rejected"),
            OrderStatusType::Cancelled => write!(f, "cancelled"),
        }
    }
}

impl From<String> for OrderStatusType {
    fn from(value: String) -> Self {
        value.parse().unwrap_or_else(|_| {
            error!("Invalid order status: {value}. But this conversion cannot fail. Defaulting to pending");
            OrderStatusType::Pending
        })
    }
}

impl FromStr for OrderStatusType {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "approved" => Ok(Self::Approved),
            "rejected" => Ok(Self::Rejected),
            "cancelled" => Ok(Self::Cancelled),
            s => Err(ConversionError(format!("Invalid order status: {s}"))),
        }
    }
}

//--------------------------------------     OrderAction     ---------------------------------------------------------

/// The three requests that can be made against an order's lifecycle. Whether an action is legal
/// for a given current status is decided in exactly one place, [`crate::policy::check_transition`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderAction {
    Approve,
    Reject,
    Cancel,
}

impl Display for OrderAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OrderAction::Approve => write!(f, "approve"),
            OrderAction::Reject => write!(f, "reject"),
            OrderAction::Cancel => write!(f, "cancel"),
        }
    }
}

//--------------------------------------  PaymentStatusType  ---------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum PaymentStatusType {
    #[default]
    Pending,
    Paid,
}

impl Display for PaymentStatusType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PaymentStatusType::Pending => write!(f, "pending"),
            PaymentStatusType::Paid => write!(f, "paid"),
        }
    }
}

//--------------------------------------    PaymentOption    ---------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Type)]
pub enum PaymentOption {
    /// Cash on delivery. No online payment is collected.
    #[serde(rename = "COD")]
    #[sqlx(rename = "COD")]
    Cod,
    /// Payment must be collected online before fulfilment begins.
    PayFirst,
}

impl Display for PaymentOption {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PaymentOption::Cod => write!(f, "COD"),
            PaymentOption::PayFirst => write!(f, "PayFirst"),
        }
    }
}

impl FromStr for PaymentOption {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "COD" => Ok(Self::Cod),
            "PayFirst" => Ok(Self::PayFirst),
            s => Err(ConversionError(format!("Invalid payment option: {s}"))),
        }
    }
}

//--------------------------------------    PaymentOptions   ---------------------------------------------------------

/// The set of payment options a product accepts. Stored as a comma-separated list in a single
/// text column.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PaymentOptions(Vec<PaymentOption>);

impl PaymentOptions {
    pub fn new(options: Vec<PaymentOption>) -> Self {
        Self(options)
    }

    pub fn accepts(&self, option: PaymentOption) -> bool {
        self.0.contains(&option)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_slice(&self) -> &[PaymentOption] {
        &self.0
    }
}

impl From<Vec<PaymentOption>> for PaymentOptions {
    fn from(options: Vec<PaymentOption>) -> Self {
        Self(options)
    }
}

impl Display for PaymentOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let csv = self.0.iter().map(|o| o.to_string()).collect::<Vec<String>>().join(",");
        write!(f, "{csv}")
    }
}

impl TryFrom<String> for PaymentOptions {
    type Error = ConversionError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        let options = value
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(PaymentOption::from_str)
            .collect::<Result<Vec<PaymentOption>, ConversionError>>()?;
        Ok(Self(options))
    }
}

//--------------------------------------    FulfilmentStage  ---------------------------------------------------------

/// The fixed, ordered sequence of fulfilment milestones. Tracking updates always reference one of
/// these stages; the declaration order here defines the stage index used by the timeline
/// projection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Type)]
pub enum FulfilmentStage {
    #[serde(rename = "Cutting Completed")]
    #[sqlx(rename = "Cutting Completed")]
    CuttingCompleted,
    #[serde(rename = "Sewing Started")]
    #[sqlx(rename = "Sewing Started")]
    SewingStarted,
    Finishing,
    #[serde(rename = "QC Checked")]
    #[sqlx(rename = "QC Checked")]
    QcChecked,
    Packed,
    Shipped,
    #[serde(rename = "Out for Delivery")]
    #[sqlx(rename = "Out for Delivery")]
    OutForDelivery,
    Delivered,
}

impl FulfilmentStage {
    pub const ALL: [FulfilmentStage; 8] = [
        FulfilmentStage::CuttingCompleted,
        FulfilmentStage::SewingStarted,
        FulfilmentStage::Finishing,
        FulfilmentStage::QcChecked,
        FulfilmentStage::Packed,
        FulfilmentStage::Shipped,
        FulfilmentStage::OutForDelivery,
        FulfilmentStage::Delivered,
    ];

    /// Position of this stage in the fulfilment sequence, starting at 0.
    pub fn index(&self) -> usize {
        *self as usize
    }
}

impl Display for FulfilmentStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FulfilmentStage::CuttingCompleted => write!(f, "Cutting Completed"),
            FulfilmentStage::SewingStarted => write!(f, "Sewing Started"),
            FulfilmentStage::Finishing => write!(f, "Finishing"),
            FulfilmentStage::QcChecked => write!(f, "QC Checked"),
            FulfilmentStage::Packed => write!(f, "Packed"),
            FulfilmentStage::Shipped => write!(f, "Shipped"),
            FulfilmentStage::OutForDelivery => write!(f, "Out for Delivery"),
            FulfilmentStage::Delivered => write!(f, "Delivered"),
        }
    }
}

impl FromStr for FulfilmentStage {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Cutting Completed" => Ok(Self::CuttingCompleted),
            "Sewing Started" => Ok(Self::SewingStarted),
            "Finishing" => Ok(Self::Finishing),
            "QC Checked" => Ok(Self::QcChecked),
            "Packed" => Ok(Self::Packed),
            "Shipped" => Ok(Self::Shipped),
            "Out for Delivery" => Ok(Self::OutForDelivery),
            "Delivered" => Ok(Self::Delivered),
            s => Err(ConversionError(format!("Invalid fulfilment stage: {s}"))),
        }
    }
}

//--------------------------------------      TrackingId     ---------------------------------------------------------

/// A lightweight wrapper around the opaque tracking token assigned to every order at creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Type)]
#[sqlx(transparent)]
pub struct TrackingId(pub String);

impl FromStr for TrackingId {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.to_string()))
    }
}

impl From<String> for TrackingId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl Display for TrackingId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TrackingId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

//--------------------------------------      ImageUrls      ---------------------------------------------------------

/// Product image URLs, stored as a JSON array in a single text column.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ImageUrls(pub Vec<String>);

impl ImageUrls {
    pub fn to_json(&self) -> String {
        serde_json::to_string(&self.0).unwrap_or_else(|_| "[]".to_string())
    }
}

impl TryFrom<String> for ImageUrls {
    type Error = serde_json::Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        if value.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_json::from_str(&value).map(Self)
    }
}

//--------------------------------------        User         ---------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: i64,
    /// The subject identifier assigned by the identity provider.
    pub uid: String,
    pub display_name: String,
    pub email: String,
    pub photo_url: Option<String>,
    pub role: Role,
    pub status: AccountStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewUser {
    pub uid: String,
    pub display_name: String,
    pub email: String,
    #[serde(default)]
    pub photo_url: Option<String>,
    #[serde(default)]
    pub role: Role,
    #[serde(default)]
    pub status: AccountStatus,
}

impl NewUser {
    pub fn new(uid: String, display_name: String, email: String) -> Self {
        Self { uid, display_name, email, photo_url: None, role: Role::default(), status: AccountStatus::default() }
    }

    pub fn with_role(mut self, role: Role) -> Self {
        self.role = role;
        self
    }
}

//--------------------------------------       Product       ---------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Product {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub category: String,
    /// Unit price in minor currency units, frozen into `order_price` at order creation.
    pub price: Money,
    pub available_quantity: i64,
    pub min_order_quantity: i64,
    #[sqlx(try_from = "String")]
    pub images: ImageUrls,
    pub demo_video: Option<String>,
    #[sqlx(try_from = "String")]
    pub payment_options: PaymentOptions,
    pub show_on_home: bool,
    /// Owning manager, snapshotted from the creator's claims.
    pub manager_uid: String,
    pub manager_name: String,
    pub manager_email: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewProduct {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub category: String,
    pub price: Money,
    pub available_quantity: i64,
    #[serde(default = "default_min_order_quantity")]
    pub min_order_quantity: i64,
    #[serde(default)]
    pub images: ImageUrls,
    #[serde(default)]
    pub demo_video: Option<String>,
    pub payment_options: PaymentOptions,
    #[serde(default)]
    pub show_on_home: bool,
    // The manager snapshot is always overwritten from the verified claims, never trusted from
    // a request body.
    #[serde(default)]
    pub manager_uid: String,
    #[serde(default)]
    pub manager_name: String,
    #[serde(default)]
    pub manager_email: String,
}

fn default_min_order_quantity() -> i64 {
    1
}

impl NewProduct {
    pub fn new(name: String, category: String, price: Money, available_quantity: i64) -> Self {
        Self {
            name,
            description: None,
            category,
            price,
            available_quantity,
            min_order_quantity: 1,
            images: ImageUrls::default(),
            demo_video: None,
            payment_options: PaymentOptions::new(vec![PaymentOption::Cod]),
            show_on_home: false,
            manager_uid: String::new(),
            manager_name: String::new(),
            manager_email: String::new(),
        }
    }

    pub fn with_manager(mut self, uid: String, name: String, email: String) -> Self {
        self.manager_uid = uid;
        self.manager_name = name;
        self.manager_email = email;
        self
    }

    pub fn with_min_order_quantity(mut self, min: i64) -> Self {
        self.min_order_quantity = min;
        self
    }

    pub fn with_payment_options(mut self, options: PaymentOptions) -> Self {
        self.payment_options = options;
        self
    }
}

//--------------------------------------        Order        ---------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Order {
    pub id: i64,
    pub tracking_id: TrackingId,
    pub product_id: i64,
    pub buyer_uid: String,
    pub buyer_email: String,
    pub first_name: String,
    pub last_name: String,
    pub contact_number: String,
    pub delivery_address: String,
    pub notes: Option<String>,
    pub quantity: i64,
    /// `quantity × product.price` at the instant of creation. Never recomputed.
    pub order_price: Money,
    pub payment_option: PaymentOption,
    pub requires_online_payment: bool,
    pub payment_status: PaymentStatusType,
    pub status: OrderStatusType,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub approved_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewOrder {
    pub product_id: i64,
    pub quantity: i64,
    pub payment_option: PaymentOption,
    /// The buyer identity is always overwritten from the verified claims, never trusted from a
    /// request body.
    #[serde(default)]
    pub buyer_uid: String,
    #[serde(default)]
    pub buyer_email: String,
    pub first_name: String,
    pub last_name: String,
    pub contact_number: String,
    pub delivery_address: String,
    #[serde(default)]
    pub notes: Option<String>,
}

impl NewOrder {
    pub fn new(product_id: i64, quantity: i64, payment_option: PaymentOption) -> Self {
        Self {
            product_id,
            quantity,
            payment_option,
            buyer_uid: String::new(),
            buyer_email: String::new(),
            first_name: String::new(),
            last_name: String::new(),
            contact_number: String::new(),
            delivery_address: String::new(),
            notes: None,
        }
    }

    pub fn for_buyer(mut self, uid: String, email: String) -> Self {
        self.buyer_uid = uid;
        self.buyer_email = email;
        self
    }

    pub fn with_contact(mut self, first: String, last: String, number: String, address: String) -> Self {
        self.first_name = first;
        self.last_name = last;
        self.contact_number = number;
        self.delivery_address = address;
        self
    }

    pub fn with_notes(mut self, notes: String) -> Self {
        self.notes = Some(notes);
        self
    }
}

//--------------------------------------    TrackingUpdate   ---------------------------------------------------------

/// One entry in an order's append-only fulfilment log. Entries are never edited or removed, and
/// the same stage may appear more than once.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct TrackingUpdate {
    pub id: i64,
    pub order_id: i64,
    pub stage: FulfilmentStage,
    pub location: String,
    pub note: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewTrackingUpdate {
    pub stage: FulfilmentStage,
    pub location: String,
    #[serde(default)]
    pub note: Option<String>,
}

impl NewTrackingUpdate {
    pub fn new(stage: FulfilmentStage, location: String) -> Self {
        Self { stage, location, note: None }
    }

    pub fn with_note(mut self, note: String) -> Self {
        self.note = Some(note);
        self
    }
}

//--------------------------------------       Payment       ---------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Payment {
    pub id: i64,
    pub order_id: i64,
    pub amount: Money,
    pub currency: String,
    pub customer_email: String,
    pub payment_status: PaymentStatusType,
    pub transaction_id: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewPayment {
    pub order_id: i64,
    pub amount: Money,
    #[serde(default = "default_currency")]
    pub currency: String,
    #[serde(default)]
    pub customer_email: String,
    pub transaction_id: String,
}

fn default_currency() -> String {
    slm_common::DEFAULT_CURRENCY_CODE.to_string()
}

impl NewPayment {
    pub fn new(order_id: i64, amount: Money, transaction_id: String) -> Self {
        Self { order_id, amount, currency: default_currency(), customer_email: String::new(), transaction_id }
    }
}

//--------------------------------------      Suspension     ---------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Suspension {
    pub id: i64,
    pub user_id: i64,
    pub reason: String,
    pub feedback: Option<String>,
    /// Email address of the admin who imposed the suspension.
    pub suspended_by: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewSuspension {
    pub user_id: i64,
    pub reason: String,
    #[serde(default)]
    pub feedback: Option<String>,
    #[serde(default)]
    pub suspended_by: String,
}
