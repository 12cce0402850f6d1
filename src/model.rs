use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Pending,
    Paid,
    Shipped,
    Completed,
    Cancelled,
    Refunded,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Paid => "paid",
            OrderStatus::Shipped => "shipped",
            OrderStatus::Completed => "completed",
            OrderStatus::Cancelled => "cancelled",
            OrderStatus::Refunded => "refunded",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Pending,
    Succeeded,
    Failed,
    Closed,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Succeeded => "succeeded",
            PaymentStatus::Failed => "failed",
            PaymentStatus::Closed => "closed",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RefundStatus {
    Requested,
    Approved,
    Rejected,
    Refunded,
}

impl RefundStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RefundStatus::Requested => "requested",
            RefundStatus::Approved => "approved",
            RefundStatus::Rejected => "rejected",
            RefundStatus::Refunded => "refunded",
        }
    }
}

/// Lifecycle shared by after-sales, pre-order and customization records.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ServiceStatus {
    Open,
    InProgress,
    Closed,
    Cancelled,
}

impl ServiceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ServiceStatus::Open => "open",
            ServiceStatus::InProgress => "in_progress",
            ServiceStatus::Closed => "closed",
            ServiceStatus::Cancelled => "cancelled",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AfterSaleKind {
    Return,
    Exchange,
    Repair,
    Resize,
    Other,
}

impl AfterSaleKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AfterSaleKind::Return => "return",
            AfterSaleKind::Exchange => "exchange",
            AfterSaleKind::Repair => "repair",
            AfterSaleKind::Resize => "resize",
            AfterSaleKind::Other => "other",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewTenant {
    pub legacy_id: i64,
    pub code: String,
    pub name: String,
    pub is_active: bool,
    pub created_at: Option<NaiveDateTime>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewRole {
    pub legacy_id: i64,
    pub tenant_id: i64,
    pub code: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewUser {
    pub legacy_id: i64,
    pub tenant_id: Option<i64>,
    pub username: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub password_hash: Option<String>,
    pub display_name: Option<String>,
    pub is_active: bool,
    pub created_at: Option<NaiveDateTime>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewOrder {
    pub legacy_id: i64,
    pub order_number: String,
    pub customer_id: Option<i64>,
    pub tenant_id: Option<i64>,
    pub status: OrderStatus,
    pub currency: String,
    pub subtotal: f64,
    pub discount: f64,
    pub shipping_fee: f64,
    pub total: f64,
    pub shipping_name: Option<String>,
    pub shipping_phone: Option<String>,
    pub shipping_address: Option<String>,
    pub notes: Option<String>,
    pub placed_at: Option<NaiveDateTime>,
    pub paid_at: Option<NaiveDateTime>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewOrderItem {
    pub legacy_id: i64,
    pub order_id: i64,
    pub sku: Option<String>,
    pub name: String,
    pub quantity: i32,
    pub unit_price: f64,
    pub line_total: f64,
    pub attributes: serde_json::Value,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewPayment {
    pub legacy_id: i64,
    pub order_id: i64,
    pub payment_number: String,
    pub channel: Option<String>,
    pub amount: f64,
    pub status: PaymentStatus,
    pub transaction_ref: Option<String>,
    pub paid_at: Option<NaiveDateTime>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewRefund {
    pub legacy_id: i64,
    pub order_id: i64,
    pub payment_id: Option<i64>,
    pub refund_number: String,
    pub amount: f64,
    pub reason: Option<String>,
    pub status: RefundStatus,
    pub refunded_at: Option<NaiveDateTime>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewAfterSale {
    pub legacy_id: i64,
    pub order_id: i64,
    pub kind: AfterSaleKind,
    pub status: ServiceStatus,
    pub description: Option<String>,
    pub opened_at: Option<NaiveDateTime>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewPreOrder {
    pub legacy_id: i64,
    pub customer_id: i64,
    pub product_name: String,
    pub deposit: f64,
    pub expected_at: Option<NaiveDateTime>,
    pub status: ServiceStatus,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewCustomization {
    pub legacy_id: i64,
    pub customer_id: Option<i64>,
    pub order_id: Option<i64>,
    pub product_name: String,
    pub specification: serde_json::Value,
    pub budget: f64,
    pub status: ServiceStatus,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewDiamond {
    pub sku: String,
    pub certificate_number: String,
    pub grading_lab: String,
    pub supplier_stock_no: Option<String>,
    pub shape: Option<String>,
    pub carat: f64,
    pub color: Option<String>,
    pub clarity: Option<String>,
    pub cut: Option<String>,
    pub polish: Option<String>,
    pub symmetry: Option<String>,
    pub fluorescence: Option<String>,
    pub length_mm: f64,
    pub width_mm: f64,
    pub height_mm: f64,
    pub price: f64,
    pub price_per_carat: f64,
    pub image_url: Option<String>,
    pub video_url: Option<String>,
}
