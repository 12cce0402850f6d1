//! Legacy MySQL rows as read by `MySqlSource`.
//!
//! Money columns arrive as text (the legacy schema mixes DECIMAL and
//! VARCHAR) and go through `transform::parse_price`. IDs and codes are cast
//! in the queries so the Rust types stay fixed whatever the column width.
//! Foreign keys are `Option` because the legacy schema never enforced them;
//! a NULL parent key skips the row instead of failing the whole read.

use chrono::NaiveDateTime;
use sqlx::FromRow;

#[derive(Debug, Clone, Default, PartialEq, FromRow)]
pub struct LegacyTenant {
    pub id: i64,
    pub code: Option<String>,
    pub name: Option<String>,
    pub status: i64,
    pub created_at: Option<NaiveDateTime>,
}

#[derive(Debug, Clone, Default, PartialEq, FromRow)]
pub struct LegacyRole {
    pub id: i64,
    pub tenant_id: Option<i64>,
    pub code: Option<String>,
    pub name: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, FromRow)]
pub struct LegacyUser {
    pub id: i64,
    pub tenant_id: Option<i64>,
    pub username: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub password: Option<String>,
    pub nickname: Option<String>,
    pub status: i64,
    pub deleted: i64,
    pub created_at: Option<NaiveDateTime>,
}

#[derive(Debug, Clone, Default, PartialEq, FromRow)]
pub struct LegacyUserRole {
    pub user_id: Option<i64>,
    pub role_id: Option<i64>,
}

#[derive(Debug, Clone, Default, PartialEq, FromRow)]
pub struct LegacyOrder {
    pub id: i64,
    pub order_no: Option<String>,
    pub user_id: Option<i64>,
    pub tenant_id: Option<i64>,
    pub status: i64,
    pub currency: Option<String>,
    pub goods_amount: Option<String>,
    pub discount_amount: Option<String>,
    pub freight_amount: Option<String>,
    pub pay_amount: Option<String>,
    pub receiver_name: Option<String>,
    pub receiver_phone: Option<String>,
    pub receiver_address: Option<String>,
    pub remark: Option<String>,
    pub created_at: Option<NaiveDateTime>,
    pub paid_at: Option<NaiveDateTime>,
}

#[derive(Debug, Clone, Default, PartialEq, FromRow)]
pub struct LegacyOrderLineItem {
    pub id: i64,
    pub order_id: Option<i64>,
    pub sku: Option<String>,
    pub product_name: Option<String>,
    pub quantity: i64,
    pub unit_price: Option<String>,
    pub total_price: Option<String>,
    pub attributes: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, FromRow)]
pub struct LegacyPayment {
    pub id: i64,
    pub order_id: Option<i64>,
    pub payment_no: Option<String>,
    pub channel: Option<String>,
    pub amount: Option<String>,
    pub status: i64,
    pub transaction_id: Option<String>,
    pub paid_at: Option<NaiveDateTime>,
}

#[derive(Debug, Clone, Default, PartialEq, FromRow)]
pub struct LegacyRefund {
    pub id: i64,
    pub order_id: Option<i64>,
    pub payment_id: Option<i64>,
    pub refund_no: Option<String>,
    pub amount: Option<String>,
    pub reason: Option<String>,
    pub status: i64,
    pub refunded_at: Option<NaiveDateTime>,
}

#[derive(Debug, Clone, Default, PartialEq, FromRow)]
pub struct LegacyAfterSale {
    pub id: i64,
    pub order_id: Option<i64>,
    pub kind: i64,
    pub status: i64,
    pub description: Option<String>,
    pub created_at: Option<NaiveDateTime>,
}

#[derive(Debug, Clone, Default, PartialEq, FromRow)]
pub struct LegacyPreOrder {
    pub id: i64,
    pub user_id: Option<i64>,
    pub product_name: Option<String>,
    pub deposit: Option<String>,
    pub expected_at: Option<NaiveDateTime>,
    pub status: i64,
    pub remark: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, FromRow)]
pub struct LegacyCustomization {
    pub id: i64,
    pub user_id: Option<i64>,
    pub order_id: Option<i64>,
    pub product_name: Option<String>,
    pub specification: Option<String>,
    pub budget: Option<String>,
    pub status: i64,
}
