//! Write-side seams between the migration stages and the target database.
//!
//! `db::target::PgTarget` implements all of these against one PostgreSQL
//! transaction. Lookups by `legacy_id` are what make a re-run skip rows that
//! an earlier run already moved.

use anyhow::Result;
use async_trait::async_trait;

use crate::model::{
    NewAfterSale, NewCustomization, NewDiamond, NewOrder, NewOrderItem, NewPayment, NewPreOrder,
    NewRefund, NewRole, NewTenant, NewUser,
};

#[async_trait]
pub trait Savepoints: Send {
    async fn savepoint(&mut self, name: &str) -> Result<()>;
    async fn rollback_to(&mut self, name: &str) -> Result<()>;
    async fn release(&mut self, name: &str) -> Result<()>;
}

#[async_trait]
pub trait AccountStore: Savepoints {
    async fn tenant_id(&mut self, legacy_id: i64) -> Result<Option<i64>>;
    async fn role_id(&mut self, legacy_id: i64) -> Result<Option<i64>>;
    async fn user_id(&mut self, legacy_id: i64) -> Result<Option<i64>>;
    async fn email_taken(&mut self, email: &str) -> Result<bool>;
    async fn user_role_exists(&mut self, user_id: i64, role_id: i64) -> Result<bool>;

    async fn insert_tenant(&mut self, tenant: &NewTenant) -> Result<i64>;
    async fn insert_role(&mut self, role: &NewRole) -> Result<i64>;
    async fn insert_user(&mut self, user: &NewUser) -> Result<i64>;
    async fn insert_user_role(&mut self, user_id: i64, role_id: i64) -> Result<()>;
}

#[async_trait]
pub trait OrderStore: Savepoints {
    async fn order_id(&mut self, legacy_id: i64) -> Result<Option<i64>>;
    async fn order_item_exists(&mut self, legacy_id: i64) -> Result<bool>;
    async fn payment_id(&mut self, legacy_id: i64) -> Result<Option<i64>>;
    async fn refund_exists(&mut self, legacy_id: i64) -> Result<bool>;
    /// New ID of a migrated customer, if the accounts stage moved them.
    async fn customer_id(&mut self, legacy_user_id: i64) -> Result<Option<i64>>;
    async fn tenant_id(&mut self, legacy_id: i64) -> Result<Option<i64>>;

    async fn insert_order(&mut self, order: &NewOrder) -> Result<i64>;
    async fn insert_order_item(&mut self, item: &NewOrderItem) -> Result<i64>;
    async fn insert_payment(&mut self, payment: &NewPayment) -> Result<i64>;
    async fn insert_refund(&mut self, refund: &NewRefund) -> Result<i64>;
}

#[async_trait]
pub trait ServiceStore: Savepoints {
    async fn order_id(&mut self, legacy_id: i64) -> Result<Option<i64>>;
    async fn customer_id(&mut self, legacy_user_id: i64) -> Result<Option<i64>>;
    async fn after_sale_exists(&mut self, legacy_id: i64) -> Result<bool>;
    async fn pre_order_exists(&mut self, legacy_id: i64) -> Result<bool>;
    async fn customization_exists(&mut self, legacy_id: i64) -> Result<bool>;

    async fn insert_after_sale(&mut self, record: &NewAfterSale) -> Result<i64>;
    async fn insert_pre_order(&mut self, record: &NewPreOrder) -> Result<i64>;
    async fn insert_customization(&mut self, record: &NewCustomization) -> Result<i64>;
}

#[async_trait]
pub trait DiamondStore: Savepoints {
    async fn certificate_exists(&mut self, certificate_number: &str) -> Result<bool>;
    /// All SKUs currently in the diamonds table.
    async fn diamond_skus(&mut self) -> Result<Vec<String>>;
    async fn insert_diamond(&mut self, diamond: &NewDiamond) -> Result<i64>;
}
