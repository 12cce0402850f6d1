#![allow(dead_code)]

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use std::collections::HashSet;

use erp_migrate::db::model::{
    LegacyAfterSale, LegacyCustomization, LegacyOrder, LegacyOrderLineItem, LegacyPayment,
    LegacyPreOrder, LegacyRefund, LegacyRole, LegacyTenant, LegacyUser, LegacyUserRole,
};
use erp_migrate::db::LegacySource;
use erp_migrate::model::{
    NewAfterSale, NewCustomization, NewDiamond, NewOrder, NewOrderItem, NewPayment, NewPreOrder,
    NewRefund, NewRole, NewTenant, NewUser,
};
use erp_migrate::store::{AccountStore, DiamondStore, OrderStore, ServiceStore, Savepoints};

/// Legacy tables held in memory.
#[derive(Debug, Clone, Default)]
pub struct FixtureSource {
    pub tenants: Vec<LegacyTenant>,
    pub roles: Vec<LegacyRole>,
    pub users: Vec<LegacyUser>,
    pub user_roles: Vec<LegacyUserRole>,
    pub orders: Vec<LegacyOrder>,
    pub items: Vec<LegacyOrderLineItem>,
    pub payments: Vec<LegacyPayment>,
    pub refunds: Vec<LegacyRefund>,
    pub after_sales: Vec<LegacyAfterSale>,
    pub pre_orders: Vec<LegacyPreOrder>,
    pub customizations: Vec<LegacyCustomization>,
}

#[async_trait]
impl LegacySource for FixtureSource {
    async fn tenants(&self) -> Result<Vec<LegacyTenant>> {
        Ok(self.tenants.clone())
    }
    async fn roles(&self) -> Result<Vec<LegacyRole>> {
        Ok(self.roles.clone())
    }
    async fn users(&self) -> Result<Vec<LegacyUser>> {
        Ok(self.users.clone())
    }
    async fn user_roles(&self) -> Result<Vec<LegacyUserRole>> {
        Ok(self.user_roles.clone())
    }
    async fn orders(&self) -> Result<Vec<LegacyOrder>> {
        Ok(self.orders.clone())
    }
    async fn order_line_items(&self) -> Result<Vec<LegacyOrderLineItem>> {
        Ok(self.items.clone())
    }
    async fn payments(&self) -> Result<Vec<LegacyPayment>> {
        Ok(self.payments.clone())
    }
    async fn refunds(&self) -> Result<Vec<LegacyRefund>> {
        Ok(self.refunds.clone())
    }
    async fn after_sales(&self) -> Result<Vec<LegacyAfterSale>> {
        Ok(self.after_sales.clone())
    }
    async fn pre_orders(&self) -> Result<Vec<LegacyPreOrder>> {
        Ok(self.pre_orders.clone())
    }
    async fn customizations(&self) -> Result<Vec<LegacyCustomization>> {
        Ok(self.customizations.clone())
    }
}

/// Target rows, each paired with its new ID.
#[derive(Debug, Clone, Default)]
pub struct Tables {
    pub next_id: i64,
    pub tenants: Vec<(i64, NewTenant)>,
    pub roles: Vec<(i64, NewRole)>,
    pub users: Vec<(i64, NewUser)>,
    pub user_roles: Vec<(i64, i64)>,
    pub orders: Vec<(i64, NewOrder)>,
    pub items: Vec<(i64, NewOrderItem)>,
    pub payments: Vec<(i64, NewPayment)>,
    pub refunds: Vec<(i64, NewRefund)>,
    pub after_sales: Vec<(i64, NewAfterSale)>,
    pub pre_orders: Vec<(i64, NewPreOrder)>,
    pub customizations: Vec<(i64, NewCustomization)>,
    pub diamonds: Vec<(i64, NewDiamond)>,
}

impl Tables {
    fn allocate(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }
}

fn find<T>(rows: &[(i64, T)], pred: impl Fn(&T) -> bool) -> Option<i64> {
    rows.iter().find(|(_, r)| pred(r)).map(|(id, _)| *id)
}

/// In-memory stand-in for the PostgreSQL transaction. Savepoints snapshot
/// the tables; writes listed in `fail_on` return an error instead, and those
/// in `fail_once` fail only on their first attempt.
#[derive(Debug, Default)]
pub struct MemoryTarget {
    pub tables: Tables,
    snapshots: Vec<Tables>,
    fail_on: HashSet<String>,
    fail_once: HashSet<String>,
    pub savepoint_calls: usize,
}

impl MemoryTarget {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the insert for `table`/`key` fail. Keys are order numbers for
    /// orders, certificate numbers for diamonds and legacy IDs elsewhere.
    pub fn fail_insert(&mut self, table: &str, key: impl ToString) {
        self.fail_on.insert(format!("{table}:{}", key.to_string()));
    }

    pub fn fail_insert_once(&mut self, table: &str, key: impl ToString) {
        self.fail_once.insert(format!("{table}:{}", key.to_string()));
    }

    pub fn open_savepoints(&self) -> usize {
        self.snapshots.len()
    }

    pub fn seed_user(&mut self, legacy_id: i64, email: &str) -> i64 {
        let id = self.tables.allocate();
        self.tables.users.push((
            id,
            NewUser {
                legacy_id,
                tenant_id: None,
                username: format!("user{legacy_id}"),
                email: Some(email.to_string()),
                phone: None,
                password_hash: None,
                display_name: None,
                is_active: true,
                created_at: None,
            },
        ));
        id
    }

    pub fn seed_order(&mut self, legacy_id: i64, order_number: &str) -> i64 {
        let id = self.tables.allocate();
        self.tables.orders.push((
            id,
            NewOrder {
                legacy_id,
                order_number: order_number.to_string(),
                customer_id: None,
                tenant_id: None,
                status: erp_migrate::model::OrderStatus::Paid,
                currency: "USD".into(),
                subtotal: 0.0,
                discount: 0.0,
                shipping_fee: 0.0,
                total: 0.0,
                shipping_name: None,
                shipping_phone: None,
                shipping_address: None,
                notes: None,
                placed_at: None,
                paid_at: None,
            },
        ));
        id
    }

    pub fn seed_diamond_sku(&mut self, sku: &str, certificate_number: &str) {
        let id = self.tables.allocate();
        self.tables.diamonds.push((
            id,
            NewDiamond {
                sku: sku.to_string(),
                certificate_number: certificate_number.to_string(),
                grading_lab: String::new(),
                supplier_stock_no: None,
                shape: None,
                carat: 1.0,
                color: None,
                clarity: None,
                cut: None,
                polish: None,
                symmetry: None,
                fluorescence: None,
                length_mm: 0.0,
                width_mm: 0.0,
                height_mm: 0.0,
                price: 0.0,
                price_per_carat: 0.0,
                image_url: None,
                video_url: None,
            },
        ));
    }

    pub fn diamond(&self, certificate_number: &str) -> Option<&NewDiamond> {
        self.tables
            .diamonds
            .iter()
            .map(|(_, d)| d)
            .find(|d| d.certificate_number == certificate_number)
    }

    fn check(&mut self, table: &str, key: impl ToString) -> Result<()> {
        let key = format!("{table}:{}", key.to_string());
        if self.fail_on.contains(&key) || self.fail_once.remove(&key) {
            return Err(anyhow!("simulated write failure on {key}"));
        }
        Ok(())
    }

    fn lookup_order(&self, legacy_id: i64) -> Option<i64> {
        find(&self.tables.orders, |o| o.legacy_id == legacy_id)
    }

    fn lookup_user(&self, legacy_id: i64) -> Option<i64> {
        find(&self.tables.users, |u| u.legacy_id == legacy_id)
    }

    fn lookup_tenant(&self, legacy_id: i64) -> Option<i64> {
        find(&self.tables.tenants, |t| t.legacy_id == legacy_id)
    }
}

#[async_trait]
impl Savepoints for MemoryTarget {
    async fn savepoint(&mut self, _name: &str) -> Result<()> {
        self.savepoint_calls += 1;
        self.snapshots.push(self.tables.clone());
        Ok(())
    }

    async fn rollback_to(&mut self, name: &str) -> Result<()> {
        let snapshot = self
            .snapshots
            .pop()
            .ok_or_else(|| anyhow!("no savepoint {name}"))?;
        self.tables = snapshot;
        Ok(())
    }

    async fn release(&mut self, name: &str) -> Result<()> {
        self.snapshots
            .pop()
            .map(|_| ())
            .ok_or_else(|| anyhow!("no savepoint {name}"))
    }
}

#[async_trait]
impl AccountStore for MemoryTarget {
    async fn tenant_id(&mut self, legacy_id: i64) -> Result<Option<i64>> {
        Ok(self.lookup_tenant(legacy_id))
    }

    async fn role_id(&mut self, legacy_id: i64) -> Result<Option<i64>> {
        Ok(find(&self.tables.roles, |r| r.legacy_id == legacy_id))
    }

    async fn user_id(&mut self, legacy_id: i64) -> Result<Option<i64>> {
        Ok(self.lookup_user(legacy_id))
    }

    async fn email_taken(&mut self, email: &str) -> Result<bool> {
        Ok(self.tables.users.iter().any(|(_, u)| {
            u.email
                .as_deref()
                .is_some_and(|e| e.eq_ignore_ascii_case(email))
        }))
    }

    async fn user_role_exists(&mut self, user_id: i64, role_id: i64) -> Result<bool> {
        Ok(self.tables.user_roles.contains(&(user_id, role_id)))
    }

    async fn insert_tenant(&mut self, tenant: &NewTenant) -> Result<i64> {
        self.check("tenants", tenant.legacy_id)?;
        let id = self.tables.allocate();
        self.tables.tenants.push((id, tenant.clone()));
        Ok(id)
    }

    async fn insert_role(&mut self, role: &NewRole) -> Result<i64> {
        self.check("roles", role.legacy_id)?;
        let id = self.tables.allocate();
        self.tables.roles.push((id, role.clone()));
        Ok(id)
    }

    async fn insert_user(&mut self, user: &NewUser) -> Result<i64> {
        self.check("users", user.legacy_id)?;
        let id = self.tables.allocate();
        self.tables.users.push((id, user.clone()));
        Ok(id)
    }

    async fn insert_user_role(&mut self, user_id: i64, role_id: i64) -> Result<()> {
        self.tables.user_roles.push((user_id, role_id));
        Ok(())
    }
}

#[async_trait]
impl OrderStore for MemoryTarget {
    async fn order_id(&mut self, legacy_id: i64) -> Result<Option<i64>> {
        Ok(self.lookup_order(legacy_id))
    }

    async fn order_item_exists(&mut self, legacy_id: i64) -> Result<bool> {
        Ok(find(&self.tables.items, |i| i.legacy_id == legacy_id).is_some())
    }

    async fn payment_id(&mut self, legacy_id: i64) -> Result<Option<i64>> {
        Ok(find(&self.tables.payments, |p| p.legacy_id == legacy_id))
    }

    async fn refund_exists(&mut self, legacy_id: i64) -> Result<bool> {
        Ok(find(&self.tables.refunds, |r| r.legacy_id == legacy_id).is_some())
    }

    async fn customer_id(&mut self, legacy_user_id: i64) -> Result<Option<i64>> {
        Ok(self.lookup_user(legacy_user_id))
    }

    async fn tenant_id(&mut self, legacy_id: i64) -> Result<Option<i64>> {
        Ok(self.lookup_tenant(legacy_id))
    }

    async fn insert_order(&mut self, order: &NewOrder) -> Result<i64> {
        self.check("orders", &order.order_number)?;
        let id = self.tables.allocate();
        self.tables.orders.push((id, order.clone()));
        Ok(id)
    }

    async fn insert_order_item(&mut self, item: &NewOrderItem) -> Result<i64> {
        self.check("order_items", item.legacy_id)?;
        let id = self.tables.allocate();
        self.tables.items.push((id, item.clone()));
        Ok(id)
    }

    async fn insert_payment(&mut self, payment: &NewPayment) -> Result<i64> {
        self.check("order_payments", payment.legacy_id)?;
        let id = self.tables.allocate();
        self.tables.payments.push((id, payment.clone()));
        Ok(id)
    }

    async fn insert_refund(&mut self, refund: &NewRefund) -> Result<i64> {
        self.check("order_refunds", refund.legacy_id)?;
        let id = self.tables.allocate();
        self.tables.refunds.push((id, refund.clone()));
        Ok(id)
    }
}

#[async_trait]
impl ServiceStore for MemoryTarget {
    async fn order_id(&mut self, legacy_id: i64) -> Result<Option<i64>> {
        Ok(self.lookup_order(legacy_id))
    }

    async fn customer_id(&mut self, legacy_user_id: i64) -> Result<Option<i64>> {
        Ok(self.lookup_user(legacy_user_id))
    }

    async fn after_sale_exists(&mut self, legacy_id: i64) -> Result<bool> {
        Ok(find(&self.tables.after_sales, |r| r.legacy_id == legacy_id).is_some())
    }

    async fn pre_order_exists(&mut self, legacy_id: i64) -> Result<bool> {
        Ok(find(&self.tables.pre_orders, |r| r.legacy_id == legacy_id).is_some())
    }

    async fn customization_exists(&mut self, legacy_id: i64) -> Result<bool> {
        Ok(find(&self.tables.customizations, |r| r.legacy_id == legacy_id).is_some())
    }

    async fn insert_after_sale(&mut self, record: &NewAfterSale) -> Result<i64> {
        self.check("after_sales", record.legacy_id)?;
        let id = self.tables.allocate();
        self.tables.after_sales.push((id, record.clone()));
        Ok(id)
    }

    async fn insert_pre_order(&mut self, record: &NewPreOrder) -> Result<i64> {
        self.check("pre_orders", record.legacy_id)?;
        let id = self.tables.allocate();
        self.tables.pre_orders.push((id, record.clone()));
        Ok(id)
    }

    async fn insert_customization(&mut self, record: &NewCustomization) -> Result<i64> {
        self.check("customizations", record.legacy_id)?;
        let id = self.tables.allocate();
        self.tables.customizations.push((id, record.clone()));
        Ok(id)
    }
}

#[async_trait]
impl DiamondStore for MemoryTarget {
    async fn certificate_exists(&mut self, certificate_number: &str) -> Result<bool> {
        Ok(self.diamond(certificate_number).is_some())
    }

    async fn diamond_skus(&mut self) -> Result<Vec<String>> {
        Ok(self
            .tables
            .diamonds
            .iter()
            .map(|(_, d)| d.sku.clone())
            .collect())
    }

    async fn insert_diamond(&mut self, diamond: &NewDiamond) -> Result<i64> {
        self.check("diamonds", &diamond.certificate_number)?;
        let id = self.tables.allocate();
        self.tables.diamonds.push((id, diamond.clone()));
        Ok(id)
    }
}
