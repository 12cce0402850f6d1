use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::{PgPool, Postgres, Transaction};
use tracing::{info, instrument};

use crate::model::{
    NewAfterSale, NewCustomization, NewDiamond, NewOrder, NewOrderItem, NewPayment, NewPreOrder,
    NewRefund, NewRole, NewTenant, NewUser,
};
use crate::store::{AccountStore, DiamondStore, OrderStore, Savepoints, ServiceStore};

/// The single PostgreSQL transaction a run writes through.
///
/// Nothing is visible to other sessions until [`PgTarget::commit`]. Dropping
/// a `PgTarget` without committing rolls everything back.
pub struct PgTarget {
    tx: Transaction<'static, Postgres>,
}

impl PgTarget {
    #[instrument(skip_all)]
    pub async fn begin(pool: &PgPool) -> Result<Self> {
        let tx = pool
            .begin()
            .await
            .context("failed to open target transaction")?;
        Ok(Self { tx })
    }

    pub async fn commit(self) -> Result<()> {
        self.tx
            .commit()
            .await
            .context("failed to commit target transaction")?;
        info!("target transaction committed");
        Ok(())
    }

    pub async fn rollback(self) -> Result<()> {
        self.tx
            .rollback()
            .await
            .context("failed to roll back target transaction")?;
        info!("target transaction rolled back");
        Ok(())
    }

    async fn exec(&mut self, sql: &str) -> Result<()> {
        sqlx::query(sql).execute(&mut *self.tx).await?;
        Ok(())
    }

    async fn id_by_legacy(&mut self, table: &str, legacy_id: i64) -> Result<Option<i64>> {
        let sql = format!("SELECT id FROM {table} WHERE legacy_id = $1");
        let id = sqlx::query_scalar::<_, i64>(&sql)
            .bind(legacy_id)
            .fetch_optional(&mut *self.tx)
            .await?;
        Ok(id)
    }
}

#[async_trait]
impl Savepoints for PgTarget {
    async fn savepoint(&mut self, name: &str) -> Result<()> {
        self.exec(&format!("SAVEPOINT {name}")).await
    }

    async fn rollback_to(&mut self, name: &str) -> Result<()> {
        self.exec(&format!("ROLLBACK TO SAVEPOINT {name}")).await
    }

    async fn release(&mut self, name: &str) -> Result<()> {
        self.exec(&format!("RELEASE SAVEPOINT {name}")).await
    }
}

#[async_trait]
impl AccountStore for PgTarget {
    async fn tenant_id(&mut self, legacy_id: i64) -> Result<Option<i64>> {
        self.id_by_legacy("tenants", legacy_id).await
    }

    async fn role_id(&mut self, legacy_id: i64) -> Result<Option<i64>> {
        self.id_by_legacy("roles", legacy_id).await
    }

    async fn user_id(&mut self, legacy_id: i64) -> Result<Option<i64>> {
        self.id_by_legacy("users", legacy_id).await
    }

    async fn email_taken(&mut self, email: &str) -> Result<bool> {
        let found: bool =
            sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM users WHERE lower(email) = lower($1))")
                .bind(email)
                .fetch_one(&mut *self.tx)
                .await?;
        Ok(found)
    }

    async fn user_role_exists(&mut self, user_id: i64, role_id: i64) -> Result<bool> {
        let found: bool = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM user_roles WHERE user_id = $1 AND role_id = $2)",
        )
        .bind(user_id)
        .bind(role_id)
        .fetch_one(&mut *self.tx)
        .await?;
        Ok(found)
    }

    #[instrument(skip_all)]
    async fn insert_tenant(&mut self, tenant: &NewTenant) -> Result<i64> {
        let id = sqlx::query_scalar::<_, i64>(
            "INSERT INTO tenants (legacy_id, code, name, is_active, created_at) \
             VALUES ($1, $2, $3, $4, COALESCE($5, LOCALTIMESTAMP)) RETURNING id",
        )
        .bind(tenant.legacy_id)
        .bind(&tenant.code)
        .bind(&tenant.name)
        .bind(tenant.is_active)
        .bind(tenant.created_at)
        .fetch_one(&mut *self.tx)
        .await?;
        Ok(id)
    }

    #[instrument(skip_all)]
    async fn insert_role(&mut self, role: &NewRole) -> Result<i64> {
        let id = sqlx::query_scalar::<_, i64>(
            "INSERT INTO roles (legacy_id, tenant_id, code, name) VALUES ($1, $2, $3, $4) RETURNING id",
        )
        .bind(role.legacy_id)
        .bind(role.tenant_id)
        .bind(&role.code)
        .bind(&role.name)
        .fetch_one(&mut *self.tx)
        .await?;
        Ok(id)
    }

    #[instrument(skip_all)]
    async fn insert_user(&mut self, user: &NewUser) -> Result<i64> {
        let id = sqlx::query_scalar::<_, i64>(
            "INSERT INTO users (legacy_id, tenant_id, username, email, phone, password_hash, \
             display_name, is_active, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, COALESCE($9, LOCALTIMESTAMP)) RETURNING id",
        )
        .bind(user.legacy_id)
        .bind(user.tenant_id)
        .bind(&user.username)
        .bind(&user.email)
        .bind(&user.phone)
        .bind(&user.password_hash)
        .bind(&user.display_name)
        .bind(user.is_active)
        .bind(user.created_at)
        .fetch_one(&mut *self.tx)
        .await?;
        Ok(id)
    }

    async fn insert_user_role(&mut self, user_id: i64, role_id: i64) -> Result<()> {
        sqlx::query("INSERT INTO user_roles (user_id, role_id) VALUES ($1, $2)")
            .bind(user_id)
            .bind(role_id)
            .execute(&mut *self.tx)
            .await?;
        Ok(())
    }
}

#[async_trait]
impl OrderStore for PgTarget {
    async fn order_id(&mut self, legacy_id: i64) -> Result<Option<i64>> {
        self.id_by_legacy("orders", legacy_id).await
    }

    async fn order_item_exists(&mut self, legacy_id: i64) -> Result<bool> {
        Ok(self.id_by_legacy("order_items", legacy_id).await?.is_some())
    }

    async fn payment_id(&mut self, legacy_id: i64) -> Result<Option<i64>> {
        self.id_by_legacy("order_payments", legacy_id).await
    }

    async fn refund_exists(&mut self, legacy_id: i64) -> Result<bool> {
        Ok(self.id_by_legacy("order_refunds", legacy_id).await?.is_some())
    }

    async fn customer_id(&mut self, legacy_user_id: i64) -> Result<Option<i64>> {
        self.id_by_legacy("users", legacy_user_id).await
    }

    async fn tenant_id(&mut self, legacy_id: i64) -> Result<Option<i64>> {
        self.id_by_legacy("tenants", legacy_id).await
    }

    #[instrument(skip_all)]
    async fn insert_order(&mut self, order: &NewOrder) -> Result<i64> {
        let id = sqlx::query_scalar::<_, i64>(
            "INSERT INTO orders (legacy_id, order_number, customer_id, tenant_id, status, currency, \
             subtotal, discount, shipping_fee, total, shipping_name, shipping_phone, \
             shipping_address, notes, placed_at, paid_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7::numeric, $8::numeric, $9::numeric, $10::numeric, \
             $11, $12, $13, $14, COALESCE($15, LOCALTIMESTAMP), $16) RETURNING id",
        )
        .bind(order.legacy_id)
        .bind(&order.order_number)
        .bind(order.customer_id)
        .bind(order.tenant_id)
        .bind(order.status.as_str())
        .bind(&order.currency)
        .bind(order.subtotal)
        .bind(order.discount)
        .bind(order.shipping_fee)
        .bind(order.total)
        .bind(&order.shipping_name)
        .bind(&order.shipping_phone)
        .bind(&order.shipping_address)
        .bind(&order.notes)
        .bind(order.placed_at)
        .bind(order.paid_at)
        .fetch_one(&mut *self.tx)
        .await?;
        Ok(id)
    }

    #[instrument(skip_all)]
    async fn insert_order_item(&mut self, item: &NewOrderItem) -> Result<i64> {
        let id = sqlx::query_scalar::<_, i64>(
            "INSERT INTO order_items (legacy_id, order_id, sku, name, quantity, unit_price, \
             line_total, attributes) \
             VALUES ($1, $2, $3, $4, $5, $6::numeric, $7::numeric, $8) RETURNING id",
        )
        .bind(item.legacy_id)
        .bind(item.order_id)
        .bind(&item.sku)
        .bind(&item.name)
        .bind(item.quantity)
        .bind(item.unit_price)
        .bind(item.line_total)
        .bind(&item.attributes)
        .fetch_one(&mut *self.tx)
        .await?;
        Ok(id)
    }

    #[instrument(skip_all)]
    async fn insert_payment(&mut self, payment: &NewPayment) -> Result<i64> {
        let id = sqlx::query_scalar::<_, i64>(
            "INSERT INTO order_payments (legacy_id, order_id, payment_number, channel, amount, \
             status, transaction_ref, paid_at) \
             VALUES ($1, $2, $3, $4, $5::numeric, $6, $7, $8) RETURNING id",
        )
        .bind(payment.legacy_id)
        .bind(payment.order_id)
        .bind(&payment.payment_number)
        .bind(&payment.channel)
        .bind(payment.amount)
        .bind(payment.status.as_str())
        .bind(&payment.transaction_ref)
        .bind(payment.paid_at)
        .fetch_one(&mut *self.tx)
        .await?;
        Ok(id)
    }

    #[instrument(skip_all)]
    async fn insert_refund(&mut self, refund: &NewRefund) -> Result<i64> {
        let id = sqlx::query_scalar::<_, i64>(
            "INSERT INTO order_refunds (legacy_id, order_id, payment_id, refund_number, amount, \
             reason, status, refunded_at) \
             VALUES ($1, $2, $3, $4, $5::numeric, $6, $7, $8) RETURNING id",
        )
        .bind(refund.legacy_id)
        .bind(refund.order_id)
        .bind(refund.payment_id)
        .bind(&refund.refund_number)
        .bind(refund.amount)
        .bind(&refund.reason)
        .bind(refund.status.as_str())
        .bind(refund.refunded_at)
        .fetch_one(&mut *self.tx)
        .await?;
        Ok(id)
    }
}

#[async_trait]
impl ServiceStore for PgTarget {
    async fn order_id(&mut self, legacy_id: i64) -> Result<Option<i64>> {
        self.id_by_legacy("orders", legacy_id).await
    }

    async fn customer_id(&mut self, legacy_user_id: i64) -> Result<Option<i64>> {
        self.id_by_legacy("users", legacy_user_id).await
    }

    async fn after_sale_exists(&mut self, legacy_id: i64) -> Result<bool> {
        Ok(self.id_by_legacy("after_sales", legacy_id).await?.is_some())
    }

    async fn pre_order_exists(&mut self, legacy_id: i64) -> Result<bool> {
        Ok(self.id_by_legacy("pre_orders", legacy_id).await?.is_some())
    }

    async fn customization_exists(&mut self, legacy_id: i64) -> Result<bool> {
        Ok(self.id_by_legacy("customizations", legacy_id).await?.is_some())
    }

    #[instrument(skip_all)]
    async fn insert_after_sale(&mut self, record: &NewAfterSale) -> Result<i64> {
        let id = sqlx::query_scalar::<_, i64>(
            "INSERT INTO after_sales (legacy_id, order_id, kind, status, description, opened_at) \
             VALUES ($1, $2, $3, $4, $5, COALESCE($6, LOCALTIMESTAMP)) RETURNING id",
        )
        .bind(record.legacy_id)
        .bind(record.order_id)
        .bind(record.kind.as_str())
        .bind(record.status.as_str())
        .bind(&record.description)
        .bind(record.opened_at)
        .fetch_one(&mut *self.tx)
        .await?;
        Ok(id)
    }

    #[instrument(skip_all)]
    async fn insert_pre_order(&mut self, record: &NewPreOrder) -> Result<i64> {
        let id = sqlx::query_scalar::<_, i64>(
            "INSERT INTO pre_orders (legacy_id, customer_id, product_name, deposit, expected_at, \
             status, notes) \
             VALUES ($1, $2, $3, $4::numeric, $5, $6, $7) RETURNING id",
        )
        .bind(record.legacy_id)
        .bind(record.customer_id)
        .bind(&record.product_name)
        .bind(record.deposit)
        .bind(record.expected_at)
        .bind(record.status.as_str())
        .bind(&record.notes)
        .fetch_one(&mut *self.tx)
        .await?;
        Ok(id)
    }

    #[instrument(skip_all)]
    async fn insert_customization(&mut self, record: &NewCustomization) -> Result<i64> {
        let id = sqlx::query_scalar::<_, i64>(
            "INSERT INTO customizations (legacy_id, customer_id, order_id, product_name, \
             specification, budget, status) \
             VALUES ($1, $2, $3, $4, $5, $6::numeric, $7) RETURNING id",
        )
        .bind(record.legacy_id)
        .bind(record.customer_id)
        .bind(record.order_id)
        .bind(&record.product_name)
        .bind(&record.specification)
        .bind(record.budget)
        .bind(record.status.as_str())
        .fetch_one(&mut *self.tx)
        .await?;
        Ok(id)
    }
}

#[async_trait]
impl DiamondStore for PgTarget {
    async fn certificate_exists(&mut self, certificate_number: &str) -> Result<bool> {
        let found: bool = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM diamonds WHERE certificate_number = $1)",
        )
        .bind(certificate_number)
        .fetch_one(&mut *self.tx)
        .await?;
        Ok(found)
    }

    async fn diamond_skus(&mut self) -> Result<Vec<String>> {
        let skus = sqlx::query_scalar::<_, String>("SELECT sku FROM diamonds")
            .fetch_all(&mut *self.tx)
            .await?;
        Ok(skus)
    }

    #[instrument(skip_all)]
    async fn insert_diamond(&mut self, d: &NewDiamond) -> Result<i64> {
        let id = sqlx::query_scalar::<_, i64>(
            "INSERT INTO diamonds (sku, certificate_number, grading_lab, supplier_stock_no, shape, \
             carat, color, clarity, cut, polish, symmetry, fluorescence, length_mm, width_mm, \
             height_mm, price, price_per_carat, image_url, video_url) \
             VALUES ($1, $2, $3, $4, $5, $6::numeric, $7, $8, $9, $10, $11, $12, $13::numeric, \
             $14::numeric, $15::numeric, $16::numeric, $17::numeric, $18, $19) RETURNING id",
        )
        .bind(&d.sku)
        .bind(&d.certificate_number)
        .bind(&d.grading_lab)
        .bind(&d.supplier_stock_no)
        .bind(&d.shape)
        .bind(d.carat)
        .bind(&d.color)
        .bind(&d.clarity)
        .bind(&d.cut)
        .bind(&d.polish)
        .bind(&d.symmetry)
        .bind(&d.fluorescence)
        .bind(d.length_mm)
        .bind(d.width_mm)
        .bind(d.height_mm)
        .bind(d.price)
        .bind(d.price_per_carat)
        .bind(&d.image_url)
        .bind(&d.video_url)
        .fetch_one(&mut *self.tx)
        .await?;
        Ok(id)
    }
}
