use anyhow::{Context, Result};
use async_trait::async_trait;
use futures::TryStreamExt;
use sqlx::mysql::MySqlRow;
use sqlx::{FromRow, MySqlPool};
use tracing::{debug, instrument};

use super::model::{
    LegacyAfterSale, LegacyCustomization, LegacyOrder, LegacyOrderLineItem, LegacyPayment,
    LegacyPreOrder, LegacyRefund, LegacyRole, LegacyTenant, LegacyUser, LegacyUserRole,
};

/// Read side of a migration: every legacy table a stage consumes.
#[async_trait]
pub trait LegacySource: Send + Sync {
    async fn tenants(&self) -> Result<Vec<LegacyTenant>>;
    async fn roles(&self) -> Result<Vec<LegacyRole>>;
    async fn users(&self) -> Result<Vec<LegacyUser>>;
    async fn user_roles(&self) -> Result<Vec<LegacyUserRole>>;
    async fn orders(&self) -> Result<Vec<LegacyOrder>>;
    async fn order_line_items(&self) -> Result<Vec<LegacyOrderLineItem>>;
    async fn payments(&self) -> Result<Vec<LegacyPayment>>;
    async fn refunds(&self) -> Result<Vec<LegacyRefund>>;
    async fn after_sales(&self) -> Result<Vec<LegacyAfterSale>>;
    async fn pre_orders(&self) -> Result<Vec<LegacyPreOrder>>;
    async fn customizations(&self) -> Result<Vec<LegacyCustomization>>;
}

const TENANTS_SQL: &str = "SELECT CAST(id AS SIGNED) AS id, code, name, \
     CAST(COALESCE(status, 0) AS SIGNED) AS status, created_at \
     FROM db_tenant ORDER BY id";

const ROLES_SQL: &str = "SELECT CAST(id AS SIGNED) AS id, CAST(tenant_id AS SIGNED) AS tenant_id, \
     role_code AS code, role_name AS name \
     FROM db_role ORDER BY id";

const USERS_SQL: &str = "SELECT CAST(id AS SIGNED) AS id, CAST(tenant_id AS SIGNED) AS tenant_id, \
     username, email, mobile AS phone, password, nickname, \
     CAST(COALESCE(status, 0) AS SIGNED) AS status, \
     CAST(COALESCE(del_flag, 0) AS SIGNED) AS deleted, created_at \
     FROM db_user ORDER BY id";

const USER_ROLES_SQL: &str = "SELECT CAST(user_id AS SIGNED) AS user_id, CAST(role_id AS SIGNED) AS role_id \
     FROM db_user_role ORDER BY user_id, role_id";

const ORDERS_SQL: &str = "SELECT CAST(id AS SIGNED) AS id, order_no, \
     CAST(user_id AS SIGNED) AS user_id, CAST(tenant_id AS SIGNED) AS tenant_id, \
     CAST(COALESCE(status, 0) AS SIGNED) AS status, currency, \
     CAST(goods_amount AS CHAR) AS goods_amount, \
     CAST(discount_amount AS CHAR) AS discount_amount, \
     CAST(freight_amount AS CHAR) AS freight_amount, \
     CAST(pay_amount AS CHAR) AS pay_amount, \
     receiver_name, receiver_phone, receiver_address, remark, created_at, paid_at \
     FROM db_order ORDER BY id";

const LINE_ITEMS_SQL: &str = "SELECT CAST(id AS SIGNED) AS id, CAST(order_id AS SIGNED) AS order_id, \
     sku, product_name, CAST(COALESCE(quantity, 0) AS SIGNED) AS quantity, \
     CAST(unit_price AS CHAR) AS unit_price, CAST(total_price AS CHAR) AS total_price, \
     CAST(attributes AS CHAR) AS attributes \
     FROM db_order_line_item ORDER BY order_id, id";

const PAYMENTS_SQL: &str = "SELECT CAST(id AS SIGNED) AS id, CAST(order_id AS SIGNED) AS order_id, \
     payment_no, pay_channel AS channel, CAST(amount AS CHAR) AS amount, \
     CAST(COALESCE(status, 0) AS SIGNED) AS status, transaction_id, paid_at \
     FROM db_payment_order ORDER BY id";

const REFUNDS_SQL: &str = "SELECT CAST(id AS SIGNED) AS id, CAST(order_id AS SIGNED) AS order_id, \
     CAST(payment_id AS SIGNED) AS payment_id, refund_no, CAST(amount AS CHAR) AS amount, \
     reason, CAST(COALESCE(status, 0) AS SIGNED) AS status, refunded_at \
     FROM db_refund_order ORDER BY id";

const AFTER_SALES_SQL: &str = "SELECT CAST(id AS SIGNED) AS id, CAST(order_id AS SIGNED) AS order_id, \
     CAST(COALESCE(`type`, 0) AS SIGNED) AS kind, CAST(COALESCE(status, 0) AS SIGNED) AS status, \
     description, created_at \
     FROM db_after_sales ORDER BY id";

const PRE_ORDERS_SQL: &str = "SELECT CAST(id AS SIGNED) AS id, CAST(user_id AS SIGNED) AS user_id, \
     product_name, CAST(deposit AS CHAR) AS deposit, expected_at, \
     CAST(COALESCE(status, 0) AS SIGNED) AS status, remark \
     FROM db_pre_order ORDER BY id";

const CUSTOMIZATIONS_SQL: &str = "SELECT CAST(id AS SIGNED) AS id, CAST(user_id AS SIGNED) AS user_id, \
     CAST(order_id AS SIGNED) AS order_id, product_name, \
     CAST(specification AS CHAR) AS specification, CAST(budget AS CHAR) AS budget, \
     CAST(COALESCE(status, 0) AS SIGNED) AS status \
     FROM db_customization ORDER BY id";

/// `LegacySource` over the legacy MySQL schema.
#[derive(Debug, Clone)]
pub struct MySqlSource {
    pool: MySqlPool,
}

impl MySqlSource {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }

    async fn fetch_all<T>(&self, table: &'static str, sql: &'static str) -> Result<Vec<T>>
    where
        T: for<'r> FromRow<'r, MySqlRow> + Send + Unpin,
    {
        let rows: Vec<T> = sqlx::query_as::<_, T>(sql)
            .fetch(&self.pool)
            .try_collect()
            .await
            .with_context(|| format!("failed to read legacy table {table}"))?;
        debug!(table, rows = rows.len(), "read legacy rows");
        Ok(rows)
    }
}

#[async_trait]
impl LegacySource for MySqlSource {
    #[instrument(skip_all)]
    async fn tenants(&self) -> Result<Vec<LegacyTenant>> {
        self.fetch_all("db_tenant", TENANTS_SQL).await
    }

    #[instrument(skip_all)]
    async fn roles(&self) -> Result<Vec<LegacyRole>> {
        self.fetch_all("db_role", ROLES_SQL).await
    }

    #[instrument(skip_all)]
    async fn users(&self) -> Result<Vec<LegacyUser>> {
        self.fetch_all("db_user", USERS_SQL).await
    }

    #[instrument(skip_all)]
    async fn user_roles(&self) -> Result<Vec<LegacyUserRole>> {
        self.fetch_all("db_user_role", USER_ROLES_SQL).await
    }

    #[instrument(skip_all)]
    async fn orders(&self) -> Result<Vec<LegacyOrder>> {
        self.fetch_all("db_order", ORDERS_SQL).await
    }

    #[instrument(skip_all)]
    async fn order_line_items(&self) -> Result<Vec<LegacyOrderLineItem>> {
        self.fetch_all("db_order_line_item", LINE_ITEMS_SQL).await
    }

    #[instrument(skip_all)]
    async fn payments(&self) -> Result<Vec<LegacyPayment>> {
        self.fetch_all("db_payment_order", PAYMENTS_SQL).await
    }

    #[instrument(skip_all)]
    async fn refunds(&self) -> Result<Vec<LegacyRefund>> {
        self.fetch_all("db_refund_order", REFUNDS_SQL).await
    }

    #[instrument(skip_all)]
    async fn after_sales(&self) -> Result<Vec<LegacyAfterSale>> {
        self.fetch_all("db_after_sales", AFTER_SALES_SQL).await
    }

    #[instrument(skip_all)]
    async fn pre_orders(&self) -> Result<Vec<LegacyPreOrder>> {
        self.fetch_all("db_pre_order", PRE_ORDERS_SQL).await
    }

    #[instrument(skip_all)]
    async fn customizations(&self) -> Result<Vec<LegacyCustomization>> {
        self.fetch_all("db_customization", CUSTOMIZATIONS_SQL).await
    }
}
