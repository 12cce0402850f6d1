//! Orders and everything hanging off them: line items, payments, refunds.

use anyhow::{Context, Result};
use tracing::{instrument, warn};

use crate::db::model::{LegacyOrder, LegacyOrderLineItem, LegacyPayment, LegacyRefund};
use crate::db::LegacySource;
use crate::model::{
    NewOrder, NewOrderItem, NewPayment, NewRefund, OrderStatus, PaymentStatus, RefundStatus,
};
use crate::pipeline::{RowOutcome, RowPolicy, Stage, StageReport};
use crate::store::OrderStore;
use crate::transform::{
    clean_text, json_or_text, order_status, parse_price, payment_status, refund_status,
};

const ALREADY_MIGRATED: &str = "already migrated";
const DEFAULT_CURRENCY: &str = "USD";
const MISSING_ORDER: &str = "missing order id";

fn price(raw: &Option<String>) -> f64 {
    raw.as_deref().map(parse_price).unwrap_or(0.0)
}

fn round_cents(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

fn parent_missing(order_id: i64) -> RowOutcome {
    RowOutcome::skipped(format!("order {order_id} not migrated"))
}

/// Build the target order. `Err` carries the reason the row is skipped.
pub fn order_from_legacy(
    row: &LegacyOrder,
    customer_id: Option<i64>,
    tenant_id: Option<i64>,
) -> Result<NewOrder, &'static str> {
    let order_number = clean_text(row.order_no.as_deref()).ok_or("missing order number")?;
    let status = order_status(row.status).unwrap_or_else(|| {
        warn!(order = %order_number, code = row.status, "unknown order status; using pending");
        OrderStatus::Pending
    });

    let subtotal = price(&row.goods_amount);
    let discount = price(&row.discount_amount);
    let shipping_fee = price(&row.freight_amount);
    let mut total = price(&row.pay_amount);
    if total == 0.0 && subtotal > 0.0 {
        total = round_cents(subtotal - discount + shipping_fee);
    }

    Ok(NewOrder {
        legacy_id: row.id,
        order_number,
        customer_id,
        tenant_id,
        status,
        currency: clean_text(row.currency.as_deref())
            .map(|c| c.to_ascii_uppercase())
            .unwrap_or_else(|| DEFAULT_CURRENCY.to_string()),
        subtotal,
        discount,
        shipping_fee,
        total,
        shipping_name: clean_text(row.receiver_name.as_deref()),
        shipping_phone: clean_text(row.receiver_phone.as_deref()),
        shipping_address: clean_text(row.receiver_address.as_deref()),
        notes: clean_text(row.remark.as_deref()),
        placed_at: row.created_at,
        paid_at: row.paid_at,
    })
}

pub fn item_from_legacy(row: &LegacyOrderLineItem, order_id: i64) -> Result<NewOrderItem, String> {
    if row.quantity <= 0 {
        return Err(format!("non-positive quantity {}", row.quantity));
    }
    let quantity = i32::try_from(row.quantity)
        .map_err(|_| format!("quantity {} out of range", row.quantity))?;
    let sku = clean_text(row.sku.as_deref());
    let name = clean_text(row.product_name.as_deref())
        .or_else(|| sku.clone())
        .ok_or_else(|| "missing product name".to_string())?;

    let unit_price = price(&row.unit_price);
    let mut line_total = price(&row.total_price);
    if line_total == 0.0 {
        line_total = round_cents(unit_price * quantity as f64);
    }

    Ok(NewOrderItem {
        legacy_id: row.id,
        order_id,
        sku,
        name,
        quantity,
        unit_price,
        line_total,
        attributes: json_or_text(row.attributes.as_deref()),
    })
}

pub fn payment_from_legacy(row: &LegacyPayment, order_id: i64) -> NewPayment {
    let status = payment_status(row.status).unwrap_or_else(|| {
        warn!(payment = row.id, code = row.status, "unknown payment status; using pending");
        PaymentStatus::Pending
    });
    NewPayment {
        legacy_id: row.id,
        order_id,
        payment_number: clean_text(row.payment_no.as_deref())
            .unwrap_or_else(|| format!("PAY-{}", row.id)),
        channel: clean_text(row.channel.as_deref()).map(|c| c.to_ascii_lowercase()),
        amount: price(&row.amount),
        status,
        transaction_ref: clean_text(row.transaction_id.as_deref()),
        paid_at: row.paid_at,
    }
}

pub fn refund_from_legacy(
    row: &LegacyRefund,
    order_id: i64,
    payment_id: Option<i64>,
) -> Result<NewRefund, String> {
    let amount = price(&row.amount);
    if amount <= 0.0 {
        return Err(format!("non-positive refund amount {amount}"));
    }
    let status = refund_status(row.status).unwrap_or_else(|| {
        warn!(refund = row.id, code = row.status, "unknown refund status; using requested");
        RefundStatus::Requested
    });
    Ok(NewRefund {
        legacy_id: row.id,
        order_id,
        payment_id,
        refund_number: clean_text(row.refund_no.as_deref())
            .unwrap_or_else(|| format!("RF-{}", row.id)),
        amount,
        reason: clean_text(row.reason.as_deref()),
        status,
        refunded_at: row.refunded_at,
    })
}

/// Migrate orders, then items, payments and refunds against the migrated
/// orders. Every stage that started leaves its report in `reports`.
#[instrument(skip_all)]
pub async fn migrate_orders<S, T>(
    source: &S,
    target: &mut T,
    policy: RowPolicy,
    reports: &mut Vec<StageReport>,
) -> Result<()>
where
    S: LegacySource + ?Sized,
    T: OrderStore + ?Sized,
{
    let mut stage = Stage::new("orders", policy);
    let outcome = migrate_order_rows(source, target, &mut stage).await;
    stage.close(reports, outcome)?;

    let mut stage = Stage::new("order_items", policy);
    let outcome = migrate_items(source, target, &mut stage).await;
    stage.close(reports, outcome)?;

    let mut stage = Stage::new("order_payments", policy);
    let outcome = migrate_payments(source, target, &mut stage).await;
    stage.close(reports, outcome)?;

    let mut stage = Stage::new("order_refunds", policy);
    let outcome = migrate_refunds(source, target, &mut stage).await;
    stage.close(reports, outcome)
}

async fn migrate_order_rows<S, T>(source: &S, target: &mut T, stage: &mut Stage) -> Result<()>
where
    S: LegacySource + ?Sized,
    T: OrderStore + ?Sized,
{
    for row in source.orders().await? {
        let key = row.id.to_string();
        if clean_text(row.order_no.as_deref()).is_none() {
            stage.skip(key, "missing order number");
            continue;
        }

        stage.begin_row(target).await?;
        let result = write_order(target, &row).await;
        if let Some(id) = stage.finish_row(target, &key, result).await? {
            stage.map_id(key, id);
        }
    }
    Ok(())
}

async fn write_order<T>(target: &mut T, row: &LegacyOrder) -> Result<RowOutcome>
where
    T: OrderStore + ?Sized,
{
    if target.order_id(row.id).await?.is_some() {
        return Ok(RowOutcome::skipped(ALREADY_MIGRATED));
    }
    let customer_id = match row.user_id {
        Some(uid) => {
            let found = target.customer_id(uid).await?;
            if found.is_none() {
                warn!(order = row.id, user = uid, "customer not migrated; order kept without customer");
            }
            found
        }
        None => None,
    };
    let tenant_id = match row.tenant_id {
        Some(tid) => target.tenant_id(tid).await?,
        None => None,
    };
    let order = match order_from_legacy(row, customer_id, tenant_id) {
        Ok(order) => order,
        Err(reason) => return Ok(RowOutcome::skipped(reason)),
    };
    let id = target
        .insert_order(&order)
        .await
        .with_context(|| format!("insert order {}", order.order_number))?;
    Ok(RowOutcome::Inserted(id))
}

async fn migrate_items<S, T>(source: &S, target: &mut T, stage: &mut Stage) -> Result<()>
where
    S: LegacySource + ?Sized,
    T: OrderStore + ?Sized,
{
    for row in source.order_line_items().await? {
        let key = row.id.to_string();
        let Some(legacy_order) = row.order_id else {
            stage.skip(key, MISSING_ORDER);
            continue;
        };
        if let Err(reason) = item_from_legacy(&row, 0) {
            stage.skip(key, reason);
            continue;
        }

        stage.begin_row(target).await?;
        let result = write_item(target, &row, legacy_order).await;
        if let Some(id) = stage.finish_row(target, &key, result).await? {
            stage.map_id(key, id);
        }
    }
    Ok(())
}

async fn write_item<T>(
    target: &mut T,
    row: &LegacyOrderLineItem,
    legacy_order: i64,
) -> Result<RowOutcome>
where
    T: OrderStore + ?Sized,
{
    if target.order_item_exists(row.id).await? {
        return Ok(RowOutcome::skipped(ALREADY_MIGRATED));
    }
    let Some(order_id) = target.order_id(legacy_order).await? else {
        return Ok(parent_missing(legacy_order));
    };
    let item = match item_from_legacy(row, order_id) {
        Ok(item) => item,
        Err(reason) => return Ok(RowOutcome::Skipped(reason)),
    };
    Ok(RowOutcome::Inserted(target.insert_order_item(&item).await?))
}

async fn migrate_payments<S, T>(source: &S, target: &mut T, stage: &mut Stage) -> Result<()>
where
    S: LegacySource + ?Sized,
    T: OrderStore + ?Sized,
{
    for row in source.payments().await? {
        let key = row.id.to_string();
        let Some(legacy_order) = row.order_id else {
            stage.skip(key, MISSING_ORDER);
            continue;
        };

        stage.begin_row(target).await?;
        let result = write_payment(target, &row, legacy_order).await;
        if let Some(id) = stage.finish_row(target, &key, result).await? {
            stage.map_id(key, id);
        }
    }
    Ok(())
}

async fn write_payment<T>(target: &mut T, row: &LegacyPayment, legacy_order: i64) -> Result<RowOutcome>
where
    T: OrderStore + ?Sized,
{
    if target.payment_id(row.id).await?.is_some() {
        return Ok(RowOutcome::skipped(ALREADY_MIGRATED));
    }
    let Some(order_id) = target.order_id(legacy_order).await? else {
        return Ok(parent_missing(legacy_order));
    };
    let payment = payment_from_legacy(row, order_id);
    Ok(RowOutcome::Inserted(target.insert_payment(&payment).await?))
}

async fn migrate_refunds<S, T>(source: &S, target: &mut T, stage: &mut Stage) -> Result<()>
where
    S: LegacySource + ?Sized,
    T: OrderStore + ?Sized,
{
    for row in source.refunds().await? {
        let key = row.id.to_string();
        let Some(legacy_order) = row.order_id else {
            stage.skip(key, MISSING_ORDER);
            continue;
        };
        let amount = price(&row.amount);
        if amount <= 0.0 {
            stage.skip(key, format!("non-positive refund amount {amount}"));
            continue;
        }

        stage.begin_row(target).await?;
        let result = write_refund(target, &row, legacy_order).await;
        if let Some(id) = stage.finish_row(target, &key, result).await? {
            stage.map_id(key, id);
        }
    }
    Ok(())
}

async fn write_refund<T>(target: &mut T, row: &LegacyRefund, legacy_order: i64) -> Result<RowOutcome>
where
    T: OrderStore + ?Sized,
{
    if target.refund_exists(row.id).await? {
        return Ok(RowOutcome::skipped(ALREADY_MIGRATED));
    }
    let Some(order_id) = target.order_id(legacy_order).await? else {
        return Ok(parent_missing(legacy_order));
    };
    let payment_id = match row.payment_id {
        Some(pid) => target.payment_id(pid).await?,
        None => None,
    };
    let refund = match refund_from_legacy(row, order_id, payment_id) {
        Ok(refund) => refund,
        Err(reason) => return Ok(RowOutcome::Skipped(reason)),
    };
    Ok(RowOutcome::Inserted(target.insert_refund(&refund).await?))
}
