//! After-sales tickets, pre-orders and customization requests.

use anyhow::Result;
use tracing::{instrument, warn};

use crate::db::model::{LegacyAfterSale, LegacyCustomization, LegacyPreOrder};
use crate::db::LegacySource;
use crate::model::{NewAfterSale, NewCustomization, NewPreOrder, ServiceStatus};
use crate::pipeline::{RowOutcome, RowPolicy, Stage, StageReport};
use crate::store::ServiceStore;
use crate::transform::{after_sale_kind, clean_text, json_or_text, parse_price, service_status};

const ALREADY_MIGRATED: &str = "already migrated";

fn status(code: i64, record: &'static str, id: i64) -> ServiceStatus {
    service_status(code).unwrap_or_else(|| {
        warn!(record, id, code, "unknown service status; using open");
        ServiceStatus::Open
    })
}

pub fn after_sale_from_legacy(row: &LegacyAfterSale, order_id: i64) -> NewAfterSale {
    NewAfterSale {
        legacy_id: row.id,
        order_id,
        kind: after_sale_kind(row.kind),
        status: status(row.status, "after_sale", row.id),
        description: clean_text(row.description.as_deref()),
        opened_at: row.created_at,
    }
}

pub fn pre_order_from_legacy(
    row: &LegacyPreOrder,
    customer_id: i64,
) -> Result<NewPreOrder, &'static str> {
    let product_name = clean_text(row.product_name.as_deref()).ok_or("missing product name")?;
    Ok(NewPreOrder {
        legacy_id: row.id,
        customer_id,
        product_name,
        deposit: row.deposit.as_deref().map(parse_price).unwrap_or(0.0),
        expected_at: row.expected_at,
        status: status(row.status, "pre_order", row.id),
        notes: clean_text(row.remark.as_deref()),
    })
}

pub fn customization_from_legacy(
    row: &LegacyCustomization,
    customer_id: Option<i64>,
    order_id: Option<i64>,
) -> Result<NewCustomization, &'static str> {
    let product_name = clean_text(row.product_name.as_deref()).ok_or("missing product name")?;
    Ok(NewCustomization {
        legacy_id: row.id,
        customer_id,
        order_id,
        product_name,
        specification: json_or_text(row.specification.as_deref()),
        budget: row.budget.as_deref().map(parse_price).unwrap_or(0.0),
        status: status(row.status, "customization", row.id),
    })
}

/// Migrate after-sales, pre-orders and customizations. Every stage that
/// started leaves its report in `reports`.
#[instrument(skip_all)]
pub async fn migrate_services<S, T>(
    source: &S,
    target: &mut T,
    policy: RowPolicy,
    reports: &mut Vec<StageReport>,
) -> Result<()>
where
    S: LegacySource + ?Sized,
    T: ServiceStore + ?Sized,
{
    let mut stage = Stage::new("after_sales", policy);
    let outcome = migrate_after_sales(source, target, &mut stage).await;
    stage.close(reports, outcome)?;

    let mut stage = Stage::new("pre_orders", policy);
    let outcome = migrate_pre_orders(source, target, &mut stage).await;
    stage.close(reports, outcome)?;

    let mut stage = Stage::new("customizations", policy);
    let outcome = migrate_customizations(source, target, &mut stage).await;
    stage.close(reports, outcome)
}

async fn migrate_after_sales<S, T>(source: &S, target: &mut T, stage: &mut Stage) -> Result<()>
where
    S: LegacySource + ?Sized,
    T: ServiceStore + ?Sized,
{
    for row in source.after_sales().await? {
        let key = row.id.to_string();
        let Some(legacy_order) = row.order_id else {
            stage.skip(key, "missing order id");
            continue;
        };

        stage.begin_row(target).await?;
        let result = write_after_sale(target, &row, legacy_order).await;
        if let Some(id) = stage.finish_row(target, &key, result).await? {
            stage.map_id(key, id);
        }
    }
    Ok(())
}

async fn write_after_sale<T>(
    target: &mut T,
    row: &LegacyAfterSale,
    legacy_order: i64,
) -> Result<RowOutcome>
where
    T: ServiceStore + ?Sized,
{
    if target.after_sale_exists(row.id).await? {
        return Ok(RowOutcome::skipped(ALREADY_MIGRATED));
    }
    let Some(order_id) = target.order_id(legacy_order).await? else {
        return Ok(RowOutcome::skipped(format!(
            "order {legacy_order} not migrated"
        )));
    };
    let record = after_sale_from_legacy(row, order_id);
    Ok(RowOutcome::Inserted(target.insert_after_sale(&record).await?))
}

async fn migrate_pre_orders<S, T>(source: &S, target: &mut T, stage: &mut Stage) -> Result<()>
where
    S: LegacySource + ?Sized,
    T: ServiceStore + ?Sized,
{
    for row in source.pre_orders().await? {
        let key = row.id.to_string();
        let Some(legacy_user) = row.user_id else {
            stage.skip(key, "missing customer id");
            continue;
        };
        if clean_text(row.product_name.as_deref()).is_none() {
            stage.skip(key, "missing product name");
            continue;
        }

        stage.begin_row(target).await?;
        let result = write_pre_order(target, &row, legacy_user).await;
        if let Some(id) = stage.finish_row(target, &key, result).await? {
            stage.map_id(key, id);
        }
    }
    Ok(())
}

async fn write_pre_order<T>(target: &mut T, row: &LegacyPreOrder, legacy_user: i64) -> Result<RowOutcome>
where
    T: ServiceStore + ?Sized,
{
    if target.pre_order_exists(row.id).await? {
        return Ok(RowOutcome::skipped(ALREADY_MIGRATED));
    }
    let Some(customer_id) = target.customer_id(legacy_user).await? else {
        return Ok(RowOutcome::skipped(format!(
            "customer {legacy_user} not migrated"
        )));
    };
    let record = match pre_order_from_legacy(row, customer_id) {
        Ok(record) => record,
        Err(reason) => return Ok(RowOutcome::skipped(reason)),
    };
    Ok(RowOutcome::Inserted(target.insert_pre_order(&record).await?))
}

async fn migrate_customizations<S, T>(source: &S, target: &mut T, stage: &mut Stage) -> Result<()>
where
    S: LegacySource + ?Sized,
    T: ServiceStore + ?Sized,
{
    for row in source.customizations().await? {
        let key = row.id.to_string();
        if clean_text(row.product_name.as_deref()).is_none() {
            stage.skip(key, "missing product name");
            continue;
        }

        stage.begin_row(target).await?;
        let result = write_customization(target, &row).await;
        if let Some(id) = stage.finish_row(target, &key, result).await? {
            stage.map_id(key, id);
        }
    }
    Ok(())
}

async fn write_customization<T>(target: &mut T, row: &LegacyCustomization) -> Result<RowOutcome>
where
    T: ServiceStore + ?Sized,
{
    if target.customization_exists(row.id).await? {
        return Ok(RowOutcome::skipped(ALREADY_MIGRATED));
    }
    let customer_id = match row.user_id {
        Some(uid) => target.customer_id(uid).await?,
        None => None,
    };
    let order_id = match row.order_id {
        Some(oid) => target.order_id(oid).await?,
        None => None,
    };
    if customer_id.is_none() && order_id.is_none() {
        return Ok(RowOutcome::skipped("neither customer nor order migrated"));
    }
    let record = match customization_from_legacy(row, customer_id, order_id) {
        Ok(record) => record,
        Err(reason) => return Ok(RowOutcome::skipped(reason)),
    };
    Ok(RowOutcome::Inserted(
        target.insert_customization(&record).await?,
    ))
}
