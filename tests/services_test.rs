mod support;

use erp_migrate::db::model::{LegacyAfterSale, LegacyCustomization, LegacyPreOrder};
use erp_migrate::migrate::migrate_services;
use erp_migrate::model::{AfterSaleKind, ServiceStatus};
use erp_migrate::pipeline::{RowPolicy, StageReport};
use support::{FixtureSource, MemoryTarget};

fn legacy() -> FixtureSource {
    FixtureSource {
        after_sales: vec![
            LegacyAfterSale {
                id: 1,
                order_id: Some(1),
                kind: 4,
                status: 1,
                description: Some("resize to 7".into()),
                ..Default::default()
            },
            LegacyAfterSale {
                id: 2,
                order_id: Some(99),
                ..Default::default()
            },
        ],
        pre_orders: vec![
            LegacyPreOrder {
                id: 5,
                user_id: Some(100),
                product_name: Some("Eternity band".into()),
                deposit: Some("$200.00".into()),
                ..Default::default()
            },
            LegacyPreOrder {
                id: 6,
                user_id: Some(7),
                product_name: Some("Studs".into()),
                ..Default::default()
            },
            LegacyPreOrder {
                id: 7,
                user_id: Some(100),
                ..Default::default()
            },
        ],
        customizations: vec![
            LegacyCustomization {
                id: 8,
                order_id: Some(1),
                product_name: Some("Custom halo".into()),
                specification: Some(r#"{"metal": "platinum"}"#.into()),
                budget: Some("3,500".into()),
                ..Default::default()
            },
            LegacyCustomization {
                id: 9,
                user_id: Some(7),
                order_id: Some(99),
                product_name: Some("Signet".into()),
                ..Default::default()
            },
        ],
        ..Default::default()
    }
}

async fn run(
    source: &FixtureSource,
    target: &mut MemoryTarget,
    policy: RowPolicy,
) -> anyhow::Result<Vec<StageReport>> {
    let mut reports = Vec::new();
    migrate_services(source, target, policy, &mut reports).await?;
    Ok(reports)
}

fn stage<'a>(reports: &'a [StageReport], name: &str) -> &'a StageReport {
    reports.iter().find(|r| r.name == name).unwrap()
}

fn reason<'a>(report: &'a StageReport, key: &str) -> &'a str {
    report
        .skipped_rows
        .iter()
        .find(|n| n.key == key)
        .map(|n| n.reason.as_str())
        .unwrap()
}

fn seeded() -> (MemoryTarget, i64, i64) {
    let mut target = MemoryTarget::new();
    let customer = target.seed_user(100, "carol@example.com");
    let order = target.seed_order(1, "SO-1");
    (target, customer, order)
}

#[tokio::test]
async fn migrates_service_records() {
    let source = legacy();
    let (mut target, customer, order) = seeded();

    let reports = run(&source, &mut target, RowPolicy::Skip).await.unwrap();
    let names: Vec<&str> = reports.iter().map(|r| r.name.as_str()).collect();
    assert_eq!(names, vec!["after_sales", "pre_orders", "customizations"]);

    let after_sales = stage(&reports, "after_sales");
    assert_eq!((after_sales.inserted, after_sales.skipped), (1, 1));
    assert_eq!(reason(after_sales, "2"), "order 99 not migrated");
    let ticket = &target.tables.after_sales[0].1;
    assert_eq!(ticket.order_id, order);
    assert_eq!(ticket.kind, AfterSaleKind::Resize);
    assert_eq!(ticket.status, ServiceStatus::InProgress);

    let pre_orders = stage(&reports, "pre_orders");
    assert_eq!((pre_orders.inserted, pre_orders.skipped), (1, 2));
    assert_eq!(reason(pre_orders, "6"), "customer 7 not migrated");
    assert_eq!(reason(pre_orders, "7"), "missing product name");
    let band = &target.tables.pre_orders[0].1;
    assert_eq!((band.customer_id, band.deposit), (customer, 200.0));

    let custom = stage(&reports, "customizations");
    assert_eq!((custom.inserted, custom.skipped), (1, 1));
    assert_eq!(reason(custom, "9"), "neither customer nor order migrated");
    let halo = &target.tables.customizations[0].1;
    assert_eq!(halo.order_id, Some(order));
    assert_eq!(halo.customer_id, None);
    assert_eq!(halo.budget, 3500.0);
    assert_eq!(halo.specification["metal"], "platinum");
}

#[tokio::test]
async fn rerun_is_idempotent() {
    let source = legacy();
    let (mut target, _, _) = seeded();
    run(&source, &mut target, RowPolicy::Skip).await.unwrap();

    let reports = run(&source, &mut target, RowPolicy::Skip).await.unwrap();
    assert!(reports.iter().all(|r| r.inserted == 0));
    assert_eq!(reason(stage(&reports, "pre_orders"), "5"), "already migrated");
    assert_eq!(target.tables.customizations.len(), 1);
}

#[tokio::test]
async fn failed_insert_is_counted_not_fatal() {
    let source = legacy();
    let (mut target, _, _) = seeded();
    target.fail_insert("pre_orders", 5);

    let reports = run(&source, &mut target, RowPolicy::Skip).await.unwrap();
    let pre_orders = stage(&reports, "pre_orders");
    assert_eq!(pre_orders.failed_keys(), vec!["5"]);
    assert!(target.tables.pre_orders.is_empty());
    // later stages still ran
    assert_eq!(stage(&reports, "customizations").inserted, 1);
}

#[tokio::test]
async fn records_without_a_parent_key_are_skipped() {
    let source = FixtureSource {
        after_sales: vec![LegacyAfterSale {
            id: 3,
            order_id: None,
            ..Default::default()
        }],
        pre_orders: vec![LegacyPreOrder {
            id: 8,
            user_id: None,
            product_name: Some("Tennis bracelet".into()),
            ..Default::default()
        }],
        ..Default::default()
    };
    let (mut target, _, _) = seeded();

    let reports = run(&source, &mut target, RowPolicy::Abort).await.unwrap();
    assert_eq!(reason(stage(&reports, "after_sales"), "3"), "missing order id");
    assert_eq!(reason(stage(&reports, "pre_orders"), "8"), "missing customer id");
    assert!(reports.iter().all(|r| r.failed == 0 && r.inserted == 0));
    assert_eq!(target.savepoint_calls, 0);
}

#[tokio::test]
async fn aborted_stage_keeps_its_report() {
    let source = legacy();
    let (mut target, _, _) = seeded();
    target.fail_insert("pre_orders", 5);

    let mut reports = Vec::new();
    migrate_services(&source, &mut target, RowPolicy::Abort, &mut reports)
        .await
        .unwrap_err();
    let names: Vec<&str> = reports.iter().map(|r| r.name.as_str()).collect();
    assert_eq!(names, vec!["after_sales", "pre_orders"]);
    assert_eq!(stage(&reports, "pre_orders").failed_keys(), vec!["5"]);
}
