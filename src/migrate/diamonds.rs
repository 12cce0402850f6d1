//! Diamond inventory import from supplier CSV exports.
//!
//! Two export layouts are in circulation. The older one labels columns
//! `Certificate Number` / `Weight` / `Measurements` / `Price`, the newer one
//! `Certificate #` / `Carat` / `Dimensions` / `Total Price`. The layout is
//! picked from the header row; everything else about a row is shared.

use anyhow::{anyhow, Context, Result};
use serde_json::{json, Map, Value};
use std::collections::{BTreeMap, HashSet};
use std::fs::File;
use std::io::Read;
use std::path::Path;
use tracing::{info, instrument};

use crate::model::NewDiamond;
use crate::pipeline::{RowOutcome, RowPolicy, Stage, StageReport};
use crate::store::DiamondStore;
use crate::transform::{
    clean_text, grading_lab, numeric_sku, parse_dimension, parse_price, parse_weight, SkuAllocator,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CsvLayout {
    Legacy,
    Current,
}

struct Columns {
    certificate: &'static str,
    weight: &'static str,
    measurements: &'static str,
    price: &'static str,
    price_per_carat: &'static [&'static str],
    stock: &'static [&'static str],
    cut: &'static [&'static str],
    fluorescence: &'static [&'static str],
    image: &'static [&'static str],
    video: &'static [&'static str],
}

const LEGACY_COLUMNS: Columns = Columns {
    certificate: "Certificate Number",
    weight: "Weight",
    measurements: "Measurements",
    price: "Price",
    price_per_carat: &["Price/Ct", "$/ct"],
    stock: &["Stock #", "Stock No"],
    cut: &["Cut"],
    fluorescence: &["Fluorescence"],
    image: &["Image", "Image Link"],
    video: &["Video", "Video Link"],
};

const CURRENT_COLUMNS: Columns = Columns {
    certificate: "Certificate #",
    weight: "Carat",
    measurements: "Dimensions",
    price: "Total Price",
    price_per_carat: &["Price Per Carat", "Price/Ct"],
    stock: &["Stock Number", "Stock #"],
    cut: &["Cut Grade", "Cut"],
    fluorescence: &["Fluorescence Intensity", "Fluorescence"],
    image: &["Image URL", "Image Link"],
    video: &["Video URL", "Video Link"],
};

impl CsvLayout {
    /// Pick the layout from the header row.
    pub fn detect(headers: &[String]) -> Option<Self> {
        let has = |name: &str| headers.iter().any(|h| h == name);
        if has(CURRENT_COLUMNS.certificate) {
            Some(CsvLayout::Current)
        } else if has(LEGACY_COLUMNS.certificate) {
            Some(CsvLayout::Legacy)
        } else {
            None
        }
    }

    fn columns(self) -> &'static Columns {
        match self {
            CsvLayout::Legacy => &LEGACY_COLUMNS,
            CsvLayout::Current => &CURRENT_COLUMNS,
        }
    }
}

/// One data line of the CSV, keyed by header.
#[derive(Debug, Clone, PartialEq)]
pub struct CsvRecord {
    pub line: u64,
    pub fields: BTreeMap<String, String>,
}

impl CsvRecord {
    fn get(&self, column: &str) -> Option<&str> {
        self.fields.get(column).map(String::as_str)
    }

    fn first(&self, columns: &[&str]) -> Option<String> {
        columns.iter().find_map(|c| clean_text(self.get(c)))
    }

    fn raw_json(&self) -> Value {
        let map: Map<String, Value> = self
            .fields
            .iter()
            .map(|(k, v)| (k.clone(), Value::String(v.clone())))
            .collect();
        Value::Object(map)
    }
}

/// A parsed CSV file: readable rows plus lines the reader could not decode.
#[derive(Debug, Clone)]
pub struct DiamondSheet {
    pub layout: CsvLayout,
    pub records: Vec<CsvRecord>,
    pub unreadable: Vec<(u64, String)>,
}

impl DiamondSheet {
    pub fn from_path(path: &Path) -> Result<Self> {
        let file =
            File::open(path).with_context(|| format!("failed to open {}", path.display()))?;
        Self::from_reader(file).with_context(|| format!("failed to read {}", path.display()))
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        let mut rdr = csv::ReaderBuilder::new()
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(reader);
        let headers: Vec<String> = rdr
            .headers()
            .context("failed to read CSV header")?
            .iter()
            .map(|h| h.trim_start_matches('\u{feff}').to_string())
            .collect();
        let layout = CsvLayout::detect(&headers)
            .ok_or_else(|| anyhow!("unrecognised CSV layout: no certificate number column"))?;

        let mut records = Vec::new();
        let mut unreadable = Vec::new();
        for (idx, result) in rdr.records().enumerate() {
            // header is line 1
            let line = idx as u64 + 2;
            match result {
                Ok(record) => {
                    let fields = headers
                        .iter()
                        .zip(record.iter())
                        .map(|(h, v)| (h.clone(), v.to_string()))
                        .collect();
                    records.push(CsvRecord { line, fields });
                }
                Err(err) => unreadable.push((line, err.to_string())),
            }
        }
        Ok(Self {
            layout,
            records,
            unreadable,
        })
    }
}

/// Build a diamond from a CSV row, minus the SKU which is assigned at insert.
/// `Err` carries the reason the row is skipped.
pub fn diamond_from_record(layout: CsvLayout, rec: &CsvRecord) -> Result<NewDiamond, String> {
    let cols = layout.columns();
    let certificate_number = clean_text(rec.get(cols.certificate))
        .ok_or_else(|| "missing certificate number".to_string())?;
    let carat = parse_weight(rec.get(cols.weight).unwrap_or(""));
    if carat <= 0.0 {
        return Err(format!("non-positive weight {carat}"));
    }

    let dims = parse_dimension(rec.get(cols.measurements).unwrap_or(""));
    let price = parse_price(rec.get(cols.price).unwrap_or(""));
    let price_per_carat = match rec.first(cols.price_per_carat).map(|p| parse_price(&p)) {
        Some(ppc) if ppc > 0.0 => ppc,
        _ => ((price / carat) * 100.0).round() / 100.0,
    };
    let lab = rec
        .first(&["Lab"])
        .map(|l| l.to_ascii_uppercase())
        .unwrap_or_else(|| grading_lab(&certificate_number).to_string());

    Ok(NewDiamond {
        sku: String::new(),
        grading_lab: lab,
        supplier_stock_no: rec.first(cols.stock),
        shape: rec.first(&["Shape"]),
        carat,
        color: rec.first(&["Color"]),
        clarity: rec.first(&["Clarity"]),
        cut: rec.first(cols.cut),
        polish: rec.first(&["Polish"]),
        symmetry: rec.first(&["Symmetry"]),
        fluorescence: rec.first(cols.fluorescence),
        length_mm: dims.length,
        width_mm: dims.width,
        height_mm: dims.height,
        price,
        price_per_carat,
        image_url: rec.first(cols.image),
        video_url: rec.first(cols.video),
        certificate_number,
    })
}

/// Import every usable row of `sheet`. Each inserted diamond gets the next
/// SKU above the highest one already in the target. The stage report lands
/// in `reports` also when the import stops early.
#[instrument(skip_all, fields(layout = ?sheet.layout, rows = sheet.records.len()))]
pub async fn import_diamonds<T>(
    sheet: &DiamondSheet,
    target: &mut T,
    policy: RowPolicy,
    sku_base: u32,
    reports: &mut Vec<StageReport>,
) -> Result<()>
where
    T: DiamondStore + ?Sized,
{
    let mut stage = Stage::new("diamonds", policy);
    let outcome = import_rows(sheet, target, sku_base, &mut stage).await;
    stage.close(reports, outcome)
}

async fn import_rows<T>(
    sheet: &DiamondSheet,
    target: &mut T,
    sku_base: u32,
    stage: &mut Stage,
) -> Result<()>
where
    T: DiamondStore + ?Sized,
{
    let highest = target
        .diamond_skus()
        .await?
        .iter()
        .filter_map(|s| numeric_sku(s))
        .max();
    let mut skus = SkuAllocator::resume(sku_base, highest);
    info!(last_sku = skus.last(), "resuming diamond SKU sequence");

    for (line, err) in &sheet.unreadable {
        stage.skip(format!("line {line}"), format!("unreadable CSV row: {err}"));
    }

    // certificates that reached the target in this run or were already there
    let mut seen: HashSet<String> = HashSet::new();
    for rec in &sheet.records {
        let key = format!("line {}", rec.line);
        let mut diamond = match diamond_from_record(sheet.layout, rec) {
            Ok(d) => d,
            Err(reason) => {
                stage.skip_with(key, reason, Some(rec.raw_json()));
                continue;
            }
        };
        if seen.contains(&diamond.certificate_number) {
            stage.skip_with(key, "duplicate certificate in file", Some(rec.raw_json()));
            continue;
        }

        stage.begin_row(target).await?;
        let result = match target.certificate_exists(&diamond.certificate_number).await {
            Ok(true) => Ok(RowOutcome::skipped("certificate already imported")),
            Ok(false) => {
                // exhausting the SKU range ends the run, not just the row
                let mut next = skus.clone();
                diamond.sku = next.next_sku()?;
                let inserted = target.insert_diamond(&diamond).await;
                // a rolled-back row does not burn its SKU
                if inserted.is_ok() {
                    skus = next;
                }
                inserted.map(RowOutcome::Inserted)
            }
            Err(err) => Err(err),
        };
        if result.is_ok() {
            seen.insert(diamond.certificate_number.clone());
        }
        let key = format!("{key} ({})", diamond.certificate_number);
        if let Some(id) = stage.finish_row(target, key, result).await? {
            stage.map_id(
                diamond.certificate_number.clone(),
                json!({ "sku": diamond.sku, "id": id }),
            );
        }
    }
    Ok(())
}
