//! Field cleaning for legacy values.
//!
//! Everything here is total: malformed input degrades to a zero or `None`
//! rather than failing, and the calling stage decides whether that makes
//! the row unusable.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use thiserror::Error;

use crate::model::{AfterSaleKind, OrderStatus, PaymentStatus, RefundStatus, ServiceStatus};

static NON_NUMERIC: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^0-9.\-]").unwrap());
static DIMENSION_SEP: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s*[*xX×]\s*").unwrap());
static FIRST_NUMBER: Lazy<Regex> = Lazy::new(|| Regex::new(r"-?\d+(?:\.\d+)?").unwrap());

/// Grading labs recognised from a certificate number prefix.
const GRADING_LABS: [&str; 6] = ["GCAL", "GIA", "IGI", "HRD", "AGS", "EGL"];

const SKU_CEILING: u32 = 999_999;

/// Parse a legacy price string such as `"$1,830.08"`.
pub fn parse_price(raw: &str) -> f64 {
    let cleaned = NON_NUMERIC.replace_all(raw.trim(), "");
    match cleaned.parse::<f64>() {
        Ok(v) if v.is_finite() => v,
        _ => 0.0,
    }
}

/// Carat weight; takes the first number found (`"1.02ct"` -> `1.02`).
pub fn parse_weight(raw: &str) -> f64 {
    FIRST_NUMBER
        .find(raw)
        .and_then(|m| m.as_str().parse::<f64>().ok())
        .filter(|v| v.is_finite())
        .unwrap_or(0.0)
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Dimension {
    pub length: f64,
    pub width: f64,
    pub height: f64,
}

/// Parse `L*W*H` measurements. Anything that is not exactly three numbers
/// yields the all-zero dimension.
pub fn parse_dimension(raw: &str) -> Dimension {
    let trimmed = raw.trim();
    let trimmed = trimmed
        .strip_suffix("mm")
        .or_else(|| trimmed.strip_suffix("MM"))
        .unwrap_or(trimmed)
        .trim();
    if trimmed.is_empty() {
        return Dimension::default();
    }

    let parts: Vec<f64> = DIMENSION_SEP
        .split(trimmed)
        .filter_map(|p| p.trim().parse::<f64>().ok().filter(|v| v.is_finite()))
        .collect();
    let raw_parts = DIMENSION_SEP.split(trimmed).count();
    match parts.as_slice() {
        [length, width, height] if raw_parts == 3 => Dimension {
            length: *length,
            width: *width,
            height: *height,
        },
        _ => Dimension::default(),
    }
}

/// Lab name from a certificate number prefix, or `""` when unrecognised.
pub fn grading_lab(certificate: &str) -> &'static str {
    let upper = certificate.trim().to_ascii_uppercase();
    GRADING_LABS
        .iter()
        .find(|lab| upper.starts_with(*lab))
        .copied()
        .unwrap_or("")
}

/// Trimmed text, with blanks and legacy placeholders mapped to `None`.
pub fn clean_text(raw: Option<&str>) -> Option<String> {
    let s = raw?.trim();
    if s.is_empty() {
        return None;
    }
    if matches!(s, "-" | "NULL" | "null" | "N/A" | "n/a") {
        return None;
    }
    Some(s.to_string())
}

pub fn normalize_email(raw: Option<&str>) -> Option<String> {
    let email = clean_text(raw)?.to_ascii_lowercase();
    if email.contains('@') && !email.starts_with('@') && !email.ends_with('@') {
        Some(email)
    } else {
        None
    }
}

/// Parse a JSON text column, keeping non-JSON content as a string value.
pub fn json_or_text(raw: Option<&str>) -> serde_json::Value {
    match clean_text(raw) {
        None => serde_json::Value::Object(Default::default()),
        Some(s) => serde_json::from_str(&s).unwrap_or(serde_json::Value::String(s)),
    }
}

pub fn order_status(code: i64) -> Option<OrderStatus> {
    match code {
        0 => Some(OrderStatus::Pending),
        1 => Some(OrderStatus::Paid),
        2 => Some(OrderStatus::Shipped),
        3 => Some(OrderStatus::Completed),
        4 => Some(OrderStatus::Cancelled),
        5 => Some(OrderStatus::Refunded),
        _ => None,
    }
}

pub fn payment_status(code: i64) -> Option<PaymentStatus> {
    match code {
        0 => Some(PaymentStatus::Pending),
        1 => Some(PaymentStatus::Succeeded),
        2 => Some(PaymentStatus::Failed),
        3 => Some(PaymentStatus::Closed),
        _ => None,
    }
}

pub fn refund_status(code: i64) -> Option<RefundStatus> {
    match code {
        0 => Some(RefundStatus::Requested),
        1 => Some(RefundStatus::Approved),
        2 => Some(RefundStatus::Rejected),
        3 => Some(RefundStatus::Refunded),
        _ => None,
    }
}

pub fn service_status(code: i64) -> Option<ServiceStatus> {
    match code {
        0 => Some(ServiceStatus::Open),
        1 => Some(ServiceStatus::InProgress),
        2 => Some(ServiceStatus::Closed),
        3 => Some(ServiceStatus::Cancelled),
        _ => None,
    }
}

pub fn after_sale_kind(code: i64) -> AfterSaleKind {
    match code {
        1 => AfterSaleKind::Return,
        2 => AfterSaleKind::Exchange,
        3 => AfterSaleKind::Repair,
        4 => AfterSaleKind::Resize,
        _ => AfterSaleKind::Other,
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("diamond SKU range exhausted after {last:06}")]
pub struct SkuExhausted {
    pub last: u32,
}

/// Hands out 6-digit diamond SKUs above the highest one already issued.
#[derive(Debug, Clone)]
pub struct SkuAllocator {
    last: u32,
}

impl SkuAllocator {
    /// `highest_existing` is the largest numeric SKU in the target, if any.
    pub fn resume(base: u32, highest_existing: Option<u32>) -> Self {
        let last = highest_existing.map_or(base, |h| h.max(base));
        Self { last }
    }

    pub fn next_sku(&mut self) -> Result<String, SkuExhausted> {
        if self.last >= SKU_CEILING {
            return Err(SkuExhausted { last: self.last });
        }
        self.last += 1;
        Ok(format!("{:06}", self.last))
    }

    pub fn last(&self) -> u32 {
        self.last
    }
}

/// Numeric value of a 6-digit SKU; other SKU shapes are ignored.
pub fn numeric_sku(sku: &str) -> Option<u32> {
    let sku = sku.trim();
    if sku.len() == 6 && sku.bytes().all(|b| b.is_ascii_digit()) {
        sku.parse().ok()
    } else {
        None
    }
}
