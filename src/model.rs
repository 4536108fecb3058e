//! Domain records that flow through the pipeline.
//!
//! ```text
//! ExtractedRecord ──(+ CategoryDetails, tax rules, attachment)──▶ ExpensePayload
//! ```
//!
//! [`ExtractedRecord`] is what the language model produced for one invoice and
//! what the intermediate store persists. [`ExpensePayload`] is the body posted
//! to the accounting backend; it only lives for one submission.

use crate::categories::ContactId;
use serde::de::Deserializer;
use serde::ser::{SerializeMap, Serializer};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Structured fields extracted from one invoice.
///
/// Every field is optional: the model is asked for all of them but nothing
/// guarantees it delivers. A known key only fills its typed field when the
/// model used the expected JSON type (string for text, number for amounts
/// and percentages). Any other value, and every key beyond the known ones,
/// is kept verbatim in `extra` so the store round-trips it for review.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ExtractedRecord {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,

    /// Issue date, `YYYY-MM-DD`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub currency: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub pre_tax_price: Option<f64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub tax_percentage: Option<f64>,

    /// IRPF withholding percentage.
    #[serde(rename = "retencion_percentage", skip_serializing_if = "Option::is_none")]
    pub retention_percentage: Option<f64>,

    /// Name of the source PDF inside the input folder.
    pub filename: String,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl<'de> Deserialize<'de> for ExtractedRecord {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let mut extra = Map::<String, Value>::deserialize(deserializer)?;
        let filename = match extra.remove("filename") {
            Some(Value::String(s)) => s,
            _ => String::new(),
        };
        Ok(Self {
            category: take_string(&mut extra, "category"),
            date: take_string(&mut extra, "date"),
            currency: take_string(&mut extra, "currency"),
            pre_tax_price: take_number(&mut extra, "pre_tax_price"),
            tax_percentage: take_number(&mut extra, "tax_percentage"),
            retention_percentage: take_number(&mut extra, "retencion_percentage"),
            filename,
            extra,
        })
    }
}

/// Move `key` out of `map` if it holds a JSON string.
fn take_string(map: &mut Map<String, Value>, key: &str) -> Option<String> {
    match map.get(key) {
        Some(Value::String(_)) => match map.remove(key) {
            Some(Value::String(s)) => Some(s),
            _ => None,
        },
        _ => None,
    }
}

/// Move `key` out of `map` if it holds a JSON number.
fn take_number(map: &mut Map<String, Value>, key: &str) -> Option<f64> {
    let n = map.get(key)?.as_f64()?;
    map.remove(key);
    Some(n)
}

impl ExtractedRecord {
    /// Category label, or `""` when the model did not provide one.
    pub fn category_label(&self) -> &str {
        self.category.as_deref().unwrap_or("")
    }

    /// `(year, month)` parsed from the issue date.
    ///
    /// Only the first two `-` separated components are used and each must
    /// be all digits (`2024-03-10` → `("2024", "03")`).
    pub fn year_month(&self) -> Option<(&str, &str)> {
        split_year_month(self.date.as_deref()?)
    }
}

/// `(year, month)` components of an ISO date string.
pub fn split_year_month(date: &str) -> Option<(&str, &str)> {
    let mut parts = date.trim().split('-');
    let year = parts.next()?;
    let month = parts.next()?;
    let digits = |s: &str| !s.is_empty() && s.chars().all(|c| c.is_ascii_digit());
    if digits(year) && digits(month) {
        Some((year, month))
    } else {
        None
    }
}

// ── Accounting payload ───────────────────────────────────────────────────

/// Body of one `POST /expenses` request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExpensePayload {
    pub contact: Contact,
    pub issue_date: Option<String>,
    pub currency: Option<String>,
    pub items: Vec<LineItem>,
    pub payment_method: String,
    pub attachment: Attachment,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Contact {
    pub id: ContactId,
    pub full_name: String,
}

/// Source PDF attached to the expense.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Attachment {
    pub filename: String,
    /// Base64 of the PDF bytes; `null` when the file was not found.
    pub data: Option<String>,
}

/// One expense line with its tax sub-lines.
///
/// Serialised flat, the way the accounting backend expects it: each tax line
/// becomes `tax_<slot>_transaction_type`, `tax_<slot>_country`,
/// `tax_<slot>_name` and `tax_<slot>_rate` keys on the item itself.
#[derive(Debug, Clone, PartialEq)]
pub struct LineItem {
    pub description: String,
    pub unit_price: Option<f64>,
    pub taxes: Vec<TaxLine>,
}

impl Serialize for LineItem {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(2 + 4 * self.taxes.len()))?;
        map.serialize_entry("description", &self.description)?;
        map.serialize_entry("unit_price", &self.unit_price)?;
        for tax in &self.taxes {
            let n = tax.slot;
            map.serialize_entry(&format!("tax_{n}_transaction_type"), tax.kind.as_str())?;
            map.serialize_entry(&format!("tax_{n}_country"), tax.country)?;
            map.serialize_entry(&format!("tax_{n}_name"), tax.name)?;
            map.serialize_entry(&format!("tax_{n}_rate"), &tax.rate)?;
        }
        map.end()
    }
}

/// Kind of tax sub-line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaxKind {
    /// Value-added tax added on top of the price.
    Standard,
    /// Withholding that reduces the net payable; carries a negative rate.
    Retention,
}

impl TaxKind {
    pub fn as_str(self) -> &'static str {
        match self {
            TaxKind::Standard => "standard",
            TaxKind::Retention => "retention",
        }
    }
}

/// A tax sub-line on a [`LineItem`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaxLine {
    /// Backend tax slot (1 or 2).
    pub slot: u8,
    pub kind: TaxKind,
    pub country: &'static str,
    pub name: &'static str,
    /// Percentage; negative for retentions.
    pub rate: i32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn record_tolerates_missing_fields() {
        let rec: ExtractedRecord = serde_json::from_value(json!({ "category": "software" })).unwrap();
        assert_eq!(rec.category.as_deref(), Some("software"));
        assert_eq!(rec.pre_tax_price, None);
        assert_eq!(rec.filename, "");
    }

    #[test]
    fn record_keeps_mistyped_values_verbatim() {
        let rec: ExtractedRecord = serde_json::from_value(json!({
            "pre_tax_price": "1.234,56",
            "tax_percentage": "21 %",
            "retencion_percentage": null,
            "date": 20240310
        }))
        .unwrap();
        assert_eq!(rec.pre_tax_price, None);
        assert_eq!(rec.tax_percentage, None);
        assert_eq!(rec.retention_percentage, None);
        assert_eq!(rec.date, None);
        assert_eq!(rec.extra.get("pre_tax_price"), Some(&json!("1.234,56")));
        assert_eq!(rec.extra.get("tax_percentage"), Some(&json!("21 %")));
        assert_eq!(rec.extra.get("retencion_percentage"), Some(&Value::Null));
        assert_eq!(rec.extra.get("date"), Some(&json!(20240310)));

        let back = serde_json::to_value(&rec).unwrap();
        assert_eq!(back["pre_tax_price"], "1.234,56");
        assert_eq!(back["date"], 20240310);
        assert!(back["retencion_percentage"].is_null());
    }

    #[test]
    fn record_reads_integer_percentages() {
        let rec: ExtractedRecord = serde_json::from_value(json!({
            "pre_tax_price": 100.5,
            "tax_percentage": 21,
            "retencion_percentage": 15,
            "filename": "inv.pdf"
        }))
        .unwrap();
        assert_eq!(rec.pre_tax_price, Some(100.5));
        assert_eq!(rec.tax_percentage, Some(21.0));
        assert_eq!(rec.retention_percentage, Some(15.0));
        assert_eq!(rec.filename, "inv.pdf");
        assert!(rec.extra.is_empty());
    }

    #[test]
    fn record_keeps_unknown_keys() {
        let rec: ExtractedRecord =
            serde_json::from_value(json!({ "category": "hosting", "invoice_number": "A-44" })).unwrap();
        assert_eq!(rec.extra.get("invoice_number"), Some(&json!("A-44")));

        let back = serde_json::to_value(&rec).unwrap();
        assert_eq!(back["invoice_number"], "A-44");
        assert_eq!(back["category"], "hosting");
    }

    #[test]
    fn retention_uses_wire_name() {
        let rec = ExtractedRecord {
            retention_percentage: Some(15.0),
            ..Default::default()
        };
        let v = serde_json::to_value(&rec).unwrap();
        assert_eq!(v["retencion_percentage"], 15.0);
        assert!(v.get("retention_percentage").is_none());
    }

    #[test]
    fn year_month_from_iso_date() {
        let rec = ExtractedRecord {
            date: Some("2024-03-10".into()),
            ..Default::default()
        };
        assert_eq!(rec.year_month(), Some(("2024", "03")));
    }

    #[test]
    fn year_month_rejects_garbage() {
        for d in ["", "March 2024", "2024", "2024/03/10", "20x4-03-01"] {
            let rec = ExtractedRecord {
                date: Some(d.into()),
                ..Default::default()
            };
            assert_eq!(rec.year_month(), None, "date {d:?}");
        }
        assert_eq!(ExtractedRecord::default().year_month(), None);
    }

    #[test]
    fn line_item_flattens_tax_slots() {
        let item = LineItem {
            description: "Hosting".into(),
            unit_price: Some(10.0),
            taxes: vec![TaxLine {
                slot: 2,
                kind: TaxKind::Retention,
                country: "ES",
                name: "IRPF",
                rate: -15,
            }],
        };
        let v = serde_json::to_value(&item).unwrap();
        assert_eq!(v["tax_2_transaction_type"], "retention");
        assert_eq!(v["tax_2_rate"], -15);
        assert!(v.get("tax_1_rate").is_none());
    }
}
