//! Expense assembly: record + category + tax rules → [`ExpensePayload`].
//!
//! [`build_payload`] is a pure function of its inputs; the only I/O in this
//! stage is [`read_attachment`], kept separate so the tax logic can be tested
//! without touching the filesystem.
//!
//! ## Tax rules
//!
//! Two Spanish rules, matched by exact equality:
//!
//! | Record field | Value | Sub-line |
//! |---|---|---|
//! | `tax_percentage` | `21` | slot 1, `standard`, `ES`, `IVA`, rate `21` |
//! | `retencion_percentage` | `15` | slot 2, `retention`, `ES`, `IRPF`, rate `-15` |
//!
//! Any other percentage (10, 20.5, 0, missing) adds no sub-line at all.
//! That is a known simplification, not proportional tax modelling.

use crate::categories::CategoryDetails;
use crate::model::{Attachment, Contact, ExpensePayload, ExtractedRecord, LineItem, TaxKind, TaxLine};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use std::path::Path;
use tracing::{debug, warn};

/// Standard Spanish VAT (IVA).
pub const STANDARD_VAT: TaxLine = TaxLine {
    slot: 1,
    kind: TaxKind::Standard,
    country: "ES",
    name: "IVA",
    rate: 21,
};

/// Spanish IRPF withholding; the negative rate reduces the net payable.
pub const RETENTION_IRPF: TaxLine = TaxLine {
    slot: 2,
    kind: TaxKind::Retention,
    country: "ES",
    name: "IRPF",
    rate: -15,
};

/// Tax sub-lines that apply to a record.
pub fn tax_lines(record: &ExtractedRecord) -> Vec<TaxLine> {
    let mut taxes = Vec::with_capacity(2);
    if record.tax_percentage == Some(21.0) {
        taxes.push(STANDARD_VAT);
    }
    if record.retention_percentage == Some(15.0) {
        taxes.push(RETENTION_IRPF);
    }
    taxes
}

/// Assemble the payload for one record.
///
/// `attachment` is the raw source PDF; `None` produces `"data": null`.
pub fn build_payload(
    record: &ExtractedRecord,
    details: &CategoryDetails,
    attachment: Option<&[u8]>,
) -> ExpensePayload {
    let item = LineItem {
        description: details.item_description.clone(),
        unit_price: record.pre_tax_price,
        taxes: tax_lines(record),
    };

    ExpensePayload {
        contact: Contact {
            id: details.contact_id.clone(),
            full_name: details.contact_full_name.clone(),
        },
        issue_date: record.date.clone(),
        currency: record.currency.clone(),
        items: vec![item],
        payment_method: details.payment_method.clone(),
        attachment: Attachment {
            filename: record.filename.clone(),
            data: attachment.map(encode_attachment),
        },
    }
}

/// Base64-encode attachment bytes (standard alphabet, no line wrapping).
pub fn encode_attachment(bytes: &[u8]) -> String {
    let b64 = STANDARD.encode(bytes);
    debug!("Encoded attachment → {} bytes base64", b64.len());
    b64
}

/// Read the source PDF for attaching. A missing or unreadable file is `None`.
pub fn read_attachment(path: &Path) -> Option<Vec<u8>> {
    match std::fs::read(path) {
        Ok(bytes) => Some(bytes),
        Err(e) => {
            warn!("Attachment {} not readable: {}", path.display(), e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::categories::ContactId;
    use serde_json::json;

    fn details() -> CategoryDetails {
        CategoryDetails {
            contact_id: ContactId::Number(12345),
            contact_full_name: "Acme Software SL".into(),
            item_description: "Software subscription".into(),
            payment_method: "credit_card".into(),
        }
    }

    fn record(tax: Option<f64>, retention: Option<f64>) -> ExtractedRecord {
        ExtractedRecord {
            category: Some("software".into()),
            date: Some("2024-03-10".into()),
            currency: Some("EUR".into()),
            pre_tax_price: Some(100.0),
            tax_percentage: tax,
            retention_percentage: retention,
            filename: "inv.pdf".into(),
            ..Default::default()
        }
    }

    #[test]
    fn vat_21_adds_one_standard_line() {
        let taxes = tax_lines(&record(Some(21.0), Some(0.0)));
        assert_eq!(taxes, vec![STANDARD_VAT]);
        assert_eq!(taxes[0].rate, 21);
    }

    #[test]
    fn non_exact_vat_adds_nothing() {
        for pct in [20.5, 21.5, 10.0, 4.0, 0.0] {
            assert!(tax_lines(&record(Some(pct), None)).is_empty(), "pct {pct}");
        }
        assert!(tax_lines(&record(None, None)).is_empty());
    }

    #[test]
    fn vat_as_text_adds_nothing() {
        let rec: ExtractedRecord = serde_json::from_value(json!({
            "pre_tax_price": 100.0,
            "tax_percentage": "21 %",
            "retencion_percentage": "15"
        }))
        .unwrap();
        assert!(tax_lines(&rec).is_empty());
    }

    #[test]
    fn retention_15_is_negative() {
        let taxes = tax_lines(&record(None, Some(15.0)));
        assert_eq!(taxes, vec![RETENTION_IRPF]);
        assert_eq!(taxes[0].rate, -15);
    }

    #[test]
    fn other_retention_adds_nothing() {
        for pct in [7.0, 19.0, -15.0, 14.99] {
            assert!(tax_lines(&record(None, Some(pct))).is_empty(), "pct {pct}");
        }
    }

    #[test]
    fn vat_and_retention_coexist() {
        let taxes = tax_lines(&record(Some(21.0), Some(15.0)));
        assert_eq!(taxes, vec![STANDARD_VAT, RETENTION_IRPF]);
    }

    #[test]
    fn payload_wire_shape() {
        let payload = build_payload(&record(Some(21.0), Some(0.0)), &details(), Some(b"%PDF-1.4"));
        let v = serde_json::to_value(&payload).unwrap();
        assert_eq!(
            v,
            json!({
                "contact": { "id": 12345, "full_name": "Acme Software SL" },
                "issue_date": "2024-03-10",
                "currency": "EUR",
                "items": [{
                    "description": "Software subscription",
                    "unit_price": 100.0,
                    "tax_1_transaction_type": "standard",
                    "tax_1_country": "ES",
                    "tax_1_name": "IVA",
                    "tax_1_rate": 21
                }],
                "payment_method": "credit_card",
                "attachment": { "filename": "inv.pdf", "data": "JVBERi0xLjQ=" }
            })
        );
    }

    #[test]
    fn missing_attachment_is_null() {
        let payload = build_payload(&record(None, None), &details(), None);
        let v = serde_json::to_value(&payload).unwrap();
        assert!(v["attachment"]["data"].is_null());
        assert_eq!(v["attachment"]["filename"], "inv.pdf");
    }

    #[test]
    fn build_is_deterministic() {
        let r = record(Some(21.0), Some(15.0));
        let a = build_payload(&r, &details(), Some(b"abc"));
        let b = build_payload(&r, &details(), Some(b"abc"));
        assert_eq!(a, b);
    }

    #[test]
    fn read_attachment_missing_file() {
        let dir = tempfile::TempDir::new().unwrap();
        assert!(read_attachment(&dir.path().join("gone.pdf")).is_none());
        let p = dir.path().join("here.pdf");
        std::fs::write(&p, b"%PDF").unwrap();
        assert_eq!(read_attachment(&p).as_deref(), Some(&b"%PDF"[..]));
    }
}
