use serde_json::{Map, Value, json};
use tracing::{error, info, instrument};

use super::{OdooSession, call_envelope};
use crate::error::{ReportError, Result};
use crate::flatten::{FlatRow, flatten_record};

const TRANSIT_MODEL: &str = "transit.model";
const SEARCH_READ_PATH: &str = "/web/dataset/call_kw/transit.model/web_search_read";

/// Rows requested per call; there is no pagination past this.
pub const FETCH_LIMIT: u32 = 5000;
const COUNT_LIMIT: u32 = 10001;
const BODY_SNIPPET_CHARS: usize = 200;

/// Plain fields read as-is.
const PLAIN_FIELDS: [&str; 10] = [
    "name",
    "invoice_number",
    "invoice_date",
    "shipment_type",
    "lc_number",
    "bl_number",
    "eta",
    "grn_date",
    "state",
    "subtotal",
];

/// Relational fields read through their display name.
const DISPLAY_NAME_FIELDS: [&str; 5] = [
    "parent_id",
    "vendor",
    "company_id",
    "shipment_mode",
    "create_uid",
];

/// Field order of the report; the server echoes it back per record.
const FIELD_ORDER: [&str; 16] = [
    "name",
    "parent_id",
    "invoice_number",
    "invoice_date",
    "po_numbers",
    "vendor",
    "company_id",
    "shipment_mode",
    "shipment_type",
    "lc_number",
    "bl_number",
    "eta",
    "grn_date",
    "state",
    "subtotal",
    "create_uid",
];

impl OdooSession {
    /// Fetches the goods-in-transit records of one company as flat rows.
    ///
    /// Transport failures propagate once retries are exhausted. A body that
    /// cannot be parsed is logged and yields no rows.
    #[instrument(level = "info", skip(self))]
    pub fn fetch_git(&self, company_id: i64, company_name: &str) -> Result<Vec<FlatRow>> {
        let uid = self.uid.ok_or(ReportError::NotLoggedIn)?;
        let payload = search_read_payload(uid, company_id);
        let body = self.post_json(SEARCH_READ_PATH, &payload)?;

        match parse_records(&body) {
            Ok(rows) => {
                info!(company = company_name, rows = rows.len(), "GIT rows fetched");
                Ok(rows)
            }
            Err(err) => {
                let snippet: String = body.chars().take(BODY_SNIPPET_CHARS).collect();
                error!(
                    company = company_name,
                    error = %err,
                    body = %snippet,
                    "failed to parse GIT report"
                );
                Ok(Vec::new())
            }
        }
    }
}

/// Field specification for `web_search_read`, in report order.
pub fn field_specification() -> Map<String, Value> {
    FIELD_ORDER
        .iter()
        .map(|field| {
            let spec = if PLAIN_FIELDS.contains(field) {
                json!({})
            } else if DISPLAY_NAME_FIELDS.contains(field) {
                json!({"fields": {"display_name": {}}})
            } else {
                json!({"fields": {}})
            };
            (field.to_string(), spec)
        })
        .collect()
}

fn search_read_payload(uid: i64, company_id: i64) -> Value {
    call_envelope(
        TRANSIT_MODEL,
        "web_search_read",
        json!([]),
        json!({
            "specification": field_specification(),
            "offset": 0,
            "order": "invoice_date DESC",
            "limit": FETCH_LIMIT,
            "context": {
                "lang": "en_US",
                "tz": "Asia/Dhaka",
                "uid": uid,
                "allowed_company_ids": [company_id],
                "bin_size": true,
                "current_company_id": company_id,
            },
            "count_limit": COUNT_LIMIT,
            "domain": [],
        }),
    )
}

fn parse_records(body: &str) -> Result<Vec<FlatRow>> {
    let response: Value = serde_json::from_str(body)?;
    let records = response
        .pointer("/result/records")
        .and_then(Value::as_array)
        .ok_or_else(|| ReportError::UnexpectedResponse("missing result.records".to_string()))?;

    records
        .iter()
        .map(|record| {
            record
                .as_object()
                .ok_or_else(|| {
                    ReportError::UnexpectedResponse(format!("record is not an object: {record}"))
                })
                .and_then(flatten_record)
        })
        .collect()
}
