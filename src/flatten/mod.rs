use serde_json::{Map, Value};

use crate::error::{ReportError, Result};

/// One report row: column label → value, in the order fields were received.
pub type FlatRow = Map<String, Value>;

/// Column labels of the GIT report, keyed by server field name.
pub const LABELS: [(&str, &str); 16] = [
    ("name", "Transit Name"),
    ("parent_id", "Parent"),
    ("invoice_number", "Invoice Number"),
    ("invoice_date", "Invoice Date"),
    ("po_numbers", "PO Numbers"),
    ("vendor", "Vendor"),
    ("company_id", "Company"),
    ("shipment_mode", "Shipment Mode"),
    ("shipment_type", "Shipment Type"),
    ("lc_number", "LC Number"),
    ("bl_number", "BL Number"),
    ("eta", "ETA"),
    ("grn_date", "GRN Date"),
    ("state", "State"),
    ("subtotal", "Subtotal"),
    ("create_uid", "Created By"),
];

/// Label for a server field; unknown fields keep their own name.
pub fn label_for(field: &str) -> &str {
    LABELS
        .iter()
        .find(|(key, _)| *key == field)
        .map(|(_, label)| *label)
        .unwrap_or(field)
}

/// Flattens one nested record into a label → value row.
///
/// Relational objects collapse to their `display_name`, lists collapse to the
/// comma-joined ids of their children, and everything else is kept as-is.
/// A list holding anything but objects is rejected.
pub fn flatten_record(record: &Map<String, Value>) -> Result<FlatRow> {
    record
        .iter()
        .map(|(field, value)| {
            Ok((label_for(field).to_string(), flatten_value(field, value)?))
        })
        .collect()
}

fn flatten_value(field: &str, value: &Value) -> Result<Value> {
    match value {
        Value::Object(object) if object.contains_key("display_name") => {
            Ok(object["display_name"].clone())
        }
        Value::Array(items) => {
            let ids = items
                .iter()
                .map(|item| child_id(field, item))
                .collect::<Result<Vec<_>>>()?;
            Ok(Value::String(ids.join(", ")))
        }
        other => Ok(other.clone()),
    }
}

fn child_id(field: &str, item: &Value) -> Result<String> {
    let child = item.as_object().ok_or_else(|| {
        ReportError::UnexpectedResponse(format!("list item in '{field}' is not an object: {item}"))
    })?;
    Ok(match child.get("id") {
        Some(Value::String(id)) => id.clone(),
        Some(id) => id.to_string(),
        None => String::new(),
    })
}

/// A single spreadsheet cell.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Empty,
    Text(String),
    Number(f64),
    Bool(bool),
}

impl Cell {
    /// Converts a flattened value into a cell. Nested structures that
    /// survived flattening are written as compact JSON.
    pub fn from_value(value: &Value) -> Self {
        match value {
            Value::Null => Cell::Empty,
            Value::Bool(flag) => Cell::Bool(*flag),
            Value::Number(number) => number
                .as_f64()
                .map(Cell::Number)
                .unwrap_or_else(|| Cell::Text(number.to_string())),
            Value::String(text) => Cell::Text(text.clone()),
            nested => Cell::Text(nested.to_string()),
        }
    }

    /// JSON form used by the cloud export.
    pub fn to_json(&self) -> Value {
        match self {
            Cell::Empty => Value::String(String::new()),
            Cell::Text(text) => Value::String(text.clone()),
            Cell::Number(number) => serde_json::Number::from_f64(*number)
                .map(Value::Number)
                .unwrap_or(Value::Null),
            Cell::Bool(flag) => Value::Bool(*flag),
        }
    }
}

/// A table that will be materialised as a worksheet.
#[derive(Debug, Clone, PartialEq)]
pub struct SheetTable {
    pub sheet_name: String,
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Cell>>,
}

/// Lays rows out as a table. Columns are the union of row keys in the order
/// they were first seen; a row lacking a column gets an empty cell.
pub fn build_table(sheet_name: &str, rows: &[FlatRow]) -> SheetTable {
    let mut columns: Vec<String> = Vec::new();
    for row in rows {
        for key in row.keys() {
            if !columns.contains(key) {
                columns.push(key.clone());
            }
        }
    }

    let cells: Vec<Vec<Cell>> = rows
        .iter()
        .map(|row| {
            columns
                .iter()
                .map(|column| row.get(column).map(Cell::from_value).unwrap_or(Cell::Empty))
                .collect()
        })
        .collect();

    SheetTable {
        sheet_name: sheet_name.to_string(),
        columns,
        rows: cells,
    }
}
