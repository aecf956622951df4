use std::path::PathBuf;

use tracing::{error, info, instrument};

use crate::config::{ServerConfig, Settings, SheetTarget};
use crate::error::Result;
use crate::flatten::{FlatRow, SheetTable, build_table};
use crate::io::excel_write::{self, dated_file_name};
use crate::io::sheets::{ServiceAccountKey, SheetsClient};
use crate::retry::RetryPolicy;
use crate::rpc::{OdooSession, UserInfo};

/// Columns cleared on the cloud worksheet before each upload.
pub const CLEAR_RANGE: &str = "A:T";
/// Worksheet name of the local workbook.
pub const LOCAL_SHEET_NAME: &str = "Git_Raw";

/// Destination a finished table is written to.
pub trait TableSink {
    /// Short name used in logs.
    fn name(&self) -> &str;

    fn write(&mut self, table: &SheetTable) -> Result<()>;
}

/// Writes the table to a local `.xlsx` file.
#[derive(Debug, Clone)]
pub struct ExcelFileSink {
    path: PathBuf,
}

impl ExcelFileSink {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }
}

impl TableSink for ExcelFileSink {
    fn name(&self) -> &str {
        "excel"
    }

    fn write(&mut self, table: &SheetTable) -> Result<()> {
        excel_write::write_table(&self.path, table)?;
        info!(path = %self.path.display(), "workbook saved");
        Ok(())
    }
}

/// Replaces the contents of a Google Sheets worksheet with the table.
#[derive(Debug, Clone)]
pub struct GoogleSheetSink {
    target: SheetTarget,
}

impl GoogleSheetSink {
    pub fn new(target: SheetTarget) -> Self {
        Self { target }
    }
}

impl TableSink for GoogleSheetSink {
    fn name(&self) -> &str {
        "google-sheets"
    }

    fn write(&mut self, table: &SheetTable) -> Result<()> {
        let key = ServiceAccountKey::load(&self.target.credentials)?;
        let client = SheetsClient::authorize(&key)?;
        publish_table(&client, &self.target.sheet_key, &self.target.worksheet, table)
    }
}

/// Clears the worksheet's report columns and pastes the table at `A1`.
#[instrument(level = "info", skip(client, table))]
pub fn publish_table(
    client: &SheetsClient,
    sheet_key: &str,
    worksheet: &str,
    table: &SheetTable,
) -> Result<()> {
    let spreadsheet = client.open_by_key(sheet_key)?;
    let worksheet = spreadsheet.worksheet(worksheet)?;
    worksheet.batch_clear(&[CLEAR_RANGE])?;
    worksheet.write_table(table)?;
    info!(worksheet = worksheet.title(), "data pasted to Google Sheets");
    Ok(())
}

/// What an export attempt produced.
#[derive(Debug, Clone, PartialEq)]
pub struct ExportSummary {
    pub rows: usize,
    /// Error message of the cloud upload, when one was attempted and failed.
    pub cloud_error: Option<String>,
}

/// Result of a full run.
#[derive(Debug, Clone, PartialEq)]
pub enum RunOutcome {
    /// The server refused to switch to the company; nothing was fetched.
    CompanyRejected,
    /// The report came back empty; nothing was written.
    NoData,
    Exported(ExportSummary),
}

/// Writes `rows` to the local sink and, if given, the cloud sink.
///
/// Returns `None` without touching either sink when there are no rows. A local
/// write failure is returned; a cloud failure is logged and reported in the
/// summary.
pub fn export_rows(
    rows: &[FlatRow],
    local: &mut dyn TableSink,
    cloud: Option<&mut dyn TableSink>,
) -> Result<Option<ExportSummary>> {
    if rows.is_empty() {
        return Ok(None);
    }

    let table = build_table(LOCAL_SHEET_NAME, rows);
    local.write(&table)?;

    let cloud_error = match cloud {
        Some(sink) => match sink.write(&table) {
            Ok(()) => None,
            Err(err) => {
                error!(sink = sink.name(), error = %err, "error while pasting to Google Sheets");
                Some(err.to_string())
            }
        },
        None => None,
    };

    Ok(Some(ExportSummary {
        rows: rows.len(),
        cloud_error,
    }))
}

/// Logs in, scopes the session to the configured company, fetches the GIT
/// report and exports it.
#[instrument(
    level = "info",
    skip_all,
    fields(company_id = settings.company_id, company = %settings.company_name)
)]
pub fn run(settings: &Settings) -> Result<RunOutcome> {
    let mut session = OdooSession::new(&settings.server.url, settings.retry)?;
    let user = session.login(
        &settings.server.db,
        &settings.server.username,
        &settings.server.password,
    )?;
    info!(companies = %user.user_companies, "user info (allowed companies)");

    if !session.switch_company(settings.company_id)? {
        return Ok(RunOutcome::CompanyRejected);
    }

    let rows = session.fetch_git(settings.company_id, &settings.company_name)?;

    let path = settings
        .output_dir
        .join(dated_file_name(chrono::Local::now().date_naive()));
    let mut local = ExcelFileSink::new(path);
    let mut cloud = settings.sheet.clone().map(GoogleSheetSink::new);

    let summary = export_rows(
        &rows,
        &mut local,
        cloud.as_mut().map(|sink| sink as &mut dyn TableSink),
    )?;

    Ok(summary.map_or(RunOutcome::NoData, RunOutcome::Exported))
}

/// Logs in and returns what the server reports about the user's companies.
#[instrument(level = "info", skip_all, fields(url = %server.url))]
pub fn fetch_user_info(server: &ServerConfig, retry: RetryPolicy) -> Result<UserInfo> {
    let mut session = OdooSession::new(&server.url, retry)?;
    session.login(&server.db, &server.username, &server.password)
}

#[cfg(test)]
mod tests {
    use serde_json::{Map, Value, json};

    use super::*;
    use crate::error::ReportError;

    #[derive(Default)]
    struct RecordingSink {
        writes: Vec<SheetTable>,
        fail: bool,
    }

    impl TableSink for RecordingSink {
        fn name(&self) -> &str {
            "recording"
        }

        fn write(&mut self, table: &SheetTable) -> Result<()> {
            if self.fail {
                return Err(ReportError::WorksheetNotFound("Git_Raw".to_string()));
            }
            self.writes.push(table.clone());
            Ok(())
        }
    }

    fn row(value: Value) -> FlatRow {
        match value {
            Value::Object(map) => map,
            _ => Map::new(),
        }
    }

    #[test]
    fn empty_result_attempts_no_write() {
        let mut local = RecordingSink::default();
        let mut cloud = RecordingSink::default();

        let summary = export_rows(&[], &mut local, Some(&mut cloud)).expect("export");

        assert_eq!(summary, None);
        assert!(local.writes.is_empty());
        assert!(cloud.writes.is_empty());
    }

    #[test]
    fn rows_reach_both_sinks() {
        let rows = vec![row(json!({"Transit Name": "GIT/1", "State": "draft"}))];
        let mut local = RecordingSink::default();
        let mut cloud = RecordingSink::default();

        let summary = export_rows(&rows, &mut local, Some(&mut cloud))
            .expect("export")
            .expect("rows exported");

        assert_eq!(summary.rows, 1);
        assert_eq!(summary.cloud_error, None);
        assert_eq!(local.writes.len(), 1);
        assert_eq!(local.writes, cloud.writes);
        assert_eq!(local.writes[0].columns, ["Transit Name", "State"]);
    }

    #[test]
    fn cloud_failure_is_reported_not_raised() {
        let rows = vec![row(json!({"Transit Name": "GIT/1"}))];
        let mut local = RecordingSink::default();
        let mut cloud = RecordingSink {
            fail: true,
            ..RecordingSink::default()
        };

        let summary = export_rows(&rows, &mut local, Some(&mut cloud))
            .expect("export")
            .expect("rows exported");

        assert_eq!(local.writes.len(), 1);
        assert_eq!(
            summary.cloud_error.as_deref(),
            Some("worksheet 'Git_Raw' not found")
        );
    }

    #[test]
    fn local_failure_is_raised() {
        let rows = vec![row(json!({"Transit Name": "GIT/1"}))];
        let mut local = RecordingSink {
            fail: true,
            ..RecordingSink::default()
        };

        assert!(export_rows(&rows, &mut local, None).is_err());
    }
}
