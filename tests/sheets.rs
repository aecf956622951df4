use serde_json::json;
use transit_report::ReportError;
use transit_report::flatten::{Cell, SheetTable};
use transit_report::io::sheets::SheetsClient;
use transit_report::sync::publish_table;
use wiremock::matchers::{body_json, header, method, path, path_regex, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const SHEET_KEY: &str = "doc-key";

fn table() -> SheetTable {
    SheetTable {
        sheet_name: "Git_Raw".to_string(),
        columns: vec!["Transit Name".to_string(), "Subtotal".to_string()],
        rows: vec![
            vec![Cell::Text("GIT/0001".to_string()), Cell::Number(1520.5)],
            vec![Cell::Text("GIT/0002".to_string()), Cell::Empty],
        ],
    }
}

async fn mount_metadata(server: &MockServer, row_count: u32) {
    Mock::given(method("GET"))
        .and(path(format!("/v4/spreadsheets/{SHEET_KEY}")))
        .and(header("authorization", "Bearer test-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "sheets": [
                {"properties": {"sheetId": 0, "title": "Summary", "gridProperties": {"rowCount": 100, "columnCount": 26}}},
                {"properties": {"sheetId": 42, "title": "Git_Raw", "gridProperties": {"rowCount": row_count, "columnCount": 26}}}
            ]
        })))
        .expect(1)
        .mount(server)
        .await;
}

#[tokio::test(flavor = "multi_thread")]
async fn clears_then_writes_worksheet() {
    let server = MockServer::start().await;
    mount_metadata(&server, 1000).await;

    Mock::given(method("POST"))
        .and(path(format!("/v4/spreadsheets/{SHEET_KEY}/values:batchClear")))
        .and(body_json(json!({"ranges": ["'Git_Raw'!A:T"]})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("PUT"))
        .and(path_regex(r"^/v4/spreadsheets/doc-key/values/.*A1$"))
        .and(query_param("valueInputOption", "RAW"))
        .and(body_json(json!({
            "range": "'Git_Raw'!A1",
            "majorDimension": "ROWS",
            "values": [
                ["Transit Name", "Subtotal"],
                ["GIT/0001", 1520.5],
                ["GIT/0002", ""]
            ]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"updatedRows": 3})))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path(format!("/v4/spreadsheets/{SHEET_KEY}:batchUpdate")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(0)
        .mount(&server)
        .await;

    let api_base = format!("{}/v4", server.uri());
    tokio::task::spawn_blocking(move || -> transit_report::Result<()> {
        let client = SheetsClient::with_token("test-token", api_base)?;
        publish_table(&client, SHEET_KEY, "Git_Raw", &table())
    })
    .await
    .expect("blocking task")
    .expect("worksheet published");
}

#[tokio::test(flavor = "multi_thread")]
async fn grows_small_grid_before_writing() {
    let server = MockServer::start().await;
    mount_metadata(&server, 2).await;

    Mock::given(method("POST"))
        .and(path(format!("/v4/spreadsheets/{SHEET_KEY}/values:batchClear")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path(format!("/v4/spreadsheets/{SHEET_KEY}:batchUpdate")))
        .and(body_json(json!({
            "requests": [{
                "updateSheetProperties": {
                    "properties": {
                        "sheetId": 42,
                        "gridProperties": {"rowCount": 3, "columnCount": 26}
                    },
                    "fields": "gridProperties.rowCount,gridProperties.columnCount"
                }
            }]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("PUT"))
        .and(path_regex(r"^/v4/spreadsheets/doc-key/values/.*A1$"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(1)
        .mount(&server)
        .await;

    let api_base = format!("{}/v4", server.uri());
    tokio::task::spawn_blocking(move || -> transit_report::Result<()> {
        let client = SheetsClient::with_token("test-token", api_base)?;
        publish_table(&client, SHEET_KEY, "Git_Raw", &table())
    })
    .await
    .expect("blocking task")
    .expect("worksheet published");
}

#[tokio::test(flavor = "multi_thread")]
async fn missing_worksheet_is_an_error() {
    let server = MockServer::start().await;
    mount_metadata(&server, 1000).await;

    let api_base = format!("{}/v4", server.uri());
    let result = tokio::task::spawn_blocking(move || -> transit_report::Result<()> {
        let client = SheetsClient::with_token("test-token", api_base)?;
        publish_table(&client, SHEET_KEY, "Git_Archive", &table())
    })
    .await
    .expect("blocking task");

    assert!(matches!(result, Err(ReportError::WorksheetNotFound(name)) if name == "Git_Archive"));
}

#[tokio::test(flavor = "multi_thread")]
async fn api_errors_carry_status() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(format!("/v4/spreadsheets/{SHEET_KEY}")))
        .respond_with(ResponseTemplate::new(403).set_body_string("PERMISSION_DENIED"))
        .mount(&server)
        .await;

    let api_base = format!("{}/v4", server.uri());
    let result = tokio::task::spawn_blocking(move || -> transit_report::Result<()> {
        let client = SheetsClient::with_token("test-token", api_base)?;
        publish_table(&client, SHEET_KEY, "Git_Raw", &table())
    })
    .await
    .expect("blocking task");

    match result {
        Err(ReportError::SheetsApi { status, message }) => {
            assert_eq!(status, 403);
            assert_eq!(message, "PERMISSION_DENIED");
        }
        other => panic!("unexpected result: {other:?}"),
    }
}
