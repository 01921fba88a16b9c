//! Row store: header reconciliation, row reads, per-row result writes.

use chrono::Utc;
use chrono_tz::Tz;
use serde::Serialize;
use tracing::{debug, info};

use crate::SheetsError;
use crate::client::{SheetsClient, spreadsheet_id_from_ref};

/// Columns the posting queue requires. Missing ones are appended to the
/// header; existing order and extra columns are preserved.
pub const REQUIRED_COLUMNS: [&str; 10] = [
    "text",
    "image_url",
    "alt_text",
    "link_attachment",
    "reply_control",
    "topic_tag",
    "location_id",
    "status",
    "posted_at",
    "error",
];

/// Longest error text written back to a row.
pub const MAX_ERROR_LEN: usize = 3000;

/// Per-row posting status, parsed leniently from the status cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowStatus {
    /// Empty or unrecognized status; the row is still eligible.
    Pending,
    Posted,
    Failed,
}

impl RowStatus {
    /// Parse a status cell, case-insensitively; anything unrecognized is
    /// pending so hand-edited cells never strand a row.
    pub fn parse(cell: &str) -> Self {
        match cell.trim().to_lowercase().as_str() {
            "posted" => Self::Posted,
            "failed" => Self::Failed,
            _ => Self::Pending,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "",
            Self::Posted => "posted",
            Self::Failed => "failed",
        }
    }
}

/// One data row of the posting queue, addressed by its 1-based sheet row
/// index (the header is row 1; data starts at row 2).
#[derive(Debug, Clone, Default, Serialize)]
pub struct Row {
    #[serde(skip)]
    pub index: usize,
    pub text: String,
    pub image_url: String,
    pub alt_text: String,
    pub link_attachment: String,
    pub reply_control: String,
    pub topic_tag: String,
    pub location_id: String,
    pub status: String,
    pub posted_at: String,
    pub error: String,
}

impl Row {
    fn from_cells(index: usize, header: &[String], cells: &[String]) -> Self {
        let mut row = Row {
            index,
            ..Default::default()
        };
        for (i, name) in header.iter().enumerate() {
            let value = cells.get(i).cloned().unwrap_or_default();
            match name.as_str() {
                "text" => row.text = value,
                "image_url" => row.image_url = value,
                "alt_text" => row.alt_text = value,
                "link_attachment" => row.link_attachment = value,
                "reply_control" => row.reply_control = value,
                "topic_tag" => row.topic_tag = value,
                "location_id" => row.location_id = value,
                "status" => row.status = value,
                "posted_at" => row.posted_at = value,
                "error" => row.error = value,
                // Extra columns are not part of the posting contract.
                _ => {}
            }
        }
        row
    }

    /// Whether the row carries anything postable.
    pub fn has_content(&self) -> bool {
        !self.text.is_empty() || !self.image_url.is_empty()
    }
}

/// First row eligible for posting: not yet posted, and not blank padding.
/// `None` is the normal "queue drained" outcome, not an error.
pub fn first_unposted(rows: &[Row]) -> Option<&Row> {
    rows.iter()
        .find(|row| RowStatus::parse(&row.status) != RowStatus::Posted && row.has_content())
}

/// 0-based column index to A1 letters (`0 -> A`, `26 -> AA`).
pub fn col_to_a1(mut index: usize) -> String {
    let mut letters = Vec::new();
    loop {
        letters.push(b'A' + (index % 26) as u8);
        if index < 26 {
            break;
        }
        index = index / 26 - 1;
    }
    letters.reverse();
    String::from_utf8(letters).unwrap_or_default()
}

/// Truncate error text to the sheet's limit, on a character boundary.
pub fn truncate_error(error: &str) -> String {
    error.chars().take(MAX_ERROR_LEN).collect()
}

/// Handle to one worksheet of the posting spreadsheet.
///
/// Opened fresh for every firing: the sheet is the sole owner of row
/// identity, so row contents are never assumed to persist across ticks.
pub struct RowStore<'a> {
    client: &'a SheetsClient,
    spreadsheet_id: String,
    worksheet: String,
    header: Vec<String>,
    tz: Tz,
}

impl<'a> RowStore<'a> {
    /// Open the worksheet (the first sheet when no name is given) and
    /// reconcile its header.
    pub async fn open(
        client: &'a SheetsClient,
        sheet_ref: &str,
        worksheet: Option<&str>,
        tz: Tz,
    ) -> Result<RowStore<'a>, SheetsError> {
        let spreadsheet_id = spreadsheet_id_from_ref(sheet_ref)?;
        let worksheet = match worksheet {
            Some(name) if !name.trim().is_empty() => name.to_string(),
            _ => client.first_sheet_title(&spreadsheet_id).await?,
        };

        let mut store = RowStore {
            client,
            spreadsheet_id,
            worksheet,
            header: Vec::new(),
            tz,
        };
        store.header = store.ensure_header().await?;
        Ok(store)
    }

    /// The reconciled header, in sheet order.
    pub fn header(&self) -> &[String] {
        &self.header
    }

    /// Read every data row; cells missing from the response default to the
    /// empty string.
    pub async fn read_rows(&self) -> Result<Vec<Row>, SheetsError> {
        let values = self
            .client
            .values_get(&self.spreadsheet_id, &self.sheet_range())
            .await?;

        Ok(values
            .into_iter()
            .enumerate()
            .skip(1)
            .map(|(i, cells)| Row::from_cells(i + 1, &self.header, &cells))
            .collect())
    }

    /// Write one row's outcome: the status cell, a posted-at timestamp in
    /// the configured timezone (cleared unless posted), and the truncated
    /// error text (cleared unless failed). Three individual cell updates;
    /// a failure partway through surfaces to the caller.
    pub async fn write_result(
        &self,
        row_index: usize,
        status: RowStatus,
        error: &str,
    ) -> Result<(), SheetsError> {
        let status_col = self.column_index("status")?;
        let posted_at_col = self.column_index("posted_at")?;
        let error_col = self.column_index("error")?;

        let posted_at = if status == RowStatus::Posted {
            Utc::now()
                .with_timezone(&self.tz)
                .format("%Y-%m-%d %H:%M:%S")
                .to_string()
        } else {
            String::new()
        };
        let error_text = if status == RowStatus::Failed {
            truncate_error(error)
        } else {
            String::new()
        };

        self.update_cell(row_index, status_col, status.as_str().to_string())
            .await?;
        self.update_cell(row_index, posted_at_col, posted_at).await?;
        self.update_cell(row_index, error_col, error_text).await?;

        debug!(row = row_index, status = status.as_str(), "wrote row result");
        Ok(())
    }

    async fn ensure_header(&self) -> Result<Vec<String>, SheetsError> {
        let values = self
            .client
            .values_get(&self.spreadsheet_id, &self.header_range())
            .await?;

        let Some(existing) = values.into_iter().next() else {
            let header: Vec<String> = REQUIRED_COLUMNS.iter().map(|c| c.to_string()).collect();
            self.write_header(&header).await?;
            info!(worksheet = %self.worksheet, "wrote header to empty sheet");
            return Ok(header);
        };

        let mut header = existing;
        let mut changed = false;
        for column in REQUIRED_COLUMNS {
            if !header.iter().any(|h| h == column) {
                header.push(column.to_string());
                changed = true;
            }
        }
        if changed {
            self.write_header(&header).await?;
            debug!(
                worksheet = %self.worksheet,
                columns = header.len(),
                "appended missing header columns"
            );
        }
        Ok(header)
    }

    async fn write_header(&self, header: &[String]) -> Result<(), SheetsError> {
        self.client
            .values_update(&self.spreadsheet_id, &self.header_range(), vec![
                header.to_vec(),
            ])
            .await
    }

    async fn update_cell(
        &self,
        row: usize,
        col: usize,
        value: String,
    ) -> Result<(), SheetsError> {
        let range = format!("{}!{}{}", self.sheet_range(), col_to_a1(col), row);
        self.client
            .values_update(&self.spreadsheet_id, &range, vec![vec![value]])
            .await
    }

    fn sheet_range(&self) -> String {
        format!("'{}'", self.worksheet.replace('\'', "''"))
    }

    fn header_range(&self) -> String {
        format!("{}!1:1", self.sheet_range())
    }

    fn column_index(&self, name: &str) -> Result<usize, SheetsError> {
        self.header
            .iter()
            .position(|h| h == name)
            .ok_or_else(|| SheetsError::MissingColumn(name.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{mock_token_endpoint, test_client};
    use chrono_tz::Asia::Tokyo;
    use pretty_assertions::assert_eq;
    use wiremock::matchers::{method, path_regex};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn header(names: &[&str]) -> Vec<String> {
        names.iter().map(|n| n.to_string()).collect()
    }

    fn row(index: usize, text: &str, image_url: &str, status: &str) -> Row {
        Row {
            index,
            text: text.to_string(),
            image_url: image_url.to_string(),
            status: status.to_string(),
            ..Default::default()
        }
    }

    // === Selector ===

    #[test]
    fn selector_returns_the_lowest_eligible_index() {
        let rows = vec![
            row(2, "a", "", "posted"),
            row(3, "b", "", ""),
            row(4, "c", "", ""),
        ];
        assert_eq!(first_unposted(&rows).unwrap().index, 3);
    }

    #[test]
    fn selector_never_returns_posted_rows() {
        let rows = vec![
            row(2, "x", "http://img", "posted"),
            row(3, "y", "", "POSTED "),
            row(4, "z", "", " Posted"),
        ];
        assert!(first_unposted(&rows).is_none());
    }

    #[test]
    fn selector_skips_blank_padding_rows() {
        let rows = vec![row(2, "", "", ""), row(3, "", "", "failed"), row(4, "hi", "", "")];
        assert_eq!(first_unposted(&rows).unwrap().index, 4);
    }

    #[test]
    fn selector_retries_failed_rows() {
        let rows = vec![row(2, "hi", "", "failed")];
        assert_eq!(first_unposted(&rows).unwrap().index, 2);
    }

    #[test]
    fn image_only_rows_are_eligible() {
        let rows = vec![row(2, "", "http://img", "")];
        assert_eq!(first_unposted(&rows).unwrap().index, 2);
    }

    // === Row construction ===

    #[test]
    fn short_raw_rows_default_missing_cells() {
        let header = header(&["text", "image_url", "status"]);
        let row = Row::from_cells(2, &header, &["hello".to_string()]);
        assert_eq!(row.text, "hello");
        assert_eq!(row.image_url, "");
        assert_eq!(row.status, "");
        assert_eq!(row.index, 2);
    }

    #[test]
    fn header_order_drives_field_mapping() {
        let header = header(&["status", "text"]);
        let row = Row::from_cells(5, &header, &["posted".to_string(), "hi".to_string()]);
        assert_eq!(row.status, "posted");
        assert_eq!(row.text, "hi");
    }

    // === Status parsing ===

    #[test]
    fn status_parse_is_lenient() {
        assert_eq!(RowStatus::parse(" Posted "), RowStatus::Posted);
        assert_eq!(RowStatus::parse("FAILED"), RowStatus::Failed);
        assert_eq!(RowStatus::parse(""), RowStatus::Pending);
        assert_eq!(RowStatus::parse("queued"), RowStatus::Pending);
    }

    // === Helpers ===

    #[test]
    fn column_letters_cover_multi_letter_columns() {
        assert_eq!(col_to_a1(0), "A");
        assert_eq!(col_to_a1(25), "Z");
        assert_eq!(col_to_a1(26), "AA");
        assert_eq!(col_to_a1(27), "AB");
        assert_eq!(col_to_a1(51), "AZ");
        assert_eq!(col_to_a1(52), "BA");
    }

    #[test]
    fn error_text_is_truncated_to_the_limit() {
        let long = "x".repeat(MAX_ERROR_LEN + 500);
        assert_eq!(truncate_error(&long).chars().count(), MAX_ERROR_LEN);
        assert_eq!(truncate_error("short"), "short");
    }

    // === Store behavior against a mock API ===

    async fn mock_header_get(server: &MockServer, values: serde_json::Value) {
        Mock::given(method("GET"))
            .and(path_regex(r"^/v4/spreadsheets/sheet1/values/.+$"))
            .respond_with(ResponseTemplate::new(200).set_body_json(values))
            .mount(server)
            .await;
    }

    async fn mock_any_put(server: &MockServer) {
        Mock::given(method("PUT"))
            .and(path_regex(r"^/v4/spreadsheets/sheet1/values/.+$"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({})))
            .mount(server)
            .await;
    }

    fn put_bodies(requests: &[wiremock::Request]) -> Vec<serde_json::Value> {
        requests
            .iter()
            .filter(|r| r.method.as_str() == "PUT")
            .map(|r| serde_json::from_slice(&r.body).unwrap())
            .collect()
    }

    #[tokio::test]
    async fn complete_header_is_left_untouched() {
        let server = MockServer::start().await;
        mock_token_endpoint(&server).await;
        let all: Vec<&str> = REQUIRED_COLUMNS.to_vec();
        mock_header_get(&server, serde_json::json!({ "values": [all] })).await;
        mock_any_put(&server).await;

        let client = test_client(&server);
        let store = RowStore::open(&client, "sheet1", Some("Queue"), Tokyo)
            .await
            .unwrap();

        assert_eq!(store.header(), &header(&REQUIRED_COLUMNS));
        let requests = server.received_requests().await.unwrap();
        assert!(put_bodies(&requests).is_empty());
    }

    #[tokio::test]
    async fn missing_columns_are_appended_preserving_extras() {
        let server = MockServer::start().await;
        mock_token_endpoint(&server).await;
        mock_header_get(
            &server,
            serde_json::json!({ "values": [["campaign", "text", "status"]] }),
        )
        .await;
        mock_any_put(&server).await;

        let client = test_client(&server);
        let store = RowStore::open(&client, "sheet1", Some("Queue"), Tokyo)
            .await
            .unwrap();

        let expected = header(&[
            "campaign",
            "text",
            "status",
            "image_url",
            "alt_text",
            "link_attachment",
            "reply_control",
            "topic_tag",
            "location_id",
            "posted_at",
            "error",
        ]);
        assert_eq!(store.header(), &expected);

        let requests = server.received_requests().await.unwrap();
        let bodies = put_bodies(&requests);
        assert_eq!(bodies.len(), 1);
        assert_eq!(bodies[0]["values"][0][0], "campaign");
        assert_eq!(bodies[0]["values"][0].as_array().unwrap().len(), 11);
    }

    #[tokio::test]
    async fn empty_sheet_gets_the_full_header() {
        let server = MockServer::start().await;
        mock_token_endpoint(&server).await;
        mock_header_get(&server, serde_json::json!({})).await;
        mock_any_put(&server).await;

        let client = test_client(&server);
        let store = RowStore::open(&client, "sheet1", Some("Queue"), Tokyo)
            .await
            .unwrap();

        assert_eq!(store.header(), &header(&REQUIRED_COLUMNS));
        let requests = server.received_requests().await.unwrap();
        let bodies = put_bodies(&requests);
        assert_eq!(bodies.len(), 1);
        assert_eq!(
            bodies[0]["values"][0].as_array().unwrap().len(),
            REQUIRED_COLUMNS.len()
        );
    }

    #[tokio::test]
    async fn write_result_updates_status_timestamp_and_error() {
        let server = MockServer::start().await;
        mock_token_endpoint(&server).await;
        let all: Vec<&str> = REQUIRED_COLUMNS.to_vec();
        mock_header_get(&server, serde_json::json!({ "values": [all] })).await;
        mock_any_put(&server).await;

        let client = test_client(&server);
        let store = RowStore::open(&client, "sheet1", Some("Queue"), Tokyo)
            .await
            .unwrap();
        store
            .write_result(2, RowStatus::Posted, "")
            .await
            .unwrap();

        let requests = server.received_requests().await.unwrap();
        let bodies = put_bodies(&requests);
        // status, posted_at, error cells in order
        assert_eq!(bodies.len(), 3);
        assert_eq!(bodies[0]["values"], serde_json::json!([["posted"]]));
        let posted_at = bodies[1]["values"][0][0].as_str().unwrap();
        assert!(!posted_at.is_empty());
        assert_eq!(bodies[2]["values"], serde_json::json!([[""]]));
    }

    #[tokio::test]
    async fn failed_result_clears_timestamp_and_records_error() {
        let server = MockServer::start().await;
        mock_token_endpoint(&server).await;
        let all: Vec<&str> = REQUIRED_COLUMNS.to_vec();
        mock_header_get(&server, serde_json::json!({ "values": [all] })).await;
        mock_any_put(&server).await;

        let client = test_client(&server);
        let store = RowStore::open(&client, "sheet1", Some("Queue"), Tokyo)
            .await
            .unwrap();
        let long_error = "HTTP 500: ".to_string() + &"x".repeat(4000);
        store
            .write_result(3, RowStatus::Failed, &long_error)
            .await
            .unwrap();

        let requests = server.received_requests().await.unwrap();
        let bodies = put_bodies(&requests);
        assert_eq!(bodies.len(), 3);
        assert_eq!(bodies[0]["values"], serde_json::json!([["failed"]]));
        assert_eq!(bodies[1]["values"], serde_json::json!([[""]]));
        let error = bodies[2]["values"][0][0].as_str().unwrap();
        assert!(error.starts_with("HTTP 500:"));
        assert_eq!(error.chars().count(), MAX_ERROR_LEN);
    }

    #[tokio::test]
    async fn read_rows_maps_by_header_position() {
        let server = MockServer::start().await;
        mock_token_endpoint(&server).await;
        mock_header_get(
            &server,
            serde_json::json!({ "values": [
                REQUIRED_COLUMNS,
                ["hello", "", "", "", "", "", "", "", "", ""],
                ["", "http://img"],
            ]}),
        )
        .await;
        mock_any_put(&server).await;

        let client = test_client(&server);
        let store = RowStore::open(&client, "sheet1", Some("Queue"), Tokyo)
            .await
            .unwrap();
        let rows = store.read_rows().await.unwrap();

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].index, 2);
        assert_eq!(rows[0].text, "hello");
        assert_eq!(rows[1].index, 3);
        assert_eq!(rows[1].image_url, "http://img");
        assert_eq!(rows[1].status, "");
    }
}
