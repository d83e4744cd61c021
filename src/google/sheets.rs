//! Sheets client — appends ledger rows via `values.append`.

use async_trait::async_trait;
use serde_json::{Value, json};
use tracing::info;

use crate::error::SheetError;
use crate::google::GoogleAuthenticator;
use crate::pipeline::types::LedgerAppender;

/// Sheets REST client targeting one spreadsheet.
#[derive(Clone)]
pub struct SheetsClient {
    auth: GoogleAuthenticator,
    client: reqwest::Client,
    spreadsheet_id: String,
}

impl SheetsClient {
    pub fn new(auth: GoogleAuthenticator, client: reqwest::Client, spreadsheet_id: String) -> Self {
        Self {
            auth,
            client,
            spreadsheet_id,
        }
    }

    fn append_url(&self) -> String {
        // Range A1 appends after the last row of the first sheet.
        format!(
            "https://sheets.googleapis.com/v4/spreadsheets/{}/values/A1:append",
            self.spreadsheet_id
        )
    }
}

#[async_trait]
impl LedgerAppender for SheetsClient {
    async fn append_row(&self, row: Vec<Value>) -> Result<(), SheetError> {
        let token = self
            .auth
            .bearer_token()
            .await
            .map_err(|e| SheetError::Request(e.to_string()))?;

        let response = self
            .client
            .post(self.append_url())
            // USER_ENTERED lets the sheet coerce numbers and dates itself.
            .query(&[("valueInputOption", "USER_ENTERED")])
            .bearer_auth(token)
            .json(&json!({ "values": [row] }))
            .send()
            .await
            .map_err(|e| SheetError::Request(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SheetError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let result: Value = response
            .json()
            .await
            .map_err(|e| SheetError::Request(e.to_string()))?;
        info!(
            updated_cells = result["updates"]["updatedCells"].as_i64().unwrap_or(0),
            "Ledger row appended"
        );
        Ok(())
    }
}
