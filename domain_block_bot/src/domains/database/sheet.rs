use std::{
    path::PathBuf,
    sync::atomic::{AtomicUsize, Ordering},
    time::Duration,
};

use gcp_auth::{CustomServiceAccount, TokenProvider};
use serde::Deserialize;
use serde_json::json;
use url::Url;

use super::{StorageBackend, StorageError, StoredState};
use crate::domains::types::Domain;

const SHEETS_API: &str = "https://sheets.googleapis.com/v4/spreadsheets/";
const SHEETS_SCOPE: &str = "https://www.googleapis.com/auth/spreadsheets";

/// What's written into column B for alerted domains.
const ALERTED_MARK: &str = "TRUE";

#[derive(Debug, Deserialize)]
struct ValueRange {
    /// Google omits this entirely for an empty range.
    #[serde(default)]
    values: Vec<Vec<String>>,
}

/// Storage in a Google spreadsheet, via the Sheets v4 values API.
///
/// Row 1 is left for headers. From row 2 down, column A holds a domain
/// and column B holds `TRUE` if that domain was alerted about.
///
/// Authenticates as a Google service account from its JSON key file.
/// Access tokens are cached and minted again once they expire.
pub struct SheetStorage {
    client: reqwest::Client,
    api_base: Url,
    spreadsheet_id: String,
    sheet_name: String,
    credentials: CustomServiceAccount,
    /// How many rows were there last time we looked, so that a shorter
    /// list can blank out the leftovers in the same write.
    known_rows: AtomicUsize,
}

impl SheetStorage {
    pub fn new(
        spreadsheet_id: String,
        sheet_name: String,
        credentials_path: PathBuf,
    ) -> Result<Self, StorageError> {
        let api_base = Url::parse(SHEETS_API).expect("Sheets API URL will always be valid");
        Self::with_api_base(api_base, spreadsheet_id, sheet_name, credentials_path)
    }

    /// Same as [`SheetStorage::new`], but talking to a different server.
    pub fn with_api_base(
        api_base: Url,
        spreadsheet_id: String,
        sheet_name: String,
        credentials_path: PathBuf,
    ) -> Result<Self, StorageError> {
        let credentials = CustomServiceAccount::from_file(&credentials_path)?;
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(15))
            .build()?;

        Ok(Self {
            client,
            api_base,
            spreadsheet_id,
            sheet_name,
            credentials,
            known_rows: AtomicUsize::new(0),
        })
    }

    /// A1 notation range of all the data rows.
    fn range(&self) -> String {
        format!("'{}'!A2:B", self.sheet_name.replace('\'', "''"))
    }

    fn values_url(&self) -> Url {
        let mut url = self.api_base.clone();
        url.path_segments_mut()
            .expect("Sheets API URL is never a cannot-be-a-base URL")
            .pop_if_empty()
            .push(&self.spreadsheet_id)
            .push("values")
            .push(&self.range());
        url
    }

    async fn token(&self) -> Result<String, StorageError> {
        let token = self.credentials.token(&[SHEETS_SCOPE]).await?;
        Ok(token.as_str().to_string())
    }
}

impl StorageBackend for SheetStorage {
    async fn load(&self) -> Result<StoredState, StorageError> {
        let mut url = self.values_url();
        url.query_pairs_mut().append_pair("majorDimension", "ROWS");

        let range: ValueRange = self
            .client
            .get(url)
            .bearer_auth(self.token().await?)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        self.known_rows.store(range.values.len(), Ordering::SeqCst);

        let mut state = StoredState::default();
        for row in &range.values {
            let Some(domain) = row.first().and_then(|cell| Domain::new(cell)) else {
                continue;
            };
            if row
                .get(1)
                .is_some_and(|cell| cell.trim().eq_ignore_ascii_case(ALERTED_MARK))
            {
                state.alerted.insert(domain.key());
            }
            state.domains.push(domain);
        }

        Ok(state)
    }

    async fn save(&self, state: &StoredState) -> Result<(), StorageError> {
        let mut rows: Vec<[&str; 2]> = state
            .domains
            .iter()
            .map(|domain| {
                let mark = if state.is_alerted(domain) {
                    ALERTED_MARK
                } else {
                    ""
                };
                [domain.as_str(), mark]
            })
            .collect();

        let known_rows = self.known_rows.load(Ordering::SeqCst);
        if rows.len() < known_rows {
            rows.resize(known_rows, ["", ""]);
        }

        let mut url = self.values_url();
        url.query_pairs_mut().append_pair("valueInputOption", "RAW");

        self.client
            .put(url)
            .bearer_auth(self.token().await?)
            .json(&json!({
                "range": self.range(),
                "majorDimension": "ROWS",
                "values": rows,
            }))
            .send()
            .await?
            .error_for_status()?;

        self.known_rows.store(state.domains.len(), Ordering::SeqCst);
        Ok(())
    }
}
