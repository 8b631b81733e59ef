//! Google Sheets sink (v4 REST, bearer token)

use super::{ReportRow, ReportSink, HEADER};
use crate::config::ReportingConfig;
use crate::error::{BotError, Result};
use async_trait::async_trait;
use reqwest::{Client, Response, Url};
use serde::Deserialize;

const LAST_COLUMN: char = 'Q';

#[derive(Clone)]
pub struct SheetsSink {
    http: Client,
    api_base: String,
    spreadsheet_id: String,
    sheet_name: String,
    access_token: String,
}

#[derive(Debug, Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<serde_json::Value>>,
}

impl SheetsSink {
    pub fn new(config: &ReportingConfig) -> Result<Self> {
        let http = Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()?;

        Ok(Self {
            http,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            spreadsheet_id: config.spreadsheet_id.clone(),
            sheet_name: config.sheet_name.clone(),
            access_token: config.access_token.clone(),
        })
    }

    fn values_url(&self, range: &str, suffix: &str) -> Result<Url> {
        let mut url = Url::parse(&self.api_base)
            .map_err(|e| BotError::InvalidConfig(format!("reporting.api_base: {}", e)))?;
        let target = format!("{}{}", range, suffix);
        url.path_segments_mut()
            .map_err(|_| BotError::InvalidConfig("reporting.api_base cannot be a base".into()))?
            .extend([
                "spreadsheets",
                self.spreadsheet_id.as_str(),
                "values",
                target.as_str(),
            ]);
        Ok(url)
    }

    fn range(&self, cells: &str) -> String {
        format!("'{}'!{}", self.sheet_name.replace('\'', "''"), cells)
    }

    /// Write the header into row 1 if the sheet has none yet
    pub async fn ensure_header(&self) -> Result<bool> {
        let range = self.range(&format!("A1:{}1", LAST_COLUMN));
        let url = self.values_url(&range, "")?;
        let resp = self.http.get(url).bearer_auth(&self.access_token).send().await?;
        let current: ValueRange = check(resp).await?.json().await?;

        let has_header = current
            .values
            .first()
            .map(|row| !row.is_empty())
            .unwrap_or(false);
        if has_header {
            return Ok(false);
        }

        let mut url = self.values_url(&range, "")?;
        url.query_pairs_mut().append_pair("valueInputOption", "RAW");
        let body = serde_json::json!({ "range": range, "values": [HEADER] });
        let resp = self
            .http
            .put(url)
            .bearer_auth(&self.access_token)
            .json(&body)
            .send()
            .await?;
        check(resp).await?;

        tracing::info!(sheet = %self.sheet_name, "Wrote report header row");
        Ok(true)
    }
}

#[async_trait]
impl ReportSink for SheetsSink {
    async fn append(&self, row: &ReportRow) -> Result<()> {
        let range = self.range(&format!("A:{}", LAST_COLUMN));
        let mut url = self.values_url(&range, ":append")?;
        url.query_pairs_mut()
            .append_pair("valueInputOption", "USER_ENTERED")
            .append_pair("insertDataOption", "INSERT_ROWS");

        let body = serde_json::json!({ "values": [row.to_cells()] });
        let resp = self
            .http
            .post(url)
            .bearer_auth(&self.access_token)
            .json(&body)
            .send()
            .await?;
        check(resp).await?;
        Ok(())
    }
}

async fn check(resp: Response) -> Result<Response> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    Err(BotError::Api {
        status: status.as_u16(),
        body,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sink(sheet: &str) -> SheetsSink {
        let config = ReportingConfig {
            enabled: true,
            spreadsheet_id: "abc123".to_string(),
            sheet_name: sheet.to_string(),
            access_token: "token".to_string(),
            ..Default::default()
        };
        SheetsSink::new(&config).unwrap()
    }

    #[test]
    fn test_append_url() {
        let sink = sink("Bets");
        let url = sink.values_url(&sink.range("A:Q"), ":append").unwrap();
        assert_eq!(
            url.as_str(),
            "https://sheets.googleapis.com/v4/spreadsheets/abc123/values/'Bets'!A:Q:append"
        );
    }

    #[test]
    fn test_range_escapes_sheet_name() {
        let sink = sink("Joe's Bets");
        assert_eq!(sink.range("A1:Q1"), "'Joe''s Bets'!A1:Q1");
        let url = sink.values_url(&sink.range("A1:Q1"), "").unwrap();
        assert!(url.as_str().contains("Joe''s%20Bets"));
    }
}
