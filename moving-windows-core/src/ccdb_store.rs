use crate::histogram::Histogram;
use crate::store::{QueryMetadata, StoredObject, ValidityStore};
use moving_windows_common::{MovingWindowsError, Result, StoreConfig};
use reqwest::blocking::{Client, Response};
use reqwest::header::HeaderMap;
use reqwest::StatusCode;
use std::collections::HashMap;
use std::time::Duration;
use tracing::debug;

/// ValidityStore over the CCDB REST layout:
/// objects at `<qcdb>/<key>/<timestamp>/<k>=<v>...`, run information at
/// `<ccdb>/<run_info_path>/<run>` with boundary markers as response headers.
/// Object bodies are JSON-encoded histograms.
pub struct CcdbStore {
    client: Client,
    ccdb_url: String,
    qcdb_url: String,
    run_info_path: String,
}

impl CcdbStore {
    pub fn new(config: &StoreConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout_secs.map(Duration::from_secs))
            .build()
            .map_err(|e| MovingWindowsError::Http(e.to_string()))?;
        Ok(Self {
            client,
            ccdb_url: config.ccdb_url.trim_end_matches('/').to_owned(),
            qcdb_url: config.qcdb_url.trim_end_matches('/').to_owned(),
            run_info_path: config.run_info_path.trim_matches('/').to_owned(),
        })
    }

    pub fn object_url(&self, key: &str, metadata: &QueryMetadata, timestamp: i64) -> String {
        let mut url = format!("{}/{}/{}", self.qcdb_url, key.trim_matches('/'), timestamp);
        for (k, v) in metadata.pairs() {
            url.push_str(&format!("/{k}={v}"));
        }
        url
    }

    pub fn run_info_url(&self, run: u32) -> String {
        format!("{}/{}/{}", self.ccdb_url, self.run_info_path, run)
    }

    fn send(&self, request: reqwest::blocking::RequestBuilder, url: &str) -> Result<Option<Response>> {
        let resp = request
            .send()
            .map_err(|e| MovingWindowsError::Http(format!("{url}: {e}")))?;
        let status = resp.status();
        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            return Err(MovingWindowsError::Http(format!("{url} returned HTTP {status}")));
        }
        Ok(Some(resp))
    }
}

/// header names lowercased by the client; non-UTF-8 values are skipped
pub fn header_map(headers: &HeaderMap) -> HashMap<String, String> {
    headers
        .iter()
        .filter_map(|(k, v)| v.to_str().ok().map(|s| (k.as_str().to_owned(), s.to_owned())))
        .collect()
}

impl ValidityStore for CcdbStore {
    fn query_at(&self, key: &str, metadata: &QueryMetadata, timestamp: i64) -> Result<Option<StoredObject>> {
        let url = self.object_url(key, metadata, timestamp);
        debug!(%url, "querying object");
        let Some(resp) = self.send(self.client.get(&url), &url)? else {
            return Ok(None);
        };
        let headers = header_map(resp.headers());
        let histogram: Histogram = resp
            .json()
            .map_err(|e| MovingWindowsError::Http(format!("{url}: undecodable body: {e}")))?;
        Ok(Some(StoredObject { histogram, headers }))
    }

    fn query_run_bound(&self, run: u32, marker: &str) -> Result<Option<i64>> {
        let url = self.run_info_url(run);
        let Some(resp) = self.send(self.client.head(&url), &url)? else {
            return Ok(None);
        };
        let headers = header_map(resp.headers());
        let Some(raw) = headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(marker))
            .map(|(_, v)| v.trim())
        else {
            return Ok(None);
        };
        raw.parse::<i64>()
            .map(Some)
            .map_err(|_| MovingWindowsError::MalformedHeader {
                key: self.run_info_path.clone(),
                timestamp: i64::from(run),
                detail: format!("{marker} header not an integer: {raw:?}"),
            })
    }
}
