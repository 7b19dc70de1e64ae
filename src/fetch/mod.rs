use crate::error::{Result, VigiaError};
use log::{debug, warn};
use reqwest::{Client, ClientBuilder, Response, StatusCode};
use std::time::Duration;
use tokio::time::sleep;

const MAX_RETRIES: u32 = 3;
const RETRY_BASE_DELAY_MS: u64 = 250;

/// Outcome of retrieving one bulletin document.
///
/// A bulletin that has not been published yet is the expected steady state
/// for recent dates, not an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    /// Decoded document text
    Found(String),
    /// Document absent, with a descriptive reason
    NotPublished(String),
}

/// HTTP fetcher for bulletin documents.
///
/// The archive serves windows-1252 payloads without a charset header;
/// responses are decoded explicitly before parsing. A wrong decode step
/// corrupts accented characters silently, so callers should assert on
/// decoded content in tests rather than on fetch success alone.
pub struct BulletinFetcher {
    client: Client,
}

impl BulletinFetcher {
    /// Create a fetcher with a bounded per-request timeout.
    pub fn new(timeout_secs: u64, user_agent: &str) -> Result<Self> {
        let client = ClientBuilder::new()
            .pool_max_idle_per_host(4)
            .pool_idle_timeout(Duration::from_secs(30))
            .timeout(Duration::from_secs(timeout_secs))
            .tcp_keepalive(Duration::from_secs(60))
            .tcp_nodelay(true)
            .use_rustls_tls()
            .user_agent(user_agent)
            .build()
            .map_err(VigiaError::Network)?;

        Ok(Self { client })
    }

    /// Fetch one document by address.
    ///
    /// HTTP 404 maps to [`FetchOutcome::NotPublished`]; transient transport
    /// failures and 5xx responses are retried with exponential backoff and,
    /// once retries are exhausted, surfaced as errors for the caller to
    /// attach to the ingestion attempt.
    pub async fn fetch_document(&self, url: &str) -> Result<FetchOutcome> {
        let response = match self.execute_with_retry(url).await? {
            Some(response) => response,
            None => {
                debug!("bulletin not yet published at {}", url);
                return Ok(FetchOutcome::NotPublished(format!(
                    "bulletin not published (HTTP 404): {}",
                    url
                )));
            }
        };

        let bytes = response.bytes().await.map_err(VigiaError::Network)?;
        Ok(FetchOutcome::Found(decode_windows_1252(&bytes)))
    }

    /// Execute the request, retrying transient failures. `Ok(None)` means a
    /// definitive 404.
    async fn execute_with_retry(&self, url: &str) -> Result<Option<Response>> {
        let mut last_error = None;
        let mut retry_delay = Duration::from_millis(RETRY_BASE_DELAY_MS);

        for attempt in 0..MAX_RETRIES {
            if attempt > 0 {
                sleep(retry_delay).await;
                retry_delay *= 2; // Exponential backoff
            }

            match self.client.get(url).send().await {
                Ok(response) => {
                    let status = response.status();
                    if status.is_success() {
                        return Ok(Some(response));
                    } else if status == StatusCode::NOT_FOUND {
                        return Ok(None);
                    } else if status.is_server_error() {
                        warn!("server error {} fetching {}, retrying", status, url);
                        last_error = Some(VigiaError::ServerError(format!(
                            "Server returned status {} for {}",
                            status, url
                        )));
                    } else {
                        return Err(VigiaError::Other(format!(
                            "Unexpected status {} fetching {}",
                            status, url
                        )));
                    }
                }
                Err(e) => {
                    warn!("network error fetching {}: {}", url, e);
                    last_error = Some(VigiaError::Network(e));
                }
            }
        }

        Err(last_error
            .unwrap_or_else(|| VigiaError::Other("Request failed after all retries".to_string())))
    }
}

/// Decode a legacy windows-1252 payload into Unicode text.
fn decode_windows_1252(bytes: &[u8]) -> String {
    let (text, _, _) = encoding_rs::WINDOWS_1252.decode(bytes);
    text.into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_windows_1252_accents() {
        // "QUERÉTARO" in windows-1252: É = 0xC9
        let bytes = b"QUER\xC9TARO";
        assert_eq!(decode_windows_1252(bytes), "QUERÉTARO");
        // ñ = 0xF1
        let bytes = b"PE\xF1A";
        assert_eq!(decode_windows_1252(bytes), "PEñA");
    }

    #[tokio::test]
    async fn test_fetch_not_published_on_404() {
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock("GET", "/2025/boletines/bc250307.htm")
            .with_status(404)
            .create_async()
            .await;

        let fetcher = BulletinFetcher::new(5, "vigia-test").unwrap();
        let url = format!("{}/2025/boletines/bc250307.htm", server.url());
        let outcome = fetcher.fetch_document(&url).await.unwrap();
        match outcome {
            FetchOutcome::NotPublished(reason) => {
                assert!(reason.contains("404"));
            }
            FetchOutcome::Found(_) => panic!("expected NotPublished"),
        }
    }

    #[tokio::test]
    async fn test_fetch_decodes_legacy_payload() {
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock("GET", "/doc.htm")
            .with_status(200)
            .with_header("content-type", "text/html")
            .with_body(b"<p>JUZGADO PRIMERO, QUER\xC9TARO</p>".to_vec())
            .create_async()
            .await;

        let fetcher = BulletinFetcher::new(5, "vigia-test").unwrap();
        let url = format!("{}/doc.htm", server.url());
        let outcome = fetcher.fetch_document(&url).await.unwrap();
        match outcome {
            FetchOutcome::Found(text) => {
                assert!(text.contains("QUERÉTARO"), "decoded text: {}", text);
            }
            FetchOutcome::NotPublished(_) => panic!("expected Found"),
        }
    }

    #[tokio::test]
    async fn test_fetch_other_status_is_error() {
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock("GET", "/doc.htm")
            .with_status(403)
            .create_async()
            .await;

        let fetcher = BulletinFetcher::new(5, "vigia-test").unwrap();
        let url = format!("{}/doc.htm", server.url());
        assert!(fetcher.fetch_document(&url).await.is_err());
    }
}
