use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, instrument};
use url::Url;

pub const DEFAULT_CATALOG_BASE_URL: &str = "https://www.falabella.com.pe/falabella-pe";
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (X11; Linux x86_64) catalog-sync/0.1";

fn truncate_for_log(mut s: String, max_len: usize) -> String {
    if s.len() > max_len {
        let mut cut = max_len;
        while !s.is_char_boundary(cut) {
            cut -= 1;
        }
        s.truncate(cut);
        s.push('…');
    }
    s
}

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("invalid catalog base url {0:?}: {1}")]
    InvalidBaseUrl(String, #[source] url::ParseError),
    #[error("request to {url} failed: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("upstream returned {status} for {url}: {body}")]
    Status {
        url: String,
        status: reqwest::StatusCode,
        body: String,
    },
}

/// Source of raw product detail pages.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch_product_page(&self, product_id: i64) -> Result<String, FetchError>;
}

/// Fetches `<base>/product/<id>` over HTTP.
#[derive(Debug, Clone)]
pub struct HttpPageFetcher {
    base_url: Url,
    http: Client,
}

impl HttpPageFetcher {
    pub fn new(base_url: &str, timeout: Duration, user_agent: &str) -> anyhow::Result<Self> {
        let base_url = parse_base_url(base_url)?;
        let http = Client::builder()
            .user_agent(user_agent)
            .timeout(timeout)
            .build()?;
        Ok(Self { base_url, http })
    }

    pub fn product_url(&self, product_id: i64) -> String {
        product_url(&self.base_url, product_id)
    }
}

fn parse_base_url(raw: &str) -> Result<Url, FetchError> {
    // Url::join drops the last path segment unless the base ends with '/'.
    let mut normalized = raw.trim().trim_end_matches('/').to_string();
    normalized.push('/');
    Url::parse(&normalized).map_err(|e| FetchError::InvalidBaseUrl(raw.to_string(), e))
}

fn product_url(base: &Url, product_id: i64) -> String {
    format!("{}product/{}", base.as_str(), product_id)
}

#[async_trait]
impl PageFetcher for HttpPageFetcher {
    #[instrument(skip(self))]
    async fn fetch_product_page(&self, product_id: i64) -> Result<String, FetchError> {
        let url = self.product_url(product_id);
        let resp = self
            .http
            .get(&url)
            .header("Accept", "text/html")
            .send()
            .await
            .map_err(|source| FetchError::Request {
                url: url.clone(),
                source,
            })?;
        let status = resp.status();
        if !status.is_success() {
            let body = truncate_for_log(resp.text().await.unwrap_or_default(), 500);
            return Err(FetchError::Status { url, status, body });
        }
        let html = resp
            .text()
            .await
            .map_err(|source| FetchError::Request {
                url: url.clone(),
                source,
            })?;
        debug!(%url, bytes = html.len(), "fetched product page");
        Ok(html)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Serves one canned HTTP response on an ephemeral local port and returns
    /// the base URL to reach it.
    async fn serve_once(status_line: &'static str, body: String) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = Vec::new();
            let mut buf = [0u8; 1024];
            while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                let n = socket.read(&mut buf).await.unwrap();
                if n == 0 {
                    break;
                }
                request.extend_from_slice(&buf[..n]);
            }
            let response = format!(
                "HTTP/1.1 {status_line}\r\ncontent-type: text/html\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
                body.len()
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            socket.shutdown().await.unwrap();
        });
        format!("http://{addr}/store")
    }

    fn fetcher(base: &str) -> HttpPageFetcher {
        HttpPageFetcher::new(base, Duration::from_secs(5), DEFAULT_USER_AGENT).unwrap()
    }

    #[tokio::test]
    async fn non_success_status_is_an_error_with_truncated_body() {
        let base = serve_once("404 Not Found", "x".repeat(2_000)).await;

        let err = fetcher(&base).fetch_product_page(42).await.unwrap_err();

        match err {
            FetchError::Status { url, status, body } => {
                assert_eq!(status, reqwest::StatusCode::NOT_FOUND);
                assert!(url.ends_with("/store/product/42"), "{url}");
                assert!(body.ends_with('…'));
                assert_eq!(body.chars().count(), 501);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn success_returns_page_html() {
        let html = "<html><body>product</body></html>".to_string();
        let base = serve_once("200 OK", html.clone()).await;

        let page = fetcher(&base).fetch_product_page(7).await.unwrap();

        assert_eq!(page, html);
    }

    #[test]
    fn builds_product_url_from_base() {
        let fetcher = HttpPageFetcher::new(
            DEFAULT_CATALOG_BASE_URL,
            Duration::from_secs(5),
            DEFAULT_USER_AGENT,
        )
        .unwrap();
        assert_eq!(
            fetcher.product_url(881234567),
            "https://www.falabella.com.pe/falabella-pe/product/881234567"
        );
    }

    #[test]
    fn trailing_slash_on_base_is_tolerated() {
        let base = parse_base_url("http://localhost:9000/store/").unwrap();
        assert_eq!(product_url(&base, 7), "http://localhost:9000/store/product/7");
    }

    #[test]
    fn rejects_invalid_base_url() {
        assert!(matches!(
            parse_base_url("not a url"),
            Err(FetchError::InvalidBaseUrl(..))
        ));
    }

    #[test]
    fn truncation_respects_char_boundaries() {
        let s = truncate_for_log("ñññ".to_string(), 3);
        assert_eq!(s, "ñ…");
    }
}
