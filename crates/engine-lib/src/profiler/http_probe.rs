//! HTTP probe backed by reqwest
//!
//! Not a collector: it only issues the few GETs the profiler needs. Two
//! clients are kept, one presenting browser-like headers and one sending the
//! bare minimum so anti-bot layers reveal themselves.

use super::{HeaderProfile, ProbeRequest, ProbeResponse, SiteProbe};
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE};
use std::time::{Duration, Instant};

const BROWSER_UA: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) \
                          AppleWebKit/537.36 (KHTML, like Gecko) \
                          Chrome/131.0.0.0 Safari/537.36";

/// Bodies above this size are truncated before analysis
const MAX_BODY_BYTES: usize = 2 * 1024 * 1024;

#[derive(Clone)]
pub struct HttpProbe {
    browser: reqwest::Client,
    minimal: reqwest::Client,
}

impl HttpProbe {
    pub fn new(default_timeout: Duration) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8"),
        );
        headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.9"));

        let browser = reqwest::Client::builder()
            .timeout(default_timeout)
            .redirect(reqwest::redirect::Policy::limited(5))
            .user_agent(BROWSER_UA)
            .default_headers(headers)
            .build()
            .context("failed to build browser probe client")?;

        let minimal = reqwest::Client::builder()
            .timeout(default_timeout)
            .redirect(reqwest::redirect::Policy::limited(5))
            .build()
            .context("failed to build minimal probe client")?;

        Ok(Self { browser, minimal })
    }
}

#[async_trait]
impl SiteProbe for HttpProbe {
    async fn fetch(&self, url: &str, request: &ProbeRequest) -> Result<ProbeResponse> {
        let client = match request.headers {
            HeaderProfile::Browser => &self.browser,
            HeaderProfile::Minimal => &self.minimal,
        };

        let start = Instant::now();
        let resp = client
            .get(url)
            .timeout(request.timeout)
            .send()
            .await
            .with_context(|| format!("GET {url} failed"))?;

        let status = resp.status().as_u16();
        let headers: Vec<(String, String)> = resp
            .headers()
            .iter()
            .map(|(k, v)| (k.as_str().to_string(), v.to_str().unwrap_or_default().to_string()))
            .collect();

        let body = read_capped_body(resp, MAX_BODY_BYTES)
            .await
            .with_context(|| format!("reading body of {url} failed"))?;

        Ok(ProbeResponse {
            status,
            headers,
            body,
            elapsed_ms: start.elapsed().as_millis() as u64,
        })
    }
}

/// Read at most `limit` bytes of the body; the rest is never pulled off
/// the connection.
async fn read_capped_body(mut resp: reqwest::Response, limit: usize) -> reqwest::Result<String> {
    let mut buf: Vec<u8> = Vec::new();
    while buf.len() < limit {
        let Some(chunk) = resp.chunk().await? else {
            break;
        };
        let take = chunk.len().min(limit - buf.len());
        buf.extend_from_slice(&chunk[..take]);
    }
    Ok(String::from_utf8_lossy(&buf).into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Serve one response of `size` bytes of `a` on a local port
    async fn serve_large_page(size: usize) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = vec![0u8; 4096];
            let _ = socket.read(&mut request).await;
            let head = format!(
                "HTTP/1.1 200 OK\r\ncontent-type: text/html\r\ncontent-length: {size}\r\n\r\n"
            );
            if socket.write_all(head.as_bytes()).await.is_err() {
                return;
            }
            let chunk = vec![b'a'; 64 * 1024];
            let mut sent = 0;
            while sent < size {
                let n = chunk.len().min(size - sent);
                // the client hangs up once it has enough
                if socket.write_all(&chunk[..n]).await.is_err() {
                    return;
                }
                sent += n;
            }
        });
        format!("http://{addr}/")
    }

    #[tokio::test]
    async fn test_large_body_is_capped() {
        let url = serve_large_page(3 * 1024 * 1024).await;
        let probe = HttpProbe::new(Duration::from_secs(5)).unwrap();
        let request = ProbeRequest {
            headers: HeaderProfile::Browser,
            timeout: Duration::from_secs(5),
        };

        let response = probe.fetch(&url, &request).await.unwrap();
        assert_eq!(response.status, 200);
        assert_eq!(response.body.len(), MAX_BODY_BYTES);
        assert!(response.body.bytes().all(|b| b == b'a'));
    }

    #[tokio::test]
    async fn test_small_body_is_read_whole() {
        let url = serve_large_page(1_000).await;
        let probe = HttpProbe::new(Duration::from_secs(5)).unwrap();
        let request = ProbeRequest {
            headers: HeaderProfile::Minimal,
            timeout: Duration::from_secs(5),
        };

        let response = probe.fetch(&url, &request).await.unwrap();
        assert_eq!(response.body.len(), 1_000);
    }

    #[test]
    fn test_http_probe_builds() {
        assert!(HttpProbe::new(Duration::from_secs(5)).is_ok());
    }

    #[tokio::test]
    async fn test_unreachable_host_is_an_error() {
        let probe = HttpProbe::new(Duration::from_millis(500)).unwrap();
        let request = ProbeRequest {
            headers: HeaderProfile::Minimal,
            timeout: Duration::from_millis(500),
        };
        // Port 9 on localhost (discard) is closed in test environments
        let result = probe.fetch("http://127.0.0.1:9/", &request).await;
        assert!(result.is_err());
    }
}
