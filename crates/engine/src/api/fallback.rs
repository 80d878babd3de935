//! Proxy-then-primary HTTP GET
//!
//! Every provider call goes through [`FallbackClient::get_json`]: one attempt
//! against the proxy base URL (when configured), then exactly one attempt
//! against the primary base URL. A transport error, a non-2xx status or an
//! undecodable body all count as a failed attempt.

use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::Client;
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::{debug, error, warn};

use crate::config::Endpoint;
use crate::error::{FetchError, FetchResult};

const MAX_ERROR_BODY: usize = 512;

#[derive(Clone)]
pub struct FallbackClient {
    client: Client,
    endpoint: Endpoint,
    headers: HeaderMap,
}

impl FallbackClient {
    pub fn new(endpoint: Endpoint, timeout_secs: u64) -> FetchResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| FetchError::Client(e.to_string()))?;

        Ok(Self {
            client,
            endpoint,
            headers: HeaderMap::new(),
        })
    }

    /// Attach a header sent with both the proxy and the primary attempt
    pub fn with_header(mut self, name: &str, value: &str) -> FetchResult<Self> {
        let header = HeaderName::from_bytes(name.as_bytes())
            .map_err(|e| FetchError::Client(format!("invalid header name '{name}': {e}")))?;
        let value = HeaderValue::from_str(value)
            .map_err(|e| FetchError::Client(format!("invalid {name} header: {e}")))?;
        self.headers.insert(header, value);
        Ok(self)
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    pub async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> FetchResult<T> {
        let proxy_err = match &self.endpoint.proxy {
            Some(proxy) => match self.get_once(proxy, path, query).await {
                Ok(value) => return Ok(value),
                Err(e) => {
                    warn!(path, error = %e, "Proxy request failed, falling back to primary");
                    Some(e)
                }
            },
            None => None,
        };

        match self.get_once(&self.endpoint.primary, path, query).await {
            Ok(value) => Ok(value),
            Err(primary_err) => {
                error!(path, error = %primary_err, "Primary request failed");
                match proxy_err {
                    Some(proxy_err) => Err(FetchError::AllAttemptsFailed {
                        proxy: proxy_err.to_string(),
                        primary: primary_err.to_string(),
                    }),
                    None => Err(primary_err),
                }
            }
        }
    }

    async fn get_once<T: DeserializeOwned>(
        &self,
        base: &str,
        path: &str,
        query: &[(&str, String)],
    ) -> FetchResult<T> {
        let url = format!("{}{}", base.trim_end_matches('/'), path);
        debug!(%url, "GET");

        let response = self
            .client
            .get(&url)
            .headers(self.headers.clone())
            .query(query)
            .send()
            .await
            .map_err(|source| FetchError::Transport {
                url: url.clone(),
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            let body: String = response
                .text()
                .await
                .unwrap_or_default()
                .chars()
                .take(MAX_ERROR_BODY)
                .collect();
            return Err(FetchError::Status {
                url,
                status: status.as_u16(),
                body,
            });
        }

        let text = response
            .text()
            .await
            .map_err(|source| FetchError::Transport {
                url: url.clone(),
                source,
            })?;
        debug!(%url, bytes = text.len(), "Response received");

        serde_json::from_str(&text).map_err(|e| FetchError::Decode {
            url,
            message: e.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[derive(Debug, Deserialize, PartialEq)]
    struct Payload {
        value: i64,
    }

    fn client(proxy: Option<&str>, primary: &str) -> FallbackClient {
        let mut endpoint = Endpoint::primary(primary);
        if let Some(proxy) = proxy {
            endpoint = endpoint.with_proxy(proxy);
        }
        FallbackClient::new(endpoint, 5).unwrap()
    }

    async fn mount_ok(server: &MockServer, value: i64) {
        Mock::given(method("GET"))
            .and(path("/data"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({ "value": value })))
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn test_proxy_success_skips_primary() {
        let proxy = MockServer::start().await;
        let primary = MockServer::start().await;
        mount_ok(&proxy, 1).await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&primary)
            .await;

        let c = client(Some(&proxy.uri()), &primary.uri());
        let got: Payload = c.get_json("/data", &[]).await.unwrap();
        assert_eq!(got, Payload { value: 1 });
    }

    #[tokio::test]
    async fn test_proxy_error_status_falls_back() {
        let proxy = MockServer::start().await;
        let primary = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(502).set_body_string("bad gateway"))
            .expect(1)
            .mount(&proxy)
            .await;
        mount_ok(&primary, 2).await;

        let c = client(Some(&proxy.uri()), &primary.uri());
        let got: Payload = c.get_json("/data", &[]).await.unwrap();
        assert_eq!(got.value, 2);
    }

    #[tokio::test]
    async fn test_proxy_garbage_body_falls_back() {
        let proxy = MockServer::start().await;
        let primary = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
            .mount(&proxy)
            .await;
        mount_ok(&primary, 3).await;

        let c = client(Some(&proxy.uri()), &primary.uri());
        let got: Payload = c.get_json("/data", &[]).await.unwrap();
        assert_eq!(got.value, 3);
    }

    #[tokio::test]
    async fn test_unreachable_proxy_falls_back() {
        let primary = MockServer::start().await;
        mount_ok(&primary, 4).await;

        // Nothing listens on port 9 locally
        let c = client(Some("http://127.0.0.1:9"), &primary.uri());
        let got: Payload = c.get_json("/data", &[]).await.unwrap();
        assert_eq!(got.value, 4);
    }

    #[tokio::test]
    async fn test_both_failing_reports_both() {
        let proxy = MockServer::start().await;
        let primary = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&proxy)
            .await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(429))
            .expect(1)
            .mount(&primary)
            .await;

        let c = client(Some(&proxy.uri()), &primary.uri());
        let err = c.get_json::<Payload>("/data", &[]).await.unwrap_err();
        match err {
            FetchError::AllAttemptsFailed { proxy, primary } => {
                assert!(proxy.contains("500"), "{proxy}");
                assert!(primary.contains("429"), "{primary}");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_no_proxy_returns_primary_error() {
        let primary = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404).set_body_string("nope"))
            .mount(&primary)
            .await;

        let c = client(None, &primary.uri());
        let err = c.get_json::<Payload>("/data", &[]).await.unwrap_err();
        assert!(matches!(err, FetchError::Status { status: 404, .. }));
    }

    #[tokio::test]
    async fn test_headers_and_query_sent_to_both() {
        let proxy = MockServer::start().await;
        let primary = MockServer::start().await;
        Mock::given(method("GET"))
            .and(header("x-api-key", "secret"))
            .and(query_param("symbol", "BTCUSDT"))
            .respond_with(ResponseTemplate::new(503))
            .expect(1)
            .mount(&proxy)
            .await;
        Mock::given(method("GET"))
            .and(path("/data"))
            .and(header("x-api-key", "secret"))
            .and(query_param("symbol", "BTCUSDT"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({ "value": 5 })))
            .expect(1)
            .mount(&primary)
            .await;

        let c = client(Some(&format!("{}/", proxy.uri())), &primary.uri())
            .with_header("X-Api-Key", "secret")
            .unwrap();
        let got: Payload = c
            .get_json("/data", &[("symbol", "BTCUSDT".to_string())])
            .await
            .unwrap();
        assert_eq!(got.value, 5);
    }

    #[test]
    fn test_invalid_header_name_is_an_error() {
        let result = client(None, "http://localhost").with_header("bad name", "v");
        assert!(matches!(result, Err(FetchError::Client(_))));

        let result = client(None, "http://localhost").with_header("x-key", "line\nbreak");
        assert!(matches!(result, Err(FetchError::Client(_))));
    }
}
