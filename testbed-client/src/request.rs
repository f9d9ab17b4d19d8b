//! Request builder and buffered responses.

use crate::{ClientError, Result};
use bytes::Bytes;
use http::{HeaderMap, HeaderName, HeaderValue, Method};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::fmt::Display;

/// Status expected when none is set explicitly.
pub const DEFAULT_EXPECTED_STATUS: u16 = 200;

/// Fluent builder for one request against the application under test.
///
/// Every terminal operation checks the response status against the
/// expected one (200 unless changed) before looking at the body.
pub struct RequestBuilder {
    http: reqwest::Client,
    method: Method,
    url: String,
    headers: HeaderMap,
    query: Vec<(String, Vec<String>)>,
    body: Option<Vec<u8>>,
    expected_status: u16,
}

impl RequestBuilder {
    pub(crate) fn new(
        http: reqwest::Client,
        method: Method,
        url: String,
        headers: HeaderMap,
    ) -> Self {
        Self {
            http,
            method,
            url,
            headers,
            query: Vec::new(),
            body: None,
            expected_status: DEFAULT_EXPECTED_STATUS,
        }
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Serialize `body` as the JSON request entity.
    pub fn body<T: Serialize + ?Sized>(mut self, body: &T) -> Self {
        match serde_json::to_vec(body) {
            Ok(bytes) => {
                self.body = Some(bytes);
                self.headers.insert(
                    http::header::CONTENT_TYPE,
                    HeaderValue::from_static("application/json"),
                );
            }
            Err(e) => tracing::error!(error = %e, "Failed to serialize request body"),
        }
        self
    }

    /// Append a header value. `None` removes every value for the header.
    pub fn header(mut self, name: &str, value: Option<&dyn Display>) -> Self {
        let Ok(header_name) = HeaderName::try_from(name) else {
            tracing::warn!(header = name, "Ignoring invalid header name");
            return self;
        };
        match value {
            Some(value) => match HeaderValue::try_from(value.to_string()) {
                Ok(value) => {
                    self.headers.append(header_name, value);
                }
                Err(_) => tracing::warn!(header = name, "Ignoring invalid header value"),
            },
            None => {
                self.headers.remove(header_name);
            }
        }
        self
    }

    /// Append every value of `headers`.
    pub fn headers(mut self, headers: &HeaderMap) -> Self {
        for (name, value) in headers {
            self.headers.append(name.clone(), value.clone());
        }
        self
    }

    /// Append values for a query parameter; repeated calls accumulate.
    pub fn query_param<I, V>(mut self, name: &str, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Display,
    {
        let values = values.into_iter().map(|v| v.to_string());
        match self.query.iter_mut().find(|(k, _)| k == name) {
            Some((_, existing)) => existing.extend(values),
            None => self.query.push((name.to_string(), values.collect())),
        }
        self
    }

    /// Set single-valued query parameters, replacing earlier values.
    pub fn query_params<I, K, V>(mut self, params: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Display,
    {
        for (name, value) in params {
            let name = name.into();
            let value = vec![value.to_string()];
            match self.query.iter_mut().find(|(k, _)| *k == name) {
                Some((_, existing)) => *existing = value,
                None => self.query.push((name, value)),
            }
        }
        self
    }

    /// Status the terminal operations require; `0` accepts any status.
    pub fn expect_status(mut self, status: u16) -> Self {
        self.expected_status = status;
        self
    }

    pub fn expect(self, status: http::StatusCode) -> Self {
        self.expect_status(status.as_u16())
    }

    /// Send without checking the status; the caller owns the response.
    pub async fn response(self) -> Result<reqwest::Response> {
        let pairs: Vec<(&str, &str)> = self
            .query
            .iter()
            .flat_map(|(k, values)| values.iter().map(move |v| (k.as_str(), v.as_str())))
            .collect();

        let mut request = self
            .http
            .request(self.method.clone(), &self.url)
            .headers(self.headers.clone())
            .query(&pairs);
        if let Some(body) = self.body.clone() {
            request = request.body(body);
        }

        tracing::debug!(method = %self.method, url = %self.url, "Sending test request");
        Ok(request.send().await?)
    }

    /// Send and buffer the response, failing on an unexpected status.
    pub async fn fetch(self) -> Result<TestResponse> {
        let expected = self.expected_status;
        let response = TestResponse::read(self.response().await?).await?;
        if expected != 0 && response.status() != expected {
            return Err(ClientError::UnexpectedStatus {
                expected,
                actual: response.status(),
                body: response.text_lossy(),
            });
        }
        Ok(response)
    }

    /// Send and discard the body.
    pub async fn send(self) -> Result<()> {
        self.fetch().await.map(|_| ())
    }

    /// Send and decode the JSON body.
    pub async fn json<T: DeserializeOwned>(self) -> Result<T> {
        self.fetch().await?.json()
    }

    /// Send and return the body as text.
    pub async fn text(self) -> Result<String> {
        self.fetch().await?.text()
    }

    /// Send and map the buffered response.
    pub async fn map<T, F>(self, f: F) -> Result<T>
    where
        F: FnOnce(&TestResponse) -> T,
    {
        let response = self.fetch().await?;
        Ok(f(&response))
    }

    /// Send and hand the buffered response to `f`.
    pub async fn consume<F>(self, f: F) -> Result<()>
    where
        F: FnOnce(&TestResponse),
    {
        self.map(f).await
    }
}

/// A fully read response.
#[derive(Debug, Clone)]
pub struct TestResponse {
    status: u16,
    headers: HeaderMap,
    body: Bytes,
}

impl TestResponse {
    async fn read(response: reqwest::Response) -> Result<Self> {
        let status = response.status().as_u16();
        let headers = response.headers().clone();
        let body = response.bytes().await?;
        Ok(Self {
            status,
            headers,
            body,
        })
    }

    pub fn status(&self) -> u16 {
        self.status
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }

    pub fn text(&self) -> Result<String> {
        String::from_utf8(self.body.to_vec()).map_err(|e| ClientError::Decode(e.to_string()))
    }

    fn text_lossy(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_slice(&self.body).map_err(|e| ClientError::Decode(e.to_string()))
    }
}
