// HTTP request and response types seen by route handlers

use crate::{Error, Result};
use bytes::Bytes;
use http::header::{CONTENT_TYPE, HeaderName, HeaderValue};
use http::{HeaderMap, Method};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::collections::HashMap;

/// HTTP request
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: Method,
    pub path: String,
    pub headers: HeaderMap,
    pub query_params: Vec<(String, String)>,
    pub path_params: HashMap<String, String>,
    pub body: Bytes,
}

impl HttpRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            headers: HeaderMap::new(),
            query_params: Vec::new(),
            path_params: HashMap::new(),
            body: Bytes::new(),
        }
    }

    /// Path parameter captured by the route pattern
    pub fn param(&self, name: &str) -> Option<&str> {
        self.path_params.get(name).map(String::as_str)
    }

    /// First value of a query parameter
    pub fn query(&self, name: &str) -> Option<&str> {
        self.query_params
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// All values of a repeated query parameter, in request order
    pub fn query_values(&self, name: &str) -> Vec<&str> {
        self.query_params
            .iter()
            .filter(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
            .collect()
    }

    /// Query parameters grouped by name, preserving value order
    pub fn query_map(&self) -> HashMap<String, Vec<String>> {
        let mut map: HashMap<String, Vec<String>> = HashMap::new();
        for (key, value) in &self.query_params {
            map.entry(key.clone()).or_default().push(value.clone());
        }
        map
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// All values of a repeated header
    pub fn header_values(&self, name: &str) -> Vec<&str> {
        self.headers
            .get_all(name)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .collect()
    }

    /// Parse the body as JSON
    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_slice(&self.body).map_err(|e| Error::BadRequest(e.to_string()))
    }

    pub fn text(&self) -> Result<String> {
        String::from_utf8(self.body.to_vec()).map_err(|e| Error::BadRequest(e.to_string()))
    }
}

/// HTTP response
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl HttpResponse {
    pub fn new(status: u16) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
            body: Bytes::new(),
        }
    }

    pub fn ok() -> Self {
        Self::new(200)
    }

    pub fn no_content() -> Self {
        Self::new(204)
    }

    pub fn not_found() -> Self {
        Self::new(404)
    }

    pub fn internal_server_error() -> Self {
        Self::new(500)
    }

    /// Append a header; invalid names or values are dropped.
    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        match (
            HeaderName::try_from(name),
            HeaderValue::try_from(value),
        ) {
            (Ok(name), Ok(value)) => {
                self.headers.append(name, value);
            }
            _ => tracing::warn!(header = name, "Dropping invalid response header"),
        }
        self
    }

    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    pub fn with_text(self, text: impl Into<String>) -> Self {
        let mut response = self.with_body(text.into());
        response.headers.insert(
            CONTENT_TYPE,
            HeaderValue::from_static("text/plain; charset=utf-8"),
        );
        response
    }

    pub fn with_json<T: Serialize>(mut self, value: &T) -> Result<Self> {
        self.body = Bytes::from(serde_json::to_vec(value)?);
        self.headers
            .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_values_keep_order() {
        let mut request = HttpRequest::new(Method::GET, "/echo");
        request.query_params = vec![
            ("q".into(), "1".into()),
            ("other".into(), "x".into()),
            ("q".into(), "2".into()),
        ];

        assert_eq!(request.query("q"), Some("1"));
        assert_eq!(request.query_values("q"), vec!["1", "2"]);
        assert_eq!(request.query_map()["q"], vec!["1", "2"]);
    }

    #[test]
    fn test_request_json_body() {
        let mut request = HttpRequest::new(Method::POST, "/widgets");
        request.body = Bytes::from_static(br#"{"id": 7}"#);
        let value: serde_json::Value = request.json().unwrap();
        assert_eq!(value["id"], 7);

        request.body = Bytes::from_static(b"not json");
        assert!(matches!(
            request.json::<serde_json::Value>(),
            Err(Error::BadRequest(_))
        ));
    }

    #[test]
    fn test_response_headers_append() {
        let response = HttpResponse::ok()
            .with_header("x-trace", "a")
            .with_header("x-trace", "b")
            .with_header("bad header", "c");
        assert_eq!(response.headers.get_all("x-trace").iter().count(), 2);
        assert_eq!(response.headers.len(), 2);
    }

    #[test]
    fn test_response_json() {
        let response = HttpResponse::ok().with_json(&vec!["a", "b"]).unwrap();
        assert_eq!(&response.body[..], br#"["a","b"]"#);
        assert_eq!(
            response.headers.get(CONTENT_TYPE).unwrap(),
            "application/json"
        );
    }
}
