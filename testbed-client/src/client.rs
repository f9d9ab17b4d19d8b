// HTTP client pointed at a locally booted application

use crate::request::RequestBuilder;
use http::{HeaderMap, HeaderName, HeaderValue, Method};
use parking_lot::RwLock;
use std::fmt::Display;
use std::sync::Arc;

/// Client for the application under test, bound to `http://localhost:<port>/`.
///
/// Clones share the underlying connection pool and default headers.
#[derive(Clone)]
pub struct TestClient {
    http: reqwest::Client,
    local_port: u16,
    default_headers: Arc<RwLock<HeaderMap>>,
}

impl TestClient {
    pub fn new(local_port: u16) -> Self {
        Self::with_client(reqwest::Client::new(), local_port)
    }

    /// Use a preconfigured reqwest client (timeouts, proxies, TLS).
    pub fn with_client(http: reqwest::Client, local_port: u16) -> Self {
        Self {
            http,
            local_port,
            default_headers: Arc::new(RwLock::new(HeaderMap::new())),
        }
    }

    pub fn local_port(&self) -> u16 {
        self.local_port
    }

    pub fn base_url(&self) -> String {
        format!("http://localhost:{}/", self.local_port)
    }

    /// Set a header sent with every later request, replacing a previous
    /// default of the same name. Invalid names or values are ignored.
    pub fn default_header(&self, name: &str, value: impl Display) -> &Self {
        let value = value.to_string();
        match (
            HeaderName::try_from(name),
            HeaderValue::try_from(value.as_str()),
        ) {
            (Ok(name), Ok(value)) => {
                self.default_headers.write().insert(name, value);
            }
            _ => tracing::warn!(header = name, "Ignoring invalid default header"),
        }
        self
    }

    pub fn clear_default_headers(&self) {
        self.default_headers.write().clear();
    }

    pub fn get(&self, path: &str, args: &[&dyn Display]) -> RequestBuilder {
        self.request(Method::GET, path, args)
    }

    pub fn post(&self, path: &str, args: &[&dyn Display]) -> RequestBuilder {
        self.request(Method::POST, path, args)
    }

    pub fn put(&self, path: &str, args: &[&dyn Display]) -> RequestBuilder {
        self.request(Method::PUT, path, args)
    }

    pub fn patch(&self, path: &str, args: &[&dyn Display]) -> RequestBuilder {
        self.request(Method::PATCH, path, args)
    }

    pub fn delete(&self, path: &str, args: &[&dyn Display]) -> RequestBuilder {
        self.request(Method::DELETE, path, args)
    }

    /// Start a request. `{...}` placeholders in `path` are replaced by
    /// `args` in order; a leading `/` is ignored.
    pub fn request(&self, method: Method, path: &str, args: &[&dyn Display]) -> RequestBuilder {
        let url = format!("{}{}", self.base_url(), resolve_path(path, args));
        let headers = self.default_headers.read().clone();
        RequestBuilder::new(self.http.clone(), method, url, headers)
    }
}

/// Substitute `{...}` placeholders positionally. Surplus placeholders are
/// left as-is; surplus arguments are ignored.
pub fn resolve_path(path: &str, args: &[&dyn Display]) -> String {
    let path = path.strip_prefix('/').unwrap_or(path);
    let mut resolved = String::with_capacity(path.len());
    let mut rest = path;
    let mut args = args.iter();

    while let Some(open) = rest.find('{') {
        let Some(close) = rest[open..].find('}').map(|i| open + i) else {
            break;
        };
        let Some(arg) = args.next() else {
            break;
        };
        resolved.push_str(&rest[..open]);
        resolved.push_str(&arg.to_string());
        rest = &rest[close + 1..];
    }

    resolved.push_str(rest);
    resolved
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_path_positional() {
        assert_eq!(resolve_path("/widgets/{id}", &[&5]), "widgets/5");
        assert_eq!(
            resolve_path("a/{x}/b/{y}", &[&"one", &2]),
            "a/one/b/2"
        );
    }

    #[test]
    fn test_resolve_path_mismatched_counts() {
        assert_eq!(resolve_path("a/{x}/{y}", &[&1]), "a/1/{y}");
        assert_eq!(resolve_path("plain", &[&1, &2]), "plain");
        assert_eq!(resolve_path("broken/{x", &[&1]), "broken/{x");
    }

    #[test]
    fn test_base_url() {
        let client = TestClient::new(4321);
        assert_eq!(client.base_url(), "http://localhost:4321/");
    }

    #[test]
    fn test_default_header_replaces() {
        let client = TestClient::new(1);
        client.default_header("x-user", "a").default_header("x-user", "b");
        client.default_header("bad header", "ignored");

        let headers = client.default_headers.read();
        assert_eq!(headers.get_all("x-user").iter().count(), 1);
        assert_eq!(headers.get("x-user").unwrap(), "b");
        assert_eq!(headers.len(), 1);
    }

    #[test]
    fn test_clones_share_default_headers() {
        let client = TestClient::new(1);
        let clone = client.clone();
        client.default_header("x-shared", 1);
        assert!(clone.default_headers.read().contains_key("x-shared"));
    }
}
